use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("VALIDATION: {0}")]
    Validation(String),
    #[error("NOT_FOUND: {0}")]
    NotFound(String),
    #[error("STORAGE_UNAVAILABLE: {0}")]
    StorageUnavailable(String),
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl AppError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::StorageUnavailable(value.to_string())
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(value: rusqlite::Error) -> Self {
        let code = match &value {
            rusqlite::Error::SqliteFailure(failure, _) => Some(failure.code),
            _ => None,
        };
        match code {
            Some(ErrorCode::ConstraintViolation) => Self::Validation(value.to_string()),
            Some(
                ErrorCode::CannotOpen
                | ErrorCode::ReadOnly
                | ErrorCode::DiskFull
                | ErrorCode::SystemIoFailure
                | ErrorCode::PermissionDenied
                | ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::DatabaseCorrupt
                | ErrorCode::NotADatabase
                | ErrorCode::FileLockingProtocolFailed,
            ) => Self::StorageUnavailable(value.to_string()),
            _ => Self::Internal(value.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Validation(value.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::AppError;

    #[test]
    fn constraint_failures_classify_as_validation() {
        let conn = rusqlite::Connection::open_in_memory().expect("conn");
        conn.execute_batch("CREATE TABLE t (v REAL CHECK (v >= 0));")
            .expect("create");
        let error = conn
            .execute("INSERT INTO t (v) VALUES (-1)", [])
            .expect_err("check constraint");
        assert!(AppError::from(error).is_validation());
    }

    #[test]
    fn io_failures_classify_as_storage_unavailable() {
        let error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let mapped = AppError::from(error);
        assert!(matches!(mapped, AppError::StorageUnavailable(_)));
        assert!(mapped.to_string().starts_with("STORAGE_UNAVAILABLE:"));
    }
}
