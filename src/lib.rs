pub mod dashboard;
pub mod db;
pub mod editor;
pub mod errors;
pub mod models;
pub mod reconcile;

use crate::db::Database;
use crate::errors::AppResult;
use crate::models::{BarChart, DashboardSettings, DashboardSummary, Record, RecordDraft, ReconcileSummary, TablePage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;

pub const DATA_DIR_ENV: &str = "COLLECTION_BOARD_DATA_DIR";
pub const DATABASE_FILE: &str = "data.db";

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

/// Handles shared by every command. Built once at startup.
#[derive(Clone)]
pub struct AppState {
    db: Arc<Database>,
}

impl AppState {
    pub fn open(data_dir: &Path) -> AppResult<Self> {
        let db = Database::new(&data_dir.join(DATABASE_FILE))?;
        if db.get_settings()?.seed_sample_data {
            let seeded = db.seed_sample_records()?;
            if seeded > 0 {
                tracing::info!(count = seeded, "seeded empty store from settings");
            }
        }
        Ok(Self { db: Arc::new(db) })
    }

    pub fn db(&self) -> &Database {
        &self.db
    }
}

pub fn load_records(state: &AppState) -> Result<Vec<Record>, String> {
    state.db.load_all().map_err(to_client_error)
}

pub fn save_records(state: &AppState, rows: Vec<RecordDraft>) -> Result<ReconcileSummary, String> {
    state.db.reconcile(&rows).map_err(to_client_error)
}

pub fn seed_sample_records(state: &AppState) -> Result<usize, String> {
    state.db.seed_sample_records().map_err(to_client_error)
}

pub fn dashboard_summary(state: &AppState) -> Result<DashboardSummary, String> {
    let rows = state.db.load_all().map_err(to_client_error)?;
    Ok(dashboard::summarize(&rows))
}

pub fn dashboard_chart(state: &AppState) -> Result<BarChart, String> {
    let rows = state.db.load_all().map_err(to_client_error)?;
    Ok(dashboard::bar_chart(&rows))
}

pub fn dashboard_table(state: &AppState, page: usize) -> Result<TablePage, String> {
    let settings = state.db.get_settings().map_err(to_client_error)?;
    let rows = state.db.load_all().map_err(to_client_error)?;
    Ok(dashboard::table_page(&rows, page, settings.page_size))
}

pub fn get_settings(state: &AppState) -> Result<DashboardSettings, String> {
    state.db.get_settings().map_err(to_client_error)
}

pub fn update_settings(state: &AppState, update: serde_json::Value) -> Result<DashboardSettings, String> {
    state.db.update_settings(update).map_err(to_client_error)
}

/// `COLLECTION_BOARD_DATA_DIR` if set, otherwise the working directory.
pub fn default_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|value| !value.is_empty()) {
        return PathBuf::from(dir);
    }
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

pub fn init_tracing(data_dir: &Path) -> Result<(), String> {
    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).map_err(|error| error.to_string())?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "board.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| error.to_string())
}

fn to_client_error(error: impl std::fmt::Display) -> String {
    error.to_string()
}

#[cfg(test)]
mod tests {
    use super::{dashboard_table, load_records, save_records, update_settings, AppState};
    use crate::models::{RecordDraft, RecordStatus};

    #[test]
    fn commands_surface_errors_as_prefixed_strings() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = AppState::open(dir.path()).expect("state");

        let error = save_records(&state, vec![RecordDraft::new("bad", -1.0, RecordStatus::Paused)])
            .expect_err("negative count");
        assert!(error.starts_with("VALIDATION:"));
        assert!(load_records(&state).expect("load").is_empty());
    }

    #[test]
    fn seed_setting_fills_store_on_open() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let state = AppState::open(dir.path()).expect("state");
            update_settings(&state, serde_json::json!({ "seedSampleData": true, "pageSize": 2 }))
                .expect("settings");
        }

        let state = AppState::open(dir.path()).expect("reopen");
        let page = dashboard_table(&state, 1).expect("table");
        assert_eq!(page.total_rows, 3);
        assert_eq!(page.rows.len(), 2);
        assert_eq!(page.page_count, 2);
    }
}
