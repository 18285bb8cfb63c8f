use crate::errors::{AppError, AppResult};
use crate::models::{DashboardSettings, Record, RecordDraft, RecordFields, RecordStatus, ReconcileSummary};
use chrono::format::{Item, StrftimeItems};
use chrono::{Local, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const SCHEMA_SQL: &str = include_str!("schema.sql");
const SETTINGS_KEY: &str = "dashboard";
const INSERT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl Database {
    /// Opens the file and makes sure the schema exists.
    pub fn new(path: &Path) -> AppResult<Self> {
        let db = Self::open(path)?;
        db.initialize()?;
        Ok(db)
    }

    pub fn open(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(|error| {
            AppError::StorageUnavailable(format!("cannot open {}: {}", path.display(), error))
        })?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Safe on every start; existing rows are never touched.
    pub fn initialize(&self) -> AppResult<()> {
        {
            let conn = self.connection()?;
            conn.execute_batch(SCHEMA_SQL)?;
        }
        self.ensure_default_settings()?;
        tracing::debug!(path = %self.db_path.display(), "record store initialized");
        Ok(())
    }

    pub(crate) fn connection(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::StorageUnavailable("database mutex poisoned".to_string()))
    }

    pub fn load_all(&self) -> AppResult<Vec<Record>> {
        let conn = self.connection()?;
        if !table_exists(&conn, "records")? {
            return Ok(Vec::new());
        }
        select_all_records(&conn)
    }

    pub fn get(&self, id: i64) -> AppResult<Option<Record>> {
        let conn = self.connection()?;
        conn.query_row(
            "SELECT id, name, collected_at, count, status, upload_status FROM records WHERE id = ?1",
            [id],
            parse_record_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    /// Any id on the draft is ignored; the store assigns a fresh key.
    pub fn insert(&self, draft: &RecordDraft) -> AppResult<i64> {
        let fields = draft.validate()?;
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        let id = insert_row(&tx, &fields)?;
        tx.commit()?;
        tracing::debug!(id, name = %fields.name, "inserted record");
        Ok(id)
    }

    pub fn update(&self, id: i64, draft: &RecordDraft) -> AppResult<()> {
        let fields = draft.validate()?;
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        if update_row(&tx, id, &fields)? == 0 {
            return Err(AppError::NotFound(format!("No record with id {}", id)));
        }
        tx.commit()?;
        tracing::debug!(id, "updated record");
        Ok(())
    }

    /// Returns whether a row was removed. Missing ids are not an error.
    pub fn delete(&self, id: i64) -> AppResult<bool> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        let removed = delete_row(&tx, id)?;
        tx.commit()?;
        tracing::debug!(id, removed, "deleted record");
        Ok(removed)
    }

    pub fn reconcile(&self, client_rows: &[RecordDraft]) -> AppResult<ReconcileSummary> {
        crate::reconcile::reconcile(self, client_rows)
    }

    /// Adds the sample projects when the table is empty.
    pub fn seed_sample_records(&self) -> AppResult<usize> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        let existing: i64 = tx.query_row("SELECT COUNT(1) FROM records", [], |row| row.get(0))?;
        if existing > 0 {
            return Ok(0);
        }

        let samples = [
            ("水果分拣(fruit sort)", "2025.04.03-2025.04.20", 23618.0, RecordStatus::Completed),
            ("扫码枪扫货(scanning gun)", "2025.04.21-2025.04.22", 6792.0, RecordStatus::Completed),
            ("桌面垃圾清理(desktop junk cleaning)", "2025.04.23-", 0.0, RecordStatus::InProgress),
        ];
        for (name, collected_at, count, status) in samples {
            insert_row(
                &tx,
                &RecordFields {
                    name: name.to_string(),
                    collected_at: Some(collected_at.to_string()),
                    count,
                    status,
                    upload_status: RecordStatus::InProgress.as_str().to_string(),
                },
            )?;
        }
        tx.commit()?;
        tracing::info!(count = samples.len(), "seeded sample records");
        Ok(samples.len())
    }

    pub fn get_settings(&self) -> AppResult<DashboardSettings> {
        let conn = self.connection()?;
        let raw = conn
            .query_row(
                "SELECT value_json FROM settings WHERE key = ?1",
                [SETTINGS_KEY],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        match raw {
            Some(raw) => match serde_json::from_str::<DashboardSettings>(&raw) {
                Ok(settings) => Ok(settings),
                Err(error) => {
                    tracing::warn!(error = %error, "stored dashboard settings are unreadable; using defaults");
                    Ok(DashboardSettings::default())
                }
            },
            None => Ok(DashboardSettings::default()),
        }
    }

    pub fn update_settings(&self, update: serde_json::Value) -> AppResult<DashboardSettings> {
        let current = self.get_settings()?;
        let mut merged = serde_json::to_value(current)
            .map_err(|error| AppError::Internal(error.to_string()))?;
        merge_json(&mut merged, update);
        let settings: DashboardSettings = serde_json::from_value(merged)?;
        validate_settings(&settings)?;

        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO settings (key, value_json, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json, updated_at = excluded.updated_at",
            params![
                SETTINGS_KEY,
                serde_json::to_string(&settings).map_err(|error| AppError::Internal(error.to_string()))?,
                Utc::now().to_rfc3339()
            ],
        )?;

        Ok(settings)
    }

    fn ensure_default_settings(&self) -> AppResult<()> {
        let conn = self.connection()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(1) FROM settings WHERE key = ?1",
            [SETTINGS_KEY],
            |row| row.get(0),
        )?;
        if count == 0 {
            conn.execute(
                "INSERT INTO settings (key, value_json, updated_at) VALUES (?1, ?2, ?3)",
                params![
                    SETTINGS_KEY,
                    serde_json::to_string(&DashboardSettings::default())
                        .map_err(|error| AppError::Internal(error.to_string()))?,
                    Utc::now().to_rfc3339()
                ],
            )?;
        }
        Ok(())
    }
}

fn select_all_records(conn: &Connection) -> AppResult<Vec<Record>> {
    let mut statement = conn.prepare(
        "SELECT id, name, collected_at, count, status, upload_status FROM records ORDER BY id ASC",
    )?;
    let rows = statement
        .query_map([], parse_record_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn existing_ids(conn: &Connection) -> AppResult<BTreeSet<i64>> {
    let mut statement = conn.prepare("SELECT id FROM records")?;
    let ids = statement
        .query_map([], |row| row.get::<_, i64>(0))?
        .collect::<Result<BTreeSet<_>, _>>()?;
    Ok(ids)
}

pub(crate) fn insert_row(conn: &Connection, fields: &RecordFields) -> AppResult<i64> {
    let collected_at = match fields.collected_at_for_insert() {
        Some(value) => value.to_string(),
        None => Local::now().format(INSERT_TIMESTAMP_FORMAT).to_string(),
    };
    conn.execute(
        "INSERT INTO records (name, collected_at, count, status, upload_status)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            fields.name,
            collected_at,
            fields.count,
            fields.status.as_str(),
            fields.upload_status
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn update_row(conn: &Connection, id: i64, fields: &RecordFields) -> AppResult<usize> {
    let collected_at = fields.collected_at_for_update()?;
    let changed = conn.execute(
        "UPDATE records
         SET name = ?1, collected_at = ?2, count = ?3, status = ?4, upload_status = ?5
         WHERE id = ?6",
        params![
            fields.name,
            collected_at,
            fields.count,
            fields.status.as_str(),
            fields.upload_status,
            id
        ],
    )?;
    Ok(changed)
}

pub(crate) fn delete_row(conn: &Connection, id: i64) -> AppResult<bool> {
    let changed = conn.execute("DELETE FROM records WHERE id = ?1", [id])?;
    Ok(changed > 0)
}

fn parse_record_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Record> {
    Ok(Record {
        id: row.get(0)?,
        name: row.get(1)?,
        collected_at: row.get(2)?,
        count: row.get(3)?,
        status: parse_status(&row.get::<_, String>(4)?)?,
        upload_status: row.get(5)?,
    })
}

fn parse_status(raw: &str) -> rusqlite::Result<RecordStatus> {
    RecordStatus::parse(raw).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, error.to_string())),
        )
    })
}

fn table_exists(conn: &Connection, table: &str) -> AppResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(1) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn validate_settings(settings: &DashboardSettings) -> AppResult<()> {
    if settings.page_size == 0 {
        return Err(AppError::Validation("pageSize must be at least 1".to_string()));
    }
    if settings.timestamp_format.trim().is_empty()
        || StrftimeItems::new(&settings.timestamp_format).any(|item| matches!(item, Item::Error))
    {
        return Err(AppError::Validation(format!(
            "timestampFormat '{}' is not a valid format",
            settings.timestamp_format
        )));
    }
    Ok(())
}

fn merge_json(target: &mut serde_json::Value, update: serde_json::Value) {
    match (target, update) {
        (serde_json::Value::Object(target_map), serde_json::Value::Object(update_map)) => {
            for (key, value) in update_map {
                merge_json(target_map.entry(key).or_insert(serde_json::Value::Null), value);
            }
        }
        (target, update) => {
            *target = update;
        }
    }
}
