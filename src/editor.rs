use crate::db::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{parse_count, DashboardSettings, RecordDraft, RecordStatus, ReconcileSummary};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordField {
    Name,
    CollectedAt,
    Count,
    Status,
    UploadStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EditorMessage {
    AddRow,
    EditCell {
        row: usize,
        field: RecordField,
        value: String,
    },
    DeleteRow {
        row: usize,
    },
    Save,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditorOutcome {
    Changed,
    Saved(ReconcileSummary),
}

/// Client-side working copy of the table. Nothing reaches the store until
/// `EditorMessage::Save`.
#[derive(Debug, Clone)]
pub struct Editor {
    rows: Vec<RecordDraft>,
    settings: DashboardSettings,
    dirty: bool,
}

impl Editor {
    pub fn load(db: &Database) -> AppResult<Self> {
        Ok(Self {
            rows: load_drafts(db)?,
            settings: db.get_settings()?,
            dirty: false,
        })
    }

    pub fn rows(&self) -> &[RecordDraft] {
        &self.rows
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn handle(&mut self, db: &Database, message: EditorMessage) -> AppResult<EditorOutcome> {
        match message {
            EditorMessage::AddRow => {
                let row = self.blank_row();
                self.rows.push(row);
            }
            EditorMessage::EditCell { row, field, value } => {
                let draft = self.row_mut(row)?;
                match field {
                    RecordField::Name => draft.name = value,
                    RecordField::CollectedAt => draft.collected_at = Some(value),
                    RecordField::Count => draft.count = parse_count(&value)?,
                    RecordField::Status => draft.status = RecordStatus::parse(&value)?.as_str().to_string(),
                    RecordField::UploadStatus => draft.upload_status = value,
                }
            }
            EditorMessage::DeleteRow { row } => {
                self.row_mut(row)?;
                self.rows.remove(row);
            }
            EditorMessage::Save => {
                let summary = db.reconcile(&self.rows)?;
                self.rows = load_drafts(db)?;
                self.dirty = false;
                return Ok(EditorOutcome::Saved(summary));
            }
        }
        self.dirty = true;
        Ok(EditorOutcome::Changed)
    }

    fn row_mut(&mut self, row: usize) -> AppResult<&mut RecordDraft> {
        let len = self.rows.len();
        self.rows
            .get_mut(row)
            .ok_or_else(|| AppError::Validation(format!("row {} is out of range (0..{})", row, len)))
    }

    fn blank_row(&self) -> RecordDraft {
        let now = Local::now();
        let mut collected_at = String::new();
        if write!(collected_at, "{}", now.format(&self.settings.timestamp_format)).is_err() {
            collected_at = now.format("%Y-%m-%d %H:%M").to_string();
        }

        RecordDraft {
            id: None,
            name: String::new(),
            collected_at: Some(collected_at),
            count: 0.0,
            status: self.settings.default_status.as_str().to_string(),
            upload_status: self.settings.default_upload_status.clone(),
        }
    }
}

fn load_drafts(db: &Database) -> AppResult<Vec<RecordDraft>> {
    Ok(db.load_all()?.into_iter().map(RecordDraft::from).collect())
}
