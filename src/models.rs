use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordStatus {
    InProgress,
    Completed,
    Paused,
}

impl RecordStatus {
    pub const ALL: [RecordStatus; 3] = [Self::InProgress, Self::Completed, Self::Paused];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Paused => "paused",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::InProgress => "进行中",
            Self::Completed => "已完成",
            Self::Paused => "已暂停",
        }
    }

    /// Accepts the wire name or the dashboard label.
    pub fn parse(raw: &str) -> AppResult<Self> {
        let trimmed = raw.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == trimmed || status.label() == trimmed)
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "status '{}' is not one of in-progress, completed, paused",
                    raw
                ))
            })
    }
}

/// A stored row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: i64,
    pub name: String,
    pub collected_at: String,
    pub count: f64,
    pub status: RecordStatus,
    pub upload_status: String,
}

/// A row as submitted by a client. `id` is absent for rows the store has not
/// seen yet; `status` stays raw text until validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordDraft {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub collected_at: Option<String>,
    #[serde(deserialize_with = "deserialize_count")]
    pub count: f64,
    pub status: String,
    #[serde(default)]
    pub upload_status: String,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RecordFields {
    pub name: String,
    pub collected_at: Option<String>,
    pub count: f64,
    pub status: RecordStatus,
    pub upload_status: String,
}

impl RecordFields {
    /// Text to write on insert; `None` when the store should stamp the
    /// insertion time. Non-blank text is kept exactly as sent.
    pub(crate) fn collected_at_for_insert(&self) -> Option<&str> {
        self.collected_at
            .as_deref()
            .filter(|value| !value.trim().is_empty())
    }

    /// Updates overwrite every field, so the value has to be present. An
    /// empty string is written as is.
    pub(crate) fn collected_at_for_update(&self) -> AppResult<&str> {
        self.collected_at.as_deref().ok_or_else(|| {
            AppError::Validation(format!(
                "collectedAt for '{}' is required when updating a stored row",
                self.name
            ))
        })
    }
}

impl RecordDraft {
    pub fn new(name: &str, count: f64, status: RecordStatus) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            collected_at: None,
            count,
            status: status.as_str().to_string(),
            upload_status: String::new(),
        }
    }

    pub(crate) fn validate(&self) -> AppResult<RecordFields> {
        if let Some(id) = self.id {
            if id <= 0 {
                return Err(AppError::Validation(format!("id {} is malformed", id)));
            }
        }
        if !self.count.is_finite() {
            return Err(AppError::Validation(format!(
                "count for '{}' must be a finite number",
                self.name
            )));
        }
        if self.count < 0.0 {
            return Err(AppError::Validation(format!(
                "count for '{}' must not be negative (got {})",
                self.name, self.count
            )));
        }
        let status = RecordStatus::parse(&self.status)?;

        Ok(RecordFields {
            name: self.name.clone(),
            collected_at: self.collected_at.clone(),
            count: self.count,
            status,
            upload_status: self.upload_status.clone(),
        })
    }
}

impl From<Record> for RecordDraft {
    fn from(record: Record) -> Self {
        Self {
            id: Some(record.id),
            name: record.name,
            collected_at: Some(record.collected_at),
            count: record.count,
            status: record.status.as_str().to_string(),
            upload_status: record.upload_status,
        }
    }
}

pub fn parse_count(raw: &str) -> AppResult<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("count is empty".to_string()));
    }
    trimmed
        .parse::<f64>()
        .map_err(|_| AppError::Validation(format!("count '{}' is not a number", raw)))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CountRepr {
    Number(f64),
    Text(String),
}

fn deserialize_count<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match CountRepr::deserialize(deserializer)? {
        CountRepr::Number(value) => Ok(value),
        CountRepr::Text(raw) => parse_count(&raw).map_err(serde::de::Error::custom),
    }
}

/// Parses a client snapshot (a JSON array of drafts).
pub fn parse_snapshot(raw: &str) -> AppResult<Vec<RecordDraft>> {
    serde_json::from_str::<Vec<RecordDraft>>(raw)
        .map_err(|error| AppError::Validation(format!("malformed snapshot: {}", error)))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileSummary {
    pub inserted: Vec<i64>,
    pub updated: Vec<i64>,
    pub deleted: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSettings {
    pub page_size: usize,
    pub default_status: RecordStatus,
    pub default_upload_status: String,
    pub timestamp_format: String,
    pub seed_sample_data: bool,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            page_size: 10,
            default_status: RecordStatus::InProgress,
            default_upload_status: String::new(),
            timestamp_format: "%Y-%m-%d %H:%M".to_string(),
            seed_sample_data: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_count: f64,
    pub completed_projects: usize,
    pub in_progress_projects: usize,
    pub paused_projects: usize,
    pub average_count: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartBar {
    pub name: String,
    pub count: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSeries {
    pub status: RecordStatus,
    pub label: String,
    pub bars: Vec<ChartBar>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BarChart {
    pub series: Vec<StatusSeries>,
    pub average: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TablePage {
    pub page: usize,
    pub page_size: usize,
    pub page_count: usize,
    pub total_rows: usize,
    pub rows: Vec<Record>,
}

#[cfg(test)]
mod tests {
    use super::{parse_snapshot, RecordDraft, RecordStatus};

    #[test]
    fn status_parses_wire_names_and_labels() {
        assert_eq!(RecordStatus::parse("completed").expect("wire"), RecordStatus::Completed);
        assert_eq!(RecordStatus::parse("已暂停").expect("label"), RecordStatus::Paused);
        assert!(RecordStatus::parse("unknown").expect_err("unknown").is_validation());
    }

    #[test]
    fn snapshot_accepts_numeric_strings_and_rejects_text_counts() {
        let drafts = parse_snapshot(
            r#"[{"name":"A","count":"12.5","status":"paused"},{"id":3,"name":"B","count":4,"status":"completed"}]"#,
        )
        .expect("snapshot");
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].count, 12.5);
        assert_eq!(drafts[0].id, None);
        assert_eq!(drafts[1].id, Some(3));

        let error = parse_snapshot(r#"[{"name":"A","count":"many","status":"paused"}]"#)
            .expect_err("text count");
        assert!(error.is_validation());

        let error = parse_snapshot(r#"[{"name":"A","count":null,"status":"paused"}]"#)
            .expect_err("null count");
        assert!(error.is_validation());

        let error = parse_snapshot(r#"[{"name":"X","status":"paused"}]"#).expect_err("missing count");
        assert!(error.is_validation());
    }

    #[test]
    fn validation_rejects_negative_and_non_finite_counts() {
        let mut draft = RecordDraft::new("X", -5.0, RecordStatus::InProgress);
        assert!(draft.validate().expect_err("negative").is_validation());

        draft.count = f64::NAN;
        assert!(draft.validate().expect_err("nan").is_validation());

        draft.count = 0.0;
        draft.id = Some(0);
        assert!(draft.validate().expect_err("malformed id").is_validation());
    }

    #[test]
    fn collected_at_is_kept_verbatim() {
        let mut draft = RecordDraft::new("X", 1.0, RecordStatus::Completed);
        draft.collected_at = Some("   ".to_string());
        let fields = draft.validate().expect("valid");
        assert!(fields.collected_at_for_insert().is_none());
        assert_eq!(fields.collected_at_for_update().expect("present"), "   ");
        assert_eq!(fields.status, RecordStatus::Completed);

        draft.collected_at = Some(" 2025.04.23- ".to_string());
        let fields = draft.validate().expect("valid");
        assert_eq!(fields.collected_at_for_insert(), Some(" 2025.04.23- "));

        draft.collected_at = None;
        let fields = draft.validate().expect("valid");
        assert!(fields.collected_at_for_update().expect_err("absent").is_validation());
    }
}
