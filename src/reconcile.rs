use crate::db::{delete_row, existing_ids, insert_row, update_row, Database};
use crate::errors::{AppError, AppResult};
use crate::models::{RecordDraft, RecordFields, ReconcileSummary};
use rusqlite::Connection;
use std::collections::BTreeSet;

/// What a snapshot means for the stored table. Building it validates every
/// submitted row, so applying it can only fail on storage errors.
#[derive(Debug, Default)]
pub(crate) struct ReconcilePlan {
    inserts: Vec<RecordFields>,
    updates: Vec<(i64, RecordFields)>,
    deletes: Vec<i64>,
}

impl ReconcilePlan {
    pub(crate) fn build(existing_ids: &BTreeSet<i64>, client_rows: &[RecordDraft]) -> AppResult<Self> {
        let mut plan = Self::default();
        let mut submitted_ids = BTreeSet::new();

        for (index, draft) in client_rows.iter().enumerate() {
            let fields = draft.validate().map_err(|error| with_row(index, error))?;
            match draft.id {
                Some(id) => {
                    if !submitted_ids.insert(id) {
                        return Err(AppError::Validation(format!(
                            "row {}: duplicate id {} in submitted rows",
                            index + 1,
                            id
                        )));
                    }
                    if existing_ids.contains(&id) {
                        fields.collected_at_for_update().map_err(|error| with_row(index, error))?;
                        plan.updates.push((id, fields));
                    } else {
                        plan.inserts.push(fields);
                    }
                }
                None => plan.inserts.push(fields),
            }
        }

        plan.deletes = existing_ids.difference(&submitted_ids).copied().collect();
        Ok(plan)
    }

    /// Inserts, then updates, then deletes.
    fn apply(self, conn: &Connection) -> AppResult<ReconcileSummary> {
        let mut summary = ReconcileSummary::default();

        for fields in &self.inserts {
            summary.inserted.push(insert_row(conn, fields)?);
        }
        for (id, fields) in &self.updates {
            if update_row(conn, *id, fields)? == 0 {
                return Err(AppError::NotFound(format!("No record with id {}", id)));
            }
            summary.updated.push(*id);
        }
        for id in self.deletes {
            delete_row(conn, id)?;
            summary.deleted.push(id);
        }

        Ok(summary)
    }
}

/// Makes the store match `client_rows` in one transaction. Nothing is
/// written unless every row is valid.
pub fn reconcile(db: &Database, client_rows: &[RecordDraft]) -> AppResult<ReconcileSummary> {
    let mut conn = db.connection()?;
    let tx = conn.transaction()?;

    let existing = existing_ids(&tx)?;
    let plan = match ReconcilePlan::build(&existing, client_rows) {
        Ok(plan) => plan,
        Err(error) => {
            tracing::warn!(error = %error, rows = client_rows.len(), "rejected submitted snapshot");
            return Err(error);
        }
    };

    let summary = plan.apply(&tx)?;
    tx.commit()?;

    tracing::info!(
        inserted = summary.inserted.len(),
        updated = summary.updated.len(),
        deleted = summary.deleted.len(),
        "reconciled submitted snapshot"
    );
    Ok(summary)
}

fn with_row(index: usize, error: AppError) -> AppError {
    match error {
        AppError::Validation(message) => AppError::Validation(format!("row {}: {}", index + 1, message)),
        other => other,
    }
}
