//! Single-slot import history.
//!
//! Only the most recent bulk import can be undone. Undo removes a field only while
//! it still holds the value the import wrote; a field overwritten since then is
//! left alone and counted as skipped.

use crate::error::CoreResult;
use crate::model::{MarkEntry, MarkKey, ResolvedUpdate, MARKS};
use crate::store::{get_path, DocumentStore, FieldPath};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSession {
    pub touched_keys: Vec<MarkKey>,
    #[serde(skip)]
    written: BTreeMap<MarkKey, MarkEntry>,
    pub recorded_at: String,
}

impl ImportSession {
    pub fn from_written(written: &[ResolvedUpdate]) -> Self {
        let written: BTreeMap<MarkKey, MarkEntry> = written
            .iter()
            .map(|u| (u.key.clone(), u.entry.clone()))
            .collect();
        Self {
            touched_keys: written.keys().cloned().collect(),
            written,
            recorded_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoSummary {
    pub reverted_count: usize,
    /// Keys whose value changed after the import and were kept.
    pub skipped_count: usize,
}

#[derive(Debug, Default)]
pub struct SessionSlot {
    last: Option<ImportSession>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces whatever was recorded before.
    pub fn record_session(&mut self, session: ImportSession) {
        log::info!(
            "import session recorded: {} keys",
            session.touched_keys.len()
        );
        self.last = Some(session);
    }

    pub fn current(&self) -> Option<&ImportSession> {
        self.last.as_ref()
    }

    /// Reverts the recorded session and empties the slot. A store error leaves the
    /// session in place so the undo can be retried.
    pub fn undo_last_session(&mut self, store: &dyn DocumentStore) -> CoreResult<UndoSummary> {
        let Some(session) = self.last.as_ref() else {
            return Ok(UndoSummary::default());
        };

        let mut by_student: BTreeMap<&str, Vec<&MarkKey>> = BTreeMap::new();
        for key in &session.touched_keys {
            by_student.entry(key.identity.as_str()).or_default().push(key);
        }

        let mut summary = UndoSummary::default();
        for (identity, keys) in by_student {
            let doc = store.get_document(MARKS, identity)?;
            let mut paths: Vec<FieldPath> = Vec::with_capacity(keys.len());
            for key in keys {
                let current = doc
                    .as_ref()
                    .and_then(|d| get_path(d, &key.path()))
                    .and_then(|v| serde_json::from_value::<MarkEntry>(v.clone()).ok());
                match current {
                    Some(ref entry) if Some(entry) == session.written.get(key) => {
                        paths.push(key.path())
                    }
                    Some(_) => summary.skipped_count += 1,
                    None => {}
                }
            }
            if !paths.is_empty() {
                summary.reverted_count += store.delete_fields(MARKS, identity, &paths)?;
            }
        }

        self.last = None;
        log::info!(
            "import session undone: reverted={} skipped={}",
            summary.reverted_count,
            summary.skipped_count
        );
        Ok(summary)
    }
}
