//! Nested merge writer for `marks[identity][period][subject]`.
//!
//! One student document is the unit of atomicity: a rejected write for one
//! student is reported and the rest of the batch still lands.

use crate::error::{CoreError, CoreResult};
use crate::model::{MarkKey, Outcome, ResolvedUpdate, ATTENDANCE, MARKS};
use crate::store::{get_path, DocumentStore, FieldPath};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentWriteFailure {
    pub identity: String,
    pub key_count: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplySummary {
    pub success_count: usize,
    pub failures: Vec<StudentWriteFailure>,
    /// Keys that were committed, with the values written.
    #[serde(skip)]
    pub written: Vec<ResolvedUpdate>,
}

/// Groups updates per student; a later update for the same key replaces an earlier
/// one within the batch.
fn group_by_student(updates: &[ResolvedUpdate]) -> BTreeMap<String, BTreeMap<MarkKey, &ResolvedUpdate>> {
    let mut groups: BTreeMap<String, BTreeMap<MarkKey, &ResolvedUpdate>> = BTreeMap::new();
    for u in updates {
        groups
            .entry(u.key.identity.clone())
            .or_default()
            .insert(u.key.clone(), u);
    }
    groups
}

pub fn apply_updates(store: &dyn DocumentStore, updates: &[ResolvedUpdate]) -> ApplySummary {
    let mut summary = ApplySummary::default();

    for (identity, group) in group_by_student(updates) {
        let mut paths: Vec<(FieldPath, Value)> = Vec::with_capacity(group.len());
        let mut encode_err = None;
        for (key, u) in &group {
            match serde_json::to_value(&u.entry) {
                Ok(v) => paths.push((key.path(), v)),
                Err(e) => {
                    encode_err = Some(CoreError::from(e));
                    break;
                }
            }
        }

        let res = match encode_err {
            Some(e) => Err(e),
            None => store.merge_or_create(MARKS, &identity, &paths),
        };
        match res {
            Ok(()) => {
                summary.success_count += group.len();
                summary.written.extend(group.values().map(|u| (*u).clone()));
            }
            Err(e) => {
                log::warn!(
                    "marks write rejected for student {} ({} keys): {}",
                    identity,
                    group.len(),
                    e.code()
                );
                summary.failures.push(StudentWriteFailure {
                    identity,
                    key_count: group.len(),
                    message: e.to_string(),
                });
            }
        }
    }

    summary
}

/// Manual single-record entry. Refuses graded marks for a student recorded absent
/// on the entry date.
pub fn apply_one(store: &dyn DocumentStore, update: &ResolvedUpdate) -> CoreResult<()> {
    if update.entry.outcome != Outcome::Absent && !update.entry.date.is_empty() {
        let absent = store
            .get_document(ATTENDANCE, &update.entry.date)?
            .as_ref()
            .and_then(|doc| get_path(doc, &[update.key.identity.clone(), "present".to_string()]))
            .and_then(Value::as_bool)
            == Some(false);
        if absent {
            return Err(CoreError::StudentAbsent {
                identity: update.key.identity.clone(),
                date: update.entry.date.clone(),
            });
        }
    }
    store.merge_or_create(
        MARKS,
        &update.key.identity,
        &[(update.key.path(), serde_json::to_value(&update.entry)?)],
    )
}
