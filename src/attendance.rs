use crate::error::{CoreError, CoreResult};
use crate::model::{AttendanceEntry, AttendancePatch, ATTENDANCE};
use crate::store::{get_path, DocumentStore};
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttendanceState {
    Present,
    AbsentNoIntimation,
    AbsentWithIntimation,
}

impl AttendanceEntry {
    pub fn state(&self) -> AttendanceState {
        match (self.present, self.intimation) {
            (true, _) => AttendanceState::Present,
            (false, false) => AttendanceState::AbsentNoIntimation,
            (false, true) => AttendanceState::AbsentWithIntimation,
        }
    }

    /// A present student carries no intimation details.
    fn reconcile(mut self) -> Self {
        if self.present {
            self.intimation = false;
            self.intimated_by.clear();
            self.reason.clear();
        }
        self
    }
}

/// Day documents are keyed by the zero-padded `YYYY-MM-DD` form; `2025-3-4` and
/// `2025-03-04` address the same day.
pub fn canonical_date(date: &str) -> CoreResult<String> {
    NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| CoreError::validation(format!("date must be YYYY-MM-DD, got '{}'", date)))
}

pub fn get_attendance(
    store: &dyn DocumentStore,
    date: &str,
    identity: &str,
) -> CoreResult<Option<AttendanceEntry>> {
    let date = canonical_date(date)?;
    let doc = store.get_document(ATTENDANCE, &date)?;
    let Some(raw) = doc.as_ref().and_then(|d| get_path(d, &[identity.to_string()])) else {
        return Ok(None);
    };
    Ok(Some(serde_json::from_value(raw.clone())?))
}

/// Applies `patch` over the stored (or default) entry, enforces the present
/// invariant, persists and returns what was stored.
pub fn set_attendance(
    store: &dyn DocumentStore,
    date: &str,
    identity: &str,
    patch: &AttendancePatch,
) -> CoreResult<AttendanceEntry> {
    let date = canonical_date(date)?;
    if identity.trim().is_empty() {
        return Err(CoreError::validation("missing identity"));
    }

    let mut entry = get_attendance(store, &date, identity)?.unwrap_or_default();
    if let Some(p) = patch.present {
        entry.present = p;
    }
    if let Some(i) = patch.intimation {
        entry.intimation = i;
    }
    if let Some(by) = &patch.intimated_by {
        entry.intimated_by = by.clone();
    }
    if let Some(r) = &patch.reason {
        entry.reason = r.clone();
    }
    let entry = entry.reconcile();

    store.merge_or_create(
        ATTENDANCE,
        &date,
        &[(vec![identity.to_string()], serde_json::to_value(&entry)?)],
    )?;
    log::debug!("attendance {} -> {:?}", date, entry.state());
    Ok(entry)
}

/// Marks many students for one day, each through `set_attendance`.
pub fn set_attendance_for_class(
    store: &dyn DocumentStore,
    date: &str,
    identities: &[String],
    present: bool,
) -> CoreResult<Vec<(String, AttendanceEntry)>> {
    let patch = AttendancePatch {
        present: Some(present),
        ..AttendancePatch::default()
    };
    identities
        .iter()
        .map(|id| set_attendance(store, date, id, &patch).map(|e| (id.clone(), e)))
        .collect()
}
