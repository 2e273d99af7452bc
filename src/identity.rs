use crate::error::{CoreError, CoreResult};
use crate::model::Student;

fn max_sequence(existing: &[Student], year: i32) -> u64 {
    let prefix = format!("{}-", year);
    existing
        .iter()
        .filter_map(|s| s.identity.strip_prefix(&prefix))
        .filter_map(|seq| seq.trim().parse::<u64>().ok())
        .max()
        .unwrap_or(0)
}

fn format_identity(year: i32, seq: u64) -> String {
    format!("{}-{:03}", year, seq)
}

fn exhausted(year: i32) -> CoreError {
    CoreError::validation(format!("identity sequence for {} is exhausted", year))
}

/// Next free `YYYY-SEQ` identity for `year`.
pub fn next_identity(existing: &[Student], year: i32) -> CoreResult<String> {
    let seq = max_sequence(existing, year)
        .checked_add(1)
        .ok_or_else(|| exhausted(year))?;
    Ok(format_identity(year, seq))
}

/// Consecutive identities for a bulk registration.
///
/// The range is computed from `existing` alone; identities committed by another
/// writer after this call are not taken into account.
pub fn next_identities(existing: &[Student], year: i32, count: usize) -> CoreResult<Vec<String>> {
    let base = max_sequence(existing, year);
    (1..=count as u64)
        .map(|i| {
            base.checked_add(i)
                .map(|seq| format_identity(year, seq))
                .ok_or_else(|| exhausted(year))
        })
        .collect()
}
