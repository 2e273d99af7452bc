//! Per-student read model: attendance statistics, marks listing, recent absences
//! and outpass history.

use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::model::{MarkEntry, OutpassRequest, Student};
use crate::outpass::list_outpasses;
use crate::store::{DocumentStore, Snapshot};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// One `YYYY-MM` period.
    Month(String),
    All,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayRecord {
    pub date: String,
    pub present: bool,
    pub intimation: bool,
    pub intimated_by: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthStats {
    pub month: String,
    pub total: usize,
    pub present: usize,
    pub absent: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub total_days: usize,
    pub present_days: usize,
    pub absent_days: usize,
    pub absent_with_intimation: usize,
    /// Rounded percentage of recorded days present; 0 with no records.
    pub percentage: u32,
    /// Day-by-day records, oldest first; filled for a single month.
    pub daily: Vec<DayRecord>,
    /// Per-month totals, newest first; filled for the all-time view.
    pub monthly: Vec<MonthStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkRow {
    pub period: String,
    pub subject: String,
    #[serde(flatten)]
    pub entry: MarkEntry,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentOverview {
    pub student: Student,
    pub attendance: AttendanceSummary,
    pub marks: Vec<MarkRow>,
    pub recent_absences: Vec<DayRecord>,
    pub outpasses: Vec<OutpassRequest>,
}

fn in_scope(date_or_period: &str, scope: &Scope) -> bool {
    match scope {
        Scope::Month(m) => date_or_period.starts_with(m.as_str()),
        Scope::All => true,
    }
}

pub fn attendance_summary(snapshot: &Snapshot, identity: &str, scope: &Scope) -> AttendanceSummary {
    let mut out = AttendanceSummary::default();
    let mut months: BTreeMap<String, MonthStats> = BTreeMap::new();

    for (date, day) in &snapshot.attendance {
        if !in_scope(date, scope) {
            continue;
        }
        let Some(entry) = day.get(identity) else {
            continue;
        };
        out.total_days += 1;
        let month = months.entry(date.chars().take(7).collect()).or_default();
        month.total += 1;
        if entry.present {
            out.present_days += 1;
            month.present += 1;
        } else {
            out.absent_days += 1;
            month.absent += 1;
            if entry.intimation {
                out.absent_with_intimation += 1;
            }
        }
        if matches!(scope, Scope::Month(_)) {
            out.daily.push(DayRecord {
                date: date.clone(),
                present: entry.present,
                intimation: entry.intimation,
                intimated_by: entry.intimated_by.clone(),
                reason: entry.reason.clone(),
            });
        }
    }

    if out.total_days > 0 {
        out.percentage = ((out.present_days as f64 / out.total_days as f64) * 100.0).round() as u32;
    }
    if scope == &Scope::All {
        out.monthly = months
            .into_iter()
            .rev()
            .map(|(month, mut stats)| {
                stats.month = month;
                stats
            })
            .collect();
    }
    out
}

/// Marks in scope; the all-time listing is newest period first.
pub fn marks_listing(snapshot: &Snapshot, identity: &str, scope: &Scope) -> Vec<MarkRow> {
    let Some(periods) = snapshot.marks.get(identity) else {
        return Vec::new();
    };
    periods
        .iter()
        .rev()
        .filter(|(period, _)| in_scope(period, scope))
        .flat_map(|(period, subjects)| {
            subjects.iter().map(move |(subject, entry)| MarkRow {
                period: period.clone(),
                subject: subject.clone(),
                entry: entry.clone(),
            })
        })
        .collect()
}

pub fn recent_absences(snapshot: &Snapshot, identity: &str, limit: usize) -> Vec<DayRecord> {
    snapshot
        .attendance
        .iter()
        .rev()
        .filter_map(|(date, day)| {
            day.get(identity).filter(|e| !e.present).map(|e| DayRecord {
                date: date.clone(),
                present: false,
                intimation: e.intimation,
                intimated_by: e.intimated_by.clone(),
                reason: e.reason.clone(),
            })
        })
        .take(limit)
        .collect()
}

pub fn student_overview(
    store: &dyn DocumentStore,
    identity: &str,
    scope: &Scope,
    config: &CoreConfig,
) -> CoreResult<StudentOverview> {
    let snapshot = Snapshot::load(store)?;
    let student = snapshot
        .student(identity)
        .cloned()
        .ok_or_else(|| CoreError::NotFound(format!("student {}", identity)))?;
    Ok(StudentOverview {
        attendance: attendance_summary(&snapshot, identity, scope),
        marks: marks_listing(&snapshot, identity, scope),
        recent_absences: recent_absences(&snapshot, identity, config.recent_absence_limit),
        outpasses: list_outpasses(store, Some(identity))?,
        student,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttendanceEntry, Outcome};

    fn entry(present: bool, intimation: bool) -> AttendanceEntry {
        AttendanceEntry {
            present,
            intimation,
            intimated_by: if intimation { "Mother".into() } else { String::new() },
            reason: String::new(),
        }
    }

    fn snapshot() -> Snapshot {
        let mut snap = Snapshot::default();
        let days = [
            ("2025-02-27", false, true),
            ("2025-03-03", true, false),
            ("2025-03-04", false, false),
            ("2025-03-05", true, false),
        ];
        for (date, present, intimation) in days {
            snap.attendance
                .entry(date.to_string())
                .or_default()
                .insert("2025-001".into(), entry(present, intimation));
        }
        snap.attendance
            .entry("2025-03-06".into())
            .or_default()
            .insert("2025-002".into(), entry(false, false));

        let mark = |m: f64| MarkEntry {
            marks_obtained: m,
            total_marks: 100.0,
            outcome: Outcome::Pass,
            remarks: String::new(),
            date: String::new(),
        };
        let marks = snap.marks.entry("2025-001".into()).or_default();
        marks.entry("2025-02".into()).or_default().insert("Maths".into(), mark(40.0));
        marks.entry("2025-03".into()).or_default().insert("Maths".into(), mark(50.0));
        marks.entry("2025-03".into()).or_default().insert("Art".into(), mark(60.0));
        snap
    }

    #[test]
    fn month_view_lists_days_and_counts() {
        let s = attendance_summary(&snapshot(), "2025-001", &Scope::Month("2025-03".into()));
        assert_eq!((s.total_days, s.present_days, s.absent_days), (3, 2, 1));
        assert_eq!(s.percentage, 67);
        assert_eq!(s.daily.len(), 3);
        assert_eq!(s.daily[0].date, "2025-03-03");
        assert!(s.monthly.is_empty());
    }

    #[test]
    fn all_time_view_groups_months_newest_first() {
        let s = attendance_summary(&snapshot(), "2025-001", &Scope::All);
        assert_eq!(s.total_days, 4);
        assert_eq!(s.absent_with_intimation, 1);
        assert_eq!(s.monthly[0].month, "2025-03");
        assert_eq!(s.monthly[1].absent, 1);
        assert!(s.daily.is_empty());
    }

    #[test]
    fn marks_listing_respects_scope() {
        let snap = snapshot();
        assert_eq!(marks_listing(&snap, "2025-001", &Scope::Month("2025-03".into())).len(), 2);
        let all = marks_listing(&snap, "2025-001", &Scope::All);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].period, "2025-03");
        assert!(marks_listing(&snap, "2025-404", &Scope::All).is_empty());
    }

    #[test]
    fn recent_absences_newest_first_and_limited() {
        let snap = snapshot();
        let recent = recent_absences(&snap, "2025-001", 5);
        assert_eq!(
            recent.iter().map(|d| d.date.as_str()).collect::<Vec<_>>(),
            vec!["2025-03-04", "2025-02-27"]
        );
        assert_eq!(recent_absences(&snap, "2025-001", 1).len(), 1);
    }
}
