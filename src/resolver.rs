//! Row resolution: spreadsheet row -> validated mark update.
//!
//! # Contract
//! - Student lookup walks an ordered matcher chain; the first match wins.
//! - A row never aborts the batch; failures carry the sheet line and a reason.
//! - An explicit outcome on the row always beats the derived pass/fail.

use crate::config::CoreConfig;
use crate::model::{ExamSchedule, MarkEntry, MarkKey, Outcome, ResolvedUpdate, Student};
use crate::rows::{Field, RawRow};
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RowFailureKind {
    StudentNotFound,
    MissingSubject,
    MissingMarks,
    MarksExceedTotal,
}

impl RowFailureKind {
    fn default_reason(self) -> &'static str {
        match self {
            RowFailureKind::StudentNotFound => "Student not found (check Class/Roll No)",
            RowFailureKind::MissingSubject => "Missing Subject",
            RowFailureKind::MissingMarks => "Missing Marks",
            RowFailureKind::MarksExceedTotal => "Marks exceed total",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowFailure {
    pub row_index: usize,
    pub kind: RowFailureKind,
    pub reason: String,
    pub name: String,
    pub class: String,
}

impl RowFailure {
    fn new(row: &RawRow, kind: RowFailureKind, reason: Option<String>) -> Self {
        Self {
            row_index: row.line_number(),
            kind,
            reason: reason.unwrap_or_else(|| kind.default_reason().to_string()),
            name: row.get_field(Field::Name).unwrap_or("Unknown").to_string(),
            class: row.get_field(Field::Class).unwrap_or("Unknown").to_string(),
        }
    }
}

pub enum MatchOutcome<'s> {
    /// The matcher has nothing to say about this row; try the next one.
    Skip,
    Found(&'s Student),
    /// Stop the chain and fail the row.
    Reject(String),
}

pub trait StudentMatcher {
    fn name(&self) -> &'static str;
    fn find<'s>(&self, row: &RawRow, students: &'s [Student]) -> MatchOutcome<'s>;
}

/// An explicit identity must exist; there is no fallback past it.
pub struct IdentityMatcher;

impl StudentMatcher for IdentityMatcher {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn find<'s>(&self, row: &RawRow, students: &'s [Student]) -> MatchOutcome<'s> {
        let Some(identity) = row.get_field(Field::Identity) else {
            return MatchOutcome::Skip;
        };
        match students.iter().find(|s| s.identity == identity) {
            Some(s) => MatchOutcome::Found(s),
            None => MatchOutcome::Reject(format!("Student not found: {}", identity)),
        }
    }
}

pub struct ClassRollMatcher;

impl StudentMatcher for ClassRollMatcher {
    fn name(&self) -> &'static str {
        "class+rollNo"
    }

    fn find<'s>(&self, row: &RawRow, students: &'s [Student]) -> MatchOutcome<'s> {
        let (Some(class), Some(roll)) = (row.get_field(Field::Class), row.get_field(Field::RollNo))
        else {
            return MatchOutcome::Skip;
        };
        let class = class.to_lowercase();
        let roll = roll.to_lowercase();
        students
            .iter()
            .find(|s| {
                s.class_label.trim().to_lowercase() == class
                    && s.roll_no.trim().to_lowercase() == roll
            })
            .map(MatchOutcome::Found)
            .unwrap_or(MatchOutcome::Skip)
    }
}

/// Substring containment either way within the class. Ambiguous rows take the
/// first student in roster order. Students without a name never match.
pub struct ClassNameMatcher;

impl StudentMatcher for ClassNameMatcher {
    fn name(&self) -> &'static str {
        "class+name"
    }

    fn find<'s>(&self, row: &RawRow, students: &'s [Student]) -> MatchOutcome<'s> {
        let (Some(class), Some(name)) = (row.get_field(Field::Class), row.get_field(Field::Name))
        else {
            return MatchOutcome::Skip;
        };
        let class = class.to_lowercase();
        let name = name.to_lowercase();
        students
            .iter()
            .find(|s| {
                if s.class_label.trim().to_lowercase() != class {
                    return false;
                }
                let full = s.full_name().to_lowercase();
                !full.is_empty() && (full.contains(&name) || name.contains(&full))
            })
            .map(MatchOutcome::Found)
            .unwrap_or(MatchOutcome::Skip)
    }
}

/// Per-batch inputs shared by every row.
pub struct ResolveContext<'a> {
    pub students: &'a [Student],
    pub schedule: Option<&'a ExamSchedule>,
    /// Period forced by the caller for the whole batch.
    pub period: Option<&'a str>,
    pub today: NaiveDate,
    pub config: CoreConfig,
}

pub struct Resolver {
    matchers: Vec<Box<dyn StudentMatcher>>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(vec![
            Box::new(IdentityMatcher),
            Box::new(ClassRollMatcher),
            Box::new(ClassNameMatcher),
        ])
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchResolution {
    pub updates: Vec<ResolvedUpdate>,
    pub failures: Vec<RowFailure>,
}

pub fn is_valid_period(p: &str) -> bool {
    p.len() == 7 && NaiveDate::parse_from_str(&format!("{}-01", p), "%Y-%m-%d").is_ok()
}

pub fn period_of(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

impl Resolver {
    pub fn new(matchers: Vec<Box<dyn StudentMatcher>>) -> Self {
        Self { matchers }
    }

    pub fn find_student<'s>(
        &self,
        row: &RawRow,
        students: &'s [Student],
    ) -> Result<&'s Student, RowFailure> {
        for m in &self.matchers {
            match m.find(row, students) {
                MatchOutcome::Skip => continue,
                MatchOutcome::Found(s) => {
                    log::debug!("row {} matched by {}", row.line_number(), m.name());
                    return Ok(s);
                }
                MatchOutcome::Reject(reason) => {
                    return Err(RowFailure::new(
                        row,
                        RowFailureKind::StudentNotFound,
                        Some(reason),
                    ))
                }
            }
        }
        Err(RowFailure::new(row, RowFailureKind::StudentNotFound, None))
    }

    pub fn resolve_row(
        &self,
        row: &RawRow,
        ctx: &ResolveContext<'_>,
    ) -> Result<ResolvedUpdate, RowFailure> {
        let student = self.find_student(row, ctx.students)?;

        let Some(subject) = row.get_field(Field::Subject) else {
            return Err(RowFailure::new(row, RowFailureKind::MissingSubject, None));
        };
        let marks = match row.get_field(Field::Marks) {
            None => return Err(RowFailure::new(row, RowFailureKind::MissingMarks, None)),
            Some(raw) => match parse_number(raw) {
                Some(v) if v >= 0.0 => v,
                _ => {
                    return Err(RowFailure::new(
                        row,
                        RowFailureKind::MissingMarks,
                        Some(format!("Marks must be a non-negative number, got '{}'", raw)),
                    ))
                }
            },
        };

        let total = row
            .get_field(Field::TotalMarks)
            .and_then(parse_number)
            .filter(|t| *t > 0.0)
            .or_else(|| ctx.schedule.map(|s| s.total_marks).filter(|t| *t > 0.0))
            .unwrap_or(ctx.config.default_total_marks);

        let explicit = row.get_field(Field::Outcome).and_then(Outcome::parse);
        if explicit != Some(Outcome::Absent) && marks > total {
            return Err(RowFailure::new(
                row,
                RowFailureKind::MarksExceedTotal,
                Some(format!("Marks {} exceed total {}", marks, total)),
            ));
        }
        let outcome = explicit.unwrap_or(if marks >= ctx.config.pass_threshold(total) {
            Outcome::Pass
        } else {
            Outcome::Fail
        });

        let date = self.row_date(row, subject, ctx);
        let period = ctx
            .period
            .map(str::to_string)
            .or_else(|| {
                row.get_field(Field::Period)
                    .filter(|p| is_valid_period(p))
                    .map(str::to_string)
            })
            .unwrap_or_else(|| period_of(date));

        Ok(ResolvedUpdate {
            key: MarkKey {
                identity: student.identity.clone(),
                period,
                subject: subject.to_string(),
            },
            entry: MarkEntry {
                marks_obtained: marks,
                total_marks: total,
                outcome,
                remarks: row.get_field(Field::Remarks).unwrap_or("").to_string(),
                date: date.format("%Y-%m-%d").to_string(),
            },
        })
    }

    /// Row date, else the schedule's date for this subject, else today.
    fn row_date(&self, row: &RawRow, subject: &str, ctx: &ResolveContext<'_>) -> NaiveDate {
        row.get_field(Field::Date)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .or_else(|| {
                ctx.schedule
                    .and_then(|s| s.subjects.iter().find(|x| x.subject == subject))
                    .and_then(|x| NaiveDate::parse_from_str(&x.date, "%Y-%m-%d").ok())
            })
            .unwrap_or(ctx.today)
    }

    pub fn resolve_batch(&self, rows: &[RawRow], ctx: &ResolveContext<'_>) -> BatchResolution {
        let mut out = BatchResolution::default();
        for row in rows {
            match self.resolve_row(row, ctx) {
                Ok(u) => out.updates.push(u),
                Err(f) => out.failures.push(f),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScheduledSubject;

    fn student(identity: &str, first: &str, last: &str, class: &str, roll: &str) -> Student {
        Student {
            identity: identity.into(),
            first_name: first.into(),
            last_name: last.into(),
            class_label: class.into(),
            roll_no: roll.into(),
            parent_name: String::new(),
            phone: String::new(),
            email: String::new(),
        }
    }

    fn roster() -> Vec<Student> {
        vec![
            student("2025-001", "John", "Smith", "5A", "12"),
            student("2025-002", "Johnny", "Doe", "5A", "13"),
            student("2025-003", "Asha", "Rao", "5B", "12"),
        ]
    }

    fn ctx<'a>(students: &'a [Student], schedule: Option<&'a ExamSchedule>) -> ResolveContext<'a> {
        ResolveContext {
            students,
            schedule,
            period: None,
            today: NaiveDate::from_ymd_opt(2025, 3, 14).expect("date"),
            config: CoreConfig::default(),
        }
    }

    #[test]
    fn class_and_roll_resolves_with_derived_pass() {
        let students = roster();
        let row = RawRow::new(0)
            .with(Field::Class, "5A")
            .with(Field::RollNo, "12")
            .with(Field::Subject, "Mathematics")
            .with(Field::Marks, "42");
        let u = Resolver::default()
            .resolve_row(&row, &ctx(&students, None))
            .expect("resolved");
        assert_eq!(u.key.identity, "2025-001");
        assert_eq!(u.key.period, "2025-03");
        assert_eq!(u.entry.total_marks, 100.0);
        assert_eq!(u.entry.outcome, Outcome::Pass);
    }

    #[test]
    fn threshold_is_inclusive_and_rounds_up() {
        let students = roster();
        let resolver = Resolver::default();
        let mk = |marks: &str| {
            RawRow::new(0)
                .with(Field::Identity, "2025-001")
                .with(Field::Subject, "Art")
                .with(Field::Marks, marks)
                .with(Field::TotalMarks, "50")
        };
        let c = ctx(&students, None);
        assert_eq!(resolver.resolve_row(&mk("18"), &c).expect("ok").entry.outcome, Outcome::Pass);
        assert_eq!(resolver.resolve_row(&mk("17.5"), &c).expect("ok").entry.outcome, Outcome::Fail);
    }

    #[test]
    fn marks_over_total_are_rejected() {
        let students = roster();
        let row = RawRow::new(3)
            .with(Field::Class, "5A")
            .with(Field::Name, "john")
            .with(Field::Subject, "Science")
            .with(Field::Marks, "150");
        let f = Resolver::default()
            .resolve_row(&row, &ctx(&students, None))
            .expect_err("exceeds");
        assert_eq!(f.kind, RowFailureKind::MarksExceedTotal);
        assert_eq!(f.row_index, 5);
        assert_eq!(f.name, "john");
    }

    #[test]
    fn unknown_explicit_identity_does_not_fall_back() {
        let students = roster();
        let row = RawRow::new(0)
            .with(Field::Identity, "2025-999")
            .with(Field::Class, "5A")
            .with(Field::RollNo, "12")
            .with(Field::Subject, "Maths")
            .with(Field::Marks, "10");
        let f = Resolver::default()
            .resolve_row(&row, &ctx(&students, None))
            .expect_err("not found");
        assert_eq!(f.kind, RowFailureKind::StudentNotFound);
    }

    #[test]
    fn roll_miss_falls_through_to_name_and_first_match_wins() {
        let students = roster();
        let row = RawRow::new(0)
            .with(Field::Class, "5a")
            .with(Field::RollNo, "99")
            .with(Field::Name, "JOHN")
            .with(Field::Subject, "Maths")
            .with(Field::Marks, "10");
        let u = Resolver::default()
            .resolve_row(&row, &ctx(&students, None))
            .expect("resolved");
        assert_eq!(u.key.identity, "2025-001");
        assert_eq!(u.entry.outcome, Outcome::Fail);
    }

    #[test]
    fn nameless_student_does_not_swallow_name_rows() {
        let mut students = roster();
        students.insert(0, student("2025-004", "", "", "5A", "40"));
        let row = RawRow::new(0)
            .with(Field::Class, "5A")
            .with(Field::Name, "Johnny Doe")
            .with(Field::Subject, "Maths")
            .with(Field::Marks, "10");
        let u = Resolver::default()
            .resolve_row(&row, &ctx(&students, None))
            .expect("resolved");
        assert_eq!(u.key.identity, "2025-002");
    }

    #[test]
    fn name_match_is_scoped_to_class() {
        let students = roster();
        let row = RawRow::new(0)
            .with(Field::Class, "5B")
            .with(Field::Name, "john smith")
            .with(Field::Subject, "Maths")
            .with(Field::Marks, "10");
        let f = Resolver::default()
            .resolve_row(&row, &ctx(&students, None))
            .expect_err("other class");
        assert_eq!(f.kind, RowFailureKind::StudentNotFound);
    }

    #[test]
    fn explicit_outcome_wins_and_absent_skips_total_check() {
        let students = roster();
        let resolver = Resolver::default();
        let c = ctx(&students, None);
        let fail = RawRow::new(0)
            .with(Field::Identity, "2025-002")
            .with(Field::Subject, "Maths")
            .with(Field::Marks, "90")
            .with(Field::Outcome, "fail");
        assert_eq!(resolver.resolve_row(&fail, &c).expect("ok").entry.outcome, Outcome::Fail);

        let absent = RawRow::new(0)
            .with(Field::Identity, "2025-002")
            .with(Field::Subject, "Maths")
            .with(Field::Marks, "0")
            .with(Field::Outcome, "Absent");
        assert_eq!(
            resolver.resolve_row(&absent, &c).expect("ok").entry.outcome,
            Outcome::Absent
        );
    }

    #[test]
    fn missing_fields_report_in_order() {
        let students = roster();
        let resolver = Resolver::default();
        let c = ctx(&students, None);
        let no_subject = RawRow::new(0).with(Field::Identity, "2025-001").with(Field::Marks, "1");
        assert_eq!(
            resolver.resolve_row(&no_subject, &c).expect_err("subject").kind,
            RowFailureKind::MissingSubject
        );
        let bad_marks = RawRow::new(0)
            .with(Field::Identity, "2025-001")
            .with(Field::Subject, "Maths")
            .with(Field::Marks, "abc");
        assert_eq!(
            resolver.resolve_row(&bad_marks, &c).expect_err("marks").kind,
            RowFailureKind::MissingMarks
        );
    }

    #[test]
    fn schedule_supplies_total_and_subject_date() {
        let students = roster();
        let schedule = ExamSchedule {
            id: "s1".into(),
            name: "Unit Test 1".into(),
            start_date: "2025-02-10".into(),
            end_date: "2025-02-14".into(),
            total_marks: 25.0,
            classes: vec!["5A".into()],
            subjects: vec![ScheduledSubject {
                date: "2025-02-11".into(),
                subject: "Maths".into(),
            }],
        };
        let row = RawRow::new(0)
            .with(Field::Identity, "2025-001")
            .with(Field::Subject, "Maths")
            .with(Field::Marks, "30");
        let f = Resolver::default()
            .resolve_row(&row, &ctx(&students, Some(&schedule)))
            .expect_err("30 > 25");
        assert_eq!(f.kind, RowFailureKind::MarksExceedTotal);

        let ok_row = RawRow::new(0)
            .with(Field::Identity, "2025-001")
            .with(Field::Subject, "Maths")
            .with(Field::Marks, "9");
        let u = Resolver::default()
            .resolve_row(&ok_row, &ctx(&students, Some(&schedule)))
            .expect("ok");
        assert_eq!(u.entry.date, "2025-02-11");
        assert_eq!(u.key.period, "2025-02");
        assert_eq!(u.entry.outcome, Outcome::Pass);
    }

    #[test]
    fn custom_chain_can_replace_fuzzy_matching() {
        let students = roster();
        let strict = Resolver::new(vec![Box::new(IdentityMatcher), Box::new(ClassRollMatcher)]);
        let row = RawRow::new(0)
            .with(Field::Class, "5A")
            .with(Field::Name, "john")
            .with(Field::Subject, "Maths")
            .with(Field::Marks, "10");
        assert!(strict.resolve_row(&row, &ctx(&students, None)).is_err());
    }
}
