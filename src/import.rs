//! Marks import pipeline: normalize -> resolve -> merge -> record session.

use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::merge::{apply_one, apply_updates, StudentWriteFailure};
use crate::model::{MarkEntry, MarkKey, Outcome, ResolvedUpdate};
use crate::resolver::{is_valid_period, period_of, ResolveContext, Resolver, RowFailure};
use crate::rows::RawRow;
use crate::session::{ImportSession, SessionSlot};
use crate::store::{load_schedules, load_students, DocumentStore};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub struct ImportOptions<'a> {
    pub period: Option<&'a str>,
    pub schedule_id: Option<&'a str>,
    pub today: NaiveDate,
    pub config: CoreConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub success_count: usize,
    pub failures: Vec<RowFailure>,
    pub write_failures: Vec<StudentWriteFailure>,
}

pub fn import_marks(
    store: &dyn DocumentStore,
    slot: &mut SessionSlot,
    resolver: &Resolver,
    rows: &[RawRow],
    opts: &ImportOptions<'_>,
) -> CoreResult<ImportReport> {
    if let Some(p) = opts.period {
        if !is_valid_period(p) {
            return Err(CoreError::validation(format!("period must be YYYY-MM, got '{}'", p)));
        }
    }

    let students = load_students(store)?;
    let schedules = load_schedules(store)?;
    let schedule = match opts.schedule_id {
        Some(id) => Some(
            schedules
                .iter()
                .find(|s| s.id == id)
                .ok_or_else(|| CoreError::NotFound(format!("exam schedule {}", id)))?,
        ),
        None => None,
    };

    let ctx = ResolveContext {
        students: &students,
        schedule,
        period: opts.period,
        today: opts.today,
        config: opts.config,
    };
    let resolved = resolver.resolve_batch(rows, &ctx);
    if resolved.updates.is_empty() {
        log::warn!("marks import: no valid rows out of {}", rows.len());
        return Err(CoreError::NoValidRows {
            failures: resolved.failures,
        });
    }

    let applied = apply_updates(store, &resolved.updates);
    slot.record_session(ImportSession::from_written(&applied.written));

    log::info!(
        "marks import: rows={} written={} rowFailures={} studentFailures={}",
        rows.len(),
        applied.success_count,
        resolved.failures.len(),
        applied.failures.len()
    );
    Ok(ImportReport {
        success_count: applied.success_count,
        failures: resolved.failures,
        write_failures: applied.failures,
    })
}

/// Manual one-record entry from the single-entry form.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleMarkInput {
    pub identity: String,
    pub subject: String,
    pub marks_obtained: f64,
    #[serde(default)]
    pub total_marks: Option<f64>,
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default)]
    pub remarks: String,
    /// Exam date; the period is taken from it.
    pub date: String,
    #[serde(default)]
    pub schedule_id: Option<String>,
}

pub fn enter_single_mark(
    store: &dyn DocumentStore,
    input: &SingleMarkInput,
    config: &CoreConfig,
) -> CoreResult<ResolvedUpdate> {
    let subject = input.subject.trim();
    if subject.is_empty() {
        return Err(CoreError::validation("missing subject"));
    }
    let date = NaiveDate::parse_from_str(input.date.trim(), "%Y-%m-%d")
        .map_err(|_| CoreError::validation("date must be YYYY-MM-DD"))?;
    if !input.marks_obtained.is_finite() || input.marks_obtained < 0.0 {
        return Err(CoreError::validation("marksObtained must be a non-negative number"));
    }
    if !load_students(store)?
        .iter()
        .any(|s| s.identity == input.identity)
    {
        return Err(CoreError::NotFound(format!("student {}", input.identity)));
    }

    let schedule_total = match &input.schedule_id {
        Some(id) => Some(
            load_schedules(store)?
                .into_iter()
                .find(|s| &s.id == id)
                .ok_or_else(|| CoreError::NotFound(format!("exam schedule {}", id)))?
                .total_marks,
        ),
        None => None,
    };
    let total = input
        .total_marks
        .or(schedule_total)
        .unwrap_or(config.default_total_marks);
    if !total.is_finite() || total <= 0.0 {
        return Err(CoreError::validation("totalMarks must be > 0"));
    }

    let explicit = match input.outcome.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            Outcome::parse(raw)
                .ok_or_else(|| CoreError::validation(format!("unknown outcome '{}'", raw)))?,
        ),
    };
    if explicit != Some(Outcome::Absent) && input.marks_obtained > total {
        return Err(CoreError::validation(format!(
            "marks {} exceed total {}",
            input.marks_obtained, total
        )));
    }
    let outcome = explicit.unwrap_or(if input.marks_obtained >= config.pass_threshold(total) {
        Outcome::Pass
    } else {
        Outcome::Fail
    });

    let update = ResolvedUpdate {
        key: MarkKey {
            identity: input.identity.clone(),
            period: period_of(date),
            subject: subject.to_string(),
        },
        entry: MarkEntry {
            marks_obtained: input.marks_obtained,
            total_marks: total,
            outcome,
            remarks: input.remarks.clone(),
            date: date.format("%Y-%m-%d").to_string(),
        },
    };
    apply_one(store, &update)?;
    Ok(update)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::model::{Student, MARKS, STUDENTS};
    use crate::rows::{rows_from_json, Field};
    use crate::store::{parse_student_marks, SqliteStore};
    use serde_json::json;

    fn seed(store: &SqliteStore<'_>) {
        let students = vec![
            ("2025-001", "John", "Smith", "5A", "12"),
            ("2025-002", "Priya", "Nair", "5A", "13"),
        ];
        let entries: Vec<(String, serde_json::Value)> = students
            .into_iter()
            .map(|(id, f, l, c, r)| {
                let s = Student {
                    identity: id.into(),
                    first_name: f.into(),
                    last_name: l.into(),
                    class_label: c.into(),
                    roll_no: r.into(),
                    parent_name: String::new(),
                    phone: String::new(),
                    email: String::new(),
                };
                (id.to_string(), serde_json::to_value(s).expect("encode"))
            })
            .collect();
        store.batch_create(STUDENTS, &entries).expect("seed");
    }

    fn opts(period: Option<&str>) -> ImportOptions<'_> {
        ImportOptions {
            period,
            schedule_id: None,
            today: NaiveDate::from_ymd_opt(2025, 3, 14).expect("date"),
            config: CoreConfig::default(),
        }
    }

    #[test]
    fn partial_batch_commits_valid_rows_and_reports_the_rest() {
        let conn = db::open_memory();
        let store = SqliteStore::new(&conn);
        seed(&store);
        let mut slot = SessionSlot::new();

        let rows = rows_from_json(&[
            json!({ "Class": "5A", "Roll No": "12", "Subject": "Mathematics", "Marks": "42" }),
            json!({ "Class": "5A", "Name": "john", "Subject": "Science", "Marks": "150" }),
            json!({ "Class": "9Z", "Roll No": "1", "Subject": "Maths", "Marks": "10" }),
        ]);
        let report = import_marks(&store, &mut slot, &Resolver::default(), &rows, &opts(None))
            .expect("import");
        assert_eq!(report.success_count, 1);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].row_index, 3);
        assert_eq!(report.failures[1].row_index, 4);

        let doc = store.get_document(MARKS, "2025-001").expect("get").expect("doc");
        let marks = parse_student_marks(&doc);
        assert_eq!(marks["2025-03"]["Mathematics"].outcome, Outcome::Pass);
        assert!(!marks["2025-03"].contains_key("Science"));
        assert_eq!(slot.current().expect("session").touched_keys.len(), 1);
    }

    #[test]
    fn zero_valid_rows_is_a_hard_error_and_keeps_previous_session() {
        let conn = db::open_memory();
        let store = SqliteStore::new(&conn);
        seed(&store);
        let mut slot = SessionSlot::new();
        let ok_rows = vec![RawRow::new(0)
            .with(Field::Identity, "2025-002")
            .with(Field::Subject, "Art")
            .with(Field::Marks, "50")];
        import_marks(&store, &mut slot, &Resolver::default(), &ok_rows, &opts(Some("2025-02")))
            .expect("first import");

        let bad = rows_from_json(&[json!({ "Subject": "Maths" })]);
        let e = import_marks(&store, &mut slot, &Resolver::default(), &bad, &opts(None))
            .expect_err("nothing valid");
        match e {
            CoreError::NoValidRows { failures } => assert_eq!(failures.len(), 1),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(slot.current().expect("session").touched_keys[0].period, "2025-02");
    }

    #[test]
    fn rejects_malformed_batch_period() {
        let conn = db::open_memory();
        let store = SqliteStore::new(&conn);
        let mut slot = SessionSlot::new();
        let e = import_marks(&store, &mut slot, &Resolver::default(), &[], &opts(Some("March")))
            .expect_err("bad period");
        assert_eq!(e.code(), "bad_params");
    }

    #[test]
    fn single_entry_derives_outcome_and_period_from_date() {
        let conn = db::open_memory();
        let store = SqliteStore::new(&conn);
        seed(&store);
        let input = SingleMarkInput {
            identity: "2025-001".into(),
            subject: "Maths".into(),
            marks_obtained: 20.0,
            total_marks: Some(50.0),
            outcome: None,
            remarks: "retest".into(),
            date: "2025-04-02".into(),
            schedule_id: None,
        };
        let u = enter_single_mark(&store, &input, &CoreConfig::default()).expect("entered");
        assert_eq!(u.key.period, "2025-04");
        assert_eq!(u.entry.outcome, Outcome::Pass);

        let mut over = input.clone();
        over.marks_obtained = 60.0;
        assert_eq!(
            enter_single_mark(&store, &over, &CoreConfig::default()).expect_err("over").code(),
            "bad_params"
        );

        let mut unknown = input;
        unknown.identity = "2025-404".into();
        assert_eq!(
            enter_single_mark(&store, &unknown, &CoreConfig::default()).expect_err("missing").code(),
            "not_found"
        );
    }
}
