use crate::error::{CoreError, CoreResult};
use crate::model::{ExamSchedule, ScheduledSubject, EXAM_SCHEDULES};
use crate::store::{load_schedules, DocumentStore};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleInput {
    pub name: String,
    pub start_date: String,
    pub end_date: String,
    pub total_marks: f64,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub subjects: Vec<ScheduledSubject>,
}

fn parse_date(field: &str, raw: &str) -> CoreResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| CoreError::validation(format!("{} must be YYYY-MM-DD", field)))
}

/// Validates the input and returns the schedule body with subjects in date order
/// and classes de-duplicated.
fn build(id: String, input: ScheduleInput) -> CoreResult<ExamSchedule> {
    if input.name.trim().is_empty() {
        return Err(CoreError::validation("name is required"));
    }
    let start = parse_date("startDate", &input.start_date)?;
    let end = parse_date("endDate", &input.end_date)?;
    if end < start {
        return Err(CoreError::validation("endDate cannot be before startDate"));
    }
    if !input.total_marks.is_finite() || input.total_marks <= 0.0 {
        return Err(CoreError::validation("totalMarks must be > 0"));
    }
    let mut classes: Vec<String> = Vec::new();
    for c in input.classes {
        let c = c.trim().to_string();
        if !c.is_empty() && !classes.contains(&c) {
            classes.push(c);
        }
    }
    if classes.is_empty() {
        return Err(CoreError::validation("select at least one class"));
    }
    if input.subjects.is_empty() {
        return Err(CoreError::validation("add at least one subject"));
    }

    let mut dated = Vec::with_capacity(input.subjects.len());
    for s in input.subjects {
        if s.subject.trim().is_empty() {
            return Err(CoreError::validation("subject name is required"));
        }
        let d = parse_date("subject date", &s.date)?;
        if d < start || d > end {
            return Err(CoreError::validation(format!(
                "subject {} date must be between {} and {}",
                s.subject, input.start_date, input.end_date
            )));
        }
        dated.push((d, s));
    }
    dated.sort_by_key(|(d, _)| *d);

    Ok(ExamSchedule {
        id,
        name: input.name.trim().to_string(),
        start_date: start.format("%Y-%m-%d").to_string(),
        end_date: end.format("%Y-%m-%d").to_string(),
        total_marks: input.total_marks,
        classes,
        subjects: dated.into_iter().map(|(_, s)| s).collect(),
    })
}

pub fn create_schedule(store: &dyn DocumentStore, input: ScheduleInput) -> CoreResult<ExamSchedule> {
    let schedule = build(Uuid::new_v4().to_string(), input)?;
    store.batch_create(
        EXAM_SCHEDULES,
        &[(schedule.id.clone(), serde_json::to_value(&schedule)?)],
    )?;
    log::info!("exam schedule created: {}", schedule.id);
    Ok(schedule)
}

pub fn update_schedule(
    store: &dyn DocumentStore,
    id: &str,
    input: ScheduleInput,
) -> CoreResult<ExamSchedule> {
    if store.get_document(EXAM_SCHEDULES, id)?.is_none() {
        return Err(CoreError::NotFound(format!("exam schedule {}", id)));
    }
    let schedule = build(id.to_string(), input)?;
    let body = serde_json::to_value(&schedule)?;
    let Some(fields) = body.as_object() else {
        return Err(CoreError::validation("schedule must encode as an object"));
    };
    let updates: Vec<_> = fields
        .iter()
        .map(|(k, v)| (vec![k.clone()], v.clone()))
        .collect();
    store.merge_or_create(EXAM_SCHEDULES, id, &updates)?;
    Ok(schedule)
}

pub fn delete_schedule(store: &dyn DocumentStore, id: &str) -> CoreResult<()> {
    if !store.delete_document(EXAM_SCHEDULES, id)? {
        return Err(CoreError::NotFound(format!("exam schedule {}", id)));
    }
    Ok(())
}

/// Most recently created schedules first.
pub fn list_schedules(store: &dyn DocumentStore) -> CoreResult<Vec<ExamSchedule>> {
    let mut all = load_schedules(store)?;
    all.reverse();
    Ok(all)
}
