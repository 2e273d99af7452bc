use crate::ipc::helpers::{get_required_str, parse_params, respond, state_conn, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::ExamSchedule;
use crate::schedules::{create_schedule, delete_schedule, list_schedules, update_schedule, ScheduleInput};
use crate::store::SqliteStore;
use serde_json::{json, Value};

fn schedules_list(state: &AppState) -> Result<Vec<ExamSchedule>, HandlerErr> {
    let conn = state_conn(state)?;
    Ok(list_schedules(&SqliteStore::new(conn))?)
}

fn schedules_create(state: &AppState, req: &Request) -> Result<ExamSchedule, HandlerErr> {
    let conn = state_conn(state)?;
    let input: ScheduleInput = parse_params(&req.params, Some("schedule"))?;
    Ok(create_schedule(&SqliteStore::new(conn), input)?)
}

fn schedules_update(state: &AppState, req: &Request) -> Result<ExamSchedule, HandlerErr> {
    let conn = state_conn(state)?;
    let id = get_required_str(&req.params, "id")?;
    let input: ScheduleInput = parse_params(&req.params, Some("schedule"))?;
    Ok(update_schedule(&SqliteStore::new(conn), &id, input)?)
}

fn schedules_delete(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = state_conn(state)?;
    let id = get_required_str(&req.params, "id")?;
    delete_schedule(&SqliteStore::new(conn), &id)?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "schedules.list" => Some(respond(&req.id, schedules_list(state))),
        "schedules.create" => Some(respond(&req.id, schedules_create(state, req))),
        "schedules.update" => Some(respond(&req.id, schedules_update(state, req))),
        "schedules.delete" => Some(respond(&req.id, schedules_delete(state, req))),
        _ => None,
    }
}
