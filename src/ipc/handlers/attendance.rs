use crate::attendance::{canonical_date, get_attendance, set_attendance, set_attendance_for_class};
use crate::ipc::helpers::{get_opt_str, get_required_str, get_str_list, parse_params, respond, state_conn, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::{AttendanceEntry, AttendancePatch, ATTENDANCE};
use crate::store::{load_students, parse_day_attendance, DocumentStore, SqliteStore};
use serde_json::{json, Value};

fn attendance_get(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = state_conn(state)?;
    let store = SqliteStore::new(conn);
    let date = canonical_date(&get_required_str(&req.params, "date")?)?;
    if let Some(identity) = get_opt_str(&req.params, "identity") {
        let entry = get_attendance(&store, &date, &identity)?;
        return Ok(json!({ "date": date, "identity": identity, "entry": entry }));
    }
    let day = store
        .get_document(ATTENDANCE, &date)?
        .as_ref()
        .map(parse_day_attendance)
        .unwrap_or_default();
    Ok(json!({ "date": date, "entries": day }))
}

fn attendance_set(state: &AppState, req: &Request) -> Result<AttendanceEntry, HandlerErr> {
    let conn = state_conn(state)?;
    let date = get_required_str(&req.params, "date")?;
    let identity = get_required_str(&req.params, "identity")?;
    let patch: AttendancePatch = parse_params(&req.params, None)?;
    Ok(set_attendance(&SqliteStore::new(conn), &date, &identity, &patch)?)
}

/// Whole-class marking, addressed either by explicit identities or by class label.
fn attendance_set_class(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = state_conn(state)?;
    let store = SqliteStore::new(conn);
    let date = canonical_date(&get_required_str(&req.params, "date")?)?;
    let present = req
        .params
        .get("present")
        .and_then(|v| v.as_bool())
        .ok_or_else(|| HandlerErr::bad_params("missing present"))?;
    let identities = match get_opt_str(&req.params, "classLabel") {
        Some(class) => load_students(&store)?
            .into_iter()
            .filter(|s| s.class_label == class)
            .map(|s| s.identity)
            .collect(),
        None => get_str_list(&req.params, "identities")?,
    };
    let written = set_attendance_for_class(&store, &date, &identities, present)?;
    let entries: serde_json::Map<String, Value> = written
        .into_iter()
        .map(|(id, e)| serde_json::to_value(e).map(|v| (id, v)))
        .collect::<Result<_, _>>()
        .map_err(|e| HandlerErr {
            code: "serialization_failed",
            message: e.to_string(),
            details: None,
        })?;
    Ok(json!({ "date": date, "updatedCount": entries.len(), "entries": entries }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.get" => Some(respond(&req.id, attendance_get(state, req))),
        "attendance.set" => Some(respond(&req.id, attendance_set(state, req))),
        "attendance.setClass" => Some(respond(&req.id, attendance_set_class(state, req))),
        _ => None,
    }
}
