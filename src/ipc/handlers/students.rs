use crate::ipc::helpers::{get_opt_str, get_required_str, get_str_list, parse_params, respond, state_conn, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::{NewStudent, Student};
use crate::roster::{
    class_labels, delete_student, delete_students, new_student_from_row, register_student,
    register_students_bulk, update_student, BulkRegistration,
};
use crate::store::{load_students, SqliteStore};
use chrono::Datelike;
use serde_json::{json, Value};

/// Registration year; callers may pin it, otherwise the local calendar year.
fn registration_year(params: &Value) -> Result<i32, HandlerErr> {
    match params.get("year") {
        None | Some(Value::Null) => Ok(chrono::Local::now().year()),
        Some(v) => v
            .as_i64()
            .and_then(|y| i32::try_from(y).ok())
            .filter(|y| (1000..=9999).contains(y))
            .ok_or_else(|| HandlerErr::bad_params("year must be a four-digit number")),
    }
}

fn students_list(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = state_conn(state)?;
    let all = load_students(&SqliteStore::new(conn))?;
    let classes = class_labels(&all);
    let students: Vec<Student> = match get_opt_str(&req.params, "classLabel") {
        Some(class) => all.into_iter().filter(|s| s.class_label == class).collect(),
        None => all,
    };
    Ok(json!({ "students": students, "classes": classes }))
}

fn students_create(state: &AppState, req: &Request) -> Result<Student, HandlerErr> {
    let conn = state_conn(state)?;
    let year = registration_year(&req.params)?;
    let new: NewStudent = parse_params(&req.params, Some("student"))?;
    Ok(register_student(&SqliteStore::new(conn), year, new)?)
}

fn students_bulk_create(state: &AppState, req: &Request) -> Result<BulkRegistration, HandlerErr> {
    let conn = state_conn(state)?;
    let year = registration_year(&req.params)?;
    let Some(rows) = req.params.get("rows").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("missing rows"));
    };
    let rows: Vec<NewStudent> = rows
        .iter()
        .map(|r| r.as_object().map(new_student_from_row).unwrap_or_default())
        .collect();
    Ok(register_students_bulk(&SqliteStore::new(conn), year, rows)?)
}

fn students_update(state: &AppState, req: &Request) -> Result<Student, HandlerErr> {
    let conn = state_conn(state)?;
    let identity = get_required_str(&req.params, "identity")?;
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("missing patch"));
    };
    Ok(update_student(&SqliteStore::new(conn), &identity, patch)?)
}

fn students_delete(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = state_conn(state)?;
    let identity = get_required_str(&req.params, "identity")?;
    delete_student(&SqliteStore::new(conn), &identity)?;
    Ok(json!({ "ok": true }))
}

fn students_bulk_delete(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = state_conn(state)?;
    let identities = get_str_list(&req.params, "identities")?;
    let deleted = delete_students(&SqliteStore::new(conn), &identities)?;
    Ok(json!({ "deletedCount": deleted }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(respond(&req.id, students_list(state, req))),
        "students.create" => Some(respond(&req.id, students_create(state, req))),
        "students.bulkCreate" => Some(respond(&req.id, students_bulk_create(state, req))),
        "students.update" => Some(respond(&req.id, students_update(state, req))),
        "students.delete" => Some(respond(&req.id, students_delete(state, req))),
        "students.bulkDelete" => Some(respond(&req.id, students_bulk_delete(state, req))),
        _ => None,
    }
}
