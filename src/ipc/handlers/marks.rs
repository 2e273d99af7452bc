use crate::config;
use crate::import::{enter_single_mark, import_marks, ImportOptions, ImportReport, SingleMarkInput};
use crate::ipc::helpers::{db_conn, get_opt_str, get_required_str, parse_params, respond, state_conn, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::{ResolvedUpdate, MARKS};
use crate::rows::rows_from_json;
use crate::session::UndoSummary;
use crate::store::{parse_student_marks, DocumentStore, SqliteStore};
use serde_json::{json, Value};

fn marks_get(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = state_conn(state)?;
    let identity = get_required_str(&req.params, "identity")?;
    let doc = SqliteStore::new(conn).get_document(MARKS, &identity)?;
    let mut marks = doc.as_ref().map(parse_student_marks).unwrap_or_default();
    if let Some(period) = get_opt_str(&req.params, "period") {
        marks.retain(|p, _| *p == period);
    }
    Ok(json!({ "identity": identity, "marks": marks }))
}

fn marks_set_one(state: &AppState, req: &Request) -> Result<ResolvedUpdate, HandlerErr> {
    let conn = state_conn(state)?;
    let input: SingleMarkInput = parse_params(&req.params, None)?;
    let cfg = config::load(conn)?;
    Ok(enter_single_mark(&SqliteStore::new(conn), &input, &cfg)?)
}

fn marks_import(state: &mut AppState, req: &Request) -> Result<ImportReport, HandlerErr> {
    let AppState {
        db,
        session,
        resolver,
        ..
    } = state;
    let conn = db_conn(db)?;
    let Some(raw_rows) = req.params.get("rows").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("missing rows"));
    };
    let period = get_opt_str(&req.params, "period");
    let schedule_id = get_opt_str(&req.params, "scheduleId");
    let opts = ImportOptions {
        period: period.as_deref(),
        schedule_id: schedule_id.as_deref(),
        today: chrono::Local::now().date_naive(),
        config: config::load(conn)?,
    };
    let rows = rows_from_json(raw_rows);
    Ok(import_marks(
        &SqliteStore::new(conn),
        session,
        resolver,
        &rows,
        &opts,
    )?)
}

fn marks_undo_last_import(state: &mut AppState) -> Result<UndoSummary, HandlerErr> {
    let AppState { db, session, .. } = state;
    let conn = db_conn(db)?;
    Ok(session.undo_last_session(&SqliteStore::new(conn))?)
}

fn marks_last_import(state: &AppState) -> Value {
    match state.session.current() {
        Some(s) => json!({
            "recordedAt": s.recorded_at,
            "touchedKeys": s.touched_keys,
        }),
        None => Value::Null,
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "marks.get" => Some(respond(&req.id, marks_get(state, req))),
        "marks.setOne" => Some(respond(&req.id, marks_set_one(state, req))),
        "marks.import" => Some(respond(&req.id, marks_import(state, req))),
        "marks.undoLastImport" => Some(respond(&req.id, marks_undo_last_import(state))),
        "marks.lastImport" => Some(respond(&req.id, Ok(marks_last_import(state)))),
        _ => None,
    }
}
