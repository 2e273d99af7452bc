use crate::config;
use crate::ipc::helpers::{get_opt_str, get_required_str, respond, state_conn, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::overview::{student_overview, Scope, StudentOverview};
use crate::resolver::is_valid_period;
use crate::store::SqliteStore;

fn overview_student(state: &AppState, req: &Request) -> Result<StudentOverview, HandlerErr> {
    let conn = state_conn(state)?;
    let identity = get_required_str(&req.params, "identity")?;
    let scope = match get_opt_str(&req.params, "month") {
        Some(m) if m.eq_ignore_ascii_case("all") => Scope::All,
        Some(m) if is_valid_period(&m) => Scope::Month(m),
        Some(m) => return Err(HandlerErr::bad_params(format!("month must be YYYY-MM or all, got {}", m))),
        None => Scope::All,
    };
    let cfg = config::load(conn)?;
    Ok(student_overview(&SqliteStore::new(conn), &identity, &scope, &cfg)?)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "overview.student" => Some(respond(&req.id, overview_student(state, req))),
        _ => None,
    }
}
