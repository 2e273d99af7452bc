use crate::config::{self, CoreConfig};
use crate::ipc::helpers::{respond, state_conn, HandlerErr};
use crate::ipc::types::{AppState, Request};

fn settings_get(state: &AppState) -> Result<CoreConfig, HandlerErr> {
    let conn = state_conn(state)?;
    Ok(config::load(conn)?)
}

fn settings_update(state: &AppState, req: &Request) -> Result<CoreConfig, HandlerErr> {
    let conn = state_conn(state)?;
    let patch = req.params.get("patch").unwrap_or(&req.params);
    Ok(config::update(conn, patch)?)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "settings.get" => Some(respond(&req.id, settings_get(state))),
        "settings.update" => Some(respond(&req.id, settings_update(state, req))),
        _ => None,
    }
}
