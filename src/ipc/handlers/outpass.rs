use crate::ipc::helpers::{get_opt_str, get_required_str, parse_params, respond, state_conn, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::{Actor, OutpassRequest, OutpassStatus};
use crate::outpass::{create_outpass, list_outpasses, set_outpass_status, OutpassInput};
use crate::store::SqliteStore;

fn outpass_list(state: &AppState, req: &Request) -> Result<Vec<OutpassRequest>, HandlerErr> {
    let conn = state_conn(state)?;
    let identity = get_opt_str(&req.params, "identity");
    Ok(list_outpasses(&SqliteStore::new(conn), identity.as_deref())?)
}

fn outpass_create(state: &AppState, req: &Request) -> Result<OutpassRequest, HandlerErr> {
    let conn = state_conn(state)?;
    let input: OutpassInput = parse_params(&req.params, None)?;
    Ok(create_outpass(&SqliteStore::new(conn), input)?)
}

fn outpass_set_status(state: &AppState, req: &Request) -> Result<OutpassRequest, HandlerErr> {
    let conn = state_conn(state)?;
    let raw_actor = get_required_str(&req.params, "actor")?;
    let actor = Actor::parse(&raw_actor)
        .ok_or_else(|| HandlerErr::bad_params(format!("unknown actor: {}", raw_actor)))?;
    let id = get_required_str(&req.params, "id")?;
    let raw_status = get_required_str(&req.params, "status")?;
    let status = OutpassStatus::parse(&raw_status)
        .ok_or_else(|| HandlerErr::bad_params(format!("unknown status: {}", raw_status)))?;
    Ok(set_outpass_status(&SqliteStore::new(conn), actor, &id, status)?)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "outpass.list" => Some(respond(&req.id, outpass_list(state, req))),
        "outpass.create" => Some(respond(&req.id, outpass_create(state, req))),
        "outpass.setStatus" => Some(respond(&req.id, outpass_set_status(state, req))),
        _ => None,
    }
}
