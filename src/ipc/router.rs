use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::helpers::err;

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    let families: [fn(&mut AppState, &Request) -> Option<serde_json::Value>; 9] = [
        handlers::core::try_handle,
        handlers::settings::try_handle,
        handlers::students::try_handle,
        handlers::marks::try_handle,
        handlers::attendance::try_handle,
        handlers::outpass::try_handle,
        handlers::schedules::try_handle,
        handlers::overview::try_handle,
        handlers::backup::try_handle,
    ];
    for try_handle in families {
        if let Some(resp) = try_handle(state, &req) {
            return resp;
        }
    }

    log::debug!("unknown method: {}", req.method);
    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
