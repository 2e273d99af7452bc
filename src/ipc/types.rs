use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::resolver::Resolver;
use crate::session::SessionSlot;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    /// Last bulk marks import; cleared whenever the workspace changes.
    pub session: SessionSlot,
    pub resolver: Resolver,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            workspace: None,
            db: None,
            session: SessionSlot::new(),
            resolver: Resolver::default(),
        }
    }
}
