use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

/// One line of the wire protocol: `{"id": ..., "method": ..., "params": ...}`.
/// Absent params deserialize to JSON null so handlers can probe them
/// uniformly.
#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Everything the sidecar holds between requests: which workspace is open
/// and the connection to its database. Both stay `None` until a
/// `workspace.select` (or the startup environment override) succeeds.
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
}
