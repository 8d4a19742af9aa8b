mod backup;
mod badge;
mod db;
mod ingest;
mod ipc;
mod ledger;
mod report;
mod roster;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

fn main() {
    // stdout carries the protocol, so all diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let mut state = ipc::AppState {
        workspace: None,
        db: None,
    };

    // A kiosk deployment can point the sidecar at its workspace up front
    // instead of sending workspace.select over the wire. Failure falls back
    // to the no-workspace state.
    if let Ok(path) = std::env::var("ROLLCALLD_WORKSPACE") {
        let path = PathBuf::from(path);
        match db::open_db(&path) {
            Ok(conn) => {
                tracing::info!(workspace = %path.display(), "workspace preselected");
                state.workspace = Some(path);
                state.db = Some(conn);
            }
            Err(err) => {
                tracing::warn!(
                    workspace = %path.display(),
                    "could not open ROLLCALLD_WORKSPACE: {err:#}"
                );
            }
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // No id to echo back; reply with an anonymous error line.
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{resp}");
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
