use crate::ingest::{self, IngestError};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::report;
use rusqlite::Connection;
use serde_json::json;

struct HandlerErr {
    code: &'static str,
    message: String,
    details: Option<serde_json::Value>,
}

impl HandlerErr {
    fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr {
            code: "bad_params",
            message: format!("missing {}", key),
            details: None,
        })
}

fn report_row_json(row: &report::ReportRow) -> serde_json::Value {
    json!({
        "id": row.id,
        "roll": row.roll,
        "name": row.name,
        "timestamp": row.timestamp,
        "date": row.date
    })
}

fn attendance_mark(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let raw = get_required_str(params, "roll")?;
    let marked = ingest::mark(conn, &raw).map_err(|e| match e {
        IngestError::InvalidInput(msg) => HandlerErr {
            code: "bad_params",
            message: msg.to_string(),
            details: None,
        },
        IngestError::UnknownStudent { roll } => HandlerErr {
            code: "not_found",
            message: "student not found".to_string(),
            details: Some(json!({ "roll": roll })),
        },
        IngestError::Lookup(e) => HandlerErr {
            code: "db_query_failed",
            message: e.to_string(),
            details: Some(json!({ "table": "students" })),
        },
        IngestError::Store(e) => HandlerErr {
            code: "db_insert_failed",
            message: e.to_string(),
            details: Some(json!({ "table": "attendance" })),
        },
    })?;

    Ok(json!({
        "student": {
            "name": marked.student.name,
            "roll": marked.student.roll
        },
        "timestamp": marked.event.timestamp
    }))
}

fn attendance_recent(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let limit = match params.get("limit") {
        None | Some(serde_json::Value::Null) => report::DEFAULT_RECENT_LIMIT,
        Some(v) => match v.as_i64() {
            Some(n) if n >= 0 => n,
            _ => {
                return Err(HandlerErr {
                    code: "bad_params",
                    message: "limit must be a non-negative integer".to_string(),
                    details: None,
                })
            }
        },
    };

    let rows = report::recent_report(conn, limit).map_err(|e| HandlerErr {
        code: "db_query_failed",
        message: e.to_string(),
        details: None,
    })?;
    let records: Vec<serde_json::Value> = rows.iter().map(report_row_json).collect();
    Ok(json!({ "records": records, "limit": limit }))
}

fn attendance_export_csv(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let rows = report::export_all(conn).map_err(|e| HandlerErr {
        code: "db_query_failed",
        message: e.to_string(),
        details: None,
    })?;
    let csv = report::to_csv(&rows);

    let out_path = params
        .get("outPath")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty());
    match out_path {
        Some(path) => {
            std::fs::write(path, &csv).map_err(|e| HandlerErr {
                code: "io_failed",
                message: e.to_string(),
                details: Some(json!({ "path": path })),
            })?;
            Ok(json!({
                "rowCount": rows.len(),
                "filename": report::CSV_FILENAME,
                "path": path
            }))
        }
        None => Ok(json!({
            "rowCount": rows.len(),
            "filename": report::CSV_FILENAME,
            "csv": csv
        })),
    }
}

fn handle_attendance_mark(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match attendance_mark(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_attendance_recent(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match attendance_recent(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_attendance_export_csv(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match attendance_export_csv(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.mark" => Some(handle_attendance_mark(state, req)),
        "attendance.recent" => Some(handle_attendance_recent(state, req)),
        "attendance.exportCsv" => Some(handle_attendance_export_csv(state, req)),
        _ => None,
    }
}
