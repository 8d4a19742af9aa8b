use crate::badge::{self, BadgeEncoder, SvgBadgeEncoder};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::roster;
use serde_json::json;

fn student_json(s: &roster::Student) -> serde_json::Value {
    json!({
        "id": s.id,
        "roll": s.roll,
        "name": s.name,
        "createdAt": s.created_at
    })
}

fn handle_students_register(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (Some(conn), Some(workspace)) = (state.db.as_ref(), state.workspace.as_ref()) else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let roll = match req.params.get("roll").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing roll", None),
    };
    if roll.is_empty() {
        return err(&req.id, "bad_params", "roll must not be empty", None);
    }
    let name = match req.params.get("name").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing name", None),
    };
    if name.is_empty() {
        return err(&req.id, "bad_params", "name must not be empty", None);
    }

    let (student, created) = match roster::register(conn, &roll, &name) {
        Ok(v) => v,
        Err(roster::RosterError::Validation(msg)) => {
            return err(&req.id, "bad_params", msg, None)
        }
        Err(roster::RosterError::Store(e)) => {
            return err(
                &req.id,
                "db_insert_failed",
                e.to_string(),
                Some(json!({ "table": "students" })),
            )
        }
    };

    // The badge is rendered after the row exists and never blocks the
    // registration result.
    let encoder = SvgBadgeEncoder::new(workspace);
    badge::refresh(&encoder, &student.roll);

    ok(
        &req.id,
        json!({
            "student": student_json(&student),
            "created": created,
            "badgePath": encoder.badge_path(&student.roll).to_string_lossy()
        }),
    )
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "students": [] }));
    };

    match roster::list(conn) {
        Ok(students) => {
            let students_json: Vec<serde_json::Value> =
                students.iter().map(student_json).collect();
            ok(&req.id, json!({ "students": students_json }))
        }
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_students_rename(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let roll = match req.params.get("roll").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing roll", None),
    };
    if roll.is_empty() {
        return err(&req.id, "bad_params", "roll must not be empty", None);
    }
    let name = match req.params.get("name").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing name", None),
    };
    if name.is_empty() {
        return err(&req.id, "bad_params", "name must not be empty", None);
    }

    match roster::rename(conn, &roll, &name) {
        Ok(Some(student)) => ok(&req.id, json!({ "student": student_json(&student) })),
        Ok(None) => err(&req.id, "not_found", "student not found", None),
        Err(roster::RosterError::Validation(msg)) => err(&req.id, "bad_params", msg, None),
        Err(roster::RosterError::Store(e)) => err(
            &req.id,
            "db_update_failed",
            e.to_string(),
            Some(json!({ "table": "students" })),
        ),
    }
}

fn handle_students_remove(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (Some(conn), Some(workspace)) = (state.db.as_ref(), state.workspace.as_ref()) else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let roll = match req.params.get("roll").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing roll", None),
    };
    if roll.is_empty() {
        return err(&req.id, "bad_params", "roll must not be empty", None);
    }

    match roster::remove(conn, &roll) {
        Ok(true) => {
            // Ledger events referencing this student stay put; only the
            // badge artifact goes with the row.
            badge::remove_artifact(&SvgBadgeEncoder::new(workspace), &roll);
            ok(&req.id, json!({ "ok": true }))
        }
        Ok(false) => err(&req.id, "not_found", "student not found", None),
        Err(e) => err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "students" })),
        ),
    }
}

fn handle_students_badge(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (Some(conn), Some(workspace)) = (state.db.as_ref(), state.workspace.as_ref()) else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let roll = match req.params.get("roll").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing roll", None),
    };
    if roll.is_empty() {
        return err(&req.id, "bad_params", "roll must not be empty", None);
    }

    let resolved = match roster::resolve(conn, &roll) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if resolved.is_none() {
        return err(&req.id, "not_found", "student not found", None);
    }

    let encoder = SvgBadgeEncoder::new(workspace);
    let rendered = match encoder.encode(&roll) {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(roll, "badge render failed: {e:#}");
            false
        }
    };

    ok(
        &req.id,
        json!({
            "roll": roll,
            "badgePath": encoder.badge_path(&roll).to_string_lossy(),
            "rendered": rendered
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.register" => Some(handle_students_register(state, req)),
        "students.list" => Some(handle_students_list(state, req)),
        "students.rename" => Some(handle_students_rename(state, req)),
        "students.remove" => Some(handle_students_remove(state, req)),
        "students.badge" => Some(handle_students_badge(state, req)),
        _ => None,
    }
}
