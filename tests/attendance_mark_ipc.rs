use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_rollcalld");
    let mut child = Command::new(exe)
        .env_remove("ROLLCALLD_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn rollcalld");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> &str {
    value
        .pointer("/error/code")
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

fn recent_records(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    params: serde_json::Value,
) -> Vec<serde_json::Value> {
    request_ok(stdin, reader, id, "attendance.recent", params)
        .get("records")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default()
}

#[test]
fn mark_trims_the_scan_and_records_one_event() {
    let workspace = temp_dir("rollcall-mark");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.register",
        json!({ "roll": "A1", "name": "Jane Doe" }),
    );

    // Scanners pad their payloads; the sidecar normalizes.
    let marked = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "attendance.mark",
        json!({ "roll": "  A1 " }),
    );
    assert_eq!(
        marked.pointer("/student/roll").and_then(|v| v.as_str()),
        Some("A1")
    );
    assert_eq!(
        marked.pointer("/student/name").and_then(|v| v.as_str()),
        Some("Jane Doe")
    );
    let timestamp = marked
        .get("timestamp")
        .and_then(|v| v.as_str())
        .expect("timestamp")
        .to_string();
    assert!(timestamp.ends_with('Z'), "UTC timestamp: {timestamp}");
    assert!(timestamp.contains('T'));

    let records = recent_records(&mut stdin, &mut reader, "4", json!({}));
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].get("roll").and_then(|v| v.as_str()),
        Some("A1")
    );
    assert_eq!(
        records[0].get("timestamp").and_then(|v| v.as_str()),
        Some(timestamp.as_str())
    );
    assert_eq!(
        records[0].get("date").and_then(|v| v.as_str()),
        Some(&timestamp[..10])
    );

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn mark_distinguishes_blank_and_unknown_rolls() {
    let workspace = temp_dir("rollcall-mark-errors");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let resp = request(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.mark",
        json!({ "roll": "   " }),
    );
    assert_eq!(error_code(&resp), "bad_params");

    let resp = request(&mut stdin, &mut reader, "3", "attendance.mark", json!({}));
    assert_eq!(error_code(&resp), "bad_params");

    let resp = request(
        &mut stdin,
        &mut reader,
        "4",
        "attendance.mark",
        json!({ "roll": " Z9 " }),
    );
    assert_eq!(error_code(&resp), "not_found");
    assert_eq!(
        resp.pointer("/error/details/roll").and_then(|v| v.as_str()),
        Some("Z9"),
        "diagnostics carry the trimmed roll"
    );

    // None of the failures may leave an event behind.
    let records = recent_records(&mut stdin, &mut reader, "5", json!({}));
    assert!(records.is_empty());

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn repeated_scans_each_append_an_event() {
    let workspace = temp_dir("rollcall-mark-repeat");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.register",
        json!({ "roll": "A1", "name": "Jane Doe" }),
    );

    for i in 0..3 {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("mark-{i}"),
            "attendance.mark",
            json!({ "roll": "A1" }),
        );
    }

    let records = recent_records(&mut stdin, &mut reader, "6", json!({}));
    assert_eq!(records.len(), 3, "no duplicate suppression");

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn recent_lists_newest_first_and_honors_limit() {
    let workspace = temp_dir("rollcall-mark-recent");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    for (i, (roll, name)) in [("A1", "Alice"), ("B2", "Bob"), ("C3", "Carol")]
        .iter()
        .enumerate()
    {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("reg-{i}"),
            "students.register",
            json!({ "roll": roll, "name": name }),
        );
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("mark-{i}"),
            "attendance.mark",
            json!({ "roll": roll }),
        );
    }

    let all = request_ok(&mut stdin, &mut reader, "5", "attendance.recent", json!({}));
    assert_eq!(all.get("limit").and_then(|v| v.as_i64()), Some(200));
    let records = all
        .get("records")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    let rolls: Vec<&str> = records
        .iter()
        .filter_map(|r| r.get("roll").and_then(|v| v.as_str()))
        .collect();
    assert_eq!(rolls, vec!["C3", "B2", "A1"], "newest first");

    let limited = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "attendance.recent",
        json!({ "limit": 2 }),
    );
    assert_eq!(limited.get("limit").and_then(|v| v.as_i64()), Some(2));
    assert_eq!(
        limited
            .get("records")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(2)
    );

    let resp = request(
        &mut stdin,
        &mut reader,
        "7",
        "attendance.recent",
        json!({ "limit": -5 }),
    );
    assert_eq!(error_code(&resp), "bad_params");

    let _ = std::fs::remove_dir_all(workspace);
}
