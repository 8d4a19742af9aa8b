use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;

use crate::ledger::{self, AttendanceEvent};
use crate::roster::{self, Student};

/// Outcome of a successful scan.
#[derive(Debug)]
pub struct Marked {
    pub student: Student,
    pub event: AttendanceEvent,
}

#[derive(Debug)]
pub enum IngestError {
    /// The scanned payload was blank after trimming.
    InvalidInput(&'static str),
    /// The payload trimmed to a roll nobody is registered under.
    UnknownStudent { roll: String },
    /// The registry lookup itself failed, before anything was written.
    Lookup(rusqlite::Error),
    /// The ledger append failed.
    Store(rusqlite::Error),
}

/// Records one attendance event for whatever a scanner handed us.
///
/// The raw payload is trimmed once here; the registry itself matches rolls
/// exactly. Nothing is deduplicated: a student scanning twice in a day gets
/// two events, and the reporting layer shows both.
pub fn mark(conn: &Connection, raw_input: &str) -> Result<Marked, IngestError> {
    let roll = raw_input.trim();
    if roll.is_empty() {
        return Err(IngestError::InvalidInput("roll is required"));
    }

    let student = roster::resolve(conn, roll)
        .map_err(IngestError::Lookup)?
        .ok_or_else(|| IngestError::UnknownStudent {
            roll: roll.to_string(),
        })?;

    // One clock read per scan; the stored day is derived from this same
    // string, so an event can never straddle midnight.
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let event = ledger::append(conn, &student.id, &timestamp).map_err(IngestError::Store)?;
    tracing::debug!(
        event_id = event.id,
        student_id = %event.student_id,
        day = %event.day,
        "scan recorded"
    );
    Ok(Marked { student, event })
}
