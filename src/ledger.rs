use rusqlite::Connection;

/// A single stored attendance event.
#[derive(Debug, Clone)]
pub struct AttendanceEvent {
    pub id: i64,
    pub student_id: String,
    pub timestamp: String,
    pub day: String,
}

/// An event joined with its student for reporting. When the student was
/// removed after the event, `roll` is empty and `name` is the placeholder.
#[derive(Debug, Clone)]
pub struct LedgerRow {
    pub id: i64,
    pub roll: String,
    pub name: String,
    pub timestamp: String,
    pub day: String,
}

/// Appends one event. The day is the calendar-date prefix of the timestamp,
/// stored denormalized so day-level queries never re-parse timestamps.
pub fn append(
    conn: &Connection,
    student_id: &str,
    timestamp: &str,
) -> Result<AttendanceEvent, rusqlite::Error> {
    let day = timestamp.get(..10).unwrap_or(timestamp);
    conn.execute(
        "INSERT INTO attendance(student_id, timestamp, day) VALUES(?, ?, ?)",
        (student_id, timestamp, day),
    )?;
    Ok(AttendanceEvent {
        id: conn.last_insert_rowid(),
        student_id: student_id.to_string(),
        timestamp: timestamp.to_string(),
        day: day.to_string(),
    })
}

fn row_from_join(row: &rusqlite::Row<'_>) -> rusqlite::Result<LedgerRow> {
    Ok(LedgerRow {
        id: row.get(0)?,
        roll: row.get(1)?,
        name: row.get(2)?,
        timestamp: row.get(3)?,
        day: row.get(4)?,
    })
}

const JOINED_SELECT: &str = "SELECT a.id,
        COALESCE(s.roll, ''),
        COALESCE(s.name, '(removed)'),
        a.timestamp,
        a.day
 FROM attendance a
 LEFT JOIN students s ON s.id = a.student_id";

/// Newest events first. Ties on timestamp fall back to insertion order so the
/// listing is stable across reloads.
pub fn recent(conn: &Connection, limit: i64) -> Result<Vec<LedgerRow>, rusqlite::Error> {
    let sql = format!("{JOINED_SELECT} ORDER BY a.timestamp DESC, a.id DESC LIMIT ?");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([limit], row_from_join)?;
    rows.collect()
}

pub fn all(conn: &Connection) -> Result<Vec<LedgerRow>, rusqlite::Error> {
    let sql = format!("{JOINED_SELECT} ORDER BY a.timestamp DESC, a.id DESC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], row_from_join)?;
    rows.collect()
}
