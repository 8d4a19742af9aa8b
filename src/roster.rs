use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

/// A registered student. `roll` is the only externally scannable identifier;
/// `id` stays internal to the store and the ledger.
#[derive(Debug, Clone)]
pub struct Student {
    pub id: String,
    pub roll: String,
    pub name: String,
    pub created_at: Option<String>,
}

#[derive(Debug)]
pub enum RosterError {
    Validation(&'static str),
    Store(rusqlite::Error),
}

impl From<rusqlite::Error> for RosterError {
    fn from(e: rusqlite::Error) -> Self {
        RosterError::Store(e)
    }
}

fn student_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: row.get(0)?,
        roll: row.get(1)?,
        name: row.get(2)?,
        created_at: row.get(3)?,
    })
}

/// Creates a student unless the roll is already taken, in which case the
/// existing record is returned untouched (the second registration must not
/// overwrite the first one's name). The UNIQUE constraint on roll makes this
/// safe under racing registrations: exactly one insert wins.
///
/// Returns the record plus whether this call created it.
pub fn register(
    conn: &Connection,
    roll: &str,
    name: &str,
) -> Result<(Student, bool), RosterError> {
    if roll.is_empty() {
        return Err(RosterError::Validation("roll must not be empty"));
    }
    if name.is_empty() {
        return Err(RosterError::Validation("name must not be empty"));
    }

    let id = Uuid::new_v4().to_string();
    let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let inserted = conn.execute(
        "INSERT INTO students(id, roll, name, created_at)
         VALUES(?, ?, ?, ?)
         ON CONFLICT(roll) DO NOTHING",
        (&id, roll, name, &created_at),
    )?;

    // Either our row or the conflicting one; a miss here means the store
    // broke between the two statements.
    let student =
        resolve(conn, roll)?.ok_or(RosterError::Store(rusqlite::Error::QueryReturnedNoRows))?;
    Ok((student, inserted > 0))
}

/// Exact-match lookup by roll. Case-sensitive, no trimming: normalizing a
/// scanned string is the ingestion service's job, not the registry's.
pub fn resolve(conn: &Connection, roll: &str) -> Result<Option<Student>, rusqlite::Error> {
    conn.query_row(
        "SELECT id, roll, name, created_at FROM students WHERE roll = ?",
        [roll],
        student_from_row,
    )
    .optional()
}

/// Updates the display name only; the roll is immutable once created.
pub fn rename(
    conn: &Connection,
    roll: &str,
    new_name: &str,
) -> Result<Option<Student>, RosterError> {
    if new_name.is_empty() {
        return Err(RosterError::Validation("name must not be empty"));
    }
    let changed = conn.execute(
        "UPDATE students SET name = ? WHERE roll = ?",
        (new_name, roll),
    )?;
    if changed == 0 {
        return Ok(None);
    }
    Ok(resolve(conn, roll)?)
}

/// Hard-deletes the student row. Ledger events referencing the student are
/// left in place; reports render them with a placeholder.
pub fn remove(conn: &Connection, roll: &str) -> Result<bool, rusqlite::Error> {
    let changed = conn.execute("DELETE FROM students WHERE roll = ?", [roll])?;
    Ok(changed > 0)
}

pub fn list(conn: &Connection) -> Result<Vec<Student>, rusqlite::Error> {
    let mut stmt =
        conn.prepare("SELECT id, roll, name, created_at FROM students ORDER BY roll")?;
    let rows = stmt.query_map([], student_from_row)?;
    rows.collect()
}
