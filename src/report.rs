use rusqlite::Connection;

use crate::ledger::{self, LedgerRow};

/// Row cap for the recent-activity view when the caller does not supply one.
pub const DEFAULT_RECENT_LIMIT: i64 = 200;

/// Download name the UI shell attaches to a CSV export.
pub const CSV_FILENAME: &str = "attendance_export.csv";

/// One line of a report: a ledger event joined with its student.
#[derive(Debug, Clone)]
pub struct ReportRow {
    pub id: i64,
    pub roll: String,
    pub name: String,
    pub timestamp: String,
    pub date: String,
}

impl From<LedgerRow> for ReportRow {
    fn from(row: LedgerRow) -> Self {
        ReportRow {
            id: row.id,
            roll: row.roll,
            name: row.name,
            timestamp: row.timestamp,
            date: row.day,
        }
    }
}

/// Newest events first, capped at `limit`.
pub fn recent_report(conn: &Connection, limit: i64) -> Result<Vec<ReportRow>, rusqlite::Error> {
    Ok(ledger::recent(conn, limit)?
        .into_iter()
        .map(ReportRow::from)
        .collect())
}

/// Every event ever recorded, newest first.
pub fn export_all(conn: &Connection) -> Result<Vec<ReportRow>, rusqlite::Error> {
    Ok(ledger::all(conn)?
        .into_iter()
        .map(ReportRow::from)
        .collect())
}

/// Serializes rows in the legacy sheet format: fixed header, only the name
/// field quoted, nothing escaped. Embedded quotes or commas pass through
/// verbatim, so a pathological name can break a strict CSV parser. Existing
/// spreadsheets import this shape, so it stays byte-for-byte as is.
pub fn to_csv(rows: &[ReportRow]) -> String {
    let mut out = String::from("id,roll,name,timestamp,date\n");
    for r in rows {
        out.push_str(&format!(
            "{},{},\"{}\",{},{}\n",
            r.id, r.roll, r.name, r.timestamp, r.date
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster;

    fn mem_conn() -> Connection {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        crate::db::init_schema(&conn).expect("schema");
        conn
    }

    #[test]
    fn csv_matches_the_legacy_sheet_format_exactly() {
        let rows = vec![ReportRow {
            id: 1,
            roll: "A1".to_string(),
            name: "Jane Doe".to_string(),
            timestamp: "2024-01-01T09:00:00.000Z".to_string(),
            date: "2024-01-01".to_string(),
        }];
        assert_eq!(
            to_csv(&rows),
            "id,roll,name,timestamp,date\n1,A1,\"Jane Doe\",2024-01-01T09:00:00.000Z,2024-01-01\n"
        );
    }

    #[test]
    fn csv_of_an_empty_ledger_is_just_the_header() {
        assert_eq!(to_csv(&[]), "id,roll,name,timestamp,date\n");
    }

    #[test]
    fn embedded_quotes_and_commas_pass_through_unescaped() {
        let rows = vec![ReportRow {
            id: 7,
            roll: "B2".to_string(),
            name: "Doe, Jane \"JD\"".to_string(),
            timestamp: "2024-01-01T09:00:00.000Z".to_string(),
            date: "2024-01-01".to_string(),
        }];
        let csv = to_csv(&rows);
        assert!(csv.contains("7,B2,\"Doe, Jane \"JD\"\",2024-01-01T09:00:00.000Z"));
    }

    #[test]
    fn recent_report_returns_the_newest_events_in_order() {
        let conn = mem_conn();
        let (student, _) = roster::register(&conn, "A1", "Jane Doe").expect("register");

        ledger::append(&conn, &student.id, "2024-01-01T09:00:00.000Z").expect("append");
        ledger::append(&conn, &student.id, "2024-01-02T09:00:00.000Z").expect("append");
        ledger::append(&conn, &student.id, "2024-01-03T09:00:00.000Z").expect("append");

        let rows = recent_report(&conn, 2).expect("recent");
        let stamps: Vec<&str> = rows.iter().map(|r| r.timestamp.as_str()).collect();
        assert_eq!(
            stamps,
            vec!["2024-01-03T09:00:00.000Z", "2024-01-02T09:00:00.000Z"]
        );
    }

    #[test]
    fn report_rows_expose_the_day_as_date() {
        let conn = mem_conn();
        let (student, _) = roster::register(&conn, "A1", "Jane Doe").expect("register");
        ledger::append(&conn, &student.id, "2024-01-01T09:00:00.000Z").expect("append");

        let rows = export_all(&conn).expect("export");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, "2024-01-01");
        assert_eq!(rows[0].roll, "A1");
        assert_eq!(rows[0].name, "Jane Doe");
    }
}
