//! Stable text export of retained diary data.
//!
//! # Responsibility
//! - Render every stored dated entry into the documented line format.
//!
//! # Invariants
//! - Output is deterministic for identical stored state and date.
//! - One line per dated entry: `<date> <kind> <name>`, newest date first,
//!   persons before locations within a date.
//! - Names are flattened to single-line text.
//!
//! # See also
//! - docs/architecture/data-model.md

use crate::store::diary_store::DiaryStoreResult;
use crate::store::DATE_FORMAT;
use chrono::NaiveDate;
use rusqlite::Connection;

const EXPORT_FORMAT_HEADER: &str = "# tracediary export v1";

struct ExportEntry {
    date: String,
    kind: &'static str,
    name: String,
}

/// Renders all retained dated entries, including rows older than the
/// visible window that cleanup has not purged yet.
pub(crate) fn render_export(conn: &Connection, today: NaiveDate) -> DiaryStoreResult<String> {
    let entries = collect_entries(conn)?;
    Ok(render_lines(today, &entries))
}

fn collect_entries(conn: &Connection) -> DiaryStoreResult<Vec<ExportEntry>> {
    let mut stmt = conn.prepare(
        "SELECT e.date AS date, 0 AS kind, p.name AS name, e.id AS entry_id
         FROM contact_person_encounter e
         JOIN contact_person p ON p.id = e.contact_person_id
         UNION ALL
         SELECT v.date AS date, 1 AS kind, l.name AS name, v.id AS entry_id
         FROM location_visit v
         JOIN location l ON l.id = v.location_id
         ORDER BY date DESC, kind ASC, name COLLATE NOCASE ASC, entry_id ASC;",
    )?;
    let mut rows = stmt.query([])?;
    let mut entries = Vec::new();
    while let Some(row) = rows.next()? {
        let kind = if row.get::<_, i64>("kind")? == 0 {
            "person"
        } else {
            "location"
        };
        entries.push(ExportEntry {
            date: row.get("date")?,
            kind,
            name: row.get("name")?,
        });
    }
    Ok(entries)
}

fn render_lines(today: NaiveDate, entries: &[ExportEntry]) -> String {
    let mut out = String::new();
    out.push_str(EXPORT_FORMAT_HEADER);
    out.push('\n');
    out.push_str(&format!("# generated {}\n", today.format(DATE_FORMAT)));
    for entry in entries {
        out.push_str(&format!(
            "{} {} {}\n",
            entry.date,
            entry.kind,
            flatten_name(&entry.name)
        ));
    }
    out
}

/// Keeps the format line-oriented when names contain line breaks.
fn flatten_name(name: &str) -> String {
    name.replace(['\n', '\r'], " ")
}
