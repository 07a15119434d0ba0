//! SQLite-backed contact diary store.
//!
//! # Responsibility
//! - Implement `DiaryStoring`/`DiaryProviding` over a migrated connection.
//! - Keep every mutation and its published snapshot in one transaction.
//!
//! # Invariants
//! - All writes go through `mutate`, which serializes on the connection
//!   lock and publishes only committed state.
//! - A failed mutation rolls back and publishes nothing.
//! - Cleanup purges everything eligible or, on deadline, nothing at all.
//!
//! # See also
//! - docs/architecture/data-model.md

use crate::clock::{DateProviding, LocalDateProvider};
use crate::db::{open_db, open_db_in_memory, DbError};
use crate::model::diary::{
    ContactPerson, ContactPersonEncounter, DayEncounter, DayVisit, DiaryDay, Location,
    LocationVisit,
};
use crate::observer::subject::Subject;
use crate::store::diary_store::{
    retention_cutoff, visible_window, DiaryProviding, DiaryStoreError, DiaryStoreResult,
    DiaryStoring, DEFAULT_CLEANUP_TIMEOUT,
};
use crate::store::{export, DATE_FORMAT};
use chrono::NaiveDate;
use log::{debug, error, info, warn};
use rusqlite::{params, Connection, Row, Transaction};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

// Rows deleted per cleanup chunk; the deadline is checked between chunks.
const CLEANUP_CHUNK_SIZE: u32 = 500;

/// SQLite-backed diary store.
///
/// `Send + Sync`; mutations from any thread serialize on the connection
/// lock. Subscriber callbacks run synchronously on the mutating thread.
pub struct SqliteDiaryStore {
    conn: Mutex<Option<Connection>>,
    date_provider: Arc<dyn DateProviding>,
    diary_days: Subject<Vec<DiaryDay>>,
}

impl SqliteDiaryStore {
    /// Opens (or creates) the diary database at `path`.
    pub fn open(path: impl AsRef<Path>) -> DiaryStoreResult<Self> {
        Self::open_with_date_provider(path, Arc::new(LocalDateProvider))
    }

    /// Opens the diary database at `path` with an injected date source.
    pub fn open_with_date_provider(
        path: impl AsRef<Path>,
        date_provider: Arc<dyn DateProviding>,
    ) -> DiaryStoreResult<Self> {
        let conn = open_db(path)?;
        Self::from_connection(conn, date_provider)
    }

    /// Opens an in-memory store. Useful for tests and previews.
    pub fn open_in_memory() -> DiaryStoreResult<Self> {
        Self::open_in_memory_with_date_provider(Arc::new(LocalDateProvider))
    }

    /// Opens an in-memory store with an injected date source.
    pub fn open_in_memory_with_date_provider(
        date_provider: Arc<dyn DateProviding>,
    ) -> DiaryStoreResult<Self> {
        let conn = open_db_in_memory()?;
        Self::from_connection(conn, date_provider)
    }

    fn from_connection(
        conn: Connection,
        date_provider: Arc<dyn DateProviding>,
    ) -> DiaryStoreResult<Self> {
        let initial = read_diary_days(&conn, date_provider.today())?;
        Ok(Self {
            conn: Mutex::new(Some(conn)),
            date_provider,
            diary_days: Subject::new(initial),
        })
    }

    /// All contact persons, name-ordered case-insensitively.
    pub fn contact_persons(&self) -> DiaryStoreResult<Vec<ContactPerson>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name FROM contact_person
                 ORDER BY name COLLATE NOCASE ASC, id ASC;",
            )?;
            let mut rows = stmt.query([])?;
            let mut persons = Vec::new();
            while let Some(row) = rows.next()? {
                persons.push(ContactPerson {
                    id: row.get("id")?,
                    name: row.get("name")?,
                });
            }
            Ok(persons)
        })
    }

    /// All locations, name-ordered case-insensitively.
    pub fn locations(&self) -> DiaryStoreResult<Vec<Location>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name FROM location
                 ORDER BY name COLLATE NOCASE ASC, id ASC;",
            )?;
            let mut rows = stmt.query([])?;
            let mut locations = Vec::new();
            while let Some(row) = rows.next()? {
                locations.push(Location {
                    id: row.get("id")?,
                    name: row.get("name")?,
                });
            }
            Ok(locations)
        })
    }

    /// All retained encounters, oldest date first. Includes rows outside
    /// the visible window that cleanup has not purged yet.
    pub fn encounters(&self) -> DiaryStoreResult<Vec<ContactPersonEncounter>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, date, contact_person_id FROM contact_person_encounter
                 ORDER BY date ASC, id ASC;",
            )?;
            let mut rows = stmt.query([])?;
            let mut encounters = Vec::new();
            while let Some(row) = rows.next()? {
                encounters.push(parse_encounter_row(row)?);
            }
            Ok(encounters)
        })
    }

    /// All retained visits, oldest date first.
    pub fn location_visits(&self) -> DiaryStoreResult<Vec<LocationVisit>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, date, location_id FROM location_visit
                 ORDER BY date ASC, id ASC;",
            )?;
            let mut rows = stmt.query([])?;
            let mut visits = Vec::new();
            while let Some(row) = rows.next()? {
                visits.push(parse_visit_row(row)?);
            }
            Ok(visits)
        })
    }

    fn lock_conn(&self) -> MutexGuard<'_, Option<Connection>> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> DiaryStoreResult<T>,
    ) -> DiaryStoreResult<T> {
        let guard = self.lock_conn();
        let conn = guard.as_ref().ok_or(DbError::ConnectionClosed)?;
        f(conn)
    }

    /// Runs `f` inside a transaction, snapshots the visible window before
    /// commit, and publishes the snapshot after the connection lock is
    /// released.
    fn mutate<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&Transaction<'_>) -> DiaryStoreResult<T>,
    ) -> DiaryStoreResult<T> {
        let started_at = Instant::now();
        let today = self.date_provider.today();

        match self.run_transaction(today, f) {
            Ok((value, snapshot)) => {
                debug!(
                    "event={op} module=store status=ok duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                self.diary_days.send(snapshot);
                Ok(value)
            }
            Err(DiaryStoreError::Timeout) => {
                warn!(
                    "event={op} module=store status=timeout duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Err(DiaryStoreError::Timeout)
            }
            Err(err) => {
                error!(
                    "event={op} module=store status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn run_transaction<T>(
        &self,
        today: NaiveDate,
        f: impl FnOnce(&Transaction<'_>) -> DiaryStoreResult<T>,
    ) -> DiaryStoreResult<(T, Vec<DiaryDay>)> {
        let mut guard = self.lock_conn();
        let conn = guard.as_mut().ok_or(DbError::ConnectionClosed)?;
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        let snapshot = read_diary_days(&tx, today)?;
        tx.commit()?;
        Ok((value, snapshot))
    }
}

impl DiaryStoring for SqliteDiaryStore {
    fn add_contact_person(&self, name: &str) -> DiaryStoreResult<i64> {
        self.mutate("add_contact_person", |tx| {
            tx.execute(
                "INSERT INTO contact_person (name) VALUES (?1);",
                params![name],
            )?;
            Ok(tx.last_insert_rowid())
        })
    }

    fn add_location(&self, name: &str) -> DiaryStoreResult<i64> {
        self.mutate("add_location", |tx| {
            tx.execute("INSERT INTO location (name) VALUES (?1);", params![name])?;
            Ok(tx.last_insert_rowid())
        })
    }

    fn add_contact_person_encounter(
        &self,
        contact_person_id: i64,
        date: NaiveDate,
    ) -> DiaryStoreResult<i64> {
        self.mutate("add_contact_person_encounter", |tx| {
            tx.execute(
                "INSERT INTO contact_person_encounter (date, contact_person_id)
                 VALUES (?1, ?2);",
                params![encode_date(date), contact_person_id],
            )?;
            Ok(tx.last_insert_rowid())
        })
    }

    fn add_location_visit(&self, location_id: i64, date: NaiveDate) -> DiaryStoreResult<i64> {
        self.mutate("add_location_visit", |tx| {
            tx.execute(
                "INSERT INTO location_visit (date, location_id)
                 VALUES (?1, ?2);",
                params![encode_date(date), location_id],
            )?;
            Ok(tx.last_insert_rowid())
        })
    }

    fn update_contact_person(&self, id: i64, name: &str) -> DiaryStoreResult<()> {
        self.mutate("update_contact_person", |tx| {
            let changed = tx.execute(
                "UPDATE contact_person SET name = ?1 WHERE id = ?2;",
                params![name, id],
            )?;
            if changed == 0 {
                return Err(DbError::RowNotFound {
                    table: "contact_person",
                    id,
                }
                .into());
            }
            Ok(())
        })
    }

    fn update_location(&self, id: i64, name: &str) -> DiaryStoreResult<()> {
        self.mutate("update_location", |tx| {
            let changed = tx.execute(
                "UPDATE location SET name = ?1 WHERE id = ?2;",
                params![name, id],
            )?;
            if changed == 0 {
                return Err(DbError::RowNotFound {
                    table: "location",
                    id,
                }
                .into());
            }
            Ok(())
        })
    }

    fn remove_contact_person(&self, id: i64) -> DiaryStoreResult<()> {
        self.mutate("remove_contact_person", |tx| {
            tx.execute("DELETE FROM contact_person WHERE id = ?1;", params![id])?;
            Ok(())
        })
    }

    fn remove_location(&self, id: i64) -> DiaryStoreResult<()> {
        self.mutate("remove_location", |tx| {
            tx.execute("DELETE FROM location WHERE id = ?1;", params![id])?;
            Ok(())
        })
    }

    fn remove_contact_person_encounter(&self, id: i64) -> DiaryStoreResult<()> {
        self.mutate("remove_contact_person_encounter", |tx| {
            tx.execute(
                "DELETE FROM contact_person_encounter WHERE id = ?1;",
                params![id],
            )?;
            Ok(())
        })
    }

    fn remove_location_visit(&self, id: i64) -> DiaryStoreResult<()> {
        self.mutate("remove_location_visit", |tx| {
            tx.execute("DELETE FROM location_visit WHERE id = ?1;", params![id])?;
            Ok(())
        })
    }

    fn remove_all_contact_persons(&self) -> DiaryStoreResult<()> {
        self.mutate("remove_all_contact_persons", |tx| {
            tx.execute("DELETE FROM contact_person;", [])?;
            Ok(())
        })
    }

    fn remove_all_locations(&self) -> DiaryStoreResult<()> {
        self.mutate("remove_all_locations", |tx| {
            tx.execute("DELETE FROM location;", [])?;
            Ok(())
        })
    }

    fn cleanup(&self) -> DiaryStoreResult<()> {
        self.cleanup_with_timeout(DEFAULT_CLEANUP_TIMEOUT)
    }

    fn cleanup_with_timeout(&self, timeout: Duration) -> DiaryStoreResult<()> {
        let started_at = Instant::now();
        // None means the deadline overflowed and the sweep is unbounded.
        let deadline = started_at.checked_add(timeout);
        let cutoff = encode_date(retention_cutoff(self.date_provider.today()));

        let (purged_encounters, purged_visits) = self.mutate("cleanup", |tx| {
            let encounters = purge_expired(tx, "contact_person_encounter", &cutoff, deadline)?;
            let visits = purge_expired(tx, "location_visit", &cutoff, deadline)?;
            Ok((encounters, visits))
        })?;

        info!(
            "event=cleanup module=store status=done purged_encounters={purged_encounters} purged_visits={purged_visits} duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    fn reset(&self) -> DiaryStoreResult<()> {
        self.mutate("reset", |tx| {
            tx.execute_batch(
                "DELETE FROM contact_person_encounter;
                 DELETE FROM location_visit;
                 DELETE FROM contact_person;
                 DELETE FROM location;",
            )?;
            Ok(())
        })
    }

    fn close(&self) {
        let conn = { self.lock_conn().take() };
        match conn {
            Some(conn) => match conn.close() {
                Ok(()) => info!("event=db_close module=store status=ok"),
                Err((_conn, err)) => {
                    error!("event=db_close module=store status=error error={err}");
                }
            },
            None => info!("event=db_close module=store status=noop"),
        }
    }
}

impl DiaryProviding for SqliteDiaryStore {
    fn diary_days_publisher(&self) -> &Subject<Vec<DiaryDay>> {
        &self.diary_days
    }

    fn export(&self) -> DiaryStoreResult<String> {
        let today = self.date_provider.today();
        self.with_conn(|conn| export::render_export(conn, today))
    }
}

/// Builds the visible window from stored state: one `DiaryDay` per window
/// date, most recent first, entries name-ordered case-insensitively.
fn read_diary_days(conn: &Connection, today: NaiveDate) -> DiaryStoreResult<Vec<DiaryDay>> {
    let window = visible_window(today);
    let oldest = match window.last() {
        Some(date) => *date,
        None => return Ok(Vec::new()),
    };

    let mut days: Vec<DiaryDay> = window.into_iter().map(DiaryDay::empty).collect();
    load_day_encounters(conn, &mut days, oldest, today)?;
    load_day_visits(conn, &mut days, oldest, today)?;
    Ok(days)
}

fn load_day_encounters(
    conn: &Connection,
    days: &mut [DiaryDay],
    oldest: NaiveDate,
    today: NaiveDate,
) -> DiaryStoreResult<()> {
    let mut stmt = conn.prepare(
        "SELECT e.id AS entry_id, e.date AS date, p.id AS parent_id, p.name AS name
         FROM contact_person_encounter e
         JOIN contact_person p ON p.id = e.contact_person_id
         WHERE e.date >= ?1 AND e.date <= ?2
         ORDER BY p.name COLLATE NOCASE ASC, e.id ASC;",
    )?;
    let mut rows = stmt.query(params![encode_date(oldest), encode_date(today)])?;
    while let Some(row) = rows.next()? {
        let date = parse_date_text(&row.get::<_, String>("date")?)?;
        if let Some(day) = days.iter_mut().find(|day| day.date == date) {
            day.encounters.push(DayEncounter {
                encounter_id: row.get("entry_id")?,
                contact_person_id: row.get("parent_id")?,
                name: row.get("name")?,
            });
        }
    }
    Ok(())
}

fn load_day_visits(
    conn: &Connection,
    days: &mut [DiaryDay],
    oldest: NaiveDate,
    today: NaiveDate,
) -> DiaryStoreResult<()> {
    let mut stmt = conn.prepare(
        "SELECT v.id AS entry_id, v.date AS date, l.id AS parent_id, l.name AS name
         FROM location_visit v
         JOIN location l ON l.id = v.location_id
         WHERE v.date >= ?1 AND v.date <= ?2
         ORDER BY l.name COLLATE NOCASE ASC, v.id ASC;",
    )?;
    let mut rows = stmt.query(params![encode_date(oldest), encode_date(today)])?;
    while let Some(row) = rows.next()? {
        let date = parse_date_text(&row.get::<_, String>("date")?)?;
        if let Some(day) = days.iter_mut().find(|day| day.date == date) {
            day.visits.push(DayVisit {
                visit_id: row.get("entry_id")?,
                location_id: row.get("parent_id")?,
                name: row.get("name")?,
            });
        }
    }
    Ok(())
}

/// Deletes rows dated strictly before `cutoff` in chunks, checking the
/// deadline between chunks. On deadline the caller's transaction rolls
/// back, so a timeout never leaves a partial purge behind.
fn purge_expired(
    tx: &Transaction<'_>,
    table: &'static str,
    cutoff: &str,
    deadline: Option<Instant>,
) -> DiaryStoreResult<u64> {
    let mut purged: u64 = 0;
    loop {
        if deadline_passed(deadline) {
            return Err(DiaryStoreError::Timeout);
        }

        let deleted = tx.execute(
            &format!(
                "DELETE FROM {table} WHERE id IN (
                    SELECT id FROM {table} WHERE date < ?1 LIMIT {CLEANUP_CHUNK_SIZE}
                );"
            ),
            params![cutoff],
        )?;
        purged += deleted as u64;

        if deleted < CLEANUP_CHUNK_SIZE as usize {
            return Ok(purged);
        }
    }
}

fn deadline_passed(deadline: Option<Instant>) -> bool {
    deadline.map_or(false, |deadline| Instant::now() >= deadline)
}

fn parse_encounter_row(row: &Row<'_>) -> DiaryStoreResult<ContactPersonEncounter> {
    Ok(ContactPersonEncounter {
        id: row.get("id")?,
        date: parse_date_text(&row.get::<_, String>("date")?)?,
        contact_person_id: row.get("contact_person_id")?,
    })
}

fn parse_visit_row(row: &Row<'_>) -> DiaryStoreResult<LocationVisit> {
    Ok(LocationVisit {
        id: row.get("id")?,
        date: parse_date_text(&row.get::<_, String>("date")?)?,
        location_id: row.get("location_id")?,
    })
}

fn encode_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date_text(value: &str) -> Result<NaiveDate, rusqlite::Error> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(err))
    })
}
