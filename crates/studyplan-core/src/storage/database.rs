//! SQLite-based study history and statistics.
//!
//! Provides persistent storage for:
//! - Finished study sessions (planned, extended, free)
//! - Aggregated statistics (today, this week, all time, per subject)
//! - Key-value store for application state such as the last plan

use std::path::Path;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::data_dir;
use crate::error::{CoreError, DatabaseError, Result};
use crate::session::{SessionKind, SessionRecord, SessionSink};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TOP_SUBJECTS: usize = 5;
const RECENT_SESSIONS: usize = 10;

/// A session row as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub id: i64,
    #[serde(flatten)]
    pub record: SessionRecord,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectTotal {
    pub subject: String,
    pub minutes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudyStats {
    pub today_minutes: u64,
    pub today_sessions: u64,
    /// Week starts on Sunday.
    pub week_minutes: u64,
    pub week_sessions: u64,
    pub total_minutes: u64,
    pub total_sessions: u64,
    pub top_subjects: Vec<SubjectTotal>,
    pub recent: Vec<StoredSession>,
}

/// SQLite database for study history.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `~/.config/studyplan/studyplan.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the data directory or database cannot be opened.
    pub fn open() -> Result<Self> {
        let path = data_dir().map_err(CoreError::Io)?.join("studyplan.db");
        Ok(Self::open_at(&path)?)
    }

    /// Open (or create) a database file at `path`.
    ///
    /// # Errors
    /// Returns [`DatabaseError::OpenFailed`] if SQLite cannot open the file,
    /// or a query error if the schema cannot be created.
    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    #[cfg(test)]
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                id               INTEGER PRIMARY KEY AUTOINCREMENT,
                subject          TEXT NOT NULL,
                duration_minutes INTEGER NOT NULL,
                date             TEXT NOT NULL,
                kind             TEXT NOT NULL,
                notes            TEXT,
                created_at       TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_date ON sessions(date);
            CREATE INDEX IF NOT EXISTS idx_sessions_subject ON sessions(subject);",
        )?;
        Ok(())
    }

    /// Append a finished session. Returns the new row id.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn record_session(&self, record: &SessionRecord) -> Result<i64, DatabaseError> {
        self.conn.execute(
            "INSERT INTO sessions (subject, duration_minutes, date, kind, notes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.subject,
                record.duration_minutes,
                record.date.format(DATE_FORMAT).to_string(),
                record.kind.as_str(),
                record.notes,
                Utc::now().to_rfc3339(),
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(id, subject = %record.subject, minutes = record.duration_minutes, "session recorded");
        Ok(id)
    }

    /// Newest first; `limit` of `None` returns everything.
    pub fn list_sessions(&self, limit: Option<usize>) -> Result<Vec<StoredSession>, DatabaseError> {
        let limit = limit.map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));
        let mut stmt = self.conn.prepare(
            "SELECT id, subject, duration_minutes, date, kind, notes, created_at
             FROM sessions
             ORDER BY date DESC, id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], row_to_session)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Delete one session. Returns whether a row was removed.
    pub fn remove_session(&self, id: i64) -> Result<bool, DatabaseError> {
        let removed = self
            .conn
            .execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    /// Aggregate history relative to `today`.
    pub fn stats(&self, today: NaiveDate) -> Result<StudyStats, DatabaseError> {
        let week_start =
            today - Duration::days(i64::from(today.weekday().num_days_from_sunday()));

        let (total_sessions, total_minutes) = self.totals_between(None)?;
        let (today_sessions, today_minutes) = self.totals_between(Some((today, today)))?;
        let (week_sessions, week_minutes) = self.totals_between(Some((week_start, today)))?;

        let mut stmt = self.conn.prepare(
            "SELECT subject, SUM(duration_minutes) AS minutes
             FROM sessions
             GROUP BY subject
             ORDER BY minutes DESC, subject ASC
             LIMIT ?1",
        )?;
        let top_subjects = stmt
            .query_map(params![TOP_SUBJECTS as i64], |row| {
                Ok(SubjectTotal {
                    subject: row.get(0)?,
                    minutes: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(StudyStats {
            today_minutes,
            today_sessions,
            week_minutes,
            week_sessions,
            total_minutes,
            total_sessions,
            top_subjects,
            recent: self.list_sessions(Some(RECENT_SESSIONS))?,
        })
    }

    /// Session count and minutes on or after `from` (all rows when `None`).
    /// Rows dated after today still count; dates are compared as ISO text.
    /// Session count and minutes, optionally limited to an inclusive day range.
    fn totals_between(
        &self,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<(u64, u64), rusqlite::Error> {
        let totals = |row: &rusqlite::Row<'_>| -> rusqlite::Result<(u64, u64)> {
            Ok((row.get(0)?, row.get(1)?))
        };
        match range {
            None => self.conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(duration_minutes), 0) FROM sessions",
                [],
                totals,
            ),
            Some((from, to)) => self.conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(duration_minutes), 0)
                 FROM sessions
                 WHERE date BETWEEN ?1 AND ?2",
                params![from.format(DATE_FORMAT).to_string(), to.format(DATE_FORMAT).to_string()],
                totals,
            ),
        }
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

impl SessionSink for Database {
    fn record(&mut self, record: &SessionRecord) -> Result<()> {
        self.record_session(record)?;
        Ok(())
    }
}

fn row_to_session(row: &Row<'_>) -> Result<StoredSession, rusqlite::Error> {
    let date: String = row.get(3)?;
    let date = NaiveDate::parse_from_str(&date, DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;
    let kind: String = row.get(4)?;
    let kind = SessionKind::parse(&kind).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            Type::Text,
            format!("unknown session kind '{kind}'").into(),
        )
    })?;
    let created_at: String = row.get(6)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?
        .with_timezone(&Utc);

    Ok(StoredSession {
        id: row.get(0)?,
        record: SessionRecord {
            subject: row.get(1)?,
            duration_minutes: row.get(2)?,
            date,
            kind,
            notes: row.get(5)?,
        },
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(subject: &str, minutes: u32, date: &str, kind: SessionKind) -> SessionRecord {
        SessionRecord {
            subject: subject.into(),
            duration_minutes: minutes,
            date: NaiveDate::parse_from_str(date, DATE_FORMAT).unwrap(),
            kind,
            notes: None,
        }
    }

    #[test]
    fn record_and_list() {
        let db = Database::open_memory().unwrap();
        let id = db
            .record_session(&record("Math A", 15, "2024-05-01", SessionKind::Planned))
            .unwrap();
        let rows = db.list_sessions(None).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, id);
        assert_eq!(rows[0].record.subject, "Math A");
        assert_eq!(rows[0].record.kind, SessionKind::Planned);

        assert!(db.remove_session(id).unwrap());
        assert!(!db.remove_session(id).unwrap());
        assert!(db.list_sessions(None).unwrap().is_empty());
    }

    #[test]
    fn stats_split_today_week_and_total() {
        let db = Database::open_memory().unwrap();
        // 2024-05-08 is a Wednesday; its week starts Sunday 2024-05-05.
        let today = NaiveDate::from_ymd_opt(2024, 5, 8).unwrap();
        db.record_session(&record("Math A", 30, "2024-05-08", SessionKind::Planned)).unwrap();
        db.record_session(&record("Basic Physics", 20, "2024-05-05", SessionKind::Planned)).unwrap();
        db.record_session(&record("Math A", 10, "2024-05-04", SessionKind::Extended)).unwrap();
        db.record_session(&record("free study", 50, "2024-04-01", SessionKind::Free)).unwrap();

        let stats = db.stats(today).unwrap();
        assert_eq!((stats.today_sessions, stats.today_minutes), (1, 30));
        assert_eq!((stats.week_sessions, stats.week_minutes), (2, 50));
        assert_eq!((stats.total_sessions, stats.total_minutes), (4, 110));
        assert_eq!(stats.top_subjects[0].subject, "free study");
        assert_eq!(stats.top_subjects[1], SubjectTotal { subject: "Math A".into(), minutes: 40 });
        assert_eq!(stats.recent[0].record.date, today);
    }

    #[test]
    fn stats_ignore_sessions_dated_after_today() {
        let db = Database::open_memory().unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 5, 8).unwrap();
        db.record_session(&record("Math A", 30, "2024-05-08", SessionKind::Planned)).unwrap();
        db.record_session(&record("Math A", 15, "2024-05-09", SessionKind::Planned)).unwrap();
        db.record_session(&record("Basic Physics", 5, "2024-06-01", SessionKind::Planned)).unwrap();

        let stats = db.stats(today).unwrap();
        assert_eq!((stats.today_sessions, stats.today_minutes), (1, 30));
        assert_eq!((stats.week_sessions, stats.week_minutes), (1, 30));
        assert_eq!((stats.total_sessions, stats.total_minutes), (3, 50));
    }

    #[test]
    fn stats_limits_top_and_recent() {
        let db = Database::open_memory().unwrap();
        for i in 0..12u32 {
            let subject = format!("Subject {}", i % 7);
            db.record_session(&record(&subject, 5 + i, "2024-05-01", SessionKind::Planned)).unwrap();
        }
        let stats = db.stats(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()).unwrap();
        assert_eq!(stats.top_subjects.len(), 5);
        assert_eq!(stats.recent.len(), 10);
    }

    #[test]
    fn works_as_session_sink() {
        let mut db = Database::open_memory().unwrap();
        let sink: &mut dyn SessionSink = &mut db;
        sink.record(&record("Music", 5, "2024-05-01", SessionKind::Free)).unwrap();
        assert_eq!(db.list_sessions(Some(5)).unwrap().len(), 1);
    }

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");
    }
}
