//! SQLite-based settings and challenge history.
//!
//! Provides persistent storage for:
//! - Key-value store for the user's alarm, quiz and email settings
//! - One row per resolved challenge, for `stats`

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::{CoreError, DatabaseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeOutcome {
    Success,
    Failure,
    /// Cancelled before resolving (disarmed under `abort_active`, or shutdown).
    Aborted,
}

impl ChallengeOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            ChallengeOutcome::Success => "success",
            ChallengeOutcome::Failure => "failure",
            ChallengeOutcome::Aborted => "aborted",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "success" => ChallengeOutcome::Success,
            "failure" => ChallengeOutcome::Failure,
            _ => ChallengeOutcome::Aborted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeRecord {
    pub id: i64,
    pub challenge_id: String,
    pub started_at: DateTime<Utc>,
    pub resolved_at: DateTime<Utc>,
    pub outcome: ChallengeOutcome,
    pub questions: u32,
    pub correct_answers: u32,
    pub restarts: u32,
    /// `sent`, `failed`, `skipped` or `None` when no email was due.
    pub notification: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total_challenges: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub aborted: u64,
    pub notifications_sent: u64,
    /// Successes since the most recent failure.
    pub current_streak: u64,
    pub last_challenge_at: Option<DateTime<Utc>>,
}

/// SQLite database for settings and challenge history.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `~/.config/momentum-maker/momentum.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("momentum.db");
        Ok(Self::open_at(&path)?)
    }

    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests and dry runs).
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS kv (
                    key   TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS challenges (
                    id              INTEGER PRIMARY KEY AUTOINCREMENT,
                    challenge_id    TEXT NOT NULL,
                    started_at      TEXT NOT NULL,
                    resolved_at     TEXT NOT NULL,
                    outcome         TEXT NOT NULL,
                    questions       INTEGER NOT NULL,
                    correct_answers INTEGER NOT NULL DEFAULT 0,
                    restarts        INTEGER NOT NULL DEFAULT 0,
                    notification    TEXT
                );

                CREATE INDEX IF NOT EXISTS idx_challenges_resolved_at ON challenges(resolved_at);",
            )
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))
    }

    /// Record a resolved (or aborted) challenge.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn record_challenge(&self, record: &ChallengeRecord) -> Result<i64, DatabaseError> {
        self.conn.execute(
            "INSERT INTO challenges
                (challenge_id, started_at, resolved_at, outcome, questions,
                 correct_answers, restarts, notification)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.challenge_id,
                record.started_at.to_rfc3339(),
                record.resolved_at.to_rfc3339(),
                record.outcome.as_str(),
                record.questions,
                record.correct_answers,
                record.restarts,
                record.notification,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent challenges first.
    pub fn recent_challenges(&self, limit: usize) -> Result<Vec<ChallengeRecord>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, challenge_id, started_at, resolved_at, outcome, questions,
                    correct_answers, restarts, notification
             FROM challenges
             ORDER BY resolved_at DESC, id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(ChallengeRecord {
                id: row.get(0)?,
                challenge_id: row.get(1)?,
                started_at: parse_ts(&row.get::<_, String>(2)?),
                resolved_at: parse_ts(&row.get::<_, String>(3)?),
                outcome: ChallengeOutcome::parse(&row.get::<_, String>(4)?),
                questions: row.get(5)?,
                correct_answers: row.get(6)?,
                restarts: row.get(7)?,
                notification: row.get(8)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn stats(&self) -> Result<Stats, DatabaseError> {
        let mut stats = Stats::default();

        let mut stmt = self
            .conn
            .prepare("SELECT outcome, COUNT(*) FROM challenges GROUP BY outcome")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?))
        })?;
        for row in rows {
            let (outcome, count) = row?;
            stats.total_challenges += count;
            match ChallengeOutcome::parse(&outcome) {
                ChallengeOutcome::Success => stats.succeeded += count,
                ChallengeOutcome::Failure => stats.failed += count,
                ChallengeOutcome::Aborted => stats.aborted += count,
            }
        }

        stats.notifications_sent = self.conn.query_row(
            "SELECT COUNT(*) FROM challenges WHERE notification = 'sent'",
            [],
            |row| row.get(0),
        )?;

        // Aborted challenges neither extend nor break the streak.
        stats.current_streak = self.conn.query_row(
            "SELECT COUNT(*) FROM challenges
             WHERE outcome = 'success'
               AND resolved_at > COALESCE(
                   (SELECT MAX(resolved_at) FROM challenges WHERE outcome = 'failure'), '')",
            [],
            |row| row.get(0),
        )?;

        let last: Option<String> =
            self.conn
                .query_row("SELECT MAX(resolved_at) FROM challenges", [], |row| row.get(0))?;
        stats.last_challenge_at = last.as_deref().map(parse_ts);

        Ok(stats)
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

    pub fn kv_delete(&self, key: &str) -> Result<(), DatabaseError> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}
