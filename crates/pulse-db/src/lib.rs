//! Storage layer for pulse.
//!
//! Provides persistence for snippets and accrued focus time using `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! A `Database` instance can be moved between threads but cannot be shared
//! across threads without external synchronization.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in RFC 3339 format with millisecond precision
//! (e.g., `2024-01-15T10:30:00.000Z`), always in UTC.
//!
//! ## What Is Stored
//!
//! Only the snippet log and accrued focus time are stored. Per-file and
//! per-language character counts are never written: loading replays the log
//! through [`Ledger::record_snippet`], so they are always a fold of it.
//! Snippets load in insertion order, which is the log's arrival order.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use pulse_core::{Classification, Ledger, LedgerConfig, Snippet, SnippetId, ValidationError};
use rusqlite::{Connection, params};
use thiserror::Error;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp for snippet {snippet_id}: {timestamp}")]
    TimestampParse {
        snippet_id: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored value failed validation.
    #[error("invalid data for snippet {snippet_id}")]
    InvalidSnippet {
        snippet_id: String,
        #[source]
        source: ValidationError,
    },
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// Raw snippet row before validation.
struct SnippetRow {
    id: String,
    timestamp: String,
    file_path: String,
    folder: String,
    language: String,
    classification: String,
    text: String,
    char_count: i64,
    line_count: i64,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            -- Snippets table: the append-only change log
            -- timestamp: RFC 3339 in UTC (e.g., '2024-01-15T10:30:00.000Z')
            -- classification: 'manual', 'paste', or 'ai'
            CREATE TABLE IF NOT EXISTS snippets (
                id TEXT PRIMARY KEY,
                timestamp TEXT NOT NULL,
                file_path TEXT NOT NULL,
                folder TEXT NOT NULL,
                language TEXT NOT NULL,
                classification TEXT NOT NULL,
                text TEXT NOT NULL,
                char_count INTEGER NOT NULL,
                line_count INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_snippets_timestamp ON snippets(timestamp);
            CREATE INDEX IF NOT EXISTS idx_snippets_file ON snippets(file_path);

            CREATE TABLE IF NOT EXISTS file_time (
                file_path TEXT PRIMARY KEY,
                language TEXT NOT NULL,
                time_ms INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS language_time (
                language TEXT PRIMARY KEY,
                time_ms INTEGER NOT NULL DEFAULT 0
            );
            ",
        )?;
        Ok(())
    }

    /// Inserts a batch of snippets, ignoring duplicates by ID.
    pub fn insert_snippets(&mut self, snippets: &[Snippet]) -> Result<usize, DbError> {
        if snippets.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "
                INSERT OR IGNORE INTO snippets
                (id, timestamp, file_path, folder, language, classification, text, char_count, line_count)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
            )?;
            for snippet in snippets {
                inserted += stmt.execute(params![
                    snippet.id.as_str(),
                    format_timestamp(snippet.timestamp),
                    snippet.file_path,
                    snippet.folder,
                    snippet.language,
                    snippet.classification.as_str(),
                    snippet.text,
                    to_sql_count(snippet.char_count),
                    to_sql_count(snippet.line_count),
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(inserted, "stored snippets");
        Ok(inserted)
    }

    /// Lists all snippets in insertion order.
    pub fn snippets(&self) -> Result<Vec<Snippet>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, timestamp, file_path, folder, language, classification, text, char_count, line_count
            FROM snippets
            ORDER BY rowid ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SnippetRow {
                id: row.get(0)?,
                timestamp: row.get(1)?,
                file_path: row.get(2)?,
                folder: row.get(3)?,
                language: row.get(4)?,
                classification: row.get(5)?,
                text: row.get(6)?,
                char_count: row.get(7)?,
                line_count: row.get(8)?,
            })
        })?;
        let mut snippets = Vec::new();
        for row in rows {
            snippets.push(snippet_from_row(row?)?);
        }
        Ok(snippets)
    }

    /// Number of stored snippets.
    pub fn snippet_count(&self) -> Result<u64, DbError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM snippets", [], |row| row.get(0))?;
        Ok(from_sql_count(count))
    }

    /// Timestamp of the most recent snippet, if any.
    pub fn last_snippet_at(&self) -> Result<Option<String>, DbError> {
        let last: Option<String> =
            self.conn
                .query_row("SELECT MAX(timestamp) FROM snippets", [], |row| row.get(0))?;
        Ok(last)
    }

    /// Writes the ledger's accrued focus time, replacing stored values.
    pub fn save_time(&mut self, ledger: &Ledger) -> Result<(), DbError> {
        let tx = self.conn.transaction()?;
        {
            let mut files = tx.prepare(
                "
                INSERT INTO file_time (file_path, language, time_ms) VALUES (?, ?, ?)
                ON CONFLICT(file_path) DO UPDATE SET
                    language = excluded.language,
                    time_ms = excluded.time_ms
                ",
            )?;
            for file in ledger.files().filter(|f| f.time_ms > 0) {
                files.execute(params![file.file_path, file.language, file.time_ms])?;
            }

            let mut languages = tx.prepare(
                "
                INSERT INTO language_time (language, time_ms) VALUES (?, ?)
                ON CONFLICT(language) DO UPDATE SET time_ms = excluded.time_ms
                ",
            )?;
            for language in ledger.languages().filter(|l| l.time_ms > 0) {
                languages.execute(params![language.language, language.time_ms])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Rebuilds a ledger from stored snippets and focus time.
    pub fn load_ledger(&self, config: LedgerConfig) -> Result<Ledger, DbError> {
        let mut ledger = Ledger::new(config);
        for snippet in self.snippets()? {
            ledger.record_snippet(snippet);
        }

        let mut stmt = self
            .conn
            .prepare("SELECT file_path, language, time_ms FROM file_time ORDER BY file_path")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;
        for row in rows {
            let (file_path, language, time_ms) = row?;
            ledger.restore_file_time(&file_path, &language, time_ms);
        }

        let mut stmt = self
            .conn
            .prepare("SELECT language, time_ms FROM language_time ORDER BY language")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (language, time_ms) = row?;
            ledger.restore_language_time(&language, time_ms);
        }

        tracing::debug!(snippets = ledger.snippets().len(), "loaded ledger");
        Ok(ledger)
    }
}

fn snippet_from_row(row: SnippetRow) -> Result<Snippet, DbError> {
    let invalid = |source| DbError::InvalidSnippet {
        snippet_id: row.id.clone(),
        source,
    };
    let id = SnippetId::new(row.id.clone()).map_err(invalid)?;
    let classification: Classification = row.classification.parse().map_err(invalid)?;
    let timestamp = parse_timestamp(&row.timestamp, &row.id)?;

    Ok(Snippet {
        id,
        file_path: row.file_path,
        folder: row.folder,
        language: row.language,
        text: row.text,
        classification,
        timestamp,
        char_count: from_sql_count(row.char_count),
        line_count: from_sql_count(row.line_count),
    })
}

fn parse_timestamp(timestamp: &str, snippet_id: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            snippet_id: snippet_id.to_string(),
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn to_sql_count(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

fn from_sql_count(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}
