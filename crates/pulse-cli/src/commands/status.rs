//! Status command for showing what has been recorded.

use std::io::Write;

use anyhow::{Context, Result};
use pulse_core::Reporter;
use pulse_db::Database;

use crate::Config;
use crate::commands::report::format_duration;

/// Languages listed by `pulse status`.
const TOP_LANGUAGES: usize = 3;

pub fn run<W: Write>(writer: &mut W, db: &Database, config: &Config) -> Result<()> {
    writeln!(writer, "Pulse status")?;
    writeln!(writer, "Database: {}", config.database_path.display())?;

    let snippets = db.snippet_count().context("failed to count snippets")?;
    if snippets == 0 {
        writeln!(writer, "No snippets recorded.")?;
        return Ok(());
    }

    let ledger = db
        .load_ledger(config.ledger_config())
        .context("failed to load recorded history")?;
    let last = db.last_snippet_at()?.unwrap_or_default();

    writeln!(writer, "Snippets: {snippets}")?;
    writeln!(writer, "Files: {}", ledger.files().count())?;
    writeln!(writer, "Languages: {}", ledger.languages().count())?;
    writeln!(writer, "Focused: {}", format_duration(ledger.total_time_ms()))?;
    writeln!(writer, "Last snippet: {last}")?;

    writeln!(writer, "Top languages:")?;
    let reporter = Reporter::new(&ledger, chrono::Utc);
    for language in reporter.top_languages(TOP_LANGUAGES) {
        writeln!(
            writer,
            "- {}: {} chars",
            language.language, language.char_count
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;
    use pulse_core::{Classification, Ledger, LedgerConfig};

    fn change(path: &str, language: &str, text: &str, ts: i64) -> pulse_core::ChangeEvent {
        pulse_core::ChangeEvent {
            file_path: path.into(),
            language_id: language.into(),
            inserted_text: text.into(),
            replaced_length: 0,
            timestamp_ms: ts,
        }
    }

    #[test]
    fn status_on_empty_database() {
        let temp = tempfile::tempdir().unwrap();
        let db_path = temp.path().join("pulse.db");
        let db = Database::open(&db_path).unwrap();
        let config = Config {
            database_path: db_path.clone(),
            ..Config::default()
        };

        let mut output = Vec::new();
        run(&mut output, &db, &config).unwrap();

        let output = String::from_utf8(output).unwrap();
        let output = output.replace(&db_path.display().to_string(), "[TEMP]/pulse.db");
        assert_snapshot!(output, @r"
        Pulse status
        Database: [TEMP]/pulse.db
        No snippets recorded.
        ");
    }

    #[test]
    fn status_lists_counts_and_top_languages() {
        let temp = tempfile::tempdir().unwrap();
        let db_path = temp.path().join("pulse.db");
        let mut db = Database::open(&db_path).unwrap();

        let mut ledger = Ledger::new(LedgerConfig::default());
        ledger.record(&change("/w/a.rs", "rust", "fn main() {}", 1_700_000_000_000), Classification::Manual);
        ledger.record(&change("/w/b.rs", "rust", "x", 1_700_000_001_000), Classification::Manual);
        ledger.record(&change("/w/c.py", "python", "pass", 1_700_000_002_000), Classification::Paste);
        db.insert_snippets(ledger.snippets()).unwrap();

        let config = Config {
            database_path: db_path.clone(),
            ..Config::default()
        };
        let mut output = Vec::new();
        run(&mut output, &db, &config).unwrap();

        let output = String::from_utf8(output).unwrap();
        let output = output.replace(&db_path.display().to_string(), "[TEMP]/pulse.db");
        assert_snapshot!(output, @r"
        Pulse status
        Database: [TEMP]/pulse.db
        Snippets: 3
        Files: 3
        Languages: 2
        Focused: 0m
        Last snippet: 2023-11-14T22:13:22.000Z
        Top languages:
        - rust: 13 chars
        - python: 4 chars
        ");
    }
}
