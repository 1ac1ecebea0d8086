//! Ingest command: replays host events through the engine.
//!
//! Input is one JSON object per line, tagged by `type`:
//!
//! ```text
//! {"type":"focus","file_path":"/w/src/main.rs","language_id":"rust","timestamp":1700000000000}
//! {"type":"change","file_path":"/w/src/main.rs","language_id":"rust","inserted_text":"x","timestamp":1700000000500}
//! {"type":"deferred","file_path":"/w/src/main.rs","language_id":"rust","inserted_text":"...","timestamp":1700000000400,"classification":"paste"}
//! {"type":"focus","file_path":null,"timestamp":1700000009000}
//! ```
//!
//! Each run is one editing session: the classifier starts from an empty
//! context and the session is torn down at the last event's timestamp.
//! With an idle timeout configured, the engine replays the idle timer from
//! the accepted events' timestamps; rejected lines never move it.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use pulse_core::{ChangeEvent, Classification, Engine, FocusTarget, InputError};
use pulse_db::Database;
use serde::Deserialize;

use crate::Config;

/// Language recorded for focus events that don't name one.
const DEFAULT_LANGUAGE: &str = "plaintext";

/// One line of host input.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    /// A content change.
    Change(ChangeEvent),
    /// Focus moved to a document, or away from the editor when `file_path` is null.
    Focus {
        file_path: Option<String>,
        #[serde(default)]
        language_id: Option<String>,
        timestamp: i64,
    },
    /// A change whose label was settled by a host-side check after the fact.
    Deferred {
        #[serde(flatten)]
        change: ChangeEvent,
        classification: Classification,
    },
}

impl HostEvent {
    pub const fn timestamp_ms(&self) -> i64 {
        match self {
            Self::Change(change) | Self::Deferred { change, .. } => change.timestamp_ms,
            Self::Focus { timestamp, .. } => *timestamp,
        }
    }

    fn apply(self, engine: &mut Engine) -> Result<bool, InputError> {
        match self {
            Self::Change(change) => Ok(engine.handle_change(&change)?.is_some()),
            Self::Deferred {
                change,
                classification,
            } => Ok(engine.record_deferred(&change, classification)?.is_some()),
            Self::Focus {
                file_path,
                language_id,
                timestamp,
            } => {
                let target = file_path.map(|path| {
                    FocusTarget::new(
                        path,
                        language_id.unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
                    )
                });
                engine.handle_focus(target, timestamp)?;
                Ok(false)
            }
        }
    }
}

/// Counters for one ingest run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Events accepted by the engine.
    pub events: usize,
    /// Snippets recorded.
    pub snippets: usize,
    /// Well-formed events the engine refused.
    pub rejected: usize,
    /// Lines that were not valid host events.
    pub malformed: usize,
    /// Times the idle timer fired.
    pub idle_flushes: usize,
}

/// Feeds every event in `reader` through `engine`, then tears the session down.
pub fn replay<R: BufRead>(engine: &mut Engine, reader: R) -> Result<IngestStats> {
    let mut stats = IngestStats::default();
    let mut last_ms: Option<i64> = None;

    for (index, line) in reader.lines().enumerate() {
        let line = line.context("failed to read event input")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event: HostEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(line = index + 1, error = %e, "skipping malformed event");
                stats.malformed += 1;
                continue;
            }
        };

        let ts = event.timestamp_ms();
        // Accepted live events fire an overdue idle timer inside the engine.
        let timer_due = !matches!(event, HostEvent::Deferred { .. })
            && engine.idle_deadline().is_some_and(|deadline| deadline <= ts);

        match event.apply(engine) {
            Ok(recorded) => {
                stats.events += 1;
                if recorded {
                    stats.snippets += 1;
                }
                if timer_due {
                    stats.idle_flushes += 1;
                }
                last_ms = Some(last_ms.map_or(ts, |last| last.max(ts)));
            }
            Err(e) => {
                tracing::warn!(line = index + 1, error = %e, "rejected event");
                stats.rejected += 1;
            }
        }
    }

    if let Some(end) = last_ms {
        engine.shutdown(end);
    }

    Ok(stats)
}

/// Runs the ingest command against `db`.
pub fn run<R: BufRead, W: Write>(
    db: &mut Database,
    config: &Config,
    reader: R,
    writer: &mut W,
) -> Result<IngestStats> {
    let ledger = db
        .load_ledger(config.ledger_config())
        .context("failed to load recorded history")?;
    let known = ledger.snippets().len();

    let mut engine = Engine::with_ledger(ledger, config.allocation_config());
    let stats = replay(&mut engine, reader)?;
    let ledger = engine.into_ledger();

    let inserted = db
        .insert_snippets(&ledger.snippets()[known..])
        .context("failed to store snippets")?;
    db.save_time(&ledger)
        .context("failed to store focus time")?;

    tracing::info!(
        events = stats.events,
        snippets = inserted,
        rejected = stats.rejected,
        malformed = stats.malformed,
        "ingest complete"
    );

    writeln!(
        writer,
        "Ingested {} events: {} snippets recorded, {} rejected, {} malformed",
        stats.events, stats.snippets, stats.rejected, stats.malformed
    )?;

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use pulse_core::{AllocationConfig, Ledger};

    use super::*;

    fn test_config() -> Config {
        Config {
            database_path: PathBuf::from(":memory:"),
            idle_timeout_secs: 30,
            preview_chars: 200,
            recent_snippets: 50,
            workspaces: Vec::new(),
        }
    }

    fn change_line(path: &str, text: &str, ts: i64) -> String {
        serde_json::json!({
            "type": "change",
            "file_path": path,
            "language_id": "rust",
            "inserted_text": text,
            "timestamp": ts,
        })
        .to_string()
    }

    #[test]
    fn parses_every_event_type() {
        let change: HostEvent = serde_json::from_str(&change_line("/a.rs", "x", 5)).unwrap();
        assert_eq!(change.timestamp_ms(), 5);
        assert!(matches!(change, HostEvent::Change(ref c) if c.replaced_length == 0));

        let blur: HostEvent =
            serde_json::from_str(r#"{"type":"focus","file_path":null,"timestamp":9}"#).unwrap();
        assert_eq!(
            blur,
            HostEvent::Focus {
                file_path: None,
                language_id: None,
                timestamp: 9
            }
        );

        let deferred: HostEvent = serde_json::from_str(
            r#"{"type":"deferred","file_path":"/a.rs","language_id":"rust","inserted_text":"p","replaced_length":3,"timestamp":7,"classification":"paste"}"#,
        )
        .unwrap();
        match deferred {
            HostEvent::Deferred {
                change,
                classification,
            } => {
                assert_eq!(classification, Classification::Paste);
                assert_eq!(change.replaced_length, 3);
                assert_eq!(change.timestamp_ms, 7);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn replay_counts_and_skips_bad_input() {
        let input = [
            r#"{"type":"focus","file_path":"/w/a.rs","language_id":"rust","timestamp":0}"#.to_string(),
            change_line("/w/a.rs", &"p".repeat(60), 1_000),
            change_line("/w/a.rs", &"a".repeat(25), 1_030),
            change_line("/w/a.rs", "x", 5_000),
            "not json".to_string(),
            String::new(),
            change_line("/w/a.rs", "late", 4_000),
            r#"{"type":"focus","file_path":null,"timestamp":20000}"#.to_string(),
        ]
        .join("\n");

        let mut engine = Engine::default();
        let stats = replay(&mut engine, input.as_bytes()).unwrap();

        assert_eq!(
            stats,
            IngestStats {
                events: 5,
                snippets: 3,
                rejected: 1,
                malformed: 1,
                idle_flushes: 0,
            }
        );
        let file = engine.ledger().file("/w/a.rs").unwrap();
        assert_eq!(file.by_classification.paste.count, 1);
        assert_eq!(file.by_classification.ai.count, 1);
        assert_eq!(file.by_classification.manual.count, 1);
        assert_eq!(file.time_secs(), 20);
    }

    fn focus_line(path: Option<&str>, ts: i64) -> String {
        serde_json::json!({
            "type": "focus",
            "file_path": path,
            "language_id": "rust",
            "timestamp": ts,
        })
        .to_string()
    }

    fn idle_engine() -> Engine {
        Engine::with_ledger(Ledger::default(), AllocationConfig::with_idle_timeout(30_000))
    }

    #[test]
    fn replay_credits_every_focused_interval_by_default() {
        let input = [
            focus_line(Some("/w/a.rs"), 0),
            focus_line(None, 120_000),
            focus_line(Some("/w/a.rs"), 180_000),
            focus_line(None, 210_000),
        ]
        .join("\n");

        let mut engine = Engine::default();
        let stats = replay(&mut engine, input.as_bytes()).unwrap();

        assert_eq!(stats.idle_flushes, 0);
        assert_eq!(engine.ledger().file("/w/a.rs").unwrap().time_secs(), 150);
    }

    #[test]
    fn replay_ignores_rejected_events_for_idle_timer() {
        let input = [
            focus_line(Some("/w/a.rs"), 0),
            change_line("/w/a.rs", "x", 10_000),
            r#"{"type":"change","file_path":"/w/a.rs","language_id":"rust","inserted_text":"y","replaced_length":-1,"timestamp":999999999}"#.to_string(),
            change_line("/w/a.rs", "z", 15_000),
            focus_line(None, 20_000),
        ]
        .join("\n");

        let mut engine = idle_engine();
        let stats = replay(&mut engine, input.as_bytes()).unwrap();

        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.idle_flushes, 0);
        assert_eq!(engine.ledger().file("/w/a.rs").unwrap().time_secs(), 20);
    }

    #[test]
    fn replay_fires_idle_timer_between_events() {
        let input = [
            focus_line(Some("/w/a.rs"), 0),
            change_line("/w/a.rs", "x", 10_000),
            // Nothing for 90 s: the timer fires at 40 s.
            change_line("/w/a.rs", "y", 100_000),
        ]
        .join("\n");

        let mut engine = idle_engine();
        let stats = replay(&mut engine, input.as_bytes()).unwrap();

        assert_eq!(stats.idle_flushes, 1);
        // 40 s before going idle; the session resumes at 100 s and ends there.
        assert_eq!(engine.ledger().file("/w/a.rs").unwrap().time_secs(), 40);
    }

    #[test]
    fn run_persists_new_snippets_and_time() {
        let mut db = Database::open_in_memory().unwrap();
        let config = test_config();

        let first = [
            r#"{"type":"focus","file_path":"/w/a.rs","language_id":"rust","timestamp":0}"#.to_string(),
            change_line("/w/a.rs", "fn main() {}", 2_000),
        ]
        .join("\n");
        let mut output = Vec::new();
        run(&mut db, &config, first.as_bytes(), &mut output).unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "Ingested 2 events: 1 snippets recorded, 0 rejected, 0 malformed\n"
        );

        let second = change_line("/w/b.rs", "x", 10_000);
        let mut output = Vec::new();
        run(&mut db, &config, second.as_bytes(), &mut output).unwrap();

        assert_eq!(db.snippet_count().unwrap(), 2);
        let ledger = db.load_ledger(config.ledger_config()).unwrap();
        assert_eq!(ledger.file("/w/a.rs").unwrap().time_ms, 2_000);
        assert_eq!(ledger.file("/w/a.rs").unwrap().char_count, 12);
        assert_eq!(ledger.file("/w/b.rs").unwrap().char_count, 1);
    }
}
