//! Append-only snippet log and the aggregates materialized from it.
//!
//! The [`Ledger`] owns both the log and the per-file / per-language views.
//! Character counts only change through [`Ledger::record`] and
//! [`Ledger::record_snippet`], which share one code path, so the views are
//! always a fold of the log. Focus time is the one field the log does not
//! carry; it is written by the time allocator.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{ChangeEvent, FocusTarget, count_lines};
use crate::types::{ByClassification, Classification, SnippetId};
use crate::workspace::{WorkspaceRoot, folder_key};

/// Settings for snippet construction and folder keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Maximum characters kept in a snippet's text preview.
    /// Default: 200.
    pub preview_chars: usize,

    /// Maximum snippets kept in each file's recent list.
    /// Default: 50.
    pub recent_snippets: usize,

    /// Workspace roots used to derive folder keys.
    pub workspaces: Vec<WorkspaceRoot>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            preview_chars: 200,
            recent_snippets: 50,
            workspaces: Vec::new(),
        }
    }
}

/// One classified, recorded content change. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    pub id: SnippetId,
    pub file_path: String,
    pub folder: String,
    pub language: String,
    /// Preview of the inserted text, truncated to the configured length.
    pub text: String,
    pub classification: Classification,
    pub timestamp: DateTime<Utc>,
    /// Length of the full inserted text, in characters.
    pub char_count: u64,
    pub line_count: u64,
}

/// Running totals for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAggregate {
    pub file_path: String,
    pub folder: String,
    /// Language of the most recent snippet or focus for this file.
    pub language: String,
    pub char_count: u64,
    pub line_count: u64,
    /// Accrued focus time in milliseconds.
    pub time_ms: i64,
    pub by_classification: ByClassification,
    /// Most recent snippets, oldest first, bounded by `recent_snippets`.
    pub recent: VecDeque<Snippet>,
}

impl FileAggregate {
    fn new(file_path: &str, folder: String, language: &str) -> Self {
        Self {
            file_path: file_path.to_string(),
            folder,
            language: language.to_string(),
            char_count: 0,
            line_count: 0,
            time_ms: 0,
            by_classification: ByClassification::default(),
            recent: VecDeque::new(),
        }
    }

    /// Accrued focus time in whole seconds.
    pub const fn time_secs(&self) -> i64 {
        self.time_ms / 1000
    }
}

/// Running totals for one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageAggregate {
    pub language: String,
    pub char_count: u64,
    pub line_count: u64,
    /// Accrued focus time in milliseconds.
    pub time_ms: i64,
    pub by_classification: ByClassification,
}

impl LanguageAggregate {
    fn new(language: &str) -> Self {
        Self {
            language: language.to_string(),
            char_count: 0,
            line_count: 0,
            time_ms: 0,
            by_classification: ByClassification::default(),
        }
    }

    /// Accrued focus time in whole seconds.
    pub const fn time_secs(&self) -> i64 {
        self.time_ms / 1000
    }
}

/// The event log and its materialized aggregates.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    config: LedgerConfig,
    log: Vec<Snippet>,
    files: HashMap<String, FileAggregate>,
    languages: HashMap<String, LanguageAggregate>,
}

impl Ledger {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub const fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Records a classified change.
    ///
    /// Pure deletions produce no snippet and leave every count untouched.
    pub fn record(&mut self, event: &ChangeEvent, label: Classification) -> Option<&Snippet> {
        if event.is_deletion() {
            return None;
        }
        let Some(timestamp) = DateTime::from_timestamp_millis(event.timestamp_ms) else {
            tracing::warn!(
                timestamp_ms = event.timestamp_ms,
                "timestamp out of range, change dropped"
            );
            return None;
        };

        let snippet = Snippet {
            id: SnippetId::generate(),
            file_path: event.file_path.clone(),
            folder: folder_key(&event.file_path, &self.config.workspaces),
            language: event.language_id.clone(),
            text: event
                .inserted_text
                .chars()
                .take(self.config.preview_chars)
                .collect(),
            classification: label,
            timestamp,
            char_count: event.inserted_chars() as u64,
            line_count: count_lines(&event.inserted_text),
        };
        Some(self.record_snippet(snippet))
    }

    /// Appends an already-built snippet, e.g. one loaded from storage.
    pub fn record_snippet(&mut self, snippet: Snippet) -> &Snippet {
        let file = self
            .files
            .entry(snippet.file_path.clone())
            .or_insert_with(|| {
                FileAggregate::new(&snippet.file_path, snippet.folder.clone(), &snippet.language)
            });
        file.language.clone_from(&snippet.language);
        file.char_count += snippet.char_count;
        file.line_count += snippet.line_count;
        file.by_classification
            .add(snippet.classification, snippet.char_count);
        file.recent.push_back(snippet.clone());
        while file.recent.len() > self.config.recent_snippets {
            file.recent.pop_front();
        }

        let language = self
            .languages
            .entry(snippet.language.clone())
            .or_insert_with(|| LanguageAggregate::new(&snippet.language));
        language.char_count += snippet.char_count;
        language.line_count += snippet.line_count;
        language
            .by_classification
            .add(snippet.classification, snippet.char_count);

        tracing::debug!(
            file = %snippet.file_path,
            chars = snippet.char_count,
            class = %snippet.classification,
            "recorded snippet"
        );
        self.log.push(snippet);
        &self.log[self.log.len() - 1]
    }

    /// Adds focus time to a file and to the target's language.
    ///
    /// Creates either aggregate if the file was focused before it was edited.
    pub fn add_focus_time(&mut self, target: &FocusTarget, elapsed_ms: i64) {
        if elapsed_ms <= 0 {
            return;
        }
        let workspaces = &self.config.workspaces;
        let file = self
            .files
            .entry(target.file_path.clone())
            .or_insert_with(|| {
                FileAggregate::new(
                    &target.file_path,
                    folder_key(&target.file_path, workspaces),
                    &target.language_id,
                )
            });
        file.time_ms += elapsed_ms;
        self.language_entry(&target.language_id).time_ms += elapsed_ms;
    }

    /// Restores a file's persisted focus time without touching its language.
    pub fn restore_file_time(&mut self, file_path: &str, language: &str, time_ms: i64) {
        let workspaces = &self.config.workspaces;
        self.files
            .entry(file_path.to_string())
            .or_insert_with(|| {
                FileAggregate::new(file_path, folder_key(file_path, workspaces), language)
            })
            .time_ms += time_ms;
    }

    /// Restores a language's persisted focus time.
    pub fn restore_language_time(&mut self, language: &str, time_ms: i64) {
        self.language_entry(language).time_ms += time_ms;
    }

    fn language_entry(&mut self, language: &str) -> &mut LanguageAggregate {
        self.languages
            .entry(language.to_string())
            .or_insert_with(|| LanguageAggregate::new(language))
    }

    /// All snippets in arrival order.
    pub fn snippets(&self) -> &[Snippet] {
        &self.log
    }

    pub fn file(&self, file_path: &str) -> Option<&FileAggregate> {
        self.files.get(file_path)
    }

    pub fn language(&self, language: &str) -> Option<&LanguageAggregate> {
        self.languages.get(language)
    }

    pub fn files(&self) -> impl Iterator<Item = &FileAggregate> {
        self.files.values()
    }

    pub fn languages(&self) -> impl Iterator<Item = &LanguageAggregate> {
        self.languages.values()
    }

    /// Characters across every snippet ever recorded.
    pub fn total_chars(&self) -> u64 {
        self.files.values().map(|f| f.char_count).sum()
    }

    /// Focus time accrued across all files.
    pub fn total_time_ms(&self) -> i64 {
        self.files.values().map(|f| f.time_ms).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(path: &str, language: &str, text: &str, ts: i64) -> ChangeEvent {
        ChangeEvent {
            file_path: path.into(),
            language_id: language.into(),
            inserted_text: text.into(),
            replaced_length: 0,
            timestamp_ms: ts,
        }
    }

    #[test]
    fn deletion_is_a_no_op() {
        let mut ledger = Ledger::default();
        assert!(
            ledger
                .record(&change("/a.rs", "rust", "", 1_000), Classification::Manual)
                .is_none()
        );
        assert!(ledger.snippets().is_empty());
        assert!(ledger.file("/a.rs").is_none());
        assert!(ledger.language("rust").is_none());
    }

    #[test]
    fn record_updates_file_and_language_once() {
        let mut ledger = Ledger::default();
        let snippet = ledger
            .record(&change("/a.rs", "rust", "let x = 1;\n", 1_000), Classification::Manual)
            .cloned()
            .unwrap();

        assert_eq!(snippet.char_count, 11);
        assert_eq!(snippet.line_count, 2);
        assert_eq!(snippet.folder, "/");
        assert_eq!(snippet.timestamp.timestamp_millis(), 1_000);

        let file = ledger.file("/a.rs").unwrap();
        assert_eq!(file.char_count, 11);
        assert_eq!(file.line_count, 2);
        assert_eq!(file.recent.len(), 1);
        assert_eq!(ledger.language("rust").unwrap().char_count, 11);
    }

    #[test]
    fn preview_is_truncated_but_count_is_not() {
        let mut ledger = Ledger::new(LedgerConfig {
            preview_chars: 4,
            ..LedgerConfig::default()
        });
        let snippet = ledger
            .record(&change("/a.rs", "rust", "abcdefgh", 0), Classification::Manual)
            .unwrap();
        assert_eq!(snippet.text, "abcd");
        assert_eq!(snippet.char_count, 8);
    }

    #[test]
    fn recent_list_is_bounded_but_log_is_not() {
        let mut ledger = Ledger::new(LedgerConfig {
            recent_snippets: 3,
            ..LedgerConfig::default()
        });
        for i in 0..10 {
            ledger.record(&change("/a.rs", "rust", "x", i), Classification::Manual);
        }
        let file = ledger.file("/a.rs").unwrap();
        assert_eq!(file.recent.len(), 3);
        assert_eq!(file.recent[0].timestamp.timestamp_millis(), 7);
        assert_eq!(file.char_count, 10);
        assert_eq!(ledger.snippets().len(), 10);
    }

    #[test]
    fn aggregates_equal_fold_of_log() {
        let mut ledger = Ledger::default();
        let events = [
            (change("/a.rs", "rust", "x", 0), Classification::Manual),
            (change("/a.rs", "rust", &"y".repeat(60), 10), Classification::Paste),
            (change("/b.py", "python", &"z".repeat(25), 20), Classification::Ai),
            (change("/a.rs", "rust", "", 30), Classification::Manual),
            (change("/c.rs", "rust", "fn main() {}\r\n", 40), Classification::Manual),
        ];
        for (event, label) in &events {
            ledger.record(event, *label);
        }

        let mut folded: HashMap<&str, (u64, u64, u64)> = HashMap::new();
        for snippet in ledger.snippets() {
            let entry = folded.entry(snippet.file_path.as_str()).or_default();
            entry.0 += snippet.char_count;
            entry.1 += snippet.line_count;
            entry.2 += 1;
        }

        assert_eq!(ledger.files().count(), folded.len());
        for file in ledger.files() {
            let (chars, lines, count) = folded[file.file_path.as_str()];
            assert_eq!(file.char_count, chars);
            assert_eq!(file.line_count, lines);
            assert_eq!(file.by_classification.total_chars(), file.char_count);
            assert_eq!(file.by_classification.total_count(), count);
        }

        let rust = ledger.language("rust").unwrap();
        assert_eq!(
            rust.char_count,
            ledger.file("/a.rs").unwrap().char_count + ledger.file("/c.rs").unwrap().char_count
        );
        assert_eq!(rust.by_classification.total_chars(), rust.char_count);
        assert_eq!(ledger.total_chars(), 1 + 60 + 25 + 14);
    }

    #[test]
    fn replaying_snippets_rebuilds_identical_views() {
        let mut original = Ledger::default();
        original.record(&change("/a.rs", "rust", "abc", 0), Classification::Manual);
        original.record(&change("/b.go", "go", &"q".repeat(55), 5), Classification::Paste);

        let mut replayed = Ledger::default();
        for snippet in original.snippets() {
            replayed.record_snippet(snippet.clone());
        }

        assert_eq!(replayed.file("/a.rs"), original.file("/a.rs"));
        assert_eq!(replayed.language("go"), original.language("go"));
        assert_eq!(replayed.snippets(), original.snippets());
    }

    #[test]
    fn focus_time_creates_aggregates_lazily() {
        let mut ledger = Ledger::default();
        ledger.add_focus_time(&FocusTarget::new("/notes.md", "markdown"), 5_000);

        let file = ledger.file("/notes.md").unwrap();
        assert_eq!(file.time_secs(), 5);
        assert_eq!(file.char_count, 0);
        assert_eq!(ledger.language("markdown").unwrap().time_ms, 5_000);
        assert_eq!(ledger.total_time_ms(), 5_000);
    }

    #[test]
    fn workspace_roots_shape_folder_keys() {
        let mut ledger = Ledger::new(LedgerConfig {
            workspaces: vec![WorkspaceRoot::new("pulse", "/work/pulse")],
            ..LedgerConfig::default()
        });
        let snippet = ledger
            .record(
                &change("/work/pulse/src/lib.rs", "rust", "x", 0),
                Classification::Manual,
            )
            .unwrap();
        assert_eq!(snippet.folder, "pulse:src");
    }
}
