//! Raw editor events consumed by the engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A content change reported by the editor.
///
/// Ephemeral: consumed by the classifier and never stored as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Absolute path of the changed document.
    pub file_path: String,
    /// Editor language identifier (e.g. `rust`).
    pub language_id: String,
    /// Text inserted by the change. Empty for pure deletions.
    pub inserted_text: String,
    /// Number of characters the change replaced.
    #[serde(default)]
    pub replaced_length: i64,
    /// Milliseconds since the Unix epoch.
    #[serde(rename = "timestamp")]
    pub timestamp_ms: i64,
}

impl ChangeEvent {
    /// Number of inserted characters (Unicode scalar values).
    pub fn inserted_chars(&self) -> usize {
        self.inserted_text.chars().count()
    }

    /// True when the change inserted nothing.
    pub const fn is_deletion(&self) -> bool {
        self.inserted_text.is_empty()
    }

    /// Rejects events whose fields cannot be aggregated.
    ///
    /// `previous_ms` is the timestamp of the last accepted event, if any.
    pub const fn validate(&self, previous_ms: Option<i64>) -> Result<(), InputError> {
        if self.replaced_length < 0 {
            return Err(InputError::NegativeReplacedLength {
                got: self.replaced_length,
            });
        }
        check_timestamp(self.timestamp_ms, previous_ms)
    }
}

/// The document that holds editor focus.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FocusTarget {
    pub file_path: String,
    pub language_id: String,
}

impl FocusTarget {
    pub fn new(file_path: impl Into<String>, language_id: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            language_id: language_id.into(),
        }
    }
}

/// Malformed input. The offending event is dropped without touching state.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InputError {
    #[error("timestamp must not be negative, got {got}")]
    NegativeTimestamp { got: i64 },

    #[error("timestamp went backwards: {got} after {previous}")]
    NonMonotonic { previous: i64, got: i64 },

    #[error("replaced length must not be negative, got {got}")]
    NegativeReplacedLength { got: i64 },
}

/// Checks that `timestamp_ms` is non-negative and not older than `previous_ms`.
pub const fn check_timestamp(timestamp_ms: i64, previous_ms: Option<i64>) -> Result<(), InputError> {
    if timestamp_ms < 0 {
        return Err(InputError::NegativeTimestamp { got: timestamp_ms });
    }
    if let Some(previous) = previous_ms {
        if timestamp_ms < previous {
            return Err(InputError::NonMonotonic {
                previous,
                got: timestamp_ms,
            });
        }
    }
    Ok(())
}

/// Counts lines as the segments produced by splitting on CRLF, CR, or LF.
///
/// Empty text has zero lines; any other text has at least one.
pub fn count_lines(text: &str) -> u64 {
    if text.is_empty() {
        return 0;
    }
    let mut lines = 1;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                lines += 1;
            }
            '\n' => lines += 1,
            _ => {}
        }
    }
    lines
}
