//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// Invalid classification label.
    #[error("invalid classification: {value}")]
    InvalidClassification { value: String },
}

/// How a recorded change was produced.
///
/// Assigned once when the snippet is created and never revised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// Typed by hand, or a small edit.
    Manual,
    /// A large pure insertion.
    Paste,
    /// A burst of inserted text that arrived faster than typing.
    Ai,
}

impl Classification {
    /// All labels, in bucket order.
    pub const ALL: [Self; 3] = [Self::Manual, Self::Paste, Self::Ai];

    /// String representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Paste => "paste",
            Self::Ai => "ai",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Classification {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Self::Manual),
            "paste" => Ok(Self::Paste),
            "ai" => Ok(Self::Ai),
            _ => Err(ValidationError::InvalidClassification {
                value: s.to_string(),
            }),
        }
    }
}

/// A validated snippet identifier.
///
/// Snippet IDs must be non-empty strings. Fresh IDs are random UUIDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SnippetId(String);

impl SnippetId {
    /// Creates a new ID after validation.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ValidationError::Empty { field: "snippet ID" });
        }
        Ok(Self(id))
    }

    /// Generates a fresh random ID.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SnippetId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SnippetId> for String {
    fn from(id: SnippetId) -> Self {
        id.0
    }
}

impl fmt::Display for SnippetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for SnippetId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Character volume and snippet count for one classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassBreakdown {
    pub chars: u64,
    pub count: u64,
}

/// One [`ClassBreakdown`] per classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByClassification {
    pub manual: ClassBreakdown,
    pub paste: ClassBreakdown,
    pub ai: ClassBreakdown,
}

impl ByClassification {
    /// Returns the bucket for a classification.
    pub const fn get(&self, class: Classification) -> &ClassBreakdown {
        match class {
            Classification::Manual => &self.manual,
            Classification::Paste => &self.paste,
            Classification::Ai => &self.ai,
        }
    }

    /// Adds one snippet of `chars` characters to the matching bucket.
    pub const fn add(&mut self, class: Classification, chars: u64) {
        let bucket = match class {
            Classification::Manual => &mut self.manual,
            Classification::Paste => &mut self.paste,
            Classification::Ai => &mut self.ai,
        };
        bucket.chars += chars;
        bucket.count += 1;
    }

    /// Sum of characters across all buckets.
    pub const fn total_chars(&self) -> u64 {
        self.manual.chars + self.paste.chars + self.ai.chars
    }

    /// Sum of snippet counts across all buckets.
    pub const fn total_count(&self) -> u64 {
        self.manual.count + self.paste.count + self.ai.count
    }
}
