//! Manual / paste / AI classification of content changes.
//!
//! Classification is a pure function of the change and a small rolling
//! context (time of the previous classified change, and whether that change
//! looked like typing). The caller owns the context and threads it through
//! every call.
//!
//! # Policy
//!
//! Rules are evaluated in order; the first match wins:
//!
//! 1. `>= 50` chars inserted with nothing replaced: [`Classification::Paste`]
//! 2. `>= 20` chars within 50 ms of the previous change: [`Classification::Ai`]
//! 3. `>= 20` chars within 700 ms, previous change was not typing: [`Classification::Ai`]
//! 4. anything else: [`Classification::Manual`]
//!
//! The context is shared by every document in a session, so switching files
//! quickly still counts against one gap timer.

use serde::{Deserialize, Serialize};

use crate::event::ChangeEvent;
use crate::types::Classification;

/// Pure insertions at least this long are pastes.
pub const PASTE_MIN_CHARS: usize = 50;

/// Insertions shorter than this are always manual.
pub const AI_MIN_CHARS: usize = 20;

/// Gap under which a sizable insertion is AI regardless of the previous change.
pub const AI_BURST_GAP_MS: i64 = 50;

/// Gap under which a sizable insertion is AI unless the user was typing.
pub const AI_TIME_GAP_MS: i64 = 700;

/// State carried from one classified change to the next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollingContext {
    /// Timestamp of the previous classified change.
    pub last_change_ms: Option<i64>,
    /// Whether the previous change inserted one character and replaced none.
    pub looked_like_typing: bool,
}

impl RollingContext {
    /// Milliseconds between the previous classified change and `now_ms`.
    fn gap_ms(&self, now_ms: i64) -> Option<i64> {
        self.last_change_ms.map(|last| now_ms.saturating_sub(last))
    }
}

/// Labels one change and returns the context for the next call.
pub fn classify(event: &ChangeEvent, context: &RollingContext) -> (Classification, RollingContext) {
    let inserted = event.inserted_chars();
    let pure_insertion = event.replaced_length == 0;
    let gap = context.gap_ms(event.timestamp_ms);
    let within = |limit: i64| gap.is_some_and(|g| g <= limit);

    let label = if inserted >= PASTE_MIN_CHARS && pure_insertion {
        Classification::Paste
    } else if inserted >= AI_MIN_CHARS && within(AI_BURST_GAP_MS) {
        Classification::Ai
    } else if inserted >= AI_MIN_CHARS && within(AI_TIME_GAP_MS) && !context.looked_like_typing {
        Classification::Ai
    } else {
        Classification::Manual
    };

    let next = RollingContext {
        last_change_ms: Some(event.timestamp_ms),
        looked_like_typing: inserted == 1 && pure_insertion,
    };

    tracing::trace!(inserted, ?gap, %label, "classified change");
    (label, next)
}
