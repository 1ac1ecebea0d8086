//! The entry point a host drives with editor events.
//!
//! Every handler runs to completion before the next event is processed:
//! validation, classification, snippet construction and aggregate updates
//! happen synchronously. An idle timer that came due before an accepted
//! event fires first, at its own deadline; rejected events never move it. Anything that must wait on the host (clipboard
//! reads, persistence) happens outside these calls. Late results come back
//! through [`Engine::record_deferred`] as independent snippets.

use chrono::{DateTime, TimeZone, Utc};

use crate::allocation::{AllocationConfig, TimeAllocator};
use crate::classifier::{RollingContext, classify};
use crate::event::{ChangeEvent, FocusTarget, InputError, check_timestamp};
use crate::ledger::{Ledger, LedgerConfig, Snippet};
use crate::report::{HeatmapDay, Reporter, Streak, Windows};
use crate::types::Classification;

/// Combined engine settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineConfig {
    pub ledger: LedgerConfig,
    pub allocation: AllocationConfig,
}

/// Classifier context, ledger and time allocator for one editing session.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    context: RollingContext,
    ledger: Ledger,
    allocator: TimeAllocator,
    last_event_ms: Option<i64>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_ledger(Ledger::new(config.ledger), config.allocation)
    }

    /// Starts a session on top of previously recorded history.
    pub fn with_ledger(ledger: Ledger, allocation: AllocationConfig) -> Self {
        Self {
            context: RollingContext::default(),
            ledger,
            allocator: TimeAllocator::new(allocation),
            last_event_ms: None,
        }
    }

    pub const fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn into_ledger(self) -> Ledger {
        self.ledger
    }

    pub const fn context(&self) -> &RollingContext {
        &self.context
    }

    pub const fn allocator(&self) -> &TimeAllocator {
        &self.allocator
    }

    /// Classifies and records one content change.
    ///
    /// Returns the new snippet, or `None` for pure deletions, which neither
    /// record anything nor advance the classifier context.
    pub fn handle_change(&mut self, event: &ChangeEvent) -> Result<Option<Snippet>, InputError> {
        event.validate(self.last_event_ms)?;
        self.accept(event.timestamp_ms);
        self.allocator.note_activity(event.timestamp_ms);

        if event.is_deletion() {
            return Ok(None);
        }

        let (label, next) = classify(event, &self.context);
        self.context = next;
        Ok(self.ledger.record(event, label).cloned())
    }

    /// Records a change whose label was decided outside the classifier.
    ///
    /// Used for results of suspendable host queries that resolve after later
    /// events were already handled. The result becomes its own snippet; the
    /// classifier context and the monotonic clock are left alone.
    pub fn record_deferred(
        &mut self,
        event: &ChangeEvent,
        label: Classification,
    ) -> Result<Option<Snippet>, InputError> {
        event.validate(None)?;
        Ok(self.ledger.record(event, label).cloned())
    }

    /// Moves focus to `target`, or to nothing when the window blurs.
    pub fn handle_focus(&mut self, target: Option<FocusTarget>, now_ms: i64) -> Result<(), InputError> {
        check_timestamp(now_ms, self.last_event_ms)?;
        self.accept(now_ms);
        self.allocator
            .attribute_focus_time(&mut self.ledger, target, now_ms);
        Ok(())
    }

    /// Fires the idle timer. Returns true if the session went idle.
    ///
    /// Instants before the last accepted event are ignored.
    pub fn tick(&mut self, now_ms: i64) -> bool {
        if check_timestamp(now_ms, self.last_event_ms).is_err() {
            return false;
        }
        self.allocator.poll_idle(&mut self.ledger, now_ms)
    }

    /// Advances the live clock to a validated event, firing an overdue idle
    /// timer first.
    fn accept(&mut self, now_ms: i64) {
        if self.allocator.poll_idle(&mut self.ledger, now_ms) {
            tracing::debug!(now_ms, "idle timer fired before event");
        }
        self.last_event_ms = Some(now_ms);
    }

    /// The instant the host should call [`Engine::tick`], if any.
    pub fn idle_deadline(&self) -> Option<i64> {
        self.allocator.idle_deadline()
    }

    /// Closes the focused interval at session teardown.
    pub fn shutdown(&mut self, now_ms: i64) {
        let end = self.last_event_ms.map_or(now_ms, |last| now_ms.max(last));
        self.allocator.poll_idle(&mut self.ledger, end);
        self.allocator.teardown(&mut self.ledger, end);
    }

    /// A reporter over this engine's ledger.
    pub fn reporter<Tz: TimeZone>(&self, tz: Tz) -> Reporter<'_, Tz> {
        Reporter::new(&self.ledger, tz)
    }

    pub fn report_windows<Tz: TimeZone>(&self, tz: Tz, now: DateTime<Utc>) -> Windows {
        self.reporter(tz).windows(now)
    }

    pub fn report_streak<Tz: TimeZone>(&self, tz: Tz, now: DateTime<Utc>) -> Streak {
        self.reporter(tz).streak(now)
    }

    pub fn report_heatmap_90<Tz: TimeZone>(&self, tz: Tz, now: DateTime<Utc>) -> Vec<HeatmapDay> {
        self.reporter(tz).heatmap_90(now)
    }

    pub fn report_hourly_heatmap<Tz: TimeZone>(&self, tz: Tz, now: DateTime<Utc>) -> [u64; 24] {
        self.reporter(tz).hourly_heatmap(now)
    }
}
