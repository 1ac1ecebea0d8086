//! Focus time allocation.
//!
//! Attributes elapsed wall-clock time to the focused file and its language.
//!
//! # Algorithm Summary
//!
//! 1. A focus change closes the open interval at the change instant and
//!    credits it to the previously focused file, then opens a new interval
//!    for the new file (or none, on window blur).
//! 2. With an idle timeout configured, an interval with no activity for the
//!    timeout is closed once at `last activity + timeout` and the session is
//!    paused until the next event.
//! 3. Teardown closes whatever interval is open.

use crate::event::FocusTarget;
use crate::ledger::Ledger;

/// Idle timeout used when the idle policy is switched on without a value.
pub const DEFAULT_IDLE_TIMEOUT_MS: i64 = 30_000;

/// Configuration for time allocation.
///
/// The default credits every focused interval in full. The idle policy is
/// opt-in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocationConfig {
    /// Pause the session after this long without activity. `None` disables
    /// idle detection.
    /// Default: `None`.
    pub idle_timeout_ms: Option<i64>,
}

impl AllocationConfig {
    /// Idle policy on, pausing after `timeout_ms` without activity.
    pub const fn with_idle_timeout(timeout_ms: i64) -> Self {
        Self {
            idle_timeout_ms: Some(timeout_ms),
        }
    }
}

/// Current focus state.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FocusState {
    /// A file is focused and time is accruing.
    Focused {
        target: FocusTarget,
        /// When the open interval started.
        since_ms: i64,
    },
    /// A file is focused but the session went idle; nothing accrues.
    Idle { target: FocusTarget },
    /// No file focused (window blurred or nothing opened yet).
    Unfocused,
}

/// Tracks the focused file and credits its time to the [`Ledger`].
#[derive(Debug, Clone)]
pub struct TimeAllocator {
    config: AllocationConfig,
    state: FocusState,
    last_activity_ms: Option<i64>,
}

impl Default for TimeAllocator {
    fn default() -> Self {
        Self::new(AllocationConfig::default())
    }
}

impl TimeAllocator {
    pub const fn new(config: AllocationConfig) -> Self {
        Self {
            config,
            state: FocusState::Unfocused,
            last_activity_ms: None,
        }
    }

    /// The file currently holding focus, idle or not.
    pub const fn focused(&self) -> Option<&FocusTarget> {
        match &self.state {
            FocusState::Focused { target, .. } | FocusState::Idle { target } => Some(target),
            FocusState::Unfocused => None,
        }
    }

    /// True while time is accruing to a focused file.
    pub const fn is_accruing(&self) -> bool {
        matches!(self.state, FocusState::Focused { .. })
    }

    /// Closes the open interval at `now_ms` and moves focus to `new_focus`.
    ///
    /// `None` means the window lost focus; no time accrues until focus returns.
    pub fn attribute_focus_time(
        &mut self,
        ledger: &mut Ledger,
        new_focus: Option<FocusTarget>,
        now_ms: i64,
    ) {
        self.close_interval(ledger, now_ms);
        self.state = match new_focus {
            Some(target) => {
                tracing::debug!(file = %target.file_path, now_ms, "focus gained");
                FocusState::Focused {
                    target,
                    since_ms: now_ms,
                }
            }
            None => {
                tracing::debug!(now_ms, "focus lost");
                FocusState::Unfocused
            }
        };
        self.last_activity_ms = Some(now_ms);
    }

    /// Notes editing activity, resuming an idle session.
    pub fn note_activity(&mut self, now_ms: i64) {
        if let FocusState::Idle { target } = &self.state {
            tracing::debug!(file = %target.file_path, now_ms, "session resumed");
            self.state = FocusState::Focused {
                target: target.clone(),
                since_ms: now_ms,
            };
        }
        self.last_activity_ms = Some(now_ms);
    }

    /// The instant the idle timer fires, if one is armed.
    pub fn idle_deadline(&self) -> Option<i64> {
        if !self.is_accruing() {
            return None;
        }
        let timeout = self.config.idle_timeout_ms?;
        self.last_activity_ms.map(|last| last.saturating_add(timeout))
    }

    /// Fires the idle timer if its deadline has passed.
    ///
    /// Pending time is credited up to the deadline, not up to `now_ms`.
    /// Returns true if the session went idle.
    pub fn poll_idle(&mut self, ledger: &mut Ledger, now_ms: i64) -> bool {
        let Some(deadline) = self.idle_deadline() else {
            return false;
        };
        if now_ms < deadline {
            return false;
        }

        self.close_interval(ledger, deadline);
        if let FocusState::Focused { target, .. } =
            std::mem::replace(&mut self.state, FocusState::Unfocused)
        {
            tracing::debug!(file = %target.file_path, deadline, "session idle");
            self.state = FocusState::Idle { target };
        }
        true
    }

    /// Closes the open interval at session teardown.
    pub fn teardown(&mut self, ledger: &mut Ledger, now_ms: i64) {
        self.close_interval(ledger, now_ms);
        self.state = FocusState::Unfocused;
    }

    fn close_interval(&mut self, ledger: &mut Ledger, end_ms: i64) {
        if let FocusState::Focused { target, since_ms } = &mut self.state {
            let elapsed = end_ms - *since_ms;
            if elapsed > 0 {
                ledger.add_focus_time(target, elapsed);
                *since_ms = end_ms;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEC: i64 = 1000;

    fn main_rs() -> FocusTarget {
        FocusTarget::new("/src/main.rs", "rust")
    }

    fn readme() -> FocusTarget {
        FocusTarget::new("/README.md", "markdown")
    }

    fn no_idle() -> TimeAllocator {
        TimeAllocator::default()
    }

    fn idle_30s() -> TimeAllocator {
        TimeAllocator::new(AllocationConfig::with_idle_timeout(DEFAULT_IDLE_TIMEOUT_MS))
    }

    fn file_secs(ledger: &Ledger, path: &str) -> i64 {
        ledger.file(path).map_or(0, |f| f.time_secs())
    }

    #[test]
    fn blur_pauses_time() {
        let mut ledger = Ledger::default();
        let mut alloc = no_idle();

        alloc.attribute_focus_time(&mut ledger, Some(main_rs()), 0);
        alloc.attribute_focus_time(&mut ledger, None, 120 * SEC);
        alloc.attribute_focus_time(&mut ledger, Some(main_rs()), 180 * SEC);
        alloc.attribute_focus_time(&mut ledger, None, 210 * SEC);

        assert_eq!(file_secs(&ledger, "/src/main.rs"), 150);
        assert_eq!(ledger.language("rust").unwrap().time_secs(), 150);
    }

    #[test]
    fn default_timer_never_cuts_focused_intervals() {
        let mut ledger = Ledger::default();
        let mut alloc = TimeAllocator::default();

        alloc.attribute_focus_time(&mut ledger, Some(main_rs()), 0);
        assert_eq!(alloc.idle_deadline(), None);
        assert!(!alloc.poll_idle(&mut ledger, 120 * SEC));
        alloc.attribute_focus_time(&mut ledger, None, 120 * SEC);
        alloc.attribute_focus_time(&mut ledger, Some(main_rs()), 180 * SEC);
        assert!(!alloc.poll_idle(&mut ledger, 210 * SEC));
        alloc.attribute_focus_time(&mut ledger, None, 210 * SEC);

        assert_eq!(file_secs(&ledger, "/src/main.rs"), 150);
    }

    #[test]
    fn switching_files_splits_time() {
        let mut ledger = Ledger::default();
        let mut alloc = no_idle();

        alloc.attribute_focus_time(&mut ledger, Some(main_rs()), 0);
        alloc.attribute_focus_time(&mut ledger, Some(readme()), 40 * SEC);
        alloc.teardown(&mut ledger, 100 * SEC);

        assert_eq!(file_secs(&ledger, "/src/main.rs"), 40);
        assert_eq!(file_secs(&ledger, "/README.md"), 60);
        assert_eq!(ledger.language("markdown").unwrap().time_secs(), 60);
        assert!(alloc.focused().is_none());
    }

    #[test]
    fn focus_change_without_focus_is_skipped() {
        let mut ledger = Ledger::default();
        let mut alloc = no_idle();

        alloc.attribute_focus_time(&mut ledger, None, 50 * SEC);
        alloc.teardown(&mut ledger, 60 * SEC);

        assert_eq!(ledger.files().count(), 0);
        assert_eq!(ledger.total_time_ms(), 0);
    }

    #[test]
    fn idle_flushes_once_at_deadline() {
        let mut ledger = Ledger::default();
        let mut alloc = idle_30s();

        alloc.attribute_focus_time(&mut ledger, Some(main_rs()), 0);
        alloc.note_activity(10 * SEC);
        assert_eq!(alloc.idle_deadline(), Some(40 * SEC));
        assert!(!alloc.poll_idle(&mut ledger, 39 * SEC));

        assert!(alloc.poll_idle(&mut ledger, 90 * SEC));
        assert_eq!(file_secs(&ledger, "/src/main.rs"), 40);
        assert!(!alloc.is_accruing());

        // Timer is disarmed until the next event.
        assert!(!alloc.poll_idle(&mut ledger, 500 * SEC));
        assert_eq!(file_secs(&ledger, "/src/main.rs"), 40);
    }

    #[test]
    fn activity_resumes_idle_session() {
        let mut ledger = Ledger::default();
        let mut alloc = idle_30s();

        alloc.attribute_focus_time(&mut ledger, Some(main_rs()), 0);
        alloc.poll_idle(&mut ledger, 100 * SEC);
        alloc.note_activity(200 * SEC);
        assert!(alloc.is_accruing());
        alloc.attribute_focus_time(&mut ledger, None, 215 * SEC);

        assert_eq!(file_secs(&ledger, "/src/main.rs"), 30 + 15);
    }

    #[test]
    fn blur_while_idle_adds_nothing() {
        let mut ledger = Ledger::default();
        let mut alloc = idle_30s();

        alloc.attribute_focus_time(&mut ledger, Some(main_rs()), 0);
        alloc.poll_idle(&mut ledger, 60 * SEC);
        alloc.attribute_focus_time(&mut ledger, None, 300 * SEC);

        assert_eq!(file_secs(&ledger, "/src/main.rs"), 30);
    }
}
