//! Read-only views derived from the [`Ledger`].
//!
//! Everything here is computed on demand by scanning the snippet log and the
//! aggregates; nothing is cached or mutated. All functions are total: an
//! empty log yields zero-valued results.
//!
//! Day and hour bucketing happens in the reporter's time zone (`Local` in the
//! binary, a fixed zone in tests).

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use serde::Serialize;

use crate::ledger::{FileAggregate, LanguageAggregate, Ledger, Snippet};
use crate::types::{ByClassification, Classification};

/// Days covered by [`Reporter::heatmap_90`].
pub const HEATMAP_DAYS: i64 = 90;

/// Days covered by [`Reporter::hourly_heatmap`].
pub const HOURLY_DAYS: i64 = 30;

/// Totals for one trailing window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WindowTotals {
    pub chars: u64,
    pub lines: u64,
    pub snippets: u64,
    /// Focus time apportioned by this window's share of all characters.
    pub time_ms: i64,
}

/// Totals for the standard trailing windows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Windows {
    pub last_12h: WindowTotals,
    pub today: WindowTotals,
    pub week: WindowTotals,
    pub month: WindowTotals,
}

/// Consecutive active days.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Streak {
    pub current: u32,
    pub max: u32,
}

/// One day of the 90-day heatmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HeatmapDay {
    pub date: NaiveDate,
    /// Characters recorded that day.
    pub value: u64,
}

/// Activity for one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailyAggregate {
    pub date: NaiveDate,
    pub total_chars: u64,
    pub total_time_ms: i64,
    pub snippets: u64,
    pub by_classification: ByClassification,
}

/// All-time totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Summary {
    pub chars: u64,
    pub lines: u64,
    pub snippets: u64,
    pub time_ms: i64,
    pub by_classification: ByClassification,
    /// Fraction of characters classified as manual; 0 when nothing is recorded.
    pub manual_share: f64,
}

/// Files rolled up by folder key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderTotals {
    pub folder: String,
    pub files: u64,
    pub chars: u64,
    pub lines: u64,
    pub time_ms: i64,
}

/// Derives reports from a ledger in a given time zone.
#[derive(Debug, Clone)]
pub struct Reporter<'a, Tz: TimeZone> {
    ledger: &'a Ledger,
    tz: Tz,
}

impl<'a, Tz: TimeZone> Reporter<'a, Tz> {
    pub const fn new(ledger: &'a Ledger, tz: Tz) -> Self {
        Self { ledger, tz }
    }

    fn day_of(&self, ts: DateTime<Utc>) -> NaiveDate {
        ts.with_timezone(&self.tz).date_naive()
    }

    /// Focus time apportioned to `chars` by character share.
    fn apportion(&self, chars: u64) -> i64 {
        let all = self.ledger.total_chars();
        if all == 0 {
            return 0;
        }
        let total = self.ledger.total_time_ms();
        let share = i128::from(total) * i128::from(chars) / i128::from(all);
        i64::try_from(share).unwrap_or(total)
    }

    /// Snippets with `start <= timestamp <= now`.
    fn between(
        &self,
        start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> impl Iterator<Item = &'a Snippet> + use<'a, Tz> {
        let ledger: &'a Ledger = self.ledger;
        ledger
            .snippets()
            .iter()
            .filter(move |s| s.timestamp >= start && s.timestamp <= now)
    }

    fn window(&self, start: DateTime<Utc>, now: DateTime<Utc>) -> WindowTotals {
        let mut totals = WindowTotals::default();
        for snippet in self.between(start, now) {
            totals.chars += snippet.char_count;
            totals.lines += snippet.line_count;
            totals.snippets += 1;
        }
        totals.time_ms = self.apportion(totals.chars);
        totals
    }

    /// Totals for the last 12 hours, today, the last 7 days, and the last 30 days.
    pub fn windows(&self, now: DateTime<Utc>) -> Windows {
        let today_start = local_midnight(&self.tz, self.day_of(now));
        Windows {
            last_12h: self.window(now - Duration::hours(12), now),
            today: self.window(today_start, now),
            week: self.window(now - Duration::days(7), now),
            month: self.window(now - Duration::days(30), now),
        }
    }

    /// Current and longest runs of consecutive active days.
    ///
    /// The current streak still counts if its last day was yesterday, so a
    /// streak is not broken before today's first edit. Days after `now` are
    /// ignored.
    pub fn streak(&self, now: DateTime<Utc>) -> Streak {
        let today = self.day_of(now);
        let days: BTreeSet<NaiveDate> = self
            .ledger
            .snippets()
            .iter()
            .map(|s| self.day_of(s.timestamp))
            .filter(|day| *day <= today)
            .collect();

        let mut max = 0;
        let mut run = 0;
        let mut previous: Option<NaiveDate> = None;
        for day in &days {
            run = match previous {
                Some(prev) if prev.succ_opt() == Some(*day) => run + 1,
                _ => 1,
            };
            max = max.max(run);
            previous = Some(*day);
        }

        let current = match previous {
            Some(last) if last == today || last.succ_opt() == Some(today) => run,
            _ => 0,
        };
        Streak { current, max }
    }

    /// Snippet counts per weekday, index 0 = Sunday.
    pub fn weekday_histogram(&self) -> [u64; 7] {
        let mut buckets = [0u64; 7];
        for snippet in self.ledger.snippets() {
            let weekday = self.day_of(snippet.timestamp).weekday();
            buckets[weekday.num_days_from_sunday() as usize] += 1;
        }
        buckets
    }

    /// Characters per day for the last 90 days, oldest first, today last.
    pub fn heatmap_90(&self, now: DateTime<Utc>) -> Vec<HeatmapDay> {
        let today = self.day_of(now);
        let mut by_day: BTreeMap<NaiveDate, u64> = BTreeMap::new();
        for snippet in self.ledger.snippets() {
            *by_day.entry(self.day_of(snippet.timestamp)).or_default() += snippet.char_count;
        }

        (0..HEATMAP_DAYS)
            .rev()
            .map(|back| {
                let date = today - Duration::days(back);
                HeatmapDay {
                    date,
                    value: by_day.get(&date).copied().unwrap_or(0),
                }
            })
            .collect()
    }

    /// Snippet counts per hour of day over the last 30 days.
    pub fn hourly_heatmap(&self, now: DateTime<Utc>) -> [u64; 24] {
        let start = now - Duration::days(HOURLY_DAYS);
        let mut hours = [0u64; 24];
        for snippet in self.between(start, now) {
            let hour = snippet.timestamp.with_timezone(&self.tz).hour();
            hours[hour as usize] += 1;
        }
        hours
    }

    /// One entry per active day, oldest first.
    pub fn daily(&self) -> Vec<DailyAggregate> {
        let mut days: BTreeMap<NaiveDate, DailyAggregate> = BTreeMap::new();
        for snippet in self.ledger.snippets() {
            let date = self.day_of(snippet.timestamp);
            let day = days.entry(date).or_insert(DailyAggregate {
                date,
                total_chars: 0,
                total_time_ms: 0,
                snippets: 0,
                by_classification: ByClassification::default(),
            });
            day.total_chars += snippet.char_count;
            day.snippets += 1;
            day.by_classification
                .add(snippet.classification, snippet.char_count);
        }

        days.into_values()
            .map(|mut day| {
                day.total_time_ms = self.apportion(day.total_chars);
                day
            })
            .collect()
    }

    /// All-time totals and classification mix.
    #[allow(clippy::cast_precision_loss)]
    pub fn summary(&self) -> Summary {
        let mut summary = Summary {
            time_ms: self.ledger.total_time_ms(),
            ..Summary::default()
        };
        for snippet in self.ledger.snippets() {
            summary.chars += snippet.char_count;
            summary.lines += snippet.line_count;
            summary.snippets += 1;
            summary
                .by_classification
                .add(snippet.classification, snippet.char_count);
        }
        if summary.chars > 0 {
            let manual = summary.by_classification.get(Classification::Manual).chars;
            summary.manual_share = manual as f64 / summary.chars as f64;
        }
        summary
    }

    /// Files with the most characters, ties broken by path.
    pub fn top_files(&self, n: usize) -> Vec<&'a FileAggregate> {
        let mut files: Vec<_> = self.ledger.files().collect();
        files.sort_by(|a, b| {
            b.char_count
                .cmp(&a.char_count)
                .then_with(|| a.file_path.cmp(&b.file_path))
        });
        files.truncate(n);
        files
    }

    /// Languages with the most characters, ties broken by name.
    pub fn top_languages(&self, n: usize) -> Vec<&'a LanguageAggregate> {
        let mut languages: Vec<_> = self.ledger.languages().collect();
        languages.sort_by(|a, b| {
            b.char_count
                .cmp(&a.char_count)
                .then_with(|| a.language.cmp(&b.language))
        });
        languages.truncate(n);
        languages
    }

    /// File aggregates rolled up by folder key, sorted by folder.
    pub fn folder_totals(&self) -> Vec<FolderTotals> {
        let mut folders: BTreeMap<&str, FolderTotals> = BTreeMap::new();
        for file in self.ledger.files() {
            let totals = folders
                .entry(file.folder.as_str())
                .or_insert_with(|| FolderTotals {
                    folder: file.folder.clone(),
                    files: 0,
                    chars: 0,
                    lines: 0,
                    time_ms: 0,
                });
            totals.files += 1;
            totals.chars += file.char_count;
            totals.lines += file.line_count;
            totals.time_ms += file.time_ms;
        }
        folders.into_values().collect()
    }
}

/// Converts a local date at midnight to UTC.
/// Handles DST ambiguity by picking the earlier time.
pub fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    if let Some(dt) = tz.from_local_datetime(&midnight).earliest() {
        return dt.with_timezone(&Utc);
    }
    // DST spring-forward gap at midnight: 1am local is the first valid instant
    let one_am = midnight + Duration::hours(1);
    tz.from_local_datetime(&one_am)
        .earliest()
        .map_or_else(|| Utc.from_utc_datetime(&midnight), |dt| dt.with_timezone(&Utc))
}
