//! Report command for activity summaries.
//!
//! This module implements `pulse report` in two output formats:
//! human-readable and JSON.

use std::fmt::Write as _;
use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use pulse_core::{
    Classification, DailyAggregate, FileAggregate, FolderTotals, HeatmapDay, LanguageAggregate,
    Ledger, Reporter, Streak, Summary, WindowTotals, Windows,
};
use serde::Serialize;

/// Languages listed in the report.
const TOP_LANGUAGES: usize = 5;

/// Files listed in the report.
const TOP_FILES: usize = 5;

/// Folders listed in the human-readable report.
const TOP_FOLDERS: usize = 5;

const WEEKDAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// One row of the language table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageRow {
    pub language: String,
    pub chars: u64,
    pub lines: u64,
    pub time_ms: i64,
}

impl From<&LanguageAggregate> for LanguageRow {
    fn from(aggregate: &LanguageAggregate) -> Self {
        Self {
            language: aggregate.language.clone(),
            chars: aggregate.char_count,
            lines: aggregate.line_count,
            time_ms: aggregate.time_ms,
        }
    }
}

/// One row of the file table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRow {
    pub file_path: String,
    pub language: String,
    pub chars: u64,
    pub time_ms: i64,
}

impl From<&FileAggregate> for FileRow {
    fn from(aggregate: &FileAggregate) -> Self {
        Self {
            file_path: aggregate.file_path.clone(),
            language: aggregate.language.clone(),
            chars: aggregate.char_count,
            time_ms: aggregate.time_ms,
        }
    }
}

/// Computed report data.
#[derive(Debug, Serialize)]
pub struct ReportData {
    pub generated_at: DateTime<Utc>,
    /// Local date of `generated_at`.
    pub today: NaiveDate,
    pub timezone: String,
    pub windows: Windows,
    pub streak: Streak,
    pub summary: Summary,
    /// Snippets per weekday, Sunday first.
    pub weekday_histogram: [u64; 7],
    /// Snippets per local hour over the last 30 days.
    pub hourly_heatmap: [u64; 24],
    pub heatmap_90: Vec<HeatmapDay>,
    pub top_languages: Vec<LanguageRow>,
    pub top_files: Vec<FileRow>,
    pub folders: Vec<FolderTotals>,
    /// Every active day, oldest first.
    pub daily: Vec<DailyAggregate>,
}

// ========== Duration Formatting ==========

/// Formats milliseconds as duration string.
/// Returns "Xh Ym" if >= 1 hour, "Xm" if < 1 hour.
/// Negative durations are treated as 0m.
pub fn format_duration(ms: i64) -> String {
    if ms < 0 {
        return "0m".to_string();
    }
    let total_minutes = ms / 60_000;
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    if hours >= 1 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

// ========== Bars and Cells ==========

/// Generates a 10-character bar.
/// Nonzero values under 5% of max get a single block.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn progress_bar(value: u64, max: u64) -> String {
    if max == 0 {
        return "░░░░░░░░░░".to_string();
    }

    let ratio = value as f64 / max as f64;
    let filled = if ratio < 0.05 && value > 0 {
        1
    } else {
        (ratio * 10.0).round().min(10.0) as usize
    };

    let empty = 10 - filled;
    format!("{}{}", "█".repeat(filled), "░".repeat(empty))
}

/// Shades one heatmap cell by its quarter of `max`.
pub const fn heat_cell(value: u64, max: u64) -> char {
    if value == 0 || max == 0 {
        return '·';
    }
    // Ceiling quarter: 1..=4
    match (value * 4).div_ceil(max) {
        0 | 1 => '░',
        2 => '▒',
        3 => '▓',
        _ => '█',
    }
}

fn percent(part: u64, total: u64) -> u64 {
    if total == 0 {
        return 0;
    }
    (part * 100 + total / 2) / total
}

fn plural_days(n: u32) -> String {
    if n == 1 {
        "1 day".to_string()
    } else {
        format!("{n} days")
    }
}

/// Index of the largest bucket, earliest on ties. `None` when all are zero.
fn busiest(buckets: &[u64]) -> Option<usize> {
    let max = buckets.iter().copied().max().filter(|&m| m > 0)?;
    buckets.iter().position(|&v| v == max)
}

// ========== Report Generation ==========

/// Derives every report view from `ledger` as of `now` in `tz`.
pub fn generate_report_data<Tz: TimeZone>(
    ledger: &Ledger,
    tz: Tz,
    timezone: String,
    now: DateTime<Utc>,
) -> ReportData {
    let today = now.with_timezone(&tz).date_naive();
    let reporter = Reporter::new(ledger, tz);

    ReportData {
        generated_at: now,
        today,
        timezone,
        windows: reporter.windows(now),
        streak: reporter.streak(now),
        summary: reporter.summary(),
        weekday_histogram: reporter.weekday_histogram(),
        hourly_heatmap: reporter.hourly_heatmap(now),
        heatmap_90: reporter.heatmap_90(now),
        top_languages: reporter
            .top_languages(TOP_LANGUAGES)
            .into_iter()
            .map(LanguageRow::from)
            .collect(),
        top_files: reporter
            .top_files(TOP_FILES)
            .into_iter()
            .map(FileRow::from)
            .collect(),
        folders: reporter.folder_totals(),
        daily: reporter.daily(),
    }
}

fn write_window(output: &mut String, label: &str, totals: &WindowTotals) {
    writeln!(
        output,
        "{label:<14}{:>8} chars  {:>6} lines  {:>4} snippets  {}",
        totals.chars,
        totals.lines,
        totals.snippets,
        format_duration(totals.time_ms)
    )
    .unwrap();
}

/// Formats report data for a terminal.
pub fn format_report(data: &ReportData) -> String {
    let mut output = String::new();

    writeln!(
        output,
        "PULSE REPORT: {}",
        data.today.format("%A, %b %-d, %Y")
    )
    .unwrap();

    if data.summary.snippets == 0 {
        writeln!(output).unwrap();
        writeln!(output, "No activity recorded yet.").unwrap();
        writeln!(output).unwrap();
        writeln!(output, "Hint: Run 'pulse ingest' to feed editor events.").unwrap();
        return output;
    }

    writeln!(output).unwrap();
    writeln!(output, "ACTIVITY").unwrap();
    writeln!(output, "────────").unwrap();
    write_window(&mut output, "Last 12 hours", &data.windows.last_12h);
    write_window(&mut output, "Today", &data.windows.today);
    write_window(&mut output, "Last 7 days", &data.windows.week);
    write_window(&mut output, "Last 30 days", &data.windows.month);

    writeln!(output).unwrap();
    writeln!(output, "STREAK").unwrap();
    writeln!(output, "──────").unwrap();
    writeln!(
        output,
        "Current: {}    Longest: {}",
        plural_days(data.streak.current),
        plural_days(data.streak.max)
    )
    .unwrap();

    writeln!(output).unwrap();
    writeln!(output, "BY CLASSIFICATION").unwrap();
    writeln!(output, "─────────────────").unwrap();
    let total_chars = data.summary.chars;
    for class in Classification::ALL {
        let bucket = data.summary.by_classification.get(class);
        writeln!(
            output,
            "{:<8}{:>3}%  {:>8} chars  ({} snippets)",
            class.as_str(),
            percent(bucket.chars, total_chars),
            bucket.chars,
            bucket.count
        )
        .unwrap();
    }

    writeln!(output).unwrap();
    writeln!(output, "BY LANGUAGE").unwrap();
    writeln!(output, "───────────").unwrap();
    let max_chars = data.top_languages.first().map_or(0, |row| row.chars);
    for row in &data.top_languages {
        writeln!(
            output,
            "{:<14}{}  {:>8} chars  {}",
            row.language,
            progress_bar(row.chars, max_chars),
            row.chars,
            format_duration(row.time_ms)
        )
        .unwrap();
    }

    writeln!(output).unwrap();
    writeln!(output, "BY FILE").unwrap();
    writeln!(output, "───────").unwrap();
    for row in &data.top_files {
        writeln!(
            output,
            "{}  ({} chars, {})",
            row.file_path,
            row.chars,
            format_duration(row.time_ms)
        )
        .unwrap();
    }

    let mut folders: Vec<_> = data.folders.iter().collect();
    folders.sort_by(|a, b| b.chars.cmp(&a.chars).then_with(|| a.folder.cmp(&b.folder)));
    if !folders.is_empty() {
        writeln!(output).unwrap();
        writeln!(output, "BY FOLDER").unwrap();
        writeln!(output, "─────────").unwrap();
        for folder in folders.iter().take(TOP_FOLDERS) {
            writeln!(
                output,
                "{}  ({} files, {} chars, {})",
                folder.folder,
                folder.files,
                folder.chars,
                format_duration(folder.time_ms)
            )
            .unwrap();
        }
        if folders.len() > TOP_FOLDERS {
            writeln!(output, "... and {} more", folders.len() - TOP_FOLDERS).unwrap();
        }
    }

    writeln!(output).unwrap();
    writeln!(output, "RHYTHM").unwrap();
    writeln!(output, "──────").unwrap();
    if let Some(day) = busiest(&data.weekday_histogram) {
        writeln!(output, "Busiest weekday:  {}", WEEKDAY_NAMES[day]).unwrap();
    }
    match busiest(&data.hourly_heatmap) {
        Some(hour) => writeln!(output, "Busiest hour:     {hour:02}:00").unwrap(),
        None => writeln!(output, "Busiest hour:     (nothing in the last 30 days)").unwrap(),
    }
    let max_day = data.heatmap_90.iter().map(|d| d.value).max().unwrap_or(0);
    let cells: String = data
        .heatmap_90
        .iter()
        .map(|d| heat_cell(d.value, max_day))
        .collect();
    writeln!(output, "Last 90 days:     {cells}").unwrap();

    writeln!(output).unwrap();
    writeln!(output, "SUMMARY").unwrap();
    writeln!(output, "───────").unwrap();
    writeln!(
        output,
        "All time:  {} chars, {} lines, {} snippets",
        data.summary.chars, data.summary.lines, data.summary.snippets
    )
    .unwrap();
    writeln!(output, "Focused:   {}", format_duration(data.summary.time_ms)).unwrap();
    writeln!(
        output,
        "Typed by hand: {}%",
        percent(data.summary.by_classification.manual.chars, total_chars)
    )
    .unwrap();

    output
}

/// Formats report data as JSON.
pub fn format_report_json(data: &ReportData) -> Result<String> {
    Ok(serde_json::to_string_pretty(data)?)
}

// ========== Public Interface ==========

/// Runs the report command in the local time zone.
pub fn run<W: Write>(writer: &mut W, ledger: &Ledger, json: bool, now: DateTime<Utc>) -> Result<()> {
    let timezone = iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string());
    let data = generate_report_data(ledger, Local, timezone, now);

    if json {
        let output = format_report_json(&data).context("failed to serialize report")?;
        writeln!(writer, "{output}")?;
    } else {
        write!(writer, "{}", format_report(&data))?;
    }

    Ok(())
}
