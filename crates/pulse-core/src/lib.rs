//! Core domain logic for pulse.
//!
//! This crate contains the fundamental types and logic for:
//! - Classification: labelling edits as manual, paste, or AI-assisted
//! - Ledger: the append-only snippet log and its per-file / per-language views
//! - Allocation: crediting focused time to files and languages
//! - Reporting: windows, streaks, and heatmaps derived from the log

pub mod allocation;
pub mod classifier;
pub mod engine;
pub mod event;
pub mod ledger;
pub mod report;
pub mod types;
pub mod workspace;

pub use allocation::{AllocationConfig, TimeAllocator};
pub use classifier::{RollingContext, classify};
pub use engine::{Engine, EngineConfig};
pub use event::{ChangeEvent, FocusTarget, InputError};
pub use ledger::{FileAggregate, LanguageAggregate, Ledger, LedgerConfig, Snippet};
pub use report::{
    DailyAggregate, FolderTotals, HeatmapDay, Reporter, Streak, Summary, WindowTotals, Windows,
};
pub use types::{ByClassification, ClassBreakdown, Classification, SnippetId, ValidationError};
pub use workspace::{WorkspaceRoot, folder_key};
