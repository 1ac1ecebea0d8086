//! Configuration loading and management.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use pulse_core::{AllocationConfig, LedgerConfig, WorkspaceRoot};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,

    /// Seconds without activity before focus time stops accruing.
    /// Zero (the default) credits every focused interval in full.
    pub idle_timeout_secs: u64,

    /// Characters kept in each snippet's text preview.
    pub preview_chars: usize,

    /// Snippets kept in each file's recent list.
    pub recent_snippets: usize,

    /// Workspace roots used to group files into folders.
    #[serde(default)]
    pub workspaces: Vec<WorkspaceRoot>,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        let ledger = LedgerConfig::default();
        Self {
            database_path: data_dir.join("pulse.db"),
            idle_timeout_secs: 0,
            preview_chars: ledger.preview_chars,
            recent_snippets: ledger.recent_snippets,
            workspaces: Vec::new(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (PULSE_*)
        figment = figment.merge(Env::prefixed("PULSE_"));

        figment.extract()
    }

    /// Settings for snippet construction and folder keys.
    pub fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            preview_chars: self.preview_chars,
            recent_snippets: self.recent_snippets,
            workspaces: self.workspaces.clone(),
        }
    }

    /// Settings for focus time allocation.
    pub fn allocation_config(&self) -> AllocationConfig {
        let timeout_ms =
            i64::try_from(self.idle_timeout_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
        AllocationConfig {
            idle_timeout_ms: (timeout_ms > 0).then_some(timeout_ms),
        }
    }
}

/// Returns the platform-specific config directory for pulse.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("pulse"))
}

/// Returns the platform-specific data directory for pulse.
///
/// On Linux: `~/.local/share/pulse`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("pulse"))
}
