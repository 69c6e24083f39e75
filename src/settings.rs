use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Tunables for the simulator. Every field has a default so a partial
/// `muxsim.toml` only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorSettings {
    /// How long a pressed prefix key stays armed.
    pub prefix_timeout_ms: u64,
    /// Grace period granted after each use of a repeatable prefix command.
    pub repeat_grace_ms: u64,
    /// Maximum physical lines retained per pane.
    pub scrollback_limit: usize,
    pub viewport_width: u16,
    pub viewport_height: u16,
    pub shell_history_limit: usize,
    pub action_log_limit: usize,
    pub message_log_limit: usize,
    pub probe: ProbeSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    /// After this long without an acknowledgement an in-flight probe is
    /// presumed lost.
    pub stale_timeout_ms: u64,
    /// Minimum spacing between two dispatches.
    pub min_interval_ms: u64,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        SimulatorSettings {
            prefix_timeout_ms: 2000,
            repeat_grace_ms: 900,
            scrollback_limit: 1000,
            viewport_width: 120,
            viewport_height: 40,
            shell_history_limit: 200,
            action_log_limit: 50,
            message_log_limit: 10,
            probe: ProbeSettings::default(),
        }
    }
}

impl Default for ProbeSettings {
    fn default() -> Self {
        ProbeSettings {
            stale_timeout_ms: 8000,
            min_interval_ms: 750,
        }
    }
}

impl SimulatorSettings {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("failed to parse simulator settings")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("invalid settings in {}", path.display()))
    }
}
