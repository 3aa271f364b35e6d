//! Project configuration file support for coderecap.
//!
//! Loads configuration from `coderecap.toml` in the working directory.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use coderecap_agent::AgentKind;

/// Project-level configuration loaded from `coderecap.toml`
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RecapConfig {
    /// Redaction tier applied to every session (strict, normal, full)
    pub redaction: Option<String>,
    /// Report output path
    pub output: Option<PathBuf>,
    /// Date window for eligible sessions
    #[serde(default)]
    pub window: WindowConfig,
    /// Per-agent source location overrides
    #[serde(default)]
    pub roots: RootsConfig,
    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

/// Date window bounds. Days are interpreted in `timezone` and converted to
/// UTC before filtering.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct WindowConfig {
    /// First day of the window (YYYY-MM-DD, inclusive)
    pub since: Option<String>,
    /// Last day of the window (YYYY-MM-DD, inclusive)
    pub until: Option<String>,
    /// Fixed offset like "+02:00" or "-07:00", or "UTC" (the default)
    pub timezone: Option<String>,
}

/// Per-agent source overrides; directories for the file-based agents, the
/// state database path for cursor.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RootsConfig {
    pub claude: Option<PathBuf>,
    pub codex: Option<PathBuf>,
    pub cursor: Option<PathBuf>,
    pub gemini: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Filter level when RUST_LOG is unset (default "info")
    pub level: Option<String>,
    /// Output format: pretty or json
    pub format: Option<String>,
}

/// The config file name
pub const CONFIG_FILE_NAME: &str = "coderecap.toml";

impl RecapConfig {
    /// Load configuration from the working directory.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if file exists and parses successfully
    /// - `Ok(None)` if file does not exist
    /// - `Err(...)` if file exists but fails to parse (hard error)
    pub fn load(working_dir: &Path) -> Result<Option<Self>> {
        let config_path = working_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: RecapConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        Ok(Some(config))
    }

    /// Configured source override for one agent, if any.
    pub fn root_for(&self, agent: AgentKind) -> Option<&Path> {
        match agent {
            AgentKind::Claude => self.roots.claude.as_deref(),
            AgentKind::Codex => self.roots.codex.as_deref(),
            AgentKind::Cursor => self.roots.cursor.as_deref(),
            AgentKind::Gemini => self.roots.gemini.as_deref(),
        }
    }
}
