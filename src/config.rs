use crate::issue::find_descriptor;
use crate::level::CheckLevel;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Top-level configuration loaded from `monitor-clippy.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct MonitorClippyConfig {
    #[serde(default)]
    pub checks: ChecksConfig,
}

/// Per-check configuration under the `[checks]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ChecksConfig {
    /// Collapse reports sharing a source line, keeping the most relevant
    /// one per problem kind.
    pub deduplicate: bool,

    /// Master switch for deadlock reporting (self and cross-procedure).
    pub report_deadlocks: bool,

    /// Checks that should be treated as effectively disabled.
    pub disabled: Vec<String>,

    /// Explicit per-check levels (e.g. `starvation = "error"`).
    #[serde(flatten)]
    pub levels: HashMap<String, CheckLevel>,
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self {
            deduplicate: true,
            report_deadlocks: true,
            disabled: Vec::new(),
            levels: HashMap::new(),
        }
    }
}

/// Resolved settings consumed by the report engine.
#[derive(Debug, Clone)]
pub struct CheckSettings {
    pub deduplicate: bool,
    pub report_deadlocks: bool,
    levels: HashMap<String, CheckLevel>,
}

impl Default for CheckSettings {
    fn default() -> Self {
        Self {
            deduplicate: true,
            report_deadlocks: true,
            levels: HashMap::new(),
        }
    }
}

impl CheckSettings {
    pub fn from_config(config: &MonitorClippyConfig) -> Self {
        let mut settings = Self {
            deduplicate: config.checks.deduplicate,
            report_deadlocks: config.checks.report_deadlocks,
            levels: config.checks.levels.clone(),
        };
        for name in &config.checks.disabled {
            settings.levels.insert(name.clone(), CheckLevel::Allow);
        }
        settings
    }

    /// Disable deduplication (every report is emitted).
    #[must_use]
    pub fn without_dedup(mut self) -> Self {
        self.deduplicate = false;
        self
    }

    #[must_use]
    pub fn with_level(mut self, check: impl Into<String>, level: CheckLevel) -> Self {
        self.levels.insert(check.into(), level);
        self
    }

    #[must_use]
    pub fn disable(mut self, check: impl Into<String>) -> Self {
        self.levels.insert(check.into(), CheckLevel::Allow);
        self
    }

    /// The effective level for a check: explicit setting, else the
    /// descriptor default.
    pub fn level_for(&self, check_name: &str) -> CheckLevel {
        if let Some(&level) = self.levels.get(check_name) {
            return level;
        }
        find_descriptor(check_name)
            .map(|d| d.default_level)
            .unwrap_or_default()
    }
}

/// Default file name for configuration that `monitor-clippy` searches for.
pub const DEFAULT_CONFIG_FILE_NAME: &str = "monitor-clippy.toml";

/// Walk up from `start_dir` to find the nearest `monitor-clippy.toml`, if any.
#[must_use]
pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
    let mut cur = Some(start_dir);
    while let Some(dir) = cur {
        let candidate = dir.join(DEFAULT_CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        cur = dir.parent();
    }
    None
}

/// Load and parse a configuration file from disk.
#[must_use = "configuration may contain important settings"]
pub fn load_config_file(path: &Path) -> Result<MonitorClippyConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    let cfg: MonitorClippyConfig = toml::from_str(&raw)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;
    Ok(cfg)
}

/// Load configuration from an explicit path or by searching from `start_dir`.
#[must_use = "configuration may contain important settings"]
pub fn load_config(
    explicit_path: Option<&Path>,
    start_dir: &Path,
) -> Result<Option<(PathBuf, MonitorClippyConfig)>> {
    if let Some(p) = explicit_path {
        let cfg = load_config_file(p)?;
        return Ok(Some((p.to_path_buf(), cfg)));
    }

    let Some(p) = find_config_file(start_dir) else {
        return Ok(None);
    };
    let cfg = load_config_file(&p)?;
    Ok(Some((p, cfg)))
}
