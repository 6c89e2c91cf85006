use serde::{Deserialize, Serialize};

/// Per-check severity level used by issues and configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum CheckLevel {
    Allow,
    #[default]
    Warn,
    Error,
}

impl CheckLevel {
    /// String representation used in CLI output and config files.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckLevel::Allow => "allow",
            CheckLevel::Warn => "warning",
            CheckLevel::Error => "error",
        }
    }
}
