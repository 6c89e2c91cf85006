//! Issue kinds and their static metadata.
//!
//! Mirrors the check registry surface: `list-checks` and `explain` read the
//! descriptor table, configuration addresses checks by `name`, and every
//! emitted [`Issue`] carries its kind, resolved level, message and trace.

use std::fmt::{self, Display, Formatter};

use serde::Serialize;

use crate::critical_pair::Severity;
use crate::ir::{Loc, ProcName};
use crate::level::CheckLevel;

/// The defect classes monitor-clippy reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Deadlock,
    Starvation(Severity),
    StrictModeViolation,
    LocklessViolation,
}

impl IssueKind {
    /// The check name used in configuration and CLI output.
    pub fn check_name(&self) -> &'static str {
        match self {
            IssueKind::Deadlock => "deadlock",
            IssueKind::Starvation(_) => "starvation",
            IssueKind::StrictModeViolation => "strict_mode_violation",
            IssueKind::LocklessViolation => "lockless_violation",
        }
    }
}

impl Display for IssueKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            IssueKind::Starvation(severity) => write!(f, "starvation ({severity})"),
            other => f.write_str(other.check_name()),
        }
    }
}

/// Static metadata describing a check.
#[derive(Debug)]
pub struct CheckDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub default_level: CheckLevel,
}

/// All checks, in stable order.
pub static CHECKS: &[CheckDescriptor] = &[
    CheckDescriptor {
        name: "deadlock",
        description: "Two procedures acquire the same locks in opposite orders, \
                      or one lock is taken twice on the same path",
        default_level: CheckLevel::Error,
    },
    CheckDescriptor {
        name: "starvation",
        description: "The UI thread executes, or waits on a lock held across, \
                      a potentially blocking call",
        default_level: CheckLevel::Warn,
    },
    CheckDescriptor {
        name: "strict_mode_violation",
        description: "A call Strict Mode flags (I/O, slow calls) runs on the UI thread",
        default_level: CheckLevel::Warn,
    },
    CheckDescriptor {
        name: "lockless_violation",
        description: "A procedure annotated lockless acquires a monitor",
        default_level: CheckLevel::Error,
    },
];

/// Look up a check descriptor by name.
pub fn find_descriptor(name: &str) -> Option<&'static CheckDescriptor> {
    CHECKS.iter().find(|d| d.name == name)
}

/// A rendered finding.
#[derive(Debug, Clone, Serialize)]
pub struct Issue {
    pub procname: ProcName,
    pub loc: Loc,
    pub kind: IssueKind,
    pub level: CheckLevel,
    pub message: String,
    pub trace: Vec<String>,
}
