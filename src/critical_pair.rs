//! Events, acquisitions and critical pairs.
//!
//! A critical pair is an atomic event (a lock acquisition, a potentially
//! blocking call, or a Strict Mode violation) witnessed in a state where a
//! specific ordered chain of locks is held. Summaries are sets of critical
//! pairs; the report engine composes pairs from different procedures to
//! detect lock-order inversions and UI-thread starvation.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ir::{Loc, ProcName};
use crate::lock::Lock;

/// How bad it is to block on a given call.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        };
        f.write_str(s)
    }
}

/// The atomic abstract events witnessed by the transfer function.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    LockAcquire(Lock),
    MayBlock { description: String, severity: Severity },
    StrictModeCall { description: String },
}

impl Event {
    /// The acquired lock, for `LockAcquire` events.
    pub fn acquired_lock(&self) -> Option<&Lock> {
        match self {
            Event::LockAcquire(lock) => Some(lock),
            _ => None,
        }
    }

    /// Human-readable description used in traces and messages.
    pub fn describe(&self) -> String {
        match self {
            Event::LockAcquire(lock) => format!("acquires lock `{lock}`"),
            Event::MayBlock { description, .. } => format!("may block calling `{description}`"),
            Event::StrictModeCall { description } => {
                format!("calls `{description}` (Strict Mode violation)")
            }
        }
    }
}

/// Where an acquisition came from: taken directly in the procedure, or
/// inherited from a callee's summary at a call site.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionAnchor {
    #[default]
    Direct,
    ViaCall(ProcName),
}

/// A record of where a lock was taken.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Acquisition {
    pub lock: Lock,
    pub procname: ProcName,
    pub loc: Loc,
    #[serde(default)]
    pub anchor: AcquisitionAnchor,
}

impl Acquisition {
    fn trace_line(&self) -> String {
        match &self.anchor {
            AcquisitionAnchor::Direct => {
                format!("holds `{}` (acquired at {})", self.lock, self.loc)
            }
            AcquisitionAnchor::ViaCall(callee) => format!(
                "holds `{}` (acquired in call to `{}` at {})",
                self.lock, callee, self.loc
            ),
        }
    }
}

/// The ordered, duplicate-free chain of currently held locks.
///
/// Keyed by lock so re-acquisition cannot create duplicates; iteration
/// order is the total lock order.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(from = "Vec<Acquisition>", into = "Vec<Acquisition>")]
pub struct HeldLocks(BTreeMap<Lock, Acquisition>);

impl HeldLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, lock: &Lock) -> bool {
        self.0.contains_key(lock)
    }

    /// Insert an acquisition unless its lock is already held. Returns
    /// whether the acquisition was inserted.
    pub fn insert(&mut self, acquisition: Acquisition) -> bool {
        if self.0.contains_key(&acquisition.lock) {
            return false;
        }
        self.0.insert(acquisition.lock.clone(), acquisition);
        true
    }

    /// Insert an acquisition, replacing any existing entry for the same
    /// lock. Used when a caller's held chain takes precedence over a
    /// callee's rebased one.
    pub fn insert_override(&mut self, acquisition: Acquisition) {
        self.0.insert(acquisition.lock.clone(), acquisition);
    }

    pub fn remove(&mut self, lock: &Lock) -> Option<Acquisition> {
        self.0.remove(lock)
    }

    /// Drop every lock not also held in `other`, keeping our acquisition
    /// records. This is the join of held chains at a CFG merge.
    pub fn intersect_with(&mut self, other: &HeldLocks) {
        self.0.retain(|lock, _| other.contains(lock));
    }

    pub fn iter(&self) -> impl Iterator<Item = &Acquisition> {
        self.0.values()
    }
}

impl From<Vec<Acquisition>> for HeldLocks {
    fn from(acquisitions: Vec<Acquisition>) -> Self {
        let mut held = HeldLocks::new();
        for a in acquisitions {
            held.insert(a);
        }
        held
    }
}

impl From<HeldLocks> for Vec<Acquisition> {
    fn from(held: HeldLocks) -> Self {
        held.0.into_values().collect()
    }
}

/// One frame of the call-site trace wrapped around an integrated pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TraceFrame {
    pub procname: ProcName,
    pub loc: Loc,
}

/// An event witnessed under a given acquisition chain.
///
/// Equality and ordering ignore the call trace: pairs that differ only in
/// how they were reached are duplicates, and the first witnessed trace
/// wins. This keeps the pair set bounded by the procedure's lock alphabet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriticalPair {
    pub acquisitions: HeldLocks,
    pub event: Event,
    pub loc: Loc,
    pub on_ui_thread: bool,
    #[serde(default)]
    pub trace: Vec<TraceFrame>,
}

impl PartialEq for CriticalPair {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for CriticalPair {}

impl PartialOrd for CriticalPair {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CriticalPair {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl CriticalPair {
    /// Witness `event` under the currently held chain. The chain is cloned
    /// structurally, not aliased: later releases must not rewrite history.
    pub fn new(held: &HeldLocks, event: Event, loc: Loc, on_ui_thread: bool) -> Self {
        Self {
            acquisitions: held.clone(),
            event,
            loc,
            on_ui_thread,
            trace: Vec::new(),
        }
    }

    fn key(&self) -> (&HeldLocks, &Event, &Loc, bool) {
        (&self.acquisitions, &self.event, &self.loc, self.on_ui_thread)
    }

    pub fn is_uithread(&self) -> bool {
        self.on_ui_thread
    }

    /// Classical lock-order inversion: `self` acquires B holding A while
    /// `other` acquires A holding B, for distinct locks A and B.
    pub fn may_deadlock(&self, other: &CriticalPair) -> bool {
        let (Some(b), Some(a)) = (self.event.acquired_lock(), other.event.acquired_lock()) else {
            return false;
        };
        a != b && self.acquisitions.contains(a) && other.acquisitions.contains(b)
    }

    /// Two pairs can execute concurrently unless both are witnessed on the
    /// single-threaded UI thread. Conservative default: true.
    pub fn can_run_in_parallel(&self, other: &CriticalPair) -> bool {
        !(self.on_ui_thread && other.on_ui_thread)
    }

    /// The source location of the earliest step belonging to `procname`:
    /// its own first acquisition by location, else the outermost call-site
    /// frame, falling back to the event location. Anchors diagnostics in
    /// the reported procedure's source where possible.
    pub fn earliest_lock_or_call_loc(&self, procname: &ProcName) -> Loc {
        if let Some(loc) = self
            .acquisitions
            .iter()
            .filter(|a| &a.procname == procname)
            .map(|a| &a.loc)
            .min()
        {
            return loc.clone();
        }
        if let Some(frame) = self.trace.first() {
            return frame.loc.clone();
        }
        self.loc.clone()
    }

    /// Wrap the pair with a call-site frame; used when a callee's pair is
    /// integrated into a caller at `loc`. The frame names the callee; its
    /// location is the call site in the caller's source.
    #[must_use]
    pub fn with_callsite(mut self, callee: ProcName, loc: Loc) -> Self {
        self.trace.insert(
            0,
            TraceFrame {
                procname: callee,
                loc,
            },
        );
        self
    }

    /// Materialize a human-readable trace, one step per line, each prefixed
    /// with `header`.
    pub fn make_trace(&self, header: &str, include_acquisitions: bool) -> Vec<String> {
        let mut lines = Vec::new();
        if include_acquisitions {
            for acquisition in self.acquisitions.iter() {
                lines.push(format!("{header}{}", acquisition.trace_line()));
            }
        }
        for frame in &self.trace {
            lines.push(format!(
                "{header}in call to `{}` at {}",
                frame.procname, frame.loc
            ));
        }
        lines.push(format!("{header}{} at {}", self.event.describe(), self.loc));
        lines
    }
}
