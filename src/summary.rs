//! Per-procedure summaries and their integration at call sites.
//!
//! A summary is the join of a procedure's exit states, stripped of held
//! locks and guard bindings (callees are assumed balanced). Integration
//! substitutes actuals for formal-parameter roots in the callee's critical
//! pairs, prepends the caller's held chain, and wraps each pair's trace
//! with the call site.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::critical_pair::{Acquisition, AcquisitionAnchor, CriticalPair, Event};
use crate::domain::{LockState, UiThread};
use crate::ir::{AccessExpr, Loc, ProcName};

/// The published abstract value of a procedure: what it may witness, and
/// whether it is known to run on the UI thread.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Summary {
    pub critical_pairs: BTreeSet<CriticalPair>,
    pub on_ui_thread: UiThread,
}

impl Summary {
    /// Publish a procedure's exit state. Held locks and guards are dropped:
    /// a callee that leaks an acquisition past its exit is out of model.
    pub fn from_exit_state(state: LockState) -> Self {
        Self {
            critical_pairs: state.critical_pairs,
            on_ui_thread: state.on_ui_thread,
        }
    }
}

/// Read/write access to published summaries.
///
/// `read` takes the caller so a host store can track the dependency for
/// re-scheduling; the in-memory store ignores it.
pub trait SummaryStore {
    fn read(&self, caller: &ProcName, callee: &ProcName) -> Option<&Summary>;
    fn write(&mut self, procname: ProcName, summary: Summary);
}

/// Write-once-per-procedure map used by the engine and the tests.
#[derive(Debug, Default, Clone)]
pub struct InMemorySummaryStore {
    summaries: BTreeMap<ProcName, Summary>,
}

impl InMemorySummaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, procname: &ProcName) -> Option<&Summary> {
        self.summaries.get(procname)
    }

    /// All summaries in deterministic name order; the reporting phase
    /// iterates this.
    pub fn iter(&self) -> impl Iterator<Item = (&ProcName, &Summary)> {
        self.summaries.iter()
    }
}

impl SummaryStore for InMemorySummaryStore {
    fn read(&self, _caller: &ProcName, callee: &ProcName) -> Option<&Summary> {
        self.summaries.get(callee)
    }

    fn write(&mut self, procname: ProcName, summary: Summary) {
        self.summaries.insert(procname, summary);
    }
}

/// Substitute `summary` into `state` at a call to `callee` at `loc`.
///
/// Pairs whose paths cannot be rebased onto the actuals are dropped.
/// Integration is monotonic in both arguments and idempotent for a fixed
/// summary: rebased pairs land in a set and the UI-thread join is
/// idempotent. The caller's held chain and guards are untouched.
pub fn integrate_summary(
    state: &mut LockState,
    summary: &Summary,
    callee: &ProcName,
    actuals: &[AccessExpr],
    loc: &Loc,
) {
    let caller_on_ui = state.on_ui_thread.is_uithread();
    for pair in &summary.critical_pairs {
        let Some(mut rebased) = rebase_pair(pair, callee, actuals) else {
            continue;
        };
        // The caller was holding these when the callee ran.
        for acquisition in state.held.iter() {
            rebased.acquisitions.insert_override(acquisition.clone());
        }
        // The callee executes on the caller's thread.
        if caller_on_ui {
            rebased.on_ui_thread = true;
        }
        let rebased = rebased.with_callsite(callee.clone(), loc.clone());
        state.critical_pairs.insert(rebased);
    }
    state.on_ui_thread = state.on_ui_thread.join(summary.on_ui_thread);
}

/// Rebase one pair's access paths from the callee's formals onto the call
/// site's actuals. Returns `None` when any path is unbindable.
fn rebase_pair(
    pair: &CriticalPair,
    callee: &ProcName,
    actuals: &[AccessExpr],
) -> Option<CriticalPair> {
    let event = match &pair.event {
        Event::LockAcquire(lock) => Event::LockAcquire(lock.rebase(actuals)?),
        other => other.clone(),
    };
    let mut acquisitions = crate::critical_pair::HeldLocks::new();
    for acquisition in pair.acquisitions.iter() {
        let lock = acquisition.lock.rebase(actuals)?;
        acquisitions.insert(Acquisition {
            lock,
            procname: acquisition.procname.clone(),
            loc: acquisition.loc.clone(),
            anchor: match &acquisition.anchor {
                AcquisitionAnchor::Direct => AcquisitionAnchor::ViaCall(callee.clone()),
                inherited => inherited.clone(),
            },
        });
    }
    Some(CriticalPair {
        acquisitions,
        event,
        loc: pair.loc.clone(),
        on_ui_thread: pair.on_ui_thread,
        trace: pair.trace.clone(),
    })
}
