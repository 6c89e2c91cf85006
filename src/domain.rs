//! The procedure-local abstract state and its lattice.
//!
//! A [`LockState`] tracks the currently held acquisition chain, the set of
//! critical pairs witnessed so far, the guard bindings of RAII-style lock
//! guards, and whether the procedure is known to run on the UI thread. The
//! join intersects held locks and guard bindings, unions pairs, and keeps
//! UI-thread truth. Pair sets are bounded by the procedure's finite lock
//! alphabet, so the join doubles as the widening.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::critical_pair::{
    Acquisition, AcquisitionAnchor, CriticalPair, Event, HeldLocks, Severity,
};
use crate::ir::{AccessExpr, Loc, ProcDesc, ProcName, ThreadKind};
use crate::lock::Lock;

/// Whether the current procedure runs on the UI thread.
///
/// `Unknown` is bottom; `AnyThread` records an explicit `@WorkerThread`
/// annotation. Truth is sticky under join: a path known to be on the UI
/// thread keeps the whole merge on it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum UiThread {
    #[default]
    Unknown,
    Yes,
    AnyThread,
}

impl UiThread {
    pub fn join(self, other: UiThread) -> UiThread {
        use UiThread::*;
        match (self, other) {
            (Unknown, x) | (x, Unknown) => x,
            (Yes, _) | (_, Yes) => Yes,
            (AnyThread, AnyThread) => AnyThread,
        }
    }

    pub fn is_uithread(&self) -> bool {
        matches!(self, UiThread::Yes)
    }
}

/// Identity of a scoped lock-guard object, a local of the procedure.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct GuardId(String);

impl GuardId {
    pub fn from_expr(expr: &AccessExpr) -> Self {
        Self(expr.to_string())
    }
}

impl Display for GuardId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The abstract state at a program point.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LockState {
    /// Currently held acquisitions, ordered by lock, duplicate-free.
    pub held: HeldLocks,
    /// Critical pairs witnessed so far. Monotonically accumulates.
    pub critical_pairs: BTreeSet<CriticalPair>,
    /// Live guard bindings.
    pub guards: BTreeMap<GuardId, Lock>,
    pub on_ui_thread: UiThread,
}

impl LockState {
    /// Bottom: empty everywhere.
    pub fn bottom() -> Self {
        Self::default()
    }

    /// The state at a procedure's entry. A `synchronized` procedure starts
    /// with its monitor held: `this` for instance methods, the class lock
    /// for static ones. The thread annotation seeds the UI-thread flag.
    pub fn initial(proc: &ProcDesc) -> Self {
        let mut state = Self::bottom();
        state.on_ui_thread = match proc.attributes.thread {
            ThreadKind::Unannotated => UiThread::Unknown,
            ThreadKind::Ui => UiThread::Yes,
            ThreadKind::Worker => UiThread::AnyThread,
        };
        if proc.attributes.is_synchronized {
            let monitor = if proc.attributes.is_static {
                Some(Lock::class_lock(proc.name.class.clone()))
            } else {
                proc.formals.first().and_then(|this| {
                    Lock::from_expr(&AccessExpr::formal(
                        this.index,
                        this.name.clone(),
                        this.typ.clone(),
                    ))
                })
            };
            if let Some(lock) = monitor {
                state.acquire(lock, proc.name.clone(), proc.loc.clone());
            }
        }
        state
    }

    /// Join `other` into `self`, returning whether anything changed.
    pub fn join_with(&mut self, other: &LockState) -> bool {
        let old = self.clone();
        self.held.intersect_with(&other.held);
        self.critical_pairs
            .extend(other.critical_pairs.iter().cloned());
        self.guards
            .retain(|guard, lock| other.guards.get(guard) == Some(lock));
        self.on_ui_thread = self.on_ui_thread.join(other.on_ui_thread);
        *self != old
    }

    /// The join as a value; convenient for lattice-law tests.
    #[must_use]
    pub fn joined(&self, other: &LockState) -> LockState {
        let mut result = self.clone();
        result.join_with(other);
        result
    }

    /// Partial order consistent with the join: `self ⊑ other` iff joining
    /// `self` into `other` leaves `other` unchanged.
    pub fn leq(&self, other: &LockState) -> bool {
        other.joined(self) == *other
    }

    /// Acquire `lock`, witnessing a `LockAcquire` critical pair.
    ///
    /// The pair captures the held chain as it stands before insertion, so
    /// only a re-acquisition places the event lock inside its own chain;
    /// that is the self-deadlock signal picked up by the report engine.
    /// The held chain itself stays duplicate-free.
    pub fn acquire(&mut self, lock: Lock, procname: ProcName, loc: Loc) {
        self.push_pair(Event::LockAcquire(lock.clone()), loc.clone());
        self.held.insert(Acquisition {
            lock,
            procname,
            loc,
            anchor: AcquisitionAnchor::Direct,
        });
    }

    /// Release `lock`. Unmatched releases are silently ignored.
    pub fn release(&mut self, lock: &Lock) {
        self.held.remove(lock);
    }

    /// Witness a potentially blocking call.
    pub fn add_may_block(&mut self, description: impl Into<String>, severity: Severity, loc: Loc) {
        self.push_pair(
            Event::MayBlock {
                description: description.into(),
                severity,
            },
            loc,
        );
    }

    /// Witness a Strict Mode violation.
    pub fn add_strict_mode_call(&mut self, description: impl Into<String>, loc: Loc) {
        self.push_pair(
            Event::StrictModeCall {
                description: description.into(),
            },
            loc,
        );
    }

    /// A UI-thread assertion was observed; the rest of the procedure is
    /// known to run on the UI thread.
    pub fn set_on_ui_thread(&mut self) {
        self.on_ui_thread = UiThread::Yes;
    }

    /// Bind a guard to its lock. Rebinding a live guard overwrites.
    pub fn bind_guard(&mut self, guard: GuardId, lock: Lock) {
        self.guards.insert(guard, lock);
    }

    /// The lock currently bound to `guard`, if the guard is live.
    pub fn guard_lock(&self, guard: &GuardId) -> Option<Lock> {
        self.guards.get(guard).cloned()
    }

    /// Destroy a guard, removing its binding.
    pub fn destroy_guard(&mut self, guard: &GuardId) -> Option<Lock> {
        self.guards.remove(guard)
    }

    fn push_pair(&mut self, event: Event, loc: Loc) {
        let pair = CriticalPair::new(&self.held, event, loc, self.on_ui_thread.is_uithread());
        self.critical_pairs.insert(pair);
    }
}
