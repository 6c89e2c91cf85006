//! The per-instruction transfer function.
//!
//! Interprets IR instructions as [`LockState`] transformers: lock/unlock
//! and guard operations, blocking and Strict Mode calls, UI-thread
//! markers, and summary integration for everything else. Modeling gaps
//! (a classifier shape the transfer cannot use) degrade to the identity
//! with a debug log; they never abort analysis.

use crate::absint::TransferFunctions;
use crate::domain::{GuardId, LockState};
use crate::ir::{AccessExpr, Instr, Language, Loc, ProcDesc, ProcName};
use crate::lock::Lock;
use crate::models::{CallClassifier, LockEffect};
use crate::summary::{SummaryStore, integrate_summary};

#[cfg(feature = "telemetry")]
use tracing::debug;

#[cfg(not(feature = "telemetry"))]
macro_rules! debug {
    ($($arg:tt)*) => {{}};
}

/// Transfer context for one procedure.
pub struct Transfer<'a> {
    proc: &'a ProcDesc,
    language: Language,
    classifier: &'a dyn CallClassifier,
    summaries: &'a dyn SummaryStore,
}

impl<'a> Transfer<'a> {
    pub fn new(
        proc: &'a ProcDesc,
        language: Language,
        classifier: &'a dyn CallClassifier,
        summaries: &'a dyn SummaryStore,
    ) -> Self {
        Self {
            proc,
            language,
            classifier,
            summaries,
        }
    }

    fn procname(&self) -> &ProcName {
        &self.proc.name
    }

    fn exec_call(
        &self,
        state: &mut LockState,
        callee: &ProcName,
        actuals: &[AccessExpr],
        loc: &Loc,
    ) {
        match self.classifier.lock_effect(callee, actuals) {
            LockEffect::Lock(exprs) => self.do_lock(state, &exprs, loc),
            LockEffect::Unlock(exprs) => {
                for expr in &exprs {
                    if let Some(lock) = Lock::from_expr(expr) {
                        state.release(&lock);
                    }
                }
            }
            // No unconditional effect.
            LockEffect::LockedIfTrue(_) | LockEffect::GuardLockedIfTrue(_) => {}
            LockEffect::GuardConstruct {
                guard,
                lock,
                acquire_now,
            } => {
                let guard = GuardId::from_expr(&guard);
                match lock.as_ref().and_then(Lock::from_expr) {
                    Some(lock) => {
                        state.bind_guard(guard, lock.clone());
                        if acquire_now {
                            state.acquire(lock, self.procname().clone(), loc.clone());
                        }
                    }
                    None => {
                        debug!(
                            "guard constructor for `{guard}` at {loc} without a recognizable lock"
                        );
                    }
                }
            }
            LockEffect::GuardLock(guard) => {
                let guard = GuardId::from_expr(&guard);
                match state.guard_lock(&guard) {
                    Some(lock) => state.acquire(lock, self.procname().clone(), loc.clone()),
                    None => debug!("lock through unbound guard `{guard}` at {loc}"),
                }
            }
            LockEffect::GuardUnlock(guard) => {
                let guard = GuardId::from_expr(&guard);
                // The binding stays live: the guard may relock.
                if let Some(lock) = state.guard_lock(&guard) {
                    state.release(&lock);
                }
            }
            LockEffect::GuardDestroy(guard) => {
                let guard = GuardId::from_expr(&guard);
                if let Some(lock) = state.destroy_guard(&guard) {
                    state.release(&lock);
                }
            }
            LockEffect::NoEffect => self.exec_unmodeled_call(state, callee, actuals, loc),
        }
    }

    fn exec_unmodeled_call(
        &self,
        state: &mut LockState,
        callee: &ProcName,
        actuals: &[AccessExpr],
        loc: &Loc,
    ) {
        if self.classifier.is_synchronized_wrapper(callee) {
            // Acquire-then-release of the receiver's monitor, combined.
            if let Some(lock) = actuals.first().and_then(Lock::from_expr) {
                state.acquire(lock.clone(), self.procname().clone(), loc.clone());
                state.release(&lock);
            }
            return;
        }
        if self.language.supports_blocking_analysis() {
            if self.classifier.is_ui_thread_marker(callee) {
                state.set_on_ui_thread();
                return;
            }
            if let Some(description) = self.classifier.strict_mode_violation(callee) {
                state.add_strict_mode_call(description, loc.clone());
                return;
            }
            if let Some((description, severity)) = self.classifier.may_block(callee) {
                if !self.proc.attributes.is_nonblocking {
                    state.add_may_block(description, severity, loc.clone());
                }
                return;
            }
        }
        if self.classifier.should_skip(callee) {
            return;
        }
        match self.summaries.read(self.procname(), callee) {
            Some(summary) => integrate_summary(state, summary, callee, actuals, loc),
            // Not yet summarized (mutual recursion, or scheduling gap):
            // the callee contributes bottom and the scheduler revisits.
            None => debug!("missing summary for `{callee}` called at {loc}"),
        }
    }

    fn do_lock(&self, state: &mut LockState, exprs: &[AccessExpr], loc: &Loc) {
        for expr in exprs {
            // Locals and temporaries are expected here; skip silently.
            if let Some(lock) = Lock::from_expr(expr) {
                state.acquire(lock, self.procname().clone(), loc.clone());
            }
        }
    }
}

impl TransferFunctions for Transfer<'_> {
    fn exec_instr(&self, state: &mut LockState, instr: &Instr) {
        match instr {
            Instr::Assign { .. }
            | Instr::Assume { .. }
            | Instr::Metadata
            | Instr::IndirectCall { .. } => {}
            Instr::Call {
                callee,
                actuals,
                loc,
            } => self.exec_call(state, callee, actuals, loc),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::absint::ProcCfg;
    use crate::critical_pair::Event;
    use crate::ir::{ClassName, FormalParam, ProcAttributes};
    use crate::models::{BUILTIN_CLASS, BuiltinModels, MONITOR_ENTER, MONITOR_EXIT};
    use crate::summary::InMemorySummaryStore;

    fn proc(attrs: ProcAttributes) -> ProcDesc {
        ProcDesc {
            name: ProcName::new("A", "m"),
            formals: vec![FormalParam {
                index: 0,
                name: "this".into(),
                typ: Some(ClassName::new("A")),
            }],
            attributes: attrs,
            loc: Loc::new("A.java", 1, 1),
            cfg: ProcCfg::linear(Vec::new()),
        }
    }

    fn this_field(field: &str) -> AccessExpr {
        AccessExpr::formal(0, "this", Some(ClassName::new("A"))).field(field)
    }

    fn call(class: &str, method: &str, actuals: Vec<AccessExpr>, line: u32) -> Instr {
        Instr::Call {
            callee: ProcName::new(class, method),
            actuals,
            loc: Loc::new("A.java", line, 1),
        }
    }

    fn run(proc: &ProcDesc, language: Language, instrs: &[Instr]) -> LockState {
        let models = BuiltinModels;
        let store = InMemorySummaryStore::new();
        let transfer = Transfer::new(proc, language, &models, &store);
        let mut state = LockState::initial(proc);
        for instr in instrs {
            transfer.exec_instr(&mut state, instr);
        }
        state
    }

    #[test]
    fn test_lock_unlock_is_balanced() {
        let proc = proc(ProcAttributes::default());
        let state = run(
            &proc,
            Language::Java,
            &[
                call(BUILTIN_CLASS, MONITOR_ENTER, vec![this_field("x")], 2),
                call(BUILTIN_CLASS, MONITOR_EXIT, vec![this_field("x")], 3),
            ],
        );
        assert!(state.held.is_empty());
        assert_eq!(state.critical_pairs.len(), 1);
    }

    #[test]
    fn test_unmatched_unlock_is_ignored() {
        let proc = proc(ProcAttributes::default());
        let state = run(
            &proc,
            Language::Java,
            &[call(BUILTIN_CLASS, MONITOR_EXIT, vec![this_field("x")], 2)],
        );
        assert!(state.held.is_empty());
        assert!(state.critical_pairs.is_empty());
    }

    #[test]
    fn test_local_lock_expressions_are_skipped() {
        let proc = proc(ProcAttributes::default());
        let state = run(
            &proc,
            Language::Java,
            &[call(
                BUILTIN_CLASS,
                MONITOR_ENTER,
                vec![AccessExpr::local("tmp")],
                2,
            )],
        );
        assert!(state.held.is_empty());
        assert!(state.critical_pairs.is_empty());
    }

    #[test]
    fn test_blocking_call_witnessed_only_for_java() {
        let sleep = call("java.lang.Thread", "sleep", Vec::new(), 2);
        let java = run(&proc(ProcAttributes::default()), Language::Java, &[sleep.clone()]);
        assert_eq!(java.critical_pairs.len(), 1);

        let cpp = run(&proc(ProcAttributes::default()), Language::Cpp, &[sleep]);
        assert!(cpp.critical_pairs.is_empty());
    }

    #[test]
    fn test_nonblocking_attribute_suppresses_direct_blocks() {
        let attrs = ProcAttributes {
            is_nonblocking: true,
            ..Default::default()
        };
        let state = run(
            &proc(attrs),
            Language::Java,
            &[call("java.lang.Thread", "sleep", Vec::new(), 2)],
        );
        assert!(state.critical_pairs.is_empty());
    }

    #[test]
    fn test_ui_thread_marker_sets_flag() {
        let state = run(
            &proc(ProcAttributes::default()),
            Language::Java,
            &[
                call("android.os.ThreadUtils", "assertOnUiThread", Vec::new(), 2),
                call("java.lang.Thread", "sleep", Vec::new(), 3),
            ],
        );
        assert!(state.on_ui_thread.is_uithread());
        assert!(state.critical_pairs.iter().all(|cp| cp.on_ui_thread));
    }

    #[test]
    fn test_synchronized_wrapper_combines_acquire_release() {
        let state = run(
            &proc(ProcAttributes::default()),
            Language::Java,
            &[call(
                "java.util.Hashtable",
                "get",
                vec![this_field("table")],
                2,
            )],
        );
        assert!(state.held.is_empty());
        assert_eq!(state.critical_pairs.len(), 1);
        assert!(matches!(
            &state.critical_pairs.iter().next().unwrap().event,
            Event::LockAcquire(_)
        ));
    }

    #[test]
    fn test_guard_lifecycle() {
        let proc = proc(ProcAttributes::default());
        let guard = AccessExpr::local("g");
        let state = run(
            &proc,
            Language::Cpp,
            &[
                call(
                    "std::unique_lock",
                    "constructor",
                    vec![guard.clone(), this_field("mu")],
                    2,
                ),
                call("std::unique_lock", "unlock", vec![guard.clone()], 3),
                call("std::unique_lock", "lock", vec![guard.clone()], 4),
                call("std::unique_lock", "destructor", vec![guard], 5),
            ],
        );
        assert!(state.held.is_empty());
        assert!(state.guards.is_empty());
        // Construct-acquire and relock each witnessed a pair.
        assert_eq!(state.critical_pairs.len(), 2);
    }

    #[test]
    fn test_strict_mode_call_witnessed() {
        let state = run(
            &proc(ProcAttributes::default()),
            Language::Java,
            &[call("java.io.File", "exists", Vec::new(), 2)],
        );
        assert!(matches!(
            &state.critical_pairs.iter().next().unwrap().event,
            Event::StrictModeCall { .. }
        ));
    }
}
