//! Models of library calls: the lock-effect classifier and the catalogs of
//! blocking, UI-thread-asserting and Strict-Mode-violating APIs.
//!
//! The transfer function is parameterized by a [`CallClassifier`] so a host
//! can plug its own models; [`BuiltinModels`] covers the common JDK/Android
//! and C++ standard-library surface. Matching is on fully qualified names
//! from explicit allowlists, never name heuristics.

use crate::critical_pair::Severity;
use crate::ir::{AccessExpr, ProcName};

/// Classification of a direct call's effect on the lock state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockEffect {
    /// Acquire the locks named by these argument expressions.
    Lock(Vec<AccessExpr>),
    /// Release the locks named by these argument expressions.
    Unlock(Vec<AccessExpr>),
    /// Acquires only when the call returns true; no unconditional effect.
    LockedIfTrue(Vec<AccessExpr>),
    /// Construct a scoped guard bound to `lock`, optionally acquiring it
    /// immediately (e.g. `std::lock_guard` vs. a deferred `unique_lock`).
    GuardConstruct {
        guard: AccessExpr,
        lock: Option<AccessExpr>,
        acquire_now: bool,
    },
    /// Acquire through a live guard.
    GuardLock(AccessExpr),
    /// Release through a live guard; the binding stays live for relocking.
    GuardUnlock(AccessExpr),
    /// Destroy a guard: release its lock and drop the binding.
    GuardDestroy(AccessExpr),
    /// `try_lock` through a guard; no unconditional effect.
    GuardLockedIfTrue(AccessExpr),
    /// No lock effect. The transfer function then consults the remaining
    /// classifiers, and finally the callee's summary.
    NoEffect,
}

/// Classifies callees for the transfer function.
pub trait CallClassifier {
    /// The call's effect on held locks and guards.
    fn lock_effect(&self, callee: &ProcName, actuals: &[AccessExpr]) -> LockEffect;

    /// A wrapper that acquires its first argument's monitor, runs, and
    /// releases it (e.g. a synchronized collection method).
    fn is_synchronized_wrapper(&self, callee: &ProcName) -> bool;

    /// An assertion that the caller is on the UI thread.
    fn is_ui_thread_marker(&self, callee: &ProcName) -> bool;

    /// A call Strict Mode would flag on the UI thread; returns its
    /// description.
    fn strict_mode_violation(&self, callee: &ProcName) -> Option<String>;

    /// A potentially blocking call; returns description and severity.
    fn may_block(&self, callee: &ProcName) -> Option<(String, Severity)>;

    /// Callees whose bodies must not be traversed (library internals).
    fn should_skip(&self, callee: &ProcName) -> bool;
}

/// The monitor-enter/exit pseudo-procedures frontends emit for Java
/// `synchronized` blocks.
pub const BUILTIN_CLASS: &str = "__builtin";
pub const MONITOR_ENTER: &str = "monitor_enter";
pub const MONITOR_EXIT: &str = "monitor_exit";

const LOCK_METHODS: &[(&str, &str)] = &[
    (BUILTIN_CLASS, MONITOR_ENTER),
    ("java.util.concurrent.locks.ReentrantLock", "lock"),
    ("java.util.concurrent.locks.ReentrantLock", "lockInterruptibly"),
    ("java.util.concurrent.locks.Lock", "lock"),
    ("java.util.concurrent.locks.Lock", "lockInterruptibly"),
    ("std::mutex", "lock"),
    ("std::recursive_mutex", "lock"),
];

const UNLOCK_METHODS: &[(&str, &str)] = &[
    (BUILTIN_CLASS, MONITOR_EXIT),
    ("java.util.concurrent.locks.ReentrantLock", "unlock"),
    ("java.util.concurrent.locks.Lock", "unlock"),
    ("std::mutex", "unlock"),
    ("std::recursive_mutex", "unlock"),
];

const TRY_LOCK_METHODS: &[(&str, &str)] = &[
    ("java.util.concurrent.locks.ReentrantLock", "tryLock"),
    ("java.util.concurrent.locks.Lock", "tryLock"),
    ("std::mutex", "try_lock"),
];

const GUARD_CLASSES: &[&str] = &["std::lock_guard", "std::unique_lock", "std::scoped_lock"];

const MAY_BLOCK_METHODS: &[(&str, &str, Severity)] = &[
    ("java.lang.Thread", "sleep", Severity::High),
    ("java.lang.Thread", "join", Severity::High),
    ("java.lang.Object", "wait", Severity::High),
    ("java.util.concurrent.Future", "get", Severity::High),
    ("java.util.concurrent.CountDownLatch", "await", Severity::High),
    ("java.util.concurrent.CyclicBarrier", "await", Severity::Medium),
    ("java.util.concurrent.Semaphore", "acquire", Severity::Medium),
    ("java.util.concurrent.Exchanger", "exchange", Severity::Medium),
    ("android.os.AsyncTask", "get", Severity::Medium),
    ("java.util.concurrent.locks.Condition", "await", Severity::Low),
];

const UI_THREAD_MARKERS: &[(&str, &str)] = &[
    ("android.os.ThreadUtils", "assertOnUiThread"),
    ("android.os.ThreadUtils", "assertMainThread"),
    ("com.google.common.base.Preconditions", "checkOnMainThread"),
];

const STRICT_MODE_METHODS: &[(&str, &str)] = &[
    ("java.io.File", "exists"),
    ("java.io.File", "delete"),
    ("java.io.File", "mkdirs"),
    ("java.io.File", "length"),
    ("java.net.Socket", "connect"),
    ("android.content.SharedPreferences$Editor", "commit"),
];

const SYNCHRONIZED_WRAPPERS: &[(&str, &str)] = &[
    ("java.util.Hashtable", "get"),
    ("java.util.Hashtable", "put"),
    ("java.util.Hashtable", "remove"),
    ("java.util.Vector", "add"),
    ("java.util.Vector", "get"),
    ("java.lang.StringBuffer", "append"),
];

const SKIP_PREFIXES: &[&str] = &["java.", "javax.", "sun.", "android.", "androidx.", "std::"];

/// Default models. Stateless; construct with `BuiltinModels::default()`.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinModels;

fn matches(callee: &ProcName, table: &[(&str, &str)]) -> bool {
    table
        .iter()
        .any(|(class, method)| callee.class.as_str() == *class && callee.method == *method)
}

impl CallClassifier for BuiltinModels {
    fn lock_effect(&self, callee: &ProcName, actuals: &[AccessExpr]) -> LockEffect {
        let first = || actuals.first().cloned().into_iter().collect::<Vec<_>>();
        if matches(callee, LOCK_METHODS) {
            return LockEffect::Lock(first());
        }
        if matches(callee, UNLOCK_METHODS) {
            return LockEffect::Unlock(first());
        }
        if matches(callee, TRY_LOCK_METHODS) {
            return LockEffect::LockedIfTrue(first());
        }
        if GUARD_CLASSES.contains(&callee.class.as_str()) {
            let Some(guard) = actuals.first().cloned() else {
                return LockEffect::NoEffect;
            };
            return match callee.method.as_str() {
                // Constructors: lock_guard and scoped_lock acquire
                // immediately; unique_lock supports deferred locking but
                // the common constructor acquires.
                "constructor" => LockEffect::GuardConstruct {
                    guard,
                    lock: actuals.get(1).cloned(),
                    acquire_now: true,
                },
                "defer_construct" => LockEffect::GuardConstruct {
                    guard,
                    lock: actuals.get(1).cloned(),
                    acquire_now: false,
                },
                "lock" => LockEffect::GuardLock(guard),
                "unlock" => LockEffect::GuardUnlock(guard),
                "try_lock" => LockEffect::GuardLockedIfTrue(guard),
                "destructor" => LockEffect::GuardDestroy(guard),
                _ => LockEffect::NoEffect,
            };
        }
        LockEffect::NoEffect
    }

    fn is_synchronized_wrapper(&self, callee: &ProcName) -> bool {
        matches(callee, SYNCHRONIZED_WRAPPERS)
    }

    fn is_ui_thread_marker(&self, callee: &ProcName) -> bool {
        matches(callee, UI_THREAD_MARKERS)
    }

    fn strict_mode_violation(&self, callee: &ProcName) -> Option<String> {
        matches(callee, STRICT_MODE_METHODS).then(|| callee.to_string())
    }

    fn may_block(&self, callee: &ProcName) -> Option<(String, Severity)> {
        MAY_BLOCK_METHODS
            .iter()
            .find(|(class, method, _)| {
                callee.class.as_str() == *class && callee.method == *method
            })
            .map(|(_, _, severity)| (callee.to_string(), *severity))
    }

    fn should_skip(&self, callee: &ProcName) -> bool {
        callee.class.as_str() == BUILTIN_CLASS
            || SKIP_PREFIXES
                .iter()
                .any(|prefix| callee.class.as_str().starts_with(prefix))
    }
}
