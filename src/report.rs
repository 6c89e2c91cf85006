//! The inter-procedural report engine.
//!
//! Scans each procedure's critical pairs, composes them with the summaries
//! of sibling methods of the lock owner class, breaks symmetry so each
//! deadlock is reported once, and deduplicates reports sharing a source
//! line. Reports never throw; they accumulate in a [`ReportMap`] and are
//! emitted at the end.

use std::collections::BTreeMap;

use crate::config::CheckSettings;
use crate::critical_pair::{CriticalPair, Event};
use crate::error::{Error, Result};
use crate::ir::{Loc, ProcDesc, ProcName, Program};
use crate::issue::{Issue, IssueKind};
use crate::level::CheckLevel;
use crate::lock::Lock;
use crate::summary::{InMemorySummaryStore, Summary};

/// Sink for rendered issues. The engine folds the report map into one.
pub trait IssueLog {
    fn log(&mut self, issue: Issue);
}

impl IssueLog for Vec<Issue> {
    fn log(&mut self, issue: Issue) {
        self.push(issue);
    }
}

/// Dedup bucket: one per problem kind per source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum ProblemClass {
    Deadlock,
    Starvation,
    StrictMode,
    Lockless,
}

#[derive(Debug)]
struct Pending {
    class: ProblemClass,
    /// Larger wins within a bucket. Deadlocks and Strict Mode weigh the
    /// negated trace length (shorter traces win); starvation weighs the
    /// severity.
    weight: i64,
    issue: Issue,
}

/// Reports keyed by source location, deduplicated at emission.
#[derive(Debug, Default)]
pub struct ReportMap {
    pending: BTreeMap<Loc, Vec<Pending>>,
}

impl ReportMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&mut self, class: ProblemClass, weight: i64, issue: Issue) {
        self.pending
            .entry(issue.loc.clone())
            .or_default()
            .push(Pending {
                class,
                weight,
                issue,
            });
    }

    fn add_trace_weighted(
        &mut self,
        class: ProblemClass,
        kind: IssueKind,
        procname: ProcName,
        loc: Loc,
        message: String,
        trace: Vec<String>,
    ) {
        let weight = -(trace.len() as i64);
        self.add(
            class,
            weight,
            Issue {
                procname,
                loc,
                kind,
                level: CheckLevel::Warn,
                message,
                trace,
            },
        );
    }

    /// Emit accumulated reports. With deduplication enabled, each
    /// `(location, problem kind)` keeps only the largest-weight report, its
    /// message suffixed with a suppression note.
    pub fn emit(self, settings: &CheckSettings, log: &mut dyn IssueLog) {
        for (_loc, pendings) in self.pending {
            let mut by_class: BTreeMap<ProblemClass, Vec<Pending>> = BTreeMap::new();
            for pending in pendings {
                by_class.entry(pending.class).or_default().push(pending);
            }
            for (_class, mut group) in by_class {
                if settings.deduplicate && group.len() > 1 {
                    let suppressed = group.len() - 1;
                    let best = group
                        .into_iter()
                        .reduce(|best, cand| if cand.weight > best.weight { cand } else { best })
                        .expect("non-empty group");
                    let mut issue = best.issue;
                    issue.message.push_str(&format!(
                        " ({suppressed} less relevant report(s) on the same line suppressed)"
                    ));
                    emit_one(settings, issue, log);
                } else {
                    for pending in group.drain(..) {
                        emit_one(settings, pending.issue, log);
                    }
                }
            }
        }
    }
}

fn emit_one(settings: &CheckSettings, mut issue: Issue, log: &mut dyn IssueLog) {
    let level = settings.level_for(issue.kind.check_name());
    if level == CheckLevel::Allow {
        return;
    }
    issue.level = level;
    log.log(issue);
}

/// Scan one procedure's summary and add its reports to `map`.
///
/// Ineligible procedures (private, class initializers, auto-generated) are
/// skipped here but their summaries still feed other procedures' reports.
pub fn report_procedure(
    program: &Program,
    proc: &ProcDesc,
    summary: &Summary,
    store: &InMemorySummaryStore,
    settings: &CheckSettings,
    map: &mut ReportMap,
) -> Result<()> {
    let attrs = &proc.attributes;
    if !attrs.is_report_eligible() {
        return Ok(());
    }
    for pair in &summary.critical_pairs {
        match &pair.event {
            Event::LockAcquire(lock) => {
                if attrs.is_lockless {
                    report_lockless(proc, pair, lock, map);
                }
                if settings.report_deadlocks {
                    if pair.acquisitions.contains(lock) {
                        report_self_deadlock(proc, pair, lock, map);
                    }
                    report_against_siblings(program, proc, pair, lock, store, settings, map)?;
                }
            }
            Event::MayBlock {
                description,
                severity,
            } => {
                if pair.is_uithread() && !attrs.is_constructor {
                    let message = format!(
                        "UI thread starvation: `{}` may block calling `{description}`.",
                        proc.name
                    );
                    map.add(
                        ProblemClass::Starvation,
                        *severity as i64,
                        Issue {
                            procname: proc.name.clone(),
                            loc: pair.earliest_lock_or_call_loc(&proc.name),
                            kind: IssueKind::Starvation(*severity),
                            level: CheckLevel::Warn,
                            message,
                            trace: pair.make_trace("", true),
                        },
                    );
                }
            }
            Event::StrictModeCall { description } => {
                if pair.is_uithread() && !attrs.is_constructor {
                    let message = format!(
                        "Strict Mode violation on the UI thread: `{}` calls `{description}`.",
                        proc.name
                    );
                    map.add_trace_weighted(
                        ProblemClass::StrictMode,
                        IssueKind::StrictModeViolation,
                        proc.name.clone(),
                        pair.earliest_lock_or_call_loc(&proc.name),
                        message,
                        pair.make_trace("", true),
                    );
                }
            }
        }
    }
    Ok(())
}

fn report_lockless(proc: &ProcDesc, pair: &CriticalPair, lock: &Lock, map: &mut ReportMap) {
    let message = format!(
        "`{}` is annotated lockless but acquires lock `{lock}`.",
        proc.name
    );
    map.add_trace_weighted(
        ProblemClass::Lockless,
        IssueKind::LocklessViolation,
        proc.name.clone(),
        pair.earliest_lock_or_call_loc(&proc.name),
        message,
        pair.make_trace("", true),
    );
}

fn report_self_deadlock(proc: &ProcDesc, pair: &CriticalPair, lock: &Lock, map: &mut ReportMap) {
    let message = format!(
        "Potential self deadlock. `{}` may acquire lock `{lock}` twice.",
        proc.name
    );
    map.add_trace_weighted(
        ProblemClass::Deadlock,
        IssueKind::Deadlock,
        proc.name.clone(),
        pair.earliest_lock_or_call_loc(&proc.name),
        message,
        pair.make_trace("", true),
    );
}

/// Rule 5: compose `pair` with the critical pairs of every method of the
/// lock owner class (declared and inherited).
fn report_against_siblings(
    program: &Program,
    proc: &ProcDesc,
    pair: &CriticalPair,
    lock: &Lock,
    store: &InMemorySummaryStore,
    settings: &CheckSettings,
    map: &mut ReportMap,
) -> Result<()> {
    let Some(owner) = lock.owner_class() else {
        return Ok(());
    };
    for sibling in program.methods_of(owner) {
        if sibling == &proc.name {
            continue;
        }
        let Some(sibling_summary) = store.get(sibling) else {
            continue;
        };
        for other in &sibling_summary.critical_pairs {
            if !pair.can_run_in_parallel(other) {
                continue;
            }
            match &other.event {
                Event::MayBlock {
                    description,
                    severity,
                } => {
                    if pair.is_uithread()
                        && !proc.attributes.is_constructor
                        && other.acquisitions.contains(lock)
                    {
                        let message = format!(
                            "UI thread starvation: `{}` waits on lock `{lock}`, held by \
                             `{sibling}` while potentially blocking on `{description}`.",
                            proc.name
                        );
                        let mut trace = pair.make_trace("[Trace 1] ", true);
                        trace.extend(other.make_trace("[Trace 2] ", true));
                        map.add(
                            ProblemClass::Starvation,
                            *severity as i64,
                            Issue {
                                procname: proc.name.clone(),
                                loc: pair.earliest_lock_or_call_loc(&proc.name),
                                kind: IssueKind::Starvation(*severity),
                                level: CheckLevel::Warn,
                                message,
                                trace,
                            },
                        );
                    }
                }
                Event::LockAcquire(other_lock) => {
                    if pair.may_deadlock(other) && should_report(pair, other, settings)? {
                        let message = format!(
                            "Potential deadlock. `{}` and `{sibling}` acquire locks \
                             `{lock}` and `{other_lock}` in opposite orders.",
                            proc.name
                        );
                        let mut trace = pair.make_trace("[Trace 1] ", true);
                        trace.extend(other.make_trace("[Trace 2] ", true));
                        map.add_trace_weighted(
                            ProblemClass::Deadlock,
                            IssueKind::Deadlock,
                            proc.name.clone(),
                            pair.earliest_lock_or_call_loc(&proc.name),
                            message,
                            trace,
                        );
                    }
                }
                Event::StrictModeCall { .. } => {}
            }
        }
    }
    Ok(())
}

/// Symmetry breaking: report each cross-procedure deadlock from exactly one
/// side. Class-lock roots always report (the reverse pairing is
/// structurally inaccessible); otherwise the root type strings break the
/// tie, then the event locations.
pub fn should_report(
    pair: &CriticalPair,
    other: &CriticalPair,
    settings: &CheckSettings,
) -> Result<bool> {
    let (Some(lock), Some(other_lock)) = (pair.event.acquired_lock(), other.event.acquired_lock())
    else {
        return Err(Error::internal_invariant(
            "should_report",
            "deadlock candidate without two lock-acquire events",
        ));
    };
    if !settings.deduplicate {
        return Ok(true);
    }
    if lock.is_class_lock() || other_lock.is_class_lock() {
        return Ok(true);
    }
    Ok(
        match lock.root_type_name().cmp(other_lock.root_type_name()) {
            std::cmp::Ordering::Less => true,
            std::cmp::Ordering::Equal => pair.loc < other.loc,
            std::cmp::Ordering::Greater => false,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::critical_pair::{HeldLocks, Severity};
    use crate::ir::{AccessExpr, ClassName};

    fn lock_on(class: &str, field: &str) -> Lock {
        Lock::from_expr(
            &AccessExpr::formal(0, "this", Some(ClassName::new(class))).field(field),
        )
        .unwrap()
    }

    fn pair(class: &str, held: &str, acquiring: &str, line: u32) -> CriticalPair {
        let mut locks = HeldLocks::new();
        locks.insert(crate::critical_pair::Acquisition {
            lock: lock_on(class, held),
            procname: ProcName::new(class, "m"),
            loc: Loc::new("f.java", line, 1),
            anchor: Default::default(),
        });
        CriticalPair::new(
            &locks,
            Event::LockAcquire(lock_on(class, acquiring)),
            Loc::new("f.java", line + 1, 1),
            false,
        )
    }

    #[test]
    fn test_should_report_exactly_one_direction() {
        let settings = CheckSettings::default();
        let p = pair("A", "x", "y", 10);
        let q = pair("A", "y", "x", 20);
        let forward = should_report(&p, &q, &settings).unwrap();
        let backward = should_report(&q, &p, &settings).unwrap();
        assert!(forward ^ backward);
    }

    #[test]
    fn test_should_report_class_lock_always_reports() {
        let settings = CheckSettings::default();
        let mut held = HeldLocks::new();
        held.insert(crate::critical_pair::Acquisition {
            lock: lock_on("A", "x"),
            procname: ProcName::new("A", "stat"),
            loc: Loc::new("f.java", 1, 1),
            anchor: Default::default(),
        });
        let class_pair = CriticalPair::new(
            &held,
            Event::LockAcquire(Lock::class_lock(ClassName::new("A"))),
            Loc::new("f.java", 2, 1),
            false,
        );
        let other = pair("A", "x", "y", 10);
        assert!(should_report(&class_pair, &other, &settings).unwrap());
    }

    #[test]
    fn test_should_report_without_dedup_reports_both() {
        let settings = CheckSettings::default().without_dedup();
        let p = pair("A", "x", "y", 10);
        let q = pair("A", "y", "x", 20);
        assert!(should_report(&p, &q, &settings).unwrap());
        assert!(should_report(&q, &p, &settings).unwrap());
    }

    #[test]
    fn test_should_report_rejects_non_acquire_events() {
        let settings = CheckSettings::default();
        let p = pair("A", "x", "y", 10);
        let blocked = CriticalPair::new(
            &HeldLocks::new(),
            Event::MayBlock {
                description: "x".into(),
                severity: Severity::High,
            },
            Loc::new("f.java", 1, 1),
            false,
        );
        assert!(matches!(
            should_report(&p, &blocked, &settings),
            Err(Error::InternalInvariant { .. })
        ));
    }

    #[test]
    fn test_dedup_keeps_shortest_trace_and_notes_suppression() {
        let settings = CheckSettings::default();
        let mut map = ReportMap::new();
        let loc = Loc::new("f.java", 5, 1);
        map.add_trace_weighted(
            ProblemClass::Deadlock,
            IssueKind::Deadlock,
            ProcName::new("A", "m"),
            loc.clone(),
            "long".into(),
            vec!["a".into(), "b".into(), "c".into(), "d".into(), "e".into()],
        );
        map.add_trace_weighted(
            ProblemClass::Deadlock,
            IssueKind::Deadlock,
            ProcName::new("A", "m"),
            loc,
            "short".into(),
            vec!["a".into(), "b".into(), "c".into()],
        );
        let mut issues = Vec::new();
        map.emit(&settings, &mut issues);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.starts_with("short"));
        assert!(issues[0].message.contains("suppressed"));
    }

    #[test]
    fn test_no_dedup_emits_all() {
        let settings = CheckSettings::default().without_dedup();
        let mut map = ReportMap::new();
        let loc = Loc::new("f.java", 5, 1);
        for msg in ["one", "two"] {
            map.add_trace_weighted(
                ProblemClass::Deadlock,
                IssueKind::Deadlock,
                ProcName::new("A", "m"),
                loc.clone(),
                msg.into(),
                vec!["t".into()],
            );
        }
        let mut issues = Vec::new();
        map.emit(&settings, &mut issues);
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn test_starvation_dedup_prefers_higher_severity() {
        let settings = CheckSettings::default();
        let mut map = ReportMap::new();
        let loc = Loc::new("f.java", 7, 1);
        for severity in [Severity::Low, Severity::High] {
            map.add(
                ProblemClass::Starvation,
                severity as i64,
                Issue {
                    procname: ProcName::new("A", "m"),
                    loc: loc.clone(),
                    kind: IssueKind::Starvation(severity),
                    level: CheckLevel::Warn,
                    message: format!("{severity}"),
                    trace: Vec::new(),
                },
            );
        }
        let mut issues = Vec::new();
        map.emit(&settings, &mut issues);
        assert_eq!(issues.len(), 1);
        assert!(matches!(issues[0].kind, IssueKind::Starvation(Severity::High)));
    }
}
