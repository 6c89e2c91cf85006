mod support;

use monitor_clippy::AnalysisEngine;
use monitor_clippy::config::CheckSettings;
use monitor_clippy::issue::IssueKind;
use monitor_clippy::level::CheckLevel;
use support::{call, proc, program, sync_enter, sync_exit, this};

/// m1 deadlocks against both m2 (directly) and m3 (through a helper, so
/// the pairing trace is longer). Both reports land on m1's line.
fn double_deadlock_program() -> monitor_clippy::ir::Program {
    program(vec![
        proc("A", "m1").body(vec![
            sync_enter(this("A").field("x"), 10),
            sync_enter(this("A").field("y"), 11),
            sync_exit(this("A").field("y"), 12),
            sync_exit(this("A").field("x"), 13),
        ]),
        proc("A", "m2").body(vec![
            sync_enter(this("A").field("y"), 20),
            sync_enter(this("A").field("x"), 21),
        ]),
        proc("A", "m3").body(vec![
            sync_enter(this("A").field("y"), 30),
            call("A", "helper", vec![this("A")], 31),
        ]),
        proc("A", "helper").body(vec![
            sync_enter(this("A").field("x"), 40),
            sync_exit(this("A").field("x"), 41),
        ]),
    ])
}

#[test]
fn dedup_keeps_the_shortest_trace_and_notes_suppression() {
    let report = AnalysisEngine::new(double_deadlock_program())
        .analyze()
        .expect("analysis");

    let on_m1: Vec<_> = report
        .issues
        .iter()
        .filter(|i| matches!(i.kind, IssueKind::Deadlock) && i.procname.method == "m1")
        .collect();
    assert_eq!(on_m1.len(), 1, "one deadlock kept per line");
    let issue = on_m1[0];
    assert!(issue.message.contains("suppressed"));
    // The shorter pairing (against m2, no call frame) wins.
    assert!(issue.message.contains("m2"));
}

#[test]
fn disabling_dedup_emits_every_report() {
    let with_dedup = AnalysisEngine::new(double_deadlock_program())
        .analyze()
        .expect("analysis");
    let without = AnalysisEngine::new(double_deadlock_program())
        .with_settings(CheckSettings::default().without_dedup())
        .analyze()
        .expect("analysis");

    let count = |report: &monitor_clippy::AnalysisReport| {
        report
            .issues
            .iter()
            .filter(|i| matches!(i.kind, IssueKind::Deadlock))
            .count()
    };
    assert!(count(&without) > count(&with_dedup));
    assert!(
        without
            .issues
            .iter()
            .all(|i| !i.message.contains("suppressed"))
    );
}

#[test]
fn disabled_checks_produce_no_issues() {
    let report = AnalysisEngine::new(double_deadlock_program())
        .with_settings(CheckSettings::default().disable("deadlock"))
        .analyze()
        .expect("analysis");
    assert!(report.issues.is_empty());
}

#[test]
fn per_check_levels_surface_in_issues() {
    let program = program(vec![proc("A", "onClick").ui().body(vec![call(
        "java.lang.Thread",
        "sleep",
        Vec::new(),
        10,
    )])]);

    let report = AnalysisEngine::new(program)
        .with_settings(CheckSettings::default().with_level("starvation", CheckLevel::Error))
        .analyze()
        .expect("analysis");
    assert_eq!(report.issues.len(), 1);
    assert_eq!(report.issues[0].level, CheckLevel::Error);
}

#[test]
fn report_deadlocks_flag_gates_deadlock_reporting() {
    let mut settings = CheckSettings::default();
    settings.report_deadlocks = false;
    let report = AnalysisEngine::new(double_deadlock_program())
        .with_settings(settings)
        .analyze()
        .expect("analysis");
    assert!(report.issues.is_empty());
}
