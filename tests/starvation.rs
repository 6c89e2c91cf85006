mod support;

use monitor_clippy::AnalysisEngine;
use monitor_clippy::critical_pair::Severity;
use monitor_clippy::ir::Language;
use monitor_clippy::issue::IssueKind;
use support::{call, proc, program, program_in, sync_enter, sync_exit, this};

#[test]
fn sleep_on_ui_thread_reports_high_starvation() {
    let program = program(vec![proc("A", "onClick").ui().body(vec![call(
        "java.lang.Thread",
        "sleep",
        Vec::new(),
        10,
    )])]);

    let report = AnalysisEngine::new(program).analyze().expect("analysis");
    assert_eq!(report.issues.len(), 1);
    let issue = &report.issues[0];
    assert!(matches!(issue.kind, IssueKind::Starvation(Severity::High)));
    assert!(issue.message.contains("Thread.sleep"));
    assert_eq!(issue.procname.method, "onClick");
}

#[test]
fn ui_marker_call_marks_the_rest_of_the_procedure() {
    let program = program(vec![proc("A", "run").body(vec![
        call("android.os.ThreadUtils", "assertOnUiThread", Vec::new(), 5),
        call("java.lang.Thread", "sleep", Vec::new(), 6),
    ])]);

    let report = AnalysisEngine::new(program).analyze().expect("analysis");
    assert_eq!(report.issues.len(), 1);
    assert!(matches!(report.issues[0].kind, IssueKind::Starvation(_)));
}

#[test]
fn blocking_callee_of_ui_method_is_reported() {
    let program = program(vec![
        proc("A", "onClick").ui().body(vec![call(
            "A",
            "helper",
            vec![this("A")],
            10,
        )]),
        proc("A", "helper").body(vec![call(
            "java.util.concurrent.Future",
            "get",
            Vec::new(),
            30,
        )]),
    ]);

    let report = AnalysisEngine::new(program).analyze().expect("analysis");
    // Reported once for onClick (UI), not for helper (unknown thread).
    let starvations: Vec<_> = report
        .issues
        .iter()
        .filter(|i| matches!(i.kind, IssueKind::Starvation(_)))
        .collect();
    assert_eq!(starvations.len(), 1);
    assert_eq!(starvations[0].procname.method, "onClick");
}

#[test]
fn ui_lock_held_by_blocking_sibling_reports_with_two_traces() {
    let program = program(vec![
        proc("A", "onClick").ui().body(vec![
            sync_enter(this("A").field("lock"), 10),
            sync_exit(this("A").field("lock"), 11),
        ]),
        proc("A", "bar").body(vec![
            sync_enter(this("A").field("lock"), 20),
            call("java.util.concurrent.CountDownLatch", "await", Vec::new(), 21),
            sync_exit(this("A").field("lock"), 22),
        ]),
    ]);

    let report = AnalysisEngine::new(program).analyze().expect("analysis");
    let starvations: Vec<_> = report
        .issues
        .iter()
        .filter(|i| matches!(i.kind, IssueKind::Starvation(_)))
        .collect();
    assert_eq!(starvations.len(), 1);
    let issue = starvations[0];
    assert_eq!(issue.procname.method, "onClick");
    assert!(issue.message.contains("bar"));
    assert!(issue.trace.iter().any(|l| l.starts_with("[Trace 1]")));
    assert!(issue.trace.iter().any(|l| l.starts_with("[Trace 2]")));
}

#[test]
fn strict_mode_call_on_ui_thread_is_reported() {
    let program = program(vec![proc("A", "onClick").ui().body(vec![call(
        "java.io.File",
        "exists",
        Vec::new(),
        10,
    )])]);

    let report = AnalysisEngine::new(program).analyze().expect("analysis");
    assert_eq!(report.issues.len(), 1);
    assert!(matches!(
        report.issues[0].kind,
        IssueKind::StrictModeViolation
    ));
}

#[test]
fn strict_mode_off_the_ui_thread_is_silent() {
    let program = program(vec![proc("A", "worker").body(vec![call(
        "java.io.File",
        "exists",
        Vec::new(),
        10,
    )])]);

    let report = AnalysisEngine::new(program).analyze().expect("analysis");
    assert!(report.issues.is_empty());
}

#[test]
fn worker_annotated_procedures_never_starve_the_ui() {
    let program = program(vec![proc("A", "background").worker().body(vec![call(
        "java.lang.Thread",
        "sleep",
        Vec::new(),
        10,
    )])]);

    let report = AnalysisEngine::new(program).analyze().expect("analysis");
    assert!(report.issues.is_empty());
}

#[test]
fn constructors_are_not_starvation_targets() {
    let program = program(vec![proc("A", "<init>").ui().constructor().body(vec![
        call("java.lang.Thread", "sleep", Vec::new(), 10),
    ])]);

    let report = AnalysisEngine::new(program).analyze().expect("analysis");
    assert!(report.issues.is_empty());
}

#[test]
fn nonblocking_annotation_suppresses_direct_blocking() {
    let program = program(vec![proc("A", "onClick").ui().nonblocking().body(vec![
        call("java.lang.Thread", "sleep", Vec::new(), 10),
    ])]);

    let report = AnalysisEngine::new(program).analyze().expect("analysis");
    assert!(report.issues.is_empty());
}

#[test]
fn cpp_programs_report_deadlocks_but_not_blocking() {
    let program = program_in(
        Language::Cpp,
        vec![
            proc("Widget", "render").body(vec![
                call("std::mutex", "lock", vec![this("Widget").field("a")], 10),
                call("std::mutex", "lock", vec![this("Widget").field("b")], 11),
                call("std::mutex", "unlock", vec![this("Widget").field("b")], 12),
                call("std::mutex", "unlock", vec![this("Widget").field("a")], 13),
            ]),
            proc("Widget", "update").body(vec![
                call("std::mutex", "lock", vec![this("Widget").field("b")], 20),
                call("std::mutex", "lock", vec![this("Widget").field("a")], 21),
                call("java.lang.Thread", "sleep", Vec::new(), 22),
            ]),
        ],
    );

    let report = AnalysisEngine::new(program).analyze().expect("analysis");
    assert!(
        report
            .issues
            .iter()
            .any(|i| matches!(i.kind, IssueKind::Deadlock))
    );
    assert!(
        !report
            .issues
            .iter()
            .any(|i| matches!(i.kind, IssueKind::Starvation(_)))
    );
}
