mod support;

use monitor_clippy::AnalysisEngine;
use monitor_clippy::ir::Program;
use monitor_clippy::issue::IssueKind;
use support::{proc, program, sync_enter, this};

#[test]
fn programs_round_trip_through_json() {
    let original = program(vec![
        proc("A", "m1").body(vec![
            sync_enter(this("A").field("x"), 10),
            sync_enter(this("A").field("y"), 11),
        ]),
        proc("A", "m2").body(vec![
            sync_enter(this("A").field("y"), 20),
            sync_enter(this("A").field("x"), 21),
        ]),
    ]);

    let json = serde_json::to_string_pretty(&original).expect("serialize");
    let parsed: Program = serde_json::from_str(&json).expect("deserialize");

    let from_value = AnalysisEngine::new(original).analyze().expect("analysis");
    let from_json = AnalysisEngine::new(parsed).analyze().expect("analysis");

    let summarize = |report: &monitor_clippy::AnalysisReport| {
        report
            .issues
            .iter()
            .map(|i| (i.procname.clone(), i.loc.clone(), i.message.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(summarize(&from_value), summarize(&from_json));
    assert!(
        from_json
            .issues
            .iter()
            .any(|i| matches!(i.kind, IssueKind::Deadlock))
    );
}

/// A frontend-shaped dump: hand-written JSON, not serde output.
#[test]
fn hand_written_program_dumps_are_accepted() {
    let json = r#"
    {
      "language": "java",
      "classes": [],
      "procedures": [
        {
          "name": { "class": "A", "method": "onClick" },
          "formals": [{ "index": 0, "name": "this", "typ": "A" }],
          "attributes": { "thread": "ui" },
          "loc": { "file": "A.java", "line": 1, "column": 1 },
          "cfg": {
            "blocks": [
              {
                "instrs": [
                  {
                    "call": {
                      "callee": { "class": "java.lang.Thread", "method": "sleep" },
                      "actuals": [],
                      "loc": { "file": "A.java", "line": 3, "column": 5 }
                    }
                  }
                ],
                "succs": []
              }
            ]
          }
        }
      ]
    }
    "#;

    let program: Program = serde_json::from_str(json).expect("parse");
    let report = AnalysisEngine::new(program).analyze().expect("analysis");
    assert_eq!(report.issues.len(), 1);
    assert!(matches!(report.issues[0].kind, IssueKind::Starvation(_)));
}
