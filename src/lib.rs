pub mod absint;
pub mod cli;
pub mod config;
pub mod critical_pair;
pub mod domain;
pub mod error;
pub mod ir;
pub mod issue;
pub mod level;
pub mod lock;
pub mod models;
pub mod report;
pub mod summary;
pub mod telemetry;
pub mod transfer;

use petgraph::algo::kosaraju_scc;
use petgraph::graph::DiGraph;
use std::collections::BTreeMap;

use crate::config::CheckSettings;
use crate::domain::LockState;
use crate::error::Result;
use crate::ir::{Instr, ProcName, Program};
use crate::issue::Issue;
use crate::models::{BuiltinModels, CallClassifier};
use crate::report::{ReportMap, report_procedure};
use crate::summary::{InMemorySummaryStore, Summary, SummaryStore};
use crate::transfer::Transfer;

/// The result of analyzing a program: rendered issues plus the procedures
/// whose reporting was aborted by a broken internal invariant.
#[derive(Debug)]
pub struct AnalysisReport {
    pub issues: Vec<Issue>,
    pub failures: Vec<(ProcName, String)>,
}

/// Engine orchestrating the analysis: summarize every procedure bottom-up
/// in call order, then run the report engine over all summaries.
pub struct AnalysisEngine {
    program: Program,
    classifier: Box<dyn CallClassifier>,
    settings: CheckSettings,
}

impl AnalysisEngine {
    pub fn new(program: Program) -> Self {
        Self {
            program,
            classifier: Box::new(BuiltinModels),
            settings: CheckSettings::default(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: CheckSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: Box<dyn CallClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn analyze(&self) -> Result<AnalysisReport> {
        let store = crate::instrument_block!("summarize", { self.summarize_all() });

        let mut map = ReportMap::new();
        let mut failures = Vec::new();
        crate::instrument_block!("report", {
            for (name, summary) in store.iter() {
                let Some(proc) = self.program.procedure(name) else {
                    continue;
                };
                if let Err(err) =
                    report_procedure(&self.program, proc, summary, &store, &self.settings, &mut map)
                {
                    failures.push((name.clone(), err.to_string()));
                }
            }
        });

        let mut issues = Vec::new();
        map.emit(&self.settings, &mut issues);
        Ok(AnalysisReport { issues, failures })
    }

    /// Compute every procedure's summary, callees before callers so call
    /// sites see published summaries. Cycles fall back to whatever is
    /// already published (bottom on first visit), matching the
    /// missing-summary policy.
    fn summarize_all(&self) -> InMemorySummaryStore {
        let mut store = InMemorySummaryStore::new();
        for name in self.analysis_order() {
            let Some(proc) = self.program.procedure(&name) else {
                continue;
            };
            let exit = {
                let transfer = Transfer::new(
                    proc,
                    self.program.language,
                    self.classifier.as_ref(),
                    &store,
                );
                absint::exit_state(&proc.cfg, &transfer, LockState::initial(proc))
            };
            store.write(name, Summary::from_exit_state(exit));
        }
        store
    }

    /// Bottom-up analysis order from the call graph's strongly connected
    /// components (callee components first).
    fn analysis_order(&self) -> Vec<ProcName> {
        let mut graph: DiGraph<ProcName, ()> = DiGraph::new();
        let mut nodes = BTreeMap::new();
        for proc in self.program.procedures() {
            let node = graph.add_node(proc.name.clone());
            nodes.insert(proc.name.clone(), node);
        }
        for proc in self.program.procedures() {
            for instr in proc.cfg.all_instrs() {
                if let Instr::Call { callee, .. } = instr
                    && let Some(&to) = nodes.get(callee)
                {
                    let from = nodes[&proc.name];
                    if from != to {
                        graph.update_edge(from, to, ());
                    }
                }
            }
        }
        // SCCs come out in reverse topological order of the condensation:
        // callees before callers.
        kosaraju_scc(&graph)
            .into_iter()
            .flatten()
            .map(|node| graph[node].clone())
            .collect()
    }
}
