//! Abstract-interpretation plumbing: the CFG capability and the worklist
//! fixpoint that produces a procedure's exit state.
//!
//! The transfer function is parameterized by a [`Cfg`] capability rather
//! than a concrete graph type; [`ProcCfg`] is the petgraph-backed
//! implementation the IR carries. The fixpoint joins at merge points and
//! iterates until the per-block states stabilize; the summary state is the
//! join of all exit-block states.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::DfsPostOrder;
use serde::{Deserialize, Serialize};

use crate::domain::LockState;
use crate::ir::Instr;

/// Identifies a basic block within a procedure's CFG.
pub type BlockId = NodeIndex;

/// A straight-line sequence of instructions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BasicBlock {
    pub instrs: Vec<Instr>,
}

/// The CFG capability required by the fixpoint: node iteration, edge
/// enumeration, instruction access.
pub trait Cfg {
    fn entry(&self) -> BlockId;
    fn instrs(&self, block: BlockId) -> &[Instr];
    fn succs(&self, block: BlockId) -> Vec<BlockId>;
    /// Blocks reachable from entry, in reverse post-order.
    fn reverse_postorder(&self) -> Vec<BlockId>;
}

/// A procedure's control-flow graph. Block 0 is the entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "CfgSpec", into = "CfgSpec")]
pub struct ProcCfg {
    graph: DiGraph<BasicBlock, ()>,
    entry: NodeIndex,
}

impl ProcCfg {
    /// Build a CFG from `(instructions, successor indices)` blocks. The
    /// first block is the entry. An empty list yields a single empty
    /// entry block.
    pub fn from_blocks(blocks: Vec<(Vec<Instr>, Vec<usize>)>) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes = Vec::with_capacity(blocks.len().max(1));
        if blocks.is_empty() {
            let entry = graph.add_node(BasicBlock::default());
            return Self { graph, entry };
        }
        for (instrs, _) in &blocks {
            nodes.push(graph.add_node(BasicBlock {
                instrs: instrs.clone(),
            }));
        }
        for (from, (_, succs)) in blocks.iter().enumerate() {
            for &to in succs {
                graph.add_edge(nodes[from], nodes[to], ());
            }
        }
        Self {
            graph,
            entry: nodes[0],
        }
    }

    /// A single-block CFG; the common case in tests and simple frontends.
    pub fn linear(instrs: Vec<Instr>) -> Self {
        Self::from_blocks(vec![(instrs, Vec::new())])
    }

    pub fn block_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Every instruction in the procedure, in block order. The call-graph
    /// builder scans this.
    pub fn all_instrs(&self) -> impl Iterator<Item = &Instr> {
        self.graph
            .node_indices()
            .flat_map(|node| self.graph[node].instrs.iter())
    }
}

impl Cfg for ProcCfg {
    fn entry(&self) -> BlockId {
        self.entry
    }

    fn instrs(&self, block: BlockId) -> &[Instr] {
        &self.graph[block].instrs
    }

    fn succs(&self, block: BlockId) -> Vec<BlockId> {
        let mut succs: Vec<_> = self
            .graph
            .neighbors_directed(block, Direction::Outgoing)
            .collect();
        succs.sort();
        succs
    }

    fn reverse_postorder(&self) -> Vec<BlockId> {
        let mut dfs = DfsPostOrder::new(&self.graph, self.entry);
        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(node) = dfs.next(&self.graph) {
            order.push(node);
        }
        order.reverse();
        order
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CfgSpec {
    blocks: Vec<BlockSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BlockSpec {
    #[serde(default)]
    instrs: Vec<Instr>,
    #[serde(default)]
    succs: Vec<usize>,
}

impl TryFrom<CfgSpec> for ProcCfg {
    type Error = String;

    fn try_from(spec: CfgSpec) -> Result<Self, Self::Error> {
        let count = spec.blocks.len();
        for (i, block) in spec.blocks.iter().enumerate() {
            if let Some(&bad) = block.succs.iter().find(|&&s| s >= count.max(1)) {
                return Err(format!("block {i} has out-of-range successor {bad}"));
            }
        }
        Ok(ProcCfg::from_blocks(
            spec.blocks
                .into_iter()
                .map(|b| (b.instrs, b.succs))
                .collect(),
        ))
    }
}

impl From<ProcCfg> for CfgSpec {
    fn from(cfg: ProcCfg) -> Self {
        let mut blocks: Vec<BlockSpec> = cfg
            .graph
            .node_indices()
            .map(|n| BlockSpec {
                instrs: cfg.graph[n].instrs.clone(),
                succs: cfg
                    .graph
                    .neighbors_directed(n, Direction::Outgoing)
                    .map(NodeIndex::index)
                    .collect(),
            })
            .collect();
        for block in &mut blocks {
            block.succs.sort_unstable();
        }
        CfgSpec { blocks }
    }
}

/// The per-instruction transformer driven by the fixpoint.
pub trait TransferFunctions {
    fn exec_instr(&self, state: &mut LockState, instr: &Instr);
}

/// Run the worklist fixpoint over `cfg` from `initial`, returning the join
/// of all exit-block states. Deterministic: the worklist is seeded in
/// reverse post-order and successor order is stable.
pub fn exit_state<C: Cfg, T: TransferFunctions>(
    cfg: &C,
    transfer: &T,
    initial: LockState,
) -> LockState {
    let order = cfg.reverse_postorder();
    let mut pre: BTreeMap<BlockId, LockState> = BTreeMap::new();
    let mut post: BTreeMap<BlockId, LockState> = BTreeMap::new();
    pre.insert(cfg.entry(), initial);

    let mut work: VecDeque<BlockId> = order.iter().copied().collect();
    let mut queued: BTreeSet<BlockId> = work.iter().copied().collect();

    while let Some(block) = work.pop_front() {
        queued.remove(&block);
        let Some(mut state) = pre.get(&block).cloned() else {
            continue;
        };
        for instr in cfg.instrs(block) {
            transfer.exec_instr(&mut state, instr);
        }
        for succ in cfg.succs(block) {
            let changed = match pre.get_mut(&succ) {
                Some(existing) => existing.join_with(&state),
                None => {
                    pre.insert(succ, state.clone());
                    true
                }
            };
            if changed && queued.insert(succ) {
                work.push_back(succ);
            }
        }
        post.insert(block, state);
    }

    let mut exit = LockState::bottom();
    let mut saw_exit = false;
    for block in &order {
        if cfg.succs(*block).is_empty()
            && let Some(state) = post.get(block)
        {
            exit.join_with(state);
            saw_exit = true;
        }
    }
    if !saw_exit {
        // No reachable exit block (e.g. an infinite loop): fold every
        // reachable post state so witnessed pairs are not lost.
        for state in post.values() {
            exit.join_with(state);
        }
    }
    exit
}
