//! Dead code detection
//!
//! Combines constant propagation and live variables: statements control
//! cannot reach once constant branch conditions are taken into account are
//! dead, and so are side-effect-free assignments to variables nobody reads
//! afterwards.

use crate::constprop::{ConstantPropagation, Value};
use crate::error::AnalysisError;
use crate::fact::{CpFact, SetFact};
use crate::livevar::LiveVariableAnalysis;
use crate::solver::DataflowResult;
use jflow_core::{
    ArithmeticOp, BinaryOp, Cfg, CfgEdgeKind, Exp, FlowGraph, LValue, NodeId, Stmt, Var,
};
use std::collections::{BTreeSet, HashSet, VecDeque};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct DeadCodeDetection;

impl DeadCodeDetection {
    pub const ID: &'static str = "deadcode";

    /// Runs both prerequisite analyses, then [`detect`](Self::detect)
    pub fn analyze(cfg: &Cfg<'_>) -> Result<BTreeSet<NodeId>, AnalysisError> {
        let constants = ConstantPropagation::analyze(cfg)?;
        let live_vars = LiveVariableAnalysis::analyze(cfg);
        Ok(Self::detect(cfg, &constants, &live_vars))
    }

    /// Dead nodes of `cfg`, ordered by statement position. The exit node is
    /// never reported.
    pub fn detect(
        cfg: &Cfg<'_>,
        constants: &DataflowResult<NodeId, CpFact>,
        live_vars: &DataflowResult<NodeId, SetFact<Var>>,
    ) -> BTreeSet<NodeId> {
        let no_facts = CpFact::new();
        let mut visited = HashSet::new();
        let mut live = HashSet::new();
        let mut queue = VecDeque::from([cfg.entry()]);

        while let Some(node) = queue.pop_front() {
            if !visited.insert(node) {
                continue;
            }
            live.insert(node);

            match cfg.stmt_of(node) {
                Some(Stmt::Assign {
                    lvalue: LValue::Var(var),
                    rvalue,
                }) => {
                    let is_read = live_vars
                        .out_fact(&node)
                        .map_or(true, |live_out| live_out.contains(var));
                    if !is_read && Self::has_no_side_effect(rvalue) {
                        live.remove(&node);
                    }
                    queue.extend(cfg.succs_of(node));
                }
                Some(Stmt::If { condition, .. }) => {
                    let input = constants.in_fact(&node).unwrap_or(&no_facts);
                    match ConstantPropagation::evaluate(condition, input) {
                        Value::Constant(c) => {
                            let taken = if c == 0 {
                                CfgEdgeKind::IfFalse
                            } else {
                                CfgEdgeKind::IfTrue
                            };
                            queue.extend(
                                cfg.out_edges_of(node)
                                    .into_iter()
                                    .filter(|edge| edge.kind == taken)
                                    .map(|edge| edge.target),
                            );
                        }
                        _ => queue.extend(cfg.succs_of(node)),
                    }
                }
                Some(Stmt::Switch {
                    var,
                    cases,
                    default,
                }) => {
                    let input = constants.in_fact(&node).unwrap_or(&no_facts);
                    match input.get(var) {
                        Value::Constant(c) => {
                            let mut matched = false;
                            for (value, target) in cases {
                                if *value == c {
                                    matched = true;
                                    queue.push_back(NodeId::of_stmt(*target));
                                }
                            }
                            if !matched {
                                queue.push_back(NodeId::of_stmt(*default));
                            }
                        }
                        _ => queue.extend(cfg.succs_of(node)),
                    }
                }
                _ => queue.extend(cfg.succs_of(node)),
            }
        }

        let exit = cfg.exit();
        let dead: BTreeSet<NodeId> = cfg
            .nodes()
            .into_iter()
            .filter(|node| *node != exit && !live.contains(node))
            .collect();
        debug!(method = %cfg.method(), dead = dead.len(), "dead code detected");
        dead
    }

    /// Whether evaluating `exp` can neither write the heap nor throw
    pub fn has_no_side_effect(exp: &Exp) -> bool {
        match exp {
            Exp::New(_)
            | Exp::Cast { .. }
            | Exp::InstanceField { .. }
            | Exp::StaticField { .. }
            | Exp::ArrayAccess { .. } => false,
            Exp::Binary { op, lhs, rhs } => {
                !matches!(
                    op,
                    BinaryOp::Arithmetic(ArithmeticOp::Div | ArithmeticOp::Rem)
                ) && Self::has_no_side_effect(lhs)
                    && Self::has_no_side_effect(rhs)
            }
            _ => true,
        }
    }
}
