//! Live variable analysis
//!
//! A variable is live at a point when some path from that point reads it
//! before redefining it. The analysis runs backward, so it gets its own
//! worklist loop: the shared [`Solver`](crate::Solver) is forward-only.

use crate::fact::SetFact;
use crate::solver::{DataflowAnalysis, DataflowDirection, DataflowResult, Worklist};
use jflow_core::{Cfg, FlowGraph, NodeId, Var};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct LiveVariableAnalysis;

impl LiveVariableAnalysis {
    pub const ID: &'static str = "livevar";

    /// Live-in (IN) and live-out (OUT) sets of every node of `cfg`
    pub fn analyze(cfg: &Cfg<'_>) -> DataflowResult<NodeId, SetFact<Var>> {
        let analysis = LiveVariableAnalysis;
        let mut result = DataflowResult::new();
        let nodes = cfg.nodes();

        for &node in &nodes {
            result.set_in_fact(node, SetFact::new());
            result.set_out_fact(node, SetFact::new());
        }
        result.set_in_fact(cfg.exit(), analysis.new_boundary_fact(cfg));

        let mut postorder = cfg.reverse_postorder();
        postorder.reverse();
        let mut worklist = Worklist::new(postorder.into_iter().chain(nodes.iter().copied()));

        while let Some(node) = worklist.pop() {
            result.record_iteration();

            let mut output = SetFact::new();
            for succ in cfg.succs_of(node) {
                if let Some(fact) = result.in_fact(&succ) {
                    output.union(fact);
                }
            }

            let changed = match result.in_fact_mut(&node) {
                Some(input) => analysis.transfer_node(cfg, node, &output, input),
                None => false,
            };
            result.set_out_fact(node, output);

            if changed {
                for pred in cfg.preds_of(node) {
                    worklist.push(pred);
                }
            }
        }

        debug!(
            method = %cfg.method(),
            iterations = result.iterations(),
            "live variables reached fixed point"
        );
        result
    }
}

impl<'p> DataflowAnalysis<Cfg<'p>> for LiveVariableAnalysis {
    type Fact = SetFact<Var>;

    fn direction(&self) -> DataflowDirection {
        DataflowDirection::Backward
    }

    fn new_boundary_fact(&self, _cfg: &Cfg<'p>) -> SetFact<Var> {
        SetFact::new()
    }

    fn new_initial_fact(&self) -> SetFact<Var> {
        SetFact::new()
    }

    fn meet_into(&self, fact: &SetFact<Var>, target: &mut SetFact<Var>) {
        target.union(fact);
    }

    /// IN = uses ∪ (OUT − def)
    fn transfer_node(
        &self,
        cfg: &Cfg<'p>,
        node: NodeId,
        out: &SetFact<Var>,
        live_in: &mut SetFact<Var>,
    ) -> bool {
        let mut fact = out.clone();
        if let Some(stmt) = cfg.stmt_of(node) {
            if let Some(def) = stmt.def() {
                fact.remove(def);
            }
            for var in stmt.uses() {
                fact.add(var.clone());
            }
        }
        if fact == *live_in {
            return false;
        }
        *live_in = fact;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;
    use crate::solver::Solver;
    use jflow_core::{CfgBuilder, Exp, Ir, MethodId, Stmt};

    #[test]
    fn test_liveness_straight_line() {
        let (a, b, c) = (Var::int("a"), Var::int("b"), Var::int("c"));
        // 0: a = 1; 1: b = a + 1; 2: c = 5; 3: return b
        let ir = Ir::new(
            vec![],
            vec![
                Stmt::assign(&a, Exp::IntLiteral(1)),
                Stmt::assign(
                    &b,
                    Exp::binary("+".parse().unwrap(), Exp::var(&a), Exp::IntLiteral(1)),
                ),
                Stmt::assign(&c, Exp::IntLiteral(5)),
                Stmt::Return {
                    value: Some(b.clone()),
                },
            ],
        );
        let cfg = CfgBuilder::build_ir(MethodId(0), &ir).unwrap();
        let result = LiveVariableAnalysis::analyze(&cfg);

        let after_a = result.out_fact(&NodeId::of_stmt(0)).unwrap();
        assert!(after_a.contains(&a));
        let after_c = result.out_fact(&NodeId::of_stmt(2)).unwrap();
        assert!(after_c.contains(&b));
        assert!(!after_c.contains(&c));
        assert!(result.in_fact(&cfg.exit()).unwrap().is_empty());
    }

    #[test]
    fn test_liveness_around_loop() {
        let i = Var::int("i");
        // 0: i = 0; 1: if (i < 3) goto 3; 2: return; 3: i = i + 1; 4: goto 1
        let ir = Ir::new(
            vec![],
            vec![
                Stmt::assign(&i, Exp::IntLiteral(0)),
                Stmt::If {
                    condition: Exp::binary("<".parse().unwrap(), Exp::var(&i), Exp::IntLiteral(3)),
                    target: 3,
                },
                Stmt::Return { value: None },
                Stmt::assign(
                    &i,
                    Exp::binary("+".parse().unwrap(), Exp::var(&i), Exp::IntLiteral(1)),
                ),
                Stmt::Goto { target: 1 },
            ],
        );
        let cfg = CfgBuilder::build_ir(MethodId(0), &ir).unwrap();
        let result = LiveVariableAnalysis::analyze(&cfg);

        assert!(result.out_fact(&NodeId::of_stmt(4)).unwrap().contains(&i));
        assert!(result.out_fact(&NodeId::of_stmt(3)).unwrap().contains(&i));
        assert!(!result.in_fact(&NodeId::of_stmt(0)).unwrap().contains(&i));
    }

    #[test]
    fn test_forward_solver_rejects_liveness() {
        let ir = Ir::new(vec![], vec![Stmt::Return { value: None }]);
        let cfg = CfgBuilder::build_ir(MethodId(0), &ir).unwrap();
        assert!(matches!(
            Solver::solve(&LiveVariableAnalysis, &cfg),
            Err(AnalysisError::UnsupportedDirection(DataflowDirection::Backward))
        ));
    }
}
