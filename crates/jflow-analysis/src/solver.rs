//! Dataflow analysis framework with worklist-based fixpoint solver

use crate::error::AnalysisError;
use jflow_core::FlowGraph;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::hash::Hash;
use tracing::{debug, trace};

/// Direction of dataflow analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataflowDirection {
    Forward,
    Backward,
}

impl fmt::Display for DataflowDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DataflowDirection::Forward => "forward",
            DataflowDirection::Backward => "backward",
        })
    }
}

/// Generic interface of a monotone dataflow analysis over a [`FlowGraph`]
pub trait DataflowAnalysis<G: FlowGraph> {
    /// The type of facts being propagated
    type Fact: Clone + PartialEq;

    /// Direction of the analysis
    fn direction(&self) -> DataflowDirection {
        DataflowDirection::Forward
    }

    /// Fact at the entry (forward) or exit (backward) boundary of `graph`
    fn new_boundary_fact(&self, graph: &G) -> Self::Fact;

    /// Fact every other node starts from
    fn new_initial_fact(&self) -> Self::Fact;

    /// Meets `fact` into `target` in place
    fn meet_into(&self, fact: &Self::Fact, target: &mut Self::Fact);

    /// Transfer function of `node`. For backward analyses `input` is the
    /// node's OUT fact and `output` its IN fact. Returns whether `output`
    /// changed.
    fn transfer_node(
        &self,
        graph: &G,
        node: G::Node,
        input: &Self::Fact,
        output: &mut Self::Fact,
    ) -> bool;
}

/// Facts before (IN) and after (OUT) every node at the fixed point
#[derive(Debug, Clone)]
pub struct DataflowResult<N, F> {
    in_facts: HashMap<N, F>,
    out_facts: HashMap<N, F>,
    iterations: usize,
}

impl<N: Copy + Eq + Hash, F> Default for DataflowResult<N, F> {
    fn default() -> Self {
        Self {
            in_facts: HashMap::new(),
            out_facts: HashMap::new(),
            iterations: 0,
        }
    }
}

impl<N: Copy + Eq + Hash, F> DataflowResult<N, F> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_fact(&self, node: &N) -> Option<&F> {
        self.in_facts.get(node)
    }

    pub fn out_fact(&self, node: &N) -> Option<&F> {
        self.out_facts.get(node)
    }

    pub fn set_in_fact(&mut self, node: N, fact: F) {
        self.in_facts.insert(node, fact);
    }

    pub fn set_out_fact(&mut self, node: N, fact: F) {
        self.out_facts.insert(node, fact);
    }

    /// Node visits the solver needed to reach the fixed point
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub(crate) fn out_fact_mut(&mut self, node: &N) -> Option<&mut F> {
        self.out_facts.get_mut(node)
    }

    pub(crate) fn in_fact_mut(&mut self, node: &N) -> Option<&mut F> {
        self.in_facts.get_mut(node)
    }

    pub(crate) fn record_iteration(&mut self) {
        self.iterations += 1;
    }
}

/// Worklist of nodes awaiting a visit; a node is queued at most once
pub(crate) struct Worklist<N> {
    queue: VecDeque<N>,
    queued: HashSet<N>,
}

impl<N: Copy + Eq + Hash> Worklist<N> {
    pub(crate) fn new(nodes: impl IntoIterator<Item = N>) -> Self {
        let mut worklist = Self {
            queue: VecDeque::new(),
            queued: HashSet::new(),
        };
        for node in nodes {
            worklist.push(node);
        }
        worklist
    }

    pub(crate) fn push(&mut self, node: N) {
        if self.queued.insert(node) {
            self.queue.push_back(node);
        }
    }

    pub(crate) fn pop(&mut self) -> Option<N> {
        let node = self.queue.pop_front()?;
        self.queued.remove(&node);
        Some(node)
    }
}

/// Worklist-based fixpoint solver for forward analyses
pub struct Solver;

impl Solver {
    /// Computes the fixed point of `analysis` over `graph`
    pub fn solve<G, A>(
        analysis: &A,
        graph: &G,
    ) -> Result<DataflowResult<G::Node, A::Fact>, AnalysisError>
    where
        G: FlowGraph,
        A: DataflowAnalysis<G>,
    {
        match analysis.direction() {
            DataflowDirection::Forward => Ok(Self::solve_forward(analysis, graph)),
            direction @ DataflowDirection::Backward => {
                Err(AnalysisError::UnsupportedDirection(direction))
            }
        }
    }

    fn solve_forward<G, A>(analysis: &A, graph: &G) -> DataflowResult<G::Node, A::Fact>
    where
        G: FlowGraph,
        A: DataflowAnalysis<G>,
    {
        let mut result = DataflowResult::new();
        let nodes = graph.nodes();
        let entry = graph.entry();

        for &node in &nodes {
            result.set_in_fact(node, analysis.new_initial_fact());
            result.set_out_fact(node, analysis.new_initial_fact());
        }
        result.set_out_fact(entry, analysis.new_boundary_fact(graph));

        // Reachable nodes in reverse postorder, then the unreachable rest so
        // every node gets a fact
        let order = graph.reverse_postorder();
        let mut worklist = Worklist::new(order.iter().copied().chain(nodes.iter().copied()));

        while let Some(node) = worklist.pop() {
            result.record_iteration();

            let mut input = analysis.new_initial_fact();
            for pred in graph.preds_of(node) {
                if let Some(fact) = result.out_fact(&pred) {
                    analysis.meet_into(fact, &mut input);
                }
            }

            let changed = match result.out_fact_mut(&node) {
                Some(output) => analysis.transfer_node(graph, node, &input, output),
                None => false,
            };
            result.set_in_fact(node, input);

            if changed {
                trace!(?node, "out fact changed");
                for succ in graph.succs_of(node) {
                    worklist.push(succ);
                }
            }
        }

        debug!(
            nodes = nodes.len(),
            iterations = result.iterations(),
            "forward analysis reached fixed point"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fact::SetFact;
    use jflow_core::{Cfg, CfgBuilder, Exp, Ir, MethodId, NodeId, Stmt, Var};

    /// Collects every statement index on some path from entry
    struct Reaching;

    impl<'p> DataflowAnalysis<Cfg<'p>> for Reaching {
        type Fact = SetFact<usize>;

        fn new_boundary_fact(&self, _graph: &Cfg<'p>) -> Self::Fact {
            SetFact::new()
        }

        fn new_initial_fact(&self) -> Self::Fact {
            SetFact::new()
        }

        fn meet_into(&self, fact: &Self::Fact, target: &mut Self::Fact) {
            target.union(fact);
        }

        fn transfer_node(
            &self,
            graph: &Cfg<'p>,
            node: NodeId,
            input: &Self::Fact,
            output: &mut Self::Fact,
        ) -> bool {
            let mut changed = output.union(input);
            if let Some(index) = graph.stmt_index_of(node) {
                changed |= output.add(index);
            }
            changed
        }
    }

    struct Backwards;

    impl<'p> DataflowAnalysis<Cfg<'p>> for Backwards {
        type Fact = ();

        fn direction(&self) -> DataflowDirection {
            DataflowDirection::Backward
        }

        fn new_boundary_fact(&self, _graph: &Cfg<'p>) {}

        fn new_initial_fact(&self) {}

        fn meet_into(&self, _fact: &(), _target: &mut ()) {}

        fn transfer_node(&self, _: &Cfg<'p>, _: NodeId, _: &(), _: &mut ()) -> bool {
            false
        }
    }

    fn looping_body() -> Ir {
        let i = Var::int("i");
        // 0: i = 0; 1: if (i < 10) goto 3; 2: return; 3: i = i + 1; 4: goto 1
        Ir::new(
            vec![],
            vec![
                Stmt::assign(&i, Exp::IntLiteral(0)),
                Stmt::If {
                    condition: Exp::binary("<".parse().unwrap(), Exp::var(&i), Exp::IntLiteral(10)),
                    target: 3,
                },
                Stmt::Return { value: None },
                Stmt::assign(
                    &i,
                    Exp::binary("+".parse().unwrap(), Exp::var(&i), Exp::IntLiteral(1)),
                ),
                Stmt::Goto { target: 1 },
            ],
        )
    }

    #[test]
    fn test_forward_fixed_point_through_loop() {
        let ir = looping_body();
        let cfg = CfgBuilder::build_ir(MethodId(0), &ir).unwrap();
        let result = Solver::solve(&Reaching, &cfg).unwrap();

        let at_exit = result.in_fact(&cfg.exit()).unwrap();
        assert_eq!(at_exit.len(), 5);
        // the loop header sees the back edge
        let header_in = result.in_fact(&NodeId::of_stmt(1)).unwrap();
        assert!(header_in.contains(&4));
        assert!(result.iterations() >= cfg.nodes().len());
    }

    #[test]
    fn test_result_is_a_fixed_point() {
        let ir = looping_body();
        let cfg = CfgBuilder::build_ir(MethodId(0), &ir).unwrap();
        let result = Solver::solve(&Reaching, &cfg).unwrap();

        for node in cfg.nodes() {
            let mut input = SetFact::new();
            for pred in cfg.preds_of(node) {
                input.union(result.out_fact(&pred).unwrap());
            }
            assert_eq!(&input, result.in_fact(&node).unwrap());
            let mut output = result.out_fact(&node).unwrap().clone();
            assert!(!Reaching.transfer_node(&cfg, node, &input, &mut output));
        }
    }

    #[test]
    fn test_unreachable_nodes_get_facts() {
        let ir = Ir::new(vec![], vec![Stmt::Return { value: None }, Stmt::Nop]);
        let cfg = CfgBuilder::build_ir(MethodId(0), &ir).unwrap();
        let result = Solver::solve(&Reaching, &cfg).unwrap();
        assert_eq!(result.out_fact(&NodeId::of_stmt(1)).unwrap().len(), 1);
    }

    #[test]
    fn test_backward_analysis_is_rejected() {
        let ir = looping_body();
        let cfg = CfgBuilder::build_ir(MethodId(0), &ir).unwrap();
        let err = Solver::solve(&Backwards, &cfg).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::UnsupportedDirection(DataflowDirection::Backward)
        ));
        assert_eq!(
            err.to_string(),
            "backward analyses are not supported by the worklist solver"
        );
    }
}
