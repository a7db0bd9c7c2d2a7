//! Interprocedural dataflow analysis over the [`Icfg`]
//!
//! Facts flow along edges as well as through nodes: every ICFG edge kind
//! has its own transfer, applied to the OUT fact of the edge's source
//! before it is met into the target's IN fact.

mod constprop;
mod icfg;

pub use constprop::InterConstantPropagation;
pub use icfg::{Icfg, IcfgEdge, IcfgEdgeKind, IcfgNode};

use crate::error::AnalysisError;
use crate::solver::{DataflowDirection, DataflowResult, Worklist};
use std::borrow::Cow;
use tracing::{debug, trace};

/// An analysis with separate node and edge transfers over the ICFG
pub trait InterDataflowAnalysis {
    type Fact: Clone + PartialEq;

    fn direction(&self) -> DataflowDirection {
        DataflowDirection::Forward
    }

    /// Fact at the entry of an entry method
    fn new_boundary_fact(&self, icfg: &Icfg<'_>, entry: IcfgNode) -> Self::Fact;

    fn new_initial_fact(&self) -> Self::Fact;

    fn meet_into(&self, fact: &Self::Fact, target: &mut Self::Fact);

    fn transfer_call_node(
        &self,
        icfg: &Icfg<'_>,
        node: IcfgNode,
        input: &Self::Fact,
        output: &mut Self::Fact,
    ) -> bool;

    fn transfer_non_call_node(
        &self,
        icfg: &Icfg<'_>,
        node: IcfgNode,
        input: &Self::Fact,
        output: &mut Self::Fact,
    ) -> bool;

    fn transfer_normal_edge<'f>(
        &self,
        icfg: &Icfg<'_>,
        edge: &IcfgEdge,
        out: &'f Self::Fact,
    ) -> Cow<'f, Self::Fact>;

    fn transfer_call_to_return_edge<'f>(
        &self,
        icfg: &Icfg<'_>,
        edge: &IcfgEdge,
        out: &'f Self::Fact,
    ) -> Cow<'f, Self::Fact>;

    fn transfer_call_edge<'f>(
        &self,
        icfg: &Icfg<'_>,
        edge: &IcfgEdge,
        call_site_out: &'f Self::Fact,
    ) -> Cow<'f, Self::Fact>;

    fn transfer_return_edge<'f>(
        &self,
        icfg: &Icfg<'_>,
        edge: &IcfgEdge,
        return_out: &'f Self::Fact,
    ) -> Cow<'f, Self::Fact>;

    fn transfer_node(
        &self,
        icfg: &Icfg<'_>,
        node: IcfgNode,
        input: &Self::Fact,
        output: &mut Self::Fact,
    ) -> bool {
        if icfg.is_call_site(node) {
            self.transfer_call_node(icfg, node, input, output)
        } else {
            self.transfer_non_call_node(icfg, node, input, output)
        }
    }

    fn transfer_edge<'f>(
        &self,
        icfg: &Icfg<'_>,
        edge: &IcfgEdge,
        out: &'f Self::Fact,
    ) -> Cow<'f, Self::Fact> {
        match edge.kind {
            IcfgEdgeKind::Normal => self.transfer_normal_edge(icfg, edge, out),
            IcfgEdgeKind::CallToReturn => self.transfer_call_to_return_edge(icfg, edge, out),
            IcfgEdgeKind::Call => self.transfer_call_edge(icfg, edge, out),
            IcfgEdgeKind::Return { .. } => self.transfer_return_edge(icfg, edge, out),
        }
    }
}

/// Worklist solver for forward [`InterDataflowAnalysis`]es
pub struct InterSolver;

impl InterSolver {
    pub fn solve<A: InterDataflowAnalysis>(
        analysis: &A,
        icfg: &Icfg<'_>,
    ) -> Result<DataflowResult<IcfgNode, A::Fact>, AnalysisError> {
        if analysis.direction() == DataflowDirection::Backward {
            return Err(AnalysisError::UnsupportedDirection(DataflowDirection::Backward));
        }

        let mut result = DataflowResult::new();
        let nodes = icfg.nodes();
        for &node in &nodes {
            result.set_in_fact(node, analysis.new_initial_fact());
            result.set_out_fact(node, analysis.new_initial_fact());
        }

        // Entry methods can also be callees, so their boundary fact is met
        // into the entry's IN on every visit rather than fixed once
        let boundaries: Vec<(IcfgNode, A::Fact)> = icfg
            .entry_methods()
            .iter()
            .map(|&method| {
                let entry = icfg.entry_of(method);
                (entry, analysis.new_boundary_fact(icfg, entry))
            })
            .collect();
        for (entry, boundary) in &boundaries {
            result.set_out_fact(*entry, boundary.clone());
        }

        let mut worklist = Worklist::new(nodes.iter().copied());
        while let Some(node) = worklist.pop() {
            result.record_iteration();

            let mut input = analysis.new_initial_fact();
            if let Some((_, boundary)) = boundaries.iter().find(|(entry, _)| *entry == node) {
                analysis.meet_into(boundary, &mut input);
            }
            for edge in icfg.in_edges_of(node) {
                if let Some(out) = result.out_fact(&edge.source) {
                    let fact = analysis.transfer_edge(icfg, edge, out);
                    analysis.meet_into(&fact, &mut input);
                }
            }

            let changed = match result.out_fact_mut(&node) {
                Some(output) => analysis.transfer_node(icfg, node, &input, output),
                None => false,
            };
            result.set_in_fact(node, input);

            if changed {
                trace!(%node, "out fact changed");
                for succ in icfg.succs_of(node) {
                    worklist.push(succ);
                }
            }
        }

        debug!(
            nodes = nodes.len(),
            iterations = result.iterations(),
            "interprocedural analysis reached fixed point"
        );
        Ok(result)
    }
}
