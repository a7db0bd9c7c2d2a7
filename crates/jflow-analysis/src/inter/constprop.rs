//! Interprocedural constant propagation
//!
//! Node transfers are those of [`ConstantPropagation`], except that a call
//! node passes its IN fact through unchanged. Calls are modelled on the
//! edges instead: argument values flow into parameters along call edges,
//! the met return values flow back into the result variable along return
//! edges, and the call-to-return edge drops the result variable's old value.

use super::{Icfg, IcfgEdge, IcfgEdgeKind, IcfgNode, InterDataflowAnalysis, InterSolver};
use crate::constprop::{ConstantPropagation, Value};
use crate::error::AnalysisError;
use crate::fact::CpFact;
use crate::solver::DataflowResult;
use std::borrow::Cow;

#[derive(Debug, Clone, Copy, Default)]
pub struct InterConstantPropagation;

impl InterConstantPropagation {
    pub const ID: &'static str = "inter-constprop";

    pub fn analyze(icfg: &Icfg<'_>) -> Result<DataflowResult<IcfgNode, CpFact>, AnalysisError> {
        InterSolver::solve(&InterConstantPropagation, icfg)
    }
}

impl InterDataflowAnalysis for InterConstantPropagation {
    type Fact = CpFact;

    fn new_boundary_fact(&self, icfg: &Icfg<'_>, entry: IcfgNode) -> CpFact {
        ConstantPropagation::boundary_fact(icfg.params_of(entry.method))
    }

    fn new_initial_fact(&self) -> CpFact {
        CpFact::new()
    }

    fn meet_into(&self, fact: &CpFact, target: &mut CpFact) {
        ConstantPropagation::meet_facts(fact, target);
    }

    fn transfer_call_node(
        &self,
        _icfg: &Icfg<'_>,
        _node: IcfgNode,
        input: &CpFact,
        output: &mut CpFact,
    ) -> bool {
        output.copy_from(input)
    }

    fn transfer_non_call_node(
        &self,
        icfg: &Icfg<'_>,
        node: IcfgNode,
        input: &CpFact,
        output: &mut CpFact,
    ) -> bool {
        ConstantPropagation::transfer_stmt(icfg.stmt_of(node), input, output)
    }

    fn transfer_normal_edge<'f>(
        &self,
        _icfg: &Icfg<'_>,
        _edge: &IcfgEdge,
        out: &'f CpFact,
    ) -> Cow<'f, CpFact> {
        Cow::Borrowed(out)
    }

    fn transfer_call_to_return_edge<'f>(
        &self,
        icfg: &Icfg<'_>,
        edge: &IcfgEdge,
        out: &'f CpFact,
    ) -> Cow<'f, CpFact> {
        match icfg.call_at(edge.source) {
            Some((_, Some(result))) => {
                let mut fact = out.clone();
                fact.remove(result);
                Cow::Owned(fact)
            }
            _ => Cow::Borrowed(out),
        }
    }

    fn transfer_call_edge<'f>(
        &self,
        icfg: &Icfg<'_>,
        edge: &IcfgEdge,
        call_site_out: &'f CpFact,
    ) -> Cow<'f, CpFact> {
        let mut fact = CpFact::new();
        if let Some((call, _)) = icfg.call_at(edge.source) {
            let params = icfg.params_of(edge.target.method);
            for (param, arg) in params.iter().zip(&call.args) {
                fact.update(param.clone(), call_site_out.get(arg));
            }
        }
        Cow::Owned(fact)
    }

    fn transfer_return_edge<'f>(
        &self,
        icfg: &Icfg<'_>,
        edge: &IcfgEdge,
        return_out: &'f CpFact,
    ) -> Cow<'f, CpFact> {
        let mut fact = CpFact::new();
        let IcfgEdgeKind::Return { call_site } = edge.kind else {
            return Cow::Owned(fact);
        };
        if let Some((_, Some(result))) = icfg.call_at(call_site) {
            let value = icfg
                .return_vars_of(edge.source.method)
                .into_iter()
                .fold(Value::Undef, |acc, var| {
                    ConstantPropagation::meet_value(acc, return_out.get(var))
                });
            fact.update(result.clone(), value);
        }
        Cow::Owned(fact)
    }
}
