//! Interprocedural control flow graph
//!
//! The ICFG stitches the CFGs of all reachable methods together along the
//! call graph. Intraprocedural edges keep their method; every resolved call
//! adds a call edge into the callee's entry and return edges from the
//! callee's exit back to the call's successors.

use crate::callgraph::CallGraph;
use crate::error::AnalysisError;
use indexmap::IndexMap;
use jflow_core::{
    Cfg, CfgBuilder, ClassHierarchy, FlowGraph, InvokeExp, MethodId, NodeId, Program, Stmt, Var,
};
use serde::Serialize;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

/// A CFG node qualified by the method it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct IcfgNode {
    pub method: MethodId,
    pub node: NodeId,
}

impl IcfgNode {
    pub fn new(method: MethodId, node: NodeId) -> Self {
        Self { method, node }
    }
}

impl fmt::Display for IcfgNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.method, self.node)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IcfgEdgeKind {
    /// Intraprocedural edge out of a non-call node
    Normal,
    /// Intraprocedural edge from a call node to its return site
    CallToReturn,
    /// From a call node to the callee's entry
    Call,
    /// From a callee's exit to a return site of `call_site`
    Return { call_site: IcfgNode },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IcfgEdge {
    pub source: IcfgNode,
    pub target: IcfgNode,
    pub kind: IcfgEdgeKind,
}

#[derive(Debug)]
pub struct Icfg<'p> {
    cfgs: IndexMap<MethodId, Cfg<'p>>,
    entry_methods: Vec<MethodId>,
    in_edges: HashMap<IcfgNode, Vec<IcfgEdge>>,
    out_edges: HashMap<IcfgNode, Vec<IcfgEdge>>,
}

impl<'p> Icfg<'p> {
    /// Builds the ICFG over the reachable methods of `call_graph`
    ///
    /// Methods without a body contribute no nodes; calls resolved only to
    /// such methods keep their call-to-return edge and nothing else.
    pub fn build(program: &'p Program, call_graph: &CallGraph) -> Result<Self, AnalysisError> {
        let builder = CfgBuilder::new(program);
        let mut cfgs = IndexMap::new();
        for method in call_graph.reachable_methods() {
            let has_body = program.method(method).is_some_and(|m| m.ir.is_some());
            if has_body {
                cfgs.insert(method, builder.build(method)?);
            } else {
                debug!(%method, "reachable method has no body");
            }
        }

        let mut edges = Vec::new();
        for (&method, cfg) in &cfgs {
            for node in cfg.nodes() {
                let kind = if cfg.stmt_of(node).is_some_and(Stmt::is_invoke) {
                    IcfgEdgeKind::CallToReturn
                } else {
                    IcfgEdgeKind::Normal
                };
                for edge in cfg.out_edges_of(node) {
                    edges.push(IcfgEdge {
                        source: IcfgNode::new(method, edge.source),
                        target: IcfgNode::new(method, edge.target),
                        kind,
                    });
                }
            }
        }

        for edge in call_graph.edges() {
            let caller = edge.call_site.caller;
            let (Some(caller_cfg), Some(callee_cfg)) = (cfgs.get(&caller), cfgs.get(&edge.callee))
            else {
                continue;
            };
            let call_site = IcfgNode::new(caller, NodeId::of_stmt(edge.call_site.stmt));
            if !caller_cfg.stmt_of(call_site.node).is_some_and(Stmt::is_invoke) {
                warn!(%call_site, "call graph edge does not start at a call statement");
                continue;
            }
            edges.push(IcfgEdge {
                source: call_site,
                target: IcfgNode::new(edge.callee, callee_cfg.entry()),
                kind: IcfgEdgeKind::Call,
            });
            for return_site in caller_cfg.succs_of(call_site.node) {
                edges.push(IcfgEdge {
                    source: IcfgNode::new(edge.callee, callee_cfg.exit()),
                    target: IcfgNode::new(caller, return_site),
                    kind: IcfgEdgeKind::Return { call_site },
                });
            }
        }

        let mut in_edges: HashMap<IcfgNode, Vec<IcfgEdge>> = HashMap::new();
        let mut out_edges: HashMap<IcfgNode, Vec<IcfgEdge>> = HashMap::new();
        for edge in &edges {
            out_edges.entry(edge.source).or_default().push(*edge);
            in_edges.entry(edge.target).or_default().push(*edge);
        }

        let entry_methods = call_graph
            .entry_methods()
            .filter(|method| cfgs.contains_key(method))
            .collect();

        debug!(methods = cfgs.len(), edges = edges.len(), "built ICFG");
        Ok(Self {
            cfgs,
            entry_methods,
            in_edges,
            out_edges,
        })
    }

    pub fn entry_methods(&self) -> &[MethodId] {
        &self.entry_methods
    }

    pub fn is_entry_method(&self, method: MethodId) -> bool {
        self.entry_methods.contains(&method)
    }

    pub fn methods(&self) -> impl Iterator<Item = MethodId> + '_ {
        self.cfgs.keys().copied()
    }

    pub fn cfg_of(&self, method: MethodId) -> Option<&Cfg<'p>> {
        self.cfgs.get(&method)
    }

    /// Every node, method by method in program order
    pub fn nodes(&self) -> Vec<IcfgNode> {
        self.cfgs
            .iter()
            .flat_map(|(&method, cfg)| {
                cfg.nodes()
                    .into_iter()
                    .map(move |node| IcfgNode::new(method, node))
            })
            .collect()
    }

    pub fn entry_of(&self, method: MethodId) -> IcfgNode {
        IcfgNode::new(method, NodeId::ENTRY)
    }

    pub fn exit_of(&self, method: MethodId) -> Option<IcfgNode> {
        self.cfgs
            .get(&method)
            .map(|cfg| IcfgNode::new(method, cfg.exit()))
    }

    pub fn stmt_of(&self, node: IcfgNode) -> Option<&'p Stmt> {
        self.cfgs.get(&node.method)?.stmt_of(node.node)
    }

    pub fn is_call_site(&self, node: IcfgNode) -> bool {
        self.stmt_of(node).is_some_and(Stmt::is_invoke)
    }

    /// Invocation and result variable of a call node
    pub fn call_at(&self, node: IcfgNode) -> Option<(&'p InvokeExp, Option<&'p Var>)> {
        match self.stmt_of(node)? {
            Stmt::Invoke { result, call } => Some((call, result.as_ref())),
            _ => None,
        }
    }

    pub fn params_of(&self, method: MethodId) -> &'p [Var] {
        self.cfgs
            .get(&method)
            .map_or(&[], |cfg| cfg.ir().params.as_slice())
    }

    pub fn return_vars_of(&self, method: MethodId) -> Vec<&'p Var> {
        self.cfgs
            .get(&method)
            .map_or_else(Vec::new, |cfg| cfg.ir().return_vars())
    }

    pub fn in_edges_of(&self, node: IcfgNode) -> &[IcfgEdge] {
        self.in_edges.get(&node).map_or(&[], Vec::as_slice)
    }

    pub fn out_edges_of(&self, node: IcfgNode) -> &[IcfgEdge] {
        self.out_edges.get(&node).map_or(&[], Vec::as_slice)
    }

    pub fn succs_of(&self, node: IcfgNode) -> SmallVec<[IcfgNode; 2]> {
        let mut succs: SmallVec<[IcfgNode; 2]> =
            self.out_edges_of(node).iter().map(|edge| edge.target).collect();
        succs.sort();
        succs.dedup();
        succs
    }

    pub fn preds_of(&self, node: IcfgNode) -> SmallVec<[IcfgNode; 2]> {
        let mut preds: SmallVec<[IcfgNode; 2]> =
            self.in_edges_of(node).iter().map(|edge| edge.source).collect();
        preds.sort();
        preds.dedup();
        preds
    }

    /// Methods a call node transfers control to
    pub fn callees_of(&self, call_site: IcfgNode) -> impl Iterator<Item = MethodId> + '_ {
        self.out_edges_of(call_site)
            .iter()
            .filter(|edge| edge.kind == IcfgEdgeKind::Call)
            .map(|edge| edge.target.method)
    }
}
