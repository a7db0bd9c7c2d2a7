//! Control Flow Graph construction from IR
//!
//! Every statement of a method body becomes one node. A synthetic entry node
//! precedes the first statement and a synthetic exit node follows every
//! `return`, so node ids follow program order: entry is 0, statement `i` is
//! `i + 1`, exit is last.

use crate::error::{Error, Result};
use crate::ir::{Ir, MethodId, Stmt};
use crate::program::Program;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{DfsPostOrder, EdgeRef};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use tracing::trace;

/// Read-only graph surface the dataflow solvers iterate over
pub trait FlowGraph {
    type Node: Copy + Eq + Hash + Ord + fmt::Debug;

    fn entry(&self) -> Self::Node;

    fn exit(&self) -> Self::Node;

    fn nodes(&self) -> Vec<Self::Node>;

    fn preds_of(&self, node: Self::Node) -> SmallVec<[Self::Node; 2]>;

    fn succs_of(&self, node: Self::Node) -> SmallVec<[Self::Node; 2]>;

    /// Nodes reachable from the entry, in reverse postorder
    fn reverse_postorder(&self) -> Vec<Self::Node> {
        let mut visited = HashSet::new();
        let mut postorder = Vec::new();
        let mut stack = vec![(self.entry(), false)];
        while let Some((node, expanded)) = stack.pop() {
            if expanded {
                postorder.push(node);
                continue;
            }
            if !visited.insert(node) {
                continue;
            }
            stack.push((node, true));
            for succ in self.succs_of(node).into_iter().rev() {
                if !visited.contains(&succ) {
                    stack.push((succ, false));
                }
            }
        }
        postorder.reverse();
        postorder
    }
}

/// Node of a method CFG
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

impl NodeId {
    pub const ENTRY: NodeId = NodeId(0);

    pub fn of_stmt(index: usize) -> Self {
        NodeId(index + 1)
    }

    fn graph_index(self) -> NodeIndex {
        NodeIndex::new(self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// How control moves along a CFG edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CfgEdgeKind {
    Entry,
    FallThrough,
    Goto,
    IfTrue,
    IfFalse,
    SwitchCase(i64),
    SwitchDefault,
    Return,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CfgEdge {
    pub source: NodeId,
    pub target: NodeId,
    pub kind: CfgEdgeKind,
}

/// Control Flow Graph of one method body
#[derive(Debug, Clone)]
pub struct Cfg<'p> {
    method: MethodId,
    ir: &'p Ir,
    graph: DiGraph<NodeId, CfgEdgeKind>,
    exit: NodeId,
}

impl<'p> Cfg<'p> {
    pub fn method(&self) -> MethodId {
        self.method
    }

    pub fn ir(&self) -> &'p Ir {
        self.ir
    }

    /// Statement at `node`; `None` for the synthetic entry and exit
    pub fn stmt_of(&self, node: NodeId) -> Option<&'p Stmt> {
        if node == NodeId::ENTRY || node == self.exit {
            return None;
        }
        self.ir.stmt(node.0 - 1)
    }

    /// Position of `node`'s statement in the method body
    pub fn stmt_index_of(&self, node: NodeId) -> Option<usize> {
        self.stmt_of(node).map(|_| node.0 - 1)
    }

    pub fn out_edges_of(&self, node: NodeId) -> Vec<CfgEdge> {
        self.edges_of(node, Direction::Outgoing)
    }

    pub fn in_edges_of(&self, node: NodeId) -> Vec<CfgEdge> {
        self.edges_of(node, Direction::Incoming)
    }

    fn edges_of(&self, node: NodeId, direction: Direction) -> Vec<CfgEdge> {
        if node.0 >= self.graph.node_count() {
            return Vec::new();
        }
        let mut edges: Vec<CfgEdge> = self
            .graph
            .edges_directed(node.graph_index(), direction)
            .map(|edge| CfgEdge {
                source: self.graph[edge.source()],
                target: self.graph[edge.target()],
                kind: *edge.weight(),
            })
            .collect();
        edges.sort_by_key(|edge| (edge.source, edge.target));
        edges
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    fn neighbors(&self, node: NodeId, direction: Direction) -> SmallVec<[NodeId; 2]> {
        if node.0 >= self.graph.node_count() {
            return SmallVec::new();
        }
        let mut nodes: SmallVec<[NodeId; 2]> = self
            .graph
            .neighbors_directed(node.graph_index(), direction)
            .map(|index| self.graph[index])
            .collect();
        nodes.sort();
        nodes.dedup();
        nodes
    }
}

impl FlowGraph for Cfg<'_> {
    type Node = NodeId;

    fn entry(&self) -> NodeId {
        NodeId::ENTRY
    }

    fn exit(&self) -> NodeId {
        self.exit
    }

    fn nodes(&self) -> Vec<NodeId> {
        self.graph.node_indices().map(|index| self.graph[index]).collect()
    }

    fn preds_of(&self, node: NodeId) -> SmallVec<[NodeId; 2]> {
        self.neighbors(node, Direction::Incoming)
    }

    fn succs_of(&self, node: NodeId) -> SmallVec<[NodeId; 2]> {
        self.neighbors(node, Direction::Outgoing)
    }

    fn reverse_postorder(&self) -> Vec<NodeId> {
        let mut dfs = DfsPostOrder::new(&self.graph, NodeId::ENTRY.graph_index());
        let mut order = Vec::new();
        while let Some(index) = dfs.next(&self.graph) {
            order.push(self.graph[index]);
        }
        order.reverse();
        order
    }
}

/// Builder for constructing method CFGs of a [`Program`]
pub struct CfgBuilder<'p> {
    program: &'p Program,
}

impl<'p> CfgBuilder<'p> {
    pub fn new(program: &'p Program) -> Self {
        Self { program }
    }

    pub fn build(&self, method: MethodId) -> Result<Cfg<'p>> {
        let ir = self.program.ir(method)?;
        Self::build_ir(method, ir).map_err(|err| match err {
            Error::JumpOutOfBounds {
                index, target, len, ..
            } => Error::JumpOutOfBounds {
                method: self
                    .program
                    .methods()
                    .get(method.0)
                    .map_or_else(|| method.to_string(), |m| m.signature()),
                index,
                target,
                len,
            },
            other => other,
        })
    }

    /// Builds the CFG of a free-standing body
    pub fn build_ir(method: MethodId, ir: &'p Ir) -> Result<Cfg<'p>> {
        let len = ir.stmts.len();
        let mut graph = DiGraph::with_capacity(len + 2, len + 2);
        for id in 0..len + 2 {
            graph.add_node(NodeId(id));
        }
        let exit = NodeId(len + 1);
        let next = |index: usize| {
            if index + 1 < len {
                NodeId::of_stmt(index + 1)
            } else {
                exit
            }
        };
        let target_of = |index: usize, target: usize| {
            if target < len {
                Ok(NodeId::of_stmt(target))
            } else {
                Err(Error::JumpOutOfBounds {
                    method: method.to_string(),
                    index,
                    target,
                    len,
                })
            }
        };

        let mut add_edge = |source: NodeId, target: NodeId, kind: CfgEdgeKind| {
            graph.add_edge(source.graph_index(), target.graph_index(), kind);
        };

        let first = if len > 0 { NodeId::of_stmt(0) } else { exit };
        add_edge(NodeId::ENTRY, first, CfgEdgeKind::Entry);

        for (index, stmt) in ir.stmts.iter().enumerate() {
            let node = NodeId::of_stmt(index);
            match stmt {
                Stmt::If { target, .. } => {
                    add_edge(node, target_of(index, *target)?, CfgEdgeKind::IfTrue);
                    add_edge(node, next(index), CfgEdgeKind::IfFalse);
                }
                Stmt::Goto { target } => {
                    add_edge(node, target_of(index, *target)?, CfgEdgeKind::Goto);
                }
                Stmt::Switch { cases, default, .. } => {
                    for (value, target) in cases {
                        add_edge(
                            node,
                            target_of(index, *target)?,
                            CfgEdgeKind::SwitchCase(*value),
                        );
                    }
                    add_edge(node, target_of(index, *default)?, CfgEdgeKind::SwitchDefault);
                }
                Stmt::Return { .. } => add_edge(node, exit, CfgEdgeKind::Return),
                Stmt::Nop | Stmt::Assign { .. } | Stmt::Invoke { .. } => {
                    add_edge(node, next(index), CfgEdgeKind::FallThrough);
                }
            }
        }

        trace!(%method, nodes = len + 2, edges = graph.edge_count(), "built cfg");
        Ok(Cfg {
            method,
            ir,
            graph,
            exit,
        })
    }
}
