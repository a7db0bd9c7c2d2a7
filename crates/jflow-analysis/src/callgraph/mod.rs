//! Call graphs and their construction
//!
//! A [`CallGraph`] records which methods are reachable from the entry
//! methods and, for every call site, the methods it may invoke. Edges and
//! methods are kept in insertion order so reports are deterministic.

mod cha;

pub use cha::ChaBuilder;

use indexmap::{IndexMap, IndexSet};
use jflow_core::{CallKind, MethodId};
use serde::Serialize;
use std::fmt;

/// A call statement: the calling method and the statement's position in it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CallSite {
    pub caller: MethodId,
    pub stmt: usize,
}

impl CallSite {
    pub fn new(caller: MethodId, stmt: usize) -> Self {
        Self { caller, stmt }
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.caller, self.stmt)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Edge {
    pub kind: CallKind,
    pub call_site: CallSite,
    pub callee: MethodId,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CallGraph {
    entry_methods: IndexSet<MethodId>,
    reachable_methods: IndexSet<MethodId>,
    edges: IndexSet<Edge>,
    #[serde(skip)]
    callees: IndexMap<CallSite, IndexSet<MethodId>>,
    #[serde(skip)]
    callers: IndexMap<MethodId, IndexSet<CallSite>>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entry_method(&mut self, method: MethodId) {
        self.entry_methods.insert(method);
    }

    /// Marks `method` reachable, returning whether it was new
    pub fn add_reachable_method(&mut self, method: MethodId) -> bool {
        self.reachable_methods.insert(method)
    }

    /// Adds `edge`, returning whether it was new
    pub fn add_edge(&mut self, edge: Edge) -> bool {
        if !self.edges.insert(edge) {
            return false;
        }
        self.callees
            .entry(edge.call_site)
            .or_default()
            .insert(edge.callee);
        self.callers
            .entry(edge.callee)
            .or_default()
            .insert(edge.call_site);
        true
    }

    pub fn contains(&self, method: MethodId) -> bool {
        self.reachable_methods.contains(&method)
    }

    pub fn entry_methods(&self) -> impl Iterator<Item = MethodId> + '_ {
        self.entry_methods.iter().copied()
    }

    pub fn reachable_methods(&self) -> impl Iterator<Item = MethodId> + '_ {
        self.reachable_methods.iter().copied()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    pub fn edges_out_of(&self, method: MethodId) -> impl Iterator<Item = &Edge> {
        self.edges
            .iter()
            .filter(move |edge| edge.call_site.caller == method)
    }

    /// Call sites of `method` that have at least one resolved callee
    pub fn call_sites_in(&self, method: MethodId) -> impl Iterator<Item = CallSite> + '_ {
        self.callees
            .keys()
            .copied()
            .filter(move |call_site| call_site.caller == method)
    }

    pub fn callees_of(&self, call_site: &CallSite) -> impl Iterator<Item = MethodId> + '_ {
        self.callees.get(call_site).into_iter().flatten().copied()
    }

    pub fn callers_of(&self, method: MethodId) -> impl Iterator<Item = CallSite> + '_ {
        self.callers.get(&method).into_iter().flatten().copied()
    }

    pub fn number_of_methods(&self) -> usize {
        self.reachable_methods.len()
    }

    pub fn number_of_edges(&self) -> usize {
        self.edges.len()
    }
}
