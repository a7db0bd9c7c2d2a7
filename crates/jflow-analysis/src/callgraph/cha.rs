//! Class hierarchy analysis
//!
//! CHA resolves a virtual call to every override of the named method in the
//! subtypes of the receiver's declared class, without looking at what the
//! receiver can actually point to.

use super::{CallGraph, CallSite, Edge};
use indexmap::IndexSet;
use jflow_core::{CallKind, ClassHierarchy, InvokeExp, MethodId, Subsignature};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, trace};

pub struct ChaBuilder<'h, H: ClassHierarchy> {
    hierarchy: &'h H,
}

impl<'h, H: ClassHierarchy> ChaBuilder<'h, H> {
    pub const ID: &'static str = "cha";

    pub fn new(hierarchy: &'h H) -> Self {
        Self { hierarchy }
    }

    /// Builds the call graph of every method reachable from `entry`
    pub fn build(&self, entry: MethodId) -> CallGraph {
        let mut call_graph = CallGraph::new();
        call_graph.add_entry_method(entry);

        let mut worklist = VecDeque::from([entry]);
        while let Some(method) = worklist.pop_front() {
            if !call_graph.add_reachable_method(method) {
                continue;
            }
            let Some(ir) = self.hierarchy.method(method).and_then(|m| m.ir.as_ref()) else {
                trace!(%method, "no body, no call sites");
                continue;
            };

            for (index, call) in ir.call_sites() {
                let call_site = CallSite::new(method, index);
                for callee in self.resolve(call) {
                    call_graph.add_edge(Edge {
                        kind: call.kind,
                        call_site,
                        callee,
                    });
                    worklist.push_back(callee);
                }
            }
        }

        debug!(
            methods = call_graph.number_of_methods(),
            edges = call_graph.number_of_edges(),
            "built CHA call graph"
        );
        call_graph
    }

    /// Possible targets of `call` under CHA
    pub fn resolve(&self, call: &InvokeExp) -> IndexSet<MethodId> {
        let class = call.method_ref.class.as_str();
        let subsignature = &call.method_ref.subsignature;
        let mut targets = IndexSet::new();

        match call.kind {
            CallKind::Static => {
                targets.extend(self.hierarchy.declared_method(class, subsignature));
            }
            CallKind::Special => {
                targets.extend(self.dispatch(class, subsignature));
            }
            CallKind::Virtual | CallKind::Interface => {
                let mut seen = HashSet::from([class]);
                let mut queue = VecDeque::from([class]);
                while let Some(current) = queue.pop_front() {
                    targets.extend(self.dispatch(current, subsignature));

                    let Some(jclass) = self.hierarchy.class(current) else {
                        continue;
                    };
                    let subtypes: Vec<&str> = if jclass.is_interface {
                        self.hierarchy
                            .direct_subinterfaces_of(current)
                            .iter()
                            .chain(self.hierarchy.direct_implementors_of(current))
                            .map(String::as_str)
                            .collect()
                    } else {
                        self.hierarchy
                            .direct_subclasses_of(current)
                            .iter()
                            .map(String::as_str)
                            .collect()
                    };
                    for subtype in subtypes {
                        if seen.insert(subtype) {
                            queue.push_back(subtype);
                        }
                    }
                }
            }
        }

        trace!(call = %call.method_ref, targets = targets.len(), "resolved");
        targets
    }

    /// The non-abstract method `class` or its nearest superclass declares
    /// with `subsignature`
    pub fn dispatch(&self, class: &str, subsignature: &Subsignature) -> Option<MethodId> {
        let mut walked = HashSet::new();
        let mut current = Some(class);
        while let Some(name) = current {
            // `Program` rejects cycles, other hierarchies may not
            if !walked.insert(name) {
                break;
            }
            let declared = self.hierarchy.declared_method(name, subsignature);
            if let Some(id) = declared {
                let concrete = self
                    .hierarchy
                    .method(id)
                    .is_some_and(|method| !method.is_abstract);
                if concrete {
                    return Some(id);
                }
            }
            current = self.hierarchy.super_class_of(name);
        }
        None
    }
}
