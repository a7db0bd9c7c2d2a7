//! Class hierarchy queries
//!
//! Call graph construction only needs to look methods up by subsignature and
//! walk the type lattice in both directions. [`ClassHierarchy`] is that
//! surface; [`Program`](crate::Program) is the in-memory implementation.

use crate::ir::{Method, MethodId, Subsignature};
use indexmap::IndexMap;

/// A class or interface and the methods it declares directly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JClass {
    pub name: String,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub is_interface: bool,
    pub is_abstract: bool,
    pub declared_methods: IndexMap<Subsignature, MethodId>,
}

impl JClass {
    pub fn declared_method(&self, subsignature: &Subsignature) -> Option<MethodId> {
        self.declared_methods.get(subsignature).copied()
    }
}

pub trait ClassHierarchy {
    fn class(&self, name: &str) -> Option<&JClass>;

    fn method(&self, id: MethodId) -> Option<&Method>;

    /// Superclass of `class`; `None` for interfaces and hierarchy roots
    fn super_class_of(&self, class: &str) -> Option<&str> {
        self.class(class)?.super_class.as_deref()
    }

    /// Method declared directly on `class` with the given subsignature
    fn declared_method(&self, class: &str, subsignature: &Subsignature) -> Option<MethodId> {
        self.class(class)?.declared_method(subsignature)
    }

    fn direct_subclasses_of(&self, class: &str) -> &[String];

    fn direct_subinterfaces_of(&self, interface: &str) -> &[String];

    /// Classes that list `interface` in their `implements` clause
    fn direct_implementors_of(&self, interface: &str) -> &[String];
}
