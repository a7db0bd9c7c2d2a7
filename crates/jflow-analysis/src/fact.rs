//! Flow facts propagated by the solvers

use crate::constprop::Value;
use indexmap::{IndexMap, IndexSet};
use jflow_core::Var;
use serde::Serialize;
use std::hash::Hash;

/// Constant-propagation fact: a map from variables to lattice values
///
/// Absent variables read as [`Value::Undef`] and updating a variable to
/// `Undef` removes it, so two facts compare equal exactly when they agree on
/// every variable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CpFact {
    values: IndexMap<Var, Value>,
}

impl CpFact {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, var: &Var) -> Value {
        self.values.get(var).copied().unwrap_or(Value::Undef)
    }

    /// Sets `var` to `value`, returning whether the fact changed
    pub fn update(&mut self, var: Var, value: Value) -> bool {
        if value.is_undef() {
            return self.values.shift_remove(&var).is_some();
        }
        self.values.insert(var, value) != Some(value)
    }

    pub fn remove(&mut self, var: &Var) -> Option<Value> {
        self.values.shift_remove(var)
    }

    /// Copies every binding of `other` into this fact, keeping bindings it lacks
    pub fn copy_from(&mut self, other: &CpFact) -> bool {
        let mut changed = false;
        for (var, value) in other.iter() {
            changed |= self.update(var.clone(), value);
        }
        changed
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Var, Value)> + '_ {
        self.values.iter().map(|(var, value)| (var, *value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Bindings ordered by variable, for stable reports
    pub fn sorted(&self) -> Vec<(&Var, Value)> {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

impl FromIterator<(Var, Value)> for CpFact {
    fn from_iter<I: IntoIterator<Item = (Var, Value)>>(iter: I) -> Self {
        let mut fact = CpFact::new();
        for (var, value) in iter {
            fact.update(var, value);
        }
        fact
    }
}

/// A set of elements, e.g. the live variables at a program point
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SetFact<T: Hash + Eq> {
    elements: IndexSet<T>,
}

impl<T: Hash + Eq> Default for SetFact<T> {
    fn default() -> Self {
        Self {
            elements: IndexSet::new(),
        }
    }
}

impl<T: Hash + Eq + Clone> SetFact<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, element: &T) -> bool {
        self.elements.contains(element)
    }

    pub fn add(&mut self, element: T) -> bool {
        self.elements.insert(element)
    }

    pub fn remove(&mut self, element: &T) -> bool {
        self.elements.shift_remove(element)
    }

    /// Adds all elements of `other`, returning whether any was new
    pub fn union(&mut self, other: &SetFact<T>) -> bool {
        let before = self.elements.len();
        self.elements.extend(other.elements.iter().cloned());
        self.elements.len() != before
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.elements.iter()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl<T: Hash + Eq + Clone> FromIterator<T> for SetFact<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            elements: iter.into_iter().collect(),
        }
    }
}
