//! Whole-program model loaded from a JSON description
//!
//! [`ProgramDef`] is the serialized form: classes with their methods and
//! bodies. [`Program`] indexes it into method ids and the reverse subtype
//! maps the call graph builder walks.

use crate::error::{Error, Result};
use crate::hierarchy::{ClassHierarchy, JClass};
use crate::ir::{Ir, Method, MethodId, MethodRef, Stmt, Subsignature, Var};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgramDef {
    pub classes: Vec<ClassDef>,
    #[serde(default)]
    pub main: Option<MethodRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDef {
    pub name: String,
    #[serde(default)]
    pub super_class: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub is_interface: bool,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub methods: Vec<MethodDef>,
}

impl ClassDef {
    pub fn class(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            super_class: None,
            interfaces: Vec::new(),
            is_interface: false,
            is_abstract: false,
            methods: Vec::new(),
        }
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Self {
            is_interface: true,
            ..Self::class(name)
        }
    }

    pub fn extends(mut self, super_class: impl Into<String>) -> Self {
        self.super_class = Some(super_class.into());
        self
    }

    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn abstract_class(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn method(mut self, method: MethodDef) -> Self {
        self.methods.push(method);
        self
    }
}

/// A declared method; `body: None` on a non-abstract method means native code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDef {
    pub subsignature: Subsignature,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub this: Option<Var>,
    #[serde(default)]
    pub params: Vec<Var>,
    #[serde(default)]
    pub body: Option<Vec<Stmt>>,
}

impl MethodDef {
    pub fn concrete(subsignature: impl Into<String>, params: Vec<Var>, body: Vec<Stmt>) -> Self {
        Self {
            subsignature: Subsignature::new(subsignature),
            is_abstract: false,
            is_static: false,
            this: None,
            params,
            body: Some(body),
        }
    }

    pub fn abstract_method(subsignature: impl Into<String>) -> Self {
        Self {
            subsignature: Subsignature::new(subsignature),
            is_abstract: true,
            is_static: false,
            this: None,
            params: Vec::new(),
            body: None,
        }
    }

    pub fn static_method(mut self) -> Self {
        self.is_static = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Program {
    classes: IndexMap<String, JClass>,
    methods: Vec<Method>,
    subclasses: HashMap<String, Vec<String>>,
    subinterfaces: HashMap<String, Vec<String>>,
    implementors: HashMap<String, Vec<String>>,
    main: Option<MethodId>,
}

impl Program {
    pub fn new(def: ProgramDef) -> Result<Self> {
        let mut program = Self {
            classes: IndexMap::new(),
            methods: Vec::new(),
            subclasses: HashMap::new(),
            subinterfaces: HashMap::new(),
            implementors: HashMap::new(),
            main: None,
        };

        for class_def in def.classes {
            program.add_class(class_def)?;
        }
        program.link_supertypes()?;
        program.check_acyclic()?;

        if let Some(main) = &def.main {
            let id = program
                .resolve(main)
                .ok_or_else(|| Error::MethodNotFound(main.to_string()))?;
            program.main = Some(id);
        }

        debug!(
            classes = program.classes.len(),
            methods = program.methods.len(),
            "loaded program"
        );
        Ok(program)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let def: ProgramDef = serde_json::from_str(json)?;
        Self::new(def)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    fn add_class(&mut self, def: ClassDef) -> Result<()> {
        if self.classes.contains_key(&def.name) {
            return Err(Error::DuplicateClass(def.name));
        }

        let mut declared_methods = IndexMap::new();
        for method_def in def.methods {
            if declared_methods.contains_key(&method_def.subsignature) {
                return Err(Error::DuplicateMethod {
                    class: def.name.clone(),
                    subsignature: method_def.subsignature.to_string(),
                });
            }
            let id = MethodId(self.methods.len());
            let ir = method_def.body.map(|stmts| Ir {
                this: method_def.this,
                params: method_def.params,
                stmts,
            });
            declared_methods.insert(method_def.subsignature.clone(), id);
            self.methods.push(Method {
                id,
                class: def.name.clone(),
                subsignature: method_def.subsignature,
                is_abstract: method_def.is_abstract,
                is_static: method_def.is_static,
                ir,
            });
        }

        self.classes.insert(
            def.name.clone(),
            JClass {
                name: def.name,
                super_class: def.super_class,
                interfaces: def.interfaces,
                is_interface: def.is_interface,
                is_abstract: def.is_abstract,
                declared_methods,
            },
        );
        Ok(())
    }

    fn link_supertypes(&mut self) -> Result<()> {
        for class in self.classes.values() {
            if let Some(super_class) = &class.super_class {
                if !self.classes.contains_key(super_class) {
                    return Err(Error::UnknownSupertype {
                        class: class.name.clone(),
                        relation: "superclass",
                        target: super_class.clone(),
                    });
                }
                self.subclasses
                    .entry(super_class.clone())
                    .or_default()
                    .push(class.name.clone());
            }

            for interface in &class.interfaces {
                if !self.classes.contains_key(interface) {
                    return Err(Error::UnknownSupertype {
                        class: class.name.clone(),
                        relation: "interface",
                        target: interface.clone(),
                    });
                }
                let edges = if class.is_interface {
                    &mut self.subinterfaces
                } else {
                    &mut self.implementors
                };
                edges
                    .entry(interface.clone())
                    .or_default()
                    .push(class.name.clone());
            }
        }
        Ok(())
    }

    /// Rejects supertype cycles through superclasses or interfaces; the
    /// superclass walk in dispatch and the subtype walks rely on this
    fn check_acyclic(&self) -> Result<()> {
        let mut done: HashSet<&str> = HashSet::new();
        for root in self.classes.keys() {
            if done.contains(root.as_str()) {
                continue;
            }
            // Depth-first over supertypes; `path` holds the classes on the
            // current chain
            let mut path: HashSet<&str> = HashSet::new();
            let mut stack: Vec<(&str, bool)> = vec![(root.as_str(), false)];
            while let Some((name, leaving)) = stack.pop() {
                if leaving {
                    path.remove(name);
                    done.insert(name);
                    continue;
                }
                if done.contains(name) {
                    continue;
                }
                if !path.insert(name) {
                    return Err(Error::CyclicHierarchy(name.to_string()));
                }
                stack.push((name, true));
                if let Some(class) = self.classes.get(name) {
                    let supertypes = class.super_class.iter().chain(class.interfaces.iter());
                    for supertype in supertypes {
                        if path.contains(supertype.as_str()) {
                            return Err(Error::CyclicHierarchy(supertype.clone()));
                        }
                        stack.push((supertype.as_str(), false));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn main(&self) -> Option<MethodId> {
        self.main
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn classes(&self) -> impl Iterator<Item = &JClass> {
        self.classes.values()
    }

    /// Method declared exactly as `method_ref` names it (no dispatch)
    pub fn resolve(&self, method_ref: &MethodRef) -> Option<MethodId> {
        self.declared_method(&method_ref.class, &method_ref.subsignature)
    }

    /// Looks a method up by its `<Class: subsignature>` signature
    pub fn lookup(&self, signature: &str) -> Result<MethodId> {
        let method_ref: MethodRef = signature.parse()?;
        self.resolve(&method_ref)
            .ok_or_else(|| Error::MethodNotFound(signature.to_string()))
    }

    /// Body of `id`, failing for abstract and native methods
    pub fn ir(&self, id: MethodId) -> Result<&Ir> {
        let method = self
            .method(id)
            .ok_or_else(|| Error::MethodNotFound(id.to_string()))?;
        method
            .ir
            .as_ref()
            .ok_or_else(|| Error::MissingBody(method.signature()))
    }
}

impl ClassHierarchy for Program {
    fn class(&self, name: &str) -> Option<&JClass> {
        self.classes.get(name)
    }

    fn method(&self, id: MethodId) -> Option<&Method> {
        self.methods.get(id.0)
    }

    fn direct_subclasses_of(&self, class: &str) -> &[String] {
        self.subclasses.get(class).map_or(&[], Vec::as_slice)
    }

    fn direct_subinterfaces_of(&self, interface: &str) -> &[String] {
        self.subinterfaces.get(interface).map_or(&[], Vec::as_slice)
    }

    fn direct_implementors_of(&self, interface: &str) -> &[String] {
        self.implementors.get(interface).map_or(&[], Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shapes() -> ProgramDef {
        ProgramDef {
            classes: vec![
                ClassDef::interface("Shape").method(MethodDef::abstract_method("int area()")),
                ClassDef::interface("Polygon").implements("Shape"),
                ClassDef::class("Square")
                    .implements("Polygon")
                    .method(MethodDef::concrete("int area()", vec![], vec![])),
                ClassDef::class("Cube").extends("Square"),
            ],
            main: None,
        }
    }

    #[test]
    fn test_subtype_maps() {
        let program = Program::new(shapes()).unwrap();
        assert_eq!(program.direct_subinterfaces_of("Shape"), ["Polygon".to_string()]);
        assert_eq!(program.direct_implementors_of("Polygon"), ["Square".to_string()]);
        assert_eq!(program.direct_subclasses_of("Square"), ["Cube".to_string()]);
        assert!(program.direct_subclasses_of("Cube").is_empty());
        assert_eq!(program.super_class_of("Cube"), Some("Square"));
        assert_eq!(program.super_class_of("Square"), None);
    }

    #[test]
    fn test_lookup_by_signature() {
        let program = Program::new(shapes()).unwrap();
        let id = program.lookup("<Square: int area()>").unwrap();
        assert_eq!(program.method(id).unwrap().class, "Square");
        assert!(matches!(
            program.lookup("<Cube: int area()>"),
            Err(Error::MethodNotFound(_))
        ));
    }

    #[test]
    fn test_abstract_method_has_no_body() {
        let program = Program::new(shapes()).unwrap();
        let id = program.lookup("<Shape: int area()>").unwrap();
        assert!(matches!(program.ir(id), Err(Error::MissingBody(_))));
    }

    #[test]
    fn test_unknown_superclass_is_rejected() {
        let def = ProgramDef {
            classes: vec![ClassDef::class("A").extends("Missing")],
            main: None,
        };
        assert!(matches!(
            Program::new(def),
            Err(Error::UnknownSupertype { relation: "superclass", .. })
        ));
    }

    #[test]
    fn test_cyclic_superclasses_are_rejected() {
        let def = ProgramDef {
            classes: vec![
                ClassDef::class("A").extends("B"),
                ClassDef::class("B").extends("A"),
            ],
            main: None,
        };
        assert!(matches!(Program::new(def), Err(Error::CyclicHierarchy(_))));
    }

    #[test]
    fn test_self_extending_class_is_rejected() {
        let def = ProgramDef {
            classes: vec![ClassDef::class("A").extends("A")],
            main: None,
        };
        assert!(matches!(Program::new(def), Err(Error::CyclicHierarchy(name)) if name == "A"));
    }

    #[test]
    fn test_cyclic_interfaces_are_rejected() {
        let def = ProgramDef {
            classes: vec![
                ClassDef::interface("I").implements("J"),
                ClassDef::interface("J").implements("K"),
                ClassDef::interface("K").implements("I"),
            ],
            main: None,
        };
        assert!(matches!(Program::new(def), Err(Error::CyclicHierarchy(_))));
    }

    #[test]
    fn test_diamond_interfaces_are_accepted() {
        let def = ProgramDef {
            classes: vec![
                ClassDef::interface("Top"),
                ClassDef::interface("Left").implements("Top"),
                ClassDef::interface("Right").implements("Top"),
                ClassDef::class("Both").implements("Left").implements("Right"),
            ],
            main: None,
        };
        assert!(Program::new(def).is_ok());
    }

    #[test]
    fn test_duplicate_class_is_rejected() {
        let def = ProgramDef {
            classes: vec![ClassDef::class("A"), ClassDef::class("A")],
            main: None,
        };
        assert!(matches!(Program::new(def), Err(Error::DuplicateClass(name)) if name == "A"));
    }

    #[test]
    fn test_unresolvable_main_is_rejected() {
        let def = ProgramDef {
            classes: vec![ClassDef::class("A")],
            main: Some("<A: void main()>".parse().unwrap()),
        };
        assert!(matches!(Program::new(def), Err(Error::MethodNotFound(_))));
    }
}
