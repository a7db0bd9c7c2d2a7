//! # jflow core
//!
//! The program model the jflow analyses run on: a Java-like three-address
//! IR, the class hierarchy, and per-method control-flow graphs.
//!
//! Nothing in this crate computes dataflow facts. It owns the shapes the
//! analyses in `jflow-analysis` consume:
//!
//! - **[`ir`]** - variables, types, expressions, statements and methods
//! - **[`hierarchy`]** - the [`ClassHierarchy`] query trait
//! - **[`program`]** - [`Program`], the in-memory hierarchy loaded from JSON
//! - **[`cfg`]** - the [`FlowGraph`] abstraction and method [`Cfg`]s
//! - **[`config`]** - analysis selection and output options
//!
//! ## Quick Start
//!
//! ```rust
//! use jflow_core::{CfgBuilder, FlowGraph, Program};
//!
//! let program = Program::from_json_str(r#"{
//!     "classes": [{
//!         "name": "Main",
//!         "methods": [{
//!             "subsignature": "void main()",
//!             "is_static": true,
//!             "body": [
//!                 { "Assign": { "lvalue": { "Var": "x:int" }, "rvalue": { "IntLiteral": 1 } } },
//!                 { "Return": { "value": null } }
//!             ]
//!         }]
//!     }],
//!     "main": "<Main: void main()>"
//! }"#)?;
//!
//! let main = program.main().expect("main method");
//! let cfg = CfgBuilder::new(&program).build(main)?;
//! assert_eq!(cfg.nodes().len(), 4);
//! # Ok::<(), jflow_core::Error>(())
//! ```

pub mod cfg;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod ir;
pub mod program;

pub use cfg::{Cfg, CfgBuilder, CfgEdge, CfgEdgeKind, FlowGraph, NodeId};
pub use config::{AnalysisConfig, AnalysisKind, OutputFormat};
pub use error::{Error, Result};
pub use hierarchy::{ClassHierarchy, JClass};
pub use ir::{
    ArithmeticOp, BinaryOp, BitwiseOp, CallKind, ConditionOp, Exp, InvokeExp, Ir, LValue, Method,
    MethodId, MethodRef, PrimitiveType, ShiftOp, Stmt, Subsignature, Type, Var,
};
pub use program::{ClassDef, MethodDef, Program, ProgramDef};
