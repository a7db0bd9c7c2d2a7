//! # jflow analysis
//!
//! Fixed-point dataflow analyses over the method CFGs and the
//! interprocedural CFG of a [`Program`](jflow_core::Program), plus the
//! class hierarchy analysis that builds the call graph the ICFG is laid
//! over.
//!
//! ## Modules
//!
//! - **[`solver`]** - the [`DataflowAnalysis`] interface and the forward worklist [`Solver`]
//! - **[`fact`]** - [`CpFact`] and [`SetFact`] flow facts
//! - **[`constprop`]** - the constant lattice [`Value`] and [`ConstantPropagation`]
//! - **[`livevar`]** - live variables, consumed by dead code detection
//! - **[`dead_code`]** - [`DeadCodeDetection`]
//! - **[`callgraph`]** - [`CallGraph`] and the CHA [`ChaBuilder`]
//! - **[`inter`]** - the [`Icfg`], the [`InterSolver`] and [`InterConstantPropagation`]
//!
//! ## Quick Start
//!
//! ```rust
//! use jflow_analysis::{ConstantPropagation, Value};
//! use jflow_core::{CfgBuilder, Exp, FlowGraph, Ir, MethodId, NodeId, Stmt, Var};
//!
//! let x = Var::int("x");
//! let ir = Ir::new(
//!     vec![],
//!     vec![
//!         Stmt::assign(&x, Exp::binary("+".parse()?, Exp::IntLiteral(1), Exp::IntLiteral(2))),
//!         Stmt::Return { value: Some(x.clone()) },
//!     ],
//! );
//! let cfg = CfgBuilder::build_ir(MethodId(0), &ir)?;
//! let result = ConstantPropagation::analyze(&cfg)?;
//! assert_eq!(result.out_fact(&NodeId::of_stmt(0)).unwrap().get(&x), Value::Constant(3));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod callgraph;
pub mod constprop;
pub mod dead_code;
pub mod error;
pub mod fact;
pub mod inter;
pub mod livevar;
pub mod solver;

pub use callgraph::{CallGraph, CallSite, ChaBuilder, Edge};
pub use constprop::{ConstantPropagation, Value};
pub use dead_code::DeadCodeDetection;
pub use error::AnalysisError;
pub use fact::{CpFact, SetFact};
pub use inter::{
    Icfg, IcfgEdge, IcfgEdgeKind, IcfgNode, InterConstantPropagation, InterDataflowAnalysis,
    InterSolver,
};
pub use livevar::LiveVariableAnalysis;
pub use solver::{DataflowAnalysis, DataflowDirection, DataflowResult, Solver};
