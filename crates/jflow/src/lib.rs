//! Driver for the jflow analyses
//!
//! [`AnalysisPipeline`] runs the analyses an [`AnalysisConfig`] selects
//! over a loaded [`Program`] and collects a serializable
//! [`ProgramReport`]; [`report::render_text`] prints it for humans.
//!
//! [`AnalysisConfig`]: jflow_core::AnalysisConfig
//! [`Program`]: jflow_core::Program

pub mod pipeline;
pub mod report;

pub use pipeline::{analyze_file, AnalysisPipeline};
pub use report::{CallGraphReport, MethodReport, ProgramReport};
