//! Analysis failures
//!
//! Imprecision is never an error here: a division by a known zero, an
//! unresolvable call target or an unknown branch condition only make the
//! results less precise. The variants below abort the analysis.

use crate::solver::DataflowDirection;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("{0} analyses are not supported by the worklist solver")]
    UnsupportedDirection(DataflowDirection),

    #[error("no entry method: the program declares no main method")]
    NoEntryMethod,

    #[error(transparent)]
    Program(#[from] jflow_core::Error),
}
