//! Analysis selection and output options

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Analyses the driver knows how to run, by their configuration id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnalysisKind {
    #[serde(rename = "constprop")]
    ConstProp,
    #[serde(rename = "livevar")]
    LiveVar,
    #[serde(rename = "deadcode")]
    DeadCode,
    #[serde(rename = "cha")]
    Cha,
    #[serde(rename = "inter-constprop")]
    InterConstProp,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 5] = [
        AnalysisKind::ConstProp,
        AnalysisKind::LiveVar,
        AnalysisKind::DeadCode,
        AnalysisKind::Cha,
        AnalysisKind::InterConstProp,
    ];

    pub fn id(self) -> &'static str {
        match self {
            AnalysisKind::ConstProp => "constprop",
            AnalysisKind::LiveVar => "livevar",
            AnalysisKind::DeadCode => "deadcode",
            AnalysisKind::Cha => "cha",
            AnalysisKind::InterConstProp => "inter-constprop",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }

    /// Whole-program analyses need an entry method
    pub fn is_whole_program(self) -> bool {
        matches!(self, AnalysisKind::Cha | AnalysisKind::InterConstProp)
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub analyses: Vec<AnalysisKind>,
    /// Entry method as `<Class: subsignature>`; the program's `main` when unset
    pub entry: Option<String>,
    pub output: OutputFormat,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            analyses: vec![AnalysisKind::ConstProp, AnalysisKind::DeadCode],
            entry: None,
            output: OutputFormat::Text,
        }
    }
}

impl AnalysisConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn runs(&self, kind: AnalysisKind) -> bool {
        self.analyses.contains(&kind)
    }
}
