//! Serializable analysis reports and their text rendering

use colored::Colorize;
use jflow_analysis::Value;
use jflow_core::CallKind;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProgramReport {
    pub methods: Vec<MethodReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_graph: Option<CallGraphReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub inter_constants: Vec<MethodReport>,
}

/// Results of the analyses that ran on one method; `None` when one did not run
#[derive(Debug, Clone, Serialize)]
pub struct MethodReport {
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constants: Option<Vec<StmtFact>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live_vars: Option<Vec<StmtLiveVars>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dead_code: Option<Vec<StmtRef>>,
}

impl MethodReport {
    pub fn new(method: String) -> Self {
        Self {
            method,
            constants: None,
            live_vars: None,
            dead_code: None,
        }
    }
}

/// Constant facts holding after a statement
#[derive(Debug, Clone, Serialize)]
pub struct StmtFact {
    pub index: usize,
    pub stmt: String,
    pub values: BTreeMap<String, Value>,
}

/// Variables live after a statement
#[derive(Debug, Clone, Serialize)]
pub struct StmtLiveVars {
    pub index: usize,
    pub stmt: String,
    pub live: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StmtRef {
    pub index: usize,
    pub stmt: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CallGraphReport {
    pub entry_methods: Vec<String>,
    pub reachable_methods: Vec<String>,
    pub edges: Vec<CallEdgeReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CallEdgeReport {
    pub caller: String,
    pub stmt: usize,
    pub kind: CallKind,
    pub callee: String,
}

pub fn render_text(report: &ProgramReport) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_report(&mut out, report);
    out
}

fn write_report(out: &mut String, report: &ProgramReport) -> std::fmt::Result {
    for method in &report.methods {
        write_method(out, method, "  ")?;
    }

    if let Some(call_graph) = &report.call_graph {
        writeln!(out, "{}", "call graph".bold())?;
        for entry in &call_graph.entry_methods {
            writeln!(out, "  entry {entry}")?;
        }
        writeln!(out, "  reachable methods: {}", call_graph.reachable_methods.len())?;
        for method in &call_graph.reachable_methods {
            writeln!(out, "    {method}")?;
        }
        writeln!(out, "  edges: {}", call_graph.edges.len())?;
        for edge in &call_graph.edges {
            writeln!(
                out,
                "    {}[{}] --{}--> {}",
                edge.caller, edge.stmt, edge.kind, edge.callee
            )?;
        }
    }

    if !report.inter_constants.is_empty() {
        writeln!(out, "{}", "inter-constprop".bold())?;
        for method in &report.inter_constants {
            write!(out, "  ")?;
            write_method(out, method, "    ")?;
        }
    }
    Ok(())
}

fn write_method(out: &mut String, method: &MethodReport, indent: &str) -> std::fmt::Result {
    writeln!(out, "{}", method.method.bold())?;
    let rows = format!("{indent}  ");

    if let Some(constants) = &method.constants {
        writeln!(out, "{indent}constprop")?;
        for row in constants {
            let fact = format_fact(&row.values);
            writeln!(out, "{rows}[{}] {}  {fact}", row.index, row.stmt)?;
        }
    }
    if let Some(live_vars) = &method.live_vars {
        writeln!(out, "{indent}livevar")?;
        for row in live_vars {
            let live = row.live.join(", ");
            writeln!(out, "{rows}[{}] {}  [{live}]", row.index, row.stmt)?;
        }
    }
    if let Some(dead_code) = &method.dead_code {
        if dead_code.is_empty() {
            writeln!(out, "{indent}deadcode: none")?;
        } else {
            writeln!(out, "{indent}deadcode")?;
            for row in dead_code {
                writeln!(out, "{rows}[{}] {}", row.index, row.stmt.red())?;
            }
        }
    }
    Ok(())
}

fn format_fact(values: &BTreeMap<String, Value>) -> String {
    let entries: Vec<String> = values
        .iter()
        .map(|(var, value)| format!("{var}={value}"))
        .collect();
    format!("{{{}}}", entries.join(", "))
}
