//! High-level API tying the program model to the analyses

use crate::report::{
    CallEdgeReport, CallGraphReport, MethodReport, ProgramReport, StmtFact, StmtLiveVars, StmtRef,
};
use anyhow::{Context, Result};
use jflow_analysis::{
    AnalysisError, CallGraph, ChaBuilder, ConstantPropagation, CpFact, DataflowResult,
    DeadCodeDetection, Icfg, IcfgNode, InterConstantPropagation, LiveVariableAnalysis,
};
use jflow_core::{
    AnalysisConfig, AnalysisKind, Cfg, CfgBuilder, ClassHierarchy, Method, MethodId, NodeId,
    Program,
};
use std::path::Path;
use tracing::{debug, info};

/// Loads a program description and runs the configured analyses on it
///
/// # Example
/// ```no_run
/// use jflow::analyze_file;
/// use jflow_core::AnalysisConfig;
///
/// let report = analyze_file("program.json".as_ref(), AnalysisConfig::default())?;
/// for method in &report.methods {
///     let dead = method.dead_code.as_ref().map_or(0, Vec::len);
///     println!("{}: {dead} dead statements", method.method);
/// }
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn analyze_file(path: &Path, config: AnalysisConfig) -> Result<ProgramReport> {
    let program = Program::from_file(path)
        .with_context(|| format!("failed to load program from {}", path.display()))?;
    AnalysisPipeline::new(&program, config).run()
}

pub struct AnalysisPipeline<'p> {
    program: &'p Program,
    config: AnalysisConfig,
}

impl<'p> AnalysisPipeline<'p> {
    pub fn new(program: &'p Program, config: AnalysisConfig) -> Self {
        Self { program, config }
    }

    pub fn run(&self) -> Result<ProgramReport> {
        let mut report = ProgramReport::default();

        let per_method = [
            AnalysisKind::ConstProp,
            AnalysisKind::LiveVar,
            AnalysisKind::DeadCode,
        ];
        if per_method.iter().any(|&kind| self.config.runs(kind)) {
            for method in self.program.methods() {
                if method.ir.is_none() {
                    continue;
                }
                let method_report = self
                    .analyze_method(method)
                    .with_context(|| format!("failed to analyze {}", method.signature()))?;
                report.methods.push(method_report);
            }
        }

        let whole_program = self.config.runs(AnalysisKind::Cha)
            || self.config.runs(AnalysisKind::InterConstProp);
        if whole_program {
            let entry = self.entry()?;
            let call_graph = ChaBuilder::new(self.program).build(entry);
            info!(
                entry = %self.signature(entry),
                reachable = call_graph.number_of_methods(),
                "call graph built"
            );
            if self.config.runs(AnalysisKind::Cha) {
                report.call_graph = Some(self.call_graph_report(&call_graph));
            }
            if self.config.runs(AnalysisKind::InterConstProp) {
                report.inter_constants = self
                    .analyze_whole_program(&call_graph)
                    .context("interprocedural constant propagation failed")?;
            }
        }

        Ok(report)
    }

    /// Configured entry method, else the program's `main`
    fn entry(&self) -> Result<MethodId> {
        match &self.config.entry {
            Some(signature) => self
                .program
                .lookup(signature)
                .with_context(|| format!("unknown entry method {signature}")),
            None => self
                .program
                .main()
                .ok_or_else(|| AnalysisError::NoEntryMethod.into()),
        }
    }

    fn analyze_method(&self, method: &Method) -> Result<MethodReport> {
        let cfg = CfgBuilder::new(self.program).build(method.id)?;
        let mut report = MethodReport::new(method.signature());

        let constants = if self.config.runs(AnalysisKind::ConstProp)
            || self.config.runs(AnalysisKind::DeadCode)
        {
            Some(ConstantPropagation::analyze(&cfg)?)
        } else {
            None
        };
        let live_vars = if self.config.runs(AnalysisKind::LiveVar)
            || self.config.runs(AnalysisKind::DeadCode)
        {
            Some(LiveVariableAnalysis::analyze(&cfg))
        } else {
            None
        };

        if self.config.runs(AnalysisKind::ConstProp) {
            if let Some(constants) = &constants {
                report.constants = Some(stmt_facts(&cfg, |node| constants.out_fact(&node)));
            }
        }
        if self.config.runs(AnalysisKind::LiveVar) {
            if let Some(live_vars) = &live_vars {
                let rows: Vec<StmtLiveVars> = stmts_of(&cfg)
                    .filter_map(|(index, node)| {
                        let live = live_vars.out_fact(&node)?;
                        let mut vars: Vec<String> =
                            live.iter().map(|var| var.name.clone()).collect();
                        vars.sort();
                        Some(StmtLiveVars {
                            index,
                            stmt: stmt_text(&cfg, node),
                            live: vars,
                        })
                    })
                    .collect();
                report.live_vars = Some(rows);
            }
        }
        if self.config.runs(AnalysisKind::DeadCode) {
            if let (Some(constants), Some(live_vars)) = (&constants, &live_vars) {
                let dead = DeadCodeDetection::detect(&cfg, constants, live_vars);
                let rows: Vec<StmtRef> = dead
                    .into_iter()
                    .filter_map(|node| {
                        let index = cfg.stmt_index_of(node)?;
                        Some(StmtRef {
                            index,
                            stmt: stmt_text(&cfg, node),
                        })
                    })
                    .collect();
                report.dead_code = Some(rows);
            }
        }

        debug!(
            method = %report.method,
            dead = report.dead_code.as_ref().map_or(0, Vec::len),
            "method analyzed"
        );
        Ok(report)
    }

    fn analyze_whole_program(&self, call_graph: &CallGraph) -> Result<Vec<MethodReport>> {
        let icfg = Icfg::build(self.program, call_graph)?;
        let result: DataflowResult<IcfgNode, CpFact> = InterConstantPropagation::analyze(&icfg)?;

        let mut reports = Vec::new();
        for method in icfg.methods() {
            let Some(cfg) = icfg.cfg_of(method) else {
                continue;
            };
            let mut report = MethodReport::new(self.signature(method));
            report.constants = Some(stmt_facts(cfg, |node| {
                result.out_fact(&IcfgNode::new(method, node))
            }));
            reports.push(report);
        }
        Ok(reports)
    }

    fn call_graph_report(&self, call_graph: &CallGraph) -> CallGraphReport {
        CallGraphReport {
            entry_methods: call_graph
                .entry_methods()
                .map(|method| self.signature(method))
                .collect(),
            reachable_methods: call_graph
                .reachable_methods()
                .map(|method| self.signature(method))
                .collect(),
            edges: call_graph
                .edges()
                .map(|edge| CallEdgeReport {
                    caller: self.signature(edge.call_site.caller),
                    stmt: edge.call_site.stmt,
                    kind: edge.kind,
                    callee: self.signature(edge.callee),
                })
                .collect(),
        }
    }

    fn signature(&self, method: MethodId) -> String {
        self.program
            .method(method)
            .map_or_else(|| method.to_string(), Method::signature)
    }
}

/// Statement nodes of `cfg` with their positions, in program order
fn stmts_of(cfg: &Cfg<'_>) -> impl Iterator<Item = (usize, NodeId)> {
    let len = cfg.ir().stmts.len();
    (0..len).map(|index| (index, NodeId::of_stmt(index)))
}

fn stmt_text(cfg: &Cfg<'_>, node: NodeId) -> String {
    cfg.stmt_of(node)
        .map(ToString::to_string)
        .unwrap_or_default()
}

fn stmt_facts<'r>(
    cfg: &Cfg<'_>,
    fact_of: impl Fn(NodeId) -> Option<&'r CpFact>,
) -> Vec<StmtFact> {
    stmts_of(cfg)
        .filter_map(|(index, node)| {
            let fact = fact_of(node)?;
            Some(StmtFact {
                index,
                stmt: stmt_text(cfg, node),
                values: fact
                    .sorted()
                    .into_iter()
                    .map(|(var, value)| (var.name.clone(), value))
                    .collect(),
            })
        })
        .collect()
}
