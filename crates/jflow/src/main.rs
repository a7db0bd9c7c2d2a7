use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use jflow::report::render_text;
use jflow::AnalysisPipeline;
use jflow_core::{AnalysisConfig, AnalysisKind, OutputFormat, Program};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Constant propagation, dead code detection and CHA call graphs for
/// programs in the jflow JSON format
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Program description (JSON)
    program: PathBuf,

    /// Analysis configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Analyses to run, by id; overrides the configuration file
    #[arg(short, long = "analysis", value_parser = parse_analysis)]
    analyses: Vec<AnalysisKind>,

    /// Entry method for whole-program analyses, as `<Class: subsignature>`
    #[arg(short, long)]
    entry: Option<String>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<Format>,

    /// Increase logging verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn parse_analysis(id: &str) -> Result<AnalysisKind, String> {
    AnalysisKind::from_id(id).ok_or_else(|| {
        let known: Vec<&str> = AnalysisKind::ALL.iter().map(|kind| kind.id()).collect();
        format!("unknown analysis `{id}` (expected one of: {})", known.join(", "))
    })
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => AnalysisConfig::from_file(path)
            .with_context(|| format!("failed to load configuration {}", path.display()))?,
        None => AnalysisConfig::default(),
    };
    if !cli.analyses.is_empty() {
        config.analyses = cli.analyses.clone();
    }
    if cli.entry.is_some() {
        config.entry = cli.entry.clone();
    }
    match cli.format {
        Some(Format::Text) => config.output = OutputFormat::Text,
        Some(Format::Json) => config.output = OutputFormat::Json,
        None => {}
    }
    if config.analyses.is_empty() {
        bail!("no analyses selected");
    }

    let program = Program::from_file(&cli.program)
        .with_context(|| format!("failed to load program {}", cli.program.display()))?;
    let output = config.output;
    let report = AnalysisPipeline::new(&program, config).run()?;

    match output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            colored::control::set_override(std::io::stdout().is_terminal());
            print!("{}", render_text(&report));
        }
    }
    Ok(())
}
