#![forbid(unsafe_code)]

mod manifest;
mod report;

use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::{Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use houdini_core::{
    FlushEnd, Houdini, HoudiniConfig, IterationTimer, ObserverBus, RunResult, Schedule, SetupError,
    TextReporter, TracingObserver,
};

use crate::manifest::{load_manifest, ResolvedManifest};
use crate::report::InferenceReport;

#[derive(Parser, Debug)]
#[command(name = "houdini", version, about = "Houdini candidate-invariant inference")]
struct Cli {
    /// Increase log verbosity (repeatable). `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Infer the largest consistent assignment of the manifest's candidates
    Infer {
        /// Program manifest (.toml)
        manifest: PathBuf,

        /// Keep refining after a genuine violation instead of flushing
        #[arg(long, default_value_t = false)]
        continue_at_error: bool,

        /// Scheduling after a refutation. Overrides `[houdini] schedule`.
        #[arg(long, value_enum)]
        schedule: Option<ScheduleArg>,

        /// End kind reported for flushed runs. Overrides `[houdini] flush-end`.
        #[arg(long, value_enum)]
        flush_end: Option<FlushEndArg>,

        /// Print every engine event to stderr
        #[arg(long, default_value_t = false)]
        trace: bool,

        /// Print per-round timings after the run
        #[arg(long, default_value_t = false)]
        timings: bool,

        #[arg(long, value_enum, default_value_t = FormatArg::Text)]
        format: FormatArg,
    },

    /// Print candidates, implementations and call edges
    Graph {
        /// Program manifest (.toml)
        manifest: PathBuf,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ScheduleArg {
    /// Re-verify the same implementation after a refutation
    Spin,
    /// Rotate it to the tail of the worklist
    RoundRobin,
}

impl From<ScheduleArg> for Schedule {
    fn from(v: ScheduleArg) -> Self {
        match v {
            ScheduleArg::Spin => Schedule::Spin,
            ScheduleArg::RoundRobin => Schedule::RoundRobin,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum FlushEndArg {
    Normal,
    Abnormal,
}

impl From<FlushEndArg> for FlushEnd {
    fn from(v: FlushEndArg) -> Self {
        match v {
            FlushEndArg::Normal => FlushEnd::Normal,
            FlushEndArg::Abnormal => FlushEnd::Abnormal,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum FormatArg {
    Text,
    Json,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> miette::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.cmd {
        Cmd::Infer {
            manifest,
            continue_at_error,
            schedule,
            flush_end,
            trace,
            timings,
            format,
        } => {
            let resolved = load_manifest(&manifest)?;
            let mut config = resolved.config.clone();
            if continue_at_error {
                config = config.continue_at_error(true);
            }
            if let Some(s) = schedule {
                config = config.schedule(s.into());
            }
            if let Some(f) = flush_end {
                config = config.flush_end(f.into());
            }
            let options = InferOptions { trace, timings, format };
            infer(&resolved, config, options)
        }
        Cmd::Graph { manifest } => {
            let resolved = load_manifest(&manifest)?;
            print_graph(&resolved)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

struct InferOptions {
    trace: bool,
    timings: bool,
    format: FormatArg,
}

fn setup_report(resolved: &ResolvedManifest, err: SetupError) -> miette::Report {
    match err {
        SetupError::Configuration(e) => resolved.report(e),
        SetupError::Oracle(e) => miette::Report::new(e),
    }
}

fn infer(resolved: &ResolvedManifest, config: HoudiniConfig, options: InferOptions) -> miette::Result<ExitCode> {
    let mut oracle = resolved.oracle();
    let mut houdini =
        Houdini::new(&resolved.program, &mut oracle, config).map_err(|e| setup_report(resolved, e))?;

    let mut tracer = TracingObserver;
    let mut timer = IterationTimer::new();
    let mut reporter = options.trace.then(|| TextReporter::new(io::stderr().lock()));
    let result = {
        let mut bus = ObserverBus::new();
        bus.register(&mut tracer);
        if let Some(reporter) = reporter.as_mut() {
            bus.register(reporter);
        }
        if options.timings {
            bus.register(&mut timer);
        }
        houdini.infer_observed(&mut bus)
    };
    if let Some(reporter) = reporter {
        reporter.finish().into_diagnostic()?;
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if options.timings {
        timer.print_times(&mut out).into_diagnostic()?;
    }
    match options.format {
        FormatArg::Text => report::print_text(&mut out, &result).into_diagnostic()?,
        FormatArg::Json => print_json(&mut out, &resolved.path, &result)?,
    }
    out.flush().into_diagnostic()?;

    Ok(if result.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_json(out: &mut impl Write, path: &Path, result: &RunResult) -> miette::Result<()> {
    let report = InferenceReport::new(&path.to_string_lossy(), result);
    serde_json::to_writer_pretty(&mut *out, &report).into_diagnostic()?;
    writeln!(out).into_diagnostic()
}

fn print_graph(resolved: &ResolvedManifest) -> miette::Result<()> {
    let candidates = houdini_core::CandidateSet::collect(&resolved.program).map_err(|e| resolved.report(e))?;
    let graph = houdini_core::CallGraph::build(&resolved.program).map_err(|e| resolved.report(e))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let names: Vec<&str> = candidates.names().collect();
    writeln!(out, "candidates ({}): {}", names.len(), names.join(", ")).into_diagnostic()?;
    writeln!(out, "implementations ({}):", graph.len()).into_diagnostic()?;
    for id in graph.ids() {
        let node = graph.node(id);
        writeln!(out, "  {} : {}", node.name, node.procedure).into_diagnostic()?;
    }
    writeln!(out, "edges ({}):", graph.edge_count()).into_diagnostic()?;
    for (from, to) in graph.edges() {
        writeln!(out, "  {} -> {}", graph.name(*from), graph.name(*to)).into_diagnostic()?;
    }
    Ok(())
}
