//! Thin CLI driver over the library (spec.md §6: the core itself is "not a
//! CLI", but every collaborator needs *some* process entry point — this one
//! mirrors the teacher's `json_to_constraints` binary: read JSON off disk,
//! run the pipeline stage by stage, print a human-readable dump).

use std::fs::File;
use std::path::PathBuf;

use clap::Parser;
use pointer_analysis::config::{Config, Hooks, QueryKey};
use pointer_analysis::ir::Program;
use pointer_analysis::result::CallGraphEdge;
use regex::Regex;

/// Run the whole-program points-to analysis over a JSON-serialized typed
/// SSA program.
#[derive(Parser, Debug)]
#[command(name = "pta", version, about)]
struct Args {
    /// Path to a JSON-serialized `pointer_analysis::ir::Program`.
    program: PathBuf,

    /// Path to a JSON-serialized `pointer_analysis::config::Config`. If
    /// omitted, every package named by `--entry` is used with no queries.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Entry package name, repeatable. Ignored if `--config` is given.
    #[arg(long = "entry")]
    entries: Vec<String>,

    /// Only print call-graph edges whose caller or callee function name
    /// matches this regex.
    #[arg(long)]
    filter: Option<String>,

    /// Suppress the points-to/call-graph dump; print only warnings.
    #[arg(long)]
    warnings_only: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let program: Program = serde_json::from_reader(File::open(&args.program)?)?;
    let config = match &args.config {
        Some(p) => serde_json::from_reader(File::open(p)?)?,
        None => Config {
            entry_packages: args.entries.clone(),
            queries: Default::default(),
        },
    };

    let hooks = Hooks::none();
    let gen = pointer_analysis::generator::generate(&program, &config, &hooks)?;
    let solved = pointer_analysis::solver::solve(&program, gen, &hooks)?;
    let result = pointer_analysis::result::build(&solved, &config);

    if !result.warnings.is_empty() {
        eprintln!("-- warnings ({}) --", result.warnings.len());
        for w in &result.warnings {
            eprintln!("{w}");
        }
    }
    if args.warnings_only {
        return Ok(());
    }

    let filter = args.filter.as_deref().map(Regex::new).transpose()?;
    println!("-- call graph ({} edges) --", result.call_graph.len());
    for edge in &result.call_graph {
        if !passes_filter(&program, &solved, edge, filter.as_ref()) {
            continue;
        }
        let (caller_name, callee_name) = pointer_analysis::result::describe_edge(&program, &solved, edge);
        println!("{caller_name} -> {callee_name}");
    }

    println!("-- queries ({}) --", result.queries.len());
    for (key, answer) in &result.queries {
        print_query(&program, key, &answer.labels);
    }

    Ok(())
}

fn passes_filter(program: &Program, solved: &pointer_analysis::solver::SolveResult, edge: &CallGraphEdge, filter: Option<&Regex>) -> bool {
    let Some(re) = filter else { return true };
    let (caller_name, callee_name) = pointer_analysis::result::describe_edge(program, solved, edge);
    re.is_match(&caller_name) || re.is_match(&callee_name)
}

fn print_query(program: &Program, key: &QueryKey, labels: &[pointer_analysis::result::Label]) {
    let func_name = &program.function(key.function).name;
    print!("{func_name}:v{} ->", key.value.0);
    if labels.is_empty() {
        println!(" {{}}");
        return;
    }
    print!(" {{ ");
    for l in labels {
        print!("{} ", l.path());
    }
    println!("}}");
}
