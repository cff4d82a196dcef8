//! QAOA Demo
//!
//! Depth-incremental QAOA on Max-Cut and exact cover instances, simulated
//! with a local statevector backend.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use arvak_demos::problems::{ExactCover, Graph, Problem};
use arvak_demos::runners::{QaoaResult, QaoaRunner};
use arvak_demos::{
    create_spinner, print_header, print_info, print_result, print_section, print_success,
    print_warning,
};
use arvak_varopt::{
    CacheSetting, Cobyla, LocalMethod, NelderMead, SamplerConfig, SchedulerConfig, Termination,
    Tolerance,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProblemKind {
    Maxcut,
    ExactCover,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Method {
    NelderMead,
    Cobyla,
}

#[derive(Parser, Debug)]
#[command(name = "demo-qaoa")]
#[command(about = "Depth-incremental QAOA with landscape scan and INTERP seeding")]
struct Args {
    /// Problem family
    #[arg(long, value_enum, default_value = "maxcut")]
    problem: ProblemKind,

    /// Graph for Max-Cut (square4, complete4, ring6, ringN, completeN)
    #[arg(short, long, default_value = "square4")]
    graph: String,

    /// Largest QAOA depth [default: 3]
    #[arg(short = 'p', long)]
    depth: Option<usize>,

    /// Landscape points along gamma (and delta) [default: 20]
    #[arg(long)]
    gamma_points: Option<usize>,

    /// Landscape points along beta [default: 10]
    #[arg(long)]
    beta_points: Option<usize>,

    /// Minimizer runs per depth [default: 1]
    #[arg(short, long)]
    repeats: Option<usize>,

    /// Restart perturbation as a fraction of each angle range
    #[arg(long, default_value = "0.05")]
    spread: f64,

    /// Local minimizer [default: nelder-mead]
    #[arg(short, long, value_enum)]
    method: Option<Method>,

    /// Shots per evaluation; exact probabilities when omitted
    #[arg(short, long)]
    shots: Option<u64>,

    /// Refine with adaptive sampling to this absolute precision
    #[arg(long, conflicts_with = "shots")]
    adaptive: Option<f64>,

    /// Seed for restarts and shot sampling [default: 0]
    #[arg(long)]
    seed: Option<u64>,

    /// Three angles per layer (weight and constraint phases)
    #[arg(long)]
    interlaced: bool,

    /// Stop once the feasible mass reaches this probability
    #[arg(long)]
    stop: Option<f64>,

    /// Cache depth-1 landscapes in this directory
    #[arg(long, env = "ARVAK_LANDSCAPE_CACHE")]
    cache_dir: Option<PathBuf>,

    /// Cache depth-1 landscapes in the user cache directory
    #[arg(long, conflicts_with = "cache_dir")]
    user_cache: bool,

    /// Scheduler configuration file (YAML); flags given as well override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Verbose logging (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    match args.problem {
        ProblemKind::Maxcut => {
            let graph = parse_graph(&args.graph)?;
            run(&args, graph, "QAOA Max-Cut Optimization Demo")
        }
        ProblemKind::ExactCover => run(
            &args,
            ExactCover::small_instance(),
            "QAOA Exact Cover Optimization Demo",
        ),
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_graph(name: &str) -> Result<Graph> {
    let name = name.to_lowercase();
    let graph = match name.as_str() {
        "square4" | "square" => Graph::square_4(),
        "complete4" | "k4" => Graph::complete_4(),
        "ring6" => Graph::ring_6(),
        _ => {
            if let Some(n) = name.strip_prefix("ring") {
                Graph::ring(n.parse().with_context(|| format!("bad ring size '{}'", n))?)
            } else if let Some(n) = name.strip_prefix("complete") {
                Graph::complete(n.parse().with_context(|| format!("bad graph size '{}'", n))?)
            } else {
                bail!(
                    "unknown graph '{}'; available: square4, complete4, ring6, ringN, completeN",
                    name
                );
            }
        }
    };
    Ok(graph)
}

fn build_runner<P: Problem + Clone>(args: &Args, problem: P) -> Result<QaoaRunner<P>> {
    let config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_yaml::from_str(&text)
                .with_context(|| format!("failed to parse {}", path.display()))?
        }
        None => SchedulerConfig::default(),
    };
    let mut runner = QaoaRunner::new(problem).with_config(config);

    if let Some(depth) = args.depth {
        runner = runner.with_max_depth(depth);
    }
    if args.gamma_points.is_some() || args.beta_points.is_some() {
        let res = &runner.config.grid.resolution;
        let gamma = args.gamma_points.or(res.first().copied()).unwrap_or(20);
        let beta = args.beta_points.or(res.get(1).copied()).unwrap_or(10);
        runner = runner.with_grid_resolution(gamma, beta);
    }
    if args.interlaced {
        runner = runner.with_interlaced(true);
    }
    if let Some(repeats) = args.repeats {
        runner = runner.with_repeats(repeats, args.spread);
    }
    if let Some(method) = args.method {
        runner = runner.with_method(match method {
            Method::NelderMead => LocalMethod::NelderMead(NelderMead::default()),
            Method::Cobyla => LocalMethod::Cobyla(Cobyla::default()),
        });
    }
    if let Some(threshold) = args.stop {
        runner = runner.with_stopping(threshold);
    }
    if let Some(tolerance) = args.adaptive {
        runner = runner.with_adaptive(
            SamplerConfig::default().with_tolerance(Tolerance::Absolute(tolerance)),
        );
    }
    if let Some(dir) = &args.cache_dir {
        runner = runner.with_cache(CacheSetting::Directory(dir.clone()));
    } else if args.user_cache {
        runner = runner.with_cache(CacheSetting::UserCache);
    }
    let seed = args.seed.unwrap_or(runner.config.local.seed);
    Ok(runner.with_seed(seed).with_shots(args.shots))
}

fn run<P: Problem + Clone>(args: &Args, problem: P, title: &str) -> Result<()> {
    let runner = build_runner(args, problem)?;

    if args.json {
        let result = runner.run()?;
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    print_header(title);

    print_section("Problem Setup");
    print_result("Instance", runner.problem.identity());
    print_result("Qubits", runner.problem.num_qubits());
    print_result("Max depth (p)", runner.config.max_depth);
    print_result(
        "Landscape grid",
        format!("{:?}", runner.config.grid.resolution),
    );
    print_result("Restarts per depth", runner.config.local.repeats);
    print_result(
        "Shots",
        runner
            .shots
            .map_or_else(|| "exact".to_string(), |n| n.to_string()),
    );

    print_section("Running QAOA Optimization");
    println!("  1. Scan the p = 1 landscape on a grid");
    println!("  2. Refine the best grid point locally");
    println!("  3. Extrapolate angles to p + 1 (INTERP) and refine again");
    println!();

    let spinner = create_spinner("Optimizing...");
    let result = runner.run();
    spinner.finish_and_clear();
    let result = result?;

    report(&result, runner.problem.num_qubits());
    Ok(())
}

fn report(result: &QaoaResult, width: usize) {
    print_section("Results per Depth");
    for (record, stats) in result.schedule.records.iter().zip(&result.statistics) {
        println!(
            "  p={}  <C>={:>9.4}  success={:.3}  evaluations={}",
            record.depth, record.value, stats.success_probability, record.evaluations
        );
        println!("       angles {}", record.x_l);
        if let Some(ratio) = result.approximation_ratio(record.depth) {
            print_result("     approximation ratio", format!("{:.1}%", ratio * 100.0));
        }
    }

    for warning in &result.schedule.warnings {
        print_warning(&warning.to_string());
    }

    print_section("Summary");
    if let Some((outcome, cost)) = result.optimum {
        print_result("Optimal cost (exact)", cost);
        print_result("Optimal assignment", outcome.to_msb_string(width));
    }
    if let Some(stats) = result.final_statistics() {
        if let (Some(outcome), Some(cost)) = (stats.most_likely, stats.most_likely_cost) {
            print_result("Most likely assignment", outcome.to_msb_string(width));
            print_result("Its cost", cost);
            print_result(
                "Its probability",
                format!("{:.3}", stats.most_likely_probability),
            );
        }
        print_result("Highest cost with nonzero probability", stats.best_cost);
        print_result(
            "Probability of that cost",
            format!("{:.3}", stats.best_probability),
        );
    }
    print_result("Circuit evaluations", result.circuit_evaluations);
    match result.schedule.termination {
        Termination::Converged { depth } => {
            print_info(&format!("Success threshold reached at p = {}", depth))
        }
        Termination::MaxDepth => print_info("All depths optimized"),
    }

    println!();
    if result.found_optimum() {
        print_success("QAOA demo complete: optimal solution observed");
    } else {
        print_success("QAOA demo complete");
        print_info("Higher p or more restarts may improve results");
    }
}
