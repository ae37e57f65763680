use anyhow::*;
use rovers_planning::pddl::{parse_problem, Input};
use rovers_planning::search::{plan_search, Cfg, SearchOutcome, Strategy};
use std::fs::File;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use structopt::StructOpt;
use tracing::info;

/// Forward state-space planner for the Rovers domain.
#[derive(Debug, StructOpt)]
#[structopt(name = "planner", rename_all = "kebab-case")]
struct Opt {
    /// Search method: `best` (greedy best-first) or `astar` (optimal in
    /// energy).
    method: Strategy,
    /// File containing the problem description.
    input: PathBuf,
    /// File where the solution will be written.
    output: PathBuf,
    /// Wall-clock budget for the search, in seconds.
    #[structopt(long, default_value = "600")]
    timeout: u64,
    /// Reproduce the lossy duplicate-detection fingerprint of the original
    /// planner instead of the exact one.
    #[structopt(long)]
    compat_state_key: bool,
    #[structopt(long, default_value = "info")]
    log_level: tracing::Level,
}

fn main() -> Result<()> {
    let opt = Opt::from_args();

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(opt.log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    ensure!(opt.input.exists(), "Problem file {} does not exist", opt.input.display());
    let input = Input::from_file(&opt.input)?;
    let (problem, initial) = parse_problem(&input)?;

    info!("solving {} with {:?}", opt.input.display(), opt.method);
    let cfg = Cfg {
        strategy: opt.method,
        timeout: Duration::from_secs(opt.timeout),
        compat_state_key: opt.compat_state_key,
    };
    let start = Instant::now();
    let (outcome, stats) = plan_search(&problem, &initial, &cfg);
    let runtime = start.elapsed();

    match outcome {
        SearchOutcome::Solution(plan) => {
            println!(
                "Solution found! ({} steps) (Total recharges: {})",
                plan.len(),
                plan.total_recharges
            );
            println!("(Total energy spent: {})", plan.total_energy);
            println!("Heap stats: inserts={}, extracts={}", stats.inserts, stats.extracts);
            println!("Time spent: {:.3} secs", runtime.as_secs_f64());
            let mut out = File::create(&opt.output)
                .with_context(|| format!("Cannot open output file {} to write solution", opt.output.display()))?;
            plan.write(&mut out)
                .with_context(|| "Error while writing the solution")?;
            Ok(())
        }
        SearchOutcome::Exhausted => {
            eprintln!("No solution found.");
            std::process::exit(1);
        }
        SearchOutcome::Timeout => {
            eprintln!("Timeout reached. Aborting...");
            eprintln!("Heap stats: inserts={}, extracts={}", stats.inserts, stats.extracts);
            std::process::exit(1);
        }
    }
}
