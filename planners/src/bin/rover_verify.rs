use anyhow::*;
use rovers_planning::pddl::{parse_problem, Input};
use rovers_planning::verify::verify_plan;
use std::path::PathBuf;
use structopt::StructOpt;

/// Replays a solution file against a problem and checks that every action
/// applies and that the goal is reached.
#[derive(Debug, StructOpt)]
#[structopt(name = "rover_verify", rename_all = "kebab-case")]
struct Opt {
    /// File containing the problem description.
    problem: PathBuf,
    /// File containing the solution to check.
    solution: PathBuf,
}

fn main() -> Result<()> {
    let opt = Opt::from_args();

    let problem_text = Input::from_file(&opt.problem)
        .with_context(|| format!("Error loading problem file {}", opt.problem.display()))?;
    let (problem, initial) = parse_problem(&problem_text)?;

    let solution = std::fs::read_to_string(&opt.solution)
        .with_context(|| format!("Could not open solution file {}", opt.solution.display()))?;

    let replay = verify_plan(&problem, &initial, &solution)?;

    println!("Solution is valid!");
    println!("Total actions: {}", replay.actions);
    println!("Total recharges: {}", replay.recharges);
    println!("Total energy spent: {}", replay.energy);
    Ok(())
}
