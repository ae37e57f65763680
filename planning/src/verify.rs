//! Replay of a solution file against a problem.
//!
//! Each action line is parsed back into a grounded action and pushed through
//! the transition function; the first inapplicable action fails the plan, and
//! the final state must satisfy the goal.

use crate::actions::{apply, Action};
use crate::pddl::{indexed, tokenize};
use crate::problem::{CameraId, Mode, ObjectiveId, Problem, RoverId, StoreId, WaypointId};
use crate::state::State;
use crate::Cost;
use anyhow::{bail, ensure, Context, Result};

/// Summary of a successful replay.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Replay {
    pub actions: usize,
    /// Recharge counter of the final state.
    pub recharges: u32,
    /// Energy spent over the whole plan.
    pub energy: Cost,
}

/// Replays `solution` (the text of a solution file) from `initial`.
pub fn verify_plan(pb: &Problem, initial: &State, solution: &str) -> Result<Replay> {
    let mut state = initial.clone();
    let mut energy: Cost = 0;
    let mut actions = 0usize;

    for (idx, raw) in solution.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let tokens = tokenize(line);
        // Summary lines and other noise do not start with a parenthesis.
        if tokens.first().map(String::as_str) != Some("(") {
            continue;
        }
        let action = parse_action(pb, &tokens, line_no)?;
        let Some((next, spent)) = apply(pb, &state, action) else {
            bail!("Action at line {line_no} is not applicable: {line}");
        };
        state = next;
        energy += spent;
        actions += 1;
    }

    ensure!(
        state.satisfies(&pb.goal),
        "Plan executed successfully, but the final state does not satisfy the goal"
    );
    Ok(Replay {
        actions,
        recharges: state.recharges,
        energy,
    })
}

fn parse_action(pb: &Problem, tokens: &[String], line_no: usize) -> Result<Action> {
    let param = |i: usize| -> Result<&str> {
        tokens
            .get(i)
            .map(String::as_str)
            .with_context(|| format!("Missing action parameter {i} (line {line_no})"))
    };
    let rover = |i: usize| -> Result<RoverId> {
        indexed(param(i)?, pb.rovers.len(), "rover", line_no).map(RoverId::from)
    };
    let wp = |i: usize| -> Result<WaypointId> {
        indexed(param(i)?, pb.waypoints.len(), "waypoint", line_no).map(WaypointId::from)
    };
    let store = |i: usize| -> Result<StoreId> {
        indexed(param(i)?, pb.stores.len(), "store", line_no).map(StoreId::from)
    };
    let camera = |i: usize| -> Result<CameraId> {
        indexed(param(i)?, pb.cameras.len(), "camera", line_no).map(CameraId::from)
    };
    let objective = |i: usize| -> Result<ObjectiveId> {
        indexed(param(i)?, pb.objectives.len(), "objective", line_no).map(ObjectiveId::from)
    };
    let mode = |i: usize| -> Result<Mode> {
        param(i)?.parse().with_context(|| format!("line {line_no}"))
    };

    let name = param(1)?;
    let action = match name {
        "navigate" => Action::Navigate {
            rover: rover(2)?,
            from: wp(3)?,
            to: wp(4)?,
        },
        "recharge" => Action::Recharge {
            rover: rover(2)?,
            at: wp(3)?,
        },
        "sample_soil" => Action::SampleSoil {
            rover: rover(2)?,
            store: store(3)?,
            at: wp(4)?,
        },
        "sample_rock" => Action::SampleRock {
            rover: rover(2)?,
            store: store(3)?,
            at: wp(4)?,
        },
        "drop" => Action::Drop {
            rover: rover(2)?,
            store: store(3)?,
        },
        "calibrate" => Action::Calibrate {
            rover: rover(2)?,
            camera: camera(3)?,
            objective: objective(4)?,
            at: wp(5)?,
        },
        "take_image" => Action::TakeImage {
            rover: rover(2)?,
            at: wp(3)?,
            objective: objective(4)?,
            camera: camera(5)?,
            mode: mode(6)?,
        },
        "communicate_soil_data" => Action::CommunicateSoil {
            rover: rover(2)?,
            sample: wp(3)?,
            from: wp(4)?,
            lander: wp(5)?,
        },
        "communicate_rock_data" => Action::CommunicateRock {
            rover: rover(2)?,
            sample: wp(3)?,
            from: wp(4)?,
            lander: wp(5)?,
        },
        "communicate_image_data" => Action::CommunicateImage {
            rover: rover(2)?,
            objective: objective(3)?,
            mode: mode(4)?,
            from: wp(5)?,
            lander: wp(6)?,
        },
        other => bail!("Unknown action '{other}' at line {line_no}"),
    };
    Ok(action)
}
