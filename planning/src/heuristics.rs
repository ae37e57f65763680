//! Estimation of the remaining energy cost of a state.
//!
//! Every open goal is priced for every rover as if it were that rover's only
//! task (relaxed, contention-free, over shortest paths), the priced tasks are
//! greedily assigned at most one per rover starting from the most expensive,
//! and rovers whose assignment exceeds their charge pay the trip to the
//! nearest sun spot on top. The estimate never exceeds the true remaining
//! cost: relaxed costs are lower bounds per goal, capping each rover at one
//! task under-counts the workload, and the surcharge only covers the drive
//! to a recharge spot, not the recharge cycle.

use crate::actions::{
    CALIBRATE_COST, COMMUNICATE_DATA_COST, COMMUNICATE_IMAGE_COST, SAMPLE_ROCK_COST, SAMPLE_SOIL_COST,
    TAKE_IMAGE_COST,
};
use crate::paths::TravelMatrix;
use crate::problem::{Mode, Problem, RoverId, MAX_MODES, MAX_OBJECTIVES, MAX_ROVERS, MAX_WAYPOINTS};
use crate::state::State;
use crate::{Cost, INFINITE};

/// Worst-case number of (cost, rover) pairs: every goal atom crossed with
/// every rover.
const MAX_TASKS: usize = (MAX_WAYPOINTS * 2 + MAX_OBJECTIVES * MAX_MODES) * MAX_ROVERS;

/// Lower bound on the energy still to be spent from `state`, or `INFINITE`
/// when some open goal is beyond reach of every rover.
pub fn heuristic(pb: &Problem, paths: &TravelMatrix, state: &State) -> Cost {
    if state.satisfies(&pb.goal) {
        return 0;
    }

    let mut tasks: Vec<(Cost, RoverId)> = Vec::with_capacity(MAX_TASKS);
    if !collect_goal_costs(pb, paths, state, &mut tasks) {
        // Some open goal has no viable rover: dead end.
        return INFINITE;
    }

    // Most expensive tasks first, each rover taking at most one.
    tasks.sort_unstable_by(|a, b| b.0.cmp(&a.0));
    let mut used = [false; MAX_ROVERS];
    let mut assigned: [Cost; MAX_ROVERS] = [0; MAX_ROVERS];
    let mut h_tasks: Cost = 0;
    for (cost, rover) in tasks {
        let r = usize::from(rover);
        if !used[r] {
            used[r] = true;
            assigned[r] = cost;
            h_tasks = h_tasks.saturating_add(cost);
        }
    }

    let h_energy = recharge_surcharge(pb, paths, state, &assigned);
    if h_energy == INFINITE {
        return INFINITE;
    }
    h_tasks.saturating_add(h_energy)
}

/// Prices every open goal for every rover and pushes the viable pairs.
/// Returns false when an open goal has no viable rover at all.
fn collect_goal_costs(pb: &Problem, paths: &TravelMatrix, state: &State, tasks: &mut Vec<(Cost, RoverId)>) -> bool {
    // Soil and rock goals share their cost structure.
    for (demanded, communicated, samples, sampling_cost, is_rock) in [
        (
            pb.goal.soil,
            state.communicated_soil,
            state.soil_samples,
            SAMPLE_SOIL_COST,
            false,
        ),
        (
            pb.goal.rock,
            state.communicated_rock,
            state.rock_samples,
            SAMPLE_ROCK_COST,
            true,
        ),
    ] {
        for w in pb.waypoint_ids() {
            if !demanded.contains(w) || communicated.contains(w) {
                continue;
            }
            let before = tasks.len();
            for r in pb.rover_ids() {
                let rv = state.rover(r);
                let (has_analysis, equipped) = if is_rock {
                    (rv.rock_analyses.contains(w), pb.rovers[r].equipped_rock)
                } else {
                    (rv.soil_analyses.contains(w), pb.rovers[r].equipped_soil)
                };
                let mut cost = INFINITE;
                if has_analysis {
                    if let Some((_, d)) = paths.nearest_comm_point(pb, r, rv.pos) {
                        cost = d.saturating_add(COMMUNICATE_DATA_COST);
                    }
                } else if equipped && samples.contains(w) {
                    let travel = paths.dist(r, rv.pos, w);
                    if travel != INFINITE {
                        if let Some((_, d)) = paths.nearest_comm_point(pb, r, w) {
                            cost = travel + sampling_cost + d + COMMUNICATE_DATA_COST;
                        }
                    }
                }
                if cost != INFINITE {
                    tasks.push((cost, r));
                }
            }
            if tasks.len() == before {
                return false;
            }
        }
    }

    for obj in pb.objective_ids() {
        for mode in Mode::ALL {
            if !pb.goal.demands_image(obj, mode)
                || state.communicated_images.contains(crate::problem::image_bit(obj, mode))
            {
                continue;
            }
            let before = tasks.len();
            for r in pb.rover_ids() {
                let rv = state.rover(r);
                let mut cost = INFINITE;
                if rv.images.contains(crate::problem::image_bit(obj, mode)) {
                    if let Some((_, d)) = paths.nearest_comm_point(pb, r, rv.pos) {
                        cost = d.saturating_add(COMMUNICATE_IMAGE_COST);
                    }
                } else if pb.rovers[r].equipped_imaging {
                    let has_camera = pb.cameras.iter().any(|c| c.rover == r && c.modes.contains(mode));
                    if !has_camera {
                        continue;
                    }
                    // Cheapest waypoint to shoot from, each priced as
                    // travel + calibrate + shoot + travel to a comm point +
                    // transmission.
                    for shoot_wp in pb.objectives[obj].visible_from.ones().map(crate::problem::WaypointId::from) {
                        let travel = paths.dist(r, rv.pos, shoot_wp);
                        if travel == INFINITE {
                            continue;
                        }
                        if let Some((_, d)) = paths.nearest_comm_point(pb, r, shoot_wp) {
                            let total = travel + CALIBRATE_COST + TAKE_IMAGE_COST + d + COMMUNICATE_IMAGE_COST;
                            if total < cost {
                                cost = total;
                            }
                        }
                    }
                }
                if cost != INFINITE {
                    tasks.push((cost, r));
                }
            }
            if tasks.len() == before {
                return false;
            }
        }
    }

    true
}

/// Extra energy forced by assignments that exceed the rover's charge: the
/// drive to the nearest in-sun waypoint, or `INFINITE` when a rover cannot
/// cover its deficit at all.
fn recharge_surcharge(pb: &Problem, paths: &TravelMatrix, state: &State, assigned: &[Cost; MAX_ROVERS]) -> Cost {
    let mut total: Cost = 0;
    for r in pb.rover_ids() {
        let work = assigned[usize::from(r)];
        if work == 0 {
            continue;
        }
        let rv = state.rover(r);
        if work > rv.energy {
            let d = paths.nearest_sun_cost(pb, r, rv.pos);
            if d == INFINITE {
                return INFINITE;
            }
            total = total.saturating_add(d);
        }
    }
    total
}
