//! Best-first / A* search over the rover state space.
//!
//! Nodes live in an append-only arena and refer to their parent by index, so
//! the whole search tree is freed in one go when the search returns. The
//! frontier holds `(f, node)` pairs; duplicate states are filtered through a
//! hash set of fingerprints before a node is ever created.

use crate::actions::{
    apply, Action, CALIBRATE_COST, COMMUNICATE_DATA_COST, COMMUNICATE_IMAGE_COST, NAVIGATE_COST, RECHARGE_THRESHOLD,
    SAMPLE_ROCK_COST, SAMPLE_SOIL_COST, TAKE_IMAGE_COST,
};
use crate::heuristics::heuristic;
use crate::paths::TravelMatrix;
use crate::plan::{Plan, PlanStep};
use crate::problem::{Mode, Problem};
use crate::state::{State, StateKey};
use crate::Cost;
use anyhow::bail;
use hashbrown::HashSet;
use rovers_collections::create_ref_type;
use rovers_collections::heap::MinHeap;
use rovers_collections::ref_store::RefStore;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

create_ref_type!(NodeId);

/// How node priorities are computed.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Strategy {
    /// Greedy best-first: `f = h`. Fast, not optimal.
    Best,
    /// A*: `f = g + h`. Optimal in energy, given the admissible heuristic.
    AStar,
}

impl FromStr for Strategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "best" => Ok(Strategy::Best),
            "astar" => Ok(Strategy::AStar),
            _ => bail!("Unknown search method '{s}', expected 'best' or 'astar'"),
        }
    }
}

/// Search configuration.
#[derive(Clone, Debug)]
pub struct Cfg {
    pub strategy: Strategy,
    /// Wall-clock budget, polled at expansion boundaries.
    pub timeout: Duration,
    /// Use the original planner's lossy duplicate-detection fingerprint
    /// instead of the exact one.
    pub compat_state_key: bool,
}

impl Default for Cfg {
    fn default() -> Self {
        Cfg {
            strategy: Strategy::AStar,
            timeout: Duration::from_secs(600),
            compat_state_key: false,
        }
    }
}

/// Counters accumulated over one search run.
#[derive(Clone, Debug, Default)]
pub struct SearchStats {
    pub inserts: u64,
    pub extracts: u64,
    pub expansions: u64,
}

/// How the search ended.
#[derive(Clone, Debug)]
pub enum SearchOutcome {
    Solution(Plan),
    /// The frontier emptied without reaching a goal state.
    Exhausted,
    /// The wall-clock budget ran out.
    Timeout,
}

struct Node {
    state: State,
    /// Back edge to the parent and the action that produced this node.
    /// `None` for the root.
    parent: Option<(NodeId, Action)>,
    depth: u32,
    /// Energy spent from the root to this node.
    g: Cost,
    h: Cost,
    f: Cost,
}

const TIMEOUT_POLL_PERIOD: u64 = 1_000;

/// Runs the search from `initial` and reports how it ended together with the
/// accumulated counters.
pub fn plan_search(pb: &Problem, initial: &State, cfg: &Cfg) -> (SearchOutcome, SearchStats) {
    let start = Instant::now();
    let paths = TravelMatrix::compute(pb);

    let mut nodes: RefStore<NodeId, Node> = RefStore::new();
    let mut frontier: MinHeap<Cost, NodeId> = MinHeap::with_capacity(1_000);
    let mut closed: HashSet<StateKey> = HashSet::new();
    let mut stats = SearchStats::default();

    let h = heuristic(pb, &paths, initial);
    let root = nodes.push(Node {
        state: initial.clone(),
        parent: None,
        depth: 0,
        g: 0,
        h,
        f: priority(cfg.strategy, 0, h),
    });
    closed.insert(initial.key(pb, cfg.compat_state_key));
    frontier.insert(nodes[root].f, root);
    stats.inserts += 1;

    while let Some((_, current)) = frontier.pop() {
        stats.extracts += 1;

        if nodes[current].state.satisfies(&pb.goal) {
            debug!(
                inserts = stats.inserts,
                extracts = stats.extracts,
                expansions = stats.expansions,
                "goal reached"
            );
            return (SearchOutcome::Solution(extract_plan(&nodes, current)), stats);
        }

        stats.expansions += 1;
        if stats.expansions % TIMEOUT_POLL_PERIOD == 0 && start.elapsed() > cfg.timeout {
            warn!(
                inserts = stats.inserts,
                extracts = stats.extracts,
                "timeout reached, aborting search"
            );
            return (SearchOutcome::Timeout, stats);
        }

        let parent_g = nodes[current].g;
        let parent_depth = nodes[current].depth;
        for (action, succ, spent) in successors(pb, &nodes[current].state) {
            let key = succ.key(pb, cfg.compat_state_key);
            if closed.contains(&key) {
                continue;
            }
            closed.insert(key);

            let g = parent_g.saturating_add(spent);
            let h = heuristic(pb, &paths, &succ);
            let f = priority(cfg.strategy, g, h);
            let child = nodes.push(Node {
                state: succ,
                parent: Some((current, action)),
                depth: parent_depth + 1,
                g,
                h,
                f,
            });
            frontier.insert(f, child);
            stats.inserts += 1;
        }
    }

    (SearchOutcome::Exhausted, stats)
}

fn priority(strategy: Strategy, g: Cost, h: Cost) -> Cost {
    match strategy {
        Strategy::Best => h,
        Strategy::AStar => g.saturating_add(h),
    }
}

/// Enumerates every applicable grounded action of `state` together with its
/// successor, in a fixed per-rover order. The guards mirror the transition's
/// preconditions so that almost every candidate handed to [`apply`] goes
/// through; data-producing and transmitting actions are only tried while the
/// goal still wants the datum.
pub fn successors(pb: &Problem, state: &State) -> Vec<(Action, State, Cost)> {
    let mut out = Vec::new();
    let lander = pb.lander.pos;

    for rover in pb.rover_ids() {
        let spec = &pb.rovers[rover];
        if !spec.available {
            continue;
        }
        let rv = state.rover(rover);
        let pos = rv.pos;

        if pb.in_sun(pos) && rv.energy < RECHARGE_THRESHOLD {
            try_push(pb, state, &mut out, Action::Recharge { rover, at: pos });
        }

        if spec.equipped_soil
            && rv.energy >= SAMPLE_SOIL_COST
            && pb.goal.demands_soil(pos)
            && !state.communicated_soil.contains(pos)
            && state.soil_samples.contains(pos)
        {
            for store in pb.store_ids() {
                if pb.stores[store].rover == rover && !state.full_stores.contains(store) {
                    try_push(pb, state, &mut out, Action::SampleSoil { rover, store, at: pos });
                }
            }
        }

        if spec.equipped_rock
            && rv.energy >= SAMPLE_ROCK_COST
            && pb.goal.demands_rock(pos)
            && !state.communicated_rock.contains(pos)
            && state.rock_samples.contains(pos)
        {
            for store in pb.store_ids() {
                if pb.stores[store].rover == rover && !state.full_stores.contains(store) {
                    try_push(pb, state, &mut out, Action::SampleRock { rover, store, at: pos });
                }
            }
        }

        if spec.equipped_imaging {
            for camera in pb.camera_ids() {
                let cam = &pb.cameras[camera];
                if cam.rover != rover {
                    continue;
                }
                for objective in pb.objective_ids() {
                    let in_sight = pb.objectives[objective].visible_from.contains(usize::from(pos));
                    if rv.energy >= CALIBRATE_COST && in_sight && cam.targets.contains(objective) {
                        try_push(
                            pb,
                            state,
                            &mut out,
                            Action::Calibrate {
                                rover,
                                camera,
                                objective,
                                at: pos,
                            },
                        );
                    }
                    for mode in Mode::ALL {
                        if state.calibrated.contains(camera)
                            && rv.energy >= TAKE_IMAGE_COST
                            && cam.modes.contains(mode)
                            && in_sight
                            && pb.goal.demands_image(objective, mode)
                            && !state.communicated_images.contains(crate::problem::image_bit(objective, mode))
                        {
                            try_push(
                                pb,
                                state,
                                &mut out,
                                Action::TakeImage {
                                    rover,
                                    at: pos,
                                    objective,
                                    camera,
                                    mode,
                                },
                            );
                        }
                    }
                }
            }
        }

        if pb.lander.channel_free && pb.visible(pos, lander) {
            if rv.energy >= COMMUNICATE_DATA_COST {
                for sample in pb.waypoint_ids() {
                    if pb.goal.demands_soil(sample)
                        && !state.communicated_soil.contains(sample)
                        && rv.soil_analyses.contains(sample)
                    {
                        try_push(
                            pb,
                            state,
                            &mut out,
                            Action::CommunicateSoil {
                                rover,
                                sample,
                                from: pos,
                                lander,
                            },
                        );
                    }
                }
                for sample in pb.waypoint_ids() {
                    if pb.goal.demands_rock(sample)
                        && !state.communicated_rock.contains(sample)
                        && rv.rock_analyses.contains(sample)
                    {
                        try_push(
                            pb,
                            state,
                            &mut out,
                            Action::CommunicateRock {
                                rover,
                                sample,
                                from: pos,
                                lander,
                            },
                        );
                    }
                }
            }
            if rv.energy >= COMMUNICATE_IMAGE_COST {
                for objective in pb.objective_ids() {
                    for mode in Mode::ALL {
                        if pb.goal.demands_image(objective, mode)
                            && !state.communicated_images.contains(crate::problem::image_bit(objective, mode))
                            && rv.images.contains(crate::problem::image_bit(objective, mode))
                        {
                            try_push(
                                pb,
                                state,
                                &mut out,
                                Action::CommunicateImage {
                                    rover,
                                    objective,
                                    mode,
                                    from: pos,
                                    lander,
                                },
                            );
                        }
                    }
                }
            }
        }

        for store in pb.store_ids() {
            if pb.stores[store].rover == rover && state.full_stores.contains(store) {
                try_push(pb, state, &mut out, Action::Drop { rover, store });
            }
        }

        if rv.energy >= NAVIGATE_COST {
            for to in pb.waypoint_ids() {
                if pos != to && pb.visible(pos, to) && spec.can_traverse(pos, to) {
                    try_push(
                        pb,
                        state,
                        &mut out,
                        Action::Navigate {
                            rover,
                            from: pos,
                            to,
                        },
                    );
                }
            }
        }
    }

    out
}

fn try_push(pb: &Problem, state: &State, out: &mut Vec<(Action, State, Cost)>, action: Action) {
    if let Some((succ, spent)) = apply(pb, state, action) {
        out.push((action, succ, spent));
    }
}

/// Walks the parent edges back to the root and reverses them into a forward
/// plan.
fn extract_plan(nodes: &RefStore<NodeId, Node>, solution: NodeId) -> Plan {
    let mut steps = Vec::with_capacity(nodes[solution].depth as usize);
    let mut current = solution;
    while let Some((parent, action)) = nodes[current].parent {
        steps.push(PlanStep {
            action,
            h: nodes[current].h,
            f: nodes[current].f,
        });
        current = parent;
    }
    steps.reverse();
    Plan {
        steps,
        total_recharges: nodes[solution].state.recharges,
        total_energy: nodes[solution].g,
    }
}
