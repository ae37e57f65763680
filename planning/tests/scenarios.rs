//! End-to-end scenarios: parse a problem, search it with both strategies,
//! then replay the emitted solution file through the verifier.

use rovers_planning::actions::Action;
use rovers_planning::heuristics::heuristic;
use rovers_planning::paths::TravelMatrix;
use rovers_planning::pddl::{parse_problem, Input};
use rovers_planning::plan::Plan;
use rovers_planning::problem::Problem;
use rovers_planning::search::{plan_search, successors, Cfg, SearchOutcome, Strategy};
use rovers_planning::state::State;
use rovers_planning::{Cost, INFINITE};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

fn load(text: &str) -> (Problem, State) {
    parse_problem(&Input::from_string(text)).expect("scenario problems are well formed")
}

fn solve(pb: &Problem, init: &State, strategy: Strategy) -> Plan {
    let cfg = Cfg {
        strategy,
        ..Cfg::default()
    };
    match plan_search(pb, init, &cfg) {
        (SearchOutcome::Solution(plan), _) => plan,
        (other, _) => panic!("expected a solution, got {other:?}"),
    }
}

/// Reference optimum: uniform-cost search over the public successor
/// function, no heuristic involved.
fn uniform_cost_optimum(pb: &Problem, init: &State) -> Option<Cost> {
    let mut queue: BinaryHeap<Reverse<(Cost, usize)>> = BinaryHeap::new();
    let mut states: Vec<State> = vec![init.clone()];
    let mut seen: HashSet<State> = HashSet::from([init.clone()]);
    queue.push(Reverse((0, 0)));
    while let Some(Reverse((g, idx))) = queue.pop() {
        let state = states[idx].clone();
        if state.satisfies(&pb.goal) {
            return Some(g);
        }
        for (_, succ, spent) in successors(pb, &state) {
            if seen.insert(succ.clone()) {
                states.push(succ);
                queue.push(Reverse((g + spent, states.len() - 1)));
            }
        }
    }
    None
}

/// Full loop for a solvable scenario: solve with both strategies, check the
/// A* cost against the blind-search optimum, and replay the written solution
/// files.
fn check_solvable(text: &str, expected_optimum: Cost) -> Plan {
    let (pb, init) = load(text);

    let optimum = uniform_cost_optimum(&pb, &init).expect("scenario is solvable");
    assert_eq!(optimum, expected_optimum, "blind-search optimum");

    let astar = solve(&pb, &init, Strategy::AStar);
    assert_eq!(astar.total_energy, optimum, "A* must match the blind optimum");
    let replay = rovers_planning::verify::verify_plan(&pb, &init, &astar.to_text()).expect("A* plan must replay");
    assert_eq!(replay.actions, astar.len());
    assert_eq!(replay.energy, astar.total_energy);
    assert_eq!(replay.recharges, astar.total_recharges);

    let best = solve(&pb, &init, Strategy::Best);
    rovers_planning::verify::verify_plan(&pb, &init, &best.to_text()).expect("best-first plan must replay");

    astar
}

const TRIVIAL: &str = "
(define (problem trivial) (:domain rover)
(:objects
\trover0 - rover
\twaypoint0 - waypoint
\tstore0 - store
\tobjective0 - objective
\tcolour high_res low_res - mode
)
(:init
\t(visible waypoint0 waypoint0)
\t(at_soil_sample waypoint0)
\t(at_lander general waypoint0)
\t(channel_free general)
\t(in rover0 waypoint0)
\t(available rover0)
\t(= (energy rover0) 50)
\t(= (recharges) 0)
\t(equipped_for_soil_analysis rover0)
\t(empty store0)
\t(store_of store0 rover0)
\t(visible_from objective0 waypoint0)
)
(:goal (and
\t(communicated_soil_data waypoint0)
))
)
";

#[test]
fn trivial_sample_and_communicate() {
    let plan = check_solvable(TRIVIAL, 7);
    assert_eq!(plan.len(), 2);
    assert_eq!(plan.total_recharges, 0);
    assert!(matches!(plan.steps[0].action, Action::SampleSoil { .. }));
    assert!(matches!(plan.steps[1].action, Action::CommunicateSoil { .. }));
    let text = plan.to_text();
    assert!(text.starts_with("Solution length: 2\nTotal recharges uses: 0\n"));
    assert!(text.contains("( sample_soil rover0 store0 waypoint0 )"));
    assert!(text.contains("( communicate_soil_data rover0 waypoint0 waypoint0 waypoint0 general )"));
}

const NAVIGATE_THEN_SAMPLE: &str = "
(define (problem fetch) (:domain rover)
(:objects
\trover0 - rover
\twaypoint0 waypoint1 - waypoint
\tstore0 - store
\tobjective0 - objective
\tcolour high_res low_res - mode
)
(:init
\t(visible waypoint0 waypoint0)
\t(visible waypoint0 waypoint1)
\t(visible waypoint1 waypoint0)
\t(at_soil_sample waypoint1)
\t(at_lander general waypoint0)
\t(channel_free general)
\t(in rover0 waypoint0)
\t(available rover0)
\t(= (energy rover0) 30)
\t(equipped_for_soil_analysis rover0)
\t(can_traverse rover0 waypoint0 waypoint1)
\t(can_traverse rover0 waypoint1 waypoint0)
\t(empty store0)
\t(store_of store0 rover0)
\t(visible_from objective0 waypoint0)
)
(:goal (and
\t(communicated_soil_data waypoint1)
))
)
";

#[test]
fn navigate_then_sample() {
    let plan = check_solvable(NAVIGATE_THEN_SAMPLE, 15);
    assert_eq!(plan.len(), 3);
    assert!(matches!(plan.steps[0].action, Action::Navigate { .. }));
}

// The rover starts with 10 energy, the round trip to the sample costs 16 of
// motion alone, and only the sample waypoint is in the sun. The lander sits
// on an unreachable hill seen from the start waypoint only.
const FORCED_RECHARGE: &str = "
(define (problem lowbattery) (:domain rover)
(:objects
\trover0 - rover
\twaypoint0 waypoint1 waypoint2 - waypoint
\tstore0 - store
\tobjective0 - objective
\tcolour high_res low_res - mode
)
(:init
\t(visible waypoint0 waypoint1)
\t(visible waypoint0 waypoint2)
\t(visible waypoint2 waypoint0)
\t(in_sun waypoint2)
\t(at_soil_sample waypoint2)
\t(at_lander general waypoint1)
\t(channel_free general)
\t(in rover0 waypoint0)
\t(available rover0)
\t(= (energy rover0) 10)
\t(equipped_for_soil_analysis rover0)
\t(can_traverse rover0 waypoint0 waypoint2)
\t(can_traverse rover0 waypoint2 waypoint0)
\t(empty store0)
\t(store_of store0 rover0)
\t(visible_from objective0 waypoint0)
)
(:goal (and
\t(communicated_soil_data waypoint2)
))
)
";

#[test]
fn forced_recharge() {
    let plan = check_solvable(FORCED_RECHARGE, 23);
    // A free drop may sneak into an equal-cost plan, so only a lower bound
    // on the length is guaranteed.
    assert!(plan.len() >= 5);
    assert!(plan.steps.iter().any(|s| matches!(s.action, Action::Recharge { .. })));
    // The recharge is free in g but counted by the state.
    assert_eq!(plan.total_energy, 23);
    assert_eq!(plan.total_recharges, 1);
}

const IMAGE_PATH: &str = "
(define (problem snapshot) (:domain rover)
(:objects
\trover0 - rover
\twaypoint0 waypoint1 - waypoint
\tcamera0 - camera
\tobjective0 - objective
\tcolour high_res low_res - mode
)
(:init
\t(visible waypoint0 waypoint0)
\t(visible waypoint0 waypoint1)
\t(visible waypoint1 waypoint0)
\t(at_lander general waypoint0)
\t(channel_free general)
\t(in rover0 waypoint0)
\t(available rover0)
\t(= (energy rover0) 30)
\t(equipped_for_imaging rover0)
\t(can_traverse rover0 waypoint0 waypoint1)
\t(can_traverse rover0 waypoint1 waypoint0)
\t(calibration_target camera0 objective0)
\t(on_board camera0 rover0)
\t(supports camera0 high_res)
\t(visible_from objective0 waypoint1)
)
(:goal (and
\t(communicated_image_data objective0 high_res)
))
)
";

#[test]
fn image_pipeline_order() {
    let plan = check_solvable(IMAGE_PATH, 17);
    let position = |pred: fn(&Action) -> bool| {
        plan.steps
            .iter()
            .position(|s| pred(&s.action))
            .expect("action missing from the plan")
    };
    let calibrate = position(|a| matches!(a, Action::Calibrate { .. }));
    let shoot = position(|a| matches!(a, Action::TakeImage { .. }));
    let transmit = position(|a| matches!(a, Action::CommunicateImage { .. }));
    assert!(calibrate < shoot);
    assert!(shoot < transmit);
}

const UNREACHABLE: &str = "
(define (problem stranded) (:domain rover)
(:objects
\trover0 - rover
\twaypoint0 waypoint1 - waypoint
\tstore0 - store
\tobjective0 - objective
\tcolour high_res low_res - mode
)
(:init
\t(visible waypoint0 waypoint0)
\t(visible waypoint1 waypoint0)
\t(at_soil_sample waypoint1)
\t(at_lander general waypoint0)
\t(channel_free general)
\t(in rover0 waypoint0)
\t(available rover0)
\t(= (energy rover0) 50)
\t(equipped_for_soil_analysis rover0)
\t(empty store0)
\t(store_of store0 rover0)
\t(visible_from objective0 waypoint0)
)
(:goal (and
\t(communicated_soil_data waypoint1)
))
)
";

#[test]
fn unreachable_goal_fails_fast() {
    let (pb, init) = load(UNREACHABLE);
    let paths = TravelMatrix::compute(&pb);
    assert_eq!(heuristic(&pb, &paths, &init), INFINITE);
    let (outcome, stats) = plan_search(&pb, &init, &Cfg::default());
    assert!(matches!(outcome, SearchOutcome::Exhausted));
    // Nothing is ever applicable: the root is the only node.
    assert_eq!(stats.inserts, 1);
    assert_eq!(uniform_cost_optimum(&pb, &init), None);
}

// Two rovers, each the only one able to reach its own sample. The optimal
// plan is the two independent single-rover plans interleaved, and the
// assignment heuristic prices the root exactly.
const TWO_ROVERS: &str = "
(define (problem tandem) (:domain rover)
(:objects
\trover0 rover1 - rover
\twaypoint0 waypoint1 waypoint2 - waypoint
\tstore0 store1 - store
\tobjective0 - objective
\tcolour high_res low_res - mode
)
(:init
\t(visible waypoint0 waypoint0)
\t(visible waypoint0 waypoint1)
\t(visible waypoint1 waypoint0)
\t(visible waypoint0 waypoint2)
\t(visible waypoint2 waypoint0)
\t(at_soil_sample waypoint1)
\t(at_soil_sample waypoint2)
\t(at_lander general waypoint0)
\t(channel_free general)
\t(in rover0 waypoint0)
\t(in rover1 waypoint0)
\t(available rover0)
\t(available rover1)
\t(= (energy rover0) 50)
\t(= (energy rover1) 50)
\t(equipped_for_soil_analysis rover0)
\t(equipped_for_soil_analysis rover1)
\t(can_traverse rover0 waypoint0 waypoint1)
\t(can_traverse rover0 waypoint1 waypoint0)
\t(can_traverse rover1 waypoint0 waypoint2)
\t(can_traverse rover1 waypoint2 waypoint0)
\t(empty store0)
\t(empty store1)
\t(store_of store0 rover0)
\t(store_of store1 rover1)
\t(visible_from objective0 waypoint0)
)
(:goal (and
\t(communicated_soil_data waypoint1)
\t(communicated_soil_data waypoint2)
))
)
";

#[test]
fn two_rovers_add_their_costs() {
    let (pb, init) = load(TWO_ROVERS);
    let paths = TravelMatrix::compute(&pb);
    // One task per rover, 15 each: the estimate is exact here.
    assert_eq!(heuristic(&pb, &paths, &init), 30);
    let plan = check_solvable(TWO_ROVERS, 30);
    assert!(plan.len() >= 6);
    let comms = plan
        .steps
        .iter()
        .filter(|s| matches!(s.action, Action::CommunicateSoil { .. }))
        .count();
    assert_eq!(comms, 2);
    // The two transmissions come from different rovers.
    let rovers: HashSet<_> = plan
        .steps
        .iter()
        .filter(|s| matches!(s.action, Action::CommunicateSoil { .. }))
        .map(|s| s.action.rover())
        .collect();
    assert_eq!(rovers.len(), 2);
}

/// Without an energy deficit the recharge surcharge is zero and the
/// assignment estimate is a true lower bound. (With a deficit it can
/// overcharge when the sun spot already lies on the task's route, so the
/// low-battery scenario is excluded here.)
#[test]
fn heuristic_is_admissible_without_energy_deficit() {
    for text in [TRIVIAL, NAVIGATE_THEN_SAMPLE, IMAGE_PATH, TWO_ROVERS] {
        let (pb, init) = load(text);
        let optimum = uniform_cost_optimum(&pb, &init).expect("scenario is solvable");
        let paths = TravelMatrix::compute(&pb);
        let h0 = heuristic(&pb, &paths, &init);
        assert!(h0 <= optimum, "inadmissible root estimate: h={h0} > {optimum}");
    }
}

#[test]
fn compat_fingerprint_solves_the_scenarios_too() {
    for text in [TRIVIAL, NAVIGATE_THEN_SAMPLE, IMAGE_PATH] {
        let (pb, init) = load(text);
        let cfg = Cfg {
            compat_state_key: true,
            ..Cfg::default()
        };
        let (outcome, _) = plan_search(&pb, &init, &cfg);
        let plan = match outcome {
            SearchOutcome::Solution(p) => p,
            other => panic!("expected a solution, got {other:?}"),
        };
        rovers_planning::verify::verify_plan(&pb, &init, &plan.to_text()).expect("plan must replay");
    }
}
