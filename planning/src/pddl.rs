//! Parsing of Rovers problem files.
//!
//! The format is a PDDL-style problem with `:objects`, `:init` and `:goal`
//! sections. Objects are identified by the first integer in their name
//! (`waypoint7` is waypoint 7); facts outside the recognised vocabulary of
//! the `:init` section are fatal, while unrecognised tokens in the `:goal`
//! section (such as the `and` wrapper) are skipped.

use crate::problem::{
    image_bit, CameraId, CameraSpec, Goal, Lander, Mode, ObjectiveId, ObjectiveSpec, Problem, RoverId, RoverSpec,
    StoreId, StoreSpec, WaypointId, WaypointSpec, MAX_CAMERAS, MAX_OBJECTIVES, MAX_ROVERS, MAX_STORES, MAX_WAYPOINTS,
};
use crate::state::{RoverState, State};
use anyhow::{bail, ensure, Context, Result};
use fixedbitset::FixedBitSet;
use regex::Regex;
use rovers_collections::set::CompactSet;
use smallvec::smallvec;
use std::path::Path;
use std::sync::OnceLock;

/// A textual input with an optional source name for error reports.
pub struct Input {
    pub text: String,
    pub source: Option<String>,
}

impl Input {
    pub fn from_string(input: impl Into<String>) -> Input {
        Input {
            text: input.into(),
            source: None,
        }
    }

    pub fn from_file(file: &Path) -> std::result::Result<Input, std::io::Error> {
        let s = std::fs::read_to_string(file)?;
        Ok(Input {
            text: s,
            source: Some(file.display().to_string()),
        })
    }
}

impl From<&str> for Input {
    fn from(s: &str) -> Self {
        Input {
            text: s.to_string(),
            source: None,
        }
    }
}

/// Splits a line into the tokens the problem and solution formats expect:
/// whitespace separation, a leading `(` of the line becoming its own token,
/// and one trailing `)` split off each token.
pub(crate) fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut rest = line.trim();
    if let Some(stripped) = rest.strip_prefix('(') {
        tokens.push("(".to_string());
        rest = stripped;
    }
    for tok in rest.split_whitespace() {
        if let Some(body) = tok.strip_suffix(')') {
            if !body.is_empty() {
                tokens.push(body.to_string());
            }
            tokens.push(")".to_string());
        } else {
            tokens.push(tok.to_string());
        }
    }
    tokens
}

/// First integer appearing in an object name, e.g. 3 for `waypoint3`.
pub(crate) fn object_number(name: &str) -> Option<usize> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new("[0-9]+").expect("valid literal pattern"));
    re.find(name).and_then(|m| m.as_str().parse().ok())
}

/// Index of `tok` validated against the number of declared objects of that
/// kind.
pub(crate) fn indexed(tok: &str, count: usize, kind: &str, line_no: usize) -> Result<usize> {
    let i = object_number(tok).with_context(|| format!("No object index in '{tok}' (line {line_no})"))?;
    ensure!(i < count, "{kind} index {i} is out of range (line {line_no})");
    Ok(i)
}

fn tok<'a>(tokens: &'a [String], i: usize, line_no: usize) -> Result<&'a str> {
    tokens
        .get(i)
        .map(|s| s.as_str())
        .with_context(|| format!("Truncated fact (line {line_no})"))
}

#[derive(Copy, Clone, Eq, PartialEq)]
enum Section {
    Preamble,
    Objects,
    Init,
    Goal,
}

/// Parses a problem file into the static description and the initial state.
pub fn parse_problem(input: &Input) -> Result<(Problem, State)> {
    let source = input.source.as_deref().unwrap_or("<string>");

    // First pass: sections, declared objects, raw facts.
    let mut objects: Vec<(String, String)> = Vec::new();
    let mut init_facts: Vec<(usize, Vec<String>)> = Vec::new();
    let mut goal_facts: Vec<(usize, Vec<String>)> = Vec::new();
    let mut section = Section::Preamble;

    for (idx, raw) in input.text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if line.contains(":objects") {
            section = Section::Objects;
        } else if line.contains(":init") {
            section = Section::Init;
        } else if line.contains(":goal") {
            section = Section::Goal;
        } else {
            let tokens = tokenize(line);
            match section {
                Section::Objects => {
                    let mut pending: Vec<String> = Vec::new();
                    let mut it = tokens.into_iter();
                    while let Some(t) = it.next() {
                        match t.as_str() {
                            "(" | ")" => {}
                            "-" => {
                                let tpe = it
                                    .next()
                                    .with_context(|| format!("Object group without a type (line {line_no})"))?;
                                for name in pending.drain(..) {
                                    objects.push((name, tpe.clone()));
                                }
                            }
                            _ => pending.push(t),
                        }
                    }
                }
                Section::Init if tokens.first().is_some_and(|t| t.starts_with('(')) => {
                    init_facts.push((line_no, tokens));
                }
                Section::Goal if tokens.first().is_some_and(|t| t.starts_with('(')) => {
                    goal_facts.push((line_no, tokens));
                }
                _ => {}
            }
        }
    }

    let count_of = |tpe: &str| objects.iter().filter(|(_, t)| t == tpe).count();
    let n_rovers = count_of("rover");
    let n_waypoints = count_of("waypoint");
    let n_cameras = count_of("camera");
    let n_stores = count_of("store");
    let n_objectives = count_of("objective");

    ensure!(n_rovers <= MAX_ROVERS, "{source}: too many rovers ({n_rovers})");
    ensure!(n_waypoints <= MAX_WAYPOINTS, "{source}: too many waypoints ({n_waypoints})");
    ensure!(n_cameras <= MAX_CAMERAS, "{source}: too many cameras ({n_cameras})");
    ensure!(n_stores <= MAX_STORES, "{source}: too many stores ({n_stores})");
    ensure!(
        n_objectives <= MAX_OBJECTIVES,
        "{source}: too many objectives ({n_objectives})"
    );

    let first_rover = RoverId::from(0usize);
    let mut problem = Problem {
        rovers: vec![
            RoverSpec {
                available: false,
                equipped_soil: false,
                equipped_rock: false,
                equipped_imaging: false,
                traverse: vec![FixedBitSet::with_capacity(n_waypoints); n_waypoints],
            };
            n_rovers
        ],
        waypoints: vec![
            WaypointSpec {
                visible: FixedBitSet::with_capacity(n_waypoints),
                in_sun: false,
            };
            n_waypoints
        ],
        cameras: vec![
            CameraSpec {
                rover: first_rover,
                targets: CompactSet::new(),
                modes: CompactSet::new(),
            };
            n_cameras
        ],
        stores: vec![StoreSpec { rover: first_rover }; n_stores],
        objectives: vec![
            ObjectiveSpec {
                visible_from: FixedBitSet::with_capacity(n_waypoints),
            };
            n_objectives
        ],
        lander: Lander {
            pos: WaypointId::from(0usize),
            channel_free: false,
        },
        goal: Goal::default(),
    };
    let mut state = State {
        rovers: smallvec![
            RoverState {
                pos: WaypointId::from(0usize),
                energy: 0,
                soil_analyses: CompactSet::new(),
                rock_analyses: CompactSet::new(),
                images: CompactSet::new(),
            };
            n_rovers
        ],
        soil_samples: CompactSet::new(),
        rock_samples: CompactSet::new(),
        communicated_soil: CompactSet::new(),
        communicated_rock: CompactSet::new(),
        calibrated: CompactSet::new(),
        full_stores: CompactSet::new(),
        communicated_images: CompactSet::new(),
        recharges: 0,
    };

    for (line_no, tokens) in &init_facts {
        let line_no = *line_no;
        let predicate = tok(tokens, 1, line_no)?;
        match predicate {
            "visible" => {
                let w1 = indexed(tok(tokens, 2, line_no)?, n_waypoints, "waypoint", line_no)?;
                let w2 = indexed(tok(tokens, 3, line_no)?, n_waypoints, "waypoint", line_no)?;
                problem.waypoints[w1].visible.insert(w2);
            }
            "at_soil_sample" => {
                let w = indexed(tok(tokens, 2, line_no)?, n_waypoints, "waypoint", line_no)?;
                state.soil_samples.insert(WaypointId::from(w));
            }
            "at_rock_sample" => {
                let w = indexed(tok(tokens, 2, line_no)?, n_waypoints, "waypoint", line_no)?;
                state.rock_samples.insert(WaypointId::from(w));
            }
            "in_sun" => {
                let w = indexed(tok(tokens, 2, line_no)?, n_waypoints, "waypoint", line_no)?;
                problem.waypoints[w].in_sun = true;
            }
            "at_lander" => {
                let w = indexed(tok(tokens, 3, line_no)?, n_waypoints, "waypoint", line_no)?;
                problem.lander.pos = WaypointId::from(w);
            }
            "channel_free" => {
                problem.lander.channel_free = true;
            }
            "=" => {
                let fluent = tok(tokens, 2, line_no)?;
                match fluent {
                    "(recharges" => {
                        state.recharges = parse_int(tok(tokens, 4, line_no)?, line_no)?;
                    }
                    "(energy" => {
                        let r = indexed(tok(tokens, 3, line_no)?, n_rovers, "rover", line_no)?;
                        state.rovers[r].energy = parse_int(tok(tokens, 5, line_no)?, line_no)?;
                    }
                    _ => bail!("{source}: unknown fluent '{fluent}' (line {line_no})"),
                }
            }
            "in" => {
                let r = indexed(tok(tokens, 2, line_no)?, n_rovers, "rover", line_no)?;
                let w = indexed(tok(tokens, 3, line_no)?, n_waypoints, "waypoint", line_no)?;
                state.rovers[r].pos = WaypointId::from(w);
            }
            "available" => {
                let r = indexed(tok(tokens, 2, line_no)?, n_rovers, "rover", line_no)?;
                problem.rovers[r].available = true;
            }
            "can_traverse" => {
                let r = indexed(tok(tokens, 2, line_no)?, n_rovers, "rover", line_no)?;
                let w1 = indexed(tok(tokens, 3, line_no)?, n_waypoints, "waypoint", line_no)?;
                let w2 = indexed(tok(tokens, 4, line_no)?, n_waypoints, "waypoint", line_no)?;
                problem.rovers[r].traverse[w1].insert(w2);
            }
            "equipped_for_soil_analysis" => {
                let r = indexed(tok(tokens, 2, line_no)?, n_rovers, "rover", line_no)?;
                problem.rovers[r].equipped_soil = true;
            }
            "equipped_for_rock_analysis" => {
                let r = indexed(tok(tokens, 2, line_no)?, n_rovers, "rover", line_no)?;
                problem.rovers[r].equipped_rock = true;
            }
            "equipped_for_imaging" => {
                let r = indexed(tok(tokens, 2, line_no)?, n_rovers, "rover", line_no)?;
                problem.rovers[r].equipped_imaging = true;
            }
            "empty" => {
                let s = indexed(tok(tokens, 2, line_no)?, n_stores, "store", line_no)?;
                state.full_stores.remove(StoreId::from(s));
            }
            "store_of" => {
                let s = indexed(tok(tokens, 2, line_no)?, n_stores, "store", line_no)?;
                let r = indexed(tok(tokens, 3, line_no)?, n_rovers, "rover", line_no)?;
                problem.stores[s].rover = RoverId::from(r);
            }
            "calibration_target" => {
                let c = indexed(tok(tokens, 2, line_no)?, n_cameras, "camera", line_no)?;
                let o = indexed(tok(tokens, 3, line_no)?, n_objectives, "objective", line_no)?;
                problem.cameras[c].targets.insert(ObjectiveId::from(o));
            }
            "on_board" => {
                let c = indexed(tok(tokens, 2, line_no)?, n_cameras, "camera", line_no)?;
                let r = indexed(tok(tokens, 3, line_no)?, n_rovers, "rover", line_no)?;
                problem.cameras[c].rover = RoverId::from(r);
            }
            "calibrated" => {
                let c = indexed(tok(tokens, 2, line_no)?, n_cameras, "camera", line_no)?;
                state.calibrated.insert(CameraId::from(c));
            }
            "supports" => {
                let c = indexed(tok(tokens, 2, line_no)?, n_cameras, "camera", line_no)?;
                let mode: Mode = tok(tokens, 3, line_no)?
                    .parse()
                    .with_context(|| format!("{source}: line {line_no}"))?;
                problem.cameras[c].modes.insert(mode);
            }
            "visible_from" => {
                let o = indexed(tok(tokens, 2, line_no)?, n_objectives, "objective", line_no)?;
                let w = indexed(tok(tokens, 3, line_no)?, n_waypoints, "waypoint", line_no)?;
                problem.objectives[o].visible_from.insert(w);
            }
            other => bail!("{source}: unknown init predicate '{other}' (line {line_no})"),
        }
    }

    for (line_no, tokens) in &goal_facts {
        let line_no = *line_no;
        match tok(tokens, 1, line_no)? {
            "communicated_soil_data" => {
                let w = indexed(tok(tokens, 2, line_no)?, n_waypoints, "waypoint", line_no)?;
                problem.goal.soil.insert(WaypointId::from(w));
            }
            "communicated_rock_data" => {
                let w = indexed(tok(tokens, 2, line_no)?, n_waypoints, "waypoint", line_no)?;
                problem.goal.rock.insert(WaypointId::from(w));
            }
            "communicated_image_data" => {
                let o = indexed(tok(tokens, 2, line_no)?, n_objectives, "objective", line_no)?;
                let mode: Mode = tok(tokens, 3, line_no)?
                    .parse()
                    .with_context(|| format!("{source}: line {line_no}"))?;
                problem.goal.images.insert(image_bit(ObjectiveId::from(o), mode));
            }
            // The goal section may carry conjunction wrappers and similar
            // noise; only the three communication predicates matter.
            _ => {}
        }
    }

    problem.validate().with_context(|| format!("Invalid problem in {source}"))?;
    Ok((problem, state))
}

fn parse_int(tok: &str, line_no: usize) -> Result<u32> {
    tok.parse()
        .with_context(|| format!("'{tok}' is not a non-negative integer (line {line_no})"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizer_splits_like_the_file_format() {
        assert_eq!(tokenize("(visible waypoint0 waypoint1)"), ["(", "visible", "waypoint0", "waypoint1", ")"]);
        assert_eq!(
            tokenize("(= (energy rover0) 50)"),
            ["(", "=", "(energy", "rover0", ")", "50", ")"]
        );
        assert_eq!(tokenize("  rover0 rover1 - rover"), ["rover0", "rover1", "-", "rover"]);
        assert_eq!(tokenize("))"), [")", ")"]);
    }

    #[test]
    fn object_numbers() {
        assert_eq!(object_number("waypoint12"), Some(12));
        assert_eq!(object_number("camera0"), Some(0));
        assert_eq!(object_number("general"), None);
    }

    const SMALL: &str = "
(define (problem roverprob) (:domain rover)
(:objects
\trover0 - rover
\twaypoint0 waypoint1 - waypoint
\tstore0 - store
\tcamera0 - camera
\tobjective0 - objective
\tcolour high_res low_res - mode
)
(:init
\t(visible waypoint0 waypoint0)
\t(visible waypoint0 waypoint1)
\t(visible waypoint1 waypoint0)
\t(at_soil_sample waypoint1)
\t(at_rock_sample waypoint1)
\t(in_sun waypoint0)
\t(at_lander general waypoint0)
\t(channel_free general)
\t(= (recharges) 0)
\t(in rover0 waypoint0)
\t(available rover0)
\t(= (energy rover0) 50)
\t(equipped_for_soil_analysis rover0)
\t(equipped_for_rock_analysis rover0)
\t(equipped_for_imaging rover0)
\t(can_traverse rover0 waypoint0 waypoint1)
\t(can_traverse rover0 waypoint1 waypoint0)
\t(empty store0)
\t(store_of store0 rover0)
\t(calibration_target camera0 objective0)
\t(on_board camera0 rover0)
\t(supports camera0 high_res)
\t(visible_from objective0 waypoint0)
)
(:goal (and
(communicated_soil_data waypoint1)
)
)
)
";

    #[test]
    fn parses_a_small_problem() {
        let (pb, state) = parse_problem(&SMALL.into()).unwrap();
        assert_eq!(pb.rovers.len(), 1);
        assert_eq!(pb.waypoints.len(), 2);
        assert_eq!(pb.cameras.len(), 1);
        assert_eq!(pb.stores.len(), 1);
        assert_eq!(pb.objectives.len(), 1);

        let r0 = RoverId::from(0usize);
        let w0 = WaypointId::from(0usize);
        let w1 = WaypointId::from(1usize);
        assert!(pb.rovers[r0].available);
        assert!(pb.rovers[r0].equipped_soil);
        assert!(pb.rovers[r0].can_traverse(w0, w1));
        assert!(!pb.rovers[r0].can_traverse(w1, w1));
        assert!(pb.visible(w0, w1));
        assert!(pb.in_sun(w0));
        assert!(!pb.in_sun(w1));
        assert_eq!(pb.lander.pos, w0);
        assert!(pb.lander.channel_free);
        assert!(pb.cameras[0].modes.contains(Mode::HighRes));
        assert!(!pb.cameras[0].modes.contains(Mode::Colour));
        assert!(pb.goal.demands_soil(w1));
        assert!(!pb.goal.demands_soil(w0));
        assert!(pb.goal.rock.is_empty());

        assert_eq!(state.rover(r0).pos, w0);
        assert_eq!(state.rover(r0).energy, 50);
        assert!(state.soil_samples.contains(w1));
        assert!(state.rock_samples.contains(w1));
        assert_eq!(state.recharges, 0);
    }

    #[test]
    fn unknown_init_predicate_is_fatal() {
        let bad = SMALL.replace("(in_sun waypoint0)", "(weather waypoint0)");
        let err = parse_problem(&bad.as_str().into()).unwrap_err();
        assert!(err.to_string().contains("weather"), "{err:#}");
    }

    #[test]
    fn out_of_range_ids_are_fatal() {
        let bad = SMALL.replace("(at_soil_sample waypoint1)", "(at_soil_sample waypoint9)");
        assert!(parse_problem(&bad.as_str().into()).is_err());
    }

    #[test]
    fn cameras_must_support_a_mode() {
        let bad = SMALL.replace("\t(supports camera0 high_res)\n", "");
        assert!(parse_problem(&bad.as_str().into()).is_err());
    }
}
