use crate::problem::{image_bit, CameraId, Mode, ObjectiveId, Problem, RoverId, StoreId, WaypointId};
use crate::state::State;
use crate::Cost;
use itertools::Itertools;
use std::fmt::{Display, Formatter};

// Energy spent by each action.
pub const NAVIGATE_COST: Cost = 8;
pub const SAMPLE_SOIL_COST: Cost = 3;
pub const SAMPLE_ROCK_COST: Cost = 5;
pub const CALIBRATE_COST: Cost = 2;
pub const TAKE_IMAGE_COST: Cost = 1;
pub const COMMUNICATE_DATA_COST: Cost = 4;
pub const COMMUNICATE_IMAGE_COST: Cost = 6;

/// Energy gained by one recharge.
pub const RECHARGE_GAIN: Cost = 20;
/// Recharging is only allowed below this level, i.e. once the rover can no
/// longer afford a move.
pub const RECHARGE_THRESHOLD: Cost = NAVIGATE_COST;

/// A grounded action instance.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Action {
    Navigate {
        rover: RoverId,
        from: WaypointId,
        to: WaypointId,
    },
    Recharge {
        rover: RoverId,
        at: WaypointId,
    },
    SampleSoil {
        rover: RoverId,
        store: StoreId,
        at: WaypointId,
    },
    SampleRock {
        rover: RoverId,
        store: StoreId,
        at: WaypointId,
    },
    Drop {
        rover: RoverId,
        store: StoreId,
    },
    Calibrate {
        rover: RoverId,
        camera: CameraId,
        objective: ObjectiveId,
        at: WaypointId,
    },
    TakeImage {
        rover: RoverId,
        at: WaypointId,
        objective: ObjectiveId,
        camera: CameraId,
        mode: Mode,
    },
    CommunicateSoil {
        rover: RoverId,
        /// Waypoint the analysed sample came from.
        sample: WaypointId,
        /// Waypoint the rover transmits from.
        from: WaypointId,
        lander: WaypointId,
    },
    CommunicateRock {
        rover: RoverId,
        sample: WaypointId,
        from: WaypointId,
        lander: WaypointId,
    },
    CommunicateImage {
        rover: RoverId,
        objective: ObjectiveId,
        mode: Mode,
        from: WaypointId,
        lander: WaypointId,
    },
}

impl Action {
    pub fn name(self) -> &'static str {
        match self {
            Action::Navigate { .. } => "navigate",
            Action::Recharge { .. } => "recharge",
            Action::SampleSoil { .. } => "sample_soil",
            Action::SampleRock { .. } => "sample_rock",
            Action::Drop { .. } => "drop",
            Action::Calibrate { .. } => "calibrate",
            Action::TakeImage { .. } => "take_image",
            Action::CommunicateSoil { .. } => "communicate_soil_data",
            Action::CommunicateRock { .. } => "communicate_rock_data",
            Action::CommunicateImage { .. } => "communicate_image_data",
        }
    }

    pub fn rover(self) -> RoverId {
        match self {
            Action::Navigate { rover, .. }
            | Action::Recharge { rover, .. }
            | Action::SampleSoil { rover, .. }
            | Action::SampleRock { rover, .. }
            | Action::Drop { rover, .. }
            | Action::Calibrate { rover, .. }
            | Action::TakeImage { rover, .. }
            | Action::CommunicateSoil { rover, .. }
            | Action::CommunicateRock { rover, .. }
            | Action::CommunicateImage { rover, .. } => rover,
        }
    }

    /// Parameter tokens in problem-file vocabulary. The communication
    /// actions carry the trailing `general` lander token.
    pub fn param_tokens(self) -> Vec<String> {
        fn rover(r: RoverId) -> String {
            format!("rover{}", r.to_u32())
        }
        fn wp(w: WaypointId) -> String {
            format!("waypoint{}", w.to_u32())
        }
        fn store(s: StoreId) -> String {
            format!("store{}", s.to_u32())
        }
        fn cam(c: CameraId) -> String {
            format!("camera{}", c.to_u32())
        }
        fn obj(o: ObjectiveId) -> String {
            format!("objective{}", o.to_u32())
        }
        match self {
            Action::Navigate { rover: r, from, to } => vec![rover(r), wp(from), wp(to)],
            Action::Recharge { rover: r, at } => vec![rover(r), wp(at)],
            Action::SampleSoil { rover: r, store: s, at } | Action::SampleRock { rover: r, store: s, at } => {
                vec![rover(r), store(s), wp(at)]
            }
            Action::Drop { rover: r, store: s } => vec![rover(r), store(s)],
            Action::Calibrate {
                rover: r,
                camera,
                objective,
                at,
            } => vec![rover(r), cam(camera), obj(objective), wp(at)],
            Action::TakeImage {
                rover: r,
                at,
                objective,
                camera,
                mode,
            } => vec![rover(r), wp(at), obj(objective), cam(camera), mode.name().to_string()],
            Action::CommunicateSoil {
                rover: r,
                sample,
                from,
                lander,
            }
            | Action::CommunicateRock {
                rover: r,
                sample,
                from,
                lander,
            } => vec![rover(r), wp(sample), wp(from), wp(lander), "general".to_string()],
            Action::CommunicateImage {
                rover: r,
                objective,
                mode,
                from,
                lander,
            } => vec![
                rover(r),
                obj(objective),
                mode.name().to_string(),
                wp(from),
                wp(lander),
                "general".to_string(),
            ],
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "( {} {} )", self.name(), self.param_tokens().iter().format(" "))
    }
}

/// Applies `action` to `state`, returning the successor and the energy spent,
/// or `None` when some precondition does not hold. Rejection is the
/// expander's normal signal to skip a candidate, not an error.
///
/// Every action leaves `state` untouched and requires the acting rover to
/// hold at least the action's energy cost. The recharge gains energy and is
/// the only action reporting an energy expense of zero.
pub fn apply(pb: &Problem, state: &State, action: Action) -> Option<(State, Cost)> {
    let mut next = state.clone();

    let spent = match action {
        Action::Navigate { rover, from, to } => {
            let r = state.rover(rover);
            let spec = &pb.rovers[rover];
            if !spec.available {
                return None;
            }
            if r.energy < NAVIGATE_COST {
                return None;
            }
            if !pb.visible(from, to) {
                return None;
            }
            if !spec.can_traverse(from, to) {
                return None;
            }
            if r.pos != from {
                return None;
            }
            if from == to {
                return None;
            }

            let r = next.rover_mut(rover);
            r.pos = to;
            r.energy -= NAVIGATE_COST;
            NAVIGATE_COST
        }
        Action::Recharge { rover, at } => {
            if !pb.in_sun(at) {
                return None;
            }
            let r = state.rover(rover);
            if r.pos != at {
                return None;
            }
            if r.energy >= RECHARGE_THRESHOLD {
                return None;
            }

            next.rover_mut(rover).energy += RECHARGE_GAIN;
            next.recharges += 1;
            0
        }
        Action::SampleSoil { rover, store, at } => {
            let r = state.rover(rover);
            if r.pos != at {
                return None;
            }
            if r.energy < SAMPLE_SOIL_COST {
                return None;
            }
            if !state.soil_samples.contains(at) {
                return None;
            }
            if !pb.rovers[rover].equipped_soil {
                return None;
            }
            if pb.stores[store].rover != rover {
                return None;
            }
            if state.full_stores.contains(store) {
                return None;
            }
            // Sampling is only legal while the goal still wants this datum.
            if !pb.goal.demands_soil(at) {
                return None;
            }
            if state.communicated_soil.contains(at) {
                return None;
            }

            next.full_stores.insert(store);
            let r = next.rover_mut(rover);
            r.energy -= SAMPLE_SOIL_COST;
            r.soil_analyses.insert(at);
            next.soil_samples.remove(at);
            SAMPLE_SOIL_COST
        }
        Action::SampleRock { rover, store, at } => {
            let r = state.rover(rover);
            if r.pos != at {
                return None;
            }
            if r.energy < SAMPLE_ROCK_COST {
                return None;
            }
            if !state.rock_samples.contains(at) {
                return None;
            }
            if !pb.rovers[rover].equipped_rock {
                return None;
            }
            if pb.stores[store].rover != rover {
                return None;
            }
            if state.full_stores.contains(store) {
                return None;
            }
            if !pb.goal.demands_rock(at) {
                return None;
            }
            if state.communicated_rock.contains(at) {
                return None;
            }

            next.full_stores.insert(store);
            let r = next.rover_mut(rover);
            r.energy -= SAMPLE_ROCK_COST;
            r.rock_analyses.insert(at);
            next.rock_samples.remove(at);
            SAMPLE_ROCK_COST
        }
        Action::Drop { rover, store } => {
            if pb.stores[store].rover != rover {
                return None;
            }
            if !state.full_stores.contains(store) {
                return None;
            }

            // The sample is discarded; the analysis stays on the rover.
            next.full_stores.remove(store);
            0
        }
        Action::Calibrate {
            rover,
            camera,
            objective,
            at,
        } => {
            let r = state.rover(rover);
            if !pb.rovers[rover].equipped_imaging {
                return None;
            }
            if r.energy < CALIBRATE_COST {
                return None;
            }
            if !pb.cameras[camera].targets.contains(objective) {
                return None;
            }
            if r.pos != at {
                return None;
            }
            if !pb.objectives[objective].visible_from.contains(usize::from(at)) {
                return None;
            }
            if pb.cameras[camera].rover != rover {
                return None;
            }

            next.rover_mut(rover).energy -= CALIBRATE_COST;
            next.calibrated.insert(camera);
            CALIBRATE_COST
        }
        Action::TakeImage {
            rover,
            at,
            objective,
            camera,
            mode,
        } => {
            let r = state.rover(rover);
            if !state.calibrated.contains(camera) {
                return None;
            }
            if pb.cameras[camera].rover != rover {
                return None;
            }
            if !pb.rovers[rover].equipped_imaging {
                return None;
            }
            if !pb.cameras[camera].modes.contains(mode) {
                return None;
            }
            if !pb.objectives[objective].visible_from.contains(usize::from(at)) {
                return None;
            }
            if r.pos != at {
                return None;
            }
            if r.energy < TAKE_IMAGE_COST {
                return None;
            }
            if !pb.goal.demands_image(objective, mode) {
                return None;
            }
            if state.communicated_images.contains(image_bit(objective, mode)) {
                return None;
            }

            let r = next.rover_mut(rover);
            r.images.insert(image_bit(objective, mode));
            r.energy -= TAKE_IMAGE_COST;
            // A shot consumes the calibration.
            next.calibrated.remove(camera);
            TAKE_IMAGE_COST
        }
        Action::CommunicateSoil {
            rover,
            sample,
            from,
            lander,
        } => {
            let r = state.rover(rover);
            if r.pos != from {
                return None;
            }
            if pb.lander.pos != lander {
                return None;
            }
            if !r.soil_analyses.contains(sample) {
                return None;
            }
            if !pb.visible(from, lander) {
                return None;
            }
            if !pb.rovers[rover].available {
                return None;
            }
            if !pb.lander.channel_free {
                return None;
            }
            if r.energy < COMMUNICATE_DATA_COST {
                return None;
            }
            if !pb.goal.demands_soil(sample) {
                return None;
            }
            if state.communicated_soil.contains(sample) {
                return None;
            }

            next.communicated_soil.insert(sample);
            next.rover_mut(rover).energy -= COMMUNICATE_DATA_COST;
            COMMUNICATE_DATA_COST
        }
        Action::CommunicateRock {
            rover,
            sample,
            from,
            lander,
        } => {
            let r = state.rover(rover);
            if r.pos != from {
                return None;
            }
            if pb.lander.pos != lander {
                return None;
            }
            if !r.rock_analyses.contains(sample) {
                return None;
            }
            if !pb.visible(from, lander) {
                return None;
            }
            if !pb.rovers[rover].available {
                return None;
            }
            if !pb.lander.channel_free {
                return None;
            }
            if r.energy < COMMUNICATE_DATA_COST {
                return None;
            }
            if !pb.goal.demands_rock(sample) {
                return None;
            }
            if state.communicated_rock.contains(sample) {
                return None;
            }

            next.communicated_rock.insert(sample);
            next.rover_mut(rover).energy -= COMMUNICATE_DATA_COST;
            COMMUNICATE_DATA_COST
        }
        Action::CommunicateImage {
            rover,
            objective,
            mode,
            from,
            lander,
        } => {
            let r = state.rover(rover);
            if r.pos != from {
                return None;
            }
            if pb.lander.pos != lander {
                return None;
            }
            if !r.images.contains(image_bit(objective, mode)) {
                return None;
            }
            if !pb.visible(from, lander) {
                return None;
            }
            if !pb.rovers[rover].available {
                return None;
            }
            if !pb.lander.channel_free {
                return None;
            }
            if r.energy < COMMUNICATE_IMAGE_COST {
                return None;
            }
            if !pb.goal.demands_image(objective, mode) {
                return None;
            }
            if state.communicated_images.contains(image_bit(objective, mode)) {
                return None;
            }

            next.communicated_images.insert(image_bit(objective, mode));
            next.rover_mut(rover).energy -= COMMUNICATE_IMAGE_COST;
            COMMUNICATE_IMAGE_COST
        }
    };

    Some((next, spent))
}
