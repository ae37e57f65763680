use crate::problem::{CameraId, Goal, ObjectiveId, Problem, RoverId, StoreId, WaypointId, MAX_MODES};
use crate::Cost;
use rovers_collections::set::CompactSet;
use smallvec::SmallVec;

/// Dynamic facts about one rover.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct RoverState {
    pub pos: WaypointId,
    pub energy: Cost,
    /// Waypoints whose soil this rover has analysed. Analyses survive
    /// dropping the physical sample.
    pub soil_analyses: CompactSet<WaypointId>,
    pub rock_analyses: CompactSet<WaypointId>,
    /// Images held on board, as flattened (objective, mode) bits
    /// (see [`crate::problem::image_bit`]).
    pub images: CompactSet<usize>,
}

/// Everything the actions can change, and nothing else.
///
/// A state is cloned wholesale on every expansion, so it is kept to a few
/// machine words per entity; the static topology lives in [`Problem`].
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct State {
    pub rovers: SmallVec<[RoverState; 4]>,
    pub soil_samples: CompactSet<WaypointId>,
    pub rock_samples: CompactSet<WaypointId>,
    pub communicated_soil: CompactSet<WaypointId>,
    pub communicated_rock: CompactSet<WaypointId>,
    pub calibrated: CompactSet<CameraId>,
    pub full_stores: CompactSet<StoreId>,
    /// Flattened (objective, mode) bits of the images already relayed to the
    /// lander.
    pub communicated_images: CompactSet<usize>,
    /// Number of recharge actions executed since the initial state.
    pub recharges: u32,
}

impl State {
    pub fn rover(&self, r: RoverId) -> &RoverState {
        &self.rovers[usize::from(r)]
    }

    pub fn rover_mut(&mut self, r: RoverId) -> &mut RoverState {
        &mut self.rovers[usize::from(r)]
    }

    /// Goal test: every demanded communication has happened.
    pub fn satisfies(&self, goal: &Goal) -> bool {
        self.communicated_soil.contains_all(goal.soil)
            && self.communicated_rock.contains_all(goal.rock)
            && self.communicated_images.contains_all(goal.images)
    }

    /// Duplicate-detection fingerprint.
    ///
    /// The exact flavour is the full dynamic state and never merges distinct
    /// states. The compact flavour reproduces the lossy layout of the
    /// original planner and is only selected through its compatibility flag.
    pub fn key(&self, pb: &Problem, compat: bool) -> StateKey {
        if compat {
            StateKey::Compact(self.compact_key(pb))
        } else {
            StateKey::Exact(self.clone())
        }
    }

    fn compact_key(&self, pb: &Problem) -> CompactKey {
        let mut any_soil_analysis = CompactSet::new();
        let mut any_rock_analysis = CompactSet::new();
        let mut positions = SmallVec::new();
        let mut energies = SmallVec::new();
        let mut images = SmallVec::new();
        for (i, r) in self.rovers.iter().enumerate() {
            positions.push(r.pos);
            energies.push(r.energy);
            images.push(r.images.raw());
            if !r.soil_analyses.is_empty() {
                any_soil_analysis.insert(RoverId::from(i));
            }
            if !r.rock_analyses.is_empty() {
                any_rock_analysis.insert(RoverId::from(i));
            }
        }
        let mut any_communicated_image = CompactSet::new();
        for obj in pb.objective_ids() {
            let modes = usize::from(obj) * MAX_MODES..(usize::from(obj) + 1) * MAX_MODES;
            if modes.clone().any(|bit| self.communicated_images.contains(bit)) {
                any_communicated_image.insert(obj);
            }
        }
        CompactKey {
            positions,
            energies,
            images,
            any_soil_analysis,
            any_rock_analysis,
            soil_samples: self.soil_samples,
            rock_samples: self.rock_samples,
            communicated_soil: self.communicated_soil,
            communicated_rock: self.communicated_rock,
            calibrated: self.calibrated,
            full_stores: self.full_stores,
            any_communicated_image,
            recharges: self.recharges,
        }
    }
}

/// Closed-set key; hashing and equality are field-by-field, derived.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum StateKey {
    Exact(State),
    Compact(CompactKey),
}

/// The original planner's flat fingerprint: per-waypoint analysis bitmaps
/// collapse to one bit per rover and per-mode image communications to one
/// bit per objective, while per-rover image bitmaps stay complete. Two
/// genuinely different states may share this key.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct CompactKey {
    positions: SmallVec<[WaypointId; 4]>,
    energies: SmallVec<[Cost; 4]>,
    images: SmallVec<[u32; 4]>,
    any_soil_analysis: CompactSet<RoverId>,
    any_rock_analysis: CompactSet<RoverId>,
    soil_samples: CompactSet<WaypointId>,
    rock_samples: CompactSet<WaypointId>,
    communicated_soil: CompactSet<WaypointId>,
    communicated_rock: CompactSet<WaypointId>,
    calibrated: CompactSet<CameraId>,
    full_stores: CompactSet<StoreId>,
    any_communicated_image: CompactSet<ObjectiveId>,
    recharges: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::tests::single_rover_problem;
    use crate::problem::{image_bit, Mode};

    fn base_state(pb: &Problem) -> State {
        State {
            rovers: smallvec::smallvec![
                RoverState {
                    pos: WaypointId::from(0usize),
                    energy: 50,
                    soil_analyses: CompactSet::new(),
                    rock_analyses: CompactSet::new(),
                    images: CompactSet::new(),
                };
                pb.rovers.len()
            ],
            soil_samples: CompactSet::new(),
            rock_samples: CompactSet::new(),
            communicated_soil: CompactSet::new(),
            communicated_rock: CompactSet::new(),
            calibrated: CompactSet::new(),
            full_stores: CompactSet::new(),
            communicated_images: CompactSet::new(),
            recharges: 0,
        }
    }

    #[test]
    fn fingerprints_are_deterministic() {
        let pb = single_rover_problem(3);
        let a = base_state(&pb);
        let b = a.clone();
        assert_eq!(a.key(&pb, false), b.key(&pb, false));
        assert_eq!(a.key(&pb, true), b.key(&pb, true));
    }

    #[test]
    fn compact_key_collapses_analysis_waypoints() {
        let pb = single_rover_problem(3);
        let mut a = base_state(&pb);
        let mut b = base_state(&pb);
        a.rover_mut(RoverId::from(0usize))
            .soil_analyses
            .insert(WaypointId::from(1usize));
        b.rover_mut(RoverId::from(0usize))
            .soil_analyses
            .insert(WaypointId::from(2usize));
        // Different waypoints analysed: distinct states, yet the compact key
        // only remembers that some analysis is held.
        assert_ne!(a.key(&pb, false), b.key(&pb, false));
        assert_eq!(a.key(&pb, true), b.key(&pb, true));
    }

    #[test]
    fn compact_key_collapses_communicated_modes() {
        let pb = single_rover_problem(3);
        let obj = ObjectiveId::from(0usize);
        let mut a = base_state(&pb);
        let mut b = base_state(&pb);
        a.communicated_images.insert(image_bit(obj, Mode::Colour));
        b.communicated_images.insert(image_bit(obj, Mode::HighRes));
        assert_ne!(a.key(&pb, false), b.key(&pb, false));
        assert_eq!(a.key(&pb, true), b.key(&pb, true));
    }

    #[test]
    fn compact_key_keeps_rover_images() {
        let pb = single_rover_problem(3);
        let obj = ObjectiveId::from(0usize);
        let mut a = base_state(&pb);
        let mut b = base_state(&pb);
        a.rover_mut(RoverId::from(0usize)).images.insert(image_bit(obj, Mode::Colour));
        b.rover_mut(RoverId::from(0usize)).images.insert(image_bit(obj, Mode::HighRes));
        // On-board images are kept in full even by the compact key.
        assert_ne!(a.key(&pb, true), b.key(&pb, true));
    }

    #[test]
    fn goal_test_is_subset_inclusion() {
        let pb = single_rover_problem(3);
        let mut goal = Goal::default();
        goal.soil.insert(WaypointId::from(1usize));
        let mut s = base_state(&pb);
        assert!(!s.satisfies(&goal));
        s.communicated_soil.insert(WaypointId::from(1usize));
        assert!(s.satisfies(&goal));
        // Extra communications never hurt.
        s.communicated_rock.insert(WaypointId::from(2usize));
        assert!(s.satisfies(&goal));
    }
}
