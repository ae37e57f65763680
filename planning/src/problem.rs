use anyhow::{bail, ensure, Result};
use fixedbitset::FixedBitSet;
use rovers_collections::create_ref_type;
use rovers_collections::set::CompactSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use tracing::warn;

create_ref_type!(RoverId);
create_ref_type!(WaypointId);
create_ref_type!(CameraId);
create_ref_type!(StoreId);
create_ref_type!(ObjectiveId);

// Bounds on the number of objects of each type a problem may declare.
pub const MAX_ROVERS: usize = 10;
pub const MAX_WAYPOINTS: usize = 30;
pub const MAX_CAMERAS: usize = 10;
pub const MAX_STORES: usize = 10;
pub const MAX_OBJECTIVES: usize = 10;
pub const MAX_MODES: usize = 3;

/// Imaging modality of a camera.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Mode {
    Colour = 0,
    HighRes = 1,
    LowRes = 2,
}

impl Mode {
    pub const ALL: [Mode; MAX_MODES] = [Mode::Colour, Mode::HighRes, Mode::LowRes];

    pub fn name(self) -> &'static str {
        match self {
            Mode::Colour => "colour",
            Mode::HighRes => "high_res",
            Mode::LowRes => "low_res",
        }
    }
}

impl From<Mode> for usize {
    fn from(m: Mode) -> usize {
        m as usize
    }
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "colour" => Ok(Mode::Colour),
            "high_res" => Ok(Mode::HighRes),
            "low_res" => Ok(Mode::LowRes),
            _ => bail!("Unknown camera mode: {s}"),
        }
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Bit index of an (objective, mode) pair in the flattened image bitmaps
/// shared by goals, rover images and communicated images.
pub fn image_bit(obj: ObjectiveId, mode: Mode) -> usize {
    usize::from(obj) * MAX_MODES + mode as usize
}

/// Static description of one rover: equipment and driving capabilities.
#[derive(Clone, Debug)]
pub struct RoverSpec {
    pub available: bool,
    pub equipped_soil: bool,
    pub equipped_rock: bool,
    pub equipped_imaging: bool,
    /// Traversable edges: `traverse[from]` is the set of destinations this
    /// rover may drive to. Not necessarily symmetric.
    pub traverse: Vec<FixedBitSet>,
}

impl RoverSpec {
    pub fn can_traverse(&self, from: WaypointId, to: WaypointId) -> bool {
        self.traverse[from].contains(usize::from(to))
    }
}

#[derive(Clone, Debug)]
pub struct WaypointSpec {
    /// Directed line-of-sight towards other waypoints.
    pub visible: FixedBitSet,
    pub in_sun: bool,
}

#[derive(Clone, Debug)]
pub struct CameraSpec {
    pub rover: RoverId,
    /// Objectives this camera may be calibrated against.
    pub targets: CompactSet<ObjectiveId>,
    pub modes: CompactSet<Mode>,
}

#[derive(Clone, Debug)]
pub struct StoreSpec {
    pub rover: RoverId,
}

#[derive(Clone, Debug)]
pub struct ObjectiveSpec {
    /// Waypoints from which this objective can be imaged or sighted.
    pub visible_from: FixedBitSet,
}

#[derive(Clone, Debug)]
pub struct Lander {
    pub pos: WaypointId,
    /// Read by the communication actions but never toggled: the channel is
    /// effectively always free in this variant.
    pub channel_free: bool,
}

/// The communication goals of a problem. Immutable after load.
#[derive(Clone, Debug, Default)]
pub struct Goal {
    pub soil: CompactSet<WaypointId>,
    pub rock: CompactSet<WaypointId>,
    /// Flattened (objective, mode) bits, see [`image_bit`].
    pub images: CompactSet<usize>,
}

impl Goal {
    pub fn demands_soil(&self, w: WaypointId) -> bool {
        self.soil.contains(w)
    }

    pub fn demands_rock(&self, w: WaypointId) -> bool {
        self.rock.contains(w)
    }

    pub fn demands_image(&self, obj: ObjectiveId, mode: Mode) -> bool {
        self.images.contains(image_bit(obj, mode))
    }

    pub fn is_empty(&self) -> bool {
        self.soil.is_empty() && self.rock.is_empty() && self.images.is_empty()
    }
}

/// Immutable description of a problem instance: every fact no action can
/// change, plus the goal. The search only ever reads it.
#[derive(Clone, Debug)]
pub struct Problem {
    pub rovers: Vec<RoverSpec>,
    pub waypoints: Vec<WaypointSpec>,
    pub cameras: Vec<CameraSpec>,
    pub stores: Vec<StoreSpec>,
    pub objectives: Vec<ObjectiveSpec>,
    pub lander: Lander,
    pub goal: Goal,
}

impl Problem {
    pub fn rover_ids(&self) -> impl Iterator<Item = RoverId> {
        (0..self.rovers.len()).map(RoverId::from)
    }

    pub fn waypoint_ids(&self) -> impl Iterator<Item = WaypointId> {
        (0..self.waypoints.len()).map(WaypointId::from)
    }

    pub fn camera_ids(&self) -> impl Iterator<Item = CameraId> {
        (0..self.cameras.len()).map(CameraId::from)
    }

    pub fn store_ids(&self) -> impl Iterator<Item = StoreId> {
        (0..self.stores.len()).map(StoreId::from)
    }

    pub fn objective_ids(&self) -> impl Iterator<Item = ObjectiveId> {
        (0..self.objectives.len()).map(ObjectiveId::from)
    }

    pub fn visible(&self, from: WaypointId, to: WaypointId) -> bool {
        self.waypoints[from].visible.contains(usize::from(to))
    }

    /// Whether a rover standing on `w` has line-of-sight to the lander.
    pub fn sees_lander(&self, w: WaypointId) -> bool {
        self.visible(w, self.lander.pos)
    }

    pub fn in_sun(&self, w: WaypointId) -> bool {
        self.waypoints[w].in_sun
    }

    /// Consistency checks on the static description, mirroring what a
    /// malformed hand-written problem file is most likely to get wrong.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            (1..=MAX_ROVERS).contains(&self.rovers.len()),
            "Invalid number of rovers: {}",
            self.rovers.len()
        );
        ensure!(
            (1..=MAX_WAYPOINTS).contains(&self.waypoints.len()),
            "Invalid number of waypoints: {}",
            self.waypoints.len()
        );
        ensure!(self.cameras.len() <= MAX_CAMERAS, "Too many cameras: {}", self.cameras.len());
        ensure!(self.stores.len() <= MAX_STORES, "Too many stores: {}", self.stores.len());
        ensure!(
            (1..=MAX_OBJECTIVES).contains(&self.objectives.len()),
            "Invalid number of objectives: {}",
            self.objectives.len()
        );

        for (r, spec) in self.rovers.iter().enumerate() {
            for from in self.waypoint_ids() {
                for to in spec.traverse[from].ones() {
                    ensure!(
                        self.waypoints[from].visible.contains(to),
                        "Rover {r} can traverse from waypoint {} to {to}, but they are not visible to each other",
                        usize::from(from),
                    );
                }
            }
        }

        for (w, spec) in self.waypoints.iter().enumerate() {
            if spec.visible.is_clear() {
                warn!("waypoint {w} has no visible waypoints");
            }
        }

        for (c, cam) in self.cameras.iter().enumerate() {
            ensure!(!cam.targets.is_empty(), "Camera {c} has no calibration targets");
            ensure!(!cam.modes.is_empty(), "Camera {c} does not support any mode");
        }

        for (o, obj) in self.objectives.iter().enumerate() {
            ensure!(
                !obj.visible_from.is_clear(),
                "Objective {o} is not visible from any waypoint"
            );
        }

        if self.goal.is_empty() {
            warn!("no goal conditions found");
        }

        Ok(())
    }
}
