use crate::actions::NAVIGATE_COST;
use crate::problem::{Problem, RoverId, WaypointId};
use crate::{Cost, INFINITE};

/// All-pairs minimum traversal energy, one matrix per rover, computed once
/// when the search starts and immutable afterwards.
///
/// An edge exists when the destination is visible from the source and the
/// rover is allowed to drive the pair; every edge costs one navigation.
pub struct TravelMatrix {
    n: usize,
    /// `dist[rover][from][to]`, flattened row-major.
    dist: Vec<Cost>,
}

impl TravelMatrix {
    pub fn compute(pb: &Problem) -> TravelMatrix {
        let n = pb.waypoints.len();
        let mut dist = vec![INFINITE; pb.rovers.len() * n * n];
        for (r, spec) in pb.rovers.iter().enumerate() {
            let m = &mut dist[r * n * n..(r + 1) * n * n];
            for i in 0..n {
                for j in 0..n {
                    m[i * n + j] = if i == j {
                        0
                    } else if spec.traverse[i].contains(j) && pb.waypoints[i].visible.contains(j) {
                        NAVIGATE_COST
                    } else {
                        INFINITE
                    };
                }
            }
            // Floyd-Warshall relaxation.
            for k in 0..n {
                for i in 0..n {
                    let ik = m[i * n + k];
                    if ik == INFINITE {
                        continue;
                    }
                    for j in 0..n {
                        let kj = m[k * n + j];
                        if kj == INFINITE {
                            continue;
                        }
                        let through_k = ik + kj;
                        if through_k < m[i * n + j] {
                            m[i * n + j] = through_k;
                        }
                    }
                }
            }
        }
        TravelMatrix { n, dist }
    }

    pub fn dist(&self, r: RoverId, from: WaypointId, to: WaypointId) -> Cost {
        self.dist[usize::from(r) * self.n * self.n + usize::from(from) * self.n + usize::from(to)]
    }

    /// Nearest waypoint (for `r`, starting at `from`) with line-of-sight to
    /// the lander, and the travel cost to it. A waypoint that sees the
    /// lander is its own communication point at distance zero.
    pub fn nearest_comm_point(&self, pb: &Problem, r: RoverId, from: WaypointId) -> Option<(WaypointId, Cost)> {
        if pb.sees_lander(from) {
            return Some((from, 0));
        }
        let mut best = None;
        let mut best_dist = INFINITE;
        for wp in pb.waypoint_ids() {
            if !pb.sees_lander(wp) {
                continue;
            }
            let d = self.dist(r, from, wp);
            if d < best_dist {
                best_dist = d;
                best = Some((wp, d));
            }
        }
        best
    }

    /// Travel cost to the nearest in-sun waypoint, or `INFINITE` when no
    /// recharge spot is reachable.
    pub fn nearest_sun_cost(&self, pb: &Problem, r: RoverId, from: WaypointId) -> Cost {
        let mut best = INFINITE;
        for wp in pb.waypoint_ids() {
            if pb.in_sun(wp) {
                let d = self.dist(r, from, wp);
                if d < best {
                    best = d;
                }
            }
        }
        best
    }
}
