use std::fmt::Display;

use hashbrown::HashMap;
use itertools::Itertools;
use serde::Deserialize;
use typed_builder::TypedBuilder;

use dualink_core::agent::AgentId;
use dualink_core::bucket::TimeMS;
use dualink_core::model::{Model, ModelSettings};

#[derive(Deserialize, Clone, Copy, Debug, Default, TypedBuilder)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn distance_to(&self, other: &Point2D) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// 3D distance between two points with their antenna heights.
    pub fn distance_3d(&self, self_height: f64, other: &Point2D, other_height: f64) -> f64 {
        let planar = self.distance_to(other);
        (planar.powi(2) + (self_height - other_height).powi(2)).sqrt()
    }
}

#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LaneId(u32);

impl Display for LaneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for LaneId {
    fn from(f: u32) -> Self {
        Self(f)
    }
}

impl LaneId {
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

/// A straight closed-loop lane segment. Vehicles travel from start towards end
/// and wrap back to the start when they reach it.
#[derive(Deserialize, Clone, Copy, Debug)]
pub struct LaneSpec {
    pub id: LaneId,
    pub start: Point2D,
    pub end: Point2D,
    pub max_speed_mps: f64,
}

impl LaneSpec {
    pub fn length_m(&self) -> f64 {
        self.start.distance_to(&self.end).max(1.0)
    }

    /// Position of a vehicle at the given offset along the lane.
    pub fn point_at(&self, offset_m: f64) -> Point2D {
        let length = self.length_m();
        let t = offset_m.rem_euclid(length) / length;
        Point2D {
            x: self.start.x + (self.end.x - self.start.x) * t,
            y: self.start.y + (self.end.y - self.start.y) * t,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignalPhase {
    Green,
    Red,
}

/// A traffic signal with a fixed-cycle phase plan, placed at a stop line
/// along one lane.
#[derive(Deserialize, Clone, Copy, Debug)]
pub struct SignalSpec {
    pub lane: LaneId,
    pub stop_line_m: f64,
    pub green_ms: u64,
    pub red_ms: u64,
    #[serde(default)]
    pub offset_ms: u64,
}

impl SignalSpec {
    pub fn phase_at(&self, now: TimeMS) -> SignalPhase {
        let cycle = (self.green_ms + self.red_ms).max(1);
        let into_cycle = (now.as_u64() + self.offset_ms) % cycle;
        if into_cycle < self.green_ms {
            SignalPhase::Green
        } else {
            SignalPhase::Red
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct MobilitySettings {
    pub max_speed_mps: f64,
    pub max_accel_mps2: f64,
    pub max_decel_mps2: f64,
    pub min_gap_m: f64,
    pub closing_gain_s: f64,
    pub stop_zone_m: f64,
    pub intersection_zone_m: f64,
    pub lanes: Vec<LaneSpec>,
    #[serde(default)]
    pub signals: Vec<SignalSpec>,
}

impl ModelSettings for MobilitySettings {}

/// The dynamic road state of one vehicle. The 2D position is derived from the
/// lane geometry and the offset along it.
#[derive(Clone, Copy, Debug, Default, TypedBuilder)]
pub struct Kinematics {
    pub lane: LaneId,
    pub offset_m: f64,
    #[builder(default)]
    pub speed_mps: f64,
    #[builder(default)]
    pub stopped: bool,
}

/// Advances vehicle kinematics with bounded acceleration, signal stops and a
/// simplified car-following rule.
#[derive(Clone, Debug)]
pub struct RoadNetwork {
    settings: MobilitySettings,
    lanes: HashMap<LaneId, LaneSpec>,
}

impl Model for RoadNetwork {
    type Settings = MobilitySettings;

    fn with_settings(settings: &MobilitySettings) -> Self {
        let lanes = settings
            .lanes
            .iter()
            .map(|lane| (lane.id, *lane))
            .collect::<HashMap<_, _>>();
        if lanes.is_empty() {
            log::error!("No lanes configured.");
            panic!("Mobility settings must define at least one lane.");
        }
        Self {
            settings: settings.clone(),
            lanes,
        }
    }
}

impl RoadNetwork {
    pub fn settings(&self) -> &MobilitySettings {
        &self.settings
    }

    pub fn lane(&self, lane_id: LaneId) -> Option<&LaneSpec> {
        self.lanes.get(&lane_id)
    }

    pub fn position_of(&self, kinematics: &Kinematics) -> Point2D {
        match self.lanes.get(&kinematics.lane) {
            Some(lane) => lane.point_at(kinematics.offset_m),
            None => Point2D::default(),
        }
    }

    /// True when the vehicle is within the intersection zone of a signal stop
    /// line on its lane. Handover margins are relaxed in this zone.
    pub fn near_intersection(&self, kinematics: &Kinematics) -> bool {
        self.settings
            .signals
            .iter()
            .filter(|signal| signal.lane == kinematics.lane)
            .any(|signal| {
                (signal.stop_line_m - kinematics.offset_m).abs()
                    <= self.settings.intersection_zone_m
            })
    }

    /// True when a red signal lies ahead of the vehicle within its stop zone.
    pub fn should_stop(&self, kinematics: &Kinematics, now: TimeMS) -> bool {
        self.settings
            .signals
            .iter()
            .filter(|signal| signal.lane == kinematics.lane)
            .filter(|signal| signal.phase_at(now) == SignalPhase::Red)
            .any(|signal| {
                let gap = signal.stop_line_m - kinematics.offset_m;
                gap >= 0.0 && gap <= self.settings.stop_zone_m
            })
    }

    /// Signal phase relevant for the vehicle, if its lane carries a signal.
    pub fn signal_phase_for(&self, kinematics: &Kinematics, now: TimeMS) -> Option<SignalPhase> {
        self.settings
            .signals
            .iter()
            .find(|signal| signal.lane == kinematics.lane)
            .map(|signal| signal.phase_at(now))
    }

    /// Advance all vehicles by one step. Vehicles on the same lane see each
    /// other through the car-following rule; the leader of a lane wraps around
    /// and follows the lane's rearmost vehicle.
    pub fn advance_all(
        &self,
        kinematics: &mut HashMap<AgentId, Kinematics>,
        now: TimeMS,
        step_size: TimeMS,
    ) {
        let dt = step_size.as_secs();
        if dt <= 0.0 {
            return;
        }
        let snapshot: HashMap<AgentId, Kinematics> = kinematics.clone();
        let by_lane = snapshot
            .iter()
            .map(|(id, kin)| (kin.lane, (*id, *kin)))
            .into_group_map();

        for (_, mut members) in by_lane {
            members.sort_by(|a, b| {
                a.1.offset_m
                    .partial_cmp(&b.1.offset_m)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            for (position, (agent_id, _)) in members.iter().enumerate() {
                let ahead = if members.len() > 1 {
                    Some(members[(position + 1) % members.len()].1)
                } else {
                    None
                };
                if let Some(kin) = kinematics.get_mut(agent_id) {
                    self.advance_one(kin, ahead.as_ref(), now, dt);
                }
            }
        }
    }

    fn advance_one(
        &self,
        kinematics: &mut Kinematics,
        ahead: Option<&Kinematics>,
        now: TimeMS,
        dt: f64,
    ) {
        let lane = match self.lanes.get(&kinematics.lane) {
            Some(lane) => *lane,
            None => return,
        };
        let lane_length = lane.length_m();
        let mut accel = self.settings.max_accel_mps2;

        if self.should_stop(kinematics, now) {
            accel = -self.settings.max_decel_mps2;
        } else if let Some(leader) = ahead {
            let gap = (leader.offset_m - kinematics.offset_m).rem_euclid(lane_length);
            let closing = (kinematics.speed_mps - leader.speed_mps).max(0.0);
            let safety_distance = self.settings.min_gap_m + self.settings.closing_gain_s * closing;
            if gap < safety_distance {
                accel = -self.settings.max_decel_mps2;
            }
        }

        let speed_limit = self.settings.max_speed_mps.min(lane.max_speed_mps);
        let old_speed = kinematics.speed_mps;
        let mut new_speed = (old_speed + accel * dt).clamp(0.0, speed_limit);
        if new_speed < 1e-3 {
            new_speed = 0.0;
        }

        // Trapezoidal integration keeps the trace smooth across accel changes.
        kinematics.offset_m =
            (kinematics.offset_m + (old_speed + new_speed) * 0.5 * dt).rem_euclid(lane_length);
        kinematics.speed_mps = new_speed;
        kinematics.stopped = new_speed == 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_settings() -> MobilitySettings {
        MobilitySettings {
            max_speed_mps: 14.0,
            max_accel_mps2: 2.5,
            max_decel_mps2: 3.5,
            min_gap_m: 5.0,
            closing_gain_s: 1.5,
            stop_zone_m: 30.0,
            intersection_zone_m: 40.0,
            lanes: vec![LaneSpec {
                id: LaneId::from(1),
                start: Point2D { x: 0.0, y: 0.0 },
                end: Point2D { x: 1000.0, y: 0.0 },
                max_speed_mps: 14.0,
            }],
            signals: vec![SignalSpec {
                lane: LaneId::from(1),
                stop_line_m: 500.0,
                green_ms: 30_000,
                red_ms: 30_000,
                offset_ms: 0,
            }],
        }
    }

    #[test]
    fn speed_never_exceeds_maximum() {
        let network = RoadNetwork::with_settings(&test_settings());
        let mut kinematics = HashMap::new();
        kinematics.insert(
            AgentId::from(1),
            Kinematics::builder()
                .lane(LaneId::from(1))
                .offset_m(0.0)
                .speed_mps(0.0)
                .build(),
        );
        let mut now = TimeMS::from(0u64);
        let dt = TimeMS::from(1000u64);
        for _ in 0..60 {
            network.advance_all(&mut kinematics, now, dt);
            now += dt;
            let kin = kinematics[&AgentId::from(1)];
            assert!(kin.speed_mps <= 14.0 + 1e-9);
        }
    }

    #[test]
    fn red_signal_stops_approaching_vehicle() {
        let network = RoadNetwork::with_settings(&test_settings());
        // Red phase starts at 30s; place the vehicle just before the stop line.
        let kin = Kinematics::builder()
            .lane(LaneId::from(1))
            .offset_m(480.0)
            .speed_mps(10.0)
            .build();
        assert!(network.should_stop(&kin, TimeMS::from(31_000u64)));
        assert!(!network.should_stop(&kin, TimeMS::from(1_000u64)));
    }

    #[test]
    fn stopped_vehicle_has_zero_velocity() {
        let network = RoadNetwork::with_settings(&test_settings());
        let mut kinematics = HashMap::new();
        kinematics.insert(
            AgentId::from(1),
            Kinematics::builder()
                .lane(LaneId::from(1))
                .offset_m(495.0)
                .speed_mps(3.0)
                .build(),
        );
        // Hold during the red phase until the vehicle decelerates to rest.
        let dt = TimeMS::from(1000u64);
        for i in 0..10u64 {
            network.advance_all(&mut kinematics, TimeMS::from(31_000 + i * 1000), dt);
        }
        let kin = kinematics[&AgentId::from(1)];
        if kin.stopped {
            assert_eq!(kin.speed_mps, 0.0);
        }
    }

    #[test]
    fn position_wraps_at_lane_end() {
        let lane = LaneSpec {
            id: LaneId::from(1),
            start: Point2D { x: 0.0, y: 0.0 },
            end: Point2D { x: 100.0, y: 0.0 },
            max_speed_mps: 14.0,
        };
        let wrapped = lane.point_at(250.0);
        assert!((wrapped.x - 50.0).abs() < 1e-9);
    }

    #[test]
    fn follower_keeps_distance_from_leader() {
        let network = RoadNetwork::with_settings(&test_settings());
        let mut kinematics = HashMap::new();
        kinematics.insert(
            AgentId::from(1),
            Kinematics::builder()
                .lane(LaneId::from(1))
                .offset_m(50.0)
                .speed_mps(14.0)
                .build(),
        );
        kinematics.insert(
            AgentId::from(2),
            Kinematics::builder()
                .lane(LaneId::from(1))
                .offset_m(56.0)
                .speed_mps(0.0)
                .build(),
        );
        network.advance_all(&mut kinematics, TimeMS::from(0u64), TimeMS::from(1000u64));
        let follower = kinematics[&AgentId::from(1)];
        // Closing fast on a stopped leader inside the safety distance: brake.
        assert!(follower.speed_mps < 14.0);
    }
}
