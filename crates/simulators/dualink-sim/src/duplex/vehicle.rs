use hashbrown::HashMap;
use rand_pcg::Pcg64Mcg;
use typed_builder::TypedBuilder;

use dualink_core::agent::{Agent, AgentId, AgentKind};
use dualink_core::bucket::TimeMS;
use dualink_core::policy::{Observation, Policy};
use dualink_models::cells::CellKind;
use dualink_models::cluster::Cluster;
use dualink_models::handover::{Connectivity, DecisionContext, RadioInterface};
use dualink_models::mobility::{Kinematics, Point2D, SignalPhase};
use dualink_models::observation::ObservationInputs;
use dualink_models::radio::channel::{LinkContext, LinkGeometry};
use dualink_models::radio::metrics::{Decibel, Latency, LoadPercent};
use dualink_models::select::CandidateCell;
use dualink_models::transmission::{
    NeighborLink, NonSafetyTransfer, SafetyTransfer, TransmissionStats,
};

use crate::duplex::bucket::RadioBucket;

/// Sidelink quality towards one cluster neighbor, kept on the vehicle and
/// refreshed every step.
#[derive(Clone, Copy, Debug)]
pub struct Pc5Link {
    pub sinr: Decibel,
    pub reliability: f64,
    pub distance_m: f64,
}

/// All channel measurements of one step. Collected once per step so that the
/// pre- and post-decision observations see the same radio environment.
#[derive(Clone, Debug, Default)]
pub struct Measurements {
    pub macro_candidates: Vec<CandidateCell>,
    pub small_candidates: Vec<CandidateCell>,
    pub pc5_links: HashMap<AgentId, Pc5Link>,
    pub pc5_avg_sinr: Option<Decibel>,
}

#[derive(Clone, Copy, Debug, Default, TypedBuilder)]
pub struct VehicleInfo {
    pub id: AgentId,
    #[builder(default)]
    pub kind: AgentKind,
    pub antenna_height_m: f64,
    pub max_queue_depth: u32,
}

/// One simulated vehicle. Owns its kinematic state mirror, its connectivity
/// state and its message queues; all environment models live in the bucket.
#[derive(Clone, Debug, TypedBuilder)]
pub struct Vehicle {
    pub info: VehicleInfo,
    #[builder(default)]
    pub kinematics: Kinematics,
    #[builder(default)]
    pub connectivity: Connectivity,
    #[builder(default)]
    pub pc5_links: HashMap<AgentId, Pc5Link>,
    #[builder(default)]
    pub safety_queue: u32,
    #[builder(default)]
    pub nonsafety_queue: u32,
    #[builder(default)]
    pub step: TimeMS,
    #[builder(default)]
    pub last_observation: Observation,
}

impl Vehicle {
    fn measure(
        &self,
        bucket: &RadioBucket,
        rng: &mut Pcg64Mcg,
        position: &Point2D,
        cluster: &Cluster,
    ) -> Measurements {
        let mut macro_candidates = Vec::new();
        let mut small_candidates = Vec::new();
        for cell in bucket.cells.values() {
            let geometry = LinkGeometry::builder()
                .tx_position(cell.position)
                .tx_height_m(cell.height_m)
                .rx_position(*position)
                .rx_height_m(self.info.antenna_height_m)
                .build();
            let context = LinkContext::Uu {
                cell_load: cell.load,
            };
            let estimate = bucket
                .models
                .channel
                .assess(rng, &geometry, cell.tx_power, &context);
            let candidate = CandidateCell {
                cell_id: cell.id,
                rsrp: estimate.rsrp,
                sinr: estimate.sinr,
            };
            match cell.kind {
                CellKind::Macro => macro_candidates.push(candidate),
                CellKind::Small => small_candidates.push(candidate),
            }
        }

        let mut pc5_links = HashMap::new();
        let context = LinkContext::Pc5 {
            neighbor_count: cluster.len(),
        };
        for neighbor in &cluster.neighbors {
            let estimate = match bucket.position_of(neighbor.id) {
                Some(neighbor_position) => {
                    let geometry = LinkGeometry::builder()
                        .tx_position(neighbor_position)
                        .tx_height_m(self.info.antenna_height_m)
                        .rx_position(*position)
                        .rx_height_m(self.info.antenna_height_m)
                        .build();
                    bucket.models.channel.assess(
                        rng,
                        &geometry,
                        bucket.models.channel.pc5_tx_power(),
                        &context,
                    )
                }
                None => dualink_models::radio::channel::ChannelEstimate::fallback(),
            };
            pc5_links.insert(
                neighbor.id,
                Pc5Link {
                    sinr: estimate.sinr,
                    reliability: neighbor.reliability,
                    distance_m: neighbor.distance_m,
                },
            );
        }

        let pc5_avg_sinr = if pc5_links.is_empty() {
            None
        } else {
            let sum: f64 = pc5_links.values().map(|link| link.sinr.as_f64()).sum();
            Some(Decibel::new(sum / pc5_links.len() as f64))
        };

        Measurements {
            macro_candidates,
            small_candidates,
            pc5_links,
            pc5_avg_sinr,
        }
    }

    fn serving_macro_measurement(&self, measurements: &Measurements) -> Option<CandidateCell> {
        let serving = self.connectivity.serving_macro?;
        measurements
            .macro_candidates
            .iter()
            .find(|candidate| candidate.cell_id == serving)
            .copied()
    }

    fn serving_small_measurement(&self, measurements: &Measurements) -> Option<CandidateCell> {
        let serving = self.connectivity.serving_small?;
        measurements
            .small_candidates
            .iter()
            .find(|candidate| candidate.cell_id == serving)
            .copied()
    }

    fn observation(
        &self,
        bucket: &RadioBucket,
        measurements: &Measurements,
        signal_phase: Option<SignalPhase>,
    ) -> Observation {
        let serving = self.serving_macro_measurement(measurements);
        let serving_load = self
            .connectivity
            .serving_macro
            .and_then(|cell_id| bucket.cell(cell_id))
            .map(|cell| cell.load);
        let inputs = ObservationInputs::builder()
            .speed_mps(self.kinematics.speed_mps)
            .uu_rsrp(serving.map(|candidate| candidate.rsrp))
            .uu_sinr(serving.map(|candidate| candidate.sinr))
            .pc5_avg_sinr(measurements.pc5_avg_sinr)
            .cluster_size(measurements.pc5_links.len())
            .serving_load(serving_load)
            .safety_queue(self.safety_queue)
            .nonsafety_queue(self.nonsafety_queue)
            .signal_phase(signal_phase)
            .stopped(self.kinematics.stopped)
            .build();
        bucket.models.observation.build(&inputs)
    }

    fn neighbor_links(&self) -> Vec<NeighborLink> {
        let mut neighbor_ids: Vec<AgentId> = self.pc5_links.keys().copied().collect();
        neighbor_ids.sort_unstable();
        neighbor_ids
            .into_iter()
            .filter_map(|id| self.pc5_links.get(&id))
            .map(|link| NeighborLink {
                distance_m: link.distance_m,
                sinr: link.sinr,
            })
            .collect()
    }

    fn transmit(
        &mut self,
        bucket: &mut RadioBucket,
        rng: &mut Pcg64Mcg,
        measurements: &Measurements,
    ) -> TransmissionStats {
        let uu_bandwidth = bucket.models.channel.settings().uu_bandwidth_mhz;
        let pc5_bandwidth = bucket.models.channel.settings().pc5_bandwidth_mhz;
        let msgs_per_step = bucket.models.transmission.settings().safety_msgs_per_step;
        let missing_latency = bucket.models.transmission.settings().no_cluster_latency_s;

        let safety = match self.connectivity.safety_interface {
            RadioInterface::Pc5 => {
                let links = self.neighbor_links();
                bucket.models.transmission.safety_over_pc5(rng, &links)
            }
            RadioInterface::Uu => match self.serving_macro_measurement(measurements) {
                Some(serving) => {
                    let load = bucket
                        .cell(serving.cell_id)
                        .map(|cell| cell.load)
                        .unwrap_or_default();
                    bucket
                        .models
                        .transmission
                        .safety_over_uu(rng, serving.sinr, load)
                }
                // No serving cell to carry safety traffic: nothing delivered.
                None => SafetyTransfer {
                    sent: msgs_per_step,
                    received: 0,
                    pdr: 0.0,
                    latency: Latency::new(missing_latency),
                    load_delta: 0.0,
                },
            },
        };
        if safety.load_delta > 0.0 {
            if let Some(cell_id) = self.connectivity.serving_macro {
                bucket.add_cell_load(cell_id, safety.load_delta);
            }
        }

        let nonsafety = match self.connectivity.nonsafety_interface {
            RadioInterface::Uu => {
                // Non-safety traffic rides the secondary cell when one is
                // attached, otherwise the macro anchor.
                let serving = self
                    .serving_small_measurement(measurements)
                    .or_else(|| self.serving_macro_measurement(measurements));
                match serving {
                    Some(cell_measurement) => {
                        let load = bucket
                            .cell(cell_measurement.cell_id)
                            .map(|cell| cell.load)
                            .unwrap_or_default();
                        let transfer = bucket.models.transmission.nonsafety_over_uu(
                            cell_measurement.sinr,
                            load,
                            uu_bandwidth,
                        );
                        if transfer.load_delta > 0.0 {
                            bucket.add_cell_load(cell_measurement.cell_id, transfer.load_delta);
                        }
                        transfer
                    }
                    None => NonSafetyTransfer::default(),
                }
            }
            RadioInterface::Pc5 => bucket.models.transmission.nonsafety_over_pc5(
                measurements.pc5_avg_sinr,
                measurements.pc5_links.len(),
                pc5_bandwidth,
            ),
        };

        self.update_queues(&safety, &nonsafety, msgs_per_step);

        TransmissionStats::builder()
            .safety_sent(safety.sent)
            .safety_received(safety.received)
            .safety_pdr(safety.pdr)
            .latency(safety.latency)
            .throughput(nonsafety.throughput)
            .max_throughput(nonsafety.max_throughput)
            .build()
    }

    fn update_queues(
        &mut self,
        safety: &SafetyTransfer,
        nonsafety: &NonSafetyTransfer,
        msgs_per_step: u32,
    ) {
        // The safety queue tracks the undelivered backlog; clean steps drain
        // it again at the message rate.
        let undelivered = (msgs_per_step as f64 * (1.0 - safety.pdr)).round() as u32;
        self.safety_queue = if undelivered > 0 {
            self.safety_queue
                .saturating_add(undelivered)
                .min(self.info.max_queue_depth)
        } else {
            self.safety_queue.saturating_sub(msgs_per_step)
        };

        if nonsafety.throughput.as_f64() + 1e-9 < nonsafety.max_throughput.as_f64() {
            self.nonsafety_queue = self
                .nonsafety_queue
                .saturating_add(1)
                .min(self.info.max_queue_depth);
        } else {
            self.nonsafety_queue = self.nonsafety_queue.saturating_sub(1);
        }
    }
}

impl Agent<RadioBucket> for Vehicle {
    fn id(&self) -> AgentId {
        self.info.id
    }

    fn step(&mut self, bucket: &mut RadioBucket) {
        self.step = bucket.step;
        if let Some(kinematics) = bucket.kinematics_of(self.info.id) {
            self.kinematics = kinematics;
        }
        let position = bucket.models.road.position_of(&self.kinematics);
        let near_intersection = bucket.models.road.near_intersection(&self.kinematics);
        let signal_phase = bucket
            .models
            .road
            .signal_phase_for(&self.kinematics, bucket.step);
        let cluster = bucket
            .cluster_of(self.info.id)
            .cloned()
            .unwrap_or_default();
        let mut rng = bucket.streams.stream_for(self.info.id, bucket.step);

        let measurements = self.measure(bucket, &mut rng, &position, &cluster);
        self.pc5_links = measurements.pc5_links.clone();

        let pre_observation = self.observation(bucket, &measurements, signal_phase);
        let action = bucket
            .models
            .policy
            .select_action(self.info.id, &pre_observation);

        let serving_load = self
            .connectivity
            .serving_macro
            .and_then(|cell_id| bucket.cell(cell_id))
            .map(|cell| cell.load)
            .unwrap_or(LoadPercent::default());
        let ctx = DecisionContext::builder()
            .now(bucket.step)
            .speed_mps(self.kinematics.speed_mps)
            .near_intersection(near_intersection)
            .macro_serving(self.serving_macro_measurement(&measurements))
            .macro_candidates(measurements.macro_candidates.clone())
            .small_candidates(measurements.small_candidates.clone())
            .pc5_avg_sinr(measurements.pc5_avg_sinr)
            .cluster_size(cluster.len())
            .serving_load(serving_load)
            .build();
        let ho_stats = bucket
            .models
            .handover
            .apply(&mut self.connectivity, action, &ctx);

        let tx_stats = self.transmit(bucket, &mut rng, &measurements);
        let reward = bucket.models.reward.compute(&tx_stats, &ho_stats);
        let next_observation = self.observation(bucket, &measurements, signal_phase);
        bucket.models.policy.observe(
            self.info.id,
            &pre_observation,
            action,
            reward,
            &next_observation,
        );
        bucket.fold_step_results(
            self.info.id,
            &position,
            self.kinematics.speed_mps,
            &tx_stats,
            &ho_stats,
            reward,
        );
        self.last_observation = next_observation;
    }
}
