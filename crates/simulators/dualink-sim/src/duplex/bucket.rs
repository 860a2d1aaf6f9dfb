use hashbrown::HashMap;
use indexmap::IndexMap;
use log::info;
use typed_builder::TypedBuilder;

use dualink_core::agent::AgentId;
use dualink_core::bucket::{Bucket, TimeMS};
use dualink_core::policy::Reward;
use dualink_core::rng::RngStreams;
use dualink_models::cells::{Cell, CellId, CellKind};
use dualink_models::cluster::{Cluster, ClusterModel, Space};
use dualink_models::handover::{HandoverEngine, HandoverStats};
use dualink_models::mobility::{Kinematics, Point2D, RoadNetwork};
use dualink_models::observation::StateVectorBuilder;
use dualink_models::radio::channel::ChannelModel;
use dualink_models::reward::RewardFunction;
use dualink_models::transmission::{TransmissionModel, TransmissionStats};
use dualink_output::result::Results;

use crate::policies::PolicyType;

/// Environment models shared by all vehicles.
#[derive(TypedBuilder)]
pub struct BucketModels {
    pub channel: ChannelModel,
    pub road: RoadNetwork,
    pub cluster: ClusterModel,
    pub handover: HandoverEngine,
    pub transmission: TransmissionModel,
    pub reward: RewardFunction,
    pub observation: StateVectorBuilder,
    pub policy: PolicyType,
    pub results: Results,
}

/// Run totals reported when the simulation terminates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EpisodeCounters {
    pub handovers: u64,
    pub ping_pongs: u64,
    pub interface_switches: u64,
    pub reward_sum: f64,
    pub reward_count: u64,
}

impl EpisodeCounters {
    pub fn mean_reward(&self) -> f64 {
        if self.reward_count == 0 {
            0.0
        } else {
            self.reward_sum / self.reward_count as f64
        }
    }
}

/// The shared state of one simulation run: cells, vehicle kinematics, the
/// spatial index and the derived PC5 clusters. Vehicles read from it and
/// write cell load through it while being stepped in a fixed order.
#[derive(TypedBuilder)]
pub struct RadioBucket {
    pub models: BucketModels,
    pub cells: IndexMap<CellId, Cell>,
    pub streams: RngStreams,
    pub step_size: TimeMS,
    pub vehicle_antenna_height_m: f64,
    #[builder(default)]
    pub step: TimeMS,
    #[builder(default)]
    kinematics: HashMap<AgentId, Kinematics>,
    #[builder(default)]
    space: Space,
    #[builder(default)]
    clusters: HashMap<AgentId, Cluster>,
    #[builder(default)]
    pub episode: EpisodeCounters,
}

impl RadioBucket {
    pub fn register_vehicle(&mut self, agent_id: AgentId, kinematics: Kinematics) {
        self.kinematics.insert(agent_id, kinematics);
    }

    pub fn kinematics_of(&self, agent_id: AgentId) -> Option<Kinematics> {
        self.kinematics.get(&agent_id).copied()
    }

    pub fn position_of(&self, agent_id: AgentId) -> Option<Point2D> {
        self.kinematics
            .get(&agent_id)
            .map(|kin| self.models.road.position_of(kin))
    }

    pub fn cluster_of(&self, agent_id: AgentId) -> Option<&Cluster> {
        self.clusters.get(&agent_id)
    }

    pub fn cell(&self, cell_id: CellId) -> Option<&Cell> {
        self.cells.get(&cell_id)
    }

    pub fn cells_of_kind(&self, kind: CellKind) -> impl Iterator<Item = &Cell> {
        self.cells.values().filter(move |cell| cell.kind == kind)
    }

    /// Apply a load contribution to one cell, clamped to the valid range.
    pub fn add_cell_load(&mut self, cell_id: CellId, delta: f64) {
        if let Some(cell) = self.cells.get_mut(&cell_id) {
            cell.load.add(delta);
        }
    }

    pub fn fold_step_results(
        &mut self,
        agent_id: AgentId,
        position: &Point2D,
        speed_mps: f64,
        tx_stats: &TransmissionStats,
        ho_stats: &HandoverStats,
        reward: Reward,
    ) {
        if ho_stats.kind.is_some() {
            self.episode.handovers += 1;
        }
        if ho_stats.ping_pong {
            self.episode.ping_pongs += 1;
        }
        if ho_stats.interface_switch {
            self.episode.interface_switches += 1;
        }
        self.episode.reward_sum += reward.as_f32() as f64;
        self.episode.reward_count += 1;

        let step = self.step;
        if let Some(writer) = &mut self.models.results.tx_data {
            writer.add_data(step, agent_id, tx_stats);
        }
        if let Some(writer) = &mut self.models.results.handovers {
            writer.add_data(step, agent_id, ho_stats);
        }
        if let Some(writer) = &mut self.models.results.rewards {
            writer.add_data(step, agent_id, reward);
        }
        if let Some(writer) = &mut self.models.results.positions {
            writer.add_data(step, agent_id, position, speed_mps);
        }
    }

    fn rebuild_clusters(&mut self) {
        for (agent_id, kin) in self.kinematics.iter() {
            let position = self.models.road.position_of(kin);
            self.space.update_agent(*agent_id, position);
        }
        let agents: Vec<AgentId> = self.kinematics.keys().copied().collect();
        self.clusters = self.models.cluster.build_all(&self.space, &agents);
    }
}

impl Bucket for RadioBucket {
    fn initialize(&mut self, step: TimeMS) {
        self.step = step;
        self.space = Space::new(self.models.cluster.settings().grid_cell_m);
        self.rebuild_clusters();
        info!(
            "Initialized bucket with {} vehicles and {} cells.",
            self.kinematics.len(),
            self.cells.len()
        );
    }

    fn before_agents(&mut self, step: TimeMS) {
        self.step = step;
        self.models
            .road
            .advance_all(&mut self.kinematics, step, self.step_size);
        self.rebuild_clusters();
    }

    fn after_agents(&mut self) {}

    fn stream_output(&mut self) {
        self.models.results.write_to_file();
    }

    fn terminate(mut self) {
        self.models.results.write_to_file();
        info!(
            "Episode finished: {} handovers, {} ping-pongs, {} interface switches, mean reward {:.4}.",
            self.episode.handovers,
            self.episode.ping_pongs,
            self.episode.interface_switches,
            self.episode.mean_reward()
        );
        self.models.results.close_files();
    }
}
