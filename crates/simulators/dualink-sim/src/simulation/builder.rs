use std::path::Path;

use indexmap::IndexMap;
use log::info;

use dualink_core::agent::AgentId;
use dualink_core::bucket::TimeMS;
use dualink_core::model::Model;
use dualink_core::rng::RngStreams;
use dualink_core::scheduler::Scheduler;
use dualink_models::cells::{Cell, CellId};
use dualink_models::cluster::ClusterModel;
use dualink_models::dist::RngSampler;
use dualink_models::handover::HandoverEngine;
use dualink_models::mobility::{Kinematics, RoadNetwork};
use dualink_models::observation::StateVectorBuilder;
use dualink_models::radio::channel::ChannelModel;
use dualink_models::radio::metrics::Dbm;
use dualink_models::reward::RewardFunction;
use dualink_models::transmission::TransmissionModel;
use dualink_output::logger::initiate_logger;
use dualink_output::result::Results;

use crate::duplex::bucket::{BucketModels, RadioBucket};
use crate::duplex::vehicle::{Vehicle, VehicleInfo};
use crate::policies::PolicyType;
use crate::simulation::config::{BaseConfig, BaseConfigReader};

pub struct SimulationBuilder {
    base_config: BaseConfig,
}

impl SimulationBuilder {
    pub fn new(config_file: &str) -> Self {
        let config_reader = BaseConfigReader::new(config_file);
        let base_config = match config_reader.parse() {
            Ok(config) => config,
            Err(e) => panic!("Failed to parse the configuration file: {}", e),
        };
        let config_dir = Path::new(config_file)
            .parent()
            .unwrap_or_else(|| Path::new("."));
        initiate_logger(
            config_dir,
            &base_config.log_settings,
            Some(base_config.output_settings.scenario_id),
        );
        Self { base_config }
    }

    pub fn from_config(base_config: BaseConfig) -> Self {
        Self { base_config }
    }

    pub fn config(&self) -> &BaseConfig {
        &self.base_config
    }

    pub fn build(&mut self) -> Scheduler<Vehicle, RadioBucket> {
        info!(
            "Building scenario {} with {} vehicles.",
            self.base_config.simulation_settings.scenario, self.base_config.vehicles.count
        );
        let mut bucket = self.build_bucket();
        let vehicles = self.build_vehicles(&mut bucket);
        Scheduler::builder()
            .bucket(bucket)
            .agents(vehicles)
            .duration(self.base_config.simulation_settings.duration)
            .step_size(self.base_config.simulation_settings.step_size)
            .output_interval(self.base_config.output_settings.output_interval)
            .build()
    }

    fn build_bucket(&self) -> RadioBucket {
        let config = &self.base_config;
        let models = BucketModels::builder()
            .channel(ChannelModel::with_settings(&config.channel_settings))
            .road(RoadNetwork::with_settings(&config.mobility_settings))
            .cluster(ClusterModel::with_settings(&config.cluster_settings))
            .handover(HandoverEngine::with_settings(&config.handover_settings))
            .transmission(TransmissionModel::with_settings(
                &config.transmission_settings,
            ))
            .reward(RewardFunction::with_settings(&config.reward_settings))
            .observation(StateVectorBuilder::with_settings(
                &config.observation_settings,
            ))
            .policy(PolicyType::with_settings(&config.policy_settings))
            .results(Results::new(&config.output_settings))
            .build();

        let mut cells: IndexMap<CellId, Cell> = IndexMap::new();
        for cell_settings in &config.cells {
            let cell = Cell::builder()
                .id(cell_settings.id)
                .kind(cell_settings.kind)
                .position(cell_settings.position)
                .height_m(cell_settings.height_m)
                .tx_power(Dbm::new(cell_settings.tx_power_dbm))
                .build();
            cells.insert(cell.id, cell);
        }
        cells.sort_unstable_keys();

        RadioBucket::builder()
            .models(models)
            .cells(cells)
            .streams(RngStreams::new(config.simulation_settings.seed))
            .step_size(config.simulation_settings.step_size)
            .vehicle_antenna_height_m(config.vehicles.antenna_height_m)
            .build()
    }

    /// Place the vehicles evenly over the configured lanes with sampled
    /// initial speeds, and register their kinematics with the bucket.
    fn build_vehicles(&self, bucket: &mut RadioBucket) -> IndexMap<AgentId, Vehicle> {
        let config = &self.base_config;
        let lanes = &config.mobility_settings.lanes;
        let mut speed_sampler = RngSampler::new(&config.vehicles.initial_speed_dist);
        let mut vehicles: IndexMap<AgentId, Vehicle> = IndexMap::new();

        for index in 0..config.vehicles.count {
            let agent_id = AgentId::from(index as u64 + 1);
            let lane = &lanes[index as usize % lanes.len()];
            let along_lane = (index as usize / lanes.len()) as f64;
            let spacing = lane.length_m() / (config.vehicles.count as f64 / lanes.len() as f64)
                .max(1.0);
            let kinematics = Kinematics::builder()
                .lane(lane.id)
                .offset_m((along_lane * spacing) % lane.length_m())
                .speed_mps(speed_sampler.sample().clamp(0.0, config.mobility_settings.max_speed_mps))
                .build();
            bucket.register_vehicle(agent_id, kinematics);

            let vehicle = Vehicle::builder()
                .info(
                    VehicleInfo::builder()
                        .id(agent_id)
                        .antenna_height_m(config.vehicles.antenna_height_m)
                        .max_queue_depth(config.vehicles.max_queue_depth)
                        .build(),
                )
                .kinematics(kinematics)
                .build();
            vehicles.insert(agent_id, vehicle);
        }
        vehicles
    }
}
