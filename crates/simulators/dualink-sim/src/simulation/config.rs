use std::path::PathBuf;

use serde::Deserialize;

use dualink_core::bucket::TimeMS;
use dualink_models::cells::{CellId, CellKind};
use dualink_models::cluster::ClusterSettings;
use dualink_models::dist::DistParams;
use dualink_models::handover::HandoverSettings;
use dualink_models::mobility::{MobilitySettings, Point2D};
use dualink_models::observation::ObservationSettings;
use dualink_models::radio::channel::ChannelSettings;
use dualink_models::reward::RewardSettings;
use dualink_models::transmission::TransmissionSettings;
use dualink_output::logger::LogSettings;
use dualink_output::result::OutputSettings;

use crate::policies::PolicySettings;

#[derive(Deserialize, Debug, Clone)]
pub struct BaseConfig {
    pub simulation_settings: SimSettings,
    pub channel_settings: ChannelSettings,
    pub mobility_settings: MobilitySettings,
    pub cluster_settings: ClusterSettings,
    pub handover_settings: HandoverSettings,
    pub transmission_settings: TransmissionSettings,
    pub reward_settings: RewardSettings,
    pub observation_settings: ObservationSettings,
    pub policy_settings: PolicySettings,
    pub log_settings: LogSettings,
    pub output_settings: OutputSettings,
    pub cells: Vec<CellSettings>,
    pub vehicles: VehicleSettings,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SimSettings {
    pub scenario: String,
    pub duration: TimeMS,
    pub step_size: TimeMS,
    pub seed: u64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CellSettings {
    pub id: CellId,
    pub kind: CellKind,
    pub position: Point2D,
    pub height_m: f64,
    pub tx_power_dbm: f64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct VehicleSettings {
    pub count: u32,
    pub antenna_height_m: f64,
    pub initial_speed_dist: DistParams,
    /// Depth at which the message queue observations saturate.
    pub max_queue_depth: u32,
}

pub struct BaseConfigReader {
    file_path: PathBuf,
}

impl BaseConfigReader {
    pub fn new(file_name: &str) -> Self {
        let file_path = PathBuf::from(file_name);
        Self { file_path }
    }

    pub fn parse(&self) -> Result<BaseConfig, Box<dyn std::error::Error>> {
        let parsing_result = std::fs::read_to_string(&self.file_path)?;
        let config: BaseConfig = toml::from_str(&parsing_result)?;
        Ok(config)
    }
}
