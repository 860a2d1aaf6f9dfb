use serde::Deserialize;
use typed_builder::TypedBuilder;

use dualink_core::model::{Model, ModelSettings};
use dualink_core::policy::{Observation, NEUTRAL_OBSERVATION};

use crate::mobility::SignalPhase;
use crate::radio::metrics::{Dbm, Decibel, LoadPercent};

/// Fixed normalization bounds of the observation components. Values outside
/// the bounds are clamped to the unit interval.
#[derive(Deserialize, Debug, Clone)]
pub struct ObservationSettings {
    pub rsrp_min_dbm: f64,
    pub rsrp_max_dbm: f64,
    pub sinr_min_db: f64,
    pub sinr_max_db: f64,
    pub max_speed_mps: f64,
    pub max_cluster_size: u32,
    pub max_queue_depth: u32,
}

impl ModelSettings for ObservationSettings {}

/// Raw per-step quantities of one vehicle, before normalization. Missing
/// measurements stay `None` and map to the neutral mid-scale value.
#[derive(Clone, Copy, Debug, Default, TypedBuilder)]
pub struct ObservationInputs {
    #[builder(default)]
    pub speed_mps: f64,
    #[builder(default = None)]
    pub uu_rsrp: Option<Dbm>,
    #[builder(default = None)]
    pub uu_sinr: Option<Decibel>,
    #[builder(default = None)]
    pub pc5_avg_sinr: Option<Decibel>,
    #[builder(default)]
    pub cluster_size: usize,
    #[builder(default = None)]
    pub serving_load: Option<LoadPercent>,
    #[builder(default)]
    pub safety_queue: u32,
    #[builder(default)]
    pub nonsafety_queue: u32,
    #[builder(default = None)]
    pub signal_phase: Option<SignalPhase>,
    #[builder(default)]
    pub stopped: bool,
}

/// Builds the fixed-length observation vector handed to the policy. Each
/// component is min-max normalized to [0, 1] independently.
///
/// Layout: [speed, uu_rsrp, uu_sinr, pc5_sinr, cluster, load, safety_queue,
/// nonsafety_queue, signal_phase, stopped].
#[derive(Clone, Debug)]
pub struct StateVectorBuilder {
    settings: ObservationSettings,
}

impl Model for StateVectorBuilder {
    type Settings = ObservationSettings;

    fn with_settings(settings: &ObservationSettings) -> Self {
        if settings.rsrp_max_dbm <= settings.rsrp_min_dbm
            || settings.sinr_max_db <= settings.sinr_min_db
        {
            log::error!("Observation bounds must be ordered.");
            panic!("Invalid observation settings.");
        }
        Self {
            settings: settings.clone(),
        }
    }
}

impl StateVectorBuilder {
    pub fn settings(&self) -> &ObservationSettings {
        &self.settings
    }

    pub fn build(&self, inputs: &ObservationInputs) -> Observation {
        let s = &self.settings;
        let mut observation = Observation::default();
        let values = &mut observation.values;
        values[0] = normalize(inputs.speed_mps, 0.0, s.max_speed_mps);
        values[1] = match inputs.uu_rsrp {
            Some(rsrp) => normalize(rsrp.as_f64(), s.rsrp_min_dbm, s.rsrp_max_dbm),
            None => NEUTRAL_OBSERVATION,
        };
        values[2] = match inputs.uu_sinr {
            Some(sinr) => normalize(sinr.as_f64(), s.sinr_min_db, s.sinr_max_db),
            None => NEUTRAL_OBSERVATION,
        };
        values[3] = match inputs.pc5_avg_sinr {
            Some(sinr) => normalize(sinr.as_f64(), s.sinr_min_db, s.sinr_max_db),
            None => NEUTRAL_OBSERVATION,
        };
        values[4] = normalize(inputs.cluster_size as f64, 0.0, s.max_cluster_size as f64);
        values[5] = match inputs.serving_load {
            Some(load) => normalize(load.as_f64(), 0.0, 100.0),
            None => NEUTRAL_OBSERVATION,
        };
        values[6] = normalize(inputs.safety_queue as f64, 0.0, s.max_queue_depth as f64);
        values[7] = normalize(inputs.nonsafety_queue as f64, 0.0, s.max_queue_depth as f64);
        values[8] = match inputs.signal_phase {
            Some(SignalPhase::Green) => 1.0,
            Some(SignalPhase::Red) => 0.0,
            None => NEUTRAL_OBSERVATION,
        };
        values[9] = if inputs.stopped { 1.0 } else { 0.0 };
        observation
    }
}

fn normalize(value: f64, min: f64, max: f64) -> f32 {
    if !value.is_finite() || max <= min {
        return NEUTRAL_OBSERVATION;
    }
    (((value - min) / (max - min)).clamp(0.0, 1.0)) as f32
}

#[cfg(test)]
mod tests {
    use dualink_core::policy::OBSERVATION_LEN;

    use super::*;

    pub fn test_settings() -> ObservationSettings {
        ObservationSettings {
            rsrp_min_dbm: -120.0,
            rsrp_max_dbm: -60.0,
            sinr_min_db: -10.0,
            sinr_max_db: 30.0,
            max_speed_mps: 30.0,
            max_cluster_size: 20,
            max_queue_depth: 50,
        }
    }

    #[test]
    fn all_components_stay_in_unit_interval() {
        let builder = StateVectorBuilder::with_settings(&test_settings());
        let inputs = ObservationInputs::builder()
            .speed_mps(55.0)
            .uu_rsrp(Some(Dbm::new(-150.0)))
            .uu_sinr(Some(Decibel::new(80.0)))
            .pc5_avg_sinr(Some(Decibel::new(f64::NAN)))
            .cluster_size(100)
            .serving_load(Some(LoadPercent::new(100.0)))
            .safety_queue(500)
            .nonsafety_queue(0)
            .signal_phase(Some(SignalPhase::Red))
            .stopped(true)
            .build();
        let observation = builder.build(&inputs);
        for value in observation.values {
            assert!((0.0..=1.0).contains(&value));
        }
        assert_eq!(observation.values.len(), OBSERVATION_LEN);
    }

    #[test]
    fn missing_measurements_map_to_neutral() {
        let builder = StateVectorBuilder::with_settings(&test_settings());
        let observation = builder.build(&ObservationInputs::default());
        assert_eq!(observation.values[1], NEUTRAL_OBSERVATION);
        assert_eq!(observation.values[2], NEUTRAL_OBSERVATION);
        assert_eq!(observation.values[3], NEUTRAL_OBSERVATION);
        assert_eq!(observation.values[5], NEUTRAL_OBSERVATION);
    }

    #[test]
    fn measured_values_leave_the_neutral_sentinel() {
        let builder = StateVectorBuilder::with_settings(&test_settings());
        let inputs = ObservationInputs::builder()
            .uu_rsrp(Some(Dbm::new(-75.0)))
            .uu_sinr(Some(Decibel::new(18.0)))
            .build();
        let observation = builder.build(&inputs);
        assert!((observation.values[1] - 0.75).abs() < 1e-6);
        assert!((observation.values[2] - 0.7).abs() < 1e-6);
    }
}
