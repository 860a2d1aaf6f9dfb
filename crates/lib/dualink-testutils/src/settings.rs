use dualink_core::bucket::TimeMS;
use dualink_models::cluster::ClusterSettings;
use dualink_models::mobility::{LaneId, LaneSpec, MobilitySettings, Point2D, SignalSpec};
use dualink_models::observation::ObservationSettings;
use dualink_models::radio::channel::ChannelSettings;
use dualink_models::reward::RewardSettings;
use dualink_models::select::SelectorSettings;
use dualink_models::handover::HandoverSettings;
use dualink_models::transmission::TransmissionSettings;

pub fn channel_settings() -> ChannelSettings {
    ChannelSettings {
        carrier_ghz: 3.5,
        uu_bandwidth_mhz: 20.0,
        pc5_bandwidth_mhz: 10.0,
        noise_figure_db: 9.0,
        thermal_noise_dbm_hz: -174.0,
        reference_loss_db: Some(43.3),
        path_loss_exponent_los: 2.0,
        path_loss_exponent_nlos: 3.5,
        shadow_sigma_los_db: 4.0,
        shadow_sigma_nlos_db: 8.0,
        pc5_tx_power_dbm: 23.0,
        uu_interference_factor: 1.5,
        pc5_interference_factor: 0.3,
    }
}

pub fn cluster_settings() -> ClusterSettings {
    ClusterSettings {
        max_range_m: 300.0,
        reliable_range_m: 100.0,
        reliability_decay_m: 80.0,
        min_reliability: 0.5,
        grid_cell_m: 150.0,
    }
}

pub fn selector_settings() -> SelectorSettings {
    SelectorSettings {
        hysteresis_margin_db: 3.0,
        speed_margin_gain: 0.05,
        intersection_margin_scale: 0.5,
        min_sinr_db: 0.0,
    }
}

pub fn handover_settings() -> HandoverSettings {
    HandoverSettings {
        min_interval: TimeMS::from(5000u64),
        ping_pong_window: TimeMS::from(30_000u64),
        scg_add_sinr_db: 5.0,
        scg_add_intersection_relax_db: 2.0,
        scg_remove_sinr_db: 15.0,
        pc5_poor_sinr_db: 0.0,
        pc5_good_sinr_db: 10.0,
        uu_adequate_sinr_db: 3.0,
        high_load_percent: 70.0,
        uu_saturation_load_percent: 80.0,
        selector: selector_settings(),
    }
}

pub fn transmission_settings() -> TransmissionSettings {
    TransmissionSettings {
        safety_msgs_per_step: 10,
        no_cluster_latency_s: 1.0,
        pc5_base_latency_s: 0.02,
        pc5_latency_per_m_s: 0.0001,
        uu_base_latency_s: 0.05,
        uu_load_latency_s: 0.1,
        uu_sinr_deficit_latency_s: 0.005,
        sinr_target_db: 10.0,
        safety_load_increment: 0.5,
        load_per_mbps: 0.2,
        nonsafety_app_cap_mbps: 50.0,
        pc5_app_cap_mbps: 20.0,
        uu_bandwidth_fraction: 0.1,
        protocol_efficiency: 0.75,
    }
}

pub fn reward_settings() -> RewardSettings {
    RewardSettings {
        latency_target_s: 0.1,
        safety_weight: 0.5,
        throughput_weight: 0.3,
        overhead_weight: 0.2,
        mcg_handover_penalty: 0.5,
        scg_change_penalty: 0.3,
        ping_pong_penalty: 1.0,
        interface_switch_penalty: 0.2,
    }
}

pub fn observation_settings() -> ObservationSettings {
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

/// A single 2 km closed-loop lane with one mid-lane signal.
pub fn mobility_settings() -> MobilitySettings {
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
            end: Point2D { x: 2000.0, y: 0.0 },
            max_speed_mps: 14.0,
        }],
        signals: vec![SignalSpec {
            lane: LaneId::from(1),
            stop_line_m: 1000.0,
            green_ms: 30_000,
            red_ms: 30_000,
            offset_ms: 0,
        }],
    }
}
