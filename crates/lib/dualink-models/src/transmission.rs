use rand::Rng;
use serde::Deserialize;
use typed_builder::TypedBuilder;

use dualink_core::model::{Model, ModelSettings};

use crate::dist::binomial_draw;
use crate::radio::metrics::{Decibel, Latency, LoadPercent, Mbps};

/// Block-error-rate for a sidelink transport block at the given SINR. The
/// table is a monotone step function of SINR.
pub fn pc5_bler_at(sinr: Decibel) -> f64 {
    let sinr_db = sinr.as_f64();
    if sinr_db >= 20.0 {
        0.001
    } else if sinr_db >= 15.0 {
        0.01
    } else if sinr_db >= 10.0 {
        0.05
    } else if sinr_db >= 5.0 {
        0.1
    } else if sinr_db >= 0.0 {
        0.2
    } else if sinr_db >= -5.0 {
        0.5
    } else {
        0.9
    }
}

/// Base delivery probability of a safety message over the cellular link at
/// the given SINR, before the load scaling.
pub fn uu_success_at(sinr: Decibel) -> f64 {
    let sinr_db = sinr.as_f64();
    if sinr_db >= 20.0 {
        0.99
    } else if sinr_db >= 10.0 {
        0.95
    } else if sinr_db >= 5.0 {
        0.9
    } else if sinr_db >= 0.0 {
        0.8
    } else if sinr_db >= -5.0 {
        0.6
    } else {
        0.3
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct TransmissionSettings {
    /// Safety messages generated by a vehicle per step.
    pub safety_msgs_per_step: u32,
    /// Latency reported when a vehicle has no cluster to deliver to.
    pub no_cluster_latency_s: f64,
    pub pc5_base_latency_s: f64,
    pub pc5_latency_per_m_s: f64,
    pub uu_base_latency_s: f64,
    /// Latency added per unit of load fraction on the serving cell.
    pub uu_load_latency_s: f64,
    /// Latency added per dB of SINR below the target.
    pub uu_sinr_deficit_latency_s: f64,
    pub sinr_target_db: f64,
    /// Load added to the serving cell per safety message batch.
    pub safety_load_increment: f64,
    /// Load added to the serving cell per Mbps of non-safety throughput.
    pub load_per_mbps: f64,
    pub nonsafety_app_cap_mbps: f64,
    pub pc5_app_cap_mbps: f64,
    /// Fraction of the cell bandwidth granted to one vehicle.
    pub uu_bandwidth_fraction: f64,
    /// Protocol and implementation efficiency applied to Shannon capacity.
    pub protocol_efficiency: f64,
}

impl ModelSettings for TransmissionSettings {}

/// Sidelink quality towards one cluster neighbor.
#[derive(Clone, Copy, Debug)]
pub struct NeighborLink {
    pub distance_m: f64,
    pub sinr: Decibel,
}

/// Outcome of one safety traffic batch.
#[derive(Clone, Copy, Debug, Default)]
pub struct SafetyTransfer {
    pub sent: u32,
    pub received: u32,
    pub pdr: f64,
    pub latency: Latency,
    /// Load the batch added to the serving cell (Uu path only).
    pub load_delta: f64,
}

/// Outcome of one non-safety traffic step.
#[derive(Clone, Copy, Debug, Default)]
pub struct NonSafetyTransfer {
    pub throughput: Mbps,
    pub max_throughput: Mbps,
    pub load_delta: f64,
}

/// Per-vehicle transmission record of one step, folded into the reward and
/// the output tables, then discarded.
#[derive(Clone, Copy, Debug, Default, TypedBuilder)]
pub struct TransmissionStats {
    pub safety_sent: u32,
    pub safety_received: u32,
    pub safety_pdr: f64,
    pub latency: Latency,
    pub throughput: Mbps,
    pub max_throughput: Mbps,
}

/// Translates channel quality into packet delivery and throughput figures.
#[derive(Clone, Debug)]
pub struct TransmissionModel {
    settings: TransmissionSettings,
}

impl Model for TransmissionModel {
    type Settings = TransmissionSettings;

    fn with_settings(settings: &TransmissionSettings) -> Self {
        if !(0.0..=1.0).contains(&settings.uu_bandwidth_fraction)
            || !(0.0..=1.0).contains(&settings.protocol_efficiency)
        {
            log::error!("Bandwidth fraction and efficiency must be fractions.");
            panic!("Invalid transmission settings.");
        }
        Self {
            settings: settings.clone(),
        }
    }
}

impl TransmissionModel {
    pub fn settings(&self) -> &TransmissionSettings {
        &self.settings
    }

    /// Broadcast the safety batch to every cluster neighbor over PC5. PDR is
    /// aggregated over all deliveries the cluster makes possible.
    pub fn safety_over_pc5<R: Rng>(&self, rng: &mut R, neighbors: &[NeighborLink]) -> SafetyTransfer {
        let per_neighbor = self.settings.safety_msgs_per_step as u64;
        if neighbors.is_empty() || per_neighbor == 0 {
            return SafetyTransfer {
                sent: self.settings.safety_msgs_per_step,
                received: 0,
                pdr: 0.0,
                latency: Latency::new(self.settings.no_cluster_latency_s),
                load_delta: 0.0,
            };
        }

        let mut possible: u64 = 0;
        let mut received: u64 = 0;
        let mut latency_sum = 0.0;
        for neighbor in neighbors {
            let bler = pc5_bler_at(neighbor.sinr);
            let delivered = binomial_draw(rng, per_neighbor, 1.0 - bler);
            possible += per_neighbor;
            received += delivered;
            latency_sum += self.pc5_latency(neighbor);
        }
        let pdr = received as f64 / possible as f64;
        SafetyTransfer {
            sent: self.settings.safety_msgs_per_step,
            received: received.min(u32::MAX as u64) as u32,
            pdr: pdr.clamp(0.0, 1.0),
            latency: Latency::new(latency_sum / neighbors.len() as f64),
            load_delta: 0.0,
        }
    }

    fn pc5_latency(&self, neighbor: &NeighborLink) -> f64 {
        let deficit = (self.settings.sinr_target_db - neighbor.sinr.as_f64()).max(0.0);
        self.settings.pc5_base_latency_s
            + self.settings.pc5_latency_per_m_s * neighbor.distance_m
            + self.settings.uu_sinr_deficit_latency_s * deficit
    }

    /// Send the safety batch through the serving cell. Delivery degrades with
    /// cell load, floored at 0.6 of the SINR-derived base probability.
    pub fn safety_over_uu<R: Rng>(
        &self,
        rng: &mut R,
        sinr: Decibel,
        cell_load: LoadPercent,
    ) -> SafetyTransfer {
        let sent = self.settings.safety_msgs_per_step;
        let base = uu_success_at(sinr);
        let load_scale = (1.0 - cell_load.as_fraction()).max(0.6);
        let received = binomial_draw(rng, sent as u64, base * load_scale) as u32;
        let deficit = (self.settings.sinr_target_db - sinr.as_f64()).max(0.0);
        let latency = self.settings.uu_base_latency_s
            + self.settings.uu_load_latency_s * cell_load.as_fraction()
            + self.settings.uu_sinr_deficit_latency_s * deficit;
        SafetyTransfer {
            sent,
            received,
            pdr: if sent == 0 {
                0.0
            } else {
                (received as f64 / sent as f64).clamp(0.0, 1.0)
            },
            latency: Latency::new(latency),
            load_delta: self.settings.safety_load_increment,
        }
    }

    /// Downlink/uplink non-safety throughput through the serving cell.
    pub fn nonsafety_over_uu(
        &self,
        sinr: Decibel,
        cell_load: LoadPercent,
        bandwidth_mhz: f64,
    ) -> NonSafetyTransfer {
        let cap = Mbps::new(self.settings.nonsafety_app_cap_mbps);
        let capacity = self.shannon_mbps(bandwidth_mhz * self.settings.uu_bandwidth_fraction, sinr);
        let max_throughput = capacity.min(cap);
        let throughput =
            Mbps::new(max_throughput.as_f64() * (1.0 - cell_load.as_fraction()).max(0.0));
        NonSafetyTransfer {
            throughput,
            max_throughput,
            load_delta: self.settings.load_per_mbps * throughput.as_f64(),
        }
    }

    /// Sidelink non-safety throughput. The sidelink is a shared medium, so
    /// the capacity splits across the cluster members.
    pub fn nonsafety_over_pc5(
        &self,
        pc5_avg_sinr: Option<Decibel>,
        cluster_size: usize,
        bandwidth_mhz: f64,
    ) -> NonSafetyTransfer {
        let sinr = match pc5_avg_sinr {
            Some(sinr) if cluster_size > 0 => sinr,
            _ => return NonSafetyTransfer::default(),
        };
        let cap = Mbps::new(self.settings.pc5_app_cap_mbps);
        let capacity = self.shannon_mbps(bandwidth_mhz, sinr);
        let shared = Mbps::new(capacity.min(cap).as_f64() / cluster_size as f64);
        NonSafetyTransfer {
            throughput: shared,
            max_throughput: cap,
            load_delta: 0.0,
        }
    }

    fn shannon_mbps(&self, bandwidth_mhz: f64, sinr: Decibel) -> Mbps {
        let spectral = (1.0 + sinr.as_linear()).log2();
        Mbps::new(bandwidth_mhz.max(0.0) * spectral * self.settings.protocol_efficiency)
    }
}

#[cfg(test)]
mod tests {
    use rand_pcg::Pcg64Mcg;

    use super::*;

    pub fn test_settings() -> TransmissionSettings {
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

    #[test]
    fn bler_is_monotone_non_increasing_in_sinr() {
        let mut last = 1.0;
        for sinr_db in (-20..=30).map(|v| v as f64) {
            let bler = pc5_bler_at(Decibel::new(sinr_db));
            assert!(bler <= last + 1e-12);
            assert!((0.0..=1.0).contains(&bler));
            last = bler;
        }
    }

    #[test]
    fn uu_success_is_monotone_non_decreasing_in_sinr() {
        let mut last = 0.0;
        for sinr_db in (-20..=30).map(|v| v as f64) {
            let success = uu_success_at(Decibel::new(sinr_db));
            assert!(success >= last - 1e-12);
            assert!((0.0..=1.0).contains(&success));
            last = success;
        }
    }

    #[test]
    fn no_cluster_means_zero_pdr_and_high_latency() {
        let model = TransmissionModel::with_settings(&test_settings());
        let mut rng = Pcg64Mcg::new(5);
        let transfer = model.safety_over_pc5(&mut rng, &[]);
        assert_eq!(transfer.pdr, 0.0);
        assert_eq!(transfer.received, 0);
        assert_eq!(transfer.latency.as_f64(), 1.0);
    }

    #[test]
    fn pc5_pdr_stays_in_unit_interval() {
        let model = TransmissionModel::with_settings(&test_settings());
        let mut rng = Pcg64Mcg::new(5);
        let neighbors = vec![
            NeighborLink {
                distance_m: 50.0,
                sinr: Decibel::new(22.0),
            },
            NeighborLink {
                distance_m: 250.0,
                sinr: Decibel::new(-8.0),
            },
        ];
        for _ in 0..50 {
            let transfer = model.safety_over_pc5(&mut rng, &neighbors);
            assert!((0.0..=1.0).contains(&transfer.pdr));
            assert!(transfer.received <= transfer.sent * neighbors.len() as u32);
        }
    }

    #[test]
    fn uu_load_raises_latency_and_lowers_delivery() {
        let model = TransmissionModel::with_settings(&test_settings());
        let sinr = Decibel::new(12.0);
        let mut idle_rng = Pcg64Mcg::new(5);
        let mut busy_rng = Pcg64Mcg::new(5);
        let mut idle_total: u64 = 0;
        let mut busy_total: u64 = 0;
        let mut idle_latency = Latency::default();
        let mut busy_latency = Latency::default();
        for _ in 0..100 {
            let idle = model.safety_over_uu(&mut idle_rng, sinr, LoadPercent::new(0.0));
            let busy = model.safety_over_uu(&mut busy_rng, sinr, LoadPercent::new(90.0));
            idle_total += idle.received as u64;
            busy_total += busy.received as u64;
            idle_latency = idle.latency;
            busy_latency = busy.latency;
        }
        assert!(busy_latency > idle_latency);
        assert!(busy_total < idle_total);
    }

    #[test]
    fn nonsafety_throughput_respects_cap_and_load() {
        let model = TransmissionModel::with_settings(&test_settings());
        let strong = model.nonsafety_over_uu(Decibel::new(25.0), LoadPercent::new(0.0), 20.0);
        assert!(strong.throughput.as_f64() <= test_settings().nonsafety_app_cap_mbps);
        assert!(strong.throughput.as_f64() > 0.0);

        let loaded = model.nonsafety_over_uu(Decibel::new(25.0), LoadPercent::new(100.0), 20.0);
        assert_eq!(loaded.throughput.as_f64(), 0.0);
        assert!(loaded.max_throughput.as_f64() > 0.0);
    }

    #[test]
    fn pc5_throughput_is_zero_without_cluster() {
        let model = TransmissionModel::with_settings(&test_settings());
        let transfer = model.nonsafety_over_pc5(Some(Decibel::new(15.0)), 0, 10.0);
        assert_eq!(transfer.throughput.as_f64(), 0.0);
        let transfer = model.nonsafety_over_pc5(None, 4, 10.0);
        assert_eq!(transfer.throughput.as_f64(), 0.0);
    }

    #[test]
    fn pc5_throughput_shrinks_with_cluster_size() {
        let model = TransmissionModel::with_settings(&test_settings());
        let few = model.nonsafety_over_pc5(Some(Decibel::new(15.0)), 2, 10.0);
        let many = model.nonsafety_over_pc5(Some(Decibel::new(15.0)), 8, 10.0);
        assert!(few.throughput.as_f64() > many.throughput.as_f64());
    }
}
