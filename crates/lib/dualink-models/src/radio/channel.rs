use rand::Rng;
use serde::Deserialize;
use typed_builder::TypedBuilder;

use dualink_core::model::{Model, ModelSettings};

use crate::dist::zero_mean_gaussian;
use crate::mobility::Point2D;
use crate::radio::metrics::{Dbm, Decibel, LoadPercent};

/// Distance floor that keeps the log-distance path loss out of its
/// singularity near the transmitter.
pub const MIN_LINK_DISTANCE_M: f64 = 10.0;

/// Conservative substitutes reported when link geometry is missing or
/// degenerate. Callers fall back to these instead of propagating an error.
pub const FALLBACK_RSRP_DBM: f64 = -100.0;
pub const FALLBACK_SINR_DB: f64 = 0.0;

const RICIAN_K_MAX: f64 = 10.0;
const RICIAN_K_SLOPE_M: f64 = 50.0;

#[derive(Deserialize, Debug, Clone)]
pub struct ChannelSettings {
    pub carrier_ghz: f64,
    pub uu_bandwidth_mhz: f64,
    pub pc5_bandwidth_mhz: f64,
    pub noise_figure_db: f64,
    pub thermal_noise_dbm_hz: f64,
    /// Path loss at the 1 m reference distance. Derived from the carrier
    /// frequency when not configured explicitly.
    pub reference_loss_db: Option<f64>,
    pub path_loss_exponent_los: f64,
    pub path_loss_exponent_nlos: f64,
    pub shadow_sigma_los_db: f64,
    pub shadow_sigma_nlos_db: f64,
    pub pc5_tx_power_dbm: f64,
    pub uu_interference_factor: f64,
    pub pc5_interference_factor: f64,
}

impl ModelSettings for ChannelSettings {}

/// Interference context of a link. Uplink/downlink interference follows the
/// destination cell load, sidelink interference follows the local density of
/// transmitting neighbors.
#[derive(Clone, Copy, Debug)]
pub enum LinkContext {
    Uu { cell_load: LoadPercent },
    Pc5 { neighbor_count: usize },
}

/// Geometry of a single link at one time step.
#[derive(Clone, Copy, Debug, TypedBuilder)]
pub struct LinkGeometry {
    pub tx_position: Point2D,
    pub tx_height_m: f64,
    pub rx_position: Point2D,
    pub rx_height_m: f64,
    /// Forced propagation condition; sampled from the LoS probability curve
    /// when absent.
    #[builder(default = None)]
    pub los: Option<bool>,
}

#[derive(Clone, Copy, Debug)]
pub struct ChannelEstimate {
    pub rsrp: Dbm,
    pub sinr: Decibel,
    pub los: bool,
}

impl ChannelEstimate {
    /// The estimate callers substitute when no measurement can be made.
    pub fn fallback() -> Self {
        Self {
            rsrp: Dbm::new(FALLBACK_RSRP_DBM),
            sinr: Decibel::new(FALLBACK_SINR_DB),
            los: false,
        }
    }
}

/// Log-distance channel model with LoS-dependent shadowing and one
/// multiplicative fast-fading draw per assessment. Deterministic for a given
/// RNG state and inputs.
#[derive(Clone, Debug)]
pub struct ChannelModel {
    settings: ChannelSettings,
    reference_loss_db: f64,
}

impl Model for ChannelModel {
    type Settings = ChannelSettings;

    fn with_settings(settings: &ChannelSettings) -> Self {
        if settings.uu_bandwidth_mhz <= 0.0 || settings.pc5_bandwidth_mhz <= 0.0 {
            log::error!("Channel bandwidths must be positive.");
            panic!("Invalid channel settings.");
        }
        if settings.carrier_ghz <= 0.0 {
            log::error!("Carrier frequency must be positive.");
            panic!("Invalid channel settings.");
        }
        let reference_loss_db = settings
            .reference_loss_db
            .unwrap_or_else(|| 32.4 + 20.0 * settings.carrier_ghz.log10());
        Self {
            settings: settings.clone(),
            reference_loss_db,
        }
    }
}

impl ChannelModel {
    pub fn settings(&self) -> &ChannelSettings {
        &self.settings
    }

    pub fn pc5_tx_power(&self) -> Dbm {
        Dbm::new(self.settings.pc5_tx_power_dbm)
    }

    /// Assess one link and return its RSRP and SINR. Outputs are always
    /// finite; the distance floor and the load/density clamps keep every
    /// intermediate term inside its numeric domain.
    pub fn assess<R: Rng>(
        &self,
        rng: &mut R,
        geometry: &LinkGeometry,
        tx_power: Dbm,
        context: &LinkContext,
    ) -> ChannelEstimate {
        let distance = geometry
            .tx_position
            .distance_3d(
                geometry.tx_height_m,
                &geometry.rx_position,
                geometry.rx_height_m,
            )
            .max(MIN_LINK_DISTANCE_M);

        let los = match geometry.los {
            Some(flag) => flag,
            None => rng.gen::<f64>() < self.los_probability(context, distance),
        };

        let (exponent, shadow_sigma) = if los {
            (
                self.settings.path_loss_exponent_los,
                self.settings.shadow_sigma_los_db,
            )
        } else {
            (
                self.settings.path_loss_exponent_nlos,
                self.settings.shadow_sigma_nlos_db,
            )
        };

        let shadow = zero_mean_gaussian(rng, shadow_sigma);
        let path_loss = self.reference_loss_db + 10.0 * exponent * distance.log10() + shadow;
        let rx_power = tx_power.as_f64() - path_loss;

        let bandwidth_hz = self.bandwidth_hz(context);
        let resource_blocks = (bandwidth_hz / 180_000.0).max(1.0);
        let rsrp = rx_power - 10.0 * resource_blocks.log10();

        let noise = self.noise_floor(bandwidth_hz);
        let interference_mw = self.interference_mw(context, noise);
        let sinr = rx_power - Dbm::from_mw(noise.as_mw() + interference_mw).as_f64();
        let faded_sinr = sinr + fast_fading_db(rng, los, distance);

        ChannelEstimate {
            rsrp: Dbm::new(rsrp),
            sinr: Decibel::new(faded_sinr),
            los,
        }
    }

    /// Line-of-sight probability as a function of distance. Macro links lose
    /// LoS quickly with distance, short V2V links keep it much longer.
    pub fn los_probability(&self, context: &LinkContext, distance_m: f64) -> f64 {
        match context {
            LinkContext::Uu { .. } => {
                if distance_m <= 18.0 {
                    1.0
                } else {
                    let near = 18.0 / distance_m;
                    near + (-distance_m / 63.0).exp() * (1.0 - near)
                }
            }
            LinkContext::Pc5 { .. } => (-(distance_m - 10.0).max(0.0) / 150.0).exp(),
        }
    }

    pub fn noise_floor(&self, bandwidth_hz: f64) -> Dbm {
        Dbm::new(
            self.settings.thermal_noise_dbm_hz
                + 10.0 * bandwidth_hz.max(1.0).log10()
                + self.settings.noise_figure_db,
        )
    }

    fn bandwidth_hz(&self, context: &LinkContext) -> f64 {
        match context {
            LinkContext::Uu { .. } => self.settings.uu_bandwidth_mhz * 1e6,
            LinkContext::Pc5 { .. } => self.settings.pc5_bandwidth_mhz * 1e6,
        }
    }

    fn interference_mw(&self, context: &LinkContext, noise: Dbm) -> f64 {
        match context {
            LinkContext::Uu { cell_load } => {
                noise.as_mw() * cell_load.as_fraction() * self.settings.uu_interference_factor
            }
            LinkContext::Pc5 { neighbor_count } => {
                noise.as_mw() * *neighbor_count as f64 * self.settings.pc5_interference_factor
            }
        }
    }
}

/// One fast-fading power draw in dB. Rician under LoS with a K factor that
/// decreases with distance (floored at 1), Rayleigh under NLoS.
pub fn fast_fading_db<R: Rng>(rng: &mut R, los: bool, distance_m: f64) -> f64 {
    let (mean, sigma) = if los {
        let k = (RICIAN_K_MAX - distance_m / RICIAN_K_SLOPE_M).max(1.0);
        let mean = (k / (k + 1.0)).sqrt();
        let sigma = (1.0 / (2.0 * (k + 1.0))).sqrt();
        (mean, sigma)
    } else {
        (0.0, std::f64::consts::FRAC_1_SQRT_2)
    };
    let in_phase = mean + zero_mean_gaussian(rng, sigma);
    let quadrature = zero_mean_gaussian(rng, sigma);
    let gain = (in_phase.powi(2) + quadrature.powi(2)).max(1e-12);
    10.0 * gain.log10()
}

#[cfg(test)]
mod tests {
    use rand_pcg::Pcg64Mcg;

    use super::*;

    pub fn test_settings() -> ChannelSettings {
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

    fn geometry_at(distance_m: f64) -> LinkGeometry {
        LinkGeometry::builder()
            .tx_position(Point2D { x: 0.0, y: 0.0 })
            .tx_height_m(25.0)
            .rx_position(Point2D {
                x: distance_m,
                y: 0.0,
            })
            .rx_height_m(1.5)
            .los(Some(true))
            .build()
    }

    #[test]
    fn assessment_is_reproducible_bit_for_bit() {
        let model = ChannelModel::with_settings(&test_settings());
        let context = LinkContext::Uu {
            cell_load: LoadPercent::new(35.0),
        };
        let geometry = geometry_at(120.0);
        let mut first_rng = Pcg64Mcg::new(99);
        let mut second_rng = Pcg64Mcg::new(99);
        let first = model.assess(&mut first_rng, &geometry, Dbm::new(43.0), &context);
        let second = model.assess(&mut second_rng, &geometry, Dbm::new(43.0), &context);
        assert_eq!(first.rsrp.as_f64().to_bits(), second.rsrp.as_f64().to_bits());
        assert_eq!(first.sinr.as_f64().to_bits(), second.sinr.as_f64().to_bits());
    }

    #[test]
    fn outputs_are_finite_for_degenerate_geometry() {
        let model = ChannelModel::with_settings(&test_settings());
        let context = LinkContext::Pc5 { neighbor_count: 12 };
        // Zero distance collapses onto the 10 m floor instead of -inf loss.
        let geometry = LinkGeometry::builder()
            .tx_position(Point2D { x: 5.0, y: 5.0 })
            .tx_height_m(1.5)
            .rx_position(Point2D { x: 5.0, y: 5.0 })
            .rx_height_m(1.5)
            .build();
        let mut rng = Pcg64Mcg::new(3);
        for _ in 0..50 {
            let estimate = model.assess(&mut rng, &geometry, Dbm::new(23.0), &context);
            assert!(estimate.rsrp.as_f64().is_finite());
            assert!(estimate.sinr.as_f64().is_finite());
        }
    }

    #[test]
    fn los_probability_decreases_with_distance() {
        let model = ChannelModel::with_settings(&test_settings());
        let uu = LinkContext::Uu {
            cell_load: LoadPercent::default(),
        };
        let pc5 = LinkContext::Pc5 { neighbor_count: 0 };
        let mut last_uu = 1.0;
        let mut last_pc5 = 1.0;
        for distance in [10.0, 50.0, 100.0, 200.0, 500.0] {
            let p_uu = model.los_probability(&uu, distance);
            let p_pc5 = model.los_probability(&pc5, distance);
            assert!(p_uu <= last_uu + 1e-12);
            assert!(p_pc5 <= last_pc5 + 1e-12);
            // V2V links keep line of sight longer than macro links.
            assert!(p_pc5 >= p_uu - 1e-12);
            last_uu = p_uu;
            last_pc5 = p_pc5;
        }
    }

    #[test]
    fn load_raises_interference_and_lowers_sinr() {
        let model = ChannelModel::with_settings(&test_settings());
        let geometry = geometry_at(150.0);
        let mut averages = Vec::new();
        for load in [0.0, 50.0, 100.0] {
            let context = LinkContext::Uu {
                cell_load: LoadPercent::new(load),
            };
            let mut rng = Pcg64Mcg::new(1234);
            let mean: f64 = (0..200)
                .map(|_| {
                    model
                        .assess(&mut rng, &geometry, Dbm::new(43.0), &context)
                        .sinr
                        .as_f64()
                })
                .sum::<f64>()
                / 200.0;
            averages.push(mean);
        }
        assert!(averages[0] > averages[1]);
        assert!(averages[1] > averages[2]);
    }
}
