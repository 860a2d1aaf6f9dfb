use serde::Deserialize;

use dualink_core::model::{Model, ModelSettings};
use dualink_core::policy::Reward;

use crate::handover::{HandoverKind, HandoverStats};
use crate::transmission::TransmissionStats;

#[derive(Deserialize, Debug, Clone)]
pub struct RewardSettings {
    /// Latency at or below which the latency term earns full credit.
    pub latency_target_s: f64,
    pub safety_weight: f64,
    pub throughput_weight: f64,
    pub overhead_weight: f64,
    pub mcg_handover_penalty: f64,
    pub scg_change_penalty: f64,
    pub ping_pong_penalty: f64,
    pub interface_switch_penalty: f64,
}

impl ModelSettings for RewardSettings {}

/// Turns one step's KPIs into a bounded scalar training signal. The result is
/// always in [-1, 1]; degenerate inputs are coerced to safe scalars and any
/// non-finite intermediate collapses to a zero reward.
#[derive(Clone, Debug)]
pub struct RewardFunction {
    settings: RewardSettings,
}

impl Model for RewardFunction {
    type Settings = RewardSettings;

    fn with_settings(settings: &RewardSettings) -> Self {
        Self {
            settings: settings.clone(),
        }
    }
}

impl RewardFunction {
    pub fn settings(&self) -> &RewardSettings {
        &self.settings
    }

    pub fn compute(&self, tx: &TransmissionStats, ho: &HandoverStats) -> Reward {
        let pdr = coerce(tx.safety_pdr, 0.0).clamp(0.0, 1.0);
        let latency = coerce(tx.latency.as_f64(), self.settings.latency_target_s).max(0.0);
        let throughput = coerce(tx.throughput.as_f64(), 0.0).max(0.0);
        let max_throughput = coerce(tx.max_throughput.as_f64(), 0.0).max(0.0);

        let latency_reward = if latency <= self.settings.latency_target_s {
            1.0
        } else {
            (self.settings.latency_target_s / latency).min(1.0)
        };
        let safety_term = 0.5 * pdr + 0.5 * latency_reward;

        let throughput_term = if max_throughput > 0.0 {
            (throughput / max_throughput).min(1.0)
        } else {
            0.0
        };

        let mut overhead = match ho.kind {
            Some(HandoverKind::McgHandover) => self.settings.mcg_handover_penalty,
            Some(HandoverKind::ScgAdd) | Some(HandoverKind::ScgRemove) => {
                self.settings.scg_change_penalty
            }
            _ => 0.0,
        };
        if ho.ping_pong {
            overhead += self.settings.ping_pong_penalty;
        }
        if ho.interface_switch {
            overhead += self.settings.interface_switch_penalty;
        }

        let total = self.settings.safety_weight * safety_term
            + self.settings.throughput_weight * throughput_term
            - self.settings.overhead_weight * overhead;
        Reward::new(total as f32)
    }
}

fn coerce(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use crate::radio::metrics::{Latency, Mbps};

    use super::*;

    pub fn test_settings() -> RewardSettings {
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

    fn stats(pdr: f64, latency: f64, throughput: f64, max: f64) -> TransmissionStats {
        TransmissionStats::builder()
            .safety_sent(10)
            .safety_received((pdr * 10.0) as u32)
            .safety_pdr(pdr)
            .latency(Latency::new(latency))
            .throughput(Mbps::new(throughput))
            .max_throughput(Mbps::new(max))
            .build()
    }

    #[test]
    fn reward_is_bounded_for_degenerate_inputs() {
        let reward_fn = RewardFunction::with_settings(&test_settings());
        let degenerate = [
            stats(f64::NAN, f64::INFINITY, -5.0, 0.0),
            stats(7.0, -3.0, f64::NAN, f64::NEG_INFINITY),
            stats(0.0, 0.0, 0.0, 0.0),
        ];
        let handover = HandoverStats {
            kind: Some(HandoverKind::McgHandover),
            ping_pong: true,
            interface_switch: true,
        };
        for tx in &degenerate {
            let reward = reward_fn.compute(tx, &handover).as_f32();
            assert!((-1.0..=1.0).contains(&reward));
        }
    }

    #[test]
    fn good_step_beats_bad_step() {
        let reward_fn = RewardFunction::with_settings(&test_settings());
        let good = reward_fn.compute(&stats(0.98, 0.05, 40.0, 50.0), &HandoverStats::none());
        let bad = reward_fn.compute(
            &stats(0.1, 0.8, 0.0, 50.0),
            &HandoverStats {
                kind: Some(HandoverKind::McgHandover),
                ping_pong: true,
                interface_switch: false,
            },
        );
        assert!(good > bad);
    }

    #[test]
    fn ping_pong_is_penalized() {
        let reward_fn = RewardFunction::with_settings(&test_settings());
        let tx = stats(0.9, 0.05, 20.0, 50.0);
        let clean = reward_fn.compute(
            &tx,
            &HandoverStats {
                kind: Some(HandoverKind::McgHandover),
                ping_pong: false,
                interface_switch: false,
            },
        );
        let oscillating = reward_fn.compute(
            &tx,
            &HandoverStats {
                kind: Some(HandoverKind::McgHandover),
                ping_pong: true,
                interface_switch: false,
            },
        );
        assert!(clean > oscillating);
    }

    #[test]
    fn latency_within_target_earns_full_credit() {
        let reward_fn = RewardFunction::with_settings(&test_settings());
        let at_target = reward_fn.compute(&stats(1.0, 0.1, 0.0, 0.0), &HandoverStats::none());
        let under_target = reward_fn.compute(&stats(1.0, 0.01, 0.0, 0.0), &HandoverStats::none());
        assert_eq!(at_target, under_target);
    }
}
