use serde::Deserialize;

use dualink_core::model::{Model, ModelSettings};

use crate::cells::CellId;
use crate::radio::metrics::{Dbm, Decibel};

#[derive(Deserialize, Debug, Clone)]
pub struct SelectorSettings {
    /// Base bias in favor of the serving cell.
    pub hysteresis_margin_db: f64,
    /// Margin growth per m/s of vehicle speed, as a fraction of the base.
    pub speed_margin_gain: f64,
    /// Margin multiplier applied inside intersection zones.
    pub intersection_margin_scale: f64,
    /// Candidates below this SINR are never selected.
    pub min_sinr_db: f64,
}

impl ModelSettings for SelectorSettings {}

/// A measured candidate cell, as seen by one vehicle at one step.
#[derive(Clone, Copy, Debug)]
pub struct CandidateCell {
    pub cell_id: CellId,
    pub rsrp: Dbm,
    pub sinr: Decibel,
}

/// Ranks candidate cells by RSRP with a context-aware hysteresis margin
/// favoring the serving cell. Fast vehicles get a larger margin so that they
/// do not chase short-lived gains; the margin shrinks near intersections
/// where coverage changes quickly.
#[derive(Clone, Debug)]
pub struct CellSelector {
    settings: SelectorSettings,
}

impl Model for CellSelector {
    type Settings = SelectorSettings;

    fn with_settings(settings: &SelectorSettings) -> Self {
        Self {
            settings: settings.clone(),
        }
    }
}

impl CellSelector {
    pub fn settings(&self) -> &SelectorSettings {
        &self.settings
    }

    pub fn margin_for(&self, speed_mps: f64, near_intersection: bool) -> Decibel {
        let mut margin = self.settings.hysteresis_margin_db
            * (1.0 + self.settings.speed_margin_gain * speed_mps.max(0.0));
        if near_intersection {
            margin *= self.settings.intersection_margin_scale;
        }
        Decibel::new(margin)
    }

    /// Pick a handover target among the candidates. Returns None when no
    /// candidate beats the serving cell by more than the margin, when the
    /// best candidate is the serving cell itself, or when nothing meets the
    /// minimum SINR.
    pub fn select(
        &self,
        serving: Option<&CandidateCell>,
        candidates: &[CandidateCell],
        speed_mps: f64,
        near_intersection: bool,
    ) -> Option<CandidateCell> {
        let best = candidates
            .iter()
            .filter(|candidate| candidate.sinr.as_f64() >= self.settings.min_sinr_db)
            .max_by(|a, b| {
                a.rsrp
                    .partial_cmp(&b.rsrp)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })?;

        match serving {
            Some(current) => {
                if best.cell_id == current.cell_id {
                    return None;
                }
                let margin = self.margin_for(speed_mps, near_intersection);
                if best.rsrp.as_f64() > current.rsrp.as_f64() + margin.as_f64() {
                    Some(*best)
                } else {
                    None
                }
            }
            None => Some(*best),
        }
    }
}
