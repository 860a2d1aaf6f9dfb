use std::fmt::Display;

use log::warn;
use serde::Deserialize;
use typed_builder::TypedBuilder;

use dualink_core::bucket::TimeMS;
use dualink_core::model::{Model, ModelSettings};
use dualink_core::policy::ActionCode;

use crate::cells::CellId;
use crate::radio::metrics::{Decibel, LoadPercent};
use crate::select::{CandidateCell, CellSelector};

/// Capacity of the per-vehicle handover history ring buffer.
pub const HISTORY_CAPACITY: usize = 5;

/// The radio interface carrying one traffic class.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RadioInterface {
    #[default]
    Uu,
    Pc5,
}

impl Display for RadioInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RadioInterface::Uu => write!(f, "Uu"),
            RadioInterface::Pc5 => write!(f, "PC5"),
        }
    }
}

/// The mutating transitions of the decision engine. The numeric codes match
/// the action indices exposed to the policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HandoverKind {
    McgHandover,
    ScgAdd,
    ScgRemove,
    SafetyToUu,
    SafetyToPc5,
    NonSafetyToUu,
    NonSafetyToPc5,
}

impl HandoverKind {
    pub fn code(&self) -> u8 {
        match self {
            HandoverKind::McgHandover => 1,
            HandoverKind::ScgAdd => 2,
            HandoverKind::ScgRemove => 3,
            HandoverKind::SafetyToUu => 4,
            HandoverKind::SafetyToPc5 => 5,
            HandoverKind::NonSafetyToUu => 6,
            HandoverKind::NonSafetyToPc5 => 7,
        }
    }

    pub fn is_interface_switch(&self) -> bool {
        matches!(
            self,
            HandoverKind::SafetyToUu
                | HandoverKind::SafetyToPc5
                | HandoverKind::NonSafetyToUu
                | HandoverKind::NonSafetyToPc5
        )
    }
}

#[derive(Clone, Copy, Debug)]
pub struct HandoverRecord {
    pub time: TimeMS,
    pub kind: HandoverKind,
    pub from_cell: Option<CellId>,
    pub to_cell: Option<CellId>,
}

/// Fixed-capacity ring buffer of the most recent handover records. New
/// entries overwrite the oldest once the capacity is reached.
#[derive(Clone, Debug, Default)]
pub struct HandoverHistory {
    records: [Option<HandoverRecord>; HISTORY_CAPACITY],
    head: usize,
    len: usize,
}

impl HandoverHistory {
    pub fn push(&mut self, record: HandoverRecord) {
        self.records[self.head] = Some(record);
        self.head = (self.head + 1) % HISTORY_CAPACITY;
        self.len = (self.len + 1).min(HISTORY_CAPACITY);
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &HandoverRecord> {
        self.records.iter().filter_map(|record| record.as_ref())
    }

    /// True when the target cell appears in a record younger than the window.
    pub fn seen_within(&self, target: CellId, window: TimeMS, now: TimeMS) -> bool {
        self.iter().any(|record| {
            let age = now.saturating_sub(record.time);
            age <= window
                && (record.from_cell == Some(target) || record.to_cell == Some(target))
        })
    }
}

/// The connectivity state the engine mutates. The state machine of the
/// decision engine is implicit in these four fields.
#[derive(Clone, Debug)]
pub struct Connectivity {
    pub serving_macro: Option<CellId>,
    pub serving_small: Option<CellId>,
    pub safety_interface: RadioInterface,
    pub nonsafety_interface: RadioInterface,
    pub history: HandoverHistory,
    pub last_handover_at: Option<TimeMS>,
}

impl Default for Connectivity {
    fn default() -> Self {
        Self {
            serving_macro: None,
            serving_small: None,
            safety_interface: RadioInterface::Pc5,
            nonsafety_interface: RadioInterface::Uu,
            history: HandoverHistory::default(),
            last_handover_at: None,
        }
    }
}

/// Per-step decision outcome handed to the reward function and the output.
#[derive(Clone, Copy, Debug, Default)]
pub struct HandoverStats {
    pub kind: Option<HandoverKind>,
    pub ping_pong: bool,
    pub interface_switch: bool,
}

impl HandoverStats {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn action_code(&self) -> u8 {
        self.kind.map(|kind| kind.code()).unwrap_or(0)
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct HandoverSettings {
    /// Minimum time between two mutating transitions of one vehicle.
    pub min_interval: TimeMS,
    /// Window within which returning to a recent cell counts as ping-pong.
    pub ping_pong_window: TimeMS,
    /// Macro SINR below which a secondary cell may be added.
    pub scg_add_sinr_db: f64,
    /// Added to the SCG-add threshold inside intersection zones.
    pub scg_add_intersection_relax_db: f64,
    /// Macro SINR above which the secondary cell is released.
    pub scg_remove_sinr_db: f64,
    /// PC5 average SINR below which the sidelink counts as poor.
    pub pc5_poor_sinr_db: f64,
    /// PC5 average SINR above which the sidelink counts as good.
    pub pc5_good_sinr_db: f64,
    /// Uu SINR required before safety traffic moves to the cellular link.
    pub uu_adequate_sinr_db: f64,
    /// Cell load beyond which non-safety traffic prefers the sidelink.
    pub high_load_percent: f64,
    /// Cell load beyond which safety traffic on Uu blocks non-safety joins.
    pub uu_saturation_load_percent: f64,
    pub selector: crate::select::SelectorSettings,
}

impl ModelSettings for HandoverSettings {}

/// Measurements feeding one decision.
#[derive(Clone, Debug, TypedBuilder)]
pub struct DecisionContext {
    pub now: TimeMS,
    pub speed_mps: f64,
    pub near_intersection: bool,
    /// Measurement of the serving macro cell, if one is attached.
    #[builder(default = None)]
    pub macro_serving: Option<CandidateCell>,
    #[builder(default)]
    pub macro_candidates: Vec<CandidateCell>,
    #[builder(default)]
    pub small_candidates: Vec<CandidateCell>,
    #[builder(default = None)]
    pub pc5_avg_sinr: Option<Decibel>,
    #[builder(default)]
    pub cluster_size: usize,
    #[builder(default)]
    pub serving_load: LoadPercent,
}

/// The hysteresis- and context-aware state machine mutating a vehicle's
/// connectivity. Branches whose preconditions fail are silent no-ops; every
/// mutating branch records itself in the history and refreshes the handover
/// timer.
#[derive(Clone, Debug)]
pub struct HandoverEngine {
    settings: HandoverSettings,
    selector: CellSelector,
}

impl Model for HandoverEngine {
    type Settings = HandoverSettings;

    fn with_settings(settings: &HandoverSettings) -> Self {
        if settings.scg_remove_sinr_db <= settings.scg_add_sinr_db {
            log::error!("SCG thresholds must be hysteresis-separated.");
            panic!("scg_remove_sinr_db must exceed scg_add_sinr_db.");
        }
        Self {
            settings: settings.clone(),
            selector: CellSelector::with_settings(&settings.selector),
        }
    }
}

impl HandoverEngine {
    pub fn settings(&self) -> &HandoverSettings {
        &self.settings
    }

    pub fn apply(
        &self,
        connectivity: &mut Connectivity,
        action: ActionCode,
        ctx: &DecisionContext,
    ) -> HandoverStats {
        if self.within_min_interval(connectivity, ctx.now) {
            return HandoverStats::none();
        }
        match action.as_u8() {
            1 => self.mcg_handover(connectivity, ctx),
            2 => self.scg_add(connectivity, ctx),
            3 => self.scg_remove(connectivity, ctx),
            4 => self.safety_switch(connectivity, ctx, RadioInterface::Uu),
            5 => self.safety_switch(connectivity, ctx, RadioInterface::Pc5),
            6 => self.nonsafety_switch(connectivity, ctx, RadioInterface::Uu),
            7 => self.nonsafety_switch(connectivity, ctx, RadioInterface::Pc5),
            8 => HandoverStats::none(),
            other => {
                warn!("Ignoring unknown action code {}.", other);
                HandoverStats::none()
            }
        }
    }

    fn within_min_interval(&self, connectivity: &Connectivity, now: TimeMS) -> bool {
        match connectivity.last_handover_at {
            Some(last) => now.saturating_sub(last) < self.settings.min_interval,
            None => false,
        }
    }

    fn mcg_handover(&self, connectivity: &mut Connectivity, ctx: &DecisionContext) -> HandoverStats {
        let target = match self.selector.select(
            ctx.macro_serving.as_ref(),
            &ctx.macro_candidates,
            ctx.speed_mps,
            ctx.near_intersection,
        ) {
            Some(target) => target,
            None => return HandoverStats::none(),
        };
        if connectivity.serving_macro == Some(target.cell_id) {
            return HandoverStats::none();
        }

        let ping_pong = connectivity.history.seen_within(
            target.cell_id,
            self.settings.ping_pong_window,
            ctx.now,
        );
        let from_cell = connectivity.serving_macro;
        connectivity.serving_macro = Some(target.cell_id);
        self.commit(
            connectivity,
            ctx.now,
            HandoverKind::McgHandover,
            from_cell,
            Some(target.cell_id),
        );
        HandoverStats {
            kind: Some(HandoverKind::McgHandover),
            ping_pong,
            interface_switch: false,
        }
    }

    fn scg_add(&self, connectivity: &mut Connectivity, ctx: &DecisionContext) -> HandoverStats {
        // SCG requires MCG: a small cell can only exist under a macro anchor.
        if connectivity.serving_macro.is_none() || connectivity.serving_small.is_some() {
            return HandoverStats::none();
        }
        let macro_sinr = match ctx.macro_serving {
            Some(serving) => serving.sinr.as_f64(),
            None => return HandoverStats::none(),
        };
        let mut threshold = self.settings.scg_add_sinr_db;
        if ctx.near_intersection {
            threshold += self.settings.scg_add_intersection_relax_db;
        }
        if macro_sinr >= threshold {
            return HandoverStats::none();
        }
        let target = match self.selector.select(
            None,
            &ctx.small_candidates,
            ctx.speed_mps,
            ctx.near_intersection,
        ) {
            Some(target) => target,
            None => return HandoverStats::none(),
        };
        connectivity.serving_small = Some(target.cell_id);
        self.commit(
            connectivity,
            ctx.now,
            HandoverKind::ScgAdd,
            None,
            Some(target.cell_id),
        );
        HandoverStats {
            kind: Some(HandoverKind::ScgAdd),
            ping_pong: false,
            interface_switch: false,
        }
    }

    fn scg_remove(&self, connectivity: &mut Connectivity, ctx: &DecisionContext) -> HandoverStats {
        let small = match connectivity.serving_small {
            Some(small) => small,
            None => return HandoverStats::none(),
        };
        let macro_sinr = match ctx.macro_serving {
            Some(serving) => serving.sinr.as_f64(),
            None => return HandoverStats::none(),
        };
        if macro_sinr <= self.settings.scg_remove_sinr_db {
            return HandoverStats::none();
        }
        connectivity.serving_small = None;
        self.commit(
            connectivity,
            ctx.now,
            HandoverKind::ScgRemove,
            Some(small),
            None,
        );
        HandoverStats {
            kind: Some(HandoverKind::ScgRemove),
            ping_pong: false,
            interface_switch: false,
        }
    }

    fn safety_switch(
        &self,
        connectivity: &mut Connectivity,
        ctx: &DecisionContext,
        to: RadioInterface,
    ) -> HandoverStats {
        if connectivity.safety_interface == to {
            return HandoverStats::none();
        }
        let allowed = match to {
            RadioInterface::Uu => {
                let pc5_poor = match ctx.pc5_avg_sinr {
                    Some(sinr) => sinr.as_f64() < self.settings.pc5_poor_sinr_db,
                    None => true,
                };
                let uu_adequate = ctx
                    .macro_serving
                    .map(|serving| serving.sinr.as_f64() >= self.settings.uu_adequate_sinr_db)
                    .unwrap_or(false);
                pc5_poor && uu_adequate
            }
            RadioInterface::Pc5 => ctx
                .pc5_avg_sinr
                .map(|sinr| sinr.as_f64() >= self.settings.pc5_good_sinr_db)
                .unwrap_or(false),
        };
        if !allowed {
            return HandoverStats::none();
        }
        connectivity.safety_interface = to;
        let kind = match to {
            RadioInterface::Uu => HandoverKind::SafetyToUu,
            RadioInterface::Pc5 => HandoverKind::SafetyToPc5,
        };
        self.commit(connectivity, ctx.now, kind, None, None);
        HandoverStats {
            kind: Some(kind),
            ping_pong: false,
            interface_switch: true,
        }
    }

    fn nonsafety_switch(
        &self,
        connectivity: &mut Connectivity,
        ctx: &DecisionContext,
        to: RadioInterface,
    ) -> HandoverStats {
        if connectivity.nonsafety_interface == to {
            return HandoverStats::none();
        }
        let allowed = match to {
            RadioInterface::Uu => {
                let uu_usable = connectivity.serving_macro.is_some()
                    && ctx
                        .macro_serving
                        .map(|serving| serving.sinr.as_f64() >= 0.0)
                        .unwrap_or(false);
                let safety_saturates_uu = connectivity.safety_interface == RadioInterface::Uu
                    && ctx.serving_load.as_f64() > self.settings.uu_saturation_load_percent;
                uu_usable && !safety_saturates_uu
            }
            RadioInterface::Pc5 => {
                let load_high = ctx.serving_load.as_f64() > self.settings.high_load_percent;
                let pc5_good = ctx
                    .pc5_avg_sinr
                    .map(|sinr| sinr.as_f64() >= self.settings.pc5_good_sinr_db)
                    .unwrap_or(false);
                load_high || pc5_good
            }
        };
        if !allowed {
            return HandoverStats::none();
        }
        connectivity.nonsafety_interface = to;
        let kind = match to {
            RadioInterface::Uu => HandoverKind::NonSafetyToUu,
            RadioInterface::Pc5 => HandoverKind::NonSafetyToPc5,
        };
        self.commit(connectivity, ctx.now, kind, None, None);
        HandoverStats {
            kind: Some(kind),
            ping_pong: false,
            interface_switch: true,
        }
    }

    fn commit(
        &self,
        connectivity: &mut Connectivity,
        now: TimeMS,
        kind: HandoverKind,
        from_cell: Option<CellId>,
        to_cell: Option<CellId>,
    ) {
        connectivity.history.push(HandoverRecord {
            time: now,
            kind,
            from_cell,
            to_cell,
        });
        connectivity.last_handover_at = Some(now);
    }
}
