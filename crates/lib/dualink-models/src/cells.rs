use std::fmt::Display;
use std::str::FromStr;

use serde::Deserialize;
use typed_builder::TypedBuilder;

use crate::mobility::Point2D;
use crate::radio::metrics::{Dbm, LoadPercent};

/// A unique ID of a macro or small cell.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(u32);

impl Display for CellId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CellId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s.parse::<u32>()?;
        Ok(Self(id))
    }
}

impl From<u32> for CellId {
    fn from(f: u32) -> Self {
        Self(f)
    }
}

impl CellId {
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

#[derive(Deserialize, Debug, Hash, Copy, Default, Clone, PartialEq, Eq)]
pub enum CellKind {
    #[default]
    Macro,
    Small,
}

impl Display for CellKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellKind::Macro => write!(f, "Macro"),
            CellKind::Small => write!(f, "Small"),
        }
    }
}

/// A base station. Position, height and transmit power are fixed for the whole
/// run; only the load changes, written by the transmission model as vehicles
/// are processed in their fixed step order.
#[derive(Clone, Copy, Debug, TypedBuilder)]
pub struct Cell {
    pub id: CellId,
    pub kind: CellKind,
    pub position: Point2D,
    pub height_m: f64,
    pub tx_power: Dbm,
    #[builder(default)]
    pub load: LoadPercent,
}

impl Cell {
    pub fn is_macro(&self) -> bool {
        self.kind == CellKind::Macro
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_load_defaults_to_zero() {
        let cell = Cell::builder()
            .id(CellId::from(1))
            .kind(CellKind::Macro)
            .position(Point2D::default())
            .height_m(25.0)
            .tx_power(Dbm::new(43.0))
            .build();
        assert_eq!(cell.load.as_f64(), 0.0);
        assert!(cell.is_macro());
    }
}
