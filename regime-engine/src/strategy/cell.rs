//! The six allocation cells indexed by regime

use crate::strategy::{TrendState, VolState};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Cell {
    BullLowVol,
    BullHighVol,
    SidewaysLowVol,
    SidewaysHighVol,
    BearLowVol,
    BearHighVol,
}

/// Base weights by role before overlay, hedge and leverage scaling.
///
/// `defensive` is filled with cash or the treasury overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellTemplate {
    pub leveraged: Decimal,
    pub core: Decimal,
    pub defensive: Decimal,
}

impl Cell {
    pub fn from_regime(trend: TrendState, vol: VolState) -> Self {
        match (trend, vol) {
            (TrendState::BullStrong, VolState::Low) => Cell::BullLowVol,
            (TrendState::BullStrong, VolState::High) => Cell::BullHighVol,
            (TrendState::Sideways, VolState::Low) => Cell::SidewaysLowVol,
            (TrendState::Sideways, VolState::High) => Cell::SidewaysHighVol,
            (TrendState::BearStrong, VolState::Low) => Cell::BearLowVol,
            (TrendState::BearStrong, VolState::High) => Cell::BearHighVol,
        }
    }

    /// 1-based cell number used in logs and snapshots
    pub fn id(self) -> u8 {
        match self {
            Cell::BullLowVol => 1,
            Cell::BullHighVol => 2,
            Cell::SidewaysLowVol => 3,
            Cell::SidewaysHighVol => 4,
            Cell::BearLowVol => 5,
            Cell::BearHighVol => 6,
        }
    }

    pub fn template(self) -> CellTemplate {
        let w = |leveraged: i64, core: i64, defensive: i64| CellTemplate {
            leveraged: Decimal::new(leveraged, 2),
            core: Decimal::new(core, 2),
            defensive: Decimal::new(defensive, 2),
        };
        match self {
            Cell::BullLowVol => w(60, 40, 0),
            Cell::BullHighVol => w(0, 100, 0),
            Cell::SidewaysLowVol => w(20, 80, 0),
            Cell::SidewaysHighVol => w(0, 0, 100),
            Cell::BearLowVol => w(0, 50, 50),
            Cell::BearHighVol => w(0, 0, 100),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cell {}", self.id())
    }
}
