//! Target allocations: cell templates turned into per-symbol weights

use crate::config::RegimeConfig;
use crate::strategy::Cell;
use crate::{Error, Result};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Decimal places kept on normalized weights
pub const WEIGHT_DP: u32 = 6;

/// Share of a defensive sleeve that may move into bonds
const BOND_SHARE_OF_DEFENSIVE: Decimal = Decimal::from_parts(4, 0, 0, false, 1);

/// Symbol -> weight in [0, 1]. Cash is the implicit remainder, so weights
/// plus cash always sum to exactly one.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Allocation {
    weights: BTreeMap<String, Decimal>,
}

impl Allocation {
    /// Build from weights, dropping zero legs
    pub fn new(weights: BTreeMap<String, Decimal>) -> Result<Self> {
        let mut kept = BTreeMap::new();
        for (symbol, weight) in weights {
            if weight < Decimal::ZERO || weight > Decimal::ONE {
                return Err(Error::execution(format!("weight {} for {} outside [0, 1]", weight, symbol)));
            }
            if !weight.is_zero() {
                kept.insert(symbol, weight);
            }
        }
        let allocation = Self { weights: kept };
        if allocation.invested() > Decimal::ONE {
            return Err(Error::execution(format!(
                "allocation invests {} > 1",
                allocation.invested()
            )));
        }
        Ok(allocation)
    }

    pub fn cash_only() -> Self {
        Self::default()
    }

    pub fn weight(&self, symbol: &str) -> Decimal {
        self.weights.get(symbol).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn weights(&self) -> &BTreeMap<String, Decimal> {
        &self.weights
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.weights.keys().map(String::as_str)
    }

    /// Sum of instrument weights
    pub fn invested(&self) -> Decimal {
        self.weights.values().copied().sum()
    }

    /// Implicit cash weight
    pub fn cash(&self) -> Decimal {
        Decimal::ONE - self.invested()
    }
}

impl fmt::Display for Allocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let legs: Vec<String> = self
            .weights
            .iter()
            .map(|(symbol, w)| format!("{}={}", symbol, w.normalize()))
            .collect();
        write!(f, "{{{}, cash={}}}", legs.join(", "), self.cash().normalize())
    }
}

/// Direction of the bond-trend instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BondTrend {
    Bull,
    Bear,
}

/// One weighted leg before normalization
#[derive(Debug, Clone, PartialEq)]
struct Leg {
    symbol: String,
    weight: Decimal,
    /// Subject to the leverage scalar (leveraged, core, hedge)
    scaled: bool,
}

/// Turn a cell into symbol weights.
///
/// Applies the inverse hedge (cell 6 only, overrides the overlay), the
/// treasury overlay on the defensive sleeve, the leverage scalar, and a
/// final normalization so that weights plus cash sum to one.
pub fn build_allocation(cell: Cell, config: &RegimeConfig, bond_trend: Option<BondTrend>) -> Allocation {
    let template = cell.template();
    let mut legs = vec![
        Leg {
            symbol: config.leveraged_symbol.clone(),
            weight: template.leveraged,
            scaled: true,
        },
        Leg {
            symbol: config.core_symbol.clone(),
            weight: template.core,
            scaled: true,
        },
    ];
    let mut cash = template.defensive;

    if cell == Cell::BearHighVol && config.use_inverse_hedge {
        let hedge = config.max_inverse_hedge.min(cash);
        legs.push(Leg {
            symbol: config.hedge_symbol.clone(),
            weight: hedge,
            scaled: true,
        });
        cash -= hedge;
    } else if cash > Decimal::ZERO && config.allow_treasury {
        if let Some(trend) = bond_trend {
            let bond = (cash * BOND_SHARE_OF_DEFENSIVE).min(config.max_bond_weight);
            let symbol = match trend {
                BondTrend::Bull => config.bull_bond_symbol.clone(),
                BondTrend::Bear => config.bear_bond_symbol.clone(),
            };
            legs.push(Leg {
                symbol,
                weight: bond,
                scaled: false,
            });
            cash -= bond;
        }
    }

    for leg in legs.iter_mut().filter(|l| l.scaled) {
        leg.weight *= config.leverage_scalar;
    }

    normalize(legs, cash)
}

/// Rescale legs and cash to sum to one. Weights are truncated to
/// [`WEIGHT_DP`] places so the cash remainder is never negative.
fn normalize(legs: Vec<Leg>, cash: Decimal) -> Allocation {
    let total: Decimal = legs.iter().map(|l| l.weight).sum::<Decimal>() + cash;
    if total <= Decimal::ZERO {
        return Allocation::cash_only();
    }

    let mut weights: BTreeMap<String, Decimal> = BTreeMap::new();
    for leg in legs {
        if leg.weight.is_zero() {
            continue;
        }
        *weights.entry(leg.symbol).or_insert(Decimal::ZERO) += leg.weight;
    }
    for weight in weights.values_mut() {
        *weight = (*weight / total).round_dp_with_strategy(WEIGHT_DP, RoundingStrategy::ToZero);
    }
    weights.retain(|_, w| !w.is_zero());

    Allocation { weights }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_cell1_default_weights() {
        let allocation = build_allocation(Cell::BullLowVol, &RegimeConfig::default(), None);
        assert_eq!(allocation.weight("TQQQ"), dec("0.6"));
        assert_eq!(allocation.weight("QQQ"), dec("0.4"));
        assert_eq!(allocation.cash(), Decimal::ZERO);
    }

    #[test]
    fn test_defensive_without_bond_data_is_cash() {
        let allocation = build_allocation(Cell::SidewaysHighVol, &RegimeConfig::default(), None);
        assert!(allocation.weights().is_empty());
        assert_eq!(allocation.cash(), Decimal::ONE);
    }

    #[test]
    fn test_treasury_overlay_caps_bond_weight() {
        let config = RegimeConfig::default();
        let allocation = build_allocation(Cell::SidewaysHighVol, &config, Some(BondTrend::Bull));
        assert_eq!(allocation.weight("TMF"), dec("0.4"));
        assert_eq!(allocation.cash(), dec("0.6"));

        let tight = RegimeConfig {
            max_bond_weight: dec("0.1"),
            ..RegimeConfig::default()
        };
        let allocation = build_allocation(Cell::BearLowVol, &tight, Some(BondTrend::Bear));
        assert_eq!(allocation.weight("TMV"), dec("0.1"));
        assert_eq!(allocation.weight("QQQ"), dec("0.5"));
        assert_eq!(allocation.cash(), dec("0.4"));
    }

    #[test]
    fn test_overlay_disabled() {
        let config = RegimeConfig {
            allow_treasury: false,
            ..RegimeConfig::default()
        };
        let allocation = build_allocation(Cell::BearLowVol, &config, Some(BondTrend::Bull));
        assert_eq!(allocation.weight("TMF"), Decimal::ZERO);
        assert_eq!(allocation.cash(), dec("0.5"));
    }

    #[test]
    fn test_inverse_hedge_takes_priority_over_bonds() {
        let config = RegimeConfig {
            use_inverse_hedge: true,
            ..RegimeConfig::default()
        };
        let allocation = build_allocation(Cell::BearHighVol, &config, Some(BondTrend::Bull));
        assert_eq!(allocation.weight("PSQ"), dec("0.3"));
        assert_eq!(allocation.weight("TMF"), Decimal::ZERO);
        assert_eq!(allocation.cash(), dec("0.7"));

        // the hedge only applies to cell 6
        let allocation = build_allocation(Cell::SidewaysHighVol, &config, Some(BondTrend::Bull));
        assert_eq!(allocation.weight("PSQ"), Decimal::ZERO);
        assert_eq!(allocation.weight("TMF"), dec("0.4"));
    }

    #[test]
    fn test_leverage_scalar_renormalizes() {
        let config = RegimeConfig {
            leverage_scalar: dec("1.5"),
            allow_treasury: false,
            ..RegimeConfig::default()
        };
        // core 0.5 * 1.5 = 0.75 against 0.5 cash
        let allocation = build_allocation(Cell::BearLowVol, &config, None);
        assert_eq!(allocation.weight("QQQ"), dec("0.6"));
        assert_eq!(allocation.cash(), dec("0.4"));

        // fully invested cells are unchanged by scaling
        let allocation = build_allocation(Cell::BullLowVol, &config, None);
        assert_eq!(allocation.weight("TQQQ"), dec("0.6"));
        assert_eq!(allocation.weight("QQQ"), dec("0.4"));
    }

    #[test]
    fn test_weights_and_cash_sum_to_one() {
        let cells = [
            Cell::BullLowVol,
            Cell::BullHighVol,
            Cell::SidewaysLowVol,
            Cell::SidewaysHighVol,
            Cell::BearLowVol,
            Cell::BearHighVol,
        ];
        for scalar in ["0.5", "0.7", "1", "1.3", "1.5"] {
            for hedge in [false, true] {
                for cell in cells {
                    for bond in [None, Some(BondTrend::Bull), Some(BondTrend::Bear)] {
                        let config = RegimeConfig {
                            leverage_scalar: dec(scalar),
                            use_inverse_hedge: hedge,
                            ..RegimeConfig::default()
                        };
                        let allocation = build_allocation(cell, &config, bond);
                        assert_eq!(allocation.invested() + allocation.cash(), Decimal::ONE);
                        assert!(allocation.cash() >= Decimal::ZERO);
                        assert!(allocation.weights().values().all(|w| *w > Decimal::ZERO && *w <= Decimal::ONE));
                    }
                }
            }
        }
    }

    #[test]
    fn test_allocation_validation() {
        let mut weights = BTreeMap::new();
        weights.insert("QQQ".to_string(), dec("0.7"));
        weights.insert("TLT".to_string(), dec("0.4"));
        assert!(Allocation::new(weights).is_err());

        let mut weights = BTreeMap::new();
        weights.insert("QQQ".to_string(), dec("0.7"));
        weights.insert("TLT".to_string(), Decimal::ZERO);
        let allocation = Allocation::new(weights).unwrap();
        assert_eq!(allocation.symbols().collect::<Vec<_>>(), vec!["QQQ"]);
        assert_eq!(allocation.to_string(), "{QQQ=0.7, cash=0.3}");
    }
}
