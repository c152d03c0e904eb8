//! Regime allocation strategy configuration

use crate::{Error, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Parameters of one regime allocation strategy.
///
/// Every field has a default, so a config file only lists overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegimeConfig {
    /// Instrument whose bars drive the trend and volatility signals
    pub signal_symbol: String,
    /// 3x leveraged long instrument
    pub leveraged_symbol: String,
    /// 1x long instrument
    pub core_symbol: String,
    /// Inverse hedge instrument
    pub hedge_symbol: String,
    /// Bond instrument whose trend picks the safe haven
    pub bond_trend_symbol: String,
    /// Safe haven when bonds trend up
    pub bull_bond_symbol: String,
    /// Safe haven when bonds trend down
    pub bear_bond_symbol: String,
    /// Buy-and-hold comparison instrument (defaults to the core instrument)
    pub baseline_symbol: Option<String>,
    /// Starting cash of a fresh strategy book
    pub initial_capital: Decimal,

    /// Structural filter fast SMA
    pub sma_fast: usize,
    /// Structural filter slow SMA
    pub sma_slow: usize,

    /// Bar-to-bar changes measured by the adaptive trend filter
    pub trend_lookback: usize,
    /// Trend strength that maps to T_norm = 1
    pub t_max: f64,
    pub bull_threshold: f64,
    pub bear_threshold: f64,

    /// Realized volatility window (daily returns)
    pub vol_window: usize,
    /// Rolling baseline of realized volatility values for the z-score
    pub vol_baseline_window: usize,
    /// z-score above which volatility turns High
    pub upper_z: f64,
    /// z-score below which volatility turns Low
    pub lower_z: f64,
    /// Fractional volatility drop that counts as a crush (0.15 = -15%)
    pub vol_crush_threshold: f64,
    /// Bars over which the crush is measured
    pub vol_crush_lookback: usize,

    pub cell1_exit_confirmation_enabled: bool,
    pub cell1_exit_confirmation_days: u32,

    /// Replace defensive cash with a bond instrument
    pub allow_treasury: bool,
    pub bond_sma_fast: usize,
    pub bond_sma_slow: usize,
    /// Global cap on the bond weight
    pub max_bond_weight: Decimal,

    /// Hold a capped inverse hedge in (BearStrong, High)
    pub use_inverse_hedge: bool,
    pub max_inverse_hedge: Decimal,

    /// Multiplier on leveraged/core/hedge weights, in [0.5, 1.5]
    pub leverage_scalar: Decimal,
    /// Summed absolute weight deviation that triggers a rebalance
    pub rebalance_threshold: Decimal,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            signal_symbol: "QQQ".to_string(),
            leveraged_symbol: "TQQQ".to_string(),
            core_symbol: "QQQ".to_string(),
            hedge_symbol: "PSQ".to_string(),
            bond_trend_symbol: "TLT".to_string(),
            bull_bond_symbol: "TMF".to_string(),
            bear_bond_symbol: "TMV".to_string(),
            baseline_symbol: None,
            initial_capital: Decimal::from(10_000),
            sma_fast: 40,
            sma_slow: 140,
            trend_lookback: 20,
            t_max: 60.0,
            bull_threshold: 0.3,
            bear_threshold: -0.3,
            vol_window: 21,
            vol_baseline_window: 126,
            upper_z: 1.0,
            lower_z: 0.2,
            vol_crush_threshold: 0.15,
            vol_crush_lookback: 5,
            cell1_exit_confirmation_enabled: false,
            cell1_exit_confirmation_days: 2,
            allow_treasury: true,
            bond_sma_fast: 20,
            bond_sma_slow: 60,
            max_bond_weight: Decimal::new(4, 1),
            use_inverse_hedge: false,
            max_inverse_hedge: Decimal::new(3, 1),
            leverage_scalar: Decimal::ONE,
            rebalance_threshold: Decimal::new(25, 3),
        }
    }
}

impl RegimeConfig {
    /// Validate structural invariants of the parameters
    pub fn validate(&self) -> Result<()> {
        let symbols = [
            ("signal_symbol", &self.signal_symbol),
            ("leveraged_symbol", &self.leveraged_symbol),
            ("core_symbol", &self.core_symbol),
            ("hedge_symbol", &self.hedge_symbol),
            ("bond_trend_symbol", &self.bond_trend_symbol),
            ("bull_bond_symbol", &self.bull_bond_symbol),
            ("bear_bond_symbol", &self.bear_bond_symbol),
        ];
        for (field, symbol) in symbols {
            if symbol.trim().is_empty() {
                return Err(Error::config(format!("{} cannot be empty", field)));
            }
        }
        if self.initial_capital <= Decimal::ZERO {
            return Err(Error::config("initial_capital must be positive"));
        }
        if self.sma_fast == 0 || self.sma_fast >= self.sma_slow {
            return Err(Error::config(format!(
                "sma_fast ({}) must be positive and below sma_slow ({})",
                self.sma_fast, self.sma_slow
            )));
        }
        if self.trend_lookback == 0 || !(self.t_max > 0.0) {
            return Err(Error::config("trend_lookback and t_max must be positive"));
        }
        if !(self.bull_threshold > 0.0 && self.bear_threshold < 0.0)
            || self.bull_threshold > 1.0
            || self.bear_threshold < -1.0
        {
            return Err(Error::config(format!(
                "thresholds must satisfy 1 >= bull ({}) > 0 > bear ({}) >= -1",
                self.bull_threshold, self.bear_threshold
            )));
        }
        if self.vol_window < 2 || self.vol_baseline_window < 2 {
            return Err(Error::config("vol_window and vol_baseline_window must be at least 2"));
        }
        if !(self.lower_z < self.upper_z) {
            return Err(Error::config(format!(
                "lower_z ({}) must be below upper_z ({})",
                self.lower_z, self.upper_z
            )));
        }
        if !(self.vol_crush_threshold > 0.0 && self.vol_crush_threshold < 1.0) || self.vol_crush_lookback == 0 {
            return Err(Error::config("vol crush threshold must be in (0, 1) with a positive lookback"));
        }
        if self.cell1_exit_confirmation_enabled && self.cell1_exit_confirmation_days == 0 {
            return Err(Error::config("cell1_exit_confirmation_days must be at least 1 when enabled"));
        }
        if self.allow_treasury && (self.bond_sma_fast == 0 || self.bond_sma_fast >= self.bond_sma_slow) {
            return Err(Error::config("bond_sma_fast must be positive and below bond_sma_slow"));
        }
        let unit = Decimal::ZERO..=Decimal::ONE;
        if !unit.contains(&self.max_bond_weight) || !unit.contains(&self.max_inverse_hedge) {
            return Err(Error::config("max_bond_weight and max_inverse_hedge must be in [0, 1]"));
        }
        if !unit.contains(&self.rebalance_threshold) {
            return Err(Error::config("rebalance_threshold must be in [0, 1]"));
        }
        if !(Decimal::new(5, 1)..=Decimal::new(15, 1)).contains(&self.leverage_scalar) {
            return Err(Error::config(format!(
                "leverage_scalar {} outside [0.5, 1.5]",
                self.leverage_scalar
            )));
        }
        Ok(())
    }

    /// Signal bars needed before the first non-trivial step
    pub fn warmup_bars(&self) -> usize {
        self.sma_slow
            .max(self.vol_window + self.vol_baseline_window)
            .max(self.vol_window + 1 + self.vol_crush_lookback)
            .max(self.trend_lookback + 1)
    }

    /// Bond-trend bars needed for the treasury overlay
    pub fn bond_warmup_bars(&self) -> usize {
        self.bond_sma_slow
    }

    pub fn baseline_symbol(&self) -> &str {
        self.baseline_symbol.as_deref().unwrap_or(&self.core_symbol)
    }

    /// Every symbol this strategy reads bars or quotes for, deduplicated
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols = vec![
            self.signal_symbol.clone(),
            self.leveraged_symbol.clone(),
            self.core_symbol.clone(),
            self.baseline_symbol().to_string(),
        ];
        if self.use_inverse_hedge {
            symbols.push(self.hedge_symbol.clone());
        }
        if self.allow_treasury {
            symbols.push(self.bond_trend_symbol.clone());
            symbols.push(self.bull_bond_symbol.clone());
            symbols.push(self.bear_bond_symbol.clone());
        }
        symbols.sort();
        symbols.dedup();
        symbols
    }
}
