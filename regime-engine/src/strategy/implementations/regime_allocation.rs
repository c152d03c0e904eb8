//! Regime allocation engine
//!
//! Fuses an adaptive trend filter with a structural SMA filter, tracks a
//! hysteresis volatility state and maps the resulting regime onto one of six
//! allocation cells. All state lives in the `StrategyState` passed to `step`.

use crate::config::RegimeConfig;
use crate::data::{BarSeries, MarketWindow};
use crate::indicators::{
    baseline_zscore, calculate_realized_volatility, calculate_trend_strength, latest_sma, normalize_trend,
};
use crate::strategy::{
    build_allocation, decide, AllocationEngine, AllocationResult, BondTrend, RegimeSignals, StrategyState,
};
use crate::{Error, Result};
use rust_decimal::Decimal;
use tracing::{debug, info};

/// Regime-driven allocation engine
#[derive(Debug, Clone)]
pub struct RegimeAllocationEngine {
    config: RegimeConfig,
}

impl RegimeAllocationEngine {
    /// Create new engine from validated parameters
    pub fn new(config: RegimeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RegimeConfig {
        &self.config
    }

    fn signal_series<'a>(&self, window: &'a MarketWindow) -> Result<&'a BarSeries> {
        let symbol = &self.config.signal_symbol;
        let required = self.config.warmup_bars();
        let available = window.available(symbol);
        if available < required {
            return Err(Error::InsufficientData {
                symbol: symbol.clone(),
                required,
                available,
            });
        }
        window.series(symbol).ok_or_else(|| Error::InsufficientData {
            symbol: symbol.clone(),
            required,
            available: 0,
        })
    }

    /// Indicator readings on the latest signal bar
    pub fn compute_signals(&self, window: &MarketWindow) -> Result<RegimeSignals> {
        let series = self.signal_series(window)?;
        let closes = series.closes();
        let volumes = series.volumes();
        let insufficient = || Error::InsufficientData {
            symbol: self.config.signal_symbol.clone(),
            required: self.config.warmup_bars(),
            available: closes.len(),
        };

        let sma_fast = latest_sma(&closes, self.config.sma_fast)?.ok_or_else(insufficient)?;
        let sma_slow = latest_sma(&closes, self.config.sma_slow)?.ok_or_else(insufficient)?;

        let strength = calculate_trend_strength(&closes, &volumes, self.config.trend_lookback)?
            .ok_or_else(insufficient)?;
        let t_norm = normalize_trend(strength, self.config.t_max);

        let vol = calculate_realized_volatility(&closes, self.config.vol_window)?;
        let realized_vol = vol.last().copied().flatten();

        let baseline: Vec<f64> = vol
            .iter()
            .rev()
            .take(self.config.vol_baseline_window)
            .rev()
            .filter_map(|v| *v)
            .collect();
        let z_score = match realized_vol {
            Some(_) => baseline_zscore(&baseline),
            None => None,
        };

        let vol_crush = match (realized_vol, self.lagged_vol(&vol)) {
            (Some(current), Some(earlier)) if earlier > 0.0 => {
                (earlier - current) / earlier > self.config.vol_crush_threshold
            }
            _ => false,
        };

        Ok(RegimeSignals {
            t_norm,
            sma_fast,
            sma_slow,
            z_score,
            realized_vol,
            vol_crush,
        })
    }

    fn lagged_vol(&self, vol: &[Option<f64>]) -> Option<f64> {
        let idx = vol.len().checked_sub(1 + self.config.vol_crush_lookback)?;
        vol.get(idx).copied().flatten()
    }

    /// Bond SMA crossover direction; `None` when bond data is short or flat
    pub fn bond_trend(&self, window: &MarketWindow) -> Option<BondTrend> {
        let symbol = &self.config.bond_trend_symbol;
        let series = window.series(symbol)?;
        if series.len() < self.config.bond_warmup_bars() {
            debug!(
                symbol = %symbol,
                available = series.len(),
                required = self.config.bond_warmup_bars(),
                "bond trend unavailable, defensive weight stays in cash"
            );
            return None;
        }
        let closes = series.closes();
        let fast = latest_sma(&closes, self.config.bond_sma_fast).ok().flatten()?;
        let slow = latest_sma(&closes, self.config.bond_sma_slow).ok().flatten()?;
        if fast > slow {
            Some(BondTrend::Bull)
        } else if fast < slow {
            Some(BondTrend::Bear)
        } else {
            None
        }
    }
}

impl AllocationEngine for RegimeAllocationEngine {
    fn name(&self) -> &str {
        "RegimeAllocation"
    }

    fn required_symbols(&self) -> Vec<String> {
        self.config.symbols()
    }

    fn lookback(&self) -> usize {
        self.config.warmup_bars().max(self.config.bond_warmup_bars())
    }

    fn initial_capital(&self) -> Decimal {
        self.config.initial_capital
    }

    fn rebalance_threshold(&self) -> Decimal {
        self.config.rebalance_threshold
    }

    fn baseline_symbol(&self) -> Option<&str> {
        Some(self.config.baseline_symbol())
    }

    fn step(&self, window: &MarketWindow, prior: &StrategyState) -> Result<AllocationResult> {
        let signals = self.compute_signals(window)?;
        let decision = decide(&signals, prior, &self.config);

        if !prior.regime_initialized {
            info!(
                trend_state = %decision.trend_state,
                vol_state = %decision.vol_state,
                cell_id = decision.cell.id(),
                z_score = ?signals.z_score,
                "regime initialized"
            );
        } else {
            if prior.trend_state != decision.trend_state {
                info!(
                    from = %prior.trend_state,
                    to = %decision.trend_state,
                    t_norm = signals.t_norm,
                    "trend regime transition"
                );
            }
            if prior.vol_state != decision.vol_state {
                info!(
                    from = %prior.vol_state,
                    to = %decision.vol_state,
                    z_score = ?signals.z_score,
                    "volatility regime transition"
                );
            }
        }

        let template = decision.cell.template();
        let bond_trend = if self.config.allow_treasury && template.defensive > Decimal::ZERO {
            self.bond_trend(window)
        } else {
            None
        };
        let allocation = build_allocation(decision.cell, &self.config, bond_trend);

        let mut state = prior.clone();
        state.trend_state = decision.trend_state;
        state.vol_state = decision.vol_state;
        state.cell1_exit_pending_days = decision.pending_days;
        state.regime_initialized = true;

        Ok(AllocationResult {
            allocation,
            cell: Some(decision.cell),
            state,
            signals: Some(signals),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MarketBar;
    use crate::strategy::{Cell, TrendState, VolState};
    use chrono::{Duration, TimeZone, Utc};

    fn bars(symbol: &str, closes: &[f64]) -> Vec<MarketBar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 21, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let price = Decimal::from_f64_retain(c).unwrap().round_dp(4);
                MarketBar::new(
                    start + Duration::days(i as i64),
                    symbol,
                    price,
                    price,
                    price,
                    price,
                    Decimal::from(1_000_000),
                )
            })
            .collect()
    }

    fn rising(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + 0.1 * i as f64).collect()
    }

    #[test]
    fn test_warmup_is_a_no_op() {
        let engine = RegimeAllocationEngine::new(RegimeConfig::default()).unwrap();
        let mut window = MarketWindow::new();
        window.insert("QQQ", bars("QQQ", &rising(100)));

        let err = engine.step(&window, &StrategyState::new(Decimal::from(10_000))).unwrap_err();
        assert!(err.is_no_op());
        match err {
            Error::InsufficientData { required, available, .. } => {
                assert_eq!(required, 147);
                assert_eq!(available, 100);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_steady_uptrend_lands_in_cell1() {
        let engine = RegimeAllocationEngine::new(RegimeConfig::default()).unwrap();
        let mut window = MarketWindow::new();
        window.insert("QQQ", bars("QQQ", &rising(160)));

        let result = engine.step(&window, &StrategyState::new(Decimal::from(10_000))).unwrap();
        let signals = result.signals.unwrap();
        assert!(signals.t_norm > 0.99);
        assert!(signals.structurally_bullish());
        assert_eq!(result.cell, Some(Cell::BullLowVol));
        assert_eq!(result.state.trend_state, TrendState::BullStrong);
        assert_eq!(result.state.vol_state, VolState::Low);
        assert!(result.state.regime_initialized);
        assert_eq!(result.allocation.weight("TQQQ"), Decimal::new(6, 1));
        assert_eq!(result.allocation.weight("QQQ"), Decimal::new(4, 1));
    }

    #[test]
    fn test_step_is_deterministic() {
        let engine = RegimeAllocationEngine::new(RegimeConfig::default()).unwrap();
        let mut window = MarketWindow::new();
        let closes: Vec<f64> = (0..200)
            .map(|i| 100.0 + 5.0 * (i as f64 / 9.0).sin() - 0.05 * i as f64)
            .collect();
        window.insert("QQQ", bars("QQQ", &closes));
        let prior = StrategyState::new(Decimal::from(10_000));

        let a = engine.step(&window, &prior).unwrap();
        let b = engine.step(&window, &prior).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_bond_trend_direction() {
        let engine = RegimeAllocationEngine::new(RegimeConfig::default()).unwrap();
        let mut window = MarketWindow::new();
        assert_eq!(engine.bond_trend(&window), None);

        window.insert("TLT", bars("TLT", &rising(30)));
        assert_eq!(engine.bond_trend(&window), None);

        window.insert("TLT", bars("TLT", &rising(80)));
        assert_eq!(engine.bond_trend(&window), Some(BondTrend::Bull));

        let falling: Vec<f64> = (0..80).map(|i| 120.0 - 0.2 * i as f64).collect();
        window.insert("TLT", bars("TLT", &falling));
        assert_eq!(engine.bond_trend(&window), Some(BondTrend::Bear));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = RegimeConfig {
            sma_fast: 150,
            ..RegimeConfig::default()
        };
        assert!(RegimeAllocationEngine::new(config).is_err());
    }
}
