//! Regime classification state machine
//!
//! Pure functions from indicator readings and the prior state to the next
//! regime. The engine computes [`RegimeSignals`] from bars and hands them to
//! [`decide`]; everything here is deterministic and free of I/O.

use crate::config::RegimeConfig;
use crate::strategy::{Cell, StrategyState, TrendState, VolState};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Indicator readings for one step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeSignals {
    /// Trend strength normalized to [-1, 1]
    pub t_norm: f64,
    pub sma_fast: f64,
    pub sma_slow: f64,
    /// Realized volatility z-score against its rolling baseline
    pub z_score: Option<f64>,
    pub realized_vol: Option<f64>,
    /// Realized volatility fell by more than the crush threshold
    pub vol_crush: bool,
}

impl RegimeSignals {
    pub fn structurally_bullish(&self) -> bool {
        self.sma_fast > self.sma_slow
    }
}

/// What the Cell 1 exit confirmation did this step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfirmationEvent {
    /// Not in Cell 1, lag disabled, or nothing pending
    Inactive,
    /// Sideways exit deferred; counter now at the given value
    Pending(u32),
    /// Counter reached the configured length, Sideways took effect
    Confirmed,
    /// Trend recovered or another exit fired; counter cleared
    Reset,
}

/// Outcome of one classification step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegimeDecision {
    /// Classification before vol-crush and confirmation adjustments
    pub raw_trend: TrendState,
    pub trend_state: TrendState,
    pub vol_state: VolState,
    pub cell: Cell,
    pub pending_days: u32,
    pub vol_crush_applied: bool,
    pub confirmation: ConfirmationEvent,
}

/// Raw trend classification from the fused signals
pub fn classify_trend(t_norm: f64, structurally_bullish: bool, bull_threshold: f64, bear_threshold: f64) -> TrendState {
    if t_norm > bull_threshold && structurally_bullish {
        TrendState::BullStrong
    } else if t_norm < bear_threshold && !structurally_bullish {
        TrendState::BearStrong
    } else {
        TrendState::Sideways
    }
}

/// Hysteresis update of the volatility state.
///
/// `prior` is `None` on the first evaluation after warm-up, which seeds the
/// state from the sign of the z-score. An undefined z-score holds.
pub fn next_vol_state(prior: Option<VolState>, z_score: Option<f64>, upper_z: f64, lower_z: f64) -> VolState {
    match (prior, z_score) {
        (None, Some(z)) if z > 0.0 => VolState::High,
        (None, _) => VolState::Low,
        (Some(state), None) => state,
        (Some(_), Some(z)) if z > upper_z => VolState::High,
        (Some(_), Some(z)) if z < lower_z => VolState::Low,
        (Some(state), Some(_)) => state,
    }
}

/// Cell 1 exit confirmation.
///
/// Returns the effective trend, the new pending-day counter and the event.
/// A Sideways exit from Cell 1 is deferred until `days` consecutive
/// disqualifying steps; BearStrong exits are never deferred.
pub fn confirm_cell1_exit(
    in_cell1: bool,
    raw: TrendState,
    t_norm: f64,
    bull_threshold: f64,
    pending: u32,
    days: u32,
) -> (TrendState, u32, ConfirmationEvent) {
    let cleared = if pending > 0 {
        ConfirmationEvent::Reset
    } else {
        ConfirmationEvent::Inactive
    };

    if !in_cell1 || t_norm > bull_threshold {
        return (raw, 0, cleared);
    }

    match raw {
        TrendState::Sideways => {
            let next = pending + 1;
            if next >= days {
                (TrendState::Sideways, 0, ConfirmationEvent::Confirmed)
            } else {
                (TrendState::BullStrong, next, ConfirmationEvent::Pending(next))
            }
        }
        TrendState::BearStrong | TrendState::BullStrong => (raw, 0, cleared),
    }
}

/// Full classification step: raw trend, vol hysteresis, vol-crush override,
/// exit confirmation and cell mapping.
pub fn decide(signals: &RegimeSignals, prior: &StrategyState, config: &RegimeConfig) -> RegimeDecision {
    let mut raw_trend = classify_trend(
        signals.t_norm,
        signals.structurally_bullish(),
        config.bull_threshold,
        config.bear_threshold,
    );

    let prior_vol = prior.regime_initialized.then_some(prior.vol_state);
    let mut vol_state = next_vol_state(prior_vol, signals.z_score, config.upper_z, config.lower_z);

    let vol_crush_applied = signals.vol_crush;
    if vol_crush_applied {
        info!(
            from_vol = %vol_state,
            raw_trend = %raw_trend,
            "volatility crush: forcing Low volatility"
        );
        vol_state = VolState::Low;
        if raw_trend == TrendState::BearStrong {
            raw_trend = TrendState::Sideways;
        }
    }

    let (trend_state, mut pending_days, mut confirmation) = if config.cell1_exit_confirmation_enabled {
        confirm_cell1_exit(
            prior.in_cell1(),
            raw_trend,
            signals.t_norm,
            config.bull_threshold,
            prior.cell1_exit_pending_days,
            config.cell1_exit_confirmation_days,
        )
    } else {
        (raw_trend, 0, ConfirmationEvent::Inactive)
    };

    let cell = Cell::from_regime(trend_state, vol_state);
    if cell != Cell::BullLowVol && pending_days > 0 {
        // left Cell 1 through volatility; the counter only lives inside Cell 1
        pending_days = 0;
        confirmation = ConfirmationEvent::Reset;
    }

    match confirmation {
        ConfirmationEvent::Pending(days) => info!(
            pending_days = days,
            required_days = config.cell1_exit_confirmation_days,
            t_norm = signals.t_norm,
            "Cell 1 exit deferred awaiting confirmation"
        ),
        ConfirmationEvent::Confirmed => info!(
            required_days = config.cell1_exit_confirmation_days,
            "Cell 1 exit confirmed"
        ),
        ConfirmationEvent::Reset => info!(
            previous_pending_days = prior.cell1_exit_pending_days,
            t_norm = signals.t_norm,
            "Cell 1 exit confirmation reset"
        ),
        ConfirmationEvent::Inactive => {}
    }

    debug!(
        t_norm = signals.t_norm,
        sma_fast = signals.sma_fast,
        sma_slow = signals.sma_slow,
        z_score = ?signals.z_score,
        raw_trend = %raw_trend,
        trend_state = %trend_state,
        vol_state = %vol_state,
        cell_id = cell.id(),
        "regime classified"
    );

    RegimeDecision {
        raw_trend,
        trend_state,
        vol_state,
        cell,
        pending_days,
        vol_crush_applied,
        confirmation,
    }
}
