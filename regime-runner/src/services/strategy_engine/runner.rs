//! Multi-strategy runner
//!
//! Fetches market data once, then runs every active strategy in registry
//! order, strictly one after another. Each strategy's state is loaded,
//! stepped, executed and saved under its own lock. A cycle that fails before
//! any order is sent writes nothing; once orders are sent, the filled book is
//! always saved.

use crate::models::{baseline_value, PerformanceSnapshot};
use crate::services::reconciliation::reconcile;
use crate::services::strategy_engine::{RegisteredStrategy, RunnerSettings};
use crate::state::AppState;
use chrono::{DateTime, Utc};
use regime_engine::data::MarketWindow;
use regime_engine::portfolio::{current_weights, needs_rebalance, plan_orders, OrderIntent, PaperBook, PriceMap};
use regime_engine::strategy::{AllocationEngine, AllocationResult, StrategyEngine};
use regime_engine::{Error, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Outcome of one strategy within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    Succeeded,
    /// Warm-up unmet; prior state kept
    NoOp,
    Failed,
    /// Not started (run aborted or deadline passed)
    Skipped,
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Succeeded | RunStatus::NoOp)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StrategyRunResult {
    pub strategy_id: String,
    pub is_primary: bool,
    pub status: RunStatus,
    pub error: Option<String>,
    pub cell_id: Option<u8>,
    pub rebalanced: bool,
    pub trades: usize,
    pub equity: Option<Decimal>,
}

impl StrategyRunResult {
    fn new(strategy: &RegisteredStrategy, status: RunStatus) -> Self {
        Self {
            strategy_id: strategy.id().to_string(),
            is_primary: strategy.is_primary(),
            status,
            error: None,
            cell_id: None,
            rebalanced: false,
            trades: 0,
            equity: None,
        }
    }

    fn failed(strategy: &RegisteredStrategy, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::new(strategy, RunStatus::Failed)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<StrategyRunResult>,
    pub primary_success: bool,
    pub all_success: bool,
    /// Primary failed but secondaries kept running
    pub degraded: bool,
    /// Primary failed and the remaining strategies were skipped
    pub aborted: bool,
}

impl RunReport {
    pub fn result(&self, strategy_id: &str) -> Option<&StrategyRunResult> {
        self.results.iter().find(|r| r.strategy_id == strategy_id)
    }
}

/// Everything decided before any order leaves the process
struct CyclePlan {
    outcome: AllocationResult,
    book: PaperBook,
    prices: PriceMap,
    orders: Vec<OrderIntent>,
    rebalance: bool,
    baseline: Option<(String, Decimal)>,
}

pub struct MultiStrategyRunner {
    ctx: Arc<AppState>,
}

impl MultiStrategyRunner {
    pub fn new(ctx: Arc<AppState>) -> Self {
        Self { ctx }
    }

    /// Run unless another run is active; a concurrent trigger is a no-op
    pub async fn trigger(&self) -> Option<RunReport> {
        let Some(_permit) = self.ctx.guard.try_acquire() else {
            info!("run already in progress, trigger ignored");
            return None;
        };
        Some(self.run().await)
    }

    /// One full pass over the active strategies
    pub async fn run(&self) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let settings = self.ctx.registry.settings();
        let strategies = self.ctx.registry.active_strategies();
        let deadline = Instant::now() + Duration::from_secs(settings.execution_timeout_seconds);

        info!(
            run_id = %run_id,
            strategies = strategies.len(),
            timeout_seconds = settings.execution_timeout_seconds,
            "run started"
        );

        let window = match tokio::time::timeout_at(deadline, self.fetch_window(&strategies)).await {
            Ok(window) => window,
            Err(_) => {
                error!(run_id = %run_id, "deadline passed while fetching market data");
                MarketWindow::new()
            }
        };

        let mut results = Vec::with_capacity(strategies.len());
        let mut degraded = false;
        let mut aborted = false;

        for strategy in &strategies {
            let id = strategy.id();
            if aborted {
                info!(run_id = %run_id, strategy_id = %id, "skipped, run aborted");
                results.push(StrategyRunResult::new(strategy, RunStatus::Skipped));
                continue;
            }
            if Instant::now() >= deadline {
                warn!(run_id = %run_id, strategy_id = %id, "skipped, run deadline passed");
                results.push(StrategyRunResult::new(strategy, RunStatus::Skipped));
                continue;
            }

            let result = match self.run_strategy(run_id, strategy, &window, &settings, deadline).await {
                Ok(result) => result,
                Err(e) => {
                    error!(run_id = %run_id, strategy_id = %id, error = %e, "strategy failed");
                    StrategyRunResult::failed(strategy, e.to_string())
                }
            };

            if result.status == RunStatus::Failed {
                if strategy.is_primary() {
                    if settings.isolate_failures {
                        degraded = true;
                        warn!(run_id = %run_id, strategy_id = %id, "primary failed, continuing secondaries in degraded mode");
                    } else {
                        aborted = true;
                        error!(run_id = %run_id, strategy_id = %id, "primary failed, aborting run");
                    }
                } else {
                    warn!(run_id = %run_id, strategy_id = %id, "secondary failed, continuing");
                }
            }
            results.push(result);
        }

        let primary_success = results
            .iter()
            .find(|r| r.is_primary)
            .map(|r| r.status.is_success())
            .unwrap_or(false);
        let all_success = results.iter().all(|r| r.status.is_success());

        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            results,
            primary_success,
            all_success,
            degraded,
            aborted,
        };

        info!(
            run_id = %run_id,
            primary_success = report.primary_success,
            all_success = report.all_success,
            degraded = report.degraded,
            aborted = report.aborted,
            "run finished"
        );
        report
    }

    /// Bars for every symbol any active strategy needs, fetched once.
    ///
    /// A symbol that fails to load is left out; only the computations that
    /// depend on it are skipped.
    async fn fetch_window(&self, strategies: &[Arc<RegisteredStrategy>]) -> MarketWindow {
        let mut needs: BTreeMap<String, usize> = BTreeMap::new();
        for engine in strategies.iter().filter_map(|s| s.engine.as_ref()) {
            for symbol in engine.required_symbols() {
                let lookback = needs.entry(symbol).or_insert(0);
                *lookback = (*lookback).max(engine.lookback());
            }
        }

        let mut window = MarketWindow::new();
        for (symbol, lookback) in needs {
            match self.ctx.collaborators.market.fetch(&symbol, lookback).await {
                Ok(bars) => {
                    debug!(symbol = %symbol, bars = bars.len(), lookback, "market data fetched");
                    window.insert(symbol, bars);
                }
                Err(e) => warn!(symbol = %symbol, error = %e, "market data unavailable"),
            }
        }
        window
    }

    /// One strategy cycle.
    ///
    /// Everything up to order submission is bounded by `deadline`. Once the
    /// router has been called the cycle always runs to the state save, so
    /// broker fills and persisted positions never diverge.
    async fn run_strategy(
        &self,
        run_id: Uuid,
        strategy: &RegisteredStrategy,
        window: &MarketWindow,
        settings: &RunnerSettings,
        deadline: Instant,
    ) -> Result<StrategyRunResult> {
        let id = strategy.id();
        let engine = strategy
            .engine
            .as_ref()
            .ok_or_else(|| Error::execution(format!("strategy '{}' has no loaded engine", id)))?;

        let prepared = tokio::time::timeout_at(deadline, async {
            let lock = self.ctx.store.lock(id).await;
            let plan = self.prepare(id, engine, window, settings).await?;
            Ok::<_, Error>((lock, plan))
        })
        .await;

        let (_lock, plan) = match prepared {
            Ok(Ok((lock, Some(plan)))) => (lock, plan),
            Ok(Ok((_, None))) => return Ok(StrategyRunResult::new(strategy, RunStatus::NoOp)),
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                warn!(run_id = %run_id, strategy_id = %id, "strategy interrupted by run deadline, state not written");
                return Err(Error::execution("interrupted by run deadline before any order was sent"));
            }
        };

        self.commit(run_id, strategy, engine, plan).await
    }

    /// Load, reconcile, step, quote and plan; `None` when the step is a no-op
    async fn prepare(
        &self,
        id: &str,
        engine: &StrategyEngine,
        window: &MarketWindow,
        settings: &RunnerSettings,
    ) -> Result<Option<CyclePlan>> {
        let collab = &self.ctx.collaborators;
        let prior = self.ctx.store.load(id, engine.initial_capital()).await?;

        if let Some(ledger) = &collab.ledger {
            let observed = ledger
                .positions(id)
                .await
                .map_err(|e| Error::execution(format!("ledger positions for '{}': {:#}", id, e)))?;
            reconcile(id, &prior.current_positions, &observed, settings.max_position_drift_pct)?;
        }

        let outcome = match engine.step(window, &prior) {
            Ok(outcome) => outcome,
            Err(e) if e.is_no_op() => {
                info!(strategy_id = %id, reason = %e, "no-op step, prior state kept");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let mut symbols: BTreeSet<String> = outcome.allocation.symbols().map(str::to_string).collect();
        symbols.extend(
            prior
                .current_positions
                .iter()
                .filter(|(_, q)| !q.is_zero())
                .map(|(s, _)| s.clone()),
        );
        let prices = self.quote_all(&symbols).await?;
        let baseline = self.baseline(engine, &prices).await;

        let book = PaperBook::from_state(&prior);
        let equity = book.equity(&prices)?;
        let held = current_weights(book.positions(), &prices, equity)?;

        info!(
            strategy_id = %id,
            cell_id = ?outcome.cell.map(|c| c.id()),
            trend_state = %outcome.state.trend_state,
            vol_state = %outcome.state.vol_state,
            allocation = %outcome.allocation,
            "target allocation computed"
        );

        let rebalance = needs_rebalance(&outcome.allocation, &held, engine.rebalance_threshold());
        let orders = if rebalance {
            plan_orders(&outcome.allocation, book.positions(), &prices, equity)?
        } else {
            Vec::new()
        };

        Ok(Some(CyclePlan {
            outcome,
            book,
            prices,
            orders,
            rebalance,
            baseline,
        }))
    }

    /// Route the planned orders, then book and save whatever filled.
    ///
    /// Only a routing failure (nothing filled) or the save itself can fail
    /// the cycle from here on.
    async fn commit(
        &self,
        run_id: Uuid,
        strategy: &RegisteredStrategy,
        engine: &StrategyEngine,
        plan: CyclePlan,
    ) -> Result<StrategyRunResult> {
        let id = strategy.id();
        let collab = &self.ctx.collaborators;
        let CyclePlan {
            outcome,
            mut book,
            mut prices,
            orders,
            rebalance,
            baseline,
        } = plan;

        let mut state = outcome.state.clone();
        let mut result = StrategyRunResult::new(strategy, RunStatus::Succeeded);
        result.cell_id = outcome.cell.map(|c| c.id());

        if rebalance {
            if !orders.is_empty() {
                let fills = collab
                    .router
                    .submit(id, &orders)
                    .await
                    .map_err(|e| Error::execution(format!("order routing for '{}': {:#}", id, e)))?;
                if let Err(e) = book.apply(&fills) {
                    error!(strategy_id = %id, error = %e, "fills booked with inconsistent cash");
                }
                for fill in &fills {
                    prices.entry(fill.symbol.clone()).or_insert(fill.price);
                }
                if let Err(e) = collab.journal.record_trades(id, &fills).await {
                    warn!(strategy_id = %id, error = %e, trades = fills.len(), "failed to record trades");
                }
                result.trades = fills.len();
            }
            state.last_allocation = outcome.allocation.weights().clone();
            result.rebalanced = true;
        }

        if let Err(e) = book.settle(&mut state, &prices) {
            error!(strategy_id = %id, error = %e, "equity not marked, saving positions and cash only");
            state.current_positions = book.positions().clone();
            state.cash = book.cash();
        }
        let now = Utc::now();
        state.last_run = Some(now);
        if state.baseline_entry_price.is_none() {
            state.baseline_entry_price = baseline.as_ref().map(|(_, price)| *price);
        }

        self.ctx.store.save(id, &state).await?;
        result.equity = Some(state.account_equity);

        let snapshot = PerformanceSnapshot {
            run_id,
            strategy_id: id.to_string(),
            timestamp: now,
            equity: state.account_equity,
            cash: state.cash,
            positions_value: state.account_equity - state.cash,
            cell_id: result.cell_id,
            trend_state: outcome.cell.map(|_| state.trend_state),
            vol_state: outcome.cell.map(|_| state.vol_state),
            baseline_value: match (state.baseline_entry_price, &baseline) {
                (Some(entry), Some((_, price))) => baseline_value(engine.initial_capital(), entry, *price),
                _ => None,
            },
            baseline_symbol: baseline.as_ref().map(|(symbol, _)| symbol.clone()),
            baseline_price: baseline.map(|(_, price)| price),
        };
        if let Err(e) = collab.journal.record_snapshot(&snapshot).await {
            warn!(strategy_id = %id, error = %e, "failed to record performance snapshot");
        }

        info!(
            strategy_id = %id,
            equity = %state.account_equity.round_dp(2),
            rebalanced = result.rebalanced,
            trades = result.trades,
            "strategy cycle completed"
        );
        Ok(result)
    }

    async fn quote_all(&self, symbols: &BTreeSet<String>) -> Result<PriceMap> {
        let mut prices = PriceMap::new();
        for symbol in symbols {
            let price = self
                .ctx
                .collaborators
                .quotes
                .current_price(symbol)
                .await
                .map_err(|e| Error::execution(format!("quote for {}: {:#}", symbol, e)))?;
            prices.insert(symbol.clone(), price);
        }
        Ok(prices)
    }

    /// Baseline symbol and its current price, if quotable
    async fn baseline(&self, engine: &StrategyEngine, prices: &PriceMap) -> Option<(String, Decimal)> {
        let symbol = engine.baseline_symbol()?.to_string();
        if let Some(price) = prices.get(&symbol) {
            return Some((symbol, *price));
        }
        match self.ctx.collaborators.quotes.current_price(&symbol).await {
            Ok(price) => Some((symbol, price)),
            Err(e) => {
                debug!(symbol = %symbol, error = %e, "baseline quote unavailable");
                None
            }
        }
    }

    /// Mark a strategy's stored positions to market and save the equity.
    ///
    /// Takes the same per-strategy lock as a run, so it never interleaves
    /// with a cycle of that strategy.
    pub async fn refresh_equity(&self, strategy_id: &str) -> Result<Decimal> {
        let strategy = self
            .ctx
            .registry
            .get(strategy_id)
            .ok_or_else(|| Error::execution(format!("unknown strategy '{}'", strategy_id)))?;
        let initial_capital = strategy
            .engine
            .as_ref()
            .map(|e| e.initial_capital())
            .unwrap_or(Decimal::ZERO);

        let _lock = self.ctx.store.lock(strategy_id).await;
        let mut state = self.ctx.store.load(strategy_id, initial_capital).await?;
        let symbols: BTreeSet<String> = state
            .current_positions
            .iter()
            .filter(|(_, q)| !q.is_zero())
            .map(|(s, _)| s.clone())
            .collect();
        let prices = self.quote_all(&symbols).await?;

        PaperBook::from_state(&state).settle(&mut state, &prices)?;
        self.ctx.store.save(strategy_id, &state).await?;
        info!(strategy_id = %strategy_id, equity = %state.account_equity.round_dp(2), "equity refreshed");
        Ok(state.account_equity)
    }
}
