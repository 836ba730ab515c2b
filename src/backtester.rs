//! Historical simulation driver.
//!
//! Drives a standalone strategy day by day over an indexed price series. At
//! every step the caller's decision hook sees only the history prefix up to
//! that day (no look-ahead), places orders back-dated to the step's
//! timestamp, and the driver tracks the resulting equity. Commissions are
//! charged per fill as `trade_value × commission_pct`; slippage, when
//! requested, perturbs fill prices symmetrically.

pub mod results;

use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{
    desk::Desk,
    domain::{Cash, Price, StrategyId, Symbol},
    error::{DeskError, DeskResult, SystemError},
    oms::{Order, OrderRequest},
    position::Position,
    quotes::PriceMap,
    trade::Trade,
};

pub use results::{BacktestResults, BacktestSnapshot};

// ================================================================================================
// Price Series & History View
// ================================================================================================

/// An indexed multi-symbol price history: one row per timestamp, one aligned
/// column per symbol.
#[derive(Debug, Clone, Default)]
pub struct PriceSeries {
    timestamps: Vec<DateTime<Utc>>,
    columns: BTreeMap<Symbol, Vec<f64>>,
}

impl PriceSeries {
    pub fn new(timestamps: Vec<DateTime<Utc>>) -> DeskResult<Self> {
        if timestamps.is_empty() {
            return Err(SystemError::EmptySeries("no timestamps".to_string()).into());
        }
        if !timestamps.is_sorted() {
            return Err(SystemError::InvariantViolation(
                "price series timestamps must be ascending".to_string(),
            )
            .into());
        }
        Ok(Self {
            timestamps,
            columns: BTreeMap::new(),
        })
    }

    /// Adds a symbol column; must be aligned with the timestamp index.
    pub fn with_column(mut self, symbol: impl Into<Symbol>, prices: Vec<f64>) -> DeskResult<Self> {
        if prices.len() != self.timestamps.len() {
            return Err(SystemError::InvariantViolation(format!(
                "column length {} does not match index length {}",
                prices.len(),
                self.timestamps.len()
            ))
            .into());
        }
        self.columns.insert(symbol.into(), prices);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.columns.keys()
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    /// The full price column for a symbol.
    pub fn column(&self, symbol: &Symbol) -> Option<&[f64]> {
        self.columns.get(symbol).map(Vec::as_slice)
    }

    /// Prices of the last row, as a quote map.
    pub fn latest_prices(&self) -> PriceMap {
        let mut map = PriceMap::new();
        for (symbol, column) in &self.columns {
            if let Some(&price) = column.last() {
                map.set(symbol.clone(), price);
            }
        }
        map
    }
}

/// A look-ahead-safe view of the series: everything up to and including the
/// current step.
#[derive(Debug, Clone, Copy)]
pub struct HistoryView<'a> {
    series: &'a PriceSeries,
    upto: usize,
}

impl<'a> HistoryView<'a> {
    pub fn current_time(&self) -> DateTime<Utc> {
        self.series.timestamps[self.upto]
    }

    /// Number of visible rows.
    pub fn len(&self) -> usize {
        self.upto + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn timestamps(&self) -> &'a [DateTime<Utc>] {
        &self.series.timestamps[..=self.upto]
    }

    /// The visible price prefix for a symbol.
    pub fn prices(&self, symbol: &Symbol) -> Option<&'a [f64]> {
        self.series
            .columns
            .get(symbol)
            .map(|column| &column[..=self.upto])
    }

    /// The current (latest visible) price for a symbol.
    pub fn latest(&self, symbol: &Symbol) -> Option<Price> {
        self.prices(symbol).map(|prices| Price(prices[self.upto]))
    }

    /// Current prices for every symbol in the series.
    pub fn current_prices(&self) -> PriceMap {
        let mut map = PriceMap::new();
        for (symbol, column) in &self.series.columns {
            map.set(symbol.clone(), column[self.upto]);
        }
        map
    }
}

// ================================================================================================
// Decision Hook
// ================================================================================================

/// The caller's decision logic, invoked once per simulated step.
///
/// Implementations read the visible history and place orders through the
/// context; they never see prices past the current step.
pub trait Agent {
    fn on_bar(&mut self, history: &HistoryView<'_>, ctx: &mut BacktestCtx<'_>) -> DeskResult<()>;
}

/// Order placement surface handed to the agent each step.
///
/// Orders are back-dated to the step's timestamp and, when slippage is
/// configured, filled at a symmetrically perturbed price.
pub struct BacktestCtx<'a> {
    desk: &'a mut Desk,
    strategy: StrategyId,
    slippage_pct: f64,
    rng: &'a mut StdRng,
    now: DateTime<Utc>,
}

impl BacktestCtx<'_> {
    pub fn strategy(&self) -> StrategyId {
        self.strategy
    }

    /// Read access to the underlying engine (positions, ledgers, metrics).
    pub fn desk(&self) -> &Desk {
        self.desk
    }

    pub fn position(&self, symbol: &Symbol) -> Option<&Position> {
        self.desk
            .position(self.strategy, symbol)
            .expect("simulated strategy handle is live")
    }

    /// The strategy's conservative free cash (entry-price valuation).
    pub fn free_cash(&self) -> Cash {
        self.desk
            .strategy_cash(self.strategy, None)
            .expect("simulated strategy handle is live")
    }

    /// Places an order dated to the current simulation step.
    pub fn place_order(&mut self, mut request: OrderRequest) -> DeskResult<(Order, Vec<Arc<Trade>>)> {
        if self.slippage_pct > 0.0 {
            let shift: f64 = self.rng.random_range(-self.slippage_pct..=self.slippage_pct);
            request.price = Price(request.price.0 * (1.0 + shift));
        }
        if request.trade_date.is_none() {
            request.trade_date = Some(self.now);
        }
        self.desk.place_order(self.strategy, request)
    }
}

// ================================================================================================
// Builder & Driver
// ================================================================================================

/// Backtest configuration, builder style.
#[derive(Debug, Clone)]
pub struct BacktestBuilder {
    initial_capital: f64,
    commission_pct: f64,
    slippage_pct: f64,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    seed: Option<u64>,
    progress: bool,
}

impl Default for BacktestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BacktestBuilder {
    pub fn new() -> Self {
        Self {
            initial_capital: 100_000.0,
            commission_pct: 0.0,
            slippage_pct: 0.0,
            start: None,
            end: None,
            seed: None,
            progress: false,
        }
    }

    pub fn with_initial_capital(mut self, capital: f64) -> Self {
        self.initial_capital = capital;
        self
    }

    /// Commission per fill as a fraction of trade value (0.001 = 0.1%).
    pub fn with_commission_pct(mut self, commission_pct: f64) -> Self {
        self.commission_pct = commission_pct;
        self
    }

    /// Symmetric fill-price perturbation bound (0.001 = ±0.1%).
    pub fn with_slippage_pct(mut self, slippage_pct: f64) -> Self {
        self.slippage_pct = slippage_pct;
        self
    }

    /// Restricts the run to `[start, end]` (inclusive).
    pub fn with_window(mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    /// Seeds the slippage generator for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Runs the simulation: one `on_bar` call per visible timestamp, equity
    /// tracked after each step.
    #[tracing::instrument(skip(self, series, agent), fields(days = series.len(), capital = self.initial_capital))]
    pub fn run<A: Agent>(&self, series: &PriceSeries, agent: &mut A) -> DeskResult<BacktestResults> {
        let window: Vec<usize> = series
            .timestamps
            .iter()
            .enumerate()
            .filter(|(_, ts)| {
                self.start.is_none_or(|start| **ts >= start)
                    && self.end.is_none_or(|end| **ts <= end)
            })
            .map(|(i, _)| i)
            .collect();
        if window.is_empty() {
            return Err(
                SystemError::EmptySeries("no timestamps inside the backtest window".to_string())
                    .into(),
            );
        }

        let mut desk = Desk::new();
        let strategy = desk.create_strategy(
            None,
            "BACKTEST001",
            "Backtest",
            Cash(self.initial_capital),
        )?;
        let system = desk.system_of(strategy)?;
        desk.set_commission_pct(system, self.commission_pct)?;

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let bar = if self.progress {
            ProgressBar::new(window.len() as u64)
        } else {
            ProgressBar::hidden()
        };

        let mut equity_curve = vec![self.initial_capital];
        let mut dates = vec![series.timestamps[window[0]]];
        let mut daily_returns = Vec::with_capacity(window.len());
        let mut last_prices = PriceMap::new();

        for &index in &window {
            let history = HistoryView { series, upto: index };
            let now = history.current_time();

            let mut ctx = BacktestCtx {
                desk: &mut desk,
                strategy,
                slippage_pct: self.slippage_pct,
                rng: &mut rng,
                now,
            };
            match agent.on_bar(&history, &mut ctx) {
                Ok(()) => {}
                // Rejections and funding shortfalls are ordinary trading
                // outcomes during a sweep; anything else is a real failure.
                Err(DeskError::Order(err)) => {
                    tracing::debug!(at = %now, error = %err, "order skipped");
                }
                Err(other) => return Err(other),
            }

            last_prices = history.current_prices();
            let equity = self.equity_at(&desk, strategy, &last_prices)?;

            let previous = *equity_curve.last().expect("seeded with initial capital");
            if previous != 0.0 {
                daily_returns.push((equity - previous) / previous);
            }
            equity_curve.push(equity);
            dates.push(now);
            bar.inc(1);
        }
        bar.finish_and_clear();

        let final_capital = *equity_curve.last().expect("seeded with initial capital");
        let ledger = desk.ledger(strategy)?;
        let trade_count = ledger.trade_count();
        let commission_paid = ledger.total_commission().0;
        let metrics = desk.performance_metrics(strategy, Some(&last_prices))?;

        tracing::info!(
            final_capital,
            trade_count,
            "backtest complete"
        );

        Ok(BacktestResults::new(
            equity_curve,
            dates,
            daily_returns,
            self.initial_capital,
            final_capital,
            trade_count,
            commission_paid,
            metrics,
        ))
    }

    /// Step equity: cash plus open positions at today's prices plus realized
    /// P&L, net of commissions charged so far.
    fn equity_at(&self, desk: &Desk, strategy: StrategyId, prices: &PriceMap) -> DeskResult<f64> {
        let cash = desk.strategy_cash(strategy, None)?;
        let positions: f64 = desk
            .open_positions(strategy)?
            .iter()
            .map(|p| {
                let mark = prices.get(&p.symbol).unwrap_or(p.avg_entry_price);
                p.market_value(mark).0
            })
            .sum();
        let realized = desk.realized_pnl(strategy)?;
        let commission = desk.ledger(strategy)?.total_commission().0;
        Ok(cash.0 + positions + realized - commission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trade::TradeAction;
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    // ============================================================================
    // Test Helpers
    // ============================================================================

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 16, 0, 0).unwrap()
    }

    fn series(prices: &[f64]) -> PriceSeries {
        let timestamps = (1..=prices.len() as u32).map(day).collect();
        PriceSeries::new(timestamps)
            .unwrap()
            .with_column("AAPL", prices.to_vec())
            .unwrap()
    }

    /// Buys once on the first bar, holds to the end.
    struct BuyAndHold {
        bought: bool,
        qty: f64,
    }

    impl Agent for BuyAndHold {
        fn on_bar(&mut self, history: &HistoryView<'_>, ctx: &mut BacktestCtx<'_>) -> DeskResult<()> {
            if !self.bought {
                let price = history.latest(&Symbol::from("AAPL")).unwrap();
                ctx.place_order(OrderRequest::market(
                    "AAPL",
                    TradeAction::Buy,
                    self.qty,
                    price.0,
                ))?;
                self.bought = true;
            }
            Ok(())
        }
    }

    /// Records how much history each bar exposes.
    struct LookaheadProbe {
        seen: Vec<usize>,
    }

    impl Agent for LookaheadProbe {
        fn on_bar(&mut self, history: &HistoryView<'_>, _ctx: &mut BacktestCtx<'_>) -> DeskResult<()> {
            self.seen.push(history.len());
            Ok(())
        }
    }

    #[test]
    fn series_rejects_misaligned_columns() {
        let err = PriceSeries::new(vec![day(1), day(2)])
            .unwrap()
            .with_column("AAPL", vec![1.0])
            .unwrap_err();
        assert!(matches!(err, DeskError::System(_)));
    }

    #[test]
    fn series_rejects_unsorted_index() {
        assert!(PriceSeries::new(vec![day(2), day(1)]).is_err());
        assert!(PriceSeries::new(vec![]).is_err());
    }

    #[test]
    fn history_prefix_grows_one_bar_at_a_time() {
        let series = series(&[100.0, 101.0, 102.0, 103.0]);
        let mut probe = LookaheadProbe { seen: Vec::new() };
        BacktestBuilder::new().run(&series, &mut probe).unwrap();
        assert_eq!(probe.seen, vec![1, 2, 3, 4], "no look-ahead, no skipping");
    }

    #[test]
    fn buy_and_hold_tracks_market() {
        let series = series(&[100.0, 110.0, 120.0]);
        let mut agent = BuyAndHold {
            bought: false,
            qty: 100.0,
        };
        let results = BacktestBuilder::new()
            .with_initial_capital(100_000.0)
            .run(&series, &mut agent)
            .unwrap();

        // 100 shares gaining $20 each.
        assert_relative_eq!(results.final_capital, 102_000.0);
        assert_relative_eq!(results.total_return(), 2_000.0);
        assert_relative_eq!(results.total_return_pct(), 2.0);
        assert_eq!(results.trade_count, 1);
        assert_eq!(results.days(), 3);
        assert_eq!(results.equity_curve, vec![100_000.0, 100_000.0, 101_000.0, 102_000.0]);
    }

    #[test]
    fn commissions_reduce_equity() {
        let series = series(&[100.0, 100.0]);
        let mut agent = BuyAndHold {
            bought: false,
            qty: 100.0,
        };
        let results = BacktestBuilder::new()
            .with_initial_capital(100_000.0)
            .with_commission_pct(0.001)
            .run(&series, &mut agent)
            .unwrap();

        // One 10_000 fill at 0.1% commission.
        assert_relative_eq!(results.commission_paid, 10.0);
        assert_relative_eq!(results.final_capital, 99_990.0);
    }

    #[test]
    fn slippage_is_reproducible_under_a_seed() {
        let series = series(&[100.0, 100.0, 100.0]);

        let run = |seed: u64| {
            let mut agent = BuyAndHold {
                bought: false,
                qty: 10.0,
            };
            BacktestBuilder::new()
                .with_slippage_pct(0.01)
                .with_seed(seed)
                .run(&series, &mut agent)
                .unwrap()
                .final_capital
        };

        assert_eq!(run(7), run(7), "same seed, same fills");
    }

    #[test]
    fn window_filters_timestamps_inclusively() {
        let series = series(&[100.0, 101.0, 102.0, 103.0, 104.0]);
        let mut probe = LookaheadProbe { seen: Vec::new() };
        BacktestBuilder::new()
            .with_window(Some(day(2)), Some(day(4)))
            .run(&series, &mut probe)
            .unwrap();
        assert_eq!(probe.seen.len(), 3);
    }

    #[test]
    fn empty_window_is_an_error() {
        let series = series(&[100.0]);
        let mut probe = LookaheadProbe { seen: Vec::new() };
        let err = BacktestBuilder::new()
            .with_window(Some(day(20)), None)
            .run(&series, &mut probe)
            .unwrap_err();
        assert!(matches!(err, DeskError::System(SystemError::EmptySeries(_))));
    }

    #[test]
    fn order_rejections_do_not_abort_the_run() {
        // Tries to buy far beyond its capital every day.
        struct Overreacher;
        impl Agent for Overreacher {
            fn on_bar(
                &mut self,
                history: &HistoryView<'_>,
                ctx: &mut BacktestCtx<'_>,
            ) -> DeskResult<()> {
                let price = history.latest(&Symbol::from("AAPL")).unwrap();
                ctx.place_order(OrderRequest::market(
                    "AAPL",
                    TradeAction::Buy,
                    1_000_000.0,
                    price.0,
                ))?;
                Ok(())
            }
        }

        let series = series(&[100.0, 101.0]);
        let results = BacktestBuilder::new()
            .with_initial_capital(1_000.0)
            .run(&series, &mut Overreacher)
            .unwrap();
        assert_eq!(results.trade_count, 0);
        assert_relative_eq!(results.final_capital, 1_000.0);
    }

    #[test]
    fn snapshot_serializes() {
        let series = series(&[100.0, 110.0]);
        let mut agent = BuyAndHold {
            bought: false,
            qty: 10.0,
        };
        let results = BacktestBuilder::new().run(&series, &mut agent).unwrap();
        let snapshot = results.snapshot();

        let json = serde_json::to_string(&snapshot).unwrap();
        let back: BacktestSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.trade_count, 1);
        assert_relative_eq!(back.final_capital, results.final_capital);
    }
}
