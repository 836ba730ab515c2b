//! Historical simulator contract: prefix-only visibility, back-dated fills,
//! commissions, slippage and result assembly over a multi-symbol series.

mod common;

use approx::assert_relative_eq;
use chrono::{DateTime, TimeZone, Utc};
use paperdesk::{
    DeskResult, OrderRequest, Symbol, TradeAction,
    backtester::{Agent, BacktestBuilder, BacktestCtx, HistoryView, PriceSeries},
};

fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 2, d, 21, 0, 0).unwrap()
}

fn two_symbol_series() -> PriceSeries {
    let timestamps: Vec<_> = (1..=10).map(day).collect();
    PriceSeries::new(timestamps)
        .unwrap()
        .with_column(
            "AAPL",
            vec![100.0, 102.0, 101.0, 104.0, 107.0, 105.0, 108.0, 111.0, 109.0, 112.0],
        )
        .unwrap()
        .with_column(
            "MSFT",
            vec![300.0, 298.0, 302.0, 305.0, 301.0, 304.0, 308.0, 306.0, 310.0, 312.0],
        )
        .unwrap()
}

/// Buys when the last close is above the previous one, sells the whole
/// position otherwise. Simple enough to predict, busy enough to exercise the
/// whole path.
struct UpTickRider {
    symbol: Symbol,
    lot: f64,
}

impl Agent for UpTickRider {
    fn on_bar(&mut self, history: &HistoryView<'_>, ctx: &mut BacktestCtx<'_>) -> DeskResult<()> {
        let prices = history.prices(&self.symbol).expect("symbol in series");
        if prices.len() < 2 {
            return Ok(());
        }
        let (previous, latest) = (prices[prices.len() - 2], prices[prices.len() - 1]);

        if latest > previous {
            ctx.place_order(OrderRequest::market(
                self.symbol.as_str(),
                TradeAction::Buy,
                self.lot,
                latest,
            ))?;
        } else if let Some(position) = ctx.position(&self.symbol)
            && position.is_long()
        {
            let qty = position.quantity.0;
            ctx.place_order(OrderRequest::market(
                self.symbol.as_str(),
                TradeAction::Sell,
                qty,
                latest,
            ))?;
        }
        Ok(())
    }
}

#[test]
fn snapshots_save_to_disk_and_read_back() -> anyhow::Result<()> {
    common::init_tracing();

    let mut agent = UpTickRider {
        symbol: Symbol::from("AAPL"),
        lot: 10.0,
    };
    let results = BacktestBuilder::new()
        .with_initial_capital(50_000.0)
        .run(&two_symbol_series(), &mut agent)?;

    let dir = std::env::temp_dir();
    let json_path = dir.join("paperdesk_backtest_snapshot.json");
    let csv_path = dir.join("paperdesk_backtest_metrics.csv");

    paperdesk::report::save_json(&results.snapshot(), &json_path)?;
    paperdesk::report::save_csv(
        &paperdesk::report::metrics_snapshot_to_csv(&results.metrics().snapshot()),
        &csv_path,
    )?;

    let back: paperdesk::backtester::BacktestSnapshot =
        paperdesk::report::from_json(&std::fs::read_to_string(&json_path)?)?;
    assert_eq!(back.trade_count, results.trade_count);

    let csv = std::fs::read_to_string(&csv_path)?;
    assert_eq!(csv.lines().count(), 2);

    std::fs::remove_file(json_path)?;
    std::fs::remove_file(csv_path)?;
    Ok(())
}

#[test]
fn agent_never_sees_the_future() {
    struct FutureProbe {
        max_visible: Vec<f64>,
    }
    impl Agent for FutureProbe {
        fn on_bar(&mut self, history: &HistoryView<'_>, _: &mut BacktestCtx<'_>) -> DeskResult<()> {
            let prices = history.prices(&Symbol::from("AAPL")).unwrap();
            self.max_visible.push(prices.iter().copied().fold(f64::MIN, f64::max));
            Ok(())
        }
    }

    let mut probe = FutureProbe {
        max_visible: Vec::new(),
    };
    BacktestBuilder::new()
        .run(&two_symbol_series(), &mut probe)
        .unwrap();

    // Day 1 sees only 100; the global max (112) only appears on the last day.
    assert_eq!(probe.max_visible[0], 100.0);
    assert_eq!(*probe.max_visible.last().unwrap(), 112.0);
    assert!(probe.max_visible.iter().all(|&m| m <= 112.0));
    assert!(probe.max_visible.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn fills_are_backdated_to_simulation_days() {
    let mut agent = UpTickRider {
        symbol: Symbol::from("AAPL"),
        lot: 10.0,
    };
    let results = BacktestBuilder::new()
        .with_initial_capital(50_000.0)
        .run(&two_symbol_series(), &mut agent)
        .unwrap();
    assert!(results.trade_count > 0);

    // Every fill timestamp is one of the series' trading days.
    let days: Vec<DateTime<Utc>> = (1..=10).map(day).collect();
    let metrics = results.metrics();
    let curve = metrics.equity_curve();
    assert!(curve.points().len() > 1);
    assert!(results.dates.iter().all(|d| days.contains(d) || *d == days[0]));
}

#[test]
fn equity_tracks_a_predictable_buy_and_hold() {
    struct BuyDayOne;
    impl Agent for BuyDayOne {
        fn on_bar(&mut self, history: &HistoryView<'_>, ctx: &mut BacktestCtx<'_>) -> DeskResult<()> {
            if history.len() == 1 {
                ctx.place_order(OrderRequest::market("AAPL", TradeAction::Buy, 50.0, 100.0))?;
            }
            Ok(())
        }
    }

    let results = BacktestBuilder::new()
        .with_initial_capital(10_000.0)
        .run(&two_symbol_series(), &mut BuyDayOne)
        .unwrap();

    // 50 shares from 100 → 112 = +600.
    assert_relative_eq!(results.final_capital, 10_600.0);
    assert_eq!(results.days(), 10);
    assert_eq!(results.daily_returns.len(), 10);

    // The equity curve follows the AAPL column shifted by the entry price.
    let expected_day5 = 10_000.0 + 50.0 * (107.0 - 100.0);
    assert_relative_eq!(results.equity_curve[5], expected_day5);
}

#[test]
fn commission_is_charged_per_fill_and_surfaces_in_results() {
    let mut agent = UpTickRider {
        symbol: Symbol::from("MSFT"),
        lot: 5.0,
    };
    let gross = BacktestBuilder::new()
        .with_initial_capital(100_000.0)
        .run(&two_symbol_series(), &mut agent)
        .unwrap();

    let mut agent = UpTickRider {
        symbol: Symbol::from("MSFT"),
        lot: 5.0,
    };
    let net = BacktestBuilder::new()
        .with_initial_capital(100_000.0)
        .with_commission_pct(0.001)
        .run(&two_symbol_series(), &mut agent)
        .unwrap();

    assert_eq!(gross.trade_count, net.trade_count);
    assert!(net.commission_paid > 0.0);
    assert_relative_eq!(gross.commission_paid, 0.0);
    assert_relative_eq!(
        net.final_capital,
        gross.final_capital - net.commission_paid,
        epsilon = 1e-6
    );
}

#[test]
fn slippage_perturbs_fills_within_the_configured_band() {
    struct BuyDayOne;
    impl Agent for BuyDayOne {
        fn on_bar(&mut self, history: &HistoryView<'_>, ctx: &mut BacktestCtx<'_>) -> DeskResult<()> {
            if history.len() == 1 {
                let (_, fills) =
                    ctx.place_order(OrderRequest::market("AAPL", TradeAction::Buy, 10.0, 100.0))?;
                let fill_price = fills[0].avg_fill_price.0;
                assert!(
                    (99.0..=101.0).contains(&fill_price),
                    "slippage band exceeded: {fill_price}"
                );
            }
            Ok(())
        }
    }

    BacktestBuilder::new()
        .with_slippage_pct(0.01)
        .with_seed(42)
        .run(&two_symbol_series(), &mut BuyDayOne)
        .unwrap();
}

#[test]
fn results_snapshot_round_trips_via_report() {
    let mut agent = UpTickRider {
        symbol: Symbol::from("AAPL"),
        lot: 10.0,
    };
    let results = BacktestBuilder::new()
        .with_initial_capital(50_000.0)
        .run(&two_symbol_series(), &mut agent)
        .unwrap();

    let json = paperdesk::report::to_json(&results.snapshot()).unwrap();
    let back: paperdesk::backtester::BacktestSnapshot = paperdesk::report::from_json(&json).unwrap();
    assert_eq!(back.trade_count, results.trade_count);
    assert_relative_eq!(back.final_capital, results.final_capital);
    assert_eq!(back.metrics.total_trades, results.trade_count);
}

#[test]
fn final_metrics_use_last_day_prices() {
    struct BuyAndHoldBoth;
    impl Agent for BuyAndHoldBoth {
        fn on_bar(&mut self, history: &HistoryView<'_>, ctx: &mut BacktestCtx<'_>) -> DeskResult<()> {
            if history.len() == 1 {
                ctx.place_order(OrderRequest::market("AAPL", TradeAction::Buy, 10.0, 100.0))?;
                ctx.place_order(OrderRequest::market("MSFT", TradeAction::Buy, 10.0, 300.0))?;
            }
            Ok(())
        }
    }

    let results = BacktestBuilder::new()
        .with_initial_capital(10_000.0)
        .run(&two_symbol_series(), &mut BuyAndHoldBoth)
        .unwrap();

    // AAPL +12 × 10, MSFT +12 × 10 over the run.
    assert_relative_eq!(results.metrics().total_return(), 240.0, epsilon = 1e-6);
    assert_relative_eq!(results.final_capital, 10_240.0);

    // The ledger replay at the final marks lands on the same equity.
    let curve = results.metrics().equity_curve();
    assert_relative_eq!(curve.last(), 10_240.0, epsilon = 1e-6);
}
