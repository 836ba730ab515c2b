use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    domain::Symbol,
    quotes::{PriceMap, QuoteSource},
    trade::{Trade, TradeDirection},
};

/// Days in a trading year, used to annualize step volatility.
const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Running `(signed_qty, avg_price)` state for one symbol during replay.
///
/// Mirrors the average-cost formulas the position table applies on
/// execution, so the reconstruction and the live accounting agree.
#[derive(Debug, Clone, Copy, Default)]
struct Holding {
    quantity: f64,
    avg_price: f64,
}

impl Holding {
    fn update(&mut self, direction: TradeDirection, fill_qty: f64, fill_price: f64) {
        match direction {
            TradeDirection::Buy | TradeDirection::BuyToCover => {
                if direction == TradeDirection::BuyToCover && self.quantity < 0.0 {
                    self.quantity += fill_qty;
                } else {
                    let old_value = self.quantity * self.avg_price;
                    let new_value = fill_qty * fill_price;
                    self.quantity += fill_qty;
                    if self.quantity != 0.0 {
                        self.avg_price = (old_value + new_value) / self.quantity;
                    }
                }
            }
            TradeDirection::Sell | TradeDirection::SellShort => {
                if direction == TradeDirection::Sell && self.quantity > 0.0 {
                    self.quantity -= fill_qty;
                } else {
                    let old_value = self.quantity * self.avg_price;
                    let new_value = -fill_qty * fill_price;
                    self.quantity -= fill_qty;
                    if self.quantity != 0.0 {
                        self.avg_price = (old_value + new_value) / self.quantity;
                    }
                }
            }
        }
    }
}

/// The equity series reconstructed from a ledger's fills.
///
/// Starts at the initial balance; after each fill (in fill-time order) the
/// next point is `initial + cumulative realized + Σ unrealized`, with open
/// holdings marked to the caller's quotes and falling back to the tracked
/// average price (break-even) where a quote is missing.
#[derive(Debug, Clone)]
pub struct EquityCurve(Vec<f64>);

impl EquityCurve {
    /// Replays filled trades into an equity series.
    ///
    /// The input is sorted by execution time internally; callers can hand the
    /// ledger's chronological slice straight in.
    pub fn replay(initial_balance: f64, trades: &[Arc<Trade>], quotes: &PriceMap) -> Self {
        let mut sorted: Vec<&Arc<Trade>> = trades.iter().collect();
        sorted.sort_by_key(|t| t.executed_at());

        let mut points = vec![initial_balance];
        let mut holdings: HashMap<Symbol, Holding> = HashMap::new();
        let mut cumulative_realized = 0.0;

        for trade in sorted {
            cumulative_realized += trade.realized.unwrap_or(0.0);

            holdings
                .entry(trade.symbol.clone())
                .or_default()
                .update(
                    trade.direction,
                    trade.filled_quantity.0,
                    trade.avg_fill_price.0,
                );

            let unrealized: f64 = holdings
                .iter()
                .filter(|(_, h)| h.quantity != 0.0)
                .map(|(symbol, h)| {
                    let mark = quotes.quote(symbol).map_or(h.avg_price, |p| p.0);
                    (mark - h.avg_price) * h.quantity
                })
                .sum();

            points.push(initial_balance + cumulative_realized + unrealized);
        }

        Self(points)
    }

    pub fn points(&self) -> &[f64] {
        &self.0
    }

    pub fn last(&self) -> f64 {
        *self.0.last().expect("curve always holds the initial point")
    }

    /// Maximum drawdown in percent (a negative number, 0 for a curve that
    /// never declines).
    pub fn max_drawdown_pct(&self) -> f64 {
        let mut peak = self.0[0];
        let mut max_dd = 0.0f64;
        for &equity in &self.0 {
            if equity > peak {
                peak = equity;
            }
            let drawdown = (equity - peak) / peak * 100.0;
            if drawdown < max_dd {
                max_dd = drawdown;
            }
        }
        max_dd
    }

    /// Simple returns between consecutive points, treated as daily.
    pub fn step_returns(&self) -> Vec<f64> {
        self.0
            .windows(2)
            .map(|pair| (pair[1] - pair[0]) / pair[0])
            .collect()
    }

    /// Annualized standard deviation of step returns, in percent.
    pub fn volatility_pct(&self) -> f64 {
        annualized_std_dev(&self.step_returns())
    }

    /// Annualized standard deviation of the negative step returns, in percent.
    pub fn downside_deviation_pct(&self) -> f64 {
        let negative: Vec<f64> = self
            .step_returns()
            .into_iter()
            .filter(|r| *r < 0.0)
            .collect();
        annualized_std_dev(&negative)
    }
}

fn annualized_std_dev(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
    variance.sqrt() * TRADING_DAYS_PER_YEAR.sqrt() * 100.0
}
