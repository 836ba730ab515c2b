//! Performance analytics over a ledger and a pair of balances.
//!
//! Works at any hierarchy level; the desk assembles the balances, the ledger
//! supplies the fills, and the caller supplies current prices. Everything is
//! derived; nothing here mutates engine state.

pub mod equity_curve;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    domain::{Cash, OwnerKind},
    ledger::Ledger,
    quotes::PriceMap,
    trade::Trade,
};

pub use equity_curve::EquityCurve;

/// Annual risk-free rate the snapshot uses for Sharpe/Sortino.
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.02;

/// Annualized-return floor: below roughly four days of history the CAGR
/// degenerates, so simple return is reported instead.
const MIN_YEARS_FOR_CAGR: f64 = 0.01;

/// Performance metrics calculator.
///
/// Snapshots the ledger's filled trades at construction; winners and losers
/// are the closing trades (fills carrying the realized-P&L tag) with positive
/// and negative realized P&L respectively.
#[derive(Debug, Clone)]
pub struct PerformanceMetrics {
    owner_name: String,
    owner_kind: OwnerKind,
    initial_balance: Cash,
    current_balance: Cash,
    quotes: PriceMap,
    /// Filled trades in fill-time order.
    trades: Vec<Arc<Trade>>,
    total_volume: Cash,
}

impl PerformanceMetrics {
    pub fn new(
        owner_name: impl Into<String>,
        owner_kind: OwnerKind,
        ledger: &Ledger,
        initial_balance: Cash,
        current_balance: Cash,
        quotes: Option<&PriceMap>,
    ) -> Self {
        let mut trades: Vec<Arc<Trade>> = ledger.filled_trades().cloned().collect();
        trades.sort_by_key(|t| t.executed_at());

        Self {
            owner_name: owner_name.into(),
            owner_kind,
            initial_balance,
            current_balance,
            quotes: quotes.cloned().unwrap_or_default(),
            total_volume: ledger.total_volume(None),
            trades,
        }
    }

    pub fn owner_name(&self) -> &str {
        &self.owner_name
    }

    pub fn owner_kind(&self) -> OwnerKind {
        self.owner_kind
    }

    pub fn initial_balance(&self) -> Cash {
        self.initial_balance
    }

    pub fn current_balance(&self) -> Cash {
        self.current_balance
    }

    // ============================================================================================
    // Return metrics
    // ============================================================================================

    /// Total return in dollars.
    pub fn total_return(&self) -> f64 {
        (self.current_balance - self.initial_balance).0
    }

    pub fn total_return_pct(&self) -> f64 {
        if self.initial_balance.0 == 0.0 {
            return 0.0;
        }
        self.total_return() / self.initial_balance.0 * 100.0
    }

    /// Annualized return (CAGR) in percent, over the window from the first
    /// trade's creation to the last trade's fill. Falls back to simple return
    /// below the four-day floor.
    pub fn annualized_return(&self) -> f64 {
        let Some(days) = self.trading_window_days() else {
            return 0.0;
        };
        let years = days / 365.25;
        if years < MIN_YEARS_FOR_CAGR {
            return self.total_return_pct();
        }
        if self.initial_balance.0 > 0.0 && self.current_balance.0 > 0.0 {
            let growth = self.current_balance.0 / self.initial_balance.0;
            return (growth.powf(1.0 / years) - 1.0) * 100.0;
        }
        0.0
    }

    /// Whole days from the first trade's creation to the last trade's fill.
    fn trading_window_days(&self) -> Option<f64> {
        let first = self.trades.iter().map(|t| t.created_at).min()?;
        let last = self.trades.iter().map(|t| t.executed_at()).max()?;
        Some((last - first).num_days() as f64)
    }

    // ============================================================================================
    // Trade statistics
    // ============================================================================================

    pub fn total_trades(&self) -> usize {
        self.trades.len()
    }

    /// Closing trades with positive realized P&L.
    pub fn winning_trades(&self) -> Vec<&Arc<Trade>> {
        self.trades
            .iter()
            .filter(|t| t.realized.is_some_and(|pnl| pnl > 0.0))
            .collect()
    }

    /// Closing trades with negative realized P&L.
    pub fn losing_trades(&self) -> Vec<&Arc<Trade>> {
        self.trades
            .iter()
            .filter(|t| t.realized.is_some_and(|pnl| pnl < 0.0))
            .collect()
    }

    /// Winners over closing trades, in percent. Zero when nothing closed.
    pub fn win_rate(&self) -> f64 {
        let winners = self.winning_trades().len();
        let losers = self.losing_trades().len();
        let closing = winners + losers;
        if closing == 0 {
            return 0.0;
        }
        winners as f64 / closing as f64 * 100.0
    }

    /// Gross profit over gross loss. `+∞` when there are winners but no
    /// losers; zero when there are no winners.
    pub fn profit_factor(&self) -> f64 {
        let gross_profit: f64 = self
            .winning_trades()
            .iter()
            .filter_map(|t| t.realized)
            .sum();
        if gross_profit == 0.0 {
            return 0.0;
        }
        let gross_loss: f64 = self
            .losing_trades()
            .iter()
            .filter_map(|t| t.realized)
            .sum::<f64>()
            .abs();
        if gross_loss == 0.0 {
            return f64::INFINITY;
        }
        gross_profit / gross_loss
    }

    pub fn average_trade_pnl(&self) -> f64 {
        if self.trades.is_empty() {
            return 0.0;
        }
        self.total_return() / self.trades.len() as f64
    }

    pub fn largest_win(&self) -> f64 {
        self.winning_trades()
            .iter()
            .filter_map(|t| t.realized)
            .fold(0.0, f64::max)
    }

    pub fn largest_loss(&self) -> f64 {
        self.losing_trades()
            .iter()
            .filter_map(|t| t.realized)
            .fold(0.0, f64::min)
    }

    pub fn total_volume(&self) -> f64 {
        self.total_volume.0
    }

    /// Average fills per day over the first-to-last fill window.
    pub fn trade_frequency(&self) -> f64 {
        if self.trades.len() < 2 {
            return 0.0;
        }
        let days = self
            .trading_window_days()
            .expect("non-empty trade list has a window")
            .max(1.0);
        self.trades.len() as f64 / days
    }

    // ============================================================================================
    // Risk metrics
    // ============================================================================================

    /// Equity series replayed from the ledger at the supplied quotes.
    pub fn equity_curve(&self) -> EquityCurve {
        EquityCurve::replay(self.initial_balance.0, &self.trades, &self.quotes)
    }

    /// Maximum drawdown in percent (negative).
    pub fn max_drawdown(&self) -> f64 {
        if self.trades.is_empty() {
            return 0.0;
        }
        self.equity_curve().max_drawdown_pct()
    }

    /// Annualized volatility of equity-step returns, in percent.
    pub fn volatility(&self) -> f64 {
        if self.trades.len() < 2 {
            return 0.0;
        }
        self.equity_curve().volatility_pct()
    }

    /// Annualized deviation of the negative equity-step returns, in percent.
    pub fn downside_deviation(&self) -> f64 {
        if self.trades.len() < 2 {
            return 0.0;
        }
        self.equity_curve().downside_deviation_pct()
    }

    // ============================================================================================
    // Risk-adjusted returns
    // ============================================================================================

    /// (CAGR − risk-free) / volatility; zero when volatility is zero.
    pub fn sharpe_ratio(&self, risk_free_rate: f64) -> f64 {
        let annual_return = self.annualized_return() / 100.0;
        let volatility = self.volatility() / 100.0;
        if volatility == 0.0 {
            return 0.0;
        }
        (annual_return - risk_free_rate) / volatility
    }

    /// (CAGR − risk-free) / downside deviation; zero when the denominator is.
    pub fn sortino_ratio(&self, risk_free_rate: f64) -> f64 {
        let annual_return = self.annualized_return() / 100.0;
        let downside = self.downside_deviation() / 100.0;
        if downside == 0.0 {
            return 0.0;
        }
        (annual_return - risk_free_rate) / downside
    }

    /// CAGR / |max drawdown|; zero when the drawdown is zero.
    pub fn calmar_ratio(&self) -> f64 {
        let max_dd = self.max_drawdown().abs();
        if max_dd == 0.0 {
            return 0.0;
        }
        self.annualized_return() / max_dd
    }

    // ============================================================================================
    // Export
    // ============================================================================================

    /// Stable exchange schema for CSV/JSON round-tripping.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            owner_name: self.owner_name.clone(),
            owner_kind: self.owner_kind,
            initial_balance: self.initial_balance.0,
            current_balance: self.current_balance.0,
            total_return: self.total_return(),
            total_return_pct: self.total_return_pct(),
            annualized_return: self.annualized_return(),
            total_trades: self.total_trades(),
            winning_trades: self.winning_trades().len(),
            losing_trades: self.losing_trades().len(),
            win_rate: self.win_rate(),
            profit_factor: self.profit_factor(),
            average_trade_pnl: self.average_trade_pnl(),
            largest_win: self.largest_win(),
            largest_loss: self.largest_loss(),
            total_volume: self.total_volume(),
            max_drawdown: self.max_drawdown(),
            volatility: self.volatility(),
            downside_deviation: self.downside_deviation(),
            sharpe_ratio: self.sharpe_ratio(DEFAULT_RISK_FREE_RATE),
            sortino_ratio: self.sortino_ratio(DEFAULT_RISK_FREE_RATE),
            calmar_ratio: self.calmar_ratio(),
            trade_frequency: self.trade_frequency(),
        }
    }
}

/// Serializable summary of a metrics run.
///
/// `profit_factor` can be `+∞`, which JSON cannot carry; it is serialized as
/// `null` and read back as infinity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub owner_name: String,
    pub owner_kind: OwnerKind,
    pub initial_balance: f64,
    pub current_balance: f64,
    pub total_return: f64,
    pub total_return_pct: f64,
    pub annualized_return: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    #[serde(
        serialize_with = "serialize_maybe_infinite",
        deserialize_with = "deserialize_maybe_infinite"
    )]
    pub profit_factor: f64,
    pub average_trade_pnl: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub total_volume: f64,
    pub max_drawdown: f64,
    pub volatility: f64,
    pub downside_deviation: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    pub trade_frequency: f64,
}

fn serialize_maybe_infinite<S: serde::Serializer>(
    value: &f64,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_some(value)
    } else {
        serializer.serialize_none()
    }
}

fn deserialize_maybe_infinite<'de, D: serde::Deserializer<'de>>(
    deserializer: D,
) -> Result<f64, D::Error> {
    let value: Option<f64> = serde::Deserialize::deserialize(deserializer)?;
    Ok(value.unwrap_or(f64::INFINITY))
}
