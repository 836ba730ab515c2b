use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metrics::{MetricsSnapshot, PerformanceMetrics};

/// Outcome of a historical simulation run.
#[derive(Debug, Clone)]
pub struct BacktestResults {
    pub equity_curve: Vec<f64>,
    /// One timestamp per equity point (the first is the window start).
    pub dates: Vec<DateTime<Utc>>,
    pub daily_returns: Vec<f64>,
    pub initial_capital: f64,
    pub final_capital: f64,
    pub trade_count: usize,
    pub commission_paid: f64,
    metrics: PerformanceMetrics,
}

impl BacktestResults {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        equity_curve: Vec<f64>,
        dates: Vec<DateTime<Utc>>,
        daily_returns: Vec<f64>,
        initial_capital: f64,
        final_capital: f64,
        trade_count: usize,
        commission_paid: f64,
        metrics: PerformanceMetrics,
    ) -> Self {
        Self {
            equity_curve,
            dates,
            daily_returns,
            initial_capital,
            final_capital,
            trade_count,
            commission_paid,
            metrics,
        }
    }

    pub fn total_return(&self) -> f64 {
        self.final_capital - self.initial_capital
    }

    pub fn total_return_pct(&self) -> f64 {
        if self.initial_capital == 0.0 {
            return 0.0;
        }
        self.total_return() / self.initial_capital * 100.0
    }

    /// Simulated days (equity points minus the seed point).
    pub fn days(&self) -> usize {
        self.equity_curve.len().saturating_sub(1)
    }

    /// Full performance metrics over the simulated strategy's ledger,
    /// valued at the final day's prices.
    pub fn metrics(&self) -> &PerformanceMetrics {
        &self.metrics
    }

    /// Stable exchange schema for CSV/JSON round-tripping.
    pub fn snapshot(&self) -> BacktestSnapshot {
        BacktestSnapshot {
            initial_capital: self.initial_capital,
            final_capital: self.final_capital,
            total_return: self.total_return(),
            total_return_pct: self.total_return_pct(),
            days: self.days(),
            trade_count: self.trade_count,
            commission_paid: self.commission_paid,
            metrics: self.metrics.snapshot(),
        }
    }
}

/// Serializable summary of a backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestSnapshot {
    pub initial_capital: f64,
    pub final_capital: f64,
    pub total_return: f64,
    pub total_return_pct: f64,
    pub days: usize,
    pub trade_count: usize,
    pub commission_paid: f64,
    pub metrics: MetricsSnapshot,
}
