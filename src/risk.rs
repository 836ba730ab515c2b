//! Portfolio risk analysis over a price history.
//!
//! Everything here is derived from a [`PriceSeries`] (and optionally a
//! benchmark return series): Value at Risk, expected shortfall, correlation,
//! beta/alpha and current position exposure. Like the metrics module, this is
//! read-only; it never touches engine state.

use statrs::distribution::{ContinuousCDF, Normal};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

use crate::{
    backtester::PriceSeries,
    desk::Desk,
    domain::{StrategyId, Symbol},
    error::{DeskResult, RiskError},
    metrics::DEFAULT_RISK_FREE_RATE,
    quotes::QuoteSource,
};

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// How Value at Risk is estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarMethod {
    /// Percentile of the historical return distribution.
    Historical,
    /// Normal approximation from the sample mean and deviation.
    Parametric,
}

/// Risk analyzer over a price history and an optional benchmark.
///
/// Per-symbol simple returns are computed once at construction; the
/// "portfolio" in the VaR and volatility figures is the equal-weighted basket
/// of every symbol in the series unless explicit weights are supplied.
#[derive(Debug, Clone)]
pub struct RiskAnalyzer {
    symbols: Vec<Symbol>,
    /// Per-symbol return series, aligned; one entry per symbol.
    returns: Vec<Vec<f64>>,
    /// Benchmark returns aligned to the same steps.
    benchmark: Option<Vec<f64>>,
}

impl RiskAnalyzer {
    pub fn new(series: &PriceSeries) -> DeskResult<Self> {
        if series.len() < 2 {
            return Err(RiskError::InsufficientHistory(series.len()).into());
        }

        let symbols: Vec<Symbol> = series.symbols().cloned().collect();
        let returns = symbols
            .iter()
            .map(|symbol| {
                let column = series.column(symbol).expect("symbol taken from the series");
                column
                    .windows(2)
                    .map(|pair| (pair[1] - pair[0]) / pair[0])
                    .collect()
            })
            .collect();

        Ok(Self {
            symbols,
            returns,
            benchmark: None,
        })
    }

    /// Attaches benchmark returns (one per step between consecutive rows).
    pub fn with_benchmark(mut self, benchmark: Vec<f64>) -> DeskResult<Self> {
        let expected = self.steps();
        if benchmark.len() != expected {
            return Err(RiskError::BenchmarkMisaligned {
                benchmark: benchmark.len(),
                expected,
            }
            .into());
        }
        self.benchmark = Some(benchmark);
        Ok(self)
    }

    fn steps(&self) -> usize {
        self.returns.first().map_or(0, Vec::len)
    }

    /// Equal-weighted basket return per step.
    fn portfolio_returns(&self) -> Vec<f64> {
        (0..self.steps())
            .map(|step| {
                self.returns.iter().map(|column| column[step]).sum::<f64>()
                    / self.returns.len() as f64
            })
            .collect()
    }

    fn returns_of(&self, symbol: Option<&Symbol>) -> DeskResult<Vec<f64>> {
        match symbol {
            None => Ok(self.portfolio_returns()),
            Some(symbol) => {
                let index = self
                    .symbols
                    .iter()
                    .position(|s| s == symbol)
                    .ok_or_else(|| RiskError::UnknownSymbol(symbol.to_string()))?;
                Ok(self.returns[index].clone())
            }
        }
    }

    // ============================================================================================
    // Value at Risk
    // ============================================================================================

    /// Value at Risk of the equal-weighted basket, in percent. Negative
    /// values are potential losses: -2.5 at 95% confidence means losses are
    /// not expected to exceed 2.5% on 95 of 100 days.
    pub fn value_at_risk(&self, confidence: f64, method: VarMethod) -> DeskResult<f64> {
        if !(0.0..1.0).contains(&confidence) || confidence == 0.0 {
            return Err(RiskError::BadConfidence(confidence).into());
        }
        let returns = self.portfolio_returns();

        let var = match method {
            VarMethod::Historical => {
                let mut sorted = returns;
                sorted.sort_by(|a, b| a.total_cmp(b));
                percentile(&sorted, (1.0 - confidence) * 100.0)
            }
            VarMethod::Parametric => {
                let mean = returns.as_slice().mean();
                let std = returns.as_slice().std_dev();
                let normal =
                    Normal::new(0.0, 1.0).expect("standard normal parameters are valid");
                mean + normal.inverse_cdf(1.0 - confidence) * std
            }
        };
        Ok(var * 100.0)
    }

    /// Conditional VaR (expected shortfall): the average loss beyond the
    /// historical VaR threshold, in percent.
    pub fn conditional_var(&self, confidence: f64) -> DeskResult<f64> {
        let threshold = self.value_at_risk(confidence, VarMethod::Historical)? / 100.0;
        let returns = self.portfolio_returns();
        let tail: Vec<f64> = returns.into_iter().filter(|r| *r <= threshold).collect();
        if tail.is_empty() {
            return Ok(threshold * 100.0);
        }
        Ok(tail.as_slice().mean() * 100.0)
    }

    // ============================================================================================
    // Correlation & volatility
    // ============================================================================================

    /// Pearson correlation matrix between the series' symbols, in symbol
    /// order.
    pub fn correlation_matrix(&self) -> (Vec<Symbol>, Vec<Vec<f64>>) {
        let n = self.symbols.len();
        let mut matrix = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in 0..n {
                matrix[i][j] = if i == j {
                    1.0
                } else {
                    correlation(&self.returns[i], &self.returns[j])
                };
            }
        }
        (self.symbols.clone(), matrix)
    }

    /// Annualized basket volatility in percent; equal-weighted unless
    /// per-symbol weights are supplied (missing weights count as zero).
    pub fn portfolio_volatility(&self, weights: Option<&BTreeMap<Symbol, f64>>) -> f64 {
        let returns: Vec<f64> = match weights {
            None => self.portfolio_returns(),
            Some(weights) => (0..self.steps())
                .map(|step| {
                    self.symbols
                        .iter()
                        .zip(&self.returns)
                        .map(|(symbol, column)| {
                            weights.get(symbol).copied().unwrap_or(0.0) * column[step]
                        })
                        .sum()
                })
                .collect(),
        };
        returns.as_slice().std_dev() * TRADING_DAYS_PER_YEAR.sqrt() * 100.0
    }

    // ============================================================================================
    // Market risk vs benchmark
    // ============================================================================================

    /// Beta of a symbol (or the basket) against the benchmark:
    /// `cov(asset, benchmark) / var(benchmark)`.
    pub fn beta(&self, symbol: Option<&Symbol>) -> DeskResult<f64> {
        let benchmark = self
            .benchmark
            .as_deref()
            .ok_or(RiskError::MissingBenchmark("beta"))?;
        let asset = self.returns_of(symbol)?;

        let benchmark_variance = benchmark.variance();
        if benchmark_variance == 0.0 {
            return Ok(0.0);
        }
        Ok(covariance(&asset, benchmark) / benchmark_variance)
    }

    /// Annualized alpha in percent:
    /// `asset − (rf + β × (benchmark − rf))`.
    pub fn alpha(&self, symbol: Option<&Symbol>, risk_free_rate: f64) -> DeskResult<f64> {
        let benchmark = self
            .benchmark
            .as_deref()
            .ok_or(RiskError::MissingBenchmark("alpha"))?;
        let beta = self.beta(symbol)?;
        let asset = self.returns_of(symbol)?;

        let asset_annual = annualize(asset.as_slice().mean());
        let benchmark_annual = annualize(benchmark.mean());
        let alpha =
            asset_annual - (risk_free_rate + beta * (benchmark_annual - risk_free_rate));
        Ok(alpha * 100.0)
    }

    /// [`alpha`](Self::alpha) at the default risk-free rate.
    pub fn alpha_default(&self, symbol: Option<&Symbol>) -> DeskResult<f64> {
        self.alpha(symbol, DEFAULT_RISK_FREE_RATE)
    }

    // ============================================================================================
    // Exposure
    // ============================================================================================

    /// Open-position exposure of a strategy, as a percentage of its capital,
    /// marked to the latest quotes (entry price where the quote is missing).
    pub fn position_exposure(
        &self,
        desk: &Desk,
        strategy: StrategyId,
        quotes: &dyn QuoteSource,
    ) -> DeskResult<BTreeMap<Symbol, f64>> {
        let capital = desk.strategy_capital(strategy)?;
        let mut exposures = BTreeMap::new();
        if capital.0 <= 0.0 {
            return Ok(exposures);
        }
        for position in desk.open_positions(strategy)? {
            let mark = quotes
                .quote(&position.symbol)
                .unwrap_or(position.avg_entry_price);
            let pct = position.market_value(mark).0 / capital.0 * 100.0;
            exposures.insert(position.symbol.clone(), pct);
        }
        Ok(exposures)
    }
}

/// Linear-interpolated percentile of a sorted slice.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (rank - lo as f64) * (sorted[hi] - sorted[lo])
    }
}

fn covariance(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let mean_a = a[..n].mean();
    let mean_b = b[..n].mean();
    a[..n]
        .iter()
        .zip(&b[..n])
        .map(|(x, y)| (x - mean_a) * (y - mean_b))
        .sum::<f64>()
        / (n - 1) as f64
}

fn correlation(a: &[f64], b: &[f64]) -> f64 {
    let std_a = a.std_dev();
    let std_b = b.std_dev();
    if std_a == 0.0 || std_b == 0.0 {
        return 0.0;
    }
    covariance(a, b) / (std_a * std_b)
}

fn annualize(mean_daily: f64) -> f64 {
    (1.0 + mean_daily).powf(TRADING_DAYS_PER_YEAR) - 1.0
}
