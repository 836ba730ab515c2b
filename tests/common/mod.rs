#![allow(dead_code)]

use paperdesk::{
    AccountId, Cash, Desk, FundId, OrderRequest, PortfolioId, StrategyId, TradeAction,
};

/// Relative tolerance for cash/equity comparisons.
pub const TOLERANCE: f64 = 1e-6;

static TRACING: std::sync::Once = std::sync::Once::new();

/// Installs the test subscriber once; `RUST_LOG` controls verbosity.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Account → Fund(1M) → Portfolio(500k) → Strategy(100k).
pub fn four_level_desk() -> (Desk, AccountId, FundId, PortfolioId, StrategyId) {
    let mut desk = Desk::new();
    let account = desk.create_account("ACC001", "Main Account");
    let fund = desk
        .create_fund(Some(account), "FUND001", "Growth Fund", Cash(1_000_000.0))
        .expect("fund fits");
    let portfolio = desk
        .create_portfolio(Some(fund), "PORT001", "Tech Portfolio", Cash(500_000.0))
        .expect("portfolio fits");
    let strategy = desk
        .create_strategy(Some(portfolio), "STRAT001", "Momentum", Cash(100_000.0))
        .expect("strategy fits");
    (desk, account, fund, portfolio, strategy)
}

/// A standalone strategy with the given capital.
pub fn standalone_strategy(capital: f64) -> (Desk, StrategyId) {
    let mut desk = Desk::new();
    let strategy = desk
        .create_strategy(None, "STRAT001", "Standalone", Cash(capital))
        .expect("standalone creation cannot fail");
    (desk, strategy)
}

pub fn buy(symbol: &str, qty: f64, price: f64) -> OrderRequest {
    OrderRequest::market(symbol, TradeAction::Buy, qty, price)
}

pub fn sell(symbol: &str, qty: f64, price: f64) -> OrderRequest {
    OrderRequest::market(symbol, TradeAction::Sell, qty, price)
}
