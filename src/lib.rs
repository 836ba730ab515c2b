// === Public Modules (The Canonical Paths) ===
pub mod backtester;
pub mod desk;
pub mod domain;
pub mod error;
pub mod events;
pub mod ledger;
pub mod metrics;
pub mod oms;
pub mod position;
pub mod quotes;
pub mod report;
pub mod risk;
pub mod rules;
pub mod tms;
pub mod trade;

// === Private Implementation Details ===
mod macros;

// === Convenience ===
pub mod sorted_vec_map;

// The everyday surface: the engine root, its handles, and the request types
// callers hand it.
pub use crate::desk::{Desk, LevelId};
pub use crate::domain::{
    AccountId, Cash, FundId, OrderId, OwnerKey, OwnerKind, PortfolioId, Price, Qty, StrategyId,
    Symbol, TradeId,
};
pub use crate::error::{DeskError, DeskResult};
pub use crate::oms::{Order, OrderRequest, OrderStatus};
pub use crate::quotes::PriceMap;
pub use crate::rules::TradeRules;
pub use crate::trade::{OrderKind, Trade, TradeAction, TradeDirection, TradeStatus};
