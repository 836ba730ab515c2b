use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::domain::{Cash, OrderId, Price, Qty, StrategyId, Symbol, TradeId};

// ================================================================================================
// Wire Enums
// ================================================================================================

/// A caller's unsigned intent: buy or sell some quantity of a symbol.
///
/// The order management core translates an intent into one or two signed
/// [`TradeDirection`]s based on the current position.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeAction {
    Buy,
    Sell,
}

/// Signed execution direction of a trade instruction.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeDirection {
    Buy,
    Sell,
    SellShort,
    BuyToCover,
}

impl TradeDirection {
    /// The unsigned intent this direction maps back to.
    pub fn intent(self) -> TradeAction {
        match self {
            TradeDirection::Buy | TradeDirection::BuyToCover => TradeAction::Buy,
            TradeDirection::Sell | TradeDirection::SellShort => TradeAction::Sell,
        }
    }

    /// `true` for directions that increase the signed position quantity.
    pub fn adds_quantity(self) -> bool {
        matches!(self, TradeDirection::Buy | TradeDirection::BuyToCover)
    }

    /// Applies this direction's sign to an unsigned fill quantity.
    pub fn signed(self, qty: Qty) -> Qty {
        if self.adds_quantity() { qty.abs() } else { -qty.abs() }
    }

    /// `true` for the two legs that touch the short side of a position.
    pub fn is_short_side(self) -> bool {
        matches!(self, TradeDirection::SellShort | TradeDirection::BuyToCover)
    }
}

/// Order type of a trade instruction.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderKind {
    Market,
    Limit,
    StopLoss,
    StopLimit,
    TrailingStop,
}

/// Lifecycle status of a trade.
///
/// Created `Pending` inside the OMS, transitioned `Submitted` then `Filled`
/// by the TMS on execution. Terminal trades are never mutated.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeStatus {
    Pending,
    Submitted,
    Filled,
    PartiallyFilled,
    Cancelled,
    Rejected,
}

impl TradeStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TradeStatus::Filled | TradeStatus::Cancelled | TradeStatus::Rejected
        )
    }
}

// ================================================================================================
// Trade Record
// ================================================================================================

/// A signed execution record.
///
/// Trades are created by the trade management core, filled synchronously, and
/// shared immutably (`Arc<Trade>`) across every ledger of the owning
/// hierarchy chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: TradeId,
    /// The client order this execution belongs to.
    pub order_id: OrderId,
    pub symbol: Symbol,
    pub direction: TradeDirection,
    /// Requested quantity, strictly positive.
    pub quantity: Qty,
    pub order_kind: OrderKind,
    pub limit_price: Option<Price>,
    pub stop_price: Option<Price>,
    pub strategy: StrategyId,

    pub status: TradeStatus,
    pub filled_quantity: Qty,
    pub avg_fill_price: Price,
    pub commission: Cash,

    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub filled_at: Option<DateTime<Utc>>,

    /// Realized-P&L tag, set by the TMS only on quantity-reducing legs.
    ///
    /// `Some(_)` marks this trade as a closing trade; the performance module
    /// classifies winners and losers off this tag.
    pub realized: Option<f64>,
}

impl Trade {
    /// Notional value of the fill.
    pub fn fill_value(&self) -> Cash {
        self.filled_quantity.notional_at(self.avg_fill_price)
    }

    /// `true` when this trade reduced an existing position.
    pub fn is_closing(&self) -> bool {
        self.realized.is_some()
    }

    /// Execution timestamp: fill time, falling back to creation time.
    pub fn executed_at(&self) -> DateTime<Utc> {
        self.filled_at.unwrap_or(self.created_at)
    }
}

impl fmt::Display for Trade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Trade({}, {}, {} @ {}, {})",
            self.symbol, self.direction, self.quantity.0, self.order_kind, self.status
        )
    }
}
