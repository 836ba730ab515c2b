use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    domain::{Cash, Price, Qty, StrategyId, Symbol},
    trade::{Trade, TradeDirection},
};

/// Side of a position, derived from its signed quantity.
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
    IntoStaticStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionSide {
    Long,
    Short,
    Flat,
}

/// Per `(strategy, symbol)` running state: signed quantity, average entry
/// price, realized P&L and the trades that built it.
///
/// Accounting is average-cost: the entry price is re-weighted only when the
/// quantity increases in the position's direction; quantity-reducing fills
/// realize P&L against the running average, symmetrically for longs
/// (`SELL` against `q > 0`) and shorts (`BUY_TO_COVER` against `q < 0`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: Symbol,
    pub strategy: StrategyId,

    /// Signed quantity: positive = long, negative = short, zero = closed.
    pub quantity: Qty,
    pub avg_entry_price: Price,
    /// `|quantity| × avg_entry_price`, maintained on every fill.
    pub total_cost_basis: Cash,

    pub realized_pnl: f64,

    pub opening_trades: Vec<Arc<Trade>>,
    pub closing_trades: Vec<Arc<Trade>>,

    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Position {
    pub fn new(symbol: Symbol, strategy: StrategyId, opened_at: DateTime<Utc>) -> Self {
        Self {
            symbol,
            strategy,
            quantity: Qty(0.0),
            avg_entry_price: Price(0.0),
            total_cost_basis: Cash(0.0),
            realized_pnl: 0.0,
            opening_trades: Vec::new(),
            closing_trades: Vec::new(),
            opened_at,
            closed_at: None,
        }
    }

    pub fn is_long(&self) -> bool {
        self.quantity.is_long()
    }

    pub fn is_short(&self) -> bool {
        self.quantity.is_short()
    }

    pub fn is_closed(&self) -> bool {
        self.quantity.is_flat()
    }

    pub fn side(&self) -> PositionSide {
        if self.is_long() {
            PositionSide::Long
        } else if self.is_short() {
            PositionSide::Short
        } else {
            PositionSide::Flat
        }
    }

    /// Market value of the position at the given price (zero when closed).
    pub fn market_value(&self, price: Price) -> Cash {
        if self.is_closed() {
            return Cash(0.0);
        }
        self.quantity.notional_at(price)
    }

    /// Unrealized P&L at the given price, signed by position direction.
    pub fn unrealized_pnl(&self, price: Price) -> f64 {
        if self.is_closed() {
            return 0.0;
        }
        (price.0 - self.avg_entry_price.0) * self.quantity.0
    }

    /// Applies a filled trade to this position and stamps the trade's
    /// realized-P&L tag when the fill reduced the position.
    ///
    /// The trade must already carry its fill quantity, fill price and
    /// execution timestamp; it is wrapped into an `Arc` and attached to the
    /// opening or closing list only after this call.
    pub fn apply_fill(&mut self, trade: &mut Trade) {
        let fill_qty = trade.filled_quantity.abs();
        let fill_price = trade.avg_fill_price;
        let was_flat = self.is_closed();

        match trade.direction {
            TradeDirection::Buy | TradeDirection::BuyToCover => {
                if trade.direction == TradeDirection::BuyToCover && self.is_short() {
                    // Covering a short realizes P&L against the running average.
                    let realized = (self.avg_entry_price.0 - fill_price.0) * fill_qty.0;
                    self.realized_pnl += realized;
                    trade.realized = Some(realized);
                    self.quantity += fill_qty;
                } else {
                    // Opening or adding to a long: re-weight the average.
                    let old_value = self.quantity.0 * self.avg_entry_price.0;
                    let new_value = fill_qty.0 * fill_price.0;
                    self.quantity += fill_qty;
                    if !self.quantity.is_flat() {
                        self.avg_entry_price = Price((old_value + new_value) / self.quantity.0);
                    }
                }
            }
            TradeDirection::Sell | TradeDirection::SellShort => {
                if trade.direction == TradeDirection::Sell && self.is_long() {
                    // Closing a long realizes P&L against the running average.
                    let realized = (fill_price.0 - self.avg_entry_price.0) * fill_qty.0;
                    self.realized_pnl += realized;
                    trade.realized = Some(realized);
                    self.quantity -= fill_qty;
                } else {
                    // Opening or adding to a short: the weighted-average
                    // formula holds with the quantity taken as signed.
                    let old_value = self.quantity.0 * self.avg_entry_price.0;
                    let new_value = -fill_qty.0 * fill_price.0;
                    self.quantity -= fill_qty;
                    if !self.quantity.is_flat() {
                        self.avg_entry_price = Price((old_value + new_value) / self.quantity.0);
                    }
                }
            }
        }

        let at = trade.executed_at();
        if was_flat && !self.is_closed() {
            self.opened_at = at;
            self.closed_at = None;
        } else if !was_flat && self.is_closed() {
            self.closed_at = Some(at);
        }

        self.total_cost_basis = self.quantity.notional_at(self.avg_entry_price);
    }

    /// Attaches the shared trade record to the opening or closing list,
    /// according to the realized tag [`apply_fill`](Self::apply_fill) set.
    pub fn attach(&mut self, trade: Arc<Trade>) {
        if trade.is_closing() {
            self.closing_trades.push(trade);
        } else {
            self.opening_trades.push(trade);
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Position({}, {}, Qty: {}, Avg: ${:.2})",
            self.symbol,
            self.side(),
            self.quantity.0,
            self.avg_entry_price.0
        )
    }
}
