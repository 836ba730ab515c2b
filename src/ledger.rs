use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::{
    domain::{Cash, OrderId, OwnerKind, Qty, Symbol},
    trade::{Trade, TradeAction, TradeDirection, TradeStatus},
};

/// Out-of-band record of an order rejected before submission.
///
/// Rejections never become trades; they are visible only on the ledger of the
/// strategy that placed the order, so the trade indices stay clean.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectionRecord {
    pub order_id: OrderId,
    pub symbol: Symbol,
    pub action: TradeAction,
    pub quantity: Qty,
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// Direction histogram of a ledger.
///
/// `total_long` counts the long-side legs (BUY + SELL), `total_short` the
/// short-side legs (SELL_SHORT + BUY_TO_COVER).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionBreakdown {
    pub buy: usize,
    pub sell: usize,
    pub sell_short: usize,
    pub buy_to_cover: usize,
    pub total_long: usize,
    pub total_short: usize,
}

/// Owner-scoped, append-only audit trail of trades.
///
/// Every hierarchy level maintains one; a filled trade appears in the ledgers
/// of its strategy and every ancestor, in that order. Appends are O(1) and
/// the by-symbol / by-status / by-direction indices hold positions into the
/// chronological list.
#[derive(Debug, Clone)]
pub struct Ledger {
    owner_name: String,
    owner_kind: OwnerKind,
    created_at: DateTime<Utc>,

    trades: Vec<Arc<Trade>>,
    by_symbol: HashMap<Symbol, Vec<usize>>,
    by_status: HashMap<TradeStatus, Vec<usize>>,
    by_direction: HashMap<TradeDirection, Vec<usize>>,

    rejections: Vec<RejectionRecord>,
}

impl Ledger {
    pub fn new(owner_name: impl Into<String>, owner_kind: OwnerKind) -> Self {
        Self {
            owner_name: owner_name.into(),
            owner_kind,
            created_at: Utc::now(),
            trades: Vec::new(),
            by_symbol: HashMap::new(),
            by_status: HashMap::new(),
            by_direction: HashMap::new(),
            rejections: Vec::new(),
        }
    }

    pub fn owner_name(&self) -> &str {
        &self.owner_name
    }

    pub fn owner_kind(&self) -> OwnerKind {
        self.owner_kind
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Renames the owning entity; snapshots taken afterwards carry the new name.
    pub(crate) fn set_owner_name(&mut self, name: impl Into<String>) {
        self.owner_name = name.into();
    }

    /// Appends a trade and updates every index.
    pub fn record_trade(&mut self, trade: Arc<Trade>) {
        let idx = self.trades.len();
        self.by_symbol
            .entry(trade.symbol.clone())
            .or_default()
            .push(idx);
        self.by_status.entry(trade.status).or_default().push(idx);
        self.by_direction
            .entry(trade.direction)
            .or_default()
            .push(idx);

        tracing::debug!(
            owner = %self.owner_name,
            trade_id = %trade.trade_id,
            symbol = %trade.symbol,
            direction = %trade.direction,
            "trade recorded"
        );
        self.trades.push(trade);
    }

    /// Records an order rejection (strategy ledger only).
    pub fn record_rejection(&mut self, rejection: RejectionRecord) {
        tracing::warn!(
            owner = %self.owner_name,
            order_id = %rejection.order_id,
            symbol = %rejection.symbol,
            reason = %rejection.reason,
            "order rejection recorded"
        );
        self.rejections.push(rejection);
    }

    // ============================================================================================
    // Queries
    // ============================================================================================

    /// All trades in chronological order.
    pub fn trades(&self) -> &[Arc<Trade>] {
        &self.trades
    }

    pub fn rejections(&self) -> &[RejectionRecord] {
        &self.rejections
    }

    pub fn trades_by_symbol(&self, symbol: &Symbol) -> impl Iterator<Item = &Arc<Trade>> {
        self.by_symbol
            .get(symbol)
            .into_iter()
            .flatten()
            .map(|&idx| &self.trades[idx])
    }

    pub fn trades_by_status(&self, status: TradeStatus) -> impl Iterator<Item = &Arc<Trade>> {
        self.by_status
            .get(&status)
            .into_iter()
            .flatten()
            .map(|&idx| &self.trades[idx])
    }

    pub fn trades_by_direction(
        &self,
        direction: TradeDirection,
    ) -> impl Iterator<Item = &Arc<Trade>> {
        self.by_direction
            .get(&direction)
            .into_iter()
            .flatten()
            .map(|&idx| &self.trades[idx])
    }

    pub fn filled_trades(&self) -> impl Iterator<Item = &Arc<Trade>> {
        self.trades_by_status(TradeStatus::Filled)
    }

    /// Trades still in flight (pending or submitted).
    pub fn pending_trades(&self) -> impl Iterator<Item = &Arc<Trade>> {
        self.trades_by_status(TradeStatus::Pending)
            .chain(self.trades_by_status(TradeStatus::Submitted))
    }

    /// Trades whose creation time falls inside `[start, end]`.
    pub fn trades_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Iterator<Item = &Arc<Trade>> {
        self.trades
            .iter()
            .filter(move |t| start <= t.created_at && t.created_at <= end)
    }

    pub fn symbols_traded(&self) -> BTreeSet<Symbol> {
        self.by_symbol.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    // ============================================================================================
    // Statistics
    // ============================================================================================

    pub fn trade_count(&self) -> usize {
        self.trades.len()
    }

    pub fn filled_trade_count(&self) -> usize {
        self.by_status
            .get(&TradeStatus::Filled)
            .map_or(0, Vec::len)
    }

    /// Total dollar volume over FILLED trades, optionally for one symbol.
    pub fn total_volume(&self, symbol: Option<&Symbol>) -> Cash {
        let filled = |t: &&Arc<Trade>| t.status == TradeStatus::Filled;
        match symbol {
            Some(sym) => self
                .trades_by_symbol(sym)
                .filter(filled)
                .map(|t| t.fill_value())
                .sum(),
            None => self.filled_trades().map(|t| t.fill_value()).sum(),
        }
    }

    pub fn total_commission(&self) -> Cash {
        self.filled_trades().map(|t| t.commission).sum()
    }

    pub fn direction_breakdown(&self) -> DirectionBreakdown {
        let count = |d: TradeDirection| {
            self.by_direction.get(&d).map_or(0, Vec::len)
        };
        let buy = count(TradeDirection::Buy);
        let sell = count(TradeDirection::Sell);
        let sell_short = count(TradeDirection::SellShort);
        let buy_to_cover = count(TradeDirection::BuyToCover);
        DirectionBreakdown {
            buy,
            sell,
            sell_short,
            buy_to_cover,
            total_long: buy + sell,
            total_short: sell_short + buy_to_cover,
        }
    }

    /// Trade counts keyed by `YYYY-MM-DD` creation date.
    pub fn activity_by_date(&self) -> BTreeMap<String, usize> {
        self.trades
            .iter()
            .map(|t| t.created_at.format("%Y-%m-%d").to_string())
            .counts()
            .into_iter()
            .collect()
    }

    /// Stable exchange schema for CSV/JSON round-tripping.
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            owner_name: self.owner_name.clone(),
            owner_kind: self.owner_kind,
            created_at: self.created_at,
            total_trades: self.trade_count(),
            filled_trades: self.filled_trade_count(),
            rejections: self.rejections.len(),
            symbols_traded: self
                .symbols_traded()
                .into_iter()
                .map(|s| s.as_str().to_string())
                .collect(),
            total_volume: self.total_volume(None).0,
            total_commission: self.total_commission().0,
            trade_directions: self.direction_breakdown(),
            activity_by_date: self.activity_by_date(),
        }
    }
}

impl fmt::Display for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Ledger({}: {}, Trades: {}, Symbols: {})",
            self.owner_kind,
            self.owner_name,
            self.trade_count(),
            self.by_symbol.len()
        )
    }
}

/// Serializable summary of a ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub owner_name: String,
    pub owner_kind: OwnerKind,
    pub created_at: DateTime<Utc>,
    pub total_trades: usize,
    pub filled_trades: usize,
    pub rejections: usize,
    pub symbols_traded: Vec<String>,
    pub total_volume: f64,
    pub total_commission: f64,
    pub trade_directions: DirectionBreakdown,
    pub activity_by_date: BTreeMap<String, usize>,
}
