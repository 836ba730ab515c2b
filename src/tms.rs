use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    domain::{Cash, Qty, StrategyId, Symbol, TradeId},
    events::{EngineEvent, EventKind, EventSink, NoopSink},
    oms::TradeInstruction,
    position::Position,
    quotes::QuoteSource,
    trade::{Trade, TradeStatus},
};

pub type PositionKey = (StrategyId, Symbol);

/// Trade management core: executes validated instructions, owns the position
/// table and produces the shared trade records the ledgers cascade.
///
/// One instance exists per connected hierarchy subtree; all mutation happens
/// through [`execute_trade`](Self::execute_trade).
#[derive(Debug)]
pub struct Tms {
    positions: HashMap<PositionKey, Position>,
    next_trade_id: u64,
    /// Commission charged per fill as a fraction of trade value. Zero unless
    /// a simulation driver configures it.
    commission_pct: f64,
    events: Box<dyn EventSink + Send>,
}

impl Default for Tms {
    fn default() -> Self {
        Self::new()
    }
}

impl Tms {
    pub fn new() -> Self {
        Self {
            positions: HashMap::new(),
            next_trade_id: 1,
            commission_pct: 0.0,
            events: Box::new(NoopSink),
        }
    }

    pub fn set_event_sink(&mut self, sink: Box<dyn EventSink + Send>) {
        self.events = sink;
    }

    pub fn set_commission_pct(&mut self, commission_pct: f64) {
        self.commission_pct = commission_pct;
    }

    /// Executes one validated instruction: immediate synchronous fill,
    /// position update, realized-P&L tagging.
    ///
    /// Returns the shared trade record; recording it into the hierarchy's
    /// ledgers is the caller's job (the ledgers live on the hierarchy nodes).
    /// Nothing in here can fail, which is what makes a multi-instruction
    /// order all-or-nothing: every fallible check ran before submission.
    #[tracing::instrument(skip(self, instruction), fields(symbol = %instruction.symbol, direction = %instruction.direction, qty = instruction.quantity.0))]
    pub fn execute_trade(&mut self, instruction: &TradeInstruction) -> Arc<Trade> {
        let trade_id = TradeId(self.next_trade_id);
        self.next_trade_id += 1;

        let executed_at = instruction.trade_date.unwrap_or_else(Utc::now);
        let fill_value = instruction.quantity.notional_at(instruction.price);

        let mut trade = Trade {
            trade_id,
            order_id: instruction.order_id,
            symbol: instruction.symbol.clone(),
            direction: instruction.direction,
            quantity: instruction.quantity,
            order_kind: instruction.order_kind,
            limit_price: Some(instruction.price),
            stop_price: instruction.stop_price,
            strategy: instruction.strategy,
            status: TradeStatus::Submitted,
            filled_quantity: instruction.quantity,
            avg_fill_price: instruction.price,
            commission: Cash(fill_value.0 * self.commission_pct),
            created_at: executed_at,
            submitted_at: Some(executed_at),
            filled_at: None,
            realized: None,
        };

        // Simulated fill is immediate and total.
        trade.status = TradeStatus::Filled;
        trade.filled_at = Some(executed_at);

        let key = (instruction.strategy, instruction.symbol.clone());
        let position = self
            .positions
            .entry(key)
            .or_insert_with(|| {
                Position::new(instruction.symbol.clone(), instruction.strategy, executed_at)
            });
        position.apply_fill(&mut trade);

        tracing::debug!(
            trade_id = %trade.trade_id,
            qty = position.quantity.0,
            avg = position.avg_entry_price.0,
            realized = position.realized_pnl,
            "position updated"
        );

        let trade = Arc::new(trade);
        position.attach(Arc::clone(&trade));

        if self.events.enabled() {
            self.events.record(
                EngineEvent::new(
                    EventKind::TradeExecuted,
                    format!(
                        "{} {} {} @ {}",
                        trade.direction, trade.filled_quantity.0, trade.symbol, trade.avg_fill_price.0
                    ),
                )
                .with_order(trade.order_id)
                .with_trade(trade.trade_id),
            );
            self.events.record(
                EngineEvent::new(
                    EventKind::PositionUpdated,
                    format!("{} now {}", trade.symbol, position.quantity.0),
                )
                .with_trade(trade.trade_id),
            );
        }

        trade
    }

    // ============================================================================================
    // Position queries
    // ============================================================================================

    pub fn position(&self, strategy: StrategyId, symbol: &Symbol) -> Option<&Position> {
        self.positions.get(&(strategy, symbol.clone()))
    }

    /// The strategy's signed quantity in a symbol (zero when no position).
    pub fn current_qty(&self, strategy: StrategyId, symbol: &Symbol) -> Qty {
        self.position(strategy, symbol)
            .map_or(Qty(0.0), |p| p.quantity)
    }

    pub fn positions_for(&self, strategy: StrategyId) -> impl Iterator<Item = &Position> {
        self.positions
            .iter()
            .filter(move |((owner, _), _)| *owner == strategy)
            .map(|(_, position)| position)
    }

    pub fn open_positions_for(&self, strategy: StrategyId) -> impl Iterator<Item = &Position> {
        self.positions_for(strategy).filter(|p| !p.is_closed())
    }

    /// Cumulative realized P&L across all of the strategy's positions.
    pub fn realized_pnl(&self, strategy: StrategyId) -> f64 {
        self.positions_for(strategy).map(|p| p.realized_pnl).sum()
    }

    /// Market value of the strategy's open positions.
    ///
    /// Valued at the supplied quotes, falling back to each position's average
    /// entry price when a quote is missing.
    pub fn open_position_value(&self, strategy: StrategyId, quotes: Option<&dyn QuoteSource>) -> Cash {
        self.open_positions_for(strategy)
            .map(|p| {
                let price = quotes
                    .and_then(|q| q.quote(&p.symbol))
                    .unwrap_or(p.avg_entry_price);
                p.market_value(price)
            })
            .sum()
    }

    /// Free cash of a strategy: `capital − Σ open |q| × price`.
    ///
    /// Without quotes this values positions at entry, which is the
    /// conservative estimate the sufficiency check uses.
    pub fn free_cash(
        &self,
        strategy: StrategyId,
        capital: Cash,
        quotes: Option<&dyn QuoteSource>,
    ) -> Cash {
        capital - self.open_position_value(strategy, quotes)
    }
}
