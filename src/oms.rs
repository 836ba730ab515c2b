use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    domain::{Cash, OrderId, Price, Qty, StrategyId, Symbol},
    error::{DeskResult, OrderError},
    events::{EngineEvent, EventKind, EventSink, NoopSink},
    ledger::{Ledger, RejectionRecord},
    rules::AggregatedRules,
    trade::{OrderKind, Trade, TradeAction, TradeDirection},
};

// ================================================================================================
// Order & Instruction
// ================================================================================================

/// Lifecycle of a client order inside the OMS.
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
pub enum OrderStatus {
    Pending,
    Validated,
    Submitted,
    Filled,
    Rejected,
}

/// A caller's order parameters: simple intent plus execution details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: Symbol,
    pub action: TradeAction,
    /// Desired quantity, strictly positive.
    pub quantity: Qty,
    pub order_kind: OrderKind,
    pub price: Price,
    pub stop_price: Option<Price>,
    /// Back-date for simulation replays; overrides execution timestamps.
    pub trade_date: Option<DateTime<Utc>>,
}

impl OrderRequest {
    pub fn market(symbol: impl Into<Symbol>, action: TradeAction, quantity: f64, price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            action,
            quantity: Qty(quantity),
            order_kind: OrderKind::Market,
            price: Price(price),
            stop_price: None,
            trade_date: None,
        }
    }

    pub fn backdated(mut self, trade_date: DateTime<Utc>) -> Self {
        self.trade_date = Some(trade_date);
        self
    }
}

/// A user's order intent, with the signed instructions the OMS derived for it.
#[derive(Debug, Clone)]
pub struct Order {
    pub order_id: OrderId,
    pub strategy: StrategyId,
    pub symbol: Symbol,
    pub action: TradeAction,
    pub quantity: Qty,
    pub order_kind: OrderKind,
    pub price: Price,
    pub stop_price: Option<Price>,
    pub trade_date: Option<DateTime<Utc>>,
    pub status: OrderStatus,
    pub instructions: Vec<TradeInstruction>,
    pub created_at: DateTime<Utc>,
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Order({}, {}, {}, Status: {})",
            self.symbol, self.action, self.quantity.0, self.status
        )
    }
}

/// Internal signed execution command from the OMS to the TMS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeInstruction {
    pub strategy: StrategyId,
    pub order_id: OrderId,
    pub symbol: Symbol,
    pub direction: TradeDirection,
    /// Strictly positive; the sign lives in `direction`.
    pub quantity: Qty,
    pub order_kind: OrderKind,
    pub price: Price,
    pub stop_price: Option<Price>,
    /// Human-readable derivation reason, carried into logs and events.
    pub reason: String,
    pub trade_date: Option<DateTime<Utc>>,
}

impl fmt::Display for TradeInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TradeInstruction({}, {} {}, {})",
            self.direction, self.quantity.0, self.symbol, self.reason
        )
    }
}

/// Everything the OMS needs to know about the world to process one order.
///
/// Assembled fresh per order by the desk: late policy mutations and earlier
/// fills are always visible to the next order.
#[derive(Debug, Clone)]
pub struct OrderContext {
    /// The meet of every policy above the strategy.
    pub rules: AggregatedRules,
    /// The strategy's current signed quantity in the order's symbol.
    pub current_qty: Qty,
    /// Capital of the portfolio directly above the strategy; `None` for a
    /// standalone strategy (size checks 4–5 are skipped).
    pub portfolio_capital: Option<Cash>,
    /// The strategy's free cash, valued conservatively at entry prices.
    pub free_cash: Cash,
}

// ================================================================================================
// Order Management System
// ================================================================================================

/// Order management core: rule aggregation input, intent→instruction
/// derivation, instruction validation and the cash sufficiency check.
///
/// One instance exists per connected hierarchy subtree.
#[derive(Debug)]
pub struct Oms {
    next_order_id: u64,
    events: Box<dyn EventSink + Send>,
}

impl Default for Oms {
    fn default() -> Self {
        Self::new()
    }
}

impl Oms {
    pub fn new() -> Self {
        Self {
            next_order_id: 1,
            events: Box::new(NoopSink),
        }
    }

    /// Installs an event sink for the internal audit trail.
    pub fn set_event_sink(&mut self, sink: Box<dyn EventSink + Send>) {
        self.events = sink;
    }

    pub fn events(&self) -> &dyn EventSink {
        self.events.as_ref()
    }

    /// Creates and validates an order.
    ///
    /// On any rule violation the rejection is recorded on the strategy's
    /// ledger before the error is returned; bad arguments and insufficient
    /// funds leave no ledger trace.
    #[tracing::instrument(skip(self, ctx, strategy_ledger), fields(symbol = %request.symbol, action = %request.action, qty = request.quantity.0))]
    pub fn create_order(
        &mut self,
        strategy: StrategyId,
        request: OrderRequest,
        ctx: &OrderContext,
        strategy_ledger: &mut Ledger,
    ) -> DeskResult<Order> {
        if request.quantity.0 <= 0.0 {
            return Err(OrderError::InvalidQuantity(request.quantity.0).into());
        }
        if request.price.0 <= 0.0 {
            return Err(OrderError::InvalidPrice(request.price.0).into());
        }

        let order_id = OrderId(self.next_order_id);
        self.next_order_id += 1;

        let mut order = Order {
            order_id,
            strategy,
            symbol: request.symbol.clone(),
            action: request.action,
            quantity: request.quantity,
            order_kind: request.order_kind,
            price: request.price,
            stop_price: request.stop_price,
            trade_date: request.trade_date,
            status: OrderStatus::Pending,
            instructions: Vec::new(),
            created_at: Utc::now(),
        };

        if self.events.enabled() {
            self.events.record(
                EngineEvent::new(
                    EventKind::OrderCreated,
                    format!("{} {} {}", order.action, order.quantity.0, order.symbol),
                )
                .with_order(order_id),
            );
        }

        let instructions = match self.derive_instructions(&order, ctx) {
            Ok(instructions) => instructions,
            Err(err) => {
                self.reject(&order, &err, strategy_ledger);
                return Err(err.into());
            }
        };

        if self.events.enabled() {
            self.events.record(
                EngineEvent::new(
                    EventKind::InstructionsDerived,
                    format!("{} instruction(s)", instructions.len()),
                )
                .with_order(order_id),
            );
        }

        // Validate each instruction in emission order, tracking the running
        // signed quantity so the second leg of a split is checked against the
        // position the first leg leaves behind.
        let mut running_qty = ctx.current_qty;
        for instruction in &instructions {
            if let Err(err) = self.validate_instruction(instruction, ctx, running_qty) {
                self.reject(&order, &err, strategy_ledger);
                return Err(err.into());
            }
            running_qty += instruction.direction.signed(instruction.quantity);
        }

        self.check_sufficient_funds(&instructions, ctx.free_cash)?;

        order.instructions = instructions;
        order.status = OrderStatus::Validated;
        Ok(order)
    }

    /// Marks a validated order as handed to the TMS.
    pub fn mark_submitted(&mut self, order: &mut Order) {
        order.status = OrderStatus::Submitted;
        if self.events.enabled() {
            self.events.record(
                EngineEvent::new(
                    EventKind::OrderSubmitted,
                    format!("{} instruction(s)", order.instructions.len()),
                )
                .with_order(order.order_id),
            );
        }
    }

    /// Marks an order filled once every instruction executed.
    pub fn mark_filled(&mut self, order: &mut Order, trades: &[Arc<Trade>]) {
        order.status = OrderStatus::Filled;
        if self.events.enabled() {
            self.events.record(
                EngineEvent::new(EventKind::OrderFilled, format!("{} fill(s)", trades.len()))
                    .with_order(order.order_id),
            );
        }
        tracing::debug!(order_id = %order.order_id, fills = trades.len(), "order filled");
    }

    // ============================================================================================
    // Derivation
    // ============================================================================================

    /// Translates the simple BUY/SELL intent into one or two signed
    /// instructions, given the strategy's current signed quantity.
    fn derive_instructions(
        &self,
        order: &Order,
        ctx: &OrderContext,
    ) -> Result<Vec<TradeInstruction>, OrderError> {
        let quantity = order.quantity;
        let current = ctx.current_qty;
        let mut instructions = Vec::with_capacity(2);

        let mut emit = |direction: TradeDirection, qty: Qty, reason: String| {
            instructions.push(TradeInstruction {
                strategy: order.strategy,
                order_id: order.order_id,
                symbol: order.symbol.clone(),
                direction,
                quantity: qty,
                order_kind: order.order_kind,
                price: order.price,
                stop_price: order.stop_price,
                reason,
                trade_date: order.trade_date,
            });
        };

        match order.action {
            TradeAction::Buy => {
                if current.0 >= 0.0 {
                    emit(
                        TradeDirection::Buy,
                        quantity,
                        "opening/adding to long position".to_string(),
                    );
                } else {
                    let short_qty = current.abs();
                    if quantity.0 <= short_qty.0 {
                        emit(
                            TradeDirection::BuyToCover,
                            quantity,
                            format!("covering {} of {} short", quantity.0, short_qty.0),
                        );
                    } else {
                        emit(
                            TradeDirection::BuyToCover,
                            short_qty,
                            "closing short position".to_string(),
                        );
                        emit(
                            TradeDirection::Buy,
                            quantity - short_qty,
                            "opening long position".to_string(),
                        );
                    }
                }
            }
            TradeAction::Sell => {
                if current.0 > 0.0 {
                    if quantity.0 <= current.0 {
                        emit(
                            TradeDirection::Sell,
                            quantity,
                            format!("closing {} of {} long", quantity.0, current.0),
                        );
                    } else {
                        emit(
                            TradeDirection::Sell,
                            current,
                            "closing long position".to_string(),
                        );
                        // The opening short leg needs short permission before
                        // it is emitted at all.
                        ctx.rules.require_short_selling(&format!(
                            "cannot sell {} more than held",
                            quantity.0 - current.0
                        ))?;
                        emit(
                            TradeDirection::SellShort,
                            quantity - current,
                            "opening short position".to_string(),
                        );
                    }
                } else if current.0 < 0.0 {
                    emit(
                        TradeDirection::SellShort,
                        quantity,
                        "adding to short position".to_string(),
                    );
                } else {
                    ctx.rules
                        .require_short_selling(&format!("cannot sell {}: no position", quantity.0))?;
                    emit(
                        TradeDirection::SellShort,
                        quantity,
                        "opening short position".to_string(),
                    );
                }
            }
        }

        Ok(instructions)
    }

    // ============================================================================================
    // Validation
    // ============================================================================================

    /// Checks one instruction against the aggregated rule set, in order:
    /// direction, order kind, symbol restrictions, single-trade size and
    /// resulting position size. Size checks are skipped for standalone
    /// strategies (no owning portfolio).
    fn validate_instruction(
        &self,
        instruction: &TradeInstruction,
        ctx: &OrderContext,
        current_qty: Qty,
    ) -> Result<(), OrderError> {
        ctx.rules.check_instruction(
            instruction.direction,
            instruction.order_kind,
            &instruction.symbol,
        )?;

        let Some(portfolio_capital) = ctx.portfolio_capital else {
            return Ok(());
        };

        ctx.rules
            .check_trade_size(instruction.quantity, instruction.price, portfolio_capital)?;

        let resulting_qty = current_qty + instruction.direction.signed(instruction.quantity);
        ctx.rules
            .check_position_size(resulting_qty, instruction.price, portfolio_capital)?;

        Ok(())
    }

    /// Buy-side instructions consume cash; sells and shorts do not at this
    /// check (margin and borrow cost are out of scope).
    fn check_sufficient_funds(
        &self,
        instructions: &[TradeInstruction],
        free_cash: Cash,
    ) -> Result<(), OrderError> {
        let required: Cash = instructions
            .iter()
            .filter(|i| i.direction.adds_quantity())
            .map(|i| i.quantity.notional_at(i.price))
            .sum();

        if required.0 > free_cash.0 {
            return Err(OrderError::InsufficientFunds {
                required: required.0,
                available: free_cash.0,
            });
        }
        Ok(())
    }

    fn reject(&mut self, order: &Order, err: &OrderError, strategy_ledger: &mut Ledger) {
        tracing::warn!(
            order_id = %order.order_id,
            symbol = %order.symbol,
            error = %err,
            "order rejected"
        );
        if self.events.enabled() {
            self.events.record(
                EngineEvent::new(EventKind::OrderRejected, err.to_string())
                    .with_order(order.order_id),
            );
        }
        strategy_ledger.record_rejection(RejectionRecord {
            order_id: order.order_id,
            symbol: order.symbol.clone(),
            action: order.action,
            quantity: order.quantity,
            reason: err.to_string(),
            at: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::OwnerKind,
        error::DeskError,
        events::RecordingSink,
        rules::{RuleKind, TradeRules},
    };

    // ============================================================================
    // Test Helpers
    // ============================================================================

    fn ctx(current_qty: f64) -> OrderContext {
        OrderContext {
            rules: AggregatedRules::default(),
            current_qty: Qty(current_qty),
            portfolio_capital: None,
            free_cash: Cash(1_000_000.0),
        }
    }

    fn ledger() -> Ledger {
        Ledger::new("Test Strategy", OwnerKind::Strategy)
    }

    fn buy(qty: f64, price: f64) -> OrderRequest {
        OrderRequest::market("AAPL", TradeAction::Buy, qty, price)
    }

    fn sell(qty: f64, price: f64) -> OrderRequest {
        OrderRequest::market("AAPL", TradeAction::Sell, qty, price)
    }

    fn directions(order: &Order) -> Vec<(TradeDirection, f64)> {
        order
            .instructions
            .iter()
            .map(|i| (i.direction, i.quantity.0))
            .collect()
    }

    // ============================================================================
    // Intent → instruction table
    // ============================================================================

    #[test]
    fn buy_flat_emits_single_buy() {
        let mut oms = Oms::new();
        let order = oms
            .create_order(StrategyId(0), buy(100.0, 50.0), &ctx(0.0), &mut ledger())
            .unwrap();
        assert_eq!(directions(&order), vec![(TradeDirection::Buy, 100.0)]);
        assert_eq!(order.status, OrderStatus::Validated);
    }

    #[test]
    fn buy_long_adds_to_long() {
        let mut oms = Oms::new();
        let order = oms
            .create_order(StrategyId(0), buy(50.0, 50.0), &ctx(30.0), &mut ledger())
            .unwrap();
        assert_eq!(directions(&order), vec![(TradeDirection::Buy, 50.0)]);
    }

    #[test]
    fn buy_covering_part_of_short() {
        let mut oms = Oms::new();
        let order = oms
            .create_order(StrategyId(0), buy(3.0, 50.0), &ctx(-10.0), &mut ledger())
            .unwrap();
        assert_eq!(directions(&order), vec![(TradeDirection::BuyToCover, 3.0)]);
    }

    #[test]
    fn buy_through_short_splits_cover_then_buy() {
        let mut oms = Oms::new();
        let order = oms
            .create_order(StrategyId(0), buy(10.0, 90.0), &ctx(-4.0), &mut ledger())
            .unwrap();
        assert_eq!(
            directions(&order),
            vec![(TradeDirection::BuyToCover, 4.0), (TradeDirection::Buy, 6.0)]
        );
    }

    #[test]
    fn sell_part_of_long() {
        let mut oms = Oms::new();
        let order = oms
            .create_order(StrategyId(0), sell(4.0, 110.0), &ctx(10.0), &mut ledger())
            .unwrap();
        assert_eq!(directions(&order), vec![(TradeDirection::Sell, 4.0)]);
    }

    #[test]
    fn sell_through_long_splits_sell_then_short() {
        let mut oms = Oms::new();
        let order = oms
            .create_order(StrategyId(0), sell(8.0, 120.0), &ctx(5.0), &mut ledger())
            .unwrap();
        assert_eq!(
            directions(&order),
            vec![(TradeDirection::Sell, 5.0), (TradeDirection::SellShort, 3.0)]
        );
    }

    #[test]
    fn sell_while_short_adds_to_short() {
        let mut oms = Oms::new();
        let order = oms
            .create_order(StrategyId(0), sell(5.0, 100.0), &ctx(-2.0), &mut ledger())
            .unwrap();
        assert_eq!(directions(&order), vec![(TradeDirection::SellShort, 5.0)]);
    }

    #[test]
    fn sell_flat_opens_short() {
        let mut oms = Oms::new();
        let order = oms
            .create_order(StrategyId(0), sell(5.0, 100.0), &ctx(0.0), &mut ledger())
            .unwrap();
        assert_eq!(directions(&order), vec![(TradeDirection::SellShort, 5.0)]);
    }

    #[test]
    fn intent_quantity_is_conserved_across_splits() {
        let mut oms = Oms::new();
        for (request, current) in [
            (buy(10.0, 90.0), -4.0),
            (sell(8.0, 120.0), 5.0),
            (buy(7.0, 90.0), 3.0),
            (sell(2.0, 120.0), -1.0),
        ] {
            let qty = request.quantity.0;
            let order = oms
                .create_order(StrategyId(0), request, &ctx(current), &mut ledger())
                .unwrap();
            let emitted: f64 = order.instructions.iter().map(|i| i.quantity.0).sum();
            assert_eq!(emitted, qty, "signed legs must sum to the intent");
        }
    }

    // ============================================================================
    // Rejections
    // ============================================================================

    #[test]
    fn short_without_permission_is_rejected_before_emission() {
        let mut oms = Oms::new();
        let mut no_shorts = ctx(0.0);
        let mut level = TradeRules::new("No Shorts");
        level.allow_short_selling = false;
        no_shorts.rules.apply(&level);

        let mut strategy_ledger = ledger();
        let err = oms
            .create_order(StrategyId(0), sell(5.0, 100.0), &no_shorts, &mut strategy_ledger)
            .unwrap_err();
        assert!(matches!(
            err,
            DeskError::Order(OrderError::RuleViolation {
                rule: RuleKind::ShortSelling,
                ..
            })
        ));
        assert_eq!(strategy_ledger.rejections().len(), 1);
        assert!(strategy_ledger.is_empty(), "no trade reaches the ledger");
    }

    #[test]
    fn split_sell_requires_short_permission_for_second_leg() {
        let mut oms = Oms::new();
        let mut no_shorts = ctx(5.0);
        let mut level = TradeRules::new("No Shorts");
        level.allow_short_selling = false;
        no_shorts.rules.apply(&level);

        // Selling within the long is fine...
        assert!(
            oms.create_order(StrategyId(0), sell(5.0, 120.0), &no_shorts, &mut ledger())
                .is_ok()
        );
        // ...selling through it is not.
        let err = oms
            .create_order(StrategyId(0), sell(8.0, 120.0), &no_shorts, &mut ledger())
            .unwrap_err();
        assert!(matches!(
            err,
            DeskError::Order(OrderError::RuleViolation { .. })
        ));
    }

    #[test]
    fn single_trade_limit_rejection_records_reason() {
        let mut oms = Oms::new();
        let mut restricted = ctx(0.0);
        let mut level = TradeRules::new("Tight");
        level.max_single_trade_pct = 5.0;
        restricted.rules.apply(&level);
        restricted.portfolio_capital = Some(Cash(1_000_000.0));

        let mut strategy_ledger = ledger();
        // 400 * 200 = 80_000 = 8% of 1M > 5%
        let err = oms
            .create_order(
                StrategyId(0),
                OrderRequest::market("TSLA", TradeAction::Buy, 400.0, 200.0),
                &restricted,
                &mut strategy_ledger,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            DeskError::Order(OrderError::RuleViolation {
                rule: RuleKind::SingleTradeLimit,
                ..
            })
        ));
        let rejection = &strategy_ledger.rejections()[0];
        assert!(rejection.reason.contains("8.0%"), "got: {}", rejection.reason);
    }

    #[test]
    fn size_checks_skipped_for_standalone_strategy() {
        let mut oms = Oms::new();
        let mut tight = ctx(0.0);
        let mut level = TradeRules::new("Tight");
        level.max_single_trade_pct = 0.001;
        tight.rules.apply(&level);
        // portfolio_capital stays None: standalone.

        assert!(
            oms.create_order(StrategyId(0), buy(10_000.0, 100.0), &tight, &mut ledger())
                .is_ok()
        );
    }

    #[test]
    fn position_limit_checks_running_quantity_across_split_legs() {
        let mut oms = Oms::new();
        let mut restricted = ctx(-4.0);
        let mut level = TradeRules::new("Tight");
        level.max_position_size_pct = 10.0;
        restricted.rules.apply(&level);
        restricted.portfolio_capital = Some(Cash(10_000.0));

        // Cover 4 then buy 6 at $90: the second leg leaves +6 → 540/10_000 = 5.4% (ok)
        assert!(
            oms.create_order(StrategyId(0), buy(10.0, 90.0), &restricted, &mut ledger())
                .is_ok()
        );

        // Cover 4 then buy 16 at $90: resulting +12 → 1080/10_000 = 10.8% (rejected)
        let err = oms
            .create_order(StrategyId(0), buy(20.0, 90.0), &restricted, &mut ledger())
            .unwrap_err();
        assert!(matches!(
            err,
            DeskError::Order(OrderError::RuleViolation {
                rule: RuleKind::PositionLimit,
                ..
            })
        ));
    }

    // ============================================================================
    // Cash sufficiency
    // ============================================================================

    #[test]
    fn buy_side_cost_exceeding_cash_fails() {
        let mut oms = Oms::new();
        let mut poor = ctx(0.0);
        poor.free_cash = Cash(10_000.0);

        let err = oms
            .create_order(StrategyId(0), buy(100.0, 150.0), &poor, &mut ledger())
            .unwrap_err();
        match err {
            DeskError::Order(OrderError::InsufficientFunds { required, available }) => {
                assert_eq!(required, 15_000.0);
                assert_eq!(available, 10_000.0);
            }
            other => panic!("expected InsufficientFunds, got {other:?}"),
        }
    }

    #[test]
    fn sells_do_not_consume_cash() {
        let mut oms = Oms::new();
        let mut poor = ctx(10.0);
        poor.free_cash = Cash(0.0);

        assert!(
            oms.create_order(StrategyId(0), sell(10.0, 150.0), &poor, &mut ledger())
                .is_ok()
        );
    }

    // ============================================================================
    // Bad arguments
    // ============================================================================

    #[test]
    fn non_positive_quantity_or_price_is_a_bad_argument() {
        let mut oms = Oms::new();
        let mut strategy_ledger = ledger();

        let err = oms
            .create_order(StrategyId(0), buy(0.0, 100.0), &ctx(0.0), &mut strategy_ledger)
            .unwrap_err();
        assert!(matches!(
            err,
            DeskError::Order(OrderError::InvalidQuantity(_))
        ));

        let err = oms
            .create_order(StrategyId(0), buy(10.0, -5.0), &ctx(0.0), &mut strategy_ledger)
            .unwrap_err();
        assert!(matches!(err, DeskError::Order(OrderError::InvalidPrice(_))));

        assert!(
            strategy_ledger.rejections().is_empty(),
            "bad arguments leave no ledger trace"
        );
    }

    // ============================================================================
    // Event log
    // ============================================================================

    #[test]
    fn order_lifecycle_transitions_with_sink_installed() {
        let mut oms = Oms::new();
        oms.set_event_sink(Box::new(RecordingSink::new()));

        let mut order = oms
            .create_order(StrategyId(0), buy(10.0, 100.0), &ctx(0.0), &mut ledger())
            .unwrap();
        oms.mark_submitted(&mut order);
        oms.mark_filled(&mut order, &[]);

        assert_eq!(order.status, OrderStatus::Filled);
    }

    #[test]
    fn order_ids_are_unique_and_increasing() {
        let mut oms = Oms::new();
        let a = oms
            .create_order(StrategyId(0), buy(1.0, 1.0), &ctx(0.0), &mut ledger())
            .unwrap();
        let b = oms
            .create_order(StrategyId(0), buy(1.0, 1.0), &ctx(0.0), &mut ledger())
            .unwrap();
        assert!(b.order_id > a.order_id);
    }
}
