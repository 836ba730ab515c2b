use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::domain::{OrderId, TradeId};

/// What happened inside the order/trade management cores.
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
pub enum EventKind {
    OrderCreated,
    InstructionsDerived,
    OrderRejected,
    OrderSubmitted,
    OrderFilled,
    TradeExecuted,
    PositionUpdated,
    LedgerCascade,
}

/// One structured engine event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineEvent {
    pub at: DateTime<Utc>,
    pub kind: EventKind,
    pub order_id: Option<OrderId>,
    pub trade_id: Option<TradeId>,
    pub detail: String,
}

impl EngineEvent {
    pub fn new(kind: EventKind, detail: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            kind,
            order_id: None,
            trade_id: None,
            detail: detail.into(),
        }
    }

    pub fn with_order(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_trade(mut self, trade_id: TradeId) -> Self {
        self.trade_id = Some(trade_id);
        self
    }
}

/// Sink for the optional internal audit trail of the OMS/TMS.
///
/// This is a debugging aid, not the user-facing ledger. The default
/// [`NoopSink`] reports itself disabled so call sites skip event
/// construction entirely in production use.
pub trait EventSink: std::fmt::Debug {
    fn record(&mut self, event: EngineEvent);

    fn enabled(&self) -> bool {
        true
    }
}

/// Default sink: drops everything, costs nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn record(&mut self, _event: EngineEvent) {}

    fn enabled(&self) -> bool {
        false
    }
}

/// In-memory sink for debugging and tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Vec<EngineEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[EngineEvent] {
        &self.events
    }

    pub fn of_kind(&self, kind: EventKind) -> impl Iterator<Item = &EngineEvent> {
        self.events.iter().filter(move |e| e.kind == kind)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn record(&mut self, event: EngineEvent) {
        self.events.push(event);
    }
}
