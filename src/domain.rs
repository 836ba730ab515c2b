use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{impl_abs_primitive, impl_add_sub_primitive, impl_from_primitive, impl_neg_primitive};

// ================================================================================================
// Domain Strong Types (NewTypes)
// ================================================================================================

/// Represents a price level in the quote currency.
///
/// Used for: execution prices, limit prices, stop triggers, and quote lookups.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Price(pub f64);
impl_from_primitive!(Price, f64);
impl_add_sub_primitive!(Price, f64);
impl_neg_primitive!(Price, f64);
impl_abs_primitive!(Price, f64);

/// A signed quantity of the traded asset.
///
/// Positive values denote long exposure, negative values short exposure.
/// Order requests and instructions always carry strictly positive quantities;
/// the sign lives in the instruction's direction until a fill is applied to a
/// position.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Qty(pub f64);
impl_from_primitive!(Qty, f64);
impl_add_sub_primitive!(Qty, f64);
impl_neg_primitive!(Qty, f64);
impl_abs_primitive!(Qty, f64);

impl Qty {
    /// Notional value of this quantity at the given price, always non-negative.
    pub fn notional_at(self, price: Price) -> Cash {
        Cash(self.0.abs() * price.0)
    }

    pub fn is_long(self) -> bool {
        self.0 > 0.0
    }

    pub fn is_short(self) -> bool {
        self.0 < 0.0
    }

    pub fn is_flat(self) -> bool {
        self.0 == 0.0
    }
}

/// An amount of account currency (capital, cash, proceeds, commission).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Cash(pub f64);
impl_from_primitive!(Cash, f64);
impl_add_sub_primitive!(Cash, f64);
impl_neg_primitive!(Cash, f64);
impl_abs_primitive!(Cash, f64);

/// Identifier of an executed trade, allocated by the trade management core.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct TradeId(pub u64);
impl_from_primitive!(TradeId, u64);

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{:06}", self.0)
    }
}

/// Identifier of a client order, allocated by the order management core.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct OrderId(pub u64);
impl_from_primitive!(OrderId, u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "O{:06}", self.0)
    }
}

/// A ticker symbol.
///
/// Symbols are an open set here (any listing a caller trades), so this is a
/// string newtype rather than a closed enum.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(ticker: impl Into<String>) -> Self {
        Self(ticker.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(ticker: &str) -> Self {
        Self(ticker.to_string())
    }
}

impl From<String> for Symbol {
    fn from(ticker: String) -> Self {
        Self(ticker)
    }
}

// ================================================================================================
// Hierarchy Handles
// ================================================================================================

/// Index of a trade account inside the [`Desk`](crate::desk::Desk) registry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct AccountId(pub usize);

/// Index of a fund inside the desk registry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct FundId(pub usize);

/// Index of a portfolio inside the desk registry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct PortfolioId(pub usize);

/// Index of a strategy inside the desk registry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct StrategyId(pub usize);

/// Index of an OMS/TMS pair inside the desk registry.
///
/// Exactly one pair exists per connected hierarchy subtree; every node of the
/// subtree stores a copy of this handle instead of a parent reference.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct SystemId(pub usize);

/// The level a hierarchy entity lives at.
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
pub enum OwnerKind {
    Account,
    Fund,
    Portfolio,
    Strategy,
}

/// Composite child key, formatted as `"id:name"`.
///
/// Every container keeps its children in an ordered map keyed by this value;
/// renaming a child re-keys the entry atomically.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct OwnerKey(String);

impl OwnerKey {
    pub fn new(id: &str, name: &str) -> Self {
        Self(format!("{id}:{name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `id` part of the composite key.
    pub fn id(&self) -> &str {
        self.0.split_once(':').map_or(self.0.as_str(), |(id, _)| id)
    }
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
