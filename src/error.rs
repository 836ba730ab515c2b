use thiserror::Error;

use crate::{domain::OwnerKind, rules::RuleKind};

pub type DeskResult<T> = Result<T, DeskError>;

#[derive(Debug, Error)]
pub enum DeskError {
    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),

    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    Risk(#[from] RiskError),

    #[error(transparent)]
    System(#[from] SystemError),
}

/// Errors raised by the risk analysis module.
#[derive(Debug, Error)]
pub enum RiskError {
    #[error("confidence must be in (0, 1), got {0}")]
    BadConfidence(f64),

    #[error("at least two price rows are required, got {0}")]
    InsufficientHistory(usize),

    #[error("benchmark returns required for {0}")]
    MissingBenchmark(&'static str),

    #[error("benchmark length {benchmark} does not match {expected} return steps")]
    BenchmarkMisaligned { benchmark: usize, expected: usize },

    #[error("symbol '{0}' not present in the price history")]
    UnknownSymbol(String),
}

/// Errors raised while creating, validating or funding an order.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("quantity must be positive, got {0}")]
    InvalidQuantity(f64),

    #[error("price must be positive, got {0}")]
    InvalidPrice(f64),

    /// The aggregated rule set forbade an instruction.
    ///
    /// Carries the failing rule and a formatted reason so callers can report
    /// compliance outcomes without string matching.
    #[error("order rejected ({rule}): {reason}")]
    RuleViolation { rule: RuleKind, reason: String },

    #[error("insufficient funds: need ${required:.2}, have ${available:.2}")]
    InsufficientFunds { required: f64, available: f64 },
}

/// Errors related to hierarchy construction, capital allocation and lookup.
#[derive(Debug, Error)]
pub enum HierarchyError {
    #[error(
        "insufficient unallocated capital: requested ${requested:.2}, available ${available:.2}"
    )]
    AllocationExceeded { requested: f64, available: f64 },

    #[error("{kind} '{key}' not found")]
    NotFound { kind: OwnerKind, key: String },

    #[error("{kind} child key '{key}' already registered")]
    DuplicateChild { kind: OwnerKind, key: String },

    #[error("stale {kind} handle (index {index})")]
    StaleHandle { kind: OwnerKind, index: usize },

    #[error("{0} has no trade rules (rules live above strategy level)")]
    NoRules(OwnerKind),
}

/// Errors related to snapshot serialization and file export.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("IO operation failed")]
    Io(#[from] std::io::Error),

    #[error("serialization failed")]
    Json(#[from] serde_json::Error),
}

/// Errors related to internal invariants; these indicate a bug, not bad input.
#[derive(Debug, Error)]
pub enum SystemError {
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("index out of bounds: {0}")]
    IndexOutOfBounds(String),

    #[error("empty time series: {0}")]
    EmptySeries(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_error_messages_carry_amounts() {
        let err = OrderError::InsufficientFunds {
            required: 15_000.0,
            available: 10_000.0,
        };
        assert_eq!(
            err.to_string(),
            "insufficient funds: need $15000.00, have $10000.00"
        );
    }

    #[test]
    fn rule_violation_names_the_failing_rule() {
        let err = OrderError::RuleViolation {
            rule: RuleKind::ShortSelling,
            reason: "short selling disabled".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("short_selling"), "got: {msg}");
    }

    #[test]
    fn errors_convert_into_desk_error() {
        fn fails() -> DeskResult<()> {
            Err(HierarchyError::NotFound {
                kind: OwnerKind::Fund,
                key: "F1:Growth".to_string(),
            }
            .into())
        }
        assert!(matches!(fails(), Err(DeskError::Hierarchy(_))));
    }
}
