use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use strum::{Display, EnumIter, IntoStaticStr};
use strum_macros::EnumString;

use crate::{
    domain::{Cash, Price, Qty, Symbol},
    error::OrderError,
    trade::{OrderKind, TradeDirection},
};

/// Identifies which compliance rule an instruction failed.
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
#[strum(serialize_all = "snake_case")]
pub enum RuleKind {
    Direction,
    OrderKind,
    SymbolRestricted,
    SymbolNotAllowed,
    SingleTradeLimit,
    PositionLimit,
    ShortSelling,
}

fn all_order_kinds() -> BTreeSet<OrderKind> {
    [
        OrderKind::Market,
        OrderKind::Limit,
        OrderKind::StopLoss,
        OrderKind::StopLimit,
        OrderKind::TrailingStop,
    ]
    .into_iter()
    .collect()
}

fn all_directions() -> BTreeSet<TradeDirection> {
    [
        TradeDirection::Buy,
        TradeDirection::Sell,
        TradeDirection::SellShort,
        TradeDirection::BuyToCover,
    ]
    .into_iter()
    .collect()
}

// ================================================================================================
// Per-Level Policy
// ================================================================================================

/// Declarative compliance policy owned by one hierarchy level above strategy.
///
/// Strategies do not own rules; the order management core aggregates the
/// policies of every level above the executing strategy per order, so a
/// mutation here applies to all subsequent orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRules {
    pub name: String,

    pub allowed_order_kinds: BTreeSet<OrderKind>,
    pub allowed_directions: BTreeSet<TradeDirection>,

    pub allow_short_selling: bool,
    pub allow_margin: bool,
    pub allow_options: bool,
    pub allow_futures: bool,

    /// Maximum resulting position value, as a percentage of the owning
    /// portfolio's capital.
    pub max_position_size_pct: f64,
    /// Maximum single-trade value, as a percentage of the owning portfolio's
    /// capital.
    pub max_single_trade_pct: f64,

    /// `None` = all symbols permitted.
    pub allowed_symbols: Option<BTreeSet<Symbol>>,
    /// Blacklist; always checked.
    pub restricted_symbols: BTreeSet<Symbol>,
}

impl TradeRules {
    /// Permissive defaults, except options and futures are off.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            allowed_order_kinds: all_order_kinds(),
            allowed_directions: all_directions(),
            allow_short_selling: true,
            allow_margin: true,
            allow_options: false,
            allow_futures: false,
            max_position_size_pct: 100.0,
            max_single_trade_pct: 100.0,
            allowed_symbols: None,
            restricted_symbols: BTreeSet::new(),
        }
    }

    pub fn restrict_symbol(&mut self, symbol: impl Into<Symbol>) {
        self.restricted_symbols.insert(symbol.into());
    }

    pub fn allow_only_symbols<I, S>(&mut self, symbols: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<Symbol>,
    {
        self.allowed_symbols = Some(symbols.into_iter().map(Into::into).collect());
    }
}

impl Default for TradeRules {
    fn default() -> Self {
        Self::new("Default Rules")
    }
}

// ================================================================================================
// Aggregated Rule Set
// ================================================================================================

/// The meet of every policy above the executing strategy.
///
/// Built fresh per order (never memoized) by folding each visited level's
/// [`TradeRules`] into the most permissive defaults. Combinators: booleans
/// AND, percentage limits MIN, direction and order-kind sets INTERSECTION,
/// whitelist INTERSECTION across levels that declare one, blacklist UNION.
#[derive(Debug, Clone)]
pub struct AggregatedRules {
    pub allow_short_selling: bool,
    pub allow_margin: bool,
    pub allow_options: bool,
    pub allow_futures: bool,
    pub max_position_size_pct: f64,
    pub max_single_trade_pct: f64,
    pub allowed_symbols: Option<BTreeSet<Symbol>>,
    pub restricted_symbols: BTreeSet<Symbol>,
    pub allowed_order_kinds: BTreeSet<OrderKind>,
    pub allowed_directions: BTreeSet<TradeDirection>,
}

impl Default for AggregatedRules {
    fn default() -> Self {
        Self {
            allow_short_selling: true,
            allow_margin: true,
            allow_options: false,
            allow_futures: false,
            max_position_size_pct: 100.0,
            max_single_trade_pct: 100.0,
            allowed_symbols: None,
            restricted_symbols: BTreeSet::new(),
            allowed_order_kinds: all_order_kinds(),
            allowed_directions: all_directions(),
        }
    }
}

impl AggregatedRules {
    /// Folds one level's policy into the running aggregate, keeping the more
    /// restrictive value for every field.
    pub fn apply(&mut self, rules: &TradeRules) {
        self.allow_short_selling = self.allow_short_selling && rules.allow_short_selling;
        self.allow_margin = self.allow_margin && rules.allow_margin;
        self.allow_options = self.allow_options && rules.allow_options;
        self.allow_futures = self.allow_futures && rules.allow_futures;

        self.max_position_size_pct = self.max_position_size_pct.min(rules.max_position_size_pct);
        self.max_single_trade_pct = self.max_single_trade_pct.min(rules.max_single_trade_pct);

        self.allowed_order_kinds = self
            .allowed_order_kinds
            .intersection(&rules.allowed_order_kinds)
            .copied()
            .collect();
        self.allowed_directions = self
            .allowed_directions
            .intersection(&rules.allowed_directions)
            .copied()
            .collect();

        if let Some(level_whitelist) = &rules.allowed_symbols {
            self.allowed_symbols = Some(match &self.allowed_symbols {
                None => level_whitelist.clone(),
                Some(current) => current.intersection(level_whitelist).cloned().collect(),
            });
        }
        self.restricted_symbols
            .extend(rules.restricted_symbols.iter().cloned());
    }

    /// Checks 1–3: direction, order kind and symbol restrictions.
    pub fn check_instruction(
        &self,
        direction: TradeDirection,
        order_kind: OrderKind,
        symbol: &Symbol,
    ) -> Result<(), OrderError> {
        if !self.allowed_directions.contains(&direction) {
            return Err(OrderError::RuleViolation {
                rule: RuleKind::Direction,
                reason: format!("direction '{direction}' not allowed by rules"),
            });
        }

        if !self.allowed_order_kinds.contains(&order_kind) {
            return Err(OrderError::RuleViolation {
                rule: RuleKind::OrderKind,
                reason: format!("order type '{order_kind}' not allowed by rules"),
            });
        }

        if self.restricted_symbols.contains(symbol) {
            return Err(OrderError::RuleViolation {
                rule: RuleKind::SymbolRestricted,
                reason: format!("symbol '{symbol}' is restricted"),
            });
        }

        if let Some(whitelist) = &self.allowed_symbols
            && !whitelist.contains(symbol)
        {
            return Err(OrderError::RuleViolation {
                rule: RuleKind::SymbolNotAllowed,
                reason: format!("symbol '{symbol}' not in allowed list"),
            });
        }

        Ok(())
    }

    /// Check 4: single-trade value as a percentage of portfolio capital.
    pub fn check_trade_size(
        &self,
        quantity: Qty,
        price: Price,
        portfolio_capital: Cash,
    ) -> Result<(), OrderError> {
        if portfolio_capital.0 <= 0.0 {
            return Ok(());
        }
        let trade_pct = quantity.notional_at(price).0 / portfolio_capital.0 * 100.0;
        if trade_pct > self.max_single_trade_pct {
            return Err(OrderError::RuleViolation {
                rule: RuleKind::SingleTradeLimit,
                reason: format!(
                    "trade size {trade_pct:.1}% exceeds max single trade limit {}%",
                    self.max_single_trade_pct
                ),
            });
        }
        Ok(())
    }

    /// Check 5: resulting position value as a percentage of portfolio capital.
    pub fn check_position_size(
        &self,
        resulting_qty: Qty,
        price: Price,
        portfolio_capital: Cash,
    ) -> Result<(), OrderError> {
        if portfolio_capital.0 <= 0.0 {
            return Ok(());
        }
        let position_pct = resulting_qty.notional_at(price).0 / portfolio_capital.0 * 100.0;
        if position_pct > self.max_position_size_pct {
            return Err(OrderError::RuleViolation {
                rule: RuleKind::PositionLimit,
                reason: format!(
                    "resulting position size {position_pct:.1}% exceeds max position limit {}%",
                    self.max_position_size_pct
                ),
            });
        }
        Ok(())
    }

    /// Precheck used by the instruction derivation before emitting an
    /// opening short leg.
    pub fn require_short_selling(&self, context: &str) -> Result<(), OrderError> {
        if self.allow_short_selling {
            return Ok(());
        }
        Err(OrderError::RuleViolation {
            rule: RuleKind::ShortSelling,
            reason: format!("{context}: short selling disabled in rules"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(s: &str) -> Symbol {
        Symbol::from(s)
    }

    #[test]
    fn defaults_are_permissive_except_derivatives() {
        let rules = TradeRules::default();
        assert!(rules.allow_short_selling);
        assert!(rules.allow_margin);
        assert!(!rules.allow_options);
        assert!(!rules.allow_futures);
        assert_eq!(rules.max_position_size_pct, 100.0);
        assert_eq!(rules.allowed_order_kinds.len(), 5);
        assert_eq!(rules.allowed_directions.len(), 4);
        assert!(rules.allowed_symbols.is_none());
        assert!(rules.restricted_symbols.is_empty());
    }

    #[test]
    fn booleans_combine_with_and() {
        let mut agg = AggregatedRules::default();
        let mut level = TradeRules::new("Fund");
        level.allow_short_selling = false;
        agg.apply(&level);

        let permissive = TradeRules::new("Portfolio");
        agg.apply(&permissive);

        assert!(!agg.allow_short_selling, "a single denial must stick");
    }

    #[test]
    fn percentages_combine_with_min() {
        let mut agg = AggregatedRules::default();

        let mut fund = TradeRules::new("Fund");
        fund.max_single_trade_pct = 10.0;
        agg.apply(&fund);

        let mut portfolio = TradeRules::new("Portfolio");
        portfolio.max_single_trade_pct = 25.0;
        portfolio.max_position_size_pct = 40.0;
        agg.apply(&portfolio);

        assert_eq!(agg.max_single_trade_pct, 10.0);
        assert_eq!(agg.max_position_size_pct, 40.0);
    }

    #[test]
    fn direction_sets_intersect() {
        let mut agg = AggregatedRules::default();
        let mut level = TradeRules::new("Long Only");
        level.allowed_directions =
            [TradeDirection::Buy, TradeDirection::Sell].into_iter().collect();
        agg.apply(&level);

        assert!(agg.allowed_directions.contains(&TradeDirection::Buy));
        assert!(!agg.allowed_directions.contains(&TradeDirection::SellShort));

        let err = agg
            .check_instruction(TradeDirection::SellShort, OrderKind::Market, &sym("AAPL"))
            .unwrap_err();
        assert!(matches!(
            err,
            OrderError::RuleViolation {
                rule: RuleKind::Direction,
                ..
            }
        ));
    }

    #[test]
    fn whitelists_intersect_where_present() {
        let mut agg = AggregatedRules::default();

        let mut fund = TradeRules::new("Fund");
        fund.allow_only_symbols(["AAPL", "MSFT", "GOOGL"]);
        agg.apply(&fund);

        let mut portfolio = TradeRules::new("Portfolio");
        portfolio.allow_only_symbols(["MSFT", "GOOGL", "TSLA"]);
        agg.apply(&portfolio);

        let whitelist = agg.allowed_symbols.as_ref().unwrap();
        assert_eq!(whitelist.len(), 2);
        assert!(whitelist.contains(&sym("MSFT")));
        assert!(!whitelist.contains(&sym("AAPL")));
        assert!(!whitelist.contains(&sym("TSLA")));
    }

    #[test]
    fn whitelist_absent_at_every_level_stays_open() {
        let mut agg = AggregatedRules::default();
        agg.apply(&TradeRules::new("Fund"));
        agg.apply(&TradeRules::new("Portfolio"));
        assert!(agg.allowed_symbols.is_none());
        assert!(
            agg.check_instruction(TradeDirection::Buy, OrderKind::Market, &sym("ANY"))
                .is_ok()
        );
    }

    #[test]
    fn blacklists_union() {
        let mut agg = AggregatedRules::default();

        let mut fund = TradeRules::new("Fund");
        fund.restrict_symbol("GME");
        agg.apply(&fund);

        let mut portfolio = TradeRules::new("Portfolio");
        portfolio.restrict_symbol("AMC");
        agg.apply(&portfolio);

        for ticker in ["GME", "AMC"] {
            let err = agg
                .check_instruction(TradeDirection::Buy, OrderKind::Market, &sym(ticker))
                .unwrap_err();
            assert!(matches!(
                err,
                OrderError::RuleViolation {
                    rule: RuleKind::SymbolRestricted,
                    ..
                }
            ));
        }
    }

    #[test]
    fn trade_size_check_uses_portfolio_capital() {
        let mut agg = AggregatedRules::default();
        let mut level = TradeRules::new("Portfolio");
        level.max_single_trade_pct = 5.0;
        agg.apply(&level);

        // 400 * 200 = 80_000 on 1_000_000 capital = 8% > 5%
        let err = agg
            .check_trade_size(Qty(400.0), Price(200.0), Cash(1_000_000.0))
            .unwrap_err();
        assert!(matches!(
            err,
            OrderError::RuleViolation {
                rule: RuleKind::SingleTradeLimit,
                ..
            }
        ));

        // 200 * 200 = 40_000 = 4% <= 5%
        assert!(
            agg.check_trade_size(Qty(200.0), Price(200.0), Cash(1_000_000.0))
                .is_ok()
        );
    }

    #[test]
    fn position_size_check_uses_resulting_quantity() {
        let mut agg = AggregatedRules::default();
        let mut level = TradeRules::new("Portfolio");
        level.max_position_size_pct = 10.0;
        agg.apply(&level);

        // Resulting short position counts by absolute value.
        let err = agg
            .check_position_size(Qty(-600.0), Price(200.0), Cash(1_000_000.0))
            .unwrap_err();
        assert!(matches!(
            err,
            OrderError::RuleViolation {
                rule: RuleKind::PositionLimit,
                ..
            }
        ));

        assert!(
            agg.check_position_size(Qty(-400.0), Price(200.0), Cash(1_000_000.0))
                .is_ok()
        );
    }

    #[test]
    fn size_checks_skip_on_zero_capital() {
        let agg = AggregatedRules::default();
        assert!(agg.check_trade_size(Qty(1e9), Price(100.0), Cash(0.0)).is_ok());
        assert!(
            agg.check_position_size(Qty(1e9), Price(100.0), Cash(0.0))
                .is_ok()
        );
    }

    #[test]
    fn short_selling_precheck() {
        let mut agg = AggregatedRules::default();
        assert!(agg.require_short_selling("opening short").is_ok());

        let mut level = TradeRules::new("No Shorts");
        level.allow_short_selling = false;
        agg.apply(&level);

        let err = agg.require_short_selling("opening short").unwrap_err();
        assert!(matches!(
            err,
            OrderError::RuleViolation {
                rule: RuleKind::ShortSelling,
                ..
            }
        ));
    }
}
