use crate::{
    domain::{AccountId, Cash, FundId, OwnerKey, PortfolioId, StrategyId, SystemId},
    ledger::Ledger,
    oms::Oms,
    rules::TradeRules,
    sorted_vec_map::SortedVecMap,
    tms::Tms,
};

/// One OMS/TMS pair.
///
/// Created at the highest level of a connected subtree; every descendant node
/// stores the pair's [`SystemId`] instead of a parent pointer, so there is no
/// nullable-parent walk on the order path and no ownership cycle.
#[derive(Debug, Default)]
pub struct TradingSystem {
    pub oms: Oms,
    pub tms: Tms,
}

/// Top level: a trade account aggregating independently raised funds.
///
/// An account holds no capital of its own (its capital is the sum of its
/// funds'), so registering a fund is never constrained by account cash.
#[derive(Debug)]
pub struct AccountNode {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) rules: TradeRules,
    pub(crate) ledger: Ledger,
    pub(crate) funds: SortedVecMap<OwnerKey, FundId>,
    pub(crate) system: SystemId,
}

/// Capital raised independently, optionally registered to an account.
#[derive(Debug)]
pub struct FundNode {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) capital: Cash,
    pub(crate) rules: TradeRules,
    pub(crate) ledger: Ledger,
    pub(crate) account: Option<AccountId>,
    pub(crate) portfolios: SortedVecMap<OwnerKey, PortfolioId>,
    pub(crate) system: SystemId,
}

/// Allocation of fund capital to a specific investment portfolio.
#[derive(Debug)]
pub struct PortfolioNode {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) capital: Cash,
    pub(crate) rules: TradeRules,
    pub(crate) ledger: Ledger,
    pub(crate) fund: Option<FundId>,
    pub(crate) strategies: SortedVecMap<OwnerKey, StrategyId>,
    pub(crate) system: SystemId,
}

/// Leaf level: a trading strategy with allocated capital.
///
/// Strategies own no rules (compliance is aggregated from the levels above)
/// and their capital is never debited on execution; free cash derives from
/// the position table.
#[derive(Debug)]
pub struct StrategyNode {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) capital: Cash,
    pub(crate) ledger: Ledger,
    pub(crate) portfolio: Option<PortfolioId>,
    pub(crate) system: SystemId,
}

macro_rules! impl_node_accessors {
    ($node:ident) => {
        impl $node {
            pub fn id(&self) -> &str {
                &self.id
            }

            pub fn name(&self) -> &str {
                &self.name
            }

            /// The composite `"id:name"` key this node is registered under.
            pub fn key(&self) -> OwnerKey {
                OwnerKey::new(&self.id, &self.name)
            }

            pub fn ledger(&self) -> &Ledger {
                &self.ledger
            }

            pub fn system(&self) -> SystemId {
                self.system
            }
        }
    };
}

impl_node_accessors!(AccountNode);
impl_node_accessors!(FundNode);
impl_node_accessors!(PortfolioNode);
impl_node_accessors!(StrategyNode);

impl AccountNode {
    pub fn rules(&self) -> &TradeRules {
        &self.rules
    }

    /// Child funds in key order.
    pub fn funds(&self) -> impl Iterator<Item = (&OwnerKey, FundId)> {
        self.funds.iter().map(|(k, v)| (k, *v))
    }
}

impl FundNode {
    pub fn rules(&self) -> &TradeRules {
        &self.rules
    }

    pub fn capital(&self) -> Cash {
        self.capital
    }

    pub fn account(&self) -> Option<AccountId> {
        self.account
    }

    /// Child portfolios in key order.
    pub fn portfolios(&self) -> impl Iterator<Item = (&OwnerKey, PortfolioId)> {
        self.portfolios.iter().map(|(k, v)| (k, *v))
    }
}

impl PortfolioNode {
    pub fn rules(&self) -> &TradeRules {
        &self.rules
    }

    pub fn capital(&self) -> Cash {
        self.capital
    }

    pub fn fund(&self) -> Option<FundId> {
        self.fund
    }

    /// Child strategies in key order.
    pub fn strategies(&self) -> impl Iterator<Item = (&OwnerKey, StrategyId)> {
        self.strategies.iter().map(|(k, v)| (k, *v))
    }
}

impl StrategyNode {
    pub fn capital(&self) -> Cash {
        self.capital
    }

    pub fn portfolio(&self) -> Option<PortfolioId> {
        self.portfolio
    }
}

/// A hierarchy level referred to by handle; what the metrics, ledger and
/// snapshot entry points take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LevelId {
    Account(AccountId),
    Fund(FundId),
    Portfolio(PortfolioId),
    Strategy(StrategyId),
}

impl From<AccountId> for LevelId {
    fn from(id: AccountId) -> Self {
        LevelId::Account(id)
    }
}

impl From<FundId> for LevelId {
    fn from(id: FundId) -> Self {
        LevelId::Fund(id)
    }
}

impl From<PortfolioId> for LevelId {
    fn from(id: PortfolioId) -> Self {
        LevelId::Portfolio(id)
    }
}

impl From<StrategyId> for LevelId {
    fn from(id: StrategyId) -> Self {
        LevelId::Strategy(id)
    }
}

/// The ancestor chain of a strategy, resolved once per order.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Chain {
    pub portfolio: Option<PortfolioId>,
    pub fund: Option<FundId>,
    pub account: Option<AccountId>,
    pub system: SystemId,
}
