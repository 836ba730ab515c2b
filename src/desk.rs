//! The process-local registry the capital hierarchy lives in.
//!
//! A [`Desk`] owns every hierarchy node and every OMS/TMS pair in arenas;
//! callers hold copyable typed handles ([`AccountId`](crate::domain::AccountId),
//! [`FundId`](crate::domain::FundId), ...) and drive everything through
//! `&mut Desk`. The single-mutable-reference entry point is what enforces the
//! engine's sequential contract: two orders can never interleave.

pub mod node;

use std::sync::Arc;

use crate::{
    domain::{AccountId, Cash, FundId, OwnerKey, OwnerKind, PortfolioId, StrategyId, Symbol, SystemId},
    error::{DeskError, DeskResult, HierarchyError},
    events::EventSink,
    ledger::{Ledger, LedgerSnapshot},
    metrics::PerformanceMetrics,
    oms::{Order, OrderContext, OrderRequest},
    position::Position,
    quotes::{PriceMap, QuoteSource},
    rules::{AggregatedRules, TradeRules},
    trade::{OrderKind, Trade, TradeDirection},
};

pub use node::{AccountNode, FundNode, LevelId, PortfolioNode, StrategyNode, TradingSystem};
use node::Chain;

fn stale(kind: OwnerKind, index: usize) -> DeskError {
    HierarchyError::StaleHandle { kind, index }.into()
}

/// The engine root: hierarchy arenas plus one [`TradingSystem`] per connected
/// subtree.
#[derive(Debug, Default)]
pub struct Desk {
    accounts: Vec<node::AccountNode>,
    funds: Vec<node::FundNode>,
    portfolios: Vec<node::PortfolioNode>,
    strategies: Vec<node::StrategyNode>,
    systems: Vec<TradingSystem>,
}

impl Desk {
    pub fn new() -> Self {
        Self::default()
    }

    fn new_system(&mut self) -> SystemId {
        self.systems.push(TradingSystem::default());
        SystemId(self.systems.len() - 1)
    }

    // ============================================================================================
    // Construction
    // ============================================================================================

    /// Creates a trade account. Accounts are always hierarchy roots, so this
    /// also creates the subtree's OMS/TMS pair.
    pub fn create_account(&mut self, id: impl Into<String>, name: impl Into<String>) -> AccountId {
        let (id, name) = (id.into(), name.into());
        let system = self.new_system();
        let node = node::AccountNode {
            rules: TradeRules::new(format!("{name} Account Rules")),
            ledger: Ledger::new(name.clone(), OwnerKind::Account),
            funds: Default::default(),
            system,
            id,
            name,
        };
        tracing::info!(account = %node.name, "created account (owns OMS/TMS)");
        self.accounts.push(node);
        AccountId(self.accounts.len() - 1)
    }

    /// Creates a fund, registered to an account or standalone.
    ///
    /// Fund capital is raised independently, so registration is not
    /// constrained by account cash.
    pub fn create_fund(
        &mut self,
        account: Option<AccountId>,
        id: impl Into<String>,
        name: impl Into<String>,
        capital: Cash,
    ) -> DeskResult<FundId> {
        let (id, name) = (id.into(), name.into());
        let key = OwnerKey::new(&id, &name);

        let system = match account {
            Some(parent) => {
                let parent_node = self.account(parent)?;
                if parent_node.funds.contains_key(&key) {
                    return Err(HierarchyError::DuplicateChild {
                        kind: OwnerKind::Fund,
                        key: key.to_string(),
                    }
                    .into());
                }
                parent_node.system
            }
            None => self.new_system(),
        };

        let node = node::FundNode {
            rules: TradeRules::new(format!("{name} Fund Rules")),
            ledger: Ledger::new(name.clone(), OwnerKind::Fund),
            portfolios: Default::default(),
            account,
            capital,
            system,
            id,
            name,
        };
        self.funds.push(node);
        let fund = FundId(self.funds.len() - 1);

        if let Some(parent) = account {
            self.accounts[parent.0].funds.insert(key, fund);
        }
        Ok(fund)
    }

    /// Creates a portfolio from fund capital (or standalone).
    ///
    /// Fails when the requested capital exceeds the fund's unallocated cash.
    pub fn create_portfolio(
        &mut self,
        fund: Option<FundId>,
        id: impl Into<String>,
        name: impl Into<String>,
        capital: Cash,
    ) -> DeskResult<PortfolioId> {
        let (id, name) = (id.into(), name.into());
        let key = OwnerKey::new(&id, &name);

        let system = match fund {
            Some(parent) => {
                let available = self.fund_cash(parent)?;
                if capital.0 > available.0 {
                    return Err(HierarchyError::AllocationExceeded {
                        requested: capital.0,
                        available: available.0,
                    }
                    .into());
                }
                let parent_node = self.fund(parent)?;
                if parent_node.portfolios.contains_key(&key) {
                    return Err(HierarchyError::DuplicateChild {
                        kind: OwnerKind::Portfolio,
                        key: key.to_string(),
                    }
                    .into());
                }
                parent_node.system
            }
            None => self.new_system(),
        };

        let node = node::PortfolioNode {
            rules: TradeRules::new(format!("{name} Portfolio Rules")),
            ledger: Ledger::new(name.clone(), OwnerKind::Portfolio),
            strategies: Default::default(),
            fund,
            capital,
            system,
            id,
            name,
        };
        self.portfolios.push(node);
        let portfolio = PortfolioId(self.portfolios.len() - 1);

        if let Some(parent) = fund {
            self.funds[parent.0].portfolios.insert(key, portfolio);
        }
        Ok(portfolio)
    }

    /// Creates a strategy, auto-registered with a portfolio or standalone.
    ///
    /// Registered strategies draw capital from the portfolio's unallocated
    /// cash; standalone strategies own a private OMS/TMS pair.
    pub fn create_strategy(
        &mut self,
        portfolio: Option<PortfolioId>,
        id: impl Into<String>,
        name: impl Into<String>,
        capital: Cash,
    ) -> DeskResult<StrategyId> {
        let (id, name) = (id.into(), name.into());
        let key = OwnerKey::new(&id, &name);

        let system = match portfolio {
            Some(parent) => {
                let available = self.portfolio_cash(parent)?;
                if capital.0 > available.0 {
                    return Err(HierarchyError::AllocationExceeded {
                        requested: capital.0,
                        available: available.0,
                    }
                    .into());
                }
                let parent_node = self.portfolio(parent)?;
                if parent_node.strategies.contains_key(&key) {
                    return Err(HierarchyError::DuplicateChild {
                        kind: OwnerKind::Strategy,
                        key: key.to_string(),
                    }
                    .into());
                }
                parent_node.system
            }
            None => self.new_system(),
        };

        let node = node::StrategyNode {
            ledger: Ledger::new(name.clone(), OwnerKind::Strategy),
            portfolio,
            capital,
            system,
            id,
            name,
        };
        self.strategies.push(node);
        let strategy = StrategyId(self.strategies.len() - 1);

        if let Some(parent) = portfolio {
            self.portfolios[parent.0].strategies.insert(key, strategy);
        }
        Ok(strategy)
    }

    // ============================================================================================
    // Node access
    // ============================================================================================

    pub fn account(&self, id: AccountId) -> DeskResult<&node::AccountNode> {
        self.accounts
            .get(id.0)
            .ok_or_else(|| stale(OwnerKind::Account, id.0))
    }

    pub fn fund(&self, id: FundId) -> DeskResult<&node::FundNode> {
        self.funds
            .get(id.0)
            .ok_or_else(|| stale(OwnerKind::Fund, id.0))
    }

    pub fn portfolio(&self, id: PortfolioId) -> DeskResult<&node::PortfolioNode> {
        self.portfolios
            .get(id.0)
            .ok_or_else(|| stale(OwnerKind::Portfolio, id.0))
    }

    pub fn strategy(&self, id: StrategyId) -> DeskResult<&node::StrategyNode> {
        self.strategies
            .get(id.0)
            .ok_or_else(|| stale(OwnerKind::Strategy, id.0))
    }

    /// Mutable policy access; rules live on every level above strategy and
    /// mutations apply to all subsequent orders.
    pub fn account_rules_mut(&mut self, id: AccountId) -> DeskResult<&mut TradeRules> {
        self.accounts
            .get_mut(id.0)
            .map(|n| &mut n.rules)
            .ok_or_else(|| stale(OwnerKind::Account, id.0))
    }

    pub fn fund_rules_mut(&mut self, id: FundId) -> DeskResult<&mut TradeRules> {
        self.funds
            .get_mut(id.0)
            .map(|n| &mut n.rules)
            .ok_or_else(|| stale(OwnerKind::Fund, id.0))
    }

    pub fn portfolio_rules_mut(&mut self, id: PortfolioId) -> DeskResult<&mut TradeRules> {
        self.portfolios
            .get_mut(id.0)
            .map(|n| &mut n.rules)
            .ok_or_else(|| stale(OwnerKind::Portfolio, id.0))
    }

    // ============================================================================================
    // Capital accounting
    // ============================================================================================

    /// Account capital: the sum of its funds' capital.
    pub fn account_capital(&self, id: AccountId) -> DeskResult<Cash> {
        let node = self.account(id)?;
        Ok(node.funds.values().map(|f| self.funds[f.0].capital).sum())
    }

    pub fn fund_capital(&self, id: FundId) -> DeskResult<Cash> {
        Ok(self.fund(id)?.capital)
    }

    /// Fund capital handed to portfolios.
    pub fn fund_allocated(&self, id: FundId) -> DeskResult<Cash> {
        let node = self.fund(id)?;
        Ok(node
            .portfolios
            .values()
            .map(|p| self.portfolios[p.0].capital)
            .sum())
    }

    /// Fund capital not yet allocated. Never negative: allocation is checked
    /// on every create/reallocate.
    pub fn fund_cash(&self, id: FundId) -> DeskResult<Cash> {
        Ok(self.fund_capital(id)? - self.fund_allocated(id)?)
    }

    pub fn portfolio_capital(&self, id: PortfolioId) -> DeskResult<Cash> {
        Ok(self.portfolio(id)?.capital)
    }

    pub fn portfolio_allocated(&self, id: PortfolioId) -> DeskResult<Cash> {
        let node = self.portfolio(id)?;
        Ok(node
            .strategies
            .values()
            .map(|s| self.strategies[s.0].capital)
            .sum())
    }

    pub fn portfolio_cash(&self, id: PortfolioId) -> DeskResult<Cash> {
        Ok(self.portfolio_capital(id)? - self.portfolio_allocated(id)?)
    }

    pub fn strategy_capital(&self, id: StrategyId) -> DeskResult<Cash> {
        Ok(self.strategy(id)?.capital)
    }

    /// Strategy free cash per the replay model: capital minus open exposure,
    /// valued at the supplied quotes (entry prices when absent).
    pub fn strategy_cash(
        &self,
        id: StrategyId,
        quotes: Option<&dyn QuoteSource>,
    ) -> DeskResult<Cash> {
        let node = self.strategy(id)?;
        Ok(self.systems[node.system.0]
            .tms
            .free_cash(id, node.capital, quotes))
    }

    // ============================================================================================
    // Lookup & maintenance
    // ============================================================================================

    pub fn find_fund(&self, account: AccountId, fund_id: &str) -> DeskResult<Option<FundId>> {
        let node = self.account(account)?;
        Ok(node
            .funds
            .values()
            .copied()
            .find(|f| self.funds[f.0].id == fund_id))
    }

    pub fn fund_by_key(&self, account: AccountId, key: &OwnerKey) -> DeskResult<Option<FundId>> {
        Ok(self.account(account)?.funds.get(key).copied())
    }

    pub fn find_portfolio(&self, fund: FundId, portfolio_id: &str) -> DeskResult<Option<PortfolioId>> {
        let node = self.fund(fund)?;
        Ok(node
            .portfolios
            .values()
            .copied()
            .find(|p| self.portfolios[p.0].id == portfolio_id))
    }

    pub fn portfolio_by_key(&self, fund: FundId, key: &OwnerKey) -> DeskResult<Option<PortfolioId>> {
        Ok(self.fund(fund)?.portfolios.get(key).copied())
    }

    pub fn find_strategy(
        &self,
        portfolio: PortfolioId,
        strategy_id: &str,
    ) -> DeskResult<Option<StrategyId>> {
        let node = self.portfolio(portfolio)?;
        Ok(node
            .strategies
            .values()
            .copied()
            .find(|s| self.strategies[s.0].id == strategy_id))
    }

    pub fn strategy_by_key(
        &self,
        portfolio: PortfolioId,
        key: &OwnerKey,
    ) -> DeskResult<Option<StrategyId>> {
        Ok(self.portfolio(portfolio)?.strategies.get(key).copied())
    }

    /// Renames a fund, atomically re-keying its entry in the parent map.
    pub fn rename_fund(&mut self, id: FundId, new_name: impl Into<String>) -> DeskResult<()> {
        let new_name = new_name.into();
        let node = self.fund(id)?;
        let (old_key, parent) = (node.key(), node.account);
        let new_key = OwnerKey::new(&node.id, &new_name);

        if let Some(parent) = parent
            && !self.accounts[parent.0].funds.rekey(&old_key, new_key)
        {
            return Err(HierarchyError::DuplicateChild {
                kind: OwnerKind::Fund,
                key: OwnerKey::new(&self.funds[id.0].id, &new_name).to_string(),
            }
            .into());
        }
        let node = &mut self.funds[id.0];
        node.name = new_name.clone();
        node.ledger.set_owner_name(new_name);
        Ok(())
    }

    pub fn rename_portfolio(&mut self, id: PortfolioId, new_name: impl Into<String>) -> DeskResult<()> {
        let new_name = new_name.into();
        let node = self.portfolio(id)?;
        let (old_key, parent) = (node.key(), node.fund);
        let new_key = OwnerKey::new(&node.id, &new_name);

        if let Some(parent) = parent
            && !self.funds[parent.0].portfolios.rekey(&old_key, new_key)
        {
            return Err(HierarchyError::DuplicateChild {
                kind: OwnerKind::Portfolio,
                key: OwnerKey::new(&self.portfolios[id.0].id, &new_name).to_string(),
            }
            .into());
        }
        let node = &mut self.portfolios[id.0];
        node.name = new_name.clone();
        node.ledger.set_owner_name(new_name);
        Ok(())
    }

    pub fn rename_strategy(&mut self, id: StrategyId, new_name: impl Into<String>) -> DeskResult<()> {
        let new_name = new_name.into();
        let node = self.strategy(id)?;
        let (old_key, parent) = (node.key(), node.portfolio);
        let new_key = OwnerKey::new(&node.id, &new_name);

        if let Some(parent) = parent
            && !self.portfolios[parent.0].strategies.rekey(&old_key, new_key)
        {
            return Err(HierarchyError::DuplicateChild {
                kind: OwnerKind::Strategy,
                key: OwnerKey::new(&self.strategies[id.0].id, &new_name).to_string(),
            }
            .into());
        }
        let node = &mut self.strategies[id.0];
        node.name = new_name.clone();
        node.ledger.set_owner_name(new_name);
        Ok(())
    }

    /// Re-sizes a fund. Unchecked against the account (fund capital is raised
    /// independently), but never below what the fund already handed out.
    pub fn reallocate_fund(&mut self, id: FundId, new_capital: Cash) -> DeskResult<()> {
        let allocated = self.fund_allocated(id)?;
        if new_capital.0 < allocated.0 {
            return Err(HierarchyError::AllocationExceeded {
                requested: allocated.0 - new_capital.0,
                available: 0.0,
            }
            .into());
        }
        self.funds[id.0].capital = new_capital;
        Ok(())
    }

    /// Re-sizes a portfolio; an increase is limited by the fund's cash.
    pub fn reallocate_portfolio(&mut self, id: PortfolioId, new_capital: Cash) -> DeskResult<()> {
        let node = self.portfolio(id)?;
        let delta = new_capital - node.capital;
        if let Some(parent) = node.fund {
            let available = self.fund_cash(parent)?;
            if delta.0 > available.0 {
                return Err(HierarchyError::AllocationExceeded {
                    requested: delta.0,
                    available: available.0,
                }
                .into());
            }
        }
        let allocated = self.portfolio_allocated(id)?;
        if new_capital.0 < allocated.0 {
            return Err(HierarchyError::AllocationExceeded {
                requested: allocated.0 - new_capital.0,
                available: 0.0,
            }
            .into());
        }
        self.portfolios[id.0].capital = new_capital;
        Ok(())
    }

    /// Re-sizes a strategy; an increase is limited by the portfolio's cash.
    pub fn reallocate_strategy(&mut self, id: StrategyId, new_capital: Cash) -> DeskResult<()> {
        let node = self.strategy(id)?;
        let delta = new_capital - node.capital;
        if let Some(parent) = node.portfolio {
            let available = self.portfolio_cash(parent)?;
            if delta.0 > available.0 {
                return Err(HierarchyError::AllocationExceeded {
                    requested: delta.0,
                    available: available.0,
                }
                .into());
            }
        }
        self.strategies[id.0].capital = new_capital;
        Ok(())
    }

    /// Detaches a fund from its account. The node (and its ledger history)
    /// stays reachable through the handle; its capital no longer counts
    /// toward the account.
    pub fn remove_fund(&mut self, id: FundId) -> DeskResult<()> {
        let node = self.fund(id)?;
        let (key, parent) = (node.key(), node.account);
        if let Some(parent) = parent {
            self.accounts[parent.0].funds.remove(&key);
        }
        self.funds[id.0].account = None;
        Ok(())
    }

    pub fn remove_portfolio(&mut self, id: PortfolioId) -> DeskResult<()> {
        let node = self.portfolio(id)?;
        let (key, parent) = (node.key(), node.fund);
        if let Some(parent) = parent {
            self.funds[parent.0].portfolios.remove(&key);
        }
        self.portfolios[id.0].fund = None;
        Ok(())
    }

    pub fn remove_strategy(&mut self, id: StrategyId) -> DeskResult<()> {
        let node = self.strategy(id)?;
        let (key, parent) = (node.key(), node.portfolio);
        if let Some(parent) = parent {
            self.portfolios[parent.0].strategies.remove(&key);
        }
        self.strategies[id.0].portfolio = None;
        Ok(())
    }

    // ============================================================================================
    // Order flow
    // ============================================================================================

    fn chain_of(&self, strategy: StrategyId) -> DeskResult<Chain> {
        let strategy_node = self.strategy(strategy)?;
        let portfolio = strategy_node.portfolio;
        let fund = portfolio.and_then(|p| self.portfolios[p.0].fund);
        let account = fund.and_then(|f| self.funds[f.0].account);
        Ok(Chain {
            portfolio,
            fund,
            account,
            system: strategy_node.system,
        })
    }

    /// Pure per-order rule aggregation, walking the chain from the highest
    /// owner down to the portfolio directly above the strategy.
    fn aggregate_rules(&self, chain: &Chain) -> AggregatedRules {
        let mut aggregated = AggregatedRules::default();
        if let Some(account) = chain.account {
            aggregated.apply(&self.accounts[account.0].rules);
        }
        if let Some(fund) = chain.fund {
            aggregated.apply(&self.funds[fund.0].rules);
        }
        if let Some(portfolio) = chain.portfolio {
            aggregated.apply(&self.portfolios[portfolio.0].rules);
        }
        aggregated
    }

    /// The primary entry point: validates the intent against the aggregated
    /// policy, executes the derived instructions, and cascades every fill
    /// through the ancestor ledgers. Synchronous; on any error no position or
    /// ledger state changes (beyond the strategy's rejection record).
    #[tracing::instrument(skip(self, request), fields(symbol = %request.symbol, action = %request.action, qty = request.quantity.0))]
    pub fn place_order(
        &mut self,
        strategy: StrategyId,
        request: OrderRequest,
    ) -> DeskResult<(Order, Vec<Arc<Trade>>)> {
        let chain = self.chain_of(strategy)?;
        let rules = self.aggregate_rules(&chain);

        let strategy_node = &self.strategies[strategy.0];
        let tms = &self.systems[chain.system.0].tms;
        let context = OrderContext {
            current_qty: tms.current_qty(strategy, &request.symbol),
            portfolio_capital: chain.portfolio.map(|p| self.portfolios[p.0].capital),
            free_cash: tms.free_cash(strategy, strategy_node.capital, None),
            rules,
        };

        let system = &mut self.systems[chain.system.0];
        let strategy_node = &mut self.strategies[strategy.0];

        let mut order =
            system
                .oms
                .create_order(strategy, request, &context, &mut strategy_node.ledger)?;

        system.oms.mark_submitted(&mut order);

        let mut fills = Vec::with_capacity(order.instructions.len());
        for instruction in &order.instructions {
            let trade = system.tms.execute_trade(instruction);

            // Cascade: strategy first, then every ancestor in order.
            strategy_node.ledger.record_trade(Arc::clone(&trade));
            if let Some(portfolio) = chain.portfolio {
                self.portfolios[portfolio.0]
                    .ledger
                    .record_trade(Arc::clone(&trade));
            }
            if let Some(fund) = chain.fund {
                self.funds[fund.0].ledger.record_trade(Arc::clone(&trade));
            }
            if let Some(account) = chain.account {
                self.accounts[account.0]
                    .ledger
                    .record_trade(Arc::clone(&trade));
            }
            fills.push(trade);
        }

        system.oms.mark_filled(&mut order, &fills);
        Ok((order, fills))
    }

    /// Legacy interface: a signed direction maps back to its simple intent
    /// and the first resulting fill is returned.
    pub fn place_trade(
        &mut self,
        strategy: StrategyId,
        symbol: impl Into<Symbol>,
        direction: TradeDirection,
        quantity: f64,
        order_kind: OrderKind,
        price: f64,
        stop_price: Option<f64>,
        trade_date: Option<chrono::DateTime<chrono::Utc>>,
    ) -> DeskResult<Arc<Trade>> {
        let mut request = OrderRequest::market(symbol, direction.intent(), quantity, price);
        request.order_kind = order_kind;
        request.stop_price = stop_price.map(crate::domain::Price);
        request.trade_date = trade_date;

        let (_, fills) = self.place_order(strategy, request)?;
        fills.into_iter().next().ok_or_else(|| {
            crate::error::SystemError::InvariantViolation(
                "validated order produced no fills".to_string(),
            )
            .into()
        })
    }

    // ============================================================================================
    // Position passthrough
    // ============================================================================================

    pub fn position(&self, strategy: StrategyId, symbol: &Symbol) -> DeskResult<Option<&Position>> {
        let node = self.strategy(strategy)?;
        Ok(self.systems[node.system.0].tms.position(strategy, symbol))
    }

    pub fn open_positions(&self, strategy: StrategyId) -> DeskResult<Vec<&Position>> {
        let node = self.strategy(strategy)?;
        Ok(self.systems[node.system.0]
            .tms
            .open_positions_for(strategy)
            .collect())
    }

    pub fn realized_pnl(&self, strategy: StrategyId) -> DeskResult<f64> {
        let node = self.strategy(strategy)?;
        Ok(self.systems[node.system.0].tms.realized_pnl(strategy))
    }

    // ============================================================================================
    // Ledgers, metrics, snapshots
    // ============================================================================================

    pub fn ledger(&self, level: impl Into<LevelId>) -> DeskResult<&Ledger> {
        Ok(match level.into() {
            LevelId::Account(id) => &self.account(id)?.ledger,
            LevelId::Fund(id) => &self.fund(id)?.ledger,
            LevelId::Portfolio(id) => &self.portfolio(id)?.ledger,
            LevelId::Strategy(id) => &self.strategy(id)?.ledger,
        })
    }

    pub fn ledger_snapshot(&self, level: impl Into<LevelId>) -> DeskResult<LedgerSnapshot> {
        Ok(self.ledger(level)?.snapshot())
    }

    fn strategy_current_balance(&self, id: StrategyId, quotes: Option<&PriceMap>) -> Cash {
        let node = &self.strategies[id.0];
        let tms = &self.systems[node.system.0].tms;
        // Actual cash remaining (entry-valued), plus open positions marked to
        // the supplied quotes, plus realized P&L.
        let cash = tms.free_cash(id, node.capital, None);
        let positions = tms.open_position_value(id, quotes.map(|q| q as &dyn QuoteSource));
        cash + positions + Cash(tms.realized_pnl(id))
    }

    fn current_balance(&self, level: LevelId, quotes: Option<&PriceMap>) -> DeskResult<Cash> {
        Ok(match level {
            LevelId::Strategy(id) => {
                self.strategy(id)?;
                self.strategy_current_balance(id, quotes)
            }
            LevelId::Portfolio(id) => {
                let node = self.portfolio(id)?;
                let children: Cash = node
                    .strategies
                    .values()
                    .map(|s| self.strategy_current_balance(*s, quotes))
                    .sum();
                self.portfolio_cash(id)? + children
            }
            LevelId::Fund(id) => {
                let node = self.fund(id)?;
                let mut balance = self.fund_cash(id)?;
                for portfolio in node.portfolios.values() {
                    balance += self.current_balance(LevelId::Portfolio(*portfolio), quotes)?;
                }
                balance
            }
            LevelId::Account(id) => {
                let node = self.account(id)?;
                let mut balance = Cash(0.0);
                for fund in node.funds.values() {
                    balance += self.current_balance(LevelId::Fund(*fund), quotes)?;
                }
                balance
            }
        })
    }

    /// Performance metrics at any hierarchy level.
    ///
    /// The current balance aggregates child strategy cash, open positions at
    /// the supplied quotes, and realized P&L; the initial balance is the
    /// level's allocated capital.
    pub fn performance_metrics(
        &self,
        level: impl Into<LevelId>,
        quotes: Option<&PriceMap>,
    ) -> DeskResult<PerformanceMetrics> {
        let level = level.into();
        let (owner_name, owner_kind, initial) = match level {
            LevelId::Account(id) => (
                self.account(id)?.name.clone(),
                OwnerKind::Account,
                self.account_capital(id)?,
            ),
            LevelId::Fund(id) => (
                self.fund(id)?.name.clone(),
                OwnerKind::Fund,
                self.fund_capital(id)?,
            ),
            LevelId::Portfolio(id) => (
                self.portfolio(id)?.name.clone(),
                OwnerKind::Portfolio,
                self.portfolio_capital(id)?,
            ),
            LevelId::Strategy(id) => (
                self.strategy(id)?.name.clone(),
                OwnerKind::Strategy,
                self.strategy_capital(id)?,
            ),
        };
        let current = self.current_balance(level, quotes)?;
        let ledger = self.ledger(level)?;
        Ok(PerformanceMetrics::new(
            owner_name, owner_kind, ledger, initial, current, quotes,
        ))
    }

    // ============================================================================================
    // System configuration
    // ============================================================================================

    pub fn system_of(&self, strategy: StrategyId) -> DeskResult<SystemId> {
        Ok(self.strategy(strategy)?.system)
    }

    fn system_mut(&mut self, system: SystemId) -> DeskResult<&mut TradingSystem> {
        let index = system.0;
        self.systems.get_mut(index).ok_or_else(|| {
            crate::error::SystemError::IndexOutOfBounds(format!("trading system {index}")).into()
        })
    }

    /// Configures the commission rate the subtree's TMS stamps on fills.
    pub fn set_commission_pct(&mut self, system: SystemId, commission_pct: f64) -> DeskResult<()> {
        self.system_mut(system)?.tms.set_commission_pct(commission_pct);
        Ok(())
    }

    /// Installs event sinks on a subtree's OMS and TMS.
    pub fn install_event_sinks(
        &mut self,
        system: SystemId,
        oms_sink: Box<dyn EventSink + Send>,
        tms_sink: Box<dyn EventSink + Send>,
    ) -> DeskResult<()> {
        let system = self.system_mut(system)?;
        system.oms.set_event_sink(oms_sink);
        system.tms.set_event_sink(tms_sink);
        Ok(())
    }
}
