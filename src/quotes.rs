use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::{Price, Symbol};

/// Price lookup seam between the engine and whatever supplies market data.
///
/// The core never fetches prices; every entry point that needs them takes a
/// quote source (or a concrete [`PriceMap`]) as an explicit argument.
pub trait QuoteSource {
    /// Latest known price for a symbol, if any.
    fn quote(&self, symbol: &Symbol) -> Option<Price>;
}

/// Caller-supplied mapping from symbol to a positive price.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceMap(HashMap<Symbol, Price>);

impl PriceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a quote. Non-positive prices are ignored (quotes are positive by
    /// contract).
    pub fn set(&mut self, symbol: impl Into<Symbol>, price: f64) {
        if price > 0.0 {
            self.0.insert(symbol.into(), Price(price));
        }
    }

    pub fn get(&self, symbol: &Symbol) -> Option<Price> {
        self.0.get(symbol).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl QuoteSource for PriceMap {
    fn quote(&self, symbol: &Symbol) -> Option<Price> {
        self.get(symbol)
    }
}

impl<S: Into<Symbol>> FromIterator<(S, f64)> for PriceMap {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (symbol, price) in iter {
            map.set(symbol, price);
        }
        map
    }
}
