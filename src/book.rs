// ===============================
// src/book.rs
// ===============================
//
// Per-symbol order book replicas fed by snapshot + delta frames.
// BTreeMap keyed by price keeps each side strictly ordered; bids are read
// through `iter().next_back()`, asks through `iter().next()`.
//
// Books are held behind Arc so the solver can take a copy-on-write snapshot
// of the whole store without blocking the session task: mutation goes
// through `Arc::make_mut`, a snapshot is just a clone of the Arc map.

use ahash::AHashMap as HashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::Level;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OrderBook {
    pub bids: BTreeMap<Decimal, Level>,
    pub asks: BTreeMap<Decimal, Level>,
}

impl OrderBook {
    /// Replace both sides atomically from a snapshot frame.
    pub fn load_snapshot(&mut self, levels: &[Level]) {
        self.bids.clear();
        self.asks.clear();
        for lvl in levels {
            if lvl.count == 0 || lvl.amount.is_zero() {
                continue;
            }
            if lvl.amount > Decimal::ZERO {
                self.bids.insert(lvl.price, *lvl);
            } else {
                self.asks.insert(lvl.price, *lvl);
            }
        }
    }

    /// Apply a single-level delta. A zero count removes the level: the side
    /// is the one where the price actually lives, with the sign of `amount`
    /// breaking the tie when both sides carry it. Removing a price that is
    /// on neither side is a no-op.
    pub fn apply_delta(&mut self, lvl: &Level) {
        if lvl.count == 0 {
            let on_bids = self.bids.contains_key(&lvl.price);
            let on_asks = self.asks.contains_key(&lvl.price);
            match (on_bids, on_asks) {
                (true, true) => {
                    if lvl.amount > Decimal::ZERO {
                        self.bids.remove(&lvl.price);
                    } else {
                        self.asks.remove(&lvl.price);
                    }
                }
                (true, false) => {
                    self.bids.remove(&lvl.price);
                }
                (false, true) => {
                    self.asks.remove(&lvl.price);
                }
                (false, false) => {}
            }
            return;
        }
        if lvl.amount > Decimal::ZERO {
            self.bids.insert(lvl.price, *lvl);
        } else if lvl.amount < Decimal::ZERO {
            self.asks.insert(lvl.price, *lvl);
        }
    }

    /// Best bid as (price, unsigned size).
    pub fn best_bid(&self) -> Option<(Decimal, Decimal)> {
        self.bids
            .iter()
            .next_back()
            .map(|(p, l)| (*p, l.amount.abs()))
    }

    /// Best ask as (price, unsigned size).
    pub fn best_ask(&self) -> Option<(Decimal, Decimal)> {
        self.asks.iter().next().map(|(p, l)| (*p, l.amount.abs()))
    }

    /// True when the top of book is inverted or touching. A crossed replica
    /// means we are mid-update; nothing downstream may act on it.
    pub fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) => bid >= ask,
            _ => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

/// Immutable view handed to the solver.
pub type BookSnapshot = HashMap<String, Arc<OrderBook>>;

#[derive(Debug, Default)]
pub struct BookStore {
    books: HashMap<String, Arc<OrderBook>>,
}

impl BookStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn book_mut(&mut self, symbol: &str) -> &mut OrderBook {
        let arc = self
            .books
            .entry(symbol.to_string())
            .or_insert_with(|| Arc::new(OrderBook::default()));
        Arc::make_mut(arc)
    }

    pub fn apply_snapshot(&mut self, symbol: &str, levels: &[Level]) {
        self.book_mut(symbol).load_snapshot(levels);
    }

    pub fn apply_delta(&mut self, symbol: &str, lvl: &Level) {
        self.book_mut(symbol).apply_delta(lvl);
    }

    pub fn drop_symbol(&mut self, symbol: &str) {
        self.books.remove(symbol);
    }

    pub fn book(&self, symbol: &str) -> Option<&OrderBook> {
        self.books.get(symbol).map(|a| a.as_ref())
    }

    pub fn best_bid(&self, symbol: &str) -> Option<(Decimal, Decimal)> {
        self.book(symbol).and_then(|b| b.best_bid())
    }

    pub fn best_ask(&self, symbol: &str) -> Option<(Decimal, Decimal)> {
        self.book(symbol).and_then(|b| b.best_ask())
    }

    /// Cheap copy-on-write snapshot of every ladder.
    pub fn snapshot(&self) -> BookSnapshot {
        self.books.clone()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &String> {
        self.books.keys()
    }
}
