// ===============================
// src/orders.rs
// ===============================
//
// Indexed views of open orders and their executions. The stores only
// mirror what the venue reports; the chain reads them, never writes.

use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use rust_decimal::Decimal;
use std::collections::VecDeque;

use crate::domain::{Order, Trade};

const CLOSED_LOG_CAP: usize = 256;

#[derive(Debug, Default)]
pub struct OrderStore {
    open: HashMap<i64, Order>,
    by_cid: HashMap<i64, i64>,
    closed: VecDeque<Order>,
}

impl OrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_snapshot(&mut self, orders: Vec<Order>) {
        self.open.clear();
        self.by_cid.clear();
        for o in orders {
            self.upsert(o);
        }
    }

    pub fn upsert(&mut self, o: Order) {
        self.by_cid.insert(o.cid, o.id);
        self.open.insert(o.id, o);
    }

    /// Order-close frame: move out of the open set, keep a bounded log.
    pub fn close(&mut self, o: Order) {
        self.open.remove(&o.id);
        self.by_cid.remove(&o.cid);
        if self.closed.len() == CLOSED_LOG_CAP {
            self.closed.pop_front();
        }
        self.closed.push_back(o);
    }

    pub fn get(&self, id: i64) -> Option<&Order> {
        self.open.get(&id)
    }

    pub fn get_by_cid(&self, cid: i64) -> Option<&Order> {
        self.by_cid.get(&cid).and_then(|id| self.open.get(id))
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }
}

#[derive(Debug, Default)]
pub struct TradeStore {
    /// order id -> cumulative executed size (unsigned).
    filled: HashMap<i64, Decimal>,
    seen: HashSet<i64>,
}

impl TradeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an execution; returns the new cumulative filled size for the
    /// trade's order. A trade id already recorded does not count again.
    pub fn record(&mut self, t: &Trade) -> Decimal {
        let entry = self.filled.entry(t.order_id).or_insert(Decimal::ZERO);
        if self.seen.insert(t.id) {
            *entry += t.exec_amount.abs();
        }
        *entry
    }

    pub fn filled_for(&self, order_id: i64) -> Decimal {
        self.filled.get(&order_id).copied().unwrap_or(Decimal::ZERO)
    }
}
