// ===============================
// src/solver.rs
// ===============================
//
// Cycle-path search over the currency graph. Each pair with a sane book
// contributes two directed edges built from its top of book:
//
//   quote -> base  buy at the ask, rate 1/ask_price, capacity = ask size
//   base -> quote  sell at the bid, rate bid_price, capacity = bid size
//
// A depth-first walk rooted at the base currency enumerates simple cycles
// within the configured hop bounds. A cycle is evaluated by walking the
// amount forward: the top-of-book capacities back-propagate into a binding
// start amount, then each hop applies the conversion rate, the taker fee
// and venue rounding. Cycles below the per-currency minimum order size or
// the USD profit threshold are discarded; the best survivor wins.
//
// The whole search runs under a hard wall-clock budget; overrunning it
// abandons the attempt with no result.

use rust_decimal::Decimal;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::book::BookSnapshot;
use crate::config;
use crate::domain::{join_symbol, split_symbol, Instruction, Solution};
use crate::precision::round_amount;

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("crossed book for {0}")]
    CrossedBook(String),
    #[error("time budget exhausted")]
    Budget,
}

#[derive(Debug, Clone)]
pub struct SolverParams {
    /// Currency cycles start and end in.
    pub base: String,
    /// Starting amount, already capped by the free wallet balance.
    pub start_amount: Decimal,
    pub min_len: usize,
    pub max_len: usize,
    pub min_profit_usd: Decimal,
    pub taker_fee: Decimal,
    pub budget: Duration,
}

#[derive(Debug, Clone)]
struct EdgeTop {
    from: usize,
    to: usize,
    symbol: String,
    /// true buys the pair's base with the quote at the ask.
    buy: bool,
    price: Decimal,
    /// Top-of-book size in units of the pair's base currency.
    size: Decimal,
}

pub fn solve(
    snapshot: &BookSnapshot,
    symbols: &[String],
    params: &SolverParams,
) -> Result<Option<Solution>, SolverError> {
    let started = Instant::now();
    let (currencies, edges) = build_graph(snapshot, symbols)?;
    let Some(root) = currencies.iter().position(|c| *c == params.base) else {
        return Ok(None);
    };

    let mut adj: Vec<Vec<usize>> = vec![Vec::new(); currencies.len()];
    for (i, e) in edges.iter().enumerate() {
        adj[e.from].push(i);
    }

    let mut search = Search {
        currencies: &currencies,
        edges: &edges,
        adj: &adj,
        snapshot,
        params,
        started,
        root,
        visited: vec![false; currencies.len()],
        path: Vec::new(),
        best: None,
    };
    search.visited[root] = true;
    search.dfs(root, 0)?;
    Ok(search.best)
}

fn build_graph(
    snapshot: &BookSnapshot,
    symbols: &[String],
) -> Result<(Vec<String>, Vec<EdgeTop>), SolverError> {
    let mut currencies: Vec<String> = Vec::new();
    let index_of = |name: &str, currencies: &mut Vec<String>| -> usize {
        match currencies.iter().position(|c| c == name) {
            Some(i) => i,
            None => {
                currencies.push(name.to_string());
                currencies.len() - 1
            }
        }
    };

    let mut edges = Vec::new();
    for symbol in symbols {
        let Some(book) = snapshot.get(symbol) else {
            continue;
        };
        if book.is_empty() {
            continue;
        }
        if book.is_crossed() {
            return Err(SolverError::CrossedBook(symbol.clone()));
        }
        let (base, quote) = split_symbol(symbol);
        let b = index_of(&base, &mut currencies);
        let q = index_of(&quote, &mut currencies);

        if let Some((ask, size)) = book.best_ask() {
            if ask > Decimal::ZERO && size > Decimal::ZERO {
                edges.push(EdgeTop {
                    from: q,
                    to: b,
                    symbol: symbol.clone(),
                    buy: true,
                    price: ask,
                    size,
                });
            }
        }
        if let Some((bid, size)) = book.best_bid() {
            if bid > Decimal::ZERO && size > Decimal::ZERO {
                edges.push(EdgeTop {
                    from: b,
                    to: q,
                    symbol: symbol.clone(),
                    buy: false,
                    price: bid,
                    size,
                });
            }
        }
    }
    Ok((currencies, edges))
}

struct Search<'a> {
    currencies: &'a [String],
    edges: &'a [EdgeTop],
    adj: &'a [Vec<usize>],
    snapshot: &'a BookSnapshot,
    params: &'a SolverParams,
    started: Instant,
    root: usize,
    visited: Vec<bool>,
    path: Vec<usize>,
    best: Option<Solution>,
}

impl Search<'_> {
    fn dfs(&mut self, cur: usize, depth: usize) -> Result<(), SolverError> {
        if self.started.elapsed() >= self.params.budget {
            return Err(SolverError::Budget);
        }
        for k in 0..self.adj[cur].len() {
            let ei = self.adj[cur][k];
            let to = self.edges[ei].to;
            if to == self.root {
                let len = depth + 1;
                if len >= self.params.min_len && len <= self.params.max_len {
                    self.path.push(ei);
                    self.consider();
                    self.path.pop();
                }
                continue;
            }
            if depth + 1 >= self.params.max_len || self.visited[to] {
                continue;
            }
            self.visited[to] = true;
            self.path.push(ei);
            self.dfs(to, depth + 1)?;
            self.path.pop();
            self.visited[to] = false;
        }
        Ok(())
    }

    fn consider(&mut self) {
        if let Some(sol) = self.evaluate() {
            let better = self
                .best
                .as_ref()
                .map(|b| sol.profit_usd > b.profit_usd)
                .unwrap_or(true);
            if better {
                self.best = Some(sol);
            }
        }
    }

    /// Evaluate the current path; `None` when inadmissible.
    fn evaluate(&self) -> Option<Solution> {
        let fee_keep = Decimal::ONE - self.params.taker_fee;

        // back-propagate top-of-book capacities into the start amount
        let mut max_start = self.params.start_amount;
        let mut factor = Decimal::ONE;
        for &ei in &self.path {
            let e = &self.edges[ei];
            let cap_in = if e.buy { e.size * e.price } else { e.size };
            max_start = max_start.min(cap_in / factor);
            let rate = if e.buy {
                Decimal::ONE / e.price
            } else {
                e.price
            };
            factor *= rate * fee_keep;
        }
        let a0 = round_amount(max_start);
        if a0 <= Decimal::ZERO {
            return None;
        }

        // forward walk with fee and venue rounding per hop
        let mut amount = a0;
        let mut instructions = Vec::with_capacity(self.path.len() + 1);
        for &ei in &self.path {
            let e = &self.edges[ei];
            let (pair_base, _) = split_symbol(&e.symbol);
            let traded = if e.buy {
                round_amount(amount / e.price)
            } else {
                round_amount(amount)
            };
            if traded < config::min_order_size(&pair_base) {
                return None;
            }
            instructions.push(Instruction::Transition {
                symbol: e.symbol.clone(),
                action_amount: if e.buy { traded } else { -traded },
                action_price: e.price,
            });
            amount = if e.buy {
                traded * fee_keep
            } else {
                traded * e.price * fee_keep
            };
        }
        instructions.push(Instruction::End);

        let profit_base = amount - a0;
        if profit_base <= Decimal::ZERO {
            return None;
        }
        let usd = self.usd_reference()?;
        let profit_usd = profit_base * usd;
        if profit_usd < self.params.min_profit_usd {
            return None;
        }
        Some(Solution {
            instructions,
            profit_base,
            profit_usd,
        })
    }

    /// USD value of one unit of the base currency: direct pair bid, else
    /// chained through BTC.
    fn usd_reference(&self) -> Option<Decimal> {
        let c0 = &self.currencies[self.root];
        if c0 == "USD" {
            return Some(Decimal::ONE);
        }
        let bid = |sym: String| {
            self.snapshot
                .get(&sym)
                .and_then(|b| b.best_bid())
                .map(|(p, _)| p)
        };
        if let Some(p) = bid(join_symbol(c0, "USD")) {
            return Some(p);
        }
        match (bid(join_symbol(c0, "BTC")), bid(join_symbol("BTC", "USD"))) {
            (Some(a), Some(b)) => Some(a * b),
            _ => None,
        }
    }
}
