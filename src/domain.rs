// ===============================
// src/domain.rs
// ===============================
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Split a venue symbol into (base, quote). Symbols are opaque tokens
/// elsewhere; this is the only place that knows their shape.
/// "tBTCUSD" -> ("BTC", "USD"), "tDUSK:USD" -> ("DUSK", "USD").
pub fn split_symbol(symbol: &str) -> (String, String) {
    let body = symbol.strip_prefix('t').unwrap_or(symbol);
    if let Some((base, quote)) = body.split_once(':') {
        (base.to_string(), quote.to_string())
    } else if body.len() >= 6 {
        (body[..3].to_string(), body[3..].to_string())
    } else {
        (body.to_string(), String::new())
    }
}

/// Venue symbol for a (base, quote) pair.
pub fn join_symbol(base: &str, quote: &str) -> String {
    if base.len() > 3 || quote.len() > 3 {
        format!("t{}:{}", base, quote)
    } else {
        format!("t{}{}", base, quote)
    }
}

/// One row of an order book ladder. `count == 0` is a removal marker;
/// otherwise the sign of `amount` encodes the side (bids > 0, asks < 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub price: Decimal,
    pub count: u32,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Active,
    PartiallyFilled,
    Executed,
    Canceled,
    PostOnlyCanceled,
}

impl OrderStatus {
    /// The venue reports status as free text, e.g. "EXECUTED @ 102.0(0.5)".
    pub fn parse(text: &str) -> Self {
        if text.contains("POSTONLY CANCELED") {
            OrderStatus::PostOnlyCanceled
        } else if text.contains("PARTIALLY FILLED") {
            OrderStatus::PartiallyFilled
        } else if text.contains("EXECUTED") {
            OrderStatus::Executed
        } else if text.contains("CANCELED") {
            OrderStatus::Canceled
        } else {
            OrderStatus::Active
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Executed | OrderStatus::Canceled | OrderStatus::PostOnlyCanceled
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub gid: Option<i64>,
    pub cid: i64,
    /// UTC day the cid belongs to ("YYYY-MM-DD"); only known for orders we
    /// originated ourselves.
    pub cid_date: Option<String>,
    pub symbol: String,
    pub order_type: String,
    /// Signed remaining amount (buy > 0, sell < 0).
    pub amount: Decimal,
    /// Signed original amount.
    pub amount_orig: Decimal,
    pub price: Decimal,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: i64,
    pub symbol: String,
    pub order_id: i64,
    /// Signed executed amount.
    pub exec_amount: Decimal,
    pub exec_price: Decimal,
    pub fee: Option<Decimal>,
    pub fee_currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub wallet_type: String,
    pub currency: String,
    pub balance: Decimal,
    /// `None` means the venue has not computed the free balance yet; the
    /// wallet is unusable until a recalculation comes back.
    pub available: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifKind {
    OnReq,
    OcReq,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub kind: NotifKind,
    pub status: NotifStatus,
    pub text: String,
    /// For order notifications the info payload is the order itself.
    pub order: Option<Order>,
}

/// One hop of a solved cycle, or the closing marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Instruction {
    Transition {
        symbol: String,
        /// Signed: positive buys base, negative sells base.
        action_amount: Decimal,
        /// The book top the evaluation used.
        action_price: Decimal,
    },
    End,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    pub instructions: Vec<Instruction>,
    pub profit_base: Decimal,
    pub profit_usd: Decimal,
}

impl Solution {
    pub fn transitions(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions
            .iter()
            .filter(|i| matches!(i, Instruction::Transition { .. }))
    }
}

/// Capability matrix from the auth acknowledgment. Trading requires
/// orders.read and orders.write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Caps {
    pub orders_read: bool,
    pub orders_write: bool,
    pub wallets_read: bool,
}

impl Caps {
    pub fn can_trade(&self) -> bool {
        self.orders_read && self.orders_write
    }
}
