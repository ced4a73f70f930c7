// ===============================
// src/config.rs
// ===============================
//
// Env-driven runtime configuration plus the compiled-in venue tables
// (symbol universe, max-volume filters, minimum order sizes, taker fee).
//
// ENV:
//   API_KEY / API_SECRET       venue credentials
//   CURRENCY                   base currency cycles start and end in (USD)
//   MAX_AMOUNT                 cap on the starting amount per cycle
//   MIN_PATH_LENGTH            minimum hops per cycle (3)
//   MAX_PATH_LENGTH            maximum hops per cycle (4)
//   MIN_PATH_PROFIT_USD        admissibility threshold in USD
//   WS_URL                     override the websocket endpoint
//   METRICS_PORT               prometheus port (9898)
//   RECORD_FILE                JSONL sink for book dumps / chain results
//   TRADING_INTERVAL_MS        pacing of solve attempts (500)
//   SOLVER_BUDGET_MS           hard wall-clock budget per solve (850)

use dotenvy::dotenv;
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::env;

/// Wire protocol version this build speaks. A venue info frame announcing
/// anything else is fatal.
pub const API_VERSION: u64 = 2;

pub const DEFAULT_WS_URL: &str = "wss://api.bitfinex.com/ws/2";

/// Wallet bucket orders settle in.
pub const WALLET_TYPE: &str = "exchange";

/// Taker fee per hop, multiplicative.
pub static TAKER_FEE: Lazy<Decimal> = Lazy::new(|| dec!(0.002));

/// Pairs the engine subscribes to and trades across. Restricted to the
/// max-volume pairs so book tops are meaningful.
pub static SYMBOL_UNIVERSE: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "tBTCUSD", "tETHUSD", "tETHBTC", "tLTCUSD", "tLTCBTC", "tXRPUSD", "tXRPBTC", "tEOSUSD",
        "tEOSBTC", "tEOSETH",
    ]
});

/// Currencies the cycle graph is built over.
pub static MAX_VOLUME_CURRENCIES: Lazy<Vec<&'static str>> =
    Lazy::new(|| vec!["USD", "BTC", "ETH", "LTC", "XRP", "EOS"]);

/// Venue minimum order size per currency, in units of that currency.
static MIN_ORDER_SIZE: Lazy<Vec<(&'static str, Decimal)>> = Lazy::new(|| {
    vec![
        ("BTC", dec!(0.002)),
        ("ETH", dec!(0.04)),
        ("LTC", dec!(0.2)),
        ("XRP", dec!(20)),
        ("EOS", dec!(2)),
        ("OTHER", dec!(4)),
    ]
});

pub fn min_order_size(currency: &str) -> Decimal {
    MIN_ORDER_SIZE
        .iter()
        .find(|(c, _)| *c == currency)
        .or_else(|| MIN_ORDER_SIZE.iter().find(|(c, _)| *c == "OTHER"))
        .map(|(_, v)| *v)
        .unwrap_or(Decimal::ZERO)
}

#[derive(Clone, Debug)]
pub struct Args {
    pub api_key: String,
    pub api_secret: String,

    pub currency: String,
    pub max_amount: Decimal,
    pub min_path_length: usize,
    pub max_path_length: usize,
    pub min_path_profit_usd: Decimal,

    pub ws_url: String,
    pub metrics_port: u16,
    pub record_file: Option<String>,

    pub trading_interval_ms: u64,
    pub solver_budget_ms: u64,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

pub fn load() -> Args {
    let _ = dotenv();

    let api_key = env::var("API_KEY").unwrap_or_default();
    let api_secret = env::var("API_SECRET").unwrap_or_default();

    let currency = env::var("CURRENCY")
        .unwrap_or_else(|_| "USD".to_string())
        .to_ascii_uppercase();

    let max_amount = env_or("MAX_AMOUNT", dec!(1000));
    let min_path_length = env_or("MIN_PATH_LENGTH", 3usize);
    let max_path_length = env_or("MAX_PATH_LENGTH", 4usize);
    let min_path_profit_usd = env_or("MIN_PATH_PROFIT_USD", dec!(0.5));

    let ws_url = env::var("WS_URL").unwrap_or_else(|_| DEFAULT_WS_URL.to_string());
    let metrics_port = env_or("METRICS_PORT", 9898u16);
    let record_file = env::var("RECORD_FILE").ok();

    let trading_interval_ms = env_or("TRADING_INTERVAL_MS", 500u64);
    let solver_budget_ms = env_or("SOLVER_BUDGET_MS", 850u64);

    Args {
        api_key,
        api_secret,
        currency,
        max_amount,
        min_path_length,
        max_path_length,
        min_path_profit_usd,
        ws_url,
        metrics_port,
        record_file,
        trading_interval_ms,
        solver_budget_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_order_size_falls_back_to_other() {
        assert_eq!(min_order_size("BTC"), dec!(0.002));
        assert_eq!(min_order_size("DOGE"), dec!(4));
    }

    #[test]
    fn universe_pairs_split_into_known_currencies() {
        for sym in SYMBOL_UNIVERSE.iter() {
            let (b, q) = crate::domain::split_symbol(sym);
            assert!(MAX_VOLUME_CURRENCIES.contains(&b.as_str()), "{}", sym);
            assert!(MAX_VOLUME_CURRENCIES.contains(&q.as_str()), "{}", sym);
        }
    }
}
