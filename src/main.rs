// ===============================
// src/main.rs
// ===============================
/*
=============================================================================
triarb_bot_rust — async triangular arbitrage engine in Rust

Summary : Maintains live order-book replicas for a universe of pairs over
          the venue's v2 websocket, searches the currency graph for
          profitable closed cycles in the base currency, and executes the
          winning cycle as a chain of dependent limit orders with
          compensating cancels on failure. Exposes Prometheus metrics and
          records book dumps / chain results as JSONL.
=============================================================================
*/

use tracing::{error, info};
use triarb_bot_rust::{config, engine, metrics};

#[tokio::main]
async fn main() {
    // ---- Logging ----
    tracing_subscriber::fmt().with_env_filter("info").init();

    // ---- Load config ----
    let args = config::load();
    if args.api_key.is_empty() || args.api_secret.is_empty() {
        error!("API_KEY / API_SECRET missing; the venue will reject auth");
    }

    // ---- Metrics ----
    metrics::init();
    tokio::spawn(metrics::serve_metrics(args.metrics_port));

    info!(
        currency = %args.currency,
        max_amount = %args.max_amount,
        path_len = ?(args.min_path_length, args.max_path_length),
        min_profit_usd = %args.min_path_profit_usd,
        ws = %args.ws_url,
        "startup config"
    );
    metrics::CONFIG_BASE_CURRENCY
        .with_label_values(&[&args.currency])
        .set(1);
    for s in config::SYMBOL_UNIVERSE.iter() {
        metrics::CONFIG_SYMBOL.with_label_values(&[s]).set(1);
    }

    // ---- Engine ----
    let mut handle = engine::start(args);

    // Run until ctrl-c, then drain: the engine waits for any in-flight
    // chain before unsubscribing and resolving. A fatal protocol error
    // (version mismatch) ends the process without a signal.
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
            match handle.stop().await {
                Ok(()) => info!("engine stopped"),
                Err(e) => error!(%e, "engine stopped with error"),
            }
        }
        res = handle.wait() => {
            match res {
                Ok(()) => info!("engine exited"),
                Err(e) => error!(%e, "fatal engine error"),
            }
        }
    }
}
