// ===============================
// src/metrics.rs
// ===============================
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

// Single custom registry (we register everything here)
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

// -------- Session health --------
pub static WS_CONNECTED: Lazy<IntGauge> =
    Lazy::new(|| IntGauge::new("ws_connected", "1 while the venue socket is up").unwrap());

pub static WS_RECONNECTS: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("ws_reconnects_total", "socket reconnect attempts").unwrap());

pub static MAINTENANCE: Lazy<IntGauge> =
    Lazy::new(|| IntGauge::new("venue_maintenance", "1 while the venue is in maintenance").unwrap());

// -------- Market data --------
pub static BOOK_MSGS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("book_messages_total", "book snapshots + deltas per symbol"),
        &["symbol"],
    )
    .unwrap()
});

// -------- Solver --------
pub static SOLVER_RUNS: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("solver_runs_total", "solve attempts started").unwrap());

pub static SOLVER_SOLUTIONS: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("solver_solutions_total", "admissible cycles found").unwrap());

pub static SOLVER_MS: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(HistogramOpts::new(
        "solver_duration_ms",
        "wall-clock time per solve attempt (ms)",
    ))
    .unwrap()
});

// -------- Order chain --------
pub static CHAINS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("chains_total", "finished order chains by outcome"),
        &["outcome"],
    )
    .unwrap()
});

pub static ORDERS_OUT: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("orders_sent_total", "order frames sent (new + cancel)").unwrap());

pub static NOTIFICATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("notifications_total", "venue notifications by status"),
        &["status"],
    )
    .unwrap()
});

pub static CALC_BATCHES: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("calc_batches_total", "wallet recompute batches sent").unwrap());

// ---- Config visibility ----
pub static CONFIG_SYMBOL: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("config_symbol", "configured symbols (label: symbol)"),
        &["symbol"],
    )
    .unwrap()
});

pub static CONFIG_BASE_CURRENCY: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("config_base_currency", "base currency (label: currency)"),
        &["currency"],
    )
    .unwrap()
});

pub fn init() {
    // Register all metrics to the custom registry
    for m in [
        REGISTRY.register(Box::new(WS_CONNECTED.clone())),
        REGISTRY.register(Box::new(WS_RECONNECTS.clone())),
        REGISTRY.register(Box::new(MAINTENANCE.clone())),
        REGISTRY.register(Box::new(BOOK_MSGS.clone())),
        REGISTRY.register(Box::new(SOLVER_RUNS.clone())),
        REGISTRY.register(Box::new(SOLVER_SOLUTIONS.clone())),
        REGISTRY.register(Box::new(SOLVER_MS.clone())),
        REGISTRY.register(Box::new(CHAINS.clone())),
        REGISTRY.register(Box::new(ORDERS_OUT.clone())),
        REGISTRY.register(Box::new(NOTIFICATIONS.clone())),
        REGISTRY.register(Box::new(CALC_BATCHES.clone())),
        REGISTRY.register(Box::new(CONFIG_SYMBOL.clone())),
        REGISTRY.register(Box::new(CONFIG_BASE_CURRENCY.clone())),
    ] {
        let _ = m;
    }
}

// Encode all metrics in Prometheus text format
fn encode_metrics() -> Vec<u8> {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    if encoder.encode(&families, &mut buf).is_err() || buf.is_empty() {
        buf.extend_from_slice(b"# no metrics\n");
    }
    buf
}

// Serve one HTTP request (GET / or /metrics) — tiny HTTP 1.1 responder
fn handle_client(mut stream: TcpStream) {
    // Read a bit to consume headers (no full parse)
    let mut _req_buf = [0u8; 1024];
    let _ = stream.read(&mut _req_buf);

    let body = encode_metrics();
    let header = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );

    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(&body);
    let _ = stream.flush();
}

// Run the metrics server in a dedicated OS thread (keeps Tokio runtime clean)
pub async fn serve_metrics(port: u16) {
    thread::spawn(move || {
        let addr = format!("0.0.0.0:{port}");
        let listener = TcpListener::bind(&addr)
            .unwrap_or_else(|e| panic!("metrics bind {} failed: {}", addr, e));
        eprintln!("metrics listening on http://{addr}/ (and /metrics)");

        for conn in listener.incoming() {
            match conn {
                Ok(stream) => handle_client(stream),
                Err(e) => eprintln!("metrics accept error: {}", e),
            }
        }
    });
}
