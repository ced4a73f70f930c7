// ===============================
// src/engine.rs
// ===============================
//
// The engine is one logical task: every store mutation, chain transition
// and subscription change happens here, driven by session events and timers
// in arrival order. The only physical parallelism is the solver, which runs
// on a blocking worker over a copy-on-write book snapshot.
//
// Trading tick guards (all must hold):
//   connected, not in maintenance, authenticated with order permissions,
//   interval elapsed since the last attempt, every required book confirmed,
//   no chain active, base wallet fresh.

use rust_decimal::Decimal;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::bitfinex::{
    self, DataMsg, WsIn, CODE_MAINTENANCE_BEGIN, CODE_MAINTENANCE_END, CODE_RESTART,
};
use crate::book::BookStore;
use crate::chain::{ChainState, OrderChain};
use crate::config::{self, Args, API_VERSION, WALLET_TYPE};
use crate::domain::Caps;
use crate::metrics;
use crate::orders::{OrderStore, TradeStore};
use crate::recorder;
use crate::session::{self, Outbound, SessionEvent};
use crate::solver::{self, SolverError, SolverParams};
use crate::subs::SubscriptionRegistry;
use crate::wallet::WalletStore;

const STARTUP_GRACE: Duration = Duration::from_secs(5);
const TRADING_FLAG_CAP: Duration = Duration::from_secs(60);
const CHAIN_SWEEP_MS: u64 = 200;
const STOP_POLL_MS: u64 = 50;
const PERSIST_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("api version mismatch: venue speaks v{venue}, this build speaks v{ours}")]
    ApiVersion { venue: u64, ours: u64 },
}

type SolveOutcome = (Result<Option<crate::domain::Solution>, SolverError>, Duration);

pub struct Engine {
    cfg: Args,
    books: BookStore,
    wallets: WalletStore,
    orders: OrderStore,
    trades: TradeStore,
    registry: SubscriptionRegistry,
    chain: OrderChain,
    caps: Caps,

    connected: bool,
    authed: bool,
    maintenance: bool,
    trading: bool,
    trading_since: Option<Instant>,
    last_attempt: Option<Instant>,
    active_profit_usd: Option<Decimal>,

    out_tx: mpsc::Sender<Outbound>,
    rec_tx: Option<mpsc::Sender<recorder::Event>>,
    stop_rx: watch::Receiver<bool>,
}

pub struct EngineHandle {
    stop_tx: watch::Sender<bool>,
    done: tokio::task::JoinHandle<Result<(), EngineError>>,
}

impl EngineHandle {
    /// Signal the engine to wind down and wait for it. The engine keeps
    /// polling its trading flag until any in-flight chain settles, then
    /// unsubscribes everything and resolves.
    pub async fn stop(self) -> Result<(), EngineError> {
        let _ = self.stop_tx.send(true);
        self.done.await.unwrap_or(Ok(()))
    }

    /// Wait for the engine to exit on its own (fatal error or session loss).
    pub async fn wait(&mut self) -> Result<(), EngineError> {
        (&mut self.done).await.unwrap_or(Ok(()))
    }
}

/// Wire up the session, the optional recorder, and the engine task.
pub fn start(cfg: Args) -> EngineHandle {
    let (ev_tx, ev_rx) = mpsc::channel::<SessionEvent>(4096);
    let (out_tx, out_rx) = mpsc::channel::<Outbound>(1024);
    tokio::spawn(session::run(cfg.ws_url.clone(), ev_tx, out_rx));

    let rec_tx = cfg.record_file.clone().map(|path| {
        let (tx, rx) = mpsc::channel::<recorder::Event>(8192);
        tokio::spawn(recorder::run(rx, path));
        tx
    });

    let (stop_tx, stop_rx) = watch::channel(false);
    let engine = Engine::new(cfg, out_tx, rec_tx, stop_rx);
    let done = tokio::spawn(engine.run(ev_rx));
    EngineHandle { stop_tx, done }
}

impl Engine {
    pub fn new(
        cfg: Args,
        out_tx: mpsc::Sender<Outbound>,
        rec_tx: Option<mpsc::Sender<recorder::Event>>,
        stop_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            cfg,
            books: BookStore::new(),
            wallets: WalletStore::new(),
            orders: OrderStore::new(),
            trades: TradeStore::new(),
            registry: SubscriptionRegistry::new(),
            chain: OrderChain::default(),
            caps: Caps::default(),
            connected: false,
            authed: false,
            maintenance: false,
            trading: false,
            trading_since: None,
            last_attempt: None,
            active_profit_usd: None,
            out_tx,
            rec_tx,
            stop_rx,
        }
    }

    pub async fn run(mut self, mut ev_rx: mpsc::Receiver<SessionEvent>) -> Result<(), EngineError> {
        let started = Instant::now();
        let mut stop_rx = self.stop_rx.clone();
        let mut stopping = false;

        let mut trading_tick = interval(Duration::from_millis(self.cfg.trading_interval_ms));
        trading_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut chain_tick = interval(Duration::from_millis(CHAIN_SWEEP_MS));
        let mut persist_tick = interval(Duration::from_secs(PERSIST_SECS));
        let mut stop_tick = interval(Duration::from_millis(STOP_POLL_MS));

        let mut solve_rx: Option<oneshot::Receiver<SolveOutcome>> = None;

        loop {
            tokio::select! {
                ev = ev_rx.recv() => match ev {
                    Some(ev) => {
                        if let Err(fatal) = self.handle_session_event(ev).await {
                            // refuse to operate: silence the socket and bail
                            let _ = self.out_tx.send(Outbound::Shutdown).await;
                            return Err(fatal);
                        }
                    }
                    None => {
                        warn!("session task gone");
                        break;
                    }
                },
                res = async { solve_rx.as_mut().expect("guarded by branch condition").await },
                        if solve_rx.is_some() => {
                    solve_rx = None;
                    self.on_solver_done(res).await;
                },
                _ = trading_tick.tick() => {
                    if !stopping && started.elapsed() >= STARTUP_GRACE && solve_rx.is_none() {
                        solve_rx = self.maybe_trade();
                    }
                },
                _ = chain_tick.tick() => self.sweep_chain().await,
                _ = persist_tick.tick() => self.persist_books().await,
                changed = stop_rx.changed() => {
                    // a dropped handle counts as a stop request
                    if changed.is_err() || *stop_rx.borrow() {
                        info!("stop requested, draining");
                        stopping = true;
                    }
                },
                _ = stop_tick.tick(), if stopping => {},
            }
            if stopping && !self.trading {
                self.unsubscribe_all().await;
                let _ = self.out_tx.send(Outbound::Shutdown).await;
                break;
            }
        }
        Ok(())
    }

    // ---- session events ----

    async fn handle_session_event(&mut self, ev: SessionEvent) -> Result<(), EngineError> {
        match ev {
            SessionEvent::Connected => {
                info!("session up, authenticating");
                self.connected = true;
                metrics::WS_CONNECTED.set(1);
                self.registry.clear();
                self.authed = false;
                self.send_auth().await;
            }
            SessionEvent::Disconnected => {
                self.connected = false;
                self.authed = false;
                metrics::WS_CONNECTED.set(0);
            }
            SessionEvent::Frame(frame) => self.handle_frame(frame).await?,
        }
        Ok(())
    }

    async fn handle_frame(&mut self, frame: WsIn) -> Result<(), EngineError> {
        match frame {
            WsIn::Info { version, code } => {
                if let Some(v) = version {
                    if v != API_VERSION {
                        error!(venue = v, ours = API_VERSION, "protocol version mismatch");
                        return Err(EngineError::ApiVersion {
                            venue: v,
                            ours: API_VERSION,
                        });
                    }
                    info!(version = v, "venue info");
                }
                if let Some(code) = code {
                    self.handle_info_code(code).await;
                }
            }
            WsIn::Subscribed {
                channel,
                symbol,
                chan_id,
            } => {
                if !self.registry.confirm(&channel, &symbol, chan_id) {
                    debug!(%channel, %symbol, chan_id, "ack without pending request");
                }
            }
            WsIn::Unsubscribed { chan_id } => self.registry.remove(chan_id),
            WsIn::AuthOk { caps } => {
                self.authed = true;
                self.caps = caps;
                if !caps.can_trade() {
                    warn!("missing order read/write permission, trading disabled");
                }
                info!("authenticated, subscribing books");
                self.subscribe_books().await;
            }
            WsIn::AuthErr { code, msg } => {
                warn!(?code, %msg, "authentication failed");
                self.authed = false;
            }
            WsIn::ProtoError { code, msg } => warn!(?code, %msg, "venue error frame"),
            WsIn::Data { chan_id: 0, msg } => self.handle_account_msg(msg).await,
            WsIn::Data { chan_id, msg } => self.handle_channel_msg(chan_id, msg),
        }
        Ok(())
    }

    async fn handle_info_code(&mut self, code: i64) {
        match code {
            CODE_RESTART => {
                warn!("venue restart notice, cycling the socket");
                let _ = self.out_tx.send(Outbound::Reconnect).await;
            }
            CODE_MAINTENANCE_BEGIN => {
                warn!("venue entering maintenance, trading suppressed");
                self.maintenance = true;
                metrics::MAINTENANCE.set(1);
            }
            CODE_MAINTENANCE_END => {
                info!("venue left maintenance, resubscribing");
                self.maintenance = false;
                metrics::MAINTENANCE.set(0);
                self.unsubscribe_all().await;
                self.authed = false;
                self.send_auth().await;
            }
            _ => debug!(code, "unhandled info code"),
        }
    }

    async fn handle_account_msg(&mut self, msg: DataMsg) {
        let now = Instant::now();
        match msg {
            DataMsg::Heartbeat => {}
            DataMsg::WalletSnapshot(ws) => {
                self.wallets.apply_snapshot(ws);
                self.flush_calc().await;
            }
            DataMsg::WalletUpdate(w) => {
                self.wallets.apply_update(w);
                self.flush_calc().await;
            }
            DataMsg::OrderSnapshot(orders) => self.orders.apply_snapshot(orders),
            DataMsg::OrderNew(o) | DataMsg::OrderUpdate(o) => {
                self.orders.upsert(o.clone());
                let frames = self.chain.on_order(&o, false, now);
                self.send_chain_frames(frames).await;
            }
            DataMsg::OrderClose(o) => {
                self.orders.close(o.clone());
                let frames = self.chain.on_order(&o, true, now);
                self.send_chain_frames(frames).await;
            }
            DataMsg::TradeExecuted(t) => {
                // the venue echoes each execution as `te` then `tu` with the
                // same trade id; only `tu` feeds the cumulative fill
                debug!(trade = t.id, order = t.order_id, "trade executed");
            }
            DataMsg::TradeUpdate(t) => {
                let cumulative = self.trades.record(&t);
                let frames = self.chain.on_trade(t.order_id, cumulative, now);
                self.send_chain_frames(frames).await;
            }
            DataMsg::Notice(n) => {
                let label = match n.status {
                    crate::domain::NotifStatus::Success => "success",
                    crate::domain::NotifStatus::Error => "error",
                };
                metrics::NOTIFICATIONS.with_label_values(&[label]).inc();
                let frames = self.chain.on_notification(&n, now);
                self.send_chain_frames(frames).await;
            }
            DataMsg::BookSnapshot(_) | DataMsg::BookDelta(_) => {
                debug!("book payload on the account channel, dropped");
            }
        }
    }

    fn handle_channel_msg(&mut self, chan_id: i64, msg: DataMsg) {
        let Some(symbol) = self.registry.dispatch(chan_id).map(|e| e.symbol.clone()) else {
            debug!(chan_id, "frame for unknown channel, dropped");
            return;
        };
        match msg {
            DataMsg::Heartbeat => {}
            DataMsg::BookSnapshot(levels) => {
                self.books.apply_snapshot(&symbol, &levels);
                metrics::BOOK_MSGS.with_label_values(&[&symbol]).inc();
            }
            DataMsg::BookDelta(lvl) => {
                self.books.apply_delta(&symbol, &lvl);
                metrics::BOOK_MSGS.with_label_values(&[&symbol]).inc();
            }
            other => debug!(chan_id, ?other, "unexpected payload on book channel"),
        }
    }

    // ---- trading loop ----

    fn required_symbols(&self) -> Vec<String> {
        config::SYMBOL_UNIVERSE
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Check every guard; when all pass, kick the solver off on a blocking
    /// worker and flip the trading flag.
    fn maybe_trade(&mut self) -> Option<oneshot::Receiver<SolveOutcome>> {
        if self.trading {
            // safety valve: a wedged flag may not outlive the chain cap
            if let Some(t) = self.trading_since {
                if t.elapsed() >= TRADING_FLAG_CAP && !self.chain.is_active() {
                    warn!("trading flag stuck, releasing");
                    self.trading = false;
                }
            }
            return None;
        }
        if !self.connected || self.maintenance {
            return None;
        }
        if !self.authed || !self.caps.can_trade() {
            return None;
        }
        if let Some(last) = self.last_attempt {
            if last.elapsed() < Duration::from_millis(self.cfg.trading_interval_ms) {
                return None;
            }
        }
        let required = self.required_symbols();
        if !self.registry.all_books_ready(&required) {
            return None;
        }
        let Some(available) = self.wallets.available(WALLET_TYPE, &self.cfg.currency) else {
            // stale wallet: a recompute is already queued, sit this one out
            return None;
        };
        let start_amount = self.cfg.max_amount.min(available);
        if start_amount <= Decimal::ZERO {
            return None;
        }

        self.last_attempt = Some(Instant::now());
        self.trading = true;
        self.trading_since = Some(Instant::now());
        metrics::SOLVER_RUNS.inc();

        let snapshot = self.books.snapshot();
        let params = SolverParams {
            base: self.cfg.currency.clone(),
            start_amount,
            min_len: self.cfg.min_path_length,
            max_len: self.cfg.max_path_length,
            min_profit_usd: self.cfg.min_path_profit_usd,
            taker_fee: *config::TAKER_FEE,
            budget: Duration::from_millis(self.cfg.solver_budget_ms),
        };
        let (tx, rx) = oneshot::channel();
        tokio::task::spawn_blocking(move || {
            let t0 = Instant::now();
            let result = solver::solve(&snapshot, &required, &params);
            let _ = tx.send((result, t0.elapsed()));
        });
        Some(rx)
    }

    async fn on_solver_done(&mut self, res: Result<SolveOutcome, oneshot::error::RecvError>) {
        match res {
            Ok((Ok(Some(solution)), elapsed)) => {
                metrics::SOLVER_MS.observe(elapsed.as_millis() as f64);
                metrics::SOLVER_SOLUTIONS.inc();
                info!(
                    profit_base = %solution.profit_base,
                    profit_usd = %solution.profit_usd,
                    hops = solution.transitions().count(),
                    "cycle found, starting chain"
                );
                self.active_profit_usd = Some(solution.profit_usd);
                let frames = self.chain.start(&solution, Instant::now());
                self.send_chain_frames(frames).await;
            }
            Ok((Ok(None), elapsed)) => {
                metrics::SOLVER_MS.observe(elapsed.as_millis() as f64);
                self.trading = false;
            }
            Ok((Err(e), _)) => {
                warn!(%e, "solve attempt abandoned");
                self.trading = false;
            }
            Err(_) => {
                warn!("solver worker dropped");
                self.trading = false;
            }
        }
    }

    async fn sweep_chain(&mut self) {
        let frames = self.chain.on_tick(Instant::now());
        self.send_chain_frames(frames).await;
    }

    /// Transmit chain output and fold a terminal chain back into idle.
    async fn send_chain_frames(&mut self, frames: Vec<String>) {
        for frame in frames {
            metrics::ORDERS_OUT.inc();
            self.send(frame).await;
        }
        if self.chain.is_terminal() {
            let outcome = match self.chain.state() {
                ChainState::Done => "done",
                _ => "failed",
            };
            metrics::CHAINS.with_label_values(&[outcome]).inc();
            let profit_usd = self.active_profit_usd.take();
            self.record(recorder::Event::ChainResult {
                ts_ms: chrono::Utc::now().timestamp_millis(),
                outcome: outcome.to_string(),
                steps: self.chain.steps().len(),
                profit_usd,
            })
            .await;
            self.chain.reset();
            self.trading = false;
        }
    }

    // ---- outbound helpers ----

    async fn send(&self, frame: String) {
        if !self.connected {
            debug!("dropping outbound frame while disconnected");
            return;
        }
        if self.out_tx.send(Outbound::Frame(frame)).await.is_err() {
            error!("session outbound channel closed");
        }
    }

    async fn send_auth(&self) {
        let now_ms = chrono::Utc::now().timestamp_millis() as u64;
        self.send(bitfinex::auth_frame(
            &self.cfg.api_key,
            &self.cfg.api_secret,
            now_ms,
        ))
        .await;
    }

    async fn subscribe_books(&mut self) {
        for symbol in self.required_symbols() {
            self.registry.add("book", &symbol);
            self.send(bitfinex::subscribe_book(&symbol)).await;
        }
    }

    async fn unsubscribe_all(&mut self) {
        for chan_id in self.registry.confirmed_chan_ids() {
            self.send(bitfinex::unsubscribe(chan_id)).await;
        }
        self.registry.clear();
    }

    async fn flush_calc(&mut self) {
        while let Some(keys) = self.wallets.next_calc_batch(Instant::now()) {
            metrics::CALC_BATCHES.inc();
            self.send(bitfinex::calc(&keys)).await;
        }
    }

    async fn persist_books(&mut self) {
        if self.rec_tx.is_none() {
            return;
        }
        let ts_ms = chrono::Utc::now().timestamp_millis();
        let dumps: Vec<recorder::Event> = self
            .books
            .snapshot()
            .into_iter()
            .map(|(symbol, book)| recorder::Event::BookDump {
                ts_ms,
                symbol,
                book: (*book).clone(),
            })
            .collect();
        for ev in dumps {
            self.record(ev).await;
        }
    }

    async fn record(&self, ev: recorder::Event) {
        if let Some(tx) = &self.rec_tx {
            if tx.try_send(ev).is_err() {
                warn!("recorder backlog, event dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Level, Wallet};
    use rust_decimal_macros::dec;
    use serde_json::Value;

    fn test_args() -> Args {
        Args {
            api_key: "key".into(),
            api_secret: "secret".into(),
            currency: "USD".into(),
            max_amount: dec!(1000),
            min_path_length: 3,
            max_path_length: 4,
            min_path_profit_usd: dec!(0.5),
            ws_url: config::DEFAULT_WS_URL.into(),
            metrics_port: 0,
            record_file: None,
            trading_interval_ms: 500,
            solver_budget_ms: 850,
        }
    }

    fn engine() -> (Engine, mpsc::Receiver<Outbound>, watch::Sender<bool>) {
        let (out_tx, out_rx) = mpsc::channel(256);
        let (stop_tx, stop_rx) = watch::channel(false);
        (Engine::new(test_args(), out_tx, None, stop_rx), out_rx, stop_tx)
    }

    fn frame_json(out: Outbound) -> Value {
        match out {
            Outbound::Frame(s) => serde_json::from_str(&s).unwrap(),
            other => panic!("expected frame, got {other:?}"),
        }
    }

    async fn bring_up(e: &mut Engine, rx: &mut mpsc::Receiver<Outbound>) {
        e.handle_session_event(SessionEvent::Connected).await.unwrap();
        let auth = frame_json(rx.recv().await.unwrap());
        assert_eq!(auth["event"], "auth");

        let caps = Caps {
            orders_read: true,
            orders_write: true,
            wallets_read: true,
        };
        e.handle_session_event(SessionEvent::Frame(WsIn::AuthOk { caps }))
            .await
            .unwrap();
        for (i, sym) in config::SYMBOL_UNIVERSE.iter().enumerate() {
            let sub = frame_json(rx.recv().await.unwrap());
            assert_eq!(sub["event"], "subscribe");
            e.handle_session_event(SessionEvent::Frame(WsIn::Subscribed {
                channel: "book".into(),
                symbol: sym.to_string(),
                chan_id: 100 + i as i64,
            }))
            .await
            .unwrap();
        }

        // a fresh wallet so the start amount is known
        e.handle_session_event(SessionEvent::Frame(WsIn::Data {
            chan_id: 0,
            msg: DataMsg::WalletUpdate(Wallet {
                wallet_type: WALLET_TYPE.into(),
                currency: "USD".into(),
                balance: dec!(5000),
                available: Some(dec!(5000)),
            }),
        }))
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn version_mismatch_is_fatal() {
        let (mut e, _rx, _stop) = engine();
        let res = e
            .handle_session_event(SessionEvent::Frame(WsIn::Info {
                version: Some(3),
                code: None,
            }))
            .await;
        assert!(matches!(
            res,
            Err(EngineError::ApiVersion { venue: 3, ours: 2 })
        ));
    }

    #[tokio::test]
    async fn connect_authenticates_then_subscribes() {
        let (mut e, mut rx, _stop) = engine();
        bring_up(&mut e, &mut rx).await;
        assert!(e.authed);
        assert!(e.registry.all_books_ready(&e.required_symbols()));
    }

    #[tokio::test]
    async fn guards_hold_until_fully_ready() {
        let (mut e, mut rx, _stop) = engine();
        assert!(e.maybe_trade().is_none()); // not connected

        bring_up(&mut e, &mut rx).await;
        let solve = e.maybe_trade();
        assert!(solve.is_some());
        assert!(e.trading);

        // no books were fed: solver resolves to no solution, flag released
        let res = solve.unwrap().await;
        e.on_solver_done(res).await;
        assert!(!e.trading);

        // interval gate blocks an immediate retry
        assert!(e.maybe_trade().is_none());
    }

    #[tokio::test]
    async fn maintenance_suppresses_trading_then_resubscribes() {
        let (mut e, mut rx, _stop) = engine();
        bring_up(&mut e, &mut rx).await;

        e.handle_session_event(SessionEvent::Frame(WsIn::Info {
            version: None,
            code: Some(CODE_MAINTENANCE_BEGIN),
        }))
        .await
        .unwrap();
        assert!(e.maintenance);
        assert!(e.maybe_trade().is_none());

        e.handle_session_event(SessionEvent::Frame(WsIn::Info {
            version: None,
            code: Some(CODE_MAINTENANCE_END),
        }))
        .await
        .unwrap();
        assert!(!e.maintenance);
        assert!(!e.authed); // re-auth in flight

        // unsubscribe burst for every confirmed book, then a fresh auth
        let mut unsubs = 0;
        loop {
            let v = frame_json(rx.recv().await.unwrap());
            if v["event"] == "unsubscribe" {
                unsubs += 1;
            } else {
                assert_eq!(v["event"], "auth");
                break;
            }
        }
        assert_eq!(unsubs, config::SYMBOL_UNIVERSE.len());
    }

    #[tokio::test]
    async fn stale_wallet_blocks_attempts_and_queues_calc() {
        let (mut e, mut rx, _stop) = engine();
        bring_up(&mut e, &mut rx).await;

        e.handle_session_event(SessionEvent::Frame(WsIn::Data {
            chan_id: 0,
            msg: DataMsg::WalletUpdate(Wallet {
                wallet_type: WALLET_TYPE.into(),
                currency: "USD".into(),
                balance: dec!(5000),
                available: None,
            }),
        }))
        .await
        .unwrap();

        // the stale update triggered a calc frame
        let calc = frame_json(rx.recv().await.unwrap());
        assert_eq!(calc[1], "calc");
        assert_eq!(calc[3][0][0], "wallet_exchange_USD");
        assert!(e.maybe_trade().is_none());
    }

    #[tokio::test]
    async fn book_frames_route_by_channel_id() {
        let (mut e, mut rx, _stop) = engine();
        bring_up(&mut e, &mut rx).await;

        // chan 100 was bound to the first universe symbol
        let symbol = config::SYMBOL_UNIVERSE[0];
        e.handle_session_event(SessionEvent::Frame(WsIn::Data {
            chan_id: 100,
            msg: DataMsg::BookSnapshot(vec![
                Level {
                    price: dec!(100),
                    count: 1,
                    amount: dec!(2),
                },
                Level {
                    price: dec!(101),
                    count: 1,
                    amount: dec!(-2),
                },
            ]),
        }))
        .await
        .unwrap();
        assert_eq!(e.books.best_bid(symbol), Some((dec!(100), dec!(2))));

        // unknown channel is dropped
        e.handle_session_event(SessionEvent::Frame(WsIn::Data {
            chan_id: 999,
            msg: DataMsg::BookDelta(Level {
                price: dec!(1),
                count: 1,
                amount: dec!(1),
            }),
        }))
        .await
        .unwrap();
    }
}
