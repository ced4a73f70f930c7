// ===============================
// src/session.rs
// ===============================
//
// Owns the websocket. Inbound text frames are decoded and forwarded to the
// engine task; outbound frames arrive over a channel and are written to the
// sink in order. On any read/write error the socket is dropped and the
// supervisory reconnect cadence (2.5 s, small jitter) kicks in; the engine
// re-authenticates and resubscribes when it sees `Connected` again.

use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{error, info, warn};
use url::Url;

use crate::bitfinex::{self, WsIn};
use crate::metrics::WS_RECONNECTS;

pub const RECONNECT_INTERVAL_MS: u64 = 2_500;

#[derive(Debug)]
pub enum SessionEvent {
    Connected,
    Disconnected,
    Frame(WsIn),
}

#[derive(Debug)]
pub enum Outbound {
    Frame(String),
    /// Drop the socket and reconnect (venue restart notice).
    Reconnect,
    Shutdown,
}

pub async fn run(
    ws_url: String,
    ev_tx: mpsc::Sender<SessionEvent>,
    mut out_rx: mpsc::Receiver<Outbound>,
) {
    let mut first = true;
    loop {
        if !first {
            let jitter = rand::thread_rng().gen_range(0..=250);
            sleep(Duration::from_millis(RECONNECT_INTERVAL_MS + jitter)).await;
            WS_RECONNECTS.inc();
        }
        first = false;

        let url = match Url::parse(&ws_url) {
            Ok(u) => u,
            Err(e) => {
                error!(?e, %ws_url, "bad ws url");
                return;
            }
        };

        info!(%ws_url, "connecting");
        let mut ws = match connect_async(url).await {
            Ok((ws, _resp)) => ws,
            Err(e) => {
                error!(?e, "connect failed");
                continue;
            }
        };
        if ev_tx.send(SessionEvent::Connected).await.is_err() {
            return;
        }

        let mut shutdown = false;
        loop {
            tokio::select! {
                cmd = out_rx.recv() => match cmd {
                    Some(Outbound::Frame(txt)) => {
                        if let Err(e) = ws.send(Message::Text(txt)).await {
                            error!(?e, "ws send error");
                            break;
                        }
                    }
                    Some(Outbound::Reconnect) => {
                        info!("dropping socket on venue request");
                        let _ = ws.close(None).await;
                        break;
                    }
                    Some(Outbound::Shutdown) | None => {
                        shutdown = true;
                        let _ = ws.close(None).await;
                        break;
                    }
                },
                frame = ws.next() => match frame {
                    Some(Ok(m)) if m.is_text() => {
                        let txt = match m.into_text() {
                            Ok(t) => t,
                            Err(e) => {
                                warn!(?e, "failed to read text frame");
                                continue;
                            }
                        };
                        match bitfinex::parse_frame(&txt) {
                            Some(ev) => {
                                if ev_tx.send(SessionEvent::Frame(ev)).await.is_err() {
                                    return;
                                }
                            }
                            None => warn!(frame = %txt, "dropping unrecognized frame"),
                        }
                    }
                    Some(Ok(_)) => {
                        // ignore non-text frames
                    }
                    Some(Err(e)) => {
                        error!(?e, "ws read error");
                        break;
                    }
                    None => {
                        warn!("stream closed by venue");
                        break;
                    }
                }
            }
        }

        if ev_tx.send(SessionEvent::Disconnected).await.is_err() || shutdown {
            return;
        }
        info!("disconnected, will reconnect");
    }
}
