// Binance combined-stream transport: one socket, ticker + trade channels
// for every configured instrument, fixed-interval capped reconnect.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use itertools::Itertools;
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use super::binance_types::StreamKind;
use super::FrameSource;
use crate::market_data::error::TransportError;
use crate::market_data::instruments::InstrumentSet;
use crate::market_data::types::ConnectionStatus;

pub const BINANCE_WS_BASE: &str = "wss://stream.binance.com:9443";

// How long disconnect waits for the close handshake before aborting the task.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Reconnect policy: up to `retries` attempts after a failure, each
/// `delay` apart. No backoff growth. The attempt budget resets once a
/// connection opens.
///
/// A server that completes the handshake and then drops straight away
/// never exhausts the budget: it is retried every `delay` indefinitely.
#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub base_url: String,
    pub reconnect_retries: u32,
    pub reconnect_delay: Duration,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            base_url: BINANCE_WS_BASE.into(),
            reconnect_retries: 3,
            reconnect_delay: Duration::from_secs(1),
        }
    }
}

/// `<base>/stream?streams=a@ticker/b@ticker/.../a@trade/b@trade`
pub fn combined_stream_url(base_url: &str, instruments: &InstrumentSet) -> String {
    let streams = StreamKind::ALL
        .iter()
        .flat_map(|kind| instruments.ids().map(move |id| format!("{}{}", id, kind.suffix())))
        .join("/");
    format!("{}/stream?streams={}", base_url.trim_end_matches('/'), streams)
}

pub fn stream_url(base_url: &str, instruments: &InstrumentSet, kind: StreamKind) -> String {
    let streams = instruments.ids().map(|id| format!("{}{}", id, kind.suffix())).join("/");
    format!("{}/stream?streams={}", base_url.trim_end_matches('/'), streams)
}

struct Session {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

pub struct BinanceAdapter {
    url: String,
    settings: TransportSettings,
    frames: mpsc::Sender<String>,
    status_tx: watch::Sender<ConnectionStatus>,
    session: Mutex<Option<Session>>,
}

impl BinanceAdapter {
    /// Nothing is opened until `connect` is called.
    pub fn new(settings: TransportSettings, instruments: &InstrumentSet, frames: mpsc::Sender<String>) -> Self {
        let url = combined_stream_url(&settings.base_url, instruments);
        let (status_tx, _) = watch::channel(ConnectionStatus::Closed);
        Self { url, settings, frames, status_tx, session: Mutex::new(None) }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl FrameSource for BinanceAdapter {
    async fn connect(&self) {
        let mut session = self.session.lock();
        if let Some(active) = session.as_ref() {
            // a session that reported Error is on its way out
            if !active.handle.is_finished() && self.status() != ConnectionStatus::Error {
                debug!(status = %self.status(), "connect ignored, session already running");
                return;
            }
        }

        info!(url = %self.url, "opening market data stream");
        self.status_tx.send_replace(ConnectionStatus::Connecting);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(run_session(
            self.url.clone(),
            self.settings.clone(),
            self.frames.clone(),
            self.status_tx.clone(),
            shutdown_rx,
        ));
        *session = Some(Session { shutdown: shutdown_tx, handle });
    }

    async fn disconnect(&self) {
        let Some(Session { shutdown, mut handle }) = self.session.lock().take() else {
            debug!("disconnect ignored, no session");
            return;
        };

        if !handle.is_finished() {
            self.status_tx.send_replace(ConnectionStatus::Closing);
            let _ = shutdown.send(());
            if tokio::time::timeout(CLOSE_GRACE, &mut handle).await.is_err() {
                warn!("close handshake timed out, aborting session");
                handle.abort();
            }
        }
        self.status_tx.send_replace(ConnectionStatus::Closed);
        metrics::gauge!("tickerwatch_connected").set(0.0);
        info!("market data stream closed");
    }

    fn status(&self) -> ConnectionStatus {
        *self.status_tx.borrow()
    }

    fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }
}

// Session loop. Returns on shutdown, when the frame consumer goes away, or
// once the retry budget is spent.
async fn run_session(
    url: String,
    settings: TransportSettings,
    frames: mpsc::Sender<String>,
    status: watch::Sender<ConnectionStatus>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut failures: u32 = 0;
    loop {
        status.send_replace(ConnectionStatus::Connecting);
        let connected = tokio::select! {
            _ = &mut shutdown => return,
            res = tokio_tungstenite::connect_async(url.as_str()) => res,
        };

        let err = match connected {
            Ok((ws, response)) => {
                info!(http_status = %response.status(), "websocket open");
                status.send_replace(ConnectionStatus::Open);
                metrics::gauge!("tickerwatch_connected").set(1.0);
                failures = 0;

                match pump(ws, &frames, &mut shutdown).await {
                    Ok(()) => {
                        if frames.is_closed() {
                            status.send_replace(ConnectionStatus::Closed);
                        }
                        return;
                    }
                    Err(e) => e,
                }
            }
            Err(e) => TransportError::Connect(e),
        };

        metrics::gauge!("tickerwatch_connected").set(0.0);
        failures += 1;
        if failures > settings.reconnect_retries {
            let err = TransportError::RetriesExhausted { attempts: settings.reconnect_retries };
            error!(error = %err, "market data stream failed");
            status.send_replace(ConnectionStatus::Error);
            return;
        }

        warn!(
            error = %err,
            attempt = failures,
            max_attempts = settings.reconnect_retries,
            delay_ms = settings.reconnect_delay.as_millis() as u64,
            "websocket lost, reconnecting"
        );
        metrics::counter!("tickerwatch_reconnects_total").increment(1);
        status.send_replace(ConnectionStatus::Closed);
        tokio::select! {
            _ = &mut shutdown => return,
            _ = tokio::time::sleep(settings.reconnect_delay) => {}
        }
    }
}

// Forward text frames until shutdown (Ok) or the socket dies (Err).
async fn pump(
    mut ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    frames: &mpsc::Sender<String>,
    shutdown: &mut oneshot::Receiver<()>,
) -> Result<(), TransportError> {
    loop {
        tokio::select! {
            _ = &mut *shutdown => {
                let _ = ws.close(None).await;
                return Ok(());
            }
            msg = ws.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    metrics::counter!("tickerwatch_frames_received_total").increment(1);
                    if frames.send(text).await.is_err() {
                        debug!("frame consumer dropped, closing socket");
                        let _ = ws.close(None).await;
                        return Ok(());
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "server sent close");
                    return Err(TransportError::ClosedByServer);
                }
                Some(Ok(_)) => {} // ping is answered by tungstenite itself
                Some(Err(e)) => return Err(TransportError::Stream(e)),
                None => return Err(TransportError::ClosedByServer),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::instruments::InstrumentDescriptor;

    fn two_pairs() -> InstrumentSet {
        InstrumentSet::new(vec![
            InstrumentDescriptor::new("BTCUSDT", "BTC", "USDT"),
            InstrumentDescriptor::new("ethusdt", "ETH", "USDT"),
        ])
        .unwrap()
    }

    #[test]
    fn test_combined_url_lists_tickers_then_trades() {
        let url = combined_stream_url("wss://stream.binance.com:9443/", &two_pairs());
        assert_eq!(
            url,
            "wss://stream.binance.com:9443/stream?streams=btcusdt@ticker/ethusdt@ticker/btcusdt@trade/ethusdt@trade"
        );
    }

    #[test]
    fn test_single_kind_url() {
        let url = stream_url("ws://localhost:1", &two_pairs(), StreamKind::Trade);
        assert_eq!(url, "ws://localhost:1/stream?streams=btcusdt@trade/ethusdt@trade");
    }

    #[tokio::test]
    async fn test_new_does_not_connect() {
        let (tx, _rx) = mpsc::channel(8);
        let adapter = BinanceAdapter::new(TransportSettings::default(), &two_pairs(), tx);
        assert_eq!(adapter.status(), ConnectionStatus::Closed);
        assert!(adapter.session.lock().is_none());
    }

    #[tokio::test]
    async fn test_disconnect_when_closed_is_noop() {
        let (tx, _rx) = mpsc::channel(8);
        let adapter = BinanceAdapter::new(TransportSettings::default(), &two_pairs(), tx);
        adapter.disconnect().await;
        adapter.disconnect().await;
        assert_eq!(adapter.status(), ConnectionStatus::Closed);
    }
}
