use super::decoder::RawFrame;
use crate::clock::Clock;
use crate::config;
use crate::error::{DriftError, Result};
use crate::models::InstrumentKey;
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_retry::Retry;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnderlyingExpiry {
    pub underlying: u64,
    pub expiry: String,
}

/// Subscription request sent right after the socket opens
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeMessage {
    pub msg_command: String,
    pub data_source: String,
    pub broker_id: u32,
    pub tokens: Vec<u64>,
    pub underlying_expiry: Vec<UnderlyingExpiry>,
    pub unique_id: String,
}

impl SubscribeMessage {
    pub fn option_chain(instruments: &[InstrumentKey]) -> Self {
        Self {
            msg_command: "subscribe".to_string(),
            data_source: config::SUBSCRIBE_DATA_SOURCE.to_string(),
            broker_id: config::SUBSCRIBE_BROKER_ID,
            tokens: Vec::new(),
            underlying_expiry: instruments
                .iter()
                .map(|k| UnderlyingExpiry {
                    underlying: k.underlying_token,
                    expiry: k.expiry.format("%Y-%m-%d").to_string(),
                })
                .collect(),
            unique_id: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FeedStats {
    pub frames_received: u64,
    pub reconnects: u32,
    pub last_frame_at: Option<DateTime<Utc>>,
}

enum StreamEnd {
    Stopped,
    ReceiverGone,
    Disconnected(String),
}

/// Websocket option-chain feed.
///
/// Forwards every data frame, untouched, into the processing channel. Decoding
/// happens on the consumer side.
pub struct OptionChainFeed {
    url: String,
    subscription: SubscribeMessage,
    clock: Arc<dyn Clock>,
    tx: mpsc::Sender<RawFrame>,
    stats: FeedStats,
    should_stop: Arc<AtomicBool>,
}

impl OptionChainFeed {
    pub fn new(
        url: impl Into<String>,
        instruments: &[InstrumentKey],
        clock: Arc<dyn Clock>,
        tx: mpsc::Sender<RawFrame>,
    ) -> Self {
        Self {
            url: url.into(),
            subscription: SubscribeMessage::option_chain(instruments),
            clock,
            tx,
            stats: FeedStats::default(),
            should_stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.should_stop.clone()
    }

    pub fn stats(&self) -> &FeedStats {
        &self.stats
    }

    /// Stream until stopped, the consumer goes away, or reconnects run out
    pub async fn run(&mut self) -> Result<()> {
        loop {
            if self.should_stop.load(Ordering::SeqCst) {
                info!("Option chain feed stopping on request");
                return Ok(());
            }

            let ws = self.connect_with_retry().await?;

            match self.stream(ws).await? {
                StreamEnd::Stopped => {
                    info!("Option chain feed stopping on request");
                    return Ok(());
                }
                StreamEnd::ReceiverGone => {
                    info!("Frame consumer closed, feed exiting");
                    return Ok(());
                }
                StreamEnd::Disconnected(reason) => {
                    self.stats.reconnects += 1;
                    warn!(reason = %reason, reconnects = self.stats.reconnects, "Feed disconnected, reconnecting");
                }
            }
        }
    }

    async fn connect_with_retry(&self) -> Result<WsStream> {
        let backoff = ExponentialBackoff::from_millis(config::RECONNECT_BASE_DELAY_MS)
            .factor(config::RECONNECT_FACTOR)
            .max_delay(Duration::from_secs(config::RECONNECT_MAX_DELAY_SECS))
            .take(config::RECONNECT_MAX_ATTEMPTS);

        let feed = self;
        Retry::spawn(backoff, move || async move {
            let result = feed.connect_once().await;
            if let Err(e) = &result {
                warn!(url = %feed.url, error = %e, "Feed connect failed");
            }
            result
        })
        .await
    }

    async fn connect_once(&self) -> Result<WsStream> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| DriftError::Transport(format!("Bad feed URL: {}", e)))?;
        request
            .headers_mut()
            .insert("Origin", HeaderValue::from_static(config::FEED_ORIGIN));

        let (mut ws, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| DriftError::Transport(e.to_string()))?;

        let subscribe = serde_json::to_string(&self.subscription)?;
        ws.send(Message::Text(subscribe))
            .await
            .map_err(|e| DriftError::Transport(format!("Subscribe failed: {}", e)))?;

        info!(
            url = %self.url,
            instruments = self.subscription.underlying_expiry.len(),
            "Connected and subscribed to option chain"
        );
        Ok(ws)
    }

    async fn stream(&mut self, mut ws: WsStream) -> Result<StreamEnd> {
        while let Some(msg) = ws.next().await {
            if self.should_stop.load(Ordering::SeqCst) {
                let _ = ws.close(None).await;
                return Ok(StreamEnd::Stopped);
            }

            let bytes = match msg {
                Ok(Message::Text(text)) => text.into_bytes(),
                Ok(Message::Binary(data)) => data,
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    debug!("Feed keepalive");
                    continue;
                }
                Ok(Message::Close(frame)) => {
                    let reason = frame
                        .map(|f| f.reason.to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    return Ok(StreamEnd::Disconnected(format!("closed by server: {}", reason)));
                }
                Ok(Message::Frame(_)) => continue,
                Err(e) => {
                    error!(error = %e, "Feed read error");
                    return Ok(StreamEnd::Disconnected(e.to_string()));
                }
            };

            let received_at = self.clock.now();
            self.stats.frames_received += 1;
            self.stats.last_frame_at = Some(received_at);

            if self.tx.send(RawFrame::new(bytes, received_at)).await.is_err() {
                return Ok(StreamEnd::ReceiverGone);
            }
        }

        Ok(StreamEnd::Disconnected("stream ended".to_string()))
    }
}
