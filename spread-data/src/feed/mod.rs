//! Market feed client for `/ws/market`.
//!
//! One process-wide connection reconnects after a fixed delay, indefinitely, and forwards only
//! the messages for the currently selected instrument.

use crate::config::ClientConfig;
use futures::{SinkExt, StreamExt};
use smol_str::SmolStr;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

/// Feed message types.
pub mod message;

/// Idle timeout stream wrapper.
pub mod timeout;

pub use message::{FeedMessage, RealtimeTick};

use timeout::IdleTimeout;

/// Connection status updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    Connected,
    #[default]
    Disconnected,
    Reconnecting,
}

/// Receivers handed out by [`MarketFeed::start`].
#[derive(Debug)]
pub struct FeedReceivers {
    pub messages: mpsc::Receiver<FeedMessage>,
    pub status: watch::Receiver<ConnectionStatus>,
}

#[derive(Debug)]
pub struct MarketFeed {
    config: ClientConfig,
    selection: watch::Sender<Option<SmolStr>>,
}

impl MarketFeed {
    pub fn new(config: ClientConfig) -> Self {
        let (selection, _) = watch::channel(None);
        Self { config, selection }
    }

    /// Select the instrument whose messages are forwarded. `None` drops everything.
    pub fn select(&self, symbol: Option<SmolStr>) {
        debug!(symbol = ?symbol, "feed selection changed");
        self.selection.send_replace(symbol);
    }

    pub fn selected(&self) -> Option<SmolStr> {
        self.selection.borrow().clone()
    }

    /// Spawn the connection loop. It runs until the message receiver is dropped.
    pub fn start(&self) -> FeedReceivers {
        let (message_tx, messages) = mpsc::channel(self.config.channel_buffer_size);
        let (status_tx, status) = watch::channel(ConnectionStatus::Disconnected);

        tokio::spawn(run_feed_loop(
            self.config.clone(),
            self.selection.subscribe(),
            message_tx,
            status_tx,
        ));

        FeedReceivers { messages, status }
    }
}

fn is_selected(message: &FeedMessage, selected: Option<&str>) -> bool {
    selected.is_some_and(|symbol| message.symbol() == symbol)
}

/// Connection loop with fixed-delay reconnect
async fn run_feed_loop(
    config: ClientConfig,
    selection: watch::Receiver<Option<SmolStr>>,
    message_tx: mpsc::Sender<FeedMessage>,
    status_tx: watch::Sender<ConnectionStatus>,
) {
    info!(url = %config.ws_url, "starting market feed");

    loop {
        status_tx.send_replace(ConnectionStatus::Reconnecting);

        match connect_async(config.ws_url.as_str()).await {
            Ok((socket, _)) => {
                info!(url = %config.ws_url, "market feed connected");
                status_tx.send_replace(ConnectionStatus::Connected);

                let (mut write, read) = socket.split();

                let ping_interval = config.ping_interval;
                let (ping_shutdown_tx, mut ping_shutdown_rx) = oneshot::channel::<()>();
                tokio::spawn(async move {
                    let mut interval = tokio::time::interval(ping_interval);
                    loop {
                        tokio::select! {
                            _ = interval.tick() => {
                                if write.send(Message::Ping(vec![].into())).await.is_err() {
                                    debug!("failed to send ping, connection likely dead");
                                    break;
                                }
                            }
                            _ = &mut ping_shutdown_rx => break,
                        }
                    }
                });

                let mut read = IdleTimeout::new(read, config.read_timeout);
                while let Some(frame) = read.next().await {
                    match frame {
                        Ok(Message::Text(text)) => {
                            let Some(message) = FeedMessage::parse(&text) else {
                                debug!(raw = %text.as_str(), "dropping unparseable feed message");
                                continue;
                            };

                            let keep = is_selected(&message, selection.borrow().as_deref());
                            if !keep {
                                continue;
                            }

                            if message_tx.send(message).await.is_err() {
                                info!("feed receiver dropped, stopping market feed");
                                let _ = ping_shutdown_tx.send(());
                                status_tx.send_replace(ConnectionStatus::Disconnected);
                                return;
                            }
                        }
                        Ok(Message::Close(frame)) => {
                            info!(?frame, "market feed closed by server");
                            break;
                        }
                        Ok(_) => {}
                        Err(error) => {
                            error!(%error, "market feed error");
                            break;
                        }
                    }
                }

                let _ = ping_shutdown_tx.send(());
                status_tx.send_replace(ConnectionStatus::Disconnected);
                warn!(idle_timeout = read.expired(), "market feed disconnected");
            }
            Err(error) => {
                error!(url = %config.ws_url, %error, "failed to connect market feed");
                status_tx.send_replace(ConnectionStatus::Disconnected);
            }
        }

        if message_tx.is_closed() {
            info!("feed receiver dropped, stopping market feed");
            return;
        }

        debug!(delay = ?config.reconnect_delay, "waiting before reconnecting market feed");
        tokio::time::sleep(config.reconnect_delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;

    #[test]
    fn test_is_selected() {
        struct TestCase {
            selected: Option<&'static str>,
            expected: bool,
        }

        let message = FeedMessage::parse(r#"{"type":"realtime","symbol":"BTC-USDT","price":1}"#)
            .unwrap();

        let tests = vec![
            // TC0: matching symbol
            TestCase {
                selected: Some("BTC-USDT"),
                expected: true,
            },
            // TC1: other symbol
            TestCase {
                selected: Some("ETH-USDT"),
                expected: false,
            },
            // TC2: nothing selected
            TestCase {
                selected: None,
                expected: false,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(is_selected(&message, test.selected), test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_market_feed_selection() {
        let feed = MarketFeed::new(ClientConfig::default());
        assert_eq!(feed.selected(), None);

        feed.select(Some(SmolStr::new("BTC-USDT")));
        assert_eq!(feed.selected().as_deref(), Some("BTC-USDT"));
    }

    #[tokio::test]
    async fn test_market_feed_forwards_selected_symbol_and_reconnects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            for round in 0..2 {
                let (stream, _) = listener.accept().await.unwrap();
                let mut socket = tokio_tungstenite::accept_async(stream).await.unwrap();
                for text in [
                    r#"{"type":"welcome"}"#.to_string(),
                    format!(r#"{{"type":"realtime","symbol":"ETH-USDT","price":{round}}}"#),
                    format!(r#"{{"type":"realtime","symbol":"BTC-USDT","price":{round}}}"#),
                ] {
                    socket.send(Message::text(text)).await.unwrap();
                }
                socket.close(None).await.unwrap();
            }
        });

        let config = ClientConfig::new("http://unused/api", format!("ws://{addr}/ws/market"))
            .with_reconnect_delay(Duration::from_millis(20));
        let feed = MarketFeed::new(config);
        feed.select(Some(SmolStr::new("BTC-USDT")));

        let FeedReceivers { mut messages, .. } = feed.start();

        for round in 0..2 {
            let message = tokio::time::timeout(Duration::from_secs(5), messages.recv())
                .await
                .unwrap()
                .unwrap();

            assert_eq!(
                message,
                FeedMessage::Realtime(RealtimeTick {
                    symbol: SmolStr::new("BTC-USDT"),
                    price: Some(round as f64),
                    timestamp: None,
                })
            );
        }
    }
}
