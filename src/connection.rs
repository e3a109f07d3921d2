// ABOUTME: WebSocket transport: connect-with-timeout, the reader task, and reconnect policy
// ABOUTME: The socket itself is owned here; all sends funnel through `Connection::send`

use crate::error::Error;
use crate::protocol::{self, BinaryFrame, Message};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const GOODBYE_FLUSH_WAIT: Duration = Duration::from_millis(100);

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;

/// One event the reader task hands up to the session state machine.
#[derive(Debug)]
pub enum ConnectionEvent {
    Text(Message),
    Binary(BinaryFrame),
    /// The socket closed, expectedly or not; carries the close reason if any.
    Closed(Option<String>),
}

/// A live WebSocket connection: a serialized send half plus the reader
/// task's event channel. Cloning shares the same underlying socket, so all
/// sends are serialized through the same mutex (no interleaved JSON frames).
#[derive(Clone)]
pub struct Connection {
    tx: Arc<Mutex<WsSink>>,
}

impl Connection {
    /// Open a WebSocket to `ws://{addr}/sendspin`, bounded by the connect
    /// timeout. On timeout the in-flight connect future is simply dropped;
    /// since it never reached an Open socket there is nothing to close.
    pub async fn connect(
        addr: SocketAddr,
    ) -> Result<(Self, UnboundedReceiver<ConnectionEvent>), Error> {
        let url = format!("ws://{addr}/sendspin");
        let connected = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(&url))
            .await
            .map_err(|_| Error::ConnectTimeout)?;
        let (ws_stream, _response) = connected.map_err(Error::from)?;

        let (write, read) = ws_stream.split();
        let tx = Arc::new(Mutex::new(write));

        let (event_tx, event_rx) = unbounded_channel();
        tokio::spawn(reader_task(read, event_tx));

        Ok((Self { tx }, event_rx))
    }

    /// Serialize one outbound protocol message as JSON text.
    pub async fn send(&self, message: &Message) -> Result<(), Error> {
        let text = protocol::encode_text(message)?;
        let mut tx = self.tx.lock().await;
        tx.send(WsMessage::Text(text.into())).await.map_err(Error::from)
    }

    /// Send `client/goodbye`, then wait briefly for it to flush before the
    /// caller closes the socket. Best-effort: a failure here just means the
    /// peer never saw the goodbye, which is not fatal to shutdown.
    pub async fn send_goodbye(&self, message: &Message) {
        if let Err(e) = self.send(message).await {
            log::warn!("failed to send goodbye: {e}");
            return;
        }
        tokio::time::sleep(GOODBYE_FLUSH_WAIT).await;
    }

    /// Close the socket with the normal close code.
    pub async fn close(&self) {
        let mut tx = self.tx.lock().await;
        let _ = tx.close().await;
    }
}

async fn reader_task(
    mut read: futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>,
    event_tx: UnboundedSender<ConnectionEvent>,
) {
    while let Some(frame) = read.next().await {
        let event = match frame {
            Ok(WsMessage::Text(text)) => match protocol::decode_text(&text) {
                Ok(message) => ConnectionEvent::Text(message),
                Err(e) => {
                    log::warn!("dropping unparseable text frame: {e}");
                    continue;
                }
            },
            Ok(WsMessage::Binary(data)) => match protocol::decode_binary(&data) {
                Ok(frame) => ConnectionEvent::Binary(frame),
                Err(e) => {
                    log::warn!("dropping malformed binary frame: {e}");
                    continue;
                }
            },
            Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) => continue,
            Ok(WsMessage::Close(frame)) => {
                ConnectionEvent::Closed(frame.map(|f| f.reason.to_string()))
            }
            Ok(WsMessage::Frame(_)) => continue,
            Err(e) => ConnectionEvent::Closed(Some(e.to_string())),
        };

        let is_closed = matches!(event, ConnectionEvent::Closed(_));
        if event_tx.send(event).is_err() {
            return;
        }
        if is_closed {
            return;
        }
    }
    let _ = event_tx.send(ConnectionEvent::Closed(None));
}

/// Where the current server address came from, for the reconnect policy's
/// "rerun discovery vs. reuse sticky address" rule.
#[derive(Debug, Clone, Copy)]
pub enum ServerAddress {
    Configured(SocketAddr),
    Discovered(SocketAddr),
}

impl ServerAddress {
    pub fn socket_addr(&self) -> SocketAddr {
        match self {
            ServerAddress::Configured(a) | ServerAddress::Discovered(a) => *a,
        }
    }
}

/// Exponential backoff with an unbounded attempt count, capped at 30s.
#[derive(Debug, Default)]
pub struct ReconnectPolicy {
    attempt: u32,
}

impl ReconnectPolicy {
    pub fn new() -> Self {
        Self { attempt: 0 }
    }

    /// Delay for the next attempt, and bumps the attempt counter.
    pub fn next_delay(&mut self) -> Duration {
        self.attempt += 1;
        let ms = 1000u64.saturating_mul(1u64 << (self.attempt - 1).min(31));
        Duration::from_millis(ms.min(30_000))
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconnect_delay_doubles_and_caps_at_30s() {
        let mut policy = ReconnectPolicy::new();
        assert_eq!(policy.next_delay(), Duration::from_millis(1000));
        assert_eq!(policy.next_delay(), Duration::from_millis(2000));
        assert_eq!(policy.next_delay(), Duration::from_millis(4000));
        for _ in 0..10 {
            policy.next_delay();
        }
        assert_eq!(policy.next_delay(), Duration::from_millis(30_000));
    }

    #[test]
    fn reset_restarts_the_sequence() {
        let mut policy = ReconnectPolicy::new();
        policy.next_delay();
        policy.next_delay();
        policy.reset();
        assert_eq!(policy.next_delay(), Duration::from_millis(1000));
    }

    #[test]
    fn server_address_unwraps_to_its_socket_addr() {
        let addr: SocketAddr = "127.0.0.1:8927".parse().unwrap();
        assert_eq!(ServerAddress::Configured(addr).socket_addr(), addr);
        assert_eq!(ServerAddress::Discovered(addr).socket_addr(), addr);
    }
}
