//! Connection abstraction.
//!
//! A [`Connection`] is a pair of bounded channels carrying whole
//! [`Message`]s. Protocol code only ever sees this type; the socket lives in
//! a bridge task pair spawned by [`websocket`]. Dropping the connection closes
//! the outbound channel, which makes the writer task close the socket.
//!
//! [`Connection::pair`] wires two connections back to back for in-process
//! tests.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use skylink_proto::Message;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::mpsc,
};
use tokio_tungstenite::{WebSocketStream, tungstenite};
use tracing::debug;

use crate::error::TransportError;

/// Default buffer size for each direction of a connection.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 32;

/// Message-oriented duplex connection.
#[derive(Debug)]
pub struct Connection {
    outbound: mpsc::Sender<Message>,
    inbound: mpsc::Receiver<Message>,
}

impl Connection {
    /// Wrap an existing channel pair.
    pub fn new(outbound: mpsc::Sender<Message>, inbound: mpsc::Receiver<Message>) -> Self {
        Self { outbound, inbound }
    }

    /// Two connections wired to each other.
    ///
    /// What one side sends the other receives. Dropping either side closes
    /// the other's inbound channel.
    pub fn pair(capacity: usize) -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::channel(capacity);
        let (b_tx, b_rx) = mpsc::channel(capacity);
        (Self::new(a_tx, b_rx), Self::new(b_tx, a_rx))
    }

    /// Queue a message for the peer.
    ///
    /// # Errors
    ///
    /// - `TransportError::Closed` if the peer or bridge task is gone
    pub async fn send(&self, message: Message) -> Result<(), TransportError> {
        self.outbound.send(message).await.map_err(|_| TransportError::Closed)
    }

    /// Next message from the peer. `None` once the connection is closed.
    pub async fn recv(&mut self) -> Option<Message> {
        self.inbound.recv().await
    }

    /// A clone of the outbound sender, for delivering from other tasks.
    pub fn sender(&self) -> mpsc::Sender<Message> {
        self.outbound.clone()
    }
}

/// Bridge a WebSocket into a [`Connection`].
///
/// Spawns one reader and one writer task on the current runtime. Text and
/// binary frames map to [`Message::Text`] and [`Message::Binary`]; pings are
/// answered by tungstenite itself and never surface.
pub fn websocket<S>(stream: WebSocketStream<S>, capacity: usize) -> Connection
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sink, mut source) = stream.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Message>(capacity);
    let (inbound_tx, inbound_rx) = mpsc::channel::<Message>(capacity);

    tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let frame = match message {
                Message::Text(text) => tungstenite::Message::Text(text),
                Message::Binary(bytes) => tungstenite::Message::Binary(bytes.to_vec()),
            };

            if let Err(e) = sink.send(frame).await {
                debug!(error = %e, "websocket write failed");
                return;
            }
        }

        // Connection dropped: close the socket cleanly.
        let _ = sink.close().await;
    });

    tokio::spawn(async move {
        while let Some(frame) = source.next().await {
            let message = match frame {
                Ok(tungstenite::Message::Text(text)) => Message::Text(text),
                Ok(tungstenite::Message::Binary(bytes)) => Message::Binary(Bytes::from(bytes)),
                Ok(tungstenite::Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    debug!(error = %e, "websocket read failed");
                    break;
                },
            };

            if inbound_tx.send(message).await.is_err() {
                break;
            }
        }
    });

    Connection::new(outbound_tx, inbound_rx)
}
