//! TCP client for connecting to a room server
//!
//! Sends token-signed events and exposes the inbound event stream. Used by
//! tooling and the integration tests; the server never depends on it.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use serde_json::Value;

use tearoom_core::event::{ClientEvent, ClientFrame, ServerEvent};

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};

/// Client handle for one connection.
pub struct Client {
    token: String,
    writer: OwnedWriteHalf,
    event_rx: mpsc::UnboundedReceiver<ServerEvent>,
    reader_handle: JoinHandle<()>,
}

impl Client {
    /// Connect, remembering the token that will sign every event.
    pub async fn connect(addr: SocketAddr, token: impl Into<String>) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let (reader, writer) = stream.into_split();

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let reader_handle = tokio::spawn(read_loop(reader, event_tx));

        Ok(Client {
            token: token.into(),
            writer,
            event_rx,
            reader_handle,
        })
    }

    /// Send one signed event.
    pub async fn send(&mut self, event: ClientEvent) -> Result<()> {
        let frame = ClientFrame::new(self.token.clone(), event);
        let bytes = frame
            .to_bytes()
            .map_err(|e| Error::Protocol(format!("Encoding failed: {}", e)))?;
        write_frame(&mut self.writer, &bytes).await
    }

    /// Join a room with no profile payload.
    pub async fn join(&mut self, room: &str) -> Result<()> {
        self.send(ClientEvent::Join {
            room: room.to_string(),
            info: Value::Null,
        })
        .await
    }

    /// Send the raw keep-alive ping.
    pub async fn heartbeat(&mut self) -> Result<()> {
        write_frame(&mut self.writer, b"heartbeat").await
    }

    /// Next inbound event; `None` once the connection is gone.
    pub async fn next_event(&mut self) -> Option<ServerEvent> {
        self.event_rx.recv().await
    }

    /// Next inbound event, bounded by a deadline.
    pub async fn expect_event(&mut self, deadline: Duration) -> Result<ServerEvent> {
        match tokio::time::timeout(deadline, self.event_rx.recv()).await {
            Ok(Some(event)) => Ok(event),
            Ok(None) => Err(Error::ConnectionClosed),
            Err(_) => Err(Error::Timeout),
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.reader_handle.abort();
    }
}

async fn read_loop(mut reader: OwnedReadHalf, event_tx: mpsc::UnboundedSender<ServerEvent>) {
    loop {
        match read_frame(&mut reader).await {
            Ok(payload) => match ServerEvent::from_bytes(&payload) {
                Ok(event) => {
                    if event_tx.send(event).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!(error = %e, "Dropping unreadable event");
                }
            },
            Err(_) => break,
        }
    }
}
