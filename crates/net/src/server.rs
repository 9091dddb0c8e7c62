//! TCP server for hosting rooms
//!
//! Clients connect, prove who they are with a signed token, and exchange
//! room events. Each connection runs its own read loop plus a writer task;
//! room state lives behind the registry.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::WriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use tearoom_core::event::{ClientEvent, ClientFrame, ErrorKind, ServerEvent};

use crate::auth::TokenVerifier;
use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::registry::RoomRegistry;
use crate::room::{EventSender, Room};

/// Delay between a destroy announcement and the room actually going away.
const DESTROY_GRACE: Duration = Duration::from_secs(10);

/// State shared by every connection task.
struct ServerShared {
    registry: Arc<RoomRegistry>,
    verifier: TokenVerifier,
}

/// Room server handle
pub struct Server {
    addr: SocketAddr,
    registry: Arc<RoomRegistry>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Start a new server on the given port
    pub async fn start(port: u16, verifier: TokenVerifier) -> Result<Self> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await?;
        let bound_addr = listener.local_addr()?;

        info!(addr = %bound_addr, "Server started");

        let (shutdown_tx, _) = broadcast::channel(1);
        let registry = Arc::new(RoomRegistry::new());
        let shared = Arc::new(ServerShared {
            registry: Arc::clone(&registry),
            verifier,
        });

        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(accept_loop(listener, shared, shutdown_rx));

        Ok(Server {
            addr: bound_addr,
            registry,
            shutdown_tx,
        })
    }

    /// Get the server's bound address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Number of rooms currently alive
    pub async fn room_count(&self) -> usize {
        self.registry.room_count().await
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        info!("Server shutdown initiated");
    }
}

/// Accept incoming connections
async fn accept_loop(
    listener: TcpListener,
    shared: Arc<ServerShared>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        debug!(addr = %addr, "New connection");
                        let shared = Arc::clone(&shared);
                        tokio::spawn(handle_connection(stream, addr, shared));
                    }
                    Err(e) => {
                        error!(error = %e, "Accept failed");
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Accept loop shutting down");
                break;
            }
        }
    }
}

/// Handle a single client connection
async fn handle_connection(stream: TcpStream, addr: SocketAddr, shared: Arc<ServerShared>) {
    let (mut reader, writer) = tokio::io::split(stream);
    let conn_id = Uuid::new_v4();

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let writer_handle = tokio::spawn(writer_task(writer, event_rx));

    // The room this connection last joined (or tried to). Membership is a
    // separate, username-keyed notion inside the room itself.
    let mut session: Option<Arc<Room>> = None;

    loop {
        match read_frame(&mut reader).await {
            Ok(payload) => {
                handle_payload(&payload, conn_id, &event_tx, &mut session, &shared).await;
            }
            Err(Error::ConnectionClosed) => {
                debug!(conn = %conn_id, "Connection closed");
                break;
            }
            Err(e) => {
                warn!(conn = %conn_id, addr = %addr, error = %e, "Read error");
                break;
            }
        }
    }

    // A dropped connection is not a leave: membership stays so the member
    // keeps counting toward quorums until an explicit leave.
    if let Some(room) = session {
        room.detach(conn_id).await;
    }
    writer_handle.abort();
}

/// Writer task - sends events to the client
async fn writer_task(
    mut writer: WriteHalf<TcpStream>,
    mut rx: mpsc::UnboundedReceiver<ServerEvent>,
) {
    while let Some(event) = rx.recv().await {
        let bytes = match event.to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(error = %e, "Dropping unencodable event");
                continue;
            }
        };
        if let Err(e) = write_frame(&mut writer, &bytes).await {
            debug!(error = %e, "Write failed");
            break;
        }
    }
}

/// Decode one inbound frame and act on it. Anything malformed is logged
/// and dropped; the connection lives on.
async fn handle_payload(
    payload: &[u8],
    conn_id: Uuid,
    tx: &EventSender,
    session: &mut Option<Arc<Room>>,
    shared: &Arc<ServerShared>,
) {
    // Keep-alives are raw bytes, checked before any JSON decoding.
    if payload == b"heartbeat" {
        let _ = tx.send(ServerEvent::Heartbeat);
        return;
    }

    let frame = match ClientFrame::from_bytes(payload) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(conn = %conn_id, error = %e, "Dropping malformed event");
            return;
        }
    };

    // Identity comes from the verified claims, never from the event body.
    let username = match shared.verifier.verify(&frame.token) {
        Ok(username) => username,
        Err(e) => {
            debug!(conn = %conn_id, error = %e, "Token verification failed");
            let _ = tx.send(ServerEvent::Error {
                error: ErrorKind::Verification,
            });
            return;
        }
    };

    dispatch_event(frame.event, &username, conn_id, tx, session, shared).await;
}

async fn dispatch_event(
    event: ClientEvent,
    username: &str,
    conn_id: Uuid,
    tx: &EventSender,
    session: &mut Option<Arc<Room>>,
    shared: &Arc<ServerShared>,
) {
    match event {
        ClientEvent::Join { room: name, info } => {
            let room = shared.registry.get_or_create(&name, username).await;
            // One room per connection: switching rooms drops the old handle.
            if let Some(previous) = session.take() {
                if !Arc::ptr_eq(&previous, &room) {
                    previous.detach(conn_id).await;
                }
            }
            if room.join(conn_id, tx.clone(), username, info).await {
                info!(room = %name, username = %username, "Member joined");
            } else {
                debug!(room = %name, username = %username, "Join rejected, room full");
                let _ = tx.send(ServerEvent::Error {
                    error: ErrorKind::Filled,
                });
            }
            *session = Some(room);
        }
        ClientEvent::Message { body } => {
            if let Some(room) = session {
                room.relay_message(username, body).await;
            }
        }
        ClientEvent::SetCapacity { capacity } => {
            if let Some(room) = session {
                room.set_capacity(username, capacity).await;
            }
        }
        ClientEvent::PutBallotBox {
            title,
            choices,
            notify_votes,
            anonymous,
            timer,
        } => {
            if let Some(room) = session {
                room.put_ballot(username, title, choices, notify_votes, anonymous, timer)
                    .await;
            }
        }
        ClientEvent::UpdateBallotBox { id, vote } => {
            if let Some(room) = session {
                room.cast_vote(username, &id, vote).await;
            }
        }
        ClientEvent::OpenBallotBox { id } => {
            if let Some(room) = session {
                room.open_ballot_requested(username, &id).await;
            }
        }
        ClientEvent::PutEnvelope {
            title,
            secret,
            timer,
        } => {
            if let Some(room) = session {
                room.put_envelope(username, title, secret, timer).await;
            }
        }
        ClientEvent::RevealEnvelope { id } => {
            if let Some(room) = session {
                room.reveal_envelope_requested(username, &id).await;
            }
        }
        ClientEvent::Leave => {
            if let Some(room) = session {
                room.leave(username).await;
            }
        }
        ClientEvent::DestroyRoom => {
            if let Some(room) = session {
                if room.is_owner(username).await {
                    info!(room = %room.name, username = %username, "Room teardown scheduled");
                    let registry = Arc::clone(&shared.registry);
                    let target = Arc::clone(room);
                    tokio::spawn(async move {
                        tokio::time::sleep(DESTROY_GRACE).await;
                        registry.destroy(&target).await;
                    });
                    room.announce_destroy(username).await;
                }
            }
        }
    }
}
