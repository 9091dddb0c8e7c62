//! Tearoom Network Library
//!
//! Provides TCP-based networking for room chat.
//!
//! # Architecture
//!
//! - **Server**: Accepts connections and routes events between rooms
//! - **Client**: Connects, signs events with a token, receives broadcasts
//! - **Protocol**: Length-prefixed JSON events, raw `heartbeat` keep-alives
//!
//! # Usage
//!
//! ```ignore
//! // Start a server that trusts a given signing key
//! let server = Server::start(3000, TokenVerifier::hs256_from_secret(secret)).await?;
//!
//! // Client connects and joins a room
//! let mut client = Client::connect(server.addr(), token).await?;
//! client.join("lobby").await?;
//!
//! // Process events
//! while let Some(event) = client.next_event().await {
//!     match event {
//!         ServerEvent::Message { username, .. } => { /* handle */ }
//!         _ => {}
//!     }
//! }
//! ```

pub mod auth;
pub mod client;
pub mod error;
mod frame;
pub mod registry;
pub mod room;
pub mod server;

pub use auth::TokenVerifier;
pub use client::Client;
pub use error::{Error, Result};
pub use registry::RoomRegistry;
pub use room::Room;
pub use server::Server;

pub use tearoom_core::event::{ClientEvent, ClientFrame, ServerEvent};

/// Default port for Tearoom servers
pub const DEFAULT_PORT: u16 = 8080;
