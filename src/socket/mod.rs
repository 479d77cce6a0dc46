//! # Peer Sockets
//!
//! A long-lived duplex text channel with a peer, in two roles.
//!
//! - [`ReconnectingClient`] dials `ws://host:port/path`, answers every inbound
//!   text message with a canned reply, and after any failure drops the
//!   channel, waits a fixed delay and dials again.
//! - [`PeerServer`] accepts channels whose handshake path starts with a
//!   configured prefix, greets each peer and answers every message.
//!
//! Framing and the handshake are handled by `tokio-tungstenite`.

pub mod client;
pub mod error;
pub mod server;
pub mod state;

pub use client::{ClientHandle, ReconnectingClient};
pub use error::SocketError;
pub use server::{PeerServer, ServerHandle};
pub use state::ConnectionState;
