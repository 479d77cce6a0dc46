//! In-process message bus.
//!
//! This module provides the transport that decouples request handlers from
//! the data owner: string-addressed consumers, fire-and-forget publishing and
//! request/reply with a deadline.
//!
//! # Main Components
//!
//! - [`MessageBus`] - Cloneable handle to the routing task
//! - [`MessageConsumer`] - Exclusive mailbox for one address
//! - [`Envelope`] - Body, headers and deadline of a message
//! - [`Message`] - A delivered envelope with its reply route
//! - [`BusError`] - Every non-reply outcome of a request
//!
//! # Testing
//!
//! See [`mock`] for a scripted consumer that stands in for a real actor.

pub mod bus;
pub mod envelope;
pub mod error;
pub mod message;
pub mod mock;

pub use bus::{MessageBus, MessageConsumer};
pub use envelope::{Envelope, Headers, ACTION_HEADER, DEFAULT_TIMEOUT};
pub use error::BusError;
pub use message::Message;
