//! # Delivered Messages
//!
//! What a consumer pulls out of its mailbox. A [`Message`] wraps the sender's
//! [`Envelope`] and, for requests, the route back to the waiting caller.

use crate::framework::bus::BusCommand;
use crate::framework::envelope::{Envelope, Headers};
use crate::framework::error::BusError;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

/// Route from a delivered request back to the bus's pending-reply table.
#[derive(Debug)]
pub(crate) struct ReplyRoute {
    pub(crate) correlation_id: u64,
    pub(crate) commands: mpsc::UnboundedSender<BusCommand>,
}

/// A message handed to a consumer.
///
/// Requests must be answered with [`Message::reply`] or [`Message::fail`].
/// A request dropped without either is failed with [`BusError::NoReply`], so
/// the caller is always resolved exactly once.
#[derive(Debug)]
pub struct Message {
    address: String,
    envelope: Envelope,
    route: Option<ReplyRoute>,
}

impl Message {
    pub(crate) fn new(address: String, envelope: Envelope, route: Option<ReplyRoute>) -> Self {
        Self {
            address,
            envelope,
            route,
        }
    }

    /// The address this message was delivered on.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn body(&self) -> &Value {
        self.envelope.body()
    }

    pub fn headers(&self) -> &Headers {
        self.envelope.headers()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.envelope.header(name)
    }

    /// `true` for messages sent with `request`, `false` for `publish`.
    pub fn expects_reply(&self) -> bool {
        self.route.is_some()
    }

    /// Correlation id of the pending reply, if any.
    pub fn correlation_id(&self) -> Option<u64> {
        self.route.as_ref().map(|route| route.correlation_id)
    }

    /// Resolves the caller with `body`. No-op for published messages.
    pub fn reply(mut self, body: impl Into<Value>) {
        self.settle(Ok(Envelope::new(body)));
    }

    /// Resolves the caller with a [`BusError::Failure`].
    pub fn fail(mut self, code: i32, message: impl Into<String>) {
        self.settle(Err(BusError::Failure {
            code,
            message: message.into(),
        }));
    }

    /// Drops the reply route without notifying the bus.
    pub(crate) fn disarm(mut self) {
        self.route = None;
    }

    fn settle(&mut self, result: Result<Envelope, BusError>) {
        if let Some(route) = self.route.take() {
            let correlation_id = route.correlation_id;
            if route
                .commands
                .send(BusCommand::Reply {
                    correlation_id,
                    result,
                })
                .is_err()
            {
                debug!(address = %self.address, correlation_id, "Bus closed before reply");
            }
        }
    }
}

impl Drop for Message {
    fn drop(&mut self) {
        if self.route.is_some() {
            let address = self.address.clone();
            self.settle(Err(BusError::NoReply(address)));
        }
    }
}
