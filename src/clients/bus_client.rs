use crate::framework::{BusError, MessageBus};
use crate::wiki_actor::{WikiError, WikiRequest};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors seen by callers of the wiki queue.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// The bus could not deliver the request or produce a reply.
    #[error(transparent)]
    Bus(BusError),

    /// The actor failed the request with one of its own codes.
    #[error(transparent)]
    Wiki(WikiError),

    /// The consumer failed the request with a code the wiki does not define.
    #[error("Failure (code {code}): {message}")]
    Failure { code: i32, message: String },

    /// The reply body did not have the expected shape.
    #[error("Undecodable reply: {0}")]
    Decode(String),

    /// A write did not reply with `"ok"`.
    #[error("Unexpected reply: {0}")]
    UnexpectedReply(Value),
}

impl From<BusError> for ClientError {
    fn from(error: BusError) -> Self {
        match error {
            BusError::Failure { code, message } => match WikiError::from_failure(code, &message) {
                Some(wiki) => ClientError::Wiki(wiki),
                None => ClientError::Failure { code, message },
            },
            other => ClientError::Bus(other),
        }
    }
}

/// Shared request/reply plumbing for clients of a bus queue.
///
/// Implementors only name the bus, the address and the deadline; the round
/// trip and the error mapping come for free.
#[async_trait]
pub trait BusClient: Send + Sync {
    fn bus(&self) -> &MessageBus;

    fn address(&self) -> &str;

    fn timeout(&self) -> Duration;

    /// Sends one request and waits for its single reply body.
    #[instrument(skip(self), fields(address = %self.address(), action = %request.action()))]
    async fn request(&self, request: WikiRequest) -> Result<Value, ClientError> {
        debug!("Sending request");
        let envelope = request.into_envelope().with_timeout(self.timeout());
        let reply = self.bus().request(self.address(), envelope).await?;
        Ok(reply.into_body())
    }
}
