//! # Bus Errors
//!
//! Every outcome of a request that is not a reply envelope ends up as one of
//! these variants, so the caller always gets exactly one answer.

use std::time::Duration;

/// Errors produced by the message bus itself or relayed from a consumer.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum BusError {
    /// No consumer is registered on the address.
    #[error("No consumer registered on address '{0}'")]
    NoConsumer(String),

    /// The address already has its exclusive consumer.
    #[error("A consumer is already registered on address '{0}'")]
    DuplicateConsumer(String),

    /// The consumer explicitly failed the message.
    #[error("Consumer failure (code {code}): {message}")]
    Failure { code: i32, message: String },

    /// No reply arrived before the envelope's deadline.
    #[error("No reply from '{address}' within {timeout:?}")]
    Timeout { address: String, timeout: Duration },

    /// The consumer dropped the message without replying or failing it.
    #[error("Consumer on '{0}' dropped the message without replying")]
    NoReply(String),

    /// The bus processing task is gone.
    #[error("Message bus closed")]
    BusClosed,
}

impl BusError {
    /// Numeric failure code when the consumer failed the message explicitly.
    pub fn failure_code(&self) -> Option<i32> {
        match self {
            BusError::Failure { code, .. } => Some(*code),
            _ => None,
        }
    }
}
