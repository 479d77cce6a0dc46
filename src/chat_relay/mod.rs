//! # Chat Relay
//!
//! Stamps every line posted to the inbound chat address with the local time
//! and publishes it, fire-and-forget, to the outbound address.

use crate::config::ChatConfig;
use crate::framework::{BusError, Envelope, Message, MessageBus, MessageConsumer};
use chrono::{DateTime, Local, TimeZone};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChatRelayError {
    /// Inbound and outbound are the same address, so every relayed line
    /// would come straight back in.
    #[error("Chat relay inbound and outbound are both '{0}'")]
    Loopback(String),

    #[error(transparent)]
    Bus(#[from] BusError),
}

pub struct ChatRelay {
    bus: MessageBus,
    consumer: MessageConsumer,
    outbound: String,
}

impl ChatRelay {
    /// Registers the relay on `config.inbound`.
    pub async fn start(bus: &MessageBus, config: &ChatConfig) -> Result<Self, ChatRelayError> {
        if config.inbound == config.outbound {
            return Err(ChatRelayError::Loopback(config.inbound.clone()));
        }
        let consumer = bus.consumer(config.inbound.clone()).await?;
        info!(inbound = %config.inbound, outbound = %config.outbound, "Chat relay ready");
        Ok(Self {
            bus: bus.clone(),
            consumer,
            outbound: config.outbound.clone(),
        })
    }

    pub async fn run(mut self) {
        while let Some(message) = self.consumer.recv().await {
            self.relay(message);
        }
        info!(inbound = %self.consumer.address(), "Chat relay stopped");
    }

    fn relay(&self, message: Message) {
        let line = stamp(&Local::now(), message.body());
        debug!(%line, "Relaying chat line");

        if let Err(e) = self.bus.publish(self.outbound.as_str(), Envelope::new(line.clone())) {
            warn!(error = %e, "Failed to publish chat line");
        }
        if message.expects_reply() {
            message.reply(line);
        }
    }
}

/// `"<timestamp>: <text>"`. String bodies are used as they are, anything
/// else in its JSON form.
pub fn stamp<Tz: TimeZone>(at: &DateTime<Tz>, body: &Value) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let text = match body {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };
    format!("{}: {}", at.format(TIMESTAMP_FORMAT), text)
}
