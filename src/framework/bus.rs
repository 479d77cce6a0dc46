//! # Message Bus
//!
//! An in-process bus addressing consumers by a string queue name.
//!
//! ## Processing context
//!
//! [`MessageBus::new`] spawns one routing task that owns the consumer table
//! and the pending-reply table. Handles talk to it over an unbounded command
//! channel, so registration, delivery, reply dispatch and expiry all happen
//! in the order the routing task receives them. The routing task never awaits
//! anything but its own command channel.
//!
//! Each address has at most one consumer, fed through its own mailbox. Since
//! the routing task pushes into that mailbox in arrival order and the consumer
//! drains it sequentially, concurrent requests to one address are serialized.
//!
//! ## Shutdown
//!
//! Consumers only hold a weak reference to the command channel. Once every
//! [`MessageBus`] handle and in-flight message is gone, the routing task
//! exits, mailboxes close and consumer loops end. [`MessageBus::close`] does
//! the same immediately and rejects pending requests with
//! [`BusError::BusClosed`].

use crate::framework::envelope::Envelope;
use crate::framework::error::BusError;
use crate::framework::message::{Message, ReplyRoute};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Commands processed by the routing task.
#[derive(Debug)]
pub(crate) enum BusCommand {
    Register {
        address: String,
        registration: u64,
        mailbox: mpsc::UnboundedSender<Message>,
        respond_to: oneshot::Sender<Result<(), BusError>>,
    },
    Unregister {
        address: String,
        registration: u64,
    },
    Publish {
        address: String,
        envelope: Envelope,
    },
    Request {
        address: String,
        envelope: Envelope,
        correlation_id: u64,
        respond_to: oneshot::Sender<Result<Envelope, BusError>>,
    },
    Reply {
        correlation_id: u64,
        result: Result<Envelope, BusError>,
    },
    Expire {
        correlation_id: u64,
    },
    Shutdown,
}

/// Cloneable handle to the bus.
#[derive(Clone, Debug)]
pub struct MessageBus {
    commands: mpsc::UnboundedSender<BusCommand>,
    next_id: Arc<AtomicU64>,
}

impl MessageBus {
    /// Spawns the routing task. Must be called inside a Tokio runtime.
    pub fn new() -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        let router = Router {
            receiver,
            commands: commands.downgrade(),
            consumers: HashMap::new(),
            pending: HashMap::new(),
        };
        tokio::spawn(router.run());
        Self {
            commands,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Installs the exclusive consumer for `address`.
    ///
    /// Fails with [`BusError::DuplicateConsumer`] if the address is taken.
    /// Dropping the returned [`MessageConsumer`] frees the address again.
    pub async fn consumer(&self, address: impl Into<String>) -> Result<MessageConsumer, BusError> {
        let address = address.into();
        let registration = self.next_id();
        let (mailbox, receiver) = mpsc::unbounded_channel();
        let (respond_to, response) = oneshot::channel();
        self.commands
            .send(BusCommand::Register {
                address: address.clone(),
                registration,
                mailbox,
                respond_to,
            })
            .map_err(|_| BusError::BusClosed)?;
        response.await.map_err(|_| BusError::BusClosed)??;

        Ok(MessageConsumer {
            address,
            registration,
            receiver,
            commands: self.commands.downgrade(),
        })
    }

    /// Fire-and-forget delivery. Dropped silently when nobody listens.
    pub fn publish(&self, address: impl Into<String>, envelope: Envelope) -> Result<(), BusError> {
        self.commands
            .send(BusCommand::Publish {
                address: address.into(),
                envelope,
            })
            .map_err(|_| BusError::BusClosed)
    }

    /// Delivers `envelope` and waits for exactly one reply or failure.
    ///
    /// Resolves with [`BusError::NoConsumer`] right away when the address has
    /// no consumer, and with [`BusError::Timeout`] once the envelope's deadline
    /// passes.
    pub async fn request(
        &self,
        address: impl Into<String>,
        envelope: Envelope,
    ) -> Result<Envelope, BusError> {
        let address = address.into();
        let correlation_id = self.next_id();
        let timeout = envelope.timeout();
        let (respond_to, response) = oneshot::channel();

        self.commands
            .send(BusCommand::Request {
                address: address.clone(),
                envelope,
                correlation_id,
                respond_to,
            })
            .map_err(|_| BusError::BusClosed)?;

        match tokio::time::timeout(timeout, response).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(BusError::BusClosed),
            Err(_) => {
                warn!(%address, correlation_id, ?timeout, "Request timed out");
                let _ = self.commands.send(BusCommand::Expire { correlation_id });
                Err(BusError::Timeout { address, timeout })
            }
        }
    }

    /// Callback flavour of [`MessageBus::request`]: `on_reply` runs exactly
    /// once on a spawned task.
    pub fn send<F>(&self, address: impl Into<String>, envelope: Envelope, on_reply: F)
    where
        F: FnOnce(Result<Envelope, BusError>) + Send + 'static,
    {
        let bus = self.clone();
        let address = address.into();
        tokio::spawn(async move {
            let result = bus.request(address, envelope).await;
            on_reply(result);
        });
    }

    /// Stops the routing task, closing every mailbox and rejecting pending
    /// requests with [`BusError::BusClosed`].
    pub fn close(&self) {
        let _ = self.commands.send(BusCommand::Shutdown);
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of an address registration.
#[derive(Debug)]
pub struct MessageConsumer {
    address: String,
    registration: u64,
    receiver: mpsc::UnboundedReceiver<Message>,
    commands: mpsc::WeakUnboundedSender<BusCommand>,
}

impl MessageConsumer {
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Next message in arrival order, or `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<Message> {
        self.receiver.recv().await
    }
}

impl Drop for MessageConsumer {
    fn drop(&mut self) {
        if let Some(commands) = self.commands.upgrade() {
            let _ = commands.send(BusCommand::Unregister {
                address: self.address.clone(),
                registration: self.registration,
            });
        }
    }
}

struct Registration {
    id: u64,
    mailbox: mpsc::UnboundedSender<Message>,
}

struct Router {
    receiver: mpsc::UnboundedReceiver<BusCommand>,
    commands: mpsc::WeakUnboundedSender<BusCommand>,
    consumers: HashMap<String, Registration>,
    pending: HashMap<u64, oneshot::Sender<Result<Envelope, BusError>>>,
}

impl Router {
    async fn run(mut self) {
        info!("Message bus started");

        while let Some(command) = self.receiver.recv().await {
            match command {
                BusCommand::Register {
                    address,
                    registration,
                    mailbox,
                    respond_to,
                } => {
                    let result = if self.consumers.contains_key(&address) {
                        warn!(%address, "Duplicate consumer rejected");
                        Err(BusError::DuplicateConsumer(address))
                    } else {
                        info!(%address, "Consumer registered");
                        self.consumers.insert(
                            address,
                            Registration {
                                id: registration,
                                mailbox,
                            },
                        );
                        Ok(())
                    };
                    let _ = respond_to.send(result);
                }
                BusCommand::Unregister {
                    address,
                    registration,
                } => {
                    if self
                        .consumers
                        .get(&address)
                        .is_some_and(|current| current.id == registration)
                    {
                        self.consumers.remove(&address);
                        info!(%address, "Consumer unregistered");
                    }
                }
                BusCommand::Publish { address, envelope } => {
                    self.deliver(address, envelope, None);
                }
                BusCommand::Request {
                    address,
                    envelope,
                    correlation_id,
                    respond_to,
                } => {
                    if !self.consumers.contains_key(&address) {
                        debug!(%address, correlation_id, "No consumer for request");
                        let _ = respond_to.send(Err(BusError::NoConsumer(address)));
                        continue;
                    }
                    let Some(commands) = self.commands.upgrade() else {
                        let _ = respond_to.send(Err(BusError::BusClosed));
                        continue;
                    };
                    self.pending.insert(correlation_id, respond_to);
                    let route = ReplyRoute {
                        correlation_id,
                        commands,
                    };
                    if !self.deliver(address.clone(), envelope, Some(route)) {
                        if let Some(respond_to) = self.pending.remove(&correlation_id) {
                            let _ = respond_to.send(Err(BusError::NoConsumer(address)));
                        }
                    }
                }
                BusCommand::Reply {
                    correlation_id,
                    result,
                } => match self.pending.remove(&correlation_id) {
                    Some(respond_to) => {
                        debug!(correlation_id, ok = result.is_ok(), "Reply dispatched");
                        let _ = respond_to.send(result);
                    }
                    None => debug!(correlation_id, "Late reply discarded"),
                },
                BusCommand::Expire { correlation_id } => {
                    self.pending.remove(&correlation_id);
                }
                BusCommand::Shutdown => {
                    info!(pending = self.pending.len(), "Message bus closing");
                    break;
                }
            }
        }

        for (_, respond_to) in self.pending.drain() {
            let _ = respond_to.send(Err(BusError::BusClosed));
        }
        self.consumers.clear();
        info!("Message bus stopped");
    }

    /// Pushes into the consumer's mailbox. Returns `false` when the address
    /// has no live consumer.
    fn deliver(&mut self, address: String, envelope: Envelope, route: Option<ReplyRoute>) -> bool {
        let Some(registration) = self.consumers.get(&address) else {
            debug!(%address, "No consumer, message dropped");
            return false;
        };
        let correlation_id = route.as_ref().map(|route| route.correlation_id);
        let message = Message::new(address.clone(), envelope, route);
        match registration.mailbox.send(message) {
            Ok(()) => {
                debug!(%address, ?correlation_id, "Delivered");
                true
            }
            Err(mpsc::error::SendError(message)) => {
                message.disarm();
                self.consumers.remove(&address);
                warn!(%address, "Consumer mailbox closed, registration removed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn request_reaches_consumer_and_resolves_once() {
        let bus = MessageBus::new();
        let mut consumer = bus.consumer("echo").await.unwrap();

        tokio::spawn(async move {
            while let Some(message) = consumer.recv().await {
                let body = message.body().clone();
                message.reply(body);
            }
        });

        let reply = bus
            .request("echo", Envelope::new(json!({"n": 1})))
            .await
            .unwrap();
        assert_eq!(reply.body(), &json!({"n": 1}));
    }

    #[tokio::test]
    async fn request_without_consumer_fails_immediately() {
        let bus = MessageBus::new();
        let result = bus
            .request("nobody", Envelope::empty().with_timeout(Duration::from_secs(60)))
            .await;
        assert_eq!(result, Err(BusError::NoConsumer("nobody".into())));
    }

    #[tokio::test]
    async fn second_consumer_is_rejected() {
        let bus = MessageBus::new();
        let _first = bus.consumer("queue").await.unwrap();
        let second = bus.consumer("queue").await;
        assert!(matches!(second, Err(BusError::DuplicateConsumer(a)) if a == "queue"));
    }

    #[tokio::test]
    async fn dropping_consumer_frees_address() {
        let bus = MessageBus::new();
        let first = bus.consumer("queue").await.unwrap();
        drop(first);
        // Unregister is queued ahead of the next registration.
        assert!(bus.consumer("queue").await.is_ok());
    }

    #[tokio::test]
    async fn failure_is_relayed_with_code() {
        let bus = MessageBus::new();
        let mut consumer = bus.consumer("failing").await.unwrap();
        tokio::spawn(async move {
            if let Some(message) = consumer.recv().await {
                message.fail(7, "nope");
            }
        });

        let result = bus.request("failing", Envelope::empty()).await;
        assert_eq!(
            result,
            Err(BusError::Failure {
                code: 7,
                message: "nope".into()
            })
        );
    }

    #[tokio::test]
    async fn dropped_request_fails_with_no_reply() {
        let bus = MessageBus::new();
        let mut consumer = bus.consumer("sink").await.unwrap();
        tokio::spawn(async move {
            while let Some(message) = consumer.recv().await {
                drop(message);
            }
        });

        let result = bus.request("sink", Envelope::empty()).await;
        assert_eq!(result, Err(BusError::NoReply("sink".into())));
    }

    #[tokio::test]
    async fn unanswered_request_times_out() {
        let bus = MessageBus::new();
        let mut consumer = bus.consumer("slow").await.unwrap();
        let keep = tokio::spawn(async move {
            let held = consumer.recv().await;
            tokio::time::sleep(Duration::from_millis(200)).await;
            drop(held);
        });

        let result = bus
            .request("slow", Envelope::empty().with_timeout(Duration::from_millis(20)))
            .await;
        assert!(matches!(result, Err(BusError::Timeout { .. })));
        keep.await.unwrap();
    }

    #[tokio::test]
    async fn publish_is_delivered_without_reply_route() {
        let bus = MessageBus::new();
        let mut consumer = bus.consumer("events").await.unwrap();

        bus.publish("events", Envelope::new("hello")).unwrap();
        bus.publish("nobody", Envelope::new("lost")).unwrap();

        let message = consumer.recv().await.unwrap();
        assert!(!message.expects_reply());
        assert_eq!(message.body(), &json!("hello"));
    }

    #[tokio::test]
    async fn deliveries_keep_arrival_order() {
        let bus = MessageBus::new();
        let mut consumer = bus.consumer("ordered").await.unwrap();

        for n in 0..50 {
            bus.publish("ordered", Envelope::new(n)).unwrap();
        }
        for expected in 0..50 {
            let message = consumer.recv().await.unwrap();
            assert_eq!(message.body(), &json!(expected));
        }
    }

    #[tokio::test]
    async fn send_invokes_callback_once() {
        let bus = MessageBus::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        bus.send("nobody", Envelope::empty(), move |result| {
            let _ = tx.send(result);
        });

        let first = rx.recv().await.unwrap();
        assert_eq!(first, Err(BusError::NoConsumer("nobody".into())));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn send_delivers_reply_to_callback_once() {
        let bus = MessageBus::new();
        let mut consumer = bus.consumer("greeter").await.unwrap();
        tokio::spawn(async move {
            while let Some(message) = consumer.recv().await {
                message.reply(json!("hello"));
            }
        });

        let (tx, mut rx) = mpsc::unbounded_channel();
        bus.send("greeter", Envelope::empty(), move |result| {
            let _ = tx.send(result);
        });

        let reply = rx.recv().await.unwrap().unwrap();
        assert_eq!(reply.body(), &json!("hello"));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn close_rejects_pending_and_ends_consumers() {
        let bus = MessageBus::new();
        let mut consumer = bus.consumer("held").await.unwrap();

        let requester = {
            let bus = bus.clone();
            tokio::spawn(async move { bus.request("held", Envelope::empty()).await })
        };
        let held = consumer.recv().await.unwrap();
        bus.close();

        assert_eq!(requester.await.unwrap(), Err(BusError::BusClosed));
        drop(held);
        assert!(consumer.recv().await.is_none());
    }
}
