use crate::chat_relay::{ChatRelay, ChatRelayError};
use crate::clients::WikiClient;
use crate::config::WikiConfig;
use crate::framework::MessageBus;
use crate::store::PageStore;
use crate::wiki_actor::DatabaseStartError;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// The first stage that failed during [`WikiSystem::start`].
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Database actor failed to start: {0}")]
    Database(#[from] DatabaseStartError),

    #[error("Chat relay failed to start: {0}")]
    ChatRelay(#[source] ChatRelayError),
}

/// The running wiki: bus, database actor and chat relay.
///
/// # Start-up order
///
/// 1. The message bus.
/// 2. The database actor (store connection, schema, queue registration).
/// 3. The chat relay.
///
/// Each stage must succeed before the next begins. The first failure stops
/// the sequence, closes the bus, and is returned as a [`StartupError`].
///
/// # Example
///
/// ```ignore
/// let system = WikiSystem::start(&WikiConfig::default(), MemoryStore::default()).await?;
/// system.client.create_page("Home", "# Welcome").await?;
/// system.shutdown().await?;
/// ```
pub struct WikiSystem {
    pub bus: MessageBus,

    /// Client addressing the database queue.
    pub client: WikiClient,

    handles: Vec<JoinHandle<()>>,
}

impl WikiSystem {
    pub async fn start<S: PageStore>(config: &WikiConfig, store: S) -> Result<Self, StartupError> {
        let bus = MessageBus::new();
        info!("Stage 1: message bus up");

        let started = Self::start_services(&bus, config, store).await;
        match started {
            Ok((client, handles)) => {
                info!("Wiki system started");
                Ok(Self {
                    bus,
                    client,
                    handles,
                })
            }
            Err(e) => {
                error!(error = %e, "Start-up aborted");
                bus.close();
                Err(e)
            }
        }
    }

    async fn start_services<S: PageStore>(
        bus: &MessageBus,
        config: &WikiConfig,
        store: S,
    ) -> Result<(WikiClient, Vec<JoinHandle<()>>), StartupError> {
        let (actor, client) = crate::wiki_actor::new(bus, store, &config.database).await?;
        let client = client.with_timeout(config.bus.request_timeout());
        let actor_handle = tokio::spawn(actor.run());
        info!(queue = %config.database.queue, "Stage 2: database actor up");

        let relay = match ChatRelay::start(bus, &config.chat).await {
            Ok(relay) => relay,
            Err(e) => {
                actor_handle.abort();
                return Err(StartupError::ChatRelay(e));
            }
        };
        let relay_handle = tokio::spawn(relay.run());
        info!(inbound = %config.chat.inbound, "Stage 3: chat relay up");

        Ok((client, vec![actor_handle, relay_handle]))
    }

    /// Closes the bus and waits for every consumer task to finish.
    ///
    /// Requests still pending are rejected with
    /// [`BusError::BusClosed`](crate::framework::BusError::BusClosed).
    pub async fn shutdown(self) -> Result<(), String> {
        info!("Shutting down wiki system...");
        self.bus.close();

        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Task failed: {:?}", e);
                return Err(format!("Task failed: {:?}", e));
            }
        }

        info!("Wiki system shutdown complete.");
        Ok(())
    }
}
