//! The wiki database actor: the single owner of page storage.

pub mod actions;
pub mod actor;
pub mod error;

pub use actions::*;
pub use actor::*;
pub use error::*;

use crate::clients::WikiClient;
use crate::config::DatabaseConfig;
use crate::framework::MessageBus;
use crate::store::PageStore;

/// Starts the database actor on `config.queue` and returns it with a client
/// addressing the same queue. The caller spawns [`WikiDatabaseActor::run`].
pub async fn new<S: PageStore>(
    bus: &MessageBus,
    store: S,
    config: &DatabaseConfig,
) -> Result<(WikiDatabaseActor<S>, WikiClient), DatabaseStartError> {
    let actor = WikiDatabaseActor::start(bus, store, config).await?;
    let client = WikiClient::new(bus.clone(), config.queue.clone());
    Ok((actor, client))
}
