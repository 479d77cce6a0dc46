use super::actions::WikiRequest;
use super::error::{DatabaseStartError, WikiError};
use crate::config::DatabaseConfig;
use crate::framework::{Message, MessageBus, MessageConsumer};
use crate::store::PageStore;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Lifecycle of the database actor, as reported in its logs. A constructed
/// [`WikiDatabaseActor`] is always `Ready`; a failed start returns an error
/// instead of an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorState {
    Uninitialized,
    Ready,
    Failed,
}

/// Single owner of the page store.
///
/// # Concurrency Model
/// The actor drains one mailbox sequentially, so at most one store operation
/// runs at a time on its behalf. Every operation borrows its own connection
/// from the store and gives it back before the next message is taken.
///
/// A failed operation turns into a failure reply; the loop keeps going.
pub struct WikiDatabaseActor<S: PageStore> {
    store: S,
    consumer: MessageConsumer,
    operation_timeout: Duration,
}

impl<S: PageStore> WikiDatabaseActor<S> {
    /// Connects to the store, ensures the schema, and registers on the queue.
    ///
    /// The actor is only returned in the `Ready` state; any failure on the
    /// way is reported and leaves nothing registered.
    pub async fn start(
        bus: &MessageBus,
        store: S,
        config: &DatabaseConfig,
    ) -> Result<Self, DatabaseStartError> {
        let mut state = ActorState::Uninitialized;
        debug!(?state, queue = %config.queue, "Starting database actor");

        let prepared = async {
            let mut connection = store
                .connection()
                .await
                .map_err(DatabaseStartError::Connect)?;
            connection
                .ensure_schema()
                .await
                .map_err(DatabaseStartError::Schema)
        }
        .await;

        if let Err(e) = prepared {
            state = ActorState::Failed;
            error!(?state, error = %e, "Database actor failed to start");
            return Err(e);
        }

        let consumer = match bus.consumer(config.queue.clone()).await {
            Ok(consumer) => consumer,
            Err(source) => {
                state = ActorState::Failed;
                error!(?state, error = %source, "Database actor failed to start");
                return Err(DatabaseStartError::Register {
                    queue: config.queue.clone(),
                    source,
                });
            }
        };

        state = ActorState::Ready;
        info!(?state, queue = %config.queue, "Database actor ready");
        Ok(Self {
            store,
            consumer,
            operation_timeout: config.operation_timeout(),
        })
    }

    /// Serves the queue until the bus closes.
    pub async fn run(mut self) {
        let queue = self.consumer.address().to_owned();
        info!(%queue, "Actor started");

        let mut served: u64 = 0;
        while let Some(message) = self.consumer.recv().await {
            self.handle(message).await;
            served += 1;
        }

        info!(%queue, served, "Shutdown");
    }

    async fn handle(&self, message: Message) {
        let request = match WikiRequest::decode(message.headers(), message.body()) {
            Ok(request) => request,
            Err(e) => {
                match e {
                    WikiError::NoActionSpecified => info!(
                        headers = ?message.headers(),
                        body = %message.body(),
                        "No action header specified"
                    ),
                    _ => warn!(error = %e, "Rejected request"),
                }
                message.fail(e.code().into(), e.to_string());
                return;
            }
        };

        let action = request.action();
        debug!(%action, ?request, correlation_id = ?message.correlation_id(), "Dispatch");

        let result = tokio::time::timeout(self.operation_timeout, self.execute(request))
            .await
            .unwrap_or_else(|_| {
                Err(WikiError::DbError(format!(
                    "operation timed out after {} ms",
                    self.operation_timeout.as_millis()
                )))
            });

        match result {
            Ok(reply) => {
                debug!(%action, "Reply");
                message.reply(reply);
            }
            Err(e) => {
                error!(%action, error = %e, "Database query error");
                message.fail(e.code().into(), e.to_string());
            }
        }
    }

    async fn execute(&self, request: WikiRequest) -> Result<Value, WikiError> {
        let mut connection = self.store.connection().await?;

        let reply = match request {
            WikiRequest::AllPages => {
                let mut pages = connection.page_names().await?;
                pages.sort();
                json!({ "pages": pages })
            }
            WikiRequest::GetPage(get) => match connection.page_by_name(&get.page).await? {
                Some(page) => json!({
                    "found": true,
                    "id": page.id,
                    "rawContent": page.content,
                }),
                None => json!({ "found": false }),
            },
            WikiRequest::CreatePage(create) => {
                let id = connection
                    .insert_page(&create.title, &create.markdown)
                    .await?;
                info!(id, title = %create.title, "Created");
                json!("ok")
            }
            WikiRequest::SavePage(save) => {
                let rows = connection.update_content(save.id, &save.markdown).await?;
                info!(id = save.id, rows, "Saved");
                json!("ok")
            }
            WikiRequest::DeletePage(delete) => {
                let rows = connection.delete_page(delete.id).await?;
                info!(id = delete.id, rows, "Deleted");
                json!("ok")
            }
        };

        Ok(reply)
    }
}
