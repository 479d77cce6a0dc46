use super::bus_client::{BusClient, ClientError};
use crate::framework::{MessageBus, DEFAULT_TIMEOUT};
use crate::model::{CreatePage, DeletePage, GetPage, PageList, PageLookup, SavePage};
use crate::wiki_actor::WikiRequest;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::instrument;

/// Typed front for the wiki database queue.
///
/// Each call sends one request and resolves with exactly one reply or
/// failure. Nothing is retried.
#[derive(Clone, Debug)]
pub struct WikiClient {
    bus: MessageBus,
    address: String,
    timeout: Duration,
}

#[async_trait]
impl BusClient for WikiClient {
    fn bus(&self) -> &MessageBus {
        &self.bus
    }

    fn address(&self) -> &str {
        &self.address
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl WikiClient {
    pub fn new(bus: MessageBus, address: impl Into<String>) -> Self {
        Self {
            bus,
            address: address.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Names of all pages, sorted ascending.
    #[instrument(skip(self))]
    pub async fn all_pages(&self) -> Result<Vec<String>, ClientError> {
        let reply = self.request(WikiRequest::AllPages).await?;
        decode::<PageList>(reply).map(|list| list.pages)
    }

    #[instrument(skip(self))]
    pub async fn get_page(&self, name: &str) -> Result<PageLookup, ClientError> {
        let reply = self
            .request(WikiRequest::GetPage(GetPage {
                page: name.to_owned(),
            }))
            .await?;
        decode(reply)
    }

    #[instrument(skip(self, markdown))]
    pub async fn create_page(&self, title: &str, markdown: &str) -> Result<(), ClientError> {
        let reply = self
            .request(WikiRequest::CreatePage(CreatePage {
                title: title.to_owned(),
                markdown: markdown.to_owned(),
            }))
            .await?;
        expect_ok(reply)
    }

    #[instrument(skip(self, markdown))]
    pub async fn save_page(&self, id: i64, markdown: &str) -> Result<(), ClientError> {
        let reply = self
            .request(WikiRequest::SavePage(SavePage {
                id,
                markdown: markdown.to_owned(),
            }))
            .await?;
        expect_ok(reply)
    }

    #[instrument(skip(self))]
    pub async fn delete_page(&self, id: i64) -> Result<(), ClientError> {
        let reply = self
            .request(WikiRequest::DeletePage(DeletePage { id }))
            .await?;
        expect_ok(reply)
    }
}

fn decode<T: DeserializeOwned>(reply: Value) -> Result<T, ClientError> {
    serde_json::from_value(reply).map_err(|e| ClientError::Decode(e.to_string()))
}

fn expect_ok(reply: Value) -> Result<(), ClientError> {
    match reply.as_str() {
        Some("ok") => Ok(()),
        _ => Err(ClientError::UnexpectedReply(reply)),
    }
}
