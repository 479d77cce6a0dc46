//! # Page Store
//!
//! The persistence boundary of the wiki. The data actor never touches tables
//! directly: for every operation it borrows one [`PageConnection`] from a
//! [`PageStore`], uses it, and lets it drop.
//!
//! [`MemoryStore`] is the bundled implementation. Anything that can hand out
//! connections (a SQL pool, a remote service) can implement the two traits.

mod memory;

pub use memory::MemoryStore;

use crate::model::Page;
use async_trait::async_trait;

/// Errors raised by a store or one of its connections.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store cannot be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// No pooled connection became free in time.
    #[error("Timed out waiting for a connection after {0} ms")]
    PoolTimeout(u64),

    /// The schema has not been created on this store.
    #[error("Table 'pages' does not exist")]
    MissingSchema,

    /// A page with this name already exists.
    #[error("Unique constraint violated: page '{0}' already exists")]
    DuplicateName(String),
}

/// Source of short-lived connections.
#[async_trait]
pub trait PageStore: Send + Sync + 'static {
    /// Borrows a connection. It goes back to the pool when dropped.
    async fn connection(&self) -> Result<Box<dyn PageConnection>, StoreError>;
}

/// Operations available on one borrowed connection.
#[async_trait]
pub trait PageConnection: Send {
    /// Creates the pages table if it does not exist.
    async fn ensure_schema(&mut self) -> Result<(), StoreError>;

    /// Every page name, in no particular order.
    async fn page_names(&mut self) -> Result<Vec<String>, StoreError>;

    async fn page_by_name(&mut self, name: &str) -> Result<Option<Page>, StoreError>;

    /// Inserts a page and returns its store-assigned id.
    async fn insert_page(&mut self, name: &str, content: &str) -> Result<i64, StoreError>;

    /// Replaces the content of the row with `id`. Returns the affected row count.
    async fn update_content(&mut self, id: i64, content: &str) -> Result<u64, StoreError>;

    /// Removes the row with `id`. Returns the affected row count.
    async fn delete_page(&mut self, id: i64) -> Result<u64, StoreError>;
}
