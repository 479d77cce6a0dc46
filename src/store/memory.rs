use super::{PageConnection, PageStore, StoreError};
use crate::model::Page;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

pub const DEFAULT_MAX_POOL_SIZE: usize = 30;
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
struct Tables {
    schema: bool,
    next_id: i64,
    pages: BTreeMap<i64, Page>,
}

/// In-memory page store behind a bounded connection pool.
///
/// Ids are assigned from a monotonically increasing counter starting at 1
/// and never reused. Page names are unique. Clones share the same tables and
/// pool.
#[derive(Clone, Debug)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    permits: Arc<Semaphore>,
    max_pool_size: usize,
    acquire_timeout: Duration,
    online: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new(max_pool_size: usize, acquire_timeout: Duration) -> Self {
        Self {
            tables: Arc::new(Mutex::new(Tables {
                next_id: 1,
                ..Tables::default()
            })),
            permits: Arc::new(Semaphore::new(max_pool_size)),
            max_pool_size,
            acquire_timeout,
            online: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Connections currently sitting idle in the pool.
    pub fn idle_connections(&self) -> usize {
        self.permits.available_permits()
    }

    /// Simulates the backend going away (`false`) or coming back (`true`).
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_POOL_SIZE, DEFAULT_ACQUIRE_TIMEOUT)
    }
}

#[async_trait]
impl PageStore for MemoryStore {
    async fn connection(&self) -> Result<Box<dyn PageConnection>, StoreError> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".into()));
        }

        let permit = match tokio::time::timeout(
            self.acquire_timeout,
            self.permits.clone().acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(StoreError::Unavailable("connection pool closed".into())),
            Err(_) => {
                warn!(max_pool_size = self.max_pool_size, "Connection pool exhausted");
                return Err(StoreError::PoolTimeout(
                    self.acquire_timeout.as_millis() as u64,
                ));
            }
        };

        debug!(idle = self.permits.available_permits(), "Connection acquired");
        Ok(Box::new(MemoryConnection {
            tables: self.tables.clone(),
            online: self.online.clone(),
            _permit: permit,
        }))
    }
}

struct MemoryConnection {
    tables: Arc<Mutex<Tables>>,
    online: Arc<AtomicBool>,
    _permit: OwnedSemaphorePermit,
}

impl MemoryConnection {
    fn check_online(&self) -> Result<(), StoreError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("connection lost".into()))
        }
    }

    async fn with_tables<R>(
        &self,
        op: impl FnOnce(&mut Tables) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        self.check_online()?;
        let mut tables = self.tables.lock().await;
        if !tables.schema {
            return Err(StoreError::MissingSchema);
        }
        op(&mut *tables)
    }
}

#[async_trait]
impl PageConnection for MemoryConnection {
    async fn ensure_schema(&mut self) -> Result<(), StoreError> {
        self.check_online()?;
        self.tables.lock().await.schema = true;
        Ok(())
    }

    async fn page_names(&mut self) -> Result<Vec<String>, StoreError> {
        self.with_tables(|tables| Ok(tables.pages.values().map(|p| p.name.clone()).collect()))
            .await
    }

    async fn page_by_name(&mut self, name: &str) -> Result<Option<Page>, StoreError> {
        self.with_tables(|tables| Ok(tables.pages.values().find(|p| p.name == name).cloned()))
            .await
    }

    async fn insert_page(&mut self, name: &str, content: &str) -> Result<i64, StoreError> {
        self.with_tables(|tables| {
            if tables.pages.values().any(|p| p.name == name) {
                return Err(StoreError::DuplicateName(name.to_owned()));
            }
            let id = tables.next_id;
            tables.next_id += 1;
            tables.pages.insert(id, Page::new(id, name, content));
            Ok(id)
        })
        .await
    }

    async fn update_content(&mut self, id: i64, content: &str) -> Result<u64, StoreError> {
        self.with_tables(|tables| match tables.pages.get_mut(&id) {
            Some(page) => {
                page.content = content.to_owned();
                Ok(1)
            }
            None => Ok(0),
        })
        .await
    }

    async fn delete_page(&mut self, id: i64) -> Result<u64, StoreError> {
        self.with_tables(|tables| Ok(u64::from(tables.pages.remove(&id).is_some())))
            .await
    }
}
