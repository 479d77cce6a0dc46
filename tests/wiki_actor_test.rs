use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use wiki_bus::config::DatabaseConfig;
use wiki_bus::framework::{BusError, Envelope, MessageBus};
use wiki_bus::model::Page;
use wiki_bus::store::{MemoryStore, PageConnection, PageStore, StoreError};
use wiki_bus::wiki_actor::{DatabaseStartError, WikiDatabaseActor};

const QUEUE: &str = "wikidb.queue";

async fn spawn_actor(bus: &MessageBus, store: MemoryStore) {
    let actor = WikiDatabaseActor::start(bus, store, &DatabaseConfig::default())
        .await
        .expect("Failed to start actor");
    tokio::spawn(actor.run());
}

async fn call(bus: &MessageBus, action: &str, body: Value) -> Result<Value, BusError> {
    let envelope = Envelope::new(body).with_action(action);
    bus.request(QUEUE, envelope).await.map(|reply| reply.into_body())
}

/// Create, read, update, read, delete, list, straight through the bus.
#[tokio::test]
async fn test_page_lifecycle_scenario() {
    let bus = MessageBus::new();
    spawn_actor(&bus, MemoryStore::default()).await;

    let created = call(&bus, "create-page", json!({"title": "Home", "markdown": "# Hi"})).await;
    assert_eq!(created, Ok(json!("ok")));

    let lookup = call(&bus, "get-page", json!({"page": "Home"})).await.unwrap();
    assert_eq!(lookup, json!({"found": true, "id": 1, "rawContent": "# Hi"}));

    let saved = call(&bus, "save-page", json!({"id": "1", "markdown": "# Bye"})).await;
    assert_eq!(saved, Ok(json!("ok")));

    let lookup = call(&bus, "get-page", json!({"page": "Home"})).await.unwrap();
    assert_eq!(lookup["rawContent"], json!("# Bye"));

    let deleted = call(&bus, "delete-page", json!({"id": "1"})).await;
    assert_eq!(deleted, Ok(json!("ok")));

    let pages = call(&bus, "all-pages", json!({})).await.unwrap();
    assert_eq!(pages, json!({"pages": []}));
}

#[tokio::test]
async fn test_all_pages_sorted_regardless_of_insertion_order() {
    let bus = MessageBus::new();
    spawn_actor(&bus, MemoryStore::default()).await;

    for title in ["Zebra", "Apple", "Mango", "Banana"] {
        call(&bus, "create-page", json!({"title": title, "markdown": ""}))
            .await
            .expect("Failed to create page");
    }

    let pages = call(&bus, "all-pages", Value::Null).await.unwrap();
    assert_eq!(pages, json!({"pages": ["Apple", "Banana", "Mango", "Zebra"]}));
}

#[tokio::test]
async fn test_missing_page_has_no_id_or_content() {
    let bus = MessageBus::new();
    spawn_actor(&bus, MemoryStore::default()).await;

    let lookup = call(&bus, "get-page", json!({"page": "Nowhere"})).await.unwrap();
    assert_eq!(lookup, json!({"found": false}));
}

#[tokio::test]
async fn test_missing_and_unknown_actions_are_rejected() {
    let bus = MessageBus::new();
    spawn_actor(&bus, MemoryStore::default()).await;

    let err = bus
        .request(QUEUE, Envelope::new(json!({"page": "Home"})))
        .await
        .unwrap_err();
    assert_eq!(err.failure_code(), Some(0));

    let err = call(&bus, "bogus", json!({})).await.unwrap_err();
    assert_eq!(
        err,
        BusError::Failure {
            code: 1,
            message: "Bad action: bogus".into()
        }
    );

    let err = call(&bus, "get-page", json!({"name": "Home"})).await.unwrap_err();
    assert_eq!(err.failure_code(), Some(3));

    // Still serving.
    assert!(call(&bus, "all-pages", json!({})).await.is_ok());
}

#[tokio::test]
async fn test_repeated_delete_keeps_actor_serving() {
    let bus = MessageBus::new();
    spawn_actor(&bus, MemoryStore::default()).await;

    call(&bus, "create-page", json!({"title": "Temp", "markdown": "x"}))
        .await
        .unwrap();
    for _ in 0..3 {
        assert_eq!(call(&bus, "delete-page", json!({"id": 1})).await, Ok(json!("ok")));
    }
    assert_eq!(
        call(&bus, "all-pages", json!({})).await,
        Ok(json!({"pages": []}))
    );
}

#[tokio::test]
async fn test_duplicate_title_is_a_db_error() {
    let bus = MessageBus::new();
    spawn_actor(&bus, MemoryStore::default()).await;

    let body = json!({"title": "Home", "markdown": "one"});
    call(&bus, "create-page", body.clone()).await.unwrap();
    let err = call(&bus, "create-page", body).await.unwrap_err();
    assert_eq!(err.failure_code(), Some(2));
}

#[tokio::test]
async fn test_store_outage_fails_requests_but_not_the_actor() {
    let bus = MessageBus::new();
    let store = MemoryStore::default();
    spawn_actor(&bus, store.clone()).await;

    store.set_online(false);
    let err = call(&bus, "all-pages", json!({})).await.unwrap_err();
    assert_eq!(err.failure_code(), Some(2));

    store.set_online(true);
    assert!(call(&bus, "all-pages", json!({})).await.is_ok());
}

#[tokio::test]
async fn test_connections_are_returned_after_each_operation() {
    let bus = MessageBus::new();
    let store = MemoryStore::new(2, Duration::from_millis(100));
    spawn_actor(&bus, store.clone()).await;

    for i in 0..5 {
        call(&bus, "create-page", json!({"title": format!("P{i}"), "markdown": ""}))
            .await
            .unwrap();
    }
    call(&bus, "all-pages", json!({})).await.unwrap();
    assert_eq!(store.idle_connections(), 2);
}

#[tokio::test]
async fn test_start_fails_when_store_is_down() {
    let bus = MessageBus::new();
    let store = MemoryStore::default();
    store.set_online(false);

    let result = WikiDatabaseActor::start(&bus, store, &DatabaseConfig::default()).await;
    assert!(matches!(result, Err(DatabaseStartError::Connect(_))));

    // Nothing was registered.
    let err = call(&bus, "all-pages", json!({})).await.unwrap_err();
    assert_eq!(err, BusError::NoConsumer(QUEUE.into()));
}

#[tokio::test]
async fn test_start_fails_when_queue_is_taken() {
    let bus = MessageBus::new();
    let _squatter = bus.consumer(QUEUE).await.unwrap();

    let result =
        WikiDatabaseActor::start(&bus, MemoryStore::default(), &DatabaseConfig::default()).await;
    assert!(matches!(
        result,
        Err(DatabaseStartError::Register { source: BusError::DuplicateConsumer(_), .. })
    ));
}

/// A store whose queries never finish.
#[derive(Clone)]
struct StuckStore;

struct StuckConnection;

#[async_trait]
impl PageStore for StuckStore {
    async fn connection(&self) -> Result<Box<dyn PageConnection>, StoreError> {
        Ok(Box::new(StuckConnection))
    }
}

#[async_trait]
impl PageConnection for StuckConnection {
    async fn ensure_schema(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn page_names(&mut self) -> Result<Vec<String>, StoreError> {
        std::future::pending().await
    }

    async fn page_by_name(&mut self, _name: &str) -> Result<Option<Page>, StoreError> {
        std::future::pending().await
    }

    async fn insert_page(&mut self, _name: &str, _content: &str) -> Result<i64, StoreError> {
        std::future::pending().await
    }

    async fn update_content(&mut self, _id: i64, _content: &str) -> Result<u64, StoreError> {
        std::future::pending().await
    }

    async fn delete_page(&mut self, _id: i64) -> Result<u64, StoreError> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn test_slow_operations_time_out_as_db_errors() {
    let bus = MessageBus::new();
    let config = DatabaseConfig {
        operation_timeout_ms: 50,
        ..DatabaseConfig::default()
    };
    let actor = WikiDatabaseActor::start(&bus, StuckStore, &config)
        .await
        .expect("Failed to start actor");
    tokio::spawn(actor.run());

    let err = call(&bus, "all-pages", json!({})).await.unwrap_err();
    assert_eq!(err.failure_code(), Some(2));
    let err = call(&bus, "get-page", json!({"page": "x"})).await.unwrap_err();
    assert_eq!(err.failure_code(), Some(2));
}
