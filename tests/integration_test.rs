use std::time::Duration;
use wiki_bus::chat_relay::ChatRelayError;
use wiki_bus::clients::ClientError;
use wiki_bus::config::WikiConfig;
use wiki_bus::framework::{BusError, Envelope};
use wiki_bus::lifecycle::{StartupError, WikiSystem};
use wiki_bus::store::MemoryStore;
use wiki_bus::wiki_actor::{DatabaseStartError, WikiError};

/// Full end-to-end test through the typed client.
#[tokio::test]
async fn test_full_wiki_system_integration() {
    let system = WikiSystem::start(&WikiConfig::default(), MemoryStore::default())
        .await
        .expect("Failed to start system");
    let client = &system.client;

    client
        .create_page("Home", "# Welcome")
        .await
        .expect("Failed to create page");

    let lookup = client.get_page("Home").await.expect("Failed to get page");
    assert!(lookup.found);
    let id = lookup.id.expect("Page has no id");
    assert_eq!(lookup.raw_content.as_deref(), Some("# Welcome"));

    client
        .save_page(id, "# Welcome back")
        .await
        .expect("Failed to save page");
    let lookup = client.get_page("Home").await.expect("Failed to get page");
    assert_eq!(lookup.raw_content.as_deref(), Some("# Welcome back"));

    client.delete_page(id).await.expect("Failed to delete page");
    assert!(!client.get_page("Home").await.unwrap().found);
    assert!(client.all_pages().await.unwrap().is_empty());

    system.shutdown().await.expect("Failed to shut down");
}

#[tokio::test]
async fn test_concurrent_clients_see_consistent_state() {
    let system = WikiSystem::start(&WikiConfig::default(), MemoryStore::default())
        .await
        .expect("Failed to start system");

    let mut tasks = Vec::new();
    for i in 0..20 {
        let client = system.client.clone();
        tasks.push(tokio::spawn(async move {
            client.create_page(&format!("Page {i:02}"), "body").await
        }));
    }
    for task in tasks {
        task.await.unwrap().expect("Failed to create page");
    }

    let pages = system.client.all_pages().await.unwrap();
    assert_eq!(pages.len(), 20);
    assert_eq!(pages.first().map(String::as_str), Some("Page 00"));
    assert_eq!(pages.last().map(String::as_str), Some("Page 19"));

    system.shutdown().await.expect("Failed to shut down");
}

#[tokio::test]
async fn test_duplicate_create_surfaces_db_error() {
    let system = WikiSystem::start(&WikiConfig::default(), MemoryStore::default())
        .await
        .unwrap();

    system.client.create_page("Home", "a").await.unwrap();
    let err = system.client.create_page("Home", "b").await.unwrap_err();
    assert!(matches!(err, ClientError::Wiki(WikiError::DbError(_))));

    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_chat_lines_are_relayed() {
    let system = WikiSystem::start(&WikiConfig::default(), MemoryStore::default())
        .await
        .unwrap();
    let mut listener = system.bus.consumer("chat.to.client").await.unwrap();

    let echoed = system
        .bus
        .request("chat.to.server", Envelope::new("hello"))
        .await
        .unwrap();
    assert!(echoed.body().as_str().unwrap().ends_with(": hello"));

    let relayed = tokio::time::timeout(Duration::from_secs(1), listener.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(relayed.body(), echoed.body());

    drop(listener);
    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_startup_stops_at_first_failing_stage() {
    let store = MemoryStore::default();
    store.set_online(false);

    let result = WikiSystem::start(&WikiConfig::default(), store).await;
    assert!(matches!(
        result,
        Err(StartupError::Database(DatabaseStartError::Connect(_)))
    ));
}

#[tokio::test]
async fn test_chat_relay_address_clash_aborts_startup() {
    let mut config = WikiConfig::default();
    config.chat.inbound = config.database.queue.clone();

    let result = WikiSystem::start(&config, MemoryStore::default()).await;
    assert!(matches!(
        result,
        Err(StartupError::ChatRelay(ChatRelayError::Bus(
            BusError::DuplicateConsumer(_)
        )))
    ));
}

#[tokio::test]
async fn test_chat_relay_loopback_aborts_startup() {
    let mut config = WikiConfig::default();
    config.chat.outbound = config.chat.inbound.clone();

    let result = WikiSystem::start(&config, MemoryStore::default()).await;
    assert!(matches!(
        result,
        Err(StartupError::ChatRelay(ChatRelayError::Loopback(_)))
    ));
}

#[tokio::test]
async fn test_requests_after_shutdown_fail_with_bus_closed() {
    let system = WikiSystem::start(&WikiConfig::default(), MemoryStore::default())
        .await
        .unwrap();
    let client = system.client.clone();
    system.shutdown().await.unwrap();

    let err = client.all_pages().await.unwrap_err();
    assert_eq!(err, ClientError::Bus(BusError::BusClosed));
}
