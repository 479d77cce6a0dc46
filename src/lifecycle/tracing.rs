//! # Logging
//!
//! [`setup_tracing`] installs a compact `tracing-subscriber` formatter filtered
//! by `RUST_LOG`. Module paths are hidden; records carry structured fields
//! instead (`address`, `action`, `correlation_id`, `state`, `delay_ms`).
//!
//! ```bash
//! # Lifecycle only: start-up stages, connects, reconnects, shutdown
//! RUST_LOG=info cargo run -- --client
//!
//! # Every message on the bus and every state change of the socket client
//! RUST_LOG=debug cargo run
//!
//! # Only the bus
//! RUST_LOG=wiki_bus::framework=debug cargo run
//! ```
//!
//! Levels are used consistently: `info` for lifecycle, `debug` for per-message
//! traffic, `warn` for failures that are recovered from, `error` for failures
//! that end an operation.
//!
//! With `RUST_LOG=debug`, a create followed by a lookup reads:
//!
//! ```text
//! DEBUG request: Sending request address="wikidb.queue" action=create-page
//! DEBUG Dispatch action=create-page request=CreatePage(..) correlation_id=Some(1)
//! INFO Created id=1 title=Home
//! DEBUG Reply action=create-page
//! DEBUG request: Sending request address="wikidb.queue" action=get-page
//! ```

/// Installs the global subscriber. Call once, early in `main`.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
