//! # wiki-bus
//!
//! A small wiki whose request handling is decoupled from storage by an
//! in-process message bus, plus a long-lived socket channel to a peer that
//! recovers on its own.
//!
//! ## Design
//!
//! ### One owner for the data
//! Page storage belongs to a single [`WikiDatabaseActor`](wiki_actor::WikiDatabaseActor).
//! Any number of request handlers talk to it through the bus; the actor
//! drains its mailbox one message at a time, so access to the store is
//! serialized without locks in the callers.
//!
//! ### Actions, not methods
//! Every request names its operation in an `action` header. The header is
//! decoded into a closed [`Action`](wiki_actor::Action) set before dispatch;
//! missing or unknown actions are answered with a failure code and never
//! reach the store.
//!
//! ### Exactly one answer
//! A request resolves once: with a reply, with the consumer's failure code,
//! or with a bus error (no consumer, timeout, dropped message, bus closed).
//!
//! ### Errors
//! Each layer has its own `thiserror` enum, see [`framework::BusError`],
//! [`wiki_actor::WikiError`], [`store::StoreError`], [`clients::ClientError`],
//! [`chat_relay::ChatRelayError`], [`socket::SocketError`], [`config::ConfigError`] and
//! [`lifecycle::StartupError`].
//!
//! ## Module Tour
//!
//! - [`framework`]: the message bus, envelopes, and a mock consumer for tests.
//! - [`wiki_actor`]: the database actor and its action codec.
//! - [`store`]: the storage interface and an in-memory pool.
//! - [`clients`]: typed request wrappers ([`WikiClient`](clients::WikiClient)).
//! - [`socket`]: reconnecting client and prefix-checked server.
//! - [`chat_relay`]: timestamps chat lines between two bus addresses.
//! - [`lifecycle`]: ordered start-up, shutdown and logging setup.
//! - [`config`]: TOML settings.
//!
//! ## Running
//!
//! ```bash
//! RUST_LOG=info cargo run -- --server
//! RUST_LOG=debug cargo run -- wiki.toml --client
//! ```

pub mod chat_relay;
pub mod clients;
pub mod config;
pub mod framework;
pub mod lifecycle;
pub mod model;
pub mod socket;
pub mod store;
pub mod wiki_actor;
