//! # Mock Consumer
//!
//! Utilities for testing request-side code (such as the wiki client) without
//! running the real data actor.
//!
//! A [`MockConsumer`] registers on a bus address and answers each incoming
//! request with the next queued expectation. Expectations are matched in
//! order against the request's `action` header.
//!
//! ```rust
//! use serde_json::json;
//! use wiki_bus::framework::{mock::MockConsumer, Envelope, MessageBus};
//!
//! #[tokio::main]
//! async fn main() {
//!     let bus = MessageBus::new();
//!     let mock = MockConsumer::register(&bus, "wikidb.queue").await.unwrap();
//!     mock.expect_action("all-pages").return_ok(json!({"pages": ["Home"]}));
//!
//!     let reply = bus
//!         .request("wikidb.queue", Envelope::empty().with_action("all-pages"))
//!         .await
//!         .unwrap();
//!     assert_eq!(reply.body(), &json!({"pages": ["Home"]}));
//!     mock.verify();
//! }
//! ```
//!
//! Failures that are hard to provoke with a real store (timeouts, database
//! errors) are one `return_failure` away.

use crate::framework::bus::{MessageBus, MessageConsumer};
use crate::framework::envelope::ACTION_HEADER;
use crate::framework::error::BusError;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Code used to fail requests that matched no expectation.
pub const UNEXPECTED_REQUEST: i32 = -1;

struct Expectation {
    action: String,
    response: Result<Value, (i32, String)>,
}

#[derive(Default)]
struct MockState {
    expectations: VecDeque<Expectation>,
    received: Vec<(Option<String>, Value)>,
    mismatches: Vec<String>,
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A scripted consumer with expectation tracking.
pub struct MockConsumer {
    state: Arc<Mutex<MockState>>,
    _handle: tokio::task::JoinHandle<()>,
}

impl MockConsumer {
    /// Registers on `address` and starts answering requests.
    pub async fn register(bus: &MessageBus, address: &str) -> Result<Self, BusError> {
        let consumer = bus.consumer(address).await?;
        let state = Arc::new(Mutex::new(MockState::default()));
        let handle = tokio::spawn(Self::serve(consumer, state.clone()));
        Ok(Self {
            state,
            _handle: handle,
        })
    }

    async fn serve(mut consumer: MessageConsumer, state: Arc<Mutex<MockState>>) {
        while let Some(message) = consumer.recv().await {
            let action = message.header(ACTION_HEADER).map(str::to_owned);
            let response = {
                let mut state = lock(&state);
                state.received.push((action.clone(), message.body().clone()));
                match state.expectations.pop_front() {
                    Some(expected) if Some(expected.action.as_str()) == action.as_deref() => {
                        expected.response
                    }
                    Some(expected) => {
                        let mismatch =
                            format!("expected action '{}', got {:?}", expected.action, action);
                        state.mismatches.push(mismatch.clone());
                        Err((UNEXPECTED_REQUEST, mismatch))
                    }
                    None => {
                        let mismatch = format!("unexpected request with action {:?}", action);
                        state.mismatches.push(mismatch.clone());
                        Err((UNEXPECTED_REQUEST, mismatch))
                    }
                }
            };

            match response {
                Ok(body) => message.reply(body),
                Err((code, text)) => message.fail(code, text),
            }
        }
    }

    /// Queues an expectation for a request carrying `action`.
    pub fn expect_action(&self, action: &str) -> ExpectationBuilder {
        ExpectationBuilder {
            action: action.to_owned(),
            state: self.state.clone(),
        }
    }

    /// `(action header, body)` of every request seen so far.
    pub fn received(&self) -> Vec<(Option<String>, Value)> {
        lock(&self.state).received.clone()
    }

    /// Panics if an expectation is left over or a request matched none.
    pub fn verify(&self) {
        let state = lock(&self.state);
        if !state.mismatches.is_empty() {
            panic!("Unexpected requests: {:?}", state.mismatches);
        }
        if !state.expectations.is_empty() {
            panic!(
                "Not all expectations were met. {} remaining",
                state.expectations.len()
            );
        }
    }
}

/// Builder for one queued answer.
pub struct ExpectationBuilder {
    action: String,
    state: Arc<Mutex<MockState>>,
}

impl ExpectationBuilder {
    /// Answer with a reply body.
    pub fn return_ok(self, body: impl Into<Value>) {
        lock(&self.state).expectations.push_back(Expectation {
            action: self.action,
            response: Ok(body.into()),
        });
    }

    /// Answer with a failure code and message.
    pub fn return_failure(self, code: i32, message: impl Into<String>) {
        lock(&self.state).expectations.push_back(Expectation {
            action: self.action,
            response: Err((code, message.into())),
        });
    }
}
