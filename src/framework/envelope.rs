//! # Envelopes
//!
//! An [`Envelope`] is the unit that travels over the bus: a JSON body, a set of
//! string headers and the deadline a requester is willing to wait for a reply.

use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Header carrying the operation tag understood by a consumer.
pub const ACTION_HEADER: &str = "action";

/// Deadline applied when the sender does not pick one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Header map. Keys are unique; a later insert replaces the earlier value.
pub type Headers = BTreeMap<String, String>;

/// A message body plus its delivery metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    body: Value,
    headers: Headers,
    timeout: Duration,
}

impl Envelope {
    pub fn new(body: impl Into<Value>) -> Self {
        Self {
            body: body.into(),
            headers: Headers::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// An envelope with a `null` body.
    pub fn empty() -> Self {
        Self::new(Value::Null)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Shorthand for `with_header(ACTION_HEADER, action)`.
    pub fn with_action(self, action: impl Into<String>) -> Self {
        self.with_header(ACTION_HEADER, action)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn into_body(self) -> Value {
        self.body
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn headers_are_unique_and_last_write_wins() {
        let envelope = Envelope::new(json!({"page": "Home"}))
            .with_action("all-pages")
            .with_action("get-page");

        assert_eq!(envelope.headers().len(), 1);
        assert_eq!(envelope.header(ACTION_HEADER), Some("get-page"));
        assert_eq!(envelope.timeout(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn empty_envelope_has_null_body() {
        let envelope = Envelope::empty().with_timeout(Duration::from_millis(5));
        assert!(envelope.body().is_null());
        assert_eq!(envelope.timeout(), Duration::from_millis(5));
        assert_eq!(envelope.header(ACTION_HEADER), None);
    }
}
