//! Request-side wrappers that hide raw envelopes from callers.

pub mod bus_client;
pub mod wiki_client;

pub use bus_client::*;
pub use wiki_client::*;
