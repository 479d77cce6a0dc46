//! Start-up, shutdown and logging setup.

pub mod tracing;
pub mod wiki_system;

pub use self::tracing::setup_tracing;
pub use wiki_system::*;
