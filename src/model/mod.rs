//! Pure data structures: the stored page record and the JSON bodies exchanged
//! on the wiki queue.

pub mod page;

pub use page::*;
