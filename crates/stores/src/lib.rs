//! Store implementations for foliobot.
//!
//! - [`SqliteStore`]: the portfolio database, serving both the content tables
//!   and the assistant configuration
//! - [`InMemoryContentStore`] / [`InMemoryConfigStore`]: process-local stores
//!   for tests and demos
//! - [`UnavailableStore`]: stands in when the database cannot be opened, so
//!   every read degrades instead of the server refusing to start

pub mod in_memory;
pub mod migrations;
pub mod sqlite;
pub mod unavailable;

pub use in_memory::{InMemoryConfigStore, InMemoryContentStore};
pub use sqlite::SqliteStore;
pub use unavailable::UnavailableStore;
