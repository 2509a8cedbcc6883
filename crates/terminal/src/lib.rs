//! Terminal chat client for foliobot.
//!
//! [`SessionController`] is the client-side state machine: standard command
//! mode, AI chat mode, deferred quit while a response streams, a bounded
//! command history with recall, and two histories persisted write-through
//! to a [`SessionStore`]. [`ChatClient`] talks to the gateway and turns its
//! SSE body back into [`StreamEvent`](foliobot_core::StreamEvent)s.

pub mod client;
pub mod commands;
pub mod history;
pub mod session;
pub mod store;

pub use client::{ChatClient, ClientError};
pub use commands::StandardCommand;
pub use history::CommandHistory;
pub use session::{LogEntry, Mode, SessionController, Submission};
pub use store::{JsonFileStore, MemorySessionStore, SessionStore, SessionStoreError};
