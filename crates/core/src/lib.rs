//! # foliobot core
//!
//! Domain types, traits, and error definitions for the portfolio assistant.
//! This crate has **no framework dependencies**: it defines the domain model
//! that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the chat pipeline is a trait here:
//! - [`Provider`] generates model output as a stream of chunks
//! - [`Tool`] is a model-invocable function
//! - [`ContentStore`] and [`ConfigStore`] are the read contracts of the
//!   portfolio database
//!
//! Implementations live in their respective crates, and tests swap in
//! scripted or failing stand-ins.

pub mod conversation;
pub mod error;
pub mod message;
pub mod provider;
pub mod request;
pub mod store;
pub mod stream;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use conversation::{ConversationMessage, ConversationRole, MessagePart};
pub use error::{ProviderError, StoreError, ToolError};
pub use message::{Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, StreamChunk, ToolDefinition};
pub use request::{ChatRequest, LogContext};
pub use store::{Collection, ConfigStore, ContentStore, ContentQuery};
pub use stream::{FinishReason, StreamEvent};
pub use tool::{Tool, ToolCall, ToolInvocation, ToolRegistry, ToolResult};
