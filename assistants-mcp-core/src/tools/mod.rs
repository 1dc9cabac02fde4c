//! Tool handlers exposed over MCP
//!
//! Each tool maps one-to-one onto an [`AssistantsProvider`] operation.
//! Handlers are grouped by the entity they manage:
//! - assistant: create, list, get, update, delete
//! - thread: create, get, update, delete
//! - message: create, list, get, update, delete
//! - run: create, list, get, update, cancel, submit tool outputs
//! - run-step: list, get
//!
//! Arguments are validated before the provider is touched, and every field
//! problem is reported together.
//!
//! # Example
//!
//! ```rust,no_run
//! use assistants_mcp_core::provider::InMemoryProvider;
//! use assistants_mcp_core::tools::{CallContext, ToolHandlerRegistry};
//! use serde_json::json;
//!
//! # async fn example() -> assistants_mcp_core::error::Result<()> {
//! let registry = ToolHandlerRegistry::standard()?;
//! let provider = InMemoryProvider::new();
//! let assistant = registry
//!     .dispatch("assistant-create", json!({ "model": "gpt-4o" }), &provider, &CallContext::new())
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! [`AssistantsProvider`]: crate::provider::AssistantsProvider

mod assistant;
mod handler;
mod message;
mod registry;
mod run;
mod run_step;
mod schema;
mod thread;
mod validation;

pub use assistant::AssistantOp;
pub use handler::{CallContext, ToolCategory, ToolDefinition, ToolHandler};
pub use message::MessageOp;
pub use registry::{CategoryEntry, HANDLER_TABLE, HandlerStats, ToolHandlerRegistry};
pub use run::RunOp;
pub use run_step::RunStepOp;
pub use thread::ThreadOp;
pub use validation::{
    ArgValidator, MAX_DESCRIPTION_LEN, MAX_INSTRUCTIONS_LEN, MAX_METADATA_KEY_LEN,
    MAX_METADATA_PAIRS, MAX_METADATA_VALUE_LEN, MAX_NAME_LEN, ValidationError, ValidationFailure,
};

#[cfg(test)]
mod tests;
