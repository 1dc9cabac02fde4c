//! # assistants-mcp
//!
//! An MCP server that exposes an assistants-style API (assistants, threads,
//! messages, runs and run steps) as tools, plus a catalog of read-only
//! templates and documentation.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use assistants_mcp_core::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = AssistantsMcpConfig::load()?;
//!     let server = McpServerBuilder::from_config(config)
//!         .build_initialized()
//!         .await?;
//!
//!     Arc::new(server)
//!         .run(LineSource::stdin(), LineSink::stdout())
//!         .await
//! }
//! ```
//!
//! ## Architecture
//!
//! - **provider**: the backend trait, its factories and the registry that
//!   picks one per call
//! - **tools**: one validated handler per tool, grouped by category
//! - **resources**: bundled templates, docs and workflow examples
//! - **mcp**: JSON-RPC framing, session lifecycle and error mapping
//!
//! ## Feature Flags
//!
//! - `provider-openai` (default): HTTP backend for the OpenAI assistants API

pub mod config;
pub mod error;
pub mod mcp;
pub mod provider;
pub mod resources;
pub mod tools;

#[cfg(test)]
mod test_support;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{AssistantsMcpConfig, HealthPolicy, ProviderConfig};
    pub use crate::error::{AssistantsError, ProviderError, ProviderErrorKind, Result};
    pub use crate::mcp::{
        JsonRpcRequest, JsonRpcResponse, LineSink, LineSource, McpServer, McpServerBuilder,
    };
    pub use crate::provider::{
        AssistantsProvider, InMemoryProvider, ProviderFactory, ProviderRegistry,
    };
    pub use crate::resources::{ResourceCatalog, ResourceCategory};
    pub use crate::tools::{CallContext, ToolCategory, ToolHandler, ToolHandlerRegistry};
}
