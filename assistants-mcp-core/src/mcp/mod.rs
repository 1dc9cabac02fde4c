//! Model Context Protocol (MCP) Server Implementation
//!
//! This module exposes the assistants tools and the bundled resource catalog
//! to MCP clients over JSON-RPC 2.0.
//!
//! # Example
//!
//! ```rust,no_run
//! use assistants_mcp_core::config::AssistantsMcpConfig;
//! use assistants_mcp_core::mcp::{LineSink, LineSource, McpServerBuilder};
//! use std::sync::Arc;
//!
//! # async fn example() -> assistants_mcp_core::error::Result<()> {
//! let config = AssistantsMcpConfig::load()?;
//! let server = McpServerBuilder::from_config(config)
//!     .build_initialized()
//!     .await?;
//!
//! Arc::new(server)
//!     .run(LineSource::stdin(), LineSink::stdout())
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Protocol Overview
//!
//! - `initialize` / `notifications/initialized` - Connection setup
//! - `ping` - Liveness check, allowed at any time
//! - `tools/list` - List the registered tools
//! - `tools/call` - Call a tool; `_meta.provider` picks a backend
//! - `resources/list` - List catalog entries
//! - `resources/read` - Read one catalog entry
//! - `notifications/cancelled` - Abort an in-flight tool call
//!
//! # References
//!
//! - [MCP Specification](https://modelcontextprotocol.io/specification)

mod protocol;
mod server;
mod transport;

pub use protocol::*;
pub use server::{McpServer, McpServerBuilder, McpServerConfig, SessionState, error_to_jsonrpc};
pub use transport::{LineSink, LineSource, MemorySink, MemorySource, MessageSink, MessageSource};
