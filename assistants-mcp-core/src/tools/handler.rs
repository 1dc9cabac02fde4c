//! Tool handler trait and definitions

use crate::error::{AssistantsError, Result};
use crate::provider::AssistantsProvider;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::validation::ValidationFailure;

/// Domain entity a tool operates on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolCategory {
    Assistant,
    Thread,
    Message,
    Run,
    RunStep,
}

impl ToolCategory {
    pub const ALL: [ToolCategory; 5] = [
        ToolCategory::Assistant,
        ToolCategory::Thread,
        ToolCategory::Message,
        ToolCategory::Run,
        ToolCategory::RunStep,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolCategory::Assistant => "assistant",
            ToolCategory::Thread => "thread",
            ToolCategory::Message => "message",
            ToolCategory::Run => "run",
            ToolCategory::RunStep => "run-step",
        }
    }
}

impl std::fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Public description of a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Unique kebab-case name
    pub name: String,
    pub category: ToolCategory,
    pub description: String,
    /// JSON Schema for the arguments object
    pub input_schema: Value,
}

/// A callable tool backed by one provider operation
///
/// `validate` must reject bad input before `execute` is ever called;
/// `execute` performs exactly one provider call.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Unique tool name
    fn name(&self) -> &'static str;

    fn category(&self) -> ToolCategory;

    fn definition(&self) -> ToolDefinition;

    /// Check argument shape and values without side effects
    fn validate(&self, args: &Value) -> std::result::Result<(), ValidationFailure>;

    /// Run the tool against a provider
    async fn execute(&self, args: Value, provider: &dyn AssistantsProvider) -> Result<Value>;
}

/// Attach a tool's category and name to an execution failure.
pub(crate) fn with_tool_context(
    category: ToolCategory,
    tool: &str,
    error: AssistantsError,
) -> AssistantsError {
    match error {
        AssistantsError::Tool { .. } => error,
        other => AssistantsError::Tool {
            category,
            tool: tool.to_string(),
            source: Box::new(other),
        },
    }
}

/// Per-call execution context
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    /// Bound on the provider call
    pub timeout: Option<Duration>,
    /// Fires when the client cancels the request
    pub cancellation: CancellationToken,
    /// Name of the provider serving the call, for error reporting
    pub provider: Option<String>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }
}
