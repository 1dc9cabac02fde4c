//! Tool handler registry
//!
//! The registry is built from a declarative [`CategoryEntry`] table, which is
//! the single source of truth for which tools exist and in what order they
//! are listed. Registration is fail-fast: a table naming an unknown tool, a
//! duplicate, or a handler that disagrees with its table entry is rejected.
//!
//! # Example
//!
//! ```rust
//! use assistants_mcp_core::tools::{HANDLER_TABLE, ToolHandlerRegistry};
//!
//! let registry = ToolHandlerRegistry::standard().unwrap();
//! assert_eq!(registry.len(), registry.stats().total_handlers);
//! registry.verify_against(HANDLER_TABLE).unwrap();
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::timeout;
use tracing::debug;

use super::assistant::AssistantOp;
use super::handler::{CallContext, ToolCategory, ToolDefinition, ToolHandler, with_tool_context};
use super::message::MessageOp;
use super::run::RunOp;
use super::run_step::RunStepOp;
use super::thread::ThreadOp;
use crate::error::{AssistantsError, Result};
use crate::provider::AssistantsProvider;

/// One category and the tools it contributes, in listing order
#[derive(Debug, Clone, Copy)]
pub struct CategoryEntry {
    pub category: ToolCategory,
    pub tools: &'static [&'static str],
}

/// Every tool the server exposes
pub const HANDLER_TABLE: &[CategoryEntry] = &[
    CategoryEntry {
        category: ToolCategory::Assistant,
        tools: &[
            "assistant-create",
            "assistant-list",
            "assistant-get",
            "assistant-update",
            "assistant-delete",
        ],
    },
    CategoryEntry {
        category: ToolCategory::Thread,
        tools: &["thread-create", "thread-get", "thread-update", "thread-delete"],
    },
    CategoryEntry {
        category: ToolCategory::Message,
        tools: &[
            "message-create",
            "message-list",
            "message-get",
            "message-update",
            "message-delete",
        ],
    },
    CategoryEntry {
        category: ToolCategory::Run,
        tools: &[
            "run-create",
            "run-list",
            "run-get",
            "run-update",
            "run-cancel",
            "run-submit-tool-outputs",
        ],
    },
    CategoryEntry {
        category: ToolCategory::RunStep,
        tools: &["run-step-list", "run-step-get"],
    },
];

/// Resolve a tool name to its built-in handler
fn builtin_handler(name: &str) -> Option<Arc<dyn ToolHandler>> {
    if let Some(op) = AssistantOp::from_name(name) {
        return Some(Arc::new(op));
    }
    if let Some(op) = ThreadOp::from_name(name) {
        return Some(Arc::new(op));
    }
    if let Some(op) = MessageOp::from_name(name) {
        return Some(Arc::new(op));
    }
    if let Some(op) = RunOp::from_name(name) {
        return Some(Arc::new(op));
    }
    RunStepOp::from_name(name).map(|op| Arc::new(op) as Arc<dyn ToolHandler>)
}

/// Counts derived from the registered handlers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerStats {
    pub total_handlers: usize,
    pub handlers_by_category: BTreeMap<ToolCategory, usize>,
    /// Tool names in listing order
    pub registered_tools: Vec<String>,
}

/// Registry of tool handlers keyed by name
pub struct ToolHandlerRegistry {
    handlers: Vec<Arc<dyn ToolHandler>>,
    index: HashMap<&'static str, usize>,
}

impl std::fmt::Debug for ToolHandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolHandlerRegistry")
            .field("tool_count", &self.handlers.len())
            .field(
                "tools",
                &self.handlers.iter().map(|h| h.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ToolHandlerRegistry {
    /// Registry over [`HANDLER_TABLE`]
    pub fn standard() -> Result<Self> {
        Self::from_table(HANDLER_TABLE)
    }

    /// Build a registry from a category table
    pub fn from_table(table: &[CategoryEntry]) -> Result<Self> {
        let mut registry = Self {
            handlers: Vec::new(),
            index: HashMap::new(),
        };

        for entry in table {
            for &name in entry.tools {
                let handler = builtin_handler(name).ok_or_else(|| {
                    AssistantsError::Registration(format!("no handler implements tool '{}'", name))
                })?;
                if handler.category() != entry.category {
                    return Err(AssistantsError::Registration(format!(
                        "tool '{}' is listed under '{}' but belongs to '{}'",
                        name,
                        entry.category,
                        handler.category()
                    )));
                }
                registry.register(handler)?;
            }
        }

        debug!(tools = registry.len(), "Tool handler registry built");
        Ok(registry)
    }

    /// Register a handler
    ///
    /// Returns an error if the name is taken or the handler's definition
    /// disagrees with its own name or category.
    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) -> Result<()> {
        let name = handler.name();
        if self.index.contains_key(name) {
            return Err(AssistantsError::Registration(format!(
                "tool '{}' is already registered",
                name
            )));
        }

        let definition = handler.definition();
        if definition.name != name || definition.category != handler.category() {
            return Err(AssistantsError::Registration(format!(
                "tool '{}' describes itself as '{}' ({})",
                name, definition.name, definition.category
            )));
        }

        self.index.insert(name, self.handlers.len());
        self.handlers.push(handler);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolHandler>> {
        self.index.get(name).map(|&i| &self.handlers[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Definitions in listing order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.handlers.iter().map(|h| h.definition()).collect()
    }

    pub fn stats(&self) -> HandlerStats {
        let mut handlers_by_category = BTreeMap::new();
        for handler in &self.handlers {
            *handlers_by_category.entry(handler.category()).or_insert(0) += 1;
        }
        HandlerStats {
            total_handlers: self.handlers.len(),
            handlers_by_category,
            registered_tools: self.handlers.iter().map(|h| h.name().to_string()).collect(),
        }
    }

    /// Check that the registry matches `table` exactly, name for name
    pub fn verify_against(&self, table: &[CategoryEntry]) -> Result<()> {
        let stats = self.stats();
        let expected: Vec<&str> = table.iter().flat_map(|e| e.tools.iter().copied()).collect();

        if stats.total_handlers != expected.len() {
            return Err(AssistantsError::Registration(format!(
                "registry holds {} tools but the table lists {}",
                stats.total_handlers,
                expected.len()
            )));
        }
        if stats.registered_tools != expected {
            return Err(AssistantsError::Registration(
                "registered tools differ from the table order".to_string(),
            ));
        }
        for entry in table {
            let count = stats
                .handlers_by_category
                .get(&entry.category)
                .copied()
                .unwrap_or(0);
            let listed: usize = table
                .iter()
                .filter(|e| e.category == entry.category)
                .map(|e| e.tools.len())
                .sum();
            if count != listed {
                return Err(AssistantsError::Registration(format!(
                    "category '{}' has {} tools, table lists {}",
                    entry.category, count, listed
                )));
            }
        }
        Ok(())
    }

    /// Validate and execute a tool against `provider`
    ///
    /// The provider call is bounded by `ctx.timeout` and abandoned as soon as
    /// `ctx.cancellation` fires.
    pub async fn dispatch(
        &self,
        name: &str,
        args: Value,
        provider: &dyn AssistantsProvider,
        ctx: &CallContext,
    ) -> Result<Value> {
        let handler = self
            .get(name)
            .ok_or_else(|| AssistantsError::UnknownTool(name.to_string()))?;

        handler.validate(&args)?;

        if ctx.cancellation.is_cancelled() {
            return Err(AssistantsError::Cancelled(format!(
                "'{}' cancelled before execution",
                name
            )));
        }

        let provider_name = ctx
            .provider
            .clone()
            .unwrap_or_else(|| provider.name().to_string());
        debug!(tool = %name, provider = %provider_name, "Dispatching tool call");

        let started = Instant::now();
        let execution = handler.execute(args, provider);

        let outcome = tokio::select! {
            _ = ctx.cancellation.cancelled() => {
                Err(AssistantsError::Cancelled(format!("'{}' cancelled", name)))
            }
            res = async {
                match ctx.timeout {
                    Some(limit) => match timeout(limit, execution).await {
                        Ok(res) => res,
                        Err(_) => Err(with_tool_context(
                            handler.category(),
                            handler.name(),
                            AssistantsError::ProviderTimeout {
                                provider: provider_name.clone(),
                                elapsed: started.elapsed(),
                            },
                        )),
                    },
                    None => execution.await,
                }
            } => res,
        };

        debug!(
            tool = %name,
            ok = outcome.is_ok(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Tool call finished"
        );
        outcome
    }
}
