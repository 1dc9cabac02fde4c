//! Thread tools

use async_trait::async_trait;
use serde_json::Value;

use super::handler::{ToolCategory, ToolDefinition, ToolHandler, with_tool_context};
use super::schema::SchemaBuilder;
use super::validation::{ArgValidator, ValidationFailure, decode, str_arg};
use crate::error::Result;
use crate::provider::AssistantsProvider;
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadOp {
    Create,
    Get,
    Update,
    Delete,
}

impl ThreadOp {
    pub const ALL: [ThreadOp; 4] = [
        ThreadOp::Create,
        ThreadOp::Get,
        ThreadOp::Update,
        ThreadOp::Delete,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    fn description(&self) -> &'static str {
        match self {
            ThreadOp::Create => "Create a conversation thread, optionally seeded with messages.",
            ThreadOp::Get => "Retrieve a thread by id.",
            ThreadOp::Update => "Replace a thread's metadata or tool resources.",
            ThreadOp::Delete => "Delete a thread together with its messages and runs.",
        }
    }

    fn input_schema(&self) -> Value {
        let builder = SchemaBuilder::new();
        match self {
            ThreadOp::Create => builder
                .property(
                    "messages",
                    json!({
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "role": { "type": "string", "enum": ["user", "assistant"] },
                                "content": { "type": "string" }
                            },
                            "required": ["role", "content"]
                        },
                        "description": "Initial messages",
                    }),
                    false,
                )
                .metadata()
                .property("tool_resources", json!({ "type": "object" }), false),
            ThreadOp::Get | ThreadOp::Delete => builder.id("thread_id", "thread_", "Thread id"),
            ThreadOp::Update => builder
                .id("thread_id", "thread_", "Thread id")
                .metadata()
                .property("tool_resources", json!({ "type": "object" }), false),
        }
        .build()
    }

    async fn call(&self, args: Value, provider: &dyn AssistantsProvider) -> Result<Value> {
        let tool = self.name();
        let value = match self {
            ThreadOp::Create => {
                serde_json::to_value(provider.create_thread(decode(tool, &args)?).await?)?
            }
            ThreadOp::Get => {
                let id = str_arg(tool, &args, "thread_id")?;
                serde_json::to_value(provider.get_thread(id).await?)?
            }
            ThreadOp::Update => {
                let id = str_arg(tool, &args, "thread_id")?;
                let request = decode(tool, &args)?;
                serde_json::to_value(provider.update_thread(id, request).await?)?
            }
            ThreadOp::Delete => {
                let id = str_arg(tool, &args, "thread_id")?;
                serde_json::to_value(provider.delete_thread(id).await?)?
            }
        };
        Ok(value)
    }
}

#[async_trait]
impl ToolHandler for ThreadOp {
    fn name(&self) -> &'static str {
        match self {
            ThreadOp::Create => "thread-create",
            ThreadOp::Get => "thread-get",
            ThreadOp::Update => "thread-update",
            ThreadOp::Delete => "thread-delete",
        }
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Thread
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            category: self.category(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }

    fn validate(&self, args: &Value) -> std::result::Result<(), ValidationFailure> {
        let mut v = ArgValidator::new(self.name(), args);
        match self {
            ThreadOp::Create => {
                v.optional_messages()
                    .optional_metadata()
                    .optional_object("tool_resources");
            }
            ThreadOp::Get | ThreadOp::Delete => {
                v.required_id("thread_id", "thread_");
            }
            ThreadOp::Update => {
                v.required_id("thread_id", "thread_")
                    .optional_metadata()
                    .optional_object("tool_resources");
            }
        }
        v.finish()
    }

    async fn execute(&self, args: Value, provider: &dyn AssistantsProvider) -> Result<Value> {
        self.call(args, provider)
            .await
            .map_err(|e| with_tool_context(self.category(), self.name(), e))
    }
}
