//! Message tools

use async_trait::async_trait;
use serde_json::{Value, json};

use super::handler::{ToolCategory, ToolDefinition, ToolHandler, with_tool_context};
use super::schema::SchemaBuilder;
use super::validation::{ArgValidator, ValidationFailure, decode, str_arg};
use crate::error::Result;
use crate::provider::{AssistantsProvider, ListParams};

/// Longest message body accepted
const MAX_CONTENT_LEN: usize = 256_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOp {
    Create,
    List,
    Get,
    Update,
    Delete,
}

impl MessageOp {
    pub const ALL: [MessageOp; 5] = [
        MessageOp::Create,
        MessageOp::List,
        MessageOp::Get,
        MessageOp::Update,
        MessageOp::Delete,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    fn description(&self) -> &'static str {
        match self {
            MessageOp::Create => "Add a message to a thread.",
            MessageOp::List => "List the messages of a thread with cursor pagination.",
            MessageOp::Get => "Retrieve one message from a thread.",
            MessageOp::Update => "Replace a message's metadata.",
            MessageOp::Delete => "Delete a message from a thread.",
        }
    }

    fn input_schema(&self) -> Value {
        let builder = SchemaBuilder::new().id("thread_id", "thread_", "Thread id");
        match self {
            MessageOp::Create => builder
                .property(
                    "role",
                    json!({ "type": "string", "enum": ["user", "assistant"] }),
                    true,
                )
                .property(
                    "content",
                    json!({ "type": "string", "maxLength": MAX_CONTENT_LEN, "description": "Message text" }),
                    true,
                )
                .property("attachments", json!({ "type": "array" }), false)
                .metadata(),
            MessageOp::List => builder.pagination("msg_"),
            MessageOp::Get | MessageOp::Delete => builder.id("message_id", "msg_", "Message id"),
            MessageOp::Update => builder.id("message_id", "msg_", "Message id").metadata(),
        }
        .build()
    }

    async fn call(&self, args: Value, provider: &dyn AssistantsProvider) -> Result<Value> {
        let tool = self.name();
        let thread_id = str_arg(tool, &args, "thread_id")?;
        let value = match self {
            MessageOp::Create => {
                let request = decode(tool, &args)?;
                serde_json::to_value(provider.create_message(thread_id, request).await?)?
            }
            MessageOp::List => {
                let params: ListParams = decode(tool, &args)?;
                serde_json::to_value(provider.list_messages(thread_id, params).await?)?
            }
            MessageOp::Get => {
                let id = str_arg(tool, &args, "message_id")?;
                serde_json::to_value(provider.get_message(thread_id, id).await?)?
            }
            MessageOp::Update => {
                let id = str_arg(tool, &args, "message_id")?;
                let request = decode(tool, &args)?;
                serde_json::to_value(provider.update_message(thread_id, id, request).await?)?
            }
            MessageOp::Delete => {
                let id = str_arg(tool, &args, "message_id")?;
                serde_json::to_value(provider.delete_message(thread_id, id).await?)?
            }
        };
        Ok(value)
    }
}

#[async_trait]
impl ToolHandler for MessageOp {
    fn name(&self) -> &'static str {
        match self {
            MessageOp::Create => "message-create",
            MessageOp::List => "message-list",
            MessageOp::Get => "message-get",
            MessageOp::Update => "message-update",
            MessageOp::Delete => "message-delete",
        }
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Message
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
        v.required_id("thread_id", "thread_");
        match self {
            MessageOp::Create => {
                v.required_enum("role", &["user", "assistant"])
                    .required_str("content", MAX_CONTENT_LEN)
                    .optional_array("attachments")
                    .optional_metadata();
            }
            MessageOp::List => {
                v.pagination("msg_");
            }
            MessageOp::Get | MessageOp::Delete => {
                v.required_id("message_id", "msg_");
            }
            MessageOp::Update => {
                v.required_id("message_id", "msg_").optional_metadata();
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{AssistantsProvider, CreateThreadRequest, InMemoryProvider};

    #[test]
    fn test_create_requires_role_and_content() {
        let err = MessageOp::Create
            .validate(&json!({ "thread_id": "thread_1" }))
            .unwrap_err();
        let fields: Vec<_> = err.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["role", "content"]);
    }

    #[test]
    fn test_list_cursor_prefix() {
        let args = json!({ "thread_id": "thread_1", "after": "run_1" });
        assert!(MessageOp::List.validate(&args).is_err());
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let provider = InMemoryProvider::new();
        let thread = provider
            .create_thread(CreateThreadRequest::default())
            .await
            .unwrap();

        for text in ["first", "second", "third"] {
            MessageOp::Create
                .execute(
                    json!({ "thread_id": thread.id, "role": "user", "content": text }),
                    &provider,
                )
                .await
                .unwrap();
        }

        let page = MessageOp::List
            .execute(
                json!({ "thread_id": thread.id, "limit": 2, "order": "asc" }),
                &provider,
            )
            .await
            .unwrap();
        assert_eq!(page["data"].as_array().unwrap().len(), 2);
        assert_eq!(page["has_more"], true);
        assert_eq!(page["data"][0]["content"][0]["text"]["value"], "first");
    }
}
