//! Assistant tools

use async_trait::async_trait;
use serde_json::Value;

use super::handler::{ToolCategory, ToolDefinition, ToolHandler, with_tool_context};
use super::schema::SchemaBuilder;
use super::validation::{
    ArgValidator, MAX_DESCRIPTION_LEN, MAX_INSTRUCTIONS_LEN, MAX_NAME_LEN, ValidationFailure,
    decode, str_arg,
};
use crate::error::Result;
use crate::provider::{AssistantsProvider, ListParams};

/// Operations on assistants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssistantOp {
    Create,
    List,
    Get,
    Update,
    Delete,
}

impl AssistantOp {
    pub const ALL: [AssistantOp; 5] = [
        AssistantOp::Create,
        AssistantOp::List,
        AssistantOp::Get,
        AssistantOp::Update,
        AssistantOp::Delete,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    fn description(&self) -> &'static str {
        match self {
            AssistantOp::Create => {
                "Create an assistant with a model, instructions and optional tools."
            }
            AssistantOp::List => "List assistants with cursor pagination.",
            AssistantOp::Get => "Retrieve an assistant by id.",
            AssistantOp::Update => "Modify an assistant. Omitted fields are left unchanged.",
            AssistantOp::Delete => "Delete an assistant.",
        }
    }

    fn input_schema(&self) -> Value {
        let builder = SchemaBuilder::new();
        match self {
            AssistantOp::Create => builder
                .string("model", "Model id, e.g. gpt-4o", true)
                .name()
                .description()
                .instructions("System instructions for the assistant")
                .assistant_tools()
                .metadata()
                .sampling(),
            AssistantOp::List => builder.pagination("asst_"),
            AssistantOp::Get | AssistantOp::Delete => {
                builder.id("assistant_id", "asst_", "Assistant id")
            }
            AssistantOp::Update => builder
                .id("assistant_id", "asst_", "Assistant id")
                .string("model", "Model id", false)
                .name()
                .description()
                .instructions("System instructions for the assistant")
                .assistant_tools()
                .metadata()
                .sampling(),
        }
        .build()
    }

    async fn call(&self, args: Value, provider: &dyn AssistantsProvider) -> Result<Value> {
        let tool = self.name();
        let value = match self {
            AssistantOp::Create => {
                serde_json::to_value(provider.create_assistant(decode(tool, &args)?).await?)?
            }
            AssistantOp::List => {
                let params: ListParams = decode(tool, &args)?;
                serde_json::to_value(provider.list_assistants(params).await?)?
            }
            AssistantOp::Get => {
                let id = str_arg(tool, &args, "assistant_id")?;
                serde_json::to_value(provider.get_assistant(id).await?)?
            }
            AssistantOp::Update => {
                let id = str_arg(tool, &args, "assistant_id")?;
                let request = decode(tool, &args)?;
                serde_json::to_value(provider.update_assistant(id, request).await?)?
            }
            AssistantOp::Delete => {
                let id = str_arg(tool, &args, "assistant_id")?;
                serde_json::to_value(provider.delete_assistant(id).await?)?
            }
        };
        Ok(value)
    }
}

#[async_trait]
impl ToolHandler for AssistantOp {
    fn name(&self) -> &'static str {
        match self {
            AssistantOp::Create => "assistant-create",
            AssistantOp::List => "assistant-list",
            AssistantOp::Get => "assistant-get",
            AssistantOp::Update => "assistant-update",
            AssistantOp::Delete => "assistant-delete",
        }
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Assistant
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
            AssistantOp::Create => {
                v.required_str("model", 256)
                    .optional_str("name", MAX_NAME_LEN)
                    .optional_str("description", MAX_DESCRIPTION_LEN)
                    .optional_str("instructions", MAX_INSTRUCTIONS_LEN)
                    .optional_tools()
                    .optional_metadata()
                    .optional_number("temperature", 0.0, 2.0)
                    .optional_number("top_p", 0.0, 1.0);
            }
            AssistantOp::List => {
                v.pagination("asst_");
            }
            AssistantOp::Get | AssistantOp::Delete => {
                v.required_id("assistant_id", "asst_");
            }
            AssistantOp::Update => {
                v.required_id("assistant_id", "asst_")
                    .optional_str("model", 256)
                    .optional_str("name", MAX_NAME_LEN)
                    .optional_str("description", MAX_DESCRIPTION_LEN)
                    .optional_str("instructions", MAX_INSTRUCTIONS_LEN)
                    .optional_tools()
                    .optional_metadata()
                    .optional_number("temperature", 0.0, 2.0)
                    .optional_number("top_p", 0.0, 1.0);
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
    use crate::error::AssistantsError;
    use crate::provider::InMemoryProvider;
    use serde_json::json;

    #[test]
    fn test_names_round_trip() {
        for op in AssistantOp::ALL {
            assert_eq!(AssistantOp::from_name(op.name()), Some(op));
            assert_eq!(op.definition().category, ToolCategory::Assistant);
        }
        assert_eq!(AssistantOp::from_name("assistant-explode"), None);
    }

    #[test]
    fn test_create_requires_model() {
        let err = AssistantOp::Create.validate(&json!({ "name": "x" })).unwrap_err();
        assert_eq!(err.errors[0].field, "model");
    }

    #[test]
    fn test_update_checks_id_prefix() {
        assert!(AssistantOp::Update
            .validate(&json!({ "assistant_id": "thread_1", "name": "x" }))
            .is_err());
        assert!(AssistantOp::Update
            .validate(&json!({ "assistant_id": "asst_1", "name": "x" }))
            .is_ok());
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let provider = InMemoryProvider::new();
        let created = AssistantOp::Create
            .execute(
                json!({ "model": "gpt-4o", "name": "Reviewer", "metadata": { "team": "qa" } }),
                &provider,
            )
            .await
            .unwrap();
        assert_eq!(created["name"], "Reviewer");

        let id = created["id"].as_str().unwrap();
        let fetched = AssistantOp::Get
            .execute(json!({ "assistant_id": id }), &provider)
            .await
            .unwrap();
        assert_eq!(fetched["metadata"]["team"], "qa");
    }

    #[tokio::test]
    async fn test_provider_error_carries_tool_context() {
        let provider = InMemoryProvider::new();
        let err = AssistantOp::Get
            .execute(json!({ "assistant_id": "asst_missing" }), &provider)
            .await
            .unwrap_err();

        match err {
            AssistantsError::Tool { category, tool, source } => {
                assert_eq!(category, ToolCategory::Assistant);
                assert_eq!(tool, "assistant-get");
                assert!(matches!(*source, AssistantsError::Provider(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
