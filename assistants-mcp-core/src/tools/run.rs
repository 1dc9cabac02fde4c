//! Run tools
//!
//! A run executes an assistant against a thread. When the assistant calls a
//! function the run stops in `requires_action` until `run-submit-tool-outputs`
//! answers every pending call.

use async_trait::async_trait;
use serde_json::{Value, json};

use super::handler::{ToolCategory, ToolDefinition, ToolHandler, with_tool_context};
use super::schema::SchemaBuilder;
use super::validation::{
    ArgValidator, MAX_INSTRUCTIONS_LEN, ValidationFailure, decode, str_arg,
};
use crate::error::Result;
use crate::provider::{AssistantsProvider, ListParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOp {
    Create,
    List,
    Get,
    Update,
    Cancel,
    SubmitToolOutputs,
}

impl RunOp {
    pub const ALL: [RunOp; 6] = [
        RunOp::Create,
        RunOp::List,
        RunOp::Get,
        RunOp::Update,
        RunOp::Cancel,
        RunOp::SubmitToolOutputs,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    fn description(&self) -> &'static str {
        match self {
            RunOp::Create => "Start a run of an assistant on a thread.",
            RunOp::List => "List the runs of a thread with cursor pagination.",
            RunOp::Get => "Retrieve a run, including its status and any required action.",
            RunOp::Update => "Replace a run's metadata.",
            RunOp::Cancel => "Cancel a run that has not finished.",
            RunOp::SubmitToolOutputs => {
                "Answer the function calls of a run waiting in requires_action."
            }
        }
    }

    fn input_schema(&self) -> Value {
        let builder = SchemaBuilder::new().id("thread_id", "thread_", "Thread id");
        match self {
            RunOp::Create => builder
                .id("assistant_id", "asst_", "Assistant to run")
                .string("model", "Override the assistant's model", false)
                .instructions("Override the assistant's instructions")
                .property(
                    "additional_instructions",
                    json!({ "type": "string", "maxLength": MAX_INSTRUCTIONS_LEN }),
                    false,
                )
                .assistant_tools()
                .metadata()
                .sampling()
                .property("max_prompt_tokens", json!({ "type": "integer", "minimum": 1 }), false)
                .property(
                    "max_completion_tokens",
                    json!({ "type": "integer", "minimum": 1 }),
                    false,
                ),
            RunOp::List => builder.pagination("run_"),
            RunOp::Get | RunOp::Cancel => builder.id("run_id", "run_", "Run id"),
            RunOp::Update => builder.id("run_id", "run_", "Run id").metadata(),
            RunOp::SubmitToolOutputs => builder.id("run_id", "run_", "Run id").property(
                "tool_outputs",
                json!({
                    "type": "array",
                    "minItems": 1,
                    "items": {
                        "type": "object",
                        "properties": {
                            "tool_call_id": { "type": "string" },
                            "output": { "type": "string" }
                        },
                        "required": ["tool_call_id", "output"]
                    }
                }),
                true,
            ),
        }
        .build()
    }

    async fn call(&self, args: Value, provider: &dyn AssistantsProvider) -> Result<Value> {
        let tool = self.name();
        let thread_id = str_arg(tool, &args, "thread_id")?;
        let value = match self {
            RunOp::Create => {
                let request = decode(tool, &args)?;
                serde_json::to_value(provider.create_run(thread_id, request).await?)?
            }
            RunOp::List => {
                let params: ListParams = decode(tool, &args)?;
                serde_json::to_value(provider.list_runs(thread_id, params).await?)?
            }
            RunOp::Get => {
                let id = str_arg(tool, &args, "run_id")?;
                serde_json::to_value(provider.get_run(thread_id, id).await?)?
            }
            RunOp::Update => {
                let id = str_arg(tool, &args, "run_id")?;
                let request = decode(tool, &args)?;
                serde_json::to_value(provider.update_run(thread_id, id, request).await?)?
            }
            RunOp::Cancel => {
                let id = str_arg(tool, &args, "run_id")?;
                serde_json::to_value(provider.cancel_run(thread_id, id).await?)?
            }
            RunOp::SubmitToolOutputs => {
                let id = str_arg(tool, &args, "run_id")?;
                let request = decode(tool, &args)?;
                serde_json::to_value(provider.submit_tool_outputs(thread_id, id, request).await?)?
            }
        };
        Ok(value)
    }
}

#[async_trait]
impl ToolHandler for RunOp {
    fn name(&self) -> &'static str {
        match self {
            RunOp::Create => "run-create",
            RunOp::List => "run-list",
            RunOp::Get => "run-get",
            RunOp::Update => "run-update",
            RunOp::Cancel => "run-cancel",
            RunOp::SubmitToolOutputs => "run-submit-tool-outputs",
        }
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Run
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
            RunOp::Create => {
                v.required_id("assistant_id", "asst_")
                    .optional_str("model", 256)
                    .optional_str("instructions", MAX_INSTRUCTIONS_LEN)
                    .optional_str("additional_instructions", MAX_INSTRUCTIONS_LEN)
                    .optional_tools()
                    .optional_metadata()
                    .optional_number("temperature", 0.0, 2.0)
                    .optional_number("top_p", 0.0, 1.0)
                    .optional_positive_int("max_prompt_tokens")
                    .optional_positive_int("max_completion_tokens");
            }
            RunOp::List => {
                v.pagination("run_");
            }
            RunOp::Get | RunOp::Cancel => {
                v.required_id("run_id", "run_");
            }
            RunOp::Update => {
                v.required_id("run_id", "run_").optional_metadata();
            }
            RunOp::SubmitToolOutputs => {
                v.required_id("run_id", "run_").required_tool_outputs();
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
    use crate::provider::{
        AssistantTool, AssistantsProvider, CreateAssistantRequest, CreateThreadRequest,
        FunctionDefinition, InMemoryProvider,
    };

    async fn fixture(with_function: bool) -> (InMemoryProvider, String, String) {
        let provider = InMemoryProvider::new();
        let tools = if with_function {
            vec![AssistantTool::Function {
                function: FunctionDefinition {
                    name: "lookup_order".to_string(),
                    description: None,
                    parameters: None,
                },
            }]
        } else {
            Vec::new()
        };
        let assistant = provider
            .create_assistant(CreateAssistantRequest {
                model: "gpt-4o".to_string(),
                tools,
                ..Default::default()
            })
            .await
            .unwrap();
        let thread = provider
            .create_thread(CreateThreadRequest::default())
            .await
            .unwrap();
        (provider, assistant.id, thread.id)
    }

    #[test]
    fn test_create_requires_assistant() {
        let err = RunOp::Create
            .validate(&json!({ "thread_id": "thread_1" }))
            .unwrap_err();
        assert_eq!(err.errors[0].field, "assistant_id");
    }

    #[test]
    fn test_submit_requires_outputs() {
        let args = json!({ "thread_id": "thread_1", "run_id": "run_1" });
        assert!(RunOp::SubmitToolOutputs.validate(&args).is_err());

        let args = json!({
            "thread_id": "thread_1",
            "run_id": "run_1",
            "tool_outputs": [{ "tool_call_id": "call_1", "output": "{}" }]
        });
        assert!(RunOp::SubmitToolOutputs.validate(&args).is_ok());
    }

    #[tokio::test]
    async fn test_function_round_trip() {
        let (provider, assistant_id, thread_id) = fixture(true).await;

        let run = RunOp::Create
            .execute(
                json!({ "thread_id": thread_id, "assistant_id": assistant_id }),
                &provider,
            )
            .await
            .unwrap();
        assert_eq!(run["status"], "requires_action");

        let call_id = run["required_action"]["submit_tool_outputs"]["tool_calls"][0]["id"]
            .as_str()
            .unwrap()
            .to_string();

        let done = RunOp::SubmitToolOutputs
            .execute(
                json!({
                    "thread_id": thread_id,
                    "run_id": run["id"],
                    "tool_outputs": [{ "tool_call_id": call_id, "output": "shipped" }]
                }),
                &provider,
            )
            .await
            .unwrap();
        assert_eq!(done["status"], "completed");
    }

    #[tokio::test]
    async fn test_cancel_finished_run_fails() {
        let (provider, assistant_id, thread_id) = fixture(false).await;

        let run = RunOp::Create
            .execute(
                json!({ "thread_id": thread_id, "assistant_id": assistant_id }),
                &provider,
            )
            .await
            .unwrap();
        assert_eq!(run["status"], "completed");

        let err = RunOp::Cancel
            .execute(json!({ "thread_id": thread_id, "run_id": run["id"] }), &provider)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("run-cancel"));
    }
}
