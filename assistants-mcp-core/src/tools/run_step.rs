//! Run step tools

use async_trait::async_trait;
use serde_json::Value;

use super::handler::{ToolCategory, ToolDefinition, ToolHandler, with_tool_context};
use super::schema::SchemaBuilder;
use super::validation::{ArgValidator, ValidationFailure, decode, str_arg};
use crate::error::Result;
use crate::provider::{AssistantsProvider, ListParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStepOp {
    List,
    Get,
}

impl RunStepOp {
    pub const ALL: [RunStepOp; 2] = [RunStepOp::List, RunStepOp::Get];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    fn description(&self) -> &'static str {
        match self {
            RunStepOp::List => "List the steps a run has taken.",
            RunStepOp::Get => "Retrieve one step of a run.",
        }
    }

    fn input_schema(&self) -> Value {
        let builder = SchemaBuilder::new()
            .id("thread_id", "thread_", "Thread id")
            .id("run_id", "run_", "Run id");
        match self {
            RunStepOp::List => builder.pagination("step_"),
            RunStepOp::Get => builder.id("step_id", "step_", "Step id"),
        }
        .build()
    }

    async fn call(&self, args: Value, provider: &dyn AssistantsProvider) -> Result<Value> {
        let tool = self.name();
        let thread_id = str_arg(tool, &args, "thread_id")?;
        let run_id = str_arg(tool, &args, "run_id")?;
        let value = match self {
            RunStepOp::List => {
                let params: ListParams = decode(tool, &args)?;
                serde_json::to_value(provider.list_run_steps(thread_id, run_id, params).await?)?
            }
            RunStepOp::Get => {
                let step_id = str_arg(tool, &args, "step_id")?;
                serde_json::to_value(provider.get_run_step(thread_id, run_id, step_id).await?)?
            }
        };
        Ok(value)
    }
}

#[async_trait]
impl ToolHandler for RunStepOp {
    fn name(&self) -> &'static str {
        match self {
            RunStepOp::List => "run-step-list",
            RunStepOp::Get => "run-step-get",
        }
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::RunStep
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
        v.required_id("thread_id", "thread_")
            .required_id("run_id", "run_");
        match self {
            RunStepOp::List => {
                v.pagination("step_");
            }
            RunStepOp::Get => {
                v.required_id("step_id", "step_");
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
        CreateAssistantRequest, CreateRunRequest, CreateThreadRequest, InMemoryProvider,
    };
    use serde_json::json;

    #[tokio::test]
    async fn test_completed_run_has_message_step() {
        let provider = InMemoryProvider::new();
        let assistant = provider
            .create_assistant(CreateAssistantRequest {
                model: "gpt-4o".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let thread = provider
            .create_thread(CreateThreadRequest::default())
            .await
            .unwrap();
        let run = provider
            .create_run(
                &thread.id,
                CreateRunRequest {
                    assistant_id: assistant.id,
                    model: None,
                    instructions: None,
                    additional_instructions: None,
                    tools: None,
                    metadata: None,
                    temperature: None,
                    top_p: None,
                    max_prompt_tokens: None,
                    max_completion_tokens: None,
                },
            )
            .await
            .unwrap();

        let steps = RunStepOp::List
            .execute(json!({ "thread_id": thread.id, "run_id": run.id }), &provider)
            .await
            .unwrap();
        let data = steps["data"].as_array().unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["type"], "message_creation");

        let step = RunStepOp::Get
            .execute(
                json!({ "thread_id": thread.id, "run_id": run.id, "step_id": data[0]["id"] }),
                &provider,
            )
            .await
            .unwrap();
        assert_eq!(step["id"], data[0]["id"]);
    }

    #[test]
    fn test_step_id_prefix() {
        let args = json!({ "thread_id": "thread_1", "run_id": "run_1", "step_id": "msg_1" });
        assert!(RunStepOp::Get.validate(&args).is_err());
    }
}
