//! In-memory provider for testing and offline use
//!
//! Stores every object in process memory and simulates the run lifecycle:
//!
//! - A run on an assistant without function tools completes immediately,
//!   appending an assistant reply and a `message_creation` step.
//! - A run on an assistant with function tools stops in `requires_action`
//!   until tool outputs for every pending call are submitted.
//! - Cancelling a terminal run is rejected.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::AssistantsProvider;
use super::types::*;
use crate::error::{ProviderError, ProviderErrorKind, Result};

/// Stored value plus its insertion sequence, used for ordering
struct Entry<T> {
    seq: u64,
    value: T,
}

#[derive(Default)]
struct Store {
    assistants: HashMap<String, Entry<Assistant>>,
    threads: HashMap<String, Entry<Thread>>,
    messages: HashMap<String, Entry<Message>>,
    runs: HashMap<String, Entry<Run>>,
    steps: HashMap<String, Entry<RunStep>>,
}

/// In-memory assistants backend
pub struct InMemoryProvider {
    name: String,
    store: RwLock<Store>,
    next_seq: AtomicU64,
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::with_name("memory")
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            store: RwLock::new(Store::default()),
            next_seq: AtomicU64::new(1),
        }
    }

    fn next_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::SeqCst)
    }

    fn generate_id(prefix: &str) -> String {
        format!("{}_{}", prefix, Uuid::new_v4().simple())
    }

    fn not_found(&self, kind: &str, id: &str) -> ProviderError {
        ProviderError::not_found(&self.name, format!("No {} found with id '{}'", kind, id))
            .with_status(404)
    }

    fn thread_exists(&self, store: &Store, thread_id: &str) -> Result<()> {
        if store.threads.contains_key(thread_id) {
            Ok(())
        } else {
            Err(self.not_found("thread", thread_id).into())
        }
    }

    fn run_in_thread<'a>(&self, store: &'a Store, thread_id: &str, run_id: &str) -> Result<&'a Run> {
        self.thread_exists(store, thread_id)?;
        store
            .runs
            .get(run_id)
            .map(|e| &e.value)
            .filter(|r| r.thread_id == thread_id)
            .ok_or_else(|| self.not_found("run", run_id).into())
    }

    fn insert_message(&self, store: &mut Store, message: Message) {
        let seq = self.next_seq();
        store.messages.insert(message.id.clone(), Entry { seq, value: message });
    }

    fn insert_step(&self, store: &mut Store, step: RunStep) {
        let seq = self.next_seq();
        store.steps.insert(step.id.clone(), Entry { seq, value: step });
    }

    /// Append the assistant reply for a finished run and record the step.
    fn complete_run(&self, store: &mut Store, run: &mut Run) {
        let now = Utc::now().timestamp();
        let message = Message {
            id: Self::generate_id("msg"),
            object: "thread.message".to_string(),
            created_at: now,
            thread_id: run.thread_id.clone(),
            role: MessageRole::Assistant,
            content: vec![MessageContent::text(format!(
                "Run {} completed by {}",
                run.id, self.name
            ))],
            assistant_id: Some(run.assistant_id.clone()),
            run_id: Some(run.id.clone()),
            attachments: Vec::new(),
            metadata: Metadata::new(),
        };

        let step = RunStep {
            id: Self::generate_id("step"),
            object: "thread.run.step".to_string(),
            created_at: now,
            run_id: run.id.clone(),
            assistant_id: run.assistant_id.clone(),
            thread_id: run.thread_id.clone(),
            step_type: RunStepType::MessageCreation,
            status: RunStepStatus::Completed,
            step_details: json!({
                "type": "message_creation",
                "message_creation": { "message_id": message.id }
            }),
            last_error: None,
            completed_at: Some(now),
            cancelled_at: None,
            metadata: Metadata::new(),
            usage: None,
        };

        self.insert_message(store, message);
        self.insert_step(store, step);

        run.status = RunStatus::Completed;
        run.required_action = None;
        run.completed_at = Some(now);
    }
}

/// Sort by insertion order and apply cursor pagination.
fn paginate<T: Clone>(
    mut items: Vec<(u64, &T)>,
    params: &ListParams,
    id_of: impl Fn(&T) -> &str,
) -> ListResponse<T> {
    items.sort_by_key(|(seq, _)| *seq);
    if params.order.unwrap_or_default() == SortOrder::Desc {
        items.reverse();
    }

    if let Some(after) = &params.after
        && let Some(pos) = items.iter().position(|(_, v)| id_of(v) == after)
    {
        items.drain(..=pos);
    }
    if let Some(before) = &params.before
        && let Some(pos) = items.iter().position(|(_, v)| id_of(v) == before)
    {
        items.truncate(pos);
    }

    let limit = params.effective_limit();
    let has_more = items.len() > limit;
    let data: Vec<T> = items.into_iter().take(limit).map(|(_, v)| v.clone()).collect();

    ListResponse {
        object: "list".to_string(),
        first_id: data.first().map(|v| id_of(v).to_string()),
        last_id: data.last().map(|v| id_of(v).to_string()),
        data,
        has_more,
    }
}

fn deleted(id: &str, object: &str) -> DeletionStatus {
    DeletionStatus {
        id: id.to_string(),
        object: format!("{}.deleted", object),
        deleted: true,
    }
}

#[async_trait]
impl AssistantsProvider for InMemoryProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            name: self.name.clone(),
            version: "v2".to_string(),
            supports_streaming: false,
            supports_file_search: false,
            supports_code_interpreter: false,
            max_page_size: ListParams::MAX_LIMIT,
            models: Vec::new(),
        }
    }

    async fn validate_connection(&self) -> Result<()> {
        Ok(())
    }

    async fn create_assistant(&self, request: CreateAssistantRequest) -> Result<Assistant> {
        let assistant = Assistant {
            id: Self::generate_id("asst"),
            object: "assistant".to_string(),
            created_at: Utc::now().timestamp(),
            name: request.name,
            description: request.description,
            model: request.model,
            instructions: request.instructions,
            tools: request.tools,
            metadata: request.metadata.unwrap_or_default(),
            temperature: request.temperature,
            top_p: request.top_p,
            response_format: request.response_format,
            tool_resources: request.tool_resources,
        };

        let seq = self.next_seq();
        let mut store = self.store.write().await;
        store.assistants.insert(
            assistant.id.clone(),
            Entry {
                seq,
                value: assistant.clone(),
            },
        );
        Ok(assistant)
    }

    async fn list_assistants(&self, params: ListParams) -> Result<ListResponse<Assistant>> {
        let store = self.store.read().await;
        let items = store.assistants.values().map(|e| (e.seq, &e.value)).collect();
        Ok(paginate(items, &params, |a| a.id.as_str()))
    }

    async fn get_assistant(&self, assistant_id: &str) -> Result<Assistant> {
        let store = self.store.read().await;
        store
            .assistants
            .get(assistant_id)
            .map(|e| e.value.clone())
            .ok_or_else(|| self.not_found("assistant", assistant_id).into())
    }

    async fn update_assistant(
        &self,
        assistant_id: &str,
        request: UpdateAssistantRequest,
    ) -> Result<Assistant> {
        let mut store = self.store.write().await;
        let assistant = &mut store
            .assistants
            .get_mut(assistant_id)
            .ok_or_else(|| self.not_found("assistant", assistant_id))?
            .value;

        if let Some(model) = request.model {
            assistant.model = model;
        }
        if request.name.is_some() {
            assistant.name = request.name;
        }
        if request.description.is_some() {
            assistant.description = request.description;
        }
        if request.instructions.is_some() {
            assistant.instructions = request.instructions;
        }
        if let Some(tools) = request.tools {
            assistant.tools = tools;
        }
        if let Some(metadata) = request.metadata {
            assistant.metadata = metadata;
        }
        if request.temperature.is_some() {
            assistant.temperature = request.temperature;
        }
        if request.top_p.is_some() {
            assistant.top_p = request.top_p;
        }
        if request.response_format.is_some() {
            assistant.response_format = request.response_format;
        }
        if request.tool_resources.is_some() {
            assistant.tool_resources = request.tool_resources;
        }

        Ok(assistant.clone())
    }

    async fn delete_assistant(&self, assistant_id: &str) -> Result<DeletionStatus> {
        let mut store = self.store.write().await;
        store
            .assistants
            .remove(assistant_id)
            .ok_or_else(|| self.not_found("assistant", assistant_id))?;
        Ok(deleted(assistant_id, "assistant"))
    }

    async fn create_thread(&self, request: CreateThreadRequest) -> Result<Thread> {
        let now = Utc::now().timestamp();
        let thread = Thread {
            id: Self::generate_id("thread"),
            object: "thread".to_string(),
            created_at: now,
            metadata: request.metadata.unwrap_or_default(),
            tool_resources: request.tool_resources,
        };

        let seq = self.next_seq();
        let mut store = self.store.write().await;
        store.threads.insert(
            thread.id.clone(),
            Entry {
                seq,
                value: thread.clone(),
            },
        );

        for seed in request.messages {
            let message = Message {
                id: Self::generate_id("msg"),
                object: "thread.message".to_string(),
                created_at: now,
                thread_id: thread.id.clone(),
                role: seed.role,
                content: vec![MessageContent::text(seed.content)],
                assistant_id: None,
                run_id: None,
                attachments: seed.attachments.unwrap_or_default(),
                metadata: seed.metadata.unwrap_or_default(),
            };
            self.insert_message(&mut store, message);
        }

        Ok(thread)
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Thread> {
        let store = self.store.read().await;
        store
            .threads
            .get(thread_id)
            .map(|e| e.value.clone())
            .ok_or_else(|| self.not_found("thread", thread_id).into())
    }

    async fn update_thread(&self, thread_id: &str, request: UpdateThreadRequest) -> Result<Thread> {
        let mut store = self.store.write().await;
        let thread = &mut store
            .threads
            .get_mut(thread_id)
            .ok_or_else(|| self.not_found("thread", thread_id))?
            .value;

        if let Some(metadata) = request.metadata {
            thread.metadata = metadata;
        }
        if request.tool_resources.is_some() {
            thread.tool_resources = request.tool_resources;
        }
        Ok(thread.clone())
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<DeletionStatus> {
        let mut store = self.store.write().await;
        store
            .threads
            .remove(thread_id)
            .ok_or_else(|| self.not_found("thread", thread_id))?;

        store.messages.retain(|_, e| e.value.thread_id != thread_id);
        store.runs.retain(|_, e| e.value.thread_id != thread_id);
        store.steps.retain(|_, e| e.value.thread_id != thread_id);

        Ok(deleted(thread_id, "thread"))
    }

    async fn create_message(
        &self,
        thread_id: &str,
        request: CreateMessageRequest,
    ) -> Result<Message> {
        let mut store = self.store.write().await;
        self.thread_exists(&store, thread_id)?;

        let message = Message {
            id: Self::generate_id("msg"),
            object: "thread.message".to_string(),
            created_at: Utc::now().timestamp(),
            thread_id: thread_id.to_string(),
            role: request.role,
            content: vec![MessageContent::text(request.content)],
            assistant_id: None,
            run_id: None,
            attachments: request.attachments.unwrap_or_default(),
            metadata: request.metadata.unwrap_or_default(),
        };
        self.insert_message(&mut store, message.clone());
        Ok(message)
    }

    async fn list_messages(
        &self,
        thread_id: &str,
        params: ListParams,
    ) -> Result<ListResponse<Message>> {
        let store = self.store.read().await;
        self.thread_exists(&store, thread_id)?;

        let items = store
            .messages
            .values()
            .filter(|e| e.value.thread_id == thread_id)
            .map(|e| (e.seq, &e.value))
            .collect();
        Ok(paginate(items, &params, |m| m.id.as_str()))
    }

    async fn get_message(&self, thread_id: &str, message_id: &str) -> Result<Message> {
        let store = self.store.read().await;
        self.thread_exists(&store, thread_id)?;
        store
            .messages
            .get(message_id)
            .map(|e| &e.value)
            .filter(|m| m.thread_id == thread_id)
            .cloned()
            .ok_or_else(|| self.not_found("message", message_id).into())
    }

    async fn update_message(
        &self,
        thread_id: &str,
        message_id: &str,
        request: UpdateMessageRequest,
    ) -> Result<Message> {
        let mut store = self.store.write().await;
        self.thread_exists(&store, thread_id)?;

        let message = store
            .messages
            .get_mut(message_id)
            .map(|e| &mut e.value)
            .filter(|m| m.thread_id == thread_id)
            .ok_or_else(|| self.not_found("message", message_id))?;

        if let Some(metadata) = request.metadata {
            message.metadata = metadata;
        }
        Ok(message.clone())
    }

    async fn delete_message(&self, thread_id: &str, message_id: &str) -> Result<DeletionStatus> {
        let mut store = self.store.write().await;
        self.thread_exists(&store, thread_id)?;

        let owned = store
            .messages
            .get(message_id)
            .is_some_and(|e| e.value.thread_id == thread_id);
        if !owned {
            return Err(self.not_found("message", message_id).into());
        }
        store.messages.remove(message_id);
        Ok(deleted(message_id, "thread.message"))
    }

    async fn create_run(&self, thread_id: &str, request: CreateRunRequest) -> Result<Run> {
        let mut store = self.store.write().await;
        self.thread_exists(&store, thread_id)?;

        let assistant = store
            .assistants
            .get(&request.assistant_id)
            .map(|e| e.value.clone())
            .ok_or_else(|| self.not_found("assistant", &request.assistant_id))?;

        let now = Utc::now().timestamp();
        let tools = request.tools.unwrap_or_else(|| assistant.tools.clone());
        let mut instructions = request.instructions.or(assistant.instructions.clone());
        if let Some(extra) = request.additional_instructions {
            instructions = Some(match instructions {
                Some(base) => format!("{}\n\n{}", base, extra),
                None => extra,
            });
        }

        let mut run = Run {
            id: Self::generate_id("run"),
            object: "thread.run".to_string(),
            created_at: now,
            thread_id: thread_id.to_string(),
            assistant_id: assistant.id.clone(),
            status: RunStatus::Queued,
            model: request.model.unwrap_or(assistant.model),
            instructions,
            tools,
            metadata: request.metadata.unwrap_or_default(),
            required_action: None,
            last_error: None,
            started_at: Some(now),
            expires_at: Some(now + 600),
            cancelled_at: None,
            failed_at: None,
            completed_at: None,
            temperature: request.temperature.or(assistant.temperature),
            top_p: request.top_p.or(assistant.top_p),
            usage: None,
        };

        let calls: Vec<FunctionToolCall> = run
            .tools
            .iter()
            .filter_map(|tool| match tool {
                AssistantTool::Function { function } => Some(FunctionToolCall {
                    id: Self::generate_id("call"),
                    call_type: "function".to_string(),
                    function: FunctionCall {
                        name: function.name.clone(),
                        arguments: "{}".to_string(),
                    },
                }),
                _ => None,
            })
            .collect();

        if calls.is_empty() {
            self.complete_run(&mut store, &mut run);
        } else {
            let step = RunStep {
                id: Self::generate_id("step"),
                object: "thread.run.step".to_string(),
                created_at: now,
                run_id: run.id.clone(),
                assistant_id: run.assistant_id.clone(),
                thread_id: run.thread_id.clone(),
                step_type: RunStepType::ToolCalls,
                status: RunStepStatus::InProgress,
                step_details: json!({ "type": "tool_calls", "tool_calls": calls }),
                last_error: None,
                completed_at: None,
                cancelled_at: None,
                metadata: Metadata::new(),
                usage: None,
            };
            self.insert_step(&mut store, step);

            run.status = RunStatus::RequiresAction;
            run.required_action = Some(RequiredAction::SubmitToolOutputs {
                submit_tool_outputs: ToolCallBatch { tool_calls: calls },
            });
        }

        let seq = self.next_seq();
        store.runs.insert(
            run.id.clone(),
            Entry {
                seq,
                value: run.clone(),
            },
        );
        Ok(run)
    }

    async fn list_runs(&self, thread_id: &str, params: ListParams) -> Result<ListResponse<Run>> {
        let store = self.store.read().await;
        self.thread_exists(&store, thread_id)?;

        let items = store
            .runs
            .values()
            .filter(|e| e.value.thread_id == thread_id)
            .map(|e| (e.seq, &e.value))
            .collect();
        Ok(paginate(items, &params, |r| r.id.as_str()))
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        let store = self.store.read().await;
        self.run_in_thread(&store, thread_id, run_id).cloned()
    }

    async fn update_run(
        &self,
        thread_id: &str,
        run_id: &str,
        request: UpdateRunRequest,
    ) -> Result<Run> {
        let mut store = self.store.write().await;
        self.run_in_thread(&store, thread_id, run_id)?;

        let run = &mut store
            .runs
            .get_mut(run_id)
            .ok_or_else(|| self.not_found("run", run_id))?
            .value;
        if let Some(metadata) = request.metadata {
            run.metadata = metadata;
        }
        Ok(run.clone())
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        let mut store = self.store.write().await;
        let status = self.run_in_thread(&store, thread_id, run_id)?.status;
        if status.is_terminal() {
            return Err(ProviderError::new(
                &self.name,
                ProviderErrorKind::Conflict,
                format!("Cannot cancel run with status '{:?}'", status),
            )
            .with_status(400)
            .into());
        }

        let now = Utc::now().timestamp();
        for entry in store.steps.values_mut() {
            let step = &mut entry.value;
            if step.run_id == run_id && step.status == RunStepStatus::InProgress {
                step.status = RunStepStatus::Cancelled;
                step.cancelled_at = Some(now);
            }
        }

        let run = &mut store
            .runs
            .get_mut(run_id)
            .ok_or_else(|| self.not_found("run", run_id))?
            .value;
        run.status = RunStatus::Cancelled;
        run.required_action = None;
        run.cancelled_at = Some(now);
        Ok(run.clone())
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        request: SubmitToolOutputsRequest,
    ) -> Result<Run> {
        let mut store = self.store.write().await;
        let run = self.run_in_thread(&store, thread_id, run_id)?.clone();

        let pending: Vec<String> = match (&run.status, &run.required_action) {
            (
                RunStatus::RequiresAction,
                Some(RequiredAction::SubmitToolOutputs { submit_tool_outputs }),
            ) => submit_tool_outputs
                .tool_calls
                .iter()
                .map(|c| c.id.clone())
                .collect(),
            _ => {
                return Err(ProviderError::new(
                    &self.name,
                    ProviderErrorKind::Conflict,
                    format!(
                        "Run '{}' is not waiting for tool outputs (status '{:?}')",
                        run_id, run.status
                    ),
                )
                .with_status(400)
                .into());
            }
        };

        let missing: Vec<&str> = pending
            .iter()
            .filter(|id| !request.tool_outputs.iter().any(|o| &o.tool_call_id == *id))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(ProviderError::invalid_request(
                &self.name,
                format!("Missing tool outputs for calls: {}", missing.join(", ")),
            )
            .with_status(400)
            .into());
        }

        let now = Utc::now().timestamp();
        for entry in store.steps.values_mut() {
            let step = &mut entry.value;
            if step.run_id == run_id && step.status == RunStepStatus::InProgress {
                step.status = RunStepStatus::Completed;
                step.completed_at = Some(now);
            }
        }

        let mut run = run;
        self.complete_run(&mut store, &mut run);
        if let Some(entry) = store.runs.get_mut(run_id) {
            entry.value = run.clone();
        }
        Ok(run)
    }

    async fn list_run_steps(
        &self,
        thread_id: &str,
        run_id: &str,
        params: ListParams,
    ) -> Result<ListResponse<RunStep>> {
        let store = self.store.read().await;
        self.run_in_thread(&store, thread_id, run_id)?;

        let items = store
            .steps
            .values()
            .filter(|e| e.value.run_id == run_id)
            .map(|e| (e.seq, &e.value))
            .collect();
        Ok(paginate(items, &params, |s| s.id.as_str()))
    }

    async fn get_run_step(
        &self,
        thread_id: &str,
        run_id: &str,
        step_id: &str,
    ) -> Result<RunStep> {
        let store = self.store.read().await;
        self.run_in_thread(&store, thread_id, run_id)?;
        store
            .steps
            .get(step_id)
            .map(|e| &e.value)
            .filter(|s| s.run_id == run_id)
            .cloned()
            .ok_or_else(|| self.not_found("run step", step_id).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AssistantsError;

    fn assistant_request(tools: Vec<AssistantTool>) -> CreateAssistantRequest {
        CreateAssistantRequest {
            model: "gpt-4o".to_string(),
            name: Some("helper".to_string()),
            tools,
            ..Default::default()
        }
    }

    fn function_tool(name: &str) -> AssistantTool {
        AssistantTool::Function {
            function: FunctionDefinition {
                name: name.to_string(),
                description: None,
                parameters: None,
            },
        }
    }

    #[tokio::test]
    async fn test_assistant_crud() {
        let provider = InMemoryProvider::new();

        let created = provider.create_assistant(assistant_request(vec![])).await.unwrap();
        assert!(created.id.starts_with("asst_"));

        let fetched = provider.get_assistant(&created.id).await.unwrap();
        assert_eq!(fetched, created);

        let updated = provider
            .update_assistant(
                &created.id,
                UpdateAssistantRequest {
                    name: Some("renamed".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name.as_deref(), Some("renamed"));
        assert_eq!(updated.model, "gpt-4o");

        let status = provider.delete_assistant(&created.id).await.unwrap();
        assert!(status.deleted);
        assert_eq!(status.object, "assistant.deleted");

        let err = provider.get_assistant(&created.id).await.unwrap_err();
        assert!(matches!(
            err,
            AssistantsError::Provider(ProviderError { kind: ProviderErrorKind::NotFound, .. })
        ));
    }

    #[tokio::test]
    async fn test_list_pagination() {
        let provider = InMemoryProvider::new();
        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(provider.create_assistant(assistant_request(vec![])).await.unwrap().id);
        }

        let page = provider
            .list_assistants(ListParams {
                limit: Some(2),
                order: Some(SortOrder::Asc),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.data.len(), 2);
        assert!(page.has_more);
        assert_eq!(page.first_id.as_deref(), Some(ids[0].as_str()));

        let next = provider
            .list_assistants(ListParams {
                limit: Some(10),
                order: Some(SortOrder::Asc),
                after: page.last_id.clone(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(next.data.len(), 3);
        assert!(!next.has_more);
        assert_eq!(next.data[0].id, ids[2]);

        let newest_first = provider.list_assistants(ListParams::default()).await.unwrap();
        assert_eq!(newest_first.data[0].id, ids[4]);
    }

    #[tokio::test]
    async fn test_thread_seed_messages_and_cascade_delete() {
        let provider = InMemoryProvider::new();
        let thread = provider
            .create_thread(CreateThreadRequest {
                messages: vec![CreateMessageRequest {
                    role: MessageRole::User,
                    content: "hello".to_string(),
                    attachments: None,
                    metadata: None,
                }],
                ..Default::default()
            })
            .await
            .unwrap();

        let messages = provider
            .list_messages(&thread.id, ListParams::default())
            .await
            .unwrap();
        assert_eq!(messages.data.len(), 1);
        let message_id = messages.data[0].id.clone();

        provider.delete_thread(&thread.id).await.unwrap();
        assert!(provider.get_message(&thread.id, &message_id).await.is_err());
    }

    #[tokio::test]
    async fn test_message_scoped_to_thread() {
        let provider = InMemoryProvider::new();
        let a = provider.create_thread(Default::default()).await.unwrap();
        let b = provider.create_thread(Default::default()).await.unwrap();

        let message = provider
            .create_message(
                &a.id,
                CreateMessageRequest {
                    role: MessageRole::User,
                    content: "hi".to_string(),
                    attachments: None,
                    metadata: None,
                },
            )
            .await
            .unwrap();

        assert!(provider.get_message(&a.id, &message.id).await.is_ok());
        assert!(provider.get_message(&b.id, &message.id).await.is_err());
        assert!(provider.delete_message(&b.id, &message.id).await.is_err());
    }

    #[tokio::test]
    async fn test_run_without_functions_completes() {
        let provider = InMemoryProvider::new();
        let assistant = provider.create_assistant(assistant_request(vec![])).await.unwrap();
        let thread = provider.create_thread(Default::default()).await.unwrap();

        let run = provider
            .create_run(
                &thread.id,
                CreateRunRequest {
                    assistant_id: assistant.id.clone(),
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
        assert_eq!(run.status, RunStatus::Completed);

        let steps = provider
            .list_run_steps(&thread.id, &run.id, ListParams::default())
            .await
            .unwrap();
        assert_eq!(steps.data.len(), 1);
        assert_eq!(steps.data[0].step_type, RunStepType::MessageCreation);

        let messages = provider
            .list_messages(&thread.id, ListParams::default())
            .await
            .unwrap();
        assert_eq!(messages.data[0].role, MessageRole::Assistant);

        let err = provider.cancel_run(&thread.id, &run.id).await.unwrap_err();
        assert!(matches!(
            err,
            AssistantsError::Provider(ProviderError { kind: ProviderErrorKind::Conflict, .. })
        ));
    }

    #[tokio::test]
    async fn test_run_requires_action_then_completes() {
        let provider = InMemoryProvider::new();
        let assistant = provider
            .create_assistant(assistant_request(vec![function_tool("lookup")]))
            .await
            .unwrap();
        let thread = provider.create_thread(Default::default()).await.unwrap();

        let run = provider
            .create_run(
                &thread.id,
                CreateRunRequest {
                    assistant_id: assistant.id.clone(),
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
        assert_eq!(run.status, RunStatus::RequiresAction);

        let call_id = match &run.required_action {
            Some(RequiredAction::SubmitToolOutputs { submit_tool_outputs }) => {
                submit_tool_outputs.tool_calls[0].id.clone()
            }
            None => panic!("expected required action"),
        };

        let missing = provider
            .submit_tool_outputs(
                &thread.id,
                &run.id,
                SubmitToolOutputsRequest {
                    tool_outputs: vec![ToolOutput {
                        tool_call_id: "call_other".to_string(),
                        output: "{}".to_string(),
                    }],
                },
            )
            .await;
        assert!(missing.is_err());

        let done = provider
            .submit_tool_outputs(
                &thread.id,
                &run.id,
                SubmitToolOutputsRequest {
                    tool_outputs: vec![ToolOutput {
                        tool_call_id: call_id,
                        output: "42".to_string(),
                    }],
                },
            )
            .await
            .unwrap();
        assert_eq!(done.status, RunStatus::Completed);
        assert!(done.required_action.is_none());

        let steps = provider
            .list_run_steps(
                &thread.id,
                &run.id,
                ListParams {
                    order: Some(SortOrder::Asc),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(steps.data.len(), 2);
        assert_eq!(steps.data[0].step_type, RunStepType::ToolCalls);
        assert_eq!(steps.data[0].status, RunStepStatus::Completed);
    }

    #[tokio::test]
    async fn test_cancel_pending_run() {
        let provider = InMemoryProvider::new();
        let assistant = provider
            .create_assistant(assistant_request(vec![function_tool("lookup")]))
            .await
            .unwrap();
        let thread = provider.create_thread(Default::default()).await.unwrap();
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

        let cancelled = provider.cancel_run(&thread.id, &run.id).await.unwrap();
        assert_eq!(cancelled.status, RunStatus::Cancelled);
        assert!(cancelled.cancelled_at.is_some());

        let step = provider
            .list_run_steps(&thread.id, &run.id, ListParams::default())
            .await
            .unwrap()
            .data
            .remove(0);
        assert_eq!(step.status, RunStepStatus::Cancelled);
    }
}
