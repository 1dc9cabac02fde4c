//! Shared test doubles

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::provider::*;

/// In-memory provider that counts calls and can stall before answering
pub(crate) struct CountingProvider {
    inner: InMemoryProvider,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl CountingProvider {
    pub fn new() -> Self {
        Self {
            inner: InMemoryProvider::with_name("counting"),
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl AssistantsProvider for CountingProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.inner.capabilities()
    }

    async fn validate_connection(&self) -> Result<()> {
        self.inner.validate_connection().await
    }

    async fn create_assistant(&self, request: CreateAssistantRequest) -> Result<Assistant> {
        self.hit().await;
        self.inner.create_assistant(request).await
    }

    async fn list_assistants(&self, params: ListParams) -> Result<ListResponse<Assistant>> {
        self.hit().await;
        self.inner.list_assistants(params).await
    }

    async fn get_assistant(&self, assistant_id: &str) -> Result<Assistant> {
        self.hit().await;
        self.inner.get_assistant(assistant_id).await
    }

    async fn update_assistant(
        &self,
        assistant_id: &str,
        request: UpdateAssistantRequest,
    ) -> Result<Assistant> {
        self.hit().await;
        self.inner.update_assistant(assistant_id, request).await
    }

    async fn delete_assistant(&self, assistant_id: &str) -> Result<DeletionStatus> {
        self.hit().await;
        self.inner.delete_assistant(assistant_id).await
    }

    async fn create_thread(&self, request: CreateThreadRequest) -> Result<Thread> {
        self.hit().await;
        self.inner.create_thread(request).await
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Thread> {
        self.hit().await;
        self.inner.get_thread(thread_id).await
    }

    async fn update_thread(&self, thread_id: &str, request: UpdateThreadRequest) -> Result<Thread> {
        self.hit().await;
        self.inner.update_thread(thread_id, request).await
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<DeletionStatus> {
        self.hit().await;
        self.inner.delete_thread(thread_id).await
    }

    async fn create_message(
        &self,
        thread_id: &str,
        request: CreateMessageRequest,
    ) -> Result<Message> {
        self.hit().await;
        self.inner.create_message(thread_id, request).await
    }

    async fn list_messages(
        &self,
        thread_id: &str,
        params: ListParams,
    ) -> Result<ListResponse<Message>> {
        self.hit().await;
        self.inner.list_messages(thread_id, params).await
    }

    async fn get_message(&self, thread_id: &str, message_id: &str) -> Result<Message> {
        self.hit().await;
        self.inner.get_message(thread_id, message_id).await
    }

    async fn update_message(
        &self,
        thread_id: &str,
        message_id: &str,
        request: UpdateMessageRequest,
    ) -> Result<Message> {
        self.hit().await;
        self.inner.update_message(thread_id, message_id, request).await
    }

    async fn delete_message(&self, thread_id: &str, message_id: &str) -> Result<DeletionStatus> {
        self.hit().await;
        self.inner.delete_message(thread_id, message_id).await
    }

    async fn create_run(&self, thread_id: &str, request: CreateRunRequest) -> Result<Run> {
        self.hit().await;
        self.inner.create_run(thread_id, request).await
    }

    async fn list_runs(&self, thread_id: &str, params: ListParams) -> Result<ListResponse<Run>> {
        self.hit().await;
        self.inner.list_runs(thread_id, params).await
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        self.hit().await;
        self.inner.get_run(thread_id, run_id).await
    }

    async fn update_run(
        &self,
        thread_id: &str,
        run_id: &str,
        request: UpdateRunRequest,
    ) -> Result<Run> {
        self.hit().await;
        self.inner.update_run(thread_id, run_id, request).await
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        self.hit().await;
        self.inner.cancel_run(thread_id, run_id).await
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        request: SubmitToolOutputsRequest,
    ) -> Result<Run> {
        self.hit().await;
        self.inner.submit_tool_outputs(thread_id, run_id, request).await
    }

    async fn list_run_steps(
        &self,
        thread_id: &str,
        run_id: &str,
        params: ListParams,
    ) -> Result<ListResponse<RunStep>> {
        self.hit().await;
        self.inner.list_run_steps(thread_id, run_id, params).await
    }

    async fn get_run_step(
        &self,
        thread_id: &str,
        run_id: &str,
        step_id: &str,
    ) -> Result<RunStep> {
        self.hit().await;
        self.inner.get_run_step(thread_id, run_id, step_id).await
    }
}
