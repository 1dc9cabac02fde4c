//! Backend provider abstraction
//!
//! Tool handlers talk to an [`AssistantsProvider`] and never to a concrete
//! client. Providers are constructed by a [`ProviderFactory`] from a
//! [`ProviderConfig`](crate::config::ProviderConfig) and owned by the
//! [`ProviderRegistry`], which picks the active one for each request.
//!
//! # Example
//!
//! ```rust,no_run
//! use assistants_mcp_core::config::ProviderConfig;
//! use assistants_mcp_core::provider::{InMemoryProviderFactory, ProviderRegistry};
//! use std::sync::Arc;
//!
//! # async fn example() -> assistants_mcp_core::error::Result<()> {
//! let registry = ProviderRegistry::new(vec![ProviderConfig::new("memory")]);
//! registry.register_factory(Arc::new(InMemoryProviderFactory)).await?;
//! registry.initialize().await?;
//!
//! let provider = registry.select_provider(None).await?;
//! let assistants = provider.list_assistants(Default::default()).await?;
//! # Ok(())
//! # }
//! ```

mod factory;
mod memory;
#[cfg(feature = "provider-openai")]
mod openai;
mod registry;
mod retry;
mod types;

pub use factory::{InMemoryProviderFactory, ProviderFactory};
#[cfg(feature = "provider-openai")]
pub use factory::OpenAIProviderFactory;
pub use memory::InMemoryProvider;
#[cfg(feature = "provider-openai")]
pub use openai::OpenAIProvider;
pub use registry::{
    FallbackEvent, FallbackReason, PendingProvider, ProviderDiagnostics, ProviderFailure,
    ProviderHealth, ProviderRegistry, ProviderSummary,
};
pub use retry::{RetryConfig, RetryState, with_retry, with_retry_when};
pub use types::*;

use crate::error::Result;
use async_trait::async_trait;

/// Capability contract every assistants backend satisfies
///
/// Implementations must be safe for concurrent use; the registry hands the
/// same `Arc` to every in-flight request.
#[async_trait]
pub trait AssistantsProvider: Send + Sync {
    /// Registry name of this provider
    fn name(&self) -> &str;

    /// Static capability metadata
    fn capabilities(&self) -> ProviderCapabilities;

    /// Cheap round trip proving credentials and connectivity
    async fn validate_connection(&self) -> Result<()>;

    // Assistants

    async fn create_assistant(&self, request: CreateAssistantRequest) -> Result<Assistant>;

    async fn list_assistants(&self, params: ListParams) -> Result<ListResponse<Assistant>>;

    async fn get_assistant(&self, assistant_id: &str) -> Result<Assistant>;

    async fn update_assistant(
        &self,
        assistant_id: &str,
        request: UpdateAssistantRequest,
    ) -> Result<Assistant>;

    async fn delete_assistant(&self, assistant_id: &str) -> Result<DeletionStatus>;

    // Threads

    async fn create_thread(&self, request: CreateThreadRequest) -> Result<Thread>;

    async fn get_thread(&self, thread_id: &str) -> Result<Thread>;

    async fn update_thread(&self, thread_id: &str, request: UpdateThreadRequest) -> Result<Thread>;

    async fn delete_thread(&self, thread_id: &str) -> Result<DeletionStatus>;

    // Messages

    async fn create_message(
        &self,
        thread_id: &str,
        request: CreateMessageRequest,
    ) -> Result<Message>;

    async fn list_messages(
        &self,
        thread_id: &str,
        params: ListParams,
    ) -> Result<ListResponse<Message>>;

    async fn get_message(&self, thread_id: &str, message_id: &str) -> Result<Message>;

    async fn update_message(
        &self,
        thread_id: &str,
        message_id: &str,
        request: UpdateMessageRequest,
    ) -> Result<Message>;

    async fn delete_message(&self, thread_id: &str, message_id: &str) -> Result<DeletionStatus>;

    // Runs

    async fn create_run(&self, thread_id: &str, request: CreateRunRequest) -> Result<Run>;

    async fn list_runs(&self, thread_id: &str, params: ListParams) -> Result<ListResponse<Run>>;

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run>;

    async fn update_run(
        &self,
        thread_id: &str,
        run_id: &str,
        request: UpdateRunRequest,
    ) -> Result<Run>;

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run>;

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        request: SubmitToolOutputsRequest,
    ) -> Result<Run>;

    // Run steps

    async fn list_run_steps(
        &self,
        thread_id: &str,
        run_id: &str,
        params: ListParams,
    ) -> Result<ListResponse<RunStep>>;

    async fn get_run_step(&self, thread_id: &str, run_id: &str, step_id: &str)
    -> Result<RunStep>;
}
