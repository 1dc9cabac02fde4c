//! Provider registry: factories, registrations, selection and health
//!
//! The registry owns every provider. Handlers only ever see the
//! `Arc<dyn AssistantsProvider>` returned by [`ProviderRegistry::select_provider`],
//! resolved once per request.
//!
//! Selection rules:
//! - The configured default provider wins while it is eligible.
//! - Otherwise the highest explicit priority wins; providers without a
//!   priority rank below any explicit one, ties go to registration order.
//! - An unhealthy provider is not eligible. Under [`HealthPolicy::Advisory`]
//!   it is still returned when nothing else is available; under
//!   [`HealthPolicy::Hard`] selection fails instead.
//! - A hint naming an unknown or unhealthy provider falls back to the
//!   default and records a [`FallbackEvent`].

use std::cmp::Reverse;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use super::AssistantsProvider;
use super::factory::ProviderFactory;
use super::types::*;
use crate::config::{AssistantsMcpConfig, HealthPolicy, ProviderConfig};
use crate::error::{AssistantsError, ProviderError, Result};

const MAX_FALLBACK_EVENTS: usize = 100;

/// Result of the most recent health check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderHealth {
    Healthy,
    Unhealthy,
    Unknown,
}

/// Why a hinted provider was not used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    UnknownProvider,
    Unhealthy,
}

/// A request for one provider that was served by another
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackEvent {
    pub requested: String,
    pub selected: String,
    pub reason: FallbackReason,
    pub at: DateTime<Utc>,
}

/// A non-critical provider that failed to initialize
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderFailure {
    pub provider: String,
    pub error: String,
    pub at: DateTime<Utc>,
}

/// Diagnostic view of one registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSummary {
    pub name: String,
    pub priority: Option<u32>,
    pub health: ProviderHealth,
    pub is_default: bool,
    pub last_checked: Option<DateTime<Utc>>,
}

/// Snapshot of registry state for diagnostics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDiagnostics {
    pub health_policy: HealthPolicy,
    pub providers: Vec<ProviderSummary>,
    pub failures: Vec<ProviderFailure>,
    pub fallback_events: Vec<FallbackEvent>,
}

struct Registration {
    provider: Arc<dyn AssistantsProvider>,
    config: ProviderConfig,
    health: ProviderHealth,
    last_checked: Option<DateTime<Utc>>,
    manual: bool,
}

#[derive(Default)]
struct RegistryState {
    registrations: Vec<Registration>,
    failures: Vec<ProviderFailure>,
}

impl RegistryState {
    fn position(&self, name: &str) -> Option<usize> {
        self.registrations.iter().position(|r| r.config.name == name)
    }
}

/// Registry of backend providers
pub struct ProviderRegistry {
    configs: Vec<ProviderConfig>,
    default_name: Option<String>,
    policy: HealthPolicy,
    factories: RwLock<HashMap<String, Arc<dyn ProviderFactory>>>,
    state: RwLock<RegistryState>,
    fallbacks: Mutex<VecDeque<FallbackEvent>>,
    init_lock: Mutex<()>,
    initialized: AtomicBool,
    pending: Arc<PendingProvider>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("configs", &self.configs)
            .field("default_name", &self.default_name)
            .field("policy", &self.policy)
            .field("initialized", &self.initialized)
            .finish()
    }
}

impl ProviderRegistry {
    /// Create an empty registry for the given provider configurations
    pub fn new(configs: Vec<ProviderConfig>) -> Self {
        Self {
            configs,
            default_name: None,
            policy: HealthPolicy::default(),
            factories: RwLock::new(HashMap::new()),
            state: RwLock::new(RegistryState::default()),
            fallbacks: Mutex::new(VecDeque::new()),
            init_lock: Mutex::new(()),
            initialized: AtomicBool::new(false),
            pending: Arc::new(PendingProvider),
        }
    }

    /// Create a registry from the server configuration
    pub fn from_config(config: &AssistantsMcpConfig) -> Self {
        let mut registry = Self::new(config.providers.clone()).with_health_policy(config.health_policy);
        registry.default_name = config.default_provider.clone();
        registry
    }

    /// Create a registry with every built-in factory registered
    pub fn standard(config: &AssistantsMcpConfig) -> Self {
        let registry = Self::from_config(config);
        #[cfg(feature = "provider-openai")]
        let registry = registry.with_factory(Arc::new(super::factory::OpenAIProviderFactory));
        registry.with_factory(Arc::new(super::factory::InMemoryProviderFactory))
    }

    /// Add a factory while building; a later factory with the same name wins
    pub fn with_factory(mut self, factory: Arc<dyn ProviderFactory>) -> Self {
        self.factories
            .get_mut()
            .insert(factory.provider_name().to_string(), factory);
        self
    }

    pub fn with_default_provider(mut self, name: impl Into<String>) -> Self {
        self.default_name = Some(name.into());
        self
    }

    pub fn with_health_policy(mut self, policy: HealthPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Add a factory keyed by its provider name
    pub async fn register_factory(&self, factory: Arc<dyn ProviderFactory>) -> Result<()> {
        let name = factory.provider_name().to_string();
        let mut factories = self.factories.write().await;
        if factories.contains_key(&name) {
            return Err(AssistantsError::DuplicateProvider(name));
        }
        tracing::debug!(provider = %name, "Registered provider factory");
        factories.insert(name, factory);
        Ok(())
    }

    /// Build every enabled configured provider and swap them in.
    ///
    /// A critical provider that fails aborts with
    /// [`AssistantsError::ProviderInit`] and leaves the registry untouched.
    pub async fn initialize(&self) -> Result<()> {
        let _guard = self.init_lock.lock().await;
        self.initialize_locked().await
    }

    /// Initialize on first use; later calls are no-ops.
    pub async fn ensure_initialized(&self) -> Result<()> {
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }
        let _guard = self.init_lock.lock().await;
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }
        self.initialize_locked().await
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    async fn initialize_locked(&self) -> Result<()> {
        let factories = self.factories.read().await.clone();
        let mut built = Vec::new();
        let mut failures = Vec::new();

        for config in self.configs.iter().filter(|c| c.enabled) {
            match Self::build_provider(&factories, config).await {
                Ok(provider) => {
                    tracing::info!(provider = %config.name, priority = ?config.priority, "Provider initialized");
                    built.push(Registration {
                        provider,
                        config: config.clone(),
                        health: ProviderHealth::Unknown,
                        last_checked: None,
                        manual: false,
                    });
                }
                Err(e) if config.critical => {
                    tracing::error!(provider = %config.name, error = %e, "Required provider failed to initialize");
                    return Err(AssistantsError::ProviderInit {
                        provider: config.name.clone(),
                        source: Box::new(e),
                    });
                }
                Err(e) => {
                    tracing::warn!(provider = %config.name, error = %e, "Optional provider failed to initialize");
                    failures.push(ProviderFailure {
                        provider: config.name.clone(),
                        error: e.to_string(),
                        at: Utc::now(),
                    });
                }
            }
        }

        let mut state = self.state.write().await;
        let retained: Vec<Registration> = std::mem::take(&mut state.registrations)
            .into_iter()
            .filter(|r| r.manual && !built.iter().any(|b| b.config.name == r.config.name))
            .collect();
        built.extend(retained);
        state.registrations = built;
        state.failures = failures;
        self.initialized.store(true, Ordering::Release);

        Ok(())
    }

    async fn build_provider(
        factories: &HashMap<String, Arc<dyn ProviderFactory>>,
        config: &ProviderConfig,
    ) -> Result<Arc<dyn AssistantsProvider>> {
        let factory = factories.get(&config.name).ok_or_else(|| {
            AssistantsError::Configuration(format!(
                "no factory registered for provider '{}'",
                config.name
            ))
        })?;
        factory.validate_config(config)?;
        factory.create(config).await
    }

    /// Register a provider directly, bypassing factory validation
    pub async fn register_provider(
        &self,
        provider: Arc<dyn AssistantsProvider>,
        config: ProviderConfig,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        if state.position(&config.name).is_some() {
            return Err(AssistantsError::DuplicateProvider(config.name));
        }
        tracing::info!(provider = %config.name, "Provider registered");
        state.registrations.push(Registration {
            provider,
            config,
            health: ProviderHealth::Unknown,
            last_checked: None,
            manual: true,
        });
        Ok(())
    }

    /// Register or replace a provider; a replaced provider keeps its position
    pub async fn replace_provider(
        &self,
        provider: Arc<dyn AssistantsProvider>,
        config: ProviderConfig,
    ) {
        let mut state = self.state.write().await;
        let registration = Registration {
            provider,
            config,
            health: ProviderHealth::Unknown,
            last_checked: None,
            manual: true,
        };
        match state.position(&registration.config.name) {
            Some(pos) => state.registrations[pos] = registration,
            None => state.registrations.push(registration),
        }
    }

    /// Resolve the provider for a request.
    ///
    /// Never fails because of a bad hint. Returns the [`PendingProvider`]
    /// while nothing is registered.
    pub async fn select_provider(&self, hint: Option<&str>) -> Result<Arc<dyn AssistantsProvider>> {
        let state = self.state.read().await;
        if state.registrations.is_empty() {
            return Ok(self.pending.clone());
        }

        let default_idx = self.default_index(&state)?;
        let Some(name) = hint else {
            return Ok(state.registrations[default_idx].provider.clone());
        };

        let (selected, reason) = match state.position(name) {
            None => (default_idx, FallbackReason::UnknownProvider),
            Some(idx) if state.registrations[idx].health != ProviderHealth::Unhealthy => {
                return Ok(state.registrations[idx].provider.clone());
            }
            Some(idx) if idx == default_idx => {
                // nothing healthier exists and the advisory policy allowed it
                return Ok(state.registrations[idx].provider.clone());
            }
            Some(_) => (default_idx, FallbackReason::Unhealthy),
        };

        let provider = state.registrations[selected].provider.clone();
        let selected_name = state.registrations[selected].config.name.clone();
        drop(state);

        self.record_fallback(name, &selected_name, reason).await;
        Ok(provider)
    }

    /// The provider used when no hint is given
    pub async fn get_default_provider(&self) -> Result<Arc<dyn AssistantsProvider>> {
        self.select_provider(None).await
    }

    fn default_index(&self, state: &RegistryState) -> Result<usize> {
        let eligible = |r: &Registration| r.health != ProviderHealth::Unhealthy;

        if let Some(name) = &self.default_name
            && let Some(idx) = state.position(name)
            && eligible(&state.registrations[idx])
        {
            return Ok(idx);
        }

        let rank = |(idx, r): &(usize, &Registration)| {
            (r.config.priority.is_some(), r.config.priority.unwrap_or(0), Reverse(*idx))
        };

        if let Some((idx, _)) = state
            .registrations
            .iter()
            .enumerate()
            .filter(|(_, r)| eligible(*r))
            .max_by_key(rank)
        {
            return Ok(idx);
        }

        match self.policy {
            HealthPolicy::Hard => Err(AssistantsError::NoHealthyProvider),
            HealthPolicy::Advisory => state
                .registrations
                .iter()
                .enumerate()
                .max_by_key(rank)
                .map(|(idx, _)| idx)
                .ok_or(AssistantsError::NoHealthyProvider),
        }
    }

    async fn record_fallback(&self, requested: &str, selected: &str, reason: FallbackReason) {
        tracing::warn!(
            requested = %requested,
            selected = %selected,
            reason = ?reason,
            "Provider hint not honoured, using fallback"
        );

        let mut events = self.fallbacks.lock().await;
        if events.len() >= MAX_FALLBACK_EVENTS {
            events.pop_front();
        }
        events.push_back(FallbackEvent {
            requested: requested.to_string(),
            selected: selected.to_string(),
            reason,
            at: Utc::now(),
        });
    }

    /// Recorded fallback events, oldest first
    pub async fn fallback_events(&self) -> Vec<FallbackEvent> {
        self.fallbacks.lock().await.iter().cloned().collect()
    }

    /// Overwrite the health of one provider
    pub async fn mark_health(&self, name: &str, health: ProviderHealth) -> bool {
        let mut state = self.state.write().await;
        match state.position(name) {
            Some(idx) => {
                let registration = &mut state.registrations[idx];
                registration.health = health;
                registration.last_checked = Some(Utc::now());
                true
            }
            None => false,
        }
    }

    /// Probe every provider concurrently and record the outcome.
    pub async fn check_health(&self) -> Vec<(String, ProviderHealth)> {
        let targets: Vec<(String, Arc<dyn AssistantsProvider>, Duration)> = {
            let state = self.state.read().await;
            state
                .registrations
                .iter()
                .map(|r| (r.config.name.clone(), r.provider.clone(), r.config.timeout))
                .collect()
        };

        let results = join_all(targets.into_iter().map(|(name, provider, timeout)| async move {
            let health = match tokio::time::timeout(timeout, provider.validate_connection()).await {
                Ok(Ok(())) => ProviderHealth::Healthy,
                Ok(Err(e)) => {
                    tracing::warn!(provider = %name, error = %e, "Health check failed");
                    ProviderHealth::Unhealthy
                }
                Err(_) => {
                    tracing::warn!(provider = %name, timeout = ?timeout, "Health check timed out");
                    ProviderHealth::Unhealthy
                }
            };
            (name, health)
        }))
        .await;

        let now = Utc::now();
        let mut state = self.state.write().await;
        for (name, health) in &results {
            if let Some(idx) = state.position(name) {
                let registration = &mut state.registrations[idx];
                registration.health = *health;
                registration.last_checked = Some(now);
            }
        }

        results
    }

    /// Names of registered providers, in registration order
    pub async fn provider_names(&self) -> Vec<String> {
        let state = self.state.read().await;
        state.registrations.iter().map(|r| r.config.name.clone()).collect()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.registrations.is_empty()
    }

    pub async fn diagnostics(&self) -> ProviderDiagnostics {
        let state = self.state.read().await;
        let default_idx = self.default_index(&state).ok();

        let providers = state
            .registrations
            .iter()
            .enumerate()
            .map(|(idx, r)| ProviderSummary {
                name: r.config.name.clone(),
                priority: r.config.priority,
                health: r.health,
                is_default: Some(idx) == default_idx,
                last_checked: r.last_checked,
            })
            .collect();
        let failures = state.failures.clone();
        drop(state);

        ProviderDiagnostics {
            health_policy: self.policy,
            providers,
            failures,
            fallback_events: self.fallback_events().await,
        }
    }
}

/// Stand-in returned while no provider is registered
///
/// Every operation fails with an `unavailable` provider error.
#[derive(Debug, Clone, Copy, Default)]
pub struct PendingProvider;

impl PendingProvider {
    pub const NAME: &'static str = "pending";

    fn not_ready<T>() -> Result<T> {
        Err(ProviderError::unavailable(Self::NAME, "No provider is ready yet").into())
    }
}

#[async_trait]
impl AssistantsProvider for PendingProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            name: Self::NAME.to_string(),
            version: "none".to_string(),
            supports_streaming: false,
            supports_file_search: false,
            supports_code_interpreter: false,
            max_page_size: 0,
            models: Vec::new(),
        }
    }

    async fn validate_connection(&self) -> Result<()> {
        Self::not_ready()
    }

    async fn create_assistant(&self, _: CreateAssistantRequest) -> Result<Assistant> {
        Self::not_ready()
    }

    async fn list_assistants(&self, _: ListParams) -> Result<ListResponse<Assistant>> {
        Self::not_ready()
    }

    async fn get_assistant(&self, _: &str) -> Result<Assistant> {
        Self::not_ready()
    }

    async fn update_assistant(&self, _: &str, _: UpdateAssistantRequest) -> Result<Assistant> {
        Self::not_ready()
    }

    async fn delete_assistant(&self, _: &str) -> Result<DeletionStatus> {
        Self::not_ready()
    }

    async fn create_thread(&self, _: CreateThreadRequest) -> Result<Thread> {
        Self::not_ready()
    }

    async fn get_thread(&self, _: &str) -> Result<Thread> {
        Self::not_ready()
    }

    async fn update_thread(&self, _: &str, _: UpdateThreadRequest) -> Result<Thread> {
        Self::not_ready()
    }

    async fn delete_thread(&self, _: &str) -> Result<DeletionStatus> {
        Self::not_ready()
    }

    async fn create_message(&self, _: &str, _: CreateMessageRequest) -> Result<Message> {
        Self::not_ready()
    }

    async fn list_messages(&self, _: &str, _: ListParams) -> Result<ListResponse<Message>> {
        Self::not_ready()
    }

    async fn get_message(&self, _: &str, _: &str) -> Result<Message> {
        Self::not_ready()
    }

    async fn update_message(&self, _: &str, _: &str, _: UpdateMessageRequest) -> Result<Message> {
        Self::not_ready()
    }

    async fn delete_message(&self, _: &str, _: &str) -> Result<DeletionStatus> {
        Self::not_ready()
    }

    async fn create_run(&self, _: &str, _: CreateRunRequest) -> Result<Run> {
        Self::not_ready()
    }

    async fn list_runs(&self, _: &str, _: ListParams) -> Result<ListResponse<Run>> {
        Self::not_ready()
    }

    async fn get_run(&self, _: &str, _: &str) -> Result<Run> {
        Self::not_ready()
    }

    async fn update_run(&self, _: &str, _: &str, _: UpdateRunRequest) -> Result<Run> {
        Self::not_ready()
    }

    async fn cancel_run(&self, _: &str, _: &str) -> Result<Run> {
        Self::not_ready()
    }

    async fn submit_tool_outputs(
        &self,
        _: &str,
        _: &str,
        _: SubmitToolOutputsRequest,
    ) -> Result<Run> {
        Self::not_ready()
    }

    async fn list_run_steps(&self, _: &str, _: &str, _: ListParams) -> Result<ListResponse<RunStep>> {
        Self::not_ready()
    }

    async fn get_run_step(&self, _: &str, _: &str, _: &str) -> Result<RunStep> {
        Self::not_ready()
    }
}
