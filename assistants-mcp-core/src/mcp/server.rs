//! MCP Server Implementation
//!
//! The dispatcher that owns the session lifecycle, routes requests to the
//! tool registry and resource catalog, and turns every internal error into a
//! JSON-RPC error object.

use super::protocol::*;
use crate::config::{AssistantsMcpConfig, ServerSettings};
use crate::error::{AssistantsError, Result};
use crate::provider::ProviderRegistry;
use crate::resources::ResourceCatalog;
use crate::tools::{CallContext, ToolHandlerRegistry};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

const TROUBLESHOOTING_DOC: &str = "docs://troubleshooting/common-issues";
const TOOL_REFERENCE_DOC: &str = "docs://tool-reference";

/// MCP Server configuration
#[derive(Debug, Clone)]
pub struct McpServerConfig {
    /// Server name
    pub name: String,
    /// Server version
    pub version: String,
    /// Serve requests that arrive before `initialize`
    pub lazy_initialize: bool,
    /// Bound on each tool call
    pub request_timeout: Duration,
    /// Usage hint returned from `initialize`
    pub instructions: Option<String>,
}

impl Default for McpServerConfig {
    fn default() -> Self {
        Self::from(&ServerSettings::default())
    }
}

impl From<&ServerSettings> for McpServerConfig {
    fn from(settings: &ServerSettings) -> Self {
        Self {
            name: settings.name.clone(),
            version: settings.version.clone(),
            lazy_initialize: settings.lazy_initialize,
            request_timeout: settings.request_timeout,
            instructions: Some(
                "Manage assistants, threads, messages and runs. Read docs://getting-started first."
                    .to_string(),
            ),
        }
    }
}

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    /// `initialize` answered, waiting for the client to confirm
    Initialized,
    Serving,
}

#[derive(Debug)]
struct Session {
    state: SessionState,
    protocol_version: &'static str,
    client: Option<ClientInfo>,
}

/// MCP Server state
pub struct McpServer {
    config: McpServerConfig,
    tools: ToolHandlerRegistry,
    resources: ResourceCatalog,
    providers: Arc<ProviderRegistry>,
    session: RwLock<Session>,
    in_flight: Mutex<HashMap<RequestId, CancellationToken>>,
}

impl std::fmt::Debug for McpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpServer")
            .field("config", &self.config)
            .field("tools", &self.tools)
            .field("resources", &self.resources)
            .finish()
    }
}

impl McpServer {
    /// Create a new MCP server builder
    pub fn builder() -> McpServerBuilder {
        McpServerBuilder::new()
    }

    pub fn config(&self) -> &McpServerConfig {
        &self.config
    }

    pub fn tools(&self) -> &ToolHandlerRegistry {
        &self.tools
    }

    pub fn resources(&self) -> &ResourceCatalog {
        &self.resources
    }

    pub fn providers(&self) -> &Arc<ProviderRegistry> {
        &self.providers
    }

    pub async fn session_state(&self) -> SessionState {
        self.session.read().await.state
    }

    /// Protocol revision agreed in `initialize`
    pub async fn protocol_version(&self) -> &'static str {
        self.session.read().await.protocol_version
    }

    /// Number of tool calls currently executing
    pub async fn in_flight(&self) -> usize {
        self.in_flight.lock().await.len()
    }

    /// Handle one raw JSON-RPC message
    ///
    /// Returns `None` for notifications.
    pub async fn handle_message(&self, raw: &str) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(error = %e, "Unparseable message");
                return Some(JsonRpcResponse::error(
                    RequestId::Null,
                    JsonRpcError::parse_error().with_data(json!({ "detail": e.to_string() })),
                ));
            }
        };

        if value.is_array() {
            return Some(JsonRpcResponse::error(
                RequestId::Null,
                JsonRpcError::invalid_request("Batch requests are not supported"),
            ));
        }

        let id = value
            .get("id")
            .and_then(|id| serde_json::from_value::<RequestId>(id.clone()).ok())
            .unwrap_or(RequestId::Null);

        let request: JsonRpcRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                return Some(JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_request(format!("Invalid request: {}", e)),
                ));
            }
        };

        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::error(
                id,
                JsonRpcError::invalid_request("jsonrpc must be \"2.0\""),
            ));
        }

        self.handle_request(request).await
    }

    /// Handle an incoming JSON-RPC request or notification
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let JsonRpcRequest {
            id, method, params, ..
        } = request;

        let Some(id) = id else {
            self.handle_notification(&method, params).await;
            return None;
        };

        tracing::debug!(method = %method, id = %id, "Handling request");
        let response = match self.route(&id, &method, params).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => {
                tracing::debug!(method = %method, id = %id, code = error.code, "Request failed");
                JsonRpcResponse::error(id, error)
            }
        };
        Some(response)
    }

    async fn route(
        &self,
        id: &RequestId,
        method: &str,
        params: Option<Value>,
    ) -> std::result::Result<Value, JsonRpcError> {
        match method {
            "initialize" => {
                return self
                    .handle_initialize(params)
                    .await
                    .map_err(|e| error_to_jsonrpc(&e, None));
            }
            "ping" => return Ok(json!({})),
            "tools/list" | "tools/call" | "resources/list" | "resources/read" => {}
            other => return Err(JsonRpcError::method_not_found(other)),
        }

        self.ensure_session()
            .await
            .map_err(|e| error_to_jsonrpc(&e, None))?;

        match method {
            "tools/call" => self.handle_tools_call(id, params).await,
            "tools/list" => self.handle_tools_list().map_err(|e| error_to_jsonrpc(&e, None)),
            "resources/list" => self
                .handle_resources_list()
                .map_err(|e| error_to_jsonrpc(&e, None)),
            "resources/read" => self
                .handle_resources_read(params)
                .map_err(|e| error_to_jsonrpc(&e, None)),
            other => Err(JsonRpcError::method_not_found(other)),
        }
    }

    async fn handle_notification(&self, method: &str, params: Option<Value>) {
        match method {
            "notifications/initialized" => {
                let mut session = self.session.write().await;
                match session.state {
                    SessionState::Initialized => {
                        session.state = SessionState::Serving;
                        tracing::debug!("Client confirmed initialization");
                    }
                    SessionState::Uninitialized => {
                        tracing::warn!("Ignoring 'initialized' notification before initialize");
                    }
                    SessionState::Serving => {}
                }
            }
            "notifications/cancelled" => {
                let params: CancelledParams = match parse_params(params, method) {
                    Ok(params) => params,
                    Err(e) => {
                        tracing::debug!(error = %e, "Ignoring malformed cancellation");
                        return;
                    }
                };
                if let Some(token) = self.in_flight.lock().await.get(&params.request_id) {
                    tracing::debug!(
                        id = %params.request_id,
                        reason = params.reason.as_deref().unwrap_or(""),
                        "Cancelling request"
                    );
                    token.cancel();
                }
            }
            other => tracing::debug!(method = %other, "Ignoring notification"),
        }
    }

    /// Move the session to `Serving`, or fail if `initialize` never happened
    async fn ensure_session(&self) -> Result<()> {
        if self.session.read().await.state == SessionState::Serving {
            return Ok(());
        }

        let mut session = self.session.write().await;
        match session.state {
            SessionState::Serving => Ok(()),
            SessionState::Initialized => {
                session.state = SessionState::Serving;
                Ok(())
            }
            SessionState::Uninitialized if self.config.lazy_initialize => {
                session.state = SessionState::Serving;
                session.protocol_version = LATEST_PROTOCOL_VERSION;
                tracing::info!("Session initialized lazily with defaults");
                Ok(())
            }
            SessionState::Uninitialized => Err(AssistantsError::NotInitialized),
        }
    }

    async fn handle_initialize(&self, params: Option<Value>) -> Result<Value> {
        let params: InitializeParams = parse_params(params, "initialize")?;
        let version = negotiate_protocol_version(&params.protocol_version);

        {
            let mut session = self.session.write().await;
            if session.state != SessionState::Uninitialized {
                tracing::debug!("Re-initializing session");
            }
            session.state = SessionState::Initialized;
            session.protocol_version = version;
            session.client = Some(params.client_info.clone());
        }

        tracing::info!(
            client = %params.client_info.name,
            client_version = %params.client_info.version,
            requested = %params.protocol_version,
            protocol_version = version,
            "Session initialized"
        );

        let result = InitializeResult {
            protocol_version: version.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability { list_changed: false }),
                resources: Some(ResourcesCapability {
                    subscribe: false,
                    list_changed: false,
                }),
            },
            server_info: ServerInfo {
                name: self.config.name.clone(),
                version: self.config.version.clone(),
            },
            instructions: self.config.instructions.clone(),
        };
        Ok(serde_json::to_value(result)?)
    }

    fn handle_tools_list(&self) -> Result<Value> {
        let tools = self
            .tools
            .definitions()
            .into_iter()
            .map(|d| McpTool {
                name: d.name,
                description: d.description,
                input_schema: d.input_schema,
            })
            .collect();
        Ok(serde_json::to_value(ToolsListResult { tools })?)
    }

    async fn handle_tools_call(
        &self,
        id: &RequestId,
        params: Option<Value>,
    ) -> std::result::Result<Value, JsonRpcError> {
        let mut provider_name = None;
        self.call_tool(id, params, &mut provider_name)
            .await
            .map_err(|e| error_to_jsonrpc(&e, provider_name.as_deref()))
    }

    async fn call_tool(
        &self,
        id: &RequestId,
        params: Option<Value>,
        provider_name: &mut Option<String>,
    ) -> Result<Value> {
        let params: ToolCallParams = parse_params(params, "tools/call")?;

        // Reject unknown tools and bad arguments before touching providers.
        let handler = self
            .tools
            .get(&params.name)
            .ok_or_else(|| AssistantsError::UnknownTool(params.name.clone()))?;
        handler.validate(&params.arguments)?;

        self.providers.ensure_initialized().await?;
        let hint = params.meta.as_ref().and_then(|m| m.provider.as_deref());
        let provider = self.providers.select_provider(hint).await?;
        *provider_name = Some(provider.name().to_string());

        let token = CancellationToken::new();
        {
            let mut in_flight = self.in_flight.lock().await;
            if in_flight.contains_key(id) {
                return Err(AssistantsError::DuplicateRequest(id.to_string()));
            }
            in_flight.insert(id.clone(), token.clone());
        }

        let ctx = CallContext::new()
            .with_timeout(self.config.request_timeout)
            .with_cancellation(token)
            .with_provider(provider.name());
        let outcome = self
            .tools
            .dispatch(&params.name, params.arguments, provider.as_ref(), &ctx)
            .await;

        self.in_flight.lock().await.remove(id);

        let value = outcome?;
        let result = ToolCallResult {
            content: vec![ContentBlock::text(serde_json::to_string_pretty(&value)?)],
            structured_content: Some(value),
            is_error: None,
        };
        Ok(serde_json::to_value(result)?)
    }

    fn handle_resources_list(&self) -> Result<Value> {
        let resources = self
            .resources
            .list()
            .into_iter()
            .map(|d| McpResource {
                uri: d.uri,
                name: d.name,
                description: Some(d.description),
                mime_type: Some(d.mime_type),
            })
            .collect();
        Ok(serde_json::to_value(ResourcesListResult { resources })?)
    }

    fn handle_resources_read(&self, params: Option<Value>) -> Result<Value> {
        let params: ResourceReadParams = parse_params(params, "resources/read")?;
        let content = self.resources.read(&params.uri)?;
        let result = ResourceReadResult {
            contents: vec![ResourceContents {
                uri: content.uri,
                mime_type: content.mime_type,
                text: content.text,
            }],
        };
        Ok(serde_json::to_value(result)?)
    }
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>, method: &str) -> Result<T> {
    let params = params.ok_or_else(|| {
        AssistantsError::InvalidParams(format!("Missing params for '{}'", method))
    })?;
    serde_json::from_value(params)
        .map_err(|e| AssistantsError::InvalidParams(format!("Invalid params for '{}': {}", method, e)))
}

/// Translate an internal error into a wire error
///
/// Only the five standard JSON-RPC codes are used. Everything else a client
/// might want to act on goes into `data`.
pub fn error_to_jsonrpc(error: &AssistantsError, provider: Option<&str>) -> JsonRpcError {
    let root = error.root_cause();
    let code = match root {
        AssistantsError::Validation(_)
        | AssistantsError::InvalidParams(_)
        | AssistantsError::ResourceNotFound(_) => INVALID_PARAMS,
        AssistantsError::UnknownTool(_) => METHOD_NOT_FOUND,
        AssistantsError::NotInitialized | AssistantsError::DuplicateRequest(_) => INVALID_REQUEST,
        _ => INTERNAL_ERROR,
    };

    let mut data = Map::new();
    data.insert("category".into(), json!(error.category()));
    data.insert("retryable".into(), json!(error.is_retryable()));

    if let AssistantsError::Tool { category, tool, .. } = error {
        data.insert("toolName".into(), json!(tool));
        data.insert("toolCategory".into(), json!(category));
    }

    let mut provider = provider.map(str::to_string);
    match root {
        AssistantsError::Validation(failure) => {
            data.insert("toolName".into(), json!(failure.tool));
            data.insert("errors".into(), json!(failure.errors));
        }
        AssistantsError::UnknownTool(name) => {
            data.insert("toolName".into(), json!(name));
        }
        AssistantsError::Provider(e) => {
            provider = Some(e.provider.clone());
            if let Some(status) = e.status {
                data.insert("status".into(), json!(status));
            }
            if let Some(retry_after) = e.retry_after {
                data.insert("retryAfterMs".into(), json!(retry_after.as_millis() as u64));
            }
        }
        AssistantsError::ProviderTimeout { provider: name, elapsed } => {
            provider = Some(name.clone());
            data.insert("elapsedMs".into(), json!(elapsed.as_millis() as u64));
        }
        _ => {}
    }
    if let Some(provider) = provider {
        data.insert("provider".into(), json!(provider));
    }

    let documentation = match root {
        AssistantsError::Validation(_) | AssistantsError::UnknownTool(_) => TOOL_REFERENCE_DOC,
        _ => TROUBLESHOOTING_DOC,
    };
    data.insert("documentation".into(), json!(documentation));

    JsonRpcError::new(code, error.to_string()).with_data(Value::Object(data))
}

/// Builder for MCP Server
///
/// [`build`](Self::build) returns immediately with providers initialized on
/// the first tool call; [`build_initialized`](Self::build_initialized)
/// initializes them up front and refuses to build if a required one fails.
pub struct McpServerBuilder {
    config: McpServerConfig,
    app_config: AssistantsMcpConfig,
    tools: Option<ToolHandlerRegistry>,
    resources: Option<ResourceCatalog>,
    providers: Option<Arc<ProviderRegistry>>,
}

impl McpServerBuilder {
    pub fn new() -> Self {
        Self::from_config(AssistantsMcpConfig::default())
    }

    pub fn from_config(config: AssistantsMcpConfig) -> Self {
        Self {
            config: McpServerConfig::from(&config.server),
            app_config: config,
            tools: None,
            resources: None,
            providers: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.config.version = version.into();
        self
    }

    pub fn lazy_initialize(mut self, lazy: bool) -> Self {
        self.config.lazy_initialize = lazy;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn with_tools(mut self, tools: ToolHandlerRegistry) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_resources(mut self, resources: ResourceCatalog) -> Self {
        self.resources = Some(resources);
        self
    }

    pub fn with_providers(mut self, providers: Arc<ProviderRegistry>) -> Self {
        self.providers = Some(providers);
        self
    }

    /// Build without touching providers
    pub fn build(self) -> Result<McpServer> {
        let tools = match self.tools {
            Some(tools) => tools,
            None => ToolHandlerRegistry::standard()?,
        };
        let resources = match self.resources {
            Some(resources) => resources,
            None => ResourceCatalog::standard()?,
        };
        let providers = self
            .providers
            .unwrap_or_else(|| Arc::new(ProviderRegistry::standard(&self.app_config)));

        tracing::debug!(
            tools = tools.len(),
            resources = resources.len(),
            "MCP server assembled"
        );

        Ok(McpServer {
            config: self.config,
            tools,
            resources,
            providers,
            session: RwLock::new(Session {
                state: SessionState::Uninitialized,
                protocol_version: LATEST_PROTOCOL_VERSION,
                client: None,
            }),
            in_flight: Mutex::new(HashMap::new()),
        })
    }

    /// Build and initialize every configured provider first
    pub async fn build_initialized(self) -> Result<McpServer> {
        let health_check = self.app_config.server.health_check_on_init;
        let server = self.build()?;

        server.providers.initialize().await?;
        if health_check {
            for (provider, health) in server.providers.check_health().await {
                tracing::info!(provider = %provider, health = ?health, "Provider health");
            }
        }
        Ok(server)
    }
}

impl Default for McpServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
