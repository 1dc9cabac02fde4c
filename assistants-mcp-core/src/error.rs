//! Error types for the assistants MCP server
//!
//! Domain components raise these; only the dispatcher in [`crate::mcp`]
//! turns them into JSON-RPC error objects.

use crate::tools::{ToolCategory, ValidationFailure};
use std::time::Duration;

/// Result type for assistants MCP operations
pub type Result<T> = std::result::Result<T, AssistantsError>;

/// Error types for the assistants MCP server
#[derive(Debug, thiserror::Error)]
pub enum AssistantsError {
    /// Tool arguments failed validation
    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    /// Method parameters could not be decoded
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// No handler is registered under this name
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// No catalog entry matches this URI
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// Catalog entry resolved to nothing
    #[error("Resource '{0}' has no content")]
    ResourceContentMissing(String),

    /// Backend returned a failure
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Provider call exceeded its time bound
    #[error("Provider '{provider}' timed out after {elapsed:?}")]
    ProviderTimeout { provider: String, elapsed: Duration },

    /// Request was cancelled by the client
    #[error("Request cancelled: {0}")]
    Cancelled(String),

    /// Failure raised by a tool handler, with its category and name attached
    #[error("{tool} ({category}) failed: {source}")]
    Tool {
        category: ToolCategory,
        tool: String,
        #[source]
        source: Box<AssistantsError>,
    },

    /// Handler table and registry disagree
    #[error("Registration error: {0}")]
    Registration(String),

    /// A factory with this provider name already exists
    #[error("Provider '{0}' is already registered")]
    DuplicateProvider(String),

    /// A required provider could not be constructed
    #[error("Failed to initialize provider '{provider}': {source}")]
    ProviderInit {
        provider: String,
        #[source]
        source: Box<AssistantsError>,
    },

    /// Hard health policy is active and nothing is healthy
    #[error("No healthy provider available")]
    NoHealthyProvider,

    /// Request arrived before `initialize`
    #[error("Server not initialized")]
    NotInitialized,

    /// A tool call with this request id is still running
    #[error("Request id {0} is already in flight")]
    DuplicateRequest(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AssistantsError {
    /// Strip [`AssistantsError::Tool`] wrappers and return the underlying cause.
    pub fn root_cause(&self) -> &AssistantsError {
        match self {
            AssistantsError::Tool { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self.root_cause() {
            AssistantsError::Provider(e) => e.is_retryable(),
            AssistantsError::ProviderTimeout { .. } => true,
            _ => false,
        }
    }

    /// Short machine-readable category used in diagnostics.
    pub fn category(&self) -> &'static str {
        match self.root_cause() {
            AssistantsError::Validation(_) | AssistantsError::InvalidParams(_) => "validation",
            AssistantsError::UnknownTool(_) | AssistantsError::ResourceNotFound(_) => "not_found",
            AssistantsError::ResourceContentMissing(_) => "resource",
            AssistantsError::Provider(e) => e.kind.as_str(),
            AssistantsError::ProviderTimeout { .. } => "timeout",
            AssistantsError::Cancelled(_) => "cancelled",
            AssistantsError::NotInitialized | AssistantsError::DuplicateRequest(_) => "lifecycle",
            AssistantsError::Registration(_)
            | AssistantsError::DuplicateProvider(_)
            | AssistantsError::ProviderInit { .. }
            | AssistantsError::NoHealthyProvider
            | AssistantsError::Configuration(_) => "configuration",
            AssistantsError::Serialization(_) | AssistantsError::Io(_) => "internal",
            AssistantsError::Tool { .. } => "tool",
        }
    }
}

/// Classification of backend failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    Authentication,
    PermissionDenied,
    NotFound,
    Conflict,
    InvalidRequest,
    RateLimited,
    Server,
    Network,
    Decode,
    Unavailable,
}

impl ProviderErrorKind {
    /// Map an HTTP status code to an error kind
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Authentication,
            403 => Self::PermissionDenied,
            404 => Self::NotFound,
            409 => Self::Conflict,
            429 => Self::RateLimited,
            400..=499 => Self::InvalidRequest,
            _ => Self::Server,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::PermissionDenied => "permission_denied",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::InvalidRequest => "invalid_request",
            Self::RateLimited => "rate_limited",
            Self::Server => "server",
            Self::Network => "network",
            Self::Decode => "decode",
            Self::Unavailable => "unavailable",
        }
    }

    /// Rate limits, server faults and network drops are transient.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Server | Self::Network)
    }
}

impl std::fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a backend provider
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind} error from provider '{provider}': {message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
    pub provider: String,
    /// Original HTTP status, when the backend speaks HTTP
    pub status: Option<u16>,
    /// Backend-supplied retry hint
    pub retry_after: Option<Duration>,
}

impl ProviderError {
    pub fn new(
        provider: impl Into<String>,
        kind: ProviderErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            provider: provider.into(),
            status: None,
            retry_after: None,
        }
    }

    pub fn not_found(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::NotFound, message)
    }

    pub fn invalid_request(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::InvalidRequest, message)
    }

    pub fn unavailable(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::Unavailable, message)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ProviderErrorKind::from_status(401), ProviderErrorKind::Authentication);
        assert_eq!(ProviderErrorKind::from_status(404), ProviderErrorKind::NotFound);
        assert_eq!(ProviderErrorKind::from_status(422), ProviderErrorKind::InvalidRequest);
        assert_eq!(ProviderErrorKind::from_status(429), ProviderErrorKind::RateLimited);
        assert_eq!(ProviderErrorKind::from_status(503), ProviderErrorKind::Server);
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(ProviderErrorKind::RateLimited.is_retryable());
        assert!(ProviderErrorKind::Network.is_retryable());
        assert!(!ProviderErrorKind::NotFound.is_retryable());
        assert!(!ProviderErrorKind::Authentication.is_retryable());
    }

    #[test]
    fn test_root_cause_unwraps_tool_context() {
        let inner = ProviderError::new("openai", ProviderErrorKind::RateLimited, "slow down")
            .with_status(429);
        let err = AssistantsError::Tool {
            category: ToolCategory::Run,
            tool: "run-create".to_string(),
            source: Box::new(inner.into()),
        };

        assert!(matches!(err.root_cause(), AssistantsError::Provider(_)));
        assert!(err.is_retryable());
        assert_eq!(err.category(), "rate_limited");
        assert!(err.to_string().contains("run-create"));
    }

    #[test]
    fn test_timeout_is_retryable() {
        let err = AssistantsError::ProviderTimeout {
            provider: "openai".to_string(),
            elapsed: Duration::from_secs(30),
        };
        assert!(err.is_retryable());
        assert_eq!(err.category(), "timeout");
    }
}
