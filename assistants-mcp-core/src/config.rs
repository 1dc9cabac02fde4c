//! Configuration types for the assistants MCP server

use crate::error::{AssistantsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AssistantsMcpConfig {
    /// Server identity and lifecycle settings
    #[serde(default)]
    pub server: ServerSettings,

    /// Backend providers, in registration order
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,

    /// Name of the provider preferred over priority ranking
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_provider: Option<String>,

    /// Whether health checks gate provider selection
    #[serde(default)]
    pub health_policy: HealthPolicy,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server identity and lifecycle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Name reported in `initialize`
    pub name: String,

    /// Version reported in `initialize`
    pub version: String,

    /// Accept requests before `initialize` and initialize with defaults
    pub lazy_initialize: bool,

    /// Upper bound for a single tool call
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Run provider health checks right after initialization
    pub health_check_on_init: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            name: "assistants-mcp".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            lazy_initialize: false,
            request_timeout: Duration::from_secs(60),
            health_check_on_init: false,
        }
    }
}

/// Provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider name; must match a registered factory
    pub name: String,

    /// Backend credentials
    #[serde(default)]
    pub credentials: ProviderCredentials,

    /// Higher wins; unset ranks below any explicit priority
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// A critical provider that fails to initialize aborts startup
    #[serde(default = "default_true")]
    pub critical: bool,

    /// Bound for each provider call and health check
    #[serde(default = "default_provider_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

fn default_true() -> bool {
    true
}

fn default_provider_timeout() -> Duration {
    Duration::from_secs(30)
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            credentials: ProviderCredentials::default(),
            priority: None,
            enabled: true,
            critical: true,
            timeout: default_provider_timeout(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.credentials.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.credentials.base_url = Some(base_url.into());
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn non_critical(mut self) -> Self {
        self.critical = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Backend credentials
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl std::fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("organization", &self.organization)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// How provider health affects selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthPolicy {
    /// Unhealthy providers stay selectable when nothing better exists
    #[default]
    Advisory,
    /// Unhealthy providers are never selected
    Hard,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// An explicitly named config file must exist; figment treats a missing
/// file as empty.
fn require_file(path: &std::path::Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(AssistantsError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )))
    }
}

impl AssistantsMcpConfig {
    /// Load configuration from `assistants-mcp.toml`, the file named by
    /// `ASSISTANTS_MCP_CONFIG_PATH`, and `ASSISTANTS_MCP_` environment variables.
    pub fn load() -> Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Serialized, Toml},
        };

        let mut figment = Figment::from(Serialized::defaults(AssistantsMcpConfig::default()))
            .merge(Toml::file("assistants-mcp.toml"));

        if let Ok(path) = std::env::var("ASSISTANTS_MCP_CONFIG_PATH") {
            require_file(std::path::Path::new(&path))?;
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(
            Env::prefixed("ASSISTANTS_MCP_")
                .ignore(&["CONFIG_PATH"])
                .split("__"),
        );

        let config: AssistantsMcpConfig = figment.extract().map_err(|e| {
            AssistantsError::Configuration(format!("Failed to load configuration: {}", e))
        })?;

        let config = config.with_env_defaults();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a single TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Format, Serialized, Toml},
        };

        let path = path.as_ref();
        require_file(path)?;

        let config: AssistantsMcpConfig =
            Figment::from(Serialized::defaults(AssistantsMcpConfig::default()))
                .merge(Toml::file(path))
                .extract()
                .map_err(|e| {
                    AssistantsError::Configuration(format!(
                        "Failed to load configuration file: {}",
                        e
                    ))
                })?;

        config.validate()?;
        Ok(config)
    }

    /// Add an `openai` provider from `OPENAI_API_KEY` when none is configured.
    pub fn with_env_defaults(mut self) -> Self {
        if self.providers.is_empty()
            && let Ok(api_key) = std::env::var("OPENAI_API_KEY")
        {
            let mut provider = ProviderConfig::new("openai").with_api_key(api_key);
            provider.credentials.organization = std::env::var("OPENAI_ORGANIZATION").ok();
            provider.credentials.base_url = std::env::var("OPENAI_BASE_URL").ok();
            self.providers.push(provider);
        }
        self
    }

    /// Reject configurations that would fail later in a less obvious way.
    pub fn validate(&self) -> Result<()> {
        if self.server.request_timeout.is_zero() {
            return Err(AssistantsError::Configuration(
                "server.request_timeout must be greater than zero".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for provider in &self.providers {
            if provider.name.trim().is_empty() {
                return Err(AssistantsError::Configuration(
                    "provider name must not be empty".to_string(),
                ));
            }
            if !seen.insert(provider.name.as_str()) {
                return Err(AssistantsError::Configuration(format!(
                    "provider '{}' is configured more than once",
                    provider.name
                )));
            }
            if provider.timeout.is_zero() {
                return Err(AssistantsError::Configuration(format!(
                    "provider '{}' timeout must be greater than zero",
                    provider.name
                )));
            }
        }

        if let Some(default) = &self.default_provider
            && !seen.contains(default.as_str())
        {
            return Err(AssistantsError::Configuration(format!(
                "default_provider '{}' is not configured",
                default
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = AssistantsMcpConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.name, "assistants-mcp");
        assert_eq!(config.health_policy, HealthPolicy::Advisory);
        assert!(!config.server.lazy_initialize);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("typo.toml");

        let err = AssistantsMcpConfig::from_file(&missing).unwrap_err();
        assert!(matches!(err, AssistantsError::Configuration(ref msg) if msg.contains("typo.toml")));

        let err = AssistantsMcpConfig::from_file(dir.path()).unwrap_err();
        assert!(matches!(err, AssistantsError::Configuration(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
default_provider = "openai"
health_policy = "hard"

[server]
lazy_initialize = true
request_timeout = "15s"

[[providers]]
name = "openai"
priority = 10
timeout = "5s"

[providers.credentials]
api_key = "sk-test"

[[providers]]
name = "memory"
critical = false
"#
        )
        .unwrap();

        let config = AssistantsMcpConfig::from_file(file.path()).unwrap();
        assert!(config.server.lazy_initialize);
        assert_eq!(config.server.request_timeout, Duration::from_secs(15));
        assert_eq!(config.health_policy, HealthPolicy::Hard);
        assert_eq!(config.providers.len(), 2);

        let openai = &config.providers[0];
        assert_eq!(openai.priority, Some(10));
        assert_eq!(openai.timeout, Duration::from_secs(5));
        assert_eq!(openai.credentials.api_key.as_deref(), Some("sk-test"));
        assert!(openai.critical);

        let memory = &config.providers[1];
        assert!(memory.enabled);
        assert!(!memory.critical);
        assert_eq!(memory.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_duplicate_provider_rejected() {
        let config = AssistantsMcpConfig {
            providers: vec![ProviderConfig::new("openai"), ProviderConfig::new("openai")],
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AssistantsError::Configuration(_))
        ));
    }

    #[test]
    fn test_unknown_default_provider_rejected() {
        let config = AssistantsMcpConfig {
            providers: vec![ProviderConfig::new("openai")],
            default_provider: Some("anthropic".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_credentials_debug_redacts_key() {
        let provider = ProviderConfig::new("openai").with_api_key("sk-secret");
        let rendered = format!("{:?}", provider);
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
