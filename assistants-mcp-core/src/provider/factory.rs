//! Factories that build providers from configuration

use crate::config::ProviderConfig;
use crate::error::{AssistantsError, Result};
use async_trait::async_trait;
use std::sync::Arc;

use super::AssistantsProvider;
use super::memory::InMemoryProvider;

#[cfg(feature = "provider-openai")]
use super::openai::OpenAIProvider;

/// Builds one kind of provider
///
/// `validate_config` runs before `create`; a config it rejects never
/// produces a provider.
#[async_trait]
pub trait ProviderFactory: Send + Sync {
    /// Name the factory is registered under; matches `ProviderConfig::name`
    fn provider_name(&self) -> &str;

    /// Check the configuration without constructing anything
    fn validate_config(&self, config: &ProviderConfig) -> Result<()>;

    /// Construct a provider from an already validated configuration
    async fn create(&self, config: &ProviderConfig) -> Result<Arc<dyn AssistantsProvider>>;
}

/// Factory for [`OpenAIProvider`]
#[cfg(feature = "provider-openai")]
#[derive(Debug, Clone, Default)]
pub struct OpenAIProviderFactory;

#[cfg(feature = "provider-openai")]
#[async_trait]
impl ProviderFactory for OpenAIProviderFactory {
    fn provider_name(&self) -> &str {
        "openai"
    }

    fn validate_config(&self, config: &ProviderConfig) -> Result<()> {
        let api_key = config.credentials.api_key.as_deref().unwrap_or_default();
        if api_key.trim().is_empty() {
            return Err(AssistantsError::Configuration(format!(
                "provider '{}' requires a non-empty api_key",
                config.name
            )));
        }

        if let Some(base_url) = &config.credentials.base_url
            && !(base_url.starts_with("https://") || base_url.starts_with("http://"))
        {
            return Err(AssistantsError::Configuration(format!(
                "provider '{}' base_url must be an http(s) URL, got '{}'",
                config.name, base_url
            )));
        }

        if config.timeout.is_zero() {
            return Err(AssistantsError::Configuration(format!(
                "provider '{}' timeout must be greater than zero",
                config.name
            )));
        }

        Ok(())
    }

    async fn create(&self, config: &ProviderConfig) -> Result<Arc<dyn AssistantsProvider>> {
        let api_key = config.credentials.api_key.clone().unwrap_or_default();
        let mut provider = OpenAIProvider::new(api_key).with_timeout(config.timeout);

        if let Some(base_url) = &config.credentials.base_url {
            provider = provider.with_base_url(base_url.clone());
        }
        if let Some(organization) = &config.credentials.organization {
            provider = provider.with_organization(organization.clone());
        }

        Ok(Arc::new(provider.named(config.name.clone())))
    }
}

/// Factory for [`InMemoryProvider`]; accepts any configuration
#[derive(Debug, Clone, Default)]
pub struct InMemoryProviderFactory;

#[async_trait]
impl ProviderFactory for InMemoryProviderFactory {
    fn provider_name(&self) -> &str {
        "memory"
    }

    fn validate_config(&self, _config: &ProviderConfig) -> Result<()> {
        Ok(())
    }

    async fn create(&self, config: &ProviderConfig) -> Result<Arc<dyn AssistantsProvider>> {
        Ok(Arc::new(InMemoryProvider::with_name(config.name.clone())))
    }
}
