use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::providers::{GoogleProvider, LlmProvider, OpenAIProvider};
use std::time::Duration;

pub struct ProviderFactory;

impl ProviderFactory {
    /// Create a provider instance from configuration.
    ///
    /// The implementation is chosen by `kind`, or by the provider name when no
    /// kind is set ("gemini*" maps to Google, "gpt*" to OpenAI).
    pub fn create(
        provider_name: &str,
        config: &ProviderConfig,
        timeout: Duration,
    ) -> Result<Box<dyn LlmProvider>> {
        // Validate that provider is enabled
        if !config.enabled {
            return Err(Error::Config(format!(
                "Provider '{}' is not enabled in configuration",
                provider_name
            )));
        }

        let kind = config.kind.as_deref().unwrap_or(provider_name);
        match kind {
            "openai" => Ok(Box::new(OpenAIProvider::new(config, timeout)?)),
            "google" => Ok(Box::new(GoogleProvider::new(config, timeout)?)),
            k if k.starts_with("gpt") => Ok(Box::new(OpenAIProvider::new(config, timeout)?)),
            k if k.starts_with("gemini") => Ok(Box::new(GoogleProvider::new(config, timeout)?)),
            _ => Err(Error::Config(format!("Unknown provider: {}", kind))),
        }
    }

    /// List all available provider kinds
    pub fn available_providers() -> Vec<&'static str> {
        vec!["openai", "google"]
    }
}
