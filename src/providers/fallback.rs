use crate::config::AppConfig;
use crate::error::{with_timeout, Error, Result};
use crate::providers::{LlmProvider, LlmRequest, LlmResponse, ProviderFactory};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::time::Duration;
use tokio::time::sleep;

/// Ordered chain of providers backing one model role
pub struct FallbackProvider {
    role: String,
    providers: Vec<Box<dyn LlmProvider>>,
    retry_attempts: u32,
    retry_delay_ms: u64,
    call_timeout: Duration,
    video_timeout: Duration,
}

impl FallbackProvider {
    /// Build the chain for a role from the provider names configured for it
    pub fn for_role(config: &AppConfig, role: &str, names: &[String]) -> Result<Self> {
        let mut providers = Vec::new();

        for (provider_name, provider_config) in config.role_providers(names) {
            if !provider_config.enabled {
                continue;
            }
            match ProviderFactory::create(&provider_name, &provider_config, config.timeouts.llm()) {
                Ok(provider) => {
                    info!("Added '{}' to the {} chain", provider_name, role);
                    providers.push(provider);
                }
                Err(e) => {
                    warn!("Failed to initialize provider '{}': {}", provider_name, e);
                }
            }
        }

        if providers.is_empty() {
            return Err(Error::Config(format!(
                "No providers available for the {} role",
                role
            )));
        }

        Ok(FallbackProvider {
            role: role.to_string(),
            providers,
            retry_attempts: config.fallback.retry_attempts.max(1),
            retry_delay_ms: config.fallback.retry_delay_ms,
            call_timeout: config.timeouts.llm(),
            video_timeout: config.timeouts.video(),
        })
    }

    /// Chain over already constructed providers
    pub fn from_providers(
        role: &str,
        providers: Vec<Box<dyn LlmProvider>>,
        retry_attempts: u32,
        retry_delay_ms: u64,
        call_timeout: Duration,
    ) -> Self {
        FallbackProvider {
            role: role.to_string(),
            providers,
            retry_attempts: retry_attempts.max(1),
            retry_delay_ms,
            call_timeout,
            video_timeout: call_timeout,
        }
    }

    /// Limit for requests that upload a video before generating
    pub fn with_video_timeout(mut self, limit: Duration) -> Self {
        self.video_timeout = limit;
        self
    }

    /// Try a provider with linear backoff between attempts
    async fn try_provider_with_retry(
        &self,
        provider: &dyn LlmProvider,
        request: &LlmRequest,
    ) -> std::result::Result<LlmResponse, String> {
        let mut last_error = String::new();
        let limit = if request.has_video() {
            self.video_timeout
        } else {
            self.call_timeout
        };

        for attempt in 1..=self.retry_attempts {
            debug!(
                "{}: calling {} (attempt {}/{})",
                self.role,
                provider.provider_name(),
                attempt,
                self.retry_attempts
            );

            match with_timeout("language model", limit, provider.complete(request)).await {
                Ok(response) => {
                    info!("{}: answered by {}", self.role, provider.provider_name());
                    return Ok(response);
                }
                Err(e) => {
                    warn!(
                        "Provider {} failed (attempt {}/{}): {}",
                        provider.provider_name(),
                        attempt,
                        self.retry_attempts,
                        e
                    );
                    last_error = e.to_string();
                }
            }

            if attempt < self.retry_attempts {
                let delay = Duration::from_millis(self.retry_delay_ms * attempt as u64);
                debug!("Waiting {:?} before retry", delay);
                sleep(delay).await;
            }
        }

        Err(last_error)
    }
}

#[async_trait]
impl LlmProvider for FallbackProvider {
    fn provider_name(&self) -> &str {
        &self.role
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let mut all_errors: Vec<String> = Vec::new();

        for provider in &self.providers {
            match self
                .try_provider_with_retry(provider.as_ref(), request)
                .await
            {
                Ok(response) => return Ok(response),
                Err(e) => all_errors.push(format!("{}: {}", provider.provider_name(), e)),
            }
        }

        Err(Error::provider(
            self.role.clone(),
            format!("All providers failed:\n{}", all_errors.join("\n")),
        ))
    }
}
