mod factory;
mod fallback;
mod google;
mod message;
mod open_ai;
mod roles;

pub use factory::ProviderFactory;
pub use fallback::FallbackProvider;
pub use google::GoogleProvider;
pub use message::{
    Attachment, LlmRequest, LlmResponse, Message, ResponseSchema, Role, ToolCall,
    ToolDefinition,
};
pub use open_ai::OpenAIProvider;
pub use roles::Models;

use crate::error::Result;
use async_trait::async_trait;

/// Unified trait for all LLM providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name (e.g., "openai", "google")
    fn provider_name(&self) -> &str;

    /// Run one completion: free text, tool calls, or schema-conforming JSON text
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse>;

    /// Convenience for a single system + user prompt returning free text
    async fn generate(&self, system: &str, user: &str) -> Result<String> {
        let response = self.complete(&LlmRequest::prompt(system, user)).await?;
        Ok(response.content)
    }
}
