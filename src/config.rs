use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Top-level configuration for the extraction workflow and the cooking assistant
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    /// Map of provider name to provider configuration
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    /// Which providers back each model role, in fallback order
    #[serde(default)]
    pub roles: RolesConfig,
    /// Retry behaviour inside a role's fallback chain
    #[serde(default)]
    pub fallback: FallbackConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    /// Credentials and endpoints for the non-LLM collaborators
    #[serde(default)]
    pub services: ServicesConfig,
}

/// Configuration for a specific AI provider
#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    /// Provider implementation ("openai" or "google"); defaults to the map key
    pub kind: Option<String>,
    /// Whether this provider is enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Model identifier (e.g., "gpt-4o", "gemini-2.5-flash")
    pub model: String,
    /// Temperature for generation (0.0-1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// API key for authentication (can also be set via environment variable)
    pub api_key: Option<String>,
    /// Base URL for API endpoint (for custom or proxy endpoints)
    pub base_url: Option<String>,
}

/// Provider names backing each model role. The first entry is preferred,
/// the rest are tried in order when it fails.
#[derive(Debug, Deserialize, Clone)]
pub struct RolesConfig {
    /// Recipe generation, vision and video understanding
    #[serde(default = "default_orchestrator")]
    pub orchestrator: Vec<String>,
    /// Structured formatting and the metadata sufficiency check
    #[serde(default = "default_worker")]
    pub worker: Vec<String>,
    /// Cheap prose polish
    #[serde(default = "default_refiner")]
    pub refiner: Vec<String>,
    /// Tool-calling reasoning in the assistant loop
    #[serde(default = "default_orchestrator")]
    pub reasoner: Vec<String>,
    /// Structured response formatting in the assistant loop
    #[serde(default = "default_orchestrator")]
    pub formatter: Vec<String>,
}

impl Default for RolesConfig {
    fn default() -> Self {
        Self {
            orchestrator: default_orchestrator(),
            worker: default_worker(),
            refiner: default_refiner(),
            reasoner: default_orchestrator(),
            formatter: default_orchestrator(),
        }
    }
}

/// Configuration for provider fallback and retry behavior
#[derive(Debug, Deserialize, Clone)]
pub struct FallbackConfig {
    /// Number of retry attempts per provider before falling back
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Initial delay between retries in milliseconds (grows with each attempt)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TimeoutConfig {
    /// Per language-model call
    #[serde(default = "default_llm_secs")]
    pub llm_secs: u64,
    /// Per HTTP collaborator call
    #[serde(default = "default_http_secs")]
    pub http_secs: u64,
    /// Image existence probe
    #[serde(default = "default_probe_millis")]
    pub probe_millis: u64,
    /// Video metadata lookup, without downloading
    #[serde(default = "default_metadata_secs")]
    pub metadata_secs: u64,
    /// Video download and multimodal extraction
    #[serde(default = "default_video_secs")]
    pub video_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            llm_secs: default_llm_secs(),
            http_secs: default_http_secs(),
            probe_millis: default_probe_millis(),
            metadata_secs: default_metadata_secs(),
            video_secs: default_video_secs(),
        }
    }
}

impl TimeoutConfig {
    pub fn llm(&self) -> Duration {
        Duration::from_secs(self.llm_secs)
    }

    pub fn http(&self) -> Duration {
        Duration::from_secs(self.http_secs)
    }

    pub fn probe(&self) -> Duration {
        Duration::from_millis(self.probe_millis)
    }

    pub fn metadata(&self) -> Duration {
        Duration::from_secs(self.metadata_secs)
    }

    pub fn video(&self) -> Duration {
        Duration::from_secs(self.video_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EnrichmentConfig {
    /// Maximum in-flight image lookups per enrichment stage
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Context words appended to step image queries for the free search
    #[serde(default = "default_step_query_qualifier")]
    pub step_query_qualifier: String,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            step_query_qualifier: default_step_query_qualifier(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AssistantConfig {
    /// Reasoning/tool round trips allowed before formatting is forced
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
    /// Wall-clock budget for a whole chat turn
    #[serde(default = "default_turn_budget_secs")]
    pub turn_budget_secs: u64,
    /// JSON file mapping user ids to saved preferences and pantry
    #[serde(default)]
    pub profiles_path: Option<String>,
}

impl AssistantConfig {
    pub fn turn_budget(&self) -> Duration {
        Duration::from_secs(self.turn_budget_secs)
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: default_max_tool_rounds(),
            turn_budget_secs: default_turn_budget_secs(),
            profiles_path: None,
        }
    }
}

/// Credentials and endpoints for recipe, image, search and video collaborators.
/// Base URLs are overridable so adapters can point at test servers.
#[derive(Debug, Deserialize, Clone)]
pub struct ServicesConfig {
    pub spoonacular_api_key: Option<String>,
    #[serde(default = "default_spoonacular_url")]
    pub spoonacular_url: String,
    pub pexels_api_key: Option<String>,
    #[serde(default = "default_pexels_url")]
    pub pexels_url: String,
    pub serp_api_key: Option<String>,
    #[serde(default = "default_serp_url")]
    pub serp_url: String,
    pub youtube_api_key: Option<String>,
    #[serde(default = "default_youtube_url")]
    pub youtube_url: String,
    /// Path or name of the yt-dlp executable
    #[serde(default = "default_yt_dlp_path")]
    pub yt_dlp_path: String,
    /// Netscape cookie file contents handed to yt-dlp
    pub youtube_cookies: Option<String>,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            spoonacular_api_key: None,
            spoonacular_url: default_spoonacular_url(),
            pexels_api_key: None,
            pexels_url: default_pexels_url(),
            serp_api_key: None,
            serp_url: default_serp_url(),
            youtube_api_key: None,
            youtube_url: default_youtube_url(),
            yt_dlp_path: default_yt_dlp_path(),
            youtube_cookies: None,
        }
    }
}

impl ServicesConfig {
    pub fn spoonacular_key(&self) -> Option<String> {
        key_or_env(&self.spoonacular_api_key, &["SPOONACULAR_API_KEY"])
    }

    pub fn pexels_key(&self) -> Option<String> {
        key_or_env(&self.pexels_api_key, &["PEXELS_API_KEY"])
    }

    pub fn serp_key(&self) -> Option<String> {
        key_or_env(&self.serp_api_key, &["SERP_API_KEY"])
    }

    pub fn youtube_key(&self) -> Option<String> {
        key_or_env(&self.youtube_api_key, &["YT_API_KEY", "GOOGLE_API_KEY"])
    }

    pub fn cookies(&self) -> Option<String> {
        key_or_env(&self.youtube_cookies, &["YOUTUBE_COOKIES"])
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
    }
}

/// Configured value first, then the first environment variable that is set
pub(crate) fn key_or_env(configured: &Option<String>, vars: &[&str]) -> Option<String> {
    configured
        .clone()
        .filter(|k| !k.trim().is_empty())
        .or_else(|| vars.iter().find_map(|var| std::env::var(var).ok()))
        .filter(|k| !k.trim().is_empty())
}

// Default value functions
fn default_enabled() -> bool {
    true
}

fn default_temperature() -> f32 {
    0.0
}

fn default_max_tokens() -> u32 {
    4000
}

fn default_orchestrator() -> Vec<String> {
    vec!["gemini".to_string(), "gpt4o".to_string()]
}

fn default_worker() -> Vec<String> {
    vec!["gpt4o".to_string()]
}

fn default_refiner() -> Vec<String> {
    vec!["gpt4o_mini".to_string(), "gpt4o".to_string()]
}

fn default_retry_attempts() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_llm_secs() -> u64 {
    120
}

fn default_http_secs() -> u64 {
    30
}

fn default_probe_millis() -> u64 {
    1500
}

fn default_metadata_secs() -> u64 {
    30
}

fn default_video_secs() -> u64 {
    300
}

fn default_concurrency() -> usize {
    4
}

fn default_step_query_qualifier() -> String {
    "cooking food".to_string()
}

fn default_max_tool_rounds() -> usize {
    6
}

fn default_turn_budget_secs() -> u64 {
    120
}

fn default_spoonacular_url() -> String {
    "https://api.spoonacular.com".to_string()
}

fn default_pexels_url() -> String {
    "https://api.pexels.com".to_string()
}

fn default_serp_url() -> String {
    "https://serpapi.com".to_string()
}

fn default_youtube_url() -> String {
    "https://www.googleapis.com/youtube/v3".to_string()
}

fn default_yt_dlp_path() -> String {
    "yt-dlp".to_string()
}

impl AppConfig {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables with PLATEIT__ prefix
    /// 2. plateit.toml file in current directory
    /// 3. Default values
    ///
    /// Environment variable format: PLATEIT__SERVICES__PEXELS_API_KEY
    pub fn load() -> Result<Self, ConfigError> {
        load_config()
    }

    /// Provider configurations for a role, in fallback order.
    /// Names missing from `providers` fall back to the built-in model table,
    /// anything else is skipped.
    pub fn role_providers(&self, names: &[String]) -> Vec<(String, ProviderConfig)> {
        names
            .iter()
            .filter_map(|name| {
                self.providers
                    .get(name)
                    .cloned()
                    .or_else(|| builtin_provider(name))
                    .map(|config| (name.clone(), config))
            })
            .collect()
    }
}

/// Models referenced by the default role table
fn builtin_provider(name: &str) -> Option<ProviderConfig> {
    let (kind, model) = match name {
        "gemini" => ("google", "gemini-2.5-flash"),
        "gpt4o" => ("openai", "gpt-4o"),
        "gpt4o_mini" => ("openai", "gpt-4o-mini"),
        _ => return None,
    };
    Some(ProviderConfig {
        kind: Some(kind.to_string()),
        enabled: true,
        model: model.to_string(),
        temperature: default_temperature(),
        max_tokens: default_max_tokens(),
        api_key: None,
        base_url: None,
    })
}

/// Load configuration from file and environment variables
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let settings = Config::builder()
        // Optional config file (can be missing)
        .add_source(File::with_name("plateit").required(false))
        // Use double underscore for nested: PLATEIT__PROVIDERS__GPT4O__API_KEY
        .add_source(
            Environment::with_prefix("PLATEIT")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    settings.try_deserialize()
}
