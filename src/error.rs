use thiserror::Error;

/// Errors that can occur while extracting recipes or running an assistant turn
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP transport failure talking to a collaborator
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A language-model provider returned an error or an unusable reply
    #[error("Provider {provider} failed: {message}")]
    Provider { provider: String, message: String },

    /// An external collaborator (search, scraping, video tooling) failed
    #[error("{name} failed: {message}")]
    Collaborator { name: String, message: String },

    /// Model output did not match the declared schema
    #[error("Schema validation failed: {0}")]
    Schema(String),

    /// A bounded call ran past its deadline
    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),

    /// The assistant loop could not complete the turn
    #[error("Agent error: {0}")]
    Agent(String),

    /// Builder configuration error
    #[error("Builder error: {0}")]
    Builder(String),

    /// Invalid or incomplete configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration source could not be loaded
    #[error("Configuration error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn collaborator(name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Collaborator {
            name: name.into(),
            message: message.into(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A strategy in a fallback chain produced nothing usable
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{strategy}: {reason}")]
pub struct Unavailable {
    pub strategy: String,
    pub reason: String,
}

impl Unavailable {
    pub fn new(strategy: impl Into<String>, reason: impl Into<String>) -> Self {
        Unavailable {
            strategy: strategy.into(),
            reason: reason.into(),
        }
    }
}

/// Run a future under a deadline, mapping expiry to [`Error::Timeout`]
pub async fn with_timeout<T, F>(
    what: &'static str,
    limit: std::time::Duration,
    fut: F,
) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(what)),
    }
}
