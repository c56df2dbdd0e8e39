use std::path::PathBuf;

use crate::assistant::{Assistant, ChatRequest, TurnReport};
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::workflow::{ExtractionInput, ExtractionReport, Workflow};

/// Represents the input for one request
#[derive(Debug, Clone)]
pub enum InputSource {
    /// Video or web page URL, or the URL of an image
    Url(String),
    /// Local image file of ingredients or a finished dish
    Image(PathBuf),
    /// One assistant turn
    Chat(ChatRequest),
}

/// Result of a request
#[derive(Debug, Clone)]
pub enum ImportResult {
    /// Recipe extracted by the workflow
    Recipe(ExtractionReport),
    /// Completed assistant turn
    Reply(TurnReport),
}

/// Builder for configuring and running extraction or chat requests
#[derive(Default)]
pub struct RecipeImporterBuilder {
    source: Option<InputSource>,
    config: Option<AppConfig>,
    workflow: Option<Workflow>,
    assistant: Option<Assistant>,
}

impl RecipeImporterBuilder {
    /// Extract a recipe from a URL
    ///
    /// # Example
    /// ```
    /// use plateit::RecipeImporter;
    ///
    /// let builder = RecipeImporter::builder()
    ///     .url("https://www.youtube.com/watch?v=dQw4w9WgXcQ");
    /// ```
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.source = Some(InputSource::Url(url.into()));
        self
    }

    /// Extract a recipe from a local image
    ///
    /// The image is classified as raw ingredients or a finished dish and a
    /// recipe is generated accordingly.
    pub fn image(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(InputSource::Image(path.into()));
        self
    }

    /// Run one assistant turn
    ///
    /// # Example
    /// ```
    /// use plateit::{ChatRequest, RecipeImporter};
    ///
    /// let builder = RecipeImporter::builder()
    ///     .chat(ChatRequest::new("Find me a quick vegan dinner"));
    /// ```
    pub fn chat(mut self, request: ChatRequest) -> Self {
        self.source = Some(InputSource::Chat(request));
        self
    }

    /// Use this configuration instead of loading `plateit.toml` and the environment
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use a prepared workflow, e.g. one wired to custom collaborators
    pub fn workflow(mut self, workflow: Workflow) -> Self {
        self.workflow = Some(workflow);
        self
    }

    /// Use a prepared assistant
    pub fn assistant(mut self, assistant: Assistant) -> Self {
        self.assistant = Some(assistant);
        self
    }

    /// Build and execute the request
    ///
    /// # Errors
    /// Returns an error if:
    /// - No input source was specified
    /// - The configuration cannot be loaded or names no usable provider
    /// - The assistant turn fails
    ///
    /// Extraction itself never fails; problems are reported in the
    /// [`ExtractionReport`].
    ///
    /// # Example
    /// ```no_run
    /// # use plateit::{ImportResult, RecipeImporter};
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// if let ImportResult::Recipe(report) = RecipeImporter::builder()
    ///     .url("https://example.com/lasagna")
    ///     .build()
    ///     .await?
    /// {
    ///     println!("{}", report.recipe.name);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn build(self) -> Result<ImportResult> {
        let source = self.source.ok_or_else(|| {
            Error::Builder("No input source specified. Use .url(), .image() or .chat()".to_string())
        })?;

        let config = match self.config {
            Some(config) => Some(config),
            None if self.workflow.is_none() || self.assistant.is_none() => Some(AppConfig::load()?),
            None => None,
        };

        match source {
            InputSource::Url(url) => {
                if url.trim().is_empty() {
                    return Err(Error::Builder("URL cannot be empty".to_string()));
                }
                let workflow = workflow_or_default(self.workflow, config.as_ref())?;
                Ok(ImportResult::Recipe(workflow.extract(ExtractionInput::Url(url)).await))
            }
            InputSource::Image(path) => {
                let workflow = workflow_or_default(self.workflow, config.as_ref())?;
                Ok(ImportResult::Recipe(workflow.extract(ExtractionInput::ImagePath(path)).await))
            }
            InputSource::Chat(request) => {
                if request.message.trim().is_empty() && request.image_data.is_none() {
                    return Err(Error::Builder("Chat message cannot be empty".to_string()));
                }
                let assistant = match (self.assistant, config.as_ref()) {
                    (Some(assistant), _) => assistant,
                    (None, Some(config)) => Assistant::from_config(config).await?,
                    (None, None) => return Err(Error::Builder("No assistant configured".to_string())),
                };
                Ok(ImportResult::Reply(assistant.run_turn(request).await?))
            }
        }
    }
}

fn workflow_or_default(workflow: Option<Workflow>, config: Option<&AppConfig>) -> Result<Workflow> {
    match (workflow, config) {
        (Some(workflow), _) => Ok(workflow),
        (None, Some(config)) => Workflow::from_config(config),
        (None, None) => Err(Error::Builder("No workflow configured".to_string())),
    }
}

/// Main entry point for the builder API
pub struct RecipeImporter;

impl RecipeImporter {
    /// Creates a new builder
    ///
    /// # Example
    /// ```
    /// use plateit::RecipeImporter;
    ///
    /// let builder = RecipeImporter::builder();
    /// ```
    pub fn builder() -> RecipeImporterBuilder {
        RecipeImporterBuilder::default()
    }
}
