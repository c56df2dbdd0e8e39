//! Multi-source recipe extraction.
//!
//! An input URL or image is routed through an explicit graph of stages
//! ([`graph`]); each stage reads the running [`AgentState`] and returns a
//! [`StatePatch`] that is merged into it. Stage failures become notes, never
//! errors, so every request reaches the terminal merge stage.

pub mod graph;
mod prompts;
pub mod router;
mod stages;
pub mod state;
pub mod strategy;

pub use graph::{Stage, StageRunner};
pub use router::SourceKind;
pub use stages::website::recipe_from_extraction;
pub use state::{AgentState, StatePatch, Sufficiency};
pub use strategy::StrategyChain;

use crate::collaborators::{
    HeadProbe, HeuristicIngredientImage, HttpFetcher, ImageStrategy, PageFetcher, PexelsImages,
    RecipeSource, SerpClient, SpoonacularClient, UrlProbe, VideoSource, YtDlp,
};
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::model::Recipe;
use crate::providers::Models;
use async_trait::async_trait;
use log::{info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// External capabilities the stages call
#[derive(Clone)]
pub struct Collaborators {
    pub videos: Arc<dyn VideoSource>,
    pub recipes: Arc<dyn RecipeSource>,
    pub pages: Arc<dyn PageFetcher>,
    /// Ingredient name -> image URL, cheapest first
    pub ingredient_images: StrategyChain,
    /// Step query -> image URL, free search first
    pub step_images: StrategyChain,
}

/// What to extract a recipe from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionInput {
    Url(String),
    ImagePath(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The recipe has at least one step
    Complete,
    /// Nothing usable could be extracted
    Empty,
}

/// Result of one extraction request
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub recipe: Recipe,
    pub outcome: Outcome,
    /// Recoverable failures met on the way, in stage order
    pub notes: Vec<String>,
    /// Stages in the order they ran
    pub stages: Vec<Stage>,
}

impl ExtractionReport {
    fn from_state(state: AgentState, stages: Vec<Stage>) -> Self {
        let recipe = state.recipe.unwrap_or_else(|| Recipe {
            source: Some(state.url.clone()).filter(|url| !url.is_empty()),
            ..Default::default()
        });
        let outcome = if recipe.steps.is_empty() {
            Outcome::Empty
        } else {
            Outcome::Complete
        };
        ExtractionReport {
            recipe,
            outcome,
            notes: state.notes,
            stages,
        }
    }
}

/// The extraction workflow with its models and collaborators
pub struct Workflow {
    pub(crate) models: Models,
    pub(crate) collaborators: Collaborators,
    pub(crate) concurrency: usize,
}

impl Workflow {
    pub fn new(models: Models, collaborators: Collaborators) -> Self {
        Workflow {
            models,
            collaborators,
            concurrency: 4,
        }
    }

    /// Maximum in-flight image lookups per enrichment stage
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Wire the HTTP and subprocess adapters described by `config`
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let timeouts = &config.timeouts;
        let services = &config.services;

        let spoonacular = Arc::new(SpoonacularClient::new(services, timeouts.http())?);
        let probe: Arc<dyn UrlProbe> = Arc::new(HeadProbe::new(timeouts.probe())?);

        let ingredient_images = StrategyChain::new(vec![
            Arc::new(HeuristicIngredientImage::new(probe)) as Arc<dyn ImageStrategy>,
            spoonacular.clone() as Arc<dyn ImageStrategy>,
        ]);
        let step_images = StrategyChain::new(vec![
            Arc::new(
                PexelsImages::new(services, timeouts.http())?
                    .with_qualifier(config.enrichment.step_query_qualifier.clone()),
            ) as Arc<dyn ImageStrategy>,
            Arc::new(SerpClient::new(services, timeouts.http())?) as Arc<dyn ImageStrategy>,
        ]);

        let collaborators = Collaborators {
            videos: Arc::new(YtDlp::new(services, timeouts)?),
            recipes: spoonacular,
            pages: Arc::new(HttpFetcher::new(timeouts.http())?),
            ingredient_images,
            step_images,
        };

        Ok(Workflow::new(Models::from_config(config)?, collaborators)
            .with_concurrency(config.enrichment.concurrency))
    }

    /// Run one extraction request to completion. Never fails: problems are
    /// reported through [`ExtractionReport::notes`] and an empty outcome.
    pub async fn extract(&self, input: ExtractionInput) -> ExtractionReport {
        let initial = match input {
            ExtractionInput::Url(url) => AgentState::for_url(url.trim()),
            ExtractionInput::ImagePath(path) => AgentState::for_image(path),
        };
        info!("Extracting recipe from {}", initial.url);

        let scratch = match tempfile::Builder::new().prefix("plateit-").tempdir() {
            Ok(dir) => Some(dir),
            Err(e) => {
                warn!("Could not create a scratch directory: {}", e);
                None
            }
        };
        let run = Run {
            workflow: self,
            scratch,
        };

        let (state, stages) = graph::execute(&run, initial).await;
        let report = ExtractionReport::from_state(state, stages);
        info!(
            "Extraction finished: {:?} ({} ingredients, {} steps)",
            report.outcome,
            report.recipe.ingredients.len(),
            report.recipe.steps.len()
        );
        report
    }
}

/// One request's view of the workflow: owns the temp directory that every
/// downloaded file lives in, removed when the run is dropped.
struct Run<'a> {
    workflow: &'a Workflow,
    scratch: Option<TempDir>,
}

impl Run<'_> {
    fn scratch_dir(&self) -> Result<&Path> {
        self.scratch
            .as_ref()
            .map(TempDir::path)
            .ok_or_else(|| Error::Config("no scratch directory for downloads".to_string()))
    }
}

#[async_trait]
impl StageRunner for Run<'_> {
    async fn run(&self, stage: Stage, state: &AgentState) -> StatePatch {
        let flow = self.workflow;
        match stage {
            Stage::CheckVideoMetadata => stages::video::check_metadata(flow, state).await,
            Stage::DownloadVideo => match self.scratch_dir() {
                Ok(dir) => stages::video::download(flow, state, dir).await,
                Err(e) => StatePatch::note(format!("{}: {}", stage, e)),
            },
            Stage::FetchVideoMetadata => stages::video::fetch_metadata(flow, state).await,
            Stage::ExtractFromVideo => stages::video::extract_from_video(flow, state).await,
            Stage::ScrapeWebsite => stages::website::scrape(flow, state).await,
            Stage::LoadImage => match self.scratch_dir() {
                Ok(dir) => stages::image::load_image(flow, state, dir).await,
                Err(e) => StatePatch::note(format!("{}: {}", stage, e)),
            },
            Stage::AnalyzeImage => stages::image::analyze_image(flow, state).await,
            Stage::RecipeFromIngredients => stages::generate::from_ingredients(flow, state).await,
            Stage::RecipeFromDish => stages::generate::from_dish(flow, state).await,
            Stage::ExtractFromText => stages::generate::from_text(flow, state).await,
            Stage::FormatRecipe => stages::format::format_recipe(flow, state).await,
            Stage::PolishRecipe => stages::format::polish_recipe(flow, state).await,
            Stage::EnrichIngredients => stages::enrich::enrich_ingredients(flow, state).await,
            Stage::EnrichSteps => stages::enrich::enrich_steps(flow, state).await,
            Stage::MergeEnrichment => stages::enrich::merge(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RecipeStep;

    #[test]
    fn test_report_outcome_follows_steps() {
        let empty = ExtractionReport::from_state(AgentState::for_url("https://blog.example/x"), vec![]);
        assert_eq!(empty.outcome, Outcome::Empty);
        assert_eq!(empty.recipe.source.as_deref(), Some("https://blog.example/x"));

        let state = AgentState {
            recipe: Some(Recipe {
                name: "Toast".to_string(),
                steps: vec![RecipeStep::new("Toast the bread.")],
                ..Default::default()
            }),
            ..AgentState::for_url("https://blog.example/toast")
        };
        let report = ExtractionReport::from_state(state, vec![Stage::ScrapeWebsite]);
        assert_eq!(report.outcome, Outcome::Complete);
        assert_eq!(report.stages, vec![Stage::ScrapeWebsite]);
    }

    #[test]
    fn test_report_serializes_stage_names() {
        let report = ExtractionReport::from_state(AgentState::default(), vec![Stage::FormatRecipe]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcome"], "empty");
        assert_eq!(json["stages"][0], "format_recipe");
    }
}
