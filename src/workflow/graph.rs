use crate::workflow::router::SourceKind;
use crate::workflow::state::{AgentState, StatePatch, Sufficiency};
use async_trait::async_trait;
use futures_util::future::join_all;
use log::{info, warn};
use serde::Serialize;
use std::fmt;

/// Upper bound on stage executions per request. The topology is acyclic and
/// its longest path is ten stages, so hitting this means the table is broken.
const MAX_TRANSITIONS: usize = 32;

/// Named stages of the extraction graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    CheckVideoMetadata,
    DownloadVideo,
    FetchVideoMetadata,
    ScrapeWebsite,
    LoadImage,
    ExtractFromVideo,
    AnalyzeImage,
    RecipeFromIngredients,
    RecipeFromDish,
    ExtractFromText,
    FormatRecipe,
    PolishRecipe,
    EnrichIngredients,
    EnrichSteps,
    MergeEnrichment,
}

pub const ALL_STAGES: [Stage; 15] = [
    Stage::CheckVideoMetadata,
    Stage::DownloadVideo,
    Stage::FetchVideoMetadata,
    Stage::ScrapeWebsite,
    Stage::LoadImage,
    Stage::ExtractFromVideo,
    Stage::AnalyzeImage,
    Stage::RecipeFromIngredients,
    Stage::RecipeFromDish,
    Stage::ExtractFromText,
    Stage::FormatRecipe,
    Stage::PolishRecipe,
    Stage::EnrichIngredients,
    Stage::EnrichSteps,
    Stage::MergeEnrichment,
];

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::CheckVideoMetadata => "check_video_metadata",
            Stage::DownloadVideo => "download_video",
            Stage::FetchVideoMetadata => "fetch_video_metadata",
            Stage::ScrapeWebsite => "scrape_website",
            Stage::LoadImage => "load_image",
            Stage::ExtractFromVideo => "extract_from_video",
            Stage::AnalyzeImage => "analyze_image",
            Stage::RecipeFromIngredients => "recipe_from_ingredients",
            Stage::RecipeFromDish => "recipe_from_dish",
            Stage::ExtractFromText => "extract_from_text",
            Stage::FormatRecipe => "format_recipe",
            Stage::PolishRecipe => "polish_recipe",
            Stage::EnrichIngredients => "enrich_ingredients",
            Stage::EnrichSteps => "enrich_steps",
            Stage::MergeEnrichment => "merge_enrichment",
        }
    }

    /// Outgoing edge of this stage
    pub fn edge(self) -> Edge {
        match self {
            Stage::CheckVideoMetadata => Edge::Branch(after_metadata_check),
            Stage::DownloadVideo => Edge::Branch(after_download),
            Stage::FetchVideoMetadata => Edge::To(Stage::ExtractFromText),
            Stage::ScrapeWebsite => Edge::Branch(after_scrape),
            Stage::LoadImage => Edge::To(Stage::AnalyzeImage),
            Stage::AnalyzeImage => Edge::Branch(after_image_analysis),
            Stage::ExtractFromVideo
            | Stage::RecipeFromIngredients
            | Stage::RecipeFromDish
            | Stage::ExtractFromText => Edge::To(Stage::FormatRecipe),
            Stage::FormatRecipe => Edge::To(Stage::PolishRecipe),
            Stage::PolishRecipe => Edge::FanOut {
                branches: &[Stage::EnrichIngredients, Stage::EnrichSteps],
                join: Stage::MergeEnrichment,
            },
            Stage::EnrichIngredients | Stage::EnrichSteps => Edge::To(Stage::MergeEnrichment),
            Stage::MergeEnrichment => Edge::End,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Routing decision out of a stage
#[derive(Clone, Copy)]
pub enum Edge {
    To(Stage),
    /// Conditional edge: a predicate over the merged state picks the next stage
    Branch(fn(&AgentState) -> Stage),
    /// Run every branch against the same state, merge all patches, continue at `join`
    FanOut {
        branches: &'static [Stage],
        join: Stage,
    },
    End,
}

/// Initial conditional edge
pub fn entry(state: &AgentState) -> Stage {
    if state.image_file_path.is_some() {
        return Stage::AnalyzeImage;
    }
    match SourceKind::classify(&state.url) {
        SourceKind::Youtube | SourceKind::VideoFile => Stage::CheckVideoMetadata,
        SourceKind::ImageFile => Stage::LoadImage,
        SourceKind::Website => Stage::ScrapeWebsite,
    }
}

pub fn after_metadata_check(state: &AgentState) -> Stage {
    match state.metadata_sufficient {
        Some(Sufficiency::Yes) => Stage::ExtractFromText,
        _ => Stage::DownloadVideo,
    }
}

pub fn after_download(state: &AgentState) -> Stage {
    if state.video_file_path.is_some() {
        Stage::ExtractFromVideo
    } else {
        Stage::FetchVideoMetadata
    }
}

pub fn after_scrape(state: &AgentState) -> Stage {
    if state.recipe.is_some() {
        Stage::PolishRecipe
    } else {
        Stage::ExtractFromText
    }
}

pub fn after_image_analysis(state: &AgentState) -> Stage {
    if state.ingredients_detected.is_empty() {
        Stage::RecipeFromDish
    } else {
        Stage::RecipeFromIngredients
    }
}

/// Executes one stage against a read-only view of the state
#[async_trait]
pub trait StageRunner: Send + Sync {
    async fn run(&self, stage: Stage, state: &AgentState) -> StatePatch;
}

/// Walk the graph from its entry edge to the terminal stage.
/// Returns the final state and the stages in execution order.
pub async fn execute<R: StageRunner + ?Sized>(runner: &R, initial: AgentState) -> (AgentState, Vec<Stage>) {
    let mut state = initial;
    let mut trace = Vec::new();
    let mut stage = entry(&state);

    loop {
        if trace.len() >= MAX_TRANSITIONS {
            warn!("Stopping extraction after {} stage executions", trace.len());
            state = state.merge(StatePatch::note("stage limit reached"));
            break;
        }

        info!("Stage {}", stage);
        trace.push(stage);
        let patch = runner.run(stage, &state).await;
        state = state.merge(patch);

        stage = match stage.edge() {
            Edge::To(next) => next,
            Edge::Branch(pick) => pick(&state),
            Edge::FanOut { branches, join } => {
                for branch in branches {
                    info!("Stage {} (parallel)", branch);
                }
                let patches = join_all(branches.iter().map(|branch| runner.run(*branch, &state))).await;
                trace.extend_from_slice(branches);
                for patch in patches {
                    state = state.merge(patch);
                }
                join
            }
            Edge::End => break,
        };
    }

    (state, trace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Recipe;

    #[test]
    fn test_entry_edges() {
        assert_eq!(entry(&AgentState::for_url("https://youtu.be/x")), Stage::CheckVideoMetadata);
        assert_eq!(entry(&AgentState::for_url("https://tiktok.com/@a/video/1")), Stage::CheckVideoMetadata);
        assert_eq!(entry(&AgentState::for_url("https://img.example/a.png")), Stage::LoadImage);
        assert_eq!(entry(&AgentState::for_url("https://blog.example/soup")), Stage::ScrapeWebsite);
        assert_eq!(entry(&AgentState::for_image("/tmp/upload.jpg")), Stage::AnalyzeImage);
    }

    #[test]
    fn test_branch_predicates() {
        let mut state = AgentState::default();
        assert_eq!(after_metadata_check(&state), Stage::DownloadVideo);
        state.metadata_sufficient = Some(Sufficiency::No);
        assert_eq!(after_metadata_check(&state), Stage::DownloadVideo);
        state.metadata_sufficient = Some(Sufficiency::Yes);
        assert_eq!(after_metadata_check(&state), Stage::ExtractFromText);

        assert_eq!(after_download(&state), Stage::FetchVideoMetadata);
        state.video_file_path = Some("/tmp/v.mp4".into());
        assert_eq!(after_download(&state), Stage::ExtractFromVideo);

        assert_eq!(after_scrape(&state), Stage::ExtractFromText);
        state.recipe = Some(Recipe::default());
        assert_eq!(after_scrape(&state), Stage::PolishRecipe);

        assert_eq!(after_image_analysis(&state), Stage::RecipeFromDish);
        state.ingredients_detected = vec!["egg".to_string()];
        assert_eq!(after_image_analysis(&state), Stage::RecipeFromIngredients);
    }

    #[test]
    fn test_every_stage_reaches_merge() {
        // Follow static edges and both sides of each branch; every path must end
        fn reaches_end(stage: Stage, depth: usize) -> bool {
            if depth > MAX_TRANSITIONS {
                return false;
            }
            let targets: Vec<Stage> = match stage.edge() {
                Edge::End => return true,
                Edge::To(next) => vec![next],
                Edge::FanOut { join, .. } => vec![join],
                Edge::Branch(_) => match stage {
                    Stage::CheckVideoMetadata => vec![Stage::ExtractFromText, Stage::DownloadVideo],
                    Stage::DownloadVideo => vec![Stage::ExtractFromVideo, Stage::FetchVideoMetadata],
                    Stage::ScrapeWebsite => vec![Stage::PolishRecipe, Stage::ExtractFromText],
                    Stage::AnalyzeImage => vec![Stage::RecipeFromIngredients, Stage::RecipeFromDish],
                    _ => return false,
                },
            };
            targets.into_iter().all(|next| reaches_end(next, depth + 1))
        }

        for stage in ALL_STAGES {
            assert!(reaches_end(stage, 0), "{stage} does not terminate");
        }
    }

    #[test]
    fn test_stage_names_are_snake_case() {
        assert_eq!(Stage::CheckVideoMetadata.to_string(), "check_video_metadata");
        assert_eq!(
            serde_json::to_value(Stage::MergeEnrichment).unwrap(),
            serde_json::json!("merge_enrichment")
        );
    }

    struct Recorder;

    #[async_trait]
    impl StageRunner for Recorder {
        async fn run(&self, stage: Stage, _state: &AgentState) -> StatePatch {
            match stage {
                Stage::ScrapeWebsite => StatePatch::note("structured extraction failed"),
                Stage::ExtractFromText => StatePatch {
                    raw_recipe_text: Some("Toast\n1. Toast bread".to_string()),
                    ..Default::default()
                },
                Stage::FormatRecipe => StatePatch {
                    recipe: Some(Recipe {
                        name: "Toast".to_string(),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                _ => StatePatch::default(),
            }
        }
    }

    #[tokio::test]
    async fn test_execute_website_fallback_path() {
        let (state, trace) = execute(&Recorder, AgentState::for_url("https://blog.example/toast")).await;
        assert_eq!(
            trace,
            vec![
                Stage::ScrapeWebsite,
                Stage::ExtractFromText,
                Stage::FormatRecipe,
                Stage::PolishRecipe,
                Stage::EnrichIngredients,
                Stage::EnrichSteps,
                Stage::MergeEnrichment,
            ]
        );
        assert_eq!(state.recipe.unwrap().name, "Toast");
        assert_eq!(state.notes, vec!["structured extraction failed"]);
    }
}
