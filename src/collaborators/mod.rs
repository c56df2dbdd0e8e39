//! External capabilities the workflow and the assistant depend on.
//!
//! Each capability is a trait so stages can be driven by scripted fakes in
//! tests; the submodules hold the HTTP and subprocess adapters.

mod images;
mod page;
mod serp;
mod spoonacular;
mod user;
mod video;
mod youtube;

pub use images::{HeadProbe, HeuristicIngredientImage, PexelsImages};
pub use page::{visible_text, HttpFetcher};
pub use serp::{SerpClient, WebResult};
pub use spoonacular::{
    ExtendedIngredient, ExtractedRecipe, IngredientInformation, IngredientSummary,
    InstructionSet, InstructionStep, RecipeInformation, RecipeSummary, SpoonacularClient,
    StepItem, EQUIPMENT_IMAGE_BASE, INGREDIENT_IMAGE_BASE,
};
pub use user::{InMemoryUserContext, UserContext, UserProfile};
pub use video::{extract_video_id, is_youtube, YtDlp};
pub use youtube::{format_duration, format_views, VideoResult, YouTubeClient};

use crate::error::{Result, Unavailable};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Lightweight description of an online video
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub transcript: String,
    #[serde(default)]
    pub video_id: Option<String>,
}

/// Video metadata lookup and download
#[async_trait]
pub trait VideoSource: Send + Sync {
    async fn metadata(&self, url: &str) -> Result<VideoMetadata>;

    /// Download the video into `dir`, returning the absolute path of a non-empty file
    async fn download(&self, url: &str, dir: &Path) -> Result<PathBuf>;
}

/// Candidate recipe returned by an ingredient search
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeMatch {
    pub id: i64,
    pub title: String,
    pub image: Option<String>,
    pub missing: Vec<String>,
}

impl RecipeMatch {
    pub fn summary_line(&self) -> String {
        format!(
            "ID: {} | Title: {} | Image: {} | Missing: {}",
            self.id,
            self.title,
            self.image.as_deref().unwrap_or("None"),
            self.missing.join(", ")
        )
    }
}

/// Structured recipe extraction and ingredient-based lookup
#[async_trait]
pub trait RecipeSource: Send + Sync {
    async fn extract(&self, url: &str) -> Result<ExtractedRecipe>;

    async fn find_by_ingredients(&self, ingredients: &[String]) -> Result<Vec<RecipeMatch>>;
}

/// Raw page access
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Visible text of a page with scripts, styles and navigation removed
    async fn text(&self, url: &str) -> Result<String>;

    async fn bytes(&self, url: &str) -> Result<Vec<u8>>;
}

/// One way of finding an image for a query, tried as part of an ordered chain
#[async_trait]
pub trait ImageStrategy: Send + Sync {
    fn name(&self) -> &str;

    async fn attempt(&self, query: &str) -> Result<String, Unavailable>;
}

/// Cheap existence check for a URL
#[async_trait]
pub trait UrlProbe: Send + Sync {
    async fn exists(&self, url: &str) -> bool;
}
