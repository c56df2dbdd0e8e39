//! Scripted stand-ins for every collaborator and model role.
#![allow(dead_code)]

use async_trait::async_trait;
use plateit::collaborators::{
    ExtractedRecipe, ImageStrategy, PageFetcher, RecipeMatch, RecipeSource, VideoMetadata, VideoSource,
};
use plateit::error::{Error, Result, Unavailable};
use plateit::providers::{LlmProvider, LlmRequest, LlmResponse, Models, ToolCall};
use plateit::workflow::{Collaborators, StrategyChain, Workflow};
use serde_json::Value;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Answers from a queue and records every request it sees
pub struct ScriptedProvider {
    name: String,
    replies: Mutex<VecDeque<LlmResponse>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedProvider {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(ScriptedProvider {
            name: name.to_string(),
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn reply(&self, content: impl Into<String>) -> &Self {
        self.replies.lock().unwrap().push_back(LlmResponse::text(content));
        self
    }

    pub fn call_tool(&self, name: &str, arguments: Value) -> &Self {
        let call = ToolCall {
            id: format!("call_{}", name),
            name: name.to_string(),
            arguments,
        };
        self.replies.lock().unwrap().push_back(LlmResponse {
            content: String::new(),
            tool_calls: vec![call],
        });
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Text of the last user message of every request, in order
    pub fn prompts(&self) -> Vec<String> {
        self.requests()
            .iter()
            .filter_map(|r| r.messages.last().map(|m| m.content.clone()))
            .collect()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn provider_name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::provider(self.name.clone(), "script exhausted"))
    }
}

/// One scripted provider per model role
pub struct Roles {
    pub orchestrator: Arc<ScriptedProvider>,
    pub worker: Arc<ScriptedProvider>,
    pub refiner: Arc<ScriptedProvider>,
    pub reasoner: Arc<ScriptedProvider>,
    pub formatter: Arc<ScriptedProvider>,
}

impl Roles {
    pub fn new() -> Self {
        Roles {
            orchestrator: ScriptedProvider::new("orchestrator"),
            worker: ScriptedProvider::new("worker"),
            refiner: ScriptedProvider::new("refiner"),
            reasoner: ScriptedProvider::new("reasoner"),
            formatter: ScriptedProvider::new("formatter"),
        }
    }

    pub fn models(&self) -> Models {
        Models {
            orchestrator: self.orchestrator.clone(),
            worker: self.worker.clone(),
            refiner: self.refiner.clone(),
            reasoner: self.reasoner.clone(),
            formatter: self.formatter.clone(),
        }
    }

    pub fn total_calls(&self) -> usize {
        [&self.orchestrator, &self.worker, &self.refiner, &self.reasoner, &self.formatter]
            .iter()
            .map(|p| p.calls())
            .sum()
    }
}

#[derive(Default)]
pub struct FakeVideos {
    pub metadata: Option<VideoMetadata>,
    pub downloadable: bool,
    pub metadata_calls: AtomicUsize,
    pub download_calls: AtomicUsize,
}

#[async_trait]
impl VideoSource for FakeVideos {
    async fn metadata(&self, _url: &str) -> Result<VideoMetadata> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        self.metadata
            .clone()
            .ok_or_else(|| Error::collaborator("video metadata", "unavailable"))
    }

    async fn download(&self, _url: &str, dir: &Path) -> Result<PathBuf> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        if !self.downloadable {
            return Err(Error::collaborator("yt-dlp", "blocked"));
        }
        let path = dir.join("video.mp4");
        tokio::fs::write(&path, b"not really a video").await?;
        Ok(path)
    }
}

#[derive(Default)]
pub struct FakeRecipes {
    pub extraction: Option<ExtractedRecipe>,
    pub matches: Vec<RecipeMatch>,
    pub extract_calls: AtomicUsize,
    pub search_calls: AtomicUsize,
}

#[async_trait]
impl RecipeSource for FakeRecipes {
    async fn extract(&self, _url: &str) -> Result<ExtractedRecipe> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        self.extraction
            .clone()
            .ok_or_else(|| Error::collaborator("spoonacular", "extraction failed"))
    }

    async fn find_by_ingredients(&self, _ingredients: &[String]) -> Result<Vec<RecipeMatch>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.matches.clone())
    }
}

#[derive(Default)]
pub struct FakePages {
    pub text: Option<String>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl PageFetcher for FakePages {
    async fn text(&self, _url: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.text
            .clone()
            .ok_or_else(|| Error::collaborator("scrape", "403 Forbidden"))
    }

    async fn bytes(&self, _url: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::collaborator("download", "not scripted"))
    }
}

/// Image strategy that always answers the same way and counts lookups
pub struct CountingImages {
    pub name: String,
    pub url: Option<String>,
    pub calls: AtomicUsize,
}

impl CountingImages {
    pub fn hit(name: &str, url: &str) -> Arc<Self> {
        Arc::new(CountingImages {
            name: name.to_string(),
            url: Some(url.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn miss(name: &str) -> Arc<Self> {
        Arc::new(CountingImages {
            name: name.to_string(),
            url: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageStrategy for CountingImages {
    fn name(&self) -> &str {
        &self.name
    }

    async fn attempt(&self, _query: &str) -> Result<String, Unavailable> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.url
            .clone()
            .ok_or_else(|| Unavailable::new(self.name.clone(), "no result"))
    }
}

/// Everything a test needs to drive and inspect one workflow
pub struct Harness {
    pub roles: Roles,
    pub videos: Arc<FakeVideos>,
    pub recipes: Arc<FakeRecipes>,
    pub pages: Arc<FakePages>,
    pub ingredient_images: Arc<CountingImages>,
    pub step_images: Arc<CountingImages>,
}

impl Harness {
    pub fn new(videos: FakeVideos, recipes: FakeRecipes, pages: FakePages) -> Self {
        Harness {
            roles: Roles::new(),
            videos: Arc::new(videos),
            recipes: Arc::new(recipes),
            pages: Arc::new(pages),
            ingredient_images: CountingImages::hit("ingredient", "https://img.example/ingredient.png"),
            step_images: CountingImages::hit("step", "https://img.example/step.jpg"),
        }
    }

    pub fn workflow(&self) -> Workflow {
        let collaborators = Collaborators {
            videos: self.videos.clone(),
            recipes: self.recipes.clone(),
            pages: self.pages.clone(),
            ingredient_images: StrategyChain::new(vec![self.ingredient_images.clone() as Arc<dyn ImageStrategy>]),
            step_images: StrategyChain::new(vec![self.step_images.clone() as Arc<dyn ImageStrategy>]),
        };
        Workflow::new(self.roles.models(), collaborators).with_concurrency(2)
    }

    pub fn image_lookups(&self) -> usize {
        self.ingredient_images.calls() + self.step_images.calls()
    }
}

pub fn count(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

/// Formatted recipe JSON as the worker model would return it
pub const PANCAKE_JSON: &str = r#"{
    "name": "fluffy pancakes",
    "ingredients": [
        {"name": "egg", "amount": "1"},
        {"name": "flour", "amount": "1 cup"},
        {"name": "milk", "amount": "1 cup"}
    ],
    "steps": [
        {"instruction": "whisk everything together.", "visual_query": "whisking batter"},
        {"instruction": "fry ladlefuls until golden."}
    ]
}"#;
