use crate::collaborators::{ImageStrategy, UrlProbe, INGREDIENT_IMAGE_BASE};
use crate::config::ServicesConfig;
use crate::error::{Result, Unavailable};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// HEAD request that counts only a 200 as existing
pub struct HeadProbe {
    client: Client,
}

impl HeadProbe {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(HeadProbe {
            client: Client::builder().timeout(timeout).build()?,
        })
    }
}

#[async_trait]
impl UrlProbe for HeadProbe {
    async fn exists(&self, url: &str) -> bool {
        match self.client.head(url).send().await {
            Ok(response) => response.status() == reqwest::StatusCode::OK,
            Err(e) => {
                debug!("Probe of {} failed: {}", url, e);
                false
            }
        }
    }
}

/// Free ingredient image: the CDN's name-based file pattern, kept only when it exists
pub struct HeuristicIngredientImage {
    probe: Arc<dyn UrlProbe>,
    base_url: String,
}

impl HeuristicIngredientImage {
    pub fn new(probe: Arc<dyn UrlProbe>) -> Self {
        HeuristicIngredientImage {
            probe,
            base_url: INGREDIENT_IMAGE_BASE.to_string(),
        }
    }

    /// "Green Onion " -> ".../green-onion.jpg"
    pub fn candidate_url(&self, ingredient: &str) -> String {
        let slug = ingredient.trim().to_lowercase().replace(' ', "-");
        format!("{}{}.jpg", self.base_url, slug)
    }
}

#[async_trait]
impl ImageStrategy for HeuristicIngredientImage {
    fn name(&self) -> &str {
        "ingredient_cdn_pattern"
    }

    async fn attempt(&self, query: &str) -> Result<String, Unavailable> {
        if query.trim().is_empty() {
            return Err(Unavailable::new(self.name(), "empty ingredient name"));
        }
        let url = self.candidate_url(query);
        if self.probe.exists(&url).await {
            Ok(url)
        } else {
            Err(Unavailable::new(self.name(), format!("{} did not validate", url)))
        }
    }
}

#[derive(Deserialize)]
struct PexelsPage {
    #[serde(default)]
    photos: Vec<PexelsPhoto>,
}

#[derive(Deserialize)]
struct PexelsPhoto {
    src: PexelsSources,
}

#[derive(Deserialize)]
struct PexelsSources {
    medium: String,
}

/// Free stock photo search
pub struct PexelsImages {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    qualifier: Option<String>,
}

impl PexelsImages {
    pub fn new(services: &ServicesConfig, timeout: Duration) -> Result<Self> {
        Ok(PexelsImages {
            client: Client::builder().timeout(timeout).build()?,
            api_key: services.pexels_key(),
            base_url: services.pexels_url.trim_end_matches('/').to_string(),
            qualifier: None,
        })
    }

    #[doc(hidden)]
    pub fn with_base_url(api_key: &str, base_url: String) -> Self {
        PexelsImages {
            client: Client::new(),
            api_key: Some(api_key.to_string()),
            base_url,
            qualifier: None,
        }
    }

    /// Words appended to every query, e.g. "cooking food"
    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        let qualifier = qualifier.into();
        self.qualifier = Some(qualifier).filter(|q| !q.trim().is_empty());
        self
    }

    fn query_for(&self, query: &str) -> String {
        match &self.qualifier {
            Some(qualifier) => format!("{} {}", query.trim(), qualifier.trim()),
            None => query.trim().to_string(),
        }
    }
}

#[async_trait]
impl ImageStrategy for PexelsImages {
    fn name(&self) -> &str {
        "pexels"
    }

    async fn attempt(&self, query: &str) -> Result<String, Unavailable> {
        let unavailable = |reason: String| Unavailable::new("pexels", reason);
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| unavailable("PEXELS_API_KEY not configured".to_string()))?;

        let response = self
            .client
            .get(format!("{}/v1/search", self.base_url))
            .header("Authorization", api_key)
            .query(&[
                ("query", self.query_for(query).as_str()),
                ("per_page", "1"),
                ("orientation", "landscape"),
            ])
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(unavailable(format!("status {}", response.status())));
        }
        let page: PexelsPage = response.json().await.map_err(|e| unavailable(e.to_string()))?;
        page.photos
            .into_iter()
            .next()
            .map(|photo| photo.src.medium)
            .ok_or_else(|| unavailable(format!("no image for '{}'", query)))
    }
}
