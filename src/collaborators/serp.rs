use crate::collaborators::ImageStrategy;
use crate::config::ServicesConfig;
use crate::error::{Error, Result, Unavailable};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct WebResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub snippet: String,
}

#[derive(Deserialize)]
struct WebPage {
    #[serde(default)]
    organic_results: Vec<WebResult>,
}

#[derive(Deserialize)]
struct ImagePage {
    #[serde(default)]
    images_results: Vec<ImageResult>,
}

#[derive(Deserialize)]
struct ImageResult {
    #[serde(default)]
    original: Option<String>,
}

/// Google web and image search through SerpApi
pub struct SerpClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl SerpClient {
    pub fn new(services: &ServicesConfig, timeout: Duration) -> Result<Self> {
        Ok(SerpClient {
            client: Client::builder().timeout(timeout).build()?,
            api_key: services.serp_key(),
            base_url: services.serp_url.trim_end_matches('/').to_string(),
        })
    }

    #[doc(hidden)]
    pub fn with_base_url(api_key: &str, base_url: String) -> Self {
        SerpClient {
            client: Client::new(),
            api_key: Some(api_key.to_string()),
            base_url,
        }
    }

    async fn search(&self, engine: &str, query: &str, num: u32) -> Result<reqwest::Response> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::collaborator("serpapi", "SERP_API_KEY not configured"))?;

        let num = num.to_string();
        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[
                ("engine", engine),
                ("q", query),
                ("api_key", api_key),
                ("num", num.as_str()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::collaborator(
                "serpapi",
                format!("{} search returned {}", engine, response.status()),
            ));
        }
        Ok(response)
    }

    pub async fn web_search(&self, query: &str, limit: u32) -> Result<Vec<WebResult>> {
        let page: WebPage = self.search("google", query, limit).await?.json().await?;
        Ok(page.organic_results)
    }
}

/// Paid image search, used after the free search comes back empty
#[async_trait]
impl ImageStrategy for SerpClient {
    fn name(&self) -> &str {
        "google_images"
    }

    async fn attempt(&self, query: &str) -> Result<String, Unavailable> {
        let unavailable = |reason: String| Unavailable::new("google_images", reason);
        let page: ImagePage = self
            .search("google_images", query, 1)
            .await
            .map_err(|e| unavailable(e.to_string()))?
            .json()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        page.images_results
            .into_iter()
            .find_map(|image| image.original)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| unavailable(format!("no image for '{}'", query)))
    }
}
