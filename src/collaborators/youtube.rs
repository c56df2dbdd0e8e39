use crate::config::ServicesConfig;
use crate::error::{Error, Result};
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::OnceLock;
use std::time::Duration;

/// A video found by search, ready for display
#[derive(Debug, Clone, PartialEq)]
pub struct VideoResult {
    pub title: String,
    pub link: String,
    pub thumbnail: Option<String>,
    pub channel: String,
    pub views: String,
    pub length: String,
    pub is_short: bool,
}

#[derive(Deserialize)]
struct SearchPage {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    id: SearchId,
}

#[derive(Deserialize)]
struct SearchId {
    #[serde(rename = "videoId", default)]
    video_id: Option<String>,
}

#[derive(Deserialize)]
struct VideosPage {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    snippet: Snippet,
    #[serde(default)]
    statistics: Statistics,
    #[serde(default)]
    content_details: ContentDetails,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: String,
    #[serde(default)]
    channel_title: String,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Deserialize, Default)]
struct Thumbnails {
    maxres: Option<Thumbnail>,
    standard: Option<Thumbnail>,
    high: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    view_count: Option<String>,
}

#[derive(Deserialize, Default)]
struct ContentDetails {
    duration: Option<String>,
}

/// YouTube Data API v3 search
pub struct YouTubeClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl YouTubeClient {
    pub fn new(services: &ServicesConfig, timeout: Duration) -> Result<Self> {
        Ok(YouTubeClient {
            client: Client::builder().timeout(timeout).build()?,
            api_key: services.youtube_key(),
            base_url: services.youtube_url.trim_end_matches('/').to_string(),
        })
    }

    #[doc(hidden)]
    pub fn with_base_url(api_key: &str, base_url: String) -> Self {
        YouTubeClient {
            client: Client::new(),
            api_key: Some(api_key.to_string()),
            base_url,
        }
    }

    /// Search videos and return a mix of long videos and shorts
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<VideoResult>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::collaborator("youtube", "YT_API_KEY or GOOGLE_API_KEY not configured"))?;

        let pool = (limit * 3).to_string();
        let search: SearchPage = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[
                ("q", query),
                ("part", "id"),
                ("type", "video"),
                ("maxResults", pool.as_str()),
                ("key", api_key),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let ids: Vec<String> = search
            .items
            .into_iter()
            .filter_map(|item| item.id.video_id)
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let details: VideosPage = self
            .client
            .get(format!("{}/videos", self.base_url))
            .query(&[
                ("id", ids.join(",").as_str()),
                ("part", "snippet,statistics,contentDetails"),
                ("key", api_key),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let videos = details.items.into_iter().map(to_result).collect();
        Ok(balance(videos, limit))
    }
}

fn to_result(item: VideoItem) -> VideoResult {
    let duration = item.content_details.duration.unwrap_or_else(|| "PT0S".to_string());
    let thumbs = item.snippet.thumbnails;
    let thumbnail = [thumbs.maxres, thumbs.standard, thumbs.high, thumbs.default]
        .into_iter()
        .flatten()
        .map(|t| t.url)
        .next();

    VideoResult {
        title: item.snippet.title,
        link: format!("https://www.youtube.com/watch?v={}", item.id),
        thumbnail,
        channel: item.snippet.channel_title,
        views: format_views(item.statistics.view_count.as_deref().unwrap_or("0")),
        length: format_duration(&duration),
        // Durations without minutes or hours are shorts
        is_short: !duration.contains('M') && !duration.contains('H'),
    }
}

/// Roughly half long videos, the rest shorts, topped up from whatever is left
fn balance(videos: Vec<VideoResult>, limit: usize) -> Vec<VideoResult> {
    let target_longs = (limit / 2).max(1);
    let target_shorts = limit.saturating_sub(target_longs);

    let mut mixed: Vec<VideoResult> = videos.iter().filter(|v| !v.is_short).take(target_longs).cloned().collect();
    mixed.extend(videos.iter().filter(|v| v.is_short).take(target_shorts).cloned());

    let mut seen: HashSet<String> = mixed.iter().map(|v| v.link.clone()).collect();
    for video in videos {
        if mixed.len() >= limit {
            break;
        }
        if seen.insert(video.link.clone()) {
            mixed.push(video);
        }
    }
    mixed.truncate(limit);
    mixed
}

fn duration_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?$").expect("static regex")
    })
}

/// ISO-8601 duration ("PT1M23S") to a clock string ("1:23")
pub fn format_duration(iso: &str) -> String {
    let Some(caps) = duration_pattern().captures(iso.trim()) else {
        return "0:00".to_string();
    };
    let part = |i: usize| {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };
    let (h, m, s) = (part(1), part(2), part(3));
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

/// View count to a compact string ("1200000" -> "1.2M")
pub fn format_views(count: &str) -> String {
    let Ok(num) = count.trim().parse::<u64>() else {
        return "N/A".to_string();
    };
    let compact = |value: f64, suffix: &str| {
        let formatted = format!("{:.1}", value);
        format!("{}{}", formatted.trim_end_matches(".0"), suffix)
    };
    if num >= 1_000_000 {
        compact(num as f64 / 1_000_000.0, "M")
    } else if num >= 1_000 {
        compact(num as f64 / 1_000.0, "K")
    } else {
        num.to_string()
    }
}
