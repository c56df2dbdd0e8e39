use crate::collaborators::{VideoMetadata, VideoSource};
use crate::config::{ServicesConfig, TimeoutConfig};
use crate::error::{with_timeout, Error, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Client;
use serde::Deserialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::process::Command;
use url::Url;

const YOUTUBE_MARKERS: [&str; 2] = ["youtube.com", "youtu.be"];

pub fn is_youtube(url: &str) -> bool {
    let lower = url.to_lowercase();
    YOUTUBE_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Video id of a YouTube watch, shorts or share link
pub fn extract_video_id(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    let mut segments = parsed.path_segments()?.filter(|s| !s.is_empty());

    let id = if host == "youtu.be" || host.ends_with(".youtu.be") {
        segments.next().map(str::to_string)
    } else if host.ends_with("youtube.com") {
        match segments.next() {
            Some("watch") => parsed
                .query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, value)| value.into_owned()),
            Some("shorts") | Some("embed") | Some("live") => segments.next().map(str::to_string),
            _ => None,
        }
    } else {
        None
    };

    id.filter(|id| !id.is_empty())
}

#[derive(Deserialize)]
struct DumpedInfo {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    thumbnail: Option<String>,
}

/// Video metadata and downloads through the yt-dlp executable
pub struct YtDlp {
    program: String,
    cookies: Option<String>,
    metadata_timeout: Duration,
    download_timeout: Duration,
    http: Client,
}

impl YtDlp {
    pub fn new(services: &ServicesConfig, timeouts: &TimeoutConfig) -> Result<Self> {
        Ok(YtDlp {
            program: services.yt_dlp_path.clone(),
            cookies: services.cookies(),
            metadata_timeout: timeouts.metadata(),
            download_timeout: timeouts.video(),
            http: Client::builder().timeout(timeouts.video()).build()?,
        })
    }

    /// Cookie file for this invocation; removed when the handle drops
    fn cookie_file(&self) -> Result<Option<NamedTempFile>> {
        let Some(cookies) = &self.cookies else {
            return Ok(None);
        };
        let mut file = NamedTempFile::new()?;
        file.write_all(cookies.as_bytes())?;
        file.flush()?;
        Ok(Some(file))
    }

    async fn run(&self, args: Vec<String>, limit: Duration) -> Result<Vec<u8>> {
        let cookies = self.cookie_file()?;
        let mut command = Command::new(&self.program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(file) = &cookies {
            command.arg("--cookies").arg(file.path());
        }

        debug!("Running {} {:?}", self.program, args);
        let output = with_timeout("yt-dlp", limit, async {
            command.output().await.map_err(Error::from)
        })
        .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("not a bot") || stderr.contains("Sign in") {
                warn!("YouTube is blocking this host; provide YOUTUBE_COOKIES to continue");
            }
            return Err(Error::collaborator("yt-dlp", stderr.trim().to_string()));
        }
        Ok(output.stdout)
    }

    async fn direct_download(&self, url: &str, path: &Path) -> Result<()> {
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(Error::collaborator(
                "video download",
                format!("{} returned {}", url, response.status()),
            ));
        }
        let bytes = response.bytes().await?;
        tokio::fs::write(path, &bytes).await?;
        Ok(())
    }
}

async fn non_empty(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

#[async_trait]
impl VideoSource for YtDlp {
    async fn metadata(&self, url: &str) -> Result<VideoMetadata> {
        let stdout = self
            .run(vec![
                "--dump-json".to_string(),
                "--skip-download".to_string(),
                "--no-playlist".to_string(),
                "--no-warnings".to_string(),
                url.to_string(),
            ], self.metadata_timeout)
            .await?;

        let info: DumpedInfo = serde_json::from_slice(&stdout)?;
        Ok(VideoMetadata {
            title: info.title.unwrap_or_default(),
            description: info.description.unwrap_or_default(),
            thumbnail: info.thumbnail.filter(|t| !t.is_empty()),
            transcript: String::new(),
            video_id: info.id.or_else(|| extract_video_id(url)),
        })
    }

    async fn download(&self, url: &str, dir: &Path) -> Result<PathBuf> {
        let path = dir.join("video.mp4");
        let result = self
            .run(vec![
                "--format".to_string(),
                "best[ext=mp4]/best".to_string(),
                "--output".to_string(),
                path.to_string_lossy().into_owned(),
                "--no-playlist".to_string(),
                "--force-overwrites".to_string(),
                url.to_string(),
            ], self.download_timeout)
            .await;

        match result {
            Ok(_) if non_empty(&path).await => {
                info!("Downloaded {} to {}", url, path.display());
                return Ok(path);
            }
            Ok(_) => warn!("yt-dlp produced no file for {}, trying a direct download", url),
            Err(e) => warn!("yt-dlp failed for {}: {}. Trying a direct download", url, e),
        }

        let _ = tokio::fs::remove_file(&path).await;
        self.direct_download(url, &path).await?;
        if non_empty(&path).await {
            Ok(path)
        } else {
            Err(Error::collaborator("video download", format!("empty file for {}", url)))
        }
    }
}
