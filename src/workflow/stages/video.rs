use crate::collaborators::{extract_video_id, is_youtube, VideoMetadata};
use crate::error::{Error, Result};
use crate::model::strip_code_fences;
use crate::providers::{Attachment, LlmRequest, Message};
use crate::workflow::graph::Stage;
use crate::workflow::prompts;
use crate::workflow::stages::contain;
use crate::workflow::state::{AgentState, StatePatch, Sufficiency};
use crate::workflow::Workflow;
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;

/// Descriptions shorter than this, without a transcript, skip the model check
pub const SHORT_DESCRIPTION_CHARS: usize = 100;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Verdict {
    is_complete: bool,
}

/// Video id and thumbnail, preferring the high resolution YouTube pattern
fn identity(url: &str, meta: &VideoMetadata) -> (Option<String>, Option<String>) {
    let video_id = meta
        .video_id
        .clone()
        .filter(|id| !id.is_empty())
        .or_else(|| extract_video_id(url));

    let thumbnail = match (&video_id, is_youtube(url)) {
        (Some(id), true) => Some(format!("https://img.youtube.com/vi/{}/hqdefault.jpg", id)),
        _ => meta.thumbnail.clone(),
    };
    (video_id, thumbnail)
}

fn combined_text(meta: &VideoMetadata) -> String {
    let mut text = format!("Title: {}\nDescription: {}", meta.title, meta.description);
    if !meta.transcript.trim().is_empty() {
        text.push_str("\n\nTranscript:\n");
        text.push_str(meta.transcript.trim());
    }
    text
}

fn non_empty(value: &str) -> Option<String> {
    Some(value.trim().to_string()).filter(|v| !v.is_empty())
}

/// Metadata sufficiency gate
pub async fn check_metadata(flow: &Workflow, state: &AgentState) -> StatePatch {
    let meta = match flow.collaborators.videos.metadata(&state.url).await {
        Ok(meta) => meta,
        Err(e) => {
            warn!("No metadata for {}: {}", state.url, e);
            return StatePatch {
                metadata_sufficient: Some(Sufficiency::No),
                ..Default::default()
            }
            .with_note(format!("{}: {}", Stage::CheckVideoMetadata, e));
        }
    };

    let (video_id, video_thumbnail) = identity(&state.url, &meta);
    let mut patch = StatePatch {
        video_id,
        video_thumbnail,
        description: non_empty(&meta.description),
        transcript: non_empty(&meta.transcript),
        ..Default::default()
    };

    if meta.description.chars().count() < SHORT_DESCRIPTION_CHARS && meta.transcript.trim().is_empty() {
        info!("Description too short to hold a recipe, downloading the video");
        patch.metadata_sufficient = Some(Sufficiency::No);
        return patch;
    }

    let content = combined_text(&meta);
    match ask_is_complete(flow, &content).await {
        Ok(true) => {
            info!("Metadata holds a full recipe, skipping the download");
            patch.metadata_sufficient = Some(Sufficiency::Yes);
            patch.text_content = Some(content);
        }
        Ok(false) => {
            info!("Metadata is incomplete, downloading the video");
            patch.metadata_sufficient = Some(Sufficiency::No);
        }
        Err(e) => {
            warn!("Sufficiency check failed, assuming insufficient: {}", e);
            patch.metadata_sufficient = Some(Sufficiency::No);
            patch.notes.push(format!("{}: {}", Stage::CheckVideoMetadata, e));
        }
    }
    patch
}

async fn ask_is_complete(flow: &Workflow, content: &str) -> Result<bool> {
    let request = LlmRequest::new(vec![Message::user(prompts::sufficiency_prompt(content))]).with_schema(
        "sufficiency",
        json!({
            "type": "object",
            "properties": {"is_complete": {"type": "boolean"}},
            "required": ["is_complete"]
        }),
    );
    let response = flow.models.worker.complete(&request).await?;
    debug!("Sufficiency verdict: {}", response.content);
    let verdict: Verdict = serde_json::from_str(strip_code_fences(&response.content))
        .map_err(|e| Error::Schema(format!("sufficiency verdict: {e}")))?;
    Ok(verdict.is_complete)
}

pub async fn download(flow: &Workflow, state: &AgentState, dir: &Path) -> StatePatch {
    match flow.collaborators.videos.download(&state.url, dir).await {
        Ok(path) => StatePatch {
            video_file_path: Some(path),
            ..Default::default()
        },
        Err(e) => {
            warn!("Video download failed, continuing with metadata only: {}", e);
            StatePatch::note(format!("{}: {}", Stage::DownloadVideo, e))
        }
    }
}

/// Metadata-only path after a failed download
pub async fn fetch_metadata(flow: &Workflow, state: &AgentState) -> StatePatch {
    match flow.collaborators.videos.metadata(&state.url).await {
        Ok(meta) if !meta.title.trim().is_empty() => {
            let (video_id, video_thumbnail) = identity(&state.url, &meta);
            StatePatch {
                video_id,
                video_thumbnail,
                description: non_empty(&meta.description),
                transcript: non_empty(&meta.transcript),
                ..Default::default()
            }
        }
        other => {
            let reason = match other {
                Err(e) => e.to_string(),
                Ok(_) => "metadata without a title".to_string(),
            };
            StatePatch {
                video_id: extract_video_id(&state.url),
                ..Default::default()
            }
            .with_note(format!("{}: {}", Stage::FetchVideoMetadata, reason))
        }
    }
}

/// Native video understanding on the downloaded file. The file is removed
/// afterwards whether or not extraction worked.
pub async fn extract_from_video(flow: &Workflow, state: &AgentState) -> StatePatch {
    let Some(path) = state.video_file_path.as_deref() else {
        return StatePatch::default();
    };
    if !path.exists() {
        return StatePatch::note(format!("{}: {} is gone", Stage::ExtractFromVideo, path.display()));
    }

    let request = LlmRequest::new(vec![
        Message::user(prompts::VIDEO_PROMPT.trim()).with_attachment(Attachment::video(path))
    ]);
    let result = flow.models.orchestrator.complete(&request).await;

    if let Err(e) = tokio::fs::remove_file(path).await {
        debug!("Could not remove {}: {}", path.display(), e);
    }

    contain(
        Stage::ExtractFromVideo,
        result.and_then(|response| {
            let text = response.content.trim();
            if text.is_empty() {
                return Err(Error::Schema("video extraction returned no text".to_string()));
            }
            Ok(StatePatch {
                raw_recipe_text: Some(text.to_string()),
                ..Default::default()
            })
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(description: &str, transcript: &str) -> VideoMetadata {
        VideoMetadata {
            title: "Stew".to_string(),
            description: description.to_string(),
            thumbnail: Some("https://cdn.example/t.jpg".to_string()),
            transcript: transcript.to_string(),
            video_id: None,
        }
    }

    #[test]
    fn test_identity_prefers_youtube_pattern() {
        let (id, thumb) = identity("https://youtu.be/abc123", &meta("", ""));
        assert_eq!(id.as_deref(), Some("abc123"));
        assert_eq!(thumb.as_deref(), Some("https://img.youtube.com/vi/abc123/hqdefault.jpg"));

        let (id, thumb) = identity("https://www.tiktok.com/@chef/video/1", &meta("", ""));
        assert_eq!(id, None);
        assert_eq!(thumb.as_deref(), Some("https://cdn.example/t.jpg"));
    }

    #[test]
    fn test_combined_text_includes_transcript_only_when_present() {
        assert_eq!(combined_text(&meta("Beef stew", "")), "Title: Stew\nDescription: Beef stew");
        assert!(combined_text(&meta("Beef stew", "brown the beef")).ends_with("Transcript:\nbrown the beef"));
    }
}
