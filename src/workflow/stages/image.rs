use crate::error::{Error, Result};
use crate::model::strip_code_fences;
use crate::providers::{Attachment, LlmRequest, Message};
use crate::workflow::graph::Stage;
use crate::workflow::prompts;
use crate::workflow::stages::contain;
use crate::workflow::state::{AgentState, StatePatch};
use crate::workflow::Workflow;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::{debug, info};
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};

/// Use a local image as is, or download a remote one into `dir`
pub async fn load_image(flow: &Workflow, state: &AgentState, dir: &Path) -> StatePatch {
    contain(Stage::LoadImage, resolve_image(flow, &state.url, dir).await)
}

async fn resolve_image(flow: &Workflow, location: &str, dir: &Path) -> Result<StatePatch> {
    let local = Path::new(location);
    let path = if tokio::fs::try_exists(local).await.unwrap_or(false) {
        tokio::fs::canonicalize(local).await?
    } else {
        let bytes = flow.collaborators.pages.bytes(location).await?;
        if bytes.is_empty() {
            return Err(Error::collaborator("image download", format!("{} is empty", location)));
        }
        let path = dir.join(format!("image.{}", extension_of(location)));
        tokio::fs::write(&path, &bytes).await?;
        info!("Downloaded image {} ({} bytes)", location, bytes.len());
        path
    };

    Ok(StatePatch {
        image_file_path: Some(path),
        ..Default::default()
    })
}

fn extension_of(location: &str) -> &'static str {
    let lower = location.to_lowercase();
    let path = lower.split(['?', '#']).next().unwrap_or_default();
    ["png", "webp", "heic", "jpeg"]
        .into_iter()
        .find(|ext| path.ends_with(&format!(".{}", ext)))
        .unwrap_or("jpg")
}

fn mime_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        _ => "image/jpeg",
    }
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
enum ImageKind {
    Ingredients,
    Dish,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(untagged)]
enum Content {
    List(Vec<String>),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct Analysis {
    #[serde(rename = "type")]
    kind: ImageKind,
    content: Content,
}

impl Analysis {
    fn into_patch(self) -> StatePatch {
        match self.kind {
            ImageKind::Ingredients => {
                let items: Vec<String> = match self.content {
                    Content::List(items) => items,
                    Content::Text(text) => text.split(',').map(str::to_string).collect(),
                };
                let items = items
                    .into_iter()
                    .map(|item| item.trim().to_string())
                    .filter(|item| !item.is_empty())
                    .collect();
                StatePatch {
                    ingredients_detected: Some(items),
                    ..Default::default()
                }
            }
            ImageKind::Dish => {
                let description = match self.content {
                    Content::List(items) => items.join(", "),
                    Content::Text(text) => text,
                };
                StatePatch {
                    ingredients_detected: Some(Vec::new()),
                    dish_description: Some(description.trim().to_string()).filter(|d| !d.is_empty()),
                    ..Default::default()
                }
            }
        }
    }
}

fn parse_analysis(content: &str) -> Result<StatePatch> {
    let analysis: Analysis = serde_json::from_str(strip_code_fences(content))
        .map_err(|e| Error::Schema(format!("image analysis: {e}")))?;
    Ok(analysis.into_patch())
}

/// Classify the image as raw ingredients or a finished dish
pub async fn analyze_image(flow: &Workflow, state: &AgentState) -> StatePatch {
    let Some(path) = state.image_file_path.as_deref() else {
        return StatePatch::default();
    };
    contain(Stage::AnalyzeImage, classify(flow, path.to_path_buf()).await)
}

async fn classify(flow: &Workflow, path: PathBuf) -> Result<StatePatch> {
    let bytes = tokio::fs::read(&path).await?;
    let attachment = Attachment::Image {
        mime_type: mime_type(&path).to_string(),
        data: STANDARD.encode(&bytes),
    };

    let request = LlmRequest::new(vec![
        Message::user(prompts::CLASSIFY_IMAGE_PROMPT.trim()).with_attachment(attachment)
    ])
    .with_schema(
        "image_analysis",
        json!({
            "type": "object",
            "properties": {
                "type": {"type": "string", "enum": ["ingredients", "dish"]},
                "content": {"type": "string"}
            },
            "required": ["type", "content"]
        }),
    );

    let response = flow.models.orchestrator.complete(&request).await?;
    debug!("Image analysis: {}", response.content);
    parse_analysis(&response.content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ingredient_list() {
        let patch = parse_analysis(r#"{"type": "ingredients", "content": "egg, flour , milk,"}"#).unwrap();
        assert_eq!(
            patch.ingredients_detected,
            Some(vec!["egg".to_string(), "flour".to_string(), "milk".to_string()])
        );
        assert_eq!(patch.dish_description, None);

        let patch = parse_analysis("```json\n{\"type\": \"ingredients\", \"content\": [\"rice\", \" nori \"]}\n```").unwrap();
        assert_eq!(patch.ingredients_detected, Some(vec!["rice".to_string(), "nori".to_string()]));
    }

    #[test]
    fn test_parse_dish() {
        let patch = parse_analysis(r#"{"type": "dish", "content": "A bowl of ramen with egg"}"#).unwrap();
        assert_eq!(patch.ingredients_detected, Some(vec![]));
        assert_eq!(patch.dish_description.as_deref(), Some("A bowl of ramen with egg"));
    }

    #[test]
    fn test_parse_rejects_off_schema() {
        assert!(parse_analysis(r#"{"type": "drink", "content": "tea"}"#).is_err());
        assert!(parse_analysis("It looks like pasta").is_err());
        assert!(parse_analysis(r#"{"content": "tea"}"#).is_err());
    }

    #[test]
    fn test_extension_and_mime() {
        assert_eq!(extension_of("https://cdn.example/a.PNG?w=100"), "png");
        assert_eq!(extension_of("https://cdn.example/photo"), "jpg");
        assert_eq!(mime_type(Path::new("/tmp/a.webp")), "image/webp");
        assert_eq!(mime_type(Path::new("/tmp/a.jpeg")), "image/jpeg");
    }
}
