use crate::config::{key_or_env, ProviderConfig};
use crate::error::{Error, Result};
use crate::providers::{Attachment, LlmProvider, LlmRequest, LlmResponse, Message, Role, ToolCall};
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const UPLOAD_POLL_INTERVAL: Duration = Duration::from_secs(2);
const UPLOAD_MAX_POLLS: u32 = 90;

pub struct GoogleProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

/// A file stored through the Gemini Files API
#[derive(Debug, Deserialize)]
struct UploadedFile {
    name: String,
    #[serde(default)]
    uri: String,
    #[serde(default)]
    state: String,
}

#[derive(Debug, Deserialize)]
struct UploadEnvelope {
    file: UploadedFile,
}

/// Files uploaded for one request.
///
/// `release` deletes them once the request is done. If the request future is
/// dropped first (a timeout in the fallback chain, say), `Drop` hands the
/// deletes to a background task instead.
struct Uploads {
    client: Client,
    base_url: String,
    api_key: String,
    names: Vec<String>,
}

impl Uploads {
    fn push(&mut self, name: &str) {
        self.names.push(name.to_string());
    }

    async fn release(mut self) {
        for name in std::mem::take(&mut self.names) {
            delete_file(&self.client, &self.base_url, &self.api_key, &name).await;
        }
    }
}

impl Drop for Uploads {
    fn drop(&mut self) {
        if self.names.is_empty() {
            return;
        }
        let names = std::mem::take(&mut self.names);
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("No runtime left to delete uploaded files {:?}", names);
            return;
        };
        let client = self.client.clone();
        let base_url = self.base_url.clone();
        let api_key = self.api_key.clone();
        handle.spawn(async move {
            for name in names {
                delete_file(&client, &base_url, &api_key, &name).await;
            }
        });
    }
}

async fn delete_file(client: &Client, base_url: &str, api_key: &str, name: &str) {
    debug!("Deleting uploaded file {}", name);
    let result = client
        .delete(format!("{}/v1beta/{}?key={}", base_url, name, api_key))
        .send()
        .await;
    if let Err(e) = result {
        warn!("Failed to delete uploaded file {}: {}", name, e);
    }
}

impl GoogleProvider {
    /// Create a new Google Gemini provider from configuration
    pub fn new(config: &ProviderConfig, timeout: Duration) -> Result<Self> {
        // Try config first, then fall back to environment variable
        let api_key = key_or_env(&config.api_key, &["GOOGLE_API_KEY", "GEMINI_API_KEY"])
            .ok_or_else(|| Error::Config("GOOGLE_API_KEY not found in config or environment".into()))?;

        Ok(GoogleProvider {
            client: Client::builder().timeout(timeout).build()?,
            api_key,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    #[doc(hidden)]
    pub fn with_base_url(api_key: String, base_url: String, model: String) -> Self {
        GoogleProvider {
            client: Client::new(),
            api_key,
            base_url,
            model,
            temperature: 0.0,
            max_tokens: 2000,
        }
    }

    fn uploads(&self) -> Uploads {
        Uploads {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            names: Vec::new(),
        }
    }

    /// Build the generateContent body, uploading any video attachments first
    async fn request_body(&self, request: &LlmRequest, uploads: &mut Uploads) -> Result<Value> {
        let mut system = Vec::new();
        let mut contents: Vec<Value> = Vec::new();

        for message in &request.messages {
            match message.role {
                Role::System => system.push(message.content.clone()),
                Role::User => {
                    let mut parts = Vec::new();
                    if !message.content.is_empty() {
                        parts.push(json!({"text": message.content}));
                    }
                    for attachment in &message.attachments {
                        parts.push(self.attachment_part(attachment, uploads).await?);
                    }
                    contents.push(json!({"role": "user", "parts": parts}));
                }
                Role::Assistant => contents.push(json!({
                    "role": "model",
                    "parts": model_parts(message)
                })),
                Role::Tool => {
                    let part = json!({
                        "functionResponse": {
                            "name": message.name.clone().unwrap_or_default(),
                            "response": {"content": message.content}
                        }
                    });
                    // Consecutive tool results belong to a single turn
                    match contents.last_mut() {
                        Some(last) if is_function_response_turn(last) => {
                            if let Some(parts) = last["parts"].as_array_mut() {
                                parts.push(part);
                            }
                        }
                        _ => contents.push(json!({"role": "user", "parts": [part]})),
                    }
                }
            }
        }

        let mut generation_config = json!({
            "temperature": self.temperature,
            "maxOutputTokens": self.max_tokens
        });
        if let Some(schema) = &request.response_schema {
            generation_config["responseMimeType"] = json!("application/json");
            generation_config["responseJsonSchema"] = schema.schema.clone();
        }

        let mut body = json!({
            "contents": contents,
            "generationConfig": generation_config
        });
        if !system.is_empty() {
            body["systemInstruction"] = json!({"parts": [{"text": system.join("\n\n")}]});
        }
        if !request.tools.is_empty() {
            let declarations: Vec<Value> = request
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters
                    })
                })
                .collect();
            body["tools"] = json!([{"functionDeclarations": declarations}]);
        }

        Ok(body)
    }

    async fn attachment_part(&self, attachment: &Attachment, uploads: &mut Uploads) -> Result<Value> {
        match attachment {
            Attachment::Image { mime_type, data } => Ok(json!({
                "inline_data": {"mime_type": mime_type, "data": data}
            })),
            Attachment::Video { mime_type, path } => {
                let file = self.upload_file(path, mime_type, uploads).await?;
                Ok(json!({
                    "file_data": {"mime_type": mime_type, "file_uri": file.uri}
                }))
            }
        }
    }

    /// Resumable upload to the Files API, then wait until the file leaves PROCESSING.
    /// The file is registered in `uploads` before polling starts.
    async fn upload_file(&self, path: &Path, mime_type: &str, uploads: &mut Uploads) -> Result<UploadedFile> {
        let bytes = tokio::fs::read(path).await?;
        let display_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("recipe-video");
        info!("Uploading {} ({} bytes) to Gemini", display_name, bytes.len());

        let start = self
            .client
            .post(format!("{}/upload/v1beta/files?key={}", self.base_url, self.api_key))
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&json!({"file": {"display_name": display_name}}))
            .send()
            .await?;
        if !start.status().is_success() {
            return Err(Error::provider("google", format!("upload start failed: {}", start.status())));
        }
        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| Error::provider("google", "upload start returned no upload URL"))?
            .to_string();

        let finished = self
            .client
            .post(&upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await?;
        if !finished.status().is_success() {
            return Err(Error::provider("google", format!("upload failed: {}", finished.status())));
        }
        let mut file = finished.json::<UploadEnvelope>().await?.file;
        uploads.push(&file.name);

        let mut polls = 0;
        while file.state == "PROCESSING" {
            if polls >= UPLOAD_MAX_POLLS {
                return Err(Error::Timeout("gemini file processing"));
            }
            polls += 1;
            debug!("Waiting for {} to finish processing", file.name);
            tokio::time::sleep(UPLOAD_POLL_INTERVAL).await;
            file = self
                .client
                .get(format!("{}/v1beta/{}?key={}", self.base_url, file.name, self.api_key))
                .send()
                .await?
                .json::<UploadedFile>()
                .await?;
        }

        if file.state == "FAILED" {
            return Err(Error::provider("google", "video processing failed"));
        }
        Ok(file)
    }

    async fn generate_content(&self, body: &Value) -> Result<LlmResponse> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();
        let response_body: Value = response.json().await?;
        debug!("{:?}", response_body);
        if !status.is_success() {
            return Err(Error::provider(
                "google",
                format!("status {}: {}", status, response_body["error"]["message"]),
            ));
        }
        decode_response(&response_body)
    }
}

fn model_parts(message: &Message) -> Vec<Value> {
    let mut parts = Vec::new();
    if !message.content.is_empty() {
        parts.push(json!({"text": message.content}));
    }
    for call in &message.tool_calls {
        parts.push(json!({"functionCall": {"name": call.name, "args": call.arguments}}));
    }
    parts
}

fn is_function_response_turn(content: &Value) -> bool {
    content["role"] == "user"
        && content["parts"]
            .as_array()
            .is_some_and(|parts| parts.iter().all(|p| p.get("functionResponse").is_some()))
}

fn decode_response(body: &Value) -> Result<LlmResponse> {
    let parts = body["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or_else(|| {
            Error::provider(
                "google",
                "Failed to extract content from Google Gemini response",
            )
        })?;

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for part in parts {
        if let Some(t) = part["text"].as_str() {
            text.push_str(t);
        }
        if let Some(name) = part["functionCall"]["name"].as_str() {
            tool_calls.push(ToolCall {
                id: format!("call_{}", tool_calls.len()),
                name: name.to_string(),
                arguments: part["functionCall"]["args"].clone(),
            });
        }
    }

    Ok(LlmResponse {
        content: text,
        tool_calls,
    })
}

#[async_trait]
impl LlmProvider for GoogleProvider {
    fn provider_name(&self) -> &str {
        "google"
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let mut uploads = self.uploads();
        let result = match self.request_body(request, &mut uploads).await {
            Ok(body) => self.generate_content(&body).await,
            Err(e) => Err(e),
        };
        uploads.release().await;
        result
    }
}
