use crate::config::{key_or_env, ProviderConfig};
use crate::error::{Error, Result};
use crate::providers::{Attachment, LlmProvider, LlmRequest, LlmResponse, Message, Role, ToolCall};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider from configuration
    pub fn new(config: &ProviderConfig, timeout: Duration) -> Result<Self> {
        // Try config first, then fall back to environment variable
        let api_key = key_or_env(&config.api_key, &["OPENAI_API_KEY", "OPEN_API_KEY"])
            .ok_or_else(|| Error::Config("OPENAI_API_KEY not found in config or environment".into()))?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com".to_string());

        Ok(OpenAIProvider {
            client: Client::builder().timeout(timeout).build()?,
            api_key,
            base_url,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    #[doc(hidden)]
    pub fn with_base_url(api_key: String, base_url: String, model: String) -> Self {
        OpenAIProvider {
            client: Client::new(),
            api_key,
            base_url,
            model,
            temperature: 0.0,
            max_tokens: 2000,
        }
    }

    fn request_body(&self, request: &LlmRequest) -> Result<Value> {
        let messages = request
            .messages
            .iter()
            .map(encode_message)
            .collect::<Result<Vec<_>>>()?;

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens
        });

        if !request.tools.is_empty() {
            body["tools"] = request
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters
                        }
                    })
                })
                .collect();
        }

        if let Some(schema) = &request.response_schema {
            body["response_format"] = json!({
                "type": "json_schema",
                "json_schema": {
                    "name": schema.name,
                    "schema": schema.schema,
                    "strict": false
                }
            });
        }

        Ok(body)
    }
}

fn encode_message(message: &Message) -> Result<Value> {
    match message.role {
        Role::System => Ok(json!({"role": "system", "content": message.content})),
        Role::User if message.attachments.is_empty() => {
            Ok(json!({"role": "user", "content": message.content}))
        }
        Role::User => {
            let mut parts = vec![json!({"type": "text", "text": message.content})];
            for attachment in &message.attachments {
                match attachment {
                    Attachment::Image { mime_type, data } => parts.push(json!({
                        "type": "image_url",
                        "image_url": {"url": format!("data:{mime_type};base64,{data}")}
                    })),
                    Attachment::Video { .. } => {
                        return Err(Error::provider(
                            "openai",
                            "video attachments are not supported",
                        ))
                    }
                }
            }
            Ok(json!({"role": "user", "content": parts}))
        }
        Role::Assistant if message.tool_calls.is_empty() => {
            Ok(json!({"role": "assistant", "content": message.content}))
        }
        Role::Assistant => {
            let calls: Vec<Value> = message
                .tool_calls
                .iter()
                .map(|call| {
                    json!({
                        "id": call.id,
                        "type": "function",
                        "function": {
                            "name": call.name,
                            "arguments": call.arguments.to_string()
                        }
                    })
                })
                .collect();
            let content = if message.content.is_empty() {
                Value::Null
            } else {
                Value::String(message.content.clone())
            };
            Ok(json!({"role": "assistant", "content": content, "tool_calls": calls}))
        }
        Role::Tool => Ok(json!({
            "role": "tool",
            "tool_call_id": message.tool_call_id.clone().unwrap_or_default(),
            "content": message.content
        })),
    }
}

fn decode_response(body: &Value) -> Result<LlmResponse> {
    let message = &body["choices"][0]["message"];
    if message.is_null() {
        return Err(Error::provider(
            "openai",
            "Failed to extract message from response",
        ));
    }

    let content = message["content"].as_str().unwrap_or_default().to_string();
    let tool_calls = message["tool_calls"]
        .as_array()
        .map(|calls| {
            calls
                .iter()
                .filter_map(|call| {
                    let name = call["function"]["name"].as_str()?;
                    let raw_args = call["function"]["arguments"].as_str().unwrap_or("{}");
                    let arguments = serde_json::from_str(raw_args)
                        .unwrap_or_else(|_| Value::String(raw_args.to_string()));
                    Some(ToolCall {
                        id: call["id"].as_str().unwrap_or(name).to_string(),
                        name: name.to_string(),
                        arguments,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(LlmResponse {
        content,
        tool_calls,
    })
}

#[async_trait]
impl LlmProvider for OpenAIProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let body = self.request_body(request)?;
        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let response_body: Value = response.json().await?;
        debug!("{:?}", response_body);
        if !status.is_success() {
            return Err(Error::provider(
                "openai",
                format!("status {}: {}", status, response_body["error"]),
            ));
        }

        decode_response(&response_body)
    }
}
