use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::secret::SecretString;

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Settings for the chat model behind the agent.
#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub model: String,
    pub api_key: SecretString,
    pub temperature: f32,
    pub max_tokens: u32,
    pub base_url: String,
}

impl LlmConfig {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_key,
            temperature: 0.0,
            max_tokens: 4096,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One conversation turn. `image` is a base64 PNG attached after the text.
#[derive(Clone, Debug)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
    pub image: Option<String>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            image: None,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            image: None,
        }
    }

    pub fn with_image(mut self, png_base64: String) -> Self {
        self.image = Some(png_base64);
        self
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send the conversation and return the model's text reply.
    async fn complete(&self, system: &str, messages: &[ChatMessage]) -> Result<String>;

    fn model(&self) -> &str;
}

/// Client for the Anthropic Messages API.
pub struct AnthropicClient {
    client: Client,
    config: LlmConfig,
}

impl AnthropicClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Llm(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn build_body(&self, system: &str, messages: &[ChatMessage]) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = messages
            .iter()
            .map(|msg| {
                let mut content = vec![serde_json::json!({
                    "type": "text",
                    "text": msg.text,
                })];
                if let Some(image) = &msg.image {
                    content.push(serde_json::json!({
                        "type": "image",
                        "source": {
                            "type": "base64",
                            "media_type": "image/png",
                            "data": image,
                        }
                    }));
                }
                serde_json::json!({ "role": msg.role, "content": content })
            })
            .collect();

        let mut body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": messages,
        });
        if !system.is_empty() {
            body["system"] = serde_json::Value::String(system.to_string());
        }
        body
    }
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[async_trait]
impl ChatModel for AnthropicClient {
    async fn complete(&self, system: &str, messages: &[ChatMessage]) -> Result<String> {
        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .header("x-api-key", self.config.api_key.expose())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.build_body(system, messages))
            .send()
            .await
            .map_err(|e| Error::Llm(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::Llm(format!("Anthropic API error ({status}): {detail}")));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| Error::Llm(format!("Failed to parse response: {e}")))?;

        let text: String = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n");
        tracing::debug!(model = %self.config.model, chars = text.len(), "model replied");
        Ok(text)
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}
