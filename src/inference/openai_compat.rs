//! OpenAI-compatible chat-completions backend
//!
//! Works against vLLM, llama.cpp server, Ollama and hosted gateways. The frame
//! travels inline as a `data:` URL `image_url` content part.

use super::{InferenceError, VisionBackend, VisionRequest};
use crate::config::InferenceConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f64,
}

#[derive(Debug, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// HTTP client for an OpenAI-compatible vision endpoint
pub struct OpenAiCompatBackend {
    http: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
    max_tokens: u32,
    temperature: f64,
}

impl OpenAiCompatBackend {
    pub fn new(cfg: &InferenceConfig) -> Result<Self, InferenceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            url: format!("{}/v1/chat/completions", cfg.base_url.trim_end_matches('/')),
            model: cfg.model.clone(),
            api_key: cfg.api_key.clone().filter(|k| !k.trim().is_empty()),
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.url
    }

    /// Request body for one frame
    pub fn chat_request(&self, request: &VisionRequest<'_>) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: request.prompt.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: request.image.data_url(),
                        },
                    },
                ],
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

#[async_trait]
impl VisionBackend for OpenAiCompatBackend {
    async fn generate(&self, request: VisionRequest<'_>) -> Result<String, InferenceError> {
        let body = self.chat_request(&request);
        let mut req = self.http.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(InferenceError::Status {
                status: status.as_u16(),
                body: body.chars().take(300).collect(),
            });
        }

        let parsed: ChatResponse = resp.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(InferenceError::EmptyResponse)
    }

    fn backend_name(&self) -> &str {
        "openai-compat"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ImageFormat, NormalizedImage};

    #[test]
    fn test_request_shape() {
        let cfg = InferenceConfig {
            base_url: "http://vlm:8000/".to_string(),
            model: "test-model".to_string(),
            ..InferenceConfig::default()
        };
        let backend = OpenAiCompatBackend::new(&cfg).unwrap();
        assert_eq!(backend.endpoint(), "http://vlm:8000/v1/chat/completions");

        let image = NormalizedImage {
            format: ImageFormat::Jpeg,
            width: Some(640),
            height: Some(480),
            byte_len: 3,
            data_base64: "AAAA".to_string(),
        };
        let request = VisionRequest {
            prompt: "describe",
            image: &image,
            label: None,
        };
        let v = serde_json::to_value(backend.chat_request(&request)).unwrap();
        assert_eq!(v["model"], "test-model");
        assert_eq!(v["messages"][0]["role"], "user");
        assert_eq!(v["messages"][0]["content"][0]["type"], "text");
        assert_eq!(v["messages"][0]["content"][1]["type"], "image_url");
        assert_eq!(
            v["messages"][0]["content"][1]["image_url"]["url"],
            "data:image/jpeg;base64,AAAA"
        );
    }
}
