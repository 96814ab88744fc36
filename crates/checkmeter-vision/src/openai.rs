//! OpenAI-compatible chat-completions backend

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use checkmeter_core::{Error, ImagePayload, RawModelResponse, Result, Tier};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use crate::backend::VisionBackend;
use crate::config::VisionConfig;
use crate::prompts::InstructionSet;

const USER_TEXT: &str = "Analyze this meter photo.";

/// Vision backend talking to `POST {backend_url}/chat/completions`
pub struct OpenAiBackend {
    client: reqwest::Client,
    config: VisionConfig,
    api_key: String,
    instructions: InstructionSet,
}

impl OpenAiBackend {
    /// Create a new backend
    pub fn new(config: VisionConfig, api_key: impl Into<String>, instructions: InstructionSet) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            api_key: api_key.into(),
            instructions,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.backend_url.trim_end_matches('/'))
    }

    fn build_request(&self, image: &ImagePayload, tier: Tier) -> ChatCompletionRequest {
        let data_uri = format!("data:{};base64,{}", image.mime_type, STANDARD.encode(&image.bytes));

        ChatCompletionRequest {
            model: self.config.model_for(tier).to_string(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(self.instructions.for_tier(tier).to_string()),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Parts(vec![
                        ContentPart::Text {
                            text: USER_TEXT.to_string(),
                        },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl { url: data_uri },
                        },
                    ]),
                },
            ],
            max_completion_tokens: self.config.max_tokens_for(tier),
            response_format: ResponseFormat {
                kind: "json_object",
            },
        }
    }
}

#[async_trait]
impl VisionBackend for OpenAiBackend {
    async fn analyze(&self, image: &ImagePayload, tier: Tier) -> Result<RawModelResponse> {
        let request = self.build_request(image, tier);
        debug!(model = %request.model, tier = %tier, bytes = image.len(), "Sending image to vision backend");

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %truncate(&body, 512), "Vision backend request failed");
            return Err(Error::upstream(format!("vision backend returned {}", status)));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::invalid_response(format!("unreadable completion body: {}", e)))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| Error::invalid_response("no content in completion"))?;

        RawModelResponse::from_content(&content)
    }

    fn model_for(&self, tier: Tier) -> &str {
        self.config.model_for(tier)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

fn map_reqwest_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout
    } else {
        Error::upstream(format!("vision backend unreachable: {}", err))
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_completion_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}
