//! Anthropic Messages API client for text generation.

use super::{GenerationRequest, HttpClient, ProviderError, TextGenerator};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const PROVIDER: &str = "anthropic";
const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Persona sent as the system prompt on every call.
pub const SYSTEM_PERSONA: &str = "Вы - всемирно известный русскоязычный писатель. Ваша задача - создавать увлекательный, связный и грамматически правильный текст на русском языке с большим мастерством и вниманием к деталям.";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Text generator backed by the Anthropic Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: HttpClient,
    api_key: String,
}

impl AnthropicClient {
    pub fn new(http: HttpClient, api_key: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
        }
    }
}

impl TextGenerator for AnthropicClient {
    #[instrument(
        skip(self, request),
        fields(model = %request.model, max_tokens = request.max_tokens)
    )]
    fn generate_text(&mut self, request: &GenerationRequest) -> Result<String, ProviderError> {
        request.validate(PROVIDER)?;
        let body = build_request(request);
        let response: MessagesResponse = self.http.post_json(
            PROVIDER,
            MESSAGES_URL,
            &[
                ("x-api-key", self.api_key.as_str()),
                ("anthropic-version", ANTHROPIC_VERSION),
            ],
            &body,
        )?;
        let text = first_text(response)?;
        debug!(chars = text.chars().count(), "Received text");
        Ok(text)
    }
}

fn build_request(request: &GenerationRequest) -> MessagesRequest<'_> {
    MessagesRequest {
        model: &request.model,
        max_tokens: request.max_tokens,
        temperature: request.temperature,
        system: SYSTEM_PERSONA,
        messages: [Message {
            role: "user",
            content: &request.prompt,
        }],
    }
}

/// Trimmed text of the first `text` content block.
fn first_text(response: MessagesResponse) -> Result<String, ProviderError> {
    response
        .content
        .into_iter()
        .find(|block| block.kind == "text")
        .and_then(|block| block.text)
        .map(|text| text.trim().to_string())
        .ok_or_else(|| ProviderError::Malformed {
            provider: PROVIDER,
            reason: "response has no text content block".to_string(),
        })
}
