//! Stability text-to-image client for the cover illustration.

use super::{HttpClient, ImageGenerator, ProviderError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const PROVIDER: &str = "stability";
pub const DEFAULT_API_HOST: &str = "https://api.stability.ai";
const ENGINE_ID: &str = "stable-diffusion-xl-beta-v2-2-2";

// Fixed rendering parameters.
const CFG_SCALE: u32 = 7;
const CLIP_GUIDANCE_PRESET: &str = "FAST_BLUE";
const HEIGHT: u32 = 768;
const WIDTH: u32 = 512;
const SAMPLES: u32 = 1;
const STEPS: u32 = 30;

#[derive(Debug, Serialize)]
struct TextToImageRequest<'a> {
    text_prompts: [TextPrompt<'a>; 1],
    cfg_scale: u32,
    clip_guidance_preset: &'a str,
    height: u32,
    width: u32,
    samples: u32,
    steps: u32,
}

#[derive(Debug, Serialize)]
struct TextPrompt<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct TextToImageResponse {
    #[serde(default)]
    artifacts: Vec<Artifact>,
}

#[derive(Debug, Deserialize)]
struct Artifact {
    base64: String,
}

/// Image generator backed by the Stability REST API.
///
/// The key is optional at construction: its absence only fails the cover step.
#[derive(Debug, Clone)]
pub struct StabilityClient {
    http: HttpClient,
    api_key: Option<String>,
    api_host: String,
}

impl StabilityClient {
    pub fn new(http: HttpClient, api_key: Option<String>, api_host: Option<String>) -> Self {
        let api_host = api_host
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_HOST.to_string());
        Self {
            http,
            api_key,
            api_host: api_host.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/generation/{}/text-to-image", self.api_host, ENGINE_ID)
    }
}

impl ImageGenerator for StabilityClient {
    #[instrument(skip(self, prompt))]
    fn generate_image(&mut self, prompt: &str) -> Result<Vec<u8>, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(ProviderError::MissingApiKey {
                provider: PROVIDER,
                var: crate::config::IMAGE_API_KEY_VAR,
            })?;
        let auth = format!("Bearer {}", api_key);
        let response: TextToImageResponse = self.http.post_json(
            PROVIDER,
            &self.endpoint(),
            &[("accept", "application/json"), ("authorization", auth.as_str())],
            &build_request(prompt),
        )?;
        let bytes = first_image(response)?;
        debug!(bytes = bytes.len(), "Received image");
        Ok(bytes)
    }
}

fn build_request(prompt: &str) -> TextToImageRequest<'_> {
    TextToImageRequest {
        text_prompts: [TextPrompt { text: prompt }],
        cfg_scale: CFG_SCALE,
        clip_guidance_preset: CLIP_GUIDANCE_PRESET,
        height: HEIGHT,
        width: WIDTH,
        samples: SAMPLES,
        steps: STEPS,
    }
}

/// Decode the first artifact; any others are dropped.
fn first_image(response: TextToImageResponse) -> Result<Vec<u8>, ProviderError> {
    let artifact = response
        .artifacts
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Malformed {
            provider: PROVIDER,
            reason: "response has no artifacts".to_string(),
        })?;
    STANDARD
        .decode(artifact.base64.as_bytes())
        .map_err(|e| ProviderError::Malformed {
            provider: PROVIDER,
            reason: format!("invalid base64 image: {}", e),
        })
}
