//! Provider capabilities ("generate text", "generate image") and their HTTP implementations.

mod client;
mod error;

pub mod anthropic;
pub mod stability;

pub use anthropic::AnthropicClient;
pub use client::{HttpClient, HttpClientBuilder};
pub use error::ProviderError;
pub use stability::StabilityClient;

/// Parameters for one text-generation call. Built fresh per call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl GenerationRequest {
    /// Reject parameters the provider would refuse anyway, before any network call.
    pub fn validate(&self, provider: &'static str) -> Result<(), ProviderError> {
        if self.max_tokens == 0 {
            return Err(ProviderError::InvalidRequest {
                provider,
                reason: "max_tokens must be greater than 0".to_string(),
            });
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ProviderError::InvalidRequest {
                provider,
                reason: format!("temperature {} is outside [0, 2]", self.temperature),
            });
        }
        if self.model.trim().is_empty() {
            return Err(ProviderError::InvalidRequest {
                provider,
                reason: "model is empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Something that turns a prompt into text. Output is trimmed.
pub trait TextGenerator {
    fn generate_text(&mut self, request: &GenerationRequest) -> Result<String, ProviderError>;
}

/// Something that turns a prompt into image bytes (the first candidate only).
pub trait ImageGenerator {
    fn generate_image(&mut self, prompt: &str) -> Result<Vec<u8>, ProviderError>;
}

impl<T: TextGenerator + ?Sized> TextGenerator for &mut T {
    fn generate_text(&mut self, request: &GenerationRequest) -> Result<String, ProviderError> {
        (**self).generate_text(request)
    }
}

impl<I: ImageGenerator + ?Sized> ImageGenerator for &mut I {
    fn generate_image(&mut self, prompt: &str) -> Result<Vec<u8>, ProviderError> {
        (**self).generate_image(prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(max_tokens: u32, temperature: f32) -> GenerationRequest {
        GenerationRequest {
            prompt: "p".to_string(),
            model: "m".to_string(),
            max_tokens,
            temperature,
        }
    }

    #[test]
    fn validate_accepts_bounds() {
        assert!(request(1, 0.0).validate("test").is_ok());
        assert!(request(4000, 2.0).validate("test").is_ok());
    }

    #[test]
    fn validate_rejects_zero_tokens() {
        assert!(matches!(
            request(0, 0.7).validate("test"),
            Err(ProviderError::InvalidRequest { .. })
        ));
    }

    #[test]
    fn validate_rejects_temperature_out_of_range() {
        assert!(request(10, 2.5).validate("test").is_err());
        assert!(request(10, -0.1).validate("test").is_err());
        assert!(request(10, f32::NAN).validate("test").is_err());
    }

    #[test]
    fn provider_error_reports_provider_name() {
        let e = ProviderError::Status {
            provider: "stability",
            status: 500,
            body: "boom".to_string(),
        };
        assert_eq!(e.provider(), "stability");
        assert_eq!(e.to_string(), "stability: HTTP 500: boom");
    }
}
