//! Configuration: optional TOML file plus API keys from the environment.
//!
//! File search order: ./novelgen.toml, then $XDG_CONFIG_HOME/novelgen/config.toml
//! (or ~/.config/novelgen/config.toml). Secrets never live in the file; they come from the
//! process environment, after `.env` has been loaded.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

pub const TEXT_API_KEY_VAR: &str = "ANTHROPIC_API_KEY";
pub const IMAGE_API_KEY_VAR: &str = "STABILITY_API_KEY";
pub const IMAGE_API_HOST_VAR: &str = "API_HOST";

/// Configuration errors. All fatal before the dependent step makes a network call.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing API key: set {var} in the environment or in .env.")]
    MissingApiKey { var: &'static str },

    #[error("Cannot determine current directory: {0}")]
    CurrentDir(#[source] std::io::Error),

    #[error("Cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Config file contents. All fields optional; only present keys override defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct Config {
    /// Directory for the .txt, .epub and cover.png outputs. Relative to CWD.
    pub output_dir: Option<PathBuf>,
    /// Text model identifier.
    pub model: Option<String>,
    /// Sampling temperature for text calls, in [0, 2].
    pub temperature: Option<f32>,
    /// Token budget for outline, title and other short calls.
    pub outline_max_tokens: Option<u32>,
    /// Token budget for chapter calls.
    pub chapter_max_tokens: Option<u32>,
    /// Delay in seconds after each chapter. 0 disables pacing.
    pub chapter_delay_secs: Option<u64>,
    /// HTTP request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// HTTP User-Agent header.
    pub user_agent: Option<String>,
    /// Author written into the EPUB metadata.
    pub author: Option<String>,
    /// Image API host; the API_HOST environment variable takes precedence.
    pub image_api_host: Option<String>,
}

/// Parse a config file at `path`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let s = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    toml::from_str(&s).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Search the default locations. Missing file returns Ok(None).
pub fn load_config() -> Result<Option<Config>, ConfigError> {
    let cwd = std::env::current_dir().map_err(ConfigError::CurrentDir)?;
    let mut paths = vec![cwd.join("novelgen.toml")];
    if let Some(d) = dirs::config_dir() {
        paths.push(d.join("novelgen").join("config.toml"));
    }
    for path in &paths {
        if path.exists() {
            return load_config_from(path).map(Some);
        }
    }
    Ok(None)
}

/// Secrets and endpoints read once at startup and passed to the provider constructors.
#[derive(Clone, Default)]
pub struct Settings {
    pub text_api_key: Option<String>,
    pub image_api_key: Option<String>,
    pub image_api_host: Option<String>,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("text_api_key", &self.text_api_key.as_ref().map(|_| "<redacted>"))
            .field("image_api_key", &self.image_api_key.as_ref().map(|_| "<redacted>"))
            .field("image_api_host", &self.image_api_host)
            .finish()
    }
}

impl Settings {
    /// Load `.env` (if any) and read the keys from the process environment.
    pub fn from_env() -> Self {
        if let Some(problem) = dotenv_problem(&dotenvy::dotenv()) {
            warn!("Ignoring .env: {}", problem);
        }
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        Self {
            text_api_key: get(TEXT_API_KEY_VAR),
            image_api_key: get(IMAGE_API_KEY_VAR),
            image_api_host: get(IMAGE_API_HOST_VAR),
        }
    }

    /// The text key is needed for every step, so its absence stops the run up front.
    pub fn require_text_api_key(&self) -> Result<&str, ConfigError> {
        self.text_api_key
            .as_deref()
            .ok_or(ConfigError::MissingApiKey {
                var: TEXT_API_KEY_VAR,
            })
    }
}

/// A missing `.env` is normal; a malformed or unreadable one is reported.
fn dotenv_problem(result: &Result<PathBuf, dotenvy::Error>) -> Option<String> {
    match result {
        Ok(_) => None,
        Err(dotenvy::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => Some(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn parse_empty_config() {
        let c: Config = toml::from_str("").unwrap();
        assert!(c.output_dir.is_none());
        assert!(c.model.is_none());
        assert!(c.temperature.is_none());
        assert!(c.chapter_delay_secs.is_none());
        assert!(c.author.is_none());
    }

    #[test]
    fn parse_full_config() {
        let s = r#"
            output_dir = "out"
            model = "claude-3-opus-20240229"
            temperature = 0.9
            outline_max_tokens = 1500
            chapter_max_tokens = 3000
            chapter_delay_secs = 10
            timeout_secs = 120
            user_agent = "Custom/1.0"
            author = "Анонимный автор"
            image_api_host = "http://localhost:9000"
        "#;
        let c: Config = toml::from_str(s).unwrap();
        assert_eq!(c.output_dir.as_deref(), Some(Path::new("out")));
        assert_eq!(c.model.as_deref(), Some("claude-3-opus-20240229"));
        assert_eq!(c.temperature, Some(0.9));
        assert_eq!(c.outline_max_tokens, Some(1500));
        assert_eq!(c.chapter_max_tokens, Some(3000));
        assert_eq!(c.chapter_delay_secs, Some(10));
        assert_eq!(c.timeout_secs, Some(120));
        assert_eq!(c.user_agent.as_deref(), Some("Custom/1.0"));
        assert_eq!(c.author.as_deref(), Some("Анонимный автор"));
        assert_eq!(c.image_api_host.as_deref(), Some("http://localhost:9000"));
    }

    #[test]
    fn invalid_toml_errors() {
        assert!(toml::from_str::<Config>("output_dir = [").is_err());
    }

    #[test]
    fn load_config_from_reports_parse_error_with_path() {
        let path = std::env::temp_dir().join("novelgen_config_invalid.toml");
        std::fs::write(&path, "chapter_delay_secs = \"soon\"").unwrap();
        let result = load_config_from(&path);
        std::fs::remove_file(&path).ok();
        match result {
            Err(ConfigError::Parse { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected Parse error, got {:?}", other),
        }
    }

    #[test]
    fn settings_from_lookup_treats_empty_as_unset() {
        let env: HashMap<&str, &str> = [
            (TEXT_API_KEY_VAR, "sk-text"),
            (IMAGE_API_KEY_VAR, "  "),
        ]
        .into_iter()
        .collect();
        let settings = Settings::from_lookup(|v| env.get(v).map(|s| s.to_string()));
        assert_eq!(settings.require_text_api_key().unwrap(), "sk-text");
        assert!(settings.image_api_key.is_none());
        assert!(settings.image_api_host.is_none());
    }

    #[test]
    fn missing_text_key_is_a_config_error() {
        let settings = Settings::from_lookup(|_| None);
        assert!(matches!(
            settings.require_text_api_key(),
            Err(ConfigError::MissingApiKey {
                var: TEXT_API_KEY_VAR
            })
        ));
    }

    #[test]
    fn settings_debug_redacts_keys() {
        let settings = Settings {
            text_api_key: Some("sk-secret".to_string()),
            image_api_key: None,
            image_api_host: None,
        };
        let s = format!("{:?}", settings);
        assert!(!s.contains("sk-secret"));
        assert!(s.contains("<redacted>"));
    }

    #[test]
    fn missing_dotenv_is_silent_but_bad_dotenv_is_reported() {
        let not_found = std::io::Error::from(std::io::ErrorKind::NotFound);
        assert_eq!(dotenv_problem(&Err(dotenvy::Error::Io(not_found))), None);
        assert_eq!(dotenv_problem(&Ok(PathBuf::from(".env"))), None);

        let parse = dotenvy::Error::LineParse("ANTHROPIC_API_KEY sk-123".to_string(), 17);
        assert!(dotenv_problem(&Err(parse)).is_some());
        let denied = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert!(dotenv_problem(&Err(dotenvy::Error::Io(denied))).is_some());
    }
}
