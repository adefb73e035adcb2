//! Configuration
//!
//! Layered with figment: built-in defaults, then `storytoon.toml` (or an
//! explicit path), then `STORYTOON_*` environment variables, then
//! `GEMINI_API_KEY`.

use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::images::AspectRatio;
use crate::style::Style;

/// Default config file, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "storytoon.toml";

/// Values that ship in templates and are never real credentials
const PLACEHOLDER_KEYS: &[&str] = &[
    "PLACEHOLDER_API_KEY",
    "YOUR_API_KEY",
    "YOUR_API_KEY_HERE",
    "your-api-key",
    "changeme",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no API key configured; set GEMINI_API_KEY or STORYTOON_API_KEY")]
    MissingApiKey,

    #[error("API key is still the placeholder value '{0}'; set a real GEMINI_API_KEY")]
    PlaceholderApiKey(String),

    #[error("invalid configuration: {0}")]
    Load(#[from] figment::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Gemini API credential
    pub api_key: Option<String>,
    /// Base URL of the generative language API
    pub api_base: String,
    /// Model used to split the story into scenes
    pub text_model: String,
    /// Model used to draw panels
    pub image_model: String,
    pub aspect_ratio: AspectRatio,
    /// Illustration style for every panel
    pub style: Style,
    /// Where panel images are written
    pub output_dir: PathBuf,
    /// Per-request timeout; unset means wait indefinitely
    pub request_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            text_model: "gemini-2.5-flash".to_string(),
            image_model: "gemini-2.5-flash-image-preview".to_string(),
            aspect_ratio: AspectRatio::default(),
            style: Style::default(),
            output_dir: PathBuf::from("."),
            request_timeout_secs: None,
        }
    }
}

impl Config {
    /// Build the layered figment without extracting it
    pub fn figment(path: Option<&Path>) -> Figment {
        let file = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));

        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed("STORYTOON_"))
            .merge(Env::raw().only(&["GEMINI_API_KEY"]).map(|_| "api_key".into()))
    }

    /// Load configuration from all layers
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Ok(Self::figment(path).extract()?)
    }

    /// The credential, rejecting missing and placeholder values
    pub fn api_key(&self) -> Result<&str, ConfigError> {
        let key = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        if PLACEHOLDER_KEYS.iter().any(|p| p.eq_ignore_ascii_case(key)) {
            return Err(ConfigError::PlaceholderApiKey(key.to_string()));
        }

        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            let config: Config = Config::figment(None).extract()?;
            assert_eq!(config.text_model, "gemini-2.5-flash");
            assert_eq!(config.aspect_ratio, AspectRatio::Wide);
            assert_eq!(config.style, Style::Comic);
            assert!(config.request_timeout_secs.is_none());
            assert!(matches!(config.api_key(), Err(ConfigError::MissingApiKey)));
            Ok(())
        });
    }

    #[test]
    fn test_file_then_env_layering() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(
                "storytoon.toml",
                r#"
                    aspect_ratio = "tall"
                    style = "manga"
                    api_key = "from-file"
                "#,
            )?;
            jail.set_env("STORYTOON_STYLE", "storybook");

            let config: Config = Config::figment(None).extract()?;
            assert_eq!(config.aspect_ratio, AspectRatio::Tall);
            assert_eq!(config.style, Style::Storybook);
            assert_eq!(config.api_key().unwrap(), "from-file");
            Ok(())
        });
    }

    #[test]
    fn test_gemini_api_key_env() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("GEMINI_API_KEY", "real-key");

            let config: Config = Config::figment(None).extract()?;
            assert_eq!(config.api_key().unwrap(), "real-key");
            Ok(())
        });
    }

    #[test]
    fn test_explicit_path() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file("custom.toml", "request_timeout_secs = 90")?;

            let config: Config = Config::figment(Some(Path::new("custom.toml"))).extract()?;
            assert_eq!(config.request_timeout_secs, Some(90));
            Ok(())
        });
    }

    #[test]
    fn test_unknown_style_rejected() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file("storytoon.toml", r#"style = "noir""#)?;

            assert!(Config::load(None).is_err());
            Ok(())
        });
    }

    #[test]
    fn test_placeholder_rejected() {
        let config = Config {
            api_key: Some("PLACEHOLDER_API_KEY".to_string()),
            ..Config::default()
        };
        assert!(matches!(
            config.api_key(),
            Err(ConfigError::PlaceholderApiKey(_))
        ));

        let blank = Config {
            api_key: Some("   ".to_string()),
            ..Config::default()
        };
        assert!(matches!(blank.api_key(), Err(ConfigError::MissingApiKey)));
    }
}
