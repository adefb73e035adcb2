//! Gemini integration
//!
//! Provides:
//! - Story splitting into four scene descriptions (text model, JSON output)
//! - Panel drawing from a composite character image (image-editing model)

mod wire;

use std::sync::LazyLock;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use regex::Regex;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{Config, ConfigError};
use crate::images::{CompositeImage, InlineImage};
use crate::storyboard::{PanelBackend, PANEL_COUNT, PLACEHOLDER_SCENE};
use crate::style::Style;
use wire::{
    ApiErrorBody, Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Part,
};

/// Markdown code fence around a model reply
static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^\s*```[A-Za-z]*\s*(.*?)\s*```\s*$").unwrap());

/// Errors from the generation API
#[derive(Debug, Error)]
pub enum GeminiError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("malformed AI response: {0}")]
    MalformedResponse(String),

    #[error("no image returned")]
    NoImage,

    #[error("image payload is not valid base64: {0}")]
    InvalidImageData(#[from] base64::DecodeError),
}

/// Gemini API client
#[derive(Debug)]
pub struct GeminiClient {
    /// HTTP client
    client: Client,
    /// API key
    api_key: String,
    /// API base URL
    base_url: String,
    text_model: String,
    image_model: String,
    /// Illustration style appended to every panel prompt
    style: Style,
}

impl GeminiClient {
    /// Create a client from configuration
    ///
    /// Fails if the credential is missing or still a placeholder, or if the
    /// HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self, GeminiError> {
        let api_key = config.api_key()?.to_string();

        let mut builder = Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            api_key,
            base_url: config.api_base.trim_end_matches('/').to_string(),
            text_model: config.text_model.clone(),
            image_model: config.image_model.clone(),
            style: config.style,
        })
    }

    /// Illustration style used for panels
    pub fn style(&self) -> Style {
        self.style
    }

    fn endpoint(&self, model: &str) -> String {
        let model = model.trim();
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GeminiError> {
        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Gemini API error: {} - {}", status, body);
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or_else(|_| status.canonical_reason().unwrap_or("unknown").to_string());
            return Err(GeminiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| GeminiError::MalformedResponse(format!("invalid response body: {}", e)))
    }

    /// Split a story into exactly four scene descriptions
    pub async fn split_story(&self, story: &str) -> Result<[String; PANEL_COUNT], GeminiError> {
        let prompt = format!(
            r#"You are a comic book writer. Break the following story into exactly {PANEL_COUNT} sequential comic panels in chronological order.

For each panel write one or two sentences describing the scene: the setting, what the characters are doing, and the mood. Describe it visually, as instructions for an illustrator.

Story:
{story}

Respond with a JSON array of {PANEL_COUNT} strings and nothing else."#
        );

        let request = GenerateContentRequest {
            contents: vec![Content::user(vec![Part::text(prompt)])],
            generation_config: Some(GenerationConfig::json_string_array()),
        };

        debug!("Requesting story split from {}", self.text_model);
        let response = self.generate_content(&self.text_model, &request).await?;

        let text = response.text();
        if text.trim().is_empty() {
            return Err(GeminiError::MalformedResponse(
                "response contained no text".to_string(),
            ));
        }

        let scenes = normalize_scenes(parse_scene_list(&text)?)?;
        info!("Story split into {} scenes", PANEL_COUNT);
        Ok(scenes)
    }

    /// Redraw a scene around the characters in the composite image
    pub async fn generate_panel_image(
        &self,
        composite: &CompositeImage,
        scene: &str,
    ) -> Result<InlineImage, GeminiError> {
        let prompt = format!(
            r#"Use the character(s) in the provided image as the cast of this comic panel. Keep each character's appearance, clothing and colors exactly as shown, and redraw them in the scene below. Replace the white background entirely with the scene.

Scene: {scene}

Art style: {style}. Keep the style consistent with the other panels of the strip. Do not add captions, speech bubbles or any text."#,
            style = self.style.prompt()
        );

        let request = GenerateContentRequest {
            contents: vec![Content::user(vec![
                Part::inline(composite.mime_type, composite.data_base64.clone()),
                Part::text(prompt),
            ])],
            generation_config: Some(GenerationConfig::image_and_text()),
        };

        debug!(
            "Requesting panel image from {} ({}x{} composite)",
            self.image_model, composite.width, composite.height
        );
        let response = self.generate_content(&self.image_model, &request).await?;

        for note in response.text_parts() {
            debug!("Model commentary: {}", note);
        }

        let image = first_inline_image(&response)?.ok_or(GeminiError::NoImage)?;
        info!(
            "Received panel image ({}, {} bytes)",
            image.mime_type,
            image.data.len()
        );
        Ok(image)
    }
}

impl PanelBackend for GeminiClient {
    async fn split_story(&self, story: &str) -> Result<[String; PANEL_COUNT], GeminiError> {
        GeminiClient::split_story(self, story).await
    }

    async fn generate_panel_image(
        &self,
        composite: &CompositeImage,
        scene: &str,
    ) -> Result<InlineImage, GeminiError> {
        GeminiClient::generate_panel_image(self, composite, scene).await
    }
}

/// Parse the model's text as a JSON array of strings
///
/// Tolerates a surrounding Markdown code fence.
pub fn parse_scene_list(text: &str) -> Result<Vec<String>, GeminiError> {
    let body = CODE_FENCE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(text);

    serde_json::from_str::<Vec<String>>(body.trim())
        .map_err(|e| GeminiError::MalformedResponse(format!("expected a JSON list of strings: {}", e)))
}

/// Force a scene list to exactly four entries
///
/// Short lists are padded with a placeholder, long ones truncated. Blank
/// entries are replaced by the placeholder.
pub fn normalize_scenes(scenes: Vec<String>) -> Result<[String; PANEL_COUNT], GeminiError> {
    if scenes.is_empty() {
        return Err(GeminiError::MalformedResponse(
            "scene list is empty".to_string(),
        ));
    }
    if scenes.len() != PANEL_COUNT {
        warn!(
            "Story split returned {} scenes, expected {}",
            scenes.len(),
            PANEL_COUNT
        );
    }

    let mut iter = scenes
        .into_iter()
        .map(|s| s.trim().to_string())
        .map(|s| if s.is_empty() { PLACEHOLDER_SCENE.to_string() } else { s });
    Ok(std::array::from_fn(|_| {
        iter.next().unwrap_or_else(|| PLACEHOLDER_SCENE.to_string())
    }))
}

/// First inline image across all candidates, in order
fn first_inline_image(
    response: &GenerateContentResponse,
) -> Result<Option<InlineImage>, GeminiError> {
    let Some(blob) = response.inline_blobs().next() else {
        return Ok(None);
    };

    let data = BASE64.decode(blob.data.as_bytes())?;
    Ok(Some(InlineImage {
        mime_type: blob.mime_type.clone(),
        data,
    }))
}
