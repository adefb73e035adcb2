//! Character compositing
//!
//! Lays 1-2 character references side by side on a white canvas sized by
//! the aspect-ratio preset. Each character gets an equal-width vertical
//! section and is scaled to fit 80% of the section width and 80% of the
//! canvas height.

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::CharacterRef;
use crate::storyboard::MAX_CHARACTERS;

/// Fraction of the section (and canvas height) a character may fill
const FILL_RATIO: f64 = 0.8;

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Canvas preset for the composite
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum AspectRatio {
    /// 1920x1080
    #[default]
    Wide,
    /// 1080x1920
    Tall,
}

impl AspectRatio {
    /// Canvas size in pixels (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            AspectRatio::Wide => (1920, 1080),
            AspectRatio::Tall => (1080, 1920),
        }
    }
}

/// Compositing errors
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("no character references to composite")]
    NoCharacters,

    #[error("at most 2 character references can be composited, got {0}")]
    TooManyCharacters(usize),

    #[error("failed to decode character reference {index} ({name}): {source}")]
    Decode {
        index: usize,
        name: String,
        #[source]
        source: image::ImageError,
    },

    #[error("could not acquire a {width}x{height} drawing surface")]
    Surface { width: u32, height: u32 },

    #[error("failed to encode composite: {0}")]
    Encode(#[source] image::ImageError),
}

/// The composite canvas, ready to send to the image model
#[derive(Debug, Clone)]
pub struct CompositeImage {
    /// Base64-encoded PNG
    pub data_base64: String,
    pub mime_type: &'static str,
    pub width: u32,
    pub height: u32,
}

/// Composite 1-2 character references onto a blank canvas
pub fn compose_characters(
    characters: &[CharacterRef],
    aspect_ratio: AspectRatio,
) -> Result<CompositeImage, ComposeError> {
    if characters.is_empty() {
        return Err(ComposeError::NoCharacters);
    }
    if characters.len() > MAX_CHARACTERS {
        return Err(ComposeError::TooManyCharacters(characters.len()));
    }

    let (width, height) = aspect_ratio.dimensions();
    let mut canvas = acquire_surface(width, height)?;

    let section_width = width as f64 / characters.len() as f64;
    let max_w = section_width * FILL_RATIO;
    let max_h = height as f64 * FILL_RATIO;

    for (index, character) in characters.iter().enumerate() {
        let source = image::load_from_memory(character.data()).map_err(|source| {
            ComposeError::Decode {
                index,
                name: character.name().to_string(),
                source,
            }
        })?;

        let (src_w, src_h) = (source.width() as f64, source.height() as f64);
        let scale = (max_w / src_w).min(max_h / src_h);
        let draw_w = ((src_w * scale).round() as u32).max(1);
        let draw_h = ((src_h * scale).round() as u32).max(1);

        let scaled = imageops::resize(&source.to_rgba8(), draw_w, draw_h, FilterType::Triangle);

        let x = section_width * index as f64 + (section_width - draw_w as f64) / 2.0;
        let y = (height as f64 - draw_h as f64) / 2.0;
        imageops::overlay(&mut canvas, &scaled, x.round() as i64, y.round() as i64);

        debug!(
            "Placed '{}' at ({:.0}, {:.0}) size {}x{}",
            character.name(),
            x,
            y,
            draw_w,
            draw_h
        );
    }

    let mut png = Vec::new();
    DynamicImage::ImageRgba8(canvas)
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(ComposeError::Encode)?;

    Ok(CompositeImage {
        data_base64: BASE64.encode(&png),
        mime_type: "image/png",
        width,
        height,
    })
}

/// Allocate the canvas, pre-filled with the background color
fn acquire_surface(width: u32, height: u32) -> Result<RgbaImage, ComposeError> {
    let len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|px| px.checked_mul(4))
        .ok_or(ComposeError::Surface { width, height })?;

    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| ComposeError::Surface { width, height })?;
    buf.resize(len, 0);

    let mut canvas =
        RgbaImage::from_raw(width, height, buf).ok_or(ComposeError::Surface { width, height })?;
    for px in canvas.pixels_mut() {
        *px = BACKGROUND;
    }
    Ok(canvas)
}
