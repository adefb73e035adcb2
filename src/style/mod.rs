//! Illustration styles
//!
//! The style prompt is appended to every panel request so the four panels
//! of a strip read as one drawing.

use serde::{Deserialize, Serialize};

/// Art style for generated panels
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    /// Bold ink outlines and flat color
    #[default]
    Comic,
    /// Black and white with screentones
    Manga,
    /// Soft watercolor picture book
    Storybook,
}

impl Style {
    /// Prompt fragment describing the look of every panel
    pub fn prompt(&self) -> &'static str {
        match self {
            Style::Comic => "vibrant comic book illustration, bold clean ink outlines, flat cel shading, saturated colors, expressive faces, dynamic composition",
            Style::Manga => "black and white manga panel, crisp linework, screentone shading, speed lines for motion, dramatic camera angles",
            Style::Storybook => "children's picture book illustration, soft watercolor washes, gentle pastel palette, warm lighting, rounded friendly shapes",
        }
    }
}
