//! storytoon - four-panel comic generator
//!
//! Splits a short story into four scenes with a generative text model and
//! draws each scene as a comic panel around user-supplied character
//! references with a generative image model.

pub mod config;
pub mod gemini;
pub mod images;
pub mod storyboard;
pub mod style;

pub use config::{Config, ConfigError};
pub use gemini::{GeminiClient, GeminiError};
pub use images::{AspectRatio, CharacterRef, CompositeImage, InlineImage};
pub use storyboard::{
    Panel, PanelBackend, PanelEvent, PanelStatus, Storyboard, StoryboardError, MAX_CHARACTERS,
    PANEL_COUNT,
};
