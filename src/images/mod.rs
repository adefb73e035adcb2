//! Image handling for panels
//!
//! Provides:
//! - Character reference loading (PNG/JPEG file selection)
//! - Compositing of 1-2 references onto a single canvas
//! - Exporting generated panels to disk

mod compose;
mod export;
mod reference;

pub use compose::{compose_characters, AspectRatio, ComposeError, CompositeImage};
pub use export::{panel_filename, save_panel_image, ExportError};
pub use reference::{CharacterRef, ReferenceError};

/// Image bytes returned by the generation model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}
