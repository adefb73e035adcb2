//! A single comic panel

use crate::images::{CharacterRef, InlineImage};

use super::MAX_CHARACTERS;

/// Whether a panel has work in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanelStatus {
    #[default]
    Idle,
    Generating,
}

/// One of the four cells of the strip
#[derive(Debug, Clone, Default)]
pub struct Panel {
    narrative: String,
    characters: Vec<CharacterRef>,
    image: Option<InlineImage>,
    status: PanelStatus,
}

impl Panel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scene description for this panel
    pub fn narrative(&self) -> &str {
        &self.narrative
    }

    pub fn characters(&self) -> &[CharacterRef] {
        &self.characters
    }

    pub fn image(&self) -> Option<&InlineImage> {
        self.image.as_ref()
    }

    pub fn status(&self) -> PanelStatus {
        self.status
    }

    pub fn is_generating(&self) -> bool {
        self.status == PanelStatus::Generating
    }

    /// A panel can be regenerated once it has a scene and nothing is in flight
    pub fn can_regenerate(&self) -> bool {
        !self.narrative.trim().is_empty() && !self.is_generating()
    }

    pub(super) fn set_narrative(&mut self, narrative: impl Into<String>) {
        self.narrative = narrative.into();
    }

    /// Take a scene from a new story split, dropping the old story's image
    pub(super) fn assign_scene(&mut self, narrative: String) {
        self.narrative = narrative;
        self.image = None;
    }

    /// Returns false if the panel is already full
    pub(super) fn push_character(&mut self, character: CharacterRef) -> bool {
        if self.characters.len() >= MAX_CHARACTERS {
            return false;
        }
        self.characters.push(character);
        true
    }

    pub(super) fn remove_character(&mut self, index: usize) -> Option<CharacterRef> {
        (index < self.characters.len()).then(|| self.characters.remove(index))
    }

    /// Enter Generating and drop any previous image
    pub(super) fn begin(&mut self) {
        self.status = PanelStatus::Generating;
        self.image = None;
    }

    pub(super) fn finish(&mut self, image: Option<InlineImage>) {
        self.status = PanelStatus::Idle;
        self.image = image;
    }
}
