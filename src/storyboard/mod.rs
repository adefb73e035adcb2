//! Storyboard - the four-panel state machine
//!
//! Owns the panels and drives generation:
//! - `generate_story` splits a story into scenes, then draws panels 1-4 one
//!   at a time, stopping at the first failure
//! - `regenerate_panel` redraws a single panel from its current scene
//!
//! Panels move Idle -> Generating -> Idle. The previous image is dropped
//! when an attempt starts and only replaced on success.

mod panel;

use std::future::Future;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::gemini::GeminiError;
use crate::images::{
    compose_characters, save_panel_image, AspectRatio, CharacterRef, ComposeError,
    CompositeImage, ExportError, InlineImage,
};

pub use panel::{Panel, PanelStatus};

/// Number of panels in a strip
pub const PANEL_COUNT: usize = 4;

/// Character references allowed per panel
pub const MAX_CHARACTERS: usize = 2;

/// Scene text used when the story split comes back short
pub const PLACEHOLDER_SCENE: &str = "...";

/// The two generation calls the storyboard depends on
pub trait PanelBackend {
    /// Split a story into exactly four scene descriptions
    fn split_story(
        &self,
        story: &str,
    ) -> impl Future<Output = Result<[String; PANEL_COUNT], GeminiError>> + Send;

    /// Draw one panel from a composite image and scene description
    fn generate_panel_image(
        &self,
        composite: &CompositeImage,
        scene: &str,
    ) -> impl Future<Output = Result<InlineImage, GeminiError>> + Send;
}

/// Progress notifications (panel indices are 0-based)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelEvent {
    SceneAssigned { panel: usize, scene: String },
    Started { panel: usize },
    Finished { panel: usize },
    /// `panel` is None when the failure is not tied to one panel
    Failed {
        panel: Option<usize>,
        message: String,
    },
}

/// Storyboard errors
#[derive(Debug, Error)]
pub enum StoryboardError {
    #[error("please enter a story first")]
    EmptyStory,

    #[error("panel {} has no scene description", number(.0))]
    EmptyNarrative(usize),

    #[error("panel {} needs at least one character reference", number(.0))]
    NoCharacters(usize),

    #[error("panel {} already has 2 character references", number(.0))]
    TooManyCharacters(usize),

    #[error("there is no panel {} (panels are 1-4)", number(.0))]
    InvalidPanel(usize),

    #[error("panel {} has no character {}", number(.panel), number(.character))]
    InvalidCharacter { panel: usize, character: usize },

    #[error("failed to split story: {0}")]
    Split(#[source] GeminiError),

    #[error("panel {}: {}", number(.panel), .source)]
    Compose {
        panel: usize,
        #[source]
        source: ComposeError,
    },

    #[error("panel {}: {}", number(.panel), .source)]
    Generate {
        panel: usize,
        #[source]
        source: GeminiError,
    },

    #[error(transparent)]
    Export(#[from] ExportError),
}

/// 1-based panel or character number for messages
fn number(index: &usize) -> usize {
    index.saturating_add(1)
}

/// The four panels plus the shared error slot
#[derive(Debug, Default)]
pub struct Storyboard {
    panels: [Panel; PANEL_COUNT],
    aspect_ratio: AspectRatio,
    last_error: Option<String>,
    events: Option<mpsc::Sender<PanelEvent>>,
}

impl Storyboard {
    /// Create a storyboard with four empty panels
    pub fn new(aspect_ratio: AspectRatio) -> Self {
        Self {
            aspect_ratio,
            ..Self::default()
        }
    }

    /// Send progress events to `tx`
    ///
    /// The receiver must be drained; a full channel stalls the pipeline.
    pub fn with_events(mut self, tx: mpsc::Sender<PanelEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn panels(&self) -> &[Panel; PANEL_COUNT] {
        &self.panels
    }

    pub fn panel(&self, index: usize) -> Option<&Panel> {
        self.panels.get(index)
    }

    pub fn aspect_ratio(&self) -> AspectRatio {
        self.aspect_ratio
    }

    pub fn set_aspect_ratio(&mut self, aspect_ratio: AspectRatio) {
        self.aspect_ratio = aspect_ratio;
    }

    /// Message of the most recent failure, if any
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    fn panel_mut(&mut self, index: usize) -> Result<&mut Panel, StoryboardError> {
        self.panels
            .get_mut(index)
            .ok_or(StoryboardError::InvalidPanel(index))
    }

    /// Replace a panel's scene description
    pub fn set_narrative(
        &mut self,
        index: usize,
        narrative: impl Into<String>,
    ) -> Result<(), StoryboardError> {
        self.panel_mut(index)?.set_narrative(narrative);
        Ok(())
    }

    /// Attach a character reference; a third one is rejected
    pub fn add_character(
        &mut self,
        index: usize,
        character: CharacterRef,
    ) -> Result<(), StoryboardError> {
        let panel = self.panel_mut(index)?;
        if !panel.push_character(character) {
            return Err(StoryboardError::TooManyCharacters(index));
        }
        Ok(())
    }

    /// Detach the character at `character` from a panel
    pub fn remove_character(
        &mut self,
        index: usize,
        character: usize,
    ) -> Result<CharacterRef, StoryboardError> {
        self.panel_mut(index)?
            .remove_character(character)
            .ok_or(StoryboardError::InvalidCharacter {
                panel: index,
                character,
            })
    }

    /// Whether the regenerate action is available for a panel
    pub fn can_regenerate(&self, index: usize) -> bool {
        self.panel(index).is_some_and(Panel::can_regenerate)
    }

    /// Split `story` into scenes and draw all four panels in order
    ///
    /// Every panel needs a character before the split is requested. Images
    /// from a previous story are dropped once the new scenes are assigned.
    /// Stops at the first failure; later panels are not attempted.
    pub async fn generate_story<B: PanelBackend>(
        &mut self,
        backend: &B,
        story: &str,
    ) -> Result<(), StoryboardError> {
        self.last_error = None;

        let story = story.trim();
        if story.is_empty() {
            return Err(self.fail(None, StoryboardError::EmptyStory).await);
        }

        if let Some(index) = self.panels.iter().position(|p| p.characters().is_empty()) {
            return Err(self
                .fail(Some(index), StoryboardError::NoCharacters(index))
                .await);
        }

        info!("Splitting story ({} chars) into {} scenes", story.len(), PANEL_COUNT);
        let scenes = match backend.split_story(story).await {
            Ok(scenes) => scenes,
            Err(e) => return Err(self.fail(None, StoryboardError::Split(e)).await),
        };

        for (index, scene) in scenes.into_iter().enumerate() {
            debug!("Panel {} scene: {}", index + 1, scene);
            self.panels[index].assign_scene(scene.clone());
            self.emit(PanelEvent::SceneAssigned {
                panel: index,
                scene,
            })
            .await;
        }

        for index in 0..PANEL_COUNT {
            self.run_panel(backend, index).await?;
        }

        info!("All {} panels generated", PANEL_COUNT);
        Ok(())
    }

    /// Redraw one panel from its current scene description
    pub async fn regenerate_panel<B: PanelBackend>(
        &mut self,
        backend: &B,
        index: usize,
    ) -> Result<(), StoryboardError> {
        self.last_error = None;
        self.run_panel(backend, index).await
    }

    async fn run_panel<B: PanelBackend>(
        &mut self,
        backend: &B,
        index: usize,
    ) -> Result<(), StoryboardError> {
        let Some(panel) = self.panels.get(index) else {
            return Err(self.fail(None, StoryboardError::InvalidPanel(index)).await);
        };
        if panel.narrative().trim().is_empty() {
            return Err(self
                .fail(Some(index), StoryboardError::EmptyNarrative(index))
                .await);
        }
        if panel.characters().is_empty() {
            return Err(self
                .fail(Some(index), StoryboardError::NoCharacters(index))
                .await);
        }

        info!("Generating panel {}", index + 1);
        self.panels[index].begin();
        self.emit(PanelEvent::Started { panel: index }).await;

        match self.draw_panel(backend, index).await {
            Ok(image) => {
                self.panels[index].finish(Some(image));
                self.emit(PanelEvent::Finished { panel: index }).await;
                info!("Panel {} done", index + 1);
                Ok(())
            }
            Err(e) => {
                self.panels[index].finish(None);
                Err(self.fail(Some(index), e).await)
            }
        }
    }

    async fn draw_panel<B: PanelBackend>(
        &self,
        backend: &B,
        index: usize,
    ) -> Result<InlineImage, StoryboardError> {
        let panel = &self.panels[index];

        let composite = compose_characters(panel.characters(), self.aspect_ratio)
            .map_err(|source| StoryboardError::Compose {
                panel: index,
                source,
            })?;

        backend
            .generate_panel_image(&composite, panel.narrative())
            .await
            .map_err(|source| StoryboardError::Generate {
                panel: index,
                source,
            })
    }

    /// Write every generated panel into `dir`
    pub async fn export_images(&self, dir: &Path) -> Result<Vec<PathBuf>, StoryboardError> {
        let mut written = Vec::new();
        for (index, panel) in self.panels.iter().enumerate() {
            if let Some(image) = panel.image() {
                written.push(save_panel_image(image, dir, index).await?);
            }
        }
        Ok(written)
    }

    /// Record a failure in the error slot and notify listeners
    async fn fail(&mut self, panel: Option<usize>, err: StoryboardError) -> StoryboardError {
        let message = err.to_string();
        error!("{}", message);
        self.last_error = Some(message.clone());
        self.emit(PanelEvent::Failed { panel, message }).await;
        err
    }

    async fn emit(&self, event: PanelEvent) {
        if let Some(tx) = &self.events {
            if tx.send(event).await.is_err() {
                debug!("Event receiver dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn character(name: &str) -> CharacterRef {
        CharacterRef::from_bytes(name, b"\x89PNG\r\n\x1a\n".to_vec()).unwrap()
    }

    #[test]
    fn test_new_storyboard_has_four_idle_panels() {
        let board = Storyboard::new(AspectRatio::Tall);
        assert_eq!(board.panels().len(), PANEL_COUNT);
        assert!(board
            .panels()
            .iter()
            .all(|p| p.status() == PanelStatus::Idle && p.image().is_none()));
        assert_eq!(board.aspect_ratio(), AspectRatio::Tall);
        assert!(board.last_error().is_none());
    }

    #[test]
    fn test_third_character_rejected() {
        let mut board = Storyboard::default();
        board.add_character(0, character("a")).unwrap();
        board.add_character(0, character("b")).unwrap();

        let err = board.add_character(0, character("c")).unwrap_err();
        assert!(matches!(err, StoryboardError::TooManyCharacters(0)));
        assert_eq!(err.to_string(), "panel 1 already has 2 character references");
        assert_eq!(board.panels()[0].characters().len(), 2);
    }

    #[test]
    fn test_remove_character() {
        let mut board = Storyboard::default();
        board.add_character(2, character("a")).unwrap();
        board.add_character(2, character("b")).unwrap();

        let removed = board.remove_character(2, 1).unwrap();
        assert_eq!(removed.name(), "b");
        assert_eq!(board.panels()[2].characters().len(), 1);
        assert_eq!(board.panels()[2].characters()[0].name(), "a");

        assert!(matches!(
            board.remove_character(2, 3),
            Err(StoryboardError::InvalidCharacter {
                panel: 2,
                character: 3
            })
        ));
    }

    #[test]
    fn test_invalid_panel_index() {
        let mut board = Storyboard::default();
        assert!(matches!(
            board.set_narrative(4, "x"),
            Err(StoryboardError::InvalidPanel(4))
        ));
        assert!(board.add_character(7, character("a")).is_err());
        assert!(!board.can_regenerate(9));
    }

    #[test]
    fn test_huge_indices_format_without_overflow() {
        let mut board = Storyboard::default();

        let err = board.set_narrative(usize::MAX, "x").unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("there is no panel {} (panels are 1-4)", usize::MAX)
        );

        board.add_character(0, character("a")).unwrap();
        let err = board.remove_character(0, usize::MAX).unwrap_err();
        assert_eq!(err.to_string(), format!("panel 1 has no character {}", usize::MAX));
    }

    #[test]
    fn test_aspect_ratio_and_error_slot() {
        let mut board = Storyboard::new(AspectRatio::Wide);
        board.set_aspect_ratio(AspectRatio::Tall);
        assert_eq!(board.aspect_ratio(), AspectRatio::Tall);

        board.last_error = Some("panel 2: no image returned".to_string());
        assert_eq!(board.last_error(), Some("panel 2: no image returned"));
        board.clear_error();
        assert!(board.last_error().is_none());
    }

    #[test]
    fn test_can_regenerate_follows_narrative() {
        let mut board = Storyboard::default();
        assert!(!board.can_regenerate(1));
        board.set_narrative(1, "  ").unwrap();
        assert!(!board.can_regenerate(1));
        board.set_narrative(1, "The cake drifts out the window").unwrap();
        assert!(board.can_regenerate(1));
    }
}
