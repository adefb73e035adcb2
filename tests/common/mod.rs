//! Shared test utilities - character fixtures and a scripted backend

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use storytoon::gemini::normalize_scenes;
use storytoon::{CharacterRef, CompositeImage, GeminiError, InlineImage, PanelBackend, PANEL_COUNT};

/// PNG character reference filled with one color
pub fn solid_character(name: &str, width: u32, height: u32, color: [u8; 4]) -> CharacterRef {
    CharacterRef::from_bytes(name, solid_png(width, height, color)).expect("valid PNG")
}

pub fn solid_png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba(color));
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("encode PNG");
    buf
}

/// Passes PNG sniffing but cannot be decoded
pub fn broken_character(name: &str) -> CharacterRef {
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.extend_from_slice(b"garbage");
    CharacterRef::from_bytes(name, bytes).expect("PNG signature")
}

/// One recorded image call
#[derive(Debug, Clone)]
pub struct ImageCall {
    pub scene: String,
    pub width: u32,
    pub height: u32,
}

/// Backend that replays scripted responses and records every call
pub struct ScriptedBackend {
    /// Raw scene list returned by the split; None fails the split
    scenes: Option<Vec<String>>,
    /// 0-based image call that fails with "no image returned"
    fail_on_call: Option<usize>,
    split_calls: AtomicUsize,
    image_calls: Mutex<Vec<ImageCall>>,
}

impl ScriptedBackend {
    pub fn new(scenes: &[&str]) -> Self {
        Self {
            scenes: Some(scenes.iter().map(|s| s.to_string()).collect()),
            fail_on_call: None,
            split_calls: AtomicUsize::new(0),
            image_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_split() -> Self {
        Self {
            scenes: None,
            ..Self::new(&[])
        }
    }

    pub fn fail_on_call(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    pub fn split_calls(&self) -> usize {
        self.split_calls.load(Ordering::SeqCst)
    }

    pub fn image_calls(&self) -> Vec<ImageCall> {
        self.image_calls.lock().unwrap().clone()
    }
}

impl PanelBackend for ScriptedBackend {
    async fn split_story(&self, _story: &str) -> Result<[String; PANEL_COUNT], GeminiError> {
        self.split_calls.fetch_add(1, Ordering::SeqCst);
        match &self.scenes {
            Some(scenes) => normalize_scenes(scenes.clone()),
            None => Err(GeminiError::MalformedResponse("scripted failure".to_string())),
        }
    }

    async fn generate_panel_image(
        &self,
        composite: &CompositeImage,
        scene: &str,
    ) -> Result<InlineImage, GeminiError> {
        let call = {
            let mut calls = self.image_calls.lock().unwrap();
            calls.push(ImageCall {
                scene: scene.to_string(),
                width: composite.width,
                height: composite.height,
            });
            calls.len() - 1
        };

        if self.fail_on_call == Some(call) {
            return Err(GeminiError::NoImage);
        }

        Ok(InlineImage {
            mime_type: "image/png".to_string(),
            data: solid_png(4, 4, [call as u8, 0, 0, 255]),
        })
    }
}
