//! Character reference images
//!
//! Only PNG and JPEG are accepted. The format is sniffed from the content,
//! not the file extension.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::ImageFormat;
use thiserror::Error;
use tracing::debug;

/// Errors loading a character reference
#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}: only PNG and JPEG images are supported")]
    UnsupportedFormat(String),
}

/// A user-supplied character image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterRef {
    name: String,
    data: Vec<u8>,
    mime_type: &'static str,
}

impl CharacterRef {
    /// Build a reference from raw bytes, rejecting anything but PNG/JPEG
    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>) -> Result<Self, ReferenceError> {
        let name = name.into();
        let mime_type = match image::guess_format(&data) {
            Ok(ImageFormat::Png) => "image/png",
            Ok(ImageFormat::Jpeg) => "image/jpeg",
            _ => return Err(ReferenceError::UnsupportedFormat(name)),
        };

        Ok(Self {
            name,
            data,
            mime_type,
        })
    }

    /// Load a reference from a file on disk
    pub async fn load(path: &Path) -> Result<Self, ReferenceError> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|source| ReferenceError::Io {
                path: path.display().to_string(),
                source,
            })?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        debug!("Loaded character reference {} ({} bytes)", name, data.len());
        Self::from_bytes(name, data)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    /// Render-ready preview handle (`data:` URL)
    pub fn preview_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, BASE64.encode(&self.data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encode(format: ImageFormat) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(2, 2, image::Rgb([10, 20, 30]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), format)
            .unwrap();
        buf
    }

    #[test]
    fn test_accepts_png_and_jpeg() {
        let png = CharacterRef::from_bytes("a.png", encode(ImageFormat::Png)).unwrap();
        assert_eq!(png.mime_type(), "image/png");

        let jpeg = CharacterRef::from_bytes("b.jpg", encode(ImageFormat::Jpeg)).unwrap();
        assert_eq!(jpeg.mime_type(), "image/jpeg");
    }

    #[test]
    fn test_rejects_other_formats() {
        let gif = b"GIF89a\x01\x00\x01\x00".to_vec();
        assert!(matches!(
            CharacterRef::from_bytes("c.gif", gif),
            Err(ReferenceError::UnsupportedFormat(_))
        ));
        assert!(CharacterRef::from_bytes("notes.txt", b"hello".to_vec()).is_err());
    }

    #[test]
    fn test_preview_url() {
        let r = CharacterRef::from_bytes("a.png", encode(ImageFormat::Png)).unwrap();
        assert!(r.preview_url().starts_with("data:image/png;base64,iVBOR"));
    }

    #[tokio::test]
    async fn test_load_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("hero.png");
        std::fs::write(&path, encode(ImageFormat::Png)).unwrap();

        let r = CharacterRef::load(&path).await.unwrap();
        assert_eq!(r.name(), "hero.png");

        let missing = CharacterRef::load(&dir.path().join("nope.png")).await;
        assert!(matches!(missing, Err(ReferenceError::Io { .. })));
    }
}
