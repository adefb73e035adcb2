//! Panel export
//!
//! Panels are always written as PNG under a fixed name so a strip can be
//! reassembled from a directory listing.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::ImageFormat;
use thiserror::Error;
use tracing::{debug, info};

use super::InlineImage;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to convert {mime_type} panel to PNG: {source}")]
    Convert {
        mime_type: String,
        #[source]
        source: image::ImageError,
    },
}

/// File name for a 0-based panel index
pub fn panel_filename(index: usize) -> String {
    format!("storytoon-panel-{}.png", index + 1)
}

/// Write one panel image into `dir`, converting to PNG if needed
pub async fn save_panel_image(
    image: &InlineImage,
    dir: &Path,
    index: usize,
) -> Result<PathBuf, ExportError> {
    let path = dir.join(panel_filename(index));
    let io_err = |source| ExportError::Io {
        path: path.display().to_string(),
        source,
    };

    let bytes = if image.mime_type == "image/png" {
        image.data.clone()
    } else {
        debug!("Converting panel {} from {} to PNG", index + 1, image.mime_type);
        to_png(image)?
    };

    tokio::fs::create_dir_all(dir).await.map_err(io_err)?;
    tokio::fs::write(&path, &bytes).await.map_err(io_err)?;

    info!("Saved panel {} to {}", index + 1, path.display());
    Ok(path)
}

fn to_png(image: &InlineImage) -> Result<Vec<u8>, ExportError> {
    let convert = |source| ExportError::Convert {
        mime_type: image.mime_type.clone(),
        source,
    };

    let decoded = image::load_from_memory(&image.data).map_err(convert)?;
    let mut png = Vec::new();
    decoded
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(convert)?;
    Ok(png)
}
