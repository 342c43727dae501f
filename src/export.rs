use std::fs;
use std::path::{Path, PathBuf};

use crate::compositor::Frame;
use crate::error::ExportError;
use crate::io::encode_png;
use crate::log_info;
use crate::ops::raster::Rasterizer;

/// Density multiplier applied to every export.
pub const EXPORT_PIXEL_RATIO: f32 = 2.0;
pub const EXPORT_FILE_NAME: &str = "thumbnail.png";

/// Result of an export: encoded PNG plus its pixel size.
#[derive(Clone, Debug)]
pub struct ExportedImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Always rasterizes at [`EXPORT_PIXEL_RATIO`]; only the file name varies.
#[derive(Debug)]
pub struct Exporter {
    file_name: String,
}

impl Default for Exporter {
    fn default() -> Self {
        Self::new(EXPORT_FILE_NAME)
    }
}

impl Exporter {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }

    /// Rasterize the mounted frame and PNG-encode it.
    pub fn export(
        &self,
        frame: Option<&Frame>,
        rasterizer: &mut Rasterizer,
    ) -> Result<ExportedImage, ExportError> {
        let frame = frame.ok_or(ExportError::NoSurface)?;
        let bitmap = rasterizer.rasterize(frame, EXPORT_PIXEL_RATIO);
        let (width, height) = bitmap.dimensions();
        let png = encode_png(&bitmap)?;
        log_info!("Exported {}x{} PNG ({} bytes)", width, height, png.len());
        Ok(ExportedImage { png, width, height })
    }

    /// Save an export under the fixed file name inside `dir`.
    pub fn deliver(&self, image: &ExportedImage, dir: &Path) -> Result<PathBuf, ExportError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(&self.file_name);
        fs::write(&path, &image.png)?;
        log_info!("Wrote {}", path.display());
        Ok(path)
    }
}
