use std::path::PathBuf;

use thiserror::Error;

use crate::canvas::LayerId;
use crate::io::SourceId;

/// Rejected layer-list mutation. The list the operation was called on is
/// always left untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("layer {id} is not a {expected} layer")]
    InvalidLayerKind { id: LayerId, expected: &'static str },
    #[error("no layer with id {0}")]
    MissingLayer(LayerId),
    #[error("layer dimensions must be positive and finite (got {width}x{height})")]
    InvalidDimensions { width: f32, height: f32 },
    #[error("'{0}' is not a hex color (expected #rgb or #rrggbb)")]
    InvalidColor(String),
}

/// Ingestion or decode failure for an image source.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    #[error("could not decode source {source_id}: {reason}")]
    DecodeError { source_id: SourceId, reason: String },
    #[error("'{}' is not an image file", .0.display())]
    NotAnImage(PathBuf),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("nothing has been rendered yet")]
    NoSurface,
    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("could not read settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid settings file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("upload bounds must be positive and finite (got {width}x{height})")]
    InvalidUploadBounds { width: f32, height: f32 },
    #[error("stage size must be positive and finite (got {width}x{height})")]
    InvalidStage { width: f32, height: f32 },
}
