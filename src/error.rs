// ============================================================================
// ERROR TYPES
// ============================================================================

use thiserror::Error;

/// Editing operations that were refused.  Nothing was mutated and no history
/// entry was pushed when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("cannot draw on a hidden layer, make it visible first")]
    LayerHidden,
    #[error("select at least 2 layers to merge ({selected} selected)")]
    MergeNeedsTwoLayers { selected: usize },
    #[error("a polygon needs at least 3 points ({points} collected)")]
    PolygonNeedsThreePoints { points: usize },
    #[error("no macro named '{0}'")]
    NoSuchMacro(String),
}

/// Error type for project document operations.
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] Box<bincode::ErrorKind>),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Pixel payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Error type for palette documents.
#[derive(Debug, Error)]
pub enum PaletteError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("'{0}' is not a valid hex color")]
    InvalidColor(String),
}

/// Error type for raster import / export.
#[derive(Debug, Error)]
pub enum ImageIoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Project(#[from] ProjectError),
}
