//! Engine error type.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the rendering engine.
///
/// The FFI layer maps each variant to a stable numeric code, so variants
/// should only ever be appended.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("XML parse error: {0}")]
    XmlParse(#[from] roxmltree::Error),

    #[error("invalid stylesheet: {0}")]
    Stylesheet(String),

    #[error("invalid filter expression '{expr}': {message}")]
    Filter { expr: String, message: String },

    #[error("invalid color '{0}'")]
    Color(String),

    #[error("Required parameter '{0}' is missing")]
    MissingParameter(String),

    #[error("invalid value '{value}' for parameter '{key}'")]
    InvalidParameter { key: String, value: String },

    #[error("Could not create datasource for type: '{kind}'{}", plugin_hint(.searched))]
    UnknownDatasource { kind: String, searched: Vec<PathBuf> },

    #[error("{kind} datasource error: {message}")]
    Datasource { kind: &'static str, message: String },

    #[error("GeoJSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported projection transform from '{from}' to '{to}'")]
    UnsupportedProjection { from: String, to: String },

    #[error("invalid map size {width}x{height} (each side must be in {min}..={max})")]
    InvalidSize {
        width: u32,
        height: u32,
        min: u32,
        max: u32,
    },

    #[error("invalid aspect_fix_mode: {0}")]
    InvalidAspectFixMode(i32),

    #[error("invalid bounding box: {0}")]
    InvalidBBox(String),

    #[error("could not zoom to combined layer extents using zoom_all: {0}")]
    ZoomAll(String),

    #[error("invalid srs: {0}")]
    InvalidSrs(String),

    #[error("invalid scale_factor {0}: must be finite and positive")]
    InvalidScaleFactor(f64),

    #[error("unknown file type: {0}")]
    UnknownImageFormat(String),

    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("raw image buffer has {actual} bytes, expected {expected}")]
    RawSize { expected: usize, actual: usize },

    #[error("could not allocate a {width}x{height} canvas")]
    Canvas { width: u32, height: u32 },

    #[error("internal error: {0}")]
    Internal(String),

    #[error("Failed to register fonts from: {}", .0.display())]
    NoFonts(PathBuf),
}

fn plugin_hint(searched: &[PathBuf]) -> String {
    if searched.is_empty() {
        " (no datasource plugin directories have been successfully registered)".to_string()
    } else {
        let dirs: Vec<String> = searched.iter().map(|p| p.display().to_string()).collect();
        format!(" (searched for datasource plugins in '{}')", dirs.join("', '"))
    }
}

impl Error {
    /// Wrap an I/O error with a short description of what was attempted.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn stylesheet(message: impl Into<String>) -> Self {
        Self::Stylesheet(message.into())
    }
}
