//! Payload codec trait and common types
//!
//! The `PayloadCodec` trait provides a uniform interface for materializing
//! a whole file into memory and writing an in-memory payload back to disk.

use std::path::Path;
use thiserror::Error;

/// Errors that can occur during I/O operations
#[derive(Debug, Error)]
pub enum IoError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Failed to open file: {0}")]
    OpenFailed(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Shape mismatch: expected {expected} elements, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[cfg(feature = "tiff")]
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[cfg(feature = "shapefile")]
    #[error("Shapefile error: {0}")]
    Shapefile(#[from] shapefile::Error),

    #[cfg(feature = "csv")]
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for I/O operations
pub type IoResult<T> = Result<T, IoError>;

/// Reads a whole file into a payload and writes a payload back out.
///
/// Implementations never stream: `read` materializes the entire file and
/// `write` replaces the destination.
pub trait PayloadCodec {
    /// In-memory representation produced by `read`
    type Payload;

    /// Read the full file at `path`
    fn read(&self, path: &Path) -> IoResult<Self::Payload>;

    /// Write `payload` to `path`, replacing any existing file
    fn write(&self, payload: &Self::Payload, path: &Path) -> IoResult<()>;

    /// Get the format name
    fn format_name(&self) -> &'static str;

    /// Lower-case extensions this codec is normally used for
    fn extensions(&self) -> &'static [&'static str];
}

/// Fail with `FileNotFound` unless `path` exists
pub(crate) fn ensure_exists(path: &Path) -> IoResult<()> {
    if !path.exists() {
        return Err(IoError::FileNotFound(path.display().to_string()));
    }
    Ok(())
}

/// List supported file extensions
pub fn supported_extensions() -> Vec<&'static str> {
    let mut extensions = Vec::new();

    #[cfg(feature = "tiff")]
    {
        extensions.push("tif");
        extensions.push("tiff");
    }

    #[cfg(feature = "shapefile")]
    {
        extensions.push("shp");
    }

    #[cfg(feature = "csv")]
    {
        extensions.push("csv");
        extensions.push("tsv");
    }

    extensions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_extensions() {
        let extensions = supported_extensions();
        #[cfg(feature = "csv")]
        assert!(extensions.contains(&"csv"));
        #[cfg(feature = "tiff")]
        assert!(extensions.contains(&"tif"));
        #[cfg(feature = "shapefile")]
        assert!(extensions.contains(&"shp"));
    }

    #[test]
    fn test_ensure_exists_reports_path() {
        let err = ensure_exists(Path::new("/definitely/not/here.tif")).unwrap_err();
        assert!(err.to_string().contains("here.tif"));
    }
}
