//! Error type shared by every raster operation.
//!
//! Each failure is scoped to the single operation that raised it. Nothing in
//! this crate retries; callers decide whether to log, report or propagate.

use std::path::Path;

use crate::raster::Driver;

/// Convenience alias used throughout the crate
pub type RasterResult<T> = Result<T, RasterError>;

/// Error type for thumbnail generation and tile planning
#[derive(Debug)]
pub enum RasterError {
    /// The raster could not be opened or decoded
    Open(String),
    /// Neither an affine transform nor ground control points are present
    NotGeoreferenced(String),
    /// A row read failed
    Read(String),
    /// A row write or a final encode failed
    Write(String),
    /// A new raster could not be created
    Create(String),
    /// A raster could not be copied into another format
    Copy(String),
    /// Spatial reference transformation failed or is unsupported
    Reproject(String),
    /// Output extension is not one of the supported thumbnail formats
    UnsupportedFormat(String),
    /// Band selection must contain exactly 1 or 3 bands
    UnsupportedBandCount(usize),
    /// A selected band does not exist in the dataset (1-based band number)
    BandOutOfRange { band: usize, available: usize },
    /// The raster source has no codec for the requested driver
    DriverUnavailable(Driver),
    /// Scale factor must be finite and greater than zero
    InvalidScale(f64),
    /// A configuration value is missing or malformed
    InvalidConfig(String),
    /// Underlying I/O error
    Io(std::io::Error),
    /// A background task panicked or was cancelled
    Task(String),
}

impl RasterError {
    pub(crate) fn open(path: &Path, reason: impl std::fmt::Display) -> Self {
        Self::Open(format!("{}: {reason}", path.display()))
    }

    pub(crate) fn create(path: &Path, reason: impl std::fmt::Display) -> Self {
        Self::Create(format!("{}: {reason}", path.display()))
    }

    pub(crate) fn write(path: &Path, reason: impl std::fmt::Display) -> Self {
        Self::Write(format!("{}: {reason}", path.display()))
    }
}

impl std::fmt::Display for RasterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open(e) => write!(f, "Failed to open raster: {e}"),
            Self::NotGeoreferenced(e) => write!(
                f,
                "No georeference (neither affine transformation nor GCPs): {e}"
            ),
            Self::Read(e) => write!(f, "Read error: {e}"),
            Self::Write(e) => write!(f, "Write error: {e}"),
            Self::Create(e) => write!(f, "Failed to create raster: {e}"),
            Self::Copy(e) => write!(f, "Failed to copy raster: {e}"),
            Self::Reproject(e) => write!(f, "Reprojection failed: {e}"),
            Self::UnsupportedFormat(e) => write!(
                f,
                "Unsupported thumbnail format '{e}' (expected bmp, jpg, png or gif)"
            ),
            Self::UnsupportedBandCount(n) => {
                write!(f, "Band selection must have 1 or 3 elements, got {n}")
            }
            Self::BandOutOfRange { band, available } => {
                write!(f, "Band {band} requested but the raster has {available} band(s)")
            }
            Self::DriverUnavailable(d) => write!(f, "{d} driver is not available"),
            Self::InvalidScale(s) => write!(f, "Invalid scale {s}: must be finite and > 0"),
            Self::InvalidConfig(e) => write!(f, "Invalid configuration: {e}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Task(e) => write!(f, "Task error: {e}"),
        }
    }
}

impl std::error::Error for RasterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RasterError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_context() {
        let err = RasterError::open(Path::new("/data/a.tif"), "not a TIFF");
        assert_eq!(err.to_string(), "Failed to open raster: /data/a.tif: not a TIFF");

        let err = RasterError::BandOutOfRange { band: 4, available: 3 };
        assert!(err.to_string().contains("Band 4"));

        let err = RasterError::DriverUnavailable(Driver::Gif);
        assert_eq!(err.to_string(), "GIF driver is not available");
    }

    #[test]
    fn test_io_source() {
        use std::error::Error;
        let err: RasterError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(err.source().is_some());
        assert!(RasterError::UnsupportedBandCount(2).source().is_none());
    }
}
