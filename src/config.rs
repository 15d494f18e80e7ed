//! Tile grid and thumbnail configuration.
//!
//! Values are plain structs passed into the planner and composer. Each can
//! also be read from environment variables:
//! - `RASTERPREP_TILE_SIZE`: tile edge in pixels (default 256)
//! - `RASTERPREP_MAX_ZOOM`: number of zoom levels, 1..=32 (default 32)
//! - `RASTERPREP_NODATA_KEYING`: `border` (default) or `none`

use std::str::FromStr;

use crate::error::{RasterError, RasterResult};

pub const ENV_TILE_SIZE: &str = "RASTERPREP_TILE_SIZE";
pub const ENV_MAX_ZOOM: &str = "RASTERPREP_MAX_ZOOM";
pub const ENV_NODATA_KEYING: &str = "RASTERPREP_NODATA_KEYING";

pub const DEFAULT_TILE_SIZE: u32 = 256;
/// Upper bound on zoom levels; `2^(z+1)` tile columns still fit in `u64`
pub const MAX_ZOOM_LIMIT: u32 = 32;

/// Parse an optional variable, keeping `default` when it is unset
fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> RasterResult<T> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| RasterError::InvalidConfig(format!("{key}={raw:?} is not a valid value"))),
    }
}

/// Geometry of the global geodetic tile grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridConfig {
    /// Tile edge in pixels
    pub tile_size: u32,
    /// Zoom levels are `0..max_zoom`
    pub max_zoom: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            max_zoom: MAX_ZOOM_LIMIT,
        }
    }
}

impl GridConfig {
    #[must_use]
    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    #[must_use]
    pub fn with_max_zoom(mut self, max_zoom: u32) -> Self {
        self.max_zoom = max_zoom;
        self
    }

    pub fn validate(&self) -> RasterResult<()> {
        if self.tile_size == 0 {
            return Err(RasterError::InvalidConfig("tile_size must be > 0".into()));
        }
        if self.max_zoom == 0 || self.max_zoom > MAX_ZOOM_LIMIT {
            return Err(RasterError::InvalidConfig(format!(
                "max_zoom must be in 1..={MAX_ZOOM_LIMIT}, got {}",
                self.max_zoom
            )));
        }
        Ok(())
    }

    /// Build from a key lookup (environment, map, ...); unset keys keep defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> RasterResult<Self> {
        let defaults = Self::default();
        let config = Self {
            tile_size: parse_var(&lookup, ENV_TILE_SIZE, defaults.tile_size)?,
            max_zoom: parse_var(&lookup, ENV_MAX_ZOOM, defaults.max_zoom)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> RasterResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

/// How transparent background is derived for alpha-capable thumbnails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodataKeying {
    /// Key out the most frequent border color
    #[default]
    MostFrequentBorderColor,
    /// Write the thumbnail fully opaque
    Disabled,
}

impl FromStr for NodataKeying {
    type Err = RasterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "border" | "most-frequent-border-color" => Ok(Self::MostFrequentBorderColor),
            "none" | "disabled" | "off" => Ok(Self::Disabled),
            other => Err(RasterError::InvalidConfig(format!(
                "unknown nodata keying '{other}' (expected 'border' or 'none')"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThumbnailConfig {
    pub nodata_keying: NodataKeying,
}

impl ThumbnailConfig {
    #[must_use]
    pub fn with_nodata_keying(mut self, nodata_keying: NodataKeying) -> Self {
        self.nodata_keying = nodata_keying;
        self
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> RasterResult<Self> {
        let nodata_keying = match lookup(ENV_NODATA_KEYING) {
            Some(raw) => raw.parse()?,
            None => NodataKeying::default(),
        };
        Ok(Self { nodata_keying })
    }

    pub fn from_env() -> RasterResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}
