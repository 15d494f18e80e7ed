//! Coordinate reference system transforms using pure Rust (proj4rs + crs-definitions).

use proj4rs::proj::Proj;
use proj4rs::transform::transform;

use crate::error::{RasterError, RasterResult};

/// EPSG code of the geodetic (WGS84 lon/lat) system the tile grid is defined in
pub const EPSG_WGS84: i32 = 4326;

/// Get PROJ4 string for an EPSG code using the crs-definitions database
#[inline]
#[must_use]
pub fn get_proj_string(epsg: i32) -> Option<&'static str> {
    u16::try_from(epsg)
        .ok()
        .and_then(crs_definitions::from_code)
        .map(|def| def.proj4)
}

/// Check if an EPSG code represents a geographic (lon/lat) CRS
#[inline]
#[must_use]
pub fn is_geographic_crs(epsg: i32) -> bool {
    // Geographic CRS codes are typically in the 4000-4999 range
    // but we check the proj string to be sure
    if let Some(proj_str) = get_proj_string(epsg) {
        proj_str.contains("+proj=longlat")
    } else {
        (4000..5000).contains(&epsg)
    }
}

/// Reusable transformer between two EPSG codes.
///
/// Parsing a projection is far more expensive than applying it, so warping
/// builds one transformer per direction and reuses it for every pixel.
pub struct CoordTransformer {
    source_proj: Proj,
    target_proj: Proj,
    source_is_geographic: bool,
    target_is_geographic: bool,
    identity: bool,
}

impl CoordTransformer {
    /// Create a transformer from `source_epsg` to `target_epsg`.
    ///
    /// # Errors
    /// Returns [`RasterError::Reproject`] if either code is not in the
    /// crs-definitions database or cannot be parsed.
    pub fn new(source_epsg: i32, target_epsg: i32) -> RasterResult<Self> {
        let source_str = get_proj_string(source_epsg).ok_or_else(|| {
            RasterError::Reproject(format!(
                "EPSG:{source_epsg} is not in the crs-definitions database"
            ))
        })?;
        let target_str = get_proj_string(target_epsg).ok_or_else(|| {
            RasterError::Reproject(format!(
                "EPSG:{target_epsg} is not in the crs-definitions database"
            ))
        })?;

        let source_proj = Proj::from_proj_string(source_str).map_err(|e| {
            RasterError::Reproject(format!("Invalid source projection EPSG:{source_epsg}: {e:?}"))
        })?;
        let target_proj = Proj::from_proj_string(target_str).map_err(|e| {
            RasterError::Reproject(format!("Invalid target projection EPSG:{target_epsg}: {e:?}"))
        })?;

        Ok(Self {
            source_proj,
            target_proj,
            source_is_geographic: is_geographic_crs(source_epsg),
            target_is_geographic: is_geographic_crs(target_epsg),
            identity: source_epsg == target_epsg,
        })
    }

    /// Transform one coordinate pair. Geographic coordinates are in degrees.
    ///
    /// # Errors
    /// Returns [`RasterError::Reproject`] when proj4rs rejects the point.
    pub fn transform(&self, x: f64, y: f64) -> RasterResult<(f64, f64)> {
        if self.identity {
            return Ok((x, y));
        }

        // proj4rs uses radians for geographic coordinates
        let mut point = if self.source_is_geographic {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };

        transform(&self.source_proj, &self.target_proj, &mut point)
            .map_err(|e| RasterError::Reproject(format!("Transform of ({x}, {y}) failed: {e:?}")))?;

        if self.target_is_geographic {
            Ok((point.0.to_degrees(), point.1.to_degrees()))
        } else {
            Ok((point.0, point.1))
        }
    }
}

/// Project a single point from one CRS to another.
///
/// # Errors
/// Returns [`RasterError::Reproject`] if the EPSG code is not supported or the
/// projection transformation fails.
#[inline]
pub fn project_point(source_epsg: i32, target_epsg: i32, x: f64, y: f64) -> RasterResult<(f64, f64)> {
    if source_epsg == target_epsg {
        return Ok((x, y));
    }
    CoordTransformer::new(source_epsg, target_epsg)?.transform(x, y)
}
