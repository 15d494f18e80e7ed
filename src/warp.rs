//! On-demand reprojection of a raster into another EPSG code.
//!
//! [`warp_dataset`] wraps a source dataset in a [`WarpedDataset`]: the output
//! grid is computed up front, pixels are produced row by row when read.
//! Every output pixel center is transformed back into the source CRS and
//! sampled nearest-neighbour; pixels falling outside the source read as 0.

use ahash::AHashMap;
use tracing::debug;

use crate::error::{RasterError, RasterResult};
use crate::geometry::projection::CoordTransformer;
use crate::geometry::{BoundingBox, GeoTransform};
use crate::raster::{check_row_access, PixelType, RasterDataset};

/// Samples taken along each source edge when computing the output extent
const EDGE_SAMPLES: usize = 20;

/// Source rows kept in memory before the row cache is flushed
const MAX_CACHED_ROWS: usize = 256;

/// Value written where the output grid has no source coverage
const FILL_VALUE: f32 = 0.0;

pub struct WarpedDataset {
    source: Box<dyn RasterDataset>,
    /// Output CRS -> source CRS
    to_source: CoordTransformer,
    /// Source world -> source pixel
    source_inverse: GeoTransform,
    geo_transform: GeoTransform,
    width: usize,
    height: usize,
    target_epsg: i32,
    description: String,
    cached_band: usize,
    row_cache: AHashMap<usize, Vec<f32>>,
}

/// Reproject `source` into `target_epsg`.
///
/// A georeferenced dataset already in the target CRS is returned unchanged.
///
/// # Errors
/// [`RasterError::Reproject`] when the source has no CRS, has no affine
/// transform (GCP-only georeferencing), or either EPSG code is unknown.
pub fn warp_dataset(
    source: Box<dyn RasterDataset>,
    target_epsg: i32,
) -> RasterResult<Box<dyn RasterDataset>> {
    let Some(source_epsg) = source.crs() else {
        return Err(RasterError::Reproject(format!(
            "{}: no coordinate reference system",
            source.description()
        )));
    };

    // GCP-only input fails even when it is already in the target CRS
    let source_gt = source.geo_transform();
    if source_gt.is_identity() {
        let reason = if source.gcp_count() > 0 {
            "ground control points without an affine transform are not supported"
        } else {
            "no affine transform"
        };
        return Err(RasterError::Reproject(format!("{}: {reason}", source.description())));
    }

    if source_epsg == target_epsg {
        return Ok(source);
    }

    let source_inverse = source_gt.invert().ok_or_else(|| {
        RasterError::Reproject(format!("{}: geo-transform is not invertible", source.description()))
    })?;

    let to_target = CoordTransformer::new(source_epsg, target_epsg)?;
    let to_source = CoordTransformer::new(target_epsg, source_epsg)?;

    let (src_w, src_h) = (source.width() as f64, source.height() as f64);
    let extent = output_extent(&source_gt, src_w, src_h, &to_target).ok_or_else(|| {
        RasterError::Reproject(format!(
            "{}: no edge point could be transformed to EPSG:{target_epsg}",
            source.description()
        ))
    })?;

    // Square pixels, keeping the number of pixels along the diagonal
    let source_diagonal = src_w.hypot(src_h);
    let target_diagonal = extent.width().hypot(extent.height());
    let resolution = target_diagonal / source_diagonal;
    if !resolution.is_finite() || resolution <= 0.0 {
        return Err(RasterError::Reproject(format!(
            "{}: degenerate output extent {extent:?}",
            source.description()
        )));
    }
    let width = ((extent.width() / resolution).ceil() as usize).max(1);
    let height = ((extent.height() / resolution).ceil() as usize).max(1);
    let geo_transform = GeoTransform::north_up(extent.minx, extent.maxy, resolution, resolution);

    debug!(
        source = %source.description(),
        from = source_epsg,
        to = target_epsg,
        width,
        height,
        resolution,
        "Warped output grid"
    );

    let description = format!("{} (EPSG:{target_epsg})", source.description());
    Ok(Box::new(WarpedDataset {
        source,
        to_source,
        source_inverse,
        geo_transform,
        width,
        height,
        target_epsg,
        description,
        cached_band: 0,
        row_cache: AHashMap::new(),
    }))
}

/// Bounding box of the source edges in the target CRS
fn output_extent(
    gt: &GeoTransform,
    width: f64,
    height: f64,
    to_target: &CoordTransformer,
) -> Option<BoundingBox> {
    let mut points = Vec::with_capacity(4 * (EDGE_SAMPLES + 1));
    for i in 0..=EDGE_SAMPLES {
        let t = i as f64 / EDGE_SAMPLES as f64;
        for (col, row) in [
            (t * width, 0.0),
            (t * width, height),
            (0.0, t * height),
            (width, t * height),
        ] {
            let (x, y) = gt.pixel_to_world(col, row);
            // Points outside the target projection's domain are skipped
            if let Ok((tx, ty)) = to_target.transform(x, y) {
                if tx.is_finite() && ty.is_finite() {
                    points.push((tx, ty));
                }
            }
        }
    }
    BoundingBox::enclosing(&points)
}

impl WarpedDataset {
    fn source_row(&mut self, band: usize, row: usize) -> RasterResult<&[f32]> {
        if band != self.cached_band || self.row_cache.len() >= MAX_CACHED_ROWS {
            self.row_cache.clear();
            self.cached_band = band;
        }
        if !self.row_cache.contains_key(&row) {
            let mut buf = vec![0.0f32; self.source.width()];
            self.source.read_row(band, row, &mut buf)?;
            self.row_cache.insert(row, buf);
        }
        Ok(self.row_cache.get(&row).map_or(&[][..], Vec::as_slice))
    }
}

impl RasterDataset for WarpedDataset {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn bands(&self) -> usize {
        self.source.bands()
    }

    fn geo_transform(&self) -> GeoTransform {
        self.geo_transform
    }

    fn crs(&self) -> Option<i32> {
        Some(self.target_epsg)
    }

    fn nodata(&self) -> Option<f64> {
        self.source.nodata()
    }

    fn pixel_type(&self) -> PixelType {
        self.source.pixel_type()
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn read_row(&mut self, band: usize, row: usize, buf: &mut [f32]) -> RasterResult<()> {
        check_row_access(self, band, row, buf.len())?;

        let (src_w, src_h) = (self.source.width() as f64, self.source.height() as f64);
        let (_, world_y) = self.geo_transform.pixel_to_world(0.0, row as f64 + 0.5);

        for (col, out) in buf.iter_mut().enumerate() {
            let (world_x, _) = self.geo_transform.pixel_to_world(col as f64 + 0.5, 0.0);
            *out = FILL_VALUE;

            let Ok((sx, sy)) = self.to_source.transform(world_x, world_y) else {
                continue;
            };
            let (px, py) = self.source_inverse.pixel_to_world(sx, sy);
            if !(px >= 0.0 && py >= 0.0 && px < src_w && py < src_h) {
                continue;
            }

            let src_row = self.source_row(band, py as usize)?;
            if let Some(&v) = src_row.get(px as usize) {
                *out = v;
            }
        }
        Ok(())
    }

    fn write_row(&mut self, _band: usize, _row: usize, _data: &[u8]) -> RasterResult<()> {
        Err(RasterError::Write(format!("{}: warped datasets are read-only", self.description)))
    }

    fn close(self: Box<Self>) -> RasterResult<()> {
        self.source.close()
    }
}
