//! Raster access abstraction.
//!
//! The thumbnail and tiling code never talks to a codec directly. Everything
//! goes through two traits:
//!
//! - [`RasterDataset`]: an open raster handle (size, bands, geo-transform,
//!   row reads and writes). Dropping a handle releases it; [`RasterDataset::close`]
//!   additionally flushes any pending output.
//! - [`RasterSource`]: the driver side (open, create, copy into another
//!   format, reproject).
//!
//! [`MemoryDataset`] is the in-memory implementation used for staging rasters
//! and decoded image files.

use std::fmt;
use std::path::Path;

use ndarray::Array3;

use crate::error::{RasterError, RasterResult};
use crate::geometry::GeoTransform;

/// Codec used to create or copy a raster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Driver {
    GTiff,
    Bmp,
    Jpeg,
    Png,
    Gif,
    /// In-memory raster, never written to disk
    Memory,
}

impl Driver {
    /// Driver for a file extension (case-insensitive, without the dot)
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "tif" | "tiff" => Some(Driver::GTiff),
            "bmp" => Some(Driver::Bmp),
            "jpg" | "jpeg" => Some(Driver::Jpeg),
            "png" => Some(Driver::Png),
            "gif" => Some(Driver::Gif),
            _ => None,
        }
    }

    /// Driver for a path, from its extension
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Driver::GTiff => "GTiff",
            Driver::Bmp => "BMP",
            Driver::Jpeg => "JPEG",
            Driver::Png => "PNG",
            Driver::Gif => "GIF",
            Driver::Memory => "MEM",
        }
    }

    /// Whether the format can carry an alpha channel the keying step uses
    #[must_use]
    pub fn supports_alpha(&self) -> bool {
        matches!(self, Driver::Png)
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Sample type of a raster. Samples are always exposed as `f32` on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelType {
    #[default]
    Byte,
    Float32,
}

/// Geometry and sample type of a raster to create
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateOptions {
    pub width: usize,
    pub height: usize,
    pub bands: usize,
    pub pixel_type: PixelType,
}

impl CreateOptions {
    #[must_use]
    pub fn byte(width: usize, height: usize, bands: usize) -> Self {
        Self { width, height, bands, pixel_type: PixelType::Byte }
    }
}

/// An open raster handle.
///
/// Band indices are zero-based here; user-facing band selections are
/// one-based and converted at the edge.
pub trait RasterDataset: Send {
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    fn bands(&self) -> usize;

    fn geo_transform(&self) -> GeoTransform {
        GeoTransform::IDENTITY
    }

    /// Number of ground control points
    fn gcp_count(&self) -> usize {
        0
    }

    /// EPSG code of the raster's coordinate reference system, if known
    fn crs(&self) -> Option<i32> {
        None
    }

    /// Declared nodata sentinel, if any
    fn nodata(&self) -> Option<f64> {
        None
    }

    fn pixel_type(&self) -> PixelType;

    /// Human-readable identifier (path or driver name) for logs and errors
    fn description(&self) -> &str;

    /// Read one full row of `band` into `buf` (`buf.len()` must equal the width)
    fn read_row(&mut self, band: usize, row: usize, buf: &mut [f32]) -> RasterResult<()>;

    /// Write one full row of byte samples into `band`
    fn write_row(&mut self, band: usize, row: usize, data: &[u8]) -> RasterResult<()>;

    /// Flush pending output and release the handle
    fn close(self: Box<Self>) -> RasterResult<()> {
        Ok(())
    }

    /// True when the dataset carries an affine transform or GCPs
    fn is_georeferenced(&self) -> bool {
        !self.geo_transform().is_identity() || self.gcp_count() > 0
    }
}

/// Driver-side capability consumed by thumbnail generation and tile planning
pub trait RasterSource: Send + Sync {
    /// Open an existing raster read-only
    fn open(&self, path: &Path) -> RasterResult<Box<dyn RasterDataset>>;

    /// Create a new raster. Files are written when the handle is closed.
    fn create(
        &self,
        path: &Path,
        options: CreateOptions,
        driver: Driver,
    ) -> RasterResult<Box<dyn RasterDataset>>;

    /// Copy `source` into a new raster of another format, written immediately
    fn create_copy(
        &self,
        source: &mut dyn RasterDataset,
        path: &Path,
        driver: Driver,
    ) -> RasterResult<Box<dyn RasterDataset>>;

    /// Warp `dataset` into the coordinate system `target_epsg`
    fn reproject(
        &self,
        dataset: Box<dyn RasterDataset>,
        target_epsg: i32,
    ) -> RasterResult<Box<dyn RasterDataset>>;

    fn has_driver(&self, driver: Driver) -> bool;

    fn close(&self, dataset: Box<dyn RasterDataset>) -> RasterResult<()> {
        dataset.close()
    }
}

/// Checks a band/row pair against a dataset's shape
pub(crate) fn check_row_access(
    dataset: &dyn RasterDataset,
    band: usize,
    row: usize,
    len: usize,
) -> RasterResult<()> {
    if band >= dataset.bands() {
        return Err(RasterError::Read(format!(
            "{}: band index {band} out of range ({} bands)",
            dataset.description(),
            dataset.bands()
        )));
    }
    if row >= dataset.height() {
        return Err(RasterError::Read(format!(
            "{}: row {row} out of range ({} rows)",
            dataset.description(),
            dataset.height()
        )));
    }
    if len != dataset.width() {
        return Err(RasterError::Read(format!(
            "{}: row buffer holds {len} samples, raster is {} wide",
            dataset.description(),
            dataset.width()
        )));
    }
    Ok(())
}

/// Raster held entirely in memory as `(band, row, col)` samples.
#[derive(Debug)]
pub struct MemoryDataset {
    data: Array3<f32>,
    pixel_type: PixelType,
    geo_transform: GeoTransform,
    gcp_count: usize,
    crs: Option<i32>,
    nodata: Option<f64>,
    description: String,
}

impl MemoryDataset {
    /// Zero-filled dataset
    #[must_use]
    pub fn new(options: CreateOptions) -> Self {
        Self::from_array(
            Array3::zeros((options.bands, options.height, options.width)),
            options.pixel_type,
        )
    }

    /// Wrap an existing `(band, row, col)` array
    #[must_use]
    pub fn from_array(data: Array3<f32>, pixel_type: PixelType) -> Self {
        Self {
            data,
            pixel_type,
            geo_transform: GeoTransform::IDENTITY,
            gcp_count: 0,
            crs: None,
            nodata: None,
            description: Driver::Memory.name().to_string(),
        }
    }

    #[must_use]
    pub fn with_geo_transform(mut self, geo_transform: GeoTransform) -> Self {
        self.geo_transform = geo_transform;
        self
    }

    /// Mark the dataset as georeferenced by `count` ground control points
    #[must_use]
    pub fn with_gcp_count(mut self, count: usize) -> Self {
        self.gcp_count = count;
        self
    }

    #[must_use]
    pub fn with_crs(mut self, epsg: i32) -> Self {
        self.crs = Some(epsg);
        self
    }

    #[must_use]
    pub fn with_nodata(mut self, nodata: f64) -> Self {
        self.nodata = Some(nodata);
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn array(&self) -> &Array3<f32> {
        &self.data
    }

    /// Read every band of `source` into memory, keeping its georeferencing
    pub fn read_from(source: &mut dyn RasterDataset) -> RasterResult<Self> {
        let (bands, height, width) = (source.bands(), source.height(), source.width());
        let mut data = Array3::<f32>::zeros((bands, height, width));
        let mut row_buf = vec![0.0f32; width];

        for band in 0..bands {
            for row in 0..height {
                source.read_row(band, row, &mut row_buf)?;
                for (dst, &src) in data.slice_mut(ndarray::s![band, row, ..]).iter_mut().zip(&row_buf) {
                    *dst = src;
                }
            }
        }

        let mut copy = Self::from_array(data, source.pixel_type())
            .with_geo_transform(source.geo_transform())
            .with_description(source.description().to_string());
        copy.gcp_count = source.gcp_count();
        copy.crs = source.crs();
        copy.nodata = source.nodata();
        Ok(copy)
    }
}

impl RasterDataset for MemoryDataset {
    fn width(&self) -> usize {
        self.data.dim().2
    }

    fn height(&self) -> usize {
        self.data.dim().1
    }

    fn bands(&self) -> usize {
        self.data.dim().0
    }

    fn geo_transform(&self) -> GeoTransform {
        self.geo_transform
    }

    fn gcp_count(&self) -> usize {
        self.gcp_count
    }

    fn crs(&self) -> Option<i32> {
        self.crs
    }

    fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    fn pixel_type(&self) -> PixelType {
        self.pixel_type
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn read_row(&mut self, band: usize, row: usize, buf: &mut [f32]) -> RasterResult<()> {
        check_row_access(self, band, row, buf.len())?;
        for (dst, &src) in buf.iter_mut().zip(self.data.slice(ndarray::s![band, row, ..])) {
            *dst = src;
        }
        Ok(())
    }

    fn write_row(&mut self, band: usize, row: usize, data: &[u8]) -> RasterResult<()> {
        check_row_access(self, band, row, data.len())
            .map_err(|e| RasterError::Write(e.to_string()))?;
        for (dst, &src) in self.data.slice_mut(ndarray::s![band, row, ..]).iter_mut().zip(data) {
            *dst = f32::from(src);
        }
        Ok(())
    }
}
