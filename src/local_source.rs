//! File-backed [`RasterSource`].
//!
//! GeoTIFFs are streamed chunk by chunk through [`TiffDataset`]; BMP, PNG,
//! JPEG and GIF files are decoded whole into a [`MemoryDataset`]. Datasets
//! created with [`RasterSource::create`] live in memory and are encoded to
//! their path when closed.

use std::path::{Path, PathBuf};

use ahash::AHashSet;
use tracing::{debug, warn};

use crate::error::{RasterError, RasterResult};
use crate::geometry::GeoTransform;
use crate::geotiff_writer::GeoTiffWriter;
use crate::image_codec::{decode_image, encode_image};
use crate::raster::{CreateOptions, Driver, MemoryDataset, PixelType, RasterDataset, RasterSource};
use crate::tiff_source::TiffDataset;
use crate::warp::warp_dataset;

/// Encode a memory dataset to `path` with `driver`
fn encode(dataset: &MemoryDataset, path: &Path, driver: Driver) -> RasterResult<()> {
    match driver {
        Driver::GTiff => GeoTiffWriter::new(dataset).write(path),
        Driver::Memory => Ok(()),
        _ => encode_image(dataset, path, driver),
    }
}

/// A created raster that is written to disk when closed.
///
/// Dropping it without calling [`RasterDataset::close`] discards the pixels.
struct PendingOutput {
    inner: MemoryDataset,
    path: PathBuf,
    driver: Driver,
}

impl RasterDataset for PendingOutput {
    fn width(&self) -> usize {
        self.inner.width()
    }

    fn height(&self) -> usize {
        self.inner.height()
    }

    fn bands(&self) -> usize {
        self.inner.bands()
    }

    fn geo_transform(&self) -> GeoTransform {
        self.inner.geo_transform()
    }

    fn crs(&self) -> Option<i32> {
        self.inner.crs()
    }

    fn pixel_type(&self) -> PixelType {
        self.inner.pixel_type()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    fn read_row(&mut self, band: usize, row: usize, buf: &mut [f32]) -> RasterResult<()> {
        self.inner.read_row(band, row, buf)
    }

    fn write_row(&mut self, band: usize, row: usize, data: &[u8]) -> RasterResult<()> {
        self.inner.write_row(band, row, data)
    }

    fn close(self: Box<Self>) -> RasterResult<()> {
        debug!(path = %self.path.display(), driver = %self.driver, "Flushing created raster");
        encode(&self.inner, &self.path, self.driver)
    }
}

/// Raster source reading and writing local files
#[derive(Debug, Clone)]
pub struct LocalRasterSource {
    disabled: AHashSet<Driver>,
}

impl Default for LocalRasterSource {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalRasterSource {
    /// Source with every driver enabled
    #[must_use]
    pub fn new() -> Self {
        Self { disabled: AHashSet::new() }
    }

    /// Disable one codec, as if it were missing from the build
    #[must_use]
    pub fn without_driver(mut self, driver: Driver) -> Self {
        self.disabled.insert(driver);
        self
    }

    fn require(&self, driver: Driver) -> RasterResult<()> {
        if self.has_driver(driver) {
            Ok(())
        } else {
            Err(RasterError::DriverUnavailable(driver))
        }
    }
}

fn check_parent_dir(path: &Path) -> RasterResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.is_dir() => Err(
            RasterError::create(path, format!("directory {} does not exist", parent.display())),
        ),
        _ => Ok(()),
    }
}

impl RasterSource for LocalRasterSource {
    fn open(&self, path: &Path) -> RasterResult<Box<dyn RasterDataset>> {
        let driver = Driver::from_path(path)
            .ok_or_else(|| RasterError::open(path, "unrecognized raster format"))?;
        self.require(driver)?;
        debug!(path = %path.display(), driver = %driver, "Opening raster");

        match driver {
            Driver::GTiff => Ok(Box::new(TiffDataset::open(path)?)),
            _ => Ok(Box::new(decode_image(path)?)),
        }
    }

    fn create(
        &self,
        path: &Path,
        options: CreateOptions,
        driver: Driver,
    ) -> RasterResult<Box<dyn RasterDataset>> {
        self.require(driver)?;
        if options.width == 0 || options.height == 0 || options.bands == 0 {
            return Err(RasterError::create(
                path,
                format!("invalid size {}x{}x{}", options.width, options.height, options.bands),
            ));
        }

        let inner = MemoryDataset::new(options).with_description(path.display().to_string());
        if driver == Driver::Memory {
            return Ok(Box::new(inner));
        }
        check_parent_dir(path)?;

        Ok(Box::new(PendingOutput { inner, path: path.to_path_buf(), driver }))
    }

    fn create_copy(
        &self,
        source: &mut dyn RasterDataset,
        path: &Path,
        driver: Driver,
    ) -> RasterResult<Box<dyn RasterDataset>> {
        self.require(driver)?;
        check_parent_dir(path)?;

        let copy = MemoryDataset::read_from(source)
            .map_err(|e| RasterError::Copy(format!("{} -> {}: {e}", source.description(), path.display())))?
            .with_description(path.display().to_string());

        encode(&copy, path, driver)
            .map_err(|e| RasterError::Copy(format!("{} -> {}: {e}", source.description(), path.display())))?;
        debug!(from = %source.description(), to = %path.display(), driver = %driver, "Copied raster");

        Ok(Box::new(copy))
    }

    fn reproject(
        &self,
        dataset: Box<dyn RasterDataset>,
        target_epsg: i32,
    ) -> RasterResult<Box<dyn RasterDataset>> {
        warp_dataset(dataset, target_epsg)
    }

    fn has_driver(&self, driver: Driver) -> bool {
        !self.disabled.contains(&driver)
    }

    fn close(&self, dataset: Box<dyn RasterDataset>) -> RasterResult<()> {
        let description = dataset.description().to_string();
        dataset.close().inspect_err(|e| {
            warn!(dataset = %description, error = %e, "Closing raster failed");
        })
    }
}

/// Convert any raster `source` can open (typically a BMP/PNG/JPEG/GIF image)
/// into a GeoTIFF at `output`, keeping bands, sample values and whatever
/// georeferencing the input carries.
pub fn translate_to_geotiff(source: &dyn RasterSource, input: &Path, output: &Path) -> RasterResult<()> {
    let mut dataset = source.open(input)?;
    let copied = source.create_copy(dataset.as_mut(), output, Driver::GTiff);
    let closed = source.close(dataset);

    source.close(copied?)?;
    closed?;
    debug!(from = %input.display(), to = %output.display(), "Translated to GeoTIFF");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_driver() {
        let source = LocalRasterSource::new().without_driver(Driver::Gif);
        assert!(!source.has_driver(Driver::Gif));
        assert!(source.has_driver(Driver::Png));

        let err = source
            .create(Path::new("out.gif"), CreateOptions::byte(2, 2, 1), Driver::Gif)
            .err()
            .unwrap();
        assert!(matches!(err, RasterError::DriverUnavailable(Driver::Gif)));
    }

    #[test]
    fn test_open_unknown_extension() {
        let err = LocalRasterSource::new().open(Path::new("/tmp/data.xyz")).err().unwrap();
        assert!(matches!(err, RasterError::Open(_)));
    }

    #[test]
    fn test_created_png_written_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        let source = LocalRasterSource::new();

        let mut ds = source.create(&path, CreateOptions::byte(3, 2, 1), Driver::Png).unwrap();
        ds.write_row(0, 0, &[1, 2, 3]).unwrap();
        ds.write_row(0, 1, &[4, 5, 6]).unwrap();
        assert!(!path.exists());
        source.close(ds).unwrap();

        let mut back = source.open(&path).unwrap();
        let mut row = [0.0f32; 3];
        back.read_row(0, 1, &mut row).unwrap();
        assert_eq!(row, [4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_create_in_missing_directory() {
        let err = LocalRasterSource::new()
            .create(Path::new("/nonexistent/dir/a.png"), CreateOptions::byte(1, 1, 1), Driver::Png)
            .err()
            .unwrap();
        assert!(matches!(err, RasterError::Create(_)));
    }

    #[test]
    fn test_create_copy_to_geotiff_keeps_georeferencing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("copy.tif");
        let source = LocalRasterSource::new();

        let mut mem = MemoryDataset::new(CreateOptions::byte(4, 4, 1))
            .with_geo_transform(GeoTransform::north_up(5.0, 45.0, 0.25, 0.25))
            .with_crs(4326);
        mem.write_row(0, 2, &[9, 8, 7, 6]).unwrap();

        let copy = source.create_copy(&mut mem, &path, Driver::GTiff).unwrap();
        source.close(copy).unwrap();

        let mut back = source.open(&path).unwrap();
        assert_eq!(back.crs(), Some(4326));
        assert_eq!(back.geo_transform(), mem.geo_transform());
        let mut row = [0.0f32; 4];
        back.read_row(0, 2, &mut row).unwrap();
        assert_eq!(row, [9.0, 8.0, 7.0, 6.0]);
    }

    #[test]
    fn test_translate_png_to_geotiff() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("scan.png");
        let tif = dir.path().join("scan.tif");
        let source = LocalRasterSource::new();

        let mut ds = source.create(&png, CreateOptions::byte(4, 2, 3), Driver::Png).unwrap();
        for band in 0..3u8 {
            ds.write_row(usize::from(band), 1, &[band, 10 + band, 20 + band, 30 + band]).unwrap();
        }
        source.close(ds).unwrap();

        translate_to_geotiff(&source, &png, &tif).unwrap();

        let mut back = source.open(&tif).unwrap();
        assert_eq!((back.width(), back.height(), back.bands()), (4, 2, 3));
        let mut row = [0.0f32; 4];
        back.read_row(2, 1, &mut row).unwrap();
        assert_eq!(row, [2.0, 12.0, 22.0, 32.0]);
    }

    #[test]
    fn test_translate_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = translate_to_geotiff(
            &LocalRasterSource::new(),
            &dir.path().join("missing.png"),
            &dir.path().join("out.tif"),
        )
        .unwrap_err();
        assert!(matches!(err, RasterError::Open(_)));
    }
}
