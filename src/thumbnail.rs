//! Contrast-stretched, decimated preview images.
//!
//! A thumbnail is built in one pass per selected band:
//!
//! 1. [`scan_band`] finds the band's min/max.
//! 2. Every `step`-th row and column is sampled ([`plan_decimation`]) and
//!    [`stretch`]ed into a byte staging raster (in memory, or the output
//!    file itself when the target is BMP).
//! 3. The staging raster is copied into the target format. For formats with
//!    alpha (PNG), the most frequent border color is keyed out first.

use std::path::Path;

use image::{Rgba, RgbaImage};
use ndarray::Array3;
use tracing::{debug, info, warn};

use crate::config::{NodataKeying, ThumbnailConfig};
use crate::decimate::{plan_decimation, DecimationPlan};
use crate::error::{RasterError, RasterResult};
use crate::nodata::{apply_color_key, detect_border_color, Color};
use crate::raster::{CreateOptions, Driver, MemoryDataset, PixelType, RasterDataset, RasterSource};
use crate::statistics::{scan_band, BandRange};
use crate::stretch::stretch;

/// Output image format, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailFormat {
    Bmp,
    Jpeg,
    Png,
    Gif,
}

impl ThumbnailFormat {
    /// Format for `.bmp`, `.jpg`, `.png` or `.gif` (case-insensitive)
    pub fn from_path(path: &Path) -> RasterResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match ext.as_str() {
            "bmp" => Ok(Self::Bmp),
            "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "gif" => Ok(Self::Gif),
            _ => Err(RasterError::UnsupportedFormat(path.display().to_string())),
        }
    }

    #[must_use]
    pub fn driver(&self) -> Driver {
        match self {
            Self::Bmp => Driver::Bmp,
            Self::Jpeg => Driver::Jpeg,
            Self::Png => Driver::Png,
            Self::Gif => Driver::Gif,
        }
    }
}

/// One gray band or three RGB bands, as 1-based band numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandSelection {
    Gray(usize),
    Rgb([usize; 3]),
}

impl BandSelection {
    pub fn from_slice(bands: &[usize]) -> RasterResult<Self> {
        match *bands {
            [gray] => Ok(Self::Gray(gray)),
            [r, g, b] => Ok(Self::Rgb([r, g, b])),
            _ => Err(RasterError::UnsupportedBandCount(bands.len())),
        }
    }

    #[must_use]
    pub fn bands(&self) -> &[usize] {
        match self {
            Self::Gray(band) => std::slice::from_ref(band),
            Self::Rgb(bands) => bands,
        }
    }

    /// Check every band number against a dataset's band count
    pub fn validate(&self, available: usize) -> RasterResult<()> {
        match self.bands().iter().find(|&&b| b == 0 || b > available) {
            Some(&band) => Err(RasterError::BandOutOfRange { band, available }),
            None => Ok(()),
        }
    }
}

/// What to render: which bands, at which scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThumbnailRequest {
    pub bands: BandSelection,
    /// Fraction of the source size, in `(0, 1]`
    pub scale: f64,
}

impl ThumbnailRequest {
    #[must_use]
    pub fn gray(band: usize, scale: f64) -> Self {
        Self { bands: BandSelection::Gray(band), scale }
    }

    #[must_use]
    pub fn rgb(red: usize, green: usize, blue: usize, scale: f64) -> Self {
        Self { bands: BandSelection::Rgb([red, green, blue]), scale }
    }
}

/// Outcome of a successful thumbnail
#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailSummary {
    pub width: usize,
    pub height: usize,
    /// Bands written to the file (4 when a nodata color was keyed)
    pub bands: usize,
    pub format: ThumbnailFormat,
    pub step: usize,
    /// Input range of each selected band
    pub ranges: Vec<BandRange>,
    pub keyed_color: Option<Color>,
}

/// Scale making the larger side of a `width` x `height` raster `max_size` pixels
#[must_use]
pub fn scale_for_max_size(width: usize, height: usize, max_size: usize) -> f64 {
    let size = max_size as f64;
    (size / width as f64).min(size / height as f64)
}

pub struct ThumbnailComposer<'a> {
    source: &'a dyn RasterSource,
    config: ThumbnailConfig,
}

impl<'a> ThumbnailComposer<'a> {
    #[must_use]
    pub fn new(source: &'a dyn RasterSource) -> Self {
        Self { source, config: ThumbnailConfig::default() }
    }

    #[must_use]
    pub fn with_config(mut self, config: ThumbnailConfig) -> Self {
        self.config = config;
        self
    }

    /// Scale for a thumbnail of at most `max_size` pixels on its larger side
    pub fn scale_for_path(&self, input: &Path, max_size: usize) -> RasterResult<f64> {
        let dataset = self.source.open(input)?;
        let scale = scale_for_max_size(dataset.width(), dataset.height(), max_size);
        self.source.close(dataset)?;
        Ok(scale)
    }

    /// Open `input`, write its thumbnail to `output` and release it
    pub fn create(
        &self,
        input: &Path,
        output: &Path,
        request: &ThumbnailRequest,
    ) -> RasterResult<ThumbnailSummary> {
        ThumbnailFormat::from_path(output)?;

        let mut dataset = self.source.open(input)?;
        let composed = self.compose(dataset.as_mut(), request, output);
        let closed = self.source.close(dataset);

        let summary = composed?;
        closed?;
        Ok(summary)
    }

    /// Write the thumbnail of an open raster to `output`.
    ///
    /// The format comes from `output`'s extension. Partially written files
    /// are left in place on failure.
    pub fn compose(
        &self,
        raster: &mut dyn RasterDataset,
        request: &ThumbnailRequest,
        output: &Path,
    ) -> RasterResult<ThumbnailSummary> {
        let format = ThumbnailFormat::from_path(output)?;
        request.bands.validate(raster.bands())?;
        let plan = plan_decimation(raster.width(), raster.height(), request.scale)?;

        let target = format.driver();
        let staging_driver = if format == ThumbnailFormat::Bmp { Driver::Bmp } else { Driver::Memory };
        for driver in [staging_driver, target] {
            if !self.source.has_driver(driver) {
                return Err(RasterError::DriverUnavailable(driver));
            }
        }

        debug!(
            input = %raster.description(),
            output = %output.display(),
            step = plan.step,
            width = plan.width,
            height = plan.height,
            "Decimation plan"
        );

        let ranges = request
            .bands
            .bands()
            .iter()
            .map(|&band| scan_band(raster, band - 1))
            .collect::<RasterResult<Vec<_>>>()?;

        let mut staging = self.source.create(
            output,
            CreateOptions::byte(plan.width, plan.height, request.bands.bands().len()),
            staging_driver,
        )?;
        write_stretched(raster, staging.as_mut(), request.bands.bands(), &ranges, &plan)?;

        let mut bands = request.bands.bands().len();
        let mut keyed_color = None;
        if format == ThumbnailFormat::Bmp {
            self.source.close(staging)?;
        } else if target.supports_alpha() && self.config.nodata_keying == NodataKeying::MostFrequentBorderColor {
            let mut image = to_rgba_image(staging.as_mut())?;
            self.source.close(staging)?;

            match detect_border_color(&image) {
                Some(key) => {
                    let keyed = apply_color_key(&mut image, key);
                    debug!(color = %format!("{:06x}", key.rgb()), keyed, "Keyed border color");
                    keyed_color = Some(key);
                }
                None => warn!(output = %output.display(), "No border pixels to detect a nodata color from"),
            }

            let mut keyed = rgba_to_dataset(&image);
            let copy = self.source.create_copy(&mut keyed, output, target)?;
            self.source.close(copy)?;
            bands = 4;
        } else {
            let copy = self.source.create_copy(staging.as_mut(), output, target)?;
            self.source.close(copy)?;
            self.source.close(staging)?;
        }

        info!(
            input = %raster.description(),
            output = %output.display(),
            width = plan.width,
            height = plan.height,
            bands,
            "Created thumbnail"
        );

        Ok(ThumbnailSummary {
            width: plan.width,
            height: plan.height,
            bands,
            format,
            step: plan.step,
            ranges,
            keyed_color,
        })
    }
}

/// Sample, stretch and write each selected band into `staging`
fn write_stretched(
    raster: &mut dyn RasterDataset,
    staging: &mut dyn RasterDataset,
    bands: &[usize],
    ranges: &[BandRange],
    plan: &DecimationPlan,
) -> RasterResult<()> {
    let mut src = vec![0.0f32; raster.width()];
    let mut dst = vec![0u8; plan.width];

    for (k, (&band, &range)) in bands.iter().zip(ranges).enumerate() {
        for (dst_row, src_row) in plan.source_rows().enumerate() {
            raster.read_row(band - 1, src_row, &mut src)?;
            for (col, out) in dst.iter_mut().enumerate() {
                *out = stretch(src[plan.source_index(col)], range);
            }
            staging.write_row(k, dst_row, &dst)?;
        }
    }
    Ok(())
}

/// Gray or RGB byte raster as an opaque RGBA image
fn to_rgba_image(staging: &mut dyn RasterDataset) -> RasterResult<RgbaImage> {
    let (width, height, bands) = (staging.width(), staging.height(), staging.bands());
    let mut image = RgbaImage::new(width as u32, height as u32);
    let mut row = vec![0.0f32; width];

    for band in 0..bands.min(3) {
        for y in 0..height {
            staging.read_row(band, y, &mut row)?;
            for (x, &v) in row.iter().enumerate() {
                let pixel = image.get_pixel_mut(x as u32, y as u32);
                if bands == 1 {
                    *pixel = Rgba([v as u8, v as u8, v as u8, u8::MAX]);
                } else {
                    pixel.0[band] = v as u8;
                    pixel.0[3] = u8::MAX;
                }
            }
        }
    }
    Ok(image)
}

fn rgba_to_dataset(image: &RgbaImage) -> MemoryDataset {
    let (w, h) = image.dimensions();
    let data = Array3::from_shape_fn((4, h as usize, w as usize), |(b, y, x)| {
        f32::from(image.get_pixel(x as u32, y as u32).0[b])
    });
    MemoryDataset::from_array(data, PixelType::Byte)
}
