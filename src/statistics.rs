//! Per-band min/max scan.

use tracing::debug;

use crate::error::RasterResult;
use crate::raster::RasterDataset;

/// Minimum and maximum sample of one band
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BandRange {
    pub min: f64,
    pub max: f64,
}

impl BandRange {
    #[must_use]
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// `max - min`
    #[must_use]
    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

/// Scan `band` (zero-based) of `dataset` row by row and return its range.
///
/// The range is seeded from the first sample of the first row. Every sample
/// takes part, including a declared nodata value. An empty raster yields
/// `0..0`.
pub fn scan_band(dataset: &mut dyn RasterDataset, band: usize) -> RasterResult<BandRange> {
    let (width, height) = (dataset.width(), dataset.height());
    if width == 0 || height == 0 {
        return Ok(BandRange::default());
    }

    let mut buf = vec![0.0f32; width];
    dataset.read_row(band, 0, &mut buf)?;
    let mut min = buf[0];
    let mut max = buf[0];

    for row in 0..height {
        if row > 0 {
            dataset.read_row(band, row, &mut buf)?;
        }
        for &v in &buf {
            if v < min {
                min = v;
            }
            if v > max {
                max = v;
            }
        }
    }

    let range = BandRange::new(f64::from(min), f64::from(max));
    debug!(dataset = %dataset.description(), band, min = range.min, max = range.max, "Scanned band");
    Ok(range)
}
