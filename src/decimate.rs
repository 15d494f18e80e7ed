//! Nearest-neighbour decimation geometry.

use crate::error::{RasterError, RasterResult};

/// Output size and sampling stride for a scale factor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecimationPlan {
    /// Source pixels between two sampled pixels, in both axes
    pub step: usize,
    pub width: usize,
    pub height: usize,
}

impl DecimationPlan {
    /// Source index sampled for output index `dst`
    #[inline]
    #[must_use]
    pub fn source_index(&self, dst: usize) -> usize {
        dst * self.step
    }

    /// Source rows sampled, in output order
    pub fn source_rows(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.height).map(|r| self.source_index(r))
    }
}

/// Plan decimation of a `cols` x `rows` raster.
///
/// `step = floor(1 / scale)` (at least 1), output `ceil(n / step)` per axis.
/// Scales above 1 behave as 1.
///
/// # Errors
/// [`RasterError::InvalidScale`] when `scale` is not finite or not positive.
pub fn plan_decimation(cols: usize, rows: usize, scale: f64) -> RasterResult<DecimationPlan> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(RasterError::InvalidScale(scale));
    }

    let step = ((1.0 / scale).floor() as usize).max(1);
    Ok(DecimationPlan {
        step,
        width: cols.div_ceil(step),
        height: rows.div_ceil(step),
    })
}
