//! Linear contrast stretch of raw samples to bytes.

use crate::statistics::BandRange;

/// Map `value` into `0..=255` using the band's range:
/// `floor((value - min) * 256 / (max - min + 1))`.
///
/// The `+ 1` keeps a flat band (`min == max`) from dividing by zero; every
/// sample of such a band maps to 0. Values outside `range` are not clamped
/// by the formula; the final cast saturates them to 0 or 255.
#[inline]
#[must_use]
pub fn stretch(value: f32, range: BandRange) -> u8 {
    let scaled = (f64::from(value) - range.min) * 256.0 / (range.max - range.min + 1.0);
    scaled.floor() as u8
}

/// Stretch every sample of `src` into `dst`
pub fn stretch_row(src: &[f32], range: BandRange, dst: &mut [u8]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = stretch(s, range);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_band_maps_to_zero() {
        let range = BandRange::new(17.0, 17.0);
        assert_eq!(stretch(17.0, range), 0);
    }

    #[test]
    fn test_byte_range_is_identity() {
        let range = BandRange::new(0.0, 255.0);
        for v in 0..=255u8 {
            assert_eq!(stretch(f32::from(v), range), v);
        }
    }

    #[test]
    fn test_twelve_bit_range() {
        let range = BandRange::new(0.0, 4095.0);
        assert_eq!(stretch(0.0, range), 0);
        assert_eq!(stretch(16.0, range), 1);
        assert_eq!(stretch(4095.0, range), 255);
    }

    #[test]
    fn test_negative_float_range() {
        let range = BandRange::new(-1.0, 1.0);
        assert_eq!(stretch(-1.0, range), 0);
        // 2 * 256 / 3 = 170.67
        assert_eq!(stretch(1.0, range), 170);
    }

    #[test]
    fn test_out_of_range_saturates() {
        let range = BandRange::new(10.0, 20.0);
        assert_eq!(stretch(0.0, range), 0);
        assert_eq!(stretch(1000.0, range), 255);
    }

    #[test]
    fn test_stretch_row() {
        let mut out = [0u8; 3];
        stretch_row(&[0.0, 127.0, 255.0], BandRange::new(0.0, 255.0), &mut out);
        assert_eq!(out, [0, 127, 255]);
    }
}
