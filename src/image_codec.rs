//! BMP / PNG / JPEG / GIF decoding and encoding through the `image` crate.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GrayAlphaImage, GrayImage, ImageFormat, RgbImage, RgbaImage};
use ndarray::Array3;
use tracing::debug;

use crate::error::{RasterError, RasterResult};
use crate::raster::{Driver, MemoryDataset, PixelType, RasterDataset};

/// Quality used for JPEG output
pub const JPEG_QUALITY: u8 = 90;

/// Decode an image file into a [`MemoryDataset`].
///
/// Gray images become 1 band, gray+alpha 2, RGB 3 and RGBA 4. 8-bit images
/// are byte-typed; 16-bit and float images keep their full sample values as
/// `Float32`.
pub fn decode_image(path: &Path) -> RasterResult<MemoryDataset> {
    let img = image::open(path).map_err(|e| RasterError::open(path, e))?;
    let (width, height) = (img.width() as usize, img.height() as usize);

    let widen = |raw: Vec<u8>| raw.into_iter().map(f32::from).collect::<Vec<_>>();
    let widen16 = |raw: Vec<u16>| raw.into_iter().map(f32::from).collect::<Vec<_>>();
    let (bands, samples, pixel_type) = match img {
        DynamicImage::ImageLuma8(buf) => (1, widen(buf.into_raw()), PixelType::Byte),
        DynamicImage::ImageLumaA8(buf) => (2, widen(buf.into_raw()), PixelType::Byte),
        DynamicImage::ImageRgb8(buf) => (3, widen(buf.into_raw()), PixelType::Byte),
        DynamicImage::ImageRgba8(buf) => (4, widen(buf.into_raw()), PixelType::Byte),
        DynamicImage::ImageLuma16(buf) => (1, widen16(buf.into_raw()), PixelType::Float32),
        DynamicImage::ImageLumaA16(buf) => (2, widen16(buf.into_raw()), PixelType::Float32),
        DynamicImage::ImageRgb16(buf) => (3, widen16(buf.into_raw()), PixelType::Float32),
        DynamicImage::ImageRgba16(buf) => (4, widen16(buf.into_raw()), PixelType::Float32),
        DynamicImage::ImageRgb32F(buf) => (3, buf.into_raw(), PixelType::Float32),
        other => (4, other.to_rgba32f().into_raw(), PixelType::Float32),
    };

    debug!(path = %path.display(), width, height, bands, pixel_type = ?pixel_type, "Decoded image");

    // Interleaved samples -> (band, row, col)
    let data = Array3::from_shape_fn((bands, height, width), |(b, r, c)| {
        samples[(r * width + c) * bands + b]
    });

    Ok(MemoryDataset::from_array(data, pixel_type).with_description(path.display().to_string()))
}

/// Build a [`DynamicImage`] from a 1-4 band dataset. Samples are saturated to bytes.
pub fn to_dynamic_image(dataset: &MemoryDataset) -> RasterResult<DynamicImage> {
    let (width, height, bands) = (dataset.width(), dataset.height(), dataset.bands());
    let mut raw = Vec::with_capacity(width * height * bands);
    let data = dataset.array();
    for row in 0..height {
        for col in 0..width {
            for band in 0..bands {
                raw.push(data[[band, row, col]] as u8);
            }
        }
    }

    let (w, h) = (width as u32, height as u32);
    let mismatch = || RasterError::Write(format!("{}: sample buffer does not match {w}x{h}", dataset.description()));
    let img = match bands {
        1 => DynamicImage::ImageLuma8(GrayImage::from_raw(w, h, raw).ok_or_else(mismatch)?),
        2 => DynamicImage::ImageLumaA8(GrayAlphaImage::from_raw(w, h, raw).ok_or_else(mismatch)?),
        3 => DynamicImage::ImageRgb8(RgbImage::from_raw(w, h, raw).ok_or_else(mismatch)?),
        4 => DynamicImage::ImageRgba8(RgbaImage::from_raw(w, h, raw).ok_or_else(mismatch)?),
        n => return Err(RasterError::UnsupportedBandCount(n)),
    };
    Ok(img)
}

/// Encode `dataset` into `path` with an image driver.
///
/// JPEG drops alpha; GIF is always written from RGBA; BMP gets RGBA when the
/// source has gray+alpha.
pub fn encode_image(dataset: &MemoryDataset, path: &Path, driver: Driver) -> RasterResult<()> {
    let img = to_dynamic_image(dataset)?;
    debug!(path = %path.display(), driver = %driver, bands = dataset.bands(), "Encoding image");

    match driver {
        Driver::Jpeg => {
            let file = File::create(path).map_err(|e| RasterError::write(path, e))?;
            let rgb = match img {
                DynamicImage::ImageLuma8(gray) => DynamicImage::ImageLuma8(gray),
                other => DynamicImage::ImageRgb8(other.to_rgb8()),
            };
            let encoder = JpegEncoder::new_with_quality(BufWriter::new(file), JPEG_QUALITY);
            rgb.write_with_encoder(encoder)
                .map_err(|e| RasterError::write(path, e))
        }
        Driver::Png => img
            .save_with_format(path, ImageFormat::Png)
            .map_err(|e| RasterError::write(path, e)),
        Driver::Gif => DynamicImage::ImageRgba8(img.to_rgba8())
            .save_with_format(path, ImageFormat::Gif)
            .map_err(|e| RasterError::write(path, e)),
        Driver::Bmp => {
            let img = match img {
                DynamicImage::ImageLumaA8(_) => DynamicImage::ImageRgba8(img.to_rgba8()),
                other => other,
            };
            img.save_with_format(path, ImageFormat::Bmp)
                .map_err(|e| RasterError::write(path, e))
        }
        Driver::GTiff | Driver::Memory => Err(RasterError::write(
            path,
            format!("{driver} is not an image codec"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::CreateOptions;

    fn gradient(bands: usize) -> MemoryDataset {
        MemoryDataset::from_array(
            Array3::from_shape_fn((bands, 6, 8), |(b, r, c)| (b * 60 + r * 8 + c) as f32),
            PixelType::Byte,
        )
    }

    #[test]
    fn test_png_roundtrip_keeps_bands_and_values() {
        let dir = tempfile::tempdir().unwrap();
        for bands in [1, 3, 4] {
            let path = dir.path().join(format!("g{bands}.png"));
            let ds = gradient(bands);
            encode_image(&ds, &path, Driver::Png).unwrap();

            let back = decode_image(&path).unwrap();
            assert_eq!(back.bands(), bands);
            assert_eq!(back.array(), ds.array());
        }
    }

    #[test]
    fn test_bmp_gray_decodes_with_gray_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("g.bmp");
        let ds = gradient(1);
        encode_image(&ds, &path, Driver::Bmp).unwrap();

        // Gray BMPs are palettized and may come back as RGB
        let back = decode_image(&path).unwrap();
        assert_eq!((back.width(), back.height()), (8, 6));
        assert_eq!(back.array()[[0, 5, 7]], 47.0);
    }

    #[test]
    fn test_jpeg_and_gif_accept_rgba() {
        let dir = tempfile::tempdir().unwrap();
        let ds = gradient(4);
        encode_image(&ds, &dir.path().join("a.jpg"), Driver::Jpeg).unwrap();
        encode_image(&ds, &dir.path().join("a.gif"), Driver::Gif).unwrap();

        let jpg = decode_image(&dir.path().join("a.jpg")).unwrap();
        assert_eq!(jpg.bands(), 3);
        let gif = decode_image(&dir.path().join("a.gif")).unwrap();
        assert_eq!((gif.width(), gif.height()), (8, 6));
    }

    #[test]
    fn test_sixteen_bit_gray_keeps_one_band_and_full_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dem.png");
        let img = image::ImageBuffer::<image::Luma<u16>, Vec<u16>>::from_fn(5, 3, |x, y| {
            image::Luma([1000 * y as u16 + x as u16 + 300])
        });
        img.save(&path).unwrap();

        let back = decode_image(&path).unwrap();
        assert_eq!(back.bands(), 1);
        assert_eq!(back.pixel_type(), PixelType::Float32);
        assert_eq!(back.array()[[0, 0, 0]], 300.0);
        assert_eq!(back.array()[[0, 2, 4]], 2304.0);
    }

    #[test]
    fn test_rejects_five_bands() {
        let ds = MemoryDataset::new(CreateOptions::byte(2, 2, 5));
        assert!(matches!(to_dynamic_image(&ds), Err(RasterError::UnsupportedBandCount(5))));
    }

    #[test]
    fn test_decode_missing_file() {
        let err = decode_image(Path::new("/nonexistent/x.png")).unwrap_err();
        assert!(matches!(err, RasterError::Open(_)));
    }
}
