//! GeoTIFF writer for in-memory rasters
//!
//! Writes a [`MemoryDataset`] with the `tiff` encoder, adding the GeoTIFF
//! georeferencing tags (pixel scale + tiepoint, or a full model
//! transformation for rotated rasters) and a GeoKey directory when the
//! dataset's EPSG code is known.

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use tiff::encoder::colortype::{Gray32Float, Gray8, RGB32Float, RGB8, RGBA32Float, RGBA8};
use tiff::encoder::{DirectoryEncoder, TiffEncoder, TiffKind};
use tiff::tags::Tag;

use crate::error::{RasterError, RasterResult};
use crate::geometry::projection::{get_proj_string, is_geographic_crs};
use crate::raster::{MemoryDataset, PixelType, RasterDataset};

// GeoTIFF Tag IDs
const GEOTIFF_MODELPIXELSCALE: u16 = 33550;
const GEOTIFF_MODELTIEPOINT: u16 = 33922;
const GEOTIFF_MODELTRANSFORMATION: u16 = 34264;
const GEOTIFF_GEOKEYDIRECTORY: u16 = 34735;
const GEOTIFF_GEOASCIIPARAMS: u16 = 34737;

// GeoKey IDs
const GT_MODEL_TYPE_GEO_KEY: u16 = 1024;
const GT_RASTER_TYPE_GEO_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;

// GeoKey values
const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

/// Writes one [`MemoryDataset`] as a single-image GeoTIFF
pub struct GeoTiffWriter<'a> {
    dataset: &'a MemoryDataset,
}

impl<'a> GeoTiffWriter<'a> {
    #[must_use]
    pub fn new(dataset: &'a MemoryDataset) -> Self {
        Self { dataset }
    }

    /// Write to a file path
    pub fn write<P: AsRef<Path>>(self, path: P) -> RasterResult<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| RasterError::write(path, e))?;
        self.write_to(BufWriter::new(file))
            .map_err(|e| RasterError::write(path, e))
    }

    /// Write to any writer that implements Write + Seek
    pub fn write_to<W: Write + Seek>(self, writer: W) -> Result<(), tiff::TiffError> {
        let ds = self.dataset;
        let width = ds.width() as u32;
        let height = ds.height() as u32;

        if width == 0 || height == 0 || ds.bands() == 0 {
            return Err(tiff::TiffError::FormatError(
                tiff::TiffFormatError::InvalidDimensions(width, height),
            ));
        }

        let mut encoder = TiffEncoder::new(writer)?;

        match (ds.pixel_type(), ds.bands()) {
            (PixelType::Byte, 1) => {
                let mut image = encoder.new_image::<Gray8>(width, height)?;
                self.write_geotiff_tags(image.encoder())?;
                image.write_data(&self.interleaved_bytes())?;
            }
            (PixelType::Byte, 3) => {
                let mut image = encoder.new_image::<RGB8>(width, height)?;
                self.write_geotiff_tags(image.encoder())?;
                image.write_data(&self.interleaved_bytes())?;
            }
            (PixelType::Byte, 4) => {
                let mut image = encoder.new_image::<RGBA8>(width, height)?;
                self.write_geotiff_tags(image.encoder())?;
                image.write_data(&self.interleaved_bytes())?;
            }
            (PixelType::Float32, 1) => {
                let mut image = encoder.new_image::<Gray32Float>(width, height)?;
                self.write_geotiff_tags(image.encoder())?;
                image.write_data(&self.interleaved_floats())?;
            }
            (PixelType::Float32, 3) => {
                let mut image = encoder.new_image::<RGB32Float>(width, height)?;
                self.write_geotiff_tags(image.encoder())?;
                image.write_data(&self.interleaved_floats())?;
            }
            (PixelType::Float32, 4) => {
                let mut image = encoder.new_image::<RGBA32Float>(width, height)?;
                self.write_geotiff_tags(image.encoder())?;
                image.write_data(&self.interleaved_floats())?;
            }
            _ => self.write_multiband_image(&mut encoder, width, height)?,
        }
        Ok(())
    }

    /// Write an arbitrary band count through the low-level directory API
    fn write_multiband_image<W: Write + Seek>(
        &self,
        encoder: &mut TiffEncoder<W>,
        width: u32,
        height: u32,
    ) -> Result<(), tiff::TiffError> {
        let bands = self.dataset.bands();
        let (bits, sample_format, pixel_bytes): (u16, u16, Vec<u8>) = match self.dataset.pixel_type() {
            PixelType::Byte => (8, 1, self.interleaved_bytes()),
            PixelType::Float32 => (
                32,
                3,
                self.interleaved_floats().iter().flat_map(|f| f.to_le_bytes()).collect(),
            ),
        };

        let mut dir = encoder.image_directory()?;

        dir.write_tag(Tag::ImageWidth, width)?;
        dir.write_tag(Tag::ImageLength, height)?;
        dir.write_tag(Tag::BitsPerSample, vec![bits; bands].as_slice())?;
        dir.write_tag(Tag::Compression, 1u16)?;
        // BlackIsZero
        dir.write_tag(Tag::PhotometricInterpretation, 1u16)?;
        dir.write_tag(Tag::SamplesPerPixel, bands as u16)?;
        dir.write_tag(Tag::SampleFormat, vec![sample_format; bands].as_slice())?;
        // Chunky (interleaved)
        dir.write_tag(Tag::PlanarConfiguration, 1u16)?;
        dir.write_tag(Tag::RowsPerStrip, height)?;
        if bands > 1 {
            dir.write_tag(Tag::ExtraSamples, vec![0u16; bands - 1].as_slice())?;
        }

        self.write_geotiff_tags(&mut dir)?;

        let strip_offset = dir.write_data(pixel_bytes.as_slice())?;
        let strip_offset = u32::try_from(strip_offset).map_err(|_| {
            tiff::TiffError::LimitsExceeded
        })?;
        dir.write_tag(Tag::StripOffsets, strip_offset)?;
        dir.write_tag(Tag::StripByteCounts, pixel_bytes.len() as u32)?;

        dir.finish()
    }

    fn write_geotiff_tags<W: Write + Seek, K: TiffKind>(
        &self,
        dir: &mut DirectoryEncoder<W, K>,
    ) -> Result<(), tiff::TiffError> {
        let gt = self.dataset.geo_transform();
        if gt.is_identity() {
            return Ok(());
        }

        if gt.is_north_up() {
            // ModelPixelScale: [ScaleX, ScaleY, ScaleZ]
            let pixel_scale = [gt.pixel_width(), -gt.pixel_height(), 0.0];
            dir.write_tag(Tag::Unknown(GEOTIFF_MODELPIXELSCALE), pixel_scale.as_slice())?;

            // Ties pixel (0, 0) to the top-left corner
            let tiepoint = [0.0, 0.0, 0.0, gt.origin_x(), gt.origin_y(), 0.0];
            dir.write_tag(Tag::Unknown(GEOTIFF_MODELTIEPOINT), tiepoint.as_slice())?;
        } else {
            let c = gt.0;
            let matrix = [
                c[1], c[2], 0.0, c[0], //
                c[4], c[5], 0.0, c[3], //
                0.0, 0.0, 0.0, 0.0, //
                0.0, 0.0, 0.0, 1.0,
            ];
            dir.write_tag(Tag::Unknown(GEOTIFF_MODELTRANSFORMATION), matrix.as_slice())?;
        }

        if let Some(epsg) = self.dataset.crs() {
            let geokeys = build_geokey_directory(epsg);
            dir.write_tag(Tag::Unknown(GEOTIFF_GEOKEYDIRECTORY), geokeys.as_slice())?;

            if let Some(proj_string) = get_proj_string(epsg) {
                // GeoAsciiParams entries are pipe-terminated
                let ascii_params = format!("{proj_string}|");
                dir.write_tag(Tag::Unknown(GEOTIFF_GEOASCIIPARAMS), ascii_params.as_str())?;
            }
        }

        Ok(())
    }

    fn interleaved_bytes(&self) -> Vec<u8> {
        let data = self.dataset.array();
        let (bands, height, width) = data.dim();
        let mut out = Vec::with_capacity(bands * height * width);
        for row in 0..height {
            for col in 0..width {
                for band in 0..bands {
                    out.push(data[[band, row, col]] as u8);
                }
            }
        }
        out
    }

    fn interleaved_floats(&self) -> Vec<f32> {
        let data = self.dataset.array();
        let (bands, height, width) = data.dim();
        let mut out = Vec::with_capacity(bands * height * width);
        for row in 0..height {
            for col in 0..width {
                for band in 0..bands {
                    out.push(data[[band, row, col]]);
                }
            }
        }
        out
    }
}

fn build_geokey_directory(epsg: i32) -> Vec<u16> {
    // [KeyDirectoryVersion, KeyRevision, MinorRevision, NumberOfKeys,
    //  KeyID1, TIFFTagLocation1, Count1, Value_Offset1, ...]
    let is_geographic = is_geographic_crs(epsg);
    let code = u16::try_from(epsg).unwrap_or(32767);

    let mut keys = vec![1, 1, 0, 3];
    keys.extend_from_slice(&[
        GT_MODEL_TYPE_GEO_KEY,
        0,
        1,
        if is_geographic { MODEL_TYPE_GEOGRAPHIC } else { MODEL_TYPE_PROJECTED },
    ]);
    keys.extend_from_slice(&[GT_RASTER_TYPE_GEO_KEY, 0, 1, RASTER_PIXEL_IS_AREA]);
    if is_geographic {
        keys.extend_from_slice(&[GEOGRAPHIC_TYPE_GEO_KEY, 0, 1, code]);
    } else {
        keys.extend_from_slice(&[PROJECTED_CS_TYPE_GEO_KEY, 0, 1, code]);
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GeoTransform;
    use crate::raster::CreateOptions;
    use crate::tiff_source::TiffDataset;
    use ndarray::Array3;

    #[test]
    fn test_geokey_directory_geographic() {
        let keys = build_geokey_directory(4326);
        assert_eq!(&keys[..4], &[1, 1, 0, 3]);
        assert_eq!(&keys[4..8], &[GT_MODEL_TYPE_GEO_KEY, 0, 1, MODEL_TYPE_GEOGRAPHIC]);
        assert_eq!(&keys[12..16], &[GEOGRAPHIC_TYPE_GEO_KEY, 0, 1, 4326]);
    }

    #[test]
    fn test_geokey_directory_projected() {
        let keys = build_geokey_directory(3857);
        assert_eq!(keys[7], MODEL_TYPE_PROJECTED);
        assert_eq!(&keys[12..16], &[PROJECTED_CS_TYPE_GEO_KEY, 0, 1, 3857]);
    }

    #[test]
    fn test_rejects_empty_raster() {
        let ds = MemoryDataset::new(CreateOptions::byte(0, 0, 1));
        let mut buf = std::io::Cursor::new(Vec::new());
        assert!(GeoTiffWriter::new(&ds).write_to(&mut buf).is_err());
    }

    #[test]
    fn test_rgb_byte_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.tif");

        let data = Array3::from_shape_fn((3, 4, 5), |(b, r, c)| (b * 50 + r * 5 + c) as f32);
        let ds = MemoryDataset::from_array(data, PixelType::Byte)
            .with_geo_transform(GeoTransform::north_up(-1000.0, 2000.0, 10.0, 10.0))
            .with_crs(3857);
        GeoTiffWriter::new(&ds).write(&path).unwrap();

        let mut back = TiffDataset::open(&path).unwrap();
        assert_eq!(back.bands(), 3);
        assert_eq!(back.pixel_type(), PixelType::Byte);
        assert_eq!(back.crs(), Some(3857));

        let mut row = vec![0.0f32; 5];
        back.read_row(2, 3, &mut row).unwrap();
        assert_eq!(row, vec![115.0, 116.0, 117.0, 118.0, 119.0]);
    }

    #[test]
    fn test_two_band_float_uses_multiband_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("two.tif");

        let data = Array3::from_shape_fn((2, 3, 3), |(b, r, c)| (b as f32) * 0.5 + (r * 3 + c) as f32);
        let ds = MemoryDataset::from_array(data, PixelType::Float32);
        GeoTiffWriter::new(&ds).write(&path).unwrap();

        let mut back = TiffDataset::open(&path).unwrap();
        assert_eq!(back.bands(), 2);
        assert!(back.geo_transform().is_identity());

        let mut row = vec![0.0f32; 3];
        back.read_row(1, 2, &mut row).unwrap();
        assert_eq!(row, vec![6.5, 7.5, 8.5]);
    }
}
