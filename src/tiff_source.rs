//! Streaming GeoTIFF dataset backed by the `tiff` crate.
//!
//! Rows are assembled from decoded chunks (strips or tiles). A row read
//! decodes every chunk the row crosses once and keeps it in the handle's
//! [`ChunkCache`]. The chunks of the most recently read chunk row are also
//! pinned per column outside the cache, so a top-to-bottom scan decodes each
//! chunk exactly once even when a single strip is larger than the cache.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tracing::debug;

use crate::chunk_cache::ChunkCache;
use crate::error::{RasterError, RasterResult};
use crate::geometry::GeoTransform;
use crate::raster::{check_row_access, PixelType, RasterDataset};

const TAG_GDAL_NODATA: u16 = 42113;

// GeoKey IDs
const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;
const USER_DEFINED: u16 = 32767;

const PLANAR_CONFIG_SEPARATE: u16 = 2;

pub struct TiffDataset {
    path: PathBuf,
    description: String,
    decoder: Decoder<BufReader<File>>,
    image_width: usize,
    image_length: usize,
    chunk_width: usize,
    chunk_height: usize,
    chunks_across: usize,
    samples_per_pixel: usize,
    pixel_type: PixelType,
    geo_transform: GeoTransform,
    gcp_count: usize,
    crs: Option<i32>,
    nodata: Option<f64>,
    cache: ChunkCache,
    /// Last decoded chunk per chunk column, kept regardless of cache capacity
    pinned: Vec<Option<(u32, Arc<Vec<f32>>)>>,
    chunks_decoded: usize,
}

impl TiffDataset {
    /// Open a (Geo)TIFF file and read its georeferencing tags.
    ///
    /// # Errors
    /// Returns [`RasterError::Open`] if the file cannot be read or uses a
    /// layout this reader does not handle (planar-separate, palette, ...).
    pub fn open(path: &Path) -> RasterResult<Self> {
        let file = File::open(path).map_err(|e| RasterError::open(path, e))?;
        let decoder = Decoder::new(BufReader::new(file)).map_err(|e| RasterError::open(path, e))?;
        let mut decoder = decoder.with_limits(Limits::unlimited());

        let (width_u32, height_u32) = decoder.dimensions().map_err(|e| RasterError::open(path, e))?;
        let width = width_u32 as usize;
        let height = height_u32 as usize;

        let color_type = decoder.colortype().map_err(|e| RasterError::open(path, e))?;
        let (samples_per_pixel, bit_depth) = match color_type {
            tiff::ColorType::Gray(bits) => (1, bits),
            tiff::ColorType::GrayA(bits) => (2, bits),
            tiff::ColorType::RGB(bits) => (3, bits),
            tiff::ColorType::RGBA(bits) => (4, bits),
            tiff::ColorType::Multiband { bit_depth, num_samples } => {
                (usize::from(num_samples), bit_depth)
            }
            other => {
                return Err(RasterError::open(path, format!("unsupported color type {other:?}")));
            }
        };

        let planar = decoder
            .find_tag_unsigned::<u16>(Tag::PlanarConfiguration)
            .ok()
            .flatten()
            .unwrap_or(1);
        if planar == PLANAR_CONFIG_SEPARATE && samples_per_pixel > 1 {
            return Err(RasterError::open(path, "planar-separate TIFFs are not supported"));
        }

        let (chunk_width_u32, chunk_height_u32) = decoder.chunk_dimensions();
        let chunk_width = chunk_width_u32.max(1) as usize;
        let chunk_height = chunk_height_u32.max(1) as usize;
        let chunks_across = width.div_ceil(chunk_width);

        let pixel_scale = decoder
            .get_tag_f64_vec(Tag::ModelPixelScaleTag)
            .ok()
            .filter(|v| v.len() >= 3)
            .map(|v| [v[0], v[1], v[2]]);

        let tiepoints = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).unwrap_or_default();

        let model_transformation = decoder
            .get_tag_f64_vec(Tag::ModelTransformationTag)
            .ok()
            .and_then(|m| GeoTransform::from_model_transformation(&m));

        let (geo_transform, gcp_count) = match (model_transformation, pixel_scale) {
            (Some(gt), _) => (gt, 0),
            (None, Some(scale)) if tiepoints.len() >= 6 => {
                let tie = [tiepoints[0], tiepoints[1], tiepoints[2], tiepoints[3], tiepoints[4], tiepoints[5]];
                (GeoTransform::from_tiepoint(scale, tie), 0)
            }
            // Several tiepoints without a scale are ground control points
            (None, _) if tiepoints.len() > 6 => (GeoTransform::IDENTITY, tiepoints.len() / 6),
            _ => (GeoTransform::IDENTITY, 0),
        };

        let crs = decoder
            .get_tag_u16_vec(Tag::GeoKeyDirectoryTag)
            .ok()
            .and_then(|keys| epsg_from_geokeys(&keys));

        let nodata = decoder
            .get_tag_ascii_string(Tag::from_u16_exhaustive(TAG_GDAL_NODATA))
            .ok()
            .and_then(|s| s.trim_matches(char::from(0)).trim().parse::<f64>().ok());

        let pixel_type = if bit_depth == 8 { PixelType::Byte } else { PixelType::Float32 };

        debug!(
            path = %path.display(),
            width,
            height,
            bands = samples_per_pixel,
            chunk_width,
            chunk_height,
            crs = ?crs,
            "Opened TIFF"
        );

        Ok(Self {
            path: path.to_path_buf(),
            description: path.display().to_string(),
            decoder,
            image_width: width,
            image_length: height,
            chunk_width,
            chunk_height,
            chunks_across,
            samples_per_pixel,
            pixel_type,
            geo_transform,
            gcp_count,
            crs,
            nodata,
            cache: ChunkCache::default(),
            pinned: vec![None; chunks_across],
            chunks_decoded: 0,
        })
    }

    /// Replace the chunk cache, e.g. with a smaller capacity
    #[must_use]
    pub fn with_cache(mut self, cache: ChunkCache) -> Self {
        self.cache = cache;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of chunk decodes performed by this handle
    #[must_use]
    pub fn chunks_decoded(&self) -> usize {
        self.chunks_decoded
    }

    /// Decoded chunk with its actual (unpadded) width
    fn fetch_chunk(
        &mut self,
        chunk_col: usize,
        chunk_index: u32,
    ) -> RasterResult<(Arc<Vec<f32>>, usize)> {
        let (data_width, data_height) = self.decoder.chunk_data_dimensions(chunk_index);
        let data_width = data_width as usize;

        if let Some((index, entry)) = &self.pinned[chunk_col] {
            if *index == chunk_index {
                return Ok((Arc::clone(entry), data_width));
            }
        }
        if let Some(entry) = self.cache.get(chunk_index) {
            self.pinned[chunk_col] = Some((chunk_index, Arc::clone(&entry)));
            return Ok((entry, data_width));
        }

        let decoded = self
            .decoder
            .read_chunk(chunk_index)
            .map_err(|e| RasterError::Read(format!("{}: chunk {chunk_index}: {e}", self.description)))?;
        let values = convert_decoding_result(decoded);
        self.chunks_decoded += 1;

        let expected_len = data_width * data_height as usize * self.samples_per_pixel;
        if values.len() != expected_len {
            return Err(RasterError::Read(format!(
                "{}: decoded chunk {chunk_index} has unexpected length {} (expected {expected_len})",
                self.description,
                values.len(),
            )));
        }

        let entry = Arc::new(values);
        self.cache.insert(chunk_index, Arc::clone(&entry));
        self.pinned[chunk_col] = Some((chunk_index, Arc::clone(&entry)));
        Ok((entry, data_width))
    }
}

impl RasterDataset for TiffDataset {
    fn width(&self) -> usize {
        self.image_width
    }

    fn height(&self) -> usize {
        self.image_length
    }

    fn bands(&self) -> usize {
        self.samples_per_pixel
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

        let chunk_row = row / self.chunk_height;
        let within_y = row % self.chunk_height;
        let spp = self.samples_per_pixel;

        for chunk_col in 0..self.chunks_across {
            let chunk_index = u32::try_from(chunk_row * self.chunks_across + chunk_col)
                .map_err(|_| RasterError::Read(format!("{}: chunk index overflow", self.description)))?;
            let (chunk, data_width) = self.fetch_chunk(chunk_col, chunk_index)?;

            let dst_start = chunk_col * self.chunk_width;
            let span = data_width.min(self.image_width - dst_start);
            let src_row = &chunk[within_y * data_width * spp..];
            for (x, dst) in buf[dst_start..dst_start + span].iter_mut().enumerate() {
                *dst = src_row[x * spp + band];
            }
        }
        Ok(())
    }

    fn write_row(&mut self, _band: usize, _row: usize, _data: &[u8]) -> RasterResult<()> {
        Err(RasterError::Write(format!("{} is opened read-only", self.description)))
    }
}

/// EPSG code from a GeoKey directory, preferring the projected CRS key
fn epsg_from_geokeys(keys: &[u16]) -> Option<i32> {
    let count = usize::from(*keys.get(3)?);
    let mut geographic = None;
    let mut projected = None;

    for entry in keys.get(4..)?.chunks_exact(4).take(count) {
        let (key, location, value) = (entry[0], entry[1], entry[3]);
        // Location 0 means the value is stored inline
        if location != 0 || value == 0 || value == USER_DEFINED {
            continue;
        }
        match key {
            GEOGRAPHIC_TYPE_GEO_KEY => geographic = Some(i32::from(value)),
            PROJECTED_CS_TYPE_GEO_KEY => projected = Some(i32::from(value)),
            _ => {}
        }
    }

    projected.or(geographic)
}

fn convert_decoding_result(result: DecodingResult) -> Vec<f32> {
    match result {
        DecodingResult::U8(data) => data.into_iter().map(f32::from).collect(),
        DecodingResult::U16(data) => data.into_iter().map(f32::from).collect(),
        DecodingResult::U32(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I8(data) => data.into_iter().map(f32::from).collect(),
        DecodingResult::I16(data) => data.into_iter().map(f32::from).collect(),
        DecodingResult::I32(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::F32(data) => data,
        DecodingResult::F64(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::F16(data) => data.into_iter().map(f32::from).collect(),
        DecodingResult::U64(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I64(data) => data.into_iter().map(|v| v as f32).collect(),
    }
}
