//! # rasterprep - Thumbnails and tile pyramid plans for geospatial rasters
//!
//! Reduces large rasters to two derived products without GDAL:
//!
//! - **Thumbnails**: per-band min/max scan, linear contrast stretch and
//!   nearest-neighbour decimation into BMP, JPEG, PNG or GIF. PNG output
//!   gets its most frequent border color keyed out as transparent.
//! - **Tile pyramid plans**: native and overview zoom levels plus the tile
//!   index range at every zoom of a global geodetic grid (2 x 1 tiles at
//!   zoom 0), after reprojecting the raster to EPSG:4326.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use rasterprep::{LocalRasterSource, ThumbnailComposer, ThumbnailRequest, TilePyramidPlanner};
//!
//! let source = LocalRasterSource::new();
//!
//! // 1024 pixel RGB preview
//! let composer = ThumbnailComposer::new(&source);
//! let scale = composer.scale_for_path(Path::new("scene.tif"), 1024)?;
//! composer.create(
//!     Path::new("scene.tif"),
//!     Path::new("scene.png"),
//!     &ThumbnailRequest::rgb(1, 2, 3, scale),
//! )?;
//!
//! // Tiles to render
//! let pyramid = TilePyramidPlanner::default().plan_dataset(&source, Path::new("scene.tif"))?;
//! for range in pyramid.usable_ranges() {
//!     println!("zoom {}: {} tiles", range.zoom, range.count());
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`raster`]: [`RasterDataset`] / [`RasterSource`] traits and [`MemoryDataset`]
//! - [`local_source`]: file-backed [`RasterSource`] ([`tiff_source`], [`image_codec`],
//!   [`geotiff_writer`], [`warp`])
//! - [`statistics`], [`stretch`], [`decimate`], [`nodata`]: thumbnail building blocks
//! - [`thumbnail`]: [`ThumbnailComposer`]
//! - [`grid`], [`pyramid`]: geodetic tile grid and [`TilePyramidPlanner`]
//! - [`async_batch`]: concurrent jobs on tokio's blocking pool
//! - [`config`], [`error`]: configuration and the crate error type

// ============================================================================
// Public modules
// ============================================================================

pub mod async_batch;
pub mod chunk_cache;
pub mod config;
pub mod decimate;
pub mod error;
pub mod geometry;
pub mod geotiff_writer;
pub mod grid;
pub mod image_codec;
pub mod local_source;
pub mod nodata;
pub mod pyramid;
pub mod raster;
pub mod statistics;
pub mod stretch;
pub mod thumbnail;
pub mod tiff_source;
pub mod warp;

// ============================================================================
// Errors & Configuration
// ============================================================================

pub use error::{RasterError, RasterResult};
pub use config::{GridConfig, NodataKeying, ThumbnailConfig};

// ============================================================================
// Raster Abstraction
// ============================================================================

pub use raster::{
    CreateOptions,
    Driver,
    MemoryDataset,
    PixelType,
    RasterDataset,
    RasterSource,
};
pub use local_source::{translate_to_geotiff, LocalRasterSource};
pub use tiff_source::TiffDataset;
pub use geotiff_writer::GeoTiffWriter;
pub use warp::{warp_dataset, WarpedDataset};

// ============================================================================
// Geometry & Projections
// ============================================================================

pub use geometry::{BoundingBox, GeoTransform, Point};
pub use geometry::projection::{
    project_point,
    get_proj_string,
    is_geographic_crs,
    CoordTransformer,
    EPSG_WGS84,
};

// ============================================================================
// Thumbnails
// ============================================================================

pub use statistics::{scan_band, BandRange};
pub use stretch::stretch;
pub use decimate::{plan_decimation, DecimationPlan};
pub use nodata::{apply_color_key, detect_border_color, Color};
pub use thumbnail::{
    BandSelection,
    ThumbnailComposer,
    ThumbnailFormat,
    ThumbnailRequest,
    ThumbnailSummary,
    scale_for_max_size,
};

// ============================================================================
// Tile Grid & Pyramids
// ============================================================================

pub use grid::{GlobalGeodetic, TileAddress};
pub use pyramid::{TilePyramid, TilePyramidPlanner, TileRange, ZoomRange};

// ============================================================================
// Concurrency
// ============================================================================

pub use async_batch::{
    ThumbnailJob,
    compose_thumbnails_concurrent,
    create_thumbnail_async,
    plan_pyramid_async,
    plan_pyramids_concurrent,
};
