//! Tile pyramid planning over the geodetic grid.
//!
//! Given a georeferenced raster in EPSG:4326, the planner works out the
//! native zoom (`max_zoom`), the zoom at which the whole raster fits in about
//! one tile (`min_zoom`), and the covering tile range at every zoom level.

use std::path::Path;

use tracing::{debug, info};

use crate::config::GridConfig;
use crate::error::{RasterError, RasterResult};
use crate::geometry::projection::EPSG_WGS84;
use crate::geometry::{BoundingBox, GeoTransform};
use crate::grid::{GlobalGeodetic, TileAddress};
use crate::raster::RasterSource;

/// Usable zoom levels of a dataset, inclusive on both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoomRange {
    pub min: u32,
    pub max: u32,
}

impl ZoomRange {
    #[must_use]
    pub fn contains(&self, zoom: u32) -> bool {
        (self.min..=self.max).contains(&zoom)
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> {
        self.min..=self.max
    }
}

/// Inclusive tile index range at one zoom level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub zoom: u32,
    pub xmin: u64,
    pub ymin: u64,
    pub xmax: u64,
    pub ymax: u64,
}

impl TileRange {
    #[must_use]
    pub fn contains(&self, tile: &TileAddress) -> bool {
        tile.zoom == self.zoom
            && (self.xmin..=self.xmax).contains(&tile.x)
            && (self.ymin..=self.ymax).contains(&tile.y)
    }

    /// Number of tiles in the range
    #[must_use]
    pub fn count(&self) -> u64 {
        (self.xmax - self.xmin + 1) * (self.ymax - self.ymin + 1)
    }

    /// Tiles row by row, south to north
    pub fn iter(&self) -> impl Iterator<Item = TileAddress> + '_ {
        (self.ymin..=self.ymax)
            .flat_map(move |y| (self.xmin..=self.xmax).map(move |x| TileAddress::new(self.zoom, x, y)))
    }
}

/// Result of planning one dataset
#[derive(Debug, Clone, PartialEq)]
pub struct TilePyramid {
    /// Lon/lat extent of the dataset
    pub bounds: BoundingBox,
    pub zoom_range: ZoomRange,
    /// One range per zoom level `0..max_zoom` of the grid, indexed by zoom
    pub ranges: Vec<TileRange>,
}

impl TilePyramid {
    #[must_use]
    pub fn range(&self, zoom: u32) -> Option<&TileRange> {
        self.ranges.get(zoom as usize)
    }

    /// Ranges inside the usable zoom range, the ones worth rendering
    #[must_use]
    pub fn usable_ranges(&self) -> &[TileRange] {
        let end = (self.zoom_range.max as usize + 1).min(self.ranges.len());
        let start = (self.zoom_range.min as usize).min(end);
        &self.ranges[start..end]
    }

    /// Total number of tiles over the usable zoom range
    #[must_use]
    pub fn usable_tile_count(&self) -> u64 {
        self.usable_ranges().iter().map(TileRange::count).sum()
    }
}

pub struct TilePyramidPlanner {
    grid: GlobalGeodetic,
}

impl Default for TilePyramidPlanner {
    fn default() -> Self {
        Self { grid: GlobalGeodetic::default() }
    }
}

impl TilePyramidPlanner {
    pub fn new(config: GridConfig) -> RasterResult<Self> {
        config.validate()?;
        Ok(Self { grid: GlobalGeodetic::new(config) })
    }

    #[must_use]
    pub fn grid(&self) -> &GlobalGeodetic {
        &self.grid
    }

    /// Plan a raster of `width` x `height` pixels already in EPSG:4326.
    ///
    /// # Errors
    /// [`RasterError::NotGeoreferenced`] for an identity geo-transform.
    pub fn plan(
        &self,
        bounds: BoundingBox,
        geo_transform: GeoTransform,
        width: usize,
        height: usize,
    ) -> RasterResult<TilePyramid> {
        if geo_transform.is_identity() {
            return Err(RasterError::NotGeoreferenced("identity geo-transform".into()));
        }

        let pixel_size = geo_transform.pixel_width().abs();
        let largest_side = width.max(height) as f64;
        let max_zoom = self.grid.zoom_for_pixel_size(pixel_size);
        let min_zoom = self
            .grid
            .zoom_for_pixel_size(pixel_size * largest_side / f64::from(self.grid.tile_size()))
            .min(max_zoom);

        let ranges = (0..self.grid.max_zoom())
            .map(|zoom| Self::tile_range(&bounds, zoom))
            .collect();

        debug!(
            pixel_size,
            min_zoom,
            max_zoom,
            minx = bounds.minx,
            miny = bounds.miny,
            maxx = bounds.maxx,
            maxy = bounds.maxy,
            "Planned tile pyramid"
        );

        Ok(TilePyramid {
            bounds,
            zoom_range: ZoomRange { min: min_zoom, max: max_zoom },
            ranges,
        })
    }

    /// Covering range at `zoom`, both ends clamped into the grid
    fn tile_range(bounds: &BoundingBox, zoom: u32) -> TileRange {
        let last_x = (GlobalGeodetic::tiles_x(zoom) - 1) as i64;
        let last_y = (GlobalGeodetic::tiles_y(zoom) - 1) as i64;
        let (xmin, ymin) = GlobalGeodetic::lonlat_to_tile(bounds.minx, bounds.miny, zoom);
        let (xmax, ymax) = GlobalGeodetic::lonlat_to_tile(bounds.maxx, bounds.maxy, zoom);

        TileRange {
            zoom,
            xmin: xmin.clamp(0, last_x) as u64,
            ymin: ymin.clamp(0, last_y) as u64,
            xmax: xmax.clamp(0, last_x) as u64,
            ymax: ymax.clamp(0, last_y) as u64,
        }
    }

    /// Open `path`, reproject it to EPSG:4326 and plan it.
    ///
    /// The dataset is released before returning, on success and on error.
    pub fn plan_dataset(&self, source: &dyn RasterSource, path: &Path) -> RasterResult<TilePyramid> {
        let dataset = source.open(path)?;
        if !dataset.is_georeferenced() {
            source.close(dataset)?;
            return Err(RasterError::NotGeoreferenced(path.display().to_string()));
        }

        let warped = source.reproject(dataset, EPSG_WGS84)?;
        let geo_transform = warped.geo_transform();
        let bounds = geo_transform.bounds(warped.width(), warped.height());
        let planned = self.plan(bounds, geo_transform, warped.width(), warped.height());
        let closed = source.close(warped);

        let pyramid = planned?;
        closed?;

        info!(
            path = %path.display(),
            min_zoom = pyramid.zoom_range.min,
            max_zoom = pyramid.zoom_range.max,
            tiles = pyramid.usable_tile_count(),
            "Planned dataset"
        );
        Ok(pyramid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{CreateOptions, Driver, MemoryDataset, RasterDataset};
    use crate::warp::warp_dataset;

    /// Opens every path as a 4 x 4 EPSG:4326 raster georeferenced by GCPs only
    struct GcpOnlySource;

    impl RasterSource for GcpOnlySource {
        fn open(&self, _path: &Path) -> RasterResult<Box<dyn RasterDataset>> {
            Ok(Box::new(
                MemoryDataset::new(CreateOptions::byte(4, 4, 1))
                    .with_gcp_count(4)
                    .with_crs(4326),
            ))
        }

        fn create(
            &self,
            path: &Path,
            _options: CreateOptions,
            _driver: Driver,
        ) -> RasterResult<Box<dyn RasterDataset>> {
            Err(RasterError::Create(path.display().to_string()))
        }

        fn create_copy(
            &self,
            _source: &mut dyn RasterDataset,
            path: &Path,
            _driver: Driver,
        ) -> RasterResult<Box<dyn RasterDataset>> {
            Err(RasterError::Copy(path.display().to_string()))
        }

        fn reproject(
            &self,
            dataset: Box<dyn RasterDataset>,
            target_epsg: i32,
        ) -> RasterResult<Box<dyn RasterDataset>> {
            warp_dataset(dataset, target_epsg)
        }

        fn has_driver(&self, driver: Driver) -> bool {
            driver == Driver::Memory
        }
    }

    fn world_raster() -> (BoundingBox, GeoTransform) {
        // 3600 x 1800 pixels of 0.1 degree
        let gt = GeoTransform::north_up(-180.0, 90.0, 0.1, 0.1);
        (gt.bounds(3600, 1800), gt)
    }

    #[test]
    fn test_identity_transform_is_rejected() {
        let planner = TilePyramidPlanner::default();
        let err = planner
            .plan(BoundingBox::new(0.0, 0.0, 1.0, 1.0), GeoTransform::IDENTITY, 10, 10)
            .unwrap_err();
        assert!(matches!(err, RasterError::NotGeoreferenced(_)));
    }

    #[test]
    fn test_gcp_only_dataset_is_a_reprojection_error() {
        let err = TilePyramidPlanner::default()
            .plan_dataset(&GcpOnlySource, Path::new("gcps.tif"))
            .unwrap_err();
        assert!(matches!(err, RasterError::Reproject(_)), "{err:?}");
    }

    #[test]
    fn test_zoom_range_for_world_raster() {
        let (bounds, gt) = world_raster();
        let pyramid = TilePyramidPlanner::default().plan(bounds, gt, 3600, 1800).unwrap();

        // 0.1 deg/pixel: zoom 3 is 0.0879, zoom 2 is 0.176
        assert_eq!(pyramid.zoom_range.max, 3);
        // 0.1 * 3600 / 256 = 1.41 deg: even zoom 0 (0.703) is finer
        assert_eq!(pyramid.zoom_range.min, 0);
        assert_eq!(pyramid.ranges.len(), 32);

        let z0 = pyramid.range(0).unwrap();
        assert_eq!((z0.xmin, z0.ymin, z0.xmax, z0.ymax), (0, 0, 1, 0));
        assert_eq!(z0.count(), 2);
    }

    #[test]
    fn test_ranges_stay_inside_grid() {
        // Extends past the antimeridian and the poles
        let bounds = BoundingBox::new(-200.0, -100.0, 190.0, 95.0);
        let gt = GeoTransform::north_up(-200.0, 95.0, 0.5, 0.5);
        let pyramid = TilePyramidPlanner::default().plan(bounds, gt, 780, 390).unwrap();

        for range in &pyramid.ranges {
            let z = range.zoom;
            assert_eq!((range.xmin, range.ymin), (0, 0));
            assert_eq!(range.xmax, GlobalGeodetic::tiles_x(z) - 1);
            assert_eq!(range.ymax, GlobalGeodetic::tiles_y(z) - 1);
        }
    }

    #[test]
    fn test_small_raster_min_not_above_max() {
        // 4 x 4 pixels of 1 degree: native zoom 0, min zoom would also be 0
        let gt = GeoTransform::north_up(10.0, 50.0, 1.0, 1.0);
        let pyramid = TilePyramidPlanner::default().plan(gt.bounds(4, 4), gt, 4, 4).unwrap();
        assert!(pyramid.zoom_range.min <= pyramid.zoom_range.max);
    }

    #[test]
    fn test_usable_ranges_and_iteration() {
        let gt = GeoTransform::north_up(10.0, 46.0, 0.01, 0.01);
        let bounds = gt.bounds(200, 100);
        let pyramid = TilePyramidPlanner::default().plan(bounds, gt, 200, 100).unwrap();

        let usable = pyramid.usable_ranges();
        assert_eq!(usable.first().unwrap().zoom, pyramid.zoom_range.min);
        assert_eq!(usable.last().unwrap().zoom, pyramid.zoom_range.max);

        let range = usable.last().unwrap();
        let tiles: Vec<_> = range.iter().collect();
        assert_eq!(tiles.len() as u64, range.count());
        assert!(tiles.iter().all(|t| range.contains(t)));
        assert!(!range.contains(&TileAddress::new(range.zoom + 1, range.xmin, range.ymin)));
    }

    #[test]
    fn test_custom_grid_config() {
        let planner = TilePyramidPlanner::new(GridConfig::default().with_max_zoom(5)).unwrap();
        let gt = GeoTransform::north_up(0.0, 1.0, 1e-6, 1e-6);
        let pyramid = planner.plan(gt.bounds(10, 10), gt, 10, 10).unwrap();
        assert_eq!(pyramid.ranges.len(), 5);
        assert_eq!(pyramid.zoom_range.max, 4);

        assert!(TilePyramidPlanner::new(GridConfig::default().with_tile_size(0)).is_err());
    }
}
