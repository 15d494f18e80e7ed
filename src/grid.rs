//! Global geodetic tile grid.
//!
//! Degrees-based grid: at zoom 0 two square tiles cover the world (each
//! 180° x 180°), and every zoom level doubles the tile count along both axes.
//! Tile `y` counts upward from the south pole.

use std::fmt;

use crate::config::GridConfig;
use crate::geometry::BoundingBox;

/// Tile index `(zoom, x, y)` in the geodetic grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileAddress {
    pub zoom: u32,
    pub x: u64,
    pub y: u64,
}

impl TileAddress {
    #[must_use]
    pub fn new(zoom: u32, x: u64, y: u64) -> Self {
        Self { zoom, x, y }
    }

    /// Lon/lat extent of this tile
    #[must_use]
    pub fn bounds(&self) -> BoundingBox {
        GlobalGeodetic::tile_bounds(self.x, self.y, self.zoom)
    }
}

impl fmt::Display for TileAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// The geodetic grid with a configurable tile size and zoom count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalGeodetic {
    tile_size: u32,
    max_zoom: u32,
}

impl Default for GlobalGeodetic {
    fn default() -> Self {
        Self::new(GridConfig::default())
    }
}

impl GlobalGeodetic {
    #[must_use]
    pub fn new(config: GridConfig) -> Self {
        Self {
            tile_size: config.tile_size,
            max_zoom: config.max_zoom,
        }
    }

    #[must_use]
    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Zoom levels are `0..max_zoom`
    #[must_use]
    pub fn max_zoom(&self) -> u32 {
        self.max_zoom
    }

    /// Degrees covered by one tile edge at `zoom`
    #[inline]
    #[must_use]
    pub fn tile_extent(zoom: u32) -> f64 {
        180.0 / 2f64.powi(zoom as i32)
    }

    /// Degrees per pixel at `zoom`
    #[inline]
    #[must_use]
    pub fn resolution(&self, zoom: u32) -> f64 {
        180.0 / (f64::from(self.tile_size) * 2f64.powi(zoom as i32))
    }

    /// Number of tile columns at `zoom` (`2^(zoom+1)`)
    #[must_use]
    pub fn tiles_x(zoom: u32) -> u64 {
        1u64 << (zoom + 1)
    }

    /// Number of tile rows at `zoom` (`2^zoom`)
    #[must_use]
    pub fn tiles_y(zoom: u32) -> u64 {
        1u64 << zoom
    }

    /// Raw tile indices of a lon/lat point.
    ///
    /// Not clamped: points outside the world, and the east/north edges
    /// themselves, yield indices outside the grid.
    #[must_use]
    pub fn lonlat_to_tile(lon: f64, lat: f64, zoom: u32) -> (i64, i64) {
        let extent = Self::tile_extent(zoom);
        (
            ((lon + 180.0) / extent).floor() as i64,
            ((lat + 90.0) / extent).floor() as i64,
        )
    }

    /// The tile containing a point, if the point lies inside the grid
    #[must_use]
    pub fn tile_for(lon: f64, lat: f64, zoom: u32) -> Option<TileAddress> {
        let (x, y) = Self::lonlat_to_tile(lon, lat, zoom);
        let x = u64::try_from(x).ok().filter(|&x| x < Self::tiles_x(zoom))?;
        let y = u64::try_from(y).ok().filter(|&y| y < Self::tiles_y(zoom))?;
        Some(TileAddress::new(zoom, x, y))
    }

    /// Lon/lat extent of tile `(x, y)` at `zoom`
    #[must_use]
    pub fn tile_bounds(x: u64, y: u64, zoom: u32) -> BoundingBox {
        let extent = Self::tile_extent(zoom);
        let (x, y) = (x as f64, y as f64);
        BoundingBox::new(
            x * extent - 180.0,
            y * extent - 90.0,
            (x + 1.0) * extent - 180.0,
            (y + 1.0) * extent - 90.0,
        )
    }

    /// Lowest zoom whose pixels are at least as fine as `pixel_size` degrees,
    /// or the last zoom when even that one is coarser.
    #[must_use]
    pub fn zoom_for_pixel_size(&self, pixel_size: f64) -> u32 {
        (0..self.max_zoom)
            .find(|&z| self.resolution(z) <= pixel_size)
            .unwrap_or(self.max_zoom.saturating_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_resolution() {
        let grid = GlobalGeodetic::default();
        assert_eq!(grid.resolution(0), 180.0 / 256.0);
        assert_eq!(grid.resolution(1), 180.0 / 512.0);
        assert_eq!(GlobalGeodetic::tiles_x(0), 2);
        assert_eq!(GlobalGeodetic::tiles_y(0), 1);
        assert_eq!(GlobalGeodetic::tiles_x(31), 1 << 32);
    }

    #[test]
    fn test_lonlat_to_tile() {
        assert_eq!(GlobalGeodetic::lonlat_to_tile(-180.0, -90.0, 0), (0, 0));
        assert_eq!(GlobalGeodetic::lonlat_to_tile(0.0, 0.0, 0), (1, 0));
        assert_eq!(GlobalGeodetic::lonlat_to_tile(10.0, 45.0, 2), (4, 3));
        // East edge is one past the last column
        assert_eq!(GlobalGeodetic::lonlat_to_tile(180.0, 0.0, 0), (2, 0));
        assert_eq!(GlobalGeodetic::tile_for(180.0, 0.0, 0), None);
        assert_eq!(GlobalGeodetic::tile_for(-200.0, 0.0, 3), None);
    }

    #[test]
    fn test_tile_bounds() {
        let b = GlobalGeodetic::tile_bounds(1, 0, 0);
        assert_eq!((b.minx, b.miny, b.maxx, b.maxy), (0.0, -90.0, 180.0, 90.0));
        let b = TileAddress::new(2, 4, 3).bounds();
        assert_eq!((b.minx, b.miny, b.maxx, b.maxy), (0.0, 45.0, 45.0, 90.0));
    }

    #[test]
    fn test_tile_bounds_contain_point() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let lon = rng.gen_range(-180.0..180.0);
            let lat = rng.gen_range(-90.0..90.0);
            let zoom = rng.gen_range(0..20);
            let tile = GlobalGeodetic::tile_for(lon, lat, zoom).unwrap();
            assert!(tile.bounds().contains(lon, lat), "{lon},{lat} not in {tile}");
        }
    }

    #[test]
    fn test_zoom_for_pixel_size() {
        let grid = GlobalGeodetic::default();
        assert_eq!(grid.zoom_for_pixel_size(1.0), 0);
        assert_eq!(grid.zoom_for_pixel_size(grid.resolution(5)), 5);
        assert_eq!(grid.zoom_for_pixel_size(grid.resolution(5) * 1.5), 5);
        // Finer than the last level
        assert_eq!(grid.zoom_for_pixel_size(0.0), 31);
    }

    #[test]
    fn test_zoom_for_pixel_size_is_non_increasing() {
        let grid = GlobalGeodetic::new(GridConfig::default().with_max_zoom(24));
        let mut previous = u32::MAX;
        let mut size = 1e-9;
        while size < 10.0 {
            let zoom = grid.zoom_for_pixel_size(size);
            assert!(zoom <= previous, "zoom rose to {zoom} at {size}");
            previous = zoom;
            size *= 1.1;
        }
        assert_eq!(previous, 0);
    }
}
