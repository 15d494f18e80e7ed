//! Geometric value types: points, bounding boxes and affine geo-transforms.

pub mod projection;

/// A simple 2D point with x and y coordinates.
///
/// Geographic points store longitude in `x` and latitude in `y`.
///
/// # Example
///
/// ```rust
/// use rasterprep::Point;
///
/// let p = Point::lonlat(112.9, 28.2);
/// assert_eq!(p.lon(), 112.9);
///
/// let q: Point = (112.9, 28.2).into();
/// assert_eq!(p, q);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    /// X coordinate (longitude for geographic points)
    pub x: f64,
    /// Y coordinate (latitude for geographic points)
    pub y: f64,
}

impl Point {
    #[inline]
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Create a point from longitude and latitude (EPSG:4326).
    #[inline]
    #[must_use]
    pub fn lonlat(lon: f64, lat: f64) -> Self {
        Self { x: lon, y: lat }
    }

    #[inline]
    #[must_use]
    pub fn lon(&self) -> f64 {
        self.x
    }

    #[inline]
    #[must_use]
    pub fn lat(&self) -> f64 {
        self.y
    }

    #[inline]
    #[must_use]
    pub fn to_tuple(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

impl From<(f64, f64)> for Point {
    #[inline]
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

impl From<Point> for (f64, f64) {
    #[inline]
    fn from(p: Point) -> Self {
        (p.x, p.y)
    }
}

/// Axis-aligned rectangle, in geodetic degrees once a dataset is reprojected.
///
/// Constructors normalize the corners so `minx <= maxx` and `miny <= maxy`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub minx: f64,
    pub miny: f64,
    pub maxx: f64,
    pub maxy: f64,
}

impl BoundingBox {
    #[must_use]
    pub fn new(minx: f64, miny: f64, maxx: f64, maxy: f64) -> Self {
        Self {
            minx: minx.min(maxx),
            miny: miny.min(maxy),
            maxx: minx.max(maxx),
            maxy: miny.max(maxy),
        }
    }

    /// Smallest box containing all `points`. Returns `None` for an empty slice.
    #[must_use]
    pub fn enclosing(points: &[(f64, f64)]) -> Option<Self> {
        let (&(x0, y0), rest) = points.split_first()?;
        let mut bbox = Self { minx: x0, miny: y0, maxx: x0, maxy: y0 };
        for &(x, y) in rest {
            bbox.minx = bbox.minx.min(x);
            bbox.miny = bbox.miny.min(y);
            bbox.maxx = bbox.maxx.max(x);
            bbox.maxy = bbox.maxy.max(y);
        }
        Some(bbox)
    }

    #[must_use]
    pub fn center(&self) -> Point {
        Point::new((self.minx + self.maxx) / 2.0, (self.miny + self.maxy) / 2.0)
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.maxx - self.minx
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.maxy - self.miny
    }

    /// Inclusive containment test.
    #[must_use]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.minx && x <= self.maxx && y >= self.miny && y <= self.maxy
    }
}

/// Six affine coefficients mapping pixel (column, row) to world (x, y):
///
/// ```text
/// x = c[0] + col * c[1] + row * c[2]
/// y = c[3] + col * c[4] + row * c[5]
/// ```
///
/// In order: origin X, pixel width, row rotation, origin Y, column rotation,
/// pixel height (negative for north-up images).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform(pub [f64; 6]);

impl GeoTransform {
    /// The transform reported by rasters that carry no georeferencing.
    pub const IDENTITY: GeoTransform = GeoTransform([0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);

    /// North-up transform from the top-left corner and pixel sizes.
    #[must_use]
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self([origin_x, pixel_width, 0.0, origin_y, 0.0, -pixel_height.abs()])
    }

    /// Build from GeoTIFF `ModelPixelScale` + a single `ModelTiepoint`.
    ///
    /// The tiepoint maps raster point (i, j) to world (x, y).
    #[must_use]
    pub fn from_tiepoint(pixel_scale: [f64; 3], tiepoint: [f64; 6]) -> Self {
        let [i, j, _, x, y, _] = tiepoint;
        let origin_x = x - i * pixel_scale[0];
        let origin_y = y + j * pixel_scale[1];
        Self([origin_x, pixel_scale[0], 0.0, origin_y, 0.0, -pixel_scale[1]])
    }

    /// Build from a GeoTIFF `ModelTransformation` 4x4 matrix (row major).
    #[must_use]
    pub fn from_model_transformation(m: &[f64]) -> Option<Self> {
        if m.len() < 8 {
            return None;
        }
        Some(Self([m[3], m[0], m[1], m[7], m[4], m[5]]))
    }

    #[must_use]
    pub fn origin_x(&self) -> f64 {
        self.0[0]
    }

    #[must_use]
    pub fn pixel_width(&self) -> f64 {
        self.0[1]
    }

    #[must_use]
    pub fn origin_y(&self) -> f64 {
        self.0[3]
    }

    #[must_use]
    pub fn pixel_height(&self) -> f64 {
        self.0[5]
    }

    #[must_use]
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// True when both rotation terms are zero.
    #[must_use]
    pub fn is_north_up(&self) -> bool {
        self.0[2] == 0.0 && self.0[4] == 0.0
    }

    #[must_use]
    pub fn pixel_to_world(&self, col: f64, row: f64) -> (f64, f64) {
        let c = &self.0;
        (c[0] + col * c[1] + row * c[2], c[3] + col * c[4] + row * c[5])
    }

    /// Inverse transform (world -> pixel). `None` when the matrix is singular.
    #[must_use]
    pub fn invert(&self) -> Option<GeoTransform> {
        let c = &self.0;
        let det = c[1] * c[5] - c[2] * c[4];
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let inv_det = 1.0 / det;
        let a = c[5] * inv_det;
        let b = -c[2] * inv_det;
        let d = -c[4] * inv_det;
        let e = c[1] * inv_det;
        Some(GeoTransform([
            -(a * c[0] + b * c[3]),
            a,
            b,
            -(d * c[0] + e * c[3]),
            d,
            e,
        ]))
    }

    /// World extent of a `width` x `height` raster, from its four corners.
    #[must_use]
    pub fn bounds(&self, width: usize, height: usize) -> BoundingBox {
        let (w, h) = (width as f64, height as f64);
        let corners = [
            self.pixel_to_world(0.0, 0.0),
            self.pixel_to_world(w, 0.0),
            self.pixel_to_world(0.0, h),
            self.pixel_to_world(w, h),
        ];
        // Four corners are always present
        BoundingBox::enclosing(&corners).unwrap_or(BoundingBox::new(0.0, 0.0, 0.0, 0.0))
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_lonlat() {
        let p = Point::lonlat(-122.4, 37.8);
        assert_eq!(p.lon(), -122.4);
        assert_eq!(p.lat(), 37.8);
        let (x, y) = p.into();
        assert_eq!((x, y), (-122.4, 37.8));
    }

    #[test]
    fn test_bbox_normalizes_and_centers() {
        let b = BoundingBox::new(10.0, 5.0, -10.0, -5.0);
        assert_eq!(b.minx, -10.0);
        assert_eq!(b.maxy, 5.0);
        assert_eq!(b.center(), Point::new(0.0, 0.0));
        assert_eq!(b.width(), 20.0);
        assert!(b.contains(10.0, -5.0));
        assert!(!b.contains(10.1, 0.0));
    }

    #[test]
    fn test_geo_transform_from_tiepoint() {
        let gt = GeoTransform::from_tiepoint([10.0, 10.0, 0.0], [0.0, 0.0, 0.0, 100.0, 200.0, 0.0]);

        let (wx, wy) = gt.pixel_to_world(0.0, 0.0);
        assert!((wx - 100.0).abs() < 1e-9);
        assert!((wy - 200.0).abs() < 1e-9);

        let (wx, wy) = gt.pixel_to_world(10.0, 5.0);
        assert!((wx - 200.0).abs() < 1e-9);
        assert!((wy - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_geo_transform_invert_roundtrip() {
        let gt = GeoTransform([500.0, 2.0, 0.5, 900.0, 0.25, -3.0]);
        let inv = gt.invert().unwrap();
        let (wx, wy) = gt.pixel_to_world(17.0, 42.0);
        let (col, row) = inv.pixel_to_world(wx, wy);
        assert!((col - 17.0).abs() < 1e-9);
        assert!((row - 42.0).abs() < 1e-9);
    }

    #[test]
    fn test_singular_transform_has_no_inverse() {
        assert!(GeoTransform([0.0, 0.0, 0.0, 0.0, 0.0, 0.0]).invert().is_none());
    }

    #[test]
    fn test_bounds_north_up() {
        let gt = GeoTransform::north_up(110.0, 30.0, 0.01, 0.01);
        let b = gt.bounds(200, 100);
        assert!((b.minx - 110.0).abs() < 1e-9);
        assert!((b.maxx - 112.0).abs() < 1e-9);
        assert!((b.miny - 29.0).abs() < 1e-9);
        assert!((b.maxy - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_identity_detection() {
        assert!(GeoTransform::default().is_identity());
        assert!(!GeoTransform::north_up(0.0, 0.0, 1.0, 1.0).is_identity());
    }

    #[test]
    fn test_model_transformation() {
        let m = [
            2.0, 0.0, 0.0, 100.0, //
            0.0, -2.0, 0.0, 50.0, //
            0.0, 0.0, 0.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ];
        let gt = GeoTransform::from_model_transformation(&m).unwrap();
        assert_eq!(gt, GeoTransform([100.0, 2.0, 0.0, 50.0, 0.0, -2.0]));
    }
}
