//! Border-color nodata detection and color keying.
//!
//! The most frequent color on the image border is assumed to be background
//! fill. This is a heuristic: imagery whose real content touches the border
//! with a uniform color (sea, snow) gets that content keyed out too.

use ahash::AHashMap;
use image::{Rgba, RgbaImage};

/// Packed `0xAARRGGBB` color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color(pub u32);

impl Color {
    #[must_use]
    pub fn from_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self(u32::from(a) << 24 | u32::from(r) << 16 | u32::from(g) << 8 | u32::from(b))
    }

    #[must_use]
    pub fn from_pixel(pixel: &Rgba<u8>) -> Self {
        let [r, g, b, a] = pixel.0;
        Self::from_rgba(r, g, b, a)
    }

    /// RGB part without alpha
    #[must_use]
    pub fn rgb(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    #[must_use]
    pub fn alpha(&self) -> u8 {
        (self.0 >> 24) as u8
    }
}

/// Counts colors, remembering the order they were first seen in
#[derive(Default)]
struct ColorHistogram {
    index: AHashMap<Color, usize>,
    counts: Vec<(Color, usize)>,
}

impl ColorHistogram {
    fn add(&mut self, color: Color) {
        match self.index.get(&color) {
            Some(&i) => self.counts[i].1 += 1,
            None => {
                self.index.insert(color, self.counts.len());
                self.counts.push((color, 1));
            }
        }
    }

    /// Highest count, earliest color on ties
    fn most_frequent(&self) -> Option<Color> {
        let mut best: Option<(Color, usize)> = None;
        for &(color, count) in &self.counts {
            if best.is_none_or(|(_, c)| count > c) {
                best = Some((color, count));
            }
        }
        best.map(|(color, _)| color)
    }
}

/// Most frequent color on the 1-pixel border.
///
/// Strips are visited left column, top row, right column, bottom row, so
/// corner pixels are counted more than once. Returns `None` for an empty image.
#[must_use]
pub fn detect_border_color(image: &RgbaImage) -> Option<Color> {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return None;
    }

    let mut histogram = ColorHistogram::default();
    let mut add = |x: u32, y: u32| histogram.add(Color::from_pixel(image.get_pixel(x, y)));

    (0..h).for_each(|y| add(0, y));
    (0..w).for_each(|x| add(x, 0));
    (0..h).for_each(|y| add(w - 1, y));
    (0..w).for_each(|x| add(x, h - 1));

    histogram.most_frequent()
}

/// Make every pixel whose RGB equals `key` fully transparent.
///
/// Alpha is ignored when comparing. Returns the number of keyed pixels.
pub fn apply_color_key(image: &mut RgbaImage, key: Color) -> usize {
    let mut keyed = 0;
    for pixel in image.pixels_mut() {
        if Color::from_pixel(pixel).rgb() == key.rgb() {
            pixel.0[3] = 0;
            keyed += 1;
        }
    }
    keyed
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    fn framed(w: u32, h: u32, border: Rgba<u8>, inside: Rgba<u8>) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            if x == 0 || y == 0 || x == w - 1 || y == h - 1 { border } else { inside }
        })
    }

    #[test]
    fn test_color_packing() {
        let c = Color::from_rgba(0x12, 0x34, 0x56, 0x78);
        assert_eq!(c.0, 0x7812_3456);
        assert_eq!(c.rgb(), 0x12_3456);
        assert_eq!(c.alpha(), 0x78);
    }

    #[test]
    fn test_uniform_border_wins() {
        let img = framed(20, 10, BLACK, WHITE);
        assert_eq!(detect_border_color(&img), Some(Color::from_pixel(&BLACK)));
    }

    #[test]
    fn test_majority_border_color() {
        // Left column red, everything else on the border green
        let red = Rgba([255, 0, 0, 255]);
        let green = Rgba([0, 255, 0, 255]);
        let img = RgbaImage::from_fn(10, 10, |x, _| if x == 0 { red } else { green });
        assert_eq!(detect_border_color(&img), Some(Color::from_pixel(&green)));
    }

    #[test]
    fn test_tie_goes_to_first_seen() {
        // 1 x 2 image: the left column sees the top pixel first
        let img = RgbaImage::from_fn(1, 2, |_, y| if y == 0 { WHITE } else { BLACK });
        assert_eq!(detect_border_color(&img), Some(Color::from_pixel(&WHITE)));
    }

    #[test]
    fn test_empty_image() {
        assert_eq!(detect_border_color(&RgbaImage::new(0, 0)), None);
    }

    #[test]
    fn test_color_key_ignores_alpha() {
        let mut img = framed(4, 4, Rgba([0, 0, 0, 10]), WHITE);
        let keyed = apply_color_key(&mut img, Color::from_pixel(&BLACK));
        assert_eq!(keyed, 12);
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0, 0]);
        assert_eq!(img.get_pixel(1, 1).0, [255, 255, 255, 255]);
    }
}
