use std::fmt;
use std::ops::Mul;

use image::RgbaImage;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Screen coordinate in logical (frame) space
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle. Serialized as `[x, y, width, height]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl From<[i32; 4]> for Rect {
    fn from([x, y, width, height]: [i32; 4]) -> Self {
        Self { x, y, width, height }
    }
}

impl From<Rect> for [i32; 4] {
    fn from(r: Rect) -> Self {
        [r.x, r.y, r.width, r.height]
    }
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Bottom-right corner (exclusive), or None when it falls outside `i32`.
    pub fn far_corner(&self) -> Option<Point> {
        Some(Point::new(self.x.checked_add(self.width)?, self.y.checked_add(self.height)?))
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2, self.y + self.height / 2)
    }

    /// Grow or shrink width and height by `scale`, keeping the center fixed.
    pub fn center_zoom(&self, scale: f64) -> Rect {
        let width = (self.width as f64 * scale) as i32;
        let height = (self.height as f64 * scale) as i32;
        Rect {
            x: self.x + (self.width - width) / 2,
            y: self.y + (self.height - height) / 2,
            width,
            height,
        }
    }

    /// Uniformly sampled point strictly inside the rectangle. Degenerate
    /// rectangles (no interior pixel) fall back to the center.
    pub fn rand_point<R: Rng + ?Sized>(&self, rng: &mut R) -> Point {
        if self.width <= 2 || self.height <= 2 {
            return self.center();
        }
        Point::new(
            rng.gen_range(self.x + 1..self.x + self.width - 1),
            rng.gen_range(self.y + 1..self.y + self.height - 1),
        )
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.y >= self.y && p.x < self.x + self.width && p.y < self.y + self.height
    }

    /// Intersection with `other`; empty (zero-sized) when they do not overlap.
    pub fn intersect(&self, other: &Rect) -> Rect {
        let l = self.x.max(other.x);
        let t = self.y.max(other.y);
        let r = (self.x + self.width).min(other.x + other.width);
        let b = (self.y + self.height).min(other.y + other.height);
        if r <= l || b <= t {
            return Rect::new(l, t, 0, 0);
        }
        Rect::new(l, t, r - l, b - t)
    }
}

/// Scales width and height only; the origin is preserved.
impl Mul<f64> for Rect {
    type Output = Rect;

    fn mul(self, factor: f64) -> Rect {
        Rect {
            x: self.x,
            y: self.y,
            width: (self.width as f64 * factor) as i32,
            height: (self.height as f64 * factor) as i32,
        }
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}, {}]", self.x, self.y, self.width, self.height)
    }
}

/// Recognized text bound to the rectangle it was found in
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRect {
    pub text: String,
    pub rect: Rect,
}

impl TextRect {
    pub fn new(text: impl Into<String>, rect: Rect) -> Self {
        Self { text: text.into(), rect }
    }
}

impl From<TextRect> for String {
    fn from(t: TextRect) -> Self {
        t.text
    }
}

impl AsRef<str> for TextRect {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

/// One captured frame of the controlled device, in logical resolution (RGBA)
#[derive(Debug, Clone)]
pub struct Capture {
    pub image: RgbaImage,
}

impl Capture {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn blank(width: u32, height: u32) -> Self {
        Self { image: RgbaImage::new(width, height) }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width() as i32, self.height() as i32)
    }

    /// Copy out the part of the frame covered by `rect`, clipped to the frame.
    /// Returns `None` if nothing of `rect` lies inside the frame.
    pub fn crop(&self, rect: Rect) -> Option<RgbaImage> {
        let r = rect.intersect(&self.bounds());
        if r.is_empty() {
            return None;
        }
        Some(
            image::imageops::crop_imm(&self.image, r.x as u32, r.y as u32, r.width as u32, r.height as u32)
                .to_image(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_zoom_identity() {
        let r = Rect::new(10, 20, 100, 50);
        assert_eq!(r.center_zoom(1.0), r);
    }

    #[test]
    fn center_zoom_keeps_center() {
        let r = Rect::new(10, 20, 101, 57);
        for s in [0.1, 0.5, 0.8, 1.3, 2.0, 3.7] {
            let z = r.center_zoom(s);
            let (c, zc) = (r.center(), z.center());
            assert!((c.x - zc.x).abs() <= 1, "scale {s}: {c:?} vs {zc:?}");
            assert!((c.y - zc.y).abs() <= 1, "scale {s}: {c:?} vs {zc:?}");
            assert!(z.width >= 0 && z.height >= 0);
        }
    }

    #[test]
    fn mul_preserves_origin() {
        let r = Rect::new(5, 6, 10, 20) * 1.5;
        assert_eq!(r, Rect::new(5, 6, 15, 30));
    }

    #[test]
    fn rand_point_strictly_inside() {
        let r = Rect::new(100, 200, 40, 10);
        let mut rng = rand::thread_rng();
        for _ in 0..500 {
            let p = r.rand_point(&mut rng);
            assert!(p.x > r.x && p.x < r.x + r.width - 1);
            assert!(p.y > r.y && p.y < r.y + r.height - 1);
        }
    }

    #[test]
    fn rect_serde_as_array() {
        let r: Rect = serde_json::from_str("[1, 2, 3, 4]").unwrap();
        assert_eq!(r, Rect::new(1, 2, 3, 4));
        assert_eq!(serde_json::to_string(&r).unwrap(), "[1,2,3,4]");
    }

    #[test]
    fn crop_clips_to_frame() {
        let cap = Capture::blank(100, 50);
        let part = cap.crop(Rect::new(90, 40, 20, 20)).unwrap();
        assert_eq!((part.width(), part.height()), (10, 10));
        assert!(cap.crop(Rect::new(200, 200, 5, 5)).is_none());
    }
}
