//! Low-level image algorithms behind one seam.
//!
//! The task engine never calls these directly; [`crate::recognizer`] turns a
//! node's parameters into calls on a [`Vision`] implementation.

pub mod pixel;
pub mod templates;

use image::RgbaImage;

use crate::types::{Rect, TextRect};

pub use pixel::{NullOcr, PixelVision};
pub use templates::TemplateStore;

/// Best template location within the searched image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplateMatch {
    /// Relative to the searched image
    pub rect: Rect,
    pub score: f64,
}

pub trait Vision: Send {
    /// Best-scoring location of `templ` inside `image`, or `None` if the
    /// template does not fit.
    fn match_template(&self, image: &RgbaImage, templ: &RgbaImage) -> Option<TemplateMatch>;

    /// Histogram similarity in `[-1, 1]`, 1 meaning identical distributions.
    fn compare_hist(&self, image: &RgbaImage, templ: &RgbaImage) -> f64;

    /// Text fragments found in `image`, rects relative to it.
    fn ocr(&self, image: &RgbaImage) -> Vec<TextRect>;
}

/// Pluggable text extractor used by [`PixelVision`].
pub trait OcrEngine: Send {
    fn recognize(&self, image: &RgbaImage) -> Vec<TextRect>;

    /// False for stand-ins that can never return text.
    fn is_available(&self) -> bool {
        true
    }
}
