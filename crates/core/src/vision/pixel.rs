use std::sync::atomic::{AtomicBool, Ordering};

use image::imageops::{self, FilterType};
use image::{GrayImage, RgbaImage};
use tracing::{info, warn};

use crate::options::Options;
use crate::types::{Rect, TextRect};
use super::{OcrEngine, TemplateMatch, Vision};

/// Coarse pass runs at 1/COARSE scale when the template stays at least
/// MIN_COARSE_SIDE pixels on each side.
const COARSE: u32 = 4;
const MIN_COARSE_SIDE: u32 = 8;

/// Pure-pixel implementation: grayscale normalized cross-correlation for
/// template search and 256-bin histogram correlation.
pub struct PixelVision {
    ocr: Box<dyn OcrEngine>,
}

impl PixelVision {
    pub fn new(options: &Options) -> Self {
        Self { ocr: Box::new(NullOcr::new(options.ocr_gpu_index, options.ocr_thread_number)) }
    }

    pub fn with_ocr(ocr: Box<dyn OcrEngine>) -> Self {
        Self { ocr }
    }

    /// Whether OcrDetect nodes can ever recognize with this backend.
    pub fn ocr_available(&self) -> bool {
        self.ocr.is_available()
    }
}

impl Vision for PixelVision {
    fn match_template(&self, image: &RgbaImage, templ: &RgbaImage) -> Option<TemplateMatch> {
        let img = imageops::grayscale(image);
        let t = imageops::grayscale(templ);
        let (tw, th) = t.dimensions();
        if tw == 0 || th == 0 || tw > img.width() || th > img.height() {
            return None;
        }

        let (x, y, score) = if tw / COARSE >= MIN_COARSE_SIDE && th / COARSE >= MIN_COARSE_SIDE {
            let small_img = imageops::resize(&img, img.width() / COARSE, img.height() / COARSE, FilterType::Triangle);
            let small_t = imageops::resize(&t, tw / COARSE, th / COARSE, FilterType::Triangle);
            let (cx, cy, _) = search(&small_img, &small_t, full_window(&small_img, &small_t))?;
            let reach = COARSE * 2;
            let window = Window {
                x0: (cx * COARSE).saturating_sub(reach),
                y0: (cy * COARSE).saturating_sub(reach),
                x1: (cx * COARSE + reach).min(img.width() - tw),
                y1: (cy * COARSE + reach).min(img.height() - th),
            };
            search(&img, &t, window)?
        } else {
            search(&img, &t, full_window(&img, &t))?
        };

        Some(TemplateMatch { rect: Rect::new(x as i32, y as i32, tw as i32, th as i32), score })
    }

    fn compare_hist(&self, image: &RgbaImage, templ: &RgbaImage) -> f64 {
        correlation(&histogram(&imageops::grayscale(image)), &histogram(&imageops::grayscale(templ)))
    }

    fn ocr(&self, image: &RgbaImage) -> Vec<TextRect> {
        self.ocr.recognize(image)
    }
}

/// Recognizes nothing. Stands in until a real OCR backend is plugged in.
pub struct NullOcr {
    warned: AtomicBool,
}

impl NullOcr {
    pub fn new(gpu_index: i32, threads: u32) -> Self {
        let device = if gpu_index < 0 { "cpu".to_string() } else { format!("gpu:{}", gpu_index) };
        info!(device = %device, threads, "ocr backend: none");
        Self { warned: AtomicBool::new(false) }
    }
}

impl OcrEngine for NullOcr {
    fn recognize(&self, _image: &RgbaImage) -> Vec<TextRect> {
        if !self.warned.swap(true, Ordering::Relaxed) {
            warn!("no OCR backend configured, OcrDetect nodes will never match");
        }
        Vec::new()
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// Inclusive range of top-left positions to score.
struct Window {
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
}

fn full_window(img: &GrayImage, t: &GrayImage) -> Window {
    Window { x0: 0, y0: 0, x1: img.width() - t.width(), y1: img.height() - t.height() }
}

fn search(img: &GrayImage, t: &GrayImage, w: Window) -> Option<(u32, u32, f64)> {
    let n = (t.width() * t.height()) as f64;
    let t_mean = t.pixels().map(|p| p.0[0] as f64).sum::<f64>() / n;
    let t_dev: Vec<f64> = t.pixels().map(|p| p.0[0] as f64 - t_mean).collect();
    let t_norm = t_dev.iter().map(|d| d * d).sum::<f64>().sqrt();

    let mut best: Option<(u32, u32, f64)> = None;
    for y in w.y0..=w.y1 {
        for x in w.x0..=w.x1 {
            let score = ncc_at(img, t, &t_dev, t_norm, x, y);
            if best.map_or(true, |(_, _, s)| score > s) {
                best = Some((x, y, score));
            }
        }
    }
    best
}

fn ncc_at(img: &GrayImage, t: &GrayImage, t_dev: &[f64], t_norm: f64, x: u32, y: u32) -> f64 {
    let (tw, th) = t.dimensions();
    let n = (tw * th) as f64;
    let mut sum = 0.0;
    for ty in 0..th {
        for tx in 0..tw {
            sum += img.get_pixel(x + tx, y + ty).0[0] as f64;
        }
    }
    let mean = sum / n;

    let mut num = 0.0;
    let mut var = 0.0;
    for ty in 0..th {
        for tx in 0..tw {
            let d = img.get_pixel(x + tx, y + ty).0[0] as f64 - mean;
            num += d * t_dev[(ty * tw + tx) as usize];
            var += d * d;
        }
    }
    let den = var.sqrt() * t_norm;
    if den == 0.0 {
        // Flat patch against flat template: equal iff the means agree.
        let t_mean = t.pixels().map(|p| p.0[0] as f64).sum::<f64>() / n;
        return if var == 0.0 && t_norm == 0.0 && (mean - t_mean).abs() < 1.0 { 1.0 } else { 0.0 };
    }
    num / den
}

fn histogram(img: &GrayImage) -> [f64; 256] {
    let mut h = [0.0; 256];
    for p in img.pixels() {
        h[p.0[0] as usize] += 1.0;
    }
    let total = (img.width() * img.height()).max(1) as f64;
    for v in h.iter_mut() {
        *v /= total;
    }
    h
}

fn correlation(a: &[f64; 256], b: &[f64; 256]) -> f64 {
    let ma = a.iter().sum::<f64>() / 256.0;
    let mb = b.iter().sum::<f64>() / 256.0;
    let (mut num, mut da, mut db) = (0.0, 0.0, 0.0);
    for i in 0..256 {
        let (x, y) = (a[i] - ma, b[i] - mb);
        num += x * y;
        da += x * x;
        db += y * y;
    }
    if da == 0.0 || db == 0.0 {
        return if a == b { 1.0 } else { 0.0 };
    }
    (num / (da * db).sqrt()).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn gradient_frame(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            let v = ((x * 7 + y * 13) ^ (x * y)) as u8;
            Rgba([v, v.wrapping_mul(3), v.wrapping_add(40), 255])
        })
    }

    fn vision() -> PixelVision {
        PixelVision::with_ocr(Box::new(NullOcr::new(-1, 1)))
    }

    #[test]
    fn default_ocr_backend_reads_nothing() {
        let vision = PixelVision::new(&Options::default());
        assert!(!vision.ocr_available());
        assert!(vision.ocr(&gradient_frame(40, 20)).is_empty());
    }

    #[test]
    fn finds_small_template_exactly() {
        let frame = gradient_frame(80, 60);
        let templ = imageops::crop_imm(&frame, 23, 17, 12, 9).to_image();
        let m = vision().match_template(&frame, &templ).unwrap();
        assert_eq!(m.rect, Rect::new(23, 17, 12, 9));
        assert!(m.score > 0.99);
    }

    #[test]
    fn finds_large_template_through_coarse_pass() {
        let frame = gradient_frame(320, 180);
        let templ = imageops::crop_imm(&frame, 120, 64, 48, 40).to_image();
        let m = vision().match_template(&frame, &templ).unwrap();
        assert_eq!(m.rect, Rect::new(120, 64, 48, 40));
        assert!(m.score > 0.99);
    }

    #[test]
    fn oversized_template_does_not_match() {
        let frame = gradient_frame(10, 10);
        let templ = gradient_frame(20, 5);
        assert!(vision().match_template(&frame, &templ).is_none());
    }

    #[test]
    fn hist_identical_is_one() {
        let a = gradient_frame(30, 30);
        assert!((vision().compare_hist(&a, &a) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn hist_distinct_is_low() {
        let black = RgbaImage::from_pixel(20, 20, Rgba([0, 0, 0, 255]));
        let white = RgbaImage::from_pixel(20, 20, Rgba([255, 255, 255, 255]));
        assert!(vision().compare_hist(&black, &white) < 0.1);
    }
}
