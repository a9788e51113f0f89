//! Recognition strategies: one uniform call over the four algorithms.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::error::Result;
use crate::task::*;
use crate::types::*;
use crate::vision::{TemplateStore, Vision};

/// Successful recognition of one node against one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recognition {
    /// Where the node was found; `None` for JustReturn
    pub rect: Option<Rect>,
    /// Resolved text, OcrDetect only
    pub text: Option<String>,
    pub score: Option<f64>,
}

/// `recognize(frame, node) -> located result | not found`.
///
/// `Ok(None)` is the recoverable "not found"; `Err` is reserved for failures
/// of the machinery itself.
pub trait Recognize: Send {
    fn recognize(&mut self, frame: &Capture, id: NodeId, node: &TaskNode) -> Result<Option<Recognition>>;

    /// Forget any per-run state such as cached locations.
    fn reset(&mut self) {}
}

/// The production strategy set over a [`Vision`] backend.
pub struct Recognizer {
    vision: Box<dyn Vision>,
    templates: TemplateStore,
    /// Process-wide switch; a node's own `cache` flag must also be set
    identify_cache: bool,
    cached: HashMap<NodeId, Rect>,
}

impl Recognizer {
    pub fn new(vision: Box<dyn Vision>, templates: TemplateStore, identify_cache: bool) -> Self {
        Self { vision, templates, identify_cache, cached: HashMap::new() }
    }

    pub fn templates_mut(&mut self) -> &mut TemplateStore {
        &mut self.templates
    }

    pub fn cached_location(&self, id: NodeId) -> Option<Rect> {
        self.cached.get(&id).copied()
    }

    fn match_template(&mut self, frame: &Capture, id: NodeId, roi: Rect, p: &MatchParams) -> Result<Option<Recognition>> {
        let use_cache = self.identify_cache && p.cache;
        let templ = self.templates.get(&p.template)?;

        if use_cache {
            if let Some(rect) = self.cached.get(&id).copied() {
                if let Some(patch) = frame.crop(rect) {
                    let score = self.vision.compare_hist(&patch, templ);
                    trace!(node = %id, score, "cached location check");
                    if score >= p.hist_threshold {
                        return Ok(Some(Recognition { rect: Some(rect), text: None, score: Some(score) }));
                    }
                }
            }
        }

        let Some(area) = frame.crop(roi) else { return Ok(None) };
        let Some(m) = self.vision.match_template(&area, templ) else { return Ok(None) };
        debug!(node = %id, template = %p.template, score = m.score, threshold = p.templ_threshold, "template search");
        if m.score < p.templ_threshold {
            return Ok(None);
        }
        let clipped = roi.intersect(&frame.bounds());
        let rect = Rect::new(clipped.x + m.rect.x, clipped.y + m.rect.y, m.rect.width, m.rect.height);
        if use_cache {
            self.cached.insert(id, rect);
        }
        Ok(Some(Recognition { rect: Some(rect), text: None, score: Some(m.score) }))
    }

    fn compare_hist(&mut self, frame: &Capture, roi: Rect, p: &MatchParams) -> Result<Option<Recognition>> {
        let templ = self.templates.get(&p.template)?;
        let Some(area) = frame.crop(roi) else { return Ok(None) };
        let score = self.vision.compare_hist(&area, templ);
        if score < p.hist_threshold {
            return Ok(None);
        }
        Ok(Some(Recognition { rect: Some(roi.intersect(&frame.bounds())), text: None, score: Some(score) }))
    }

    fn ocr(&mut self, frame: &Capture, roi: Rect, p: &OcrParams) -> Result<Option<Recognition>> {
        let Some(area) = frame.crop(roi) else { return Ok(None) };
        let origin = roi.intersect(&frame.bounds());
        let results: Vec<TextRect> = self
            .vision
            .ocr(&area)
            .into_iter()
            .map(|t| TextRect::new(t.text, Rect::new(origin.x + t.rect.x, origin.y + t.rect.y, t.rect.width, t.rect.height)))
            .collect();
        Ok(match_text(&results, p).map(|t| Recognition { rect: Some(t.rect), text: Some(t.text), score: None }))
    }
}

impl Recognize for Recognizer {
    fn recognize(&mut self, frame: &Capture, id: NodeId, node: &TaskNode) -> Result<Option<Recognition>> {
        let roi = node.roi.unwrap_or_else(|| frame.bounds());
        match &node.algorithm {
            Algorithm::JustReturn => Ok(Some(Recognition::default())),
            Algorithm::MatchTemplate(p) => self.match_template(frame, id, roi, p),
            Algorithm::CompareHist(p) => self.compare_hist(frame, roi, p),
            Algorithm::OcrDetect(p) => self.ocr(frame, roi, p),
        }
    }

    fn reset(&mut self) {
        self.cached.clear();
    }
}

/// First OCR fragment accepted by a candidate, trying candidates in order.
/// The returned text is the normalized (rewritten) OCR output.
pub fn match_text(results: &[TextRect], params: &OcrParams) -> Option<TextRect> {
    let normalized: Vec<TextRect> =
        results.iter().map(|t| TextRect::new(params.normalize(&t.text), t.rect)).collect();
    for candidate in &params.text {
        if let Some(hit) = normalized.iter().find(|t| params.accepts(candidate, &t.text)) {
            return Some(hit.clone());
        }
    }
    None
}
