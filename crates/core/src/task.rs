//! Task node model: one recognize-then-act step of the task graph.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};
use crate::types::Rect;

/// Arena index of a node inside its [`crate::graph::TaskGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Parameters shared by the two image-based algorithms.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchParams {
    pub template: String,
    pub templ_threshold: f64,
    pub hist_threshold: f64,
    /// Trust a previous match location, re-validated by histogram only
    pub cache: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OcrParams {
    /// Candidates; any one matching is enough
    pub text: Vec<String>,
    /// Exact equality instead of substring containment
    pub need_match: bool,
    /// Rewrites applied to raw OCR output before matching, in key order
    pub replace_map: BTreeMap<String, String>,
}

impl OcrParams {
    /// Apply `replace_map` to one raw OCR string.
    pub fn normalize(&self, raw: &str) -> String {
        let mut out = raw.to_string();
        for (from, to) in &self.replace_map {
            if !from.is_empty() {
                out = out.replace(from.as_str(), to);
            }
        }
        out
    }

    /// Whether `text` (already normalized) satisfies `candidate`.
    pub fn accepts(&self, candidate: &str, text: &str) -> bool {
        if self.need_match {
            text == candidate
        } else {
            text.contains(candidate)
        }
    }
}

/// Recognition algorithm of a node, carrying only its own parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Algorithm {
    JustReturn,
    MatchTemplate(MatchParams),
    CompareHist(MatchParams),
    OcrDetect(OcrParams),
}

impl Algorithm {
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::JustReturn => "JustReturn",
            Algorithm::MatchTemplate(_) => "MatchTemplate",
            Algorithm::CompareHist(_) => "CompareHist",
            Algorithm::OcrDetect(_) => "OcrDetect",
        }
    }

    /// Whether a successful recognition yields a rectangle to act on.
    pub fn locates(&self) -> bool {
        !matches!(self, Algorithm::JustReturn)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickKind {
    /// Centroid of the recognized rect
    SelfRect,
    /// Centroid of the node's `specific_area`
    Rect,
    /// Random point strictly inside the recognized rect
    Rand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeDirection {
    Left,
    Right,
}

/// What a node does once recognized.
///
/// Clicks and swipes are families with a sub-variant; the raw bit values
/// accepted in definitions are `BASIC_CLICK | {1,2,4}` and `BASIC_SWIPE | {1,2}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Click(ClickKind),
    DoNothing,
    Stop,
    PrintWindow,
    Swipe(SwipeDirection),
}

impl Action {
    pub const BASIC_CLICK: u32 = 0x100;
    pub const DO_NOTHING: u32 = 0x200;
    pub const STOP: u32 = 0x400;
    pub const PRINT_WINDOW: u32 = 0x800;
    pub const BASIC_SWIPE: u32 = 0x1000;

    pub fn from_bits(bits: u32) -> Result<Action> {
        Ok(match bits {
            0x101 => Action::Click(ClickKind::SelfRect),
            0x102 => Action::Click(ClickKind::Rect),
            0x104 => Action::Click(ClickKind::Rand),
            Self::DO_NOTHING => Action::DoNothing,
            Self::STOP => Action::Stop,
            Self::PRINT_WINDOW => Action::PrintWindow,
            0x1001 => Action::Swipe(SwipeDirection::Left),
            0x1002 => Action::Swipe(SwipeDirection::Right),
            other => return Err(Error::config(format!("invalid action bits {:#x}", other))),
        })
    }

    pub fn bits(self) -> u32 {
        match self {
            Action::Click(ClickKind::SelfRect) => Self::BASIC_CLICK | 1,
            Action::Click(ClickKind::Rect) => Self::BASIC_CLICK | 2,
            Action::Click(ClickKind::Rand) => Self::BASIC_CLICK | 4,
            Action::DoNothing => Self::DO_NOTHING,
            Action::Stop => Self::STOP,
            Action::PrintWindow => Self::PRINT_WINDOW,
            Action::Swipe(SwipeDirection::Left) => Self::BASIC_SWIPE | 1,
            Action::Swipe(SwipeDirection::Right) => Self::BASIC_SWIPE | 2,
        }
    }

    pub fn from_name(name: &str) -> Result<Action> {
        Ok(match name {
            "ClickSelf" => Action::Click(ClickKind::SelfRect),
            "ClickRect" => Action::Click(ClickKind::Rect),
            "ClickRand" => Action::Click(ClickKind::Rand),
            "DoNothing" => Action::DoNothing,
            "Stop" => Action::Stop,
            "PrintWindow" => Action::PrintWindow,
            "SwipeToTheLeft" => Action::Swipe(SwipeDirection::Left),
            "SwipeToTheRight" => Action::Swipe(SwipeDirection::Right),
            other => return Err(Error::config(format!("unknown action `{}`", other))),
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Action::Click(ClickKind::SelfRect) => "ClickSelf",
            Action::Click(ClickKind::Rect) => "ClickRect",
            Action::Click(ClickKind::Rand) => "ClickRand",
            Action::DoNothing => "DoNothing",
            Action::Stop => "Stop",
            Action::PrintWindow => "PrintWindow",
            Action::Swipe(SwipeDirection::Left) => "SwipeToTheLeft",
            Action::Swipe(SwipeDirection::Right) => "SwipeToTheRight",
        }
    }

    /// Whether dispatch needs the rect produced by recognition.
    pub fn needs_located_rect(self) -> bool {
        matches!(self, Action::Click(ClickKind::SelfRect) | Action::Click(ClickKind::Rand))
    }
}

/// One node of the task graph, with successor names resolved to arena ids.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskNode {
    pub name: String,
    pub algorithm: Algorithm,
    pub action: Action,
    pub next: Vec<NodeId>,
    pub exceeded_next: Vec<NodeId>,
    pub reduce_other_times: Vec<NodeId>,
    /// Executions before the exceed-latch closes; `u32::MAX` is unlimited
    pub max_times: u32,
    pub specific_area: Rect,
    pub pre_delay: u64,
    pub rear_delay: u64,
    pub retry_times: u32,
    /// Search region; the whole frame when absent
    pub roi: Option<Rect>,
    /// Zoom applied to the recognized rect before clicking
    pub center_zoom: Option<f64>,
}

impl TaskNode {
    /// A node with every optional field at its default.
    pub fn new(name: impl Into<String>, algorithm: Algorithm, action: Action) -> Self {
        Self {
            name: name.into(),
            algorithm,
            action,
            next: Vec::new(),
            exceeded_next: Vec::new(),
            reduce_other_times: Vec::new(),
            max_times: u32::MAX,
            specific_area: Rect::default(),
            pre_delay: 0,
            rear_delay: 0,
            retry_times: 0,
            roi: None,
            center_zoom: None,
        }
    }

    /// Total recognition attempts allowed when entering this node.
    pub fn attempts(&self) -> u32 {
        self.retry_times.saturating_add(1)
    }
}
