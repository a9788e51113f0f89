//! Test doubles for driving the engine without a device or real vision.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::options::Options;
use crate::platform::Controller;
use crate::recognizer::{Recognition, Recognize};
use crate::task::{NodeId, TaskNode};
use crate::types::*;

/// Options with every delay at zero.
pub fn fast_options() -> Options {
    Options {
        task_delay: 0,
        control_delay_lower: 0,
        control_delay_upper: 0,
        print_window_delay: 0,
        ..Options::default()
    }
}

#[derive(Debug, Clone)]
struct Script {
    queued: VecDeque<bool>,
    then: bool,
    rect: Rect,
}

impl Default for Script {
    fn default() -> Self {
        Self { queued: VecDeque::new(), then: false, rect: Rect::new(100, 100, 40, 20) }
    }
}

/// Recognition driven by per-node outcome scripts instead of pixels.
///
/// Each node answers from its queue first, then with its steady outcome
/// (not found unless set). Every call is logged by node name.
#[derive(Debug, Default)]
pub struct ScriptedRecognizer {
    scripts: HashMap<String, Script>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue outcomes for `node`, consumed one per recognition call.
    pub fn script(mut self, node: &str, outcomes: &[bool]) -> Self {
        self.scripts.entry(node.to_string()).or_default().queued.extend(outcomes.iter().copied());
        self
    }

    /// Outcome once the queue for `node` is drained.
    pub fn always(mut self, node: &str, found: bool) -> Self {
        self.scripts.entry(node.to_string()).or_default().then = found;
        self
    }

    pub fn with_rect(mut self, node: &str, rect: Rect) -> Self {
        self.scripts.entry(node.to_string()).or_default().rect = rect;
        self
    }

    /// Shared log of recognized node names, readable after the recognizer
    /// has been moved into an engine.
    pub fn calls(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.calls)
    }
}

impl Recognize for ScriptedRecognizer {
    fn recognize(&mut self, _frame: &Capture, _id: NodeId, node: &TaskNode) -> Result<Option<Recognition>> {
        self.calls.lock().unwrap().push(node.name.clone());
        let script = self.scripts.entry(node.name.clone()).or_default();
        let found = script.queued.pop_front().unwrap_or(script.then);
        if !found {
            return Ok(None);
        }
        let rect = node.algorithm.locates().then_some(script.rect);
        Ok(Some(Recognition { rect, text: None, score: Some(1.0) }))
    }
}

/// Device operation observed by [`RecordingController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Screencap,
    Click(Point),
    Swipe(Point, Point),
}

/// Records every call; can fail a number of leading screencaps or clicks.
#[derive(Debug)]
pub struct RecordingController {
    width: i32,
    height: i32,
    ops: Arc<Mutex<Vec<Op>>>,
    failing_screencaps: u32,
    failing_clicks: u32,
}

impl RecordingController {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height, ops: Arc::default(), failing_screencaps: 0, failing_clicks: 0 }
    }

    pub fn fail_screencaps(mut self, n: u32) -> Self {
        self.failing_screencaps = n;
        self
    }

    pub fn fail_clicks(mut self, n: u32) -> Self {
        self.failing_clicks = n;
        self
    }

    pub fn ops(&self) -> Arc<Mutex<Vec<Op>>> {
        Arc::clone(&self.ops)
    }
}

impl Controller for RecordingController {
    fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    fn resolution(&self) -> (i32, i32) {
        (self.width, self.height)
    }

    fn screencap(&mut self) -> Result<Capture> {
        self.ops.lock().unwrap().push(Op::Screencap);
        if self.failing_screencaps > 0 {
            self.failing_screencaps -= 1;
            return Err(Error::device("screencap unavailable"));
        }
        Ok(Capture::blank(self.width as u32, self.height as u32))
    }

    fn click(&mut self, p: Point) -> Result<()> {
        if self.failing_clicks > 0 {
            self.failing_clicks -= 1;
            return Err(Error::device("tap rejected"));
        }
        self.ops.lock().unwrap().push(Op::Click(p));
        Ok(())
    }

    fn swipe(&mut self, from: Point, to: Point, _duration_ms: u32) -> Result<()> {
        self.ops.lock().unwrap().push(Op::Swipe(from, to));
        Ok(())
    }
}

/// Count how many times `name` appears in a call log.
pub fn count(calls: &Arc<Mutex<Vec<String>>>, name: &str) -> usize {
    calls.lock().unwrap().iter().filter(|c| *c == name).count()
}

/// Dispatched device operations, without screencaps.
pub fn actions(ops: &Arc<Mutex<Vec<Op>>>) -> Vec<Op> {
    ops.lock().unwrap().iter().copied().filter(|op| *op != Op::Screencap).collect()
}
