//! The task graph execution engine.
//!
//! One node at a time: capture, recognize (with retries), dispatch the
//! action, commit counters, then try successors on fresh frames until one
//! recognizes. Device input is strictly serialized on the calling thread.

use std::collections::BTreeMap;
use std::sync::{mpsc, Arc};

use tracing::{debug, error, info, warn};

use crate::counters::{CounterAdjustment, Counters};
use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result, RunFailure};
use crate::graph::TaskGraph;
use crate::options::{DeadEndPolicy, ExhaustedPolicy, Options};
use crate::platform::Controller;
use crate::recognizer::{Recognition, Recognize};
use crate::sleep::AbortHandle;
use crate::task::*;
use crate::types::*;

const SWIPE_DURATION_MS: u32 = 500;

/// How a run that did not fail came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// A node with the Stop action executed
    Stopped,
    /// A node with no successors executed
    Completed,
    /// No successor recognized and the dead-end policy is `stop`
    DeadEnd,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub last_node: String,
    /// Names of the nodes whose action was dispatched, in order
    pub trace: Vec<String>,
    pub counters: BTreeMap<String, u32>,
}

/// Progress notifications for observers such as the TUI.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    NodeEntered { node: String },
    Recognized { node: String, rect: Option<Rect>, text: Option<String> },
    ActionDispatched { node: String, action: Action },
    CountersCommitted { node: String, counters: Vec<(String, u32)> },
    Finished { outcome: std::result::Result<RunOutcome, String>, last_node: String },
}

pub struct Engine {
    graph: Arc<TaskGraph>,
    controller: Box<dyn Controller>,
    recognizer: Box<dyn Recognize>,
    options: Options,
    counters: Counters,
    abort: AbortHandle,
    events: Option<mpsc::Sender<EngineEvent>>,
    diagnostics: Option<Diagnostics>,
}

impl Engine {
    pub fn new(
        graph: Arc<TaskGraph>,
        controller: Box<dyn Controller>,
        recognizer: Box<dyn Recognize>,
        options: Options,
    ) -> Self {
        let counters = Counters::new(graph.len());
        Self {
            graph,
            controller,
            recognizer,
            options,
            counters,
            abort: AbortHandle::new(),
            events: None,
            diagnostics: None,
        }
    }

    pub fn with_events(mut self, tx: mpsc::Sender<EngineEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    pub fn with_abort(mut self, abort: AbortHandle) -> Self {
        self.abort = abort;
        self
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn connect(&mut self) -> Result<()> {
        self.controller.connect()
    }

    /// Reinitialize counters, exceed-latches and cached locations.
    pub fn reset(&mut self) {
        self.counters.reset();
        self.recognizer.reset();
    }

    /// Walk the graph from `entry` until a terminal state or failure.
    /// Counters start from zero for every run.
    pub fn run(&mut self, entry: &str) -> std::result::Result<RunReport, RunFailure> {
        self.reset();
        let mut trace = Vec::new();
        let mut last = entry.to_string();

        let result = match self.graph.require(entry) {
            Ok(start) => self.walk(start, &mut trace, &mut last),
            Err(e) => Err(e),
        };

        match result {
            Ok(outcome) => {
                info!(?outcome, last_node = %last, steps = trace.len(), "run finished");
                self.emit(EngineEvent::Finished { outcome: Ok(outcome), last_node: last.clone() });
                Ok(RunReport { outcome, last_node: last, trace, counters: self.counters.snapshot(&self.graph) })
            }
            Err(error) => {
                let counters = self.counters.snapshot(&self.graph);
                error!(%error, last_node = %last, ?counters, "run failed");
                // configuration errors are raised before the device is touched
                if !matches!(error, Error::Aborted | Error::InvalidConfiguration(_)) {
                    self.save_diagnostic(&format!("failed_{}", last));
                }
                self.emit(EngineEvent::Finished { outcome: Err(error.to_string()), last_node: last.clone() });
                Err(RunFailure { error, last_node: last, counters })
            }
        }
    }

    fn walk(&mut self, start: NodeId, trace: &mut Vec<String>, last: &mut String) -> Result<RunOutcome> {
        let graph = Arc::clone(&self.graph);
        let mut current = start;
        let mut in_hand: Option<Recognition> = None;

        loop {
            self.abort.check()?;
            let node = graph.node(current);
            *last = node.name.clone();
            self.emit(EngineEvent::NodeEntered { node: node.name.clone() });

            let hit = match in_hand.take() {
                Some(hit) => hit,
                None => match self.recognize_with_retry(current, node)? {
                    Some(hit) => hit,
                    None => {
                        warn!(node = %node.name, attempts = node.attempts(), "recognition exhausted");
                        return match self.options.exhausted_policy {
                            ExhaustedPolicy::Abort => {
                                Err(Error::RecognitionExhausted { node: node.name.clone(), attempts: node.attempts() })
                            }
                            ExhaustedPolicy::DeadEnd => self.dead_end(node),
                        };
                    }
                },
            };
            self.emit(EngineEvent::Recognized { node: node.name.clone(), rect: hit.rect, text: hit.text.clone() });

            let latched = self.counters.is_latched(current);
            if latched {
                debug!(node = %node.name, max_times = node.max_times, "exceeded, skipping action");
            } else {
                self.dispatch(node, &hit)?;
                let adjustments = self.counters.commit(&graph, current);
                self.emit_commit(node, &adjustments);
                trace.push(node.name.clone());
                if node.action == Action::Stop {
                    return Ok(RunOutcome::Stopped);
                }
            }

            let successors = if latched { &node.exceeded_next } else { &node.next };
            if successors.is_empty() {
                return Ok(RunOutcome::Completed);
            }

            match self.select_successor(successors)? {
                Some((next, hit)) => {
                    debug!(from = %node.name, to = %graph.name(next), "transition");
                    current = next;
                    in_hand = Some(hit);
                }
                None => return self.dead_end(node),
            }
        }
    }

    /// Up to `retry_times + 1` attempts, each against a fresh frame. A device
    /// failure counts as a failed attempt, but is returned as an error if the
    /// last attempt failed that way.
    fn recognize_with_retry(&mut self, id: NodeId, node: &TaskNode) -> Result<Option<Recognition>> {
        let attempts = node.attempts();
        for attempt in 1..=attempts {
            self.abort.check()?;
            match self.controller.screencap() {
                Ok(frame) => {
                    if let Some(hit) = self.recognizer.recognize(&frame, id, node)? {
                        debug!(node = %node.name, attempt, "recognized");
                        return Ok(Some(hit));
                    }
                    debug!(node = %node.name, attempt, attempts, "not recognized");
                }
                Err(e) if attempt == attempts => return Err(e),
                Err(e) => warn!(node = %node.name, attempt, error = %e, "screencap failed"),
            }
            if attempt < attempts {
                self.abort.sleep_ms(node.pre_delay.max(self.options.task_delay))?;
            }
        }
        Ok(None)
    }

    /// Try `candidates` in order on fresh frames; the first to recognize wins.
    /// A candidate takes part in at most `retry_times + 1` rounds, or in
    /// `successor_rounds` rounds when that override is set.
    fn select_successor(&mut self, candidates: &[NodeId]) -> Result<Option<(NodeId, Recognition)>> {
        let graph = Arc::clone(&self.graph);
        let budgets = successor_budgets(&graph, candidates, self.options.successor_rounds);
        let rounds = budgets.iter().copied().max().unwrap_or(0);
        let backoff = candidates
            .iter()
            .map(|&c| graph.node(c).pre_delay)
            .fold(self.options.task_delay, u64::max);

        for round in 1..=rounds {
            self.abort.check()?;
            match self.controller.screencap() {
                Ok(frame) => {
                    for (&cand, &budget) in candidates.iter().zip(&budgets) {
                        if round > budget {
                            continue;
                        }
                        if let Some(hit) = self.recognizer.recognize(&frame, cand, graph.node(cand))? {
                            debug!(node = %graph.name(cand), round, "successor recognized");
                            return Ok(Some((cand, hit)));
                        }
                    }
                }
                Err(e) if round == rounds => return Err(e),
                Err(e) => warn!(round, error = %e, "screencap failed while selecting a successor"),
            }
            if round < rounds {
                self.abort.sleep_ms(backoff)?;
            }
        }
        Ok(None)
    }

    fn dead_end(&mut self, node: &TaskNode) -> Result<RunOutcome> {
        match self.options.dead_end_policy {
            DeadEndPolicy::Abort => Err(Error::DeadEnd { node: node.name.clone() }),
            DeadEndPolicy::Stop => {
                warn!(node = %node.name, "dead end, stopping");
                Ok(RunOutcome::DeadEnd)
            }
        }
    }

    fn dispatch(&mut self, node: &TaskNode, hit: &Recognition) -> Result<()> {
        self.abort.sleep_ms(node.pre_delay)?;
        self.emit(EngineEvent::ActionDispatched { node: node.name.clone(), action: node.action });
        info!(node = %node.name, action = node.action.name(), "dispatch");

        let zoom = |r: Rect| node.center_zoom.map_or(r, |s| r.center_zoom(s));
        let located = || {
            hit.rect.map(zoom).ok_or_else(|| {
                Error::config(format!("task `{}`: {} without a located rect", node.name, node.action.name()))
            })
        };

        let touched = match node.action {
            Action::Click(ClickKind::SelfRect) => {
                let p = located()?.center();
                self.control(node, |c| c.click(p))?;
                true
            }
            Action::Click(ClickKind::Rect) => {
                let p = zoom(node.specific_area).center();
                self.control(node, |c| c.click(p))?;
                true
            }
            Action::Click(ClickKind::Rand) => {
                let p = located()?.rand_point(&mut rand::thread_rng());
                self.control(node, |c| c.click(p))?;
                true
            }
            Action::Swipe(dir) => {
                let (from, to) = swipe_endpoints(self.controller.resolution(), dir);
                self.control(node, |c| c.swipe(from, to, SWIPE_DURATION_MS))?;
                true
            }
            Action::PrintWindow => {
                self.abort.sleep_ms(self.options.print_window_delay)?;
                self.save_diagnostic(&node.name);
                false
            }
            Action::DoNothing | Action::Stop => false,
        };

        if touched {
            self.abort.sleep_between(self.options.control_delay_lower, self.options.control_delay_upper)?;
        }
        self.abort.sleep_ms(node.rear_delay)
    }

    /// Run one control call with the node's retry budget.
    fn control<F>(&mut self, node: &TaskNode, mut f: F) -> Result<()>
    where
        F: FnMut(&mut dyn Controller) -> Result<()>,
    {
        let attempts = node.attempts();
        for attempt in 1..=attempts {
            self.abort.check()?;
            match f(self.controller.as_mut()) {
                Ok(()) => return Ok(()),
                Err(e) if attempt == attempts => return Err(e),
                Err(e) => {
                    warn!(node = %node.name, attempt, error = %e, "control call failed");
                    self.abort.sleep_ms(node.pre_delay.max(self.options.task_delay))?;
                }
            }
        }
        Ok(())
    }

    fn save_diagnostic(&mut self, tag: &str) {
        let Some(diag) = &self.diagnostics else { return };
        if !self.options.print_window {
            return;
        }
        match self.controller.screencap() {
            Ok(frame) => {
                if let Err(e) = diag.save(&frame, tag) {
                    warn!(error = %e, "failed to save diagnostic frame");
                }
            }
            Err(e) => warn!(error = %e, "screencap for diagnostics failed"),
        }
    }

    fn emit(&self, event: EngineEvent) {
        if let Some(tx) = &self.events {
            tx.send(event).ok();
        }
    }

    fn emit_commit(&self, node: &TaskNode, adjustments: &[CounterAdjustment]) {
        for a in adjustments {
            debug!(node = %self.graph.name(a.node), before = a.before, after = a.after, "counter");
        }
        self.emit(EngineEvent::CountersCommitted {
            node: node.name.clone(),
            counters: adjustments.iter().map(|a| (self.graph.name(a.node).to_string(), a.after)).collect(),
        });
    }
}

/// Rounds each successor candidate may be tried for.
fn successor_budgets(graph: &TaskGraph, candidates: &[NodeId], rounds: Option<u32>) -> Vec<u32> {
    candidates
        .iter()
        .map(|&c| match rounds {
            Some(n) => n.max(1),
            None => graph.node(c).attempts(),
        })
        .collect()
}

/// Horizontal swipe across the middle 60% of the screen at half height.
/// `Left` moves the finger leftwards.
pub fn swipe_endpoints((w, h): (i32, i32), dir: SwipeDirection) -> (Point, Point) {
    let (l, r, y) = (w / 5, w * 4 / 5, h / 2);
    match dir {
        SwipeDirection::Left => (Point::new(r, y), Point::new(l, y)),
        SwipeDirection::Right => (Point::new(l, y), Point::new(r, y)),
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::test_support::*;

    fn engine(json: &str, rec: ScriptedRecognizer, ctrl: RecordingController, options: Options) -> Engine {
        let graph = Arc::new(TaskGraph::from_json(json).unwrap());
        Engine::new(graph, Box::new(ctrl), Box::new(rec), options)
    }

    #[test]
    fn retries_then_dispatches_once() {
        let rec = ScriptedRecognizer::new().script("A", &[false, false, true]);
        let calls = rec.calls();
        let ctrl = RecordingController::new(1280, 720);
        let ops = ctrl.ops();
        let mut e = engine(r#"{ "A": { "action": "ClickSelf", "retry_times": 2 } }"#, rec, ctrl, fast_options());

        let report = e.run("A").unwrap();
        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(count(&calls, "A"), 3);
        assert_eq!(actions(&ops), vec![Op::Click(Point::new(120, 110))]);
        assert_eq!(report.trace, vec!["A"]);
    }

    #[test]
    fn exceed_latch_switches_to_exceeded_next() {
        let json = r#"{
            "A": { "algorithm": "JustReturn", "max_times": 1, "next": ["B"], "exceeded_next": ["C"] },
            "B": { "algorithm": "JustReturn", "next": ["A"] },
            "C": { "algorithm": "JustReturn", "action": "Stop" }
        }"#;
        let rec = ScriptedRecognizer::new().always("A", true).always("B", true).always("C", true);
        let mut e = engine(json, rec, RecordingController::new(1280, 720), fast_options());

        let report = e.run("A").unwrap();
        assert_eq!(report.outcome, RunOutcome::Stopped);
        assert_eq!(report.trace, vec!["A", "B", "C"]);
        assert_eq!(report.counters["A"], 1);
        assert!(e.counters().is_latched(e.graph().id("A").unwrap()));
    }

    #[test]
    fn first_recognized_successor_wins() {
        let json = r#"{
            "A": { "algorithm": "JustReturn", "next": ["X", "Y", "Z"] },
            "X": { "action": "ClickSelf" },
            "Y": { "algorithm": "JustReturn", "action": "Stop" },
            "Z": { "algorithm": "JustReturn", "action": "Stop" }
        }"#;
        let rec = ScriptedRecognizer::new().always("A", true).always("Y", true).always("Z", true);
        let calls = rec.calls();
        let mut e = engine(json, rec, RecordingController::new(1280, 720), fast_options());

        let report = e.run("A").unwrap();
        assert_eq!(report.trace, vec!["A", "Y"]);
        assert_eq!(count(&calls, "X"), 1);
        assert_eq!(count(&calls, "Z"), 0);
        assert_eq!(report.counters["X"], 0);
    }

    #[test]
    fn reduce_other_times_floors_at_zero() {
        let json = r#"{
            "Potion": { "algorithm": "JustReturn", "reduce_other_times": ["Start"], "next": ["Start"] },
            "Start": { "algorithm": "JustReturn", "next": ["Use"] },
            "Use": { "algorithm": "JustReturn", "reduce_other_times": ["Start", "Potion"], "action": "Stop" }
        }"#;
        let rec = ScriptedRecognizer::new().always("Potion", true).always("Start", true).always("Use", true);
        let mut e = engine(json, rec, RecordingController::new(1280, 720), fast_options());

        let report = e.run("Potion").unwrap();
        assert_eq!(report.trace, vec!["Potion", "Start", "Use"]);
        assert_eq!(report.counters["Start"], 0);
        assert_eq!(report.counters["Potion"], 0);
        assert_eq!(report.counters["Use"], 1);
    }

    #[test]
    fn dead_end_aborts_by_default() {
        let json = r#"{
            "A": { "algorithm": "JustReturn", "next": ["B"] },
            "B": { "algorithm": "JustReturn" }
        }"#;
        let rec = ScriptedRecognizer::new().always("A", true);
        let calls = rec.calls();
        let mut e = engine(json, rec, RecordingController::new(1280, 720), fast_options());

        let failure = e.run("A").unwrap_err();
        assert!(matches!(failure.error, Error::DeadEnd { ref node } if node == "A"));
        assert_eq!(failure.last_node, "A");
        assert_eq!(failure.counters["A"], 1);
        assert_eq!(count(&calls, "B"), 1);
    }

    #[test]
    fn successor_without_retries_gets_one_look() {
        let json = r#"{
            "A": { "algorithm": "JustReturn", "next": ["B"] },
            "B": { "algorithm": "JustReturn", "retry_times": 0 }
        }"#;
        let rec = ScriptedRecognizer::new().always("A", true).script("B", &[false, true]);
        let calls = rec.calls();
        let mut e = engine(json, rec, RecordingController::new(1280, 720), fast_options());

        let failure = e.run("A").unwrap_err();
        assert!(matches!(failure.error, Error::DeadEnd { ref node } if node == "A"));
        assert_eq!(count(&calls, "B"), 1);
    }

    #[test]
    fn successor_retry_budget_is_its_own() {
        let json = r#"{
            "A": { "algorithm": "JustReturn", "next": ["B"] },
            "B": { "algorithm": "JustReturn", "retry_times": 5, "action": "Stop" }
        }"#;
        let misses = [false, false, false, false];

        let rec = ScriptedRecognizer::new().always("A", true).script("B", &misses).always("B", true);
        let calls = rec.calls();
        let mut e = engine(json, rec, RecordingController::new(1280, 720), fast_options());
        let report = e.run("A").unwrap();
        assert_eq!(report.trace, vec!["A", "B"]);
        assert_eq!(count(&calls, "B"), 5);

        let rec = ScriptedRecognizer::new().always("A", true).script("B", &misses).always("B", true);
        let calls = rec.calls();
        let options = Options { successor_rounds: Some(3), ..fast_options() };
        let mut e = engine(json, rec, RecordingController::new(1280, 720), options);
        assert!(matches!(e.run("A").unwrap_err().error, Error::DeadEnd { .. }));
        assert_eq!(count(&calls, "B"), 3);
    }

    #[test]
    fn exhausted_candidates_drop_out_of_later_rounds() {
        let json = r#"{
            "A": { "algorithm": "JustReturn", "next": ["X", "Y"] },
            "X": { "algorithm": "JustReturn", "action": "Stop" },
            "Y": { "algorithm": "JustReturn", "retry_times": 2, "action": "Stop" }
        }"#;
        let rec = ScriptedRecognizer::new()
            .always("A", true)
            .script("X", &[false])
            .always("X", true)
            .script("Y", &[false, false])
            .always("Y", true);
        let calls = rec.calls();
        let ctrl = RecordingController::new(1280, 720);
        let ops = ctrl.ops();
        let mut e = engine(json, rec, ctrl, fast_options());

        let report = e.run("A").unwrap();
        assert_eq!(report.trace, vec!["A", "Y"]);
        assert_eq!(count(&calls, "X"), 1);
        assert_eq!(count(&calls, "Y"), 3);
        let frames = ops.lock().unwrap().iter().filter(|op| matches!(op, Op::Screencap)).count();
        assert_eq!(frames, 4);
    }

    #[test]
    fn dead_end_can_stop_quietly() {
        let json = r#"{
            "A": { "algorithm": "JustReturn", "next": ["B"] },
            "B": { "algorithm": "JustReturn" }
        }"#;
        let rec = ScriptedRecognizer::new().always("A", true);
        let options = Options { dead_end_policy: DeadEndPolicy::Stop, ..fast_options() };
        let mut e = engine(json, rec, RecordingController::new(1280, 720), options);
        assert_eq!(e.run("A").unwrap().outcome, RunOutcome::DeadEnd);
    }

    #[test]
    fn exhausted_policy_decides_between_abort_and_dead_end() {
        let json = r#"{ "A": { "algorithm": "JustReturn", "retry_times": 1 } }"#;

        let options = Options { exhausted_policy: ExhaustedPolicy::Abort, ..fast_options() };
        let mut e = engine(json, ScriptedRecognizer::new(), RecordingController::new(1280, 720), options);
        let failure = e.run("A").unwrap_err();
        assert!(matches!(failure.error, Error::RecognitionExhausted { attempts: 2, .. }));

        let options = Options { dead_end_policy: DeadEndPolicy::Stop, ..fast_options() };
        let mut e = engine(json, ScriptedRecognizer::new(), RecordingController::new(1280, 720), options);
        assert_eq!(e.run("A").unwrap().outcome, RunOutcome::DeadEnd);
    }

    #[test]
    fn device_errors_use_the_retry_budget() {
        let json = r#"{ "A": { "algorithm": "JustReturn", "retry_times": 2 } }"#;
        let rec = ScriptedRecognizer::new().always("A", true);
        let ctrl = RecordingController::new(1280, 720).fail_screencaps(2);
        let mut e = engine(json, rec, ctrl, fast_options());
        assert_eq!(e.run("A").unwrap().outcome, RunOutcome::Completed);

        let rec = ScriptedRecognizer::new().always("A", true);
        let ctrl = RecordingController::new(1280, 720).fail_screencaps(3);
        let mut e = engine(json, rec, ctrl, fast_options());
        assert!(matches!(e.run("A").unwrap_err().error, Error::Device(_)));
    }

    #[test]
    fn failed_taps_are_retried_then_fatal() {
        let json = r#"{ "A": { "action": "ClickSelf", "retry_times": 1 } }"#;
        let rec = ScriptedRecognizer::new().always("A", true);
        let ctrl = RecordingController::new(1280, 720).fail_clicks(1);
        let ops = ctrl.ops();
        let mut e = engine(json, rec, ctrl, fast_options());
        e.run("A").unwrap();
        assert_eq!(actions(&ops).len(), 1);

        let rec = ScriptedRecognizer::new().always("A", true);
        let ctrl = RecordingController::new(1280, 720).fail_clicks(2);
        let mut e = engine(json, rec, ctrl, fast_options());
        let failure = e.run("A").unwrap_err();
        assert!(matches!(failure.error, Error::Device(_)));
        assert_eq!(failure.counters["A"], 0);
    }

    #[test]
    fn abort_keeps_last_committed_counters() {
        let json = r#"{
            "A": { "algorithm": "JustReturn", "next": ["B"] },
            "B": { "action": "ClickSelf", "rear_delay": 10000 }
        }"#;
        let rec = ScriptedRecognizer::new().always("A", true).always("B", true);
        let ctrl = RecordingController::new(1280, 720);
        let ops = ctrl.ops();
        let mut e = engine(json, rec, ctrl, fast_options());
        let abort = e.abort_handle();

        let t = thread::spawn(move || e.run("A"));
        thread::sleep(Duration::from_millis(200));
        abort.abort();
        let failure = t.join().unwrap().unwrap_err();

        assert!(matches!(failure.error, Error::Aborted));
        assert_eq!(failure.last_node, "B");
        assert_eq!(failure.counters["A"], 1);
        assert_eq!(failure.counters["B"], 0);
        assert_eq!(actions(&ops).len(), 1);
    }

    #[test]
    fn click_variants_hit_the_right_points() {
        let json = r#"{
            "Zoomed": { "action": "ClickSelf", "center_zoom": 0.5, "next": ["Area"] },
            "Area": { "algorithm": "JustReturn", "action": "ClickRect", "specific_area": [10, 20, 100, 50], "next": ["Rand"] },
            "Rand": { "action": "ClickRand", "next": ["Swipe"] },
            "Swipe": { "algorithm": "JustReturn", "action": "SwipeToTheLeft" }
        }"#;
        let rect = Rect::new(200, 300, 40, 20);
        let rec = ScriptedRecognizer::new()
            .always("Zoomed", true)
            .always("Area", true)
            .always("Rand", true)
            .always("Swipe", true)
            .with_rect("Zoomed", rect)
            .with_rect("Rand", rect);
        let ctrl = RecordingController::new(1000, 600);
        let ops = ctrl.ops();
        let mut e = engine(json, rec, ctrl, fast_options());
        e.run("Zoomed").unwrap();

        let done = actions(&ops);
        assert_eq!(done.len(), 4);
        assert_eq!(done[0], Op::Click(Point::new(220, 310)));
        assert_eq!(done[1], Op::Click(Point::new(60, 45)));
        match done[2] {
            Op::Click(p) => assert!(p.x > 200 && p.x < 239 && p.y > 300 && p.y < 319, "{:?}", p),
            other => panic!("expected click, got {:?}", other),
        }
        assert_eq!(done[3], Op::Swipe(Point::new(800, 300), Point::new(200, 300)));
    }

    #[test]
    fn each_run_starts_from_zero() {
        let json = r#"{ "A": { "algorithm": "JustReturn", "max_times": 1 } }"#;
        let rec = ScriptedRecognizer::new().always("A", true);
        let mut e = engine(json, rec, RecordingController::new(1280, 720), fast_options());
        assert_eq!(e.run("A").unwrap().trace, vec!["A"]);
        assert_eq!(e.run("A").unwrap().trace, vec!["A"]);
    }

    #[test]
    fn unknown_entry_fails_before_touching_the_device() {
        let ctrl = RecordingController::new(1280, 720);
        let ops = ctrl.ops();
        let mut e = engine(r#"{ "A": { "algorithm": "JustReturn" } }"#, ScriptedRecognizer::new(), ctrl, fast_options());
        assert!(matches!(e.run("Nope").unwrap_err().error, Error::InvalidConfiguration(_)));
        assert!(ops.lock().unwrap().is_empty());
    }

    #[test]
    fn unknown_entry_saves_no_diagnostic_frame() {
        let dir = tempfile::tempdir().unwrap();
        let ctrl = RecordingController::new(16, 16);
        let ops = ctrl.ops();
        let options = Options { print_window: true, ..fast_options() };
        let mut e = engine(r#"{ "A": { "algorithm": "JustReturn" } }"#, ScriptedRecognizer::new(), ctrl, options)
            .with_diagnostics(Diagnostics::new(dir.path(), 0));

        assert!(matches!(e.run("Nope").unwrap_err().error, Error::InvalidConfiguration(_)));
        assert!(ops.lock().unwrap().is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn events_follow_the_walk() {
        let (tx, rx) = mpsc::channel();
        let rec = ScriptedRecognizer::new().always("A", true);
        let mut e = engine(r#"{ "A": { "algorithm": "JustReturn", "action": "Stop" } }"#, rec, RecordingController::new(10, 10), fast_options())
            .with_events(tx);
        e.run("A").unwrap();
        drop(e);
        let events: Vec<EngineEvent> = rx.iter().collect();
        assert!(matches!(events.first(), Some(EngineEvent::NodeEntered { node }) if node == "A"));
        assert!(matches!(events.last(), Some(EngineEvent::Finished { outcome: Ok(RunOutcome::Stopped), .. })));
    }

    #[test]
    fn print_window_writes_a_frame() {
        let dir = tempfile::tempdir().unwrap();
        let rec = ScriptedRecognizer::new().always("Shot", true);
        let options = Options { print_window: true, ..fast_options() };
        let mut e = engine(r#"{ "Shot": { "algorithm": "JustReturn", "action": "PrintWindow" } }"#, rec, RecordingController::new(16, 16), options)
            .with_diagnostics(Diagnostics::new(dir.path(), 0));
        e.run("Shot").unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn swipe_endpoints_span_the_middle() {
        assert_eq!(
            swipe_endpoints((1280, 720), SwipeDirection::Right),
            (Point::new(256, 360), Point::new(1024, 360))
        );
    }
}
