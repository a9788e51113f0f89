//! Data-driven engine scenarios: a task graph, scripted recognition per node
//! and the expected result of one run, all in a single JSON file.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{mpsc, Arc};

use serde::Deserialize;
use serde_json::{Map, Value};

use meo_core::test_support::{actions, fast_options, Op, RecordingController, ScriptedRecognizer};
use meo_core::types::Rect;
use meo_core::{Engine, EngineEvent, Error, Options, RunOutcome, TaskGraph};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(default)]
    pub description: String,
    /// Option overrides on top of the zero-delay test options
    #[serde(default)]
    pub options: Map<String, Value>,
    pub tasks: Value,
    pub entry: String,
    #[serde(default)]
    pub recognition: BTreeMap<String, NodeScript>,
    #[serde(default = "default_screen")]
    pub screen: (i32, i32),
    #[serde(default)]
    pub fail_screencaps: u32,
    pub expect: Expect,
}

fn default_screen() -> (i32, i32) {
    (1280, 720)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeScript {
    /// Outcomes consumed one per recognition call
    pub script: Vec<bool>,
    /// Outcome after the script runs out
    pub always: bool,
    pub rect: Option<Rect>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Expect {
    pub outcome: Outcome,
    /// Nodes whose counters were committed, in order
    #[serde(default)]
    pub trace: Option<Vec<String>>,
    /// Checked for the listed nodes only
    #[serde(default)]
    pub counters: BTreeMap<String, u32>,
    #[serde(default)]
    pub taps: Option<Vec<(i32, i32)>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Stopped,
    Completed,
    DeadEnd,
    Failed(FailureKind),
}

impl From<RunOutcome> for Outcome {
    fn from(o: RunOutcome) -> Self {
        match o {
            RunOutcome::Stopped => Outcome::Stopped,
            RunOutcome::Completed => Outcome::Completed,
            RunOutcome::DeadEnd => Outcome::DeadEnd,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InvalidConfiguration,
    RecognitionExhausted,
    DeadEnd,
    Device,
    Aborted,
    Other,
}

impl FailureKind {
    fn of(e: &Error) -> Self {
        match e {
            Error::InvalidConfiguration(_) => FailureKind::InvalidConfiguration,
            Error::RecognitionExhausted { .. } => FailureKind::RecognitionExhausted,
            Error::DeadEnd { .. } => FailureKind::DeadEnd,
            Error::Device(_) => FailureKind::Device,
            Error::Aborted => FailureKind::Aborted,
            _ => FailureKind::Other,
        }
    }
}

/// What one run actually did.
#[derive(Debug, Default)]
struct Observed {
    outcome: Option<Outcome>,
    trace: Vec<String>,
    counters: BTreeMap<String, u32>,
    taps: Vec<(i32, i32)>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;
        serde_json::from_str(&text).map_err(|e| format!("{}: {}", path.display(), e))
    }

    pub fn options(&self) -> Result<Options, String> {
        let mut base = serde_json::to_value(fast_options()).map_err(|e| e.to_string())?;
        if let Value::Object(map) = &mut base {
            map.extend(self.options.clone());
        }
        serde_json::from_value(base).map_err(|e| format!("options: {}", e))
    }

    fn recognizer(&self) -> ScriptedRecognizer {
        self.recognition.iter().fold(ScriptedRecognizer::new(), |rec, (node, s)| {
            let rec = rec.script(node, &s.script).always(node, s.always);
            match s.rect {
                Some(r) => rec.with_rect(node, r),
                None => rec,
            }
        })
    }

    fn observe(&self) -> Result<Observed, String> {
        let options = self.options()?;
        let graph = match TaskGraph::from_json(&self.tasks.to_string()) {
            Ok(g) => g,
            Err(e) => return Ok(Observed { outcome: Some(Outcome::Failed(FailureKind::of(&e))), ..Observed::default() }),
        };

        let ctrl = RecordingController::new(self.screen.0, self.screen.1).fail_screencaps(self.fail_screencaps);
        let ops = ctrl.ops();
        let (tx, rx) = mpsc::channel();
        let mut engine = Engine::new(Arc::new(graph), Box::new(ctrl), Box::new(self.recognizer()), options).with_events(tx);

        let (outcome, counters) = match engine.run(&self.entry) {
            Ok(report) => (Outcome::from(report.outcome), report.counters),
            Err(failure) => (Outcome::Failed(FailureKind::of(&failure.error)), failure.counters),
        };
        drop(engine);

        let trace = rx
            .iter()
            .filter_map(|ev| match ev {
                EngineEvent::CountersCommitted { node, .. } => Some(node),
                _ => None,
            })
            .collect();
        let taps = actions(&ops)
            .into_iter()
            .filter_map(|op| match op {
                Op::Click(p) => Some((p.x, p.y)),
                _ => None,
            })
            .collect();
        Ok(Observed { outcome: Some(outcome), trace, counters, taps })
    }

    /// Run once and compare against `expect`. Every mismatch is reported.
    pub fn run(&self) -> Result<(), String> {
        let seen = self.observe()?;
        let mut problems = Vec::new();

        if seen.outcome != Some(self.expect.outcome) {
            problems.push(format!("outcome: expected {:?}, got {:?}", self.expect.outcome, seen.outcome));
        }
        if let Some(trace) = &self.expect.trace {
            if *trace != seen.trace {
                problems.push(format!("trace: expected {:?}, got {:?}", trace, seen.trace));
            }
        }
        for (node, want) in &self.expect.counters {
            let got = seen.counters.get(node);
            if got != Some(want) {
                problems.push(format!("counter {}: expected {}, got {:?}", node, want, got));
            }
        }
        if let Some(taps) = &self.expect.taps {
            if *taps != seen.taps {
                problems.push(format!("taps: expected {:?}, got {:?}", taps, seen.taps));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems.join("\n"))
        }
    }
}
