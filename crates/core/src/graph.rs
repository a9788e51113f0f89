//! Task graph: arena of nodes plus the JSON definition loader.
//!
//! Definitions are a JSON object keyed by node name. Every name reference is
//! resolved to a [`NodeId`] here, once, and every malformed definition is
//! rejected here so a run never meets one.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::{Error, Result};
use crate::task::*;
use crate::types::Rect;

const DEFAULT_TEMPL_THRESHOLD: f64 = 0.8;
const DEFAULT_HIST_THRESHOLD: f64 = 0.9;

/// Action as written in a definition: a name or the raw bit value.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawAction {
    Name(String),
    Bits(u32),
}

impl Default for RawAction {
    fn default() -> Self {
        RawAction::Name("DoNothing".into())
    }
}

/// One node as written in `tasks.json`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TaskDef {
    pub algorithm: Option<String>,
    pub action: RawAction,
    pub next: Vec<String>,
    pub exceeded_next: Vec<String>,
    pub reduce_other_times: Vec<String>,
    pub max_times: Option<u32>,
    pub specific_area: Option<Rect>,
    pub pre_delay: u64,
    pub rear_delay: u64,
    pub retry_times: u32,
    pub roi: Option<Rect>,
    pub center_zoom: Option<f64>,
    pub template: Option<String>,
    pub templ_threshold: Option<f64>,
    pub hist_threshold: Option<f64>,
    pub cache: Option<bool>,
    pub text: Vec<String>,
    pub need_match: bool,
    pub replace_map: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct TaskGraph {
    nodes: Vec<TaskNode>,
    index: HashMap<String, NodeId>,
}

impl TaskGraph {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let graph = Self::from_json(&text)?;
        info!(path = %path.display(), nodes = graph.len(), "task graph loaded");
        Ok(graph)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let defs: BTreeMap<String, TaskDef> =
            serde_json::from_str(text).map_err(|e| Error::config(format!("task definitions: {}", e)))?;
        Self::from_defs(defs)
    }

    pub fn from_defs(defs: BTreeMap<String, TaskDef>) -> Result<Self> {
        let index: HashMap<String, NodeId> =
            defs.keys().enumerate().map(|(i, name)| (name.clone(), NodeId(i))).collect();

        let mut nodes = Vec::with_capacity(defs.len());
        for (name, def) in &defs {
            nodes.push(build_node(name, def, &index)?);
        }
        Ok(Self { nodes, index })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn id(&self, name: &str) -> Option<NodeId> {
        self.index.get(name).copied()
    }

    /// Like [`TaskGraph::id`] but an unknown name is a configuration error.
    pub fn require(&self, name: &str) -> Result<NodeId> {
        self.id(name).ok_or_else(|| Error::config(format!("no task named `{}`", name)))
    }

    pub fn node(&self, id: NodeId) -> &TaskNode {
        &self.nodes[id.0]
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.nodes[id.0].name
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &TaskNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Distinct template file names referenced by image-based nodes.
    pub fn templates(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .nodes
            .iter()
            .filter_map(|n| match &n.algorithm {
                Algorithm::MatchTemplate(p) | Algorithm::CompareHist(p) => Some(p.template.as_str()),
                _ => None,
            })
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Names of the nodes recognized through OCR.
    pub fn ocr_nodes(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|n| matches!(n.algorithm, Algorithm::OcrDetect(_)))
            .map(|n| n.name.as_str())
            .collect()
    }
}

fn build_node(name: &str, def: &TaskDef, index: &HashMap<String, NodeId>) -> Result<TaskNode> {
    let bad = |msg: String| Error::config(format!("task `{}`: {}", name, msg));

    if name.is_empty() {
        return Err(Error::config("task with empty name"));
    }

    let action = match &def.action {
        RawAction::Name(n) => Action::from_name(n),
        RawAction::Bits(b) => Action::from_bits(*b),
    }
    .map_err(|e| in_task(name, e))?;

    let algorithm = build_algorithm(name, def).map_err(|e| in_task(name, e))?;

    if action.needs_located_rect() && !algorithm.locates() {
        return Err(bad(format!("{} needs a located rect but {} locates nothing", action.name(), algorithm.name())));
    }
    if action == Action::Click(ClickKind::Rect) && def.specific_area.map_or(true, |r| r.is_empty()) {
        return Err(bad("ClickRect needs a non-empty specific_area".into()));
    }
    if let Some(area) = def.specific_area {
        if area.far_corner().is_none() {
            return Err(bad(format!("specific_area {} overflows the coordinate range", area)));
        }
    }
    if let Some(z) = def.center_zoom {
        if !(z > 0.0) {
            return Err(bad(format!("center_zoom must be positive, got {}", z)));
        }
    }
    if def.max_times == Some(0) {
        return Err(bad("max_times must be at least 1".into()));
    }
    if let Some(roi) = def.roi {
        if roi.is_empty() || roi.x < 0 || roi.y < 0 || roi.far_corner().is_none() {
            return Err(bad(format!("invalid roi {}", roi)));
        }
    }

    let resolve = |field: &str, names: &[String]| -> Result<Vec<NodeId>> {
        names
            .iter()
            .map(|n| index.get(n).copied().ok_or_else(|| bad(format!("{} references unknown task `{}`", field, n))))
            .collect()
    };
    let reduce_other_times = resolve("reduce_other_times", &def.reduce_other_times)?;
    if def.reduce_other_times.iter().any(|n| n == name) {
        return Err(bad("reduce_other_times references itself".into()));
    }

    Ok(TaskNode {
        name: name.to_string(),
        algorithm,
        action,
        next: resolve("next", &def.next)?,
        exceeded_next: resolve("exceeded_next", &def.exceeded_next)?,
        reduce_other_times,
        max_times: def.max_times.unwrap_or(u32::MAX),
        specific_area: def.specific_area.unwrap_or_default(),
        pre_delay: def.pre_delay,
        rear_delay: def.rear_delay,
        retry_times: def.retry_times,
        roi: def.roi,
        center_zoom: def.center_zoom,
    })
}

/// Prefix a configuration error with the task it came from.
fn in_task(name: &str, e: Error) -> Error {
    match e {
        Error::InvalidConfiguration(msg) => Error::config(format!("task `{}`: {}", name, msg)),
        other => other,
    }
}

fn build_algorithm(name: &str, def: &TaskDef) -> Result<Algorithm> {
    let kind = def.algorithm.as_deref().unwrap_or("MatchTemplate");
    let has_match_fields =
        def.template.is_some() || def.templ_threshold.is_some() || def.hist_threshold.is_some() || def.cache.is_some();
    let has_ocr_fields = !def.text.is_empty() || def.need_match || !def.replace_map.is_empty();

    let match_params = || -> Result<MatchParams> {
        let params = MatchParams {
            template: def.template.clone().unwrap_or_else(|| format!("{}.png", name)),
            templ_threshold: def.templ_threshold.unwrap_or(DEFAULT_TEMPL_THRESHOLD),
            hist_threshold: def.hist_threshold.unwrap_or(DEFAULT_HIST_THRESHOLD),
            cache: def.cache.unwrap_or(true),
        };
        for (field, v) in [("templ_threshold", params.templ_threshold), ("hist_threshold", params.hist_threshold)] {
            if !(0.0..=1.0).contains(&v) {
                return Err(Error::config(format!("{} {} outside [0, 1]", field, v)));
            }
        }
        Ok(params)
    };

    let algorithm = match kind {
        "JustReturn" => Algorithm::JustReturn,
        "MatchTemplate" => Algorithm::MatchTemplate(match_params()?),
        "CompareHist" => Algorithm::CompareHist(match_params()?),
        "OcrDetect" => {
            if def.text.is_empty() {
                return Err(Error::config("OcrDetect needs at least one text candidate"));
            }
            Algorithm::OcrDetect(OcrParams {
                text: def.text.clone(),
                need_match: def.need_match,
                replace_map: def.replace_map.clone(),
            })
        }
        other => return Err(Error::config(format!("unknown algorithm `{}`", other))),
    };

    match &algorithm {
        Algorithm::MatchTemplate(_) | Algorithm::CompareHist(_) if has_ocr_fields => {
            Err(Error::config("text/need_match/replace_map only apply to OcrDetect"))
        }
        Algorithm::OcrDetect(_) | Algorithm::JustReturn if has_match_fields => {
            Err(Error::config("template/thresholds/cache only apply to MatchTemplate and CompareHist"))
        }
        Algorithm::JustReturn if has_ocr_fields => {
            Err(Error::config("text/need_match/replace_map only apply to OcrDetect"))
        }
        _ => Ok(algorithm),
    }
}
