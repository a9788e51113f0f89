//! Recruitment data handed to and returned from the combination solver.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecruitCandidate {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub level: u8,
    #[serde(default)]
    pub sex: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub name_en: String,
}

impl RecruitCandidate {
    pub fn has_tags<'a>(&self, tags: impl IntoIterator<Item = &'a str>) -> bool {
        tags.into_iter().all(|t| self.tags.contains(t))
    }
}

/// One tag combination's operator pool with derived level statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecruitCombination {
    pub opers: Vec<RecruitCandidate>,
    pub max_level: u8,
    pub min_level: u8,
    pub avg_level: f64,
}

impl RecruitCombination {
    pub fn new(opers: Vec<RecruitCandidate>) -> Self {
        let max_level = opers.iter().map(|o| o.level).max().unwrap_or(0);
        let min_level = opers.iter().map(|o| o.level).min().unwrap_or(0);
        let avg_level = if opers.is_empty() {
            0.0
        } else {
            opers.iter().map(|o| o.level as f64).sum::<f64>() / opers.len() as f64
        };
        Self { opers, max_level, min_level, avg_level }
    }
}

/// Best first: highest guaranteed level, then highest average.
pub fn rank_recruit(combs: &mut [RecruitCombination]) {
    combs.sort_by(|a, b| b.min_level.cmp(&a.min_level).then(b.avg_level.total_cmp(&a.avg_level)));
}

/// Reference list of recruitable operators.
#[derive(Debug, Clone, Default)]
pub struct RecruitCatalog {
    candidates: Vec<RecruitCandidate>,
}

impl RecruitCatalog {
    pub fn new(candidates: Vec<RecruitCandidate>) -> Self {
        Self { candidates }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let candidates = serde_json::from_str(text).map_err(|e| Error::config(format!("recruit catalog: {}", e)))?;
        Ok(Self { candidates })
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Candidates that are not hidden and carry every one of `tags`.
    pub fn matching(&self, tags: &[&str]) -> Vec<&RecruitCandidate> {
        self.candidates
            .iter()
            .filter(|c| !c.hidden && c.has_tags(tags.iter().copied()))
            .collect()
    }
}
