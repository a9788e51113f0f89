//! Infrastructure roster data exchanged with the facility optimizer.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// An operator as recognized on the roster screen. Identity is the name
/// alone, so the same operator at a different elite or level collapses to
/// one key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorSnapshot {
    pub name: String,
    #[serde(default)]
    pub elite: u8,
    #[serde(default)]
    pub level: u8,
}

impl OperatorSnapshot {
    pub fn new(name: impl Into<String>, elite: u8, level: u8) -> Self {
        Self { name: name.into(), elite, level }
    }
}

impl PartialEq for OperatorSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for OperatorSnapshot {}

impl Hash for OperatorSnapshot {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfrastCombination {
    pub comb: Vec<OperatorSnapshot>,
    pub efficiency: i32,
}

/// Most efficient staffing first.
pub fn rank_infrast(combs: &mut [InfrastCombination]) {
    combs.sort_by(|a, b| b.efficiency.cmp(&a.efficiency));
}
