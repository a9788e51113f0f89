use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Selections remembered between launches. Command-line flags win.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub profile: Option<String>,
    pub entry: Option<String>,
}

impl Settings {
    /// Missing or unreadable settings fall back to empty ones.
    pub fn load(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, path: &Path) {
        let written = serde_json::to_string_pretty(self)
            .map_err(|e| e.to_string())
            .and_then(|json| std::fs::write(path, json).map_err(|e| e.to_string()));
        if let Err(e) = written {
            warn!(path = %path.display(), error = %e, "failed to save settings");
        }
    }

    /// `flag` if given, else the remembered value, else `fallback`.
    pub fn pick(flag: Option<String>, remembered: &Option<String>, fallback: &str) -> String {
        flag.or_else(|| remembered.clone()).unwrap_or_else(|| fallback.to_string())
    }
}
