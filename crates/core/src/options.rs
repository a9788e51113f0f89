use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// What to do when a node runs out of recognition attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustedPolicy {
    /// Fail the run with `RecognitionExhausted`.
    Abort,
    /// Hand the node to the dead-end policy.
    #[default]
    DeadEnd,
}

/// What to do when no successor of a node recognizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadEndPolicy {
    /// Fail the run with `DeadEnd`.
    #[default]
    Abort,
    /// End the run as if the node had a Stop action.
    Stop,
}

/// Process-wide tunables, loaded once before a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    pub identify_cache: bool,
    /// ms between successor selection rounds
    pub task_delay: u64,
    pub control_delay_lower: u64,
    pub control_delay_upper: u64,
    pub print_window: bool,
    pub print_window_delay: u64,
    pub print_window_crop_offset: u32,
    /// -1 selects the CPU
    pub ocr_gpu_index: i32,
    pub ocr_thread_number: u32,
    pub exhausted_policy: ExhaustedPolicy,
    pub dead_end_policy: DeadEndPolicy,
    /// Try every successor for exactly this many rounds instead of its
    /// own `retry_times + 1`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub successor_rounds: Option<u32>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            identify_cache: true,
            task_delay: 1000,
            control_delay_lower: 150,
            control_delay_upper: 300,
            print_window: false,
            print_window_delay: 1000,
            print_window_crop_offset: 0,
            ocr_gpu_index: -1,
            ocr_thread_number: 4,
            exhausted_policy: ExhaustedPolicy::default(),
            dead_end_policy: DeadEndPolicy::default(),
            successor_rounds: None,
        }
    }
}

impl Options {
    /// Load from a JSON file. A missing file yields the defaults; a present but
    /// malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            tracing::info!(path = %path.display(), "no options file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let options: Options = serde_json::from_str(&text)?;
        options.validate()?;
        Ok(options)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.control_delay_lower > self.control_delay_upper {
            return Err(Error::config(format!(
                "control_delay_lower ({}) exceeds control_delay_upper ({})",
                self.control_delay_lower, self.control_delay_upper
            )));
        }
        if self.ocr_thread_number == 0 {
            return Err(Error::config("ocr_thread_number must be at least 1"));
        }
        if self.successor_rounds == Some(0) {
            return Err(Error::config("successor_rounds must be at least 1 when set"));
        }
        if self.ocr_gpu_index < -1 {
            return Err(Error::config(format!("invalid ocr_gpu_index {}", self.ocr_gpu_index)));
        }
        Ok(())
    }
}
