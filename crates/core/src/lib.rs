pub mod counters;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod graph;
pub mod infrast;
pub mod logger;
pub mod options;
pub mod platform;
pub mod recognizer;
pub mod recruit;
pub mod settings;
pub mod sleep;
pub mod task;
pub mod types;
pub mod vision;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use engine::{Engine, EngineEvent, RunOutcome, RunReport};
pub use error::{Error, Result, RunFailure};
pub use graph::TaskGraph;
pub use options::Options;
pub use sleep::AbortHandle;
