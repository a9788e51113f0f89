use std::collections::BTreeMap;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading a task graph or driving a run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed definition; only produced at load time.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Recognition failed on every attempt of a node.
    #[error("recognition exhausted on node {node} after {attempts} attempt(s)")]
    RecognitionExhausted { node: String, attempts: u32 },

    /// None of the node's successors recognized.
    #[error("dead end at node {node}: no successor recognized")]
    DeadEnd { node: String },

    /// Capture or control call against the device failed.
    #[error("device error: {0}")]
    Device(String),

    /// Run cancelled by the external abort signal.
    #[error("run aborted")]
    Aborted,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Error::InvalidConfiguration(msg.into())
    }

    pub fn device(msg: impl Into<String>) -> Self {
        Error::Device(msg.into())
    }
}

/// A run that ended in an error, with the state needed to analyse or resume it.
#[derive(Debug, thiserror::Error)]
#[error("{error} (last node: {last_node})")]
pub struct RunFailure {
    #[source]
    pub error: Error,
    pub last_node: String,
    /// `exec_times` of every node at the time of failure
    pub counters: BTreeMap<String, u32>,
}
