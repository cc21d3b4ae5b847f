use std::time::Duration;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// One-time initialization failed. On-demand querying is unusable until
    /// reload.
    #[error("query engine failed to initialize: {0}")]
    InitFailed(String),
    /// Called before initialization completed. Transient.
    #[error("query engine not ready (waited {waited:?})")]
    NotReady { waited: Duration },
    /// The per-country data file could not be fetched.
    #[error("boundary data {data_ref} unreachable: {reason}")]
    ResourceUnreachable { data_ref: String, reason: String },
    #[error("query failed: {0}")]
    QueryFailed(String),
    /// A single result row carried an unusable geometry. Never fatal to the
    /// batch; logged and the row dropped.
    #[error("row {index}: invalid geometry: {reason}")]
    GeometryParse { index: usize, reason: String },
}

impl EngineError {
    /// Whether re-issuing the same action may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::NotReady { .. } | EngineError::ResourceUnreachable { .. }
        )
    }
}
