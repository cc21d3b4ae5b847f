use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use query::{AggregationQuery, GroupKey};
use runtime::{ReadinessPolicy, poll_until_ready};
use streaming::BoxFuture;
use tokio::sync::OnceCell;
use tracing::{error, info};

use crate::error::EngineError;

/// One aggregated result row as returned by an engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub key: GroupKey,
    /// Dissolved geometry as WKB; `None` when the engine produced `NULL`.
    pub geometry: Option<Vec<u8>>,
}

/// Embedded analytical engine able to dissolve boundary rows.
///
/// Implementations must be `Send + Sync`; methods return boxed futures for
/// dyn-compatibility.
pub trait QueryEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Loads extensions and prepares the engine. Called at most once
    /// successfully, through [`EngineHandle::initialize`].
    fn init(&self) -> BoxFuture<'_, Result<(), EngineError>>;

    fn is_ready(&self) -> bool;

    fn is_registered(&self, data_ref: &str) -> bool;

    /// Makes a fetched resource queryable under `data_ref`. Returns the
    /// number of raw rows loaded.
    fn register(&self, data_ref: &str, bytes: Vec<u8>) -> BoxFuture<'_, Result<usize, EngineError>>;

    fn execute<'a>(
        &'a self,
        query: &'a AggregationQuery,
    ) -> BoxFuture<'a, Result<Vec<ResultRow>, EngineError>>;

    /// Drops a registered resource. Returns whether it was resident.
    fn unregister(&self, data_ref: &str) -> bool;
}

/// Shared, lazily-initialized engine singleton.
///
/// Initialization is one-time and mutually exclusive: concurrent callers of
/// [`initialize`](Self::initialize) await the same attempt. A failed attempt
/// leaves the handle uninitialized so an explicit retry can run it again;
/// until then its error is kept and reported by [`wait_ready`](Self::wait_ready).
pub struct EngineHandle {
    engine: Arc<dyn QueryEngine>,
    initialized: OnceCell<()>,
    last_error: Mutex<Option<EngineError>>,
}

impl EngineHandle {
    pub fn new(engine: Arc<dyn QueryEngine>) -> Self {
        Self {
            engine,
            initialized: OnceCell::new(),
            last_error: Mutex::new(None),
        }
    }

    pub fn engine(&self) -> &dyn QueryEngine {
        self.engine.as_ref()
    }

    pub async fn initialize(&self) -> Result<(), EngineError> {
        self.initialized
            .get_or_try_init(|| async {
                info!(engine = self.engine.name(), "initializing query engine");
                *self.last_error.lock() = None;
                self.engine.init().await.map_err(|e| {
                    error!(engine = self.engine.name(), "engine init failed: {e}");
                    let e = match e {
                        EngineError::InitFailed(msg) => EngineError::InitFailed(msg),
                        other => EngineError::InitFailed(other.to_string()),
                    };
                    *self.last_error.lock() = Some(e.clone());
                    e
                })
            })
            .await
            .map(|_| ())
    }

    pub fn is_ready(&self) -> bool {
        self.initialized.initialized() && self.engine.is_ready()
    }

    /// The error of the last init attempt, when it failed and no retry is
    /// running.
    pub fn init_error(&self) -> Option<EngineError> {
        self.last_error.lock().clone()
    }

    /// Ready, or the reason it never will be without a retry.
    pub fn check_ready(&self) -> Result<(), EngineError> {
        if self.is_ready() {
            return Ok(());
        }
        Err(self
            .init_error()
            .unwrap_or(EngineError::NotReady { waited: Duration::ZERO }))
    }

    /// Waits, bounded by `policy`, for initialization to complete elsewhere.
    ///
    /// Returns [`EngineError::InitFailed`] as soon as an attempt has failed
    /// instead of waiting out the policy.
    pub async fn wait_ready(&self, policy: ReadinessPolicy) -> Result<(), EngineError> {
        poll_until_ready(policy, || self.is_ready() || self.init_error().is_some())
            .await
            .map_err(|t| EngineError::NotReady { waited: t.waited })?;
        self.check_ready()
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("engine", &self.engine.name())
            .field("ready", &self.is_ready())
            .finish()
    }
}
