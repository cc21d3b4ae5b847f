//! Resource sources for catalog and per-country boundary files.
//!
//! A resource is addressed by a relative key (`countries.json`,
//! `Wakanda.parquet`, ...). Implementations:
//! - Filesystem (keys resolved under a root directory)
//! - Remote HTTP (keys appended to a base URL)
//! - In-memory (tests and embedded fixtures)

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use tracing::debug;

/// Type alias for a boxed future that can be sent between threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("resource not found: {key}")]
    NotFound { key: String },
    #[error("invalid resource key: {key}")]
    InvalidKey { key: String },
    #[error("failed to read {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP request for {key} failed: {message}")]
    Http { key: String, message: String },
}

impl SourceError {
    pub fn key(&self) -> &str {
        match self {
            SourceError::NotFound { key }
            | SourceError::InvalidKey { key }
            | SourceError::Io { key, .. }
            | SourceError::Http { key, .. } => key,
        }
    }
}

/// Trait for fetchable resources.
///
/// Implementations must be `Send + Sync` for use across async tasks.
/// Methods return boxed futures for dyn-compatibility.
pub trait ResourceSource: Send + Sync {
    /// Short description used in logs.
    fn describe(&self) -> String;

    /// Fetches the full contents of `key`.
    fn fetch(&self, key: &str) -> BoxFuture<'_, Result<Vec<u8>, SourceError>>;
}

impl<T: ResourceSource + ?Sized> ResourceSource for Arc<T> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn fetch(&self, key: &str) -> BoxFuture<'_, Result<Vec<u8>, SourceError>> {
        (**self).fetch(key)
    }
}

/// Rejects keys that would escape the source root.
pub fn validate_key(key: &str) -> Result<&Path, SourceError> {
    let path = Path::new(key);
    let ok = !key.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if ok {
        Ok(path)
    } else {
        Err(SourceError::InvalidKey {
            key: key.to_string(),
        })
    }
}

/// Filesystem-based source rooted at a directory.
#[derive(Debug, Clone)]
pub struct FilesystemSource {
    root: PathBuf,
}

impl FilesystemSource {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ResourceSource for FilesystemSource {
    fn describe(&self) -> String {
        format!("file://{}", self.root.display())
    }

    fn fetch(&self, key: &str) -> BoxFuture<'_, Result<Vec<u8>, SourceError>> {
        let key = key.to_string();
        Box::pin(async move {
            let path = self.root.join(validate_key(&key)?);
            debug!(path = %path.display(), "reading resource");
            match tokio::fs::read(&path).await {
                Ok(data) => Ok(data),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    Err(SourceError::NotFound { key })
                }
                Err(e) => Err(SourceError::Io { key, source: e }),
            }
        })
    }
}

/// HTTP-based source: keys are appended to `base_url`.
#[derive(Debug, Clone)]
pub struct HttpSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    pub fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }
}

impl ResourceSource for HttpSource {
    fn describe(&self) -> String {
        self.base_url.clone()
    }

    fn fetch(&self, key: &str) -> BoxFuture<'_, Result<Vec<u8>, SourceError>> {
        let key = key.to_string();
        Box::pin(async move {
            validate_key(&key)?;
            let url = self.url_for(&key);
            debug!(%url, "fetching resource");
            let resp = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| SourceError::Http {
                    key: key.clone(),
                    message: e.to_string(),
                })?;

            if resp.status() == reqwest::StatusCode::NOT_FOUND {
                return Err(SourceError::NotFound { key });
            }

            if !resp.status().is_success() {
                return Err(SourceError::Http {
                    message: format!("status {}", resp.status()),
                    key,
                });
            }

            let bytes = resp.bytes().await.map_err(|e| SourceError::Http {
                key: key.clone(),
                message: e.to_string(),
            })?;
            Ok(bytes.to_vec())
        })
    }
}

/// Whether `root` names a remote `http(s)://` base URL rather than a directory.
pub fn is_remote_root(root: &str) -> bool {
    root.starts_with("http://") || root.starts_with("https://")
}

/// Opens a data root: an `http(s)://` base URL or a local directory.
pub fn open_data_root(root: &str) -> Arc<dyn ResourceSource> {
    if is_remote_root(root) {
        Arc::new(HttpSource::new(root))
    } else {
        Arc::new(FilesystemSource::new(root))
    }
}

/// In-memory source, keyed by resource name.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    resources: BTreeMap<String, Arc<Vec<u8>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(key, bytes);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.resources.insert(key.into(), Arc::new(bytes.into()));
    }
}

impl ResourceSource for MemorySource {
    fn describe(&self) -> String {
        format!("memory ({} resources)", self.resources.len())
    }

    fn fetch(&self, key: &str) -> BoxFuture<'_, Result<Vec<u8>, SourceError>> {
        let found = self.resources.get(key).map(|b| b.as_ref().clone());
        let key = key.to_string();
        Box::pin(async move { found.ok_or(SourceError::NotFound { key }) })
    }
}
