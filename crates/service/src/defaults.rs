use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use tokio::fs;

use crate::errors::ServiceError;

/// Immutable snapshot of default key/value pairs.
///
/// Cloning shares the underlying map; every request holding the same
/// snapshot sees the same data. No mutating API is exposed, so the
/// snapshot stays safe to share across concurrent requests. A new set
/// of values means a new `DefaultsMap`, never an in-place update.
#[derive(Debug, Clone, Default)]
pub struct DefaultsMap(Arc<HashMap<String, String>>);

impl DefaultsMap {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self(Arc::new(values))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether two handles point at the same underlying snapshot.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

impl FromIterator<(String, String)> for DefaultsMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl Serialize for DefaultsMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

/// Source of the defaults data. Implementations may read from any
/// backing store; the returned snapshot is treated as immutable and
/// loads are expected to be idempotent.
#[async_trait::async_trait]
pub trait DefaultsLoader: Send + Sync {
    async fn load(&self) -> Result<DefaultsMap, ServiceError>;
}

/// Serves a fixed in-memory set of defaults. Used when no external
/// source is configured, and by tests.
pub struct StaticLoader {
    values: HashMap<String, String>,
}

impl StaticLoader {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    /// The built-in default set served when no source file is configured.
    pub fn builtin() -> Self {
        let values = HashMap::from([
            ("value1".to_string(), "testing".to_string()),
            ("value2".to_string(), "hello world".to_string()),
            ("value3".to_string(), "this works".to_string()),
        ]);
        Self { values }
    }
}

#[async_trait::async_trait]
impl DefaultsLoader for StaticLoader {
    async fn load(&self) -> Result<DefaultsMap, ServiceError> {
        Ok(DefaultsMap::new(self.values.clone()))
    }
}

/// Loads defaults from a JSON object of string pairs on disk.
pub struct FileLoader {
    path: PathBuf,
}

impl FileLoader {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl DefaultsLoader for FileLoader {
    async fn load(&self) -> Result<DefaultsMap, ServiceError> {
        let bytes = fs::read(&self.path).await?;
        let values: HashMap<String, String> =
            serde_json::from_slice(&bytes).map_err(|e| ServiceError::Parse(e.to_string()))?;
        Ok(DefaultsMap::new(values))
    }
}
