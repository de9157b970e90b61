use crate::error::PersistError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

/// Writes `value` to `path` via a temp-file-then-rename, so readers never
/// observe a partially written file.
pub async fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistError> {
    let json = serde_json::to_vec_pretty(value).map_err(|source| PersistError::Serde {
        path: path.display().to_string(),
        source,
    })?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| PersistError::Io {
            path: path.display().to_string(),
            source,
        })?;
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, &json)
        .await
        .map_err(|source| PersistError::Io {
            path: tmp.display().to_string(),
            source,
        })?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|source| PersistError::Io {
            path: path.display().to_string(),
            source,
        })?;
    Ok(())
}

/// Loads `path` as JSON, returning `None` if it does not exist.
pub async fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, PersistError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let value = serde_json::from_slice(&bytes).map_err(|source| PersistError::Serde {
                path: path.display().to_string(),
                source,
            })?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(PersistError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

/// Coalesces bursts of mutations into a single debounced write.
///
/// Every module-level singleton (order board, gear state) schedules a
/// flush through one of these rather than writing synchronously on
/// every mutation, matching the ~250ms debounce spec'd in §4.2.
pub struct Debouncer {
    path: PathBuf,
    delay: Duration,
    pending: Arc<Mutex<Option<Instant>>>,
}

impl Debouncer {
    pub fn new(path: impl Into<PathBuf>, delay: Duration) -> Self {
        Self {
            path: path.into(),
            delay,
            pending: Arc::new(Mutex::new(None)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Schedules a flush. If a flush is already pending this is a no-op;
    /// the caller's `write` closure runs once, after `delay` has elapsed
    /// since the *first* unflushed mutation in the burst.
    pub async fn schedule<F, Fut>(&self, write: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let mut guard = self.pending.lock().await;
        if guard.is_some() {
            return;
        }
        let deadline = Instant::now() + self.delay;
        *guard = Some(deadline);
        drop(guard);
        let pending = self.pending.clone();
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            *pending.lock().await = None;
            write().await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Fixture {
        n: u32,
    }

    #[tokio::test]
    async fn round_trips_through_atomic_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub/fixture.json");
        atomic_write_json(&path, &Fixture { n: 7 }).await.unwrap();
        let loaded: Option<Fixture> = load_json(&path).await.unwrap();
        assert_eq!(loaded, Some(Fixture { n: 7 }));
    }

    #[tokio::test]
    async fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let loaded: Option<Fixture> = load_json(&path).await.unwrap();
        assert_eq!(loaded, None);
    }
}
