//! JSON file persistence for the close registry.
//!
//! Every read-modify-write holds an exclusive lock on `.state.lock`, so
//! commands from separate processes never lose each other's changes. A run
//! additionally holds `<period>.run.lock` for as long as it is attached.

use async_trait::async_trait;
use monthend_core::close::{CloseRegistry, PeriodHistory};
use monthend_core::pipeline::{CloseCheckpoint, Published};
use monthend_shared::types::AccountingPeriod;
use monthend_shared::{AppError, AppResult};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const REGISTRY_FILE: &str = "registry.json";
const STATE_LOCK_FILE: &str = ".state.lock";

/// Stores the registry as one JSON document in the state directory.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
    path: PathBuf,
}

/// Exclusive claim on running one period; released on drop.
#[derive(Debug)]
pub struct RunLock {
    _file: File,
}

impl StateStore {
    /// Creates a store rooted at `state_dir`.
    pub fn new(state_dir: &Path) -> Self {
        Self {
            dir: state_dir.to_path_buf(),
            path: state_dir.join(REGISTRY_FILE),
        }
    }

    /// Claims `period` for a run, or `None` if another run holds it.
    pub fn lock_run(&self, period: AccountingPeriod) -> AppResult<Option<RunLock>> {
        let file = self.lock_file(&format!("{period}.run.lock"))?;
        match fs2::FileExt::try_lock_exclusive(&file) {
            Ok(()) => Ok(Some(RunLock { _file: file })),
            Err(err) if err.kind() == fs2::lock_contended_error().kind() => {
                warn!(period = %period, "Period is locked by another run");
                Ok(None)
            }
            Err(err) => Err(self.state_err(err)),
        }
    }

    /// Loads the registry, or an empty one on first use.
    pub async fn load(&self) -> AppResult<CloseRegistry> {
        let store = self.clone();
        blocking(move || {
            let _lock = store.lock_state()?;
            store.read()
        })
        .await
    }

    /// Applies `change` to the stored registry under the state lock.
    ///
    /// Nothing is written when `change` fails.
    pub async fn update<T, E, F>(&self, change: F) -> Result<T, E>
    where
        F: FnOnce(&mut CloseRegistry) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<AppError> + Send + 'static,
    {
        let store = self.clone();
        let joined = tokio::task::spawn_blocking(move || store.update_blocking(change)).await;
        joined.map_err(|e| AppError::Internal(e.to_string()))?
    }

    /// Blocking form of `update`, for callers already off the runtime.
    pub fn update_blocking<T, E, F>(&self, change: F) -> Result<T, E>
    where
        F: FnOnce(&mut CloseRegistry) -> Result<T, E>,
        E: From<AppError>,
    {
        let _lock = self.lock_state()?;
        let mut registry = self.read()?;
        let value = change(&mut registry)?;
        self.write(&registry)?;
        Ok(value)
    }

    fn lock_state(&self) -> AppResult<File> {
        let file = self.lock_file(STATE_LOCK_FILE)?;
        fs2::FileExt::lock_exclusive(&file).map_err(|e| self.state_err(e))?;
        Ok(file)
    }

    fn lock_file(&self, name: &str) -> AppResult<File> {
        fs::create_dir_all(&self.dir).map_err(|e| self.state_err(e))?;
        OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.dir.join(name))
            .map_err(|e| self.state_err(e))
    }

    fn read(&self) -> AppResult<CloseRegistry> {
        match fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| AppError::State(format!("{}: {e}", self.path.display()))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No saved state, starting empty");
                Ok(CloseRegistry::new())
            }
            Err(err) => Err(self.state_err(err)),
        }
    }

    /// Writes the registry, replacing the previous document atomically.
    fn write(&self, registry: &CloseRegistry) -> AppResult<()> {
        let json = serde_json::to_vec_pretty(registry)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| self.state_err(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.state_err(e))?;
        debug!(path = %self.path.display(), "Saved close state");
        Ok(())
    }

    fn state_err(&self, err: std::io::Error) -> AppError {
        AppError::State(format!("{}: {err}", self.dir.display()))
    }
}

#[async_trait]
impl CloseCheckpoint for StateStore {
    async fn publish(
        &self,
        period: AccountingPeriod,
        expected: Option<&PeriodHistory>,
        next: &PeriodHistory,
    ) -> AppResult<Published> {
        let store = self.clone();
        let expected = expected.cloned();
        let next = next.clone();
        blocking(move || {
            store.update_blocking(|registry| {
                if registry.history(period) != expected.as_ref() {
                    return Ok(Published::Superseded(registry.history(period).cloned()));
                }
                registry.restore(period, next);
                Ok(Published::Saved)
            })
        })
        .await
    }
}

async fn blocking<T, F>(work: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
}
