//! Hot-reloaded extension executables.
//!
//! Per-domain override configs may name extension programs that replace the
//! built-in metadata loader or snapshot processor. Extensions are trusted,
//! unsandboxed executables; that trust boundary is deliberate. They are
//! invoked with a fixed entry-point subcommand, receive their override
//! config as JSON on stdin, and reply with JSON on stdout.
//!
//! The loader caches one [`ExtensionModule`] per path, keyed by the file's
//! mtime. An mtime advance causes a reload on next use, so an extension can
//! be replaced without restarting the service. A missing file is never an
//! error, just an absent extension.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{info, warn};

use linkvault_core::defaults::{EXTENSION_CMD_TIMEOUT_SECS, SNAPSHOT_CMD_TIMEOUT_SECS};
use linkvault_core::{Error, Result};

use crate::config::{FsModTime, ModTimeSource};
use crate::metadata::WebsiteMetadata;

// =============================================================================
// CAPABILITY TRAITS
// =============================================================================

/// Loads website metadata for a URL.
#[async_trait]
pub trait MetadataLoader: Send + Sync {
    async fn load_metadata(&self, url: &str, config: &Value) -> Result<WebsiteMetadata>;
}

/// Produces a standalone snapshot of a page at the given path.
#[async_trait]
pub trait SnapshotProcessor: Send + Sync {
    async fn create_snapshot(&self, url: &str, filepath: &Path, config: &Value) -> Result<()>;
}

// =============================================================================
// EXTENSION MODULE
// =============================================================================

/// One loaded extension executable, pinned to the mtime it was loaded at.
#[derive(Debug)]
pub struct ExtensionModule {
    path: PathBuf,
    mtime: SystemTime,
}

impl ExtensionModule {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run the executable with `args`, config JSON on stdin, collecting
    /// stdout. Nonzero exit, timeout, and spawn failure are all surfaced as
    /// [`Error::Extension`].
    async fn invoke(&self, args: &[&str], config: &Value, timeout_secs: u64) -> Result<String> {
        let mut cmd = Command::new(&self.path);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            Error::Extension(format!("failed to spawn {}: {}", self.path.display(), e))
        })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Extension("extension stdin unavailable".to_string()))?;
        let payload = serde_json::to_vec(config)?;
        stdin
            .write_all(&payload)
            .await
            .map_err(|e| Error::Extension(format!("failed to write extension config: {}", e)))?;
        drop(stdin);

        let output = tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| {
            Error::Extension(format!(
                "{} timed out after {}s",
                self.path.display(),
                timeout_secs
            ))
        })?
        .map_err(|e| Error::Extension(format!("failed to run {}: {}", self.path.display(), e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Extension(format!(
                "{} failed (exit {}): {}",
                self.path.display(),
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl MetadataLoader for ExtensionModule {
    async fn load_metadata(&self, url: &str, config: &Value) -> Result<WebsiteMetadata> {
        let stdout = self
            .invoke(
                &["load-website-metadata", url],
                config,
                EXTENSION_CMD_TIMEOUT_SECS,
            )
            .await?;
        serde_json::from_str(&stdout).map_err(|e| {
            Error::Extension(format!(
                "{} returned malformed metadata: {}",
                self.path.display(),
                e
            ))
        })
    }
}

#[async_trait]
impl SnapshotProcessor for ExtensionModule {
    async fn create_snapshot(&self, url: &str, filepath: &Path, config: &Value) -> Result<()> {
        let filepath = filepath.to_string_lossy();
        self.invoke(
            &["create-snapshot", url, &filepath],
            config,
            SNAPSHOT_CMD_TIMEOUT_SECS,
        )
        .await?;
        Ok(())
    }
}

// =============================================================================
// LOADER
// =============================================================================

/// Path-keyed cache of extension modules with mtime-based hot reload.
pub struct ExtensionLoader {
    mtimes: Arc<dyn ModTimeSource>,
    modules: RwLock<HashMap<PathBuf, Arc<ExtensionModule>>>,
}

impl Default for ExtensionLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtensionLoader {
    pub fn new() -> Self {
        Self::with_mod_time_source(Arc::new(FsModTime))
    }

    pub fn with_mod_time_source(mtimes: Arc<dyn ModTimeSource>) -> Self {
        Self {
            mtimes,
            modules: RwLock::new(HashMap::new()),
        }
    }

    /// Load the extension at `path`, reusing the cached module while the
    /// file's mtime is unchanged. A missing or unreadable file evicts any
    /// cached entry and returns `None`.
    pub fn load(&self, path: &Path) -> Option<Arc<ExtensionModule>> {
        let mtime = match self.mtimes.modified(path) {
            Ok(mtime) => mtime,
            Err(e) => {
                warn!(extension_path = %path.display(), error = %e, "extension unavailable");
                let mut modules = self.write_modules();
                modules.remove(path);
                return None;
            }
        };

        {
            let modules = self.read_modules();
            if let Some(module) = modules.get(path) {
                if module.mtime == mtime {
                    return Some(Arc::clone(module));
                }
                info!(extension_path = %path.display(), "extension changed, reloading");
            } else {
                info!(extension_path = %path.display(), "loading extension");
            }
        }

        let module = Arc::new(ExtensionModule {
            path: path.to_path_buf(),
            mtime,
        });
        let mut modules = self.write_modules();
        modules.insert(path.to_path_buf(), Arc::clone(&module));
        Some(module)
    }

    fn read_modules(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<PathBuf, Arc<ExtensionModule>>> {
        self.modules.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_modules(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<PathBuf, Arc<ExtensionModule>>> {
        self.modules.write().unwrap_or_else(|e| e.into_inner())
    }
}
