//! Page snapshots.
//!
//! A snapshot is a self-contained HTML file written to a caller-chosen
//! path. The built-in processor shells out to the `single-file` CLI; a
//! per-domain override config can substitute an extension via its
//! `processor` entry.

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use linkvault_core::defaults::{SNAPSHOT_CMD_TIMEOUT_SECS, SNAPSHOT_COMMAND};
use linkvault_core::{Error, Result};

use crate::config::OverrideConfigStore;
use crate::extensions::{ExtensionLoader, SnapshotProcessor};

/// Built-in processor wrapping the `single-file` CLI.
#[derive(Debug, Default)]
pub struct SingleFileProcessor;

#[async_trait]
impl SnapshotProcessor for SingleFileProcessor {
    async fn create_snapshot(&self, url: &str, filepath: &Path, _config: &Value) -> Result<()> {
        debug!(url, filepath = %filepath.display(), "creating snapshot");
        let output = tokio::time::timeout(
            Duration::from_secs(SNAPSHOT_CMD_TIMEOUT_SECS),
            Command::new(SNAPSHOT_COMMAND)
                .arg(url)
                .arg(filepath)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| {
            Error::Snapshot(format!(
                "snapshot timed out after {}s",
                SNAPSHOT_CMD_TIMEOUT_SECS
            ))
        })?
        .map_err(|e| Error::Snapshot(format!("failed to run {}: {}", SNAPSHOT_COMMAND, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Snapshot(format!(
                "{} failed (exit {}): {}",
                SNAPSHOT_COMMAND,
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

/// Creates snapshots, dispatching per domain between the built-in processor
/// and extensions.
pub struct SnapshotService {
    overrides: Arc<OverrideConfigStore>,
    extensions: ExtensionLoader,
    builtin: SingleFileProcessor,
}

impl SnapshotService {
    pub fn new(overrides: Arc<OverrideConfigStore>) -> Self {
        Self {
            overrides,
            extensions: ExtensionLoader::new(),
            builtin: SingleFileProcessor,
        }
    }

    pub async fn create_snapshot(&self, url: &str, filepath: &Path) -> Result<()> {
        let config = self.overrides.resolve(url);
        if let Some(config) = &config {
            if let Some(processor_path) = config.processor() {
                if let Some(module) = self.extensions.load(&processor_path) {
                    return module.create_snapshot(url, filepath, config.as_value()).await;
                }
                warn!(url, extension_path = %processor_path.display(), "snapshot extension missing, using built-in");
            }
        }
        let config_value = config.map(|c| c.as_value().clone()).unwrap_or(Value::Null);
        self.builtin.create_snapshot(url, filepath, &config_value).await
    }
}
