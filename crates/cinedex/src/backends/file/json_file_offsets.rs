use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, warn};

use super::JsonFileOffsetsConfig;
use crate::backends::OffsetStore;

/// 🔖 Checkpoints in a JSON file.
///
/// The file is read once, on first use. A missing or corrupt file becomes `{}` on disk
/// right then. Every `set` rewrites the whole snapshot to a sibling temp file and renames
/// it over the original, so a crash mid-write leaves the previous snapshot intact instead
/// of half a JSON object.
#[derive(Debug)]
pub(crate) struct JsonFileOffsets {
    path: PathBuf,
    snapshot: Option<BTreeMap<String, String>>,
}

impl JsonFileOffsets {
    pub(crate) fn new(config: JsonFileOffsetsConfig) -> Self {
        Self {
            path: config.path,
            snapshot: None,
        }
    }

    async fn snapshot(&mut self) -> Result<&mut BTreeMap<String, String>> {
        if self.snapshot.is_none() {
            let (loaded, healthy) = self.load().await?;
            if !healthy {
                self.persist(&loaded).await?;
            }
            self.snapshot = Some(loaded);
        }
        self.snapshot
            .as_mut()
            .context("💀 The checkpoint snapshot was loaded and then wasn't. Physics is broken.")
    }

    /// The flag is `false` when the file was missing or unreadable as JSON and the
    /// returned empty snapshot still has to be written back.
    async fn load(&self) -> Result<(BTreeMap<String, String>, bool)> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(
                    "🔖 No checkpoint file at '{}' yet. Starting from the beginning of time.",
                    self.path.display()
                );
                return Ok((BTreeMap::new(), false));
            }
            Err(err) => {
                return Err(err).context(format!(
                    "💀 Could not read the checkpoint file '{}'.",
                    self.path.display()
                ));
            }
        };

        match serde_json::from_str(&raw) {
            Ok(snapshot) => Ok((snapshot, true)),
            Err(err) => {
                warn!(
                    "⚠️ Checkpoint file '{}' is not a JSON object of strings ({}). Starting over from an empty snapshot; some documents will be re-indexed.",
                    self.path.display(),
                    err
                );
                Ok((BTreeMap::new(), false))
            }
        }
    }

    async fn persist(&self, snapshot: &BTreeMap<String, String>) -> Result<()> {
        let rendered = serde_json::to_string_pretty(snapshot)
            .context("💀 Could not render the checkpoint snapshot as JSON.")?;

        let mut temp_name = self.path.as_os_str().to_owned();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);

        tokio::fs::write(&temp_path, rendered).await.context(format!(
            "💀 Could not write the checkpoint temp file '{}'.",
            temp_path.display()
        ))?;
        tokio::fs::rename(&temp_path, &self.path).await.context(format!(
            "💀 Could not move the new checkpoint into place at '{}'.",
            self.path.display()
        ))?;
        Ok(())
    }
}

#[async_trait]
impl OffsetStore for JsonFileOffsets {
    async fn get(&mut self, key: &str) -> Result<Option<String>> {
        Ok(self.snapshot().await?.get(key).cloned())
    }

    async fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut updated = self.snapshot().await?.clone();
        updated.insert(key.to_string(), value.to_string());
        self.persist(&updated).await?;
        // only remember what actually made it to disk
        self.snapshot = Some(updated);
        debug!("🔖 Checkpoint '{}' = {}", key, value);
        Ok(())
    }
}
