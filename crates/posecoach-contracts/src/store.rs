use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{Map, Value};

/// Durable key-value slot backed by a single JSON object file.
///
/// Every read goes back to disk, so two slots over the same file observe each
/// other's writes. Writes only touch the key being written.
#[derive(Debug, Clone)]
pub struct KeyValueSlot {
    path: PathBuf,
}

impl KeyValueSlot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the stored value. A missing file is an empty slot; a file that
    /// is not a JSON object is an error.
    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.read_all()?.remove(key))
    }

    pub fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut on_disk = self.read_all_lenient();
        if on_disk.get(key) == Some(&value) {
            return Ok(());
        }
        on_disk.insert(key.to_string(), value);
        write_json_object(&self.path, &on_disk)
    }

    pub fn remove(&self, key: &str) -> Result<bool> {
        let mut on_disk = self.read_all_lenient();
        if on_disk.remove(key).is_none() {
            return Ok(false);
        }
        write_json_object(&self.path, &on_disk)?;
        Ok(true)
    }

    fn read_all(&self) -> Result<Map<String, Value>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(err) => {
                return Err(err).with_context(|| format!("failed reading {}", self.path.display()))
            }
        };
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        let parsed: Value = serde_json::from_str(&raw)
            .with_context(|| format!("{} is not valid JSON", self.path.display()))?;
        match parsed {
            Value::Object(map) => Ok(map),
            _ => anyhow::bail!("{} does not hold a JSON object", self.path.display()),
        }
    }

    fn read_all_lenient(&self) -> Map<String, Value> {
        match self.read_all() {
            Ok(map) => map,
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "discarding unreadable key-value slot before write"
                );
                Map::new()
            }
        }
    }
}

fn write_json_object(path: &Path, payload: &Map<String, Value>) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_string(&Value::Object(payload.clone()))?)
        .with_context(|| format!("failed writing {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed replacing {}", path.display()))?;
    Ok(())
}
