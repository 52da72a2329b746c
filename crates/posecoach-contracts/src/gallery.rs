use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::data_url;
use crate::errors::SessionError;
use crate::store::KeyValueSlot;

pub const GALLERY_CAPACITY: usize = 20;
pub const GALLERY_KEY: &str = "posecoach_gallery";

/// A saved capture. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryImage {
    pub id: String,
    #[serde(with = "data_url::bytes")]
    pub image_data: Vec<u8>,
    #[serde(default, with = "data_url::option_bytes")]
    pub reference_image: Option<Vec<u8>>,
    pub score: u8,
    /// Capture time, unix milliseconds.
    pub timestamp: i64,
}

impl GalleryImage {
    pub fn from_capture(
        image_data: Vec<u8>,
        reference_image: Option<Vec<u8>>,
        score: u8,
        timestamp: i64,
    ) -> Self {
        Self {
            id: timestamp.to_string(),
            image_data,
            reference_image,
            score,
            timestamp,
        }
    }
}

/// Bounded, newest-first gallery persisted under [`GALLERY_KEY`].
#[derive(Debug)]
pub struct GalleryStore {
    slot: KeyValueSlot,
    entries: Vec<GalleryImage>,
}

impl GalleryStore {
    /// Loads the gallery. Missing or corrupt data yields an empty gallery and
    /// is logged, never returned.
    pub fn load(slot: KeyValueSlot) -> Self {
        let entries = match read_entries(&slot) {
            Ok(entries) => entries,
            Err(err) => {
                let err = SessionError::persistence_from(&err);
                tracing::warn!(
                    path = %slot.path().display(),
                    kind = ?err.kind(),
                    error = %err,
                    "gallery unreadable; starting empty"
                );
                Vec::new()
            }
        };
        Self { slot, entries }
    }

    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::load(KeyValueSlot::new(path))
    }

    pub fn entries(&self) -> &[GalleryImage] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&GalleryImage> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts at the front and drops the oldest entries beyond capacity.
    /// Returns the id the entry was stored under.
    pub fn append(&mut self, mut entry: GalleryImage) -> String {
        entry.id = self.unique_id(&entry.id);
        let id = entry.id.clone();
        self.entries.insert(0, entry);
        self.entries.truncate(GALLERY_CAPACITY);
        self.persist_or_log();
        id
    }

    /// Removes the entry with `id`. Absent ids are a no-op.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        if self.entries.len() == before {
            return false;
        }
        self.persist_or_log();
        true
    }

    /// Writes the entries through to the slot. Failures are
    /// [`SessionError`]s of kind `Persistence`.
    pub fn persist(&self) -> Result<()> {
        let written = serde_json::to_value(&self.entries)
            .map_err(anyhow::Error::from)
            .and_then(|value| self.slot.set(GALLERY_KEY, value))
            .with_context(|| format!("failed persisting gallery to {}", self.slot.path().display()));
        written.map_err(|err| anyhow::Error::new(SessionError::persistence_from(&err)))
    }

    /// Writes every entry's images plus an `index.json` manifest into `dir`.
    pub fn export(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;
        let mut written = Vec::new();
        let mut index = Vec::new();
        for entry in &self.entries {
            let image_path = dir.join(format!(
                "{}.{}",
                entry.id,
                data_url::extension_for(&entry.image_data)
            ));
            std::fs::write(&image_path, &entry.image_data)
                .with_context(|| format!("failed to write {}", image_path.display()))?;
            written.push(image_path.clone());

            let reference_path = match entry.reference_image.as_deref() {
                Some(bytes) => {
                    let path = dir.join(format!(
                        "{}-reference.{}",
                        entry.id,
                        data_url::extension_for(bytes)
                    ));
                    std::fs::write(&path, bytes)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    written.push(path.clone());
                    Some(path)
                }
                None => None,
            };

            index.push(json!({
                "id": entry.id,
                "score": entry.score,
                "timestamp": entry.timestamp,
                "image": file_name(&image_path),
                "reference_image": reference_path.as_deref().map(file_name),
            }));
        }
        let index_path = dir.join("index.json");
        std::fs::write(&index_path, serde_json::to_string_pretty(&Value::Array(index))?)
            .with_context(|| format!("failed to write {}", index_path.display()))?;
        written.push(index_path);
        Ok(written)
    }

    fn persist_or_log(&self) {
        if let Err(err) = self.persist() {
            tracing::warn!(error = %err, "gallery persistence failed; kept in memory");
        }
    }

    fn unique_id(&self, base: &str) -> String {
        let taken = |candidate: &str| self.entries.iter().any(|entry| entry.id == candidate);
        if !taken(base) {
            return base.to_string();
        }
        let mut suffix = 1u32;
        loop {
            let candidate = format!("{base}-{suffix}");
            if !taken(&candidate) {
                return candidate;
            }
            suffix += 1;
        }
    }
}

fn read_entries(slot: &KeyValueSlot) -> Result<Vec<GalleryImage>> {
    let Some(value) = slot.get(GALLERY_KEY)? else {
        return Ok(Vec::new());
    };
    let mut entries: Vec<GalleryImage> =
        serde_json::from_value(value).context("gallery payload malformed")?;
    entries.truncate(GALLERY_CAPACITY);
    Ok(entries)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default()
}
