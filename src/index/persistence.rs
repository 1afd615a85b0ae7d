//! Atomic persistence for the request index's sidecar metadata file.
//!
//! The sidecar is the durable state for the flat backend shipped in this
//! crate (there is no separate binary index format to keep in sync). It is
//! always written via temp-file-then-rename, matching the persistence
//! discipline used for metadata/checkpoint files in the ANN backend this
//! index was adapted from.

use crate::error::{CacheError, CacheResult};
use crate::index::flat::FlatRequestIndex;
use crate::metric::IndexMetric;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::PathBuf;

/// Storage backend the sidecar is written to and read from. A trait so
/// tests can exercise the load/save logic without touching the filesystem.
pub trait Directory: Send + Sync {
    fn read(&self, path: &str) -> CacheResult<Option<Vec<u8>>>;
    fn atomic_write(&self, path: &str, data: &[u8]) -> CacheResult<()>;
}

/// Filesystem-backed [`Directory`]: writes go to a `.tmp` file, are
/// `fsync`'d, then atomically renamed into place.
pub struct FsDirectory {
    root: PathBuf,
}

impl FsDirectory {
    pub fn new<P: Into<PathBuf>>(root: P) -> CacheResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl Directory for FsDirectory {
    fn read(&self, path: &str) -> CacheResult<Option<Vec<u8>>> {
        let full = self.resolve(path);
        if !full.exists() {
            return Ok(None);
        }
        let mut file = std::fs::File::open(full)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        Ok(Some(buf))
    }

    fn atomic_write(&self, path: &str, data: &[u8]) -> CacheResult<()> {
        let temp_path = self.resolve(&format!("{path}.tmp"));
        if let Some(parent) = temp_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut temp_file = std::fs::File::create(&temp_path)?;
        temp_file.write_all(data)?;
        temp_file.sync_all()?;

        let final_path = self.resolve(path);
        std::fs::rename(&temp_path, &final_path)?;

        if let Some(parent) = final_path.parent() {
            if let Ok(parent_file) = std::fs::File::open(parent) {
                let _ = parent_file.sync_all(); // best-effort directory durability
            }
        }
        Ok(())
    }
}

/// In-memory [`Directory`], for tests and ephemeral (no-persistence) cache
/// instances.
#[derive(Default)]
pub struct MemoryDirectory {
    files: std::sync::RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Directory for MemoryDirectory {
    fn read(&self, path: &str) -> CacheResult<Option<Vec<u8>>> {
        Ok(self.files.read().unwrap().get(path).cloned())
    }

    fn atomic_write(&self, path: &str, data: &[u8]) -> CacheResult<()> {
        self.files
            .write()
            .unwrap()
            .insert(path.to_string(), data.to_vec());
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct SidecarItem {
    key: String,
    id: i64,
    vector: Vec<f32>,
    original_norm: Option<f32>,
}

#[derive(Serialize, Deserialize)]
struct SidecarFile {
    dim: usize,
    distance_method: String,
    items: HashMap<String, SidecarItem>,
}

fn metric_tag(metric: IndexMetric) -> &'static str {
    metric.as_str()
}

fn metric_from_tag(tag: &str) -> Option<IndexMetric> {
    match tag {
        "l2" => Some(IndexMetric::L2),
        "ip" => Some(IndexMetric::InnerProduct),
        "cosine" => Some(IndexMetric::Cosine),
        _ => None,
    }
}

/// Write the index's current state to `path` atomically.
pub fn save_sidecar(dir: &dyn Directory, path: &str, index: &FlatRequestIndex) -> CacheResult<()> {
    let dim = index.dim().unwrap_or(0);
    let items = index
        .snapshot()
        .into_iter()
        .map(|(key, id, vector, original_norm)| {
            (
                key.clone(),
                SidecarItem {
                    key,
                    id,
                    vector,
                    original_norm,
                },
            )
        })
        .collect();

    let file = SidecarFile {
        dim,
        distance_method: metric_tag(index.metric()).to_string(),
        items,
    };
    let bytes = serde_json::to_vec_pretty(&file)?;
    dir.atomic_write(path, &bytes)
}

/// Load a persisted index, checking the requested metric against the one
/// recorded in the sidecar. Returns `Ok(None)` if no sidecar exists yet.
pub fn load_sidecar(
    dir: &dyn Directory,
    path: &str,
    requested_metric: IndexMetric,
) -> CacheResult<Option<FlatRequestIndex>> {
    let Some(bytes) = dir.read(path)? else {
        return Ok(None);
    };
    let file: SidecarFile = serde_json::from_slice(&bytes)?;

    let persisted_metric = metric_from_tag(&file.distance_method).ok_or_else(|| {
        CacheError::Serde(format!("unknown distance_method: {}", file.distance_method))
    })?;
    if persisted_metric != requested_metric {
        return Err(CacheError::MetricConflict {
            persisted: metric_tag(persisted_metric),
            requested: metric_tag(requested_metric),
        });
    }

    let dim = if file.items.is_empty() {
        None
    } else {
        Some(file.dim)
    };
    let items = file
        .items
        .into_values()
        .map(|item| (item.key, item.id, item.vector, item.original_norm))
        .collect();

    Ok(Some(FlatRequestIndex::from_items(
        requested_metric,
        dim,
        items,
    )))
}
