//! Atomic JSON blob store.
//!
//! Every write goes to a `.tmp` sibling file and is then renamed into place,
//! so a crash mid-write never leaves a partial file at the real path. Reads
//! distinguish "never written" from "write failed" from "success".

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed json at {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Outcome of a [`BlobStore::read`].
pub enum BlobRead<T> {
    Ok(T),
    NotFound,
}

/// Root directory for the `<data_root>/` tree.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn system_instances_index_path(&self) -> PathBuf {
        self.root.join("system").join("instances_index.json")
    }

    pub fn system_effects_metrics_path(&self) -> PathBuf {
        self.root.join("system").join("effects_metrics.json")
    }

    pub fn workflow_snapshot_path(&self, tenant_id: &str, kind: &str, instance_id: &str) -> PathBuf {
        self.root
            .join("tenants")
            .join(tenant_id)
            .join("workflows")
            .join(kind)
            .join(format!("{instance_id}.json"))
    }

    pub fn event_log_path(&self, tenant_id: &str, kind: &str, instance_id: &str) -> PathBuf {
        self.root
            .join("tenants")
            .join(tenant_id)
            .join("events")
            .join(kind)
            .join(format!("{instance_id}.jsonl"))
    }

    /// Writes `value` to `path` atomically: serialize, write to a sibling
    /// `.tmp` file, `rename` over the target.
    pub fn write<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), BlobError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| BlobError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_vec_pretty(value).map_err(|source| BlobError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
        let tmp_path = tmp_sibling(path);
        fs::write(&tmp_path, &json).map_err(|source| BlobError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, path).map_err(|source| BlobError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    /// Reads and deserializes `path`, or [`BlobRead::NotFound`] if it does
    /// not exist.
    pub fn read<T: DeserializeOwned>(&self, path: &Path) -> Result<BlobRead<T>, BlobError> {
        match fs::read(path) {
            Ok(bytes) => {
                let value = serde_json::from_slice(&bytes).map_err(|source| BlobError::Malformed {
                    path: path.to_path_buf(),
                    source,
                })?;
                Ok(BlobRead::Ok(value))
            }
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(BlobRead::NotFound),
            Err(source) => Err(BlobError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Removes `path` if present; a missing file is not an error.
    pub fn delete(&self, path: &Path) -> Result<(), BlobError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(BlobError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Lists instance ids with a persisted snapshot under `tenant_id/workflows/kind`.
    pub fn list_snapshot_ids(&self, tenant_id: &str, kind: &str) -> Result<Vec<String>, BlobError> {
        let dir = self
            .root
            .join("tenants")
            .join(tenant_id)
            .join("workflows")
            .join(kind);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(BlobError::Io { path: dir, source }),
        };
        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| BlobError::Io {
                path: dir.clone(),
                source,
            })?;
            if let Some(stem) = entry.path().file_stem().and_then(|s| s.to_str()) {
                if entry.path().extension().and_then(|e| e.to_str()) == Some("json") {
                    ids.push(stem.to_string());
                }
            }
        }
        Ok(ids)
    }
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{file_name}.tmp"))
}
