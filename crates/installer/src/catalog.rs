//! Mod catalogs
//!
//! A catalog maps lookup keys to [`Mod`] records. The installer never
//! mutates them; callers pick entries by key and hand them to a batch.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::ErrorKind;
use crate::models::Mod;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read catalog at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed catalog document {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unknown mod: {key}")]
    UnknownMod { key: String },
}

impl CatalogError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CatalogError::Io { .. } => ErrorKind::FileSystem,
            CatalogError::Parse { .. } => ErrorKind::Configuration,
            CatalogError::UnknownMod { .. } => ErrorKind::NotFound,
        }
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;

/// Source of mod records
#[async_trait]
pub trait ModCatalog: Send + Sync {
    /// Every known mod, keyed by lookup key
    async fn fetch_mods(&self) -> Result<HashMap<String, Mod>>;

    /// Resolve `keys` in order, failing on the first unknown key
    async fn select(&self, keys: &[String]) -> Result<Vec<Mod>> {
        let mods = self.fetch_mods().await?;
        keys.iter()
            .map(|key| {
                mods.get(key)
                    .cloned()
                    .ok_or_else(|| CatalogError::UnknownMod { key: key.clone() })
            })
            .collect()
    }
}

/// A single JSON document holding `{ "<key>": { ...mod fields... } }`
#[derive(Debug, Clone)]
pub struct JsonFileCatalog {
    path: PathBuf,
}

impl JsonFileCatalog {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ModCatalog for JsonFileCatalog {
    async fn fetch_mods(&self) -> Result<HashMap<String, Mod>> {
        let data = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| CatalogError::Io { path: self.path.clone(), source: e })?;

        let mut mods: HashMap<String, Mod> = serde_json::from_str(&data)
            .map_err(|e| CatalogError::Parse { path: self.path.clone(), source: e })?;

        for (key, m) in mods.iter_mut() {
            if m.id.is_empty() {
                m.id = key.clone();
            }
        }

        debug!("Loaded {} mods from {}", mods.len(), self.path.display());
        Ok(mods)
    }
}

/// A directory tree of per-version metadata documents
///
/// Layout is `<game>/<mod>/<version>.json`. Keys are the relative path
/// without the extension, separators replaced by `_`. Documents that fail to
/// parse are skipped with a warning.
#[derive(Debug, Clone)]
pub struct MetaTreeCatalog {
    root: PathBuf,
}

impl MetaTreeCatalog {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    fn scan(root: &Path) -> Result<HashMap<String, Mod>> {
        if !root.is_dir() {
            return Err(CatalogError::Io {
                path: root.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "catalog directory missing"),
            });
        }

        let mut mods = HashMap::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|e| CatalogError::Io {
                path: e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf()),
                source: e.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            let relative = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if !relative.ends_with(".json") || relative.split('/').count() < 2 {
                continue;
            }

            let body = match std::fs::read_to_string(entry.path()) {
                Ok(body) => body,
                Err(e) => {
                    warn!("Skipping {}: {}", entry.path().display(), e);
                    continue;
                }
            };
            match Mod::from_meta_document(&relative, &body) {
                Ok(m) => {
                    mods.insert(m.id.clone(), m);
                }
                Err(e) => warn!("Skipping {}: {}", relative, e),
            }
        }

        info!("Found {} mods under {}", mods.len(), root.display());
        Ok(mods)
    }
}

#[async_trait]
impl ModCatalog for MetaTreeCatalog {
    async fn fetch_mods(&self) -> Result<HashMap<String, Mod>> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || Self::scan(&root))
            .await
            .map_err(|e| CatalogError::Io {
                path: self.root.clone(),
                source: std::io::Error::other(e),
            })?
    }
}
