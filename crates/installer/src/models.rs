//! Mod metadata supplied by the catalog

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A distributable mod package
///
/// Constructed by the catalog and treated as read-only by the installation
/// pipeline, which only derives cache keys and paths from it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Mod {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub author: String,
    pub download_url: String,
    /// Informational archive size in bytes
    pub file_size: u64,
    /// Lowercase hex SHA-256 of the archive, empty when unknown
    pub checksum: String,
    pub category: String,
    pub tags: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub install_path: String,
    pub dependencies: Vec<String>,
    pub conflicts: Vec<String>,
}

/// Remote metadata document layout
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct MetaDocument {
    metadata: MetaFields,
    #[allow(dead_code)]
    installation: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct MetaFields {
    link: String,
    /// Size in MiB, as a string
    size: String,
    /// `MM/DD/YYYY`
    day: String,
}

impl Mod {
    pub fn new(id: impl Into<String>, version: impl Into<String>, download_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            download_url: download_url.into(),
            ..Default::default()
        }
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_checksum<S: Into<String>>(mut self, checksum: S) -> Self {
        self.checksum = checksum.into();
        self
    }

    pub fn with_file_size(mut self, size: u64) -> Self {
        self.file_size = size;
        self
    }

    /// Human readable label used in logs and reports
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() { &self.id } else { &self.name }
    }

    /// Estimated installed size
    pub fn install_size(&self) -> u64 {
        self.file_size
    }

    /// Build a mod from a metadata document found at `path` in the catalog tree
    ///
    /// Fields absent from the document are derived from the path:
    /// `ntw/fcn/8.2.0.json` yields id `ntw_fcn_8.2.0`, name `FCN`, version `8.2.0`.
    pub fn from_meta_document(path: &str, body: &str) -> serde_json::Result<Self> {
        let doc: MetaDocument = serde_json::from_str(body)?;

        let stem = path.strip_suffix(".json").unwrap_or(path);
        let parts: Vec<&str> = path.split('/').collect();
        let first = parts.first().copied().unwrap_or_default();

        let name = parts
            .get(1)
            .map(|segment| segment.to_uppercase())
            .unwrap_or_else(|| "Unnamed mod".to_string());
        let version = parts
            .last()
            .map(|file| file.strip_suffix(".json").unwrap_or(file).to_string())
            .unwrap_or_default();

        let file_size = doc
            .metadata
            .size
            .trim()
            .parse::<u64>()
            .ok()
            .and_then(|mib| mib.checked_mul(1024 * 1024))
            .unwrap_or(0);

        let created_at = NaiveDate::parse_from_str(doc.metadata.day.trim(), "%m/%d/%Y")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc());

        Ok(Self {
            id: stem.replace('/', "_"),
            description: format!("Mod {} for {}", name, first.to_uppercase()),
            name,
            version,
            download_url: doc.metadata.link,
            file_size,
            created_at,
            ..Default::default()
        })
    }
}
