//! Data kinds and scan configuration
//!
//! A catalog is configured with the extensions that mark each kind of data.
//! The configuration can be built in code or loaded from TOML:
//!
//! ```toml
//! follow_links = false
//! include_hidden = true
//!
//! [extensions]
//! raster = ["tif", "tiff"]
//! vector = ["shp"]
//! table = ["csv", "tsv"]
//! ```
//!
//! Extensions may be written as `tif`, `.tif` or `*.tif`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, CatalogResult};

/// Kind of data a file holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    Raster,
    Vector,
    Table,
}

impl DataKind {
    /// All kinds, in the order files are classified and registered
    pub const ALL: [DataKind; 3] = [DataKind::Raster, DataKind::Vector, DataKind::Table];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::Raster => "raster",
            DataKind::Vector => "vector",
            DataKind::Table => "table",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataKind {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raster" => Ok(DataKind::Raster),
            "vector" => Ok(DataKind::Vector),
            "table" => Ok(DataKind::Table),
            other => Err(CatalogError::Config(format!("unknown data kind: {}", other))),
        }
    }
}

/// Accepted file extensions per data kind.
///
/// A file matches an extension when its own extension is identical to it
/// or to its upper-cased form. `tif` therefore matches `.tif` and `.TIF`
/// but not `.Tif`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<DataKind, Vec<String>>", into = "BTreeMap<DataKind, Vec<String>>")]
pub struct ExtensionMap {
    kinds: BTreeMap<DataKind, Vec<String>>,
}

impl ExtensionMap {
    /// A map that matches nothing
    pub fn empty() -> Self {
        Self {
            kinds: BTreeMap::new(),
        }
    }

    /// Add accepted extensions for `kind` (builder style)
    pub fn with<I, S>(mut self, kind: DataKind, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for ext in extensions {
            self.insert(kind, ext.as_ref());
        }
        self
    }

    /// Add one accepted extension for `kind`
    pub fn insert(&mut self, kind: DataKind, extension: &str) {
        let ext = normalize(extension);
        if ext.is_empty() {
            return;
        }
        let entry = self.kinds.entry(kind).or_default();
        if !entry.contains(&ext) {
            entry.push(ext);
        }
    }

    /// Replace the accepted extensions for `kind`
    pub fn set<I, S>(&mut self, kind: DataKind, extensions: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.kinds.remove(&kind);
        for ext in extensions {
            self.insert(kind, ext.as_ref());
        }
    }

    /// Accepted extensions for `kind`
    pub fn extensions(&self, kind: DataKind) -> &[String] {
        self.kinds.get(&kind).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Does `path` carry one of the extensions accepted for `kind`
    pub fn matches(&self, kind: DataKind, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        self.extensions(kind)
            .iter()
            .any(|accepted| ext == accepted || ext == accepted.to_uppercase())
    }

    /// First kind (raster, vector, table) whose extensions match `path`
    pub fn classify(&self, path: &Path) -> Option<DataKind> {
        DataKind::ALL
            .into_iter()
            .find(|&kind| self.matches(kind, path))
    }
}

impl Default for ExtensionMap {
    fn default() -> Self {
        Self::empty()
            .with(DataKind::Raster, ["tif"])
            .with(DataKind::Vector, ["shp"])
            .with(DataKind::Table, ["csv"])
    }
}

impl From<BTreeMap<DataKind, Vec<String>>> for ExtensionMap {
    fn from(raw: BTreeMap<DataKind, Vec<String>>) -> Self {
        raw.into_iter()
            .fold(Self::empty(), |map, (kind, exts)| map.with(kind, exts))
    }
}

impl From<ExtensionMap> for BTreeMap<DataKind, Vec<String>> {
    fn from(map: ExtensionMap) -> Self {
        map.kinds
    }
}

fn normalize(extension: &str) -> String {
    let ext = extension.trim();
    let ext = ext.strip_prefix("*.").unwrap_or(ext);
    let ext = ext.strip_prefix('.').unwrap_or(ext);
    ext.to_string()
}

/// Catalog scan configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Extensions accepted per data kind
    pub extensions: ExtensionMap,

    /// Descend into symlinked directories
    pub follow_links: bool,

    /// Scan dot-files and dot-directories
    pub include_hidden: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            extensions: ExtensionMap::default(),
            follow_links: false,
            include_hidden: true,
        }
    }
}

impl CatalogConfig {
    /// Use custom extensions with default scan switches
    pub fn with_extensions(extensions: ExtensionMap) -> Self {
        Self {
            extensions,
            ..Self::default()
        }
    }

    /// Parse a configuration from TOML text
    pub fn from_toml_str(content: &str) -> CatalogResult<Self> {
        toml::from_str(content).map_err(|e| CatalogError::Config(e.to_string()))
    }

    /// Load a configuration from a TOML file
    pub fn load(path: &Path) -> CatalogResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CatalogError::io(path, e))?;
        Self::from_toml_str(&content)
    }
}
