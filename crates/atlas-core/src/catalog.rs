//! Directory catalog
//!
//! The catalog walks a root directory, classifies files by extension and
//! registers one [`DataHandle`] per matching file, grouped into namespaces
//! by parent directory:
//!
//! ```text
//! /data/parcels/lots.shp   -> namespace "parcels", name "lots"
//! /data/dem/2020/n45.tif   -> namespace "dem/2020", name "n45"
//! /data/wells.csv          -> namespace "",         name "wells"
//! ```
//!
//! `update()` recomputes the file lists from scratch but only ever adds to
//! the namespace registry. Namespaces and handles whose files disappear
//! stay registered, and an occupied name slot is never overwritten.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::config::{CatalogConfig, DataKind, ExtensionMap};
use crate::error::{CatalogError, CatalogResult};
use crate::handle::DataHandle;
use crate::namespace::{Namespace, SharedHandle};
use crate::path::{namespace_key, short_name};

#[derive(Debug)]
struct CatalogState {
    root: PathBuf,
    config: CatalogConfig,
    all_files: Vec<PathBuf>,
    geo_files: Vec<PathBuf>,
    rasters: Vec<PathBuf>,
    vectors: Vec<PathBuf>,
    tables: Vec<PathBuf>,
    namespaces: BTreeMap<String, Namespace>,
}

/// Registry of the data files under a root directory.
///
/// `Catalog` is a cheap, reference-counted handle: clones share the same
/// registry.
#[derive(Debug, Clone)]
pub struct Catalog {
    inner: Rc<RefCell<CatalogState>>,
}

/// Non-owning reference from a data handle back to its catalog
#[derive(Debug, Clone, Default)]
pub struct CatalogRef(Weak<RefCell<CatalogState>>);

impl CatalogRef {
    /// The catalog, if it is still alive
    pub fn upgrade(&self) -> Option<Catalog> {
        self.0.upgrade().map(|inner| Catalog { inner })
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl Catalog {
    /// Scan `root` with the default extensions (`tif`, `shp`, `csv`)
    pub fn open(root: impl Into<PathBuf>) -> CatalogResult<Self> {
        Self::with_config(root, CatalogConfig::default())
    }

    /// Scan `root` with custom extensions
    pub fn with_extensions(root: impl Into<PathBuf>, extensions: ExtensionMap) -> CatalogResult<Self> {
        Self::with_config(root, CatalogConfig::with_extensions(extensions))
    }

    /// Scan `root` with a full configuration
    pub fn with_config(root: impl Into<PathBuf>, config: CatalogConfig) -> CatalogResult<Self> {
        let catalog = Self {
            inner: Rc::new(RefCell::new(CatalogState {
                root: root.into(),
                config,
                all_files: Vec::new(),
                geo_files: Vec::new(),
                rasters: Vec::new(),
                vectors: Vec::new(),
                tables: Vec::new(),
                namespaces: BTreeMap::new(),
            })),
        };
        catalog.update()?;
        Ok(catalog)
    }

    /// Re-scan the root directory.
    ///
    /// File lists are replaced. New namespaces are created for new
    /// directories, and new files are attached only where their name slot
    /// is still empty. Walk errors abort the update before any state
    /// changes.
    pub fn update(&self) -> CatalogResult<()> {
        let (root, config) = {
            let state = self.inner.borrow();
            (state.root.clone(), state.config.clone())
        };

        let all_files = list_files(&root, &config)?;

        let mut geo_files = Vec::new();
        let mut rasters = Vec::new();
        let mut vectors = Vec::new();
        let mut tables = Vec::new();
        for file in &all_files {
            let Some(kind) = config.extensions.classify(file) else {
                continue;
            };
            geo_files.push(file.clone());
            match kind {
                DataKind::Raster => rasters.push(file.clone()),
                DataKind::Vector => vectors.push(file.clone()),
                DataKind::Table => tables.push(file.clone()),
            }
        }

        let mut keys = BTreeMap::new();
        for file in &geo_files {
            keys.insert(file.clone(), namespace_key(file, &root)?);
        }

        let back_ref = self.downgrade();
        let mut state = self.inner.borrow_mut();

        for key in keys.values() {
            if !state.namespaces.contains_key(key) {
                state
                    .namespaces
                    .insert(key.clone(), Namespace::new(key.clone()));
            }
        }

        let mut registered = 0;
        for (kind, files) in [
            (DataKind::Raster, &rasters),
            (DataKind::Vector, &vectors),
            (DataKind::Table, &tables),
        ] {
            for file in files {
                let key = &keys[file];
                let name = short_name(file);
                let namespace = state
                    .namespaces
                    .entry(key.clone())
                    .or_insert_with(|| Namespace::new(key.clone()));
                if namespace.contains(&name) {
                    debug!(path = %file.display(), namespace = %key, name = %name, "name taken, skipping");
                    continue;
                }
                let handle = DataHandle::new(file.clone(), kind, root.clone(), Some(back_ref.clone()))?;
                namespace.insert_if_absent(name, Rc::new(RefCell::new(handle)));
                registered += 1;
            }
        }

        debug!(
            root = %root.display(),
            files = all_files.len(),
            geo_files = geo_files.len(),
            namespaces = state.namespaces.len(),
            registered,
            "catalog updated"
        );

        state.all_files = all_files;
        state.geo_files = geo_files;
        state.rasters = rasters;
        state.vectors = vectors;
        state.tables = tables;

        Ok(())
    }

    /// Weak reference for data handles
    pub fn downgrade(&self) -> CatalogRef {
        CatalogRef(Rc::downgrade(&self.inner))
    }

    pub fn root(&self) -> PathBuf {
        self.inner.borrow().root.clone()
    }

    pub fn config(&self) -> CatalogConfig {
        self.inner.borrow().config.clone()
    }

    /// Every file under the root from the last scan
    pub fn all_files(&self) -> Vec<PathBuf> {
        self.inner.borrow().all_files.clone()
    }

    /// Raster, vector and table files from the last scan
    pub fn geo_files(&self) -> Vec<PathBuf> {
        self.inner.borrow().geo_files.clone()
    }

    pub fn rasters(&self) -> Vec<PathBuf> {
        self.inner.borrow().rasters.clone()
    }

    pub fn vectors(&self) -> Vec<PathBuf> {
        self.inner.borrow().vectors.clone()
    }

    pub fn tables(&self) -> Vec<PathBuf> {
        self.inner.borrow().tables.clone()
    }

    /// Namespace keys in sorted order
    pub fn namespace_names(&self) -> Vec<String> {
        self.inner.borrow().namespaces.keys().cloned().collect()
    }

    pub fn has_namespace(&self, name: &str) -> bool {
        self.inner.borrow().namespaces.contains_key(name)
    }

    /// Get a namespace by key
    pub fn namespace(&self, name: &str) -> CatalogResult<Namespace> {
        self.inner
            .borrow()
            .namespaces
            .get(name)
            .cloned()
            .ok_or_else(|| CatalogError::NamespaceNotFound(name.to_string()))
    }

    /// Get a handle by namespace key and short name
    pub fn handle(&self, namespace: &str, name: &str) -> CatalogResult<SharedHandle> {
        self.namespace(namespace)?
            .get(name)
            .ok_or_else(|| CatalogError::HandleNotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    /// Every registered handle as `(namespace, name, handle)`
    pub fn handles(&self) -> Vec<(String, String, SharedHandle)> {
        let state = self.inner.borrow();
        state
            .namespaces
            .iter()
            .flat_map(|(key, ns)| {
                ns.iter()
                    .map(move |(name, handle)| (key.clone(), name.to_string(), handle.clone()))
            })
            .collect()
    }

    /// Number of registered handles
    pub fn handle_count(&self) -> usize {
        self.inner
            .borrow()
            .namespaces
            .values()
            .map(|ns| ns.len())
            .sum()
    }
}

/// Every file under `root`, sorted
fn list_files(root: &Path, config: &CatalogConfig) -> CatalogResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut ancestors = HashSet::new();
    walk(root, config, &mut ancestors, &mut files)?;
    files.sort();
    Ok(files)
}

fn walk(
    dir: &Path,
    config: &CatalogConfig,
    ancestors: &mut HashSet<PathBuf>,
    files: &mut Vec<PathBuf>,
) -> CatalogResult<()> {
    // a directory that is its own ancestor is a symlink cycle
    let canonical = if config.follow_links {
        let canonical = dir.canonicalize().map_err(|e| CatalogError::io(dir, e))?;
        if !ancestors.insert(canonical.clone()) {
            return Ok(());
        }
        Some(canonical)
    } else {
        None
    };

    for entry in std::fs::read_dir(dir).map_err(|e| CatalogError::io(dir, e))? {
        let entry = entry.map_err(|e| CatalogError::io(dir, e))?;
        let path = entry.path();

        if !config.include_hidden && entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }

        let file_type = entry.file_type().map_err(|e| CatalogError::io(&path, e))?;
        let is_dir = if file_type.is_symlink() {
            // a dangling link is listed like a file
            let points_to_dir = std::fs::metadata(&path)
                .map(|m| m.is_dir())
                .unwrap_or(false);
            if points_to_dir && !config.follow_links {
                continue;
            }
            points_to_dir
        } else {
            file_type.is_dir()
        };

        if is_dir {
            walk(&path, config, ancestors, files)?;
        } else {
            files.push(path);
        }
    }

    if let Some(canonical) = canonical {
        ancestors.remove(&canonical);
    }

    Ok(())
}
