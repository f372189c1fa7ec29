//! Lazily loaded data handles
//!
//! A `DataHandle` names one file on disk. Nothing is read until `get()`;
//! after that the whole file lives in the handle's [`Payload`] until it is
//! re-read, replaced or taken.

use std::path::{Path, PathBuf};

use atlas_io::{
    CsvCodec, DataTable, GeoTiffCodec, PayloadCodec, RasterPayload, ShapefileCodec, VectorTable,
};
use tracing::{debug, info, warn};

use crate::catalog::CatalogRef;
use crate::config::DataKind;
use crate::error::{CatalogError, CatalogResult};
use crate::path::{relative_path, short_name};

/// In-memory contents of a data handle
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Payload {
    /// Nothing has been read yet (distinct from an empty payload)
    #[default]
    NotLoaded,
    Raster(RasterPayload),
    VectorTable(VectorTable),
    FlatTable(DataTable),
}

impl Payload {
    pub fn is_loaded(&self) -> bool {
        !matches!(self, Payload::NotLoaded)
    }

    /// The data kind this payload can be written as
    pub fn kind(&self) -> Option<DataKind> {
        match self {
            Payload::NotLoaded => None,
            Payload::Raster(_) => Some(DataKind::Raster),
            Payload::VectorTable(_) => Some(DataKind::Vector),
            Payload::FlatTable(_) => Some(DataKind::Table),
        }
    }

    pub fn variant_name(&self) -> &'static str {
        match self {
            Payload::NotLoaded => "not loaded",
            Payload::Raster(_) => "raster",
            Payload::VectorTable(_) => "vector table",
            Payload::FlatTable(_) => "flat table",
        }
    }

    pub fn as_raster(&self) -> Option<&RasterPayload> {
        match self {
            Payload::Raster(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_raster_mut(&mut self) -> Option<&mut RasterPayload> {
        match self {
            Payload::Raster(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&VectorTable> {
        match self {
            Payload::VectorTable(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_vector_mut(&mut self) -> Option<&mut VectorTable> {
        match self {
            Payload::VectorTable(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&DataTable> {
        match self {
            Payload::FlatTable(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_table_mut(&mut self) -> Option<&mut DataTable> {
        match self {
            Payload::FlatTable(t) => Some(t),
            _ => None,
        }
    }
}

/// One raster, vector or table file, loadable on demand
#[derive(Debug)]
pub struct DataHandle {
    path: PathBuf,
    kind: DataKind,
    root: PathBuf,
    relative_path: PathBuf,
    name: String,
    payload: Payload,
    catalog: Option<CatalogRef>,
}

impl DataHandle {
    /// Create a handle for `path`, which must lie under `root`.
    ///
    /// `catalog` is the catalog to re-scan after a save, if any.
    pub fn new(
        path: impl Into<PathBuf>,
        kind: DataKind,
        root: impl Into<PathBuf>,
        catalog: Option<CatalogRef>,
    ) -> CatalogResult<Self> {
        let path = path.into();
        let root = root.into();
        let relative_path = relative_path(&path, &root)?;
        let name = short_name(&path);

        Ok(Self {
            path,
            kind,
            root,
            relative_path,
            name,
            payload: Payload::NotLoaded,
            catalog,
        })
    }

    /// Full path of the file
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> DataKind {
        self.kind
    }

    /// Root directory the handle was created against
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path relative to the root
    pub fn relative_path(&self) -> &Path {
        &self.relative_path
    }

    /// File name without extension
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut Payload {
        &mut self.payload
    }

    /// Replace the payload; nothing is checked until the next save
    pub fn set_payload(&mut self, payload: Payload) {
        self.payload = payload;
    }

    /// Move the payload out, leaving the handle unloaded
    pub fn take_payload(&mut self) -> Payload {
        std::mem::take(&mut self.payload)
    }

    pub fn is_loaded(&self) -> bool {
        self.payload.is_loaded()
    }

    /// Read the whole file, replacing any previous payload
    pub fn get(&mut self) -> CatalogResult<()> {
        let payload = match self.kind {
            DataKind::Raster => Payload::Raster(GeoTiffCodec.read(&self.path)?),
            DataKind::Vector => Payload::VectorTable(ShapefileCodec.read(&self.path)?),
            DataKind::Table => {
                Payload::FlatTable(CsvCodec::for_path(&self.path).read(&self.path)?)
            }
        };
        debug!(path = %self.path.display(), kind = %self.kind, "loaded payload");
        self.payload = payload;
        Ok(())
    }

    /// Write the payload back to the original file, then re-scan the
    /// owning catalog.
    pub fn save(&self) -> CatalogResult<()> {
        self.write_to(&self.path)?;
        self.refresh_catalog()
    }

    /// Write the payload to `path`, then re-scan the owning catalog.
    ///
    /// Missing parent directories of `path` are created.
    pub fn save_as(&self, path: impl AsRef<Path>) -> CatalogResult<()> {
        self.write_to(path.as_ref())?;
        self.refresh_catalog()
    }

    fn write_to(&self, dest: &Path) -> CatalogResult<()> {
        match (self.kind, &self.payload) {
            (_, Payload::NotLoaded) => {
                return Err(CatalogError::NotLoaded {
                    path: self.path.clone(),
                })
            }
            (kind, payload) if payload.kind() != Some(kind) => {
                return Err(CatalogError::PayloadMismatch {
                    kind,
                    payload: payload.variant_name(),
                })
            }
            _ => {}
        }

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CatalogError::io(parent, e))?;
        }

        match &self.payload {
            Payload::Raster(raster) => GeoTiffCodec.write(raster, dest)?,
            Payload::VectorTable(table) => ShapefileCodec.write(table, dest)?,
            Payload::FlatTable(table) => CsvCodec::for_path(dest).write(table, dest)?,
            Payload::NotLoaded => {}
        }
        info!(path = %dest.display(), kind = %self.kind, "saved payload");
        Ok(())
    }

    fn refresh_catalog(&self) -> CatalogResult<()> {
        let Some(catalog_ref) = &self.catalog else {
            return Ok(());
        };
        match catalog_ref.upgrade() {
            Some(catalog) => catalog.update(),
            None => {
                warn!(path = %self.path.display(), "catalog dropped, skipping refresh");
                Ok(())
            }
        }
    }
}
