//! atlas-core - Directory catalog for geospatial and tabular files
//!
//! This crate maps a directory tree onto a two-level registry:
//!
//! - **Catalog**: walks a root directory and classifies files by extension
//! - **Namespace**: one per subdirectory holding matching files
//! - **DataHandle**: one per file, loaded on demand and written back in place
//!   or to a new path
//!
//! ```no_run
//! use atlas_core::{Catalog, CatalogResult};
//!
//! fn main() -> CatalogResult<()> {
//!     let catalog = Catalog::open("/data")?;
//!     let lots = catalog.handle("parcels", "lots")?;
//!     lots.borrow_mut().get()?;
//!     lots.borrow().save_as("/data/parcels/lots_copy.shp")?;
//!     Ok(())
//! }
//! ```
//!
//! Payload encoding is delegated to `atlas-io`.

pub mod catalog;
pub mod config;
pub mod error;
pub mod handle;
pub mod namespace;
pub mod path;

pub use catalog::{Catalog, CatalogRef};
pub use config::{CatalogConfig, DataKind, ExtensionMap};
pub use error::{CatalogError, CatalogResult};
pub use handle::{DataHandle, Payload};
pub use namespace::{Namespace, SharedHandle};

pub use atlas_io;
