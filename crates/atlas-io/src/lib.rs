//! atlas-io - Payload codecs for geospatial and tabular files
//!
//! This crate materializes whole files into memory and writes them back:
//!
//! - **GeoTIFF**: band-major raster arrays plus a geo-referencing profile
//! - **Shapefile**: geometry column plus dBASE attribute columns
//! - **CSV**: flat tables with type inference, header row, no index column
//!
//! # Design
//!
//! All codecs implement the `PayloadCodec` trait. There is no partial or
//! streaming access; callers get the full payload or an error.

pub mod codec;
pub mod schema;

#[cfg(feature = "csv")]
pub mod csv_codec;

#[cfg(feature = "tiff")]
pub mod tiff_codec;

#[cfg(feature = "shapefile")]
pub mod shp_codec;

pub use codec::*;
pub use schema::*;

#[cfg(feature = "csv")]
pub use csv_codec::CsvCodec;

#[cfg(feature = "tiff")]
pub use tiff_codec::{GeoKeys, GeoTiffCodec, RasterData, RasterDtype, RasterPayload, RasterProfile};

#[cfg(feature = "shapefile")]
pub use shp_codec::{FieldSpec, ShapefileCodec, VectorTable};

// Re-exported so callers can build geometries without a direct dependency
#[cfg(feature = "shapefile")]
pub use shapefile;
