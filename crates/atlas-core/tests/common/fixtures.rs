//! Scratch directory trees for catalog tests

use std::path::{Path, PathBuf};

use atlas_core::atlas_io::shapefile::{Point, Shape};
use atlas_core::atlas_io::{
    DataColumn, DataTable, GeoKeys, GeoTiffCodec, PayloadCodec, RasterData, RasterPayload,
    ShapefileCodec, VectorTable,
};
use ndarray::Array3;

/// Create parent directories for `rel` and return the full path
#[allow(dead_code)]
pub fn prepare(root: &Path, rel: &str) -> PathBuf {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    path
}

/// Create an empty file
#[allow(dead_code)]
pub fn touch(root: &Path, rel: &str) -> PathBuf {
    let path = prepare(root, rel);
    std::fs::write(&path, b"").unwrap();
    path
}

/// Write CSV text
#[allow(dead_code)]
pub fn write_csv(root: &Path, rel: &str, content: &str) -> PathBuf {
    let path = prepare(root, rel);
    std::fs::write(&path, content).unwrap();
    path
}

/// A small geo-referenced elevation grid
#[allow(dead_code)]
pub fn sample_raster() -> RasterPayload {
    let array = Array3::from_shape_fn((1, 4, 3), |(_, r, c)| 100.0 + (r * 3 + c) as f32);
    let geo = GeoKeys {
        pixel_scale: Some(vec![10.0, 10.0, 0.0]),
        tie_points: Some(vec![0.0, 0.0, 0.0, 500000.0, 4100000.0, 0.0]),
        key_directory: Some(vec![1, 1, 0, 1, 3072, 0, 1, 32610]),
        nodata: Some("-9999".to_string()),
        ..GeoKeys::default()
    };
    RasterPayload::new(RasterData::F32(array), geo)
}

#[allow(dead_code)]
pub fn write_raster(root: &Path, rel: &str) -> PathBuf {
    let path = prepare(root, rel);
    GeoTiffCodec.write(&sample_raster(), &path).unwrap();
    path
}

/// Two labelled points
#[allow(dead_code)]
pub fn sample_vector() -> VectorTable {
    let attributes = DataTable::new()
        .with_column("id", DataColumn::Int32(vec![1, 2]))
        .unwrap()
        .with_column(
            "name",
            DataColumn::String(vec!["alpha".to_string(), "beta".to_string()]),
        )
        .unwrap();
    VectorTable::new(
        vec![
            Shape::Point(Point::new(10.0, 20.0)),
            Shape::Point(Point::new(11.5, 21.5)),
        ],
        attributes,
    )
    .unwrap()
}

#[allow(dead_code)]
pub fn write_vector(root: &Path, rel: &str) -> PathBuf {
    let path = prepare(root, rel);
    ShapefileCodec.write(&sample_vector(), &path).unwrap();
    path
}
