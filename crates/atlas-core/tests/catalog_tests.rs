//! Catalog scanning integration tests

mod common;

use std::collections::BTreeMap;
use std::rc::Rc;

use atlas_core::{Catalog, CatalogConfig, CatalogError, DataKind, ExtensionMap};
use common::fixtures::{touch, write_csv, write_raster, write_vector};

/// `namespace -> sorted names`
fn snapshot(catalog: &Catalog) -> BTreeMap<String, Vec<String>> {
    catalog
        .namespace_names()
        .into_iter()
        .map(|key| {
            let names = catalog
                .namespace(&key)
                .unwrap()
                .names()
                .into_iter()
                .map(String::from)
                .collect();
            (key, names)
        })
        .collect()
}

// === Scanning ===

#[test]
fn test_scan_builds_namespaces() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write_vector(root, "parcels/lots.shp");
    write_raster(root, "dem/n45.tif");
    write_csv(root, "wells/depths.csv", "depth\n1.0\n");
    touch(root, "wells/notes.txt");
    write_csv(root, "top.csv", "a\n1\n");

    let catalog = Catalog::open(root).unwrap();

    assert_eq!(catalog.namespace_names(), vec!["", "dem", "parcels", "wells"]);
    // lots.shp, lots.shx, lots.dbf, n45.tif, depths.csv, notes.txt, top.csv
    assert_eq!(catalog.all_files().len(), 7);
    assert_eq!(catalog.geo_files().len(), 4);
    assert_eq!(catalog.rasters(), vec![root.join("dem/n45.tif")]);
    assert_eq!(catalog.vectors(), vec![root.join("parcels/lots.shp")]);
    assert_eq!(
        catalog.tables(),
        vec![root.join("top.csv"), root.join("wells/depths.csv")]
    );

    let lots = catalog.handle("parcels", "lots").unwrap();
    let lots = lots.borrow();
    assert_eq!(lots.kind(), DataKind::Vector);
    assert_eq!(lots.name(), "lots");
    assert_eq!(lots.relative_path(), std::path::Path::new("parcels/lots.shp"));
    assert!(!lots.is_loaded());

    assert_eq!(catalog.handle("", "top").unwrap().borrow().kind(), DataKind::Table);
    assert_eq!(catalog.handle_count(), 4);
    assert_eq!(catalog.handles().len(), 4);
}

#[test]
fn test_nested_directories_use_full_relative_key() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "dem/2020/n45.tif");

    let catalog = Catalog::open(dir.path()).unwrap();

    assert_eq!(catalog.namespace_names(), vec!["dem/2020"]);
    assert!(catalog.handle("dem/2020", "n45").is_ok());
}

#[test]
fn test_update_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "a/x.csv");
    touch(dir.path(), "a/y.tif");
    touch(dir.path(), "b/z.shp");

    let catalog = Catalog::open(dir.path()).unwrap();
    let before = snapshot(&catalog);
    let handle_before = catalog.handle("a", "x").unwrap();

    catalog.update().unwrap();

    assert_eq!(snapshot(&catalog), before);
    assert!(Rc::ptr_eq(&handle_before, &catalog.handle("a", "x").unwrap()));
}

#[test]
fn test_extension_case_matching() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "roads/upper.SHP");
    touch(dir.path(), "roads/lower.shp");
    touch(dir.path(), "roads/mixed.Shp");

    let catalog = Catalog::open(dir.path()).unwrap();

    assert_eq!(catalog.vectors().len(), 2);
    assert_eq!(catalog.namespace("roads").unwrap().names(), vec!["lower", "upper"]);
}

// === Registration rules ===

#[test]
fn test_same_name_in_one_scan_keeps_first_kind() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "site/survey.csv");
    touch(dir.path(), "site/survey.tif");

    let catalog = Catalog::open(dir.path()).unwrap();

    let survey = catalog.handle("site", "survey").unwrap();
    assert_eq!(survey.borrow().kind(), DataKind::Raster);
    assert_eq!(catalog.geo_files().len(), 2);
}

#[test]
fn test_later_file_does_not_replace_handle() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "site/survey.csv");
    let catalog = Catalog::open(dir.path()).unwrap();
    let original = catalog.handle("site", "survey").unwrap();

    touch(dir.path(), "site/survey.tif");
    catalog.update().unwrap();

    let current = catalog.handle("site", "survey").unwrap();
    assert!(Rc::ptr_eq(&original, &current));
    assert_eq!(current.borrow().kind(), DataKind::Table);
    assert_eq!(catalog.rasters().len(), 1);
}

#[test]
fn test_namespace_survives_file_removal() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "gone/x.csv");
    touch(dir.path(), "kept/y.csv");
    let catalog = Catalog::open(dir.path()).unwrap();

    std::fs::remove_dir_all(dir.path().join("gone")).unwrap();
    catalog.update().unwrap();

    assert!(catalog.has_namespace("gone"));
    assert!(catalog.handle("gone", "x").is_ok());
    assert_eq!(catalog.tables(), vec![dir.path().join("kept/y.csv")]);
}

#[test]
fn test_new_files_appear_after_update() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "a/x.csv");
    let catalog = Catalog::open(dir.path()).unwrap();
    assert!(!catalog.has_namespace("b"));

    touch(dir.path(), "b/y.csv");
    catalog.update().unwrap();

    assert!(catalog.handle("b", "y").is_ok());
}

// === Lookup ===

#[test]
fn test_lookup_failures() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "parcels/lots.shp");
    let catalog = Catalog::open(dir.path()).unwrap();

    assert!(matches!(
        catalog.namespace("roads").unwrap_err(),
        CatalogError::NamespaceNotFound(_)
    ));
    assert!(matches!(
        catalog.handle("parcels", "roads").unwrap_err(),
        CatalogError::HandleNotFound { .. }
    ));
}

#[test]
fn test_empty_root() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = Catalog::open(dir.path()).unwrap();

    assert!(catalog.namespace_names().is_empty());
    assert!(catalog.all_files().is_empty());
    assert_eq!(catalog.root(), dir.path());
}

// === Configuration ===

#[test]
fn test_custom_extensions() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "d/a.tiff");
    touch(dir.path(), "d/b.tsv");
    touch(dir.path(), "d/c.csv");

    let extensions = ExtensionMap::empty()
        .with(DataKind::Raster, ["tiff"])
        .with(DataKind::Table, ["tsv"]);
    let catalog = Catalog::with_extensions(dir.path(), extensions).unwrap();

    assert_eq!(catalog.rasters(), vec![dir.path().join("d/a.tiff")]);
    assert_eq!(catalog.tables(), vec![dir.path().join("d/b.tsv")]);
    assert_eq!(catalog.namespace("d").unwrap().names(), vec!["a", "b"]);
}

#[test]
fn test_config_loaded_from_toml_file() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    touch(&data, "grids/g.tif");
    touch(&data, ".scratch/tmp.csv");
    let config_path = write_csv(
        dir.path(),
        "atlas.toml",
        "include_hidden = false\n\n[extensions]\nraster = [\"*.tif\"]\ntable = [\"*.csv\"]\n",
    );

    let config = CatalogConfig::load(&config_path).unwrap();
    let catalog = Catalog::with_config(&data, config).unwrap();

    assert_eq!(catalog.namespace_names(), vec!["grids"]);
    assert!(!catalog.config().include_hidden);
}
