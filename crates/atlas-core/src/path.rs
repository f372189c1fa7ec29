//! Path helpers relating scanned files to the catalog root

use std::path::{Path, PathBuf};

use crate::error::{CatalogError, CatalogResult};

/// Path of `full` relative to `root`
pub fn relative_path(full: &Path, root: &Path) -> CatalogResult<PathBuf> {
    full.strip_prefix(root)
        .map(Path::to_path_buf)
        .map_err(|_| CatalogError::OutsideRoot {
            path: full.to_path_buf(),
            root: root.to_path_buf(),
        })
}

/// Namespace key of a file: its parent directory relative to `root`,
/// joined with `/`. Files directly under `root` get the empty key.
pub fn namespace_key(full: &Path, root: &Path) -> CatalogResult<String> {
    let relative = relative_path(full, root)?;
    let key = relative
        .parent()
        .map(|parent| {
            parent
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default();
    Ok(key)
}

/// File name without its final extension
pub fn short_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_path() {
        let rel = relative_path(Path::new("/data/parcels/lots.shp"), Path::new("/data")).unwrap();
        assert_eq!(rel, PathBuf::from("parcels/lots.shp"));
    }

    #[test]
    fn test_relative_path_outside_root() {
        let err = relative_path(Path::new("/elsewhere/lots.shp"), Path::new("/data")).unwrap_err();
        assert!(matches!(err, CatalogError::OutsideRoot { .. }));
    }

    #[test]
    fn test_namespace_key() {
        let root = Path::new("/data");
        assert_eq!(
            namespace_key(Path::new("/data/parcels/lots.shp"), root).unwrap(),
            "parcels"
        );
        assert_eq!(
            namespace_key(Path::new("/data/a/b/c.tif"), root).unwrap(),
            "a/b"
        );
        assert_eq!(namespace_key(Path::new("/data/top.csv"), root).unwrap(), "");
    }

    #[test]
    fn test_short_name() {
        assert_eq!(short_name(Path::new("/data/parcels/lots.shp")), "lots");
        assert_eq!(short_name(Path::new("my.lots.SHP")), "my.lots");
        assert_eq!(short_name(Path::new("README")), "README");
    }
}
