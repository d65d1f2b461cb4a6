// src/catalog/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::catalog::model::{Catalog, RawCatalogFile};
use crate::errors::Result;

/// Load a catalog file and return the raw [`RawCatalogFile`].
///
/// This only performs TOML deserialization; ordering, uniqueness and check
/// validation happen in [`load_and_validate`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawCatalogFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let raw: RawCatalogFile = toml::from_str(&contents)?;

    Ok(raw)
}

/// Load a catalog file and validate it.
///
/// A relative `storage_dir` is resolved against the catalog's directory so
/// progress lands next to the catalog regardless of the working directory.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Catalog> {
    let path = path.as_ref();
    let mut raw = load_from_path(path)?;

    if raw.config.storage_dir.is_relative() {
        raw.config.storage_dir = catalog_root_dir(path).join(&raw.config.storage_dir);
    }

    let catalog = Catalog::try_from(raw)?;
    debug!(
        path = %path.display(),
        courses = catalog.courses().len(),
        "catalog loaded"
    );
    Ok(catalog)
}

/// Directory containing the catalog file, or `.` for a bare file name.
pub fn catalog_root_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
