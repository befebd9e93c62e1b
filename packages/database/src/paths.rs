#![allow(clippy::module_name_repetitions)]
//! Canonical file paths for the data directory.
//!
//! Everything lives under `data/` at the project root unless
//! `TOLLWAY_DATA_DIR` points somewhere else.

use std::path::{Path, PathBuf};

/// Environment variable overriding the data root.
pub const DATA_DIR_ENV: &str = "TOLLWAY_DATA_DIR";

/// Environment variable overriding the toll store path.
pub const DB_PATH_ENV: &str = "TOLLWAY_DB_PATH";

/// Returns the workspace root directory.
///
/// Resolved at compile time from `CARGO_MANIFEST_DIR`, falling back to the
/// current directory if the manifest is not nested as expected.
#[must_use]
pub fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Returns the `data/` directory path.
#[must_use]
pub fn data_dir() -> PathBuf {
    env_path(DATA_DIR_ENV).unwrap_or_else(|| project_root().join("data"))
}

/// Returns the `data/peajes/` directory holding the input documents.
#[must_use]
pub fn tolls_dir() -> PathBuf {
    data_dir().join("peajes")
}

/// Returns the `data/shared/` directory for shared databases.
#[must_use]
pub fn shared_dir() -> PathBuf {
    data_dir().join("shared")
}

/// Returns the path for the toll `DuckDB` file.
#[must_use]
pub fn toll_db_path() -> PathBuf {
    env_path(DB_PATH_ENV).unwrap_or_else(|| shared_dir().join("tolls.duckdb"))
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
