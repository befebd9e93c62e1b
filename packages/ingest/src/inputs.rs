//! Input document discovery.
//!
//! Both documents default to files in `data/peajes/`: the fare table is
//! always `precios.json`; the geo reference is re-exported with a date in
//! its name, so the most recently modified `peajes_georeferencias_*.json`
//! is used.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::IngestError;

/// File name of the fare table.
pub const FARES_FILE_NAME: &str = "precios.json";

/// File name prefix of geo reference exports.
pub const GEOREF_PREFIX: &str = "peajes_georeferencias_";

/// File name suffix of geo reference exports.
pub const GEOREF_SUFFIX: &str = ".json";

/// The two documents a load reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputPaths {
    /// Fare table.
    pub fares: PathBuf,
    /// Geo reference.
    pub georef: PathBuf,
}

/// Returns the most recently modified file in `dir` whose name starts with
/// `prefix` and ends with `suffix`.
///
/// Ties on modification time go to the lexically greatest name. A missing
/// directory yields `None`.
///
/// # Errors
///
/// Returns an I/O error if the directory exists but cannot be listed.
pub fn find_latest_file(
    dir: &Path,
    prefix: &str,
    suffix: &str,
) -> std::io::Result<Option<PathBuf>> {
    if !dir.is_dir() {
        return Ok(None);
    }

    let mut latest: Option<(SystemTime, String, PathBuf)> = None;

    for entry in std::fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.starts_with(prefix) || !name.ends_with(suffix) {
            continue;
        }

        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let name = name.to_string();

        let newer = latest
            .as_ref()
            .is_none_or(|(t, n, _)| (modified, &name) > (*t, n));
        if newer {
            latest = Some((modified, name, path));
        }
    }

    Ok(latest.map(|(_, _, path)| path))
}

/// Resolves input paths, using explicit paths where given and the defaults
/// in `dir` otherwise.
///
/// # Errors
///
/// Returns [`IngestError::InputMissing`] if the fare table does not exist
/// or no geo reference can be found.
pub fn resolve_inputs_in(
    dir: &Path,
    fares: Option<&Path>,
    georef: Option<&Path>,
) -> Result<InputPaths, IngestError> {
    let fares = fares.map_or_else(|| dir.join(FARES_FILE_NAME), Path::to_path_buf);
    if !fares.is_file() {
        return Err(IngestError::InputMissing {
            expected: format!("fare table at {}", fares.display()),
        });
    }

    let georef = match georef {
        Some(path) if path.is_file() => path.to_path_buf(),
        Some(path) => {
            return Err(IngestError::InputMissing {
                expected: format!("geo reference at {}", path.display()),
            });
        }
        None => find_latest_file(dir, GEOREF_PREFIX, GEOREF_SUFFIX)?.ok_or_else(|| {
            IngestError::InputMissing {
                expected: format!(
                    "a {GEOREF_PREFIX}*{GEOREF_SUFFIX} geo reference in {}",
                    dir.display()
                ),
            }
        })?,
    };

    Ok(InputPaths { fares, georef })
}

/// Resolves input paths against the default `data/peajes/` directory.
///
/// # Errors
///
/// See [`resolve_inputs_in`].
pub fn resolve_inputs(
    fares: Option<&Path>,
    georef: Option<&Path>,
) -> Result<InputPaths, IngestError> {
    resolve_inputs_in(&tollway_database::paths::tolls_dir(), fares, georef)
}
