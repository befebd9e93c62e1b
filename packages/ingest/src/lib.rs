#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Library for loading toll fare tables into the toll database.
//!
//! A load resolves and parses both input documents before touching the
//! store, then reconciles the fare table inside a single transaction: the
//! store either holds the complete new data set or is left untouched.

pub mod inputs;
pub mod report;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tollway_database::{DbError, paths, toll_db};
use tollway_fare::location::GeoLookup;
use tollway_fare::progress::ProgressCallback;
use tollway_fare::{ReconcileError, reconcile};
use tollway_fare::sink::MemorySink;
use tollway_fare_models::{
    DocumentSummary, FareDocument, GeoReferenceDocument, ReconcileSummary, TollCounts,
};

use crate::inputs::InputPaths;

/// Errors that can occur while loading tolls.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// An input document or the store could not be found.
    #[error("Missing input: expected {expected}")]
    InputMissing {
        /// What was looked for, and where.
        expected: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A document is not valid JSON of the expected shape.
    #[error("Failed to parse {}: {source}", .path.display())]
    Json {
        /// The offending document.
        path: PathBuf,
        /// The parse error.
        source: serde_json::Error,
    },

    /// Store error outside the load transaction.
    #[error(transparent)]
    Db(#[from] DbError),

    /// The load transaction failed and was rolled back.
    #[error("Load rolled back: {source}")]
    RolledBack {
        /// What had been reconciled when the load failed.
        summary: ReconcileSummary,
        /// What made the load fail.
        source: DbError,
    },
}

/// What to load, and where to.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Fare table path; defaults to `data/peajes/precios.json`.
    pub fares: Option<PathBuf>,
    /// Geo reference path; defaults to the latest export in `data/peajes/`.
    pub georef: Option<PathBuf>,
    /// Store path; defaults to `TOLLWAY_DB_PATH` or `data/shared/tolls.duckdb`.
    pub db: Option<PathBuf>,
    /// Reconcile into memory only.
    pub dry_run: bool,
}

/// Result of a successful load.
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    /// Documents that were read.
    pub inputs: InputPaths,
    /// Store written to; `None` for dry runs.
    pub store: Option<PathBuf>,
    /// What the reconciliation did.
    pub summary: ReconcileSummary,
    /// Table counts after commit; `None` for dry runs.
    pub counts: Option<TollCounts>,
}

/// Counts and last-load metadata of a toll store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    /// Store path.
    pub path: PathBuf,
    /// Current table counts.
    pub counts: TollCounts,
    /// `(key, value)` pairs recorded by the last committed load.
    pub metadata: Vec<(String, String)>,
}

/// `_meta` keys written after each committed load, in display order.
pub const LOAD_METADATA_KEYS: &[&str] = &[
    "last_loaded_at",
    "fares_file",
    "georef_file",
    "highway_count",
    "toll_point_count",
    "toll_charge_count",
];

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, IngestError> {
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|source| IngestError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads and parses a fare table.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be read or is not a fare
/// table.
pub fn read_fare_document(path: &Path) -> Result<FareDocument, IngestError> {
    read_json(path)
}

/// Reads and parses a geo reference export.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be read or is not a geo
/// reference.
pub fn read_geo_reference(path: &Path) -> Result<GeoReferenceDocument, IngestError> {
    read_json(path)
}

/// Loads a fare table and geo reference into the toll store, replacing
/// everything it held.
///
/// Inputs are resolved and parsed before the store is opened, so a missing
/// or unparseable document leaves the store untouched. The reconciliation
/// runs in one transaction; `_meta` is updated only after it commits.
///
/// # Errors
///
/// * [`IngestError::InputMissing`] / [`IngestError::Json`] /
///   [`IngestError::Io`] before anything is written.
/// * [`IngestError::RolledBack`] if the reconciliation failed to persist.
/// * [`IngestError::Db`] if the store cannot be opened or the metadata
///   cannot be written.
pub fn load_tolls(
    options: &LoadOptions,
    progress: Option<Arc<dyn ProgressCallback>>,
) -> Result<LoadOutcome, IngestError> {
    let inputs = inputs::resolve_inputs(options.fares.as_deref(), options.georef.as_deref())?;
    load_tolls_from(inputs, options, progress)
}

fn load_tolls_from(
    inputs: InputPaths,
    options: &LoadOptions,
    progress: Option<Arc<dyn ProgressCallback>>,
) -> Result<LoadOutcome, IngestError> {
    log::info!("Fare table: {}", inputs.fares.display());
    log::info!("Geo reference: {}", inputs.georef.display());

    let fares = read_fare_document(&inputs.fares)?;
    let georef = read_geo_reference(&inputs.georef)?;
    let lookup = GeoLookup::from_document(&georef);

    if options.dry_run {
        log::info!("Dry run: reconciling into memory");
        let mut sink = MemorySink::new();
        let summary = match reconcile(&fares, &lookup, &mut sink, progress) {
            Ok(summary) => summary,
            Err(e) => match e.source {},
        };
        return Ok(LoadOutcome {
            inputs,
            store: None,
            summary,
            counts: None,
        });
    }

    let db_path = options.db.clone().unwrap_or_else(paths::toll_db_path);
    log::info!("Toll store: {}", db_path.display());
    let conn = toll_db::open(&db_path)?;

    let summary = load_in_transaction(&conn, &fares, &lookup, progress)
        .map_err(|e| IngestError::RolledBack {
            summary: e.summary,
            source: e.source,
        })?;

    let counts = toll_db::update_load_metadata(&conn, &inputs.fares, &inputs.georef)?;
    log::info!(
        "Committed {} highways, {} toll points, {} toll charges",
        counts.highways,
        counts.toll_points,
        counts.toll_charges
    );

    Ok(LoadOutcome {
        inputs,
        store: Some(db_path),
        summary,
        counts: Some(counts),
    })
}

fn load_in_transaction(
    conn: &duckdb::Connection,
    fares: &FareDocument,
    lookup: &GeoLookup,
    progress: Option<Arc<dyn ProgressCallback>>,
) -> Result<ReconcileSummary, ReconcileError<DbError>> {
    let mut store = toll_db::TollStore::begin(conn).map_err(|source| ReconcileError {
        summary: ReconcileSummary::default(),
        source,
    })?;
    let summary = reconcile(fares, lookup, &mut store, progress)?;
    match store.commit() {
        Ok(()) => Ok(summary),
        Err(source) => Err(ReconcileError { summary, source }),
    }
}

/// Summarizes a fare table without loading it.
///
/// # Errors
///
/// Returns [`IngestError`] if the fare table is missing or unparseable.
pub fn summarize_fares(fares: Option<&Path>) -> Result<(PathBuf, DocumentSummary), IngestError> {
    let path = fares.map_or_else(
        || paths::tolls_dir().join(inputs::FARES_FILE_NAME),
        Path::to_path_buf,
    );
    if !path.is_file() {
        return Err(IngestError::InputMissing {
            expected: format!("fare table at {}", path.display()),
        });
    }
    let document = read_fare_document(&path)?;
    Ok((path, tollway_fare::summary::summarize(&document)))
}

/// Reads counts and last-load metadata from a toll store.
///
/// # Errors
///
/// Returns [`IngestError::InputMissing`] if the store does not exist, or
/// [`IngestError::Db`] if it cannot be queried.
pub fn store_stats(db: Option<&Path>) -> Result<StoreStats, IngestError> {
    let path = db.map_or_else(paths::toll_db_path, Path::to_path_buf);
    if !path.is_file() {
        return Err(IngestError::InputMissing {
            expected: format!("toll store at {}", path.display()),
        });
    }

    let conn = toll_db::open(&path)?;
    let counts = toll_db::get_counts(&conn)?;

    let mut metadata = Vec::new();
    for key in LOAD_METADATA_KEYS {
        if let Some(value) = toll_db::get_meta(&conn, key)? {
            metadata.push(((*key).to_string(), value));
        }
    }

    Ok(StoreStats {
        path,
        counts,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FARES: &str = r#"{
        "autopistas": [
            {
                "nombre_autopista": "Costanera Norte",
                "año_tarifas": 2025,
                "ejes": [{ "nombre_eje": "Eje Kennedy", "porticos": [
                    { "portico_id": "p9", "peajes": { "auto": { "tbp": 900 } },
                      "horarios": { "punta_laboral_tbp": ["07:00-09:00", "18:00-20:00"] } }
                ]}]
            },
            { "nombre_autopista": "Ruta 68", "ejes": [
                { "nombre_eje": "Peaje Lo Prado", "tarifas": [{ "peajes": { "auto": 3000, "bus": null } }] }
            ]}
        ]
    }"#;

    const GEOREF: &str = r#"{
        "metadata": { "fuente": "MOP" },
        "peajes": [
            { "nombre": "p9", "latitud": -33.39, "longitud": -70.58 },
            { "nombre": "Peaje Lo Prado", "latitud": -33.44, "longitud": -70.76 }
        ]
    }"#;

    fn workspace(name: &str) -> PathBuf {
        let tmp = std::env::temp_dir().join(name);
        let _ = std::fs::remove_dir_all(&tmp);
        std::fs::create_dir_all(&tmp).unwrap();
        std::fs::write(tmp.join(inputs::FARES_FILE_NAME), FARES).unwrap();
        std::fs::write(tmp.join("peajes_georeferencias_20250601.json"), GEOREF).unwrap();
        tmp
    }

    fn options(tmp: &Path) -> LoadOptions {
        LoadOptions {
            fares: Some(tmp.join(inputs::FARES_FILE_NAME)),
            georef: Some(tmp.join("peajes_georeferencias_20250601.json")),
            db: Some(tmp.join("tolls.duckdb")),
            dry_run: false,
        }
    }

    #[test]
    fn loads_and_reloads_identically() {
        let tmp = workspace("tollway_ingest_reload");
        let options = options(&tmp);

        let first = load_tolls(&options, None).unwrap();
        assert_eq!(first.summary.toll_points, 2);
        assert_eq!(first.summary.toll_charges, 3);
        assert_eq!(
            first.counts,
            Some(TollCounts {
                highways: 2,
                toll_points: 2,
                toll_charges: 3,
            })
        );

        let conn = toll_db::open(&tmp.join("tolls.duckdb")).unwrap();
        let before = toll_db::load_charge_tuples(&conn).unwrap();
        drop(conn);

        let second = load_tolls(&options, None).unwrap();
        assert_eq!(second.counts, first.counts);

        let conn = toll_db::open(&tmp.join("tolls.duckdb")).unwrap();
        assert_eq!(toll_db::load_charge_tuples(&conn).unwrap(), before);
        let points = toll_db::load_toll_points(&conn).unwrap();
        assert!(points.iter().all(|p| p.location.is_some()));
        drop(conn);

        let stats = store_stats(Some(&tmp.join("tolls.duckdb"))).unwrap();
        assert_eq!(stats.counts.toll_charges, 3);
        assert!(stats.metadata.iter().any(|(k, v)| k == "toll_point_count" && v == "2"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_input_leaves_the_store_untouched() {
        let tmp = workspace("tollway_ingest_missing");
        load_tolls(&options(&tmp), None).unwrap();

        let mut broken = options(&tmp);
        broken.fares = Some(tmp.join("missing.json"));
        let err = load_tolls(&broken, None).unwrap_err();
        assert!(matches!(err, IngestError::InputMissing { .. }));

        std::fs::write(tmp.join("broken.json"), "{ not json").unwrap();
        broken.fares = Some(tmp.join("broken.json"));
        let err = load_tolls(&broken, None).unwrap_err();
        assert!(matches!(err, IngestError::Json { .. }));

        let stats = store_stats(Some(&tmp.join("tolls.duckdb"))).unwrap();
        assert_eq!(stats.counts.highways, 2);
        assert_eq!(stats.counts.toll_charges, 3);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn dry_run_writes_nothing() {
        let tmp = workspace("tollway_ingest_dry_run");
        let mut options = options(&tmp);
        options.dry_run = true;

        let outcome = load_tolls(&options, None).unwrap();
        assert_eq!(outcome.summary.toll_charges, 3);
        assert!(outcome.store.is_none());
        assert!(outcome.counts.is_none());
        assert!(!tmp.join("tolls.duckdb").exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn stats_require_an_existing_store() {
        let tmp = workspace("tollway_ingest_no_store");
        let err = store_stats(Some(&tmp.join("tolls.duckdb"))).unwrap_err();
        assert!(matches!(err, IngestError::InputMissing { .. }));
        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn summarizes_without_a_store() {
        let tmp = workspace("tollway_ingest_summary");
        let (path, summary) = summarize_fares(Some(&tmp.join(inputs::FARES_FILE_NAME))).unwrap();
        assert_eq!(path, tmp.join(inputs::FARES_FILE_NAME));
        assert_eq!(summary.highways.len(), 2);
        assert_eq!(summary.total_toll_points(), 2);
        let _ = std::fs::remove_dir_all(&tmp);
    }
}
