#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Toll fare reconciliation.
//!
//! Turns a fare table (highways -> axes -> gantries -> prices, in one of
//! several axis shapes) plus a geo reference lookup into a flat set of toll
//! points and toll charges, written through a [`sink::TollSink`].
//!
//! Malformed records are skipped and counted rather than failing the run;
//! only sink errors abort a reconciliation.

pub mod expand;
pub mod location;
pub mod progress;
pub mod schedule;
pub mod shape;
pub mod sink;
pub mod summary;

use std::sync::Arc;

use tollway_fare_models::{FareDocument, HighwayEntry, HighwayReport, NewHighway, ReconcileSummary};

use crate::expand::HighwayExpander;
use crate::location::GeoLookup;
use crate::progress::ProgressCallback;
use crate::shape::classify_axis;
use crate::sink::TollSink;

/// Errors raised while parsing individual fare records.
#[derive(Debug, thiserror::Error)]
pub enum FareError {
    /// A record does not have the expected structure.
    #[error("Malformed record: {message}")]
    Malformed {
        /// Description of what went wrong.
        message: String,
    },
}

/// A sink failure that aborted a reconciliation, with what had been
/// written up to that point.
#[derive(Debug, thiserror::Error)]
#[error("Reconciliation aborted: {source}")]
pub struct ReconcileError<E: std::error::Error + 'static> {
    /// Highways and counts processed before the failure. The highway being
    /// expanded when the sink failed is included with its partial counts.
    pub summary: ReconcileSummary,
    /// The sink's error.
    pub source: E,
}

/// Reconciles a fare table into `sink`, replacing whatever it held.
///
/// Clears the sink, then inserts one highway per parseable entry with its
/// toll points and charges, then flushes. Highways that fail to parse and
/// axes that are malformed are skipped and counted; axes with no
/// recognized shape are skipped and noted in the summary's warnings.
///
/// # Errors
///
/// Returns a [`ReconcileError`] carrying the sink's error and the partial
/// summary as soon as any sink operation fails. The caller owns rolling
/// back whatever was written.
pub fn reconcile<S: TollSink>(
    document: &FareDocument,
    lookup: &GeoLookup,
    sink: &mut S,
    progress: Option<Arc<dyn ProgressCallback>>,
) -> Result<ReconcileSummary, ReconcileError<S::Error>> {
    let progress = progress.unwrap_or_else(progress::null_progress);
    let mut summary = ReconcileSummary::default();

    if let Err(source) = sink.clear() {
        return Err(ReconcileError { summary, source });
    }
    progress.start(document.highways.len() as u64);

    for (idx, raw) in document.highways.iter().enumerate() {
        let highway: HighwayEntry = match serde_json::from_value(raw.clone()) {
            Ok(h) => h,
            Err(e) => {
                log::warn!("Skipping highway #{}: {e}", idx + 1);
                summary.skipped_records += 1;
                progress.highway_done();
                continue;
            }
        };

        log::info!("Processing highway: {}", highway.name);
        progress.highway_started(&highway.name);

        let highway_id = match sink.insert_highway(&NewHighway {
            name: highway.name.clone(),
            description: highway.description.clone(),
            tariff_year: highway.tariff_year,
        }) {
            Ok(id) => id,
            Err(source) => return Err(ReconcileError { summary, source }),
        };

        let mut expander = HighwayExpander::new(sink, lookup, highway_id, &highway.name);
        let mut malformed_axes = 0u64;
        let mut failure = None;
        for axis in &highway.axes {
            match classify_axis(axis) {
                Ok(record) => {
                    if let Err(e) = expander.expand_axis(record) {
                        failure = Some(e);
                        break;
                    }
                }
                Err(e) => {
                    log::warn!("{}: skipping axis: {e}", highway.name);
                    malformed_axes += 1;
                }
            }
        }
        let tally = expander.finish();

        log::info!(
            "{}: {} toll points, {} toll charges",
            highway.name,
            tally.toll_points,
            tally.toll_charges
        );

        summary.toll_points += tally.toll_points;
        summary.toll_charges += tally.toll_charges;
        summary.skipped_records += tally.skipped_records + malformed_axes;
        summary.warnings.extend(tally.warnings);
        summary.highways.push(HighwayReport {
            name: highway.name,
            toll_points: tally.toll_points,
            toll_charges: tally.toll_charges,
        });

        if let Some(source) = failure {
            return Err(ReconcileError { summary, source });
        }

        progress.highway_done();
    }

    if let Err(source) = sink.flush() {
        return Err(ReconcileError { summary, source });
    }

    progress.finish(format!(
        "{} highways, {} toll points, {} toll charges",
        summary.highways.len(),
        summary.toll_points,
        summary.toll_charges
    ));

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::fmt;
    use std::sync::Mutex;

    use serde_json::json;
    use tollway_fare_models::{Coordinates, NewTollCharge, NewTollPoint};

    use super::*;
    use crate::sink::MemorySink;

    fn document(value: serde_json::Value) -> FareDocument {
        serde_json::from_value(value).unwrap()
    }

    fn sample() -> FareDocument {
        document(json!({
            "autopistas": [
                {
                    "nombre_autopista": "Costanera Norte",
                    "tramo_descripcion": "Vespucio - Kennedy",
                    "año_tarifas": 2025,
                    "ejes": [
                        { "nombre_eje": "Eje Kennedy", "direcciones": [
                            { "sentido": "Oriente-Poniente", "porticos": [
                                { "portico_id": "p9", "referencia_tramo": "Kennedy",
                                  "peajes": { "auto": { "tbfp": 500, "tbp": 900, "ts": null }, "moto": 300 },
                                  "horarios": { "punta_laboral_tbp": ["07:00-09:00", "18:00-20:00"] } }
                            ]}
                        ]},
                        { "nombre_eje": "Sin forma" },
                        42
                    ]
                },
                { "tramo_descripcion": "sin nombre" },
                {
                    "nombre_autopista": "Ruta 68",
                    "ejes": [{ "nombre_eje": "Peaje Lo Prado", "tarifas": [{ "peajes": { "auto": 3000, "camion": 5400 } }] }]
                }
            ]
        }))
    }

    fn sample_lookup() -> GeoLookup {
        let mut lookup = GeoLookup::new();
        lookup.insert(
            "p9",
            Coordinates {
                longitude: -70.58,
                latitude: -33.39,
            },
        );
        lookup.insert(
            "Peaje Lo Prado",
            Coordinates {
                longitude: -70.76,
                latitude: -33.44,
            },
        );
        lookup
    }

    #[test]
    fn reconciles_a_document() {
        let mut sink = MemorySink::new();
        let summary = reconcile(&sample(), &sample_lookup(), &mut sink, None).unwrap();

        assert_eq!(sink.highways.len(), 2);
        assert_eq!(sink.highways[0].1.tariff_year, Some(2025));
        assert_eq!(summary.toll_points, 2);
        // tbfp (1) + tbp x 2 bands + moto NORMAL (1) + Lo Prado (2)
        assert_eq!(summary.toll_charges, 6);
        assert_eq!(summary.toll_charges as usize, sink.toll_charges.len());
        // missing highway name + non-object axis
        assert_eq!(summary.skipped_records, 2);
        assert_eq!(summary.warnings.len(), 1);
        assert_eq!(
            summary.highways,
            vec![
                HighwayReport {
                    name: "Costanera Norte".to_string(),
                    toll_points: 1,
                    toll_charges: 4,
                },
                HighwayReport {
                    name: "Ruta 68".to_string(),
                    toll_points: 1,
                    toll_charges: 2,
                },
            ]
        );
        assert!(sink.toll_points.iter().all(|(_, p)| p.location.is_some()));
    }

    #[test]
    fn toll_points_reference_their_highway() {
        let mut sink = MemorySink::new();
        reconcile(&sample(), &sample_lookup(), &mut sink, None).unwrap();

        let highway_ids: Vec<i64> = sink.highways.iter().map(|(id, _)| *id).collect();
        assert!(sink.toll_points.iter().all(|(_, p)| highway_ids.contains(&p.highway_id)));
        let point_ids: Vec<i64> = sink.toll_points.iter().map(|(id, _)| *id).collect();
        assert!(sink.toll_charges.iter().all(|c| point_ids.contains(&c.toll_point_id)));
    }

    #[test]
    fn rerunning_replaces_previous_output() {
        let mut sink = MemorySink::new();
        reconcile(&sample(), &sample_lookup(), &mut sink, None).unwrap();
        let first = sink.toll_charges.clone();
        reconcile(&sample(), &sample_lookup(), &mut sink, None).unwrap();

        assert_eq!(sink.highways.len(), 2);
        assert_eq!(sink.toll_charges, first);
    }

    #[test]
    fn null_prices_never_produce_charges() {
        let mut sink = MemorySink::new();
        reconcile(&sample(), &sample_lookup(), &mut sink, None).unwrap();
        assert!(!sink.toll_charges.iter().any(|c| c.tariff_type == "TS"));
    }

    #[derive(Debug)]
    struct Refused;

    impl fmt::Display for Refused {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "refused")
        }
    }

    impl std::error::Error for Refused {}

    /// Accepts everything until the given number of charges, then fails.
    struct FailingSink {
        inner: MemorySink,
        charges_before_failure: usize,
    }

    impl TollSink for FailingSink {
        type Error = Refused;

        fn clear(&mut self) -> Result<(), Refused> {
            self.inner.clear().map_err(|e| match e {})
        }

        fn insert_highway(&mut self, highway: &NewHighway) -> Result<i64, Refused> {
            self.inner.insert_highway(highway).map_err(|e| match e {})
        }

        fn insert_toll_point(&mut self, point: &NewTollPoint) -> Result<i64, Refused> {
            self.inner.insert_toll_point(point).map_err(|e| match e {})
        }

        fn insert_toll_charge(&mut self, charge: NewTollCharge) -> Result<(), Refused> {
            if self.inner.toll_charges.len() >= self.charges_before_failure {
                return Err(Refused);
            }
            self.inner.insert_toll_charge(charge).map_err(|e| match e {})
        }

        fn flush(&mut self) -> Result<(), Refused> {
            Ok(())
        }
    }

    #[test]
    fn sink_errors_abort_the_run() {
        let mut sink = FailingSink {
            inner: MemorySink::new(),
            charges_before_failure: 3,
        };
        let err = reconcile(&sample(), &sample_lookup(), &mut sink, None).unwrap_err();
        assert_eq!(sink.inner.toll_charges.len(), 3);

        // The failing highway is reported with what it wrote before the error.
        assert_eq!(
            err.summary.highways,
            vec![HighwayReport {
                name: "Costanera Norte".to_string(),
                toll_points: 1,
                toll_charges: 3,
            }]
        );
        assert_eq!(err.summary.toll_charges, 3);
        assert_eq!(err.summary.toll_points, 1);
    }

    #[derive(Default)]
    struct RecordingProgress {
        events: Mutex<Vec<String>>,
    }

    impl RecordingProgress {
        fn push(&self, event: String) {
            if let Ok(mut events) = self.events.lock() {
                events.push(event);
            }
        }
    }

    impl ProgressCallback for RecordingProgress {
        fn start(&self, highways: u64) {
            self.push(format!("start {highways}"));
        }

        fn highway_started(&self, name: &str) {
            self.push(format!("started {name}"));
        }

        fn highway_done(&self) {
            self.push("done".to_string());
        }

        fn finish(&self, totals: String) {
            self.push(format!("finish {totals}"));
        }
    }

    #[test]
    fn progress_counts_every_highway_entry() {
        let progress = Arc::new(RecordingProgress::default());
        let callback: Arc<dyn ProgressCallback> = progress.clone();
        let mut sink = MemorySink::new();
        reconcile(&sample(), &sample_lookup(), &mut sink, Some(callback)).unwrap();

        let events = progress.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                "start 3".to_string(),
                "started Costanera Norte".to_string(),
                "done".to_string(),
                "done".to_string(),
                "started Ruta 68".to_string(),
                "done".to_string(),
                "finish 2 highways, 2 toll points, 6 toll charges".to_string(),
            ]
        );
    }
}
