#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Toll fare document types and the normalized toll records they reconcile
//! into.
//!
//! The raw types mirror the loosely-structured fare table and geo reference
//! documents. Field names accept both the Spanish keys used by the published
//! documents and their English equivalents. The `New*` record types are what
//! the reconciliation engine hands to a persistence sink.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum_macros::{AsRefStr, Display, EnumString};

/// Tariff-type label used when a price carries no explicit regime.
pub const NORMAL_TARIFF: &str = "NORMAL";

/// Root of a fare table document.
///
/// Highways are kept as raw JSON so that one malformed entry can be skipped
/// without rejecting the whole document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FareDocument {
    /// One entry per highway or concession.
    #[serde(rename = "autopistas", alias = "highways")]
    pub highways: Vec<Value>,
}

/// A single highway entry in the fare table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighwayEntry {
    /// Highway or concession name.
    #[serde(rename = "nombre_autopista", alias = "name")]
    pub name: String,
    /// Free-text description of the covered stretch.
    #[serde(rename = "tramo_descripcion", alias = "description", default)]
    pub description: Option<String>,
    /// Year the published tariffs apply to. Numeric strings are accepted;
    /// anything else that is not a year reads as unknown.
    #[serde(
        rename = "año_tarifas",
        alias = "tariff_year",
        default,
        deserialize_with = "lenient_year"
    )]
    pub tariff_year: Option<i32>,
    /// Axis records, each in one of the supported shapes.
    #[serde(rename = "ejes", alias = "axes", default)]
    pub axes: Vec<Value>,
}

fn lenient_year<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| match value {
        Value::Number(n) => n.as_i64().and_then(|year| i32::try_from(year).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

/// A gantry as described inside a `directions` or `gantries` list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawGantry {
    /// Concession-assigned identifier (e.g. `"p9"`).
    #[serde(rename = "portico_id", alias = "gantry_id", default)]
    pub concession_id: Option<String>,
    /// Display name, used as the reference label for flat gantry lists.
    #[serde(rename = "nombre", alias = "name", default)]
    pub name: Option<String>,
    /// Descriptive reference of the charged stretch.
    #[serde(rename = "referencia_tramo", alias = "reference", default)]
    pub reference: Option<String>,
    /// Length of the charged stretch in kilometres.
    #[serde(rename = "longitud_km", alias = "length_km", default)]
    pub segment_km: Option<f64>,
    /// Vehicle category -> price, or vehicle category -> tariff type -> price.
    #[serde(rename = "peajes", alias = "prices", default)]
    pub prices: Option<Map<String, Value>>,
    /// Schedule key (e.g. `"punta_laboral_tbp"`) -> time windows.
    #[serde(rename = "horarios", alias = "schedule", default)]
    pub schedule: Option<Map<String, Value>>,
}

/// One direction of travel in the directional axis shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDirection {
    /// Direction or sense label (e.g. `"Oriente-Poniente"`).
    #[serde(rename = "sentido", alias = "sense", default)]
    pub sense: Option<String>,
    /// Gantries charged in this direction, kept raw for per-gantry isolation.
    #[serde(rename = "porticos", alias = "gantries", default)]
    pub gantries: Vec<Value>,
}

/// An entry/exit pair in the segment axis shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSegment {
    /// Entry gantry identifier.
    #[serde(rename = "portico_entrada", alias = "entry", default)]
    pub entry: Option<String>,
    /// Exit gantry identifier.
    #[serde(rename = "portico_salida", alias = "exit", default)]
    pub exit: Option<String>,
    /// Length of the segment in kilometres.
    #[serde(rename = "longitud_km", alias = "length_km", default)]
    pub segment_km: Option<f64>,
    /// Prices for this segment.
    #[serde(rename = "peajes", alias = "prices", default)]
    pub prices: Option<Map<String, Value>>,
    /// Segment-specific schedule; falls back to the axis schedule.
    #[serde(rename = "horarios", alias = "schedule", default)]
    pub schedule: Option<Map<String, Value>>,
}

/// A fully qualified tariff entry of a user-type group (tunnel shape).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawQualifiedTariff {
    /// Direction the tariff applies to.
    #[serde(rename = "sentido", alias = "sense", default)]
    pub sense: Option<String>,
    /// Tariff-type label.
    #[serde(rename = "tipo_tarifa", alias = "tariff_type", default)]
    pub tariff_type: Option<String>,
    /// Day-type label (e.g. `"Laboral"`).
    #[serde(rename = "tipo_dia", alias = "day_type", default)]
    pub day_type: Option<String>,
    /// Time window label (e.g. `"07:00-09:00"`).
    #[serde(rename = "horario", alias = "time_window", default)]
    pub time_window: Option<String>,
    /// Vehicle category -> price.
    #[serde(rename = "peajes", alias = "prices", default)]
    pub prices: Option<Map<String, Value>>,
}

/// A tariff entry of the simple axis shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSimpleTariff {
    /// Tariff-type label; [`NORMAL_TARIFF`] when absent.
    #[serde(rename = "tipo", alias = "tariff_type", default)]
    pub tariff_type: Option<String>,
    /// Vehicle category -> price.
    #[serde(rename = "peajes", alias = "prices", default)]
    pub prices: Option<Map<String, Value>>,
}

/// Root of a geo reference document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoReferenceDocument {
    /// Named toll locations.
    #[serde(rename = "peajes", alias = "tolls")]
    pub entries: Vec<GeoReferenceEntry>,
}

/// A named toll location from the geo reference document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoReferenceEntry {
    /// Lookup name (matched case-insensitively after trimming).
    #[serde(rename = "nombre", alias = "name", default)]
    pub name: Option<String>,
    /// Latitude (WGS84).
    #[serde(alias = "latitud", default)]
    pub latitude: Option<f64>,
    /// Longitude (WGS84).
    #[serde(alias = "longitud", default)]
    pub longitude: Option<f64>,
    /// Provider identifier.
    #[serde(rename = "id_peaje", default)]
    pub toll_id: Option<String>,
    /// Route the toll sits on.
    #[serde(rename = "ruta", alias = "route", default)]
    pub route: Option<String>,
    /// Operating concession.
    #[serde(rename = "concesionaria", alias = "concession", default)]
    pub concession: Option<String>,
}

/// A WGS84 point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    /// Longitude in degrees.
    pub longitude: f64,
    /// Latitude in degrees.
    pub latitude: f64,
}

/// Tariff regimes that can be time-qualified through a schedule map.
///
/// Parsed from the trailing token of a schedule key (`_ts`, `_tbp`,
/// `_tbfp`).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum ScheduledTariff {
    /// Saturation tariff
    Ts,
    /// Base peak tariff
    Tbp,
    /// Base off-peak tariff
    Tbfp,
}

/// A day-type and time-window pair under which a tariff type applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleBand {
    /// Day-type label (e.g. `"Punta laboral"`).
    pub day_type: Option<String>,
    /// Time window label (e.g. `"07:00-09:00"`).
    pub time_window: String,
}

/// A highway ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHighway {
    /// Highway name.
    pub name: String,
    /// Description of the covered stretch.
    pub description: Option<String>,
    /// Year the tariffs apply to.
    pub tariff_year: Option<i32>,
}

/// A fare-collection location ready to be persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTollPoint {
    /// Id assigned to the owning highway by the sink.
    pub highway_id: i64,
    /// Concession-assigned identifier.
    pub concession_id: Option<String>,
    /// Name of the owning axis.
    pub axis_name: Option<String>,
    /// Direction or sense of travel.
    pub sense: Option<String>,
    /// Descriptive reference label.
    pub reference_label: Option<String>,
    /// Segment length in kilometres.
    pub segment_km: Option<f64>,
    /// Resolved location. `None` when no geo reference matched.
    pub location: Option<Coordinates>,
}

/// One price applicable at a toll point, optionally time-qualified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTollCharge {
    /// Id assigned to the owning toll point by the sink.
    pub toll_point_id: i64,
    /// Vehicle category (free text, e.g. `"auto"`).
    pub vehicle_category: String,
    /// Tariff-type label (e.g. `"TBP"`, `"NORMAL"`).
    pub tariff_type: String,
    /// Price in the document's currency.
    pub price: f64,
    /// Day-type label.
    pub day_type: Option<String>,
    /// Time window label.
    pub time_window: Option<String>,
}

/// The structural variant an axis record was recognized as.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AxisShapeKind {
    /// Gantries grouped by direction of travel
    Directional,
    /// Entry/exit gantry pairs with their own prices
    Segmented,
    /// A plain list of gantries
    Flat,
    /// User-type tariff groups with fully qualified entries
    Tunnel,
    /// A flat tariff list with no gantry concept
    Simple,
    /// None of the above; skipped
    Unrecognized,
}

/// Per-highway outcome of a reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighwayReport {
    /// Highway name.
    pub name: String,
    /// Toll points inserted for this highway.
    pub toll_points: u64,
    /// Toll charges inserted for this highway.
    pub toll_charges: u64,
}

/// Outcome of a reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileSummary {
    /// Highways processed, in document order.
    pub highways: Vec<HighwayReport>,
    /// Total toll points inserted.
    pub toll_points: u64,
    /// Total toll charges inserted.
    pub toll_charges: u64,
    /// Malformed records (highways, gantries, prices) that were skipped.
    pub skipped_records: u64,
    /// Human-readable notes about data that was dropped.
    pub warnings: Vec<String>,
}

/// Row counts of the persisted toll tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TollCounts {
    /// Rows in `highways`.
    pub highways: u64,
    /// Rows in `toll_points`.
    pub toll_points: u64,
    /// Rows in `toll_charges`.
    pub toll_charges: u64,
}

/// Structural overview of one highway, computed without persisting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighwayOverview {
    /// Highway name.
    pub name: String,
    /// Year the tariffs apply to.
    pub tariff_year: Option<i32>,
    /// Shape detected for each axis, in document order.
    pub axis_shapes: Vec<AxisShapeKind>,
    /// Toll points the highway would produce.
    pub toll_points: u64,
}

/// Structural overview of a whole fare table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    /// Highways that parsed, in document order.
    pub highways: Vec<HighwayOverview>,
    /// Highway entries that could not be parsed.
    pub malformed_highways: u64,
    /// Distinct tariff-type labels found in price maps, upper-cased.
    pub tariff_types: Vec<String>,
}

impl DocumentSummary {
    /// Total toll points across all highways.
    #[must_use]
    pub fn total_toll_points(&self) -> u64 {
        self.highways.iter().map(|h| h.toll_points).sum()
    }
}
