//! Axis shape detection.
//!
//! An axis describes its toll points in one of five incompatible shapes.
//! The shape is detected once per axis, by which distinguishing key is
//! present, in this priority order:
//!
//! | Key | Shape |
//! |---|---|
//! | `direcciones` / `directions` | [`AxisShape::Directional`] |
//! | `tramos` / `segments` | [`AxisShape::Segmented`] |
//! | `porticos` / `gantries` | [`AxisShape::Flat`] |
//! | any `*_tarifas` / `*_tariffs` list | [`AxisShape::Tunnel`] |
//! | `tarifas` / `tariffs` | [`AxisShape::Simple`] |

use serde_json::{Map, Value};
use tollway_fare_models::AxisShapeKind;

use crate::FareError;

const DIRECTIONS_KEYS: &[&str] = &["direcciones", "directions"];
const SEGMENTS_KEYS: &[&str] = &["tramos", "segments"];
const GANTRIES_KEYS: &[&str] = &["porticos", "gantries"];
const TARIFFS_KEYS: &[&str] = &["tarifas", "tariffs"];
const USER_TYPE_SUFFIXES: &[&str] = &["_tarifas", "_tariffs"];
const AXIS_NAME_KEYS: &[&str] = &["nombre_eje", "axis_name", "name"];
const SCHEDULE_KEYS: &[&str] = &["horarios", "schedule"];

/// A group of fully qualified tariff entries for one user type.
#[derive(Debug, Clone, PartialEq)]
pub struct UserTypeGroup {
    /// The key the group was found under (e.g. `"con_tag_tarifas"`).
    pub user_type: String,
    /// Raw tariff entries.
    pub entries: Vec<Value>,
}

/// The recognized structure of an axis. List items stay raw so that each
/// one can be parsed (and skipped) independently.
#[derive(Debug, Clone, PartialEq)]
pub enum AxisShape {
    /// Directions, each holding a list of gantries.
    Directional(Vec<Value>),
    /// Entry/exit pairs, with an axis-wide fallback schedule.
    Segmented {
        /// Raw segment entries.
        segments: Vec<Value>,
        /// Axis-level schedule map.
        schedule: Option<Map<String, Value>>,
    },
    /// Gantries listed directly on the axis.
    Flat(Vec<Value>),
    /// User-type groups of qualified tariffs.
    Tunnel(Vec<UserTypeGroup>),
    /// A flat tariff list for the whole axis.
    Simple(Vec<Value>),
}

impl AxisShape {
    /// The shape's kind tag.
    #[must_use]
    pub const fn kind(&self) -> AxisShapeKind {
        match self {
            Self::Directional(_) => AxisShapeKind::Directional,
            Self::Segmented { .. } => AxisShapeKind::Segmented,
            Self::Flat(_) => AxisShapeKind::Flat,
            Self::Tunnel(_) => AxisShapeKind::Tunnel,
            Self::Simple(_) => AxisShapeKind::Simple,
        }
    }

    /// Number of toll points this axis expands into, counting list items
    /// whether or not they later parse.
    #[must_use]
    pub fn toll_point_count(&self) -> u64 {
        let count = match self {
            Self::Directional(directions) => directions
                .iter()
                .map(|d| {
                    first_of(d.as_object(), GANTRIES_KEYS)
                        .and_then(Value::as_array)
                        .map_or(0, Vec::len)
                })
                .sum(),
            Self::Segmented { segments, .. } => segments.len(),
            Self::Flat(gantries) => gantries.len(),
            Self::Tunnel(groups) => groups.iter().map(|g| g.entries.len()).sum(),
            Self::Simple(_) => 1,
        };
        count as u64
    }
}

/// An axis with its detected shape.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisRecord {
    /// Axis name, if given.
    pub name: Option<String>,
    /// Detected shape; `None` when no distinguishing key is present.
    pub shape: Option<AxisShape>,
}

impl AxisRecord {
    /// The shape's kind tag, or [`AxisShapeKind::Unrecognized`].
    #[must_use]
    pub fn kind(&self) -> AxisShapeKind {
        self.shape
            .as_ref()
            .map_or(AxisShapeKind::Unrecognized, AxisShape::kind)
    }
}

fn first_of<'a>(object: Option<&'a Map<String, Value>>, keys: &[&str]) -> Option<&'a Value> {
    let object = object?;
    keys.iter().find_map(|key| object.get(*key))
}

fn expect_list(value: &Value, key: &str) -> Result<Vec<Value>, FareError> {
    value
        .as_array()
        .cloned()
        .ok_or_else(|| FareError::Malformed {
            message: format!("axis key {key:?} must be a list, got {value}"),
        })
}

/// Detects the shape of a raw axis record.
///
/// # Errors
///
/// Returns [`FareError::Malformed`] if the axis is not an object, or if its
/// distinguishing key does not hold a list.
pub fn classify_axis(axis: &Value) -> Result<AxisRecord, FareError> {
    let object = axis.as_object().ok_or_else(|| FareError::Malformed {
        message: format!("axis must be an object, got {axis}"),
    })?;

    let name = first_of(Some(object), AXIS_NAME_KEYS)
        .and_then(Value::as_str)
        .map(str::to_string);

    let shape = if let Some(directions) = first_of(Some(object), DIRECTIONS_KEYS) {
        Some(AxisShape::Directional(expect_list(directions, "directions")?))
    } else if let Some(segments) = first_of(Some(object), SEGMENTS_KEYS) {
        Some(AxisShape::Segmented {
            segments: expect_list(segments, "segments")?,
            schedule: first_of(Some(object), SCHEDULE_KEYS)
                .and_then(Value::as_object)
                .cloned(),
        })
    } else if let Some(gantries) = first_of(Some(object), GANTRIES_KEYS) {
        Some(AxisShape::Flat(expect_list(gantries, "gantries")?))
    } else {
        let groups = user_type_groups(object);
        if !groups.is_empty() {
            Some(AxisShape::Tunnel(groups))
        } else if let Some(tariffs) = first_of(Some(object), TARIFFS_KEYS) {
            Some(AxisShape::Simple(expect_list(tariffs, "tariffs")?))
        } else {
            None
        }
    };

    Ok(AxisRecord { name, shape })
}

fn user_type_groups(object: &Map<String, Value>) -> Vec<UserTypeGroup> {
    object
        .iter()
        .filter(|(key, _)| {
            USER_TYPE_SUFFIXES
                .iter()
                .any(|suffix| key.len() > suffix.len() && key.ends_with(suffix))
        })
        .filter_map(|(key, value)| {
            value.as_array().map(|entries| UserTypeGroup {
                user_type: key.clone(),
                entries: entries.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn kind(axis: &Value) -> AxisShapeKind {
        classify_axis(axis).unwrap().kind()
    }

    #[test]
    fn detects_each_shape() {
        assert_eq!(kind(&json!({ "direcciones": [] })), AxisShapeKind::Directional);
        assert_eq!(kind(&json!({ "segments": [] })), AxisShapeKind::Segmented);
        assert_eq!(kind(&json!({ "porticos": [] })), AxisShapeKind::Flat);
        assert_eq!(
            kind(&json!({ "usuarios_con_tag_tarifas": [] })),
            AxisShapeKind::Tunnel
        );
        assert_eq!(kind(&json!({ "tariffs": [] })), AxisShapeKind::Simple);
        assert_eq!(
            kind(&json!({ "nombre_eje": "Ruta 68" })),
            AxisShapeKind::Unrecognized
        );
    }

    #[test]
    fn first_matching_key_wins() {
        let axis = json!({
            "tarifas": [],
            "porticos": [],
            "tramos": [],
            "directions": []
        });
        assert_eq!(kind(&axis), AxisShapeKind::Directional);

        let axis = json!({ "tarifas": [], "porticos": [], "tramos": [] });
        assert_eq!(kind(&axis), AxisShapeKind::Segmented);

        let axis = json!({ "tarifas": [], "con_tag_tarifas": [] });
        assert_eq!(kind(&axis), AxisShapeKind::Tunnel);
    }

    #[test]
    fn bare_suffix_is_not_a_user_type_group() {
        let axis = json!({ "_tarifas": [], "tarifas": [] });
        assert_eq!(kind(&axis), AxisShapeKind::Simple);
    }

    #[test]
    fn non_list_shape_key_is_malformed() {
        assert!(classify_axis(&json!({ "porticos": { "p1": {} } })).is_err());
        assert!(classify_axis(&json!("Ruta 68")).is_err());
    }

    #[test]
    fn reads_axis_name_and_segment_schedule() {
        let record = classify_axis(&json!({
            "nombre_eje": "Eje Kennedy",
            "tramos": [{ "portico_entrada": "P1", "portico_salida": "P2" }],
            "horarios": { "punta_laboral_tbp": ["07:00-09:00"] }
        }))
        .unwrap();
        assert_eq!(record.name.as_deref(), Some("Eje Kennedy"));
        let Some(AxisShape::Segmented { segments, schedule }) = record.shape else {
            panic!("expected segmented shape");
        };
        assert_eq!(segments.len(), 1);
        assert!(schedule.unwrap().contains_key("punta_laboral_tbp"));
    }

    #[test]
    fn counts_toll_points() {
        let record = classify_axis(&json!({
            "directions": [
                { "sentido": "Norte", "porticos": [{}, {}] },
                { "sentido": "Sur", "gantries": [{}] }
            ]
        }))
        .unwrap();
        assert_eq!(record.shape.unwrap().toll_point_count(), 3);

        let record = classify_axis(&json!({
            "con_tag_tarifas": [{}, {}],
            "sin_tag_tarifas": [{}]
        }))
        .unwrap();
        assert_eq!(record.shape.unwrap().toll_point_count(), 3);

        let record = classify_axis(&json!({ "tarifas": [{}, {}] })).unwrap();
        assert_eq!(record.shape.unwrap().toll_point_count(), 1);
    }
}
