//! Structural overview of a fare table, computed without persisting.

use std::collections::BTreeSet;

use serde_json::Value;
use tollway_fare_models::{
    AxisShapeKind, DocumentSummary, FareDocument, HighwayEntry, HighwayOverview,
};

use crate::expand::{entry_tariff_label, normalize_tariff_label};
use crate::shape::{AxisShape, classify_axis};

/// Summarizes highways, detected axis shapes, toll point counts and the
/// tariff-type labels charges would carry.
#[must_use]
pub fn summarize(document: &FareDocument) -> DocumentSummary {
    let mut summary = DocumentSummary::default();
    let mut tariff_types = BTreeSet::new();

    for raw in &document.highways {
        let Ok(highway) = serde_json::from_value::<HighwayEntry>(raw.clone()) else {
            summary.malformed_highways += 1;
            continue;
        };

        let mut overview = HighwayOverview {
            name: highway.name,
            tariff_year: highway.tariff_year,
            ..HighwayOverview::default()
        };

        for axis in &highway.axes {
            let Ok(record) = classify_axis(axis) else {
                overview.axis_shapes.push(AxisShapeKind::Unrecognized);
                continue;
            };
            overview.axis_shapes.push(record.kind());
            if let Some(shape) = &record.shape {
                overview.toll_points += shape.toll_point_count();
                collect_tariff_types(shape, &mut tariff_types);
            }
        }

        summary.highways.push(overview);
    }

    summary.tariff_types = tariff_types.into_iter().collect();
    summary
}

fn collect_from_prices(prices: Option<&Value>, out: &mut BTreeSet<String>) {
    let Some(prices) = prices.and_then(Value::as_object) else {
        return;
    };
    for value in prices.values() {
        match value {
            Value::Object(by_tariff) => {
                out.extend(by_tariff.keys().map(|k| normalize_tariff_label(Some(k.as_str()))));
            }
            Value::Number(_) => {
                out.insert(normalize_tariff_label(None));
            }
            _ => {}
        }
    }
}

fn prices_of(value: &Value) -> Option<&Value> {
    value.get("peajes").or_else(|| value.get("prices"))
}

fn collect_tariff_types(shape: &AxisShape, out: &mut BTreeSet<String>) {
    match shape {
        AxisShape::Directional(directions) => {
            for direction in directions {
                let gantries = direction
                    .get("porticos")
                    .or_else(|| direction.get("gantries"))
                    .and_then(Value::as_array);
                for gantry in gantries.into_iter().flatten() {
                    collect_from_prices(prices_of(gantry), out);
                }
            }
        }
        AxisShape::Segmented { segments: items, .. } | AxisShape::Flat(items) => {
            for item in items {
                collect_from_prices(prices_of(item), out);
            }
        }
        AxisShape::Tunnel(groups) => {
            for entry in groups.iter().flat_map(|g| &g.entries) {
                let label = entry
                    .get("tipo_tarifa")
                    .or_else(|| entry.get("tariff_type"))
                    .and_then(Value::as_str);
                out.insert(entry_tariff_label(label));
            }
        }
        AxisShape::Simple(tariffs) => {
            for tariff in tariffs {
                let label = tariff
                    .get("tipo")
                    .or_else(|| tariff.get("tariff_type"))
                    .and_then(Value::as_str);
                out.insert(entry_tariff_label(label));
            }
        }
    }
}
