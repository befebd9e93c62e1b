//! Schedule-map parsing.
//!
//! A schedule map is keyed by compound tokens such as `punta_laboral_tbp`:
//! the trailing token names the tariff regime (`ts`, `tbp`, `tbfp`) and the
//! leading tokens form the day-type label (`"Punta laboral"`). Each value
//! lists the time windows for that day type. Keys with any other suffix are
//! not schedule bands and are ignored.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde_json::{Map, Value};
use tollway_fare_models::{ScheduleBand, ScheduledTariff};

/// Splits a schedule key into its tariff regime and day-type label.
///
/// The regime is `None` when the suffix is not a known one. The day-type
/// label joins the leading tokens with spaces and capitalizes the first
/// letter (the rest is lower-cased); it is `None` when empty.
#[must_use]
pub fn parse_schedule_key(key: &str) -> (Option<ScheduledTariff>, Option<String>) {
    let Some((head, suffix)) = key.rsplit_once('_') else {
        return (None, None);
    };

    let tariff = ScheduledTariff::from_str(suffix).ok();
    let day_type = capitalize(&head.replace('_', " "));

    (tariff, (!day_type.is_empty()).then_some(day_type))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
    })
}

/// Schedule bands of one toll point, grouped by tariff regime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleTable {
    bands: BTreeMap<ScheduledTariff, Vec<ScheduleBand>>,
}

impl ScheduleTable {
    /// Parses a raw schedule map.
    ///
    /// Returns the table and a list of problems for values that are
    /// neither a list of strings nor a single string. Problem entries are
    /// left out of the table.
    #[must_use]
    pub fn parse(schedule: Option<&Map<String, Value>>) -> (Self, Vec<String>) {
        let mut table = Self::default();
        let mut problems = Vec::new();

        let Some(schedule) = schedule else {
            return (table, problems);
        };

        for (key, windows) in schedule {
            let (Some(tariff), day_type) = parse_schedule_key(key) else {
                continue;
            };

            let windows: Vec<&str> = match windows {
                Value::Null => Vec::new(),
                Value::String(window) => vec![window.as_str()],
                Value::Array(items) => {
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        match item.as_str() {
                            Some(window) => out.push(window),
                            None => problems
                                .push(format!("schedule {key:?}: time window {item} is not a string")),
                        }
                    }
                    out
                }
                other => {
                    problems.push(format!("schedule {key:?}: expected time windows, got {other}"));
                    continue;
                }
            };

            if windows.is_empty() {
                continue;
            }

            let bands = table.bands.entry(tariff).or_default();
            for window in windows {
                bands.push(ScheduleBand {
                    day_type: day_type.clone(),
                    time_window: window.to_string(),
                });
            }
        }

        (table, problems)
    }

    /// Bands that qualify prices under the given tariff-type label.
    ///
    /// Labels are matched case-insensitively; unknown labels have no bands.
    #[must_use]
    pub fn bands_for(&self, tariff_label: &str) -> &[ScheduleBand] {
        ScheduledTariff::from_str(tariff_label.trim())
            .ok()
            .and_then(|tariff| self.bands.get(&tariff))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn table(value: Value) -> (ScheduleTable, Vec<String>) {
        ScheduleTable::parse(value.as_object())
    }

    #[test]
    fn parses_known_suffixes() {
        assert_eq!(
            parse_schedule_key("punta_laboral_tbp"),
            (Some(ScheduledTariff::Tbp), Some("Punta laboral".to_string()))
        );
        assert_eq!(
            parse_schedule_key("saturacion_ts"),
            (Some(ScheduledTariff::Ts), Some("Saturacion".to_string()))
        );
        assert_eq!(
            parse_schedule_key("FUERA_PUNTA_tbfp"),
            (Some(ScheduledTariff::Tbfp), Some("Fuera punta".to_string()))
        );
    }

    #[test]
    fn unknown_suffix_has_no_tariff() {
        assert_eq!(parse_schedule_key("laboral_normal").0, None);
        assert_eq!(parse_schedule_key("tbp"), (None, None));
    }

    #[test]
    fn empty_day_type_is_none() {
        assert_eq!(parse_schedule_key("_ts"), (Some(ScheduledTariff::Ts), None));
    }

    #[test]
    fn groups_windows_by_tariff() {
        let (schedule, problems) = table(json!({
            "punta_laboral_tbp": ["07:00-09:00", "18:00-20:00"],
            "punta_sabado_tbp": "10:00-14:00",
            "saturacion_ts": ["08:00-08:30"],
            "notas_varias": ["ignored"]
        }));
        assert!(problems.is_empty());
        assert_eq!(schedule.bands_for("tbp").len(), 3);
        assert_eq!(schedule.bands_for("TS").len(), 1);
        assert!(schedule.bands_for("TBFP").is_empty());
        assert!(schedule.bands_for("NORMAL").is_empty());
        assert_eq!(
            schedule.bands_for("TBP")[0],
            ScheduleBand {
                day_type: Some("Punta laboral".to_string()),
                time_window: "07:00-09:00".to_string(),
            }
        );
    }

    #[test]
    fn empty_window_list_defines_no_bands() {
        let (schedule, _) = table(json!({ "punta_laboral_tbp": [] }));
        assert!(schedule.bands_for("TBP").is_empty());
        assert!(schedule.bands_for("TS").is_empty());
    }

    #[test]
    fn reports_malformed_windows() {
        let (schedule, problems) = table(json!({
            "punta_laboral_tbp": ["07:00-09:00", 9],
            "saturacion_ts": { "from": "08:00" }
        }));
        assert_eq!(problems.len(), 2);
        assert_eq!(schedule.bands_for("TBP").len(), 1);
        assert!(schedule.bands_for("TS").is_empty());
    }
}
