//! Expansion of axes and gantries into toll points and toll charges.

use serde_json::{Map, Value};
use tollway_fare_models::{
    Coordinates, NORMAL_TARIFF, NewTollCharge, NewTollPoint, RawDirection, RawGantry,
    RawQualifiedTariff, RawSegment, RawSimpleTariff,
};

use crate::location::{GeoLookup, MatchRule};
use crate::schedule::ScheduleTable;
use crate::shape::{AxisRecord, AxisShape, UserTypeGroup};
use crate::sink::TollSink;

/// Location label used for user-type tariff groups on an unnamed axis.
const DEFAULT_TUNNEL_LABEL: &str = "túnel";

/// A gantry or synthesized pseudo-gantry, ready to expand.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GantryDescriptor {
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
    /// Vehicle category -> price or tariff-type -> price map.
    pub prices: Option<Map<String, Value>>,
    /// Raw schedule map.
    pub schedule: Option<Map<String, Value>>,
}

/// Upper-cases a price-map tariff key so it lines up with schedule
/// suffixes, defaulting to [`NORMAL_TARIFF`].
#[must_use]
pub fn normalize_tariff_label(label: Option<&str>) -> String {
    label
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map_or_else(|| NORMAL_TARIFF.to_string(), str::to_uppercase)
}

/// A tariff entry's own `tipo` label, kept as written. Only a missing or
/// blank label falls back to [`NORMAL_TARIFF`].
#[must_use]
pub fn entry_tariff_label(label: Option<&str>) -> String {
    label
        .filter(|l| !l.trim().is_empty())
        .map_or_else(|| NORMAL_TARIFF.to_string(), str::to_string)
}

enum PriceCell {
    Absent,
    Price(f64),
    Invalid,
}

fn price_cell(value: &Value) -> PriceCell {
    match value {
        Value::Null => PriceCell::Absent,
        Value::Number(n) => n.as_f64().map_or(PriceCell::Invalid, PriceCell::Price),
        _ => PriceCell::Invalid,
    }
}

/// Counters and notes accumulated while expanding one highway.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionTally {
    /// Toll points inserted.
    pub toll_points: u64,
    /// Toll charges inserted.
    pub toll_charges: u64,
    /// Malformed records skipped.
    pub skipped_records: u64,
    /// Notes about dropped data.
    pub warnings: Vec<String>,
}

/// Expands the axes of one highway into a sink.
pub struct HighwayExpander<'a, S: TollSink> {
    sink: &'a mut S,
    lookup: &'a GeoLookup,
    highway_id: i64,
    highway_name: &'a str,
    tally: ExpansionTally,
}

impl<'a, S: TollSink> HighwayExpander<'a, S> {
    /// Creates an expander for the highway with the given sink id.
    pub fn new(
        sink: &'a mut S,
        lookup: &'a GeoLookup,
        highway_id: i64,
        highway_name: &'a str,
    ) -> Self {
        Self {
            sink,
            lookup,
            highway_id,
            highway_name,
            tally: ExpansionTally::default(),
        }
    }

    /// Consumes the expander, returning what it did.
    #[must_use]
    pub fn finish(self) -> ExpansionTally {
        self.tally
    }

    fn skip(&mut self, what: &str, reason: impl std::fmt::Display) {
        log::warn!("{}: skipping {what}: {reason}", self.highway_name);
        self.tally.skipped_records += 1;
    }

    fn note(&mut self, message: String) {
        log::warn!("{}: {message}", self.highway_name);
        self.tally.warnings.push(format!("{}: {message}", self.highway_name));
    }

    /// Expands one classified axis.
    ///
    /// # Errors
    ///
    /// Returns the sink's error if any insert fails.
    pub fn expand_axis(&mut self, axis: AxisRecord) -> Result<(), S::Error> {
        let AxisRecord { name, shape } = axis;

        let Some(shape) = shape else {
            self.note(format!(
                "axis {:?} has no recognized toll point shape; skipped",
                name.as_deref().unwrap_or("<unnamed>")
            ));
            return Ok(());
        };

        match shape {
            AxisShape::Directional(directions) => {
                for direction in directions {
                    let direction: RawDirection = match serde_json::from_value(direction) {
                        Ok(d) => d,
                        Err(e) => {
                            self.skip("direction", e);
                            continue;
                        }
                    };
                    for gantry in direction.gantries {
                        let gantry: RawGantry = match serde_json::from_value(gantry) {
                            Ok(g) => g,
                            Err(e) => {
                                self.skip("gantry", e);
                                continue;
                            }
                        };
                        self.expand_gantry(GantryDescriptor {
                            concession_id: gantry.concession_id,
                            axis_name: name.clone(),
                            sense: direction.sense.clone(),
                            reference_label: gantry.reference,
                            segment_km: gantry.segment_km,
                            prices: gantry.prices,
                            schedule: gantry.schedule,
                        })?;
                    }
                }
            }
            AxisShape::Segmented { segments, schedule } => {
                for segment in segments {
                    let segment: RawSegment = match serde_json::from_value(segment) {
                        Ok(s) => s,
                        Err(e) => {
                            self.skip("segment", e);
                            continue;
                        }
                    };
                    let entry = segment.entry.unwrap_or_default();
                    let exit = segment.exit.unwrap_or_default();
                    self.expand_gantry(GantryDescriptor {
                        concession_id: Some(format!("{entry}-{exit}")),
                        axis_name: name.clone(),
                        sense: None,
                        reference_label: Some(format!("{entry} - {exit}")),
                        segment_km: segment.segment_km,
                        prices: segment.prices,
                        schedule: segment.schedule.or_else(|| schedule.clone()),
                    })?;
                }
            }
            AxisShape::Flat(gantries) => {
                for gantry in gantries {
                    let gantry: RawGantry = match serde_json::from_value(gantry) {
                        Ok(g) => g,
                        Err(e) => {
                            self.skip("gantry", e);
                            continue;
                        }
                    };
                    self.expand_gantry(GantryDescriptor {
                        concession_id: gantry.concession_id,
                        axis_name: name.clone(),
                        sense: None,
                        reference_label: gantry.name.or(gantry.reference),
                        segment_km: gantry.segment_km,
                        prices: gantry.prices,
                        schedule: gantry.schedule,
                    })?;
                }
            }
            AxisShape::Tunnel(groups) => {
                for group in groups {
                    self.expand_user_type_group(name.as_deref(), group)?;
                }
            }
            AxisShape::Simple(tariffs) => self.expand_simple(name, tariffs)?,
        }

        Ok(())
    }

    fn insert_point(&mut self, point: &NewTollPoint) -> Result<i64, S::Error> {
        let id = self.sink.insert_toll_point(point)?;
        self.tally.toll_points += 1;
        Ok(id)
    }

    fn insert_charge(&mut self, charge: NewTollCharge) -> Result<(), S::Error> {
        self.sink.insert_toll_charge(charge)?;
        self.tally.toll_charges += 1;
        Ok(())
    }

    fn locate(
        &self,
        concession_id: Option<&str>,
        reference: Option<&str>,
    ) -> Option<Coordinates> {
        let resolved = self.lookup.locate(concession_id, reference);
        match &resolved {
            Some(r) => {
                let rule = match &r.rule {
                    MatchRule::ConcessionId => "concession id".to_string(),
                    MatchRule::Reference => "reference".to_string(),
                    MatchRule::Substring(name) => format!("substring {name:?}"),
                };
                log::debug!(
                    "{}: located {:?}/{:?} by {rule}",
                    self.highway_name,
                    concession_id,
                    reference
                );
            }
            None => log::debug!(
                "{}: no location for {:?}/{:?}",
                self.highway_name,
                concession_id,
                reference
            ),
        }
        resolved.map(|r| r.coordinates)
    }

    /// Persists one gantry as a toll point and expands its prices against
    /// its schedule.
    ///
    /// A price under tariff type `T` yields one charge per schedule band of
    /// `T`, or a single unqualified charge when `T` has no bands. A scalar
    /// price yields one [`NORMAL_TARIFF`] charge. Null prices yield nothing.
    ///
    /// Returns the toll point id.
    ///
    /// # Errors
    ///
    /// Returns the sink's error if any insert fails.
    pub fn expand_gantry(&mut self, gantry: GantryDescriptor) -> Result<i64, S::Error> {
        let location = self.locate(
            gantry.concession_id.as_deref(),
            gantry.reference_label.as_deref(),
        );

        let toll_point_id = self.insert_point(&NewTollPoint {
            highway_id: self.highway_id,
            concession_id: gantry.concession_id,
            axis_name: gantry.axis_name,
            sense: gantry.sense,
            reference_label: gantry.reference_label,
            segment_km: gantry.segment_km,
            location,
        })?;

        let (schedule, problems) = ScheduleTable::parse(gantry.schedule.as_ref());
        for problem in problems {
            self.skip("schedule entry", problem);
        }

        let Some(prices) = gantry.prices else {
            return Ok(toll_point_id);
        };

        for (category, tariffs) in prices {
            match tariffs {
                Value::Null => {}
                Value::Object(by_tariff) => {
                    for (tariff, value) in by_tariff {
                        let price = match price_cell(&value) {
                            PriceCell::Absent => continue,
                            PriceCell::Invalid => {
                                self.skip("price", format!("{category}/{tariff} = {value}"));
                                continue;
                            }
                            PriceCell::Price(price) => price,
                        };
                        let tariff_type = normalize_tariff_label(Some(tariff.as_str()));
                        let bands = schedule.bands_for(&tariff_type);

                        if bands.is_empty() {
                            self.insert_charge(NewTollCharge {
                                toll_point_id,
                                vehicle_category: category.clone(),
                                tariff_type,
                                price,
                                day_type: None,
                                time_window: None,
                            })?;
                        } else {
                            for band in bands {
                                self.insert_charge(NewTollCharge {
                                    toll_point_id,
                                    vehicle_category: category.clone(),
                                    tariff_type: tariff_type.clone(),
                                    price,
                                    day_type: band.day_type.clone(),
                                    time_window: Some(band.time_window.clone()),
                                })?;
                            }
                        }
                    }
                }
                scalar => match price_cell(&scalar) {
                    PriceCell::Absent => {}
                    PriceCell::Invalid => self.skip("price", format!("{category} = {scalar}")),
                    PriceCell::Price(price) => self.insert_charge(NewTollCharge {
                        toll_point_id,
                        vehicle_category: category,
                        tariff_type: NORMAL_TARIFF.to_string(),
                        price,
                        day_type: None,
                        time_window: None,
                    })?,
                },
            }
        }

        Ok(toll_point_id)
    }

    /// Each entry of a user-type group is already qualified by day type and
    /// time window, so it becomes its own toll point with one charge per
    /// vehicle category and no schedule fusion.
    fn expand_user_type_group(
        &mut self,
        axis_name: Option<&str>,
        group: UserTypeGroup,
    ) -> Result<(), S::Error> {
        let label = axis_name.unwrap_or(DEFAULT_TUNNEL_LABEL);

        for entry in group.entries {
            let tariff: RawQualifiedTariff = match serde_json::from_value(entry) {
                Ok(t) => t,
                Err(e) => {
                    self.skip("user-type tariff", e);
                    continue;
                }
            };

            // Geo names carry the sense but never the user type.
            let place = tariff
                .sense
                .as_deref()
                .map_or_else(|| label.to_string(), |sense| format!("{label} {sense}"));
            let reference = format!("{place} ({})", group.user_type);
            let location = self.locate(None, Some(&place));

            let toll_point_id = self.insert_point(&NewTollPoint {
                highway_id: self.highway_id,
                concession_id: None,
                axis_name: axis_name.map(str::to_string),
                sense: tariff.sense.clone(),
                reference_label: Some(reference),
                segment_km: None,
                location,
            })?;

            let tariff_type = entry_tariff_label(tariff.tariff_type.as_deref());
            self.insert_scalar_prices(
                toll_point_id,
                tariff.prices,
                &tariff_type,
                tariff.day_type.as_deref(),
                tariff.time_window.as_deref(),
            )?;
        }

        Ok(())
    }

    /// The whole axis becomes one toll point referenced by the axis name.
    fn expand_simple(&mut self, axis_name: Option<String>, tariffs: Vec<Value>) -> Result<(), S::Error> {
        let location = self.locate(None, axis_name.as_deref());

        let toll_point_id = self.insert_point(&NewTollPoint {
            highway_id: self.highway_id,
            concession_id: None,
            axis_name: axis_name.clone(),
            sense: None,
            reference_label: axis_name,
            segment_km: None,
            location,
        })?;

        for entry in tariffs {
            let tariff: RawSimpleTariff = match serde_json::from_value(entry) {
                Ok(t) => t,
                Err(e) => {
                    self.skip("tariff", e);
                    continue;
                }
            };
            let tariff_type = entry_tariff_label(tariff.tariff_type.as_deref());
            self.insert_scalar_prices(toll_point_id, tariff.prices, &tariff_type, None, None)?;
        }

        Ok(())
    }

    fn insert_scalar_prices(
        &mut self,
        toll_point_id: i64,
        prices: Option<Map<String, Value>>,
        tariff_type: &str,
        day_type: Option<&str>,
        time_window: Option<&str>,
    ) -> Result<(), S::Error> {
        for (category, value) in prices.unwrap_or_default() {
            match price_cell(&value) {
                PriceCell::Absent => {}
                PriceCell::Invalid => self.skip("price", format!("{category} = {value}")),
                PriceCell::Price(price) => self.insert_charge(NewTollCharge {
                    toll_point_id,
                    vehicle_category: category,
                    tariff_type: tariff_type.to_string(),
                    price,
                    day_type: day_type.map(str::to_string),
                    time_window: time_window.map(str::to_string),
                })?,
            }
        }
        Ok(())
    }
}
