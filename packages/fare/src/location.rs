//! Resolves toll point descriptors to coordinates from the geo reference.
//!
//! Names are normalized by trimming and lower-casing. A descriptor is
//! matched by, in order:
//!
//! 1. its concession id equal to a lookup name,
//! 2. its reference label equal to a lookup name,
//! 3. the first lookup name (in insertion order) contained in its
//!    reference label.
//!
//! Rule 3 picks the first hit, not the longest one. Insertion order is the
//! order of the geo reference document, so results are reproducible for a
//! given document but depend on how it is ordered.

use std::collections::BTreeMap;

use tollway_fare_models::{Coordinates, GeoReferenceDocument};

/// Normalizes a name for lookup: trimmed and lower-cased.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Which rule produced a location match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchRule {
    /// The concession id equals a lookup name.
    ConcessionId,
    /// The reference label equals a lookup name.
    Reference,
    /// The lookup name is contained in the reference label.
    Substring(String),
}

/// A successful lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLocation {
    /// Coordinates of the matched entry.
    pub coordinates: Coordinates,
    /// How the entry was matched.
    pub rule: MatchRule,
}

/// Name -> coordinates lookup that remembers insertion order.
#[derive(Debug, Clone, Default)]
pub struct GeoLookup {
    entries: Vec<(String, Coordinates)>,
    index: BTreeMap<String, usize>,
}

impl GeoLookup {
    /// Creates an empty lookup.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a lookup from a geo reference document.
    ///
    /// Entries without a name, or without usable coordinates (missing,
    /// non-finite, or exactly zero), are dropped.
    #[must_use]
    pub fn from_document(document: &GeoReferenceDocument) -> Self {
        let mut lookup = Self::new();
        let mut dropped = 0usize;

        for entry in &document.entries {
            let Some(name) = entry.name.as_deref() else {
                dropped += 1;
                continue;
            };
            let Some(coordinates) = valid_coordinates(entry.latitude, entry.longitude) else {
                log::warn!("Geo reference {name:?} has no usable coordinates; ignoring it");
                dropped += 1;
                continue;
            };
            if !lookup.insert(name, coordinates) {
                dropped += 1;
            }
        }

        log::info!(
            "Loaded {} toll locations ({dropped} geo reference entries dropped)",
            lookup.len()
        );

        lookup
    }

    /// Adds an entry. A repeated name keeps its original position and takes
    /// the new coordinates.
    ///
    /// Returns `false` if the name is empty after normalization.
    pub fn insert(&mut self, name: &str, coordinates: Coordinates) -> bool {
        let key = normalize_name(name);
        if key.is_empty() {
            return false;
        }

        if let Some(&idx) = self.index.get(&key) {
            self.entries[idx].1 = coordinates;
        } else {
            self.index.insert(key.clone(), self.entries.len());
            self.entries.push((key, coordinates));
        }
        true
    }

    /// Number of distinct names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the lookup has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact lookup by (unnormalized) name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Coordinates> {
        self.index
            .get(&normalize_name(name))
            .map(|&idx| self.entries[idx].1)
    }

    /// Matches a descriptor against the lookup, reporting the rule used.
    #[must_use]
    pub fn locate(
        &self,
        concession_id: Option<&str>,
        reference: Option<&str>,
    ) -> Option<ResolvedLocation> {
        let id = concession_id.map(normalize_name).unwrap_or_default();
        let reference = reference.map(normalize_name).unwrap_or_default();

        if !id.is_empty()
            && let Some(coordinates) = self.get(&id)
        {
            return Some(ResolvedLocation {
                coordinates,
                rule: MatchRule::ConcessionId,
            });
        }

        if reference.is_empty() {
            return None;
        }

        if let Some(coordinates) = self.get(&reference) {
            return Some(ResolvedLocation {
                coordinates,
                rule: MatchRule::Reference,
            });
        }

        self.entries
            .iter()
            .find(|(name, _)| reference.contains(name.as_str()))
            .map(|(name, coordinates)| ResolvedLocation {
                coordinates: *coordinates,
                rule: MatchRule::Substring(name.clone()),
            })
    }
}

fn valid_coordinates(latitude: Option<f64>, longitude: Option<f64>) -> Option<Coordinates> {
    let latitude = latitude?;
    let longitude = longitude?;
    if !latitude.is_finite() || !longitude.is_finite() || latitude == 0.0 || longitude == 0.0 {
        return None;
    }
    Some(Coordinates {
        longitude,
        latitude,
    })
}
