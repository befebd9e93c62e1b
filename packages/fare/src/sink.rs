//! Write-sink abstraction the reconciliation engine persists through.
//!
//! The engine only ever appends: it clears prior toll data once, inserts
//! highways, toll points and toll charges in a single pass, and flushes at
//! the end. Toll point ids must be returned immediately because the charges
//! that follow reference them.

use std::convert::Infallible;

use tollway_fare_models::{NewHighway, NewTollCharge, NewTollPoint};

/// Destination for reconciled toll records.
pub trait TollSink {
    /// Error raised by the underlying storage.
    type Error: std::error::Error + 'static;

    /// Removes all previously stored highways, toll points and charges.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the storage rejects the delete.
    fn clear(&mut self) -> Result<(), Self::Error>;

    /// Stores a highway and returns its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the insert fails.
    fn insert_highway(&mut self, highway: &NewHighway) -> Result<i64, Self::Error>;

    /// Stores a toll point and returns its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the insert fails.
    fn insert_toll_point(&mut self, point: &NewTollPoint) -> Result<i64, Self::Error>;

    /// Appends a toll charge. Implementations may buffer until
    /// [`TollSink::flush`].
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the insert (or a buffer spill) fails.
    fn insert_toll_charge(&mut self, charge: NewTollCharge) -> Result<(), Self::Error>;

    /// Writes out anything still buffered.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the buffered writes fail.
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// An in-memory [`TollSink`] that assigns sequential ids starting at 1.
///
/// Used for dry runs and tests.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    /// Stored highways with their ids.
    pub highways: Vec<(i64, NewHighway)>,
    /// Stored toll points with their ids.
    pub toll_points: Vec<(i64, NewTollPoint)>,
    /// Stored toll charges.
    pub toll_charges: Vec<NewTollCharge>,
    next_id: i64,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn assign_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Returns the charges stored for one toll point.
    #[must_use]
    pub fn charges_for(&self, toll_point_id: i64) -> Vec<&NewTollCharge> {
        self.toll_charges
            .iter()
            .filter(|c| c.toll_point_id == toll_point_id)
            .collect()
    }
}

impl TollSink for MemorySink {
    type Error = Infallible;

    fn clear(&mut self) -> Result<(), Self::Error> {
        self.highways.clear();
        self.toll_points.clear();
        self.toll_charges.clear();
        self.next_id = 0;
        Ok(())
    }

    fn insert_highway(&mut self, highway: &NewHighway) -> Result<i64, Self::Error> {
        let id = self.assign_id();
        self.highways.push((id, highway.clone()));
        Ok(id)
    }

    fn insert_toll_point(&mut self, point: &NewTollPoint) -> Result<i64, Self::Error> {
        let id = self.assign_id();
        self.toll_points.push((id, point.clone()));
        Ok(id)
    }

    fn insert_toll_charge(&mut self, charge: NewTollCharge) -> Result<(), Self::Error> {
        self.toll_charges.push(charge);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
