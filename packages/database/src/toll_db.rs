//! Toll point and toll charge storage.
//!
//! The toll database lives at `data/shared/tolls.duckdb` and holds three
//! tables (`highways`, `toll_points`, `toll_charges`) plus a `_meta` table
//! describing the last committed load. Ids come from sequences, so they
//! keep growing across loads.

use std::path::Path;

use duckdb::{Connection, params};
use tollway_fare::sink::TollSink;
use tollway_fare_models::{NewHighway, NewTollCharge, NewTollPoint, TollCounts};

use crate::DbError;

/// Number of buffered charges per INSERT chunk.
const CHUNK_SIZE: usize = 5_000;

/// A stored charge as `(vehicle_category, tariff_type, price, day_type,
/// time_window)`.
pub type ChargeTuple = (String, String, f64, Option<String>, Option<String>);

/// Opens (or creates) the toll database and ensures the schema exists.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open(path: &Path) -> Result<Connection, DbError> {
    if let Some(parent) = path.parent() {
        crate::paths::ensure_dir(parent)?;
    }

    let conn = Connection::open(path)?;
    create_schema(&conn)?;

    Ok(conn)
}

/// Opens a throwaway in-memory toll database with the schema in place.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open_in_memory() -> Result<Connection, DbError> {
    let conn = Connection::open_in_memory()?;
    create_schema(&conn)?;
    Ok(conn)
}

fn create_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE SEQUENCE IF NOT EXISTS highways_id_seq;
        CREATE SEQUENCE IF NOT EXISTS toll_points_id_seq;
        CREATE SEQUENCE IF NOT EXISTS toll_charges_id_seq;

        CREATE TABLE IF NOT EXISTS highways (
            id BIGINT PRIMARY KEY DEFAULT nextval('highways_id_seq'),
            name TEXT NOT NULL,
            description TEXT,
            tariff_year INTEGER
        );

        CREATE TABLE IF NOT EXISTS toll_points (
            id BIGINT PRIMARY KEY DEFAULT nextval('toll_points_id_seq'),
            highway_id BIGINT NOT NULL,
            concession_id TEXT,
            axis_name TEXT,
            sense TEXT,
            reference_label TEXT,
            segment_km DOUBLE,
            longitude DOUBLE,
            latitude DOUBLE
        );

        CREATE TABLE IF NOT EXISTS toll_charges (
            id BIGINT PRIMARY KEY DEFAULT nextval('toll_charges_id_seq'),
            toll_point_id BIGINT NOT NULL,
            vehicle_category TEXT NOT NULL,
            tariff_type TEXT NOT NULL,
            price DOUBLE NOT NULL,
            day_type TEXT,
            time_window TEXT
        );

        CREATE TABLE IF NOT EXISTS _meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )?;

    Ok(())
}

/// A transactional [`TollSink`] over a `DuckDB` connection.
///
/// Everything written through the store is part of one transaction opened
/// by [`TollStore::begin`]. [`TollStore::commit`] makes it durable;
/// dropping the store without committing rolls it back.
pub struct TollStore<'a> {
    conn: &'a Connection,
    pending_charges: Vec<NewTollCharge>,
    committed: bool,
}

impl<'a> TollStore<'a> {
    /// Opens a transaction on `conn`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the transaction cannot be started.
    pub fn begin(conn: &'a Connection) -> Result<Self, DbError> {
        conn.execute_batch("BEGIN TRANSACTION")?;
        Ok(Self {
            conn,
            pending_charges: Vec::new(),
            committed: false,
        })
    }

    /// Flushes buffered charges and commits the transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the flush or the commit fails; the
    /// transaction is then rolled back.
    pub fn commit(mut self) -> Result<(), DbError> {
        self.write_pending_charges()?;
        self.conn.execute_batch("COMMIT")?;
        self.committed = true;
        Ok(())
    }

    fn write_pending_charges(&mut self) -> Result<(), DbError> {
        if self.pending_charges.is_empty() {
            return Ok(());
        }

        let mut written = 0u64;

        for chunk in self.pending_charges.chunks(CHUNK_SIZE) {
            let mut sql = String::from(
                "INSERT INTO toll_charges (
                    toll_point_id, vehicle_category, tariff_type, price,
                    day_type, time_window
                ) VALUES ",
            );

            for (i, _) in chunk.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                sql.push_str("(?, ?, ?, ?, ?, ?)");
            }

            let mut stmt = self.conn.prepare(&sql)?;
            let mut param_idx = 1usize;

            for charge in chunk {
                stmt.raw_bind_parameter(param_idx, charge.toll_point_id)?;
                stmt.raw_bind_parameter(param_idx + 1, &charge.vehicle_category)?;
                stmt.raw_bind_parameter(param_idx + 2, &charge.tariff_type)?;
                stmt.raw_bind_parameter(param_idx + 3, charge.price)?;
                stmt.raw_bind_parameter(param_idx + 4, charge.day_type.as_deref())?;
                stmt.raw_bind_parameter(param_idx + 5, charge.time_window.as_deref())?;
                param_idx += 6;
            }

            let rows = stmt.raw_execute()?;
            written += u64::try_from(rows).unwrap_or(0);
        }

        log::debug!("Wrote {written} toll charges");
        self.pending_charges.clear();

        Ok(())
    }
}

impl Drop for TollStore<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        log::warn!("Rolling back uncommitted toll load");
        if let Err(e) = self.conn.execute_batch("ROLLBACK") {
            log::error!("Rollback failed: {e}");
        }
    }
}

impl TollSink for TollStore<'_> {
    type Error = DbError;

    fn clear(&mut self) -> Result<(), DbError> {
        self.pending_charges.clear();
        self.conn.execute_batch(
            "DELETE FROM toll_charges;
             DELETE FROM toll_points;
             DELETE FROM highways;",
        )?;
        Ok(())
    }

    fn insert_highway(&mut self, highway: &NewHighway) -> Result<i64, DbError> {
        let id = self.conn.query_row(
            "INSERT INTO highways (name, description, tariff_year)
             VALUES (?, ?, ?)
             RETURNING id",
            params![highway.name, highway.description, highway.tariff_year],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn insert_toll_point(&mut self, point: &NewTollPoint) -> Result<i64, DbError> {
        let id = self.conn.query_row(
            "INSERT INTO toll_points (
                highway_id, concession_id, axis_name, sense, reference_label,
                segment_km, longitude, latitude
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING id",
            params![
                point.highway_id,
                point.concession_id,
                point.axis_name,
                point.sense,
                point.reference_label,
                point.segment_km,
                point.location.map(|c| c.longitude),
                point.location.map(|c| c.latitude),
            ],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn insert_toll_charge(&mut self, charge: NewTollCharge) -> Result<(), DbError> {
        self.pending_charges.push(charge);
        if self.pending_charges.len() >= CHUNK_SIZE {
            self.write_pending_charges()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), DbError> {
        self.write_pending_charges()
    }
}

fn count_rows(conn: &Connection, table: &str) -> Result<u64, DbError> {
    let mut stmt = conn.prepare(&format!("SELECT COUNT(*) FROM {table}"))?;
    let count: i64 = stmt.query_row([], |row| row.get(0))?;
    #[allow(clippy::cast_sign_loss)]
    Ok(count as u64)
}

/// Returns the row counts of the toll tables.
///
/// # Errors
///
/// Returns [`DbError`] if any query fails.
pub fn get_counts(conn: &Connection) -> Result<TollCounts, DbError> {
    Ok(TollCounts {
        highways: count_rows(conn, "highways")?,
        toll_points: count_rows(conn, "toll_points")?,
        toll_charges: count_rows(conn, "toll_charges")?,
    })
}

/// Returns every stored charge without its surrogate ids, sorted.
///
/// Two loads of the same documents produce identical results here.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn load_charge_tuples(conn: &Connection) -> Result<Vec<ChargeTuple>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT vehicle_category, tariff_type, price, day_type, time_window
         FROM toll_charges
         ORDER BY vehicle_category, tariff_type, price, day_type, time_window",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
    })?;

    let mut tuples = Vec::new();
    for row in rows {
        tuples.push(row?);
    }
    Ok(tuples)
}

/// Returns every stored toll point in insertion order.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn load_toll_points(conn: &Connection) -> Result<Vec<NewTollPoint>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT highway_id, concession_id, axis_name, sense, reference_label,
                segment_km, longitude, latitude
         FROM toll_points
         ORDER BY id",
    )?;

    let rows = stmt.query_map([], |row| {
        let longitude: Option<f64> = row.get(6)?;
        let latitude: Option<f64> = row.get(7)?;
        Ok(NewTollPoint {
            highway_id: row.get(0)?,
            concession_id: row.get(1)?,
            axis_name: row.get(2)?,
            sense: row.get(3)?,
            reference_label: row.get(4)?,
            segment_km: row.get(5)?,
            location: longitude
                .zip(latitude)
                .map(|(longitude, latitude)| tollway_fare_models::Coordinates {
                    longitude,
                    latitude,
                }),
        })
    })?;

    let mut points = Vec::new();
    for row in rows {
        points.push(row?);
    }
    Ok(points)
}

/// Gets a metadata value from the `_meta` table.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn get_meta(conn: &Connection, key: &str) -> Result<Option<String>, DbError> {
    let mut stmt = conn.prepare("SELECT value FROM _meta WHERE key = ?")?;
    let result = stmt.query_row([key], |row| row.get(0));
    match result {
        Ok(v) => Ok(Some(v)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(DbError::DuckDb(e)),
    }
}

/// Sets a metadata value in the `_meta` table.
///
/// # Errors
///
/// Returns [`DbError`] if the upsert fails.
pub fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO _meta (key, value) VALUES (?, ?)
         ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
        params![key, value],
    )?;
    Ok(())
}

/// Records the input files, table counts and load time after a committed
/// load.
///
/// # Errors
///
/// Returns [`DbError`] if the metadata update fails.
pub fn update_load_metadata(
    conn: &Connection,
    fares_file: &Path,
    georef_file: &Path,
) -> Result<TollCounts, DbError> {
    let counts = get_counts(conn)?;
    let now = chrono::Utc::now().to_rfc3339();

    set_meta(conn, "fares_file", &fares_file.display().to_string())?;
    set_meta(conn, "georef_file", &georef_file.display().to_string())?;
    set_meta(conn, "highway_count", &counts.highways.to_string())?;
    set_meta(conn, "toll_point_count", &counts.toll_points.to_string())?;
    set_meta(conn, "toll_charge_count", &counts.toll_charges.to_string())?;
    set_meta(conn, "last_loaded_at", &now)?;

    Ok(counts)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tollway_fare::location::GeoLookup;
    use tollway_fare::reconcile;
    use tollway_fare_models::{Coordinates, FareDocument};

    use super::*;

    fn fares() -> FareDocument {
        serde_json::from_value(json!({
            "autopistas": [
                {
                    "nombre_autopista": "Costanera Norte",
                    "año_tarifas": 2025,
                    "ejes": [{ "nombre_eje": "Eje Kennedy", "porticos": [
                        { "portico_id": "p9", "peajes": { "auto": { "tbp": 900, "tbfp": 500 } },
                          "horarios": { "punta_laboral_tbp": ["07:00-09:00", "18:00-20:00"] } },
                        { "portico_id": "p10", "peajes": { "auto": { "tbfp": 450 }, "moto": null } }
                    ]}]
                },
                { "nombre_autopista": "Ruta 68", "ejes": [
                    { "tarifas": [{ "tipo": "NORMAL", "peajes": { "auto": 1000, "camion": 2500 } }] }
                ]}
            ]
        }))
        .unwrap()
    }

    fn lookup() -> GeoLookup {
        let mut lookup = GeoLookup::new();
        lookup.insert(
            "p9",
            Coordinates {
                longitude: -70.58,
                latitude: -33.39,
            },
        );
        lookup
    }

    fn load(conn: &Connection) {
        let mut store = TollStore::begin(conn).unwrap();
        reconcile(&fares(), &lookup(), &mut store, None).unwrap();
        store.commit().unwrap();
    }

    #[test]
    fn committed_load_is_persisted() {
        let conn = open_in_memory().unwrap();
        load(&conn);

        let counts = get_counts(&conn).unwrap();
        assert_eq!(
            counts,
            TollCounts {
                highways: 2,
                toll_points: 3,
                toll_charges: 6,
            }
        );

        let tuples = load_charge_tuples(&conn).unwrap();
        assert!(tuples.contains(&(
            "auto".to_string(),
            "TBP".to_string(),
            900.0,
            Some("Punta laboral".to_string()),
            Some("18:00-20:00".to_string())
        )));
        assert!(tuples.contains(&("camion".to_string(), "NORMAL".to_string(), 2500.0, None, None)));
    }

    #[test]
    fn reloading_is_idempotent() {
        let conn = open_in_memory().unwrap();
        load(&conn);
        let first_counts = get_counts(&conn).unwrap();
        let first_tuples = load_charge_tuples(&conn).unwrap();

        load(&conn);
        assert_eq!(get_counts(&conn).unwrap(), first_counts);
        assert_eq!(load_charge_tuples(&conn).unwrap(), first_tuples);
    }

    #[test]
    fn dropping_an_uncommitted_store_rolls_back() {
        let conn = open_in_memory().unwrap();
        load(&conn);
        let before = load_charge_tuples(&conn).unwrap();

        {
            let mut store = TollStore::begin(&conn).unwrap();
            store.clear().unwrap();
            store
                .insert_highway(&NewHighway {
                    name: "Autopista Central".to_string(),
                    description: None,
                    tariff_year: None,
                })
                .unwrap();
        }

        assert_eq!(get_counts(&conn).unwrap().highways, 2);
        assert_eq!(load_charge_tuples(&conn).unwrap(), before);
    }

    #[test]
    fn missing_location_is_stored_as_null() {
        let conn = open_in_memory().unwrap();
        load(&conn);

        let points = load_toll_points(&conn).unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(
            points[0].location,
            Some(Coordinates {
                longitude: -70.58,
                latitude: -33.39,
            })
        );
        assert_eq!(points[1].location, None);

        let nulls: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM toll_points WHERE longitude IS NULL AND latitude IS NULL",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(nulls, 2);
    }

    #[test]
    fn charges_spill_when_the_buffer_fills() {
        let conn = open_in_memory().unwrap();
        let mut store = TollStore::begin(&conn).unwrap();
        let highway_id = store
            .insert_highway(&NewHighway {
                name: "Vespucio Sur".to_string(),
                description: None,
                tariff_year: Some(2025),
            })
            .unwrap();
        let toll_point_id = store
            .insert_toll_point(&NewTollPoint {
                highway_id,
                concession_id: Some("vs1".to_string()),
                axis_name: None,
                sense: None,
                reference_label: None,
                segment_km: None,
                location: None,
            })
            .unwrap();

        for i in 0..=CHUNK_SIZE {
            #[allow(clippy::cast_precision_loss)]
            store
                .insert_toll_charge(NewTollCharge {
                    toll_point_id,
                    vehicle_category: "auto".to_string(),
                    tariff_type: "NORMAL".to_string(),
                    price: i as f64,
                    day_type: None,
                    time_window: None,
                })
                .unwrap();
        }
        assert_eq!(store.pending_charges.len(), 1);
        store.commit().unwrap();

        assert_eq!(get_counts(&conn).unwrap().toll_charges, CHUNK_SIZE as u64 + 1);
    }

    #[test]
    fn load_metadata_round_trips() {
        let conn = open_in_memory().unwrap();
        assert_eq!(get_meta(&conn, "last_loaded_at").unwrap(), None);

        load(&conn);
        let counts =
            update_load_metadata(&conn, Path::new("precios.json"), Path::new("geo.json")).unwrap();

        assert_eq!(counts.toll_points, 3);
        assert_eq!(get_meta(&conn, "toll_charge_count").unwrap().as_deref(), Some("6"));
        assert_eq!(get_meta(&conn, "fares_file").unwrap().as_deref(), Some("precios.json"));
        assert!(get_meta(&conn, "last_loaded_at").unwrap().is_some());

        set_meta(&conn, "fares_file", "otro.json").unwrap();
        assert_eq!(get_meta(&conn, "fares_file").unwrap().as_deref(), Some("otro.json"));
    }
}
