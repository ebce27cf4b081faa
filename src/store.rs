//! Sqlite persistence adapter for the `cells` table.
//!
//! The store acts as a long-lived cache and work queue keyed by cell
//! identity. The engine reads due-record snapshots and writes one
//! transaction per dispatched batch, always from the single driver task, so
//! no locking is needed beyond sqlite's own.

use crate::resolver::outcome::{CellKey, CellRecord};
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OpenFlags};
use std::path::Path;

const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS cells (
    mcc INTEGER NOT NULL,
    mnc INTEGER NOT NULL,
    lac INTEGER NOT NULL,
    cellid INTEGER NOT NULL,
    lat REAL NOT NULL,
    lon REAL NOT NULL,
    range INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (mcc, mnc, lac, cellid)
)";

/// One write destined for the per-batch transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreUpdate {
    /// A resolved coordinate: store it and refresh the watermark.
    Hit {
        key: CellKey,
        lat: f64,
        lon: f64,
        range_m: u32,
    },
    /// Refresh the watermark only, so the record is not re-selected within
    /// the same pass (misses and implausible results).
    Touch { key: CellKey },
}

pub struct CellStore {
    conn: Connection,
}

impl CellStore {
    /// Opens an existing cell store read-write. The store must already
    /// exist; creating or migrating it is not this engine's job.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("failed to open cell store at {}", path.display()))?;
        Ok(Self { conn })
    }

    /// Opens (or creates) a store and ensures the schema exists. Used for
    /// fresh stores and test fixtures.
    pub fn open_or_create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("failed to create cell store at {}", path.display()))?;
        conn.execute(SCHEMA, [])
            .context("failed to initialize cells schema")?;
        Ok(Self { conn })
    }

    /// Number of records whose watermark predates `now`.
    pub fn count_due(&self, now: i64) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM cells WHERE updated_at < ?1",
                params![now],
                |row| row.get(0),
            )
            .context("failed to count due cells")?;
        Ok(count as u64)
    }

    /// Fetches up to `limit` due records. Successive calls within one pass
    /// see a shrinking set because every visited record either resolves or
    /// gets its watermark refreshed.
    pub fn fetch_due_batch(&self, now: i64, limit: usize) -> Result<Vec<CellRecord>> {
        let mut statement = self
            .conn
            .prepare_cached(
                "SELECT mcc, mnc, lac, cellid, lat, lon, range, updated_at
                 FROM cells WHERE updated_at < ?1 LIMIT ?2",
            )
            .context("failed to prepare due batch query")?;

        let rows = statement
            .query_map(params![now, limit as i64], |row| {
                Ok(CellRecord {
                    key: CellKey {
                        mcc: row.get::<_, i64>(0)? as u32,
                        mnc: row.get::<_, i64>(1)? as u32,
                        lac: row.get::<_, i64>(2)? as u32,
                        cell_id: row.get::<_, i64>(3)? as u32,
                    },
                    lat: row.get(4)?,
                    lon: row.get(5)?,
                    range_m: row.get::<_, i64>(6)? as u32,
                    updated_at: row.get(7)?,
                })
            })
            .context("failed to query due cells")?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row.context("failed to read due cell row")?);
        }
        Ok(records)
    }

    /// Applies one batch's updates in a single transaction, so a batch
    /// becomes visible atomically or not at all.
    pub fn apply_batch(&mut self, updates: &[StoreUpdate], now: i64) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let tx = self
            .conn
            .transaction()
            .context("failed to begin batch transaction")?;
        for update in updates {
            match update {
                StoreUpdate::Hit {
                    key,
                    lat,
                    lon,
                    range_m,
                } => {
                    tx.execute(
                        "UPDATE cells SET lat = ?1, lon = ?2, range = ?3, updated_at = ?4
                         WHERE mcc = ?5 AND mnc = ?6 AND lac = ?7 AND cellid = ?8",
                        params![lat, lon, *range_m as i64, now, key.mcc, key.mnc, key.lac, key.cell_id],
                    )
                    .with_context(|| format!("failed to commit hit for cell {key}"))?;
                }
                StoreUpdate::Touch { key } => {
                    tx.execute(
                        "UPDATE cells SET updated_at = ?1
                         WHERE mcc = ?2 AND mnc = ?3 AND lac = ?4 AND cellid = ?5",
                        params![now, key.mcc, key.mnc, key.lac, key.cell_id],
                    )
                    .with_context(|| format!("failed to touch cell {key}"))?;
                }
            }
        }
        tx.commit().context("failed to commit batch transaction")
    }

    /// Reads one record back by key, mostly for verification and tests.
    pub fn get(&self, key: &CellKey) -> Result<Option<CellRecord>> {
        let mut statement = self
            .conn
            .prepare_cached(
                "SELECT lat, lon, range, updated_at FROM cells
                 WHERE mcc = ?1 AND mnc = ?2 AND lac = ?3 AND cellid = ?4",
            )
            .context("failed to prepare cell fetch")?;

        let record = statement
            .query_row(params![key.mcc, key.mnc, key.lac, key.cell_id], |row| {
                Ok(CellRecord {
                    key: *key,
                    lat: row.get(0)?,
                    lon: row.get(1)?,
                    range_m: row.get::<_, i64>(2)? as u32,
                    updated_at: row.get(3)?,
                })
            });

        match record {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(err) => Err(err).context("failed to fetch cell"),
        }
    }

    /// Inserts a fresh record, used to seed stores in tests and tooling.
    pub fn insert(&self, record: &CellRecord) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO cells (mcc, mnc, lac, cellid, lat, lon, range, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.key.mcc,
                    record.key.mnc,
                    record.key.lac,
                    record.key.cell_id,
                    record.lat,
                    record.lon,
                    record.range_m as i64,
                    record.updated_at,
                ],
            )
            .with_context(|| format!("failed to insert cell {}", record.key))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seeded_store(dir: &TempDir) -> CellStore {
        let store = CellStore::open_or_create(dir.path().join("cells.sqlite")).unwrap();
        for cell_id in 1..=3u32 {
            store
                .insert(&CellRecord {
                    key: CellKey {
                        mcc: 228,
                        mnc: 1,
                        lac: 1010,
                        cell_id,
                    },
                    lat: 46.9,
                    lon: 7.4,
                    range_m: 5000,
                    updated_at: 100,
                })
                .unwrap();
        }
        store
    }

    #[test]
    fn open_requires_an_existing_store() {
        let dir = TempDir::new().unwrap();
        assert!(CellStore::open(dir.path().join("missing.sqlite")).is_err());
    }

    #[test]
    fn due_selection_respects_the_watermark() {
        let dir = TempDir::new().unwrap();
        let store = seeded_store(&dir);

        assert_eq!(store.count_due(101).unwrap(), 3);
        assert_eq!(store.count_due(100).unwrap(), 0);

        let batch = store.fetch_due_batch(101, 2).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].updated_at, 100);
    }

    #[test]
    fn touched_records_leave_the_due_set() {
        let dir = TempDir::new().unwrap();
        let mut store = seeded_store(&dir);
        let key = CellKey {
            mcc: 228,
            mnc: 1,
            lac: 1010,
            cell_id: 2,
        };

        store
            .apply_batch(&[StoreUpdate::Touch { key }], 200)
            .unwrap();

        assert_eq!(store.count_due(150).unwrap(), 2);
        let record = store.get(&key).unwrap().unwrap();
        assert_eq!(record.updated_at, 200);
        // Coordinate untouched.
        assert_eq!(record.lat, 46.9);
    }

    #[test]
    fn hits_update_coordinate_and_watermark_atomically() {
        let dir = TempDir::new().unwrap();
        let mut store = seeded_store(&dir);
        let key = CellKey {
            mcc: 228,
            mnc: 1,
            lac: 1010,
            cell_id: 1,
        };

        store
            .apply_batch(
                &[
                    StoreUpdate::Hit {
                        key,
                        lat: 47.001,
                        lon: 7.501,
                        range_m: 900,
                    },
                    StoreUpdate::Touch {
                        key: CellKey { cell_id: 3, ..key },
                    },
                ],
                300,
            )
            .unwrap();

        let hit = store.get(&key).unwrap().unwrap();
        assert_eq!(hit.lat, 47.001);
        assert_eq!(hit.lon, 7.501);
        assert_eq!(hit.range_m, 900);
        assert_eq!(hit.updated_at, 300);

        let touched = store.get(&CellKey { cell_id: 3, ..key }).unwrap().unwrap();
        assert_eq!(touched.updated_at, 300);
        assert_eq!(touched.range_m, 5000);
    }

    #[test]
    fn empty_batch_is_a_noop() {
        let dir = TempDir::new().unwrap();
        let mut store = seeded_store(&dir);
        store.apply_batch(&[], 999).unwrap();
        assert_eq!(store.count_due(999).unwrap(), 3);
    }
}
