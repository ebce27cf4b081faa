//! In-process doubles for the pipeline tests: a scripted lookup client and
//! a canned proxy source, plus store seeding helpers.

use anyhow::Result;
use cellfix::{
    CellKey, CellLookup, CellRecord, CellStore, EgressIdentity, LookupOutcome, ProxySource,
};
use futures::future::BoxFuture;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;

/// Lookup double that replays a per-key script of outcomes. Once a key's
/// script is exhausted, further lookups for it answer the script's last
/// outcome (or `Miss` when no script exists).
#[derive(Default)]
pub struct ScriptedLookup {
    scripts: Mutex<HashMap<CellKey, VecDeque<LookupOutcome>>>,
    served: Mutex<Vec<(CellKey, EgressIdentity)>>,
}

impl ScriptedLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, key: CellKey, outcomes: impl IntoIterator<Item = LookupOutcome>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(key, outcomes.into_iter().collect());
    }

    /// Every (key, egress) pairing observed, in completion order.
    pub fn served(&self) -> Vec<(CellKey, EgressIdentity)> {
        self.served.lock().unwrap().clone()
    }
}

impl CellLookup for ScriptedLookup {
    fn lookup<'a>(
        &'a self,
        record: &'a CellRecord,
        egress: &'a EgressIdentity,
    ) -> BoxFuture<'a, LookupOutcome> {
        Box::pin(async move {
            self.served
                .lock()
                .unwrap()
                .push((record.key, egress.clone()));

            let mut scripts = self.scripts.lock().unwrap();
            match scripts.get_mut(&record.key) {
                Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
                Some(queue) => queue.front().copied().unwrap_or(LookupOutcome::Miss),
                None => LookupOutcome::Miss,
            }
        })
    }
}

/// Proxy source that hands out the same canned list for every pass.
pub struct StaticProxySource {
    proxies: Vec<EgressIdentity>,
    pub fetches: Mutex<usize>,
}

impl StaticProxySource {
    pub fn fetch_count(&self) -> usize {
        *self.fetches.lock().unwrap()
    }

    pub fn with_proxies(count: usize) -> Self {
        Self {
            proxies: (0..count)
                .map(|i| EgressIdentity::Proxy(format!("10.0.0.{i}:8080")))
                .collect(),
            fetches: Mutex::new(0),
        }
    }
}

impl ProxySource for StaticProxySource {
    fn fetch(&self) -> BoxFuture<'_, Result<Vec<EgressIdentity>>> {
        Box::pin(async move {
            *self.fetches.lock().unwrap() += 1;
            Ok(self.proxies.clone())
        })
    }
}

pub fn key(cell_id: u32) -> CellKey {
    CellKey {
        mcc: 228,
        mnc: 1,
        lac: 1010,
        cell_id,
    }
}

pub fn stale_record(cell_id: u32) -> CellRecord {
    CellRecord {
        key: key(cell_id),
        lat: 46.909009,
        lon: 7.360584,
        range_m: 5000,
        updated_at: 100,
    }
}

/// Creates a store at `path` seeded with stale records for the given ids.
pub fn seeded_store(path: &Path, cell_ids: &[u32]) -> CellStore {
    let store = CellStore::open_or_create(path).expect("store must open");
    for cell_id in cell_ids {
        store
            .insert(&stale_record(*cell_id))
            .expect("seed insert must succeed");
    }
    store
}

pub fn hit(lat: f64, lon: f64, range_m: u32) -> LookupOutcome {
    LookupOutcome::Hit { lat, lon, range_m }
}
