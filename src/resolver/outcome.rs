//! Core value types shared across the resolution engine: cell identities,
//! store records, and the per-request outcome taxonomy with its retry /
//! penalty / watermark policy.

use std::fmt;

/// Identity of a single cell record: MCC, MNC, LAC, and cell id.
///
/// Used as the join key against the persistence adapter and as the equality
/// key inside the pending set, so comparison is by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellKey {
    pub mcc: u32,
    pub mnc: u32,
    pub lac: u32,
    pub cell_id: u32,
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.mcc, self.mnc, self.lac, self.cell_id
        )
    }
}

/// Snapshot of one row from the cell store.
///
/// `lat`/`lon` are the last known coordinate and serve as the origin for
/// plausibility checks; `updated_at` is the staleness watermark.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellRecord {
    pub key: CellKey,
    pub lat: f64,
    pub lon: f64,
    pub range_m: u32,
    pub updated_at: i64,
}

/// Result of one dispatched lookup. Produced once per request, never mutated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LookupOutcome {
    /// Upstream returned a coordinate that passed validation.
    Hit { lat: f64, lon: f64, range_m: u32 },
    /// Upstream answered with a well-formed "no data" status.
    Miss,
    /// The request exceeded its deadline.
    Timeout,
    /// Any other transport failure (connect, proxy, malformed reply).
    ConnectionError,
    /// Upstream returned success but the coordinate is outside the globe.
    ImplausibleCoordinate { lat: f64, lon: f64, range_m: u32 },
    /// Upstream returned success but the range or distance is absurd.
    ImplausibleRange { lat: f64, lon: f64, range_m: u32 },
}

/// Explicit policy capabilities of an outcome, kept as data rather than
/// inferred from the variant name so the retry/penalty/touch rules stay
/// auditable and testable in isolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutcomeClass {
    /// The record should go back into the pending set for a later pass.
    pub retryable: bool,
    /// The egress identity that served this request should be rotated away.
    pub penalizes_identity: bool,
    /// The record's watermark should be refreshed so it is not re-selected
    /// within the same pass.
    pub refreshes_watermark: bool,
}

impl LookupOutcome {
    pub fn class(&self) -> OutcomeClass {
        match self {
            LookupOutcome::Hit { .. } => OutcomeClass {
                retryable: false,
                penalizes_identity: false,
                refreshes_watermark: false,
            },
            // A miss is a legitimate answer, not an egress failure.
            LookupOutcome::Miss
            | LookupOutcome::ImplausibleCoordinate { .. }
            | LookupOutcome::ImplausibleRange { .. } => OutcomeClass {
                retryable: true,
                penalizes_identity: false,
                refreshes_watermark: true,
            },
            LookupOutcome::Timeout | LookupOutcome::ConnectionError => OutcomeClass {
                retryable: true,
                penalizes_identity: true,
                refreshes_watermark: false,
            },
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, LookupOutcome::Hit { .. })
    }
}
