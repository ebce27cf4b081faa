//! The resolution engine proper: outcome taxonomy, batch dispatch, adaptive
//! backoff, the retry set, and pass-scoped statistics.

pub mod backoff;
pub mod dispatch;
pub mod outcome;
pub mod pending;
pub mod stats;

pub use backoff::BackoffController;
pub use dispatch::dispatch_batch;
pub use outcome::{CellKey, CellRecord, LookupOutcome, OutcomeClass};
pub use pending::PendingSet;
pub use stats::{BatchTally, PassStats};
