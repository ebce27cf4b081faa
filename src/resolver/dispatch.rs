//! Concurrent fan-out of one batch of lookups.
//!
//! Each record is paired positionally with one egress identity and runs as
//! an independent future; at most `width` run at once. The call is a join
//! point: it returns only when every task has produced an outcome, in
//! record order, so the caller can compute whole-batch statistics before
//! the next batch starts.

use crate::glm::client::CellLookup;
use crate::proxy::rotation::EgressIdentity;
use crate::resolver::outcome::{CellRecord, LookupOutcome};
use futures::stream::{self, StreamExt};

pub async fn dispatch_batch<C>(
    client: &C,
    records: &[CellRecord],
    identities: &[EgressIdentity],
    width: usize,
) -> Vec<LookupOutcome>
where
    C: CellLookup + ?Sized,
{
    debug_assert_eq!(
        records.len(),
        identities.len(),
        "one egress identity per record"
    );

    let width = width.max(1);
    stream::iter(
        records
            .iter()
            .zip(identities.iter())
            .map(|(record, egress)| client.lookup(record, egress)),
    )
    .buffered(width)
    .collect()
    .await
}
