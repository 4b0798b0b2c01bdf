//! Batches: many requests, one result collection.
//!
//! Every item is in flight at once (or up to the configured cap), interleaved
//! on the caller's task. Placement does not depend on which item finishes first:
//!
//! - an item with a `sequence` lands at that index;
//! - items without one follow the highest sequenced index, in submission order;
//! - indices nobody claimed stay empty.
//!
//! A `sequence` may leave gaps, but at most [`MAX_SEQUENCE_GAP`] slots past the
//! size of the batch. Anything further is rejected before any item runs.
//!
//! A failed item holds its error in its own slot and does not disturb the others.

use std::collections::HashMap;
use std::num::NonZeroUsize;

use futures::stream::{self, StreamExt};
use tracing::debug;

use crate::dispatch::{DispatchRequest, Dispatcher};
use crate::error::{BatchError, BatchItemError};
use crate::response::Outcome;

/// One slot of a [`BatchResult`]. `None` when no item claimed the index.
pub type BatchSlot = Option<Result<Outcome, BatchItemError>>;

/// The results of a batch, laid out by `sequence`.
#[derive(Debug)]
pub struct BatchResult {
    slots: Vec<BatchSlot>,
}

impl BatchResult {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The result at `index`, or `None` if the index is unset or out of range.
    pub fn get(&self, index: usize) -> Option<&Result<Outcome, BatchItemError>> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BatchSlot> {
        self.slots.iter()
    }

    pub fn into_slots(self) -> Vec<BatchSlot> {
        self.slots
    }
}

/// How many unclaimed slots a batch may span beyond its own length.
pub const MAX_SEQUENCE_GAP: usize = 1024;

/// Output index of every item, by submission position, and the output length.
fn layout(items: &[DispatchRequest]) -> Result<(Vec<usize>, usize), BatchError> {
    let limit = items.len().saturating_add(MAX_SEQUENCE_GAP);
    let mut claimed: HashMap<usize, usize> = HashMap::new();
    for (position, item) in items.iter().enumerate() {
        if let Some(sequence) = item.sequence {
            if sequence >= limit {
                return Err(BatchError::SequenceOutOfRange { sequence, position, limit });
            }
            if let Some(&first) = claimed.get(&sequence) {
                return Err(BatchError::DuplicateSequence { sequence, first, second: position });
            }
            claimed.insert(sequence, position);
        }
    }

    // Every claimed index is below `limit`, so this cannot overflow.
    let mut next = claimed.keys().max().map_or(0, |&max| max + 1);
    let placement = items
        .iter()
        .map(|item| {
            item.sequence.unwrap_or_else(|| {
                next += 1;
                next - 1
            })
        })
        .collect();
    Ok((placement, next))
}

pub(crate) async fn run(
    dispatcher: &Dispatcher,
    items: Vec<DispatchRequest>,
    limit: Option<NonZeroUsize>,
) -> Result<BatchResult, BatchError> {
    let (placement, len) = layout(&items)?;
    let in_flight = limit.map_or(items.len().max(1), NonZeroUsize::get);
    debug!(items = items.len(), slots = len, in_flight, "dispatching batch");

    let mut slots: Vec<BatchSlot> = vec![None; len];
    let mut finished = stream::iter(items.into_iter().enumerate())
        .map(|(position, item)| async move {
            let sequence = item.sequence;
            let result = dispatcher
                .dispatch(item)
                .await
                .map_err(|error| BatchItemError { position, sequence, error });
            (position, result)
        })
        .buffer_unordered(in_flight);

    while let Some((position, result)) = finished.next().await {
        slots[placement[position]] = Some(result);
    }
    Ok(BatchResult { slots })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(sequence: Option<usize>) -> DispatchRequest {
        let req = DispatchRequest::new("get", "/route/check");
        match sequence {
            Some(s) => req.sequence(s),
            None => req,
        }
    }

    #[test]
    fn sequenced_items_take_their_index() {
        let (placement, len) = layout(&[item(Some(1)), item(Some(0))]).unwrap();
        assert_eq!(placement, [1, 0]);
        assert_eq!(len, 2);
    }

    #[test]
    fn unsequenced_items_keep_submission_order() {
        let (placement, len) = layout(&[item(None), item(None), item(None)]).unwrap();
        assert_eq!(placement, [0, 1, 2]);
        assert_eq!(len, 3);
    }

    #[test]
    fn unsequenced_items_follow_the_highest_sequence() {
        let (placement, len) = layout(&[item(None), item(Some(4)), item(None), item(Some(1))]).unwrap();
        assert_eq!(placement, [5, 4, 6, 1]);
        assert_eq!(len, 7);
    }

    #[test]
    fn duplicate_sequence_is_rejected() {
        let err = layout(&[item(Some(2)), item(None), item(Some(2))]).unwrap_err();
        assert_eq!(err, BatchError::DuplicateSequence { sequence: 2, first: 0, second: 2 });
    }

    #[test]
    fn far_sequence_is_rejected() {
        let err = layout(&[item(None), item(Some(usize::MAX))]).unwrap_err();
        assert_eq!(
            err,
            BatchError::SequenceOutOfRange { sequence: usize::MAX, position: 1, limit: 2 + MAX_SEQUENCE_GAP }
        );

        let err = layout(&[item(Some(1 << 40))]).unwrap_err();
        assert!(matches!(err, BatchError::SequenceOutOfRange { position: 0, .. }));
    }

    #[test]
    fn gap_up_to_the_limit_is_allowed() {
        let (placement, len) = layout(&[item(Some(MAX_SEQUENCE_GAP))]).unwrap();
        assert_eq!(placement, [MAX_SEQUENCE_GAP]);
        assert_eq!(len, MAX_SEQUENCE_GAP + 1);
    }

    #[test]
    fn empty_batch_has_no_slots() {
        let (placement, len) = layout(&[]).unwrap();
        assert!(placement.is_empty());
        assert_eq!(len, 0);
    }
}
