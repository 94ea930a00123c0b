use std::cmp::Ordering;

use crate::events::EventData;
use crate::kernel::Id;

/// Event identifier. Ids are assigned in insertion order, so they double as the FIFO tie-breaker.
pub type EventId = u64;

#[derive(Clone, Debug)]
pub struct Event {
    pub id: EventId,
    pub time: f64,
    pub src: Id,
    pub dst: Id,
    pub data: EventData,
}

/// Heap entry ordered so that `BinaryHeap` pops the earliest event first,
/// and among events with equal time the one inserted first.
pub(crate) struct QueuedEvent(pub Event);

impl PartialEq for QueuedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for QueuedEvent {}

impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .0
            .time
            .total_cmp(&self.0.time)
            .then_with(|| other.0.id.cmp(&self.0.id))
    }
}
