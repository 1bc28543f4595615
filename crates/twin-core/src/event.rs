//! Events exchanged by simulation components.

use std::cmp::Ordering;

use downcast_rs::{impl_downcast, Downcast};
use serde::ser::Serialize;

/// Component identifier, assigned in the order of registration.
pub type Id = u32;

/// Event identifier, assigned in the order of scheduling.
pub type EventId = u64;

/// Payload of an event.
///
/// Implemented for every serializable `'static` type. Serialization is only used to trace events.
pub trait EventData: Downcast + erased_serde::Serialize {}

impl<T: Serialize + 'static> EventData for T {}

impl_downcast!(EventData);
erased_serde::serialize_trait_object!(EventData);

/// Scheduled event.
pub struct Event {
    /// Unique identifier, increasing in the order of scheduling.
    pub id: EventId,
    /// Delivery time in seconds.
    pub time: f64,
    /// Sender component.
    pub src: Id,
    /// Receiver component.
    pub dest: Id,
    /// Payload, see [`cast!`](crate::cast!).
    pub data: Box<dyn EventData>,
}

impl Event {
    fn key(&self) -> (f64, EventId) {
        (self.time, self.id)
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// reversed: the timeline heap yields the smallest (time, id) first
impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        let (time, id) = self.key();
        let (other_time, other_id) = other.key();
        other_time.total_cmp(&time).then(other_id.cmp(&id))
    }
}
