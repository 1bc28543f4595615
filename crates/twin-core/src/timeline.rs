use std::collections::BinaryHeap;

use crate::event::{Event, EventData, EventId, Id};
use crate::log::log_rejected_event;

/// Negative delays down to this value are treated as rounding noise and clamped to zero.
const DELAY_TOLERANCE: f64 = 1e-12;

/// Simulation clock together with the queue of scheduled events.
pub(crate) struct Timeline {
    now: f64,
    queue: BinaryHeap<Event>,
    scheduled: u64,
}

impl Timeline {
    pub fn new() -> Self {
        Self {
            now: 0.,
            queue: BinaryHeap::new(),
            scheduled: 0,
        }
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn schedule<T: EventData>(&mut self, data: T, src: Id, dest: Id, delay: f64) -> EventId {
        let event = Event {
            id: self.scheduled,
            time: self.now + delay.max(0.),
            src,
            dest,
            data: Box::new(data),
        };
        if delay < -DELAY_TOLERANCE {
            log_rejected_event(&event, &format!("negative delay {}", delay));
            panic!("can't schedule event in the past: delay is {}", delay);
        }
        self.scheduled += 1;
        let id = event.id;
        self.queue.push(event);
        id
    }

    /// Removes the earliest event if it is due at or before `horizon` and moves the clock to its time.
    pub fn pop_due(&mut self, horizon: f64) -> Option<Event> {
        if self.queue.peek()?.time > horizon {
            return None;
        }
        let event = self.queue.pop()?;
        self.now = event.time;
        Some(event)
    }

    /// Moves the clock forward, a time in the past is ignored.
    pub fn advance_to(&mut self, time: f64) {
        self.now = self.now.max(time);
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn scheduled(&self) -> u64 {
        self.scheduled
    }
}
