//! Component view of the simulation.

use std::cell::RefCell;
use std::rc::Rc;

use crate::event::{EventData, EventId, Id};
use crate::timeline::Timeline;

/// Handle given to a component: its identity, the clock and the ability to schedule events.
pub struct SimulationContext {
    id: Id,
    name: String,
    timeline: Rc<RefCell<Timeline>>,
}

impl SimulationContext {
    pub(crate) fn new(id: Id, name: &str, timeline: Rc<RefCell<Timeline>>) -> Self {
        Self {
            id,
            name: name.to_string(),
            timeline,
        }
    }

    /// Identifier of the component.
    pub fn id(&self) -> Id {
        self.id
    }

    /// Name of the component.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current simulation time in seconds.
    pub fn time(&self) -> f64 {
        self.timeline.borrow().now()
    }

    /// Schedules an event for `dest` after `delay` seconds.
    ///
    /// Panics if the delay is negative.
    pub fn emit<T: EventData>(&mut self, data: T, dest: Id, delay: f64) -> EventId {
        self.timeline.borrow_mut().schedule(data, self.id, dest, delay)
    }

    /// Schedules an event for `dest` at the current time.
    pub fn emit_now<T: EventData>(&mut self, data: T, dest: Id) -> EventId {
        self.emit(data, dest, 0.)
    }

    /// Schedules an event for the component itself, e.g. a timer.
    pub fn emit_self<T: EventData>(&mut self, data: T, delay: f64) -> EventId {
        self.emit(data, self.id, delay)
    }
}
