//! Simulation setup and execution.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, log_enabled, Level};

use crate::context::SimulationContext;
use crate::event::{Event, Id};
use crate::handler::EventHandler;
use crate::log::{get_colored, log_undelivered_event, trace_delivery};
use crate::timeline::Timeline;

struct Component {
    name: String,
    handler: Option<Rc<RefCell<dyn EventHandler>>>,
}

/// Registry of components and the driver of the event loop.
pub struct Simulation {
    timeline: Rc<RefCell<Timeline>>,
    components: Vec<Component>,
    ids: HashMap<String, Id>,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulation {
    /// Creates an empty simulation at time zero.
    pub fn new() -> Self {
        Self {
            timeline: Rc::new(RefCell::new(Timeline::new())),
            components: Vec::new(),
            ids: HashMap::new(),
        }
    }

    fn component_id(&mut self, name: &str) -> Id {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = self.components.len() as Id;
        self.components.push(Component {
            name: name.to_string(),
            handler: None,
        });
        self.ids.insert(name.to_string(), id);
        debug!(
            target: "simulation",
            "[{:.3} {} simulation] Registered component {} with id {}",
            self.time(),
            get_colored("DEBUG", colored::Color::Blue),
            name,
            id
        );
        id
    }

    /// Returns the identifier of a registered component.
    pub fn lookup_id(&self, name: &str) -> Option<Id> {
        self.ids.get(name).copied()
    }

    /// Returns the name of a registered component.
    pub fn lookup_name(&self, id: Id) -> Option<&str> {
        self.components.get(id as usize).map(|c| c.name.as_str())
    }

    /// Returns the context of the component with the given name, registering the component if needed.
    ///
    /// ```rust
    /// use twin_core::Simulation;
    ///
    /// let mut sim = Simulation::new();
    /// let host = sim.create_context("pm-1");
    /// assert_eq!(sim.create_context("pm-1").id(), host.id());
    /// assert_eq!(sim.lookup_id("pm-1"), Some(host.id()));
    /// ```
    pub fn create_context(&mut self, name: &str) -> SimulationContext {
        let id = self.component_id(name);
        SimulationContext::new(id, name, self.timeline.clone())
    }

    /// Makes `handler` the receiver of events addressed to the component `name`.
    pub fn add_handler(&mut self, name: &str, handler: Rc<RefCell<dyn EventHandler>>) -> Id {
        let id = self.component_id(name);
        self.components[id as usize].handler = Some(handler);
        id
    }

    /// Current simulation time in seconds.
    pub fn time(&self) -> f64 {
        self.timeline.borrow().now()
    }

    fn step_within(&mut self, horizon: f64) -> bool {
        let next = self.timeline.borrow_mut().pop_due(horizon);
        match next {
            Some(event) => {
                self.deliver(event);
                true
            }
            None => false,
        }
    }

    fn deliver(&mut self, event: Event) {
        let handler = self
            .components
            .get(event.dest as usize)
            .and_then(|c| c.handler.clone());
        if log_enabled!(Level::Trace) {
            trace_delivery(
                &event,
                self.lookup_name(event.src).unwrap_or("?"),
                self.lookup_name(event.dest).unwrap_or("?"),
            );
        }
        match handler {
            Some(handler) => handler.borrow_mut().on(event),
            None => log_undelivered_event(&event),
        }
    }

    /// Delivers the earliest pending event, returns `false` if there was none.
    pub fn step(&mut self) -> bool {
        self.step_within(f64::INFINITY)
    }

    /// Delivers up to `step_count` events, returns `false` if the queue ran empty.
    pub fn steps(&mut self, step_count: u64) -> bool {
        (0..step_count).all(|_| self.step())
    }

    /// Delivers events until none are left.
    pub fn step_until_no_events(&mut self) {
        while self.step() {}
    }

    /// Delivers every event due at or before `time`, then moves the clock to `time`.
    ///
    /// The clock never goes backwards. Returns `true` if events remain scheduled after `time`.
    ///
    /// ```rust
    /// use serde::Serialize;
    /// use twin_core::Simulation;
    ///
    /// #[derive(Serialize)]
    /// pub struct Tick {}
    ///
    /// let mut sim = Simulation::new();
    /// let mut ctx = sim.create_context("clock");
    /// ctx.emit_self(Tick {}, 30.);
    /// ctx.emit_self(Tick {}, 90.);
    /// assert!(sim.step_until_time(60.));
    /// assert_eq!(sim.time(), 60.);
    /// assert!(!sim.step_until_time(120.));
    /// ```
    pub fn step_until_time(&mut self, time: f64) -> bool {
        while self.step_within(time) {}
        let mut timeline = self.timeline.borrow_mut();
        timeline.advance_to(time);
        timeline.pending() > 0
    }

    /// Number of scheduled events not delivered yet.
    pub fn pending_events(&self) -> usize {
        self.timeline.borrow().pending()
    }

    /// Number of events scheduled since the start.
    pub fn event_count(&self) -> u64 {
        self.timeline.borrow().scheduled()
    }
}
