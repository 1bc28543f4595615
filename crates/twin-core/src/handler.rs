//! Event consumers.

use crate::event::Event;

/// Component that reacts to delivered events.
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use serde::Serialize;
/// use twin_core::{cast, Event, EventHandler, Simulation};
///
/// #[derive(Serialize)]
/// pub struct LoadReading {
///     percent: u32,
/// }
///
/// #[derive(Default)]
/// pub struct Gauge {
///     last: u32,
/// }
///
/// impl EventHandler for Gauge {
///     fn on(&mut self, event: Event) {
///         cast!(match event.data {
///             LoadReading { percent } => {
///                 self.last = percent;
///             }
///         })
///     }
/// }
///
/// let mut sim = Simulation::new();
/// let mut feeder = sim.create_context("feeder");
/// let gauge = Rc::new(RefCell::new(Gauge::default()));
/// let gauge_id = sim.add_handler("gauge", gauge.clone());
/// feeder.emit(LoadReading { percent: 42 }, gauge_id, 5.);
/// sim.step_until_no_events();
/// assert_eq!(gauge.borrow().last, 42);
/// ```
pub trait EventHandler {
    /// Called when an event addressed to the component is delivered.
    fn on(&mut self, event: Event);
}

/// Dispatches an event on the type of its payload.
///
/// Each arm destructures one payload type. Payloads matching no arm are reported at error level.
#[macro_export]
macro_rules! cast {
    ( match $event:ident.data { $( $type:ident { $($fields:tt)* } => { $($body:tt)* } )+ } ) => {
        'cast: {
            let __payload = $event.data;
            $(
                let __payload = match __payload.downcast::<$type>() {
                    Ok(__typed) => {
                        let $type { $($fields)* } = *__typed;
                        { $($body)* }
                        break 'cast;
                    }
                    Err(__other) => __other,
                };
            )+
            $crate::log::log_unhandled_event($event.time, $event.src, $event.dest, __payload.as_ref());
        }
    };
}
