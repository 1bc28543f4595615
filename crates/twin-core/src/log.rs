//! Component logging.
//!
//! Records of components look like `[120.000 INFO  pm-1] vm #0 started`: simulation time, level
//! and component name, followed by the message. Levels are colored when stderr is a terminal.

use atty::Stream;
use colored::{Color, ColoredString, Colorize};
use serde_json::{json, Value};
use serde_type_name::type_name;

use crate::event::{Event, EventData, Id};

/// Colors `s` unless stderr is redirected.
pub fn get_colored(s: &str, color: Color) -> ColoredString {
    if atty::is(Stream::Stderr) {
        s.color(color)
    } else {
        s.normal()
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_component {
    ($level:ident, $label:literal, $color:ident, $ctx:expr, $($arg:tt)+) => {
        log::$level!(
            target: $ctx.name(),
            "[{:.3} {} {}] {}",
            $ctx.time(),
            $crate::log::get_colored($label, $crate::colored::Color::$color),
            $ctx.name(),
            format_args!($($arg)+)
        )
    };
}

/// Logs a component message at the info level.
///
/// ```rust
/// use twin_core::{log_info, Simulation};
///
/// let mut sim = Simulation::new();
/// let ctx = sim.create_context("pm-1");
/// log_info!(ctx, "powered on with {} cores", 8);
/// ```
#[macro_export]
macro_rules! log_info {
    ($ctx:expr, $($arg:tt)+) => { $crate::__log_component!(info, "INFO ", Green, $ctx, $($arg)+) };
}

/// Logs a component message at the debug level.
#[macro_export]
macro_rules! log_debug {
    ($ctx:expr, $($arg:tt)+) => { $crate::__log_component!(debug, "DEBUG", Blue, $ctx, $($arg)+) };
}

/// Logs a component message at the trace level.
#[macro_export]
macro_rules! log_trace {
    ($ctx:expr, $($arg:tt)+) => { $crate::__log_component!(trace, "TRACE", Cyan, $ctx, $($arg)+) };
}

/// Logs a component message at the warn level.
#[macro_export]
macro_rules! log_warn {
    ($ctx:expr, $($arg:tt)+) => { $crate::__log_component!(warn, "WARN ", Yellow, $ctx, $($arg)+) };
}

/// Logs a component message at the error level.
#[macro_export]
macro_rules! log_error {
    ($ctx:expr, $($arg:tt)+) => { $crate::__log_component!(error, "ERROR", Red, $ctx, $($arg)+) };
}

fn payload_json(data: &dyn EventData) -> Value {
    json!({"type": type_name(&data).unwrap_or("unknown"), "data": data})
}

fn log_kernel_error(time: f64, what: &str, details: Value) {
    log::error!(
        target: "simulation",
        "[{:.3} {} simulation] {}: {}",
        time,
        get_colored("ERROR", Color::Red),
        what,
        details
    );
}

pub(crate) fn trace_delivery(event: &Event, src: &str, dest: &str) {
    log::trace!(
        target: dest,
        "[{:.3} {} {}] {}",
        event.time,
        get_colored("EVENT", Color::BrightBlack),
        dest,
        json!({"event": payload_json(event.data.as_ref()), "src": src})
    );
}

/// Reports a payload that no arm of [`cast!`](crate::cast!) matched.
pub fn log_unhandled_event(time: f64, src: Id, dest: Id, data: &dyn EventData) {
    log_kernel_error(
        time,
        "Unhandled event",
        json!({"event": payload_json(data), "src": src, "dest": dest}),
    );
}

pub(crate) fn log_undelivered_event(event: &Event) {
    log_kernel_error(
        event.time,
        "Undelivered event",
        json!({"event": payload_json(event.data.as_ref()), "src": event.src, "dest": event.dest}),
    );
}

pub(crate) fn log_rejected_event(event: &Event, reason: &str) {
    log_kernel_error(
        event.time,
        &format!("Rejected event ({})", reason),
        json!({"event": payload_json(event.data.as_ref()), "src": event.src, "dest": event.dest}),
    );
}
