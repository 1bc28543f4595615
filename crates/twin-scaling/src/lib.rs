#![doc = include_str!("../readme.md")]

pub mod aggregation;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod forecast;
pub mod lifecycle;
pub mod metrics;
pub mod profile;
pub mod report;
pub mod scaling;
pub mod strategy;
pub mod twin;

pub use error::{RunFailure, SimulationError};
pub use lifecycle::SimulationLifecycle;
pub use report::RunReport;
pub use twin::DigitalTwin;
