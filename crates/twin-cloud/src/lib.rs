#![doc = include_str!("../readme.md")]

pub mod core;
pub mod simulation;

pub use crate::core::error::CloudError;
pub use simulation::CloudSimulation;
