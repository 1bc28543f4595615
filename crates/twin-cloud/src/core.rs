//! Building blocks of the IaaS model.

pub mod config;
pub mod energy_meter;
pub mod error;
pub mod events;
pub mod host_manager;
pub mod network;
pub mod power_model;
pub mod vm;
pub mod vm_registry;
