//! Physical host power consumption models.

use dyn_clone::{clone_trait_object, DynClone};

/// Power model is a function, which computes the power consumption of a physical host
/// based on its current CPU load.
pub trait PowerModel: DynClone {
    /// Returns the current power consumption of a physical host in watts.
    ///
    /// - `time` - current simulation time.
    /// - `cpu_load` - current host CPU load in range [0, 1].
    fn get_power(&self, time: f64, cpu_load: f64) -> f64;
}

clone_trait_object!(PowerModel);

/// Linear power model of an always-on host.
///
/// Computes host power consumption as `idle_power + cpu_load * (max_power - idle_power)`.
/// An idle host is assumed to stay powered on, so it consumes `idle_power`.
#[derive(Clone)]
pub struct LinearPowerModel {
    idle_power: f64,
    max_power: f64,
}

impl LinearPowerModel {
    pub fn new(idle_power: f64, max_power: f64) -> Self {
        Self { idle_power, max_power }
    }
}

impl PowerModel for LinearPowerModel {
    fn get_power(&self, _time: f64, cpu_load: f64) -> f64 {
        let load = cpu_load.clamp(0., 1.);
        self.idle_power + load * (self.max_power - self.idle_power)
    }
}
