//! Energy meter calculates the host energy consumption.

/// Integrates host power consumption over the metered interval, the result is in joules.
#[derive(Debug, Clone)]
pub struct EnergyMeter {
    energy_consumed: f64,
    current_power: f64,
    prev_time: f64,
    active: bool,
}

impl Default for EnergyMeter {
    fn default() -> Self {
        Self::new()
    }
}

impl EnergyMeter {
    pub fn new() -> Self {
        Self {
            energy_consumed: 0.,
            current_power: 0.,
            prev_time: 0.,
            active: false,
        }
    }

    /// Starts metering at `time` with the given current power, discarding previous measurements.
    pub fn start(&mut self, time: f64, power: f64) {
        self.energy_consumed = 0.;
        self.current_power = power;
        self.prev_time = time;
        self.active = true;
    }

    /// Invoked each time the host power consumption is changed to update the total energy consumption.
    ///
    /// Updates outside of the metered interval only remember the new power.
    pub fn update(&mut self, time: f64, power: f64) {
        if self.active {
            self.energy_consumed += (time - self.prev_time) * self.current_power;
            self.prev_time = time;
        }
        self.current_power = power;
    }

    /// Stops metering at `time`.
    pub fn stop(&mut self, time: f64) {
        if self.active {
            self.energy_consumed += (time - self.prev_time) * self.current_power;
            self.prev_time = time;
            self.active = false;
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Returns the energy consumed during the metered interval in joules.
    pub fn energy_consumed(&self) -> f64 {
        self.energy_consumed
    }
}
