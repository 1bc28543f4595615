//! Digital twin: answers a request with the reports of all three strategies.

use std::collections::HashMap;

use log::info;
use serde::Serialize;

use crate::aggregation::{aggregate_forecast, AggregatedForecast};
use crate::config::TwinConfig;
use crate::error::SimulationError;
use crate::forecast::{forecast_or_empty, Forecaster};
use crate::lifecycle::SimulationLifecycle;
use crate::profile::{RunRequest, VmProfile};
use crate::report::RunReport;
use crate::strategy::{
    BaselineStrategy, PredictionWithScalingStrategy, PredictionWithoutScalingStrategy, SimulationStrategy,
};

/// Reports of the three strategies for one request, a failed run does not affect the others.
#[derive(Debug, Serialize)]
pub struct TwinReports {
    pub baseline: Result<RunReport, String>,
    pub prediction_without_scaling: Result<RunReport, String>,
    pub prediction_with_scaling: Result<RunReport, String>,
}

pub struct DigitalTwin {
    config: TwinConfig,
    profiles: Vec<VmProfile>,
}

impl DigitalTwin {
    pub fn new(config: TwinConfig, profiles: Vec<VmProfile>) -> Self {
        Self { config, profiles }
    }

    pub fn config(&self) -> &TwinConfig {
        &self.config
    }

    pub fn profiles(&self) -> &[VmProfile] {
        &self.profiles
    }

    /// Requests the forecast and aggregates it per minute. An unavailable forecast yields no data.
    pub fn prepare_forecast(&self, forecaster: &dyn Forecaster, request: &RunRequest) -> AggregatedForecast {
        let forecast = forecast_or_empty(forecaster, request, self.profiles.len());
        let max_ips: HashMap<String, u64> = self
            .profiles
            .iter()
            .map(|p| (p.name.clone(), p.max_instructions_per_second()))
            .collect();
        aggregate_forecast(
            &forecast,
            &max_ips,
            self.config.readings_per_minute(),
            self.config.aggregation_threads,
        )
    }

    /// Runs a single strategy.
    pub fn run(
        &self,
        strategy: &mut dyn SimulationStrategy,
        request: &RunRequest,
    ) -> Result<RunReport, SimulationError> {
        SimulationLifecycle::new(&self.config, &self.profiles).execute(strategy, request)
    }

    /// Runs baseline, prediction without scaling and prediction with scaling, in this order.
    pub fn simulate_future_behaviour(&self, forecaster: &dyn Forecaster, request: &RunRequest) -> TwinReports {
        let data = self.prepare_forecast(forecaster, request);
        info!("Forecast available for {} of {} VMs", data.len(), self.profiles.len());
        let baseline = self.run(&mut BaselineStrategy, request);
        let without_scaling = self.run(&mut PredictionWithoutScalingStrategy::new(data.clone()), request);
        let with_scaling = self.run(&mut PredictionWithScalingStrategy::new(data), request);
        TwinReports {
            baseline: baseline.map_err(|e| e.to_string()),
            prediction_without_scaling: without_scaling.map_err(|e| e.to_string()),
            prediction_with_scaling: with_scaling.map_err(|e| e.to_string()),
        }
    }
}
