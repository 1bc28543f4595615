//! Load forecasts and the client of the external forecasting program.
//!
//! The forecasting program prints free-form text followed by a JSON object framed by
//! `JSON_DATA_START` / `JSON_DATA_END` lines:
//!
//! ```text
//! ARIMA predictions for VM0: [...]
//! JSON_DATA_START
//! {"web1": [90.0, 91.5, ...]}
//! JSON_DATA_END
//! ```

use std::process::Command;

use indexmap::IndexMap;
use log::{debug, warn};
use thiserror::Error;

use crate::config::{read_file, ConfigError, ForecasterConfig};
use crate::profile::RunRequest;

pub const DATA_START_MARKER: &str = "JSON_DATA_START";
pub const DATA_END_MARKER: &str = "JSON_DATA_END";

/// Forecast load readings (percent) keyed by VM name.
pub type ForecastSeries = IndexMap<String, Vec<f64>>;

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("can't run forecaster: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("forecaster exited with {status}: {stderr}")]
    Exit { status: String, stderr: String },
    #[error("forecaster output has no JSON_DATA_START/JSON_DATA_END block")]
    MissingData,
    #[error("can't parse forecast: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Source of load forecasts.
pub trait Forecaster {
    fn forecast(&self, request: &RunRequest, vm_count: usize) -> Result<ForecastSeries, ForecastError>;
}

/// Requests a forecast, any failure results in an empty forecast.
pub fn forecast_or_empty(forecaster: &dyn Forecaster, request: &RunRequest, vm_count: usize) -> ForecastSeries {
    match forecaster.forecast(request, vm_count) {
        Ok(series) => series,
        Err(err) => {
            warn!("Forecast is not available, continuing with empty forecast: {}", err);
            ForecastSeries::new()
        }
    }
}

/// Extracts the framed JSON object from the forecaster output.
pub fn parse_forecast_output(output: &str) -> Result<ForecastSeries, ForecastError> {
    let mut lines = output.lines().map(str::trim);
    if !lines.any(|line| line == DATA_START_MARKER) {
        return Err(ForecastError::MissingData);
    }
    let mut json = String::new();
    let mut closed = false;
    for line in lines {
        if line == DATA_END_MARKER {
            closed = true;
            break;
        }
        json.push_str(line);
    }
    if !closed {
        return Err(ForecastError::MissingData);
    }
    Ok(serde_json::from_str(&json)?)
}

/// Runs the forecasting script as a subprocess.
pub struct ScriptForecaster {
    config: ForecasterConfig,
    readings_per_minute: usize,
}

impl ScriptForecaster {
    pub fn new(config: ForecasterConfig, readings_per_minute: usize) -> Self {
        Self {
            config,
            readings_per_minute,
        }
    }

    /// Script arguments: feature, history readings, horizon seconds, VM count, tenant, model.
    pub fn arguments(&self, request: &RunRequest, vm_count: usize) -> Vec<String> {
        vec![
            self.config.script.clone(),
            request.feature_name.clone(),
            (request.based_on_last as usize * self.readings_per_minute).to_string(),
            (request.prediction_length * 60).to_string(),
            vm_count.to_string(),
            request.tenant_id.clone(),
            request.model_type.clone(),
        ]
    }
}

impl Forecaster for ScriptForecaster {
    fn forecast(&self, request: &RunRequest, vm_count: usize) -> Result<ForecastSeries, ForecastError> {
        let args = self.arguments(request, vm_count);
        debug!("Running forecaster: {} {}", self.config.program, args.join(" "));
        let output = Command::new(&self.config.program).args(&args).output()?;
        let exit_error = if output.status.success() {
            None
        } else {
            Some(ForecastError::Exit {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        };
        read_script_output(&String::from_utf8_lossy(&output.stdout), exit_error)
    }
}

/// Parses the script output before looking at its exit status.
///
/// A complete data block is used even if the script then exited with an error.
/// Without one, a failed exit is reported instead of the parse error.
fn read_script_output(stdout: &str, exit_error: Option<ForecastError>) -> Result<ForecastSeries, ForecastError> {
    match (parse_forecast_output(stdout), exit_error) {
        (Ok(series), Some(err)) => {
            warn!("Using forecast printed before failure: {}", err);
            Ok(series)
        }
        (Ok(series), None) => Ok(series),
        (Err(_), Some(err)) => Err(err),
        (Err(err), None) => Err(err),
    }
}

/// Serves a fixed forecast, e.g. one saved to a file.
#[derive(Clone, Debug, Default)]
pub struct StaticForecaster {
    series: ForecastSeries,
}

impl StaticForecaster {
    pub fn new(series: ForecastSeries) -> Self {
        Self { series }
    }

    /// Reads a forecast from a JSON object of name to readings.
    pub fn from_json_file(path: &str) -> Result<Self, ConfigError> {
        Ok(Self::new(serde_json::from_str(&read_file(path)?)?))
    }
}

impl Forecaster for StaticForecaster {
    fn forecast(&self, _request: &RunRequest, _vm_count: usize) -> Result<ForecastSeries, ForecastError> {
        Ok(self.series.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenForecaster;

    impl Forecaster for BrokenForecaster {
        fn forecast(&self, _request: &RunRequest, _vm_count: usize) -> Result<ForecastSeries, ForecastError> {
            Err(ForecastError::MissingData)
        }
    }

    #[test]
    fn test_parse_framed_output() {
        let output =
            "ARIMA predictions for VM0: [1, 2]\nJSON_DATA_START\n{\"web1\": [90.0, 80],\n \"db\": []}\nJSON_DATA_END\n";
        let series = parse_forecast_output(output).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series["web1"], vec![90., 80.]);
        assert!(series["db"].is_empty());
        assert_eq!(series.keys().next().unwrap(), "web1");
    }

    #[test]
    fn test_parse_rejects_missing_or_broken_block() {
        assert!(matches!(parse_forecast_output("no data"), Err(ForecastError::MissingData)));
        assert!(matches!(
            parse_forecast_output("JSON_DATA_START\n{}"),
            Err(ForecastError::MissingData)
        ));
        assert!(matches!(
            parse_forecast_output("JSON_DATA_START\n{\"web1\": [1,\nJSON_DATA_END"),
            Err(ForecastError::Parse(_))
        ));
    }

    #[test]
    fn test_script_arguments() {
        let forecaster = ScriptForecaster::new(
            ForecasterConfig {
                program: "python".to_string(),
                script: "predict.py".to_string(),
            },
            12,
        );
        let mut request = RunRequest::new(10, 0.8);
        request.based_on_last = 30;
        request.tenant_id = "t1".to_string();
        assert_eq!(
            forecaster.arguments(&request, 3),
            vec!["predict.py", "cpu", "360", "600", "3", "t1", "arima"]
        );
    }

    fn exit_error() -> ForecastError {
        ForecastError::Exit {
            status: "exit status: 1".to_string(),
            stderr: "statsmodels warning".to_string(),
        }
    }

    #[test]
    fn test_data_printed_before_failed_exit_is_used() {
        let stdout = "JSON_DATA_START\n{\"web1\": [90.0]}\nJSON_DATA_END\nTraceback (most recent call last):\n";
        let series = read_script_output(stdout, Some(exit_error())).unwrap();
        assert_eq!(series["web1"], vec![90.]);
    }

    #[test]
    fn test_failed_exit_without_data_is_reported() {
        assert!(matches!(
            read_script_output("Traceback (most recent call last):\n", Some(exit_error())),
            Err(ForecastError::Exit { .. })
        ));
        assert!(matches!(
            read_script_output("JSON_DATA_START\n{", Some(exit_error())),
            Err(ForecastError::Exit { .. })
        ));
        assert!(matches!(read_script_output("", None), Err(ForecastError::MissingData)));
    }

    #[cfg(unix)]
    #[test]
    fn test_script_exiting_with_error_after_data() {
        // sh -c <script> <arg0> <args..>: the request arguments land in $0..$n and are ignored
        let forecaster = ScriptForecaster::new(
            ForecasterConfig {
                program: "sh".to_string(),
                script: "-c".to_string(),
            },
            12,
        );
        let mut request = RunRequest::new(1, 0.8);
        request.feature_name = "printf 'JSON_DATA_START\\n{\"web1\": [42]}\\nJSON_DATA_END\\n'; exit 1".to_string();
        let series = forecaster.forecast(&request, 1).unwrap();
        assert_eq!(series["web1"], vec![42.]);
    }

    #[test]
    fn test_failure_gives_empty_forecast() {
        let request = RunRequest::new(1, 0.8);
        assert!(forecast_or_empty(&BrokenForecaster, &request, 1).is_empty());

        let missing = ScriptForecaster::new(
            ForecasterConfig {
                program: "/nonexistent/forecaster".to_string(),
                script: "predict.py".to_string(),
            },
            12,
        );
        assert!(forecast_or_empty(&missing, &request, 1).is_empty());
    }
}
