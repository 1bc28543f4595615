//! Per-minute aggregation of forecast readings.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use log::debug;
use serde::Serialize;
use threadpool::ThreadPool;

use crate::forecast::ForecastSeries;

/// Average load and instruction count of every forecast minute of one VM.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MinuteSeries {
    /// Average load per minute in percent.
    pub avg_load: Vec<f64>,
    /// Instructions to execute per minute.
    pub instructions: Vec<u64>,
}

impl MinuteSeries {
    pub fn len(&self) -> usize {
        self.avg_load.len()
    }

    pub fn is_empty(&self) -> bool {
        self.avg_load.is_empty()
    }

    /// Average load of the minute in range 0-1.
    pub fn normalized_load(&self, minute: usize) -> f64 {
        self.avg_load[minute] / 100.
    }
}

/// Aggregated forecast keyed by VM name.
pub type AggregatedForecast = BTreeMap<String, MinuteSeries>;

/// Instructions a VM executes in one minute at the given load (percent).
pub fn instructions_for_load(load_percent: f64, max_instructions_per_second: u64) -> u64 {
    (60. * (load_percent / 100.) * max_instructions_per_second as f64).round().max(0.) as u64
}

/// Share of time the VM stays idle at the given load (percent).
pub fn idle_fraction(load_percent: f64) -> f64 {
    (1. - load_percent / 100.).clamp(0., 1.)
}

/// Splits readings into consecutive windows of `readings_per_minute` (the last one may be shorter)
/// and computes average load and instruction count of each window.
pub fn aggregate_series(
    readings: &[f64],
    readings_per_minute: usize,
    max_instructions_per_second: u64,
) -> MinuteSeries {
    let mut series = MinuteSeries::default();
    for window in readings.chunks(readings_per_minute.max(1)) {
        let avg = if window.is_empty() {
            0.
        } else {
            window.iter().sum::<f64>() / window.len() as f64
        };
        series.avg_load.push(avg);
        series
            .instructions
            .push(instructions_for_load(avg, max_instructions_per_second));
    }
    series
}

/// Aggregates the forecast of every VM in parallel.
///
/// VMs without a known processing capacity are skipped.
pub fn aggregate_forecast(
    forecast: &ForecastSeries,
    max_instructions_per_second: &HashMap<String, u64>,
    readings_per_minute: usize,
    num_threads: usize,
) -> AggregatedForecast {
    let results = Arc::new(Mutex::new(AggregatedForecast::new()));
    let pool = ThreadPool::new(num_threads.max(1));
    for (name, readings) in forecast {
        let max_ips = match max_instructions_per_second.get(name) {
            Some(&max_ips) => max_ips,
            None => {
                debug!("Skipping forecast for unknown VM {}", name);
                continue;
            }
        };
        let name = name.clone();
        let readings = readings.clone();
        let results = results.clone();
        pool.execute(move || {
            let series = aggregate_series(&readings, readings_per_minute, max_ips);
            results
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(name, series);
        });
    }
    pool.join();
    let aggregated = results.lock().unwrap_or_else(PoisonError::into_inner);
    aggregated.clone()
}
