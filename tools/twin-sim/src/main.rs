use std::io::Write;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use env_logger::Builder;
use log::error;

use twin_scaling::config::TwinConfig;
use twin_scaling::forecast::{Forecaster, ScriptForecaster, StaticForecaster};
use twin_scaling::profile::{RunRequest, VmProfile};
use twin_scaling::strategy::{
    BaselineStrategy, PredictionWithScalingStrategy, PredictionWithoutScalingStrategy, SimulationStrategy,
};
use twin_scaling::DigitalTwin;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Strategy {
    All,
    Baseline,
    WithoutScaling,
    WithScaling,
}

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
/// Simulates the next minutes of a VM fleet and reports cost, energy and load figures
struct Args {
    /// Path to YAML file with twin configuration
    #[arg(short, long)]
    config: Option<String>,

    /// Path to JSON file with VM profiles
    #[arg(short, long)]
    profiles: String,

    /// Path to JSON file with saved forecast (the forecasting script is called otherwise)
    #[arg(short, long)]
    forecast: Option<String>,

    /// Strategy to simulate
    #[arg(short, long, value_enum, default_value_t = Strategy::All)]
    strategy: Strategy,

    /// Simulated horizon in minutes
    #[arg(short = 'l', long, default_value_t = 10)]
    prediction_length: u32,

    /// Normalized load at or above which a VM gets a backup
    #[arg(short, long, default_value_t = 0.8)]
    threshold: f64,

    /// History length in minutes the forecast is based on
    #[arg(long, default_value_t = 60)]
    based_on_last: u32,

    /// Tenant whose history is used for the forecast
    #[arg(long, default_value = "default")]
    tenant: String,

    /// Forecasting model: lr, arima or rf
    #[arg(long, default_value = "arima")]
    model: String,
}

fn main() -> ExitCode {
    Builder::from_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => TwinConfig::from_file(path)?,
        None => TwinConfig::default(),
    };
    let profiles = VmProfile::load_all(&args.profiles)?;

    let mut request = RunRequest::new(args.prediction_length, args.threshold);
    request.based_on_last = args.based_on_last;
    request.tenant_id = args.tenant.clone();
    request.model_type = args.model.clone();

    let forecaster: Box<dyn Forecaster> = match &args.forecast {
        Some(path) => Box::new(StaticForecaster::from_json_file(path)?),
        None => Box::new(ScriptForecaster::new(config.forecaster.clone(), config.readings_per_minute())),
    };
    let twin = DigitalTwin::new(config, profiles);

    let output = match args.strategy {
        Strategy::All => serde_json::to_string_pretty(&twin.simulate_future_behaviour(forecaster.as_ref(), &request))?,
        Strategy::Baseline => single_run(&twin, &mut BaselineStrategy, &request)?,
        Strategy::WithoutScaling => {
            let data = twin.prepare_forecast(forecaster.as_ref(), &request);
            single_run(&twin, &mut PredictionWithoutScalingStrategy::new(data), &request)?
        }
        Strategy::WithScaling => {
            let data = twin.prepare_forecast(forecaster.as_ref(), &request);
            single_run(&twin, &mut PredictionWithScalingStrategy::new(data), &request)?
        }
    };
    println!("{}", output);
    Ok(())
}

fn single_run(
    twin: &DigitalTwin,
    strategy: &mut dyn SimulationStrategy,
    request: &RunRequest,
) -> Result<String, Box<dyn std::error::Error>> {
    let report = twin.run(strategy, request)?;
    Ok(serde_json::to_string_pretty(&report)?)
}
