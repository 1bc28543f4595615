use std::collections::HashMap;

use twin_scaling::aggregation::{aggregate_forecast, AggregatedForecast};
use twin_scaling::config::TwinConfig;
use twin_scaling::dispatcher::VmRole;
use twin_scaling::forecast::{ForecastSeries, StaticForecaster};
use twin_scaling::lifecycle::RunContext;
use twin_scaling::profile::{RunRequest, VmProfile};
use twin_scaling::report::CostModel;
use twin_scaling::scaling::ScalingManager;
use twin_scaling::strategy::{
    BaselineStrategy, PredictionWithScalingStrategy, PredictionWithoutScalingStrategy,
};
use twin_scaling::{DigitalTwin, RunFailure};

const MB: u64 = 1 << 20;

fn config() -> TwinConfig {
    TwinConfig::from_file("test-configs/config.yaml").unwrap()
}

fn web1(usage: f64) -> VmProfile {
    VmProfile {
        name: "web1".to_string(),
        cpu: 2,
        core_processing_power: 500.,
        ram: 4 << 30,
        disk: 0,
        network_traffic: 0,
        startup_delay: 0.,
        usage,
        data_since_last_save: MB,
    }
}

fn forecast(entries: &[(&str, Vec<f64>)]) -> ForecastSeries {
    entries
        .iter()
        .map(|(name, readings)| (name.to_string(), readings.clone()))
        .collect()
}

fn aggregate(profiles: &[VmProfile], series: &ForecastSeries) -> AggregatedForecast {
    let max_ips: HashMap<String, u64> = profiles
        .iter()
        .map(|p| (p.name.clone(), p.max_instructions_per_second()))
        .collect();
    aggregate_forecast(series, &max_ips, 12, 2)
}

fn readings(minutes: &[f64]) -> Vec<f64> {
    minutes.iter().flat_map(|load| vec![*load; 12]).collect()
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {}, got {}",
        expected,
        actual
    );
}

#[test]
fn test_overloaded_vm_gets_backup_and_split_work() {
    let profiles = vec![web1(50.)];
    let data = aggregate(&profiles, &forecast(&[("web1", readings(&[90.]))]));
    let config = config();
    let mut run = RunContext::initialize(&config.cloud, &profiles, config.scaling_physical_machines).unwrap();
    run.start();
    let run_start = run.run_start();

    let mut manager = ScalingManager::new(0.8);
    assert_eq!(manager.execute(&mut run, &data).unwrap(), 1);

    let backup = manager.registry().get("web1").unwrap();
    assert_eq!(backup.handle.name, "web1_backup");
    assert_eq!(backup.created_at_minute, 1);
    assert!(run.cloud().current_time() >= run_start + 60.);

    let dispatcher = run.dispatcher();
    let records = dispatcher.borrow().dispatched().to_vec();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].role, VmRole::Primary);
    assert_eq!(records[1].role, VmRole::Backup);
    for record in &records {
        assert_eq!(record.unit.instructions, 27_000_000);
        assert_close(record.unit.idle_fraction, 0.55);
        assert_eq!(record.unit.task_credit, 27_000_000);
    }
    assert_eq!(run.metrics().vm_count(), 2);
}

#[test]
fn test_scenario_a_report() {
    let twin = DigitalTwin::new(config(), vec![web1(50.)]);
    let data = aggregate(twin.profiles(), &forecast(&[("web1", readings(&[90.]))]));
    let report = twin
        .run(&mut PredictionWithScalingStrategy::new(data), &RunRequest::new(2, 0.8))
        .unwrap();

    assert_eq!(report.total_vm_tasks_simulated, 54_000_000);
    assert_eq!(report.number_of_vms_utilized, 2);
    assert_close(report.total_moved_data_mb, 2.);
    assert_eq!(report.runtime_ms, 120_000);
    assert_close(report.runtime_minutes, 2.);

    // pm-1 runs both halves (0.9 of 8 cores each) in the second minute, pm-2 stays idle
    let busy_power = 20. + 180. * (1.8 / 8.);
    let joules = busy_power * 60. + 20. * 60. + 20. * 120.;
    assert!((report.total_energy_consumption_kwh - joules / 3_600_000.).abs() < 1e-8);

    // web1 and its backup: (4 GiB * 0.005 + 2 * 0.05) per hour each
    assert_close(report.total_iot_cost_usd, 2. * 0.12 * report.runtime_hours);
}

#[test]
fn test_scenario_b_no_backup_below_threshold() {
    let twin = DigitalTwin::new(config(), vec![web1(50.)]);
    let data = aggregate(twin.profiles(), &forecast(&[("web1", readings(&[50.]))]));
    let report = twin
        .run(&mut PredictionWithScalingStrategy::new(data), &RunRequest::new(2, 0.8))
        .unwrap();

    assert_eq!(report.total_vm_tasks_simulated, 30_000_000);
    assert_eq!(report.number_of_vms_utilized, 1);
    assert_close(report.total_moved_data_mb, 1.);
    assert_eq!(report.runtime_ms, 120_000);
    assert_close(report.total_iot_cost_usd, 0.12 * report.runtime_hours);
}

#[test]
fn test_scenario_c_empty_forecast() {
    let twin = DigitalTwin::new(config(), vec![web1(50.)]);
    let request = RunRequest::new(2, 0.8);
    let data = twin.prepare_forecast(&StaticForecaster::default(), &request);
    assert!(data.is_empty());

    for report in [
        twin.run(&mut PredictionWithoutScalingStrategy::new(data.clone()), &request)
            .unwrap(),
        twin.run(&mut PredictionWithScalingStrategy::new(data.clone()), &request)
            .unwrap(),
    ] {
        assert_eq!(report.total_vm_tasks_simulated, 0);
        assert_eq!(report.total_moved_data_mb, 0.);
        assert_eq!(report.number_of_vms_utilized, 1);
        assert_eq!(report.runtime_ms, 120_000);
    }

    // idle draw only: 2 hosts for the scaling run
    let report = twin
        .run(&mut PredictionWithScalingStrategy::new(data), &request)
        .unwrap();
    assert!((report.total_energy_consumption_kwh - 2. * 20. * 120. / 3_600_000.).abs() < 1e-8);
}

#[test]
fn test_threshold_is_inclusive() {
    let profiles = vec![web1(50.)];
    let data = aggregate(&profiles, &forecast(&[("web1", readings(&[80.]))]));
    let config = config();
    let mut run = RunContext::initialize(&config.cloud, &profiles, 2).unwrap();
    run.start();

    let mut manager = ScalingManager::new(0.8);
    assert_eq!(manager.execute(&mut run, &data).unwrap(), 1);
    assert_eq!(manager.registry().len(), 1);
}

#[test]
fn test_single_backup_per_vm() {
    let profiles = vec![web1(50.)];
    let data = aggregate(&profiles, &forecast(&[("web1", readings(&[90., 95., 85.]))]));
    let config = config();
    let mut run = RunContext::initialize(&config.cloud, &profiles, 2).unwrap();
    run.start();

    let mut manager = ScalingManager::new(0.8);
    assert_eq!(manager.execute(&mut run, &data).unwrap(), 1);
    assert_eq!(manager.registry().len(), 1);
    assert_eq!(run.metrics().vm_count(), 2);

    let dispatcher = run.dispatcher();
    let records = dispatcher.borrow().dispatched().to_vec();
    assert_eq!(records.len(), 6);
    assert_eq!(records.iter().filter(|r| r.role == VmRole::Backup).count(), 3);
    let credit: u64 = records.iter().map(|r| r.unit.task_credit).sum();
    assert_eq!(credit, 54_000_000 + 57_000_000 + 51_000_000);
}

#[test]
fn test_backup_created_in_later_minute() {
    let twin = DigitalTwin::new(config(), vec![web1(50.)]);
    let data = aggregate(twin.profiles(), &forecast(&[("web1", readings(&[50., 90.]))]));
    let report = twin
        .run(&mut PredictionWithScalingStrategy::new(data), &RunRequest::new(4, 0.8))
        .unwrap();

    assert_eq!(report.number_of_vms_utilized, 2);
    assert_eq!(report.total_vm_tasks_simulated, 30_000_000 + 54_000_000);
    assert_close(report.total_moved_data_mb, 3.);
    // backup at minute 2, then 2 more minutes
    assert_eq!(report.runtime_ms, 240_000);
}

#[test]
fn test_split_credit_preserves_odd_totals() {
    let mut profile = web1(50.);
    profile.cpu = 1;
    profile.core_processing_power = 0.001;
    let profiles = vec![profile];
    // 60 * 0.85 * 1 = 51 instructions, split as 26 + 25 credit
    let data = aggregate(&profiles, &forecast(&[("web1", readings(&[85.]))]));
    let config = config();
    let mut run = RunContext::initialize(&config.cloud, &profiles, 2).unwrap();
    run.start();

    ScalingManager::new(0.8).execute(&mut run, &data).unwrap();
    let dispatcher = run.dispatcher();
    let records = dispatcher.borrow().dispatched().to_vec();
    assert_eq!(records[0].unit.instructions, 26);
    assert_eq!(records[1].unit.instructions, 26);
    assert_eq!(records[0].unit.task_credit + records[1].unit.task_credit, 51);
    // 85% halves to 42.5%, rounded to 43% before the idle fraction is taken
    assert_close(records[0].unit.idle_fraction, 0.57);
    assert_close(records[1].unit.idle_fraction, 0.57);
}

#[test]
fn test_repeated_execution_is_idempotent_for_backups() {
    let profiles = vec![web1(50.)];
    let data = aggregate(&profiles, &forecast(&[("web1", readings(&[90.]))]));
    let config = config();
    let mut run = RunContext::initialize(&config.cloud, &profiles, 2).unwrap();
    run.start();

    let mut manager = ScalingManager::new(0.8);
    assert_eq!(manager.execute(&mut run, &data).unwrap(), 1);
    let time = run.cloud().current_time();

    assert_eq!(manager.execute(&mut run, &data).unwrap(), 1);
    assert_eq!(run.cloud().current_time(), time);
    assert_eq!(manager.registry().len(), 1);
    assert_eq!(run.metrics().vm_count(), 2);
    assert_eq!(run.dispatcher().borrow().dispatched().len(), 4);
}

#[test]
fn test_vm_without_forecast_is_skipped() {
    let mut other = web1(50.);
    other.name = "db".to_string();
    let profiles = vec![web1(50.), other];
    let data = aggregate(&profiles, &forecast(&[("db", readings(&[90.]))]));
    let config = config();
    let mut run = RunContext::initialize(&config.cloud, &profiles, 2).unwrap();
    run.start();

    let mut manager = ScalingManager::new(0.8);
    manager.execute(&mut run, &data).unwrap();
    assert!(manager.registry().contains("db"));
    assert!(!manager.registry().contains("web1"));
    let dispatcher = run.dispatcher();
    assert!(dispatcher.borrow().dispatched().iter().all(|r| r.vm_name.starts_with("db")));
}

#[test]
fn test_backup_provisioning_failure_fails_run() {
    let config = TwinConfig::from_file("test-configs/single-host.yaml").unwrap();
    let mut profile = web1(50.);
    profile.cpu = 8;
    let twin = DigitalTwin::new(config, vec![profile]);
    let data = aggregate(twin.profiles(), &forecast(&[("web1", readings(&[90.]))]));

    let err = twin
        .run(&mut PredictionWithScalingStrategy::new(data), &RunRequest::new(2, 0.8))
        .unwrap_err();
    assert_eq!(err.message(), "Prediction with scaling simulation failed");
    assert!(matches!(err.cause(), RunFailure::Provisioning { name, .. } if name == "web1_backup"));
}

#[test]
fn test_baseline_uses_last_usage() {
    let twin = DigitalTwin::new(config(), vec![web1(50.)]);
    let report = twin.run(&mut BaselineStrategy, &RunRequest::new(2, 0.8)).unwrap();

    assert_eq!(report.total_vm_tasks_simulated, 2 * 30_000_000);
    assert_eq!(report.number_of_vms_utilized, 1);
    assert_close(report.total_moved_data_mb, 2.);
    assert_eq!(report.runtime_ms, 120_000);
}

#[test]
fn test_without_scaling_saves_to_cloud_repository() {
    let twin = DigitalTwin::new(config(), vec![web1(50.)]);
    let data = aggregate(twin.profiles(), &forecast(&[("web1", readings(&[90., 90.]))]));
    let report = twin
        .run(&mut PredictionWithoutScalingStrategy::new(data), &RunRequest::new(3, 0.8))
        .unwrap();

    assert_eq!(report.total_vm_tasks_simulated, 2 * 54_000_000);
    assert_eq!(report.number_of_vms_utilized, 1);
    assert_close(report.total_moved_data_mb, 2.);
    assert_eq!(report.runtime_ms, 180_000);
}

#[test]
fn test_simulate_future_behaviour_runs_all_strategies() {
    let twin = DigitalTwin::new(config(), vec![web1(50.)]);
    let forecaster = StaticForecaster::new(forecast(&[("web1", readings(&[90.]))]));
    let reports = twin.simulate_future_behaviour(&forecaster, &RunRequest::new(2, 0.8));

    let baseline = reports.baseline.unwrap();
    let without_scaling = reports.prediction_without_scaling.unwrap();
    let with_scaling = reports.prediction_with_scaling.unwrap();
    assert_eq!(baseline.total_vm_tasks_simulated, 60_000_000);
    assert_eq!(without_scaling.total_vm_tasks_simulated, 54_000_000);
    assert_eq!(without_scaling.number_of_vms_utilized, 1);
    assert_eq!(with_scaling.total_vm_tasks_simulated, 54_000_000);
    assert_eq!(with_scaling.number_of_vms_utilized, 2);
}

#[test]
fn test_transfer_failure_fails_run() {
    // 1 MiB of saved data does not fit into 1000-byte repositories
    let config = TwinConfig::from_file("test-configs/small-repo.yaml").unwrap();
    let twin = DigitalTwin::new(config, vec![web1(50.)]);
    let data = aggregate(twin.profiles(), &forecast(&[("web1", readings(&[90.]))]));

    let err = twin
        .run(&mut PredictionWithoutScalingStrategy::new(data), &RunRequest::new(2, 0.8))
        .unwrap_err();
    assert_eq!(err.message(), "Prediction without scaling simulation failed");
    assert!(matches!(err.cause(), RunFailure::TransferFailed { .. }));
}

#[test]
fn test_units_of_backup_created_in_last_minute_stay_pending() {
    let profiles = vec![web1(50.)];
    let data = aggregate(&profiles, &forecast(&[("web1", readings(&[50., 90.]))]));
    let config = config();
    let mut run = RunContext::initialize(&config.cloud, &profiles, config.scaling_physical_machines).unwrap();
    run.start();

    // the backup for minute 1 starts at the horizon end, its halves can't finish in time
    let mut manager = ScalingManager::new(0.8);
    assert_eq!(manager.execute(&mut run, &data).unwrap(), 2);
    run.drain(2);
    run.check_faults().unwrap();
    assert_eq!(run.dispatcher().borrow().pending_units(), 2);

    let report = run.finalize(&CostModel::from_config(&config));
    assert_eq!(report.total_vm_tasks_simulated, 30_000_000);
    assert_eq!(report.number_of_vms_utilized, 2);
    assert_eq!(report.runtime_ms, 120_000);
}

#[test]
fn test_aggregation_and_scaling_are_deterministic() {
    let mut db = web1(50.);
    db.name = "db".to_string();
    let profiles = vec![web1(50.), db];
    let series = forecast(&[("web1", readings(&[50., 85., 90.])), ("db", readings(&[95., 20., 30.]))]);
    let data = aggregate(&profiles, &series);
    assert_eq!(data, aggregate(&profiles, &series));

    let config = config();
    let backups = || {
        let mut run = RunContext::initialize(&config.cloud, &profiles, config.scaling_physical_machines).unwrap();
        run.start();
        let mut manager = ScalingManager::new(0.8);
        manager.execute(&mut run, &data).unwrap();
        manager
            .registry()
            .iter()
            .map(|(name, backup)| (name.clone(), backup.created_at_minute))
            .collect::<Vec<_>>()
    };
    let first = backups();
    assert_eq!(first, vec![("web1".to_string(), 2), ("db".to_string(), 1)]);
    assert_eq!(first, backups());
}

#[test]
fn test_drain_stops_at_horizon_end_after_backup_waits() {
    let mut db = web1(50.);
    db.name = "db".to_string();
    let twin = DigitalTwin::new(config(), vec![web1(50.), db]);
    let data = aggregate(
        twin.profiles(),
        &forecast(&[("web1", readings(&[90.])), ("db", readings(&[90.]))]),
    );
    let report = twin
        .run(&mut PredictionWithScalingStrategy::new(data), &RunRequest::new(2, 0.8))
        .unwrap();

    // db_backup starts after web1's split is already running, so db's halves end past the horizon
    assert_eq!(report.runtime_ms, 120_000);
    assert_eq!(report.number_of_vms_utilized, 4);
    assert_eq!(report.total_vm_tasks_simulated, 54_000_000);
    assert_close(report.total_moved_data_mb, 2.);
}
