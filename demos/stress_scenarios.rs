//! Stress testing example
//!
//! Runs the standard scenarios plus a custom one against a portfolio, with
//! both recovery models, and prints the summary report.
//!
//! Run with: cargo run --example stress_scenarios

use chrono::{TimeZone, Utc};
use portfolio_risk::stress::{RecoveryModel, ScenarioShock};
use portfolio_risk::{
    Holding, HoldingWeight, ReturnSeries, RiskMetricsEngine, StressConfig, StressScenario,
    StressTestEngine,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Stress Testing Example ===\n");

    // 1. Baseline metrics from a year of daily returns
    let returns: Vec<f64> = (0..252)
        .map(|i| {
            let base = (i as f64 * 0.21).sin() * 0.011;
            let noise = ((i * 31) % 17) as f64 / 17.0 * 0.004 - 0.002;
            base + noise + 0.0003
        })
        .collect();
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let baseline = RiskMetricsEngine::default().compute(
        &ReturnSeries::daily("portfolio", start, &returns),
        None,
        &[0.95, 0.99],
        &[1],
    )?;

    // 2. Holdings, one with foreign-currency exposure
    let weights = HoldingWeight::from_holdings(&[
        Holding::with_value("EQUITY", 300_000.0),
        Holding::with_value("BONDS", 150_000.0).foreign(false),
        Holding::with_value("US_TECH", 50_000.0).foreign(true),
    ])?;

    // 3. Scenarios: the standard set plus a sector-specific shock
    let mut scenarios = StressScenario::standard_set();
    scenarios.push(
        StressScenario::new("Tech Correction", ScenarioShock::Custom { shock: -0.05 }, 1.5)
            .with_description("Technology sell-off with limited spill-over")
            .with_override("US_TECH", -0.35),
    );

    // 4. Heuristic recovery
    println!("--- Heuristic recovery ---");
    let engine = StressTestEngine::default();
    let results = engine.run_all(&scenarios, &baseline, &weights)?;
    for r in &results {
        println!(
            "  {:<22} {:>8.2}%  {:>12.2}  {:>4} days  p = {:.2}",
            r.scenario_name, r.impact_percent, r.impact_amount, r.recovery_days, r.recovery_probability
        );
    }
    let report = engine.report(&results)?;
    println!(
        "  Worst: {} ({:.2}), best: {} ({:.2}), average {:.2}%",
        report.worst_scenario,
        report.max_loss,
        report.best_scenario,
        report.max_gain,
        report.average_impact_percent
    );
    println!();

    // 5. Seeded Monte Carlo recovery
    println!("--- Monte Carlo recovery (2000 paths) ---");
    let engine = StressTestEngine::new(&StressConfig {
        recovery_model: RecoveryModel::MonteCarlo {
            paths: 2000,
            seed: 42,
        },
        ..Default::default()
    });
    for r in engine.run_all(&scenarios, &baseline, &weights)? {
        println!(
            "  {:<22} {:>4} days  p = {:.2}",
            r.scenario_name, r.recovery_days, r.recovery_probability
        );
    }
    println!();

    // 6. Stressed metrics for the worst scenario
    if let Some(worst) = results.iter().find(|r| r.scenario_name == report.worst_scenario) {
        println!("--- Stressed metrics: {} ---", worst.scenario_name);
        for (name, value) in &worst.stressed_metrics {
            println!("  {:<24} {}", name, value);
        }
        println!("  Methodology: {}", worst.methodology);
    }

    Ok(())
}
