//! Portfolio assessment example
//!
//! Builds a small multi-asset portfolio, runs the full assessment pipeline
//! and prints metrics, diversification, stress results, the risk profile and
//! any alerts.
//!
//! Run with: cargo run --example assess_portfolio

use chrono::{Duration, TimeZone, Utc};
use portfolio_risk::profile::{GambleChoice, LossReaction, QuestionnaireAnswers};
use portfolio_risk::{
    AlertEvaluator, Analysis, AssessmentRequest, EngineConfig, Holding, InvestorAssessment,
    PricePoint, RiskAssessor,
};
use std::collections::BTreeMap;

fn synthetic_history(days: i64, drift: f64, amplitude: f64, phase: f64) -> Vec<PricePoint> {
    let start = Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap();
    let mut price = 100.0;
    (0..days)
        .map(|d| {
            let shock = (d as f64 * 0.45 + phase).sin() * amplitude;
            let jump = if d % 37 == 0 { -3.0 * amplitude } else { 0.0 };
            price *= 1.0 + drift + shock + jump;
            PricePoint::new(start + Duration::days(d), price)
        })
        .collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    portfolio_risk::init_tracing();

    println!("=== Portfolio Risk Assessment Example ===\n");

    // 1. Holdings and one year of prices
    let mut price_histories = BTreeMap::new();
    price_histories.insert("LARGECAP".to_string(), synthetic_history(260, 0.0006, 0.012, 0.0));
    price_histories.insert("MIDCAP".to_string(), synthetic_history(260, 0.0008, 0.018, 0.6));
    price_histories.insert("GILT".to_string(), synthetic_history(260, 0.0002, 0.003, 2.1));
    price_histories.insert("GLOBAL".to_string(), synthetic_history(260, 0.0005, 0.010, 1.3));

    let request = AssessmentRequest {
        portfolio_id: "household-001".to_string(),
        holdings: vec![
            Holding::with_price("LARGECAP", 400.0, 150.0),
            Holding::with_price("MIDCAP", 120.0, 210.0),
            Holding::with_value("GILT", 30_000.0),
            Holding::with_value("GLOBAL", 15_000.0).foreign(true),
        ],
        price_histories,
        benchmark: Some(("INDEX".to_string(), synthetic_history(260, 0.0005, 0.011, 0.2))),
        investor: InvestorAssessment {
            capacity_score: None,
            demographics: Some(portfolio_risk::profile::InvestorDemographics {
                age: 38,
                annual_income: 1_800_000.0,
                current_savings: 2_500_000.0,
                monthly_expenses: 85_000.0,
            }),
            questionnaire: QuestionnaireAnswers {
                volatility_comfort: Some(6),
                loss_tolerance: Some(5),
                investment_knowledge: Some(7),
                risk_return_preference: Some(6),
                guaranteed_vs_gamble: Some(GambleChoice::Guaranteed),
                reaction_to_loss: Some(LossReaction::Hold),
            },
            investment_horizon_years: Some(12.0),
        },
        scenarios: Vec::new(),
    };

    // 2. Engine configuration and alert limits
    let config = EngineConfig::from_yaml(
        r#"
metrics:
  risk_free_rate: 0.065
  confidence_levels: [0.95, 0.99]
  horizons_days: [1, 10]
"#,
    )?;
    let limits = AlertEvaluator::from_yaml(
        r#"
limits:
  - type: MetricLimit
    metric: volatility
    max: 0.20
  - type: ConcentrationLimit
    max_score: 60.0
  - type: StressTolerance
    max_impact_pct: 20.0
"#,
    )?;

    let assessor = RiskAssessor::new(config).with_alerts(limits);
    let assessment = assessor.assess(&request)?;

    // 3. Weights and metrics
    println!("--- Holdings ---");
    for w in &assessment.weights {
        println!("  {:<10} {:>12.2}  {:>6.2}%", w.instrument_id, w.market_value, w.weight * 100.0);
    }
    println!();

    println!("--- Risk Metrics ---");
    for (name, value) in assessment.metrics.metrics() {
        println!("  {:<28} {}", name, value);
    }
    for flag in assessment.metrics.flags() {
        println!("  flag: {}", flag);
    }
    println!();

    // 4. Diversification
    println!("--- Diversification ---");
    match &assessment.concentration {
        Analysis::Applicable(c) => println!(
            "  HHI {:.4}, top-5 {:.1}%, score {:.1} ({:?})",
            c.hhi,
            c.top5_weight * 100.0,
            c.score,
            c.level
        ),
        Analysis::NotApplicable(reason) => println!("  Concentration not available: {}", reason),
    }
    match &assessment.correlation {
        Analysis::Applicable(c) => {
            println!(
                "  Average correlation {:.3}, max {:.3}, diversification benefit {:.3}",
                c.average_correlation, c.max_correlation, c.diversification_benefit
            );
            for pair in &c.highly_correlated_pairs {
                println!("  Highly correlated: {} / {} ({:.3})", pair.first, pair.second, pair.correlation);
            }
        }
        Analysis::NotApplicable(reason) => println!("  Correlation not available: {}", reason),
    }
    println!();

    // 5. Stress tests
    println!("--- Stress Tests ---");
    for r in &assessment.stress_results {
        println!(
            "  {:<22} {:>8.2}%  {:>12.2}  recovery {:>4} days (p = {:.2})",
            r.scenario_name, r.impact_percent, r.impact_amount, r.recovery_days, r.recovery_probability
        );
    }
    println!(
        "  Worst: {} ({:.2})",
        assessment.stress_report.worst_scenario, assessment.stress_report.max_loss
    );
    println!();

    // 6. Profile and alerts
    let profile = &assessment.profile;
    println!("--- Risk Profile ---");
    println!("  Overall score: {:.1} ({:?}, {:?})", profile.overall_score, profile.level, profile.investor_profile);
    println!("  Loss aversion: {:?} ({:+.0})", profile.loss_aversion, profile.loss_aversion_adjustment);
    println!("  Confidence: {:.0}% ({:?})", profile.confidence * 100.0, profile.confidence_level);
    for (dimension, contribution) in &profile.contributions {
        println!("  {:?}: {:.2}", dimension, contribution);
    }
    println!();

    println!("--- Alerts ---");
    if assessment.alerts.is_empty() {
        println!("  No limits breached");
    }
    for alert in &assessment.alerts {
        println!("  [{:?}] {}", alert.severity, alert.title);
        println!("      {}", alert.explanation);
        for action in &alert.recommended_actions {
            println!("      - {}", action);
        }
    }

    Ok(())
}
