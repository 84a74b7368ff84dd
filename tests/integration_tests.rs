//! Integration tests for the portfolio risk engine
//!
//! These tests exercise the full assessment pipeline, the sample policy and
//! configuration documents, and the worked examples.

use approx::assert_relative_eq;
use chrono::{DateTime, Duration, TimeZone, Utc};
use portfolio_risk::concentration::ConcentrationAnalyzer;
use portfolio_risk::profile::{
    combine_dimensions, Dimension, GambleChoice, LossAversion, LossReaction, QuestionnaireAnswers,
};
use portfolio_risk::stress::RecoveryModel;
use portfolio_risk::{
    AlertEvaluator, AlertPolicyConfig, AlertSeverity, AlertType, Analysis, AssessmentRequest,
    ConcentrationLevel, CorrelationAnalyzer, EngineConfig, Holding, HoldingWeight,
    InvestorAssessment, PricePoint, ReturnSeries, RiskAssessor, RiskError, RiskMetricsEngine,
    RiskProfileAggregator, SeriesConfig, StressScenario, StressTestEngine,
};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::fs;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Price path that realizes the given returns exactly
fn prices_from_returns(returns: &[f64]) -> Vec<PricePoint> {
    let mut price = 100.0;
    let mut points = vec![PricePoint::new(start(), price)];
    for (i, r) in returns.iter().enumerate() {
        price *= 1.0 + r;
        points.push(PricePoint::new(start() + Duration::days(i as i64 + 1), price));
    }
    points
}

fn choppy_returns(len: usize, scale: f64, phase: usize) -> Vec<f64> {
    (0..len)
        .map(|i| {
            let wave = ((i + phase) as f64 * 0.7).sin();
            let kick = if (i + phase) % 5 == 0 { -1.5 } else { 0.4 };
            scale * (wave + kick) * 0.01
        })
        .collect()
}

fn read_policy(name: &str) -> String {
    let path = format!("{}/policies/{}", env!("CARGO_MANIFEST_DIR"), name);
    fs::read_to_string(&path).expect("Failed to read policy file")
}

fn balanced_request(id: &str) -> AssessmentRequest {
    let mut price_histories = BTreeMap::new();
    price_histories.insert("EQUITY".to_string(), prices_from_returns(&choppy_returns(120, 1.6, 0)));
    price_histories.insert("BONDS".to_string(), prices_from_returns(&choppy_returns(120, 0.3, 3)));
    price_histories.insert("GOLD".to_string(), prices_from_returns(&choppy_returns(120, 0.9, 7)));

    AssessmentRequest {
        portfolio_id: id.to_string(),
        holdings: vec![
            Holding::with_price("EQUITY", 250.0, 200.0),
            Holding::with_value("BONDS", 30_000.0),
            Holding::with_value("GOLD", 20_000.0).foreign(true),
        ],
        price_histories,
        benchmark: Some((
            "INDEX".to_string(),
            prices_from_returns(&choppy_returns(120, 1.2, 1)),
        )),
        investor: InvestorAssessment {
            capacity_score: Some(65.0),
            questionnaire: QuestionnaireAnswers {
                volatility_comfort: Some(6),
                loss_tolerance: Some(5),
                investment_knowledge: Some(7),
                risk_return_preference: Some(6),
                guaranteed_vs_gamble: Some(GambleChoice::Gamble),
                reaction_to_loss: Some(LossReaction::Hold),
            },
            investment_horizon_years: Some(15.0),
            ..Default::default()
        },
        scenarios: Vec::new(),
    }
}

#[test]
fn test_two_holding_equal_weight_example() {
    let returns = [0.01, -0.02, 0.015, -0.01, 0.02];
    let mut price_histories = BTreeMap::new();
    price_histories.insert("A".to_string(), prices_from_returns(&returns));
    price_histories.insert("B".to_string(), prices_from_returns(&returns));

    let request = AssessmentRequest {
        portfolio_id: "example-1".to_string(),
        holdings: vec![Holding::with_value("A", 5_000.0), Holding::with_value("B", 5_000.0)],
        price_histories,
        benchmark: None,
        investor: InvestorAssessment::default(),
        scenarios: Vec::new(),
    };

    let config = EngineConfig {
        series: SeriesConfig {
            lookback_periods: 252,
            min_observations: 2,
        },
        ..Default::default()
    };
    let assessment = RiskAssessor::new(config).assess(&request).unwrap();

    for w in &assessment.weights {
        assert_relative_eq!(w.weight, 0.5, epsilon = 1e-12);
    }

    // Sample std of the blended series, annualized over 252 periods
    let expected_vol = 2.95e-4_f64.sqrt() * 252.0_f64.sqrt();
    assert_relative_eq!(
        assessment.metrics.value("volatility").unwrap(),
        expected_vol,
        epsilon = 1e-9
    );

    // 5th percentile interpolated between the two lowest returns
    let var_95 = assessment.metrics.value("var_95_1d").unwrap();
    assert_relative_eq!(var_95, -0.018, epsilon = 1e-9);
    assert!(var_95 > -0.02 && var_95 < -0.01);

    assert!(assessment.metrics.has_flag("benchmark_unavailable"));
    assert!(assessment.metrics.get("beta").map_or(true, |v| !v.is_defined()));
}

#[test]
fn test_single_holding_concentration_example() {
    let weights = HoldingWeight::from_holdings(&[Holding::with_value("ONLY", 42_000.0)]).unwrap();
    let result = ConcentrationAnalyzer::new().analyze(&weights).applicable().unwrap();

    assert_relative_eq!(result.hhi, 1.0, epsilon = 1e-12);
    assert_eq!(result.level, ConcentrationLevel::High);
}

#[test]
fn test_market_crash_example() {
    let baseline = RiskMetricsEngine::default()
        .compute(
            &ReturnSeries::daily("portfolio", start(), &choppy_returns(60, 1.0, 0)),
            None,
            &[0.95, 0.99],
            &[1],
        )
        .unwrap();

    let crash = StressScenario::standard_set()
        .into_iter()
        .find(|s| s.name == "Market Crash")
        .unwrap();
    let holdings = vec![HoldingWeight::new("PORTFOLIO", 500_000.0, 1.0)];

    let result = StressTestEngine::default().run(&crash, &baseline, &holdings).unwrap();

    assert_relative_eq!(result.impact_amount, -150_000.0, epsilon = 1e-6);
    assert_relative_eq!(result.impact_percent, -30.0, epsilon = 1e-9);
    assert_eq!(result.recovery_days, 750);
    assert_relative_eq!(result.recovery_probability, 0.56, epsilon = 1e-9);
}

#[test]
fn test_full_tolerance_questionnaire_example() {
    let investor = InvestorAssessment {
        questionnaire: QuestionnaireAnswers {
            volatility_comfort: Some(10),
            loss_tolerance: Some(10),
            investment_knowledge: Some(10),
            risk_return_preference: Some(10),
            guaranteed_vs_gamble: Some(GambleChoice::Gamble),
            reaction_to_loss: Some(LossReaction::BuyMore),
        },
        ..Default::default()
    };

    assert_eq!(investor.questionnaire.tolerance_score(), Some(100.0));
    assert_eq!(investor.questionnaire.loss_aversion(), Some(LossAversion::Low));

    let metrics = RiskMetricsEngine::default()
        .compute(
            &ReturnSeries::daily("portfolio", start(), &choppy_returns(40, 1.0, 2)),
            None,
            &[0.99],
            &[1],
        )
        .unwrap();
    let profile = RiskProfileAggregator::new()
        .aggregate(
            &investor,
            &metrics,
            &Analysis::NotApplicable("no holdings".to_string()),
            &Analysis::NotApplicable("no holdings".to_string()),
        )
        .unwrap();

    assert_eq!(profile.dimension_scores.tolerance, Some(100.0));
    assert_eq!(profile.loss_aversion_adjustment, 0.0);
}

#[test]
fn test_full_pipeline_with_benchmark() {
    let assessment = RiskAssessor::default()
        .assess(&balanced_request("balanced"))
        .unwrap();

    assert_eq!(assessment.weights.len(), 3);
    assert!(!assessment.metrics.has_flag("benchmark_unavailable"));
    assert!(assessment.metrics.value("beta").is_some());
    assert_eq!(
        assessment.metrics.parameters().benchmark_id.as_deref(),
        Some("INDEX")
    );

    let correlation = assessment.correlation.as_ref().applicable().unwrap();
    assert_eq!(correlation.instruments.len(), 3);
    assert_relative_eq!(
        correlation.diversification_benefit,
        (1.0 - correlation.average_correlation).clamp(0.0, 1.0),
        epsilon = 1e-12
    );

    let report = &assessment.stress_report;
    assert_eq!(report.results.len(), 5);
    assert!(report.max_loss <= report.max_gain);
    for result in &assessment.stress_results {
        assert!((0.0..=1.0).contains(&result.recovery_probability));
    }

    let profile = &assessment.profile;
    assert!((0.0..=100.0).contains(&profile.overall_score));
    assert_relative_eq!(profile.confidence, 1.0, epsilon = 1e-12);

    let json = serde_json::to_string(&assessment).unwrap();
    assert!(json.contains("\"portfolio_id\":\"balanced\""));
}

#[test]
fn test_load_default_limits_policy() {
    let yaml = read_policy("default_limits.yaml");
    let evaluator = AlertEvaluator::from_yaml(&yaml).unwrap();
    assert_eq!(evaluator.policy(), &AlertPolicyConfig::default_limits());
}

#[test]
fn test_conservative_policy_raises_sorted_alerts() {
    let yaml = read_policy("conservative.yaml");
    let assessor = RiskAssessor::default().with_alerts(AlertEvaluator::from_yaml(&yaml).unwrap());
    let assessment = assessor.assess(&balanced_request("conservative")).unwrap();

    assert!(!assessment.alerts.is_empty());
    for pair in assessment.alerts.windows(2) {
        assert!(pair[0].severity >= pair[1].severity);
    }

    // Standard crash loses 30%, beyond the 10% tolerance
    let crash = assessment
        .alerts
        .iter()
        .find(|a| a.alert_type == AlertType::StressFailure && a.metric == "stress:Market Crash")
        .unwrap();
    assert_eq!(crash.severity, AlertSeverity::Critical);
    assert!(!crash.recommended_actions.is_empty());
}

#[test]
fn test_load_engine_config() {
    let yaml = read_policy("engine.yaml");
    let config = EngineConfig::from_yaml(&yaml).unwrap();

    assert_eq!(config.metrics.horizons_days, vec![1, 10]);
    assert_eq!(
        config.stress.recovery_model,
        RecoveryModel::MonteCarlo {
            paths: 2000,
            seed: 42
        }
    );

    // Seeded simulation is reproducible across runs
    let assessor = RiskAssessor::new(config);
    let first = assessor.assess(&balanced_request("mc")).unwrap();
    let second = assessor.assess(&balanced_request("mc")).unwrap();
    assert_eq!(first.stress_results, second.stress_results);
}

#[test]
fn test_invalid_config_rejected() {
    let err = EngineConfig::from_yaml("metrics:\n  confidence_levels: [1.5]\n").unwrap_err();
    assert!(matches!(err, RiskError::InvalidConfidenceLevel(_)));

    let err = AlertEvaluator::from_json(r#"{"limits":[{"type":"Unknown"}]}"#).unwrap_err();
    assert!(matches!(err, RiskError::Json(_)));
}

#[test]
fn test_negative_holding_rejected() {
    let mut request = balanced_request("bad");
    request.holdings.push(Holding::with_value("BONDS", -5.0));
    let err = RiskAssessor::default().assess(&request).unwrap_err();
    assert!(matches!(err, RiskError::InvalidInput(_)));
}

#[test]
fn test_misaligned_calendars_rejected() {
    let mut request = balanced_request("misaligned");
    let shifted: Vec<PricePoint> = prices_from_returns(&choppy_returns(30, 1.0, 0))
        .into_iter()
        .map(|p| PricePoint::new(p.timestamp + Duration::days(1_000), p.price))
        .collect();
    request.price_histories.insert("GOLD".to_string(), shifted);

    let err = RiskAssessor::default().assess(&request).unwrap_err();
    assert!(matches!(err, RiskError::MisalignedCalendar(_)));
}

#[test]
fn test_single_holding_correlation_not_applicable() {
    let result = CorrelationAnalyzer::new()
        .analyze_series(&[("ONLY".to_string(), choppy_returns(30, 1.0, 0))]);
    assert!(!result.is_applicable());
    assert!(result.reason().is_some());
}

#[test]
fn test_clearance_after_rebalance() {
    let assessor = RiskAssessor::default();

    let mut concentrated = balanced_request("rebalance");
    concentrated.holdings = vec![Holding::with_value("EQUITY", 100_000.0)];
    let before = assessor.assess(&concentrated).unwrap();
    assert!(before
        .alerts
        .iter()
        .any(|a| a.alert_type == AlertType::ConcentrationHigh));

    // Twelve equal positions: HHI 1/12 and top-5 share 5/12
    let mut diversified = balanced_request("rebalance");
    diversified.holdings = (0..12)
        .map(|i| Holding::with_value(format!("D{}", i), 10_000.0))
        .collect();
    for i in 0..12 {
        diversified.price_histories.insert(
            format!("D{}", i),
            prices_from_returns(&choppy_returns(120, 0.5 + i as f64 * 0.1, i * 2)),
        );
    }

    let after = assessor.assess(&diversified).unwrap();
    assert!(after
        .alerts
        .iter()
        .all(|a| a.alert_type != AlertType::ConcentrationHigh));
    let cleared = assessor.clearances(&before, &after);
    assert!(cleared
        .iter()
        .any(|a| a.cleared_type == Some(AlertType::ConcentrationHigh)));
    assert!(cleared.iter().all(|a| a.severity == AlertSeverity::Info));
}

#[test]
fn test_assess_many_batch() {
    let requests: Vec<AssessmentRequest> = (0..6)
        .map(|i| balanced_request(&format!("p{}", i)))
        .collect();
    let results = RiskAssessor::default().assess_many(&requests);

    assert_eq!(results.len(), 6);
    for (i, result) in results.iter().enumerate() {
        assert_eq!(result.as_ref().unwrap().portfolio_id, format!("p{}", i));
    }
}

#[cfg(feature = "async")]
#[tokio::test]
async fn test_assess_blocking() {
    let assessment = RiskAssessor::default()
        .assess_blocking(balanced_request("async"))
        .await
        .unwrap();
    assert_eq!(assessment.stress_results.len(), 5);
}

proptest! {
    #[test]
    fn prop_weights_sum_to_one(values in prop::collection::vec(0.01f64..1e7, 1..20)) {
        let holdings: Vec<Holding> = values
            .iter()
            .enumerate()
            .map(|(i, v)| Holding::with_value(format!("H{}", i), *v))
            .collect();
        let weights = HoldingWeight::from_holdings(&holdings).unwrap();
        let sum: f64 = weights.iter().map(|w| w.weight).sum();
        prop_assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn prop_dimension_order_does_not_matter(
        capacity in 0.0f64..100.0,
        tolerance in 0.0f64..100.0,
        portfolio in 0.0f64..100.0,
        horizon in 0.0f64..100.0,
    ) {
        let forward = [
            (Dimension::Capacity, capacity),
            (Dimension::Tolerance, tolerance),
            (Dimension::Portfolio, portfolio),
            (Dimension::TimeHorizon, horizon),
        ];
        let mut reversed = forward;
        reversed.reverse();

        let (a, contributions_a) = combine_dimensions(&forward).unwrap();
        let (b, contributions_b) = combine_dimensions(&reversed).unwrap();
        prop_assert!((a - b).abs() < 1e-9);
        prop_assert_eq!(contributions_a, contributions_b);
    }

    #[test]
    fn prop_stress_is_deterministic(shock in -0.9f64..0.5, multiplier in 0.5f64..4.0) {
        let baseline = RiskMetricsEngine::default()
            .compute(
                &ReturnSeries::daily("portfolio", start(), &choppy_returns(40, 1.0, 1)),
                None,
                &[0.95],
                &[1],
            )
            .unwrap();
        let scenario = StressScenario::new(
            "custom",
            portfolio_risk::ScenarioShock::Custom { shock },
            multiplier,
        );
        let holdings = vec![
            HoldingWeight::new("A", 60_000.0, 0.6),
            HoldingWeight::new("B", 40_000.0, 0.4),
        ];

        let engine = StressTestEngine::default();
        let first = engine.run(&scenario, &baseline, &holdings).unwrap();
        let second = engine.run(&scenario, &baseline, &holdings).unwrap();
        prop_assert_eq!(first, second);
    }
}
