//! Risk profile aggregation
//!
//! Combines the investor's capacity, questionnaire tolerance and investment
//! horizon with a score derived from the portfolio's own risk metrics into a
//! single 0-100 score and categorical level.
//!
//! Dimension weights: capacity 30%, tolerance 30%, portfolio 20%, time
//! horizon 20%. Dimensions without input are dropped and the remaining
//! weights renormalized; the loss-aversion adjustment is applied after
//! weighting.

use crate::concentration::ConcentrationResult;
use crate::correlation::CorrelationResult;
use crate::error::{Result, RiskError};
use crate::metrics::{names, RiskMetricSet};
use crate::Analysis;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const CAPACITY_WEIGHT: f64 = 0.30;
pub const TOLERANCE_WEIGHT: f64 = 0.30;
pub const PORTFOLIO_WEIGHT: f64 = 0.20;
pub const TIME_HORIZON_WEIGHT: f64 = 0.20;

/// Score band lower bounds shared by the investor and portfolio levels
pub const VERY_HIGH_THRESHOLD: f64 = 80.0;
pub const HIGH_THRESHOLD: f64 = 65.0;
pub const MODERATE_THRESHOLD: f64 = 50.0;
pub const LOW_THRESHOLD: f64 = 35.0;

// Portfolio metric caps: the metric value that maps to a component score of 100
pub const VOLATILITY_CAP: f64 = 0.40;
pub const DRAWDOWN_CAP: f64 = 0.50;
pub const VAR_99_CAP: f64 = 0.10;
/// Component points per unit of |beta - 1|
pub const BETA_DEVIATION_POINTS: f64 = 50.0;

pub const VOLATILITY_COMPONENT_WEIGHT: f64 = 0.30;
pub const DRAWDOWN_COMPONENT_WEIGHT: f64 = 0.25;
pub const VAR_COMPONENT_WEIGHT: f64 = 0.20;
pub const CONCENTRATION_COMPONENT_WEIGHT: f64 = 0.15;
pub const BETA_COMPONENT_WEIGHT: f64 = 0.10;

/// Number of inputs counted towards the profile confidence
const TRACKED_INPUTS: f64 = 8.0;

/// Questionnaire sub-scores are on a 1-10 scale
const SUB_SCORE_RANGE: std::ops::RangeInclusive<u8> = 1..=10;

/// Five-bucket risk level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    VeryLow,
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= VERY_HIGH_THRESHOLD {
            RiskLevel::VeryHigh
        } else if score >= HIGH_THRESHOLD {
            RiskLevel::High
        } else if score >= MODERATE_THRESHOLD {
            RiskLevel::Moderate
        } else if score >= LOW_THRESHOLD {
            RiskLevel::Low
        } else {
            RiskLevel::VeryLow
        }
    }
}

/// Investor profile label, same bands as [`RiskLevel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestorProfile {
    VeryConservative,
    Conservative,
    Moderate,
    Aggressive,
    VeryAggressive,
}

impl InvestorProfile {
    pub fn from_score(score: f64) -> Self {
        match RiskLevel::from_score(score) {
            RiskLevel::VeryHigh => InvestorProfile::VeryAggressive,
            RiskLevel::High => InvestorProfile::Aggressive,
            RiskLevel::Moderate => InvestorProfile::Moderate,
            RiskLevel::Low => InvestorProfile::Conservative,
            RiskLevel::VeryLow => InvestorProfile::VeryConservative,
        }
    }
}

/// Qualitative capacity level used by the demographic and horizon tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityLevel {
    VeryLow,
    Low,
    Medium,
    MediumHigh,
    High,
    VeryHigh,
}

impl CapacityLevel {
    /// 0-100 score for the level
    pub fn score(self) -> f64 {
        match self {
            CapacityLevel::VeryLow => 10.0,
            CapacityLevel::Low => 25.0,
            CapacityLevel::Medium => 50.0,
            CapacityLevel::MediumHigh => 65.0,
            CapacityLevel::High => 80.0,
            CapacityLevel::VeryHigh => 95.0,
        }
    }

    fn points(self) -> f64 {
        match self {
            CapacityLevel::VeryLow | CapacityLevel::Low => 1.0,
            CapacityLevel::Medium => 2.0,
            CapacityLevel::MediumHigh => 3.0,
            CapacityLevel::High | CapacityLevel::VeryHigh => 4.0,
        }
    }

    /// Capacity implied by the investment horizon
    pub fn from_horizon_years(years: f64) -> Self {
        if years >= 15.0 {
            CapacityLevel::High
        } else if years >= 10.0 {
            CapacityLevel::MediumHigh
        } else if years >= 5.0 {
            CapacityLevel::Medium
        } else if years >= 2.0 {
            CapacityLevel::Low
        } else {
            CapacityLevel::VeryLow
        }
    }
}

/// Investor financial situation used to derive risk capacity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestorDemographics {
    pub age: u32,
    pub annual_income: f64,
    pub current_savings: f64,
    pub monthly_expenses: f64,
}

/// Capacity derived from demographics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapacityAssessment {
    pub age_capacity: CapacityLevel,
    pub financial_capacity: CapacityLevel,
    pub overall: CapacityLevel,
    pub savings_ratio: f64,
    pub surplus_ratio: f64,
}

impl InvestorDemographics {
    pub fn assess(&self) -> CapacityAssessment {
        let age_capacity = if self.age < 30 {
            CapacityLevel::High
        } else if self.age < 45 {
            CapacityLevel::MediumHigh
        } else if self.age < 55 {
            CapacityLevel::Medium
        } else {
            CapacityLevel::Low
        };

        let income = self.annual_income;
        let (savings_ratio, surplus_ratio) = if income > 0.0 {
            (
                self.current_savings / income,
                ((income - self.monthly_expenses * 12.0) / income).max(0.0),
            )
        } else {
            (0.0, 0.0)
        };

        let financial_capacity = if savings_ratio > 0.5 && surplus_ratio > 0.3 {
            CapacityLevel::High
        } else if savings_ratio > 0.3 && surplus_ratio > 0.2 {
            CapacityLevel::Medium
        } else {
            CapacityLevel::Low
        };

        let points = (age_capacity.points() + financial_capacity.points()) / 2.0;
        let overall = if points >= 3.5 {
            CapacityLevel::High
        } else if points >= 2.5 {
            CapacityLevel::Medium
        } else {
            CapacityLevel::Low
        };

        CapacityAssessment {
            age_capacity,
            financial_capacity,
            overall,
            savings_ratio,
            surplus_ratio,
        }
    }
}

/// Answer to "a guaranteed gain or a gamble with a higher expected value?"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GambleChoice {
    Guaranteed,
    Gamble,
}

/// Answer to "your portfolio drops 20%, what do you do?"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossReaction {
    SellAll,
    SellSome,
    Hold,
    BuyMore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossAversion {
    Low,
    Medium,
    High,
}

impl LossAversion {
    /// Classify from the categorical answers; `None` if neither was given
    pub fn from_answers(choice: Option<GambleChoice>, reaction: Option<LossReaction>) -> Option<Self> {
        if choice.is_none() && reaction.is_none() {
            return None;
        }

        let choice_points = match choice {
            Some(GambleChoice::Guaranteed) => 2,
            Some(GambleChoice::Gamble) | None => 0,
        };
        let reaction_points = match reaction {
            Some(LossReaction::SellAll) => 3,
            Some(LossReaction::SellSome) => 2,
            Some(LossReaction::Hold) => 1,
            Some(LossReaction::BuyMore) | None => 0,
        };

        Some(match choice_points + reaction_points {
            p if p >= 4 => LossAversion::High,
            p if p >= 2 => LossAversion::Medium,
            _ => LossAversion::Low,
        })
    }

    /// Points added to the weighted score
    pub fn adjustment(self) -> f64 {
        match self {
            LossAversion::High => -15.0,
            LossAversion::Medium => -5.0,
            LossAversion::Low => 0.0,
        }
    }
}

/// Questionnaire answers; absent or out-of-range answers stay `None`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionnaireAnswers {
    pub volatility_comfort: Option<u8>,
    pub loss_tolerance: Option<u8>,
    pub investment_knowledge: Option<u8>,
    pub risk_return_preference: Option<u8>,
    pub guaranteed_vs_gamble: Option<GambleChoice>,
    pub reaction_to_loss: Option<LossReaction>,
}

impl QuestionnaireAnswers {
    fn sub_scores(&self) -> [(&'static str, Option<u8>); 4] {
        [
            ("volatility_comfort", self.volatility_comfort),
            ("loss_tolerance", self.loss_tolerance),
            ("investment_knowledge", self.investment_knowledge),
            ("risk_return_preference", self.risk_return_preference),
        ]
    }

    /// Valid sub-scores; out-of-range answers are logged and dropped
    fn valid_sub_scores(&self) -> Vec<f64> {
        self.sub_scores()
            .into_iter()
            .filter_map(|(question, answer)| match answer {
                Some(v) if SUB_SCORE_RANGE.contains(&v) => Some(f64::from(v)),
                Some(v) => {
                    tracing::warn!(question, answer = v, "Ignoring out-of-range questionnaire answer");
                    None
                }
                None => None,
            })
            .collect()
    }

    /// Mean sub-score normalized to 0-100, `None` without any valid answer
    pub fn tolerance_score(&self) -> Option<f64> {
        let scores = self.valid_sub_scores();
        if scores.is_empty() {
            return None;
        }
        Some(scores.iter().sum::<f64>() / (scores.len() as f64 * 10.0) * 100.0)
    }

    pub fn loss_aversion(&self) -> Option<LossAversion> {
        LossAversion::from_answers(self.guaranteed_vs_gamble, self.reaction_to_loss)
    }
}

/// Investor-side inputs to the profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvestorAssessment {
    /// Capacity score supplied by the caller (0-100); takes precedence over
    /// demographics
    #[serde(default)]
    pub capacity_score: Option<f64>,

    #[serde(default)]
    pub demographics: Option<InvestorDemographics>,

    #[serde(default)]
    pub questionnaire: QuestionnaireAnswers,

    #[serde(default)]
    pub investment_horizon_years: Option<f64>,
}

impl InvestorAssessment {
    fn capacity(&self) -> Option<f64> {
        match (self.capacity_score, &self.demographics) {
            (Some(score), _) if score.is_finite() => Some(score.clamp(0.0, 100.0)),
            (Some(score), _) => {
                tracing::warn!(score, "Ignoring non-finite capacity score");
                self.demographics.as_ref().map(|d| d.assess().overall.score())
            }
            (None, Some(d)) => Some(d.assess().overall.score()),
            (None, None) => None,
        }
    }

    fn time_horizon(&self) -> Option<f64> {
        self.investment_horizon_years
            .filter(|y| y.is_finite() && *y >= 0.0)
            .map(|y| CapacityLevel::from_horizon_years(y).score())
    }
}

/// Weighted profile dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Capacity,
    Tolerance,
    Portfolio,
    TimeHorizon,
}

impl Dimension {
    pub fn weight(self) -> f64 {
        match self {
            Dimension::Capacity => CAPACITY_WEIGHT,
            Dimension::Tolerance => TOLERANCE_WEIGHT,
            Dimension::Portfolio => PORTFOLIO_WEIGHT,
            Dimension::TimeHorizon => TIME_HORIZON_WEIGHT,
        }
    }
}

/// Weighted contribution of each present dimension to the score
pub type DimensionContributions = BTreeMap<Dimension, f64>;

/// Weighted combination of dimension scores before loss aversion
///
/// Returns the weighted score and each dimension's contribution. The
/// result depends only on the set of `(dimension, score)` pairs, not their
/// order.
///
/// # Errors
///
/// `InvalidInput` when no dimension is given or one is given twice.
pub fn combine_dimensions(scores: &[(Dimension, f64)]) -> Result<(f64, DimensionContributions)> {
    let mut by_dimension: BTreeMap<Dimension, f64> = BTreeMap::new();
    for &(dimension, score) in scores {
        if by_dimension.insert(dimension, score).is_some() {
            return Err(RiskError::InvalidInput(format!(
                "dimension {:?} given more than once",
                dimension
            )));
        }
    }
    if by_dimension.is_empty() {
        return Err(RiskError::InvalidInput(
            "risk profile needs at least one scored dimension".to_string(),
        ));
    }

    let total_weight: f64 = by_dimension.keys().map(|d| d.weight()).sum();
    let contributions: DimensionContributions = by_dimension
        .iter()
        .map(|(&d, &score)| (d, score * d.weight() / total_weight))
        .collect();
    let weighted = contributions.values().sum();

    Ok((weighted, contributions))
}

/// Portfolio risk score from its metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioRiskScore {
    /// Score in [0, 100]
    pub score: f64,
    pub level: RiskLevel,

    /// Component scores (0-100) that were available
    pub components: BTreeMap<String, f64>,
}

/// Map volatility, drawdown, 99% 1-day VaR, concentration and beta
/// deviation into a 0-100 portfolio risk score
///
/// Undefined or missing components are left out and the remaining component
/// weights renormalized. `None` if no component is available.
pub fn portfolio_risk_score(
    metrics: &RiskMetricSet,
    concentration: &Analysis<ConcentrationResult>,
) -> Option<PortfolioRiskScore> {
    let capped = |value: f64, cap: f64| (value.abs() / cap * 100.0).min(100.0);

    let candidates = [
        (
            names::VOLATILITY,
            VOLATILITY_COMPONENT_WEIGHT,
            metrics.value(names::VOLATILITY).map(|v| capped(v, VOLATILITY_CAP)),
        ),
        (
            names::MAX_DRAWDOWN,
            DRAWDOWN_COMPONENT_WEIGHT,
            metrics.value(names::MAX_DRAWDOWN).map(|v| capped(v, DRAWDOWN_CAP)),
        ),
        (
            "var_99_1d",
            VAR_COMPONENT_WEIGHT,
            metrics.value(&names::var(0.99, 1)).map(|v| capped(v, VAR_99_CAP)),
        ),
        (
            "concentration",
            CONCENTRATION_COMPONENT_WEIGHT,
            concentration.as_ref().applicable().map(|c| c.score.min(100.0)),
        ),
        (
            names::BETA,
            BETA_COMPONENT_WEIGHT,
            metrics
                .value(names::BETA)
                .map(|b| ((b - 1.0).abs() * BETA_DEVIATION_POINTS).min(100.0)),
        ),
    ];

    let mut components = BTreeMap::new();
    let mut weighted = 0.0;
    let mut total_weight = 0.0;
    for (name, weight, score) in candidates {
        if let Some(score) = score {
            components.insert(name.to_string(), score);
            weighted += weight * score;
            total_weight += weight;
        }
    }

    if components.is_empty() {
        return None;
    }

    let score = (weighted / total_weight).clamp(0.0, 100.0);
    Some(PortfolioRiskScore {
        score,
        level: RiskLevel::from_score(score),
        components,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn from_share(share: f64) -> Self {
        if share >= 0.8 {
            ConfidenceLevel::High
        } else if share >= 0.5 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

/// Score of each dimension before weighting
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionScores {
    pub capacity: Option<f64>,
    pub tolerance: Option<f64>,
    pub portfolio: Option<f64>,
    pub time_horizon: Option<f64>,
}

/// Combined investor and portfolio risk profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskProfile {
    /// Overall score in [0, 100]
    pub overall_score: f64,
    pub level: RiskLevel,
    pub investor_profile: InvestorProfile,

    pub dimension_scores: DimensionScores,
    pub contributions: DimensionContributions,

    pub loss_aversion: Option<LossAversion>,
    pub loss_aversion_adjustment: f64,

    /// Share of tracked inputs that were present, in [0, 1]
    pub confidence: f64,
    pub confidence_level: ConfidenceLevel,

    pub portfolio_risk: Option<PortfolioRiskScore>,

    pub metrics: RiskMetricSet,
    pub concentration: Analysis<ConcentrationResult>,
    pub correlation: Analysis<CorrelationResult>,
    pub diversification_benefit: Option<f64>,

    pub assessed_at: DateTime<Utc>,
}

/// Builds [`RiskProfile`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskProfileAggregator;

impl RiskProfileAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Combine investor inputs with the portfolio analyses
    ///
    /// # Errors
    ///
    /// `InvalidInput` if not a single dimension can be scored.
    pub fn aggregate(
        &self,
        investor: &InvestorAssessment,
        metrics: &RiskMetricSet,
        concentration: &Analysis<ConcentrationResult>,
        correlation: &Analysis<CorrelationResult>,
    ) -> Result<RiskProfile> {
        let portfolio_risk = portfolio_risk_score(metrics, concentration);
        let dimension_scores = DimensionScores {
            capacity: investor.capacity(),
            tolerance: investor.questionnaire.tolerance_score(),
            portfolio: portfolio_risk.as_ref().map(|p| p.score),
            time_horizon: investor.time_horizon(),
        };

        let present: Vec<(Dimension, f64)> = [
            (Dimension::Capacity, dimension_scores.capacity),
            (Dimension::Tolerance, dimension_scores.tolerance),
            (Dimension::Portfolio, dimension_scores.portfolio),
            (Dimension::TimeHorizon, dimension_scores.time_horizon),
        ]
        .into_iter()
        .filter_map(|(d, score)| score.map(|s| (d, s)))
        .collect();

        let (weighted, contributions) = combine_dimensions(&present)?;

        let loss_aversion = investor.questionnaire.loss_aversion();
        let loss_aversion_adjustment = loss_aversion.map_or(0.0, LossAversion::adjustment);
        let overall_score = (weighted + loss_aversion_adjustment).clamp(0.0, 100.0);

        let confidence = input_share(investor, &dimension_scores, loss_aversion.is_some());

        tracing::debug!(
            overall_score,
            dimensions = present.len(),
            confidence,
            loss_aversion = ?loss_aversion,
            "Aggregated risk profile"
        );

        Ok(RiskProfile {
            overall_score,
            level: RiskLevel::from_score(overall_score),
            investor_profile: InvestorProfile::from_score(overall_score),
            dimension_scores,
            contributions,
            loss_aversion,
            loss_aversion_adjustment,
            confidence,
            confidence_level: ConfidenceLevel::from_share(confidence),
            portfolio_risk,
            metrics: metrics.clone(),
            concentration: concentration.clone(),
            diversification_benefit: correlation
                .as_ref()
                .applicable()
                .map(|c| c.diversification_benefit),
            correlation: correlation.clone(),
            assessed_at: Utc::now(),
        })
    }
}

/// Capacity, four sub-scores, portfolio metrics, horizon and loss aversion
fn input_share(investor: &InvestorAssessment, scores: &DimensionScores, has_aversion: bool) -> f64 {
    let sub_scores = investor
        .questionnaire
        .sub_scores()
        .iter()
        .filter(|(_, a)| a.map_or(false, |v| SUB_SCORE_RANGE.contains(&v)))
        .count();

    let present = sub_scores
        + usize::from(scores.capacity.is_some())
        + usize::from(scores.portfolio.is_some())
        + usize::from(scores.time_horizon.is_some())
        + usize::from(has_aversion);

    present as f64 / TRACKED_INPUTS
}
