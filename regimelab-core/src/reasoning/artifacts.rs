//! Reasoning-stage artifacts: strategy proposal, critique, final decision.
//!
//! Every artifact is write-once and carries the content-hash identity of the
//! artifact(s) it was derived from. Constructors take the predecessor by
//! reference, so an artifact cannot be built without one.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::classifier::RegimeAssessment;
use crate::domain::{ArtifactId, Regime};
use crate::fingerprint::ContentHasher;

/// Action label used whenever a critical critique overrides a proposal.
pub const STAY_IN_CASH: &str = "Stay in Cash";

/// Critique severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Minor,
    Moderate,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// An input the reasoning depended on that was not available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "input", rename_all = "snake_case")]
pub enum MissingInput {
    Sma { period: usize },
    Volatility,
}

impl fmt::Display for MissingInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingInput::Sma { period } => write!(f, "SMA-{period}"),
            MissingInput::Volatility => f.write_str("volatility"),
        }
    }
}

/// A typed risk finding raised by a critique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "flag", rename_all = "snake_case")]
pub enum RiskFlag {
    /// The regime rests on incomplete inputs.
    LowConfidenceSignal { missing: Vec<MissingInput> },
    /// Volatility at or above the high threshold.
    VolatilityBreach { volatility: f64, threshold: f64 },
    /// Volatility at or above the medium threshold but below the high one.
    ElevatedVolatility { volatility: f64, threshold: f64 },
}

impl RiskFlag {
    pub fn severity(&self) -> Severity {
        match self {
            RiskFlag::LowConfidenceSignal { .. } => Severity::Moderate,
            RiskFlag::VolatilityBreach { .. } => Severity::Critical,
            RiskFlag::ElevatedVolatility { .. } => Severity::Moderate,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskFlag::LowConfidenceSignal { .. } => "low-confidence signal",
            RiskFlag::VolatilityBreach { .. } => "volatility breach",
            RiskFlag::ElevatedVolatility { .. } => "elevated volatility",
        }
    }

    /// Text rendering used as the critique concern.
    pub fn describe(&self) -> String {
        match self {
            RiskFlag::LowConfidenceSignal { missing } => {
                let names: Vec<String> = missing.iter().map(|m| m.to_string()).collect();
                format!(
                    "{}: {} unavailable (insufficient history)",
                    self.label(),
                    names.join(", ")
                )
            }
            RiskFlag::VolatilityBreach {
                volatility,
                threshold,
            } => format!(
                "{}: annualized volatility {:.2}% at or above {:.2}% threshold",
                self.label(),
                volatility * 100.0,
                threshold * 100.0
            ),
            RiskFlag::ElevatedVolatility {
                volatility,
                threshold,
            } => format!(
                "{}: annualized volatility {:.2}% at or above {:.2}% medium threshold",
                self.label(),
                volatility * 100.0,
                threshold * 100.0
            ),
        }
    }

    fn hash_into(&self, h: &mut ContentHasher) {
        h.text(self.label());
        match self {
            RiskFlag::LowConfidenceSignal { missing } => {
                h.count(missing.len() as u64);
                for m in missing {
                    h.text(&m.to_string());
                }
            }
            RiskFlag::VolatilityBreach {
                volatility,
                threshold,
            }
            | RiskFlag::ElevatedVolatility {
                volatility,
                threshold,
            } => {
                h.number(*volatility).number(*threshold);
            }
        }
    }
}

/// Candidate strategy for the classified regime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyProposal {
    id: ArtifactId,
    metrics_id: ArtifactId,
    assessment_id: ArtifactId,
    regime: Regime,
    action: String,
    rationale: String,
    /// Fraction of capital, expected within `[0, 1]`.
    position_sizing_hint: f64,
}

impl StrategyProposal {
    pub fn new(
        assessment: &RegimeAssessment,
        action: impl Into<String>,
        rationale: impl Into<String>,
        position_sizing_hint: f64,
    ) -> Self {
        let mut proposal = Self {
            id: assessment.id().clone(),
            metrics_id: assessment.metrics_id().clone(),
            assessment_id: assessment.id().clone(),
            regime: assessment.regime(),
            action: action.into(),
            rationale: rationale.into(),
            position_sizing_hint,
        };
        proposal.id = proposal.content_id();
        proposal
    }

    fn content_id(&self) -> ArtifactId {
        let mut h = ContentHasher::new("proposal");
        h.id(&self.metrics_id)
            .id(&self.assessment_id)
            .text(self.regime.label())
            .text(&self.action)
            .text(&self.rationale)
            .number(self.position_sizing_hint);
        h.finish()
    }

    pub fn verify_identity(&self) -> bool {
        self.id == self.content_id()
    }

    pub fn id(&self) -> &ArtifactId {
        &self.id
    }

    pub fn metrics_id(&self) -> &ArtifactId {
        &self.metrics_id
    }

    pub fn assessment_id(&self) -> &ArtifactId {
        &self.assessment_id
    }

    pub fn regime(&self) -> Regime {
        self.regime
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn rationale(&self) -> &str {
        &self.rationale
    }

    pub fn position_sizing_hint(&self) -> f64 {
        self.position_sizing_hint
    }
}

/// Risk review of exactly one proposal. Never mutates the proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Critique {
    id: ArtifactId,
    proposal_id: ArtifactId,
    flags: Vec<RiskFlag>,
    concerns: Vec<String>,
    severity: Severity,
}

impl Critique {
    pub fn new(
        proposal: &StrategyProposal,
        flags: Vec<RiskFlag>,
        concerns: Vec<String>,
        severity: Severity,
    ) -> Self {
        let mut critique = Self {
            id: proposal.id().clone(),
            proposal_id: proposal.id().clone(),
            flags,
            concerns,
            severity,
        };
        critique.id = critique.content_id();
        critique
    }

    /// Build a critique whose concerns and severity derive from typed flags.
    /// No flags means a Minor critique with no concerns.
    pub fn from_flags(proposal: &StrategyProposal, flags: Vec<RiskFlag>) -> Self {
        let concerns = flags.iter().map(RiskFlag::describe).collect();
        let severity = flags
            .iter()
            .map(RiskFlag::severity)
            .max()
            .unwrap_or(Severity::Minor);
        Self::new(proposal, flags, concerns, severity)
    }

    fn content_id(&self) -> ArtifactId {
        let mut h = ContentHasher::new("critique");
        h.id(&self.proposal_id).count(self.flags.len() as u64);
        for flag in &self.flags {
            flag.hash_into(&mut h);
        }
        h.texts(&self.concerns).text(&self.severity.to_string());
        h.finish()
    }

    pub fn verify_identity(&self) -> bool {
        self.id == self.content_id()
    }

    pub fn id(&self) -> &ArtifactId {
        &self.id
    }

    pub fn proposal_id(&self) -> &ArtifactId {
        &self.proposal_id
    }

    pub fn flags(&self) -> &[RiskFlag] {
        &self.flags
    }

    pub fn concerns(&self) -> &[String] {
        &self.concerns
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }
}

/// Terminal artifact of a run: the adjusted decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalDecision {
    id: ArtifactId,
    proposal_id: ArtifactId,
    critique_id: ArtifactId,
    final_action: String,
    adjustments: Vec<String>,
    /// Fraction of capital after adjustment, within `[0, 1]`.
    position_size: f64,
    overridden: bool,
}

impl FinalDecision {
    pub fn new(
        proposal: &StrategyProposal,
        critique: &Critique,
        final_action: impl Into<String>,
        adjustments: Vec<String>,
        position_size: f64,
        overridden: bool,
    ) -> Self {
        let mut decision = Self {
            id: critique.id().clone(),
            proposal_id: proposal.id().clone(),
            critique_id: critique.id().clone(),
            final_action: final_action.into(),
            adjustments,
            position_size,
            overridden,
        };
        decision.id = decision.content_id();
        decision
    }

    fn content_id(&self) -> ArtifactId {
        let mut h = ContentHasher::new("decision");
        h.id(&self.proposal_id)
            .id(&self.critique_id)
            .text(&self.final_action)
            .texts(&self.adjustments)
            .number(self.position_size)
            .flag(self.overridden);
        h.finish()
    }

    pub fn verify_identity(&self) -> bool {
        self.id == self.content_id()
    }

    pub fn id(&self) -> &ArtifactId {
        &self.id
    }

    pub fn proposal_id(&self) -> &ArtifactId {
        &self.proposal_id
    }

    pub fn critique_id(&self) -> &ArtifactId {
        &self.critique_id
    }

    pub fn final_action(&self) -> &str {
        &self.final_action
    }

    pub fn adjustments(&self) -> &[String] {
        &self.adjustments
    }

    pub fn position_size(&self) -> f64 {
        self.position_size
    }

    pub fn overridden(&self) -> bool {
        self.overridden
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{assess, ClassifierConfig};
    use crate::metrics::{MetricsSnapshot, SmaReading};
    use chrono::NaiveDate;

    fn bull_assessment() -> RegimeAssessment {
        let metrics = MetricsSnapshot::new(
            NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            250,
            110.0,
            SmaReading { period: 50, value: Some(105.0) },
            SmaReading { period: 200, value: Some(100.0) },
            Some(0.12),
            0.002,
        );
        assess(&metrics, &ClassifierConfig::default()).unwrap()
    }

    #[test]
    fn proposal_references_assessment_and_metrics() {
        let a = bull_assessment();
        let p = StrategyProposal::new(&a, "Trend Following", "up", 1.0);
        assert_eq!(p.assessment_id(), a.id());
        assert_eq!(p.metrics_id(), a.metrics_id());
        assert_eq!(p.regime(), Regime::Bull);
        assert!(p.verify_identity());
    }

    #[test]
    fn critique_from_no_flags_is_minor() {
        let p = StrategyProposal::new(&bull_assessment(), "Trend Following", "up", 1.0);
        let c = Critique::from_flags(&p, vec![]);
        assert_eq!(c.severity(), Severity::Minor);
        assert!(c.concerns().is_empty());
        assert_eq!(c.proposal_id(), p.id());
    }

    #[test]
    fn critique_severity_is_max_of_flags() {
        let p = StrategyProposal::new(&bull_assessment(), "Trend Following", "up", 1.0);
        let c = Critique::from_flags(
            &p,
            vec![
                RiskFlag::LowConfidenceSignal {
                    missing: vec![MissingInput::Sma { period: 200 }],
                },
                RiskFlag::VolatilityBreach {
                    volatility: 0.5,
                    threshold: 0.35,
                },
            ],
        );
        assert_eq!(c.severity(), Severity::Critical);
        assert_eq!(c.concerns().len(), 2);
        assert!(c.concerns()[0].starts_with("low-confidence signal: SMA-200"));
        assert!(c.concerns()[1].contains("50.00%"));
    }

    #[test]
    fn decision_references_both_predecessors() {
        let p = StrategyProposal::new(&bull_assessment(), "Trend Following", "up", 1.0);
        let c = Critique::from_flags(&p, vec![]);
        let d = FinalDecision::new(&p, &c, "Trend Following", vec![], 1.0, false);
        assert_eq!(d.proposal_id(), p.id());
        assert_eq!(d.critique_id(), c.id());
        assert!(d.verify_identity());
    }

    #[test]
    fn flag_serialization_is_tagged() {
        let flag = RiskFlag::LowConfidenceSignal {
            missing: vec![MissingInput::Sma { period: 50 }, MissingInput::Volatility],
        };
        let json = serde_json::to_value(&flag).unwrap();
        assert_eq!(json["flag"], "low_confidence_signal");
        assert_eq!(json["missing"][0]["input"], "sma");
        assert_eq!(json["missing"][0]["period"], 50);
        let back: RiskFlag = serde_json::from_value(json).unwrap();
        assert_eq!(back, flag);
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Minor < Severity::Moderate);
        assert!(Severity::Moderate < Severity::Critical);
    }
}
