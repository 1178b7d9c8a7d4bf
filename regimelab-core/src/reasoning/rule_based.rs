//! Deterministic reference reasoner.
//!
//! Proposals come from a fixed per-regime playbook, critiques from a fixed
//! set of risk checks, and adjustments from the critique severity. Output
//! depends only on the inputs, so two runs over the same data serialize
//! byte-identically.

use crate::classifier::{ClassifierConfig, RegimeAssessment};
use crate::domain::Regime;
use crate::metrics::MetricsSnapshot;

use super::artifacts::{
    Critique, FinalDecision, MissingInput, RiskFlag, Severity, StrategyProposal, STAY_IN_CASH,
};
use super::{CollaboratorError, ReasoningCollaborator};

/// Strategy template for one regime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Playbook {
    pub action: &'static str,
    pub sizing: f64,
    pub thesis: &'static str,
}

pub fn playbook(regime: Regime) -> Playbook {
    match regime {
        Regime::Bull => Playbook {
            action: "Trend Following",
            sizing: 1.0,
            thesis: "Price leads both moving averages in order; ride the trend.",
        },
        Regime::Bear => Playbook {
            action: "Cash Preservation",
            sizing: 0.0,
            thesis: "Price trails both moving averages in order; stay out of the way.",
        },
        Regime::SidewaysChoppy => Playbook {
            action: "Mean Reversion",
            sizing: 0.5,
            thesis: "No aligned trend; fade moves back toward the averages.",
        },
        Regime::HighVolatilityDistressed => Playbook {
            action: "Risk-Off",
            sizing: 0.25,
            thesis: "Volatility dominates the trend; cut exposure.",
        },
    }
}

/// Risk checks over a snapshot, in reporting order.
pub fn risk_flags(metrics: &MetricsSnapshot, thresholds: &ClassifierConfig) -> Vec<RiskFlag> {
    let mut flags = Vec::new();

    let mut missing = Vec::new();
    for reading in [metrics.sma_short_reading(), metrics.sma_long_reading()] {
        if reading.value.is_none() {
            missing.push(MissingInput::Sma {
                period: reading.period,
            });
        }
    }
    if metrics.volatility_annualized().is_none() {
        missing.push(MissingInput::Volatility);
    }
    if !missing.is_empty() {
        flags.push(RiskFlag::LowConfidenceSignal { missing });
    }

    if let Some(vol) = metrics.volatility_annualized() {
        if vol >= thresholds.high_vol_threshold {
            flags.push(RiskFlag::VolatilityBreach {
                volatility: vol,
                threshold: thresholds.high_vol_threshold,
            });
        } else if let Some(medium) = thresholds.medium_vol_threshold {
            if vol >= medium {
                flags.push(RiskFlag::ElevatedVolatility {
                    volatility: vol,
                    threshold: medium,
                });
            }
        }
    }

    flags
}

fn render(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.2}"),
        None => "n/a".to_string(),
    }
}

/// Rule-based strategist, risk manager and decision maker in one.
#[derive(Debug, Clone, Default)]
pub struct RuleBasedReasoner {
    thresholds: ClassifierConfig,
}

impl RuleBasedReasoner {
    /// `thresholds` should be the same configuration the classifier used.
    pub fn new(thresholds: ClassifierConfig) -> Self {
        Self { thresholds }
    }
}

impl ReasoningCollaborator for RuleBasedReasoner {
    fn name(&self) -> &str {
        "rule-based"
    }

    fn propose(
        &self,
        assessment: &RegimeAssessment,
        metrics: &MetricsSnapshot,
    ) -> Result<StrategyProposal, CollaboratorError> {
        let book = playbook(assessment.regime());
        let short = metrics.sma_short_reading();
        let long = metrics.sma_long_reading();
        let rationale = format!(
            "{} Regime {} via {:?}: price {:.2}, SMA-{} {}, SMA-{} {}, volatility {} ({} band).",
            book.thesis,
            assessment.regime(),
            assessment.matched_rule(),
            metrics.price(),
            short.period,
            render(short.value),
            long.period,
            render(long.value),
            render(metrics.volatility_annualized()),
            assessment.volatility_band(),
        );
        Ok(StrategyProposal::new(
            assessment,
            book.action,
            rationale,
            book.sizing,
        ))
    }

    fn critique(
        &self,
        proposal: &StrategyProposal,
        metrics: &MetricsSnapshot,
    ) -> Result<Critique, CollaboratorError> {
        Ok(Critique::from_flags(
            proposal,
            risk_flags(metrics, &self.thresholds),
        ))
    }

    fn adjust(
        &self,
        proposal: &StrategyProposal,
        critique: &Critique,
        _metrics: &MetricsSnapshot,
    ) -> Result<FinalDecision, CollaboratorError> {
        let concerns = critique.concerns().iter().cloned();
        let decision = match critique.severity() {
            Severity::Critical => {
                let mut adjustments = vec![format!(
                    "override: critical risk, replacing '{}' with '{}'",
                    proposal.action(),
                    STAY_IN_CASH
                )];
                adjustments.extend(concerns);
                FinalDecision::new(proposal, critique, STAY_IN_CASH, adjustments, 0.0, true)
            }
            Severity::Moderate => FinalDecision::new(
                proposal,
                critique,
                proposal.action(),
                concerns.collect(),
                proposal.position_sizing_hint() * 0.5,
                false,
            ),
            Severity::Minor => FinalDecision::new(
                proposal,
                critique,
                proposal.action(),
                concerns.collect(),
                proposal.position_sizing_hint(),
                false,
            ),
        };
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::assess;
    use crate::metrics::SmaReading;
    use chrono::NaiveDate;

    fn snapshot(price: f64, short: Option<f64>, long: Option<f64>, vol: Option<f64>) -> MetricsSnapshot {
        MetricsSnapshot::new(
            NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            220,
            price,
            SmaReading { period: 50, value: short },
            SmaReading { period: 200, value: long },
            vol,
            0.001,
        )
    }

    fn run(reasoner: &RuleBasedReasoner, m: &MetricsSnapshot) -> (StrategyProposal, Critique, FinalDecision) {
        let a = assess(m, &reasoner.thresholds).unwrap();
        let p = reasoner.propose(&a, m).unwrap();
        let c = reasoner.critique(&p, m).unwrap();
        let d = reasoner.adjust(&p, &c, m).unwrap();
        (p, c, d)
    }

    #[test]
    fn playbook_covers_every_regime() {
        for regime in Regime::ALL {
            let book = playbook(regime);
            assert!(!book.action.is_empty());
            assert!((0.0..=1.0).contains(&book.sizing));
        }
        assert_eq!(playbook(Regime::Bull).action, "Trend Following");
        assert_eq!(playbook(Regime::Bear).sizing, 0.0);
    }

    #[test]
    fn clean_bull_is_minor_and_kept() {
        let reasoner = RuleBasedReasoner::default();
        let m = snapshot(110.0, Some(105.0), Some(100.0), Some(0.12));
        let (p, c, d) = run(&reasoner, &m);
        assert_eq!(p.action(), "Trend Following");
        assert_eq!(c.severity(), Severity::Minor);
        assert!(c.flags().is_empty());
        assert_eq!(d.final_action(), "Trend Following");
        assert_eq!(d.position_size(), 1.0);
        assert!(!d.overridden());
        assert!(d.adjustments().is_empty());
    }

    #[test]
    fn volatility_breach_overrides_to_cash() {
        let reasoner = RuleBasedReasoner::default();
        let m = snapshot(110.0, Some(105.0), Some(100.0), Some(0.60));
        let (p, c, d) = run(&reasoner, &m);
        assert_eq!(p.action(), "Risk-Off");
        assert_eq!(c.severity(), Severity::Critical);
        assert!(d.overridden());
        assert_eq!(d.final_action(), STAY_IN_CASH);
        assert_eq!(d.position_size(), 0.0);
        assert!(d.adjustments()[0].starts_with("override:"));
        assert_eq!(&d.adjustments()[1..], c.concerns());
    }

    #[test]
    fn missing_history_halves_size() {
        let reasoner = RuleBasedReasoner::default();
        let m = snapshot(110.0, None, None, Some(0.10));
        let (p, c, d) = run(&reasoner, &m);
        assert_eq!(p.action(), "Mean Reversion");
        assert_eq!(c.severity(), Severity::Moderate);
        assert_eq!(
            c.flags()[0],
            RiskFlag::LowConfidenceSignal {
                missing: vec![
                    MissingInput::Sma { period: 50 },
                    MissingInput::Sma { period: 200 }
                ]
            }
        );
        assert!(!d.overridden());
        assert_eq!(d.final_action(), "Mean Reversion");
        assert_eq!(d.position_size(), 0.25);
        assert_eq!(d.adjustments(), c.concerns());
    }

    #[test]
    fn missing_volatility_is_low_confidence() {
        let flags = risk_flags(
            &snapshot(110.0, Some(105.0), Some(100.0), None),
            &ClassifierConfig::default(),
        );
        assert_eq!(
            flags,
            vec![RiskFlag::LowConfidenceSignal {
                missing: vec![MissingInput::Volatility]
            }]
        );
    }

    #[test]
    fn elevated_volatility_needs_medium_threshold() {
        let m = snapshot(110.0, Some(105.0), Some(100.0), Some(0.28));
        assert!(risk_flags(&m, &ClassifierConfig::default()).is_empty());

        let cfg = ClassifierConfig {
            medium_vol_threshold: Some(0.25),
            ..ClassifierConfig::default()
        };
        let flags = risk_flags(&m, &cfg);
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].severity(), Severity::Moderate);
        assert!(matches!(flags[0], RiskFlag::ElevatedVolatility { .. }));
    }

    #[test]
    fn breach_and_missing_flags_keep_order() {
        let m = snapshot(110.0, Some(105.0), None, Some(0.50));
        let flags = risk_flags(&m, &ClassifierConfig::default());
        assert_eq!(flags.len(), 2);
        assert!(matches!(flags[0], RiskFlag::LowConfidenceSignal { .. }));
        assert!(matches!(flags[1], RiskFlag::VolatilityBreach { .. }));
    }

    #[test]
    fn rationale_is_deterministic() {
        let reasoner = RuleBasedReasoner::default();
        let m = snapshot(110.0, Some(105.0), Some(100.0), Some(0.12));
        let (p1, _, _) = run(&reasoner, &m);
        let (p2, _, _) = run(&reasoner, &m);
        assert_eq!(p1.rationale(), p2.rationale());
        assert!(p1.rationale().contains("SMA-50 105.00"));
        assert!(p1.rationale().contains("volatility 0.12"));
    }
}
