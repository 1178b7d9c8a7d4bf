//! Structural checks applied to every collaborator artifact before the
//! machine accepts it. Any failure is a contract violation.

use crate::classifier::RegimeAssessment;
use crate::metrics::MetricsSnapshot;
use crate::reasoning::{
    Critique, FinalDecision, RiskFlag, Severity, StrategyProposal, STAY_IN_CASH,
};

fn fraction_in_range(name: &str, value: f64) -> Result<(), String> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(format!("{name} must be within [0, 1], got {value}"))
    }
}

pub fn check_proposal(
    proposal: &StrategyProposal,
    assessment: &RegimeAssessment,
    metrics: &MetricsSnapshot,
) -> Result<(), String> {
    if !proposal.verify_identity() {
        return Err(format!("proposal {} does not match its content", proposal.id()));
    }
    if proposal.assessment_id() != assessment.id() {
        return Err(format!(
            "proposal references assessment {}, expected {}",
            proposal.assessment_id().short(),
            assessment.id().short()
        ));
    }
    if proposal.metrics_id() != metrics.id() {
        return Err(format!(
            "proposal references metrics {}, expected {}",
            proposal.metrics_id().short(),
            metrics.id().short()
        ));
    }
    if proposal.regime() != assessment.regime() {
        return Err(format!(
            "proposal regime {} differs from classified regime {}",
            proposal.regime(),
            assessment.regime()
        ));
    }
    if proposal.action().trim().is_empty() {
        return Err("proposal action is empty".into());
    }
    fraction_in_range("position_sizing_hint", proposal.position_sizing_hint())
}

pub fn check_critique(critique: &Critique, proposal: &StrategyProposal) -> Result<(), String> {
    if !critique.verify_identity() {
        return Err(format!("critique {} does not match its content", critique.id()));
    }
    if critique.proposal_id() != proposal.id() {
        return Err(format!(
            "critique references proposal {}, expected {}",
            critique.proposal_id().short(),
            proposal.id().short()
        ));
    }
    let floor = critique
        .flags()
        .iter()
        .map(RiskFlag::severity)
        .max()
        .unwrap_or(Severity::Minor);
    if critique.severity() < floor {
        return Err(format!(
            "critique severity {} is below its own flags ({floor})",
            critique.severity()
        ));
    }
    Ok(())
}

pub fn check_decision(
    decision: &FinalDecision,
    proposal: &StrategyProposal,
    critique: &Critique,
) -> Result<(), String> {
    if !decision.verify_identity() {
        return Err(format!("decision {} does not match its content", decision.id()));
    }
    if decision.proposal_id() != proposal.id() || decision.critique_id() != critique.id() {
        return Err("decision does not reference the accepted proposal and critique".into());
    }
    if decision.final_action().trim().is_empty() {
        return Err("final action is empty".into());
    }
    fraction_in_range("position_size", decision.position_size())?;
    if critique.severity() == Severity::Critical {
        if !decision.overridden() {
            return Err("critical critique must override the proposal".into());
        }
        if decision.final_action() != STAY_IN_CASH || decision.position_size() != 0.0 {
            return Err(format!(
                "critical critique requires '{STAY_IN_CASH}' at size 0, got '{}' at {}",
                decision.final_action(),
                decision.position_size()
            ));
        }
    }
    if !decision.overridden() && decision.final_action() != proposal.action() {
        return Err(format!(
            "final action '{}' replaces '{}' without an override",
            decision.final_action(),
            proposal.action()
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{assess, ClassifierConfig};
    use crate::metrics::SmaReading;
    use chrono::NaiveDate;

    fn upstream() -> (MetricsSnapshot, RegimeAssessment) {
        let m = MetricsSnapshot::new(
            NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            250,
            110.0,
            SmaReading { period: 50, value: Some(105.0) },
            SmaReading { period: 200, value: Some(100.0) },
            Some(0.12),
            0.002,
        );
        let a = assess(&m, &ClassifierConfig::default()).unwrap();
        (m, a)
    }

    #[test]
    fn accepts_well_formed_chain() {
        let (m, a) = upstream();
        let p = StrategyProposal::new(&a, "Trend Following", "up", 1.0);
        let c = Critique::from_flags(&p, vec![]);
        let d = FinalDecision::new(&p, &c, "Trend Following", vec![], 1.0, false);
        assert!(check_proposal(&p, &a, &m).is_ok());
        assert!(check_critique(&c, &p).is_ok());
        assert!(check_decision(&d, &p, &c).is_ok());
    }

    #[test]
    fn rejects_blank_action_and_bad_sizing() {
        let (m, a) = upstream();
        let blank = StrategyProposal::new(&a, "  ", "up", 1.0);
        assert!(check_proposal(&blank, &a, &m).unwrap_err().contains("empty"));
        let oversized = StrategyProposal::new(&a, "Trend Following", "up", 1.5);
        assert!(check_proposal(&oversized, &a, &m).is_err());
        let nan = StrategyProposal::new(&a, "Trend Following", "up", f64::NAN);
        assert!(check_proposal(&nan, &a, &m).is_err());
    }

    #[test]
    fn rejects_foreign_references() {
        let (_, a) = upstream();
        let p = StrategyProposal::new(&a, "Trend Following", "up", 1.0);
        let other = StrategyProposal::new(&a, "Mean Reversion", "other", 0.5);
        let c = Critique::from_flags(&other, vec![]);
        assert!(check_critique(&c, &p).is_err());

        let d = FinalDecision::new(&other, &c, "Mean Reversion", vec![], 0.5, false);
        let own = Critique::from_flags(&p, vec![]);
        assert!(check_decision(&d, &p, &own).is_err());
    }

    #[test]
    fn rejects_understated_severity() {
        let (_, a) = upstream();
        let p = StrategyProposal::new(&a, "Trend Following", "up", 1.0);
        let c = Critique::new(
            &p,
            vec![RiskFlag::VolatilityBreach {
                volatility: 0.5,
                threshold: 0.35,
            }],
            vec!["breach".into()],
            Severity::Minor,
        );
        assert!(check_critique(&c, &p).is_err());
    }

    #[test]
    fn critical_requires_override() {
        let (_, a) = upstream();
        let p = StrategyProposal::new(&a, "Trend Following", "up", 1.0);
        let c = Critique::from_flags(
            &p,
            vec![RiskFlag::VolatilityBreach {
                volatility: 0.5,
                threshold: 0.35,
            }],
        );
        let kept = FinalDecision::new(&p, &c, "Trend Following", vec![], 1.0, false);
        assert!(check_decision(&kept, &p, &c).is_err());
        let cash = FinalDecision::new(&p, &c, STAY_IN_CASH, vec![], 0.0, true);
        assert!(check_decision(&cash, &p, &c).is_ok());
    }

    #[test]
    fn critical_override_must_go_to_cash() {
        let (_, a) = upstream();
        let p = StrategyProposal::new(&a, "Trend Following", "up", 1.0);
        let c = Critique::new(&p, vec![], vec!["tail risk".into()], Severity::Critical);

        let other_action = FinalDecision::new(&p, &c, "Buy More Calls", vec![], 1.0, true);
        let err = check_decision(&other_action, &p, &c).unwrap_err();
        assert!(err.contains(STAY_IN_CASH));

        let cash_but_sized = FinalDecision::new(&p, &c, STAY_IN_CASH, vec![], 0.5, true);
        assert!(check_decision(&cash_but_sized, &p, &c).is_err());
    }

    #[test]
    fn silent_action_change_is_rejected() {
        let (_, a) = upstream();
        let p = StrategyProposal::new(&a, "Trend Following", "up", 1.0);
        let c = Critique::from_flags(&p, vec![]);
        let d = FinalDecision::new(&p, &c, "Buy the Dip", vec![], 1.0, false);
        assert!(check_decision(&d, &p, &c).unwrap_err().contains("without an override"));
    }
}
