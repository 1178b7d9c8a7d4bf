//! The run loop. One run executes on the calling thread; only collaborator
//! calls with a configured timeout move onto a worker thread.

use log::{debug, info, warn};
use std::sync::Arc;

use crate::classifier::assess;
use crate::domain::{DatasetHash, PricePoint, RunId};
use crate::error::ErrorKind;
use crate::metrics::compute_metrics;
use crate::reasoning::{CollaboratorError, ReasoningCollaborator, RuleBasedReasoner};

use super::contract;
use super::timeout::call_with_timeout;
use super::{DecisionTrail, FailedRun, ReflexionConfig, RunOutcome, RunReport, RunState};

/// A stage failure before it is pinned to the stage it happened in.
struct StageFailure {
    kind: ErrorKind,
    message: String,
}

impl StageFailure {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    fn contract(message: String) -> Self {
        Self::new(ErrorKind::CollaboratorContractViolation, message)
    }
}

impl From<CollaboratorError> for StageFailure {
    fn from(e: CollaboratorError) -> Self {
        Self::new(e.kind(), e.to_string())
    }
}

/// Records the states a run passes through and rejects illegal moves.
struct Transitions<'a> {
    run: &'a str,
    trail: Vec<RunState>,
}

impl<'a> Transitions<'a> {
    fn new(run: &'a str) -> Self {
        Self {
            run,
            trail: vec![RunState::Idle],
        }
    }

    fn current(&self) -> RunState {
        self.trail.last().copied().unwrap_or(RunState::Idle)
    }

    fn advance(&mut self, next: RunState) {
        let from = self.current();
        debug_assert!(
            from.can_transition_to(next),
            "illegal transition {from} -> {next}"
        );
        debug!("run {}: {} -> {}", self.run, from, next);
        self.trail.push(next);
    }
}

/// Drives runs through the fixed pipeline with a shared collaborator.
pub struct ReflexionMachine {
    collaborator: Arc<dyn ReasoningCollaborator>,
    config: ReflexionConfig,
    fingerprint: String,
}

impl ReflexionMachine {
    pub fn new(collaborator: Arc<dyn ReasoningCollaborator>, config: ReflexionConfig) -> Self {
        let fingerprint = config.fingerprint();
        Self {
            collaborator,
            config,
            fingerprint,
        }
    }

    /// A machine using the deterministic reasoner with the classifier's own
    /// thresholds.
    pub fn rule_based(config: ReflexionConfig) -> Self {
        let reasoner = RuleBasedReasoner::new(config.classifier.clone());
        Self::new(Arc::new(reasoner), config)
    }

    pub fn config(&self) -> &ReflexionConfig {
        &self.config
    }

    pub fn collaborator_name(&self) -> &str {
        self.collaborator.name()
    }

    /// Deterministic identity of a run over `prices` at `as_of_index`.
    pub fn run_id(&self, prices: &[PricePoint], as_of_index: usize) -> RunId {
        RunId::derive(
            &DatasetHash::from_prices(prices),
            as_of_index,
            &self.fingerprint,
            self.collaborator.name(),
        )
    }

    /// Execute one run. Never panics on bad input: every failure comes back
    /// as a `Failed` outcome naming the stage.
    pub fn run(&self, prices: &[PricePoint], as_of_index: usize) -> RunReport {
        let run_id = self.run_id(prices, as_of_index);
        let mut transitions = Transitions::new(run_id.short());

        let outcome = match self.execute(prices, as_of_index, &mut transitions) {
            Ok(trail) => {
                transitions.advance(RunState::Done);
                info!(
                    "run {}: {} -> {} ({}, size {:.2}{})",
                    run_id.short(),
                    trail.assessment.regime(),
                    trail.decision.final_action(),
                    trail.critique.severity(),
                    trail.decision.position_size(),
                    if trail.decision.overridden() {
                        ", overridden"
                    } else {
                        ""
                    }
                );
                RunOutcome::Completed(trail)
            }
            Err(failure) => {
                let failed_stage = transitions.current();
                transitions.advance(RunState::Failed);
                warn!(
                    "run {} failed in {}: {} ({})",
                    run_id.short(),
                    failed_stage,
                    failure.message,
                    failure.kind
                );
                RunOutcome::Failed(FailedRun {
                    failed_stage,
                    error_kind: failure.kind,
                    message: failure.message,
                })
            }
        };

        let trail = transitions.trail;
        RunReport {
            run_id,
            trail,
            outcome,
        }
    }

    fn execute(
        &self,
        prices: &[PricePoint],
        as_of_index: usize,
        transitions: &mut Transitions<'_>,
    ) -> Result<DecisionTrail, StageFailure> {
        transitions.advance(RunState::Measuring);
        let metrics = compute_metrics(prices, as_of_index, &self.config.metrics)
            .map_err(|e| StageFailure::new(e.kind(), e.to_string()))?;

        transitions.advance(RunState::Classifying);
        let assessment = assess(&metrics, &self.config.classifier)
            .map_err(|e| StageFailure::new(e.kind(), e.to_string()))?;

        transitions.advance(RunState::Proposing);
        let proposal = {
            let (a, m) = (assessment.clone(), metrics.clone());
            self.consult(move |c| c.propose(&a, &m))?
        };
        contract::check_proposal(&proposal, &assessment, &metrics)
            .map_err(StageFailure::contract)?;

        transitions.advance(RunState::Critiquing);
        let critique = {
            let (p, m) = (proposal.clone(), metrics.clone());
            self.consult(move |c| c.critique(&p, &m))?
        };
        contract::check_critique(&critique, &proposal).map_err(StageFailure::contract)?;

        transitions.advance(RunState::Adjusting);
        let decision = {
            let (p, cr, m) = (proposal.clone(), critique.clone(), metrics.clone());
            self.consult(move |c| c.adjust(&p, &cr, &m))?
        };
        contract::check_decision(&decision, &proposal, &critique)
            .map_err(StageFailure::contract)?;

        Ok(DecisionTrail {
            metrics,
            assessment,
            proposal,
            critique,
            decision,
        })
    }

    fn consult<T, F>(&self, call: F) -> Result<T, StageFailure>
    where
        T: Send + 'static,
        F: FnOnce(&dyn ReasoningCollaborator) -> Result<T, CollaboratorError> + Send + 'static,
    {
        let collaborator = Arc::clone(&self.collaborator);
        call_with_timeout(self.config.collaborator_timeout, move || {
            call(collaborator.as_ref())
        })
        .map_err(StageFailure::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::RegimeAssessment;
    use crate::metrics::{make_prices, MetricsSnapshot};
    use crate::reasoning::{Critique, FinalDecision, Severity, StrategyProposal};
    use std::time::Duration;

    fn rising(n: usize) -> Vec<PricePoint> {
        let closes: Vec<f64> = (0..n).map(|i| 100.0 + i as f64 * 0.5).collect();
        make_prices(&closes)
    }

    /// Delegates to the rule-based reasoner, then damages one stage.
    struct Faulty {
        inner: RuleBasedReasoner,
        fault: Fault,
    }

    enum Fault {
        EmptyFinalAction,
        /// Flags a critical risk, then stays invested under an override.
        CriticalButInvested,
        Unreachable,
        Slow(Duration),
    }

    impl ReasoningCollaborator for Faulty {
        fn name(&self) -> &str {
            "faulty"
        }

        fn propose(
            &self,
            assessment: &RegimeAssessment,
            metrics: &MetricsSnapshot,
        ) -> Result<StrategyProposal, CollaboratorError> {
            match self.fault {
                Fault::Unreachable => Err(CollaboratorError::Unavailable("connection refused".into())),
                Fault::Slow(d) => {
                    std::thread::sleep(d);
                    self.inner.propose(assessment, metrics)
                }
                Fault::EmptyFinalAction | Fault::CriticalButInvested => {
                    self.inner.propose(assessment, metrics)
                }
            }
        }

        fn critique(
            &self,
            proposal: &StrategyProposal,
            metrics: &MetricsSnapshot,
        ) -> Result<Critique, CollaboratorError> {
            match self.fault {
                Fault::CriticalButInvested => Ok(Critique::new(
                    proposal,
                    vec![],
                    vec!["liquidity is drying up".into()],
                    Severity::Critical,
                )),
                _ => self.inner.critique(proposal, metrics),
            }
        }

        fn adjust(
            &self,
            proposal: &StrategyProposal,
            critique: &Critique,
            metrics: &MetricsSnapshot,
        ) -> Result<FinalDecision, CollaboratorError> {
            match self.fault {
                Fault::EmptyFinalAction => Ok(FinalDecision::new(
                    proposal,
                    critique,
                    "",
                    vec![],
                    proposal.position_sizing_hint(),
                    false,
                )),
                Fault::CriticalButInvested => Ok(FinalDecision::new(
                    proposal,
                    critique,
                    "Buy More Calls",
                    vec![],
                    1.0,
                    true,
                )),
                _ => self.inner.adjust(proposal, critique, metrics),
            }
        }
    }

    fn faulty(fault: Fault, timeout: Option<Duration>) -> ReflexionMachine {
        let config = ReflexionConfig {
            collaborator_timeout: timeout,
            ..ReflexionConfig::default()
        };
        ReflexionMachine::new(
            Arc::new(Faulty {
                inner: RuleBasedReasoner::default(),
                fault,
            }),
            config,
        )
    }

    #[test]
    fn completed_run_visits_every_state() {
        let machine = ReflexionMachine::rule_based(ReflexionConfig::default());
        let report = machine.run(&rising(260), 259);
        assert!(report.is_completed());
        assert_eq!(
            report.trail,
            vec![
                RunState::Idle,
                RunState::Measuring,
                RunState::Classifying,
                RunState::Proposing,
                RunState::Critiquing,
                RunState::Adjusting,
                RunState::Done,
            ]
        );
        assert!(report.decision_trail().unwrap().is_linked());
    }

    #[test]
    fn index_zero_fails_in_measuring() {
        let machine = ReflexionMachine::rule_based(ReflexionConfig::default());
        let report = machine.run(&rising(10), 0);
        let failed = report.failure().unwrap();
        assert_eq!(failed.failed_stage, RunState::Measuring);
        assert_eq!(failed.error_kind, ErrorKind::InsufficientHistory);
        assert_eq!(report.final_state(), RunState::Failed);
    }

    #[test]
    fn contract_violation_fails_in_adjusting() {
        let report = faulty(Fault::EmptyFinalAction, None).run(&rising(260), 259);
        let failed = report.failure().unwrap();
        assert_eq!(failed.failed_stage, RunState::Adjusting);
        assert_eq!(failed.error_kind, ErrorKind::CollaboratorContractViolation);
        assert!(report.decision_trail().is_none());
    }

    #[test]
    fn critical_critique_not_moved_to_cash_is_rejected() {
        let report = faulty(Fault::CriticalButInvested, None).run(&rising(260), 259);
        let failed = report.failure().unwrap();
        assert_eq!(failed.failed_stage, RunState::Adjusting);
        assert_eq!(failed.error_kind, ErrorKind::CollaboratorContractViolation);
        assert!(failed.message.contains("Stay in Cash"));
    }

    #[test]
    fn unavailable_collaborator_fails_in_proposing() {
        let report = faulty(Fault::Unreachable, None).run(&rising(260), 259);
        let failed = report.failure().unwrap();
        assert_eq!(failed.failed_stage, RunState::Proposing);
        assert_eq!(failed.error_kind, ErrorKind::CollaboratorUnavailable);
        assert!(failed.message.contains("connection refused"));
    }

    #[test]
    fn slow_collaborator_times_out() {
        let machine = faulty(
            Fault::Slow(Duration::from_millis(300)),
            Some(Duration::from_millis(20)),
        );
        let report = machine.run(&rising(260), 259);
        let failed = report.failure().unwrap();
        assert_eq!(failed.failed_stage, RunState::Proposing);
        assert_eq!(failed.error_kind, ErrorKind::CollaboratorTimeout);
        assert_eq!(
            report.trail,
            vec![
                RunState::Idle,
                RunState::Measuring,
                RunState::Classifying,
                RunState::Proposing,
                RunState::Failed,
            ]
        );
    }

    #[test]
    fn generous_timeout_still_completes() {
        let machine = faulty(
            Fault::Slow(Duration::from_millis(1)),
            Some(Duration::from_secs(10)),
        );
        assert!(machine.run(&rising(260), 259).is_completed());
    }

    #[test]
    fn run_id_depends_on_collaborator() {
        let prices = rising(260);
        let a = ReflexionMachine::rule_based(ReflexionConfig::default());
        let b = faulty(Fault::Unreachable, None);
        assert_ne!(a.run_id(&prices, 259), b.run_id(&prices, 259));
        assert_eq!(a.run_id(&prices, 259), a.run(&prices, 259).run_id);
    }
}
