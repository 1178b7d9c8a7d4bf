//! Reflexion state machine — Measure → Classify → Propose → Critique →
//! Adjust over a single price series.
//!
//! Every stage consumes the previous stage's artifact and produces exactly
//! one new artifact. A run either completes with all five artifacts or
//! fails at one stage and keeps none of them.

pub mod contract;
pub mod machine;
pub mod timeout;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::classifier::{ClassifierConfig, RegimeAssessment};
use crate::domain::{ArtifactId, RunId};
use crate::error::ErrorKind;
use crate::fingerprint::ContentHasher;
use crate::metrics::{MetricsConfig, MetricsSnapshot};
use crate::reasoning::{Critique, FinalDecision, StrategyProposal};

pub use machine::ReflexionMachine;
pub use timeout::call_with_timeout;

/// Position of a run in the fixed pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunState {
    Idle,
    Measuring,
    Classifying,
    Proposing,
    Critiquing,
    Adjusting,
    Done,
    Failed,
}

impl RunState {
    /// The only state a successful stage may advance to.
    pub fn successor(&self) -> Option<RunState> {
        match self {
            RunState::Idle => Some(RunState::Measuring),
            RunState::Measuring => Some(RunState::Classifying),
            RunState::Classifying => Some(RunState::Proposing),
            RunState::Proposing => Some(RunState::Critiquing),
            RunState::Critiquing => Some(RunState::Adjusting),
            RunState::Adjusting => Some(RunState::Done),
            RunState::Done | RunState::Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }

    /// States that invoke a component and can therefore fail.
    pub fn is_stage(&self) -> bool {
        !matches!(self, RunState::Idle) && !self.is_terminal()
    }

    pub fn can_transition_to(&self, next: RunState) -> bool {
        self.successor() == Some(next) || (next == RunState::Failed && self.is_stage())
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Thresholds and limits for one machine. Shared read-only across runs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReflexionConfig {
    pub metrics: MetricsConfig,
    pub classifier: ClassifierConfig,
    /// Upper bound on each collaborator call. `None` waits indefinitely.
    pub collaborator_timeout: Option<Duration>,
}

impl ReflexionConfig {
    /// Hash of everything that can change a run's artifacts.
    ///
    /// The collaborator timeout is left out: it decides whether a run
    /// finishes, not what it produces.
    pub fn fingerprint(&self) -> String {
        let m = &self.metrics;
        let c = &self.classifier;
        let mut h = ContentHasher::new("reflexion-config");
        h.count(m.sma_short as u64)
            .count(m.sma_long as u64)
            .count(m.trailing_window_days as u64)
            .count(m.min_volatility_returns as u64)
            .number(c.high_vol_threshold)
            .maybe_number(c.medium_vol_threshold);
        h.finish_hex()
    }
}

/// Why and where a run stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedRun {
    pub failed_stage: RunState,
    pub error_kind: ErrorKind,
    pub message: String,
}

/// The five artifacts of a completed run, in production order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTrail {
    pub metrics: MetricsSnapshot,
    pub assessment: RegimeAssessment,
    pub proposal: StrategyProposal,
    pub critique: Critique,
    pub decision: FinalDecision,
}

impl DecisionTrail {
    /// `(stage, id)` pairs in production order.
    pub fn artifact_ids(&self) -> [(RunState, &ArtifactId); 5] {
        [
            (RunState::Measuring, self.metrics.id()),
            (RunState::Classifying, self.assessment.id()),
            (RunState::Proposing, self.proposal.id()),
            (RunState::Critiquing, self.critique.id()),
            (RunState::Adjusting, self.decision.id()),
        ]
    }

    /// Every artifact matches its content and references its predecessors.
    pub fn is_linked(&self) -> bool {
        self.metrics.verify_identity()
            && self.assessment.verify_identity()
            && self.proposal.verify_identity()
            && self.critique.verify_identity()
            && self.decision.verify_identity()
            && self.assessment.metrics_id() == self.metrics.id()
            && self.proposal.assessment_id() == self.assessment.id()
            && self.proposal.metrics_id() == self.metrics.id()
            && self.critique.proposal_id() == self.proposal.id()
            && self.decision.proposal_id() == self.proposal.id()
            && self.decision.critique_id() == self.critique.id()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed(DecisionTrail),
    Failed(FailedRun),
}

/// Result of one machine run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    /// Every state the run passed through, starting at `Idle`.
    pub trail: Vec<RunState>,
    pub outcome: RunOutcome,
}

impl RunReport {
    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, RunOutcome::Completed(_))
    }

    pub fn decision_trail(&self) -> Option<&DecisionTrail> {
        match &self.outcome {
            RunOutcome::Completed(trail) => Some(trail),
            RunOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&FailedRun> {
        match &self.outcome {
            RunOutcome::Completed(_) => None,
            RunOutcome::Failed(failed) => Some(failed),
        }
    }

    pub fn final_state(&self) -> RunState {
        self.trail.last().copied().unwrap_or(RunState::Idle)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
