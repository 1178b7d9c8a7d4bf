//! Reasoning collaborator interface — the typed contract for the Propose,
//! Critique and Adjust stages.
//!
//! The reflexion machine only depends on [`ReasoningCollaborator`]; how an
//! implementation reasons (fixed rules, a hosted language model, a human in
//! the loop) is its own business. Implementations must be `Send + Sync` so
//! a single collaborator can be shared across concurrent runs.

pub mod artifacts;
pub mod rule_based;

use std::time::Duration;
use thiserror::Error;

use crate::classifier::RegimeAssessment;
use crate::error::ErrorKind;
use crate::metrics::MetricsSnapshot;

pub use artifacts::{
    Critique, FinalDecision, MissingInput, RiskFlag, Severity, StrategyProposal, STAY_IN_CASH,
};
pub use rule_based::{playbook, risk_flags, Playbook, RuleBasedReasoner};

/// Failure of a single collaborator call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CollaboratorError {
    #[error("collaborator did not answer within {0:?}")]
    Timeout(Duration),

    #[error("collaborator contract violation: {0}")]
    ContractViolation(String),

    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
}

impl CollaboratorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CollaboratorError::Timeout(_) => ErrorKind::CollaboratorTimeout,
            CollaboratorError::ContractViolation(_) => ErrorKind::CollaboratorContractViolation,
            CollaboratorError::Unavailable(_) => ErrorKind::CollaboratorUnavailable,
        }
    }
}

/// The three capabilities the reflexion machine needs from a reasoner.
///
/// Each call receives the upstream artifacts by reference and must build
/// its artifact through that artifact's constructor, which records the
/// upstream identities.
pub trait ReasoningCollaborator: Send + Sync {
    /// Short stable name, folded into the run id.
    fn name(&self) -> &str;

    fn propose(
        &self,
        assessment: &RegimeAssessment,
        metrics: &MetricsSnapshot,
    ) -> Result<StrategyProposal, CollaboratorError>;

    fn critique(
        &self,
        proposal: &StrategyProposal,
        metrics: &MetricsSnapshot,
    ) -> Result<Critique, CollaboratorError>;

    fn adjust(
        &self,
        proposal: &StrategyProposal,
        critique: &Critique,
        metrics: &MetricsSnapshot,
    ) -> Result<FinalDecision, CollaboratorError>;
}
