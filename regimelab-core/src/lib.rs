//! RegimeLab Core — metrics, regime classification, reasoning contracts and
//! the reflexion state machine.
//!
//! This crate contains the heart of the pipeline:
//! - Domain types (price points, regimes, artifact and run identities)
//! - Metrics engine (moving averages, annualized volatility, daily return)
//! - Ordered-rule regime classifier
//! - Reasoning collaborator trait and the deterministic rule-based reasoner
//! - Reflexion machine: Measure → Classify → Propose → Critique → Adjust
//!
//! Nothing here performs I/O. Loading prices, configuration files and
//! hosted collaborators live in `regimelab-runner`.

pub mod classifier;
pub mod domain;
pub mod error;
pub mod fingerprint;
pub mod metrics;
pub mod reasoning;
pub mod reflexion;
pub mod synthetic;

pub use classifier::{assess, classify, ClassifierConfig, RegimeAssessment};
pub use domain::{ArtifactId, DatasetHash, PricePoint, Regime, RunId, VolatilityBand};
pub use error::ErrorKind;
pub use metrics::{compute_metrics, MetricsConfig, MetricsSnapshot};
pub use reasoning::{
    CollaboratorError, Critique, FinalDecision, ReasoningCollaborator, RuleBasedReasoner,
    Severity, StrategyProposal,
};
pub use reflexion::{
    DecisionTrail, FailedRun, ReflexionConfig, ReflexionMachine, RunOutcome, RunReport, RunState,
};
