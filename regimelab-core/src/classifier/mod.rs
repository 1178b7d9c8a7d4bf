//! Regime Classifier — maps a metrics snapshot to exactly one regime.
//!
//! Rules are evaluated in a fixed order and the first match wins:
//! 1. volatility at or above `high_vol_threshold` → HighVolatilityDistressed
//! 2. `price > sma_short > sma_long` → Bull
//! 3. `price < sma_short < sma_long` → Bear
//! 4. anything else (mixed ordering, missing SMAs) → SidewaysChoppy
//!
//! Missing history degrades to SidewaysChoppy instead of erroring; the
//! classifier always terminates with a label for a snapshot that has a price.

pub mod history;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{ArtifactId, Regime, VolatilityBand};
use crate::error::ErrorKind;
use crate::fingerprint::ContentHasher;
use crate::metrics::MetricsSnapshot;

pub use history::{regime_series, HistoryError, MaCross, RegimePoint};

/// Classifier thresholds. Supplied by the caller so they can be
/// recalibrated per asset class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassifierConfig {
    /// Annualized volatility at or above which the regime is
    /// HighVolatilityDistressed regardless of trend (default 0.35).
    pub high_vol_threshold: f64,
    /// Optional lower band edge, informational only.
    pub medium_vol_threshold: Option<f64>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            high_vol_threshold: 0.35,
            medium_vol_threshold: None,
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.high_vol_threshold.is_finite() || self.high_vol_threshold <= 0.0 {
            return Err(format!(
                "high_vol_threshold must be > 0, got {}",
                self.high_vol_threshold
            ));
        }
        if let Some(medium) = self.medium_vol_threshold {
            if !medium.is_finite() || medium <= 0.0 || medium >= self.high_vol_threshold {
                return Err(format!(
                    "medium_vol_threshold ({medium}) must be within (0, high_vol_threshold ({}))",
                    self.high_vol_threshold
                ));
            }
        }
        Ok(())
    }

    /// Band a volatility reading against the configured thresholds.
    pub fn band(&self, volatility: Option<f64>) -> VolatilityBand {
        match volatility {
            None => VolatilityBand::Unknown,
            Some(v) if v >= self.high_vol_threshold => VolatilityBand::High,
            Some(v) => match self.medium_vol_threshold {
                Some(medium) if v >= medium => VolatilityBand::Medium,
                _ => VolatilityBand::Low,
            },
        }
    }
}

/// Errors from the classifier.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClassifyError {
    #[error("incomplete metrics: snapshot {snapshot} has no usable price ({price})")]
    IncompleteMetrics { snapshot: String, price: f64 },

    #[error("invalid classifier config: {0}")]
    InvalidConfig(String),
}

impl ClassifyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClassifyError::IncompleteMetrics { .. } => ErrorKind::IncompleteMetrics,
            ClassifyError::InvalidConfig(_) => ErrorKind::InvalidConfig,
        }
    }
}

/// Which ordered rule produced the regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegimeRule {
    VolatilityOverride,
    TrendAlignedUp,
    TrendAlignedDown,
    Fallback,
}

impl RegimeRule {
    pub fn regime(&self) -> Regime {
        match self {
            RegimeRule::VolatilityOverride => Regime::HighVolatilityDistressed,
            RegimeRule::TrendAlignedUp => Regime::Bull,
            RegimeRule::TrendAlignedDown => Regime::Bear,
            RegimeRule::Fallback => Regime::SidewaysChoppy,
        }
    }
}

fn matched_rule(
    metrics: &MetricsSnapshot,
    config: &ClassifierConfig,
) -> Result<RegimeRule, ClassifyError> {
    config.validate().map_err(ClassifyError::InvalidConfig)?;

    let price = metrics.price();
    if !price.is_finite() || price <= 0.0 {
        return Err(ClassifyError::IncompleteMetrics {
            snapshot: metrics.id().short().to_string(),
            price,
        });
    }

    if let Some(vol) = metrics.volatility_annualized() {
        if vol >= config.high_vol_threshold {
            return Ok(RegimeRule::VolatilityOverride);
        }
    }

    let rule = match (metrics.sma_short(), metrics.sma_long()) {
        (Some(short), Some(long)) if price > short && short > long => RegimeRule::TrendAlignedUp,
        (Some(short), Some(long)) if price < short && short < long => {
            RegimeRule::TrendAlignedDown
        }
        _ => RegimeRule::Fallback,
    };
    Ok(rule)
}

/// Classify a snapshot. Pure: same snapshot and config, same regime.
pub fn classify(
    metrics: &MetricsSnapshot,
    config: &ClassifierConfig,
) -> Result<Regime, ClassifyError> {
    matched_rule(metrics, config).map(|rule| rule.regime())
}

/// Classify a snapshot and record the Classify stage's artifact.
pub fn assess(
    metrics: &MetricsSnapshot,
    config: &ClassifierConfig,
) -> Result<RegimeAssessment, ClassifyError> {
    let rule = matched_rule(metrics, config)?;
    Ok(RegimeAssessment::new(
        metrics,
        rule,
        config.band(metrics.volatility_annualized()),
    ))
}

/// The Classify stage's artifact: regime plus the evidence for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeAssessment {
    id: ArtifactId,
    metrics_id: ArtifactId,
    regime: Regime,
    matched_rule: RegimeRule,
    volatility_band: VolatilityBand,
}

impl RegimeAssessment {
    fn new(metrics: &MetricsSnapshot, matched_rule: RegimeRule, band: VolatilityBand) -> Self {
        let mut assessment = Self {
            id: metrics.id().clone(),
            metrics_id: metrics.id().clone(),
            regime: matched_rule.regime(),
            matched_rule,
            volatility_band: band,
        };
        assessment.id = assessment.content_id();
        assessment
    }

    fn content_id(&self) -> ArtifactId {
        let mut h = ContentHasher::new("assessment");
        h.id(&self.metrics_id)
            .text(self.regime.label())
            .text(&format!("{:?}", self.matched_rule))
            .text(&self.volatility_band.to_string());
        h.finish()
    }

    pub fn verify_identity(&self) -> bool {
        self.id == self.content_id() && self.regime == self.matched_rule.regime()
    }

    pub fn id(&self) -> &ArtifactId {
        &self.id
    }

    pub fn metrics_id(&self) -> &ArtifactId {
        &self.metrics_id
    }

    pub fn regime(&self) -> Regime {
        self.regime
    }

    pub fn matched_rule(&self) -> RegimeRule {
        self.matched_rule
    }

    pub fn volatility_band(&self) -> VolatilityBand {
        self.volatility_band
    }
}
