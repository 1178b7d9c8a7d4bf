//! Regime labels and volatility banding.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Discrete market regime. Exactly one per metrics snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    Bull,
    Bear,
    SidewaysChoppy,
    HighVolatilityDistressed,
}

impl Regime {
    pub const ALL: [Regime; 4] = [
        Regime::Bull,
        Regime::Bear,
        Regime::SidewaysChoppy,
        Regime::HighVolatilityDistressed,
    ];

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Regime::Bull => "Bull",
            Regime::Bear => "Bear",
            Regime::SidewaysChoppy => "Sideways/Choppy",
            Regime::HighVolatilityDistressed => "High-Volatility Distressed",
        }
    }

    /// Whether this regime describes a directional trend.
    pub fn is_trending(&self) -> bool {
        matches!(self, Regime::Bull | Regime::Bear)
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Informational volatility band. Never changes the regime on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityBand {
    /// Volatility not yet computable (too few returns).
    Unknown,
    Low,
    /// At or above the medium threshold, below the high threshold.
    Medium,
    High,
}

impl fmt::Display for VolatilityBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VolatilityBand::Unknown => "unknown",
            VolatilityBand::Low => "low",
            VolatilityBand::Medium => "medium",
            VolatilityBand::High => "high",
        };
        f.write_str(s)
    }
}
