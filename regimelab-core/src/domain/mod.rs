//! Domain types for RegimeLab

pub mod ids;
pub mod price;
pub mod regime;

pub use ids::{ArtifactId, DatasetHash, RunId};
pub use price::PricePoint;
pub use regime::{Regime, VolatilityBand};
