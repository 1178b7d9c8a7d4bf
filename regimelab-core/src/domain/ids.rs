use serde::{Deserialize, Serialize};
use std::fmt;

use super::PricePoint;
use crate::fingerprint::ContentHasher;

const SHORT_LEN: usize = 12;

/// Leading characters of an id. Ids read back from disk may hold any text.
fn prefix(id: &str) -> &str {
    match id.char_indices().nth(SHORT_LEN) {
        Some((cut, _)) => &id[..cut],
        None => id,
    }
}

/// Content-addressed identity of a pipeline artifact.
///
/// Derived from the artifact's content (BLAKE3), so two artifacts with the
/// same content share an id and any edit to an artifact changes its id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(String);

impl ArtifactId {
    pub(crate) fn from_hex(hex: String) -> Self {
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for log lines and directory names.
    pub fn short(&self) -> &str {
        prefix(&self.0)
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deterministic dataset hash (content hash of a price series).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetHash(pub String);

impl DatasetHash {
    /// BLAKE3 over every date and close, in series order.
    pub fn from_prices(prices: &[PricePoint]) -> Self {
        let mut hasher = ContentHasher::new("dataset");
        hasher.count(prices.len() as u64);
        for point in prices {
            hasher.date(point.date).number(point.close);
        }
        Self(hasher.finish_hex())
    }

    pub fn short(&self) -> &str {
        prefix(&self.0)
    }
}

impl fmt::Display for DatasetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deterministic run id (dataset + as-of index + configuration + collaborator).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn derive(
        dataset: &DatasetHash,
        as_of_index: usize,
        config_fingerprint: &str,
        collaborator: &str,
    ) -> Self {
        let mut hasher = ContentHasher::new("run");
        hasher
            .text(&dataset.0)
            .count(as_of_index as u64)
            .text(config_fingerprint)
            .text(collaborator);
        Self(hasher.finish_hex())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short(&self) -> &str {
        prefix(&self.0)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
