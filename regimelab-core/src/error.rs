//! Error taxonomy shared by every pipeline stage.
//!
//! Each layer keeps its own `thiserror` enum; `ErrorKind` is the flat,
//! serializable classification that ends up in a failed run record.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// A close that is zero, negative or non-finite.
    InvalidPrice,
    /// Daily return requested at index 0.
    InsufficientHistory,
    /// `as_of_index` outside the supplied series.
    IndexOutOfRange,
    /// Dates not strictly increasing.
    NonChronological,
    /// Metrics or classifier thresholds out of their valid ranges.
    InvalidConfig,
    /// The snapshot handed to the classifier has no usable price.
    IncompleteMetrics,
    /// The reasoning collaborator exceeded its deadline.
    CollaboratorTimeout,
    /// The reasoning collaborator returned a structurally invalid artifact.
    CollaboratorContractViolation,
    /// The reasoning collaborator could not be reached.
    CollaboratorUnavailable,
}

impl ErrorKind {
    /// Structural errors indicate bad input; retrying the same run cannot help.
    pub fn is_structural(&self) -> bool {
        !matches!(
            self,
            ErrorKind::CollaboratorTimeout | ErrorKind::CollaboratorUnavailable
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
