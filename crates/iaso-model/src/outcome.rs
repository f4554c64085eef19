//! Per-row outcomes and the run summary.

use serde::{Deserialize, Serialize};

use crate::error::RowFailure;

/// Final status of one row's upload attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    /// The platform accepted the write.
    Succeeded,
    /// Skipped by a business rule (locked instance, failed validation).
    Ignored(RowFailure),
    /// A network call failed; logged, never fatal to the batch.
    Failed(RowFailure),
}

/// Run-end counters.
///
/// Invariant: `imported + updated + ignored + deleted` equals the input row
/// count once the run finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub imported: u64,
    pub updated: u64,
    pub ignored: u64,
    pub deleted: u64,
}

impl Summary {
    pub fn total(&self) -> u64 {
        self.imported + self.updated + self.ignored + self.deleted
    }
}
