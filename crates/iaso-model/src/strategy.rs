//! Import strategy selection and per-row routing.
//!
//! Classification runs strictly before validation so the validator checks
//! the required-column set of the action actually taken, not the pipeline
//! strategy as a whole.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RowFailure;
use crate::row::{COL_ID, COL_INSTANCE_ID, COL_ORG_UNIT_ID, Row};

/// Pipeline-level import strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportStrategy {
    Create,
    Update,
    CreateAndUpdate,
    Delete,
}

impl fmt::Display for ImportStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImportStrategy::Create => "CREATE",
            ImportStrategy::Update => "UPDATE",
            ImportStrategy::CreateAndUpdate => "CREATE_AND_UPDATE",
            ImportStrategy::Delete => "DELETE",
        };
        write!(f, "{name}")
    }
}

/// What the pipeline does with one row.
///
/// Closed variant: adding a strategy means extending this enum and every
/// match on it.
#[derive(Debug, Clone, PartialEq)]
pub enum RowAction {
    Create,
    Update { id: i64, instance_uuid: String },
    Delete { id: i64 },
    Ignored(RowFailure),
}

/// Classify one row under the pipeline strategy.
///
/// Pure and idempotent: repeated classification of the same row yields the
/// same action.
pub fn classify(row: &Row, strategy: ImportStrategy) -> RowAction {
    match strategy {
        ImportStrategy::Create => {
            if row.org_unit_id().is_some() {
                RowAction::Create
            } else {
                RowAction::Ignored(RowFailure::missing_column(COL_ORG_UNIT_ID))
            }
        }
        ImportStrategy::Update => classify_update(row),
        ImportStrategy::CreateAndUpdate => {
            if row.has_value(COL_ID) {
                classify_update(row)
            } else if row.org_unit_id().is_some() {
                RowAction::Create
            } else {
                RowAction::Ignored(RowFailure::missing_column(COL_ORG_UNIT_ID))
            }
        }
        ImportStrategy::Delete => match row.id() {
            Some(id) => RowAction::Delete { id },
            None => RowAction::Ignored(RowFailure::missing_column(COL_ID)),
        },
    }
}

fn classify_update(row: &Row) -> RowAction {
    let Some(id) = row.id() else {
        return RowAction::Ignored(RowFailure::missing_column(COL_ID));
    };
    let Some(instance_uuid) = row.instance_uuid() else {
        return RowAction::Ignored(RowFailure::missing_column(COL_INSTANCE_ID));
    };
    RowAction::Update { id, instance_uuid }
}
