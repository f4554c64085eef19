pub mod calculate;
pub mod constraints;
pub mod schema;

pub use calculate::fill_calculated_columns;
pub use constraints::{CompiledConstraint, ConstraintSet};
pub use schema::{StructureReport, apply_question_casts, check_structure, validate_row_schema};
