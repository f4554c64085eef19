pub mod cell;
pub mod error;
pub mod form;
pub mod outcome;
pub mod row;
pub mod strategy;

pub use cell::CellValue;
pub use error::{ImportError, Result, RowFailure};
pub use form::{Choice, FormInfo, FormModel, FormVersion, Question, QuestionType};
pub use outcome::{Summary, UploadOutcome};
pub use row::{Row, RowSet};
pub use strategy::{ImportStrategy, RowAction, classify};
