//! Line item extraction: cell alignment, row parsing and field rules.

mod align;
mod parser;
pub mod rules;

pub use align::CellAligner;
pub use parser::{ParsedRows, RowOutcome, RowParser};
