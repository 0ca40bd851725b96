//! CSV ingestion module
//!
//! Parses delimited-text exports, validates rows against a collection
//! schema, and pages/sorts/selects over the result.

mod parser;
mod row;
mod table;
mod validate;

pub use parser::*;
pub use row::*;
pub use table::*;
pub use validate::*;
