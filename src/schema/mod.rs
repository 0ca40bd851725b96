//! Collection schema module
//!
//! Declarative descriptions of the security-reporting collections: which
//! CSV columns they accept, how each column is typed, and which columns
//! identify a record. Built-in presets cover the standard report types.

mod collection;
mod field;
mod presets;

pub use collection::*;
pub use field::*;
pub use presets::*;
