//! Progress reporting module
//!
//! Terminal progress bars for bulk submission and uploads, with item
//! counts, byte throughput and ETA.

mod reporter;

pub use reporter::*;
