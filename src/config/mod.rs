//! Configuration module
//!
//! CLI arguments, the optional JSON config file, and the merged runtime
//! settings the commands run with.

mod settings;

pub use settings::*;
