//! Record submission to the dashboard API
//!
//! A [`RecordSink`] abstracts the REST collection endpoints; the bulk
//! submitter drives it one row at a time.

mod batch;
mod rest;
mod sink;

pub use batch::*;
pub use rest::*;
pub use sink::*;
