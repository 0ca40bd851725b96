//! Object storage module
//!
//! Blob uploads with fixed-delay retry. Firebase Storage is the default
//! backend; a local directory and (with the `native_s3` feature) S3 are
//! also available.

mod firebase;
mod local;
mod object_store;
mod scan;
mod upload;

#[cfg(feature = "native_s3")]
pub mod native_s3;

pub use firebase::*;
pub use local::*;
pub use object_store::*;
pub use scan::*;
pub use upload::*;
