//! AQL diagnostics and error handling
//!
//! This crate provides the error handling infrastructure shared by every stage of the
//! AQL compiler: error codes, source locations in the query text, and diagnostic
//! reporting.

mod error;
mod error_code;
mod span;

pub use error::*;
pub use error_code::*;
pub use span::*;

/// Result type for AQL compiler operations
pub type Result<T> = std::result::Result<T, AqlError>;
