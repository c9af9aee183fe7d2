//! CLI functionality for the AQL compiler
//!
//! This module contains all CLI-related functionality including:
//! - Compilation to SQL
//! - Path cohesion analysis
//! - Query checking
//! - Output formatting
//! - Log setup

#[cfg(feature = "cli")]
pub mod analyze;
#[cfg(feature = "cli")]
pub mod check;
#[cfg(feature = "cli")]
pub mod compile;
#[cfg(feature = "cli")]
pub mod logging;
#[cfg(feature = "cli")]
pub mod output;
#[cfg(feature = "cli")]
pub mod source;
