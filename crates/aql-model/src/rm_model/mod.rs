//! Reference model metadata and its JSON representation

pub mod parser;
pub mod types;

pub use parser::*;
pub use types::*;

/// The openEHR RM subset reachable from COMPOSITION, EHR_STATUS, FOLDER and ORIGINAL_VERSION
pub const OPENEHR_RM_JSON: &str = include_str!("openehr_rm.json");
