//! RM type names referenced by the compiler

pub const EHR: &str = "EHR";
pub const EHR_STATUS: &str = "EHR_STATUS";
pub const COMPOSITION: &str = "COMPOSITION";
pub const FOLDER: &str = "FOLDER";
pub const VERSION: &str = "VERSION";
pub const ORIGINAL_VERSION: &str = "ORIGINAL_VERSION";
pub const AUDIT_DETAILS: &str = "AUDIT_DETAILS";
pub const ELEMENT: &str = "ELEMENT";
pub const DV_ORDERED: &str = "DV_ORDERED";

/// Prefix of openEHR archetype ids
pub const ARCHETYPE_PREFIX: &str = "openEHR-EHR-";
