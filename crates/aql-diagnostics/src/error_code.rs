//! AQL compiler error codes following a structured numbering system
//!
//! Error code ranges:
//! - AQL0001-AQL0099: Parse errors (syntax, parameters)
//! - AQL0100-AQL0199: Semantic errors (paths, identifiers, unsupported features)
//! - AQL0200-AQL0299: Internal plan errors (violated plan invariants)
//! - AQL0300-AQL0399: Model errors (RM metadata, knowledge cache)
//! - AQL0400-AQL0499: System errors (I/O, configuration)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Error code identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorCode(u16);

impl ErrorCode {
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    pub const fn code(&self) -> u16 {
        self.0
    }

    /// Get error information for this code
    pub fn info(&self) -> &'static ErrorInfo {
        ERROR_INFO.get(&self.0).unwrap_or(&UNKNOWN_ERROR)
    }

    /// Check if this is a parse error (0001-0099)
    pub const fn is_parse_error(&self) -> bool {
        self.0 >= 1 && self.0 < 100
    }

    /// Check if this is a semantic error (0100-0199)
    pub const fn is_semantic_error(&self) -> bool {
        self.0 >= 100 && self.0 < 200
    }

    /// Check if this is an internal plan error (0200-0299)
    pub const fn is_internal_error(&self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    /// Check if this is a model error (0300-0399)
    pub const fn is_model_error(&self) -> bool {
        self.0 >= 300 && self.0 < 400
    }

    /// Check if this is a system error (0400-0499)
    pub const fn is_system_error(&self) -> bool {
        self.0 >= 400 && self.0 < 500
    }

    /// Errors the query author can fix by changing the query
    pub const fn is_user_facing(&self) -> bool {
        self.is_parse_error() || self.is_semantic_error()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AQL{:04}", self.0)
    }
}

/// Information about an error code
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    /// Short description of the error
    pub description: &'static str,
    /// Detailed help text
    pub help: Option<&'static str>,
}

impl ErrorInfo {
    const fn new(description: &'static str) -> Self {
        Self {
            description,
            help: None,
        }
    }

    const fn with_help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }
}

static UNKNOWN_ERROR: ErrorInfo = ErrorInfo::new("Unknown error");

static ERROR_INFO: LazyLock<HashMap<u16, ErrorInfo>> = LazyLock::new(|| {
    let mut map = HashMap::new();

    // Parse errors (0001-0099)
    map.insert(1, ErrorInfo::new("Unexpected token"));
    map.insert(2, ErrorInfo::new("Unexpected end of input"));
    map.insert(3, ErrorInfo::new("Invalid identifier"));
    map.insert(4, ErrorInfo::new("Invalid literal"));
    map.insert(5, ErrorInfo::new("Unterminated string literal"));
    map.insert(6, ErrorInfo::new("Invalid path expression"));
    map.insert(7, ErrorInfo::new("Invalid predicate"));
    map.insert(8, ErrorInfo::new("Invalid containment expression"));
    map.insert(
        9,
        ErrorInfo::new("Missing parameter")
            .with_help("Every $parameter used in the query must be supplied with the request"),
    );
    map.insert(10, ErrorInfo::new("Invalid parameter value"));

    // Semantic errors (0100-0199)
    map.insert(
        100,
        ErrorInfo::new("Unknown attribute")
            .with_help("The attribute is not declared on any reference model type"),
    );
    map.insert(
        101,
        ErrorInfo::new("Path not valid")
            .with_help("No reference model type along the path declares the attribute"),
    );
    map.insert(102, ErrorInfo::new("Unknown identifier"));
    map.insert(103, ErrorInfo::new("Duplicate identifier"));
    map.insert(104, ErrorInfo::new("Incompatible node types"));
    map.insert(105, ErrorInfo::new("Invalid LIKE pattern"));
    map.insert(106, ErrorInfo::new("Unsupported feature"));
    map.insert(107, ErrorInfo::new("Limit exceeded"));
    map.insert(108, ErrorInfo::new("Invalid fetch/offset"));
    map.insert(109, ErrorInfo::new("Operator not supported on ordered data value"));
    map.insert(110, ErrorInfo::new("Invalid archetype id"));

    // Internal plan errors (0200-0299)
    map.insert(200, ErrorInfo::new("Internal plan error"));
    map.insert(201, ErrorInfo::new("Field not found for owner"));
    map.insert(202, ErrorInfo::new("Unexpected node category"));
    map.insert(203, ErrorInfo::new("Internal node without children"));

    // Model errors (0300-0399)
    map.insert(300, ErrorInfo::new("Unknown RM type"));
    map.insert(301, ErrorInfo::new("RM model could not be loaded"));
    map.insert(302, ErrorInfo::new("Unknown template"));

    // System errors (0400-0499)
    map.insert(400, ErrorInfo::new("Configuration error"));
    map.insert(401, ErrorInfo::new("I/O error"));

    map
});

// Parse errors
pub const AQL0001: ErrorCode = ErrorCode::new(1);
pub const AQL0002: ErrorCode = ErrorCode::new(2);
pub const AQL0003: ErrorCode = ErrorCode::new(3);
pub const AQL0004: ErrorCode = ErrorCode::new(4);
pub const AQL0005: ErrorCode = ErrorCode::new(5);
pub const AQL0006: ErrorCode = ErrorCode::new(6);
pub const AQL0007: ErrorCode = ErrorCode::new(7);
pub const AQL0008: ErrorCode = ErrorCode::new(8);
pub const AQL0009: ErrorCode = ErrorCode::new(9);
pub const AQL0010: ErrorCode = ErrorCode::new(10);

// Semantic errors
pub const AQL0100: ErrorCode = ErrorCode::new(100);
pub const AQL0101: ErrorCode = ErrorCode::new(101);
pub const AQL0102: ErrorCode = ErrorCode::new(102);
pub const AQL0103: ErrorCode = ErrorCode::new(103);
pub const AQL0104: ErrorCode = ErrorCode::new(104);
pub const AQL0105: ErrorCode = ErrorCode::new(105);
pub const AQL0106: ErrorCode = ErrorCode::new(106);
pub const AQL0107: ErrorCode = ErrorCode::new(107);
pub const AQL0108: ErrorCode = ErrorCode::new(108);
pub const AQL0109: ErrorCode = ErrorCode::new(109);
pub const AQL0110: ErrorCode = ErrorCode::new(110);

// Internal plan errors
pub const AQL0200: ErrorCode = ErrorCode::new(200);
pub const AQL0201: ErrorCode = ErrorCode::new(201);
pub const AQL0202: ErrorCode = ErrorCode::new(202);
pub const AQL0203: ErrorCode = ErrorCode::new(203);

// Model errors
pub const AQL0300: ErrorCode = ErrorCode::new(300);
pub const AQL0301: ErrorCode = ErrorCode::new(301);
pub const AQL0302: ErrorCode = ErrorCode::new(302);

// System errors
pub const AQL0400: ErrorCode = ErrorCode::new(400);
pub const AQL0401: ErrorCode = ErrorCode::new(401);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_display() {
        assert_eq!(AQL0001.to_string(), "AQL0001");
        assert_eq!(AQL0101.to_string(), "AQL0101");
    }

    #[test]
    fn test_error_categories() {
        assert!(AQL0009.is_parse_error());
        assert!(AQL0106.is_semantic_error());
        assert!(AQL0203.is_internal_error());
        assert!(AQL0300.is_model_error());
        assert!(AQL0401.is_system_error());

        assert!(AQL0101.is_user_facing());
        assert!(!AQL0200.is_user_facing());
    }

    #[test]
    fn test_error_info() {
        assert_eq!(AQL0101.info().description, "Path not valid");
        assert!(AQL0009.info().help.is_some());
        assert_eq!(ErrorCode::new(999).info().description, "Unknown error");
    }
}
