//! AQL compiler error types

use crate::{AQL0001, AQL0200, AQL0300, ErrorCode, SourceLocation, Span};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// The query cannot be compiled
    Error,
    /// The query compiles but may not do what the author expects
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A diagnostic message with location and help
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: ErrorCode,
    pub message: String,
    pub location: Option<SourceLocation>,
    pub help: Option<String>,
}

impl Diagnostic {
    /// Create a new error diagnostic
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
            location: None,
            help: code.info().help.map(str::to_string),
        }
    }

    /// Create a new warning diagnostic
    pub fn warning(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, message)
        }
    }

    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} - {}", self.severity, self.code, self.message)?;
        if let Some(loc) = &self.location {
            write!(f, " at {}", loc)?;
        }
        Ok(())
    }
}

/// Main AQL compiler error type
#[derive(Debug, Clone, Error)]
pub enum AqlError {
    /// The query text could not be parsed
    #[error("{code}: {message}")]
    Parse {
        code: ErrorCode,
        message: String,
        query: String,
        location: Option<SourceLocation>,
        context: Option<String>,
    },

    /// The query is syntactically valid but cannot be compiled
    /// (invalid paths, unknown identifiers, unsupported features)
    #[error("{code}: {message}")]
    Semantic {
        code: ErrorCode,
        message: String,
        location: Option<SourceLocation>,
        context: Option<String>,
    },

    /// RM metadata or knowledge cache problem
    #[error("{code}: {message}")]
    Model {
        code: ErrorCode,
        message: String,
        rm_type: Option<String>,
        context: Option<String>,
    },

    /// A plan invariant was violated; never caused by the query author
    #[error("{code}: {message}")]
    Internal {
        code: ErrorCode,
        message: String,
        context: Option<String>,
    },

    /// I/O or configuration error
    #[error("{code}: {message}")]
    System {
        code: ErrorCode,
        message: String,
        context: Option<String>,
    },

    /// Multiple errors collected
    #[error("Multiple errors: {}", .0.len())]
    Multiple(Vec<AqlError>),
}

impl AqlError {
    /// Create a parse error
    pub fn parse(code: ErrorCode, message: impl Into<String>, query: impl Into<String>) -> Self {
        Self::Parse {
            code,
            message: message.into(),
            query: query.into(),
            location: None,
            context: None,
        }
    }

    /// Create a parse error pointing at a position in the query
    pub fn parse_at(
        code: ErrorCode,
        message: impl Into<String>,
        query: impl Into<String>,
        location: SourceLocation,
    ) -> Self {
        Self::Parse {
            code,
            message: message.into(),
            query: query.into(),
            location: Some(location),
            context: None,
        }
    }

    /// Create a semantic error
    pub fn semantic(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Semantic {
            code,
            message: message.into(),
            location: None,
            context: None,
        }
    }

    /// Create a model error
    pub fn model(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Model {
            code,
            message: message.into(),
            rm_type: None,
            context: None,
        }
    }

    /// Create a model error about a specific RM type
    pub fn unknown_rm_type(rm_type: impl Into<String>) -> Self {
        let rm_type = rm_type.into();
        Self::Model {
            code: AQL0300,
            message: format!("Unknown RM type: {rm_type}"),
            rm_type: Some(rm_type),
            context: None,
        }
    }

    /// Create an internal plan error
    pub fn internal(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Internal {
            code,
            message: message.into(),
            context: None,
        }
    }

    /// Shorthand for the generic internal plan error
    pub fn plan(message: impl Into<String>) -> Self {
        Self::internal(AQL0200, message)
    }

    /// Create a system error
    pub fn system(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::System {
            code,
            message: message.into(),
            context: None,
        }
    }

    /// Get the error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Parse { code, .. } => *code,
            Self::Semantic { code, .. } => *code,
            Self::Model { code, .. } => *code,
            Self::Internal { code, .. } => *code,
            Self::System { code, .. } => *code,
            Self::Multiple(errors) => errors.first().map(|e| e.code()).unwrap_or(AQL0001),
        }
    }

    /// The message without the code prefix
    pub fn message(&self) -> &str {
        match self {
            Self::Parse { message, .. }
            | Self::Semantic { message, .. }
            | Self::Model { message, .. }
            | Self::Internal { message, .. }
            | Self::System { message, .. } => message,
            Self::Multiple(errors) => errors.first().map(|e| e.message()).unwrap_or_default(),
        }
    }

    /// Get the location if available
    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            Self::Parse { location, .. } => location.as_ref(),
            Self::Semantic { location, .. } => location.as_ref(),
            _ => None,
        }
    }

    /// Attach context, replacing any previous context
    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        match &mut self {
            Self::Parse { context, .. }
            | Self::Semantic { context, .. }
            | Self::Model { context, .. }
            | Self::Internal { context, .. }
            | Self::System { context, .. } => *context = Some(ctx.into()),
            Self::Multiple(_) => {}
        }
        self
    }

    /// Convert to a diagnostic
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Self::Parse {
                code,
                message,
                location,
                context,
                ..
            }
            | Self::Semantic {
                code,
                message,
                location,
                context,
            } => {
                let mut diag = Diagnostic::error(*code, message.clone());
                if let Some(loc) = location {
                    diag = diag.with_location(loc.clone());
                }
                if let Some(ctx) = context {
                    diag = diag.with_help(ctx.clone());
                }
                diag
            }
            Self::Model { code, message, context, .. }
            | Self::Internal { code, message, context }
            | Self::System { code, message, context } => {
                let mut diag = Diagnostic::error(*code, message.clone());
                if let Some(ctx) = context {
                    diag = diag.with_help(ctx.clone());
                }
                diag
            }
            Self::Multiple(errors) => match errors.first() {
                Some(first) => first.to_diagnostic(),
                None => Diagnostic::error(AQL0001, "Unknown error"),
            },
        }
    }
}

impl From<std::io::Error> for AqlError {
    fn from(err: std::io::Error) -> Self {
        Self::system(crate::AQL0401, err.to_string())
    }
}

/// Builder for creating AQL errors with fluent API
pub struct ErrorBuilder {
    code: ErrorCode,
    message: String,
    location: Option<SourceLocation>,
    context: Option<String>,
}

impl ErrorBuilder {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            location: None,
            context: None,
        }
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Set the span (converts to location)
    pub fn span(mut self, span: Span, query: &str) -> Self {
        self.location = Some(SourceLocation::from_span(span, query));
        self
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Build a parse error
    pub fn parse(self, query: impl Into<String>) -> AqlError {
        AqlError::Parse {
            code: self.code,
            message: self.message,
            query: query.into(),
            location: self.location,
            context: self.context,
        }
    }

    /// Build a semantic error
    pub fn semantic(self) -> AqlError {
        AqlError::Semantic {
            code: self.code,
            message: self.message,
            location: self.location,
            context: self.context,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AQL0101, AQL0106};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_error_builder() {
        let query = "SELECT c/foo FROM COMPOSITION c";
        let err = ErrorBuilder::new(AQL0001, "Unexpected 'FORM'")
            .span(Span::new(13, 17), query)
            .context("Expected FROM")
            .parse(query);

        assert!(matches!(err, AqlError::Parse { .. }));
        assert_eq!(err.code(), AQL0001);
        assert_eq!(err.location().map(|l| l.column), Some(14));
    }

    #[test]
    fn test_error_display() {
        let err = AqlError::semantic(AQL0101, "Path not valid: c/content/non");
        assert_eq!(err.to_string(), "AQL0101: Path not valid: c/content/non");
        assert_eq!(err.message(), "Path not valid: c/content/non");
    }

    #[test]
    fn test_diagnostic_display() {
        let diag = AqlError::semantic(AQL0106, "Not supported: VERSION")
            .with_context("use COMPOSITION instead")
            .to_diagnostic();

        assert_eq!(diag.to_string(), "error: AQL0106 - Not supported: VERSION");
        assert_eq!(diag.help.as_deref(), Some("use COMPOSITION instead"));

        let located = Diagnostic::error(AQL0001, "Unexpected token")
            .with_location(SourceLocation::new(1, 5, 4, 1));
        assert!(located.to_string().ends_with("at 1:5"));
    }
}
