//! Foundation (leaf value) types a path can terminate in

use std::fmt;

/// Primitive value categories below the RM type graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FoundationType {
    Boolean,
    Byte,
    Char,
    Double,
    Integer,
    Long,
    String,
    Uri,
    Temporal,
    TemporalAccessor,
    TemporalAmount,
}

impl FoundationType {
    pub const ALL: [FoundationType; 11] = [
        FoundationType::Boolean,
        FoundationType::Byte,
        FoundationType::Char,
        FoundationType::Double,
        FoundationType::Integer,
        FoundationType::Long,
        FoundationType::String,
        FoundationType::Uri,
        FoundationType::Temporal,
        FoundationType::TemporalAccessor,
        FoundationType::TemporalAmount,
    ];

    /// Name used in the RM metadata, e.g. `TEMPORAL_ACCESSOR`
    pub fn type_name(&self) -> &'static str {
        match self {
            FoundationType::Boolean => "BOOLEAN",
            FoundationType::Byte => "BYTE",
            FoundationType::Char => "CHAR",
            FoundationType::Double => "DOUBLE",
            FoundationType::Integer => "INTEGER",
            FoundationType::Long => "LONG",
            FoundationType::String => "STRING",
            FoundationType::Uri => "URI",
            FoundationType::Temporal => "TEMPORAL",
            FoundationType::TemporalAccessor => "TEMPORAL_ACCESSOR",
            FoundationType::TemporalAmount => "TEMPORAL_AMOUNT",
        }
    }

    pub fn by_type_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.type_name() == name)
    }

    pub fn is_foundation_type(name: &str) -> bool {
        Self::by_type_name(name).is_some()
    }
}

impl fmt::Display for FoundationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_by_type_name() {
        assert_eq!(
            FoundationType::by_type_name("TEMPORAL_AMOUNT"),
            Some(FoundationType::TemporalAmount)
        );
        assert_eq!(FoundationType::by_type_name("DV_TEXT"), None);
        for t in FoundationType::ALL {
            assert_eq!(FoundationType::by_type_name(t.type_name()), Some(t));
        }
    }
}
