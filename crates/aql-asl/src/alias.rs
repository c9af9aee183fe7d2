//! Unique aliases for plan queries

use std::collections::HashMap;

/// Hands out aliases that are unique within one plan.
///
/// Aliases become SQL identifiers, so every character outside `[A-Za-z0-9_]` is replaced.
#[derive(Debug, Default)]
pub struct AliasProvider {
    counters: HashMap<String, usize>,
}

impl AliasProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// `<prefix>_<n>`, counting per prefix from 0
    pub fn unique_alias(&mut self, prefix: &str) -> String {
        let prefix = sanitize(prefix);
        let counter = self.counters.entry(prefix.clone()).or_default();
        let alias = format!("{prefix}_{counter}");
        *counter += 1;
        alias
    }
}

fn sanitize(prefix: &str) -> String {
    prefix
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_aliases_count_per_prefix() {
        let mut aliases = AliasProvider::new();
        assert_eq!(aliases.unique_alias("sCO_c"), "sCO_c_0");
        assert_eq!(aliases.unique_alias("sCO_c"), "sCO_c_1");
        assert_eq!(aliases.unique_alias("p_eq"), "p_eq_0");
    }

    #[test]
    fn test_aliases_are_identifiers() {
        let mut aliases = AliasProvider::new();
        assert_eq!(aliases.unique_alias("p_name-x"), "p_name_x_0");
    }
}
