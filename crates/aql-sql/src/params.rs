//! Bound statement parameters

use aql_asl::SqlValue;

/// PostgreSQL type a value is bound as
pub fn sql_type(value: &SqlValue) -> &'static str {
    match value {
        SqlValue::Text(_) => "text",
        SqlValue::Long(_) => "bigint",
        SqlValue::Numeric(_) => "numeric",
        SqlValue::Boolean(_) => "boolean",
        SqlValue::Uuid(_) => "uuid",
        SqlValue::Timestamp(_) => "timestamptz",
    }
}

/// Values bound to the `$n` placeholders of a statement, in placeholder order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindParams {
    values: Vec<SqlValue>,
}

impl BindParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value and return its placeholder, cast to the value's type.
    ///
    /// The cast lets PostgreSQL type placeholders that only appear in the SELECT list.
    pub fn bind(&mut self, value: &SqlValue) -> String {
        self.values.push(value.clone());
        format!("${}::{}", self.values.len(), sql_type(value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<SqlValue> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_placeholders_are_typed() {
        let mut params = BindParams::new();
        assert_eq!(params.bind(&SqlValue::Text("x".into())), "$1::text");
        assert_eq!(params.bind(&SqlValue::Long(3)), "$2::bigint");
        assert_eq!(params.bind(&SqlValue::Boolean(true)), "$3::boolean");
        assert_eq!(
            params.into_values(),
            vec![
                SqlValue::Text("x".into()),
                SqlValue::Long(3),
                SqlValue::Boolean(true)
            ]
        );
    }

    proptest! {
        #[test]
        fn test_placeholders_are_numbered_in_bind_order(values in prop::collection::vec(any::<i64>(), 0..40)) {
            let mut params = BindParams::new();
            for (idx, value) in values.iter().enumerate() {
                let placeholder = params.bind(&SqlValue::Long(*value));
                prop_assert_eq!(placeholder, format!("${}::bigint", idx + 1));
            }
            prop_assert_eq!(params.len(), values.len());
            let bound: Vec<SqlValue> = values.into_iter().map(SqlValue::Long).collect();
            prop_assert_eq!(params.into_values(), bound);
        }
    }
}
