//! Replacement of `$name` query parameters by request values

use aql_ast::{
    AndPredicate, AqlObjectPath, AqlQuery, ColumnExpression, Containment, IdentifiedPath, Operand,
    Primitive, PredicateValue, WhereCondition,
};
use aql_diagnostics::{AqlError, Result, AQL0009, AQL0010};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;

fn missing(name: &str) -> AqlError {
    AqlError::semantic(AQL0009, format!("Missing parameter '{name}'"))
}

fn invalid(message: String) -> AqlError {
    AqlError::semantic(AQL0010, message)
}

/// Literal of a JSON parameter value
///
/// Integers become Long, other numbers Double. Strings become temporal literals when they
/// are ISO-8601 dates, times or date-times.
pub fn to_primitive(name: &str, value: &Value) -> Result<Primitive> {
    match value {
        Value::Null => Err(missing(name)),
        Value::Bool(b) => Ok(Primitive::Boolean(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(Primitive::Long(i)),
            None => {
                let text = n.to_string();
                Decimal::from_str(&text)
                    .or_else(|_| Decimal::from_scientific(&text))
                    .map(Primitive::Double)
                    .map_err(|_| invalid(format!("Parameter '{name}' is not a valid number: {text}")))
            }
        },
        Value::String(s) => Ok(Primitive::from_string(s.as_str())),
        Value::Array(_) | Value::Object(_) => Err(invalid(format!(
            "Type of parameter '{name}' is not supported"
        ))),
    }
}

/// Substitutes parameters in SELECT, FROM, WHERE and ORDER BY
pub struct ParameterSubstitution<'a> {
    params: &'a Map<String, Value>,
}

impl<'a> ParameterSubstitution<'a> {
    pub fn new(params: &'a Map<String, Value>) -> Self {
        Self { params }
    }

    pub fn apply(&self, query: &mut AqlQuery) -> Result<()> {
        for statement in &mut query.select.statements {
            match &mut statement.column {
                ColumnExpression::Path(path) => self.identified_path(path)?,
                ColumnExpression::Aggregate(aggregate) => {
                    if let Some(path) = &mut aggregate.path {
                        self.identified_path(path)?;
                    }
                }
                ColumnExpression::Primitive(_) => {}
            }
        }
        self.containment(&mut query.from)?;
        if let Some(condition) = &mut query.where_clause {
            self.condition(condition)?;
        }
        for order in &mut query.order_by {
            self.identified_path(&mut order.statement)?;
        }
        Ok(())
    }

    fn value(&self, name: &str) -> Result<&'a Value> {
        self.params
            .get(name)
            .filter(|v| !v.is_null())
            .ok_or_else(|| missing(name))
    }

    fn single(&self, name: &str) -> Result<Primitive> {
        match self.value(name)? {
            Value::Array(_) => Err(invalid(format!(
                "Parameter '{name}' must be a single value, lists are only allowed in MATCHES"
            ))),
            value => to_primitive(name, value),
        }
    }

    fn list(&self, name: &str) -> Result<Vec<Primitive>> {
        match self.value(name)? {
            Value::Array(items) => items.iter().map(|v| to_primitive(name, v)).collect(),
            value => Ok(vec![to_primitive(name, value)?]),
        }
    }

    fn containment(&self, containment: &mut Containment) -> Result<()> {
        match containment {
            Containment::Class(class) => {
                self.predicates(&mut class.predicates)?;
                if let Some(inner) = &mut class.contains {
                    self.containment(inner)?;
                }
            }
            Containment::Version(version) => {
                if let Some(inner) = &mut version.contains {
                    self.containment(inner)?;
                }
            }
            Containment::Set(set) => {
                for value in &mut set.values {
                    self.containment(value)?;
                }
            }
            Containment::Not(inner) => self.containment(inner)?,
        }
        Ok(())
    }

    fn condition(&self, condition: &mut WhereCondition) -> Result<()> {
        match condition {
            WhereCondition::Comparison {
                statement, value, ..
            }
            | WhereCondition::Like { statement, value } => {
                self.identified_path(statement)?;
                self.operand(value)?;
            }
            WhereCondition::Matches { statement, values } => {
                self.identified_path(statement)?;
                let mut expanded = Vec::with_capacity(values.len());
                for value in values.drain(..) {
                    match value {
                        Operand::Parameter(name) => {
                            expanded.extend(self.list(&name)?.into_iter().map(Operand::Primitive));
                        }
                        Operand::Path(mut path) => {
                            self.identified_path(&mut path)?;
                            expanded.push(Operand::Path(path));
                        }
                        primitive @ Operand::Primitive(_) => expanded.push(primitive),
                    }
                }
                *values = expanded;
            }
            WhereCondition::Exists(path) => self.identified_path(path)?,
            WhereCondition::Not(inner) => self.condition(inner)?,
            WhereCondition::Logical { values, .. } => {
                for value in values {
                    self.condition(value)?;
                }
            }
        }
        Ok(())
    }

    fn operand(&self, operand: &mut Operand) -> Result<()> {
        match operand {
            Operand::Parameter(name) => {
                let primitive = self.single(name)?;
                *operand = Operand::Primitive(primitive);
            }
            Operand::Path(path) => self.identified_path(path)?,
            Operand::Primitive(_) => {}
        }
        Ok(())
    }

    fn identified_path(&self, path: &mut IdentifiedPath) -> Result<()> {
        self.predicates(&mut path.root_predicates)?;
        if let Some(object_path) = &mut path.path {
            self.object_path(object_path)?;
        }
        Ok(())
    }

    fn object_path(&self, path: &mut AqlObjectPath) -> Result<()> {
        for node in &mut path.nodes {
            self.predicates(&mut node.predicates)?;
        }
        Ok(())
    }

    fn predicates(&self, predicates: &mut [AndPredicate]) -> Result<()> {
        for and in predicates {
            for operand in and.operands.iter_mut() {
                self.object_path(&mut operand.path)?;
                let PredicateValue::Parameter(name) = &operand.value else {
                    continue;
                };
                let primitive = if operand.is_archetype_node_id() {
                    match self.value(name)? {
                        Value::String(id) if !id.is_empty() => Primitive::String(id.clone()),
                        _ => {
                            return Err(invalid(format!(
                                "Parameter '{name}' used as archetype_node_id must be a non-empty string"
                            )));
                        }
                    }
                } else {
                    self.single(name)?
                };
                operand.value = PredicateValue::Primitive(primitive);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aql_ast::TemporalKind;
    use aql_parser::parse;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn substitute(aql: &str, params: Value) -> Result<AqlQuery> {
        let mut query = parse(aql).unwrap_or_else(|e| panic!("Failed to parse '{aql}': {e:?}"));
        let Value::Object(params) = params else {
            panic!("parameters must be an object");
        };
        ParameterSubstitution::new(&params).apply(&mut query)?;
        Ok(query)
    }

    #[test]
    fn test_to_primitive() {
        assert_eq!(to_primitive("p", &json!(42)).unwrap(), Primitive::Long(42));
        assert_eq!(
            to_primitive("p", &json!(1.5)).unwrap(),
            Primitive::Double(Decimal::from_str("1.5").unwrap())
        );
        assert_eq!(to_primitive("p", &json!(true)).unwrap(), Primitive::Boolean(true));
        assert_eq!(to_primitive("p", &json!("Vitals")).unwrap(), Primitive::from("Vitals"));
        let Primitive::Temporal(date) = to_primitive("p", &json!("2024-01-31")).unwrap() else {
            panic!("expected a temporal literal");
        };
        assert_eq!(date.kind, TemporalKind::Date);
        assert_eq!(to_primitive("p", &Value::Null).unwrap_err().code(), AQL0009);
        assert_eq!(to_primitive("p", &json!({"a": 1})).unwrap_err().code(), AQL0010);
    }

    #[test]
    fn test_where_parameters() {
        let query = substitute(
            "SELECT c/uid/value FROM COMPOSITION c WHERE c/name/value = $name AND c/uid/value LIKE $uid",
            json!({"name": "Vitals", "uid": "abc*"}),
        )
        .unwrap();
        assert_eq!(
            query.where_clause.unwrap().to_string(),
            "c/name/value = 'Vitals' AND c/uid/value LIKE 'abc*'"
        );
    }

    #[test]
    fn test_matches_expands_lists() {
        let query = substitute(
            "SELECT c/uid/value FROM COMPOSITION c WHERE c/name/value MATCHES {'a', $names}",
            json!({"names": ["b", "c"]}),
        )
        .unwrap();
        assert_eq!(
            query.where_clause.unwrap().to_string(),
            "c/name/value MATCHES {'a', 'b', 'c'}"
        );
    }

    #[test]
    fn test_list_outside_matches_rejected() {
        let err = substitute(
            "SELECT c/uid/value FROM COMPOSITION c WHERE c/name/value = $names",
            json!({"names": ["b", "c"]}),
        )
        .unwrap_err();
        assert_eq!(err.code(), AQL0010);
    }

    #[test]
    fn test_missing_parameter() {
        let err = substitute(
            "SELECT c/uid/value FROM COMPOSITION c WHERE c/name/value = $name",
            json!({}),
        )
        .unwrap_err();
        assert_eq!(err.code(), AQL0009);
        assert_eq!(err.message(), "Missing parameter 'name'");
    }

    #[test]
    fn test_predicate_parameters() {
        let query = substitute(
            "SELECT o/data[at0001]/events[at0006]/data/items[at0004]/value \
             FROM EHR e[ehr_id/value=$ehr] CONTAINS OBSERVATION o[$archetype]",
            json!({
                "ehr": "7d44b88c-4199-4bad-97dc-d78268e01398",
                "archetype": "openEHR-EHR-OBSERVATION.blood_pressure.v2"
            }),
        )
        .unwrap();
        assert_eq!(
            query.from.to_string(),
            "EHR e[ehr_id/value='7d44b88c-4199-4bad-97dc-d78268e01398'] \
             CONTAINS OBSERVATION o[openEHR-EHR-OBSERVATION.blood_pressure.v2]"
        );
    }

    #[test]
    fn test_archetype_parameter_must_be_string() {
        let err = substitute(
            "SELECT o/uid/value FROM OBSERVATION o[$archetype]",
            json!({"archetype": ""}),
        )
        .unwrap_err();
        assert_eq!(err.code(), AQL0010);

        let err = substitute(
            "SELECT o/uid/value FROM OBSERVATION o[$archetype]",
            json!({"archetype": 3}),
        )
        .unwrap_err();
        assert_eq!(err.code(), AQL0010);
    }

    #[test]
    fn test_path_predicate_in_select() {
        let query = substitute(
            "SELECT c/content[$node]/name/value FROM COMPOSITION c",
            json!({"node": "openEHR-EHR-SECTION.vitals.v1"}),
        )
        .unwrap();
        assert_eq!(
            query.select.to_string(),
            "SELECT c/content[openEHR-EHR-SECTION.vitals.v1]/name/value"
        );
    }
}
