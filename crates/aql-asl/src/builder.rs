//! ASL plan builder
//!
//! Assembles the relational plan of a query from the FROM skeleton and the path fields,
//! then adds SELECT, WHERE, GROUP BY, ORDER BY and LIMIT to the root query.

use crate::alias::AliasProvider;
use crate::conditions::{
    archetype_node_id_condition, compare_field, like_pattern, reduce_conditions,
    root_concept_condition, template_id_condition, unmatchable, vo_id_condition,
};
use crate::from_creator::{FromCreator, ResolvedContainment, EHR_ID_COLUMN};
use crate::model::{
    AggregatingField, AslCondition, AslField, AslOperator, AslOrderByField, AslPlan, AslQuery,
    AslQueryKind, ColumnType, DvOrderedCondition, FieldKind, QueryId, SqlValue,
};
use crate::path_creator::PathCreator;
use crate::query_wrapper::push_down_not;
use crate::values::{coerce_value, dv_ordered_magnitude, primitive_value};
use aql_analysis::{create_path_infos, AttributeInfos, PathAnalyzer};
use aql_ast::{
    AggregateFunctionName, AqlQuery, ColumnExpression, IdentifiedPath, LogicalOperator, Operand,
    Primitive, WhereCondition,
};
use aql_diagnostics::{AqlError, Result, AQL0009, AQL0102, AQL0106};
use aql_model::{ExtractedColumn, KnowledgeCache, RmTypeAlias, SourceRelation, StructureColumn};
use indexmap::IndexMap;
use std::cmp::Ordering;

fn unsupported(what: impl std::fmt::Display) -> AqlError {
    AqlError::semantic(AQL0106, format!("Not supported: {what}"))
}

/// Builds the relational plan of a parsed query
///
/// # Example
///
/// ```ignore
/// let infos = AttributeInfos::openehr()?;
/// let knowledge = InMemoryKnowledgeCache::new();
/// let plan = AslBuilder::new(&infos, &knowledge, "local.ehrbase.org").build(&query)?;
/// ```
pub struct AslBuilder<'a> {
    infos: &'a AttributeInfos,
    knowledge: &'a dyn KnowledgeCache,
    system_id: &'a str,
    known_templates_only: bool,
}

impl<'a> AslBuilder<'a> {
    pub fn new(infos: &'a AttributeInfos, knowledge: &'a dyn KnowledgeCache, system_id: &'a str) -> Self {
        Self {
            infos,
            knowledge,
            system_id,
            known_templates_only: false,
        }
    }

    /// Treat COMPOSITION archetypes without a matching template as unsatisfiable
    pub fn known_templates_only(mut self, enabled: bool) -> Self {
        self.known_templates_only = enabled;
        self
    }

    pub fn build(&self, query: &AqlQuery) -> Result<AslPlan> {
        let analyzer = PathAnalyzer::new(self.infos);
        let path_infos = create_path_infos(query, &analyzer)?;
        log::debug!("Analyzed paths of {} FROM variables", path_infos.len());

        let mut plan = AslPlan::new();
        let mut aliases = AliasProvider::new();
        let external = plan.add(AslQuery::new("external", AslQueryKind::External));

        let containments = FromCreator::new(&mut plan, &mut aliases, self.knowledge)
            .known_templates_only(self.known_templates_only)
            .resolve(&query.from)?;
        let fields = PathCreator::new(&mut plan, &mut aliases, external, self.system_id)
            .create(query, &path_infos, &containments)?;

        let mut root = RootBuilder {
            plan,
            fields,
            containments,
            external,
            knowledge: self.knowledge,
            system_id: self.system_id,
        };
        let grouped = root.add_select(query)?;
        root.add_order_by(query, grouped)?;
        if let Some(condition) = &query.where_clause {
            let condition = reduce_conditions(root.condition(&push_down_not(condition))?);
            if condition != AslCondition::True {
                let id = root.plan.root();
                root.plan.add_condition_and(id, condition);
            }
        }
        let mut plan = root.plan;
        let root_query = plan.root_query_mut();
        root_query.limit = query.limit;
        root_query.offset = query.offset;

        plan.validate()?;
        log::debug!("Built plan with {} queries", plan.len());
        log::trace!("Plan:\n{plan}");
        Ok(plan)
    }
}

struct RootBuilder<'a> {
    plan: AslPlan,
    fields: IndexMap<IdentifiedPath, AslField>,
    containments: IndexMap<String, ResolvedContainment>,
    external: QueryId,
    knowledge: &'a dyn KnowledgeCache,
    system_id: &'a str,
}

impl RootBuilder<'_> {
    fn field(&self, path: &IdentifiedPath) -> Result<AslField> {
        if !self.containments.contains_key(&path.root) {
            return Err(AqlError::semantic(
                AQL0102,
                format!("Unknown identifier: {}", path.root),
            ));
        }
        self.fields
            .get(path)
            .cloned()
            .ok_or_else(|| AqlError::plan(format!("Path {path} was not resolved")))
    }

    // === SELECT ===

    /// Returns whether the result rows are grouped
    fn add_select(&mut self, query: &AqlQuery) -> Result<bool> {
        let root = self.plan.root();
        let mut select = Vec::with_capacity(query.select.statements.len() + 1);
        for statement in &query.select.statements {
            let field = match &statement.column {
                ColumnExpression::Path(path) => self.field(path)?,
                ColumnExpression::Aggregate(aggregate) => {
                    let base = match &aggregate.path {
                        Some(path) => Some(Box::new(self.field(path)?)),
                        None if aggregate.function == AggregateFunctionName::Count => None,
                        None => {
                            return Err(unsupported(format!(
                                "{} without a path",
                                aggregate.function.as_str()
                            )));
                        }
                    };
                    AslField::new(
                        root,
                        FieldKind::Aggregating(AggregatingField {
                            function: aggregate.function,
                            base,
                            distinct: aggregate.distinct,
                        }),
                    )
                }
                ColumnExpression::Primitive(primitive) => {
                    AslField::constant(self.external, primitive_value(primitive))
                }
            };
            select.push(field);
        }

        let only_constants = select
            .iter()
            .all(|f| matches!(f.kind, FieldKind::Constant(_)));
        if only_constants {
            select.push(self.synthetic_count()?);
        }

        let uses_aggregate = select.iter().any(AslField::is_aggregate);
        let grouped = uses_aggregate || query.select.distinct;
        let mut group_by: Vec<AslField> = Vec::new();
        if grouped {
            for field in &select {
                if field.is_aggregate() || matches!(field.kind, FieldKind::Constant(_)) {
                    continue;
                }
                if !group_by.contains(field) {
                    group_by.push(field.clone());
                }
            }
        }

        let root_query = self.plan.root_query_mut();
        root_query.select = select;
        root_query.group_by = group_by;
        Ok(grouped)
    }

    /// `COUNT` over the top FROM class, the only column of a query selecting constants
    fn synthetic_count(&self) -> Result<AslField> {
        let top = self
            .plan
            .query(self.plan.root())
            .children()
            .first()
            .map(|c| c.query)
            .ok_or_else(|| AqlError::plan("Plan without FROM query"))?;
        let counted = match self.plan.query(top).as_structure().map(|s| s.relation) {
            Some(SourceRelation::Ehr) => AslField::named_column(top, EHR_ID_COLUMN, ColumnType::Uuid),
            Some(_) => AslField::structure_column(top, StructureColumn::VoId),
            None => return Err(AqlError::plan("FROM does not start with a structure query")),
        };
        Ok(AslField::new(
            self.plan.root(),
            FieldKind::Aggregating(AggregatingField {
                function: AggregateFunctionName::Count,
                base: Some(Box::new(counted)),
                distinct: false,
            }),
        ))
    }

    // === ORDER BY ===

    fn add_order_by(&mut self, query: &AqlQuery, grouped: bool) -> Result<()> {
        let mut order_by = Vec::with_capacity(query.order_by.len());
        let mut magnitudes = Vec::new();
        for expression in &query.order_by {
            let field = self.field(&expression.statement)?;
            if grouped {
                if !self.plan.root_query().group_by.contains(&field) {
                    return Err(unsupported(format!(
                        "ORDER BY {} which is not selected by a grouped query",
                        expression.statement
                    )));
                }
                if field.is_dv_ordered() && !magnitudes.contains(&field) {
                    magnitudes.push(field.clone());
                }
            }
            order_by.push(AslOrderByField {
                field,
                direction: expression.direction,
            });
        }
        let root_query = self.plan.root_query_mut();
        root_query.order_by = order_by;
        root_query.group_by_dv_ordered_magnitude = magnitudes;
        Ok(())
    }

    // === WHERE ===

    fn condition(&self, condition: &WhereCondition) -> Result<AslCondition> {
        match condition {
            WhereCondition::Logical { operator, values } => {
                let values = values
                    .iter()
                    .map(|v| self.condition(v))
                    .collect::<Result<Vec<_>>>()?;
                Ok(match operator {
                    LogicalOperator::And => AslCondition::And(values),
                    LogicalOperator::Or => AslCondition::Or(values),
                })
            }
            WhereCondition::Not(inner) => Ok(AslCondition::not(self.condition(inner)?)),
            WhereCondition::Exists(path) => {
                let field = self.field(path)?;
                if field.extracted_column.is_some() {
                    return Ok(AslCondition::True);
                }
                Ok(AslCondition::NotNull(field))
            }
            WhereCondition::Comparison {
                statement,
                operator,
                value,
            } => {
                let field = self.field(statement)?;
                let value = operand_primitive(value)?;
                self.comparison(field, AslOperator::from(*operator), value)
            }
            WhereCondition::Like { statement, value } => {
                let field = self.field(statement)?;
                let Primitive::String(pattern) = operand_primitive(value)? else {
                    return Err(unsupported(format!("LIKE on {statement} with a non-string pattern")));
                };
                if matches!(field.kind, FieldKind::ComplexExtracted(_))
                    || matches!(
                        field.extracted_column,
                        Some(ExtractedColumn::EhrSystemId | ExtractedColumn::EhrSystemIdDv)
                    )
                {
                    return Err(unsupported(format!("LIKE on {statement}")));
                }
                Ok(AslCondition::field_value(
                    field,
                    AslOperator::Like,
                    vec![SqlValue::Text(like_pattern(pattern)?)],
                ))
            }
            WhereCondition::Matches { statement, values } => {
                let field = self.field(statement)?;
                let values = values
                    .iter()
                    .map(operand_primitive)
                    .collect::<Result<Vec<_>>>()?;
                if field.extracted_column.is_none() && !field.is_dv_ordered() {
                    let coerced: Vec<SqlValue> = values
                        .iter()
                        .filter_map(|v| coerce_value(field.column_type(), &primitive_value(v)))
                        .collect();
                    if coerced.is_empty() {
                        return Ok(AslCondition::False);
                    }
                    return Ok(AslCondition::field_value(field, AslOperator::In, coerced));
                }
                let alternatives = values
                    .into_iter()
                    .map(|v| self.comparison(field.clone(), AslOperator::Eq, v))
                    .collect::<Result<Vec<_>>>()?;
                Ok(AslCondition::Or(alternatives))
            }
        }
    }

    fn comparison(&self, field: AslField, operator: AslOperator, value: &Primitive) -> Result<AslCondition> {
        match field.extracted_column {
            Some(ExtractedColumn::ArchetypeNodeId) => {
                archetype_node_id_condition(field.owner, operator, string_value(&field, value)?)
            }
            Some(ExtractedColumn::RootConcept) => {
                root_concept_condition(field.owner, operator, string_value(&field, value)?)
            }
            Some(ExtractedColumn::VoId) => {
                vo_id_condition(field.owner, operator, string_value(&field, value)?)
            }
            Some(ExtractedColumn::TemplateId) => template_id_condition(
                field.owner,
                operator,
                string_value(&field, value)?,
                self.knowledge,
            ),
            Some(ExtractedColumn::EhrSystemId | ExtractedColumn::EhrSystemIdDv) => {
                Ok(self.system_id_condition(operator, value))
            }
            _ => Ok(self.value_comparison(field, operator, value)),
        }
    }

    fn value_comparison(&self, field: AslField, operator: AslOperator, value: &Primitive) -> AslCondition {
        if let Some(types) = field.dv_ordered_types()
            && let Some(magnitude) = dv_ordered_magnitude(value)
        {
            let type_aliases: Vec<String> = magnitude
                .types
                .iter()
                .filter(|t| types.contains(**t))
                .filter_map(|t| RmTypeAlias::get_alias(t))
                .map(str::to_string)
                .collect();
            if type_aliases.is_empty() {
                return unmatchable(operator);
            }
            return AslCondition::DvOrdered(DvOrderedCondition {
                field,
                operator,
                type_aliases,
                values: vec![SqlValue::Numeric(magnitude.magnitude)],
            });
        }
        compare_field(field, operator, &primitive_value(value))
    }

    /// The system id is known at compile time, the comparison is folded
    fn system_id_condition(&self, operator: AslOperator, value: &Primitive) -> AslCondition {
        let Some(text) = value.as_str() else {
            return unmatchable(operator);
        };
        let ordering = self.system_id.cmp(text);
        let holds = match operator {
            AslOperator::Eq => ordering == Ordering::Equal,
            AslOperator::Neq => ordering != Ordering::Equal,
            AslOperator::Gt => ordering == Ordering::Greater,
            AslOperator::Ge => ordering != Ordering::Less,
            AslOperator::Lt => ordering == Ordering::Less,
            AslOperator::Le => ordering != Ordering::Greater,
            _ => false,
        };
        if holds {
            AslCondition::True
        } else {
            AslCondition::False
        }
    }
}

fn operand_primitive(operand: &Operand) -> Result<&Primitive> {
    match operand {
        Operand::Primitive(p) => Ok(p),
        Operand::Parameter(name) => Err(AqlError::semantic(
            AQL0009,
            format!("Missing parameter '{name}'"),
        )),
        Operand::Path(path) => Err(unsupported(format!("path {path} as a WHERE operand"))),
    }
}

fn string_value<'p>(field: &AslField, value: &'p Primitive) -> Result<&'p str> {
    value.as_str().ok_or_else(|| {
        let column = field
            .extracted_column
            .map(|c| c.path().to_string())
            .unwrap_or_default();
        unsupported(format!("comparing {column} with {value}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use aql_model::InMemoryKnowledgeCache;
    use pretty_assertions::assert_eq;

    fn build(aql: &str) -> Result<AslPlan> {
        let query = aql_parser::parse(aql)?;
        let infos = AttributeInfos::openehr()?;
        let knowledge = InMemoryKnowledgeCache::new();
        AslBuilder::new(&infos, &knowledge, "local.ehrbase.org").build(&query)
    }

    #[test]
    fn test_system_id_is_folded() {
        let plan = build(
            "SELECT e/ehr_id/value FROM EHR e WHERE e/system_id/value = 'local.ehrbase.org'",
        )
        .unwrap();
        assert_eq!(plan.query(plan.root()).condition, None);

        let plan =
            build("SELECT e/ehr_id/value FROM EHR e WHERE e/system_id/value = 'other'").unwrap();
        assert_eq!(plan.query(plan.root()).condition, Some(AslCondition::False));
    }

    #[test]
    fn test_missing_parameter() {
        let err = build("SELECT c/uid/value FROM COMPOSITION c WHERE c/name/value = $name").unwrap_err();
        assert_eq!(err.code(), AQL0009);
    }

    #[test]
    fn test_path_operand_rejected() {
        let err = build(
            "SELECT c/uid/value FROM COMPOSITION c WHERE c/name/value = c/archetype_node_id",
        )
        .unwrap_err();
        assert_eq!(err.code(), AQL0106);
    }

    #[test]
    fn test_only_constants_counts_rows() {
        let plan = build("SELECT 1 FROM COMPOSITION c").unwrap();
        let select = &plan.root_query().select;
        assert_eq!(select.len(), 2);
        assert!(matches!(select[0].kind, FieldKind::Constant(SqlValue::Long(1))));
        let FieldKind::Aggregating(count) = &select[1].kind else {
            panic!("expected COUNT, got {:?}", select[1].kind);
        };
        assert_eq!(count.function, AggregateFunctionName::Count);
        assert_eq!(
            count.base.as_deref().and_then(AslField::column_name),
            Some("vo_id")
        );
    }
}
