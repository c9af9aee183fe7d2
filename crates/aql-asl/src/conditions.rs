//! Construction and simplification of plan conditions

use crate::model::{AslCondition, AslField, AslOperator, QueryId, SqlValue};
use crate::values::coerce_value;
use aql_ast::{ComparisonOperator, PredicateOperator};
use aql_diagnostics::{AqlError, Result, AQL0105, AQL0106, AQL0110};
use aql_model::constants::{ARCHETYPE_PREFIX, COMPOSITION};
use aql_model::{KnowledgeCache, StructureColumn, StructureRmType};
use uuid::Uuid;

impl From<ComparisonOperator> for AslOperator {
    fn from(operator: ComparisonOperator) -> Self {
        match operator {
            ComparisonOperator::Eq => AslOperator::Eq,
            ComparisonOperator::Neq => AslOperator::Neq,
            ComparisonOperator::Gt => AslOperator::Gt,
            ComparisonOperator::Ge => AslOperator::Ge,
            ComparisonOperator::Lt => AslOperator::Lt,
            ComparisonOperator::Le => AslOperator::Le,
        }
    }
}

impl From<PredicateOperator> for AslOperator {
    fn from(operator: PredicateOperator) -> Self {
        match operator {
            PredicateOperator::Eq => AslOperator::Eq,
            PredicateOperator::Neq => AslOperator::Neq,
            PredicateOperator::Gt => AslOperator::Gt,
            PredicateOperator::Ge => AslOperator::Ge,
            PredicateOperator::Lt => AslOperator::Lt,
            PredicateOperator::Le => AslOperator::Le,
        }
    }
}

/// Flatten nested conjunctions and disjunctions and fold constant operands
pub fn reduce_conditions(condition: AslCondition) -> AslCondition {
    match condition {
        AslCondition::And(values) => {
            let mut reduced = Vec::with_capacity(values.len());
            for value in values.into_iter().map(reduce_conditions) {
                match value {
                    AslCondition::True => {}
                    AslCondition::False => return AslCondition::False,
                    AslCondition::And(inner) => reduced.extend(inner),
                    other => reduced.push(other),
                }
            }
            match reduced.len() {
                0 => AslCondition::True,
                1 => reduced.remove(0),
                _ => AslCondition::And(reduced),
            }
        }
        AslCondition::Or(values) => {
            let mut reduced = Vec::with_capacity(values.len());
            for value in values.into_iter().map(reduce_conditions) {
                match value {
                    AslCondition::False => {}
                    AslCondition::True => return AslCondition::True,
                    AslCondition::Or(inner) => reduced.extend(inner),
                    other => reduced.push(other),
                }
            }
            match reduced.len() {
                0 => AslCondition::False,
                1 => reduced.remove(0),
                _ => AslCondition::Or(reduced),
            }
        }
        AslCondition::Not(inner) => match reduce_conditions(*inner) {
            AslCondition::True => AslCondition::False,
            AslCondition::False => AslCondition::True,
            AslCondition::Not(inner) => *inner,
            other => AslCondition::not(other),
        },
        other => other,
    }
}

/// Condition that holds for no row under `=` and for every row under `!=`
pub fn unmatchable(operator: AslOperator) -> AslCondition {
    if operator == AslOperator::Neq {
        AslCondition::True
    } else {
        AslCondition::False
    }
}

/// `field op value`, with the value converted to the field's column type
pub fn compare_field(field: AslField, operator: AslOperator, value: &SqlValue) -> AslCondition {
    match coerce_value(field.column_type(), value) {
        Some(value) => AslCondition::field_value(field, operator, vec![value]),
        None => unmatchable(operator),
    }
}

fn eq_or_neq(operator: AslOperator, what: &str) -> Result<()> {
    match operator {
        AslOperator::Eq | AslOperator::Neq => Ok(()),
        other => Err(AqlError::semantic(
            AQL0106,
            format!("Not supported: operator {other:?} on {what}"),
        )),
    }
}

/// Combine per-column comparisons: all must hold for `=`, one must differ for `!=`
fn combine(operator: AslOperator, parts: Vec<AslCondition>) -> AslCondition {
    if operator == AslOperator::Neq {
        AslCondition::Or(parts)
    } else {
        AslCondition::And(parts)
    }
}

/// An archetype id or node id as stored in `rm_entity` and `entity_concept`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchetypeConcept {
    /// RM type of an archetype id; `None` for node ids
    pub rm_type: Option<String>,
    /// `.<concept>.v<n>` for archetype ids, the node id itself otherwise
    pub concept: String,
}

impl ArchetypeConcept {
    /// Split an archetype id such as `openEHR-EHR-OBSERVATION.bp.v2`
    pub fn parse(archetype_node_id: &str) -> Result<Self> {
        if let Some(rest) = archetype_node_id.strip_prefix(ARCHETYPE_PREFIX) {
            let dot = rest.find('.').ok_or_else(|| invalid_archetype(archetype_node_id))?;
            let (rm_type, concept) = rest.split_at(dot);
            if rm_type.is_empty() || concept.len() < 2 {
                return Err(invalid_archetype(archetype_node_id));
            }
            return Ok(Self {
                rm_type: Some(rm_type.to_string()),
                concept: concept.to_string(),
            });
        }
        if archetype_node_id.is_empty() || archetype_node_id.starts_with("openEHR-") {
            return Err(invalid_archetype(archetype_node_id));
        }
        Ok(Self {
            rm_type: None,
            concept: archetype_node_id.to_string(),
        })
    }

    /// `rm_entity` alias of the archetype's RM type
    pub fn rm_entity(&self) -> Option<&'static str> {
        self.rm_type
            .as_deref()
            .and_then(StructureRmType::by_type_name)
            .map(|t| t.alias())
    }
}

fn invalid_archetype(id: &str) -> AqlError {
    AqlError::semantic(AQL0110, format!("Invalid archetype id: {id}"))
}

/// `archetype_node_id op '<id>'` against the `rm_entity` and `entity_concept` columns of `owner`
pub fn archetype_node_id_condition(
    owner: QueryId,
    operator: AslOperator,
    archetype_node_id: &str,
) -> Result<AslCondition> {
    eq_or_neq(operator, "archetype_node_id")?;
    let parsed = ArchetypeConcept::parse(archetype_node_id)?;
    let mut parts = Vec::with_capacity(2);
    if let Some(rm_type) = &parsed.rm_type {
        let Some(alias) = parsed.rm_entity() else {
            log::debug!("Archetype {archetype_node_id} is not of a structure type {rm_type}");
            return Ok(unmatchable(operator));
        };
        parts.push(AslCondition::field_value(
            AslField::structure_column(owner, StructureColumn::RmEntity),
            operator,
            vec![SqlValue::Text(alias.to_string())],
        ));
    }
    parts.push(AslCondition::field_value(
        AslField::structure_column(owner, StructureColumn::EntityConcept),
        operator,
        vec![SqlValue::Text(parsed.concept)],
    ));
    Ok(combine(operator, parts))
}

/// `archetype_node_id op '<id>'` of a COMPOSITION against the `root_concept` version column
pub fn root_concept_condition(
    owner: QueryId,
    operator: AslOperator,
    archetype_node_id: &str,
) -> Result<AslCondition> {
    eq_or_neq(operator, "archetype_node_id")?;
    let parsed = ArchetypeConcept::parse(archetype_node_id)?;
    if parsed.rm_type.as_deref() != Some(COMPOSITION) {
        return Ok(unmatchable(operator));
    }
    Ok(AslCondition::field_value(
        AslField::structure_column(owner, StructureColumn::RootConcept),
        operator,
        vec![SqlValue::Text(parsed.concept)],
    ))
}

/// `uid/value op '<uuid>::<system>::<version>'` against `vo_id` and `sys_version`
pub fn vo_id_condition(owner: QueryId, operator: AslOperator, value: &str) -> Result<AslCondition> {
    eq_or_neq(operator, "uid/value")?;
    let mut parts = value.split("::");
    let Some(vo_id) = parts.next().and_then(|id| Uuid::parse_str(id).ok()) else {
        return Ok(unmatchable(operator));
    };
    let _system_id = parts.next();
    let version = match parts.next() {
        None => None,
        Some(v) => match v.parse::<i64>() {
            Ok(v) => Some(v),
            Err(_) => return Ok(unmatchable(operator)),
        },
    };

    let vo_id = AslCondition::field_value(
        AslField::structure_column(owner, StructureColumn::VoId),
        operator,
        vec![SqlValue::Uuid(vo_id)],
    );
    Ok(match version {
        None => vo_id,
        Some(version) => combine(
            operator,
            vec![
                vo_id,
                AslCondition::field_value(
                    AslField::structure_column(owner, StructureColumn::SysVersion),
                    operator,
                    vec![SqlValue::Long(version)],
                ),
            ],
        ),
    })
}

/// `archetype_details/template_id/value op '<template id>'` against the `template_id` version
/// column, which holds the template's uuid
pub fn template_id_condition(
    owner: QueryId,
    operator: AslOperator,
    template_id: &str,
    knowledge: &dyn KnowledgeCache,
) -> Result<AslCondition> {
    eq_or_neq(operator, "template_id")?;
    match knowledge.find_uuid_by_template_id(template_id) {
        Some(uuid) => Ok(AslCondition::field_value(
            AslField::structure_column(owner, StructureColumn::TemplateId),
            operator,
            vec![SqlValue::Uuid(uuid)],
        )),
        None => {
            log::debug!("Unknown template: {template_id}");
            Ok(unmatchable(operator))
        }
    }
}

/// Translate an AQL LIKE pattern into an SQL LIKE pattern.
///
/// `*` and `?` are the wildcards; `%` and `_` match themselves. A backslash escapes
/// `*`, `?` and itself.
pub fn like_pattern(pattern: &str) -> Result<String> {
    let mut sql = String::with_capacity(pattern.len() + 4);
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '*' => sql.push('%'),
            '?' => sql.push('_'),
            '%' | '_' => {
                sql.push('\\');
                sql.push(c);
            }
            '\\' => match chars.next() {
                Some(escaped @ ('*' | '?')) => sql.push(escaped),
                Some('\\') => sql.push_str("\\\\"),
                _ => {
                    return Err(AqlError::semantic(
                        AQL0105,
                        format!("Invalid LIKE pattern: {pattern}"),
                    ));
                }
            },
            other => sql.push(other),
        }
    }
    Ok(sql)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn owner() -> QueryId {
        crate::model::AslPlan::new().root()
    }

    #[rstest]
    #[case("Blood*", "Blood%")]
    #[case("?ood", "_ood")]
    #[case("100%", "100\\%")]
    #[case("a_b", "a\\_b")]
    #[case("\\*x\\?", "*x?")]
    #[case("a\\\\b", "a\\\\b")]
    fn test_like_pattern(#[case] aql: &str, #[case] sql: &str) {
        assert_eq!(like_pattern(aql).unwrap(), sql);
    }

    #[rstest]
    #[case("abc\\")]
    #[case("a\\b")]
    fn test_invalid_like_pattern(#[case] aql: &str) {
        assert_eq!(like_pattern(aql).unwrap_err().code(), AQL0105);
    }

    #[test]
    fn test_parse_archetype_id() {
        let parsed = ArchetypeConcept::parse("openEHR-EHR-OBSERVATION.blood_pressure.v2").unwrap();
        assert_eq!(parsed.rm_type.as_deref(), Some("OBSERVATION"));
        assert_eq!(parsed.concept, ".blood_pressure.v2");
        assert_eq!(parsed.rm_entity(), Some("OB"));

        let node = ArchetypeConcept::parse("at0001").unwrap();
        assert_eq!(node.rm_type, None);
        assert_eq!(node.concept, "at0001");

        assert_eq!(
            ArchetypeConcept::parse("openEHR-EHR-OBSERVATION").unwrap_err().code(),
            AQL0110
        );
        assert_eq!(
            ArchetypeConcept::parse("openEHR-DEMOGRAPHIC-PERSON.x.v1").unwrap_err().code(),
            AQL0110
        );
    }

    #[test]
    fn test_archetype_condition_parts() {
        let eq = archetype_node_id_condition(owner(), AslOperator::Eq, "openEHR-EHR-CLUSTER.device.v1")
            .unwrap();
        let AslCondition::And(parts) = eq else {
            panic!("expected conjunction, got {eq:?}");
        };
        assert_eq!(parts.len(), 2);

        let neq = archetype_node_id_condition(owner(), AslOperator::Neq, "openEHR-EHR-CLUSTER.device.v1")
            .unwrap();
        assert!(matches!(neq, AslCondition::Or(ref parts) if parts.len() == 2));

        let node = archetype_node_id_condition(owner(), AslOperator::Eq, "at0004").unwrap();
        assert!(matches!(node, AslCondition::And(ref parts) if parts.len() == 1));

        assert!(archetype_node_id_condition(owner(), AslOperator::Gt, "at0004").is_err());
    }

    #[test]
    fn test_root_concept_of_other_type() {
        let condition =
            root_concept_condition(owner(), AslOperator::Eq, "openEHR-EHR-OBSERVATION.bp.v1").unwrap();
        assert_eq!(condition, AslCondition::False);
    }

    #[test]
    fn test_vo_id_condition() {
        let id = "6e3b3a4c-1d52-4b8a-9c7f-2f5a1c0e9d11";
        let plain = vo_id_condition(owner(), AslOperator::Eq, id).unwrap();
        assert!(matches!(plain, AslCondition::FieldValue(_)));

        let versioned =
            vo_id_condition(owner(), AslOperator::Eq, &format!("{id}::local::3")).unwrap();
        assert!(matches!(versioned, AslCondition::And(ref parts) if parts.len() == 2));

        assert_eq!(
            vo_id_condition(owner(), AslOperator::Eq, "nope").unwrap(),
            AslCondition::False
        );
        assert_eq!(
            vo_id_condition(owner(), AslOperator::Neq, "nope").unwrap(),
            AslCondition::True
        );
    }

    #[test]
    fn test_template_id_condition() {
        let uuid = Uuid::new_v4();
        let knowledge = aql_model::InMemoryKnowledgeCache::with_templates([
            aql_model::TemplateMetadata::new("vital_signs", uuid, "openEHR-EHR-COMPOSITION.encounter.v1"),
        ]);
        let known = template_id_condition(owner(), AslOperator::Eq, "vital_signs", &knowledge).unwrap();
        let AslCondition::FieldValue(known) = known else {
            panic!("expected comparison, got {known:?}");
        };
        assert_eq!(known.values, vec![SqlValue::Uuid(uuid)]);

        assert_eq!(
            template_id_condition(owner(), AslOperator::Eq, "other", &knowledge).unwrap(),
            AslCondition::False
        );
    }

    #[test]
    fn test_compare_field_coerces() {
        let vo_id = AslField::structure_column(owner(), StructureColumn::VoId);
        assert_eq!(
            compare_field(vo_id.clone(), AslOperator::Eq, &SqlValue::Text("x".into())),
            AslCondition::False
        );
        assert_eq!(
            compare_field(vo_id, AslOperator::Neq, &SqlValue::Long(1)),
            AslCondition::True
        );
    }

    #[test]
    fn test_reduce_conditions() {
        let leaf = AslCondition::NotNull(AslField::structure_column(owner(), StructureColumn::VoId));
        assert_eq!(
            reduce_conditions(AslCondition::And(vec![
                AslCondition::True,
                AslCondition::And(vec![leaf.clone(), AslCondition::True]),
            ])),
            leaf
        );
        assert_eq!(
            reduce_conditions(AslCondition::And(vec![leaf.clone(), AslCondition::False])),
            AslCondition::False
        );
        assert_eq!(
            reduce_conditions(AslCondition::Or(vec![AslCondition::False, AslCondition::False])),
            AslCondition::False
        );
        assert_eq!(
            reduce_conditions(AslCondition::Or(vec![leaf.clone(), AslCondition::True])),
            AslCondition::True
        );
        assert_eq!(
            reduce_conditions(AslCondition::not(AslCondition::not(leaf.clone()))),
            leaf
        );
        assert_eq!(
            reduce_conditions(AslCondition::not(AslCondition::And(vec![]))),
            AslCondition::False
        );
    }
}
