//! Containment resolution
//!
//! Every class expression of the FROM clause becomes a structure query. Children are
//! joined to their containing class: EHR children by `ehr_id`, folder items by the folder's
//! item ids and everything else by the `num`/`num_cap` range of the container row.
//!
//! Alternatives of an OR are left joined. An alternative that is a chain of several
//! classes is wrapped in an encapsulating query, so its inner joins only restrict the
//! alternative itself. The scope of the OR then requires one of the alternatives to match.

use crate::alias::AliasProvider;
use crate::conditions::{
    archetype_node_id_condition, compare_field, root_concept_condition, template_id_condition,
    unmatchable, vo_id_condition,
};
use crate::model::{
    AslCondition, AslField, AslJoin, AslJoinCondition, AslOperator, AslPlan, AslQuery,
    AslQueryKind, ColumnType, EncapsulatingQuery, FieldKind, JoinType, QueryId, SqlValue,
    StructureJoinCondition, StructureQuery,
};
use crate::query_wrapper::needs_or_wrapper;
use crate::values::primitive_value;
use aql_ast::{
    AndPredicate, AqlObjectPath, ComparisonPredicate, Containment, ContainmentClass,
    ContainmentSet, ContainmentSetOperator, PredicateOperator, PredicateValue, Primitive,
};
use aql_diagnostics::{AqlError, Result, AQL0009, AQL0103, AQL0106, AQL0110};
use aql_model::constants::{COMPOSITION, EHR, EHR_STATUS, FOLDER};
use aql_model::{
    AncestorStructureRmType, ExtractedColumn, KnowledgeCache, RmTypeAlias, SourceRelation,
    StructureColumn, StructureRmType,
};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};

/// Columns of the EHR table
pub const EHR_ID_COLUMN: &str = "id";
pub const EHR_CREATION_DATE_COLUMN: &str = "creation_date";

/// A FROM variable and the structure query it was resolved to
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedContainment {
    pub query: QueryId,
    pub rm_type: String,
}

/// Columns a structure query selects
pub fn structure_select(owner: QueryId, relation: SourceRelation, with_version: bool) -> Vec<AslField> {
    if relation == SourceRelation::Ehr {
        return vec![
            AslField::named_column(owner, EHR_ID_COLUMN, ColumnType::Uuid),
            AslField::named_column(owner, EHR_CREATION_DATE_COLUMN, ColumnType::Timestamp),
        ];
    }
    StructureColumn::ALL
        .into_iter()
        .filter(|c| !matches!(c, StructureColumn::EntityPath | StructureColumn::ItemUuids))
        .filter(|c| c.is_available(relation, with_version))
        .map(|c| AslField::structure_column(owner, c))
        .collect()
}

/// Join the version table into a structure query and select its columns
pub fn require_version_table(plan: &mut AslPlan, id: QueryId) -> Result<()> {
    let query = plan.query_mut(id);
    let alias = query.alias.clone();
    let AslQueryKind::Structure(structure) = &mut query.kind else {
        return Err(AqlError::plan(format!("{alias} is not a structure query")));
    };
    if structure.requires_version_table {
        return Ok(());
    }
    let relation = structure.relation;
    if relation.version_table().is_none() {
        return Err(AqlError::plan(format!("{alias} has no version table")));
    }
    structure.requires_version_table = true;
    query.select.extend(
        StructureColumn::ALL
            .into_iter()
            .filter(|c| c.from_version_table() && c.is_available(relation, true))
            .map(|c| AslField::structure_column(id, c)),
    );
    Ok(())
}

/// Concrete structure types a containment or path type name stands for
pub fn structure_types_of(rm_type: &str) -> Option<Vec<StructureRmType>> {
    if let Some(t) = StructureRmType::by_type_name(rm_type) {
        return Some(vec![t]);
    }
    AncestorStructureRmType::by_type_name(rm_type).map(|a| a.descendants().to_vec())
}

/// Whether rows of type `child` can be nested below rows of one of the `parents`
pub fn can_nest(parents: &[StructureRmType], child: StructureRmType) -> bool {
    let mut seen = HashSet::new();
    let mut stack = child.parents().to_vec();
    while let Some(t) = stack.pop() {
        if parents.contains(&t) {
            return true;
        }
        if seen.insert(t) {
            stack.extend_from_slice(t.parents());
        }
    }
    false
}

fn unsupported(what: impl std::fmt::Display) -> AqlError {
    AqlError::semantic(AQL0106, format!("Not supported: {what}"))
}

/// Plain attribute names of a path; predicates are not allowed
pub fn plain_attributes(path: &AqlObjectPath) -> Result<Vec<String>> {
    path.nodes
        .iter()
        .map(|n| {
            if n.predicates.is_empty() {
                Ok(n.attribute.clone())
            } else {
                Err(unsupported(format!("predicates within predicate path {path}")))
            }
        })
        .collect()
}

/// The primitive a predicate compares with
pub fn predicate_primitive(predicate: &ComparisonPredicate) -> Result<&Primitive> {
    match &predicate.value {
        PredicateValue::Primitive(p) => Ok(p),
        PredicateValue::Parameter(name) => Err(AqlError::semantic(
            AQL0009,
            format!("Missing parameter '{name}'"),
        )),
        PredicateValue::Path(path) => Err(unsupported(format!("path comparison with {path}"))),
    }
}

#[derive(Debug, Clone)]
struct ContainsParent {
    query: QueryId,
    rm_type: String,
    relation: SourceRelation,
    types: Vec<StructureRmType>,
}

/// Builds the structure queries of the FROM clause
pub struct FromCreator<'a> {
    plan: &'a mut AslPlan,
    aliases: &'a mut AliasProvider,
    knowledge: &'a dyn KnowledgeCache,
    known_templates_only: bool,
    resolved: IndexMap<String, ResolvedContainment>,
    parents: HashMap<QueryId, ContainsParent>,
    /// Conditions joining the classes of a wrapped alternative to the container outside
    deferred: Vec<AslJoinCondition>,
}

impl<'a> FromCreator<'a> {
    pub fn new(
        plan: &'a mut AslPlan,
        aliases: &'a mut AliasProvider,
        knowledge: &'a dyn KnowledgeCache,
    ) -> Self {
        Self {
            plan,
            aliases,
            knowledge,
            known_templates_only: false,
            resolved: IndexMap::new(),
            parents: HashMap::new(),
            deferred: Vec::new(),
        }
    }

    /// Treat COMPOSITION archetypes without a matching template as unsatisfiable
    pub fn known_templates_only(mut self, enabled: bool) -> Self {
        self.known_templates_only = enabled;
        self
    }

    /// Add the structure queries of the FROM clause to the root of the plan
    pub fn resolve(mut self, from: &Containment) -> Result<IndexMap<String, ResolvedContainment>> {
        let Containment::Class(class) = from else {
            return Err(unsupported("FROM clause not starting with a class expression"));
        };
        let root = self.plan.root();
        self.add_class(class, None, root, JoinType::Join)?;
        Ok(self.resolved)
    }

    /// Returns the first structure query of the expression
    fn add_containment(
        &mut self,
        containment: &Containment,
        parent: &ContainsParent,
        scope: QueryId,
        join_type: JoinType,
    ) -> Result<QueryId> {
        match containment {
            Containment::Class(class) => self.add_class(class, Some(parent), scope, join_type),
            Containment::Set(set) if set.operator == ContainmentSetOperator::And => {
                let mut head = None;
                for value in &set.values {
                    let query = self.add_containment(value, parent, scope, join_type)?;
                    head.get_or_insert(query);
                }
                head.ok_or_else(|| AqlError::plan("Empty containment set"))
            }
            Containment::Set(set) => self.add_or(set, parent, scope),
            Containment::Version(_) => Err(unsupported("VERSION containment")),
            Containment::Not(_) => Err(unsupported("NOT CONTAINS")),
        }
    }

    fn add_or(&mut self, set: &ContainmentSet, parent: &ContainsParent, scope: QueryId) -> Result<QueryId> {
        let mut alternatives = Vec::with_capacity(set.values.len());
        let mut first = None;
        for value in &set.values {
            let head = if needs_or_wrapper(value) {
                let alias = self.aliases.unique_alias("or_sq");
                let wrapper = self.plan.add(AslQuery::new(
                    alias,
                    AslQueryKind::Encapsulating(EncapsulatingQuery::default()),
                ));
                let outer = std::mem::take(&mut self.deferred);
                let head = self.add_containment(value, parent, wrapper, JoinType::Join)?;
                let on = std::mem::replace(&mut self.deferred, outer);
                self.plan.add_child(
                    scope,
                    wrapper,
                    Some(AslJoin::new(parent.query, JoinType::LeftOuter, on)),
                )?;
                head
            } else {
                self.add_containment(value, parent, scope, JoinType::LeftOuter)?
            };
            first.get_or_insert(head);
            alternatives.push(AslCondition::NotNull(AslField::structure_column(
                head,
                StructureColumn::VoId,
            )));
        }
        self.plan.add_condition_and(scope, AslCondition::Or(alternatives));
        first.ok_or_else(|| AqlError::plan("Empty containment set"))
    }

    fn add_class(
        &mut self,
        class: &ContainmentClass,
        parent: Option<&ContainsParent>,
        scope: QueryId,
        join_type: JoinType,
    ) -> Result<QueryId> {
        let query = self.create_structure_query(class, parent)?;

        let join = match parent {
            None => None,
            Some(p) if self.plan.provider_in(scope, p.query).is_ok() => Some(AslJoin::new(
                p.query,
                join_type,
                vec![self.contains_condition(p, query)?],
            )),
            Some(p) => {
                // the container is outside of this wrapper: its join condition moves to the
                // wrapper, siblings within the wrapper are matched against the first one
                let condition = self.contains_condition(p, query)?;
                self.deferred.push(condition);
                let first = self.plan.query(scope).children().first().map(|c| c.query);
                first.map(|first| {
                    AslJoin::new(first, JoinType::Join, self.sibling_condition(p, first, query))
                })
            }
        };
        self.plan.add_child(scope, query, join)?;

        if let Some(identifier) = &class.identifier {
            let previous = self.resolved.insert(
                identifier.clone(),
                ResolvedContainment {
                    query,
                    rm_type: class.rm_type.clone(),
                },
            );
            if previous.is_some() {
                return Err(AqlError::semantic(
                    AQL0103,
                    format!("Duplicate identifier: {identifier}"),
                ));
            }
        }

        if let Some(contains) = &class.contains {
            let this = self
                .parents
                .get(&query)
                .cloned()
                .ok_or_else(|| AqlError::plan("Structure query was not registered"))?;
            self.add_containment(contains, &this, scope, JoinType::Join)?;
        }
        Ok(query)
    }

    fn create_structure_query(
        &mut self,
        class: &ContainmentClass,
        parent: Option<&ContainsParent>,
    ) -> Result<QueryId> {
        let rm_type = class.rm_type.as_str();
        let type_alias = RmTypeAlias::optional_alias(rm_type);
        let prefix = match &class.identifier {
            Some(id) => format!("s{type_alias}_{id}"),
            None => format!("s{type_alias}"),
        };
        let alias = self.aliases.unique_alias(&prefix);
        let origin = class.identifier.clone().unwrap_or_else(|| rm_type.to_string());

        if rm_type == EHR {
            if parent.is_some() {
                return Err(unsupported("EHR nested in another containment"));
            }
            let id = self.plan.add(
                AslQuery::new(
                    alias,
                    AslQueryKind::Structure(StructureQuery {
                        relation: SourceRelation::Ehr,
                        rm_types: vec![EHR.to_string()],
                        requires_version_table: false,
                        attribute: None,
                    }),
                )
                .with_origin(origin),
            );
            self.plan.query_mut(id).select = structure_select(id, SourceRelation::Ehr, false);
            let condition = self.ehr_predicates(id, &class.predicates)?;
            self.plan.query_mut(id).structure_conditions.push(condition);
            self.register(id, rm_type, SourceRelation::Ehr, Vec::new());
            return Ok(id);
        }

        let types = structure_types_of(rm_type)
            .filter(|types| types.iter().all(StructureRmType::is_structure_entry))
            .ok_or_else(|| unsupported(format!("containment of type {rm_type}")))?;
        let relation = types
            .iter()
            .filter_map(StructureRmType::structure_root)
            .next()
            .map(SourceRelation::from_structure_root)
            .or_else(|| parent.filter(|p| p.relation.is_structure()).map(|p| p.relation))
            .unwrap_or(SourceRelation::Composition);

        let is_root = matches!(rm_type, COMPOSITION | EHR_STATUS | FOLDER);
        let parent_is_ehr = parent.is_some_and(|p| p.rm_type == EHR);
        let requires_version_table = (parent.is_none() || parent_is_ehr || is_root)
            && relation.version_table().is_some();

        let id = self.plan.add(
            AslQuery::new(
                alias,
                AslQueryKind::Structure(StructureQuery {
                    relation,
                    rm_types: types.iter().map(|t| t.type_name().to_string()).collect(),
                    requires_version_table,
                    attribute: None,
                }),
            )
            .with_origin(origin),
        );
        self.plan.query_mut(id).select = structure_select(id, relation, requires_version_table);

        let mut conditions = Vec::new();
        if let Some(p) = parent {
            if !self.is_possible_nesting(p, rm_type, relation, &types) {
                log::debug!("{rm_type} cannot be contained in {}", p.rm_type);
                conditions.push(AslCondition::False);
            }
        }
        if matches!(rm_type, COMPOSITION | EHR_STATUS) {
            conditions.push(AslCondition::field_value(
                AslField::structure_column(id, StructureColumn::Num),
                AslOperator::Eq,
                vec![SqlValue::Long(0)],
            ));
        } else {
            conditions.push(entity_in(id, &types));
        }
        if types.iter().all(|t| !t.is_locatable()) {
            conditions.push(AslCondition::field_value(
                AslField::structure_column(id, StructureColumn::EntityConcept),
                AslOperator::IsNull,
                Vec::new(),
            ));
        }
        let predicates = self.structure_predicates(id, rm_type, &class.predicates)?;
        conditions.push(predicates);
        self.plan.query_mut(id).structure_conditions.extend(conditions);

        self.register(id, rm_type, relation, types);
        Ok(id)
    }

    fn register(&mut self, query: QueryId, rm_type: &str, relation: SourceRelation, types: Vec<StructureRmType>) {
        self.parents.insert(
            query,
            ContainsParent {
                query,
                rm_type: rm_type.to_string(),
                relation,
                types,
            },
        );
    }

    fn is_possible_nesting(
        &self,
        parent: &ContainsParent,
        rm_type: &str,
        relation: SourceRelation,
        types: &[StructureRmType],
    ) -> bool {
        if parent.rm_type == EHR {
            return true;
        }
        if parent.rm_type == FOLDER && rm_type == COMPOSITION {
            return true;
        }
        parent.relation == relation && types.iter().any(|t| can_nest(&parent.types, *t))
    }

    fn contains_condition(&mut self, parent: &ContainsParent, child: QueryId) -> Result<AslJoinCondition> {
        let child_info = self
            .parents
            .get(&child)
            .ok_or_else(|| AqlError::plan("Structure query was not registered"))?;
        let structure = StructureJoinCondition {
            parent: parent.query,
            parent_relation: parent.relation,
            child,
            child_relation: child_info.relation,
        };
        if parent.rm_type == EHR {
            return Ok(AslJoinCondition::Descendant {
                structure,
                parent_is_root: true,
            });
        }
        if parent.rm_type == FOLDER && child_info.rm_type == COMPOSITION {
            let folder = self.plan.query_mut(parent.query);
            if !folder.select.iter().any(|f| f.kind == FieldKind::FolderItemIds) {
                folder
                    .select
                    .push(AslField::new(parent.query, FieldKind::FolderItemIds));
            }
            return Ok(AslJoinCondition::FolderItem(structure));
        }
        Ok(AslJoinCondition::Descendant {
            structure,
            parent_is_root: matches!(parent.rm_type.as_str(), COMPOSITION | EHR_STATUS),
        })
    }

    /// Conditions relating two classes of the same alternative
    fn sibling_condition(&self, parent: &ContainsParent, first: QueryId, query: QueryId) -> Vec<AslJoinCondition> {
        let column = if parent.rm_type == EHR {
            StructureColumn::EhrId
        } else if parent.rm_type == FOLDER {
            return Vec::new();
        } else {
            StructureColumn::VoId
        };
        let first_is_structure = self
            .plan
            .query(first)
            .as_structure()
            .is_some();
        if !first_is_structure {
            return Vec::new();
        }
        vec![AslJoinCondition::FieldEquals(
            AslField::structure_column(first, column),
            AslField::structure_column(query, column),
        )]
    }

    fn structure_predicates(
        &mut self,
        id: QueryId,
        rm_type: &str,
        predicates: &[AndPredicate],
    ) -> Result<AslCondition> {
        if predicates.is_empty() {
            return Ok(AslCondition::True);
        }
        let mut alternatives = Vec::with_capacity(predicates.len());
        for and in predicates {
            if rm_type == COMPOSITION && self.known_templates_only && self.template_conflict(and) {
                alternatives.push(AslCondition::False);
                continue;
            }
            let mut operands = Vec::with_capacity(and.operands.len());
            for operand in &and.operands {
                operands.push(self.structure_operand(id, rm_type, operand)?);
            }
            alternatives.push(AslCondition::And(operands));
        }
        Ok(AslCondition::Or(alternatives))
    }

    /// A required template whose root archetype differs from the required archetype
    fn template_conflict(&self, and: &AndPredicate) -> bool {
        let required = |wanted: fn(&ComparisonPredicate) -> bool| {
            and.operands
                .iter()
                .filter(|p| wanted(p) && p.operator == PredicateOperator::Eq)
                .find_map(|p| predicate_primitive(p).ok().and_then(|v| v.as_str()))
        };
        let archetype = required(ComparisonPredicate::is_archetype_node_id);
        let template = required(|p| {
            matches!(ExtractedColumn::find(COMPOSITION, &p.path), Some(ExtractedColumn::TemplateId))
        });
        let (Some(archetype), Some(template)) = (archetype, template) else {
            return false;
        };
        match self.knowledge.resolve_template_root_archetype(template) {
            Some(root) if root != archetype => {
                log::debug!("Template {template} has root archetype {root}, not {archetype}");
                true
            }
            _ => false,
        }
    }

    fn structure_operand(
        &mut self,
        id: QueryId,
        rm_type: &str,
        predicate: &ComparisonPredicate,
    ) -> Result<AslCondition> {
        let value = predicate_primitive(predicate)?;
        let operator = AslOperator::from(predicate.operator);

        if predicate.is_archetype_node_id() {
            let archetype = value.as_str().ok_or_else(|| {
                AqlError::semantic(AQL0110, format!("Invalid archetype id: {value}"))
            })?;
            if rm_type != COMPOSITION {
                return archetype_node_id_condition(id, operator, archetype);
            }
            require_version_table(self.plan, id)?;
            if self.known_templates_only
                && self.knowledge.templates_matching(archetype).is_empty()
            {
                log::debug!("No template with root archetype {archetype}");
                return Ok(unmatchable(operator));
            }
            return root_concept_condition(id, operator, archetype);
        }

        match ExtractedColumn::find(rm_type, &predicate.path) {
            Some(ExtractedColumn::NameValue) => Ok(compare_field(
                AslField::structure_column(id, StructureColumn::EntityName),
                operator,
                &primitive_value(value),
            )),
            Some(ExtractedColumn::VoId) => {
                require_version_table(self.plan, id)?;
                match value.as_str() {
                    Some(uid) => vo_id_condition(id, operator, uid),
                    None => Ok(unmatchable(operator)),
                }
            }
            Some(ExtractedColumn::TemplateId) => {
                require_version_table(self.plan, id)?;
                match value.as_str() {
                    Some(template_id) => template_id_condition(id, operator, template_id, self.knowledge),
                    None => Ok(unmatchable(operator)),
                }
            }
            _ => {
                let path = plain_attributes(&predicate.path)?;
                let data = AslField::structure_column(id, StructureColumn::Data);
                Ok(AslCondition::field_value(
                    AslField::rm_path(data, path, ColumnType::Jsonb),
                    operator,
                    vec![primitive_value(value)],
                ))
            }
        }
    }

    fn ehr_predicates(&self, id: QueryId, predicates: &[AndPredicate]) -> Result<AslCondition> {
        if predicates.is_empty() {
            return Ok(AslCondition::True);
        }
        let mut alternatives = Vec::with_capacity(predicates.len());
        for and in predicates {
            let mut operands = Vec::with_capacity(and.operands.len());
            for operand in &and.operands {
                let value = primitive_value(predicate_primitive(operand)?);
                let operator = AslOperator::from(operand.operator);
                let column = match ExtractedColumn::find(EHR, &operand.path) {
                    Some(ExtractedColumn::EhrId) => {
                        AslField::named_column(id, EHR_ID_COLUMN, ColumnType::Uuid)
                    }
                    Some(ExtractedColumn::EhrTimeCreated | ExtractedColumn::EhrTimeCreatedDv) => {
                        AslField::named_column(id, EHR_CREATION_DATE_COLUMN, ColumnType::Timestamp)
                    }
                    _ => return Err(unsupported(format!("EHR predicate on {}", operand.path))),
                };
                operands.push(compare_field(column, operator, &value));
            }
            alternatives.push(AslCondition::And(operands));
        }
        Ok(AslCondition::Or(alternatives))
    }
}

/// `rm_entity IN (...)` for the given structure types
pub fn entity_in(owner: QueryId, types: &[StructureRmType]) -> AslCondition {
    AslCondition::field_value(
        AslField::structure_column(owner, StructureColumn::RmEntity),
        AslOperator::In,
        types
            .iter()
            .map(|t| SqlValue::Text(t.alias().to_string()))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_nesting_rules() {
        use StructureRmType::{Cluster, Composition, Element, Observation, Section};
        assert!(can_nest(&[Composition], Observation));
        assert!(can_nest(&[Section], Observation));
        assert!(can_nest(&[Observation], Cluster));
        assert!(can_nest(&[Composition], Element));
        assert!(!can_nest(&[Observation], Composition));
        assert!(!can_nest(&[Element], Cluster));
    }

    #[test]
    fn test_structure_types() {
        assert_eq!(
            structure_types_of("OBSERVATION"),
            Some(vec![StructureRmType::Observation])
        );
        assert!(structure_types_of("CARE_ENTRY").is_some_and(|t| t.len() > 1));
        assert_eq!(structure_types_of("DV_TEXT"), None);
    }

    #[test]
    fn test_structure_select() {
        let id = AslPlan::new().root();
        let without = structure_select(id, SourceRelation::Composition, false);
        assert!(without.iter().all(|f| f.column_name() != Some("sys_version")));
        assert!(without.iter().any(|f| f.column_name() == Some("data")));

        let with = structure_select(id, SourceRelation::Composition, true);
        assert!(with.iter().any(|f| f.column_name() == Some("sys_version")));
        assert!(with.iter().any(|f| f.column_name() == Some("ehr_id")));

        let ehr = structure_select(id, SourceRelation::Ehr, true);
        assert_eq!(
            ehr.iter().filter_map(AslField::column_name).collect::<Vec<_>>(),
            vec!["id", "creation_date"]
        );
    }
}
