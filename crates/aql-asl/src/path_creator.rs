//! Path resolution
//!
//! Walks the cohesion tree of every FROM variable, starting at the structure query the
//! variable was resolved to:
//! - structure nodes become path structure queries joined to their parent row
//! - data nodes become JSON paths below the `data` column of the closest structure row,
//!   unnested by a lateral path data query where an attribute is multiple valued
//! - paths answered by physical columns use those columns
//! - paths ending at a structure node reassemble the RM object from its rows
//!
//! Paths with predicates beyond those of their tree node are filtered afterwards.

use crate::alias::AliasProvider;
use crate::conditions::{archetype_node_id_condition, compare_field, root_concept_condition};
use crate::from_creator::{
    entity_in, plain_attributes, predicate_primitive, require_version_table, structure_select,
    ResolvedContainment, EHR_CREATION_DATE_COLUMN, EHR_ID_COLUMN,
};
use crate::model::{
    AslCondition, AslField, AslJoin, AslJoinCondition, AslOperator, AslPlan, AslQuery,
    AslQueryKind, ColumnType, EncapsulatingQuery, FieldKind, FilteringQuery, JoinType,
    PathDataQuery, QueryId, RmObjectDataQuery, SqlValue, StructureJoinCondition,
    StructureQuery, SubqueryField,
};
use crate::values::primitive_value;
use aql_analysis::{JoinMode, NodeCategory, PathCohesionTreeNode, PathInfo};
use aql_ast::{AndPredicate, AqlObjectPath, AqlQuery, ComparisonPredicate, IdentifiedPath};
use aql_diagnostics::{AqlError, Result, AQL0102, AQL0106, AQL0110};
use aql_model::constants::{COMPOSITION, EHR};
use aql_model::{
    ExtractedColumn, FoundationType, RmAttributeAlias, StructureColumn, StructureRmType,
};
use indexmap::IndexMap;
use std::collections::HashMap;

/// Column of a path data query holding the unnested JSON value
pub const PATH_DATA_COLUMN: &str = "data";
/// Column of a filtering query re-projecting a computed value
pub const FILTERED_COLUMN: &str = "value";

/// Where the values of a cohesion tree node are read from
#[derive(Debug, Clone)]
enum NodeSource {
    /// Rows of a structure query
    Structure { query: QueryId, types: Vec<String> },
    /// JSON at `path` below `field`; `enforced` if the node's predicates already restrict
    /// the rows
    Data {
        field: AslField,
        path: Vec<String>,
        enforced: bool,
    },
}

impl NodeSource {
    fn enforces_predicates(&self) -> bool {
        match self {
            NodeSource::Structure { .. } => true,
            NodeSource::Data { enforced, .. } => *enforced,
        }
    }
}

/// A structure node being resolved
#[derive(Debug, Clone)]
struct StructureContext {
    query: QueryId,
    scope: QueryId,
    types: Vec<String>,
    mode: JoinMode,
}

fn unsupported(what: impl std::fmt::Display) -> AqlError {
    AqlError::semantic(AQL0106, format!("Not supported: {what}"))
}

/// The extracted column a path below a node maps to, if it does for every type of the node
fn find_extracted(types: &[String], path: &AqlObjectPath) -> Option<ExtractedColumn> {
    let mut found = None;
    for rm_type in types {
        let column = ExtractedColumn::find(rm_type, path)?;
        if found.is_some_and(|f| f != column) {
            return None;
        }
        found = Some(column);
    }
    found
}

/// Resolves the identified paths of a query to fields of the plan
pub struct PathCreator<'a> {
    plan: &'a mut AslPlan,
    aliases: &'a mut AliasProvider,
    external: QueryId,
    system_id: &'a str,
    fields: IndexMap<IdentifiedPath, AslField>,
}

impl<'a> PathCreator<'a> {
    pub fn new(
        plan: &'a mut AslPlan,
        aliases: &'a mut AliasProvider,
        external: QueryId,
        system_id: &'a str,
    ) -> Self {
        Self {
            plan,
            aliases,
            external,
            system_id,
            fields: IndexMap::new(),
        }
    }

    /// Fields for every identified path of the query
    pub fn create(
        mut self,
        query: &AqlQuery,
        path_infos: &IndexMap<String, PathInfo>,
        containments: &IndexMap<String, ResolvedContainment>,
    ) -> Result<IndexMap<IdentifiedPath, AslField>> {
        let root = self.plan.root();
        for (identifier, info) in path_infos {
            let containment = containments.get(identifier).ok_or_else(|| {
                AqlError::semantic(AQL0102, format!("Unknown identifier: {identifier}"))
            })?;
            let mut sources = HashMap::new();
            let tree = info.cohesion_tree_root();
            let context = StructureContext {
                query: containment.query,
                scope: root,
                types: vec![containment.rm_type.clone()],
                mode: info.join_mode(tree)?,
            };
            self.add_structure_node(info, tree, &context, &mut sources)?;
            self.add_filters(info, tree, &sources)?;
        }

        for path in query.identified_paths() {
            let Some(containment) = containments.get(&path.root) else {
                return Err(AqlError::semantic(
                    AQL0102,
                    format!("Unknown identifier: {}", path.root),
                ));
            };
            if containment.rm_type == EHR && !self.fields.contains_key(path) {
                let field = self.ehr_field(containment.query, path)?;
                self.fields.insert(path.clone(), field);
            }
        }
        log::debug!("Resolved {} paths", self.fields.len());
        Ok(self.fields)
    }

    fn ehr_field(&self, ehr: QueryId, path: &IdentifiedPath) -> Result<AslField> {
        if !path.root_predicates.is_empty() {
            return Err(unsupported(format!("predicates on EHR path {path}")));
        }
        let Some(object_path) = &path.path else {
            return Err(unsupported("selecting a whole EHR"));
        };
        let field = match ExtractedColumn::find(EHR, object_path) {
            Some(column @ ExtractedColumn::EhrId) => {
                AslField::named_column(ehr, EHR_ID_COLUMN, ColumnType::Uuid)
                    .with_extracted_column(column)
            }
            Some(
                column @ (ExtractedColumn::EhrTimeCreated | ExtractedColumn::EhrTimeCreatedDv),
            ) => AslField::named_column(ehr, EHR_CREATION_DATE_COLUMN, ColumnType::Timestamp)
                .with_extracted_column(column),
            Some(column @ (ExtractedColumn::EhrSystemId | ExtractedColumn::EhrSystemIdDv)) => {
                AslField::constant(self.external, SqlValue::Text(self.system_id.to_string()))
                    .with_extracted_column(column)
            }
            _ => return Err(unsupported(format!("path {path} of EHR"))),
        };
        Ok(field)
    }

    // === Structure nodes ===

    fn add_structure_node(
        &mut self,
        info: &PathInfo,
        node: &PathCohesionTreeNode,
        context: &StructureContext,
        sources: &mut HashMap<usize, NodeSource>,
    ) -> Result<()> {
        sources.insert(
            node.id(),
            NodeSource::Structure {
                query: context.query,
                types: context.types.clone(),
            },
        );

        if !node.paths_ending_at_node().is_empty() {
            let object = self.rm_object_query(context.query)?;
            for path in node.paths_ending_at_node() {
                let field = AslField::new(
                    context.query,
                    FieldKind::Subquery(SubqueryField {
                        query: object,
                        filter_conditions: Vec::new(),
                    }),
                );
                self.fields.insert(path.clone(), field);
            }
        }

        let depth = info.path_to_node(node).len();
        for path in node.paths() {
            if self.fields.contains_key(path) {
                continue;
            }
            let relative = path.object_path().sub_path(depth, usize::MAX);
            if relative.is_empty() {
                continue;
            }
            if let Some(column) = find_extracted(&context.types, &relative) {
                let field = self.extracted_field(context.query, column)?;
                self.fields.insert(path.clone(), field);
            }
        }

        let mut structure_children = Vec::new();
        self.add_children(info, node.children(), &[], context, sources, &mut structure_children)?;

        if context.mode == JoinMode::InternalFork && !structure_children.is_empty() {
            let alternatives = structure_children
                .iter()
                .map(|q| AslCondition::NotNull(AslField::structure_column(*q, StructureColumn::VoId)))
                .collect();
            self.plan
                .add_condition_and(context.scope, AslCondition::Or(alternatives));
        }
        Ok(())
    }

    /// Children of a structure node; `via` are the attributes of intermediate objects
    /// that are stored in the JSON of the structure row
    fn add_children(
        &mut self,
        info: &PathInfo,
        children: &[PathCohesionTreeNode],
        via: &[String],
        context: &StructureContext,
        sources: &mut HashMap<usize, NodeSource>,
        structure_children: &mut Vec<QueryId>,
    ) -> Result<()> {
        let data = AslField::structure_column(context.query, StructureColumn::Data);
        for child in children {
            match info.node_category(child) {
                category if category.is_data() => {
                    self.add_data_node(info, child, &data, via, context.scope, sources)?;
                }
                NodeCategory::StructureIntermediate => {
                    let mut path = via.to_vec();
                    path.push(child.attribute().attribute.clone());
                    let field = AslField::rm_path(data.clone(), path.clone(), ColumnType::Jsonb);
                    for ending in child.paths_ending_at_node() {
                        self.fields
                            .entry(ending.clone())
                            .or_insert_with(|| field.clone());
                    }
                    sources.insert(
                        child.id(),
                        NodeSource::Data {
                            field: data.clone(),
                            path: path.clone(),
                            enforced: false,
                        },
                    );
                    self.add_children(info, child.children(), &path, context, sources, structure_children)?;
                }
                _ => {
                    let query = self.add_structure_child(info, child, via, context, sources)?;
                    structure_children.push(query);
                }
            }
        }
        Ok(())
    }

    fn add_structure_child(
        &mut self,
        info: &PathInfo,
        child: &PathCohesionTreeNode,
        via: &[String],
        parent: &StructureContext,
        sources: &mut HashMap<usize, NodeSource>,
    ) -> Result<QueryId> {
        let relation = self
            .plan
            .query(parent.query)
            .as_structure()
            .map(|s| s.relation)
            .ok_or_else(|| AqlError::plan("Path structure below a non-structure query"))?;
        let types: Vec<StructureRmType> = info
            .target_types(child)
            .iter()
            .filter_map(|t| StructureRmType::by_type_name(t))
            .filter(StructureRmType::is_structure_entry)
            .collect();
        if types.is_empty() {
            return Err(AqlError::plan(format!(
                "No structure type at {}",
                child.attribute()
            )));
        }

        let attribute = child.attribute().attribute.clone();
        let alias = self.aliases.unique_alias(&format!("p_{attribute}"));
        let origin = info
            .path_to_node(child)
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("/");
        let id = self.plan.add(
            AslQuery::new(
                alias,
                AslQueryKind::Structure(StructureQuery {
                    relation,
                    rm_types: types.iter().map(|t| t.type_name().to_string()).collect(),
                    requires_version_table: false,
                    attribute: Some(attribute.clone()),
                }),
            )
            .with_origin(origin),
        );
        self.plan.query_mut(id).select = structure_select(id, relation, false);

        let type_names: Vec<String> = types.iter().map(|t| t.type_name().to_string()).collect();
        let mut conditions = vec![entity_in(id, &types)];
        if via.is_empty() {
            conditions.push(AslCondition::field_value(
                AslField::structure_column(id, StructureColumn::EntityAttribute),
                AslOperator::Eq,
                vec![SqlValue::Text(RmAttributeAlias::get_alias(&attribute)?.to_string())],
            ));
        }
        let source = NodeSource::Structure {
            query: id,
            types: type_names.clone(),
        };
        conditions.push(self.predicate_condition(&source, &child.attribute().predicates)?);
        self.plan.query_mut(id).structure_conditions.extend(conditions);

        let structure = StructureJoinCondition {
            parent: parent.query,
            parent_relation: relation,
            child: id,
            child_relation: relation,
        };
        let on = if via.is_empty() {
            AslJoinCondition::PathChild(structure)
        } else {
            AslJoinCondition::Descendant {
                structure,
                parent_is_root: false,
            }
        };

        let scope = if parent.mode == JoinMode::InternalSingleChild {
            self.plan.add_child(
                parent.scope,
                id,
                Some(AslJoin::new(parent.query, JoinType::Join, vec![on])),
            )?;
            parent.scope
        } else {
            let encapsulating = self.plan.add(AslQuery::new(
                self.aliases.unique_alias("p_eq"),
                AslQueryKind::Encapsulating(EncapsulatingQuery::default()),
            ));
            self.plan.add_child(encapsulating, id, None)?;
            self.plan.add_child(
                parent.scope,
                encapsulating,
                Some(AslJoin::new(parent.query, JoinType::LeftOuter, vec![on])),
            )?;
            encapsulating
        };

        let context = StructureContext {
            query: id,
            scope,
            types: type_names,
            mode: info.join_mode(child)?,
        };
        self.add_structure_node(info, child, &context, sources)?;
        Ok(id)
    }

    fn extracted_field(&mut self, owner: QueryId, column: ExtractedColumn) -> Result<AslField> {
        if column.requires_version_table() {
            require_version_table(self.plan, owner)?;
        }
        let field = match column {
            ExtractedColumn::NameValue => {
                AslField::structure_column(owner, StructureColumn::EntityName)
            }
            ExtractedColumn::RootConcept => {
                AslField::structure_column(owner, StructureColumn::RootConcept)
            }
            ExtractedColumn::TemplateId => {
                AslField::structure_column(owner, StructureColumn::TemplateId)
            }
            ExtractedColumn::VoId | ExtractedColumn::ArchetypeNodeId => {
                AslField::new(owner, FieldKind::ComplexExtracted(column))
            }
            other => {
                return Err(AqlError::plan(format!(
                    "{other:?} is not a column of a structure query"
                )));
            }
        };
        Ok(field.with_extracted_column(column))
    }

    fn rm_object_query(&mut self, base: QueryId) -> Result<QueryId> {
        let relation = self
            .plan
            .query(base)
            .as_structure()
            .map(|s| s.relation)
            .ok_or_else(|| AqlError::plan("RM object of a non-structure query"))?;
        let alias = self.aliases.unique_alias(&format!("{}_obj", self.plan.alias(base)));
        Ok(self.plan.add(AslQuery::new(
            alias,
            AslQueryKind::RmObjectData(RmObjectDataQuery { base, relation }),
        )))
    }

    // === Data nodes ===

    fn add_data_node(
        &mut self,
        info: &PathInfo,
        node: &PathCohesionTreeNode,
        src: &AslField,
        src_path: &[String],
        scope: QueryId,
        sources: &mut HashMap<usize, NodeSource>,
    ) -> Result<()> {
        if node.paths().iter().all(|p| self.fields.contains_key(p)) {
            return Ok(());
        }
        let mut path = src_path.to_vec();
        path.push(node.attribute().attribute.clone());

        let (field, path, enforced) = if info.is_multiple_valued(node) {
            let query = self.path_data_query(src.clone(), path, scope)?;
            let field = AslField::named_column(query, PATH_DATA_COLUMN, ColumnType::Jsonb);
            // unnested elements not matching the node's predicates are dropped by the join
            let predicates = &node.attribute().predicates;
            if !predicates.is_empty() {
                let element = NodeSource::Data {
                    field: field.clone(),
                    path: Vec::new(),
                    enforced: true,
                };
                let condition = self.predicate_condition(&element, predicates)?;
                if let Some(join) = self.plan.join_of_mut(query) {
                    join.on.push(AslJoinCondition::Filter(condition));
                }
            }
            (field, Vec::new(), true)
        } else {
            (src.clone(), path, false)
        };
        sources.insert(
            node.id(),
            NodeSource::Data {
                field: field.clone(),
                path: path.clone(),
                enforced,
            },
        );

        let types = info.target_types(node);
        let is_text = !types.is_empty()
            && types
                .iter()
                .all(|t| t == FoundationType::String.type_name());
        let leaf = if path.is_empty() && !is_text {
            field.clone()
        } else {
            let column_type = if is_text { ColumnType::Text } else { ColumnType::Jsonb };
            AslField::rm_path(field.clone(), path.clone(), column_type)
        }
        .with_dv_ordered_types(info.dv_ordered_types(node).clone());

        for ending in node.paths_ending_at_node() {
            self.fields
                .entry(ending.clone())
                .or_insert_with(|| leaf.clone());
        }
        for child in node.children() {
            self.add_data_node(info, child, &field, &path, scope, sources)?;
        }
        Ok(())
    }

    fn path_data_query(&mut self, data: AslField, path: Vec<String>, scope: QueryId) -> Result<QueryId> {
        let base = data.owner;
        let name = path.last().cloned().unwrap_or_default();
        let alias = self.aliases.unique_alias(&format!("pd_{name}"));
        let id = self.plan.add(AslQuery::new(
            alias,
            AslQueryKind::PathData(PathDataQuery {
                base,
                data_field: data,
                path,
                multiple_valued: true,
            }),
        ));
        self.plan.query_mut(id).select =
            vec![AslField::named_column(id, PATH_DATA_COLUMN, ColumnType::Jsonb)];
        self.plan.add_child(
            scope,
            id,
            Some(AslJoin::new(base, JoinType::LeftOuter, Vec::new())),
        )?;
        Ok(id)
    }

    // === Predicates ===

    fn predicate_condition(&mut self, source: &NodeSource, predicates: &[AndPredicate]) -> Result<AslCondition> {
        if predicates.is_empty() {
            return Ok(AslCondition::True);
        }
        let mut alternatives = Vec::with_capacity(predicates.len());
        for and in predicates {
            let mut operands = Vec::with_capacity(and.operands.len());
            for operand in &and.operands {
                operands.push(self.operand_condition(source, operand)?);
            }
            alternatives.push(AslCondition::And(operands));
        }
        Ok(AslCondition::Or(alternatives))
    }

    fn operand_condition(&mut self, source: &NodeSource, predicate: &ComparisonPredicate) -> Result<AslCondition> {
        let value = predicate_primitive(predicate)?;
        let operator = AslOperator::from(predicate.operator);
        match source {
            NodeSource::Structure { query, types } => {
                if predicate.is_archetype_node_id() {
                    let archetype = value.as_str().ok_or_else(|| {
                        AqlError::semantic(AQL0110, format!("Invalid archetype id: {value}"))
                    })?;
                    if types.iter().any(|t| t == COMPOSITION) {
                        require_version_table(self.plan, *query)?;
                        return root_concept_condition(*query, operator, archetype);
                    }
                    return archetype_node_id_condition(*query, operator, archetype);
                }
                if find_extracted(types, &predicate.path) == Some(ExtractedColumn::NameValue) {
                    return Ok(compare_field(
                        AslField::structure_column(*query, StructureColumn::EntityName),
                        operator,
                        &primitive_value(value),
                    ));
                }
                let data = AslField::structure_column(*query, StructureColumn::Data);
                Ok(AslCondition::field_value(
                    AslField::rm_path(data, plain_attributes(&predicate.path)?, ColumnType::Jsonb),
                    operator,
                    vec![primitive_value(value)],
                ))
            }
            NodeSource::Data { field, path, .. } => {
                let mut full = path.clone();
                full.extend(plain_attributes(&predicate.path)?);
                Ok(AslCondition::field_value(
                    AslField::rm_path(field.clone(), full, ColumnType::Jsonb),
                    operator,
                    vec![primitive_value(value)],
                ))
            }
        }
    }

    // === Filtering ===

    /// Restrict paths whose segments carry predicates the tree nodes do not enforce
    fn add_filters(
        &mut self,
        info: &PathInfo,
        tree: &PathCohesionTreeNode,
        sources: &HashMap<usize, NodeSource>,
    ) -> Result<()> {
        let mut filters: IndexMap<IdentifiedPath, Vec<AslCondition>> = IndexMap::new();
        if let Some(source) = sources.get(&tree.id()) {
            for path in tree.paths() {
                if !path.root_predicates.is_empty() {
                    let condition = self.predicate_condition(source, &path.root_predicates)?;
                    filters.entry(path.clone()).or_default().push(condition);
                }
            }
        }
        self.collect_filters(info, tree, sources, &mut filters)?;

        let root = self.plan.root();
        for (path, conditions) in filters {
            let Some(field) = self.fields.get_mut(&path) else {
                continue;
            };
            let condition = AslCondition::And(conditions);
            if let FieldKind::Subquery(subquery) = &mut field.kind {
                subquery.filter_conditions.push(condition);
                continue;
            }
            let source = field.clone();
            let filtered = self.filtering_query(root, source, condition)?;
            self.fields.insert(path, filtered);
        }
        Ok(())
    }

    fn collect_filters(
        &mut self,
        info: &PathInfo,
        node: &PathCohesionTreeNode,
        sources: &HashMap<usize, NodeSource>,
        filters: &mut IndexMap<IdentifiedPath, Vec<AslCondition>>,
    ) -> Result<()> {
        for child in node.children() {
            let depth = info.path_to_node(child).len();
            if let Some(source) = sources.get(&child.id()) {
                for path in child.paths() {
                    let Some(segment) = path
                        .path
                        .as_ref()
                        .and_then(|p| p.nodes.get(depth.saturating_sub(1)))
                    else {
                        continue;
                    };
                    if segment.predicates.is_empty()
                        || (segment.predicates == child.attribute().predicates
                            && source.enforces_predicates())
                    {
                        continue;
                    }
                    let condition = self.predicate_condition(source, &segment.predicates)?;
                    filters.entry(path.clone()).or_default().push(condition);
                }
            }
            self.collect_filters(info, child, sources, filters)?;
        }
        Ok(())
    }

    fn filtering_query(&mut self, scope: QueryId, source: AslField, condition: AslCondition) -> Result<AslField> {
        let alias = self
            .aliases
            .unique_alias(&format!("{}_f", self.plan.alias(source.owner)));
        let id = self.plan.add(AslQuery::new(
            alias,
            AslQueryKind::Filtering(FilteringQuery {
                source: source.clone(),
            }),
        ));
        let (select, result) = match &source.kind {
            FieldKind::ComplexExtracted(column) => (
                column
                    .columns()
                    .iter()
                    .map(|c| AslField::structure_column(id, *c))
                    .collect(),
                AslField::new(id, FieldKind::ComplexExtracted(*column)),
            ),
            FieldKind::Column(_) => {
                let field = source.with_owner(id);
                (vec![field.clone()], field)
            }
            _ => {
                let mut field = AslField::named_column(id, FILTERED_COLUMN, source.column_type());
                if let Some(types) = source.dv_ordered_types() {
                    field = field.with_dv_ordered_types(types.clone());
                }
                (vec![field.clone()], field)
            }
        };
        let result = match source.extracted_column {
            Some(column) => result.with_extracted_column(column),
            None => result,
        };
        self.plan.query_mut(id).select = select;
        self.plan.add_child(
            scope,
            id,
            Some(AslJoin::new(
                source.owner,
                JoinType::LeftOuter,
                vec![AslJoinCondition::Filter(condition)],
            )),
        )?;
        Ok(result)
    }
}
