//! SQL synthesis
//!
//! Every relational query of the plan becomes a subselect aliased by the query's alias.
//! Columns leave a subselect as `<owner alias>_<column>`, so an encapsulating query can
//! re-export all columns of its children with `"child".*` without name clashes.
//!
//! - structure queries select from their data table, joined with the version table when needed
//! - path data and filtering queries are `LATERAL` subselects over the columns of their siblings
//! - RM object fields are correlated `jsonb_object_agg` subqueries over the descendant rows
//! - every literal is bound as a typed `$n` placeholder

use crate::dialect::{
    quote_ident, quote_literal, SqlDialect, DV_ORDERED_MAGNITUDE, JSONB_OBJECT_AGG,
    MAX_DV_ORDERED, MIN_DV_ORDERED,
};
use crate::params::BindParams;
use aql_asl::conditions::reduce_conditions;
use aql_asl::{
    AggregatingField, AslCondition, AslField, AslJoinCondition, AslOperator, AslPlan,
    AslQueryKind, ColumnType, DvOrderedCondition, FieldKind, FieldValueCondition,
    FilteringQuery, JoinType, PathDataQuery, QueryId, SqlValue, StructureJoinCondition,
    StructureQuery, SubqueryField, FOLDER_ITEM_IDS, PATH_DATA_COLUMN,
};
use aql_ast::{AggregateFunctionName, OrderByDirection};
use aql_diagnostics::{AqlError, Result};
use aql_model::alias::TYPE_ATTRIBUTE;
use aql_model::constants::ARCHETYPE_PREFIX;
use aql_model::schema::{EHR_FOLDER_DATA, TEMPLATE_STORE};
use aql_model::{ExtractedColumn, RmAttributeAlias, SourceRelation, StructureColumn, StructureRmType};

/// A rendered statement with the values of its placeholders
#[derive(Debug, Clone, PartialEq)]
pub struct BoundQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
    /// Names of the result columns, in SELECT order
    pub columns: Vec<String>,
}

/// Where a field reference is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    /// Within a structure query: its own fields are columns of its tables
    Table(QueryId),
    /// Within an encapsulating or root query: fields are columns of its children
    Query(QueryId),
}

/// Renders a plan into a single PostgreSQL statement
pub struct SqlBinder<'a> {
    plan: &'a AslPlan,
    dialect: &'a SqlDialect,
    system_id: &'a str,
    params: BindParams,
}

impl<'a> SqlBinder<'a> {
    pub fn new(plan: &'a AslPlan, dialect: &'a SqlDialect, system_id: &'a str) -> Self {
        Self {
            plan,
            dialect,
            system_id,
            params: BindParams::new(),
        }
    }

    pub fn bind(mut self) -> Result<BoundQuery> {
        let (sql, columns) = self.root_query()?;
        log::debug!("Bound statement with {} parameters", self.params.len());
        log::trace!("SQL:\n{sql}");
        Ok(BoundQuery {
            sql,
            params: self.params.into_values(),
            columns,
        })
    }

    // === Queries ===

    fn root_query(&mut self) -> Result<(String, Vec<String>)> {
        let plan = self.plan;
        let root = plan.root();
        let scope = Scope::Query(root);
        let query = plan.root_query();

        let mut columns = Vec::with_capacity(query.select.len());
        let mut select = Vec::with_capacity(query.select.len());
        for (idx, field) in query.select.iter().enumerate() {
            let name = format!("c{idx}");
            select.push(format!("{} AS {}", self.output_expr(field, scope)?, quote_ident(&name)));
            columns.push(name);
        }
        let mut sql = format!("SELECT {}", select.join(", "));

        let from = self.from_clause(root, "\n")?;
        if !from.is_empty() {
            sql.push_str("\nFROM ");
            sql.push_str(&from);
        }
        if let Some(condition) = self.where_clause(plan.query(root).condition.iter().cloned(), scope)? {
            sql.push_str("\nWHERE ");
            sql.push_str(&condition);
        }

        // grouped and ordered fields are selected; they are referenced by position so that
        // placeholders within their expressions need not repeat
        let mut group_by = Vec::new();
        for field in &query.group_by {
            group_by.push(self.selected_or_expr(&query.select, field, scope)?);
        }
        for field in &query.group_by_dv_ordered_magnitude {
            group_by.push(self.magnitude(field, scope)?);
        }
        if !group_by.is_empty() {
            sql.push_str("\nGROUP BY ");
            sql.push_str(&group_by.join(", "));
        }

        let mut order_by = Vec::with_capacity(query.order_by.len());
        for order in &query.order_by {
            let expr = if order.field.is_dv_ordered() {
                self.magnitude(&order.field, scope)?
            } else {
                self.selected_or_expr(&query.select, &order.field, scope)?
            };
            let direction = match order.direction {
                OrderByDirection::Asc => "ASC",
                OrderByDirection::Desc => "DESC",
            };
            order_by.push(format!("{expr} {direction}"));
        }
        if !order_by.is_empty() {
            sql.push_str("\nORDER BY ");
            sql.push_str(&order_by.join(", "));
        }

        if let Some(limit) = query.limit {
            sql.push_str(&format!("\nLIMIT {limit}"));
        }
        if let Some(offset) = query.offset {
            sql.push_str(&format!("\nOFFSET {offset}"));
        }
        Ok((sql, columns))
    }

    fn selected_or_expr(&mut self, select: &[AslField], field: &AslField, scope: Scope) -> Result<String> {
        match select.iter().position(|f| f == field) {
            Some(idx) => Ok((idx + 1).to_string()),
            None => self.output_expr(field, scope),
        }
    }

    /// Children of an encapsulating query, joined
    fn from_clause(&mut self, id: QueryId, separator: &str) -> Result<String> {
        let plan = self.plan;
        let scope = Scope::Query(id);
        let mut parts = Vec::new();
        for (idx, child) in plan.query(id).children().iter().enumerate() {
            let item = self.from_item(child.query, scope)?;
            if idx == 0 {
                parts.push(item);
                continue;
            }
            let (join_type, on) = match &child.join {
                Some(join) => (join.join_type, self.join_condition(&join.on, scope)?),
                None => (JoinType::Join, "TRUE".to_string()),
            };
            parts.push(format!("{join_type} {item} ON {on}"));
        }
        Ok(parts.join(separator))
    }

    fn from_item(&mut self, id: QueryId, scope: Scope) -> Result<String> {
        let plan = self.plan;
        let query = plan.query(id);
        let alias = quote_ident(&query.alias);
        match &query.kind {
            AslQueryKind::Structure(structure) => {
                Ok(format!("({}) AS {alias}", self.structure_query(id, structure)?))
            }
            AslQueryKind::Encapsulating(_) => {
                Ok(format!("({}) AS {alias}", self.encapsulating_query(id)?))
            }
            AslQueryKind::PathData(data) => {
                Ok(format!("LATERAL ({}) AS {alias}", self.path_data_query(id, data, scope)?))
            }
            AslQueryKind::Filtering(filtering) => Ok(format!(
                "LATERAL ({}) AS {alias}",
                self.filtering_query(id, filtering, scope)?
            )),
            AslQueryKind::RmObjectData(_) | AslQueryKind::Root(_) | AslQueryKind::External => Err(
                AqlError::plan(format!("Query {} cannot be joined", query.alias)),
            ),
        }
    }

    fn encapsulating_query(&mut self, id: QueryId) -> Result<String> {
        let plan = self.plan;
        let query = plan.query(id);
        let select = query
            .children()
            .iter()
            .map(|c| format!("{}.*", quote_ident(plan.alias(c.query))))
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!("SELECT {select} FROM {}", self.from_clause(id, " ")?);
        if let Some(condition) = self.where_clause(query.condition.iter().cloned(), Scope::Query(id))? {
            sql.push_str(" WHERE ");
            sql.push_str(&condition);
        }
        Ok(sql)
    }

    fn structure_query(&mut self, id: QueryId, structure: &StructureQuery) -> Result<String> {
        let plan = self.plan;
        let query = plan.query(id);
        let data = data_alias(&query.alias);

        let mut columns = Vec::with_capacity(query.select.len());
        for field in &query.select {
            let column = match &field.kind {
                FieldKind::Column(c) => {
                    format!("{}.{}", table_alias(&query.alias, structure, c.version_table)?, quote_ident(&c.column))
                }
                FieldKind::FolderItemIds => folder_item_ids(&data),
                other => {
                    return Err(AqlError::plan(format!(
                        "Structure query {} cannot select {other:?}",
                        query.alias
                    )));
                }
            };
            let name = field
                .column_name()
                .ok_or_else(|| AqlError::plan(format!("Unnamed column of {}", query.alias)))?;
            columns.push(format!("{column} AS {}", quote_ident(&plan.column_alias(id, name))));
        }

        let mut sql = format!(
            "SELECT {} FROM {} AS {data}",
            columns.join(", "),
            structure.relation.data_table()
        );
        if structure.requires_version_table {
            let table = structure.relation.version_table().ok_or_else(|| {
                AqlError::plan(format!("{:?} has no version table", structure.relation))
            })?;
            let version = version_alias(&query.alias);
            sql.push_str(&format!(
                " JOIN {table} AS {version} ON {version}.\"vo_id\" = {data}.\"vo_id\""
            ));
        }

        let conditions = query
            .structure_conditions
            .iter()
            .chain(query.condition.iter())
            .cloned();
        if let Some(condition) = self.where_clause(conditions, Scope::Table(id))? {
            sql.push_str(" WHERE ");
            sql.push_str(&condition);
        }
        Ok(sql)
    }

    fn path_data_query(&mut self, id: QueryId, data: &PathDataQuery, scope: Scope) -> Result<String> {
        let src = self.field_expr(&data.data_field, scope)?;
        let value = json_path(&src, &json_keys(&data.path)?);
        let value = if data.multiple_valued {
            format!("jsonb_array_elements({value})")
        } else {
            value
        };
        Ok(format!(
            "SELECT {value} AS {}",
            quote_ident(&self.plan.column_alias(id, PATH_DATA_COLUMN))
        ))
    }

    fn filtering_query(&mut self, id: QueryId, filtering: &FilteringQuery, scope: Scope) -> Result<String> {
        let plan = self.plan;
        let source = &filtering.source;
        let mut columns = Vec::new();
        for field in &plan.query(id).select {
            let expr = match (&source.kind, &field.kind) {
                (FieldKind::ComplexExtracted(_), FieldKind::Column(c)) => {
                    self.column_ref(source.owner, &c.column, c.version_table, scope)?
                }
                _ => self.field_expr(source, scope)?,
            };
            let name = field
                .column_name()
                .ok_or_else(|| AqlError::plan(format!("Unnamed column of {}", plan.alias(id))))?;
            columns.push(format!("{expr} AS {}", quote_ident(&plan.column_alias(id, name))));
        }
        Ok(format!("SELECT {}", columns.join(", ")))
    }

    fn where_clause(
        &mut self,
        conditions: impl IntoIterator<Item = AslCondition>,
        scope: Scope,
    ) -> Result<Option<String>> {
        match reduce_conditions(AslCondition::And(conditions.into_iter().collect())) {
            AslCondition::True => Ok(None),
            condition => self.condition(&condition, scope).map(Some),
        }
    }

    // === Joins ===

    fn join_condition(&mut self, on: &[AslJoinCondition], scope: Scope) -> Result<String> {
        if on.is_empty() {
            return Ok("TRUE".to_string());
        }
        let parts = on
            .iter()
            .map(|c| self.join_part(c, scope))
            .collect::<Result<Vec<_>>>()?;
        Ok(parts.join(" AND "))
    }

    fn join_part(&mut self, condition: &AslJoinCondition, scope: Scope) -> Result<String> {
        match condition {
            AslJoinCondition::Descendant {
                structure,
                parent_is_root,
            } => self.descendant(structure, *parent_is_root, scope),
            AslJoinCondition::PathChild(s) => Ok(format!(
                "{} = {} AND {} = {}",
                self.structure_column(s.child, StructureColumn::VoId, scope)?,
                self.structure_column(s.parent, StructureColumn::VoId, scope)?,
                self.structure_column(s.child, StructureColumn::ParentNum, scope)?,
                self.structure_column(s.parent, StructureColumn::Num, scope)?,
            )),
            AslJoinCondition::FolderItem(s) => Ok(format!(
                "{} = ANY({})",
                self.structure_column(s.child, StructureColumn::VoId, scope)?,
                self.column_ref(s.parent, FOLDER_ITEM_IDS, false, scope)?,
            )),
            AslJoinCondition::FieldEquals(left, right) => Ok(format!(
                "{} = {}",
                self.field_expr(left, scope)?,
                self.field_expr(right, scope)?
            )),
            AslJoinCondition::Filter(condition) => self.condition(condition, scope),
        }
    }

    /// Rows of the child lie below the parent row: `parent.num < child.num <= parent.num_cap`
    fn descendant(&mut self, s: &StructureJoinCondition, parent_is_root: bool, scope: Scope) -> Result<String> {
        if s.parent_relation == SourceRelation::Ehr {
            return Ok(format!(
                "{} = {}",
                self.structure_column(s.child, StructureColumn::EhrId, scope)?,
                self.column_ref(s.parent, "id", false, scope)?,
            ));
        }
        let mut parts = vec![format!(
            "{} = {}",
            self.structure_column(s.child, StructureColumn::VoId, scope)?,
            self.structure_column(s.parent, StructureColumn::VoId, scope)?,
        )];
        if !parent_is_root {
            let num = self.structure_column(s.child, StructureColumn::Num, scope)?;
            parts.push(format!(
                "{num} > {}",
                self.structure_column(s.parent, StructureColumn::Num, scope)?
            ));
            parts.push(format!(
                "{num} <= {}",
                self.structure_column(s.parent, StructureColumn::NumCap, scope)?
            ));
        }
        Ok(parts.join(" AND "))
    }

    // === Fields ===

    /// A column of `owner` as visible in `scope`
    fn column_ref(&self, owner: QueryId, column: &str, version_table: bool, scope: Scope) -> Result<String> {
        let plan = self.plan;
        match scope {
            Scope::Table(id) if id == owner => {
                let query = plan.query(owner);
                let structure = query.as_structure().ok_or_else(|| {
                    AqlError::plan(format!("{} is not a structure query", query.alias))
                })?;
                Ok(format!(
                    "{}.{}",
                    table_alias(&query.alias, structure, version_table)?,
                    quote_ident(column)
                ))
            }
            Scope::Table(id) => Err(AqlError::plan(format!(
                "Query {} is not visible from {}",
                plan.alias(owner),
                plan.alias(id)
            ))),
            Scope::Query(scope) => {
                let provider = plan.provider_in(scope, owner)?;
                Ok(format!(
                    "{}.{}",
                    quote_ident(plan.alias(provider)),
                    quote_ident(&plan.column_alias(owner, column))
                ))
            }
        }
    }

    fn structure_column(&self, owner: QueryId, column: StructureColumn, scope: Scope) -> Result<String> {
        self.column_ref(owner, column.column_name(), column.from_version_table(), scope)
    }

    /// A field as returned to the caller
    fn output_expr(&mut self, field: &AslField, scope: Scope) -> Result<String> {
        if field.extracted_column == Some(ExtractedColumn::TemplateId)
            && matches!(field.kind, FieldKind::Column(_))
        {
            let uuid = self.field_expr(field, scope)?;
            return Ok(format!(
                "(SELECT \"ts\".\"template_id\" FROM {TEMPLATE_STORE} AS \"ts\" WHERE \"ts\".\"id\" = {uuid})"
            ));
        }
        self.field_expr(field, scope)
    }

    fn field_expr(&mut self, field: &AslField, scope: Scope) -> Result<String> {
        match &field.kind {
            FieldKind::Column(c) => self.column_ref(field.owner, &c.column, c.version_table, scope),
            FieldKind::FolderItemIds => self.column_ref(field.owner, FOLDER_ITEM_IDS, false, scope),
            FieldKind::Constant(value) => Ok(self.params.bind(value)),
            FieldKind::ComplexExtracted(column) => self.complex_extracted(field.owner, *column, scope),
            FieldKind::Aggregating(aggregate) => self.aggregate(aggregate, scope),
            FieldKind::Subquery(subquery) => self.rm_object(subquery, scope),
            FieldKind::RmPath(path) => {
                let src = self.field_expr(&path.src, scope)?;
                let keys = json_keys(&path.path)?;
                Ok(match path.column_type {
                    ColumnType::Text => json_text(&src, &keys),
                    _ => json_path(&src, &keys),
                })
            }
        }
    }

    fn complex_extracted(&mut self, owner: QueryId, column: ExtractedColumn, scope: Scope) -> Result<String> {
        match column {
            ExtractedColumn::VoId => {
                let vo_id = self.structure_column(owner, StructureColumn::VoId, scope)?;
                let version = self.structure_column(owner, StructureColumn::SysVersion, scope)?;
                let system_id = self.params.bind(&SqlValue::Text(self.system_id.to_string()));
                Ok(format!(
                    "({vo_id}::text || '::' || {system_id} || '::' || {version}::text)"
                ))
            }
            ExtractedColumn::ArchetypeNodeId => {
                let rm_entity = self.structure_column(owner, StructureColumn::RmEntity, scope)?;
                let concept = self.structure_column(owner, StructureColumn::EntityConcept, scope)?;
                let types = StructureRmType::ALL
                    .iter()
                    .map(|t| format!("WHEN {} THEN {}", quote_literal(t.alias()), quote_literal(t.type_name())))
                    .collect::<Vec<_>>()
                    .join(" ");
                Ok(format!(
                    "CASE WHEN left({concept}, 1) = '.' THEN {} || CASE {rm_entity} {types} END || {concept} ELSE {concept} END",
                    quote_literal(ARCHETYPE_PREFIX)
                ))
            }
            other => Err(AqlError::plan(format!(
                "{other:?} is not a complex extracted column"
            ))),
        }
    }

    fn aggregate(&mut self, aggregate: &AggregatingField, scope: Scope) -> Result<String> {
        let Some(base) = &aggregate.base else {
            return Ok("count(*)".to_string());
        };
        let value = self.field_expr(base, scope)?;
        let distinct = if aggregate.distinct { "DISTINCT " } else { "" };
        let function = match aggregate.function {
            AggregateFunctionName::Count => "count".to_string(),
            AggregateFunctionName::Min if base.is_dv_ordered() => {
                self.dialect.json_function(MIN_DV_ORDERED)
            }
            AggregateFunctionName::Max if base.is_dv_ordered() => {
                self.dialect.json_function(MAX_DV_ORDERED)
            }
            AggregateFunctionName::Min => "min".to_string(),
            AggregateFunctionName::Max => "max".to_string(),
            AggregateFunctionName::Sum | AggregateFunctionName::Avg => {
                let function = aggregate.function.as_str().to_lowercase();
                let value = match base.column_type() {
                    ColumnType::Jsonb | ColumnType::Text => format!("CAST({value} AS numeric)"),
                    _ => value,
                };
                return Ok(format!("{function}({distinct}{value})"));
            }
        };
        Ok(format!("{function}({distinct}{value})"))
    }

    /// The RM object below a structure row, aggregated from its descendant rows
    fn rm_object(&mut self, subquery: &SubqueryField, scope: Scope) -> Result<String> {
        let plan = self.plan;
        let query = plan.query(subquery.query);
        let AslQueryKind::RmObjectData(object) = &query.kind else {
            return Err(AqlError::plan(format!(
                "{} is not an RM object query",
                query.alias
            )));
        };
        if !object.relation.is_structure() {
            return Err(AqlError::plan(format!(
                "{:?} rows cannot be aggregated into an RM object",
                object.relation
            )));
        }
        let rows = quote_ident(&query.alias);
        let base = object.base;
        let entity_idx = self.structure_column(base, StructureColumn::EntityIdx, scope)?;
        let mut conditions = vec![
            format!(
                "{rows}.\"vo_id\" = {}",
                self.structure_column(base, StructureColumn::VoId, scope)?
            ),
            format!(
                "{rows}.\"num\" BETWEEN {} AND {}",
                self.structure_column(base, StructureColumn::Num, scope)?,
                self.structure_column(base, StructureColumn::NumCap, scope)?
            ),
        ];
        if let Some(filter) = self.where_clause(subquery.filter_conditions.iter().cloned(), scope)? {
            conditions.push(filter);
        }
        Ok(format!(
            "(SELECT {JSONB_OBJECT_AGG}(substring({rows}.\"entity_idx\" FROM char_length({entity_idx}) + 1), {rows}.\"data\") FROM {} AS {rows} WHERE {})",
            object.relation.data_table(),
            conditions.join(" AND ")
        ))
    }

    fn magnitude(&mut self, field: &AslField, scope: Scope) -> Result<String> {
        let value = self.field_expr(field, scope)?;
        Ok(format!("{}({value})", self.dialect.json_function(DV_ORDERED_MAGNITUDE)))
    }

    // === Conditions ===

    fn condition(&mut self, condition: &AslCondition, scope: Scope) -> Result<String> {
        match condition {
            AslCondition::True => Ok("TRUE".to_string()),
            AslCondition::False => Ok("FALSE".to_string()),
            AslCondition::And(values) => self.junction(values, " AND ", "TRUE", scope),
            AslCondition::Or(values) => self.junction(values, " OR ", "FALSE", scope),
            AslCondition::Not(inner) => Ok(format!("NOT ({})", self.condition(inner, scope)?)),
            AslCondition::NotNull(field) => {
                Ok(format!("{} IS NOT NULL", self.field_expr(field, scope)?))
            }
            AslCondition::FieldValue(fv) => self.field_value(fv, scope),
            AslCondition::DvOrdered(dv) => self.dv_ordered(dv, scope),
        }
    }

    fn junction(&mut self, values: &[AslCondition], operator: &str, empty: &str, scope: Scope) -> Result<String> {
        match values {
            [] => Ok(empty.to_string()),
            [single] => self.condition(single, scope),
            _ => {
                let parts = values
                    .iter()
                    .map(|v| self.condition(v, scope))
                    .collect::<Result<Vec<_>>>()?;
                Ok(format!("({})", parts.join(operator)))
            }
        }
    }

    fn field_value(&mut self, fv: &FieldValueCondition, scope: Scope) -> Result<String> {
        let lhs = self.field_expr(&fv.field, scope)?;
        let jsonb = fv.field.column_type() == ColumnType::Jsonb;
        match fv.operator {
            AslOperator::IsNull => Ok(format!("{lhs} IS NULL")),
            AslOperator::IsNotNull => Ok(format!("{lhs} IS NOT NULL")),
            AslOperator::In => {
                if fv.values.is_empty() {
                    return Ok("FALSE".to_string());
                }
                let values = fv
                    .values
                    .iter()
                    .map(|v| self.value(v, jsonb))
                    .collect::<Vec<_>>()
                    .join(", ");
                Ok(format!("{lhs} IN ({values})"))
            }
            AslOperator::Like => {
                let pattern = self.params.bind(single_value(&fv.values)?);
                if jsonb {
                    Ok(format!("({lhs} #>> '{{}}') LIKE {pattern}"))
                } else {
                    Ok(format!("{lhs} LIKE {pattern}"))
                }
            }
            operator => {
                let value = self.value(single_value(&fv.values)?, jsonb);
                Ok(format!("{lhs} {} {value}", comparison(operator)?))
            }
        }
    }

    /// `T` of the value is one of the types and its magnitude compares with the value
    fn dv_ordered(&mut self, dv: &DvOrderedCondition, scope: Scope) -> Result<String> {
        let value = self.field_expr(&dv.field, scope)?;
        let types = dv
            .type_aliases
            .iter()
            .map(|alias| self.params.bind(&SqlValue::Text(alias.clone())))
            .collect::<Vec<_>>()
            .join(", ");
        let magnitude = self.params.bind(single_value(&dv.values)?);
        Ok(format!(
            "(({value} ->> {}) IN ({types}) AND {}({value}) {} {magnitude})",
            quote_literal(TYPE_ATTRIBUTE),
            self.dialect.json_function(DV_ORDERED_MAGNITUDE),
            comparison(dv.operator)?
        ))
    }

    fn value(&mut self, value: &SqlValue, jsonb: bool) -> String {
        let placeholder = self.params.bind(value);
        if jsonb {
            format!("to_jsonb({placeholder})")
        } else {
            placeholder
        }
    }
}

fn single_value(values: &[SqlValue]) -> Result<&SqlValue> {
    match values {
        [value] => Ok(value),
        _ => Err(AqlError::plan(format!(
            "Expected a single comparison value, got {}",
            values.len()
        ))),
    }
}

fn comparison(operator: AslOperator) -> Result<&'static str> {
    match operator {
        AslOperator::Eq => Ok("="),
        AslOperator::Neq => Ok("<>"),
        AslOperator::Gt => Ok(">"),
        AslOperator::Ge => Ok(">="),
        AslOperator::Lt => Ok("<"),
        AslOperator::Le => Ok("<="),
        other => Err(AqlError::plan(format!("{other:?} is not a comparison"))),
    }
}

fn data_alias(alias: &str) -> String {
    quote_ident(&format!("{alias}_data"))
}

fn version_alias(alias: &str) -> String {
    quote_ident(&format!("{alias}_version"))
}

fn table_alias(alias: &str, structure: &StructureQuery, version_table: bool) -> Result<String> {
    match (version_table, structure.requires_version_table) {
        (false, _) => Ok(data_alias(alias)),
        (true, true) => Ok(version_alias(alias)),
        (true, false) => Err(AqlError::plan(format!(
            "{alias} reads a version column without joining the version table"
        ))),
    }
}

/// Ids of the compositions referenced by a folder row and its sub-folders
fn folder_item_ids(data: &str) -> String {
    format!(
        "ARRAY(SELECT unnest(\"nested\".\"item_uuids\") FROM {EHR_FOLDER_DATA} AS \"nested\" WHERE \"nested\".\"vo_id\" = {data}.\"vo_id\" AND \"nested\".\"num\" BETWEEN {data}.\"num\" AND {data}.\"num_cap\")"
    )
}

/// JSON keys of RM attribute names
fn json_keys(path: &[String]) -> Result<Vec<&'static str>> {
    RmAttributeAlias::rm_to_json_path_parts(path.iter().map(String::as_str))
}

/// The JSON value at `keys` below `src`
pub fn json_path(src: &str, keys: &[&str]) -> String {
    if keys.is_empty() {
        return src.to_string();
    }
    let steps = keys
        .iter()
        .map(|k| format!(" -> {}", quote_literal(k)))
        .collect::<String>();
    format!("({src}{steps})")
}

/// The JSON value at `keys` below `src`, as text
pub fn json_text(src: &str, keys: &[&str]) -> String {
    let Some((last, init)) = keys.split_last() else {
        return format!("({src} #>> '{{}}')");
    };
    let steps = init
        .iter()
        .map(|k| format!(" -> {}", quote_literal(k)))
        .collect::<String>();
    format!("({src}{steps} ->> {})", quote_literal(last))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_json_path() {
        assert_eq!(json_path("\"t\".\"data\"", &[]), "\"t\".\"data\"");
        assert_eq!(
            json_path("\"t\".\"data\"", &["i", "V"]),
            "(\"t\".\"data\" -> 'i' -> 'V')"
        );
    }

    #[test]
    fn test_json_text() {
        assert_eq!(json_text("x", &[]), "(x #>> '{}')");
        assert_eq!(json_text("x", &["V"]), "(x ->> 'V')");
        assert_eq!(json_text("x", &["N", "V"]), "(x -> 'N' ->> 'V')");
    }

    #[test]
    fn test_comparison_operators() {
        assert_eq!(comparison(AslOperator::Neq).unwrap(), "<>");
        assert_eq!(comparison(AslOperator::Le).unwrap(), "<=");
        assert!(comparison(AslOperator::Like).is_err());
    }

    #[test]
    fn test_version_columns_require_join() {
        let structure = StructureQuery {
            relation: SourceRelation::Composition,
            rm_types: vec!["COMPOSITION".to_string()],
            requires_version_table: false,
            attribute: None,
        };
        assert_eq!(table_alias("c", &structure, false).unwrap(), "\"c_data\"");
        assert!(table_alias("c", &structure, true).is_err());
    }
}
