//! The ASL plan: an arena of relational query nodes
//!
//! Queries reference each other through [`QueryId`] indices into the owning [`AslPlan`].
//! A field only records the query that owns it; when the owner is nested inside
//! encapsulating queries, the binder resolves the query that makes the field visible in
//! its current scope with [`AslPlan::provider_in`].

use aql_ast::{AggregateFunctionName, OrderByDirection};
use aql_diagnostics::{AqlError, Result, AQL0201};
use aql_model::{ExtractedColumn, SourceRelation, StructureColumn};
use chrono::{DateTime, FixedOffset};
use indexmap::IndexSet;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Index of a query within its plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryId(usize);

impl QueryId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// === Values ===

/// A value bound into the generated statement
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SqlValue {
    Text(String),
    Long(i64),
    Numeric(Decimal),
    Boolean(bool),
    Uuid(Uuid),
    Timestamp(DateTime<FixedOffset>),
}

impl SqlValue {
    pub fn is_numeric(&self) -> bool {
        matches!(self, SqlValue::Long(_) | SqlValue::Numeric(_))
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            SqlValue::Long(v) => write!(f, "{v}"),
            SqlValue::Numeric(v) => write!(f, "{v}"),
            SqlValue::Boolean(v) => write!(f, "{v}"),
            SqlValue::Uuid(v) => write!(f, "'{v}'"),
            SqlValue::Timestamp(v) => write!(f, "'{}'", v.to_rfc3339()),
        }
    }
}

/// SQL type of a column or expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Text,
    Integer,
    Uuid,
    Timestamp,
    Jsonb,
    UuidArray,
}

impl ColumnType {
    pub fn of_structure_column(column: StructureColumn) -> Self {
        match column {
            StructureColumn::VoId
            | StructureColumn::EhrId
            | StructureColumn::AuditId
            | StructureColumn::ContributionId
            | StructureColumn::TemplateId => ColumnType::Uuid,
            StructureColumn::Num
            | StructureColumn::NumCap
            | StructureColumn::ParentNum
            | StructureColumn::SysVersion => ColumnType::Integer,
            StructureColumn::SysPeriodLower => ColumnType::Timestamp,
            StructureColumn::Data => ColumnType::Jsonb,
            StructureColumn::ItemUuids => ColumnType::UuidArray,
            StructureColumn::RmEntity
            | StructureColumn::EntityConcept
            | StructureColumn::EntityName
            | StructureColumn::EntityAttribute
            | StructureColumn::EntityPath
            | StructureColumn::EntityIdx
            | StructureColumn::RootConcept => ColumnType::Text,
        }
    }

    /// Whether a value can be compared with a column of this type as is.
    ///
    /// JSONB columns accept every value; it is converted with `to_jsonb`.
    pub fn accepts(&self, value: &SqlValue) -> bool {
        match self {
            ColumnType::Jsonb => true,
            ColumnType::Text => matches!(value, SqlValue::Text(_)),
            ColumnType::Integer => matches!(value, SqlValue::Long(_)),
            ColumnType::Uuid | ColumnType::UuidArray => matches!(value, SqlValue::Uuid(_)),
            ColumnType::Timestamp => matches!(value, SqlValue::Timestamp(_)),
        }
    }
}

// === Fields ===

/// A physical or re-projected column
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnField {
    pub column: String,
    pub column_type: ColumnType,
    /// Read from the version table of a structure query
    pub version_table: bool,
    /// DV_ORDERED subtypes the JSON value may have
    pub dv_ordered_types: IndexSet<String>,
}

/// Aggregate over a field, `COUNT(*)` when there is no base field
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatingField {
    pub function: AggregateFunctionName,
    pub base: Option<Box<AslField>>,
    pub distinct: bool,
}

/// Scalar subquery aggregating an RM object from its structure rows
#[derive(Debug, Clone, PartialEq)]
pub struct SubqueryField {
    pub query: QueryId,
    pub filter_conditions: Vec<AslCondition>,
}

/// JSON path below a JSONB column
#[derive(Debug, Clone, PartialEq)]
pub struct RmPathField {
    pub src: Box<AslField>,
    /// RM attribute names, translated to JSON keys by the binder
    pub path: Vec<String>,
    pub dv_ordered_types: IndexSet<String>,
    /// `Text` extracts the final step as text, `Jsonb` keeps the JSON value
    pub column_type: ColumnType,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Column(ColumnField),
    /// Extracted column spanning several physical columns of the owner
    ComplexExtracted(ExtractedColumn),
    Constant(SqlValue),
    Aggregating(AggregatingField),
    Subquery(SubqueryField),
    RmPath(RmPathField),
    /// Ids of the compositions referenced by a folder and its sub-folders
    FolderItemIds,
}

/// Column name of [`FieldKind::FolderItemIds`]
pub const FOLDER_ITEM_IDS: &str = "item_ids";

/// A typed reference to a column or computed expression, tagged with its owning query
#[derive(Debug, Clone, PartialEq)]
pub struct AslField {
    pub owner: QueryId,
    pub kind: FieldKind,
    pub extracted_column: Option<ExtractedColumn>,
}

impl AslField {
    pub fn new(owner: QueryId, kind: FieldKind) -> Self {
        Self {
            owner,
            kind,
            extracted_column: None,
        }
    }

    /// Column of a structure query
    pub fn structure_column(owner: QueryId, column: StructureColumn) -> Self {
        Self::new(
            owner,
            FieldKind::Column(ColumnField {
                column: column.column_name().to_string(),
                column_type: ColumnType::of_structure_column(column),
                version_table: column.from_version_table(),
                dv_ordered_types: IndexSet::new(),
            }),
        )
    }

    pub fn named_column(owner: QueryId, column: impl Into<String>, column_type: ColumnType) -> Self {
        Self::new(
            owner,
            FieldKind::Column(ColumnField {
                column: column.into(),
                column_type,
                version_table: false,
                dv_ordered_types: IndexSet::new(),
            }),
        )
    }

    pub fn constant(owner: QueryId, value: SqlValue) -> Self {
        Self::new(owner, FieldKind::Constant(value))
    }

    /// JSON value at `path` below the JSONB field `src`
    pub fn rm_path(src: AslField, path: Vec<String>, column_type: ColumnType) -> Self {
        Self::new(
            src.owner,
            FieldKind::RmPath(RmPathField {
                src: Box::new(src),
                path,
                dv_ordered_types: IndexSet::new(),
                column_type,
            }),
        )
    }

    pub fn with_extracted_column(mut self, column: ExtractedColumn) -> Self {
        self.extracted_column = Some(column);
        self
    }

    pub fn with_dv_ordered_types(mut self, types: IndexSet<String>) -> Self {
        match &mut self.kind {
            FieldKind::Column(c) => c.dv_ordered_types = types,
            FieldKind::RmPath(p) => p.dv_ordered_types = types,
            _ => {}
        }
        self
    }

    /// A copy of this field owned by another query
    pub fn with_owner(&self, owner: QueryId) -> Self {
        Self {
            owner,
            ..self.clone()
        }
    }

    pub fn column_name(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::Column(c) => Some(&c.column),
            FieldKind::FolderItemIds => Some(FOLDER_ITEM_IDS),
            _ => None,
        }
    }

    pub fn column_type(&self) -> ColumnType {
        match &self.kind {
            FieldKind::Column(c) => c.column_type,
            FieldKind::RmPath(p) => p.column_type,
            FieldKind::Subquery(_) => ColumnType::Jsonb,
            FieldKind::FolderItemIds => ColumnType::UuidArray,
            FieldKind::ComplexExtracted(_) | FieldKind::Aggregating(_) => ColumnType::Text,
            FieldKind::Constant(v) => match v {
                SqlValue::Text(_) => ColumnType::Text,
                SqlValue::Long(_) => ColumnType::Integer,
                SqlValue::Uuid(_) => ColumnType::Uuid,
                SqlValue::Timestamp(_) => ColumnType::Timestamp,
                SqlValue::Numeric(_) | SqlValue::Boolean(_) => ColumnType::Jsonb,
            },
        }
    }

    /// DV_ORDERED subtypes of a JSON value; empty for text and physical columns
    pub fn dv_ordered_types(&self) -> Option<&IndexSet<String>> {
        match &self.kind {
            FieldKind::Column(c) if c.column_type == ColumnType::Jsonb => Some(&c.dv_ordered_types),
            FieldKind::RmPath(p) if p.column_type == ColumnType::Jsonb => Some(&p.dv_ordered_types),
            _ => None,
        }
        .filter(|types| !types.is_empty())
    }

    pub fn is_dv_ordered(&self) -> bool {
        self.dv_ordered_types().is_some()
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self.kind, FieldKind::Aggregating(_))
    }
}

// === Conditions ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AslOperator {
    Eq,
    Neq,
    Gt,
    Ge,
    Lt,
    Le,
    In,
    Like,
    IsNull,
    IsNotNull,
}

impl AslOperator {
    pub fn is_ordering(&self) -> bool {
        matches!(
            self,
            AslOperator::Gt | AslOperator::Ge | AslOperator::Lt | AslOperator::Le
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldValueCondition {
    pub field: AslField,
    pub operator: AslOperator,
    pub values: Vec<SqlValue>,
}

/// Comparison on the magnitude of a DV_ORDERED JSON value, restricted to the given
/// type aliases
#[derive(Debug, Clone, PartialEq)]
pub struct DvOrderedCondition {
    pub field: AslField,
    pub operator: AslOperator,
    pub type_aliases: Vec<String>,
    pub values: Vec<SqlValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AslCondition {
    And(Vec<AslCondition>),
    Or(Vec<AslCondition>),
    Not(Box<AslCondition>),
    True,
    False,
    NotNull(AslField),
    FieldValue(FieldValueCondition),
    DvOrdered(DvOrderedCondition),
}

impl AslCondition {
    pub fn field_value(field: AslField, operator: AslOperator, values: Vec<SqlValue>) -> Self {
        AslCondition::FieldValue(FieldValueCondition {
            field,
            operator,
            values,
        })
    }

    pub fn not(condition: AslCondition) -> Self {
        AslCondition::Not(Box::new(condition))
    }
}

// === Joins ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinType {
    Join,
    LeftOuter,
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinType::Join => f.write_str("JOIN"),
            JoinType::LeftOuter => f.write_str("LEFT JOIN"),
        }
    }
}

/// Descendant relationship between two structure queries
#[derive(Debug, Clone, PartialEq)]
pub struct StructureJoinCondition {
    pub parent: QueryId,
    pub parent_relation: SourceRelation,
    pub child: QueryId,
    pub child_relation: SourceRelation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AslJoinCondition {
    /// Child row lies in the `(num, num_cap]` range of the parent row
    Descendant {
        structure: StructureJoinCondition,
        /// The parent is the root row of its version, the range check can be omitted
        parent_is_root: bool,
    },
    /// Child row is a direct child of the parent row
    PathChild(StructureJoinCondition),
    /// Composition referenced by a folder
    FolderItem(StructureJoinCondition),
    /// Two fields are equal, e.g. alternatives of the same version
    FieldEquals(AslField, AslField),
    /// Arbitrary condition, e.g. a path predicate
    Filter(AslCondition),
}

/// Join of a child query into its encapsulating query
#[derive(Debug, Clone, PartialEq)]
pub struct AslJoin {
    /// The query joined against
    pub left: QueryId,
    pub join_type: JoinType,
    pub on: Vec<AslJoinCondition>,
}

impl AslJoin {
    pub fn new(left: QueryId, join_type: JoinType, on: Vec<AslJoinCondition>) -> Self {
        Self {
            left,
            join_type,
            on,
        }
    }
}

// === Queries ===

#[derive(Debug, Clone, PartialEq)]
pub struct StructureQuery {
    pub relation: SourceRelation,
    /// RM types the rows may have
    pub rm_types: Vec<String>,
    pub requires_version_table: bool,
    /// Attribute of the parent a path structure query descends through
    pub attribute: Option<String>,
}

/// Data extracted from the JSON of a base query, unnested when multiple valued
#[derive(Debug, Clone, PartialEq)]
pub struct PathDataQuery {
    pub base: QueryId,
    pub data_field: AslField,
    pub path: Vec<String>,
    pub multiple_valued: bool,
}

/// A whole RM object reassembled from the structure rows below a base row
#[derive(Debug, Clone, PartialEq)]
pub struct RmObjectDataQuery {
    pub base: QueryId,
    pub relation: SourceRelation,
}

/// Re-projection of a single field, joined only where the filter conditions hold
#[derive(Debug, Clone, PartialEq)]
pub struct FilteringQuery {
    pub source: AslField,
}

/// A child of an encapsulating query; every child but the first is joined
#[derive(Debug, Clone, PartialEq)]
pub struct EncapsulatedChild {
    pub query: QueryId,
    pub join: Option<AslJoin>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncapsulatingQuery {
    pub children: Vec<EncapsulatedChild>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AslOrderByField {
    pub field: AslField,
    pub direction: OrderByDirection,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RootQuery {
    pub encapsulating: EncapsulatingQuery,
    pub select: Vec<AslField>,
    pub group_by: Vec<AslField>,
    /// DV_ORDERED fields whose magnitude is grouped by for ORDER BY
    pub group_by_dv_ordered_magnitude: Vec<AslField>,
    pub order_by: Vec<AslOrderByField>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AslQueryKind {
    Structure(StructureQuery),
    PathData(PathDataQuery),
    RmObjectData(RmObjectDataQuery),
    Filtering(FilteringQuery),
    Encapsulating(EncapsulatingQuery),
    Root(RootQuery),
    /// Owner of values computed outside the relational plan (constants)
    External,
}

impl AslQueryKind {
    fn label(&self) -> &'static str {
        match self {
            AslQueryKind::Structure(_) => "STRUCTURE",
            AslQueryKind::PathData(_) => "PATH_DATA",
            AslQueryKind::RmObjectData(_) => "RM_OBJECT_DATA",
            AslQueryKind::Filtering(_) => "FILTERING",
            AslQueryKind::Encapsulating(_) => "ENCAPSULATING",
            AslQueryKind::Root(_) => "ROOT",
            AslQueryKind::External => "EXTERNAL",
        }
    }
}

/// A node of the plan
#[derive(Debug, Clone, PartialEq)]
pub struct AslQuery {
    /// Unique within the plan
    pub alias: String,
    /// The AQL element the query was derived from
    pub origin: Option<String>,
    pub kind: AslQueryKind,
    /// Columns the query provides; computed from the children for encapsulating queries
    pub select: Vec<AslField>,
    pub condition: Option<AslCondition>,
    /// Row guards fixed at construction
    pub structure_conditions: Vec<AslCondition>,
}

impl AslQuery {
    pub fn new(alias: impl Into<String>, kind: AslQueryKind) -> Self {
        Self {
            alias: alias.into(),
            origin: None,
            kind,
            select: Vec::new(),
            condition: None,
            structure_conditions: Vec::new(),
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn as_structure(&self) -> Option<&StructureQuery> {
        match &self.kind {
            AslQueryKind::Structure(s) => Some(s),
            _ => None,
        }
    }

    fn encapsulated(&self) -> Option<&EncapsulatingQuery> {
        match &self.kind {
            AslQueryKind::Encapsulating(e) => Some(e),
            AslQueryKind::Root(r) => Some(&r.encapsulating),
            _ => None,
        }
    }

    fn encapsulated_mut(&mut self) -> Option<&mut EncapsulatingQuery> {
        match &mut self.kind {
            AslQueryKind::Encapsulating(e) => Some(e),
            AslQueryKind::Root(r) => Some(&mut r.encapsulating),
            _ => None,
        }
    }

    /// Children of an encapsulating or root query, empty otherwise
    pub fn children(&self) -> &[EncapsulatedChild] {
        self.encapsulated()
            .map(|e| e.children.as_slice())
            .unwrap_or_default()
    }
}

/// The whole relational plan of one AQL query
#[derive(Debug, Clone, PartialEq)]
pub struct AslPlan {
    queries: Vec<AslQuery>,
    parents: Vec<Option<QueryId>>,
}

impl Default for AslPlan {
    fn default() -> Self {
        Self::new()
    }
}

impl AslPlan {
    /// A plan holding an empty root query
    pub fn new() -> Self {
        Self {
            queries: vec![AslQuery::new("root", AslQueryKind::Root(RootQuery::default()))],
            parents: vec![None],
        }
    }

    pub fn root(&self) -> QueryId {
        QueryId(0)
    }

    pub fn root_query(&self) -> &RootQuery {
        match &self.queries[0].kind {
            AslQueryKind::Root(r) => r,
            _ => unreachable!("the first query of a plan is its root"),
        }
    }

    pub fn root_query_mut(&mut self) -> &mut RootQuery {
        match &mut self.queries[0].kind {
            AslQueryKind::Root(r) => r,
            _ => unreachable!("the first query of a plan is its root"),
        }
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn query(&self, id: QueryId) -> &AslQuery {
        &self.queries[id.0]
    }

    pub fn query_mut(&mut self, id: QueryId) -> &mut AslQuery {
        &mut self.queries[id.0]
    }

    pub fn alias(&self, id: QueryId) -> &str {
        &self.queries[id.0].alias
    }

    pub fn parent(&self, id: QueryId) -> Option<QueryId> {
        self.parents[id.0]
    }

    pub fn ids(&self) -> impl Iterator<Item = QueryId> + '_ {
        (0..self.queries.len()).map(QueryId)
    }

    /// Add a query that is not yet attached to any encapsulating query
    pub fn add(&mut self, query: AslQuery) -> QueryId {
        let id = QueryId(self.queries.len());
        log::trace!("plan: {} {}", query.kind.label(), query.alias);
        self.queries.push(query);
        self.parents.push(None);
        id
    }

    /// Attach `child` to the encapsulating query `parent`.
    ///
    /// A query can be attached once; the first child of a query is not joined.
    pub fn add_child(&mut self, parent: QueryId, child: QueryId, join: Option<AslJoin>) -> Result<()> {
        if child == self.root() || self.parents[child.0].is_some() {
            return Err(AqlError::plan(format!(
                "Query {} is already part of the plan",
                self.alias(child)
            )));
        }
        let parent_alias = self.alias(parent).to_string();
        let encapsulated = self.queries[parent.0].encapsulated_mut().ok_or_else(|| {
            AqlError::plan(format!("Query {parent_alias} cannot have children"))
        })?;
        let join = if encapsulated.children.is_empty() { None } else { join };
        encapsulated.children.push(EncapsulatedChild { query: child, join });
        self.parents[child.0] = Some(parent);
        Ok(())
    }

    /// The join of an attached query
    pub fn join_of_mut(&mut self, child: QueryId) -> Option<&mut AslJoin> {
        let parent = self.parents[child.0]?;
        self.queries[parent.0]
            .encapsulated_mut()?
            .children
            .iter_mut()
            .find(|c| c.query == child)
            .and_then(|c| c.join.as_mut())
    }

    /// AND a condition onto the query's condition
    pub fn add_condition_and(&mut self, id: QueryId, condition: AslCondition) {
        let query = &mut self.queries[id.0];
        query.condition = Some(match query.condition.take() {
            None => condition,
            Some(AslCondition::And(mut values)) => {
                values.push(condition);
                AslCondition::And(values)
            }
            Some(existing) => AslCondition::And(vec![existing, condition]),
        });
    }

    /// The query within `scope` that makes fields owned by `owner` visible: `owner` itself
    /// or the direct child of `scope` that contains it
    pub fn provider_in(&self, scope: QueryId, owner: QueryId) -> Result<QueryId> {
        let mut current = owner;
        loop {
            if current == scope {
                return Ok(owner);
            }
            match self.parents[current.0] {
                Some(parent) if parent == scope => return Ok(current),
                Some(parent) => current = parent,
                None => {
                    return Err(AqlError::internal(
                        AQL0201,
                        format!(
                            "Query {} is not visible from {}",
                            self.alias(owner),
                            self.alias(scope)
                        ),
                    ));
                }
            }
        }
    }

    /// Name of a column of `owner` as selected by any query it is nested in
    pub fn column_alias(&self, owner: QueryId, column: &str) -> String {
        format!("{}_{}", self.alias(owner), column)
    }

    /// Column fields a query provides to its parent
    pub fn exported_fields(&self, id: QueryId) -> Vec<&AslField> {
        let query = self.query(id);
        match &query.kind {
            AslQueryKind::Encapsulating(e) => e
                .children
                .iter()
                .flat_map(|c| self.exported_fields(c.query))
                .collect(),
            AslQueryKind::Structure(_)
            | AslQueryKind::PathData(_)
            | AslQueryKind::Filtering(_) => query.select.iter().collect(),
            AslQueryKind::RmObjectData(_) | AslQueryKind::Root(_) | AslQueryKind::External => {
                Vec::new()
            }
        }
    }

    /// The column field of `owner` named `column`
    pub fn find_column(&self, owner: QueryId, column: &str) -> Result<&AslField> {
        self.query(owner)
            .select
            .iter()
            .find(|f| f.column_name() == Some(column))
            .ok_or_else(|| {
                AqlError::internal(
                    AQL0201,
                    format!("Query {} does not select {column}", self.alias(owner)),
                )
            })
    }

    /// Check that every relational query is attached exactly once
    pub fn validate(&self) -> Result<()> {
        for id in self.ids().skip(1) {
            let query = self.query(id);
            let attachable = matches!(
                query.kind,
                AslQueryKind::Structure(_)
                    | AslQueryKind::PathData(_)
                    | AslQueryKind::Filtering(_)
                    | AslQueryKind::Encapsulating(_)
            );
            if attachable && self.parent(id).is_none() {
                return Err(AqlError::plan(format!(
                    "Query {} is not attached to the plan",
                    query.alias
                )));
            }
        }
        Ok(())
    }

    fn fmt_query(&self, f: &mut fmt::Formatter<'_>, id: QueryId, depth: usize) -> fmt::Result {
        let query = self.query(id);
        write!(f, "{:indent$}{} {}", "", query.kind.label(), query.alias, indent = depth * 2)?;
        match &query.kind {
            AslQueryKind::Structure(s) => {
                write!(f, " {:?}", s.relation)?;
                if !s.rm_types.is_empty() {
                    write!(f, " [{}]", s.rm_types.join(", "))?;
                }
                if let Some(attribute) = &s.attribute {
                    write!(f, " /{attribute}")?;
                }
                if s.requires_version_table {
                    f.write_str(" +version")?;
                }
            }
            AslQueryKind::PathData(p) => {
                write!(f, " {} /{}", self.alias(p.base), p.path.join("/"))?;
                if p.multiple_valued {
                    f.write_str(" []")?;
                }
            }
            AslQueryKind::RmObjectData(r) => write!(f, " {}", self.alias(r.base))?,
            AslQueryKind::Filtering(q) => write!(f, " {}", self.alias(q.source.owner))?,
            _ => {}
        }
        writeln!(f)?;
        for child in query.children() {
            if let Some(join) = &child.join {
                write!(
                    f,
                    "{:indent$}{} {}",
                    "",
                    join.join_type,
                    self.alias(join.left),
                    indent = depth * 2 + 2
                )?;
                writeln!(f)?;
                self.fmt_query(f, child.query, depth + 2)?;
            } else {
                self.fmt_query(f, child.query, depth + 1)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for AslPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_query(f, self.root(), 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn structure(alias: &str) -> AslQuery {
        AslQuery::new(
            alias,
            AslQueryKind::Structure(StructureQuery {
                relation: SourceRelation::Composition,
                rm_types: Vec::new(),
                requires_version_table: false,
                attribute: None,
            }),
        )
    }

    #[test]
    fn test_provider_resolution() {
        let mut plan = AslPlan::new();
        let root = plan.root();
        let outer = plan.add(AslQuery::new(
            "eq",
            AslQueryKind::Encapsulating(EncapsulatingQuery::default()),
        ));
        let inner = plan.add(structure("s"));
        plan.add_child(root, outer, None).unwrap();
        plan.add_child(outer, inner, None).unwrap();

        assert_eq!(plan.provider_in(root, inner).unwrap(), outer);
        assert_eq!(plan.provider_in(outer, inner).unwrap(), inner);
        assert_eq!(plan.provider_in(inner, inner).unwrap(), inner);

        let detached = plan.add(structure("d"));
        let err = plan.provider_in(root, detached).unwrap_err();
        assert_eq!(err.code(), AQL0201);
    }

    #[test]
    fn test_queries_are_attached_once() {
        let mut plan = AslPlan::new();
        let root = plan.root();
        let s = plan.add(structure("s"));
        plan.add_child(root, s, None).unwrap();
        assert!(plan.add_child(root, s, None).is_err());

        let t = plan.add(structure("t"));
        assert!(plan.add_child(s, t, None).is_err());
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_first_child_is_not_joined() {
        let mut plan = AslPlan::new();
        let root = plan.root();
        let a = plan.add(structure("a"));
        let b = plan.add(structure("b"));
        plan.add_child(root, a, Some(AslJoin::new(root, JoinType::Join, vec![])))
            .unwrap();
        plan.add_child(root, b, Some(AslJoin::new(a, JoinType::LeftOuter, vec![])))
            .unwrap();
        let children = plan.query(root).children();
        assert!(children[0].join.is_none());
        assert_eq!(children[1].join.as_ref().unwrap().join_type, JoinType::LeftOuter);
    }

    #[test]
    fn test_condition_and() {
        let mut plan = AslPlan::new();
        let root = plan.root();
        plan.add_condition_and(root, AslCondition::True);
        plan.add_condition_and(root, AslCondition::False);
        plan.add_condition_and(root, AslCondition::True);
        assert_eq!(
            plan.query(root).condition,
            Some(AslCondition::And(vec![
                AslCondition::True,
                AslCondition::False,
                AslCondition::True
            ]))
        );
    }

    #[test]
    fn test_dv_ordered_fields() {
        let owner = QueryId(1);
        let field = AslField::named_column(owner, "data", ColumnType::Jsonb);
        assert!(!field.is_dv_ordered());
        let ordered = field.with_dv_ordered_types(["DV_QUANTITY".to_string()].into_iter().collect());
        assert!(ordered.is_dv_ordered());
        let text = AslField::named_column(owner, "name", ColumnType::Text)
            .with_dv_ordered_types(["DV_QUANTITY".to_string()].into_iter().collect());
        assert!(!text.is_dv_ordered());
    }
}
