//! AQL Structured Language: the relational plan between AQL and SQL
//!
//! This crate provides:
//! - The arena-based plan model ([`AslPlan`], [`AslQuery`], [`AslField`])
//! - Containment resolution: FROM classes to structure queries and joins
//! - Path resolution: cohesion trees to path structure, path data and filtering queries
//! - The builder adding SELECT, WHERE, GROUP BY, ORDER BY and LIMIT ([`AslBuilder`])

pub mod alias;
pub mod builder;
pub mod conditions;
pub mod from_creator;
pub mod model;
pub mod path_creator;
pub mod query_wrapper;
pub mod values;

pub use alias::AliasProvider;
pub use builder::AslBuilder;
pub use model::{
    AggregatingField, AslCondition, AslField, AslJoin, AslJoinCondition, AslOperator,
    AslOrderByField, AslPlan, AslQuery, AslQueryKind, ColumnField, ColumnType,
    DvOrderedCondition, EncapsulatedChild, EncapsulatingQuery, FieldKind, FieldValueCondition,
    FilteringQuery, JoinType, PathDataQuery, QueryId, RmObjectDataQuery, RmPathField, RootQuery,
    SqlValue, StructureJoinCondition, StructureQuery, SubqueryField, FOLDER_ITEM_IDS,
};
pub use path_creator::{FILTERED_COLUMN, PATH_DATA_COLUMN};
