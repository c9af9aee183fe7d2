//! openEHR reference model metadata for the AQL compiler
//!
//! This crate provides:
//! - RM type introspection (attributes, type hierarchy) backed by an embedded JSON model
//! - Structure RM types and their storage aliases
//! - Attribute and type aliases of the JSON encoding
//! - The physical schema the generated SQL is written against
//! - The knowledge cache interface for template lookups

pub mod alias;
pub mod constants;
pub mod extracted_column;
pub mod foundation;
pub mod knowledge;
pub mod provider;
pub mod registry;
pub mod rm_model;
pub mod schema;
pub mod structure;

pub use alias::{RmAttributeAlias, RmTypeAlias};
pub use extracted_column::ExtractedColumn;
pub use foundation::FoundationType;
pub use knowledge::{InMemoryKnowledgeCache, KnowledgeCache, TemplateMetadata};
pub use provider::{ModelProviderError, RmTypeIntrospection};
pub use registry::RmModelRegistry;
pub use rm_model::{RmAttributeInfo, RmModel, RmTypeInfo};
pub use schema::{SourceRelation, StructureColumn, Table};
pub use structure::{AncestorStructureRmType, StructureRmType, StructureRoot};
