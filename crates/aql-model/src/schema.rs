//! Physical schema of the flattened RM storage
//!
//! Structure rows are keyed by `(vo_id, num)`. A row's descendants occupy the range
//! `num < x <= num_cap` within the same `vo_id`, so "descendant of" becomes a range
//! predicate instead of a recursive query.

use crate::structure::StructureRoot;
use std::fmt;

/// Database schema holding all tables
pub const SCHEMA: &str = "ehr";

/// A physical table
#[derive(Debug, PartialEq, Eq)]
pub struct Table {
    pub name: &'static str,
    pub columns: &'static [&'static str],
    pub primary_key: &'static [&'static str],
}

impl Table {
    /// `ehr.<name>`
    pub fn qualified_name(&self) -> String {
        format!("{SCHEMA}.{}", self.name)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains(&column)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEMA}.{}", self.name)
    }
}

const STRUCTURE_COLUMNS: &[&str] = &[
    "vo_id",
    "num",
    "num_cap",
    "parent_num",
    "rm_entity",
    "entity_concept",
    "entity_name",
    "entity_attribute",
    "entity_path",
    "entity_idx",
    "data",
];

const STRUCTURE_KEY: &[&str] = &["vo_id", "num"];

pub static EHR: Table = Table {
    name: "ehr",
    columns: &["id", "creation_date"],
    primary_key: &["id"],
};

pub static COMP_VERSION: Table = Table {
    name: "comp_version",
    columns: &[
        "vo_id",
        "sys_version",
        "ehr_id",
        "contribution_id",
        "audit_id",
        "sys_period_lower",
        "template_id",
        "root_concept",
    ],
    primary_key: &["vo_id", "sys_version"],
};

pub static COMP_DATA: Table = Table {
    name: "comp_data",
    columns: STRUCTURE_COLUMNS,
    primary_key: STRUCTURE_KEY,
};

pub static EHR_STATUS_VERSION: Table = Table {
    name: "ehr_status_version",
    columns: &[
        "vo_id",
        "sys_version",
        "ehr_id",
        "contribution_id",
        "audit_id",
        "sys_period_lower",
    ],
    primary_key: &["vo_id", "sys_version"],
};

pub static EHR_STATUS_DATA: Table = Table {
    name: "ehr_status_data",
    columns: STRUCTURE_COLUMNS,
    primary_key: STRUCTURE_KEY,
};

pub static EHR_FOLDER_VERSION: Table = Table {
    name: "ehr_folder_version",
    columns: &[
        "vo_id",
        "sys_version",
        "ehr_id",
        "ehr_folders_idx",
        "contribution_id",
        "audit_id",
        "sys_period_lower",
    ],
    primary_key: &["vo_id", "sys_version"],
};

pub static EHR_FOLDER_DATA: Table = Table {
    name: "ehr_folder_data",
    columns: &[
        "vo_id",
        "num",
        "num_cap",
        "parent_num",
        "rm_entity",
        "entity_concept",
        "entity_name",
        "entity_attribute",
        "entity_path",
        "entity_idx",
        "item_uuids",
        "data",
    ],
    primary_key: STRUCTURE_KEY,
};

pub static AUDIT_DETAILS: Table = Table {
    name: "audit_details",
    columns: &["id", "ehr_id", "change_type", "description", "committer"],
    primary_key: &["id"],
};

/// Stored templates; `comp_version.template_id` references `id`
pub static TEMPLATE_STORE: Table = Table {
    name: "template_store",
    columns: &["id", "template_id"],
    primary_key: &["id"],
};

/// The relation a structure query selects from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceRelation {
    Ehr,
    EhrStatus,
    Composition,
    Folder,
    AuditDetails,
}

impl SourceRelation {
    pub fn structure_root(&self) -> Option<StructureRoot> {
        match self {
            SourceRelation::Ehr => Some(StructureRoot::Ehr),
            SourceRelation::EhrStatus => Some(StructureRoot::EhrStatus),
            SourceRelation::Composition => Some(StructureRoot::Composition),
            SourceRelation::Folder => Some(StructureRoot::Folder),
            SourceRelation::AuditDetails => None,
        }
    }

    pub fn from_structure_root(root: StructureRoot) -> Self {
        match root {
            StructureRoot::Ehr => SourceRelation::Ehr,
            StructureRoot::EhrStatus => SourceRelation::EhrStatus,
            StructureRoot::Composition => SourceRelation::Composition,
            StructureRoot::Folder => SourceRelation::Folder,
        }
    }

    pub fn version_table(&self) -> Option<&'static Table> {
        match self {
            SourceRelation::EhrStatus => Some(&EHR_STATUS_VERSION),
            SourceRelation::Composition => Some(&COMP_VERSION),
            SourceRelation::Folder => Some(&EHR_FOLDER_VERSION),
            SourceRelation::Ehr | SourceRelation::AuditDetails => None,
        }
    }

    pub fn data_table(&self) -> &'static Table {
        match self {
            SourceRelation::Ehr => &EHR,
            SourceRelation::EhrStatus => &EHR_STATUS_DATA,
            SourceRelation::Composition => &COMP_DATA,
            SourceRelation::Folder => &EHR_FOLDER_DATA,
            SourceRelation::AuditDetails => &AUDIT_DETAILS,
        }
    }

    /// Primary key of the version table, or of the data table when there is none
    pub fn pkey_columns(&self) -> &'static [&'static str] {
        self.version_table()
            .unwrap_or_else(|| self.data_table())
            .primary_key
    }

    /// Whether rows are flattened RM structures with `num`/`num_cap`
    pub fn is_structure(&self) -> bool {
        self.structure_root()
            .is_some_and(|root| root != StructureRoot::Ehr)
    }
}

/// A column of a structure query, possibly provided by the version table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StructureColumn {
    VoId,
    Num,
    NumCap,
    ParentNum,
    RmEntity,
    EntityConcept,
    EntityName,
    EntityAttribute,
    EntityPath,
    EntityIdx,
    EhrId,
    SysVersion,
    AuditId,
    ContributionId,
    SysPeriodLower,
    TemplateId,
    RootConcept,
    ItemUuids,
    Data,
}

impl StructureColumn {
    pub const ALL: [StructureColumn; 19] = [
        StructureColumn::VoId,
        StructureColumn::Num,
        StructureColumn::NumCap,
        StructureColumn::ParentNum,
        StructureColumn::RmEntity,
        StructureColumn::EntityConcept,
        StructureColumn::EntityName,
        StructureColumn::EntityAttribute,
        StructureColumn::EntityPath,
        StructureColumn::EntityIdx,
        StructureColumn::EhrId,
        StructureColumn::SysVersion,
        StructureColumn::AuditId,
        StructureColumn::ContributionId,
        StructureColumn::SysPeriodLower,
        StructureColumn::TemplateId,
        StructureColumn::RootConcept,
        StructureColumn::ItemUuids,
        StructureColumn::Data,
    ];

    pub fn column_name(&self) -> &'static str {
        match self {
            StructureColumn::VoId => "vo_id",
            StructureColumn::Num => "num",
            StructureColumn::NumCap => "num_cap",
            StructureColumn::ParentNum => "parent_num",
            StructureColumn::RmEntity => "rm_entity",
            StructureColumn::EntityConcept => "entity_concept",
            StructureColumn::EntityName => "entity_name",
            StructureColumn::EntityAttribute => "entity_attribute",
            StructureColumn::EntityPath => "entity_path",
            StructureColumn::EntityIdx => "entity_idx",
            StructureColumn::EhrId => "ehr_id",
            StructureColumn::SysVersion => "sys_version",
            StructureColumn::AuditId => "audit_id",
            StructureColumn::ContributionId => "contribution_id",
            StructureColumn::SysPeriodLower => "sys_period_lower",
            StructureColumn::TemplateId => "template_id",
            StructureColumn::RootConcept => "root_concept",
            StructureColumn::ItemUuids => "item_uuids",
            StructureColumn::Data => "data",
        }
    }

    /// Columns that only exist on the version table
    pub fn from_version_table(&self) -> bool {
        matches!(
            self,
            StructureColumn::EhrId
                | StructureColumn::SysVersion
                | StructureColumn::AuditId
                | StructureColumn::ContributionId
                | StructureColumn::SysPeriodLower
                | StructureColumn::TemplateId
                | StructureColumn::RootConcept
        )
    }

    /// Whether the relation provides this column, given whether the version table is joined
    pub fn is_available(&self, relation: SourceRelation, with_version_table: bool) -> bool {
        if self.from_version_table() {
            with_version_table
                && relation
                    .version_table()
                    .is_some_and(|t| t.has_column(self.column_name()))
        } else {
            relation.is_structure() && relation.data_table().has_column(self.column_name())
        }
    }
}
