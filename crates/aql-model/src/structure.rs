//! Structure RM types: the RM types stored as rows of the flattened structure tables

use std::fmt;

/// The physical root a structure row belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructureRoot {
    Ehr,
    EhrStatus,
    Composition,
    Folder,
}

impl StructureRoot {
    pub fn type_name(&self) -> &'static str {
        match self {
            StructureRoot::Ehr => "EHR",
            StructureRoot::EhrStatus => "EHR_STATUS",
            StructureRoot::Composition => "COMPOSITION",
            StructureRoot::Folder => "FOLDER",
        }
    }
}

/// RM types persisted as individual structure rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StructureRmType {
    Composition,
    Folder,
    EhrStatus,
    EventContext,
    Section,
    GenericEntry,
    AdminEntry,
    Observation,
    Instruction,
    Action,
    Evaluation,
    InstructionDetails,
    Activity,
    History,
    PointEvent,
    IntervalEvent,
    FeederAudit,
    FeederAuditDetails,
    ItemList,
    ItemSingle,
    ItemTable,
    ItemTree,
    Cluster,
    Element,
}

use StructureRmType::*;

const ENTRIES: [StructureRmType; 6] = [
    GenericEntry,
    AdminEntry,
    Observation,
    Instruction,
    Action,
    Evaluation,
];

const ITEM_STRUCTURE_PARENTS: [StructureRmType; 14] = [
    Folder,
    EhrStatus,
    FeederAuditDetails,
    EventContext,
    AdminEntry,
    Observation,
    Instruction,
    Action,
    Evaluation,
    InstructionDetails,
    Activity,
    History,
    PointEvent,
    IntervalEvent,
];

const ITEM_TREE_PARENTS: [StructureRmType; 15] = [
    Folder,
    EhrStatus,
    FeederAuditDetails,
    EventContext,
    GenericEntry,
    AdminEntry,
    Observation,
    Instruction,
    Action,
    Evaluation,
    InstructionDetails,
    Activity,
    History,
    PointEvent,
    IntervalEvent,
];

const FEEDER_AUDIT_PARENTS: [StructureRmType; 14] = [
    Composition,
    Folder,
    EhrStatus,
    Section,
    GenericEntry,
    AdminEntry,
    Observation,
    Instruction,
    Action,
    Evaluation,
    Activity,
    History,
    PointEvent,
    IntervalEvent,
];

impl StructureRmType {
    pub const ALL: [StructureRmType; 24] = [
        Composition,
        Folder,
        EhrStatus,
        EventContext,
        Section,
        GenericEntry,
        AdminEntry,
        Observation,
        Instruction,
        Action,
        Evaluation,
        InstructionDetails,
        Activity,
        History,
        PointEvent,
        IntervalEvent,
        FeederAudit,
        FeederAuditDetails,
        ItemList,
        ItemSingle,
        ItemTable,
        ItemTree,
        Cluster,
        Element,
    ];

    pub fn type_name(&self) -> &'static str {
        match self {
            Composition => "COMPOSITION",
            Folder => "FOLDER",
            EhrStatus => "EHR_STATUS",
            EventContext => "EVENT_CONTEXT",
            Section => "SECTION",
            GenericEntry => "GENERIC_ENTRY",
            AdminEntry => "ADMIN_ENTRY",
            Observation => "OBSERVATION",
            Instruction => "INSTRUCTION",
            Action => "ACTION",
            Evaluation => "EVALUATION",
            InstructionDetails => "INSTRUCTION_DETAILS",
            Activity => "ACTIVITY",
            History => "HISTORY",
            PointEvent => "POINT_EVENT",
            IntervalEvent => "INTERVAL_EVENT",
            FeederAudit => "FEEDER_AUDIT",
            FeederAuditDetails => "FEEDER_AUDIT_DETAILS",
            ItemList => "ITEM_LIST",
            ItemSingle => "ITEM_SINGLE",
            ItemTable => "ITEM_TABLE",
            ItemTree => "ITEM_TREE",
            Cluster => "CLUSTER",
            Element => "ELEMENT",
        }
    }

    /// Short alias stored in the `rm_entity` column
    pub fn alias(&self) -> &'static str {
        match self {
            Composition => "CO",
            Folder => "F",
            EhrStatus => "ES",
            EventContext => "EC",
            Section => "SE",
            GenericEntry => "GE",
            AdminEntry => "AE",
            Observation => "OB",
            Instruction => "IN",
            Action => "AN",
            Evaluation => "EV",
            InstructionDetails => "ID",
            Activity => "AY",
            History => "HI",
            PointEvent => "PE",
            IntervalEvent => "IE",
            FeederAudit => "FA",
            FeederAuditDetails => "FD",
            ItemList => "IL",
            ItemSingle => "IS",
            ItemTable => "TA",
            ItemTree => "TR",
            Cluster => "CL",
            Element => "E",
        }
    }

    /// Root of the structure a row of this type can belong to; `None` if it occurs in several
    pub fn structure_root(&self) -> Option<StructureRoot> {
        match self {
            Composition | EventContext | Section | GenericEntry | AdminEntry | Observation
            | Instruction | Action | Evaluation | InstructionDetails | Activity | History
            | PointEvent | IntervalEvent => Some(StructureRoot::Composition),
            Folder => Some(StructureRoot::Folder),
            EhrStatus => Some(StructureRoot::EhrStatus),
            FeederAudit | FeederAuditDetails | ItemList | ItemSingle | ItemTable | ItemTree
            | Cluster | Element => None,
        }
    }

    pub fn is_structure_root(&self) -> bool {
        matches!(self, Composition | Folder | EhrStatus)
    }

    /// Whether rows of this type can be addressed by containment
    pub fn is_structure_entry(&self) -> bool {
        !matches!(self, InstructionDetails | FeederAuditDetails)
    }

    /// Whether the type determines the structure root
    pub fn is_distinguishing(&self) -> bool {
        self.structure_root().is_some()
    }

    /// Types whose rows may directly contain rows of this type
    pub fn parents(&self) -> &'static [StructureRmType] {
        match self {
            Composition | EhrStatus => &[],
            Folder => &[Folder],
            EventContext => &[Composition],
            Section => &[Composition, Section],
            GenericEntry | AdminEntry | Observation | Instruction | Action | Evaluation => {
                &[Composition, Section]
            }
            InstructionDetails => &[Action],
            Activity => &[Instruction],
            History => &[Observation],
            PointEvent | IntervalEvent => &[History],
            FeederAudit => &FEEDER_AUDIT_PARENTS,
            FeederAuditDetails => &[FeederAudit],
            ItemList | ItemSingle | ItemTable => &ITEM_STRUCTURE_PARENTS,
            ItemTree => &ITEM_TREE_PARENTS,
            Cluster => &[ItemTable, ItemTree, Cluster],
            Element => &[ItemList, ItemSingle, ItemTree, Cluster],
        }
    }

    /// Entry types that are not LOCATABLE and therefore carry no archetype node id
    pub fn is_locatable(&self) -> bool {
        !matches!(self, EventContext | FeederAudit | FeederAuditDetails)
    }

    pub fn by_type_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.type_name() == name)
    }

    pub fn by_alias(alias: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.alias() == alias)
    }

    /// The `rm_entity` alias for structure types, the type name otherwise
    pub fn alias_or_type_name(name: &str) -> String {
        Self::by_type_name(name)
            .map(|t| t.alias().to_string())
            .unwrap_or_else(|| name.to_string())
    }

    /// All entry types
    pub fn entries() -> &'static [StructureRmType] {
        &ENTRIES
    }
}

impl fmt::Display for StructureRmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Abstract RM types whose concrete descendants are structure types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AncestorStructureRmType {
    ContentItem,
    Entry,
    CareEntry,
    Event,
    ItemStructure,
    Item,
}

impl AncestorStructureRmType {
    pub const ALL: [AncestorStructureRmType; 6] = [
        AncestorStructureRmType::ContentItem,
        AncestorStructureRmType::Entry,
        AncestorStructureRmType::CareEntry,
        AncestorStructureRmType::Event,
        AncestorStructureRmType::ItemStructure,
        AncestorStructureRmType::Item,
    ];

    pub fn type_name(&self) -> &'static str {
        match self {
            AncestorStructureRmType::ContentItem => "CONTENT_ITEM",
            AncestorStructureRmType::Entry => "ENTRY",
            AncestorStructureRmType::CareEntry => "CARE_ENTRY",
            AncestorStructureRmType::Event => "EVENT",
            AncestorStructureRmType::ItemStructure => "ITEM_STRUCTURE",
            AncestorStructureRmType::Item => "ITEM",
        }
    }

    /// Concrete structure descendants, sorted by name
    pub fn descendants(&self) -> &'static [StructureRmType] {
        match self {
            AncestorStructureRmType::ContentItem => &[
                Action,
                AdminEntry,
                Evaluation,
                GenericEntry,
                Instruction,
                Observation,
                Section,
            ],
            AncestorStructureRmType::Entry => {
                &[Action, AdminEntry, Evaluation, Instruction, Observation]
            }
            AncestorStructureRmType::CareEntry => &[Action, Evaluation, Instruction, Observation],
            AncestorStructureRmType::Event => &[IntervalEvent, PointEvent],
            AncestorStructureRmType::ItemStructure => {
                &[ItemList, ItemSingle, ItemTable, ItemTree]
            }
            AncestorStructureRmType::Item => &[Cluster, Element],
        }
    }

    /// The structure root shared by all descendants, if there is exactly one
    pub fn structure_root(&self) -> Option<StructureRoot> {
        let mut roots = self.descendants().iter().map(|d| d.structure_root());
        let first = roots.next().flatten()?;
        roots.all(|r| r == Some(first)).then_some(first)
    }

    pub fn by_type_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.type_name() == name)
    }
}
