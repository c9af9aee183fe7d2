//! Paths that map onto physical columns instead of JSON extraction

use crate::constants::{COMPOSITION, EHR, EHR_STATUS};
use crate::structure::{AncestorStructureRmType, StructureRmType};
use crate::schema::StructureColumn;
use aql_ast::AqlObjectPath;

/// A path answered directly by structure, version or EHR columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractedColumn {
    /// `name/value` → `entity_name`
    NameValue,
    /// `uid/value` → `vo_id::system_id::sys_version`
    VoId,
    /// `archetype_node_id` of a COMPOSITION → `root_concept`
    RootConcept,
    /// `archetype_node_id` → `rm_entity` + `entity_concept`
    ArchetypeNodeId,
    /// `archetype_details/template_id/value` → `template_id`
    TemplateId,
    EhrId,
    EhrSystemId,
    EhrSystemIdDv,
    EhrTimeCreated,
    EhrTimeCreatedDv,
}

impl ExtractedColumn {
    pub const ALL: [ExtractedColumn; 10] = [
        ExtractedColumn::NameValue,
        ExtractedColumn::VoId,
        ExtractedColumn::RootConcept,
        ExtractedColumn::ArchetypeNodeId,
        ExtractedColumn::TemplateId,
        ExtractedColumn::EhrId,
        ExtractedColumn::EhrSystemId,
        ExtractedColumn::EhrSystemIdDv,
        ExtractedColumn::EhrTimeCreated,
        ExtractedColumn::EhrTimeCreatedDv,
    ];

    /// The AQL path, as attribute names
    pub fn attributes(&self) -> &'static [&'static str] {
        match self {
            ExtractedColumn::NameValue => &["name", "value"],
            ExtractedColumn::VoId => &["uid", "value"],
            ExtractedColumn::RootConcept | ExtractedColumn::ArchetypeNodeId => {
                &["archetype_node_id"]
            }
            ExtractedColumn::TemplateId => &["archetype_details", "template_id", "value"],
            ExtractedColumn::EhrId => &["ehr_id", "value"],
            ExtractedColumn::EhrSystemId => &["system_id", "value"],
            ExtractedColumn::EhrSystemIdDv => &["system_id"],
            ExtractedColumn::EhrTimeCreated => &["time_created", "value"],
            ExtractedColumn::EhrTimeCreatedDv => &["time_created"],
        }
    }

    pub fn path(&self) -> AqlObjectPath {
        AqlObjectPath::from_attributes(self.attributes().iter().copied())
    }

    /// Physical columns the value is read from; empty for computed values
    pub fn columns(&self) -> &'static [StructureColumn] {
        match self {
            ExtractedColumn::NameValue => &[StructureColumn::EntityName],
            ExtractedColumn::VoId => &[StructureColumn::VoId, StructureColumn::SysVersion],
            ExtractedColumn::RootConcept => &[StructureColumn::RootConcept],
            ExtractedColumn::ArchetypeNodeId => {
                &[StructureColumn::RmEntity, StructureColumn::EntityConcept]
            }
            ExtractedColumn::TemplateId => &[StructureColumn::TemplateId],
            ExtractedColumn::EhrId
            | ExtractedColumn::EhrSystemId
            | ExtractedColumn::EhrSystemIdDv
            | ExtractedColumn::EhrTimeCreated
            | ExtractedColumn::EhrTimeCreatedDv => &[],
        }
    }

    /// Whether the value needs the version table joined
    pub fn requires_version_table(&self) -> bool {
        matches!(
            self,
            ExtractedColumn::VoId | ExtractedColumn::RootConcept | ExtractedColumn::TemplateId
        )
    }

    pub fn is_ehr_column(&self) -> bool {
        matches!(
            self,
            ExtractedColumn::EhrId
                | ExtractedColumn::EhrSystemId
                | ExtractedColumn::EhrSystemIdDv
                | ExtractedColumn::EhrTimeCreated
                | ExtractedColumn::EhrTimeCreatedDv
        )
    }

    /// Whether the column applies to a containment of the given RM type
    pub fn allows_rm_type(&self, rm_type: &str) -> bool {
        let is_structure = StructureRmType::by_type_name(rm_type).is_some()
            || AncestorStructureRmType::by_type_name(rm_type).is_some();
        match self {
            ExtractedColumn::NameValue => is_structure,
            ExtractedColumn::VoId => rm_type == COMPOSITION || rm_type == EHR_STATUS,
            ExtractedColumn::RootConcept | ExtractedColumn::TemplateId => rm_type == COMPOSITION,
            ExtractedColumn::ArchetypeNodeId => is_structure && rm_type != COMPOSITION,
            _ => rm_type == EHR,
        }
    }

    pub fn matches(&self, rm_type: &str, path: &AqlObjectPath) -> bool {
        self.allows_rm_type(rm_type) && path.is_plain(self.attributes())
    }

    /// The extracted column for a path below a containment of `rm_type`
    pub fn find(rm_type: &str, path: &AqlObjectPath) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.matches(rm_type, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("COMPOSITION", &["name", "value"], Some(ExtractedColumn::NameValue))]
    #[case("CLUSTER", &["name", "value"], Some(ExtractedColumn::NameValue))]
    #[case("CARE_ENTRY", &["name", "value"], Some(ExtractedColumn::NameValue))]
    #[case("COMPOSITION", &["uid", "value"], Some(ExtractedColumn::VoId))]
    #[case("OBSERVATION", &["uid", "value"], None)]
    #[case("COMPOSITION", &["archetype_node_id"], Some(ExtractedColumn::RootConcept))]
    #[case("OBSERVATION", &["archetype_node_id"], Some(ExtractedColumn::ArchetypeNodeId))]
    #[case("COMPOSITION", &["archetype_details", "template_id", "value"], Some(ExtractedColumn::TemplateId))]
    #[case("EHR", &["ehr_id", "value"], Some(ExtractedColumn::EhrId))]
    #[case("EHR", &["time_created"], Some(ExtractedColumn::EhrTimeCreatedDv))]
    #[case("EHR", &["name", "value"], None)]
    #[case("DV_TEXT", &["value"], None)]
    fn test_find(
        #[case] rm_type: &str,
        #[case] attributes: &[&str],
        #[case] expected: Option<ExtractedColumn>,
    ) {
        let path = AqlObjectPath::from_attributes(attributes.iter().copied());
        assert_eq!(ExtractedColumn::find(rm_type, &path), expected);
    }

    #[test]
    fn test_version_table_columns() {
        for column in ExtractedColumn::ALL {
            let needs_version = column.columns().iter().any(|c| c.from_version_table());
            assert_eq!(needs_version, column.requires_version_table(), "{column:?}");
        }
    }
}
