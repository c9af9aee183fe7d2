//! Template knowledge consulted while resolving containment predicates

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Read access to the stored operational templates
pub trait KnowledgeCache: Send + Sync {
    /// Internal id of a template, `None` if the template is unknown
    fn find_uuid_by_template_id(&self, template_id: &str) -> Option<Uuid>;

    /// Archetype id of the template's root COMPOSITION
    fn resolve_template_root_archetype(&self, template_id: &str) -> Option<String>;

    /// Templates whose root COMPOSITION has the given archetype id
    fn templates_matching(&self, root_archetype: &str) -> Vec<String>;
}

/// Template metadata as registered with the cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateMetadata {
    pub template_id: String,
    pub uuid: Uuid,
    pub root_archetype: String,
}

impl TemplateMetadata {
    pub fn new(template_id: impl Into<String>, uuid: Uuid, root_archetype: impl Into<String>) -> Self {
        Self {
            template_id: template_id.into(),
            uuid,
            root_archetype: root_archetype.into(),
        }
    }
}

/// Knowledge cache kept in memory
#[derive(Debug, Default)]
pub struct InMemoryKnowledgeCache {
    templates: RwLock<IndexMap<String, TemplateMetadata>>,
}

impl InMemoryKnowledgeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_templates(templates: impl IntoIterator<Item = TemplateMetadata>) -> Self {
        let cache = Self::new();
        for template in templates {
            cache.register(template);
        }
        cache
    }

    /// Load a JSON array of template metadata
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let templates: Vec<TemplateMetadata> = serde_json::from_str(json)?;
        Ok(Self::with_templates(templates))
    }

    /// Register or replace a template
    pub fn register(&self, template: TemplateMetadata) {
        log::debug!("registering template {}", template.template_id);
        self.templates
            .write()
            .insert(template.template_id.clone(), template);
    }

    pub fn len(&self) -> usize {
        self.templates.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.read().is_empty()
    }
}

impl KnowledgeCache for InMemoryKnowledgeCache {
    fn find_uuid_by_template_id(&self, template_id: &str) -> Option<Uuid> {
        self.templates.read().get(template_id).map(|t| t.uuid)
    }

    fn resolve_template_root_archetype(&self, template_id: &str) -> Option<String> {
        self.templates
            .read()
            .get(template_id)
            .map(|t| t.root_archetype.clone())
    }

    fn templates_matching(&self, root_archetype: &str) -> Vec<String> {
        self.templates
            .read()
            .values()
            .filter(|t| t.root_archetype == root_archetype)
            .map(|t| t.template_id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_lookup() {
        let uuid = Uuid::new_v4();
        let cache = InMemoryKnowledgeCache::with_templates([
            TemplateMetadata::new("vitals", uuid, "openEHR-EHR-COMPOSITION.encounter.v1"),
            TemplateMetadata::new("lab", Uuid::new_v4(), "openEHR-EHR-COMPOSITION.report.v1"),
            TemplateMetadata::new("visit", Uuid::new_v4(), "openEHR-EHR-COMPOSITION.encounter.v1"),
        ]);
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.find_uuid_by_template_id("vitals"), Some(uuid));
        assert_eq!(cache.find_uuid_by_template_id("unknown"), None);
        assert_eq!(
            cache.resolve_template_root_archetype("lab").as_deref(),
            Some("openEHR-EHR-COMPOSITION.report.v1")
        );
        assert_eq!(
            cache.templates_matching("openEHR-EHR-COMPOSITION.encounter.v1"),
            vec!["vitals".to_string(), "visit".to_string()]
        );
    }

    #[test]
    fn test_from_json() {
        let json = r#"[{
            "template_id": "vitals",
            "uuid": "6f3c1d2e-8d4b-4f6e-9a1b-2c3d4e5f6a7b",
            "root_archetype": "openEHR-EHR-COMPOSITION.encounter.v1"
        }]"#;
        let cache = InMemoryKnowledgeCache::from_json_str(json).unwrap();
        assert_eq!(
            cache.find_uuid_by_template_id("vitals").map(|u| u.to_string()).as_deref(),
            Some("6f3c1d2e-8d4b-4f6e-9a1b-2c3d4e5f6a7b")
        );
        assert!(InMemoryKnowledgeCache::from_json_str("{}").is_err());
    }
}
