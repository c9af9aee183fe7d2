//! RM model parser for the JSON type-info format
//!
//! The format follows a `typeInfo` list where each entry names its `baseType`, whether it
//! is `abstract`, and its declared `element`s. Collection attributes use `list<TYPE>`.

use super::types::{RmAttributeInfo, RmModel, RmTypeInfo};
use serde_json::Value as JsonValue;

/// Error type for RM model parsing
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid RM model structure: {0}")]
    InvalidStructure(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Parse an RM model from JSON
pub fn parse_json(json_content: &str) -> Result<RmModel, ParseError> {
    let json: JsonValue = serde_json::from_str(json_content)?;

    let mut model = RmModel::new(
        json["name"].as_str().unwrap_or(""),
        json["version"].as_str().unwrap_or(""),
    );
    model.url = json["url"].as_str().unwrap_or("").to_string();

    if let Some(type_infos) = json["typeInfo"].as_array() {
        for type_json in type_infos {
            let type_info = parse_type_info_json(type_json)?;
            if model.type_infos.contains_key(&type_info.name) {
                return Err(ParseError::InvalidStructure(format!(
                    "Duplicate type {}",
                    type_info.name
                )));
            }
            model.type_infos.insert(type_info.name.clone(), type_info);
        }
    }

    for type_info in model.type_infos.values() {
        if let Some(base) = &type_info.base_type {
            if !model.type_infos.contains_key(base) {
                return Err(ParseError::InvalidStructure(format!(
                    "Unknown base type {} of {}",
                    base, type_info.name
                )));
            }
        }
    }

    Ok(model)
}

fn parse_type_info_json(json: &JsonValue) -> Result<RmTypeInfo, ParseError> {
    let mut type_info = RmTypeInfo::new(
        json["name"]
            .as_str()
            .ok_or_else(|| ParseError::InvalidStructure("Missing type name".to_string()))?,
    );

    type_info.base_type = json["baseType"].as_str().map(String::from);
    type_info.is_abstract = json["abstract"].as_bool().unwrap_or(false);

    if let Some(elements) = json["element"].as_array() {
        for elem_json in elements {
            let attribute = parse_attribute_json(elem_json)?;
            type_info.elements.push(attribute);
        }
    }

    Ok(type_info)
}

fn parse_attribute_json(json: &JsonValue) -> Result<RmAttributeInfo, ParseError> {
    let name = json["name"]
        .as_str()
        .ok_or_else(|| ParseError::InvalidStructure("Missing element name".to_string()))?;

    let declared = json["type"]
        .as_str()
        .ok_or_else(|| ParseError::InvalidStructure(format!("Missing type of element {name}")))?;

    let (element_type, is_multiple) = match declared
        .strip_prefix("list<")
        .and_then(|inner| inner.strip_suffix('>'))
    {
        Some(inner) => (inner, true),
        None => (declared, false),
    };

    let mut attribute = RmAttributeInfo::new(name, element_type);
    attribute.is_multiple = is_multiple;
    Ok(attribute)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_json() {
        let json = r#"{
            "name": "TestModel",
            "version": "1.0.0",
            "typeInfo": [
                {"name": "LOCATABLE", "abstract": true, "element": [
                    {"name": "name", "type": "DV_TEXT"}
                ]},
                {"name": "CLUSTER", "baseType": "LOCATABLE", "element": [
                    {"name": "items", "type": "list<LOCATABLE>"}
                ]}
            ]
        }"#;

        let model = parse_json(json).unwrap();
        assert_eq!(model.name, "TestModel");
        assert_eq!(model.version, "1.0.0");

        let cluster = model.get_type("CLUSTER").unwrap();
        assert_eq!(cluster.base_type.as_deref(), Some("LOCATABLE"));
        assert!(!cluster.is_abstract);
        let items = &cluster.elements[0];
        assert!(items.is_multiple);
        assert_eq!(items.element_type, "LOCATABLE");
        assert!(model.get_type("LOCATABLE").unwrap().is_abstract);
    }

    #[test]
    fn test_parse_rejects_unknown_base_type() {
        let json = r#"{"typeInfo": [{"name": "A", "baseType": "MISSING"}]}"#;
        let err = parse_json(json).unwrap_err();
        assert!(err.to_string().contains("Unknown base type MISSING of A"));
    }

    #[test]
    fn test_parse_rejects_missing_name() {
        let json = r#"{"typeInfo": [{"element": []}]}"#;
        assert!(matches!(
            parse_json(json),
            Err(ParseError::InvalidStructure(_))
        ));
    }
}
