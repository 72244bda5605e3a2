use serde_json::Value;
use std::collections::HashMap;

use crate::template::has_placeholder;

/// Metadata currently stored in a media file (and its sidecar), keyed by tag name.
///
/// Keys are normalised on insert so lookups ignore group prefixes such as
/// `XMP-photoshop:` or `IPTC:` and letter case.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileMetadataRecord {
    values: HashMap<String, Value>,
}

/// Strip the group prefix and lowercase a tag name: `XMP-photoshop:Headline` -> `headline`
pub fn normalize_tag(tag: &str) -> String {
    let bare = tag.rsplit(':').next().unwrap_or(tag);
    bare.trim().to_lowercase()
}

impl FileMetadataRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from one exiftool JSON object
    pub fn from_json_object(object: &serde_json::Map<String, Value>) -> Self {
        let mut record = Self::new();
        record.merge_json_object(object);
        record
    }

    /// Merge values from another JSON object; non-empty incoming values replace
    /// existing ones, empty ones never erase what is already known
    pub fn merge_json_object(&mut self, object: &serde_json::Map<String, Value>) {
        for (key, value) in object {
            if key == "SourceFile" {
                continue;
            }
            let normalized = normalize_tag(key);
            if is_empty_value(value) && self.values.contains_key(&normalized) {
                continue;
            }
            self.values.insert(normalized, value.clone());
        }
    }

    pub fn insert(&mut self, tag: &str, value: Value) {
        self.values.insert(normalize_tag(tag), value);
    }

    pub fn get(&self, tag: &str) -> Option<&Value> {
        self.values.get(&normalize_tag(tag))
    }

    /// Whether the tag is absent or holds nothing worth keeping
    pub fn is_empty_field(&self, tag: &str) -> bool {
        self.get(tag).map_or(true, is_empty_value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Emptiness rules for an existing value.
///
/// Strings still carrying a `{year}` / `{subdir_text}` placeholder count as
/// empty so they get repaired on the next run.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty() || has_placeholder(s),
        Value::Array(items) => items.iter().all(is_empty_value),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> serde_json::Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_normalize_tag() {
        assert_eq!(normalize_tag("XMP-photoshop:Headline"), "headline");
        assert_eq!(normalize_tag("IPTC:DateCreated"), "datecreated");
        assert_eq!(normalize_tag("Headline"), "headline");
    }

    #[test]
    fn test_lookup_ignores_group_and_case() {
        let record = FileMetadataRecord::from_json_object(&object(json!({
            "SourceFile": "a.jpg",
            "Headline": "Graduation",
        })));
        assert_eq!(record.get("XMP-photoshop:Headline"), Some(&json!("Graduation")));
        assert!(!record.is_empty_field("headline"));
        assert!(record.get("SourceFile").is_none());
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_empty_values() {
        assert!(is_empty_value(&json!(null)));
        assert!(is_empty_value(&json!("")));
        assert!(is_empty_value(&json!("   ")));
        assert!(is_empty_value(&json!([])));
        assert!(is_empty_value(&json!([""])));
        assert!(is_empty_value(&json!("{subdir_text}")));
        assert!(is_empty_value(&json!("Trip {year}")));
        assert!(!is_empty_value(&json!("Beach")));
        assert!(!is_empty_value(&json!(["a", ""])));
        assert!(!is_empty_value(&json!(2013)));
    }

    #[test]
    fn test_missing_field_is_empty() {
        let record = FileMetadataRecord::new();
        assert!(record.is_empty_field("Headline"));
        assert!(record.is_empty());
    }

    #[test]
    fn test_sidecar_merge_keeps_known_values() {
        let mut record = FileMetadataRecord::from_json_object(&object(json!({
            "Headline": "Graduation",
            "DateCreated": "",
        })));
        record.merge_json_object(&object(json!({
            "Headline": "",
            "DateCreated": "2013:06:01",
        })));
        assert_eq!(record.get("Headline"), Some(&json!("Graduation")));
        assert_eq!(record.get("DateCreated"), Some(&json!("2013:06:01")));
    }
}
