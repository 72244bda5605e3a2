use std::fmt;

use crate::label::Inference;
use crate::metadata::FileMetadataRecord;
use crate::template::{FieldRole, FieldValue, MetadataTemplate, TemplateField};

/// What to do with one template field for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldDecision {
    /// Existing value is non-empty and wins
    Keep,
    /// Field is empty and gets this value
    Write(FieldValue),
    /// Field is empty but nothing could be resolved for it
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeDecision {
    pub tag: String,
    pub decision: FieldDecision,
}

/// Per-field decisions for one file, in template order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergePlan {
    pub decisions: Vec<MergeDecision>,
}

/// Ordered tag -> value assignments handed to the metadata tool
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WritePayload {
    entries: Vec<(String, FieldValue)>,
}

impl WritePayload {
    pub fn push(&mut self, tag: &str, value: FieldValue) {
        self.entries.push((tag.to_string(), value));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(tag, value)| (tag.as_str(), value))
    }

    pub fn get(&self, tag: &str) -> Option<&FieldValue> {
        self.entries.iter().find(|(t, _)| t == tag).map(|(_, v)| v)
    }
}

impl fmt::Display for WritePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .entries
            .iter()
            .map(|(tag, value)| format!("{}={}", tag, value.items().join("|")))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

impl MergePlan {
    pub fn payload(&self) -> WritePayload {
        let mut payload = WritePayload::default();
        for d in &self.decisions {
            if let FieldDecision::Write(value) = &d.decision {
                payload.push(&d.tag, value.clone());
            }
        }
        payload
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &str> {
        self.decisions
            .iter()
            .filter(|d| d.decision == FieldDecision::Unresolved)
            .map(|d| d.tag.as_str())
    }
}

/// Decide which template fields to fill for a file.
///
/// Existing non-empty values are never overwritten. Empty fields take the
/// directory-derived headline or date for their role, falling back to the
/// template default.
pub fn plan_merge(
    record: &FileMetadataRecord,
    template: &MetadataTemplate,
    inference: &Inference,
) -> MergePlan {
    let decisions = template
        .fields
        .iter()
        .map(|field| MergeDecision {
            tag: field.tag.clone(),
            decision: decide_field(record, field, inference),
        })
        .collect();

    MergePlan { decisions }
}

fn decide_field(record: &FileMetadataRecord, field: &TemplateField, inference: &Inference) -> FieldDecision {
    if !record.is_empty_field(&field.tag) {
        return FieldDecision::Keep;
    }

    let from_directory = match field.role {
        FieldRole::Headline => inference.headline.as_deref().map(FieldValue::from),
        FieldRole::DateCreated => inference.date.map(|d| FieldValue::Text(d.exif_value())),
        FieldRole::Static => None,
    };

    match from_directory.or_else(|| field.render_default(inference)) {
        Some(value) => FieldDecision::Write(value),
        None => FieldDecision::Unresolved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::{infer_from_chain, CaptureDate};
    use serde_json::json;

    fn template() -> MetadataTemplate {
        MetadataTemplate {
            fields: vec![
                TemplateField::new("XMP-photoshop:Headline", FieldRole::Headline, None),
                TemplateField::new("XMP-photoshop:DateCreated", FieldRole::DateCreated, None),
                TemplateField::new("XMP-dc:Rights", FieldRole::Static, Some("Family archive".into())),
            ],
        }
    }

    #[test]
    fn test_fills_empty_fields_from_directory() {
        let inference = infer_from_chain(["2013-02-15 Beach"]);
        let plan = plan_merge(&FileMetadataRecord::new(), &template(), &inference);
        let payload = plan.payload();

        assert_eq!(payload.len(), 3);
        assert_eq!(payload.get("XMP-photoshop:Headline"), Some(&FieldValue::from("Beach")));
        assert_eq!(payload.get("XMP-photoshop:DateCreated"), Some(&FieldValue::from("2013:02:15")));
        assert_eq!(payload.get("XMP-dc:Rights"), Some(&FieldValue::from("Family archive")));
    }

    #[test]
    fn test_year_only_writes_year_value() {
        let inference = Inference {
            date: Some(CaptureDate::Year(2013)),
            headline: None,
        };
        let plan = plan_merge(&FileMetadataRecord::new(), &template(), &inference);
        assert_eq!(
            plan.payload().get("XMP-photoshop:DateCreated"),
            Some(&FieldValue::from("2013"))
        );
        assert_eq!(plan.unresolved().collect::<Vec<_>>(), vec!["XMP-photoshop:Headline"]);
    }

    #[test]
    fn test_existing_value_never_overwritten() {
        let mut record = FileMetadataRecord::new();
        record.insert("Headline", json!("Graduation"));

        let inference = infer_from_chain(["2013 Vacation"]);
        let plan = plan_merge(&record, &template(), &inference);

        assert_eq!(plan.decisions[0].decision, FieldDecision::Keep);
        assert!(plan.payload().get("XMP-photoshop:Headline").is_none());
    }

    #[test]
    fn test_template_default_when_directory_has_nothing() {
        let mut template = template();
        template.fields[0].default = Some("Untitled".into());

        let plan = plan_merge(&FileMetadataRecord::new(), &template, &Inference::default());
        let payload = plan.payload();
        assert_eq!(payload.get("XMP-photoshop:Headline"), Some(&FieldValue::from("Untitled")));
        assert!(payload.get("XMP-photoshop:DateCreated").is_none());
    }

    #[test]
    fn test_second_run_writes_nothing() {
        let inference = infer_from_chain(["2013 Family Trip"]);
        let template = template();

        let first = plan_merge(&FileMetadataRecord::new(), &template, &inference).payload();
        assert!(!first.is_empty());

        let mut record = FileMetadataRecord::new();
        for (tag, value) in first.iter() {
            record.insert(tag, serde_json::to_value(value).unwrap());
        }
        let second = plan_merge(&record, &template, &inference).payload();
        assert!(second.is_empty());
    }

    #[test]
    fn test_payload_display() {
        let mut payload = WritePayload::default();
        payload.push("Headline", "Beach".into());
        payload.push("Subject", FieldValue::List(vec!["a".into(), "b".into()]));
        assert_eq!(payload.to_string(), "Headline=Beach, Subject=a|b");
    }
}
