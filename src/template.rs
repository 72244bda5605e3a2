use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::label::Inference;

const YEAR_PLACEHOLDER: &str = "{year}";
const HEADLINE_PLACEHOLDER: &str = "{subdir_text}";

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to read template {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse template {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to parse template: {0}")]
    ParseJson(#[source] serde_json::Error),

    #[error("template has no fields")]
    Empty,

    #[error("template field #{0} has an empty tag name")]
    EmptyTag(usize),

    #[error("template lists tag '{0}' more than once")]
    DuplicateTag(String),
}

/// How a template field gets its value when it needs filling
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRole {
    /// Directory headline, else the default
    Headline,
    /// Directory capture date, else the default
    DateCreated,
    /// Always the default
    #[default]
    Static,
}

/// A single metadata value as written to a tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    /// Individual strings to assign, one per list item
    pub fn items(&self) -> Vec<&str> {
        match self {
            FieldValue::Text(s) => vec![s.as_str()],
            FieldValue::List(items) => items.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateField {
    pub tag: String,
    #[serde(default)]
    pub role: FieldRole,
    #[serde(default)]
    pub default: Option<FieldValue>,
}

impl TemplateField {
    pub fn new(tag: &str, role: FieldRole, default: Option<FieldValue>) -> Self {
        TemplateField {
            tag: tag.to_string(),
            role,
            default,
        }
    }

    /// Render the default against a directory inference.
    ///
    /// Returns `None` when there is no default, or when a placeholder it uses
    /// has nothing to fill it. List items that cannot be rendered are dropped.
    pub fn render_default(&self, inference: &Inference) -> Option<FieldValue> {
        match self.default.as_ref()? {
            FieldValue::Text(s) => render(s, inference).map(FieldValue::Text),
            FieldValue::List(items) => {
                let rendered: Vec<String> = items.iter().filter_map(|s| render(s, inference)).collect();
                if rendered.is_empty() {
                    None
                } else {
                    Some(FieldValue::List(rendered))
                }
            }
        }
    }
}

/// Fields eligible for auto-fill, loaded once at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataTemplate {
    pub fields: Vec<TemplateField>,
}

impl Default for MetadataTemplate {
    fn default() -> Self {
        MetadataTemplate {
            fields: vec![
                TemplateField::new("XMP-photoshop:Headline", FieldRole::Headline, None),
                TemplateField::new("XMP-photoshop:DateCreated", FieldRole::DateCreated, None),
            ],
        }
    }
}

impl MetadataTemplate {
    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let content = fs::read_to_string(path).map_err(|source| TemplateError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content).map_err(|e| match e {
            TemplateError::ParseJson(source) => TemplateError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, TemplateError> {
        let template: MetadataTemplate = serde_json::from_str(json).map_err(TemplateError::ParseJson)?;
        template.validate()?;
        Ok(template)
    }

    pub fn validate(&self) -> Result<(), TemplateError> {
        if self.fields.is_empty() {
            return Err(TemplateError::Empty);
        }

        let mut seen = HashSet::new();
        for (i, field) in self.fields.iter().enumerate() {
            let tag = field.tag.trim();
            if tag.is_empty() {
                return Err(TemplateError::EmptyTag(i));
            }
            if !seen.insert(tag.to_lowercase()) {
                return Err(TemplateError::DuplicateTag(tag.to_string()));
            }
        }
        Ok(())
    }
}

/// Whether a value still carries a placeholder that was never filled in
pub fn has_placeholder(s: &str) -> bool {
    s.contains(YEAR_PLACEHOLDER) || s.contains(HEADLINE_PLACEHOLDER)
}

fn render(s: &str, inference: &Inference) -> Option<String> {
    let mut out = s.to_string();
    if out.contains(YEAR_PLACEHOLDER) {
        let year = inference.date?.year();
        out = out.replace(YEAR_PLACEHOLDER, &format!("{:04}", year));
    }
    if out.contains(HEADLINE_PLACEHOLDER) {
        let headline = inference.headline.as_deref()?;
        out = out.replace(HEADLINE_PLACEHOLDER, headline);
    }
    Some(out)
}
