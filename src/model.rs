// ABOUTME: Serde data models for Granola API responses and document trees
// ABOUTME: Tolerant parsing with optional fields and string-embedded ProseMirror JSON

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One node of a ProseMirror-style rich-text tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(rename = "attrs", default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Map<String, Value>>,
    #[serde(rename = "content", default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TreeNode>>,
}

/// Root of a rich-text tree; its kind is `doc` on the wire.
pub type DocumentTree = TreeNode;

impl TreeNode {
    pub fn new(kind: &str) -> Self {
        TreeNode {
            kind: kind.to_string(),
            ..Default::default()
        }
    }

    pub fn text(text: &str) -> Self {
        TreeNode {
            kind: "text".into(),
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    pub fn with_children(mut self, children: Vec<TreeNode>) -> Self {
        self.children = Some(children);
        self
    }

    pub fn with_attr(mut self, key: &str, value: Value) -> Self {
        self.attributes
            .get_or_insert_with(Map::new)
            .insert(key.to_string(), value);
        self
    }

    pub fn children(&self) -> &[TreeNode] {
        self.children.as_deref().unwrap_or(&[])
    }
}


/// Deserializes a tree that may arrive as an object or as a JSON string
/// holding the object. HTML strings and unparseable payloads become `None`.
fn deserialize_embedded_tree<'de, D>(deserializer: D) -> Result<Option<DocumentTree>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(raw)) => {
            let trimmed = raw.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('<') {
                None
            } else {
                serde_json::from_str(trimmed).ok()
            }
        }
        Some(other) => serde_json::from_value(other).ok(),
    })
}

pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LastViewedPanel {
    #[serde(default, deserialize_with = "deserialize_embedded_tree")]
    pub content: Option<DocumentTree>,
    /// HTML rendering of the panel.
    #[serde(default)]
    pub original_content: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// A note as returned by `/v2/get-documents`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub last_viewed_panel: Option<LastViewedPanel>,
    #[serde(default, deserialize_with = "deserialize_embedded_tree")]
    pub notes: Option<DocumentTree>,
    #[serde(default)]
    pub notes_plain: Option<String>,
}

impl Document {
    /// Declared update time, falling back to creation time.
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.updated_at
            .as_deref()
            .and_then(parse_timestamp)
            .or_else(|| self.created_at.as_deref().and_then(parse_timestamp))
    }
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}


/// YAML frontmatter for exported notes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frontmatter {
    pub id: String,
    #[serde(rename = "created", default)]
    pub created_at: String,
    #[serde(rename = "updated", default)]
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[cfg(test)]
mod frontmatter_tests {
    use super::*;

    #[test]
    fn test_frontmatter_roundtrip() {
        let fm = Frontmatter {
            id: "doc123".into(),
            created_at: "2025-10-28T15:04:05Z".into(),
            updated_at: "2025-10-29T01:23:45Z".into(),
            tags: vec!["Planning".into()],
        };

        let yaml = serde_yaml::to_string(&fm).unwrap();
        assert!(yaml.contains("created:"));
        let parsed: Frontmatter = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.id, "doc123");
        assert_eq!(parsed.tags.len(), 1);
    }

    #[test]
    fn test_frontmatter_omits_empty_tags() {
        let fm = Frontmatter {
            id: "doc123".into(),
            created_at: String::new(),
            updated_at: String::new(),
            tags: vec![],
        };
        let yaml = serde_yaml::to_string(&fm).unwrap();
        assert!(!yaml.contains("tags"));
    }
}
