// ABOUTME: Reader for Granola's local cache file (cache-v3.json)
// ABOUTME: Unwraps the double-encoded state into documents, transcripts, and folder membership

use crate::model::{null_as_default, parse_timestamp};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TranscriptSegment {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub document_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub start_timestamp: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub end_timestamp: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    /// `microphone` for the local user, `system` for everyone else.
    #[serde(default, deserialize_with = "null_as_default")]
    pub source: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_final: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CacheDocument {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl CacheDocument {
    /// Declared update time, falling back to creation time.
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.updated_at
            .as_deref()
            .and_then(parse_timestamp)
            .or_else(|| self.created_at.as_deref().and_then(parse_timestamp))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Folder {
    pub id: String,
    pub title: String,
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CacheData {
    pub documents: BTreeMap<String, CacheDocument>,
    pub transcripts: BTreeMap<String, Vec<TranscriptSegment>>,
    pub folders: BTreeMap<String, Folder>,
    /// Document id to the ids of the folders listing it.
    pub doc_folders: BTreeMap<String, Vec<String>>,
}

impl CacheData {
    /// Titles of the folders containing `doc_id`; untitled folders are omitted.
    pub fn folder_names(&self, doc_id: &str) -> Vec<String> {
        self.doc_folders
            .get(doc_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.folders.get(id))
                    .filter(|folder| !folder.title.is_empty())
                    .map(|folder| folder.title.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn transcript(&self, doc_id: &str) -> &[TranscriptSegment] {
        self.transcripts
            .get(doc_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

fn entries<'a>(
    state: &'a Map<String, Value>,
    key: &str,
) -> impl Iterator<Item = (&'a String, &'a Value)> {
    state.get(key).and_then(Value::as_object).into_iter().flatten()
}

pub fn read_cache(path: &Path) -> Result<CacheData> {
    let raw = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    parse_cache(&raw)
}

/// Parses the outer `{"cache": "<json>"}` wrapper and its `state` object.
/// Entries that do not have the expected shape are skipped.
pub fn parse_cache(raw: &str) -> Result<CacheData> {
    let outer: Value =
        serde_json::from_str(raw).map_err(|e| Error::Cache(format!("invalid cache file: {}", e)))?;

    let inner: Value = match outer.get("cache") {
        Some(Value::String(encoded)) => serde_json::from_str(encoded)
            .map_err(|e| Error::Cache(format!("invalid cache payload: {}", e)))?,
        Some(Value::Object(map)) => Value::Object(map.clone()),
        _ => return Err(Error::Cache("cache file has no \"cache\" payload".into())),
    };

    let empty = Map::new();
    let state = inner
        .get("state")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let mut data = CacheData::default();

    for (id, value) in entries(state, "documents") {
        match CacheDocument::deserialize(value) {
            Ok(mut doc) => {
                doc.id = id.clone();
                data.documents.insert(id.clone(), doc);
            }
            Err(e) => debug!(id = %id, error = %e, "skipping cached document"),
        }
    }

    for (id, value) in entries(state, "transcripts") {
        let Some(items) = value.as_array() else {
            debug!(id = %id, "skipping transcript that is not a list");
            continue;
        };
        let segments = items
            .iter()
            .filter_map(|entry| TranscriptSegment::deserialize(entry).ok())
            .map(|mut segment| {
                if segment.document_id.is_empty() {
                    segment.document_id = id.clone();
                }
                segment
            })
            .collect();
        data.transcripts.insert(id.clone(), segments);
    }

    for (id, value) in entries(state, "documentListsMetadata") {
        let Some(meta) = value.as_object() else {
            continue;
        };
        data.folders.insert(
            id.clone(),
            Folder {
                id: id.clone(),
                title: meta
                    .get("title")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                parent_id: meta
                    .get("parent_document_list_id")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
        );
    }

    for (folder_id, value) in entries(state, "documentLists") {
        let Some(doc_ids) = value.as_array() else {
            continue;
        };
        for doc_id in doc_ids.iter().filter_map(Value::as_str) {
            data.doc_folders
                .entry(doc_id.to_string())
                .or_default()
                .push(folder_id.clone());
        }
    }

    debug!(
        documents = data.documents.len(),
        transcripts = data.transcripts.len(),
        folders = data.folders.len(),
        "parsed cache"
    );

    Ok(data)
}
