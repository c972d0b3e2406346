// ABOUTME: Builds sync-ready documents for each export command
// ABOUTME: Joins API documents with cached transcripts and folders, renders file content

use crate::cache::{CacheData, CacheDocument};
use crate::content::resolve_content;
use crate::format::{combined_text, notes_markdown, transcript_text};
use crate::model::Document;
use crate::prosemirror::TextFormat;
use crate::sync::ExportDocument;
use crate::Result;
use chrono::Utc;
use std::collections::HashSet;
use tracing::debug;

/// Drops repeated ids (pages can overlap while documents change), keeping
/// the first occurrence.
pub fn dedupe_by_id(docs: Vec<Document>) -> Vec<Document> {
    let mut seen = HashSet::new();
    docs.into_iter()
        .filter(|doc| {
            let first = seen.insert(doc.id.clone());
            if !first {
                debug!(id = %doc.id, "dropping duplicate document");
            }
            first
        })
        .collect()
}

pub fn valid_ids(docs: &[Document]) -> HashSet<String> {
    docs.iter().map(|doc| doc.id.clone()).collect()
}

/// Markdown notes with frontmatter, one per API document.
pub fn notes_documents(docs: &[Document]) -> Result<Vec<ExportDocument>> {
    docs.iter()
        .map(|doc| {
            let body = resolve_content(doc, TextFormat::Markdown);
            Ok(ExportDocument {
                id: doc.id.clone(),
                title: doc.title.clone(),
                content: notes_markdown(doc, &body)?,
                last_modified: doc.last_modified().unwrap_or_else(Utc::now),
                folders: Vec::new(),
            })
        })
        .collect()
}

/// Transcript text for every cached transcript. Transcripts whose document
/// is missing from the cache are titled by their id.
pub fn transcript_documents(cache: &CacheData) -> Vec<ExportDocument> {
    cache
        .transcripts
        .iter()
        .map(|(id, segments)| {
            let doc = cache.documents.get(id).cloned().unwrap_or_else(|| CacheDocument {
                id: id.clone(),
                title: Some(id.clone()),
                ..Default::default()
            });
            ExportDocument {
                id: id.clone(),
                title: doc.title.clone(),
                content: transcript_text(&doc, segments),
                last_modified: doc.last_modified().unwrap_or_else(Utc::now),
                folders: Vec::new(),
            }
        })
        .collect()
}

/// Notes and transcript per API document, placed in its cached folders.
pub fn combined_documents(docs: &[Document], cache: &CacheData) -> Vec<ExportDocument> {
    docs.iter()
        .map(|doc| {
            let folders = cache.folder_names(&doc.id);
            let notes = resolve_content(doc, TextFormat::PlainText);
            ExportDocument {
                id: doc.id.clone(),
                title: doc.title.clone(),
                content: combined_text(doc, &notes, cache.transcript(&doc.id), &folders),
                last_modified: doc.last_modified().unwrap_or_else(Utc::now),
                folders,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Folder, TranscriptSegment};

    fn api_doc(id: &str, title: &str) -> Document {
        Document {
            id: id.into(),
            title: Some(title.into()),
            notes_plain: Some(format!("{} notes", title)),
            updated_at: Some("2024-01-15T11:00:00Z".into()),
            ..Default::default()
        }
    }

    fn cache_with_folders() -> CacheData {
        let mut cache = CacheData::default();
        cache.folders.insert(
            "f1".into(),
            Folder {
                id: "f1".into(),
                title: "Work".into(),
                parent_id: None,
            },
        );
        cache
            .doc_folders
            .insert("aaa11111-x".into(), vec!["f1".into()]);
        cache.transcripts.insert(
            "aaa11111-x".into(),
            vec![TranscriptSegment {
                text: "Hello".into(),
                source: "microphone".into(),
                start_timestamp: "2024-01-15T10:00:05Z".into(),
                ..Default::default()
            }],
        );
        cache
    }

    #[test]
    fn test_dedupe_keeps_first() {
        let docs = dedupe_by_id(vec![
            api_doc("a", "First"),
            api_doc("b", "Other"),
            api_doc("a", "Second"),
        ]);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].title.as_deref(), Some("First"));
    }

    #[test]
    fn test_notes_documents() {
        let docs = notes_documents(&[api_doc("a", "Standup")]).unwrap();
        assert_eq!(docs.len(), 1);
        assert!(docs[0].content.contains("# Standup\n\nStandup notes\n"));
        assert!(docs[0].folders.is_empty());
        assert_eq!(
            docs[0].last_modified,
            "2024-01-15T11:00:00Z".parse::<chrono::DateTime<Utc>>().unwrap()
        );
    }

    #[test]
    fn test_transcript_documents_without_cached_document() {
        let cache = cache_with_folders();
        let docs = transcript_documents(&cache);

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].title.as_deref(), Some("aaa11111-x"));
        assert!(docs[0].content.contains("[10:00:05] You: Hello"));
    }

    #[test]
    fn test_transcript_documents_empty_segments_render_empty() {
        let mut cache = CacheData::default();
        cache.transcripts.insert("doc".into(), Vec::new());
        let docs = transcript_documents(&cache);
        assert_eq!(docs[0].content, "");
    }

    #[test]
    fn test_combined_documents_join_cache() {
        let cache = cache_with_folders();
        let docs = combined_documents(
            &[api_doc("aaa11111-x", "Standup"), api_doc("bbb22222-y", "Loose")],
            &cache,
        );

        assert_eq!(docs[0].folders, vec!["Work".to_string()]);
        assert!(docs[0].content.contains("Folders: Work\n"));
        assert!(docs[0].content.contains("Standup notes"));
        assert!(docs[0].content.contains("[10:00:05] You: Hello"));

        assert!(docs[1].folders.is_empty());
        assert!(docs[1].content.contains("(No transcript available)"));
    }
}
