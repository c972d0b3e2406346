// ABOUTME: Renders documents into the text written to disk
// ABOUTME: Markdown notes with YAML frontmatter, transcript text, and combined export files

use crate::cache::{CacheDocument, TranscriptSegment};
use crate::model::{Document, Frontmatter};
use crate::Result;
use chrono::DateTime;

const RULE_WIDTH: usize = 80;

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

/// Markdown note: frontmatter, a title heading, then the body.
/// An empty body still yields the frontmatter (and heading).
pub fn notes_markdown(doc: &Document, body: &str) -> Result<String> {
    let frontmatter = Frontmatter {
        id: doc.id.clone(),
        created_at: doc.created_at.clone().unwrap_or_default(),
        updated_at: doc.updated_at.clone().unwrap_or_default(),
        tags: doc.tags.clone(),
    };
    let yaml = serde_yaml::to_string(&frontmatter)?;

    let mut out = format!("---\n{}---\n\n", yaml);

    if let Some(title) = doc.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        out.push_str(&format!("# {}\n\n", title));
    }

    if !body.is_empty() {
        out.push_str(body);
        if !body.ends_with('\n') {
            out.push('\n');
        }
    }

    Ok(out)
}

/// `HH:MM:SS` in the timestamp's own offset; unparseable input passes through.
pub fn clock_time(timestamp: &str) -> String {
    DateTime::parse_from_rfc3339(timestamp.trim())
        .map(|ts| ts.format("%H:%M:%S").to_string())
        .unwrap_or_else(|_| timestamp.to_string())
}

fn speaker(segment: &TranscriptSegment) -> &'static str {
    if segment.source == "microphone" {
        "You"
    } else {
        "System"
    }
}

fn push_segments(out: &mut String, segments: &[TranscriptSegment]) {
    for segment in segments {
        out.push_str(&format!(
            "[{}] {}: {}\n",
            clock_time(&segment.start_timestamp),
            speaker(segment),
            segment.text
        ));
    }
}

fn push_header(
    out: &mut String,
    title: Option<&str>,
    id: &str,
    created: Option<&str>,
    updated: Option<&str>,
) {
    out.push_str(&rule());
    out.push('\n');
    if let Some(title) = title.filter(|t| !t.is_empty()) {
        out.push_str(title);
        out.push('\n');
    }
    out.push_str(&format!("ID: {}\n", id));
    if let Some(created) = created.filter(|c| !c.is_empty()) {
        out.push_str(&format!("Created: {}\n", created));
    }
    if let Some(updated) = updated.filter(|u| !u.is_empty()) {
        out.push_str(&format!("Updated: {}\n", updated));
    }
}

/// Plain-text transcript file. No segments means no content, which
/// transcript exports skip.
pub fn transcript_text(doc: &CacheDocument, segments: &[TranscriptSegment]) -> String {
    if segments.is_empty() {
        return String::new();
    }

    let mut out = String::new();
    push_header(
        &mut out,
        doc.title.as_deref(),
        &doc.id,
        doc.created_at.as_deref(),
        doc.updated_at.as_deref(),
    );
    out.push_str(&format!("Segments: {}\n", segments.len()));
    out.push_str(&rule());
    out.push_str("\n\n");
    push_segments(&mut out, segments);
    out
}

/// Notes and transcript of one document in a single text file.
pub fn combined_text(
    doc: &Document,
    notes: &str,
    segments: &[TranscriptSegment],
    folders: &[String],
) -> String {
    let mut out = String::new();
    push_header(
        &mut out,
        doc.title.as_deref(),
        &doc.id,
        doc.created_at.as_deref(),
        doc.updated_at.as_deref(),
    );
    if !folders.is_empty() {
        out.push_str(&format!("Folders: {}\n", folders.join(", ")));
    }
    out.push_str(&rule());
    out.push('\n');

    out.push_str("\n## Notes\n\n");
    if notes.trim().is_empty() {
        out.push_str("(No notes)\n");
    } else {
        out.push_str(notes);
        out.push('\n');
    }

    out.push('\n');
    out.push_str(&rule());
    out.push('\n');
    out.push_str("\n## Transcript\n\n");
    if segments.is_empty() {
        out.push_str("(No transcript available)\n");
    } else {
        push_segments(&mut out, segments);
    }

    out
}
