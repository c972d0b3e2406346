// ABOUTME: Picks the best available content representation for a document
// ABOUTME: Plain notes, then rendered trees, then stripped panel HTML, then legacy content

use crate::model::Document;
use crate::prosemirror::{render, TextFormat};
use regex::Regex;
use std::sync::OnceLock;

/// What a writer does with a document whose content resolved to nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyContent {
    /// Leave the document out of the output.
    Skip,
    /// Write it anyway (e.g. frontmatter only).
    #[default]
    Emit,
}

/// Returns the first non-empty representation of the document's body,
/// or an empty string when there is none.
pub fn resolve_content(doc: &Document, format: TextFormat) -> String {
    let panel = doc.last_viewed_panel.as_ref();

    non_empty(doc.notes_plain.as_deref().unwrap_or_default())
        .or_else(|| non_empty(&render(doc.notes.as_ref(), format)))
        .or_else(|| non_empty(&render(panel.and_then(|p| p.content.as_ref()), format)))
        .or_else(|| {
            panel
                .and_then(|p| p.original_content.as_deref())
                .and_then(|html| non_empty(&strip_html(html)))
        })
        .or_else(|| non_empty(doc.content.as_deref().unwrap_or_default()))
        .unwrap_or_default()
}

fn non_empty(content: &str) -> Option<String> {
    let trimmed = content.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn html_tags() -> &'static Regex {
    static HTML_TAGS: OnceLock<Regex> = OnceLock::new();
    HTML_TAGS.get_or_init(|| Regex::new(r"<[^>]*>").expect("static regex"))
}

/// Removes markup tags and decodes the handful of entities Granola emits.
pub fn strip_html(html: &str) -> String {
    let text = html_tags().replace_all(html, "");
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LastViewedPanel, TreeNode};

    fn tree(text: &str) -> TreeNode {
        TreeNode::new("doc").with_children(vec![TreeNode::new("paragraph")
            .with_children(vec![TreeNode::text(text)])])
    }

    fn full_document() -> Document {
        Document {
            id: "doc123".into(),
            notes_plain: Some("plain notes".into()),
            notes: Some(tree("tree notes")),
            last_viewed_panel: Some(LastViewedPanel {
                content: Some(tree("panel tree")),
                original_content: Some("<p>panel html</p>".into()),
                updated_at: None,
            }),
            content: Some("legacy".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_priority_order() {
        let mut doc = full_document();
        assert_eq!(resolve_content(&doc, TextFormat::Markdown), "plain notes");

        doc.notes_plain = Some("   ".into());
        assert_eq!(resolve_content(&doc, TextFormat::Markdown), "tree notes");

        doc.notes = None;
        assert_eq!(resolve_content(&doc, TextFormat::Markdown), "panel tree");

        doc.last_viewed_panel.as_mut().unwrap().content = None;
        assert_eq!(resolve_content(&doc, TextFormat::Markdown), "panel html");

        doc.last_viewed_panel = None;
        assert_eq!(resolve_content(&doc, TextFormat::Markdown), "legacy");

        doc.content = None;
        assert_eq!(resolve_content(&doc, TextFormat::Markdown), "");
    }

    #[test]
    fn test_empty_tree_falls_through() {
        let doc = Document {
            id: "doc123".into(),
            notes: Some(TreeNode::new("doc")),
            content: Some("legacy".into()),
            ..Default::default()
        };
        assert_eq!(resolve_content(&doc, TextFormat::PlainText), "legacy");
    }

    #[test]
    fn test_tree_rendered_in_requested_format() {
        let doc = Document {
            id: "doc123".into(),
            notes: Some(
                TreeNode::new("doc").with_children(vec![TreeNode::new("heading")
                    .with_attr("level", serde_json::json!(2))
                    .with_children(vec![TreeNode::text("Agenda")])]),
            ),
            ..Default::default()
        };
        assert_eq!(resolve_content(&doc, TextFormat::Markdown), "## Agenda");
        assert_eq!(resolve_content(&doc, TextFormat::PlainText), "Agenda");
    }

    #[test]
    fn test_strip_html_decodes_entities() {
        assert_eq!(
            strip_html("<h1>Q&amp;A</h1><p>&lt;tag&gt; &quot;quoted&quot; it&#39;s&nbsp;here</p>"),
            "Q&A<tag> \"quoted\" it's here"
        );
    }

    #[test]
    fn test_strip_html_only_markup() {
        assert_eq!(strip_html("<br/><div></div>"), "");
    }

    #[test]
    fn test_empty_content_policy_default() {
        assert_eq!(EmptyContent::default(), EmptyContent::Emit);
    }
}
