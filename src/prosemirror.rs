// ABOUTME: Converts ProseMirror document trees to Markdown or plain text
// ABOUTME: Node kinds are lifted into a closed enum and rendered by exhaustive match

use crate::model::{DocumentTree, TreeNode};
use regex::Regex;
use std::sync::OnceLock;

/// Output flavour for rendered trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextFormat {
    #[default]
    Markdown,
    PlainText,
}

/// Typed view of a [`TreeNode`]. Unrecognized kinds become transparent
/// containers.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Heading { level: usize, children: Vec<Node> },
    Paragraph(Vec<Node>),
    BulletList(Vec<Node>),
    ListItem(Vec<Node>),
    Text(String),
    Unknown(Vec<Node>),
}

impl From<&TreeNode> for Node {
    fn from(tree: &TreeNode) -> Self {
        match tree.kind.as_str() {
            "heading" => Node::Heading {
                level: heading_level(tree),
                children: inline_children(tree),
            },
            "paragraph" => Node::Paragraph(inline_children(tree)),
            "bulletList" => Node::BulletList(tree.children().iter().map(Node::from).collect()),
            "listItem" => Node::ListItem(inline_children(tree)),
            "text" => Node::Text(tree.text.clone().unwrap_or_default()),
            _ => Node::Unknown(inline_children(tree)),
        }
    }
}

/// Children of a container; a childless node carrying text gets that text
/// as its only child.
fn inline_children(tree: &TreeNode) -> Vec<Node> {
    if !tree.children().is_empty() {
        return tree.children().iter().map(Node::from).collect();
    }
    match tree.text.as_deref() {
        Some(text) if !text.is_empty() => vec![Node::Text(text.to_string())],
        _ => Vec::new(),
    }
}

fn heading_level(tree: &TreeNode) -> usize {
    tree.attributes
        .as_ref()
        .and_then(|attrs| attrs.get("level"))
        .and_then(|level| level.as_f64())
        .filter(|level| level.is_finite())
        .map(|level| (level as i64).clamp(1, 6) as usize)
        .unwrap_or(1)
}

fn is_root(tree: &DocumentTree) -> bool {
    matches!(tree.kind.as_str(), "doc" | "document")
}

fn blank_runs() -> &'static Regex {
    static BLANK_RUNS: OnceLock<Regex> = OnceLock::new();
    BLANK_RUNS.get_or_init(|| Regex::new(r"\n{3,}").expect("static regex"))
}

pub fn render(tree: Option<&DocumentTree>, format: TextFormat) -> String {
    match format {
        TextFormat::Markdown => to_markdown(tree),
        TextFormat::PlainText => to_plain_text(tree),
    }
}

/// Renders a document tree as Markdown. Always ends with exactly one newline
/// unless the tree is empty.
pub fn to_markdown(tree: Option<&DocumentTree>) -> String {
    let Some(root) = tree.filter(|tree| is_root(tree)) else {
        return String::new();
    };
    if root.children().is_empty() {
        return String::new();
    }

    let rendered: String = root
        .children()
        .iter()
        .map(|child| render_node(&Node::from(child), 0, true))
        .collect();

    let collapsed = blank_runs().replace_all(&rendered, "\n\n");
    format!("{}\n", collapsed.trim())
}

/// Renders one node. `top_level` is true only for direct children of the root.
pub fn render_node(node: &Node, depth: usize, top_level: bool) -> String {
    match node {
        Node::Heading { level, children } => {
            let suffix = if top_level { "\n\n" } else { "\n" };
            format!(
                "{} {}{}",
                "#".repeat(*level),
                render_children(children, depth).trim(),
                suffix
            )
        }
        Node::Paragraph(children) => {
            let mut out = render_children(children, depth);
            if top_level {
                out.push_str("\n\n");
            }
            out
        }
        Node::BulletList(items) => render_list(items, depth, top_level),
        Node::ListItem(children) => children
            .iter()
            .map(|child| match child {
                Node::BulletList(_) => render_node(child, depth + 1, false),
                _ => render_node(child, depth, false),
            })
            .collect(),
        Node::Text(text) => text.clone(),
        Node::Unknown(children) => render_children(children, depth),
    }
}

fn render_children(children: &[Node], depth: usize) -> String {
    children
        .iter()
        .map(|child| render_node(child, depth, false))
        .collect()
}

fn render_list(items: &[Node], depth: usize, top_level: bool) -> String {
    if items.is_empty() {
        return String::new();
    }

    let lines: Vec<String> = items
        .iter()
        .filter_map(|item| match item {
            Node::ListItem(children) => Some(render_list_item(children, depth)),
            _ => None,
        })
        .collect();

    let mut out = lines.join("\n");
    if top_level {
        out.push_str("\n\n");
    }
    out
}

fn render_list_item(children: &[Node], depth: usize) -> String {
    let mut first_text: Option<String> = None;
    let mut nested = String::new();

    for child in children {
        if let Node::BulletList(_) = child {
            nested.push('\n');
            nested.push_str(&render_node(child, depth + 1, false));
        } else {
            let rendered = render_node(child, depth, false);
            if first_text.is_none() && !rendered.starts_with('\n') {
                first_text = Some(rendered);
            }
        }
    }

    format!(
        "{}- {}{}",
        "\t".repeat(depth),
        first_text.as_deref().unwrap_or("").trim(),
        nested
    )
}

/// Renders a document tree as unformatted text: blocks separated by blank
/// lines, inline runs joined with spaces.
pub fn to_plain_text(tree: Option<&DocumentTree>) -> String {
    let Some(root) = tree.filter(|tree| is_root(tree)) else {
        return String::new();
    };

    let blocks: Vec<String> = root
        .children()
        .iter()
        .map(|child| extract_text(&Node::from(child)))
        .filter(|text| !text.is_empty())
        .collect();

    blocks.join("\n\n").trim().to_string()
}

fn extract_text(node: &Node) -> String {
    let (children, separator) = match node {
        Node::Text(text) => return text.clone(),
        Node::Heading { children, .. } | Node::Paragraph(children) | Node::ListItem(children) => {
            (children, "\n")
        }
        Node::BulletList(children) | Node::Unknown(children) => (children, " "),
    };

    children
        .iter()
        .map(extract_text)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(children: Vec<TreeNode>) -> DocumentTree {
        TreeNode::new("doc").with_children(children)
    }

    fn paragraph(text: &str) -> TreeNode {
        TreeNode::new("paragraph").with_children(vec![TreeNode::text(text)])
    }

    fn heading(level: serde_json::Value, text: &str) -> TreeNode {
        TreeNode::new("heading")
            .with_attr("level", level)
            .with_children(vec![TreeNode::text(text)])
    }

    fn item(text: &str, nested: Option<TreeNode>) -> TreeNode {
        let mut children = vec![paragraph(text)];
        children.extend(nested);
        TreeNode::new("listItem").with_children(children)
    }

    fn list(items: Vec<TreeNode>) -> TreeNode {
        TreeNode::new("bulletList").with_children(items)
    }

    #[test]
    fn test_absent_or_empty_tree_renders_empty() {
        assert_eq!(to_markdown(None), "");
        assert_eq!(to_markdown(Some(&TreeNode::new("doc"))), "");
        assert_eq!(to_markdown(Some(&doc(vec![]))), "");
        assert_eq!(to_plain_text(Some(&doc(vec![]))), "");
    }

    #[test]
    fn test_non_document_root_renders_empty() {
        let tree = TreeNode::new("paragraph").with_children(vec![TreeNode::text("x")]);
        assert_eq!(to_markdown(Some(&tree)), "");
    }

    #[test]
    fn test_document_synonym_root() {
        let tree = TreeNode::new("document").with_children(vec![paragraph("Hi")]);
        assert_eq!(to_markdown(Some(&tree)), "Hi\n");
    }

    #[test]
    fn test_top_level_heading_node() {
        let node = Node::from(&heading(json!(2), "Intro"));
        assert_eq!(render_node(&node, 0, true), "## Intro\n\n");
        assert_eq!(render_node(&node, 0, false), "## Intro\n");
    }

    #[test]
    fn test_heading_document() {
        let tree = doc(vec![heading(json!(2), "  Intro  "), paragraph("Body")]);
        assert_eq!(to_markdown(Some(&tree)), "## Intro\n\nBody\n");
    }

    #[test]
    fn test_heading_level_defaults() {
        let missing = TreeNode::new("heading").with_children(vec![TreeNode::text("A")]);
        assert_eq!(render_node(&Node::from(&missing), 0, false), "# A\n");

        let text_level = heading(json!("2"), "B");
        assert_eq!(render_node(&Node::from(&text_level), 0, false), "# B\n");

        let float_level = heading(json!(3.0), "C");
        assert_eq!(render_node(&Node::from(&float_level), 0, false), "### C\n");

        let too_deep = heading(json!(9), "D");
        assert_eq!(render_node(&Node::from(&too_deep), 0, false), "###### D\n");
    }

    #[test]
    fn test_nested_bullet_list_node() {
        let tree = list(vec![item("A", Some(list(vec![item("B", None)])))]);
        assert_eq!(render_node(&Node::from(&tree), 0, true), "- A\n\t- B\n\n");
    }

    #[test]
    fn test_nested_bullet_list_document() {
        let tree = doc(vec![
            list(vec![
                item("A", Some(list(vec![item("B", Some(list(vec![item("C", None)])))]))),
                item("D", None),
            ]),
            paragraph("After"),
        ]);
        assert_eq!(
            to_markdown(Some(&tree)),
            "- A\n\t- B\n\t\t- C\n- D\n\nAfter\n"
        );
    }

    #[test]
    fn test_list_item_text_is_trimmed() {
        let tree = list(vec![item("  padded  ", None)]);
        assert_eq!(render_node(&Node::from(&tree), 0, false), "- padded");
    }

    #[test]
    fn test_list_without_items_renders_nothing() {
        let tree = doc(vec![list(vec![]), paragraph("x")]);
        assert_eq!(to_markdown(Some(&tree)), "x\n");
    }

    #[test]
    fn test_list_ignores_non_item_children() {
        let tree = list(vec![paragraph("stray"), item("kept", None)]);
        assert_eq!(render_node(&Node::from(&tree), 0, false), "- kept");
    }

    #[test]
    fn test_standalone_list_item_indents_nested_list() {
        let tree = item("A", Some(list(vec![item("B", None)])));
        assert_eq!(render_node(&Node::from(&tree), 0, false), "A\t- B");
    }

    #[test]
    fn test_unknown_kind_is_transparent() {
        let tree = doc(vec![TreeNode::new("blockquote")
            .with_children(vec![paragraph("quoted"), heading(json!(1), "inner")])]);
        assert_eq!(to_markdown(Some(&tree)), "quoted# inner\n");
    }

    #[test]
    fn test_childless_node_uses_own_text() {
        let mut node = TreeNode::new("paragraph");
        node.text = Some("bare".into());
        assert_eq!(to_markdown(Some(&doc(vec![node]))), "bare\n");
    }

    #[test]
    fn test_blank_line_runs_collapse() {
        let tree = doc(vec![
            paragraph("a"),
            TreeNode::new("paragraph"),
            TreeNode::new("paragraph"),
            paragraph("b"),
        ]);
        assert_eq!(to_markdown(Some(&tree)), "a\n\nb\n");
    }

    #[test]
    fn test_plain_text_blocks_and_inline_runs() {
        let tree = doc(vec![
            heading(json!(1), "Title"),
            TreeNode::new("paragraph")
                .with_children(vec![TreeNode::text("one"), TreeNode::text("two")]),
            list(vec![item("x", None), item("y", None)]),
        ]);
        assert_eq!(to_plain_text(Some(&tree)), "Title\n\none\ntwo\n\nx y");
    }

    #[test]
    fn test_render_dispatches_on_format() {
        let tree = doc(vec![heading(json!(2), "Intro")]);
        assert_eq!(render(Some(&tree), TextFormat::Markdown), "## Intro\n");
        assert_eq!(render(Some(&tree), TextFormat::PlainText), "Intro");
    }
}
