//! HTML to plain text extraction.
//!
//! The walk is pre-order over an explicit stack, so deeply nested markup
//! cannot exhaust the call stack.

use scraper::Html;
use tracing::debug;

use super::types::NodeKind;

/// Parse an HTML document and extract its visible text.
///
/// html5ever recovers from malformed markup the way browsers do, so parsing
/// itself never fails; recovered parse errors are only counted in the log.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let text = extract_text(
        document.tree.root(),
        |node| NodeKind::from(node.value()),
        |node| node.children().collect(),
    );

    debug!(
        html_length = html.len(),
        recovered_errors = document.errors.len(),
        text_length = text.len(),
        "html_text_extracted"
    );

    text
}

/// Extract text from any tree given how to classify a node and list its children.
///
/// - A text node contributes its trimmed content followed by one space.
/// - `style`, `script` and `img` elements contribute nothing, children included.
/// - Every other node contributes its children's text in order.
pub fn extract_text<'a, N, K, C>(root: N, kind_of: K, children_of: C) -> String
where
    N: Copy,
    K: Fn(N) -> NodeKind<'a>,
    C: Fn(N) -> Vec<N>,
{
    let mut out = String::new();
    let mut stack = vec![root];

    while let Some(node) = stack.pop() {
        match kind_of(node) {
            NodeKind::Text(text) => {
                out.push_str(text.trim());
                out.push(' ');
            }
            kind if kind.is_skipped() => {}
            _ => {
                // Reverse so the first child is popped first.
                stack.extend(children_of(node).into_iter().rev());
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal owned tree for exercising the walker directly.
    struct TreeNode {
        kind: &'static str,
        tag: &'static str,
        text: &'static str,
        children: Vec<TreeNode>,
    }

    fn text(data: &'static str) -> TreeNode {
        TreeNode {
            kind: "text",
            tag: "",
            text: data,
            children: Vec::new(),
        }
    }

    fn element(tag: &'static str, children: Vec<TreeNode>) -> TreeNode {
        TreeNode {
            kind: "element",
            tag,
            text: "",
            children,
        }
    }

    fn walk(root: &TreeNode) -> String {
        extract_text(
            root,
            |node| match node.kind {
                "text" => NodeKind::Text(node.text),
                "element" => NodeKind::Element(node.tag),
                _ => NodeKind::Other,
            },
            |node| node.children.iter().collect(),
        )
    }

    #[test]
    fn test_single_text_node() {
        assert_eq!(walk(&text("Hello")), "Hello ");
    }

    #[test]
    fn test_text_node_whitespace_trimmed() {
        assert_eq!(walk(&text("  spaced  ")), "spaced ");
    }

    #[test]
    fn test_sibling_text_nodes() {
        let tree = element("p", vec![text("Hello"), text("World")]);
        assert_eq!(walk(&tree), "Hello World ");
    }

    #[test]
    fn test_nested_elements() {
        let tree = element("div", vec![text("Hello"), element("span", vec![text("World")])]);
        assert_eq!(walk(&tree), "Hello World ");
    }

    #[test]
    fn test_skipped_elements_drop_subtree() {
        for tag in ["script", "style", "img"] {
            let tree = element(tag, vec![text("hidden"), element("b", vec![text("deep")])]);
            assert_eq!(walk(&tree), "", "tag {tag}");
        }
    }

    #[test]
    fn test_style_inside_nested_elements() {
        let tree = element(
            "div",
            vec![
                text("Hello"),
                element("style", vec![text("body { color: red; }")]),
                text("World"),
            ],
        );
        assert_eq!(walk(&tree), "Hello World ");
    }

    #[test]
    fn test_html_to_text() {
        let html = "<html><body><p>Hello <b>World</b></p></body></html>";
        assert_eq!(html_to_text(html), "Hello World ");
    }

    #[test]
    fn test_html_to_text_skips_script_and_style() {
        let html = r#"
            <html><head><style>p { color: red; }</style></head>
            <body><script>alert('x')</script><p>Visible</p><img src="a.png"></body></html>
        "#;
        assert_eq!(html_to_text(html).split_whitespace().collect::<Vec<_>>(), vec!["Visible"]);
    }

    #[test]
    fn test_deeply_nested_markup() {
        let depth = 5_000;
        let html = format!("{}deep{}", "<div>".repeat(depth), "</div>".repeat(depth));
        assert_eq!(html_to_text(&html).trim(), "deep");
    }
}
