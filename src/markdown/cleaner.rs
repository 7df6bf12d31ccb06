//! HTML cleaning shared by every markdown mode.
//!
//! Strips scripts, styles, comments and page-chrome tags before conversion
//! or scoring, so neither the converter nor the pruning filter ever sees
//! executable or navigational markup.

use ego_tree::NodeId;
use scraper::{Html, Node};

/// Tags removed outright before any markdown processing.
pub const EXCLUDED_TAGS: &[&str] = &[
    "script", "style", "noscript", "iframe", "form", "nav", "footer", "aside", "header",
];

/// Parse a document and remove comments plus excluded tags in place.
pub fn parse_cleaned(html: &str) -> Html {
    let mut document = Html::parse_document(html);
    let mut doomed: Vec<NodeId> = Vec::new();

    for node in document.tree.root().descendants() {
        match node.value() {
            Node::Comment(_) => doomed.push(node.id()),
            Node::Element(el) => {
                if EXCLUDED_TAGS.contains(&el.name()) {
                    doomed.push(node.id());
                }
            }
            _ => {}
        }
    }

    for id in doomed {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }

    document
}

/// Cleaned document serialized back to HTML.
#[must_use]
pub fn clean_html(html: &str) -> String {
    parse_cleaned(html).root_element().html()
}

/// Visible text of a cleaned document, whitespace-normalized.
#[must_use]
pub fn extract_text(html: &str) -> String {
    let document = parse_cleaned(html);
    let mut parts: Vec<String> = Vec::new();
    for node in document.tree.root().descendants() {
        if let Node::Text(text) = node.value() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                parts.push(trimmed.to_string());
            }
        }
    }
    parts.join(" ")
}

/// Count whitespace-separated words in already-extracted text.
#[must_use]
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scripts_styles_and_comments() {
        let html = r#"<html><head><style>p{}</style></head>
            <body><!-- hidden --><script>alert(1)</script><p>kept</p></body></html>"#;
        let cleaned = clean_html(html);
        assert!(cleaned.contains("kept"));
        assert!(!cleaned.contains("alert"));
        assert!(!cleaned.contains("hidden"));
        assert!(!cleaned.contains("<style"));
    }

    #[test]
    fn strips_page_chrome() {
        let html = r"<body><nav>menu</nav><main><p>article</p></main><footer>foot</footer></body>";
        let cleaned = clean_html(html);
        assert!(cleaned.contains("article"));
        assert!(!cleaned.contains("menu"));
        assert!(!cleaned.contains("foot"));
    }

    #[test]
    fn extract_text_normalizes_whitespace() {
        let html = "<body><p>one two</p><p>three</p></body>";
        let text = extract_text(html);
        assert_eq!(text, "one two three");
        assert_eq!(word_count(&text), 3);
    }
}
