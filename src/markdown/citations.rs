//! Link handling in generated markdown: absolutization and citation
//! rewriting.
//!
//! Citation rewriting replaces in-body `[text](url)` links with `text⟨N⟩`
//! tokens and appends a `## References` block, numbering URLs by first
//! occurrence starting at 1.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use crate::utils::absolutize;

static LINK_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(!?)\[([^\]]*)\]\(([^)\s]+)(?:\s+"([^"]*)")?\)"#)
        .expect("link pattern must compile")
});

/// Rewrite every markdown link target to its absolute form.
#[must_use]
pub fn absolutize_links(markdown: &str, base_url: &str) -> String {
    LINK_PATTERN
        .replace_all(markdown, |caps: &regex::Captures<'_>| {
            let bang = &caps[1];
            let text = &caps[2];
            let target = absolutize(base_url, &caps[3]);
            match caps.get(4) {
                Some(title) => format!("{bang}[{text}]({target} \"{}\")", title.as_str()),
                None => format!("{bang}[{text}]({target})"),
            }
        })
        .into_owned()
}

/// Convert links to citation tokens plus a references block.
///
/// Returns `(converted_markdown, references_markdown)`. Relative targets are
/// joined against `base_url` before being assigned a number, so variants of
/// the same absolute URL share a citation.
#[must_use]
pub fn convert_links_to_citations(markdown: &str, base_url: &str) -> (String, String) {
    // url -> (citation number, description)
    let mut link_map: HashMap<String, (usize, String)> = HashMap::new();
    let mut ordered: Vec<String> = Vec::new();
    let mut parts: Vec<String> = Vec::new();
    let mut last_end = 0;

    for caps in LINK_PATTERN.captures_iter(markdown) {
        let whole = caps.get(0).expect("capture 0 always present");
        parts.push(markdown[last_end..whole.start()].to_string());

        let is_image = !caps[1].is_empty();
        let text = caps[2].to_string();
        let title = caps.get(4).map(|m| m.as_str().to_string());
        let url = absolutize(base_url, &caps[3]);

        let next = link_map.len() + 1;
        let number = match link_map.get(&url) {
            Some((n, _)) => *n,
            None => {
                let mut desc = Vec::new();
                if let Some(t) = &title {
                    desc.push(t.clone());
                }
                if !text.is_empty() && Some(&text) != title.as_ref() {
                    desc.push(text.clone());
                }
                let rendered = if desc.is_empty() {
                    String::new()
                } else {
                    format!(": {}", desc.join(" - "))
                };
                link_map.insert(url.clone(), (next, rendered));
                ordered.push(url.clone());
                next
            }
        };

        if is_image {
            parts.push(format!("![{text}\u{27e8}{number}\u{27e9}]"));
        } else {
            parts.push(format!("{text}\u{27e8}{number}\u{27e9}"));
        }
        last_end = whole.end();
    }

    parts.push(markdown[last_end..].to_string());
    let converted = parts.concat();

    if ordered.is_empty() {
        return (converted, String::new());
    }

    let mut references = String::from("\n\n## References\n\n");
    for url in &ordered {
        let (number, desc) = &link_map[url];
        references.push_str(&format!("\u{27e8}{number}\u{27e9} {url}{desc}\n"));
    }

    (converted, references)
}
