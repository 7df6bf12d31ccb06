//! Pruning content filter for "fit markdown".
//!
//! Assigns every DOM subtree a composite score from text density, inverse
//! link density, tag weight, class/id negativity and log text length, and
//! removes subtrees scoring below the threshold. Two threshold modes: a
//! fixed cutoff, and a dynamic cutoff scaled by tag importance, text ratio
//! and link ratio.

use ego_tree::NodeId;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use serde::{Deserialize, Serialize};

use super::cleaner::parse_cleaned;
use crate::utils::constants::DEFAULT_PRUNE_THRESHOLD;

static NEGATIVE_PATTERNS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(nav|navbar|footer|foot|sidebar|side-bar|banner|ads?|advert\w*|promo\w*|sponsor\w*|comment\w*|share|social|menu|breadcrumbs?|cookie|popup|modal|related|widget)\b",
    )
    .expect("negative class/id pattern must compile")
});

static BODY_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("body").expect("body selector must parse"));

/// How the removal cutoff is derived per node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMode {
    #[default]
    Fixed,
    Dynamic,
}

/// Pruning filter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PruningFilter {
    pub threshold: f64,
    pub mode: ThresholdMode,
    /// Subtrees with fewer words than this are removed regardless of score.
    pub min_words: Option<usize>,
}

impl Default for PruningFilter {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_PRUNE_THRESHOLD,
            mode: ThresholdMode::Fixed,
            min_words: None,
        }
    }
}

fn tag_weight(name: &str) -> f64 {
    match name {
        "article" => 1.5,
        "h1" => 1.2,
        "h2" => 1.1,
        "p" | "section" | "h3" => 1.0,
        "h4" => 0.9,
        "h5" => 0.8,
        "h6" => 0.7,
        "div" | "li" | "ul" | "ol" => 0.5,
        "span" => 0.3,
        _ => 0.5,
    }
}

fn tag_importance(name: &str) -> f64 {
    match name {
        "article" => 1.5,
        "main" | "h1" => 1.4,
        "section" | "h2" => 1.3,
        "p" | "h3" => 1.2,
        "div" => 0.7,
        "span" => 0.6,
        _ => 0.7,
    }
}

struct NodeMetrics {
    tag_name: String,
    class_id: String,
    text: String,
    text_len: usize,
    tag_len: usize,
    link_text_len: usize,
}

fn measure(el: &ElementRef<'_>) -> NodeMetrics {
    let text: String = el
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let tag_len = el.html().len().max(1);

    let mut class_id = el.value().attr("class").unwrap_or("").to_string();
    if let Some(id) = el.value().attr("id") {
        class_id.push(' ');
        class_id.push_str(id);
    }

    let mut link_text_len = 0;
    for child in el.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            if child_el.value().name() == "a" {
                link_text_len += child_el
                    .text()
                    .map(str::trim)
                    .map(str::len)
                    .sum::<usize>();
            }
        }
    }

    NodeMetrics {
        tag_name: el.value().name().to_string(),
        class_id,
        text_len: text.len(),
        text,
        tag_len,
        link_text_len,
    }
}

impl PruningFilter {
    /// Filter a document, returning the surviving top-level blocks as HTML.
    #[must_use]
    pub fn filter_content(&self, html: &str) -> Vec<String> {
        if html.trim().is_empty() {
            return Vec::new();
        }

        let mut document = parse_cleaned(html);

        let body_id = match document.select(&BODY_SELECTOR).next() {
            Some(body) => body.id(),
            None => return Vec::new(),
        };

        let children: Vec<NodeId> = element_children(&document, body_id);
        for child in children {
            self.prune_node(&mut document, child);
        }

        // Surviving direct children of body with visible text.
        let mut blocks = Vec::new();
        if let Some(body) = document.tree.get(body_id) {
            for child in body.children() {
                if let Some(el) = ElementRef::wrap(child) {
                    let has_text = el.text().any(|t| !t.trim().is_empty());
                    if has_text {
                        blocks.push(el.html());
                    }
                }
            }
        }
        blocks
    }

    fn prune_node(&self, document: &mut Html, id: NodeId) {
        enum Verdict {
            Remove,
            Keep(Vec<NodeId>),
            Skip,
        }

        let verdict = {
            match document.tree.get(id) {
                Some(node) => match ElementRef::wrap(node) {
                    Some(el) => {
                        let metrics = measure(&el);
                        if self.should_remove(&metrics) {
                            Verdict::Remove
                        } else {
                            Verdict::Keep(element_children(document, id))
                        }
                    }
                    None => Verdict::Skip,
                },
                None => Verdict::Skip,
            }
        };

        match verdict {
            Verdict::Remove => {
                if let Some(mut node) = document.tree.get_mut(id) {
                    node.detach();
                }
            }
            Verdict::Keep(children) => {
                for child in children {
                    self.prune_node(document, child);
                }
            }
            Verdict::Skip => {}
        }
    }

    fn should_remove(&self, metrics: &NodeMetrics) -> bool {
        let score = self.composite_score(metrics);
        match self.mode {
            ThresholdMode::Fixed => score < self.threshold,
            ThresholdMode::Dynamic => {
                let importance = tag_importance(&metrics.tag_name);
                let text_ratio = metrics.text_len as f64 / metrics.tag_len as f64;
                let link_ratio = if metrics.text_len > 0 {
                    metrics.link_text_len as f64 / metrics.text_len as f64
                } else {
                    1.0
                };

                let mut threshold = self.threshold;
                if importance > 1.0 {
                    threshold *= 0.8;
                }
                if text_ratio > 0.4 {
                    threshold *= 0.9;
                }
                if link_ratio > 0.6 {
                    threshold *= 1.2;
                }
                score < threshold
            }
        }
    }

    fn composite_score(&self, metrics: &NodeMetrics) -> f64 {
        if let Some(min_words) = self.min_words {
            let words = metrics.text.split_whitespace().count();
            if words < min_words {
                return -1.0;
            }
        }

        const W_TEXT_DENSITY: f64 = 0.4;
        const W_LINK_DENSITY: f64 = 0.2;
        const W_TAG: f64 = 0.2;
        const W_CLASS_ID: f64 = 0.1;
        const W_TEXT_LEN: f64 = 0.1;

        let text_density = metrics.text_len as f64 / metrics.tag_len as f64;
        let link_density = 1.0
            - if metrics.text_len > 0 {
                metrics.link_text_len as f64 / metrics.text_len as f64
            } else {
                0.0
            };
        let class_id = self.class_id_weight(metrics);

        let score = W_TEXT_DENSITY * text_density
            + W_LINK_DENSITY * link_density
            + W_TAG * tag_weight(&metrics.tag_name)
            + W_CLASS_ID * class_id.max(0.0)
            + W_TEXT_LEN * ((metrics.text_len as f64) + 1.0).ln();

        score / (W_TEXT_DENSITY + W_LINK_DENSITY + W_TAG + W_CLASS_ID + W_TEXT_LEN)
    }

    fn class_id_weight(&self, metrics: &NodeMetrics) -> f64 {
        let mut weight = 0.0;
        if NEGATIVE_PATTERNS.is_match(&metrics.class_id) {
            weight -= 0.5;
        }
        weight
    }
}

fn element_children(document: &Html, id: NodeId) -> Vec<NodeId> {
    document
        .tree
        .get(id)
        .map(|node| {
            node.children()
                .filter(|c| matches!(c.value(), Node::Element(_)))
                .map(|c| c.id())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_dense_article_text() {
        let html = r"<body><article><p>This is a long paragraph of real article
            content with plenty of words so its text density and length are
            both high enough to survive the pruning filter.</p></article></body>";
        let blocks = PruningFilter::default().filter_content(html);
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].contains("real article"));
    }

    #[test]
    fn removes_link_farms() {
        let html = r#"<body>
            <article><p>Genuine article body text, long enough to score well
            on density and length, talking about something substantive.</p></article>
            <div class="related"><a href="/1">one</a><a href="/2">two</a><a href="/3">three</a></div>
        </body>"#;
        let blocks = PruningFilter::default().filter_content(html);
        let joined = blocks.join("");
        assert!(joined.contains("Genuine article"));
        assert!(!joined.contains(r#"href="/1""#));
    }

    #[test]
    fn min_words_forces_removal() {
        let html = "<body><p>tiny</p></body>";
        let filter = PruningFilter {
            min_words: Some(5),
            ..PruningFilter::default()
        };
        assert!(filter.filter_content(html).is_empty());
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(PruningFilter::default().filter_content("").is_empty());
    }
}
