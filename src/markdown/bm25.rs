//! Query-relevance content filter.
//!
//! A lightweight BM25-style scorer: candidate blocks are ranked by how many
//! query terms they contain, weighted by term frequency, and blocks below
//! the threshold are dropped. Used when the caller supplies a query with
//! the `bm25` filter kind.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::cleaner::parse_cleaned;

static CANDIDATE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("p, li, blockquote, pre, article, section, div, h1, h2, h3, h4, h5, h6")
        .expect("candidate selector must parse")
});

/// Minimum visible characters for a block to be scored at all.
const MIN_BLOCK_CHARS: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bm25Filter {
    pub query: String,
    pub threshold: f64,
}

impl Bm25Filter {
    pub fn new(query: impl Into<String>, threshold: f64) -> Self {
        Self {
            query: query.into(),
            threshold,
        }
    }

    /// Keep blocks relevant to the query, in document order.
    #[must_use]
    pub fn filter_content(&self, html: &str) -> Vec<String> {
        let terms: Vec<String> = self
            .query
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        if terms.is_empty() || html.trim().is_empty() {
            return Vec::new();
        }

        let document = parse_cleaned(html);
        let mut kept_ids: HashSet<ego_tree::NodeId> = HashSet::new();
        let mut blocks = Vec::new();

        for el in document.select(&CANDIDATE_SELECTOR) {
            // A kept ancestor already contains this block.
            if el
                .ancestors()
                .any(|ancestor| kept_ids.contains(&ancestor.id()))
            {
                continue;
            }

            let text: String = el
                .text()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            if text.len() < MIN_BLOCK_CHARS {
                continue;
            }

            if self.score(&text, &terms) >= self.threshold {
                kept_ids.insert(el.id());
                blocks.push(el.html());
            }
        }

        blocks
    }

    /// Coverage of query terms boosted by a dampened term frequency.
    fn score(&self, text: &str, terms: &[String]) -> f64 {
        let lowered = text.to_lowercase();
        let mut present = 0usize;
        let mut occurrences = 0usize;
        for term in terms {
            let count = lowered.matches(term.as_str()).count();
            if count > 0 {
                present += 1;
                occurrences += count;
            }
        }
        if present == 0 {
            return 0.0;
        }
        let coverage = present as f64 / terms.len() as f64;
        let tf_boost = 1.0 + (occurrences as f64).ln_1p() / 4.0;
        (coverage * tf_boost).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_blocks_matching_the_query() {
        let html = r"<body>
            <p>Rust is a systems programming language focused on safety.</p>
            <p>Today the weather is pleasant and mild everywhere.</p>
        </body>";
        let filter = Bm25Filter::new("rust safety", 0.5);
        let blocks = filter.filter_content(html);
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].contains("systems programming"));
    }

    #[test]
    fn nested_blocks_are_not_duplicated() {
        let html = r"<body><article><p>rust rust rust content here</p></article></body>";
        let filter = Bm25Filter::new("rust", 0.3);
        let blocks = filter.filter_content(html);
        assert_eq!(blocks.len(), 1);
    }

    #[test]
    fn empty_query_keeps_nothing() {
        let filter = Bm25Filter::new("", 0.5);
        assert!(filter.filter_content("<p>anything</p>").is_empty());
    }
}
