//! Markdown generation pipeline.
//!
//! Three modes: `none` (skip entirely), `basic` (cleaned HTML converted to
//! markdown with absolute links), `enhanced` (citations plus a pruned "fit
//! markdown" variant with low-score subtrees removed).

mod bm25;
mod citations;
mod cleaner;
mod pruning;

use htmd::HtmlToMarkdown;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub use bm25::Bm25Filter;
pub use citations::{absolutize_links, convert_links_to_citations};
pub use cleaner::{EXCLUDED_TAGS, clean_html, extract_text, word_count};
pub use pruning::{PruningFilter, ThresholdMode};

use crate::utils::constants::DEFAULT_PRUNE_THRESHOLD;

/// How much markdown processing a crawl performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MarkdownMode {
    None,
    Basic,
    #[default]
    Enhanced,
}

/// Post-markdown content filter selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentFilter {
    Pruning {
        #[serde(default = "default_prune_threshold")]
        threshold: f64,
        #[serde(default)]
        threshold_mode: ThresholdMode,
        #[serde(default)]
        min_words: Option<usize>,
    },
    Bm25 {
        query: String,
        #[serde(default = "default_bm25_threshold")]
        threshold: f64,
    },
}

fn default_prune_threshold() -> f64 {
    DEFAULT_PRUNE_THRESHOLD
}

fn default_bm25_threshold() -> f64 {
    0.5
}

/// Output of the markdown pipeline for one page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarkdownRendering {
    /// Straight conversion of the cleaned HTML.
    pub raw_markdown: String,
    /// Primary markdown: absolute links (basic) or citation tokens (enhanced).
    pub markdown: String,
    /// `## References` block; empty in basic mode or when no links exist.
    pub references: String,
    /// Markdown of the pruned/filtered document (enhanced only).
    pub fit_markdown: Option<String>,
    /// The filtered HTML the fit markdown was generated from.
    pub fit_html: Option<String>,
}

fn converter() -> HtmlToMarkdown {
    HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "head", "noscript"])
        .build()
}

fn convert(html: &str) -> String {
    match converter().convert(html) {
        Ok(markdown) => markdown,
        Err(e) => {
            warn!(error = %e, "markdown conversion failed, falling back to text extraction");
            extract_text(html)
        }
    }
}

/// Run the pipeline over page HTML.
///
/// Returns `None` for [`MarkdownMode::None`]. All modes operate on cleaned
/// HTML (scripts, styles, comments and chrome tags removed).
#[must_use]
pub fn render(
    html: &str,
    base_url: &str,
    mode: MarkdownMode,
    filter: Option<&ContentFilter>,
) -> Option<MarkdownRendering> {
    if mode == MarkdownMode::None {
        return None;
    }

    let cleaned = clean_html(html);
    let raw_markdown = convert(&cleaned);

    match mode {
        MarkdownMode::None => None,
        MarkdownMode::Basic => {
            let markdown = absolutize_links(&raw_markdown, base_url);
            Some(MarkdownRendering {
                raw_markdown,
                markdown,
                references: String::new(),
                fit_markdown: None,
                fit_html: None,
            })
        }
        MarkdownMode::Enhanced => {
            let (markdown, references) = convert_links_to_citations(&raw_markdown, base_url);

            let default_filter = ContentFilter::Pruning {
                threshold: DEFAULT_PRUNE_THRESHOLD,
                threshold_mode: ThresholdMode::Fixed,
                min_words: None,
            };
            let filter = filter.unwrap_or(&default_filter);

            let blocks = match filter {
                ContentFilter::Pruning {
                    threshold,
                    threshold_mode,
                    min_words,
                } => PruningFilter {
                    threshold: *threshold,
                    mode: *threshold_mode,
                    min_words: *min_words,
                }
                .filter_content(&cleaned),
                ContentFilter::Bm25 { query, threshold } => {
                    Bm25Filter::new(query.clone(), *threshold).filter_content(&cleaned)
                }
            };

            let (fit_html, fit_markdown) = if blocks.is_empty() {
                (None, None)
            } else {
                let joined = blocks
                    .iter()
                    .map(|b| format!("<div>{b}</div>"))
                    .collect::<Vec<_>>()
                    .join("\n");
                let fit = convert(&joined);
                (Some(joined), Some(fit))
            };

            Some(MarkdownRendering {
                raw_markdown,
                markdown,
                references,
                fit_markdown,
                fit_html,
            })
        }
    }
}
