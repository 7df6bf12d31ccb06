//! Crawl results: the tagged per-page outcome and batch aggregates.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::options::ResponseFormat;
use crate::browser::ScriptOutcome;
use crate::error::ErrorKind;
use crate::storage::ArtifactRef;

/// Everything captured from one page.
///
/// Binary artifact bytes never serialize; stored artifacts are reachable
/// through `artifacts` instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageCapture {
    pub url: String,
    pub title: String,
    pub html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fit_markdown: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_text: Option<String>,
    #[serde(skip)]
    pub screenshot: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_error: Option<String>,
    #[serde(skip)]
    pub pdf: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_result: Option<ScriptOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_execution_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub word_count: usize,
    pub elapsed_ms: u64,
    #[serde(default)]
    pub artifacts: Vec<ArtifactRef>,
}

impl PageCapture {
    /// The most distilled content available, preferred for model input.
    #[must_use]
    pub fn best_content(&self) -> &str {
        self.fit_markdown
            .as_deref()
            .or(self.markdown.as_deref())
            .or(self.extracted_text.as_deref())
            .unwrap_or(&self.html)
    }
}

/// Tagged result of one crawl.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CrawlOutcome {
    Success(Box<PageCapture>),
    Failure { kind: ErrorKind, message: String },
}

impl CrawlOutcome {
    #[must_use]
    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    #[must_use]
    pub fn capture(&self) -> Option<&PageCapture> {
        match self {
            Self::Success(capture) => Some(capture),
            Self::Failure { .. } => None,
        }
    }

    /// Shape the outcome for a caller according to the response format.
    #[must_use]
    pub fn to_response(&self, format: ResponseFormat) -> Value {
        match self {
            Self::Failure { kind, message } => json!({
                "success": false,
                "error_kind": kind,
                "error": message,
            }),
            Self::Success(capture) => {
                let mut body = json!({
                    "success": true,
                    "url": capture.url,
                    "title": capture.title,
                });
                let object = body.as_object_mut().expect("body is an object");

                match format {
                    ResponseFormat::Minimal => {}
                    ResponseFormat::ContentOnly => {
                        object.insert("content".into(), capture.best_content().into());
                    }
                    ResponseFormat::Llm => {
                        object.insert("content".into(), capture.best_content().into());
                        if let Some(summary) = &capture.summary {
                            object.insert("summary".into(), summary.clone().into());
                        }
                    }
                    ResponseFormat::Full => {
                        object.insert("content".into(), capture.best_content().into());
                        object.insert("html".into(), capture.html.clone().into());
                        if let Some(markdown) = &capture.markdown {
                            object.insert("markdown".into(), markdown.clone().into());
                        }
                        if let Some(text) = &capture.extracted_text {
                            object.insert("extracted_text".into(), text.clone().into());
                        }
                        if let Some(script) = &capture.script_result {
                            object.insert(
                                "script_result".into(),
                                serde_json::to_value(script).unwrap_or(Value::Null),
                            );
                        }
                        object.insert("word_count".into(), capture.word_count.into());
                        object.insert(
                            "artifacts".into(),
                            serde_json::to_value(&capture.artifacts).unwrap_or(Value::Null),
                        );
                    }
                }

                if let Some(session_id) = &capture.session_id {
                    object.insert("session_id".into(), session_id.clone().into());
                }
                body
            }
        }
    }
}

/// One URL's line in a batch result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    pub url: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub word_count: usize,
    pub char_count: usize,
    pub elapsed_ms: u64,
}

impl BatchItem {
    /// Reduce a full outcome to its batch line.
    #[must_use]
    pub fn from_outcome(url: &str, outcome: &CrawlOutcome) -> Self {
        match outcome {
            CrawlOutcome::Success(capture) => {
                let markdown = capture
                    .fit_markdown
                    .clone()
                    .or_else(|| capture.markdown.clone());
                let char_count = markdown.as_deref().map(str::len).unwrap_or(0);
                Self {
                    url: url.to_string(),
                    success: true,
                    title: Some(capture.title.clone()),
                    markdown,
                    error: None,
                    word_count: capture.word_count,
                    char_count,
                    elapsed_ms: capture.elapsed_ms,
                }
            }
            CrawlOutcome::Failure { message, .. } => Self {
                url: url.to_string(),
                success: false,
                title: None,
                markdown: None,
                error: Some(message.clone()),
                word_count: 0,
                char_count: 0,
                elapsed_ms: 0,
            },
        }
    }
}

/// Aggregate result of a batch crawl or multi-page expansion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub total_words: usize,
    pub total_chars: usize,
    pub total_time_secs: f64,
    pub average_time_per_url_secs: f64,
    pub results: Vec<BatchItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collated_markdown: Option<String>,
}

impl BatchOutcome {
    /// Roll per-URL items up into the aggregate, collating captured
    /// markdown into one document.
    #[must_use]
    pub fn aggregate(results: Vec<BatchItem>, total_time_secs: f64) -> Self {
        let total = results.len();
        let completed = results.iter().filter(|r| r.success).count();
        let failed = total - completed;
        let total_words = results.iter().map(|r| r.word_count).sum();
        let total_chars = results.iter().map(|r| r.char_count).sum();
        let average = if total > 0 {
            total_time_secs / total as f64
        } else {
            0.0
        };
        let collated_markdown = collate_markdown(&results);

        Self {
            total,
            completed,
            failed,
            total_words,
            total_chars,
            total_time_secs,
            average_time_per_url_secs: average,
            results,
            collated_markdown,
        }
    }
}

/// Join the markdown actually captured for each URL into one document.
///
/// URLs whose crawl produced no markdown are listed in a trailer rather
/// than silently dropped.
#[must_use]
pub fn collate_markdown(results: &[BatchItem]) -> Option<String> {
    let mut sections: Vec<String> = Vec::new();
    let mut skipped: Vec<&str> = Vec::new();

    for item in results {
        match item.markdown.as_deref() {
            Some(markdown) if !markdown.trim().is_empty() => {
                let title = item.title.as_deref().unwrap_or(&item.url);
                sections.push(format!("# {title}\n\n*Source: {}*\n\n{markdown}", item.url));
            }
            _ => skipped.push(&item.url),
        }
    }

    if sections.is_empty() {
        return None;
    }

    let mut collated = sections.join("\n\n---\n\n");
    if !skipped.is_empty() {
        collated.push_str("\n\n---\n\n## Skipped\n\n");
        for url in skipped {
            collated.push_str(&format!("- {url}\n"));
        }
    }
    Some(collated)
}
