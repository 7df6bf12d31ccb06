//! Content tools: markdown extraction over raw HTML, provider-backed
//! summarization, URL suggestion, and a safe arithmetic evaluator.

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{SchemaBuilder, Tool, ToolContext};
use crate::llm;
use crate::markdown::{self, ContentFilter, MarkdownMode};
use crate::utils::is_valid_url;

/// Run the markdown pipeline over caller-supplied HTML.
pub struct ExtractMarkdownTool;

#[async_trait]
impl Tool for ExtractMarkdownTool {
    fn name(&self) -> &str {
        "extract_markdown"
    }

    fn description(&self) -> &str {
        "Convert HTML to markdown. Enhanced mode prunes navigation and \
         boilerplate and rewrites links as numbered citations."
    }

    fn input_schema(&self) -> Value {
        SchemaBuilder::new()
            .required_string("html", "The HTML to convert")
            .optional_string("base_url", "Base URL for resolving relative links", "")
            .optional_string("mode", "Markdown mode: basic or enhanced", "enhanced")
            .optional_string("query", "Keep only content relevant to this query", "")
            .build()
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> anyhow::Result<Value> {
        let html = args["html"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("'html' is required"))?;
        let base_url = args["base_url"].as_str().unwrap_or("");
        let mode = match args["mode"].as_str().unwrap_or("enhanced") {
            "none" => MarkdownMode::None,
            "basic" => MarkdownMode::Basic,
            _ => MarkdownMode::Enhanced,
        };
        let filter = args["query"]
            .as_str()
            .filter(|q| !q.is_empty())
            .map(|query| ContentFilter::Bm25 {
                query: query.to_string(),
                threshold: 0.4,
            });

        match markdown::render(html, base_url, mode, filter.as_ref()) {
            Some(rendering) => Ok(json!({
                "success": true,
                "markdown": rendering.markdown,
                "references": rendering.references,
                "fit_markdown": rendering.fit_markdown,
            })),
            None => Ok(json!({"success": true, "markdown": Value::Null})),
        }
    }
}

/// Summarize text through the configured LLM provider.
pub struct SummarizeContentTool;

#[async_trait]
impl Tool for SummarizeContentTool {
    fn name(&self) -> &str {
        "summarize_content"
    }

    fn description(&self) -> &str {
        "Summarize text with an LLM provider. Requires a provider API key."
    }

    fn input_schema(&self) -> Value {
        SchemaBuilder::new()
            .required_string("text", "The text to summarize")
            .required_string("api_key", "Provider API key")
            .optional_string("provider", "Provider name", "anthropic")
            .optional_string("model", "Model override", "")
            .build()
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> anyhow::Result<Value> {
        let text = args["text"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("'text' is required"))?;
        let api_key = args["api_key"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("'api_key' is required"))?;
        let provider_name = args["provider"].as_str().unwrap_or("anthropic");
        let model = args["model"].as_str().filter(|m| !m.is_empty());

        let provider = llm::provider_for(provider_name, api_key)?;
        let excerpt: String = text.chars().take(8_000).collect();
        let summary = llm::summarize(provider.as_ref(), model, &excerpt, 1_024).await?;
        Ok(json!({
            "success": true,
            "provider": provider_name,
            "summary": summary,
        }))
    }
}

/// Map a topic or bare domain to a crawlable URL.
pub struct SuggestUrlTool;

/// Topic table consulted before falling back to a constructed domain.
const TOPIC_URLS: &[(&str, &str)] = &[
    ("programming", "https://stackoverflow.com"),
    ("tech news", "https://news.ycombinator.com"),
    ("news", "https://news.ycombinator.com"),
    ("research", "https://scholar.google.com"),
    ("github", "https://github.com"),
    ("open source", "https://opensource.com"),
    ("rust", "https://www.rust-lang.org"),
    ("wikipedia", "https://en.wikipedia.org"),
];

/// Domains that render little without JavaScript.
const NEEDS_JAVASCRIPT: &[&str] = &[
    "twitter.com",
    "x.com",
    "facebook.com",
    "instagram.com",
    "linkedin.com",
    "reddit.com",
    "youtube.com",
];

/// Domains known to actively block automated crawlers.
const BLOCKS_CRAWLERS: &[&str] = &[
    "linkedin.com",
    "instagram.com",
    "facebook.com",
    "glassdoor.com",
    "indeed.com",
];

fn domain_of(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .map(|h| h.strip_prefix("www.").unwrap_or(&h).to_string())
}

fn domain_in(url: &str, table: &[&str]) -> bool {
    match domain_of(url) {
        Some(domain) => table
            .iter()
            .any(|d| domain == *d || domain.ends_with(&format!(".{d}"))),
        None => false,
    }
}

impl SuggestUrlTool {
    fn suggest(query: &str) -> (String, &'static str) {
        let trimmed = query.trim();

        // Already a URL?
        if is_valid_url(trimmed) {
            return (trimmed.to_string(), "query was already a URL");
        }

        // Bare domain like "example.com"
        if !trimmed.contains(' ') && trimmed.contains('.') {
            return (format!("https://{trimmed}"), "bare domain");
        }

        let lowered = trimmed.to_lowercase();
        for (topic, url) in TOPIC_URLS {
            if lowered.contains(topic) {
                return ((*url).to_string(), "topic match");
            }
        }

        // Last resort: build a domain from the first word.
        let slug: String = lowered
            .split_whitespace()
            .next()
            .unwrap_or("example")
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        (format!("https://www.{slug}.com"), "constructed domain")
    }
}

#[async_trait]
impl Tool for SuggestUrlTool {
    fn name(&self) -> &str {
        "suggest_url"
    }

    fn description(&self) -> &str {
        "Suggest a crawlable URL for a topic, company name or bare domain."
    }

    fn input_schema(&self) -> Value {
        SchemaBuilder::new()
            .required_string("query", "Topic, company name or domain")
            .build()
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> anyhow::Result<Value> {
        let query = args["query"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("'query' is required"))?;
        let (url, basis) = Self::suggest(query);
        let needs_javascript = domain_in(&url, NEEDS_JAVASCRIPT);
        let likely_to_block_crawlers = domain_in(&url, BLOCKS_CRAWLERS);
        let mut response = json!({
            "success": true,
            "query": query,
            "suggested_url": url,
            "basis": basis,
            "needs_javascript": needs_javascript,
            "likely_to_block_crawlers": likely_to_block_crawlers,
        });
        if likely_to_block_crawlers {
            response["crawling_notes"] =
                json!("WARNING: domain is known to block automated crawlers");
        }
        Ok(response)
    }
}

/// Safe arithmetic evaluator; no scripting, just numbers and operators.
pub struct CalculateTool;

#[async_trait]
impl Tool for CalculateTool {
    fn name(&self) -> &str {
        "calculate"
    }

    fn description(&self) -> &str {
        "Evaluate an arithmetic expression with + - * / % ^ and parentheses."
    }

    fn input_schema(&self) -> Value {
        SchemaBuilder::new()
            .required_string("expression", "Expression to evaluate, e.g. \"25 * 31\"")
            .build()
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> anyhow::Result<Value> {
        let expression = args["expression"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("'expression' is required"))?;
        let result = eval_expression(expression)
            .map_err(|e| anyhow::anyhow!("cannot evaluate '{expression}': {e}"))?;
        Ok(json!({
            "success": true,
            "expression": expression,
            "result": result,
        }))
    }
}

/// Recursive-descent evaluator over `+ - * / % ^` and parentheses.
fn eval_expression(input: &str) -> Result<f64, String> {
    let tokens: Vec<char> = input.chars().filter(|c| !c.is_whitespace()).collect();
    if tokens.is_empty() {
        return Err("empty expression".into());
    }
    let mut pos = 0;
    let value = parse_sum(&tokens, &mut pos)?;
    if pos != tokens.len() {
        return Err(format!("unexpected character at position {pos}"));
    }
    if value.is_finite() {
        Ok(value)
    } else {
        Err("result is not finite".into())
    }
}

fn parse_sum(tokens: &[char], pos: &mut usize) -> Result<f64, String> {
    let mut value = parse_product(tokens, pos)?;
    while let Some(&op) = tokens.get(*pos) {
        match op {
            '+' => {
                *pos += 1;
                value += parse_product(tokens, pos)?;
            }
            '-' => {
                *pos += 1;
                value -= parse_product(tokens, pos)?;
            }
            _ => break,
        }
    }
    Ok(value)
}

fn parse_product(tokens: &[char], pos: &mut usize) -> Result<f64, String> {
    let mut value = parse_power(tokens, pos)?;
    while let Some(&op) = tokens.get(*pos) {
        match op {
            '*' => {
                *pos += 1;
                value *= parse_power(tokens, pos)?;
            }
            '/' => {
                *pos += 1;
                let divisor = parse_power(tokens, pos)?;
                if divisor == 0.0 {
                    return Err("division by zero".into());
                }
                value /= divisor;
            }
            '%' => {
                *pos += 1;
                let divisor = parse_power(tokens, pos)?;
                if divisor == 0.0 {
                    return Err("modulo by zero".into());
                }
                value %= divisor;
            }
            _ => break,
        }
    }
    Ok(value)
}

fn parse_power(tokens: &[char], pos: &mut usize) -> Result<f64, String> {
    let base = parse_atom(tokens, pos)?;
    if tokens.get(*pos) == Some(&'^') {
        *pos += 1;
        // Right-associative exponentiation.
        let exponent = parse_power(tokens, pos)?;
        return Ok(base.powf(exponent));
    }
    Ok(base)
}

fn parse_atom(tokens: &[char], pos: &mut usize) -> Result<f64, String> {
    match tokens.get(*pos) {
        Some('-') => {
            *pos += 1;
            Ok(-parse_atom(tokens, pos)?)
        }
        Some('(') => {
            *pos += 1;
            let value = parse_sum(tokens, pos)?;
            if tokens.get(*pos) != Some(&')') {
                return Err("missing closing parenthesis".into());
            }
            *pos += 1;
            Ok(value)
        }
        Some(c) if c.is_ascii_digit() || *c == '.' => {
            let start = *pos;
            while tokens
                .get(*pos)
                .map(|c| c.is_ascii_digit() || *c == '.')
                .unwrap_or(false)
            {
                *pos += 1;
            }
            let literal: String = tokens[start..*pos].iter().collect();
            literal
                .parse::<f64>()
                .map_err(|_| format!("bad number: {literal}"))
        }
        Some(c) => Err(format!("unexpected character '{c}'")),
        None => Err("unexpected end of expression".into()),
    }
}
