//! Named multi-step recipes composed from tools.
//!
//! Workflows add no new semantics over the toolbag; they exist so common
//! multi-step use cases do not require the caller to reason about tool
//! ordering. Each recipe is a fixed sequence of chain invocations with a
//! little glue threading text between steps.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;

use crate::llm::LlmProvider;
use crate::toolbag::{ChainMode, Toolbag};

/// One step: a tool chain plus a query template. `{input}` expands to the
/// workflow input, `{previous}` to the prior step's final response text.
#[derive(Debug, Clone)]
pub struct WorkflowStep {
    pub tools: &'static [&'static str],
    pub query_template: &'static str,
}

/// A named recipe.
#[derive(Debug, Clone)]
pub struct Workflow {
    pub name: &'static str,
    pub description: &'static str,
    pub steps: &'static [WorkflowStep],
}

/// Result of a workflow run.
#[derive(Debug, Serialize)]
pub struct WorkflowResult {
    pub workflow: String,
    pub success: bool,
    pub steps: Vec<Value>,
    pub final_context: Map<String, Value>,
}

const ANALYZE_WEBSITE: Workflow = Workflow {
    name: "analyze_website",
    description: "Resolve a site, crawl it, and distill its content",
    steps: &[
        WorkflowStep {
            tools: &["suggest_url"],
            query_template: "Find the best URL to crawl for: {input}",
        },
        WorkflowStep {
            tools: &["crawl_webpage"],
            query_template: "Crawl the suggested site and report what it contains. Context: {previous}",
        },
        WorkflowStep {
            tools: &["extract_markdown"],
            query_template: "Distill the crawled page into clean markdown. Context: {previous}",
        },
    ],
};

const MONITOR_CHANGES: Workflow = Workflow {
    name: "monitor_changes",
    description: "Crawl a page twice in one session to observe state changes",
    steps: &[
        WorkflowStep {
            tools: &["crawl_with_session"],
            query_template: "Open {input} in a persistent session and capture its content",
        },
        WorkflowStep {
            tools: &["crawl_with_session"],
            query_template: "Re-crawl the same page in the same session and note differences. Context: {previous}",
        },
    ],
};

const EXTRACT_DATA: Workflow = Workflow {
    name: "extract_data",
    description: "Crawl a page and pull out the data the caller asked for",
    steps: &[
        WorkflowStep {
            tools: &["crawl_webpage"],
            query_template: "Crawl the page relevant to this request: {input}",
        },
        WorkflowStep {
            tools: &["extract_markdown"],
            query_template: "From the crawl result, extract exactly: {input}. Context: {previous}",
        },
    ],
};

const RESEARCH_TOPIC: Workflow = Workflow {
    name: "research_topic",
    description: "Find a source for a topic and read it",
    steps: &[
        WorkflowStep {
            tools: &["suggest_url"],
            query_template: "Suggest the best starting source for researching: {input}",
        },
        WorkflowStep {
            tools: &["crawl_webpage"],
            query_template: "Crawl the suggested source and gather the key facts about {input}. Context: {previous}",
        },
    ],
};

const WORKFLOWS: &[&Workflow] = &[
    &ANALYZE_WEBSITE,
    &MONITOR_CHANGES,
    &EXTRACT_DATA,
    &RESEARCH_TOPIC,
];

/// Look up a recipe by name.
#[must_use]
pub fn workflow(name: &str) -> Option<&'static Workflow> {
    WORKFLOWS.iter().copied().find(|w| w.name == name)
}

/// Names of every registered recipe.
#[must_use]
pub fn workflow_names() -> Vec<&'static str> {
    WORKFLOWS.iter().map(|w| w.name).collect()
}

impl Workflow {
    /// Run the recipe's steps in order, threading the final response text
    /// of each step into the next and merging contexts.
    pub async fn run(
        &self,
        toolbag: &Toolbag,
        provider: &dyn LlmProvider,
        input: &str,
        model: Option<&str>,
        user_id: Option<&str>,
    ) -> WorkflowResult {
        let mut steps: Vec<Value> = Vec::new();
        let mut merged_context: Map<String, Value> = Map::new();
        let mut previous_text = String::new();
        let mut success = true;

        for (index, step) in self.steps.iter().enumerate() {
            let query = step
                .query_template
                .replace("{input}", input)
                .replace("{previous}", &previous_text);
            let tools: Vec<String> = step.tools.iter().map(|t| (*t).to_string()).collect();

            let chain = toolbag
                .execute_chain_with(provider, &tools, &query, ChainMode::Continue, model, user_id)
                .await;

            let rendered = serde_json::to_value(&chain).unwrap_or(Value::Null);
            success &= chain.success;
            previous_text = chain
                .results
                .last()
                .and_then(|r| r["response"].as_str())
                .unwrap_or_default()
                .to_string();

            for (key, value) in chain.final_context {
                merged_context.insert(format!("step_{index}_{key}"), value);
            }
            steps.push(rendered);
        }

        info!(workflow = self.name, steps = steps.len(), success, "workflow finished");
        WorkflowResult {
            workflow: self.name.to_string(),
            success,
            steps,
            final_context: merged_context,
        }
    }
}
