//! Markdown → heading tree ("page index").
//!
//! Every ATX heading outside a fenced code block becomes a node. A node's
//! text runs from its heading line up to the next heading of any depth, so
//! a parent does not repeat its children's text. Nodes nest by heading depth
//! and get pre-order ids (`"0000"`, `"0001"`, …).
//!
//! With `add_node_summary` each node also gets a summary: short nodes reuse
//! their own text, longer ones are summarised by the LLM with up to
//! `concurrency` calls in flight.

use crate::config::PipelineConfig;
use crate::error::TaskError;
use crate::output::TokenUsage;
use crate::pipeline::llm::{self, count_tokens};
use crate::progress::ProgressCallback;
use crate::prompts::node_summary_prompt;
use edgequake_llm::LLMProvider;
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::iter::Peekable;
use std::sync::Arc;
use tracing::{debug, info};

static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#{1,6})\s+(.+?)\s*$").unwrap());

/// The whole tree for one markdown document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentIndex {
    pub doc_name: String,
    pub structure: Vec<IndexNode>,
}

/// One heading and the text under it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexNode {
    pub title: String,
    pub node_id: String,
    /// Heading depth (number of `#`).
    pub level: usize,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<IndexNode>,
}

impl DocumentIndex {
    /// Total number of nodes at every depth.
    pub fn node_count(&self) -> usize {
        count_nodes(&self.structure)
    }

    /// Pre-order iteration over every node.
    pub fn iter(&self) -> impl Iterator<Item = &IndexNode> {
        let mut stack: Vec<&IndexNode> = self.structure.iter().rev().collect();
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.nodes.iter().rev());
            Some(node)
        })
    }
}

/// Count nodes in a forest, recursively.
pub fn count_nodes(nodes: &[IndexNode]) -> usize {
    nodes.iter().map(|n| 1 + count_nodes(&n.nodes)).sum()
}

/// Build the heading tree of `markdown`.
pub fn build_index(markdown: &str, doc_name: &str) -> DocumentIndex {
    let lines: Vec<&str> = markdown.lines().collect();

    let mut headings: Vec<(usize, usize, String)> = Vec::new();
    let mut in_code = false;
    for (i, line) in lines.iter().enumerate() {
        if line.trim_start().starts_with("```") {
            in_code = !in_code;
            continue;
        }
        if in_code {
            continue;
        }
        if let Some(caps) = RE_HEADING.captures(line) {
            headings.push((i, caps[1].len(), caps[2].to_string()));
        }
    }

    let flat: Vec<IndexNode> = headings
        .iter()
        .enumerate()
        .map(|(n, (start, level, title))| {
            let end = headings.get(n + 1).map_or(lines.len(), |next| next.0);
            IndexNode {
                title: title.clone(),
                node_id: format!("{n:04}"),
                level: *level,
                text: lines[*start..end].join("\n").trim().to_string(),
                summary: None,
                nodes: Vec::new(),
            }
        })
        .collect();

    let mut iter = flat.into_iter().peekable();
    let structure = nest(&mut iter, 0);
    debug!("Indexed {} headings of {}", headings.len(), doc_name);

    DocumentIndex {
        doc_name: doc_name.to_string(),
        structure,
    }
}

fn nest<I>(iter: &mut Peekable<I>, parent_level: usize) -> Vec<IndexNode>
where
    I: Iterator<Item = IndexNode>,
{
    let mut siblings = Vec::new();
    while let Some(next) = iter.peek() {
        if next.level <= parent_level {
            break;
        }
        let Some(mut node) = iter.next() else { break };
        node.nodes = nest(iter, node.level);
        siblings.push(node);
    }
    siblings
}

/// Fill `summary` on every node.
///
/// Returns token usage of the LLM calls and the errors of nodes whose
/// summary could not be generated (those keep `summary: None`).
pub async fn add_summaries(
    index: &mut DocumentIndex,
    provider: &Arc<dyn LLMProvider>,
    config: &PipelineConfig,
    progress: Option<&ProgressCallback>,
) -> (TokenUsage, Vec<TaskError>) {
    let mut summaries: HashMap<String, String> = HashMap::new();
    let mut pending: Vec<(String, String)> = Vec::new();

    for node in index.iter() {
        if count_tokens(&node.text) < config.summary_token_threshold {
            summaries.insert(node.node_id.clone(), node.text.clone());
        } else {
            pending.push((node.node_id.clone(), node_summary_prompt(node)));
        }
    }

    info!(
        "Summarising {} index nodes with the LLM ({} short nodes reuse their text)",
        pending.len(),
        summaries.len()
    );

    let outcomes: Vec<(String, llm::TaskOutcome)> = stream::iter(pending)
        .map(|(node_id, prompt)| async move {
            let task = format!("node summary {node_id}");
            let outcome = llm::chat(provider, &task, &prompt, config).await;
            (node_id, outcome)
        })
        .buffer_unordered(config.concurrency.max(1))
        .collect()
        .await;

    let mut usage = TokenUsage::default();
    let mut errors = Vec::new();
    for (node_id, outcome) in outcomes {
        usage.record(&outcome);
        match outcome.error {
            Some(err) => {
                if let Some(cb) = progress {
                    cb.on_task_error(err.task(), &err.to_string());
                }
                errors.push(err);
            }
            None => {
                summaries.insert(node_id, outcome.content);
            }
        }
    }

    apply_summaries(&mut index.structure, &mut summaries);
    (usage, errors)
}

fn apply_summaries(nodes: &mut [IndexNode], summaries: &mut HashMap<String, String>) {
    for node in nodes {
        node.summary = summaries.remove(&node.node_id);
        apply_summaries(&mut node.nodes, summaries);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MD: &str = "# Title\n\nIntro line.\n\n## 1 Introduction\n\nBody one.\n\n### 1.1 Detail\n\nDeep.\n\n## 2 Method\n\n```\n# not a heading\n```\n\n## References\n\n[1] Ref.\n";

    #[test]
    fn builds_nested_tree_with_preorder_ids() {
        let index = build_index(MD, "paper.md");
        assert_eq!(index.doc_name, "paper.md");
        assert_eq!(index.structure.len(), 1);

        let root = &index.structure[0];
        assert_eq!(root.title, "Title");
        assert_eq!(root.node_id, "0000");
        assert_eq!(root.text, "# Title\n\nIntro line.");

        let titles: Vec<&str> = root.nodes.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["1 Introduction", "2 Method", "References"]);
        assert_eq!(root.nodes[0].nodes[0].title, "1.1 Detail");
        assert_eq!(root.nodes[0].nodes[0].node_id, "0002");
        assert_eq!(root.nodes[2].node_id, "0004");
        assert_eq!(index.node_count(), 5);
    }

    #[test]
    fn fenced_headings_stay_in_text() {
        let index = build_index(MD, "paper.md");
        let method = &index.structure[0].nodes[1];
        assert!(method.text.contains("# not a heading"));
    }

    #[test]
    fn parent_text_excludes_children() {
        let index = build_index(MD, "paper.md");
        let intro = &index.structure[0].nodes[0];
        assert_eq!(intro.text, "## 1 Introduction\n\nBody one.");
    }

    #[test]
    fn shallower_heading_after_deep_one_closes_levels() {
        let index = build_index("### Deep\n# Top\n## Child", "x.md");
        let titles: Vec<&str> = index.structure.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["Deep", "Top"]);
        assert_eq!(index.structure[1].nodes[0].title, "Child");
    }

    #[test]
    fn no_headings_gives_empty_structure() {
        let index = build_index("just text\nno headings", "x.md");
        assert!(index.structure.is_empty());
        assert_eq!(index.node_count(), 0);
    }

    #[test]
    fn iter_is_preorder() {
        let index = build_index(MD, "paper.md");
        let ids: Vec<&str> = index.iter().map(|n| n.node_id.as_str()).collect();
        assert_eq!(ids, vec!["0000", "0001", "0002", "0003", "0004"]);
    }

    #[test]
    fn summary_is_omitted_from_json_until_set() {
        let mut index = build_index("# A\n\ntext", "x.md");
        let json = serde_json::to_value(&index).unwrap();
        assert!(json["structure"][0].get("summary").is_none());
        assert!(json["structure"][0].get("nodes").is_none());

        let mut summaries = HashMap::from([("0000".to_string(), "s".to_string())]);
        apply_summaries(&mut index.structure, &mut summaries);
        let json = serde_json::to_value(&index).unwrap();
        assert_eq!(json["structure"][0]["summary"], "s");
    }
}
