//! Result types returned by [`crate::convert`].

use crate::error::TaskError;
use crate::paper::Paper;
use crate::pipeline::index::DocumentIndex;
use crate::pipeline::llm::TaskOutcome;
use serde::Serialize;
use std::path::PathBuf;

/// A paper and its markdown rendering.
#[derive(Debug, Clone, Serialize)]
pub struct ConvertedDocument {
    pub paper: Paper,
    pub markdown: String,
}

/// Answers of the LLM analysis step, persisted as `rag_results.json`.
///
/// A task that failed or was not requested leaves its field `None`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RagResults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citation_analysis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_answer: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<TaskError>,
}

/// Aggregate LLM usage over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    pub llm_calls: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn record(&mut self, outcome: &TaskOutcome) {
        self.llm_calls += 1;
        self.input_tokens += outcome.input_tokens;
        self.output_tokens += outcome.output_tokens;
    }

    pub fn merge(&mut self, other: TokenUsage) {
        self.llm_calls += other.llm_calls;
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// Counters and timings of a full pipeline run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineStats {
    pub sections: usize,
    pub bibliography_entries: usize,
    pub citations: usize,
    /// Estimated token count of `paper.md`.
    pub markdown_tokens: usize,
    pub index_nodes: usize,
    pub grobid_ms: u64,
    pub index_ms: u64,
    pub rag_ms: u64,
    pub total_ms: u64,
    pub usage: TokenUsage,
    pub failed_tasks: usize,
}

/// Everything a full pipeline run produced.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub paper: Paper,
    pub markdown: String,
    pub index: DocumentIndex,
    pub rag: RagResults,
    pub stats: PipelineStats,
    /// Directory the result files were written to.
    pub output_dir: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rag_results_omit_missing_answers() {
        let rag = RagResults {
            summary: Some("A model.".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&rag).unwrap();
        assert_eq!(json, serde_json::json!({ "summary": "A model." }));
    }

    #[test]
    fn rag_results_serialise_task_errors() {
        let rag = RagResults {
            errors: vec![TaskError::Timeout {
                task: "query".into(),
                secs: 120,
            }],
            ..Default::default()
        };
        let json = serde_json::to_value(&rag).unwrap();
        assert_eq!(json["errors"][0]["Timeout"]["task"], "query");
    }

    #[test]
    fn token_usage_accumulates() {
        let mut usage = TokenUsage::default();
        usage.record(&TaskOutcome {
            input_tokens: 100,
            output_tokens: 20,
            ..Default::default()
        });
        usage.merge(TokenUsage {
            llm_calls: 2,
            input_tokens: 5,
            output_tokens: 5,
        });
        assert_eq!(
            usage,
            TokenUsage {
                llm_calls: 3,
                input_tokens: 105,
                output_tokens: 25
            }
        );
    }
}
