//! Progress-callback trait for pipeline step events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as [`crate::convert::run_pipeline`] moves through its four steps.
//!
//! # Example
//!
//! ```rust
//! use grobid2md::{PipelineConfig, PipelineProgressCallback, PipelineStep};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl PipelineProgressCallback for Printer {
//!     fn on_step_start(&self, step: PipelineStep) {
//!         eprintln!("[{}/{}] {}", step.number(), PipelineStep::COUNT, step.label());
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(Printer))
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::sync::Arc;

/// The four steps of a full pipeline run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum PipelineStep {
    /// PDF → TEI via GROBID, then TEI → `Paper`.
    Grobid,
    /// `Paper` → markdown.
    Markdown,
    /// Markdown → heading tree.
    Index,
    /// LLM summary, citation analysis and query answer.
    Rag,
}

impl PipelineStep {
    pub const COUNT: usize = 4;

    /// 1-indexed position of the step.
    pub fn number(self) -> usize {
        match self {
            PipelineStep::Grobid => 1,
            PipelineStep::Markdown => 2,
            PipelineStep::Index => 3,
            PipelineStep::Rag => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PipelineStep::Grobid => "Parsing PDF with GROBID",
            PipelineStep::Markdown => "Converting to structured markdown",
            PipelineStep::Index => "Building page index tree",
            PipelineStep::Rag => "Running LLM analysis",
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}] {}", self.number(), Self::COUNT, self.label())
    }
}

/// Called by the pipeline as it runs.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Node summaries run concurrently, so `on_task_error`
/// may be called from several tasks at once.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called when a step begins.
    fn on_step_start(&self, step: PipelineStep) {
        let _ = step;
    }

    /// Called when a step finishes, with a one-line human-readable summary
    /// (e.g. `"12 sections, 41 references"`).
    fn on_step_complete(&self, step: PipelineStep, detail: &str) {
        let _ = (step, detail);
    }

    /// Called when an LLM task fails after all retries. The run continues.
    fn on_task_error(&self, task: &str, error: &str) {
        let _ = (task, error);
    }
}

/// A no-op implementation.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience type alias.
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
