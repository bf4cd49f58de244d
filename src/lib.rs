//! # grobid2md
//!
//! Turn academic PDFs into structured markdown via GROBID, then index and
//! analyse them with an LLM.
//!
//! ## Why TEI?
//!
//! Text extracted straight from a PDF loses the paper's structure: section
//! nesting, which sentence cites which reference, where the abstract ends.
//! GROBID recovers that structure as TEI XML. This crate reads the TEI into
//! a small document model ([`Paper`]) and renders it as markdown whose
//! heading depth mirrors section depth, which is exactly what a
//! heading-based indexer needs.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. GROBID    PDF → TEI XML (HTTP), TEI → Paper      parsed_tei.json
//!  ├─ 2. Markdown  Paper → markdown (offline, pure)       paper.md
//!  ├─ 3. Index     markdown → heading tree (+ summaries)  page_index.json
//!  └─ 4. RAG       summary, citation analysis, query      rag_results.json
//! ```
//!
//! Steps 1 (after the HTTP call) and 2 are the offline core, available on
//! their own through [`convert_tei`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use grobid2md::{run_pipeline, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // GROBID on localhost:8070, Ollama serving granite4
//!     let config = PipelineConfig::builder()
//!         .query("What problem does the paper solve?")
//!         .build()?;
//!     let output = run_pipeline("attention.pdf", &config, None).await?;
//!     println!("{}", output.rag.summary.unwrap_or_default());
//!     eprintln!("{} index nodes", output.stats.index_nodes);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `grobid2md` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! grobid2md = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod markdown;
pub mod output;
pub mod paper;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod tei;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use convert::{convert_pdf, convert_pdf_sync, convert_tei, convert_tei_file, run_pipeline};
pub use error::{Grobid2MdError, TaskError};
pub use markdown::serialize;
pub use output::{ConvertedDocument, PipelineOutput, PipelineStats, RagResults, TokenUsage};
pub use paper::{Author, BibEntry, Bibliography, Citation, Paper, Section};
pub use pipeline::index::{DocumentIndex, IndexNode};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, PipelineStep, ProgressCallback};
pub use tei::extract;
