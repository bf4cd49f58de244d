//! Network-facing and post-serialization stages of the pipeline.
//!
//! The offline core ([`crate::tei`] and [`crate::markdown`]) turns TEI into
//! markdown. The stages here surround it:
//!
//! ```text
//! input ──▶ grobid ──▶ (tei + markdown) ──▶ index ──▶ llm ──▶ postprocess
//! (URL/path) (HTTP)       (offline core)      (tree)   (chat)   (cleanup)
//! ```
//!
//! 1. [`input`]:  read a local PDF or download one, check `%PDF`
//! 2. [`grobid`]: health check and multipart upload to GROBID
//! 3. [`index`]:  heading tree of the markdown, optional node summaries
//! 4. [`llm`]:    provider resolution, retry/backoff and timeouts
//! 5. [`postprocess`]: deterministic cleanup of LLM answers

pub mod grobid;
pub mod index;
pub mod input;
pub mod llm;
pub mod postprocess;
