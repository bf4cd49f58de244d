//! Conversion entry points.
//!
//! | Function | Needs | Produces |
//! |----------|-------|----------|
//! | [`convert_tei`] | nothing | `Paper` + markdown from TEI text |
//! | [`convert_tei_file`] | nothing | same, from a `.tei.xml` file |
//! | [`convert_pdf`] | GROBID | same, from a PDF path or URL |
//! | [`run_pipeline`] | GROBID + LLM | all four steps, result files on disk |
//!
//! Only [`run_pipeline`] touches the LLM. A failed LLM task is recorded in
//! [`RagResults::errors`] and the run carries on; everything else that goes
//! wrong is a fatal [`Grobid2MdError`].

use crate::config::PipelineConfig;
use crate::error::Grobid2MdError;
use crate::markdown;
use crate::output::{ConvertedDocument, PipelineOutput, PipelineStats, RagResults, TokenUsage};
use crate::paper::Paper;
use crate::pipeline::index::{self, DocumentIndex};
use crate::pipeline::{grobid, input, llm};
use crate::progress::PipelineStep;
use crate::prompts;
use crate::tei;
use edgequake_llm::LLMProvider;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// File names written by [`run_pipeline`].
pub const PARSED_TEI_FILE: &str = "parsed_tei.json";
pub const MARKDOWN_FILE: &str = "paper.md";
pub const PAGE_INDEX_FILE: &str = "page_index.json";
pub const RAG_RESULTS_FILE: &str = "rag_results.json";

/// Convert TEI XML text to a [`Paper`] and its markdown.
///
/// Pure and offline; the same input always yields the same output.
///
/// # Example
/// ```rust
/// let tei = r#"<TEI><teiHeader><fileDesc><titleStmt>
///     <title type="main">Attention Is All You Need</title>
/// </titleStmt></fileDesc></teiHeader></TEI>"#;
/// let doc = grobid2md::convert_tei(tei).unwrap();
/// assert!(doc.markdown.starts_with("# Attention Is All You Need\n"));
/// ```
pub fn convert_tei(xml: &str) -> Result<ConvertedDocument, Grobid2MdError> {
    let paper = tei::extract(xml)?;
    let markdown = markdown::serialize(&paper);
    Ok(ConvertedDocument { paper, markdown })
}

/// [`convert_tei`] on the contents of a file.
pub fn convert_tei_file(path: impl AsRef<Path>) -> Result<ConvertedDocument, Grobid2MdError> {
    let path = path.as_ref();
    let xml = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => Grobid2MdError::PermissionDenied {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::InvalidData => Grobid2MdError::MalformedInput {
            position: 0,
            detail: format!("'{}' is not valid UTF-8", path.display()),
        },
        std::io::ErrorKind::NotFound => Grobid2MdError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => Grobid2MdError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        },
    })?;
    convert_tei(&xml)
}

/// Fail with [`Grobid2MdError::GrobidUnavailable`] unless GROBID answers.
async fn ensure_grobid(config: &PipelineConfig) -> Result<(), Grobid2MdError> {
    if grobid::is_alive(config).await {
        Ok(())
    } else {
        Err(Grobid2MdError::GrobidUnavailable {
            url: config.grobid_base().to_string(),
        })
    }
}

async fn parse_with_grobid(
    pdf: &input::PdfSource,
    config: &PipelineConfig,
) -> Result<Paper, Grobid2MdError> {
    let tei_xml = grobid::process_pdf(pdf, config).await?;
    tei::extract(&tei_xml)
}

/// Convert a PDF (local path or URL) to a [`Paper`] and its markdown via GROBID.
///
/// # Errors
/// - GROBID not reachable ([`Grobid2MdError::GrobidUnavailable`])
/// - File not found / not a PDF / download failed
/// - GROBID error status or timeout
/// - GROBID returned TEI that is not well-formed
pub async fn convert_pdf(
    input_str: impl AsRef<str>,
    config: &PipelineConfig,
) -> Result<ConvertedDocument, Grobid2MdError> {
    let input_str = input_str.as_ref();
    info!("Converting via GROBID: {}", input_str);

    ensure_grobid(config).await?;
    let pdf = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let paper = parse_with_grobid(&pdf, config).await?;
    let markdown = markdown::serialize(&paper);
    Ok(ConvertedDocument { paper, markdown })
}

/// Synchronous wrapper around [`convert_pdf`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_pdf_sync(
    input_str: impl AsRef<str>,
    config: &PipelineConfig,
) -> Result<ConvertedDocument, Grobid2MdError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Grobid2MdError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert_pdf(input_str, config))
}

/// `results/<stem>`, relative to the working directory.
pub fn default_output_dir(stem: &str) -> PathBuf {
    Path::new("results").join(stem)
}

/// Write `contents` to `path` atomically (temp file + rename), creating
/// parent directories as needed.
pub async fn write_atomic(path: impl AsRef<Path>, contents: &[u8]) -> Result<(), Grobid2MdError> {
    let path = path.as_ref();
    let write_failed = |source: std::io::Error| Grobid2MdError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(write_failed)?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(write_failed)?;

    debug!("Wrote {} ({} bytes)", path.display(), contents.len());
    Ok(())
}

/// [`write_atomic`] of `value` as pretty JSON.
pub async fn write_json<T: serde::Serialize>(
    path: impl AsRef<Path>,
    value: &T,
) -> Result<(), Grobid2MdError> {
    let json = serde_json::to_string_pretty(value)?;
    write_atomic(path, json.as_bytes()).await
}

/// Run the full pipeline: GROBID → markdown → page index → LLM analysis.
///
/// Results are written to `output_dir` (default `results/<pdf stem>`):
/// `parsed_tei.json`, `paper.md`, `page_index.json` and `rag_results.json`.
///
/// # Errors
/// Everything [`convert_pdf`] can fail with, plus an unresolvable LLM
/// provider and output write failures. Failed LLM tasks are not errors;
/// see [`RagResults::errors`].
pub async fn run_pipeline(
    input_str: impl AsRef<str>,
    config: &PipelineConfig,
    output_dir: Option<&Path>,
) -> Result<PipelineOutput, Grobid2MdError> {
    let total_start = Instant::now();
    let input_str = input_str.as_ref();
    let progress = config.progress_callback.as_ref();
    info!("Starting pipeline: {}", input_str);

    let provider = llm::resolve_provider(config)?;

    // ── Step 1: GROBID ───────────────────────────────────────────────────
    if let Some(cb) = progress {
        cb.on_step_start(PipelineStep::Grobid);
    }
    let grobid_start = Instant::now();
    ensure_grobid(config).await?;
    let pdf = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let out_dir = output_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output_dir(&pdf.stem()));
    let paper = parse_with_grobid(&pdf, config).await?;
    let grobid_ms = grobid_start.elapsed().as_millis() as u64;

    info!(
        "Title: {:?}; {} authors, {} sections, {} bibliography entries",
        paper.title,
        paper.authors.len(),
        paper.sections.len(),
        paper.bibliography.len()
    );
    write_json(out_dir.join(PARSED_TEI_FILE), &paper).await?;
    if let Some(cb) = progress {
        cb.on_step_complete(
            PipelineStep::Grobid,
            &format!(
                "{} sections, {} references",
                paper.sections.len(),
                paper.bibliography.len()
            ),
        );
    }

    // ── Step 2: Markdown ─────────────────────────────────────────────────
    if let Some(cb) = progress {
        cb.on_step_start(PipelineStep::Markdown);
    }
    let markdown = markdown::serialize(&paper);
    let md_path = out_dir.join(MARKDOWN_FILE);
    write_atomic(&md_path, markdown.as_bytes()).await?;
    let markdown_tokens = llm::count_tokens(&markdown);
    info!(
        "Markdown written: {} (~{} tokens)",
        md_path.display(),
        markdown_tokens
    );
    if let Some(cb) = progress {
        cb.on_step_complete(
            PipelineStep::Markdown,
            &format!("~{markdown_tokens} tokens"),
        );
    }

    // ── Step 3: Page index ───────────────────────────────────────────────
    if let Some(cb) = progress {
        cb.on_step_start(PipelineStep::Index);
    }
    let index_start = Instant::now();
    let mut page_index = index::build_index(&markdown, MARKDOWN_FILE);
    let mut usage = TokenUsage::default();
    let mut task_errors = Vec::new();
    if config.add_node_summary {
        let (summary_usage, errors) =
            index::add_summaries(&mut page_index, &provider, config, progress).await;
        usage.merge(summary_usage);
        task_errors.extend(errors);
    }
    let index_nodes = page_index.node_count();
    let index_ms = index_start.elapsed().as_millis() as u64;
    info!("Page index built: {} nodes", index_nodes);
    write_json(out_dir.join(PAGE_INDEX_FILE), &page_index).await?;
    if let Some(cb) = progress {
        cb.on_step_complete(PipelineStep::Index, &format!("{index_nodes} nodes"));
    }

    // ── Step 4: LLM analysis ─────────────────────────────────────────────
    if let Some(cb) = progress {
        cb.on_step_start(PipelineStep::Rag);
    }
    let rag_start = Instant::now();
    let (mut rag, rag_usage) = run_rag(&provider, &paper, &page_index, config).await?;
    usage.merge(rag_usage);
    task_errors.append(&mut rag.errors);
    rag.errors = task_errors;
    let rag_ms = rag_start.elapsed().as_millis() as u64;
    write_json(out_dir.join(RAG_RESULTS_FILE), &rag).await?;
    if let Some(cb) = progress {
        cb.on_step_complete(
            PipelineStep::Rag,
            &format!("{} LLM calls, {} failed", usage.llm_calls, rag.errors.len()),
        );
    }

    let stats = PipelineStats {
        sections: paper.sections.len(),
        bibliography_entries: paper.bibliography.len(),
        citations: paper.citation_count(),
        markdown_tokens,
        index_nodes,
        grobid_ms,
        index_ms,
        rag_ms,
        total_ms: total_start.elapsed().as_millis() as u64,
        usage,
        failed_tasks: rag.errors.len(),
    };

    info!(
        "Pipeline complete: {} LLM calls, {} failed, {}ms total. Outputs in {}",
        stats.usage.llm_calls,
        stats.failed_tasks,
        stats.total_ms,
        out_dir.display()
    );

    Ok(PipelineOutput {
        paper,
        markdown,
        index: page_index,
        rag,
        stats,
        output_dir: out_dir,
    })
}

/// Summary, citation analysis (non-empty bibliography only) and query
/// answer (when `config.query` is set).
async fn run_rag(
    provider: &Arc<dyn LLMProvider>,
    paper: &Paper,
    page_index: &DocumentIndex,
    config: &PipelineConfig,
) -> Result<(RagResults, TokenUsage), Grobid2MdError> {
    let mut tasks: Vec<(&str, String)> = vec![("summary", prompts::summary_prompt(paper, page_index)?)];
    if !paper.bibliography.is_empty() {
        tasks.push(("citation_analysis", prompts::citation_prompt(paper)));
    }
    if let Some(ref query) = config.query {
        tasks.push(("query", prompts::query_prompt(paper, page_index, query)?));
    }

    let mut rag = RagResults::default();
    let mut usage = TokenUsage::default();
    for (task, prompt) in tasks {
        info!("Running LLM task: {}", task);
        let outcome = llm::chat(provider, task, &prompt, config).await;
        usage.record(&outcome);
        if let Some(err) = outcome.error {
            if let Some(ref cb) = config.progress_callback {
                cb.on_task_error(err.task(), &err.to_string());
            }
            rag.errors.push(err);
            continue;
        }
        let answer = Some(outcome.content);
        match task {
            "summary" => rag.summary = answer,
            "citation_analysis" => rag.citation_analysis = answer,
            _ => rag.query_answer = answer,
        }
    }
    Ok((rag, usage))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convert_tei_rejects_malformed_xml() {
        let err = convert_tei("<TEI><text>").unwrap_err();
        assert!(matches!(err, Grobid2MdError::MalformedInput { .. }));
    }

    #[test]
    fn convert_tei_file_missing() {
        let err = convert_tei_file("/no/such/paper.tei.xml").unwrap_err();
        assert!(matches!(err, Grobid2MdError::FileNotFound { .. }));
    }

    #[test]
    fn convert_tei_file_on_a_directory_is_a_read_failure() {
        let dir = tempfile::tempdir().unwrap();
        match convert_tei_file(dir.path()) {
            Err(Grobid2MdError::ReadFailed { path, .. }) => assert_eq!(path, dir.path()),
            other => panic!("expected ReadFailed, got {other:?}"),
        }
    }

    #[test]
    fn default_output_dir_uses_stem() {
        assert_eq!(
            default_output_dir("attention"),
            Path::new("results").join("attention")
        );
    }

    #[tokio::test]
    async fn write_atomic_creates_parents_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("paper.md");
        write_atomic(&path, b"# Title\n").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Title\n");
        assert!(!dir.path().join("nested").join("paper.md.tmp").exists());

        write_atomic(&path, b"# Other\n").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Other\n");
    }

    #[tokio::test]
    async fn convert_pdf_fails_fast_when_grobid_down() {
        let config = PipelineConfig::builder()
            .grobid_url("http://127.0.0.1:9")
            .alive_timeout_secs(1)
            .build()
            .unwrap();
        match convert_pdf("/no/such.pdf", &config).await {
            Err(Grobid2MdError::GrobidUnavailable { url }) => {
                assert_eq!(url, "http://127.0.0.1:9")
            }
            other => panic!("expected GrobidUnavailable, got {other:?}"),
        }
    }
}
