//! CLI binary for grobid2md.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use grobid2md::convert::{write_atomic, write_json, MARKDOWN_FILE, PARSED_TEI_FILE};
use grobid2md::{
    convert_pdf, convert_tei_file, run_pipeline, ConvertedDocument, PipelineConfig,
    PipelineOutput, PipelineProgressCallback, PipelineStep, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner showing the current pipeline step, with one log line per
/// finished step above it.
struct CliProgressCallback {
    bar: ProgressBar,
    step_started: Mutex<Option<Instant>>,
    task_errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Starting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            step_started: Mutex::new(None),
            task_errors: AtomicUsize::new(0),
        })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_step_start(&self, step: PipelineStep) {
        if let Ok(mut started) = self.step_started.lock() {
            *started = Some(Instant::now());
        }
        self.bar
            .set_prefix(format!("[{}/{}]", step.number(), PipelineStep::COUNT));
        self.bar.set_message(format!("{}…", step.label()));
    }

    fn on_step_complete(&self, step: PipelineStep, detail: &str) {
        let elapsed = self
            .step_started
            .lock()
            .ok()
            .and_then(|mut s| s.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        self.bar.println(format!(
            "  {} [{}/{}] {:<34} {}  {}",
            green("✓"),
            step.number(),
            PipelineStep::COUNT,
            step.label(),
            dim(detail),
            dim(&format!("{elapsed:.1}s")),
        ));
    }

    fn on_task_error(&self, task: &str, error: &str) {
        self.task_errors.fetch_add(1, Ordering::Relaxed);
        self.bar
            .println(format!("  {} {}: {}", red("✘"), bold(task), error));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Full pipeline: GROBID → markdown → page index → LLM analysis
  grobid2md paper.pdf

  # Ask a question and generate per-node summaries
  grobid2md paper.pdf --summary --query "What dataset is used?"

  # Markdown only (needs GROBID, no LLM), to stdout
  grobid2md --markdown-only paper.pdf > paper.md

  # Offline: convert an existing TEI file
  grobid2md --tei paper.tei.xml -o results/paper

  # Parsed structure as JSON
  grobid2md --tei --json paper.tei.xml

  # Download from a URL, use OpenAI instead of local Ollama
  grobid2md https://arxiv.org/pdf/1706.03762 --provider openai --model gpt-4.1-nano

OUTPUT FILES (full pipeline, default directory results/<pdf name>/):
  parsed_tei.json   title, authors, sections, bibliography
  paper.md          structured markdown
  page_index.json   heading tree of paper.md
  rag_results.json  summary, citation analysis, query answer

ENVIRONMENT VARIABLES:
  GROBID2MD_GROBID_URL    GROBID service URL (default http://localhost:8070)
  EDGEQUAKE_LLM_PROVIDER  LLM provider (default ollama)
  EDGEQUAKE_MODEL         Model ID (default granite4)
  OPENAI_API_KEY          Needed for --provider openai
  RUST_LOG                Overrides the log filter

SETUP:
  1. Start GROBID:  docker run --rm -p 8070:8070 lfoppiano/grobid:0.8.1
  2. Start Ollama:  ollama pull granite4
  3. Run:           grobid2md paper.pdf
"#;

/// Convert academic PDFs to structured markdown with GROBID and analyse them with an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "grobid2md",
    version,
    about = "Convert academic PDFs to structured markdown via GROBID, then index and analyse them",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF path or HTTP/HTTPS URL (a TEI XML file with --tei).
    input: String,

    /// INPUT is a GROBID TEI XML file; convert offline without GROBID or LLM.
    #[arg(long, env = "GROBID2MD_TEI")]
    tei: bool,

    /// Stop after the markdown step (no page index, no LLM).
    #[arg(long, env = "GROBID2MD_MARKDOWN_ONLY")]
    markdown_only: bool,

    /// Directory for result files (default: results/<pdf name>).
    #[arg(short, long, env = "GROBID2MD_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// GROBID service URL.
    #[arg(long, env = "GROBID2MD_GROBID_URL", default_value = grobid2md::config::DEFAULT_GROBID_URL)]
    grobid_url: String,

    /// GROBID request timeout in seconds.
    #[arg(long, env = "GROBID2MD_GROBID_TIMEOUT", default_value_t = 120)]
    grobid_timeout: u64,

    /// LLM model ID (default: granite4).
    #[arg(long, env = "GROBID2MD_MODEL")]
    model: Option<String>,

    /// LLM provider: ollama, openai, anthropic, gemini, …
    #[arg(long, env = "GROBID2MD_PROVIDER")]
    provider: Option<String>,

    /// Generate a summary for every page-index node.
    #[arg(long, env = "GROBID2MD_SUMMARY")]
    summary: bool,

    /// Question to answer about the paper.
    #[arg(long, env = "GROBID2MD_QUERY")]
    query: Option<String>,

    /// Retries per LLM call.
    #[arg(long, env = "GROBID2MD_MAX_RETRIES", default_value_t = 4)]
    max_retries: u32,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "GROBID2MD_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Print JSON instead of markdown / text.
    #[arg(long, env = "GROBID2MD_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "GROBID2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "GROBID2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "GROBID2MD_QUIET")]
    quiet: bool,
}

impl Cli {
    fn full_pipeline(&self) -> bool {
        !self.tei && !self.markdown_only
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner replaces INFO logs while it is visible.
    let show_progress = cli.full_pipeline() && !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress = show_progress.then(CliProgressCallback::new);
    let config = build_config(&cli, progress.clone().map(|p| p as ProgressCallback))?;

    if cli.tei {
        let doc = convert_tei_file(&cli.input)
            .with_context(|| format!("Failed to convert TEI file '{}'", cli.input))?;
        return emit_document(&cli, &doc).await;
    }

    if cli.markdown_only {
        let doc = convert_pdf(&cli.input, &config)
            .await
            .with_context(|| format!("Failed to convert '{}'", cli.input))?;
        return emit_document(&cli, &doc).await;
    }

    let result = run_pipeline(&cli.input, &config, cli.output_dir.as_deref()).await;
    if let Some(ref p) = progress {
        p.finish();
    }
    let output = result.with_context(|| format!("Pipeline failed for '{}'", cli.input))?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output.rag)?;
        println!("{json}");
    } else {
        print_results(&output);
    }

    if !cli.quiet {
        let failed = progress
            .as_ref()
            .map(|p| p.task_errors.load(Ordering::Relaxed))
            .unwrap_or(output.stats.failed_tasks);
        eprintln!(
            "{} All outputs saved to: {}/  {}",
            if failed == 0 { green("✔") } else { red("⚠") },
            output.output_dir.display(),
            dim(&format!(
                "{} LLM calls, {} tokens in / {} out, {}ms",
                output.stats.usage.llm_calls,
                output.stats.usage.input_tokens,
                output.stats.usage.output_tokens,
                output.stats.total_ms
            )),
        );
    }

    Ok(())
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .grobid_url(cli.grobid_url.clone())
        .grobid_timeout_secs(cli.grobid_timeout)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .add_node_summary(cli.summary);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref query) = cli.query {
        builder = builder.query(query.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Output for `--tei` and `--markdown-only`: files when `-o` is given,
/// otherwise markdown (or the parsed paper with `--json`) on stdout.
async fn emit_document(cli: &Cli, doc: &ConvertedDocument) -> Result<()> {
    if let Some(ref dir) = cli.output_dir {
        write_document(dir, doc).await?;
        if !cli.quiet {
            eprintln!(
                "{} {} sections, {} references → {}/",
                green("✔"),
                doc.paper.sections.len(),
                doc.paper.bibliography.len(),
                dir.display()
            );
        }
        return Ok(());
    }

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if cli.json {
        let json = serde_json::to_string_pretty(&doc.paper)?;
        writeln!(handle, "{json}")?;
    } else {
        handle.write_all(doc.markdown.as_bytes())?;
        if !doc.markdown.ends_with('\n') {
            handle.write_all(b"\n")?;
        }
    }
    Ok(())
}

async fn write_document(dir: &Path, doc: &ConvertedDocument) -> Result<()> {
    write_json(dir.join(PARSED_TEI_FILE), &doc.paper)
        .await
        .context("Failed to write parsed TEI")?;
    write_atomic(dir.join(MARKDOWN_FILE), doc.markdown.as_bytes())
        .await
        .context("Failed to write markdown")?;
    Ok(())
}

fn print_results(output: &PipelineOutput) {
    let rule = "=".repeat(60);
    println!("\n{rule}");
    if let Some(ref summary) = output.rag.summary {
        println!("PAPER SUMMARY:");
        println!("{summary}");
    }
    if let Some(ref analysis) = output.rag.citation_analysis {
        println!("\nCITATION ANALYSIS:");
        println!("{analysis}");
    }
    if let Some(ref answer) = output.rag.query_answer {
        println!("\nQUERY ANSWER:");
        println!("{answer}");
    }
    println!("{rule}");
}
