//! Configuration for the GROBID → Markdown → index → LLM pipeline.
//!
//! Every knob lives in [`PipelineConfig`], built via its
//! [`PipelineConfigBuilder`]. The offline path ([`crate::convert::convert_tei`])
//! needs no configuration at all; everything here concerns the external
//! services (GROBID and the LLM provider).

use crate::error::Grobid2MdError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Default GROBID service URL.
pub const DEFAULT_GROBID_URL: &str = "http://localhost:8070";

/// Default LLM provider when nothing else is configured.
pub const DEFAULT_PROVIDER: &str = "ollama";

/// Default model for [`DEFAULT_PROVIDER`].
pub const DEFAULT_MODEL: &str = "granite4";

/// Configuration for a pipeline run.
///
/// Built via [`PipelineConfig::builder()`] or using
/// [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use grobid2md::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .grobid_url("http://grobid.internal:8070")
///     .model("granite4")
///     .query("What is the main contribution?")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Base URL of the GROBID service. Default: `http://localhost:8070`.
    pub grobid_url: String,

    /// Timeout for the full-text request in seconds. Default: 120.
    ///
    /// GROBID parses a 15-page paper in a few seconds but queues requests
    /// under load; a generous timeout avoids spurious failures on busy servers.
    pub grobid_timeout_secs: u64,

    /// Timeout for the `/api/isalive` health check in seconds. Default: 5.
    pub alive_timeout_secs: u64,

    /// Ask GROBID to consolidate header metadata against CrossRef. Default: true.
    pub consolidate_header: bool,

    /// Ask GROBID to consolidate bibliography entries. Default: true.
    pub consolidate_citations: bool,

    /// Keep the raw citation strings in the TEI. Default: true.
    pub include_raw_citations: bool,

    /// Sentence segmentation in the TEI body. Default: false.
    pub segment_sentences: bool,

    /// Value of GROBID's `teiCoordinates` form field. Default: `Some("ref")`.
    pub tei_coordinates: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// LLM model identifier. If None, uses `granite4`.
    pub model: Option<String>,

    /// LLM provider name (e.g. "ollama", "openai").
    /// If None along with `provider`, see [`crate::pipeline::llm::resolve_provider`].
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens per LLM answer. Default: None (provider default).
    pub max_tokens: Option<usize>,

    /// Retries after the first failed LLM attempt. Default: 4 (five attempts).
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled after each attempt. Default: 1000.
    pub retry_backoff_ms: u64,

    /// Per-LLM-call timeout in seconds. Default: 120.
    ///
    /// Local models on CPU can take a minute for a long prompt.
    pub api_timeout_secs: u64,

    /// Generate per-node summaries while indexing. Default: false.
    pub add_node_summary: bool,

    /// Nodes shorter than this many tokens use their own text as summary. Default: 200.
    pub summary_token_threshold: usize,

    /// Concurrent LLM calls while summarising index nodes. Default: 4.
    pub concurrency: usize,

    /// Optional question to answer about the paper.
    pub query: Option<String>,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            grobid_url: DEFAULT_GROBID_URL.to_string(),
            grobid_timeout_secs: 120,
            alive_timeout_secs: 5,
            consolidate_header: true,
            consolidate_citations: true,
            include_raw_citations: true,
            segment_sentences: false,
            tei_coordinates: Some("ref".to_string()),
            download_timeout_secs: 120,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: None,
            max_retries: 4,
            retry_backoff_ms: 1000,
            api_timeout_secs: 120,
            add_node_summary: false,
            summary_token_threshold: 200,
            concurrency: 4,
            query: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("grobid_url", &self.grobid_url)
            .field("grobid_timeout_secs", &self.grobid_timeout_secs)
            .field("consolidate_header", &self.consolidate_header)
            .field("consolidate_citations", &self.consolidate_citations)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_retries", &self.max_retries)
            .field("add_node_summary", &self.add_node_summary)
            .field("concurrency", &self.concurrency)
            .field("query", &self.query)
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// GROBID base URL without a trailing slash.
    pub fn grobid_base(&self) -> &str {
        self.grobid_url.trim_end_matches('/')
    }
}

/// Builder for [`PipelineConfig`].
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl fmt::Debug for PipelineConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl PipelineConfigBuilder {
    pub fn grobid_url(mut self, url: impl Into<String>) -> Self {
        self.config.grobid_url = url.into();
        self
    }

    pub fn grobid_timeout_secs(mut self, secs: u64) -> Self {
        self.config.grobid_timeout_secs = secs.max(1);
        self
    }

    pub fn alive_timeout_secs(mut self, secs: u64) -> Self {
        self.config.alive_timeout_secs = secs.max(1);
        self
    }

    pub fn consolidate_header(mut self, v: bool) -> Self {
        self.config.consolidate_header = v;
        self
    }

    pub fn consolidate_citations(mut self, v: bool) -> Self {
        self.config.consolidate_citations = v;
        self
    }

    pub fn include_raw_citations(mut self, v: bool) -> Self {
        self.config.include_raw_citations = v;
        self
    }

    pub fn segment_sentences(mut self, v: bool) -> Self {
        self.config.segment_sentences = v;
        self
    }

    pub fn tei_coordinates(mut self, coords: Option<String>) -> Self {
        self.config.tei_coordinates = coords;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = Some(n);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn add_node_summary(mut self, v: bool) -> Self {
        self.config.add_node_summary = v;
        self
    }

    pub fn summary_token_threshold(mut self, tokens: usize) -> Self {
        self.config.summary_token_threshold = tokens;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.config.query = Some(query.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, Grobid2MdError> {
        let c = &self.config;
        let url = c.grobid_url.trim();
        if url.is_empty() {
            return Err(Grobid2MdError::InvalidConfig(
                "GROBID URL must not be empty".into(),
            ));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Grobid2MdError::InvalidConfig(format!(
                "GROBID URL must start with http:// or https://, got '{}'",
                url
            )));
        }
        if c.concurrency == 0 {
            return Err(Grobid2MdError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}
