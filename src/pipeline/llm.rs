//! LLM interaction: resolve the provider and run one prompt with retry.
//!
//! All prompt wording lives in [`crate::prompts`]; this module only owns the
//! call itself, the retry loop and the per-call timeout.
//!
//! ## Retry Strategy
//!
//! Local models behind Ollama drop connections while loading weights and
//! hosted APIs answer 429 under load. Each attempt runs under
//! `api_timeout_secs`; failed attempts are retried with exponential backoff
//! (`retry_backoff_ms * 2^(attempt-1)`). With the defaults (1 s base, 4
//! retries) the waits are 1 s → 2 s → 4 s → 8 s.
//!
//! A task that exhausts its retries does not abort the pipeline: the caller
//! gets an empty answer plus a [`TaskError`].

use crate::config::{PipelineConfig, DEFAULT_MODEL, DEFAULT_PROVIDER};
use crate::error::{Grobid2MdError, TaskError};
use crate::pipeline::postprocess::clean_response;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, warn};

/// Result of one LLM task. Never an `Err`: failures land in `error`.
#[derive(Debug, Clone, Default)]
pub struct TaskOutcome {
    pub task: String,
    /// Cleaned answer; empty when the task failed.
    pub content: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub duration_ms: u64,
    pub error: Option<TaskError>,
}

/// Approximate token count (~3.5 characters per token).
///
/// Local models do not expose their tokenizer, and the estimate is only used
/// for logging and the node-summary threshold.
pub fn count_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    let chars = text.chars().count() as f64;
    ((chars / 3.5) as usize).max(1)
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, Grobid2MdError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Grobid2MdError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. `config.provider`, used as-is.
/// 2. `config.provider_name` with `config.model` (default `granite4`).
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set.
/// 4. A local Ollama server running `granite4` (or `config.model`).
pub fn resolve_provider(config: &PipelineConfig) -> Result<Arc<dyn LLMProvider>, Grobid2MdError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = config.provider_name {
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            let model = config.model.as_deref().unwrap_or(&env_model);
            return create_provider(&prov, model);
        }
    }

    create_provider(DEFAULT_PROVIDER, model).map_err(|e| match e {
        Grobid2MdError::ProviderNotConfigured { provider, hint } => {
            Grobid2MdError::ProviderNotConfigured {
                provider,
                hint: format!(
                    "{hint}\nStart Ollama and pull the model: ollama pull {model}\n\
Or choose another provider with --provider / EDGEQUAKE_LLM_PROVIDER."
                ),
            }
        }
        other => other,
    })
}

/// Build `CompletionOptions` from the pipeline config.
pub fn build_options(config: &PipelineConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: config.max_tokens,
        ..Default::default()
    }
}

/// Run `op` until it succeeds, at most `max_retries + 1` times.
///
/// Each attempt is bounded by `timeout`. The error of the last attempt is
/// returned when every attempt fails.
pub async fn retry_with_backoff<T, F, Fut>(
    task: &str,
    max_retries: u32,
    backoff_ms: u64,
    timeout: Duration,
    mut op: F,
) -> Result<(T, u32), TaskError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, String>>,
{
    let mut last_err: Option<TaskError> = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let backoff = backoff_ms.saturating_mul(1u64 << (attempt - 1).min(20));
            warn!(
                "{}: retry {}/{} after {}ms",
                task, attempt, max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match tokio::time::timeout(timeout, op()).await {
            Ok(Ok(value)) => return Ok((value, attempt)),
            Ok(Err(detail)) => {
                warn!("{}: attempt {} failed: {}", task, attempt + 1, detail);
                last_err = Some(TaskError::LlmFailed {
                    task: task.to_string(),
                    retries: max_retries,
                    detail,
                });
            }
            Err(_) => {
                warn!(
                    "{}: attempt {} timed out after {:?}",
                    task,
                    attempt + 1,
                    timeout
                );
                last_err = Some(TaskError::Timeout {
                    task: task.to_string(),
                    secs: timeout.as_secs(),
                });
            }
        }
    }

    Err(last_err.unwrap_or_else(|| TaskError::LlmFailed {
        task: task.to_string(),
        retries: max_retries,
        detail: "Unknown error".to_string(),
    }))
}

/// Send `prompt` as a single user message and return the cleaned answer.
pub async fn chat(
    provider: &Arc<dyn LLMProvider>,
    task: &str,
    prompt: &str,
    config: &PipelineConfig,
) -> TaskOutcome {
    let start = Instant::now();
    let messages = vec![ChatMessage::user(prompt)];
    let options = build_options(config);
    let (messages, options) = (&messages, &options);

    let result = retry_with_backoff(
        task,
        config.max_retries,
        config.retry_backoff_ms,
        Duration::from_secs(config.api_timeout_secs),
        || async move {
            provider
                .chat(messages, Some(options))
                .await
                .map_err(|e| format!("{e}"))
        },
    )
    .await;

    let duration_ms = start.elapsed().as_millis() as u64;
    match result {
        Ok((response, retries)) => {
            debug!(
                "{}: {} input tokens, {} output tokens, {} retries, {}ms",
                task, response.prompt_tokens, response.completion_tokens, retries, duration_ms
            );
            TaskOutcome {
                task: task.to_string(),
                content: clean_response(&response.content),
                input_tokens: response.prompt_tokens as u64,
                output_tokens: response.completion_tokens as u64,
                duration_ms,
                error: None,
            }
        }
        Err(err) => TaskOutcome {
            task: task.to_string(),
            duration_ms,
            error: Some(err),
            ..Default::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn count_tokens_estimate() {
        assert_eq!(count_tokens(""), 0);
        assert_eq!(count_tokens("a"), 1);
        assert_eq!(count_tokens("abcdefg"), 2);
        assert_eq!(count_tokens(&"x".repeat(350)), 100);
        // characters, not bytes
        assert_eq!(count_tokens("ééééééé"), 2);
    }

    #[test]
    fn build_options_defaults() {
        let opts = build_options(&PipelineConfig::default());
        assert_eq!(opts.temperature, Some(0.0));
        assert_eq!(opts.max_tokens, None);
    }

    #[tokio::test]
    async fn retry_succeeds_after_failures() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff("summary", 4, 0, Duration::from_secs(5), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(format!("attempt {n} refused"))
                } else {
                    Ok("answer")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), ("answer", 2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_exhaustion_keeps_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<((), u32), TaskError> =
            retry_with_backoff("citations", 2, 0, Duration::from_secs(5), || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(format!("failure {n}")) }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result.unwrap_err() {
            TaskError::LlmFailed {
                task,
                retries,
                detail,
            } => {
                assert_eq!(task, "citations");
                assert_eq!(retries, 2);
                assert_eq!(detail, "failure 2");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_attempt_becomes_timeout() {
        let result: Result<((), u32), TaskError> =
            retry_with_backoff("query", 0, 0, Duration::from_millis(10), || async {
                sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(
            result,
            Err(TaskError::Timeout { ref task, .. }) if task == "query"
        ));
    }
}
