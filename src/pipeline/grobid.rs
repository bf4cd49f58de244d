//! GROBID HTTP client.
//!
//! Two endpoints are used:
//!
//! | Endpoint | Method | Purpose |
//! |----------|--------|---------|
//! | `/api/isalive` | GET | health check, 200 when ready |
//! | `/api/processFulltextDocument` | POST multipart | PDF in, TEI XML out |
//!
//! A local server is started with
//! `docker run --rm -p 8070:8070 lfoppiano/grobid:0.8.1`.

use crate::config::PipelineConfig;
use crate::error::Grobid2MdError;
use crate::pipeline::input::PdfSource;
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const ISALIVE_ENDPOINT: &str = "/api/isalive";
pub const PROCESS_FULLTEXT_ENDPOINT: &str = "/api/processFulltextDocument";

/// Characters of an error body kept in [`Grobid2MdError::GrobidStatus`].
const MAX_ERROR_BODY_CHARS: usize = 500;

fn flag(v: bool) -> String {
    if v { "1" } else { "0" }.to_string()
}

/// Text form fields sent alongside the PDF.
pub fn form_fields(config: &PipelineConfig) -> Vec<(&'static str, String)> {
    let mut fields = vec![
        ("consolidateHeader", flag(config.consolidate_header)),
        ("consolidateCitations", flag(config.consolidate_citations)),
        ("includeRawCitations", flag(config.include_raw_citations)),
        ("segmentSentences", flag(config.segment_sentences)),
    ];
    if let Some(ref coords) = config.tei_coordinates {
        fields.push(("teiCoordinates", coords.clone()));
    }
    fields
}

/// `true` when GROBID answers its health check with 200 within
/// `alive_timeout_secs`. Connection and timeout errors count as "not alive".
pub async fn is_alive(config: &PipelineConfig) -> bool {
    let url = format!("{}{}", config.grobid_base(), ISALIVE_ENDPOINT);
    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(config.alive_timeout_secs))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            warn!("Cannot build HTTP client for GROBID health check: {}", e);
            return false;
        }
    };

    match client.get(&url).send().await {
        Ok(resp) => {
            debug!("GROBID health check {} → {}", url, resp.status());
            resp.status() == reqwest::StatusCode::OK
        }
        Err(e) => {
            debug!("GROBID health check {} failed: {}", url, e);
            false
        }
    }
}

/// Send `pdf` to GROBID and return the TEI XML.
pub async fn process_pdf(pdf: &PdfSource, config: &PipelineConfig) -> Result<String, Grobid2MdError> {
    let url = format!("{}{}", config.grobid_base(), PROCESS_FULLTEXT_ENDPOINT);
    let secs = config.grobid_timeout_secs;

    let request_failed = |reason: String| Grobid2MdError::GrobidRequestFailed {
        url: url.clone(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(secs))
        .build()
        .map_err(|e| request_failed(e.to_string()))?;

    let part = Part::bytes(pdf.bytes.clone())
        .file_name(pdf.file_name.clone())
        .mime_str("application/pdf")
        .map_err(|e| request_failed(e.to_string()))?;
    let form = form_fields(config)
        .into_iter()
        .fold(Form::new().part("input", part), |form, (name, value)| {
            form.text(name, value)
        });

    info!(
        "Sending {} ({} bytes) to GROBID at {}",
        pdf.file_name,
        pdf.bytes.len(),
        url
    );

    let response = client.post(&url).multipart(form).send().await.map_err(|e| {
        if e.is_timeout() {
            Grobid2MdError::GrobidTimeout {
                url: url.clone(),
                secs,
            }
        } else {
            request_failed(e.to_string())
        }
    })?;

    let status = response.status();
    let body = response.text().await.map_err(|e| {
        if e.is_timeout() {
            Grobid2MdError::GrobidTimeout {
                url: url.clone(),
                secs,
            }
        } else {
            request_failed(e.to_string())
        }
    })?;

    if status != reqwest::StatusCode::OK {
        return Err(Grobid2MdError::GrobidStatus {
            status: status.as_u16(),
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        });
    }

    debug!("GROBID returned {} bytes of TEI", body.len());
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_form_fields() {
        let fields = form_fields(&PipelineConfig::default());
        assert_eq!(
            fields,
            vec![
                ("consolidateHeader", "1".to_string()),
                ("consolidateCitations", "1".to_string()),
                ("includeRawCitations", "1".to_string()),
                ("segmentSentences", "0".to_string()),
                ("teiCoordinates", "ref".to_string()),
            ]
        );
    }

    #[test]
    fn coordinates_field_omitted_when_unset() {
        let config = PipelineConfig::builder()
            .tei_coordinates(None)
            .consolidate_citations(false)
            .build()
            .unwrap();
        let fields = form_fields(&config);
        assert_eq!(fields.len(), 4);
        assert!(fields.contains(&("consolidateCitations", "0".to_string())));
        assert!(!fields.iter().any(|(k, _)| *k == "teiCoordinates"));
    }

    #[tokio::test]
    async fn unreachable_server_is_not_alive() {
        // Port 9 (discard) is closed on test machines; connection is refused.
        let config = PipelineConfig::builder()
            .grobid_url("http://127.0.0.1:9")
            .alive_timeout_secs(1)
            .build()
            .unwrap();
        assert!(!is_alive(&config).await);
    }
}
