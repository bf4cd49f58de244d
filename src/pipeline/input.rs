//! Input resolution: load a user-supplied PDF path or URL into memory.
//!
//! GROBID takes the PDF as a multipart upload, so there is no need for a
//! file on disk: local files are read and URLs downloaded straight into a
//! [`PdfSource`]. The `%PDF` magic bytes are checked up front so a wrong
//! file fails here with [`Grobid2MdError::NotAPdf`] rather than as an opaque
//! GROBID 500.

use crate::error::Grobid2MdError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// A PDF held in memory, ready to upload.
#[derive(Debug, Clone)]
pub struct PdfSource {
    /// File name sent to GROBID and used for the default output directory.
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl PdfSource {
    /// File name without its extension (`attention.pdf` → `attention`).
    pub fn stem(&self) -> String {
        Path::new(&self.file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "document".to_string())
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve a local path or HTTP(S) URL to an in-memory PDF.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<PdfSource, Grobid2MdError> {
    if input.trim().is_empty() {
        return Err(Grobid2MdError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

fn check_magic(bytes: &[u8], path: PathBuf) -> Result<(), Grobid2MdError> {
    if bytes.len() >= 4 && &bytes[..4] != PDF_MAGIC {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[..4]);
        return Err(Grobid2MdError::NotAPdf { path, magic });
    }
    Ok(())
}

async fn read_local(path_str: &str) -> Result<PdfSource, Grobid2MdError> {
    let path = PathBuf::from(path_str);

    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(e) => {
            return Err(match e.kind() {
                std::io::ErrorKind::NotFound => Grobid2MdError::FileNotFound { path },
                std::io::ErrorKind::PermissionDenied => Grobid2MdError::PermissionDenied { path },
                _ => Grobid2MdError::ReadFailed { path, source: e },
            });
        }
    };

    check_magic(&bytes, path.clone())?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_string());

    debug!("Read local PDF: {} ({} bytes)", path.display(), bytes.len());
    Ok(PdfSource { file_name, bytes })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<PdfSource, Grobid2MdError> {
    info!("Downloading PDF from: {}", url);

    let parsed = reqwest::Url::parse(url).map_err(|_| Grobid2MdError::InvalidInput {
        input: url.to_string(),
    })?;

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Grobid2MdError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let to_download_error = |e: reqwest::Error| {
        if e.is_timeout() {
            Grobid2MdError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Grobid2MdError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client
        .get(parsed.clone())
        .send()
        .await
        .map_err(to_download_error)?;

    if !response.status().is_success() {
        return Err(Grobid2MdError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(to_download_error)?.to_vec();
    let file_name = filename_from_url(&parsed);
    check_magic(&bytes, PathBuf::from(&file_name))?;

    info!("Downloaded {} ({} bytes)", file_name, bytes.len());
    Ok(PdfSource { file_name, bytes })
}

/// Last path segment of the URL when it looks like a file name, else
/// `downloaded.pdf`. arXiv-style `/pdf/1706.03762` gets a `.pdf` suffix.
fn filename_from_url(url: &reqwest::Url) -> String {
    let last = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");
    if last.is_empty() {
        "downloaded.pdf".to_string()
    } else if last.to_ascii_lowercase().ends_with(".pdf") {
        last.to_string()
    } else {
        format!("{last}.pdf")
    }
}
