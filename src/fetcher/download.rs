//! Download loop with bounded retries and the certificate-verification fallback

use crate::config::FetcherConfig;
use crate::fetcher::transport::Transport;
use crate::fetcher::FetchError;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Retry behavior for a single download
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    /// Total attempts, including the final one
    pub max_attempts: u32,

    /// Fixed delay between attempts
    pub retry_delay: Duration,

    /// Allow the final attempt to skip certificate validation when the
    /// previous attempt failed certificate validation
    pub certificate_fallback: bool,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(2),
            certificate_fallback: true,
        }
    }
}

impl FetchPolicy {
    pub fn from_config(config: &FetcherConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            retry_delay: config.retry_delay(),
            certificate_fallback: config.certificate_fallback,
        }
    }
}

/// Outcome of a successful download
#[derive(Debug, Clone)]
pub struct FetchReport {
    /// Attempts used, including the successful one
    pub attempts: u32,

    pub bytes_written: u64,

    pub content_type: Option<String>,

    /// False when the successful attempt ran without certificate validation
    pub verified: bool,
}

/// A download that exhausted its attempts or hit a non-retryable error
#[derive(Debug, Error)]
#[error("{error} (after {attempts} attempt(s))")]
pub struct FetchFailure {
    pub attempts: u32,
    #[source]
    pub error: FetchError,
}

/// Downloads `url` to `destination`
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | Certificate error before the final attempt | Wait, retry verified |
/// | Final attempt right after a certificate error | Retry once unverified (if enabled) |
/// | Final attempt for a trusted domain | Run unverified |
/// | Timeout, reset, non-2xx, broken body | Wait, retry verified |
/// | Local write failure | Fail immediately |
///
/// The body is streamed to `<destination>.part` and renamed into place only
/// after the last chunk is written, so a failed download never leaves a
/// partial file at `destination`.
///
/// # Arguments
///
/// * `transport` - Transport used for every attempt
/// * `url` - Source URL
/// * `destination` - Final path of the file (created or overwritten)
/// * `policy` - Attempt budget, delay, and fallback switch
/// * `trusted_override` - The URL's domain is explicitly trusted to downgrade
pub async fn fetch_to_path(
    transport: &dyn Transport,
    url: &str,
    destination: &Path,
    policy: &FetchPolicy,
    trusted_override: bool,
) -> Result<FetchReport, FetchFailure> {
    let partial = partial_path(destination);
    let mut last_error: Option<FetchError> = None;

    for attempt in 1..=policy.max_attempts {
        let is_final = attempt == policy.max_attempts;
        let previous_was_certificate = last_error
            .as_ref()
            .map(FetchError::is_certificate)
            .unwrap_or(false);
        let verify = !(is_final
            && (trusted_override || (policy.certificate_fallback && previous_was_certificate)));

        if !verify {
            tracing::warn!(
                "Disabling certificate verification for final attempt {}/{} of {}",
                attempt,
                policy.max_attempts,
                url
            );
        }

        match stream_to_file(transport, url, &partial, verify).await {
            Ok((bytes_written, content_type)) => {
                if let Err(e) = tokio::fs::rename(&partial, destination).await {
                    discard_partial(&partial).await;
                    return Err(FetchFailure {
                        attempts: attempt,
                        error: FetchError::Write {
                            path: destination.display().to_string(),
                            source: e,
                        },
                    });
                }

                if !is_pdf_content_type(content_type.as_deref()) {
                    tracing::warn!(
                        "Content-Type for {} is {:?}, expected a PDF",
                        url,
                        content_type.as_deref().unwrap_or("<missing>")
                    );
                }

                tracing::debug!(
                    "Downloaded {} ({} bytes) on attempt {}",
                    url,
                    bytes_written,
                    attempt
                );

                return Ok(FetchReport {
                    attempts: attempt,
                    bytes_written,
                    content_type,
                    verified: verify,
                });
            }
            Err(error) => {
                discard_partial(&partial).await;

                if !error.is_retryable() {
                    return Err(FetchFailure {
                        attempts: attempt,
                        error,
                    });
                }

                if is_final {
                    tracing::warn!(
                        "Attempt {}/{} failed for {}: {}",
                        attempt,
                        policy.max_attempts,
                        url,
                        error
                    );
                } else {
                    tracing::warn!(
                        "Attempt {}/{} failed for {}: {}. Retrying in {:?}",
                        attempt,
                        policy.max_attempts,
                        url,
                        error,
                        policy.retry_delay
                    );
                    tokio::time::sleep(policy.retry_delay).await;
                }

                last_error = Some(error);
            }
        }
    }

    Err(FetchFailure {
        attempts: policy.max_attempts,
        error: last_error
            .unwrap_or_else(|| FetchError::Transport("no download attempts allowed".to_string())),
    })
}

/// One attempt: open the response and copy it chunk by chunk into `partial`
async fn stream_to_file(
    transport: &dyn Transport,
    url: &str,
    partial: &Path,
    verify: bool,
) -> Result<(u64, Option<String>), FetchError> {
    let mut body = transport.open(url, verify).await?;
    let content_type = body.content_type().map(|s| s.to_string());

    let write_error = |e: std::io::Error| FetchError::Write {
        path: partial.display().to_string(),
        source: e,
    };

    let mut file = tokio::fs::File::create(partial).await.map_err(write_error)?;
    let mut bytes_written = 0u64;

    while let Some(chunk) = body.next_chunk().await? {
        file.write_all(&chunk).await.map_err(write_error)?;
        bytes_written += chunk.len() as u64;
    }

    file.flush().await.map_err(write_error)?;
    file.sync_all().await.map_err(write_error)?;

    Ok((bytes_written, content_type))
}

/// Path of the in-progress download for `destination`
pub fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}

async fn discard_partial(partial: &Path) {
    match tokio::fs::remove_file(partial).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove {}: {}", partial.display(), e),
    }
}

/// Returns true if a declared Content-Type plausibly carries a PDF
pub fn is_pdf_content_type(content_type: Option<&str>) -> bool {
    match content_type {
        Some(value) => {
            let value = value.to_lowercase();
            value.contains("pdf") || value.contains("octet-stream")
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::transport::scripted::{ScriptedTransport, Step};
    use tempfile::tempdir;

    fn fast_policy() -> FetchPolicy {
        FetchPolicy {
            max_attempts: 3,
            retry_delay: Duration::ZERO,
            certificate_fallback: true,
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("pdf01.pdf");
        let transport = ScriptedTransport::new(vec![Step::pdf(b"%PDF-1.5 body")]);

        let report = fetch_to_path(&transport, "https://a.example/x.pdf", &dest, &fast_policy(), false)
            .await
            .unwrap();

        assert_eq!(report.attempts, 1);
        assert!(report.verified);
        assert_eq!(report.bytes_written, 13);
        assert_eq!(std::fs::read(&dest).unwrap(), b"%PDF-1.5 body");
        assert!(!partial_path(&dest).exists());
        assert_eq!(transport.calls(), vec![true]);
    }

    #[tokio::test]
    async fn test_certificate_failures_then_unverified_final_attempt() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("pdf01.pdf");
        let transport = ScriptedTransport::new(vec![
            Step::Certificate,
            Step::Certificate,
            Step::pdf(b"%PDF-1.5"),
        ]);

        let report = fetch_to_path(&transport, "https://a.example/x.pdf", &dest, &fast_policy(), false)
            .await
            .unwrap();

        assert_eq!(report.attempts, 3);
        assert!(!report.verified);
        assert!(dest.exists());
        assert_eq!(transport.calls(), vec![true, true, false]);
    }

    #[tokio::test]
    async fn test_fallback_disabled_keeps_verification() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("pdf01.pdf");
        let transport = ScriptedTransport::new(vec![Step::Certificate]);
        let policy = FetchPolicy {
            certificate_fallback: false,
            ..fast_policy()
        };

        let failure = fetch_to_path(&transport, "https://a.example/x.pdf", &dest, &policy, false)
            .await
            .unwrap_err();

        assert_eq!(failure.attempts, 3);
        assert!(failure.error.is_certificate());
        assert_eq!(transport.calls(), vec![true, true, true]);
    }

    #[tokio::test]
    async fn test_earlier_certificate_error_does_not_downgrade() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("pdf01.pdf");
        let transport = ScriptedTransport::new(vec![Step::Certificate, Step::Reset]);

        let failure = fetch_to_path(&transport, "https://a.example/x.pdf", &dest, &fast_policy(), false)
            .await
            .unwrap_err();

        assert_eq!(failure.attempts, 3);
        assert!(matches!(failure.error, FetchError::Transport(_)));
        assert_eq!(transport.calls(), vec![true, true, true]);
    }

    #[tokio::test]
    async fn test_transport_errors_do_not_downgrade() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("pdf01.pdf");
        let transport = ScriptedTransport::new(vec![Step::Reset]);

        let failure = fetch_to_path(&transport, "https://a.example/x.pdf", &dest, &fast_policy(), false)
            .await
            .unwrap_err();

        assert_eq!(failure.attempts, 3);
        assert!(matches!(failure.error, FetchError::Transport(_)));
        assert_eq!(transport.calls(), vec![true, true, true]);
        assert!(!dest.exists());
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_broken_body_leaves_no_partial_file() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("pdf01.pdf");
        let transport = ScriptedTransport::new(vec![Step::BrokenBody(b"%PDF".to_vec())]);

        let failure = fetch_to_path(&transport, "https://a.example/x.pdf", &dest, &fast_policy(), false)
            .await
            .unwrap_err();

        assert_eq!(failure.attempts, 3);
        assert!(!dest.exists());
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_non_success_status_is_retried() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("pdf01.pdf");
        let transport =
            ScriptedTransport::new(vec![Step::Status(503), Step::pdf(b"%PDF-1.5")]);

        let report = fetch_to_path(&transport, "https://a.example/x.pdf", &dest, &fast_policy(), false)
            .await
            .unwrap();

        assert_eq!(report.attempts, 2);
        assert!(report.verified);
    }

    #[tokio::test]
    async fn test_trusted_domain_downgrades_final_attempt_only() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("pdf01.pdf");
        let transport = ScriptedTransport::new(vec![
            Step::Reset,
            Step::Reset,
            Step::pdf(b"%PDF-1.5"),
        ]);

        let report = fetch_to_path(&transport, "https://ijtr.nic.in/x.pdf", &dest, &fast_policy(), true)
            .await
            .unwrap();

        assert_eq!(report.attempts, 3);
        assert!(!report.verified);
        assert_eq!(transport.calls(), vec![true, true, false]);
    }

    #[tokio::test]
    async fn test_wrong_content_type_is_not_a_failure() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("pdf01.pdf");
        let transport = ScriptedTransport::new(vec![Step::Body {
            content_type: Some("text/html".to_string()),
            chunks: vec![b"<html></html>".to_vec()],
        }]);

        let report = fetch_to_path(&transport, "https://a.example/x.pdf", &dest, &fast_policy(), false)
            .await
            .unwrap();

        assert_eq!(report.content_type.as_deref(), Some("text/html"));
        assert!(dest.exists());
    }

    #[tokio::test]
    async fn test_existing_destination_is_overwritten() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("pdf01.pdf");
        std::fs::write(&dest, b"stale content that is longer").unwrap();
        let transport = ScriptedTransport::new(vec![Step::pdf(b"fresh")]);

        fetch_to_path(&transport, "https://a.example/x.pdf", &dest, &fast_policy(), false)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"fresh");
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/tmp/downloads/pdf01.pdf")),
            PathBuf::from("/tmp/downloads/pdf01.pdf.part")
        );
    }

    #[test]
    fn test_is_pdf_content_type() {
        assert!(is_pdf_content_type(Some("application/pdf")));
        assert!(is_pdf_content_type(Some("Application/PDF; charset=binary")));
        assert!(is_pdf_content_type(Some("application/octet-stream")));
        assert!(!is_pdf_content_type(Some("text/html")));
        assert!(!is_pdf_content_type(None));
    }
}
