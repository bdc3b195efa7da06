//! HTTP transport
//!
//! The download loop talks to the network through the [`Transport`] trait so
//! the retry policy can be exercised without real TLS endpoints. The
//! production implementation wraps two reqwest clients: one that validates
//! certificates (used by default) and one that does not (used only for the
//! explicitly downgraded final attempt).

use crate::config::FetcherConfig;
use crate::fetcher::FetchError;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use std::time::Duration;

/// Opens a streaming GET request
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends the request and returns the response body once a 2xx status
    /// has been received
    ///
    /// # Arguments
    ///
    /// * `url` - The resource to fetch
    /// * `verify_certificates` - Whether TLS certificates must validate
    async fn open(
        &self,
        url: &str,
        verify_certificates: bool,
    ) -> Result<Box<dyn ResponseBody>, FetchError>;
}

/// A response body read in bounded chunks
#[async_trait]
pub trait ResponseBody: Send {
    /// Declared Content-Type, if any
    fn content_type(&self) -> Option<&str>;

    /// Next chunk of the body, `None` once the body is exhausted
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, FetchError>;
}

/// Builds an HTTP client with the configured user agent and connect timeout
///
/// No total request timeout is set: a large body that keeps arriving may take
/// as long as it needs. Idle reads are bounded by [`ReqwestTransport`].
///
/// # Arguments
///
/// * `config` - The fetcher configuration
/// * `verify_certificates` - When false, invalid TLS certificates are accepted
pub fn build_http_client(
    config: &FetcherConfig,
    verify_certificates: bool,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .connect_timeout(config.timeout())
        .danger_accept_invalid_certs(!verify_certificates)
        .gzip(true)
        .brotli(true)
        .build()
}

/// reqwest-backed transport
///
/// Waiting for the response head and waiting for each body chunk are each
/// bounded by the configured timeout.
pub struct ReqwestTransport {
    verified: Client,
    unverified: Client,
    read_timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(config: &FetcherConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            verified: build_http_client(config, true)?,
            unverified: build_http_client(config, false)?,
            read_timeout: config.timeout(),
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn open(
        &self,
        url: &str,
        verify_certificates: bool,
    ) -> Result<Box<dyn ResponseBody>, FetchError> {
        let client = if verify_certificates {
            &self.verified
        } else {
            &self.unverified
        };

        let response = tokio::time::timeout(self.read_timeout, client.get(url).send())
            .await
            .map_err(|_| timed_out(self.read_timeout))?
            .map_err(classify_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        Ok(Box::new(ReqwestBody {
            response,
            content_type,
            read_timeout: self.read_timeout,
        }))
    }
}

struct ReqwestBody {
    response: Response,
    content_type: Option<String>,
    read_timeout: Duration,
}

#[async_trait]
impl ResponseBody for ReqwestBody {
    fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, FetchError> {
        let chunk = tokio::time::timeout(self.read_timeout, self.response.chunk())
            .await
            .map_err(|_| timed_out(self.read_timeout))?
            .map_err(classify_error)?;
        Ok(chunk.map(|bytes| bytes.to_vec()))
    }
}

fn timed_out(limit: Duration) -> FetchError {
    FetchError::Transport(format!("Request timeout: no data for {:?}", limit))
}

/// Maps a reqwest error onto the fetch error taxonomy
///
/// Certificate failures are told apart from other transport failures because
/// they are the only ones that can trigger the verification downgrade.
pub fn classify_error(error: reqwest::Error) -> FetchError {
    if is_certificate_error(&error) {
        FetchError::Certificate(error_chain(&error))
    } else if error.is_timeout() {
        FetchError::Transport(format!("Request timeout: {}", error_chain(&error)))
    } else if error.is_connect() {
        FetchError::Transport(format!("Connection failed: {}", error_chain(&error)))
    } else {
        FetchError::Transport(error_chain(&error))
    }
}

/// Walks the source chain looking for a TLS certificate validation failure
fn is_certificate_error(error: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(err) = current {
        let message = err.to_string().to_lowercase();
        if message.contains("certificate") || message.contains("unknownissuer") {
            return true;
        }
        current = err.source();
    }
    false
}

/// Joins an error and its sources into one line
fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut parts = vec![error.to_string()];
    let mut current = error.source();
    while let Some(err) = current {
        parts.push(err.to_string());
        current = err.source();
    }
    parts.join(": ")
}
