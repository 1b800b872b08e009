use async_trait::async_trait;
use reqwest::Client;
use std::{fmt::Debug, sync::OnceLock, time::Duration};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request could not be sent")]
    Request(#[source] reqwest::Error),

    #[error("Failed to read response body")]
    Body(#[source] reqwest::Error),

    #[error("Request failed with status {status}: {body}")]
    Status { status: u16, body: String },
}

/// One GET, returning the response body.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    async fn get(&self, address: &str) -> Result<String, TransportError>;
}

/// HTTP client built on first use, so commands that never reach the
/// network do not pay for it.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    timeout: Duration,
    http: OnceLock<Client>,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            http: OnceLock::new(),
        }
    }

    fn client(&self) -> Result<&Client, TransportError> {
        if let Some(http) = self.http.get() {
            return Ok(http);
        }

        let http = Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("weatho/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(TransportError::Request)?;

        Ok(self.http.get_or_init(|| http))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, address: &str) -> Result<String, TransportError> {
        // reqwest errors embed the URL, which carries the credential
        let res = self
            .client()?
            .get(address)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.without_url()))?;

        let status = res.status();
        let body = res.text().await.map_err(|e| TransportError::Body(e.without_url()))?;

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        Ok(body)
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let cut = (0..=MAX).rev().find(|&i| body.is_char_boundary(i)).unwrap_or(0);
        format!("{}...", &body[..cut])
    } else {
        body.to_string()
    }
}
