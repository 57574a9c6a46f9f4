//! HTTP transport for the merging fetcher.

use crate::config::FetchSettings;
use crate::ports::FetchError;
use bytes::Bytes;
use std::future::Future;
use tracing::{debug, trace, warn};

/// A single, unmerged byte transfer.
///
/// [`MergingFetcher`](super::MergingFetcher) calls this once per distinct
/// in-flight key; implementations do not need to deduplicate.
pub trait Transport: Send + Sync + 'static {
    /// Downloads the resource identified by `key`.
    fn get(&self, key: &str) -> impl Future<Output = Result<Bytes, FetchError>> + Send;
}

/// Transport over `reqwest`, treating keys as URLs.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Builds a client from fetch settings.
    pub fn new(settings: &FetchSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .user_agent(settings.user_agent.as_str())
            .pool_max_idle_per_host(settings.max_idle_per_host)
            .build()
            .map_err(|e| FetchError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Wraps an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for HttpTransport {
    async fn get(&self, key: &str) -> Result<Bytes, FetchError> {
        trace!(url = key, "HTTP GET request starting");

        let response = match self.client.get(key).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(
                    url = key,
                    error = %e,
                    is_connect = e.is_connect(),
                    is_timeout = e.is_timeout(),
                    "HTTP request failed"
                );
                return Err(FetchError::Transport(e.to_string()));
            }
        };

        let status = response.status();
        if !status.is_success() {
            debug!(url = key, status = status.as_u16(), "HTTP error status");
            return Err(FetchError::Status {
                key: key.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(format!("failed to read response: {}", e)))?;

        debug!(url = key, bytes = body.len(), "HTTP response received");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_new_from_default_settings() {
        assert!(HttpTransport::new(&FetchSettings::default()).is_ok());
    }

    #[tokio::test]
    async fn test_invalid_url_is_transport_error() {
        let settings = FetchSettings::default().with_timeout(Duration::from_secs(1));
        let transport = HttpTransport::new(&settings).unwrap();

        let err = transport.get("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
    }
}
