use crate::error::{PluginError, PluginResult};
use reqwest::header::USER_AGENT;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_USER_AGENT: &str = concat!("product-lookup/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Run `fut`, giving up as soon as `cancel` fires.
pub async fn cancellable<F, T>(cancel: &CancellationToken, fut: F) -> PluginResult<T>
where
    F: Future<Output = PluginResult<T>>,
{
    tokio::select! {
        _ = cancel.cancelled() => Err(PluginError::Cancelled),
        result = fut => result,
    }
}

/// JSON over HTTP GET with a per-plugin user agent and timeout.
#[derive(Clone)]
pub struct JsonHttpClient {
    client: reqwest::Client,
    user_agent: String,
    timeout_secs: u64,
    headers: Vec<(String, String)>,
}

impl Default for JsonHttpClient {
    fn default() -> Self {
        Self::new(DEFAULT_USER_AGENT, DEFAULT_TIMEOUT_SECS)
    }
}

impl JsonHttpClient {
    pub fn new(user_agent: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            user_agent: user_agent.into(),
            timeout_secs,
            headers: Vec::new(),
        }
    }

    /// Send `name: value` with every request (API keys and the like).
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// GET `url` and decode the JSON body. A 404 is `Ok(None)`; any other
    /// non-2xx status is an API error.
    pub async fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
        cancel: &CancellationToken,
    ) -> PluginResult<Option<serde_json::Value>> {
        tracing::debug!("HTTP GET request to: {}", url);
        let fetch = async {
            let mut request = self
                .client
                .get(url)
                .query(query)
                .header(USER_AGENT, &self.user_agent)
                .timeout(Duration::from_secs(self.timeout_secs));
            for (name, value) in &self.headers {
                request = request.header(name.as_str(), value.as_str());
            }
            let resp = request
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        PluginError::Timeout(self.timeout_secs)
                    } else {
                        PluginError::Http(e)
                    }
                })?;
            let status = resp.status().as_u16();
            let bytes = resp.bytes().await?;
            tracing::debug!("HTTP response: status={}, size={} bytes", status, bytes.len());

            if status == 404 {
                return Ok(None);
            }
            if !(200..300).contains(&status) {
                return Err(PluginError::Api {
                    message: format!("{} returned HTTP {}", url, status),
                });
            }
            let body: serde_json::Value = serde_json::from_slice(&bytes)?;
            Ok(Some(body))
        };
        cancellable(cancel, fetch).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancellable_returns_cancelled_when_token_fires() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: PluginResult<()> = cancellable(&cancel, std::future::pending()).await;
        assert!(matches!(result, Err(PluginError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancellable_passes_through_result() {
        let cancel = CancellationToken::new();
        let result = cancellable(&cancel, async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
