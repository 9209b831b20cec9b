//! reqwest-backed transport

use async_trait::async_trait;
use futures_util::TryStreamExt;
use std::time::Duration;
use tokio_util::io::StreamReader;

use crate::range::ByteRange;
use crate::{ByteRangeTransport, Result, TransportError, TransportResponse};

#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    pub connect_timeout: Duration,
    /// Applies to each read of the body, not the whole transfer
    pub read_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(60),
            user_agent: concat!("ferry/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &HttpTransportConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ByteRangeTransport for HttpTransport {
    async fn get(&self, url: &str, range: Option<ByteRange>) -> Result<TransportResponse> {
        let parsed = url::Url::parse(url).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;

        let mut req = self.client.get(parsed);
        if let Some(range) = range {
            req = req.header(reqwest::header::RANGE, range.header_value());
        }

        let response = req.send().await?;
        let status = response.status();

        let content_length = response.content_length();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        tracing::debug!(
            url = %url,
            status = status.as_u16(),
            content_length = ?content_length,
            "HTTP response"
        );

        let stream = response.bytes_stream().map_err(std::io::Error::other);
        let body = StreamReader::new(Box::pin(stream));

        Ok(TransportResponse {
            status: status.as_u16(),
            content_length,
            content_type,
            body: Box::new(body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_timeouts() {
        let config = HttpTransportConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.read_timeout, Duration::from_secs(60));
        assert!(config.user_agent.starts_with("ferry/"));
    }

    #[tokio::test]
    async fn test_invalid_url_rejected_before_request() {
        let transport = HttpTransport::new(&HttpTransportConfig::default()).unwrap();
        let err = transport.get("not a url", None).await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidUrl(_)));
        assert!(!err.is_network_or_io());
    }
}
