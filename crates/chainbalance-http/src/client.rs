//! HTTP transport backed by `reqwest`.
//!
//! The transport performs exactly one POST per call and reports whatever
//! status came back. Pacing, retry and response interpretation happen in
//! [`chainbalance_core::BalanceClient`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};

use chainbalance_core::error::ClientError;
use chainbalance_core::request::TriggerConstantContractRequest;
use chainbalance_core::transport::{BalanceTransport, RawResponse, API_KEY_HEADER};

/// Configuration for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            user_agent: concat!("chainbalance/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// `triggerconstantcontract` transport over HTTPS.
pub struct HttpTransport {
    url: String,
    http: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport for the given endpoint URL.
    pub fn new(url: impl Into<String>, config: HttpTransportConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent)
            .build()
            .map_err(|e| ClientError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            url: url.into(),
            http,
        })
    }

    /// Create with default configuration.
    pub fn default_for(url: impl Into<String>) -> Result<Self, ClientError> {
        Self::new(url, HttpTransportConfig::default())
    }
}

#[async_trait]
impl BalanceTransport for HttpTransport {
    async fn post(
        &self,
        req: &TriggerConstantContractRequest,
        api_key: Option<&str>,
    ) -> Result<RawResponse, ClientError> {
        let mut builder = self
            .http
            .post(&self.url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .json(req);
        if let Some(key) = api_key {
            builder = builder.header(API_KEY_HEADER, key);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        tracing::trace!(status, url = %self.url, "contract call completed");
        Ok(RawResponse::new(status, body))
    }

    fn url(&self) -> &str {
        &self.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn request() -> TriggerConstantContractRequest {
        TriggerConstantContractRequest {
            owner_address: "TLa2f6VPqDgRE67v1736s7bJ8Ray5wYjU7".into(),
            contract_address: "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t".into(),
            function_selector: "balanceOf(address)".into(),
            parameter: "0000000000000000000000004174472e7d35395a6b5add427eecb7f4b62ad2b0".into(),
            visible: true,
        }
    }

    /// Serve a single request with a canned status/body; hands back the raw
    /// request text.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/wallet/triggerconstantcontract", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = sock.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf);
                if let Some(end) = text.find("\r\n\r\n") {
                    let len = text[..end]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if buf.len() >= end + 4 + len {
                        break;
                    }
                }
            }
            let resp = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            sock.write_all(resp.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&buf).into_owned()
        });
        (url, handle)
    }

    #[tokio::test]
    async fn posts_json_with_api_key_header() {
        let (url, server) = serve_once("200 OK", r#"{"result":{"result":true},"constant_result":["01"]}"#).await;
        let transport = HttpTransport::default_for(url).unwrap();

        let resp = transport.post(&request(), Some("secret-key")).await.unwrap();
        assert_eq!(resp.status, 200);
        assert!(resp.body.contains("constant_result"));

        let raw = server.await.unwrap();
        let lower = raw.to_ascii_lowercase();
        assert!(raw.starts_with("POST /wallet/triggerconstantcontract"));
        assert!(lower.contains("tron-pro-api-key: secret-key"));
        assert!(lower.contains("content-type: application/json"));

        let body = &raw[raw.find("\r\n\r\n").unwrap() + 4..];
        let json: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(json["function_selector"], "balanceOf(address)");
        assert_eq!(json["visible"], true);
    }

    #[tokio::test]
    async fn omits_header_without_key() {
        let (url, server) = serve_once("200 OK", "{}").await;
        let transport = HttpTransport::default_for(url).unwrap();
        transport.post(&request(), None).await.unwrap();
        let raw = server.await.unwrap().to_ascii_lowercase();
        assert!(!raw.contains("tron-pro-api-key"));
    }

    #[tokio::test]
    async fn non_success_status_is_returned_not_raised() {
        let (url, _server) = serve_once("429 Too Many Requests", "{}").await;
        let transport = HttpTransport::default_for(url).unwrap();
        let resp = transport.post(&request(), Some("k")).await.unwrap();
        assert!(resp.is_rate_limited());
    }

    #[tokio::test]
    async fn connection_failure_is_transport_error() {
        // Bind then drop to get a port nothing listens on.
        let addr = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();
        let transport = HttpTransport::new(
            format!("http://{addr}/wallet/triggerconstantcontract"),
            HttpTransportConfig {
                request_timeout: Duration::from_secs(2),
                ..Default::default()
            },
        )
        .unwrap();
        let err = transport.post(&request(), None).await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
        assert!(err.is_retryable());
    }
}
