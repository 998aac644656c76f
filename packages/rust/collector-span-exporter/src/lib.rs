//! HTTP span exporter for the lambda-tracer-lite collector protocol.
//!
//! This crate ships a batch of already-serialized spans (a JSON array) to a
//! remote collector. It is deliberately small: the caller decides what goes into
//! the batch, this crate only knows how to deliver it.
//!
//! # Wire format
//!
//! Every export is a single `POST {endpoint}` with:
//! - `Content-Type: application/json`
//! - `Authorization: <token>` when a token is configured
//! - `User-Agent: lambda-tracer-lite/<version>`
//!
//! Any 2xx response is a success; the response body is never read.
//!
//! # Timeouts
//!
//! The exporter enforces its timeout twice: through the HTTP client (connect and
//! request timeouts) and through `tokio::time::timeout` around the whole send.
//! A collector that accepts the connection and then hangs is therefore bounded
//! the same way as one that never answers.
//!
//! # Example
//!
//! ```no_run
//! use collector_span_exporter::{CollectorExporter, SpanExporter};
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), collector_span_exporter::ExportError> {
//! let exporter = CollectorExporter::builder()
//!     .endpoint(collector_span_exporter::endpoint_for_host("collector.example.com")?)
//!     .token("t_0123456789".to_string())
//!     .timeout(Duration::from_millis(300))
//!     .build()?;
//!
//! exporter.export(br#"[{"id":"1"}]"#.to_vec()).await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use bon::bon;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use std::{fmt, time::Duration};
use thiserror::Error;

pub mod constants;

use constants::{defaults, headers};

/// Errors that can occur while exporting a span batch.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to collector failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("collector responded with status {0}")]
    Status(u16),

    #[error("export timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid collector endpoint: {0:?}")]
    Endpoint(String),
}

/// Destination for serialized span batches.
#[async_trait]
pub trait SpanExporter: Send + Sync + fmt::Debug {
    /// Deliver one batch. The payload is a complete JSON document.
    async fn export(&self, payload: Vec<u8>) -> Result<(), ExportError>;
}

/// Build the collector endpoint from an edge host setting.
///
/// A bare host gets the `https://` scheme; a value that already carries a
/// scheme is kept as-is (useful for local collectors). The spans path is
/// appended unless the value already ends with it.
pub fn endpoint_for_host(edge_host: &str) -> Result<String, ExportError> {
    let host = edge_host.trim().trim_end_matches('/');
    if host.is_empty() {
        return Err(ExportError::Endpoint(edge_host.to_string()));
    }

    let base = if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    };

    if base.ends_with(defaults::SPANS_PATH) {
        Ok(base)
    } else {
        Ok(format!("{}{}", base, defaults::SPANS_PATH))
    }
}

/// Exporter that POSTs span batches to the collector over HTTP(S).
#[derive(Debug, Clone)]
pub struct CollectorExporter {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    timeout: Duration,
}

#[bon]
impl CollectorExporter {
    /// Creates a new exporter.
    ///
    /// When `reuse_connection` is false the connection pool keeps no idle
    /// connections, so every export opens a fresh connection. When true the
    /// pool keeps connections alive between invocations of a warm runtime.
    #[builder]
    pub fn new(
        #[builder(into)] endpoint: String,
        token: Option<String>,
        timeout: Option<Duration>,
        #[builder(default)] reuse_connection: bool,
        user_agent: Option<String>,
    ) -> Result<Self, ExportError> {
        let timeout = timeout.unwrap_or(defaults::TIMEOUT);
        let user_agent = user_agent.unwrap_or_else(|| defaults::USER_AGENT.to_string());

        let builder = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(user_agent);

        let builder = if reuse_connection {
            builder
                .tcp_keepalive(defaults::KEEP_ALIVE)
                .pool_idle_timeout(defaults::KEEP_ALIVE)
        } else {
            builder.pool_max_idle_per_host(0)
        };

        let client = builder.build().map_err(ExportError::Client)?;

        Ok(Self {
            client,
            endpoint,
            token,
            timeout,
        })
    }

    /// The endpoint batches are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The timeout applied to every export.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl SpanExporter for CollectorExporter {
    async fn export(&self, payload: Vec<u8>) -> Result<(), ExportError> {
        let size = payload.len();
        let mut request = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, headers::CONTENT_TYPE_JSON)
            .body(payload);

        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, token);
        }

        let response = match tokio::time::timeout(self.timeout, request.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) if err.is_timeout() => return Err(ExportError::Timeout(self.timeout)),
            Ok(Err(err)) => return Err(ExportError::Request(err)),
            Err(_) => return Err(ExportError::Timeout(self.timeout)),
        };

        let status = response.status();
        if !status.is_success() {
            return Err(ExportError::Status(status.as_u16()));
        }

        tracing::debug!(bytes = size, status = status.as_u16(), "span batch delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        matchers::{body_json, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn exporter_for(server: &MockServer, timeout: Duration) -> CollectorExporter {
        CollectorExporter::builder()
            .endpoint(endpoint_for_host(&server.uri()).unwrap())
            .token("t_test".to_string())
            .timeout(timeout)
            .build()
            .unwrap()
    }

    #[test]
    fn test_endpoint_for_host() {
        assert_eq!(
            endpoint_for_host("collector.example.com").unwrap(),
            "https://collector.example.com/api/spans"
        );
        assert_eq!(
            endpoint_for_host("http://127.0.0.1:8080/").unwrap(),
            "http://127.0.0.1:8080/api/spans"
        );
        assert_eq!(
            endpoint_for_host("https://edge.example.com/api/spans").unwrap(),
            "https://edge.example.com/api/spans"
        );
        assert!(matches!(
            endpoint_for_host("  "),
            Err(ExportError::Endpoint(_))
        ));
    }

    #[test]
    fn test_builder_defaults() {
        let exporter = CollectorExporter::builder()
            .endpoint("https://collector.example.com/api/spans")
            .build()
            .unwrap();

        assert_eq!(exporter.timeout(), defaults::TIMEOUT);
        assert_eq!(
            exporter.endpoint(),
            "https://collector.example.com/api/spans"
        );
        assert!(exporter.token.is_none());
    }

    #[tokio::test]
    async fn test_export_success_sends_expected_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/spans"))
            .and(header("authorization", "t_test"))
            .and(header("content-type", "application/json"))
            .and(header("user-agent", defaults::USER_AGENT))
            .and(body_json(serde_json::json!([{"id": "span-1"}])))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let exporter = exporter_for(&server, Duration::from_millis(500));
        let result = exporter.export(br#"[{"id":"span-1"}]"#.to_vec()).await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_export_accepts_any_2xx() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let exporter = exporter_for(&server, Duration::from_millis(500));
        assert!(exporter.export(b"[]".to_vec()).await.is_ok());
    }

    #[tokio::test]
    async fn test_export_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let exporter = exporter_for(&server, Duration::from_millis(500));
        let result = exporter.export(b"[]".to_vec()).await;

        assert!(matches!(result, Err(ExportError::Status(500))));
    }

    #[tokio::test]
    async fn test_export_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let exporter = exporter_for(&server, Duration::from_millis(50));
        let started = std::time::Instant::now();
        let result = exporter.export(b"[]".to_vec()).await;

        assert!(matches!(result, Err(ExportError::Timeout(_))));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_export_connection_refused() {
        // Grab a free port and release it so nothing is listening there
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let exporter = CollectorExporter::builder()
            .endpoint(format!("http://127.0.0.1:{}/api/spans", port))
            .timeout(Duration::from_millis(200))
            .build()
            .unwrap();

        let result = exporter.export(b"[]".to_vec()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_export_with_connection_reuse() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&server)
            .await;

        let exporter = CollectorExporter::builder()
            .endpoint(endpoint_for_host(&server.uri()).unwrap())
            .reuse_connection(true)
            .build()
            .unwrap();

        assert!(exporter.export(b"[]".to_vec()).await.is_ok());
        assert!(exporter.export(b"[]".to_vec()).await.is_ok());
    }
}
