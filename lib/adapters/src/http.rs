//! Production HTTP caller backed by reqwest.

use crate::adapter::{HttpCallRequest, HttpCallResponse, HttpCaller};
use crate::error::NetworkError;
use async_trait::async_trait;
use leadflow_workflow::node::HttpMethod;
use std::time::Duration;

/// Default per-request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// An [`HttpCaller`] backed by a shared reqwest client.
///
/// The client holds the connection pool; one instance is shared across all
/// executions.
#[derive(Debug, Clone)]
pub struct ReqwestHttpCaller {
    client: reqwest::Client,
}

impl ReqwestHttpCaller {
    /// Creates a caller with the default timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Creates a caller with a custom per-request timeout.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    fn method_of(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

impl Default for ReqwestHttpCaller {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpCaller for ReqwestHttpCaller {
    async fn call(&self, request: HttpCallRequest) -> Result<HttpCallResponse, NetworkError> {
        let url = reqwest::Url::parse(&request.url).map_err(|e| NetworkError::InvalidUrl {
            url: request.url.clone(),
            reason: e.to_string(),
        })?;

        let mut builder = self.client.request(Self::method_of(request.method), url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                NetworkError::Timeout
            } else {
                NetworkError::ConnectionFailed {
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| NetworkError::InvalidResponse {
                reason: e.to_string(),
            })?;

        Ok(HttpCallResponse { status, body })
    }
}
