//! Channel-gateway-backed adapters.
//!
//! Message, CRM, email, and SMS delivery is owned by the channel gateway
//! (the conversation/CRM side of the platform); the engine only needs its
//! success/failure contract. These adapters POST JSON to the gateway and
//! map transport and status failures onto the adapter error taxonomy.
//! HTTP-request workflow nodes do NOT go through the gateway; they use
//! the plain [`leadflow_adapters::ReqwestHttpCaller`] directly.

use async_trait::async_trait;
use leadflow_adapters::adapter::{
    CrmAdapter, EmailSender, HttpCallRequest, HttpCaller, MessageSender, ProviderMessageId,
    SmsSender,
};
use leadflow_adapters::error::{CrmError, NetworkError, SendError};
use leadflow_core::{LeadId, OrganizationId};
use leadflow_workflow::node::HttpMethod;
use leadflow_workflow::trigger::Channel;
use serde_json::{Value as JsonValue, json};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Adapters that delegate delivery to the channel gateway.
#[derive(Clone)]
pub struct GatewayAdapters {
    http: Arc<dyn HttpCaller>,
    base_url: String,
}

impl GatewayAdapters {
    /// Creates gateway adapters against the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>, http: Arc<dyn HttpCaller>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { http, base_url }
    }

    /// POSTs a JSON payload to a gateway path and returns the response
    /// body on 2xx.
    async fn post(&self, path: &str, payload: JsonValue) -> Result<JsonValue, GatewayError> {
        let request = HttpCallRequest {
            method: HttpMethod::Post,
            url: format!("{}/{path}", self.base_url),
            headers: BTreeMap::from([(
                "content-type".to_string(),
                "application/json".to_string(),
            )]),
            body: Some(payload.to_string()),
        };

        let response = self.http.call(request).await.map_err(GatewayError::Network)?;
        if !response.is_success() {
            return Err(GatewayError::Status {
                status: response.status,
                body: response.body,
            });
        }
        Ok(serde_json::from_str(&response.body).unwrap_or(JsonValue::Null))
    }
}

/// Internal gateway failure, mapped per adapter family.
enum GatewayError {
    Network(NetworkError),
    Status { status: u16, body: String },
}

impl GatewayError {
    fn into_send_error(self) -> SendError {
        match self {
            Self::Network(NetworkError::Timeout) => SendError::Timeout,
            Self::Network(e) => SendError::ChannelUnavailable {
                reason: e.to_string(),
            },
            Self::Status { status, body } => SendError::ProviderError {
                reason: format!("gateway returned {status}: {body}"),
            },
        }
    }

    fn into_crm_error(self) -> CrmError {
        match self {
            Self::Network(NetworkError::Timeout) => CrmError::Timeout,
            Self::Network(e) => CrmError::BackendError {
                reason: e.to_string(),
            },
            Self::Status { status, body } => CrmError::BackendError {
                reason: format!("gateway returned {status}: {body}"),
            },
        }
    }
}

#[async_trait]
impl MessageSender for GatewayAdapters {
    async fn send(
        &self,
        channel: Channel,
        recipient: &str,
        content: &str,
    ) -> Result<ProviderMessageId, SendError> {
        let body = self
            .post(
                "messages",
                json!({
                    "channel": channel.as_str(),
                    "recipient": recipient,
                    "content": content,
                }),
            )
            .await
            .map_err(GatewayError::into_send_error)?;

        match body.get("message_id").and_then(JsonValue::as_str) {
            Some(message_id) => Ok(ProviderMessageId(message_id.to_string())),
            None => Err(SendError::ProviderError {
                reason: "gateway response missing message_id".to_string(),
            }),
        }
    }
}

#[async_trait]
impl CrmAdapter for GatewayAdapters {
    async fn create_lead(
        &self,
        organization_id: OrganizationId,
        fields: &BTreeMap<String, JsonValue>,
    ) -> Result<LeadId, CrmError> {
        let body = self
            .post(
                "crm/leads",
                json!({
                    "organization_id": organization_id,
                    "fields": fields,
                }),
            )
            .await
            .map_err(GatewayError::into_crm_error)?;

        body.get("lead_id")
            .and_then(JsonValue::as_str)
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| CrmError::BackendError {
                reason: "gateway response missing lead_id".to_string(),
            })
    }

    async fn update_stage(&self, lead_id: LeadId, stage: &str) -> Result<(), CrmError> {
        self.post(
            &format!("crm/leads/{lead_id}/stage"),
            json!({"stage": stage}),
        )
        .await
        .map(|_| ())
        .map_err(GatewayError::into_crm_error)
    }

    async fn add_tag(&self, lead_id: LeadId, tag: &str) -> Result<(), CrmError> {
        self.post(&format!("crm/leads/{lead_id}/tags"), json!({"tag": tag}))
            .await
            .map(|_| ())
            .map_err(GatewayError::into_crm_error)
    }
}

#[async_trait]
impl EmailSender for GatewayAdapters {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), SendError> {
        self.post(
            "email",
            json!({"to": to, "subject": subject, "html": html}),
        )
        .await
        .map(|_| ())
        .map_err(GatewayError::into_send_error)
    }
}

#[async_trait]
impl SmsSender for GatewayAdapters {
    async fn send(&self, to: &str, body: &str) -> Result<(), SendError> {
        self.post("sms", json!({"to": to, "body": body}))
            .await
            .map(|_| ())
            .map_err(GatewayError::into_send_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadflow_adapters::recording::RecordingAdapters;

    #[tokio::test]
    async fn message_send_uses_gateway_message_id() {
        let recorder =
            RecordingAdapters::new().with_http_response(200, r#"{"message_id":"wamid.123"}"#);
        let gateway = GatewayAdapters::new("https://gateway.internal/", Arc::new(recorder.clone()));

        let id = MessageSender::send(&gateway, Channel::Whatsapp, "+5215550001111", "hola")
            .await
            .unwrap();
        assert_eq!(id.0, "wamid.123");

        let calls = recorder.calls();
        assert_eq!(calls.len(), 1);
        // Trailing slash trimmed from the base URL.
        assert_eq!(
            calls[0].params["url"],
            "https://gateway.internal/messages"
        );
    }

    #[tokio::test]
    async fn non_2xx_maps_to_provider_error() {
        let recorder = RecordingAdapters::new().with_http_response(503, "unavailable");
        let gateway = GatewayAdapters::new("https://gateway.internal", Arc::new(recorder));

        let result =
            MessageSender::send(&gateway, Channel::Whatsapp, "+5215550001111", "hola").await;
        assert!(matches!(result, Err(SendError::ProviderError { .. })));
    }

    #[tokio::test]
    async fn network_timeout_maps_per_family() {
        let recorder = RecordingAdapters::new().with_http_failure(NetworkError::Timeout);
        let gateway = GatewayAdapters::new("https://gateway.internal", Arc::new(recorder));

        let send = MessageSender::send(&gateway, Channel::Sms, "+52", "hola").await;
        assert!(matches!(send, Err(SendError::Timeout)));

        let crm = gateway.update_stage(LeadId::new(), "qualified").await;
        assert!(matches!(crm, Err(CrmError::Timeout)));
    }

    #[tokio::test]
    async fn create_lead_parses_returned_id() {
        let lead_id = LeadId::new();
        let response = format!(r#"{{"lead_id":"{}"}}"#, lead_id.as_ulid());
        let recorder = RecordingAdapters::new().with_http_response(200, response);
        let gateway = GatewayAdapters::new("https://gateway.internal", Arc::new(recorder));

        let created = gateway
            .create_lead(OrganizationId::new(), &BTreeMap::new())
            .await
            .unwrap();
        assert_eq!(created, lead_id);
    }
}
