//! Recording adapter stubs.
//!
//! `RecordingAdapters` implements every adapter trait, records each call,
//! and returns synthetic successes so downstream nodes that branch on
//! adapter output still behave realistically. The dry-run executor and
//! the engine tests run on these; no side effect ever leaves the process.

use crate::adapter::{
    AdapterSet, CrmAdapter, EmailSender, HttpCallRequest, HttpCallResponse, HttpCaller,
    MessageSender, ProviderMessageId, SmsSender,
};
use crate::error::{CrmError, NetworkError, SendError};
use async_trait::async_trait;
use leadflow_core::{LeadId, OrganizationId};
use leadflow_workflow::trigger::Channel;
use serde::Serialize;
use serde_json::Value as JsonValue;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// One recorded adapter invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedCall {
    /// Which adapter family was called.
    pub adapter: &'static str,
    /// The operation name.
    pub operation: String,
    /// The parameters the adapter would have been called with.
    pub params: JsonValue,
}

impl RecordedCall {
    /// Renders the "would have called" form used in dry-run logs.
    #[must_use]
    pub fn describe(&self) -> String {
        format!(
            "would have called {}.{} with {}",
            self.adapter, self.operation, self.params
        )
    }
}

/// Shared state behind a set of recording adapters.
#[derive(Debug, Default)]
struct RecorderState {
    calls: Vec<RecordedCall>,
    send_failure: Option<SendError>,
    crm_failure: Option<CrmError>,
    http_failure: Option<NetworkError>,
    http_response: Option<HttpCallResponse>,
}

/// Adapter stubs that record calls and return synthetic successes.
#[derive(Debug, Clone, Default)]
pub struct RecordingAdapters {
    state: Arc<Mutex<RecorderState>>,
}

impl RecordingAdapters {
    /// Creates a recorder where every call succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes all message/email/SMS sends fail with the given error.
    #[must_use]
    pub fn with_send_failure(self, error: SendError) -> Self {
        self.state.lock().expect("recorder lock").send_failure = Some(error);
        self
    }

    /// Makes all CRM operations fail with the given error.
    #[must_use]
    pub fn with_crm_failure(self, error: CrmError) -> Self {
        self.state.lock().expect("recorder lock").crm_failure = Some(error);
        self
    }

    /// Makes all HTTP calls fail with the given transport error.
    #[must_use]
    pub fn with_http_failure(self, error: NetworkError) -> Self {
        self.state.lock().expect("recorder lock").http_failure = Some(error);
        self
    }

    /// Makes all HTTP calls return the given response.
    #[must_use]
    pub fn with_http_response(self, status: u16, body: impl Into<String>) -> Self {
        self.state.lock().expect("recorder lock").http_response = Some(HttpCallResponse {
            status,
            body: body.into(),
        });
        self
    }

    /// Returns a snapshot of all recorded calls.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().expect("recorder lock").calls.clone()
    }

    /// Builds an [`AdapterSet`] where every adapter is this recorder.
    #[must_use]
    pub fn as_adapter_set(&self) -> AdapterSet {
        AdapterSet::new(
            Arc::new(self.clone()),
            Arc::new(self.clone()),
            Arc::new(self.clone()),
            Arc::new(self.clone()),
            Arc::new(self.clone()),
        )
    }

    fn record(&self, adapter: &'static str, operation: impl Into<String>, params: JsonValue) {
        self.state
            .lock()
            .expect("recorder lock")
            .calls
            .push(RecordedCall {
                adapter,
                operation: operation.into(),
                params,
            });
    }
}

#[async_trait]
impl MessageSender for RecordingAdapters {
    async fn send(
        &self,
        channel: Channel,
        recipient: &str,
        content: &str,
    ) -> Result<ProviderMessageId, SendError> {
        self.record(
            "messages",
            "send",
            json!({"channel": channel.as_str(), "recipient": recipient, "content": content}),
        );
        if let Some(error) = self.state.lock().expect("recorder lock").send_failure.clone() {
            return Err(error);
        }
        Ok(ProviderMessageId(format!("stub_msg_{}", ulid_like())))
    }
}

#[async_trait]
impl CrmAdapter for RecordingAdapters {
    async fn create_lead(
        &self,
        organization_id: OrganizationId,
        fields: &BTreeMap<String, JsonValue>,
    ) -> Result<LeadId, CrmError> {
        self.record(
            "crm",
            "create_lead",
            json!({"organization_id": organization_id.to_string(), "fields": fields}),
        );
        if let Some(error) = self.state.lock().expect("recorder lock").crm_failure.clone() {
            return Err(error);
        }
        Ok(LeadId::new())
    }

    async fn update_stage(&self, lead_id: LeadId, stage: &str) -> Result<(), CrmError> {
        self.record(
            "crm",
            "update_stage",
            json!({"lead_id": lead_id.to_string(), "stage": stage}),
        );
        if let Some(error) = self.state.lock().expect("recorder lock").crm_failure.clone() {
            return Err(error);
        }
        Ok(())
    }

    async fn add_tag(&self, lead_id: LeadId, tag: &str) -> Result<(), CrmError> {
        self.record(
            "crm",
            "add_tag",
            json!({"lead_id": lead_id.to_string(), "tag": tag}),
        );
        if let Some(error) = self.state.lock().expect("recorder lock").crm_failure.clone() {
            return Err(error);
        }
        Ok(())
    }
}

#[async_trait]
impl HttpCaller for RecordingAdapters {
    async fn call(&self, request: HttpCallRequest) -> Result<HttpCallResponse, NetworkError> {
        self.record(
            "http",
            "call",
            json!({"method": request.method.as_str(), "url": request.url, "body": request.body}),
        );
        let state = self.state.lock().expect("recorder lock");
        if let Some(error) = state.http_failure.clone() {
            return Err(error);
        }
        Ok(state.http_response.clone().unwrap_or(HttpCallResponse {
            status: 200,
            body: r#"{"ok":true}"#.to_string(),
        }))
    }
}

#[async_trait]
impl EmailSender for RecordingAdapters {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), SendError> {
        self.record(
            "email",
            "send",
            json!({"to": to, "subject": subject, "html": html}),
        );
        if let Some(error) = self.state.lock().expect("recorder lock").send_failure.clone() {
            return Err(error);
        }
        Ok(())
    }
}

#[async_trait]
impl SmsSender for RecordingAdapters {
    async fn send(&self, to: &str, body: &str) -> Result<(), SendError> {
        self.record("sms", "send", json!({"to": to, "body": body}));
        if let Some(error) = self.state.lock().expect("recorder lock").send_failure.clone() {
            return Err(error);
        }
        Ok(())
    }
}

/// A short unique suffix for synthetic message IDs.
fn ulid_like() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    format!("{:06}", COUNTER.fetch_add(1, Ordering::Relaxed))
}
