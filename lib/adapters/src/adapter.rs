//! Adapter traits and request/response value types.
//!
//! Each trait is the narrowest interface the engine needs for one family
//! of side effects. Implementations are stateless from the engine's point
//! of view and must be shareable across concurrently running executions.

use crate::error::{CrmError, NetworkError, SendError};
use async_trait::async_trait;
use leadflow_core::{LeadId, OrganizationId};
use leadflow_workflow::node::HttpMethod;
use leadflow_workflow::trigger::Channel;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The provider-assigned identifier of a delivered message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderMessageId(pub String);

impl std::fmt::Display for ProviderMessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sends messages on conversation channels.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Sends `content` to `recipient` on `channel`.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery fails.
    async fn send(
        &self,
        channel: Channel,
        recipient: &str,
        content: &str,
    ) -> Result<ProviderMessageId, SendError>;
}

/// Mutates CRM records.
#[async_trait]
pub trait CrmAdapter: Send + Sync {
    /// Creates a lead and returns its ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the lead could not be created.
    async fn create_lead(
        &self,
        organization_id: OrganizationId,
        fields: &BTreeMap<String, JsonValue>,
    ) -> Result<LeadId, CrmError>;

    /// Moves a lead to a pipeline stage.
    ///
    /// # Errors
    ///
    /// Returns an error if the lead or stage is unknown.
    async fn update_stage(&self, lead_id: LeadId, stage: &str) -> Result<(), CrmError>;

    /// Attaches a tag to a lead.
    ///
    /// # Errors
    ///
    /// Returns an error if the lead is unknown.
    async fn add_tag(&self, lead_id: LeadId, tag: &str) -> Result<(), CrmError>;
}

/// An outbound HTTP request, templates already interpolated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpCallRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Absolute URL.
    pub url: String,
    /// Request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Request body, if any.
    #[serde(default)]
    pub body: Option<String>,
}

/// The transport-level result of an HTTP call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpCallResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

impl HttpCallResponse {
    /// Returns true if the status code is in the 2xx range.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs outbound HTTP calls.
#[async_trait]
pub trait HttpCaller: Send + Sync {
    /// Performs the call and returns status and body.
    ///
    /// # Errors
    ///
    /// Returns an error only on transport-level failures; a non-2xx
    /// response is a successful call.
    async fn call(&self, request: HttpCallRequest) -> Result<HttpCallResponse, NetworkError>;
}

/// Sends email.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Sends an HTML email.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery fails.
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), SendError>;
}

/// Sends SMS.
#[async_trait]
pub trait SmsSender: Send + Sync {
    /// Sends an SMS.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery fails.
    async fn send(&self, to: &str, body: &str) -> Result<(), SendError>;
}

/// The full set of adapters the engine dispatches to.
#[derive(Clone)]
pub struct AdapterSet {
    /// Conversation message delivery.
    pub messages: Arc<dyn MessageSender>,
    /// CRM mutations.
    pub crm: Arc<dyn CrmAdapter>,
    /// Outbound HTTP.
    pub http: Arc<dyn HttpCaller>,
    /// Email delivery.
    pub email: Arc<dyn EmailSender>,
    /// SMS delivery.
    pub sms: Arc<dyn SmsSender>,
}

impl AdapterSet {
    /// Creates an adapter set from its parts.
    #[must_use]
    pub fn new(
        messages: Arc<dyn MessageSender>,
        crm: Arc<dyn CrmAdapter>,
        http: Arc<dyn HttpCaller>,
        email: Arc<dyn EmailSender>,
        sms: Arc<dyn SmsSender>,
    ) -> Self {
        Self {
            messages,
            crm,
            http,
            email,
            sms,
        }
    }
}
