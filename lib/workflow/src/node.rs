//! Workflow node types and configurations.
//!
//! Nodes are the building blocks of workflows. Each node has a unique ID
//! within the workflow, a human-readable name, and a configuration variant
//! that determines its behavior. The engine dispatches on the variant tag;
//! there is no open-ended runtime typing.

use crate::condition::Comparison;
use crate::trigger::Channel;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use ulid::Ulid;

/// A unique identifier for a node within a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Ulid);

impl NodeId {
    /// Creates a new random node ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Creates a node ID from a ULID.
    #[must_use]
    pub const fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node_{}", self.0)
    }
}

impl std::str::FromStr for NodeId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accept both the prefixed display form and a raw ULID.
        let ulid_str = s.strip_prefix("node_").unwrap_or(s);
        ulid_str.parse::<Ulid>().map(Self)
    }
}

/// The kind of a workflow node (the variant tag without its payload).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Entry point bound to the definition's trigger.
    Trigger,
    /// Outbound message on a conversation channel.
    SendMessage,
    /// CRM record mutation.
    CrmAction,
    /// Outbound HTTP call.
    HttpRequest,
    /// Outbound email.
    Email,
    /// Outbound SMS.
    Sms,
    /// Timed suspension.
    Wait,
    /// Conditional branch on execution context.
    Condition,
}

impl NodeKind {
    /// Returns the lowercase name used in log messages.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trigger => "trigger",
            Self::SendMessage => "send_message",
            Self::CrmAction => "crm_action",
            Self::HttpRequest => "http_request",
            Self::Email => "email",
            Self::Sms => "sms",
            Self::Wait => "wait",
            Self::Condition => "condition",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP method for [`NodeConfig::HttpRequest`] nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// Returns the method name as used on the wire.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

/// Unit for [`NodeConfig::Wait`] durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitUnit {
    Minutes,
    Hours,
    Days,
}

impl WaitUnit {
    /// Returns the lowercase unit name used in log messages.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minutes => "minutes",
            Self::Hours => "hours",
            Self::Days => "days",
        }
    }

    /// Converts an amount in this unit to a chrono duration.
    #[must_use]
    pub fn to_duration(self, amount: u32) -> chrono::Duration {
        let amount = i64::from(amount);
        match self {
            Self::Minutes => chrono::Duration::minutes(amount),
            Self::Hours => chrono::Duration::hours(amount),
            Self::Days => chrono::Duration::days(amount),
        }
    }
}

/// A CRM mutation performed by a [`NodeConfig::CrmAction`] node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CrmOperation {
    /// Create a new lead with the given fields.
    ///
    /// String field values may contain `{{path}}` templates.
    CreateLead {
        #[serde(default)]
        fields: BTreeMap<String, JsonValue>,
    },
    /// Move a lead to a pipeline stage.
    UpdateStage { stage: String },
    /// Attach a tag to a lead.
    AddTag { tag: String },
}

impl CrmOperation {
    /// Returns the operation name used in logs and adapter calls.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateLead { .. } => "create_lead",
            Self::UpdateStage { .. } => "update_stage",
            Self::AddTag { .. } => "add_tag",
        }
    }
}

/// A single branch rule on a [`NodeConfig::Condition`] node.
///
/// The first rule whose comparison holds selects the outgoing edge whose
/// branch label equals `label`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchRule {
    /// The branch label of the outgoing edge to follow.
    pub label: String,
    /// The comparison that must hold for this branch to be taken.
    pub comparison: Comparison,
}

/// Configuration for a node, varying by type.
///
/// Fields named `content`, `url`, `body`, `subject`, and `to`, plus string
/// values inside CRM `fields`, are templates interpolated from the
/// execution context before the adapter call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeConfig {
    /// The workflow entry point. Carries no behavior; the matching rule
    /// lives in the definition's trigger configuration.
    Trigger,
    /// Send a message on a conversation channel.
    SendMessage {
        channel: Channel,
        content: String,
        #[serde(default)]
        requires_reply: bool,
    },
    /// Mutate a CRM record.
    CrmAction {
        operation: CrmOperation,
        #[serde(default)]
        requires_reply: bool,
    },
    /// Call an external HTTP endpoint.
    HttpRequest {
        method: HttpMethod,
        url: String,
        #[serde(default)]
        headers: BTreeMap<String, String>,
        #[serde(default)]
        body: Option<String>,
    },
    /// Send an email.
    Email {
        to: String,
        subject: String,
        body: String,
    },
    /// Send an SMS.
    Sms { to: String, body: String },
    /// Park the execution until `duration` has elapsed.
    Wait { duration: u32, unit: WaitUnit },
    /// Select an outgoing edge by evaluating rules against the context.
    Condition { rules: Vec<BranchRule> },
}

impl NodeConfig {
    /// Returns the kind of this node configuration.
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Trigger => NodeKind::Trigger,
            Self::SendMessage { .. } => NodeKind::SendMessage,
            Self::CrmAction { .. } => NodeKind::CrmAction,
            Self::HttpRequest { .. } => NodeKind::HttpRequest,
            Self::Email { .. } => NodeKind::Email,
            Self::Sms { .. } => NodeKind::Sms,
            Self::Wait { .. } => NodeKind::Wait,
            Self::Condition { .. } => NodeKind::Condition,
        }
    }
}

/// A workflow node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier for this node within the workflow.
    pub id: NodeId,
    /// Human-readable name for this node.
    pub name: String,
    /// Node configuration (determines type and behavior).
    pub config: NodeConfig,
}

impl Node {
    /// Creates a new node with the given configuration.
    #[must_use]
    pub fn new(name: impl Into<String>, config: NodeConfig) -> Self {
        Self {
            id: NodeId::new(),
            name: name.into(),
            config,
        }
    }

    /// Creates a new node with a specific ID.
    #[must_use]
    pub fn with_id(id: NodeId, name: impl Into<String>, config: NodeConfig) -> Self {
        Self {
            id,
            name: name.into(),
            config,
        }
    }

    /// Returns the kind of this node.
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.config.kind()
    }

    /// Returns true if this node suspends the execution until an external
    /// reply arrives on the conversation.
    #[must_use]
    pub fn requires_reply(&self) -> bool {
        match &self.config {
            NodeConfig::SendMessage { requires_reply, .. }
            | NodeConfig::CrmAction { requires_reply, .. } => *requires_reply,
            _ => false,
        }
    }
}
