//! Trigger configuration and event matching.
//!
//! A definition carries exactly one trigger configuration. Inbound events
//! are normalized into [`NormalizedEvent`] by the ingestion layer; the
//! trigger evaluator matches every active definition's trigger against the
//! event and starts one execution per match.

use crate::error::TriggerError;
use leadflow_core::{ConversationId, LeadId, OrganizationId};
use serde::{Deserialize, Serialize};

/// A conversation channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Whatsapp,
    Messenger,
    Instagram,
    WebChat,
    Sms,
}

impl Channel {
    /// Returns the lowercase channel name used in logs and payloads.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Whatsapp => "whatsapp",
            Self::Messenger => "messenger",
            Self::Instagram => "instagram",
            Self::WebChat => "web_chat",
            Self::Sms => "sms",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of event a trigger reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// An inbound message on a conversation.
    MessageReceived,
    /// A CRM lead moved between pipeline stages.
    StageChanged,
    /// Explicit user-initiated start.
    Manual,
    /// A schedule tick.
    Scheduled,
}

impl TriggerKind {
    /// Returns the lowercase kind name used in storage and logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MessageReceived => "message_received",
            Self::StageChanged => "stage_changed",
            Self::Manual => "manual",
            Self::Scheduled => "scheduled",
        }
    }
}

impl std::fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trigger configuration for a workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerConfig {
    /// Fires on an inbound message whose text contains one of the
    /// keywords (case-insensitive). An empty keyword list matches every
    /// message; a channel filter restricts matching to one channel.
    MessageReceived {
        #[serde(default)]
        keywords: Vec<String>,
        #[serde(default)]
        channel: Option<Channel>,
    },
    /// Fires on a CRM stage transition. `None` on either side is a
    /// wildcard.
    StageChanged {
        #[serde(default)]
        from_stage: Option<String>,
        #[serde(default)]
        to_stage: Option<String>,
    },
    /// Fires only when invoked explicitly.
    Manual,
    /// Fires on a schedule tick carrying a matching cron expression.
    Scheduled { cron: String },
}

impl TriggerConfig {
    /// Returns the kind of event this trigger reacts to.
    #[must_use]
    pub fn kind(&self) -> TriggerKind {
        match self {
            Self::MessageReceived { .. } => TriggerKind::MessageReceived,
            Self::StageChanged { .. } => TriggerKind::StageChanged,
            Self::Manual => TriggerKind::Manual,
            Self::Scheduled { .. } => TriggerKind::Scheduled,
        }
    }

    /// Validates the trigger configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a schedule trigger carries a malformed cron
    /// expression.
    pub fn validate(&self) -> Result<(), TriggerError> {
        if let Self::Scheduled { cron } = self {
            let parts: Vec<&str> = cron.split_whitespace().collect();
            if parts.len() != 5 {
                return Err(TriggerError::InvalidCron {
                    expression: cron.clone(),
                    reason: format!("expected 5 parts, got {}", parts.len()),
                });
            }
        }
        Ok(())
    }

    /// Returns true if this trigger matches the given event.
    ///
    /// The event's kind must equal the trigger's kind; beyond that each
    /// trigger applies its own matcher against the event payload.
    #[must_use]
    pub fn matches(&self, event: &NormalizedEvent) -> bool {
        if event.kind != self.kind() {
            return false;
        }

        match self {
            Self::MessageReceived { keywords, channel } => {
                let Some(message) = event.message.as_deref() else {
                    return false;
                };
                if let Some(wanted) = channel
                    && event.channel != Some(*wanted)
                {
                    return false;
                }
                if keywords.is_empty() {
                    return true;
                }
                let message = message.to_lowercase();
                keywords
                    .iter()
                    .any(|keyword| message.contains(&keyword.to_lowercase()))
            }
            Self::StageChanged {
                from_stage,
                to_stage,
            } => {
                let from_ok = match from_stage {
                    Some(wanted) => event.from_stage.as_deref() == Some(wanted.as_str()),
                    None => true,
                };
                let to_ok = match to_stage {
                    Some(wanted) => event.to_stage.as_deref() == Some(wanted.as_str()),
                    None => true,
                };
                from_ok && to_ok
            }
            Self::Manual | Self::Scheduled { .. } => true,
        }
    }
}

/// A normalized inbound event, as handed to the trigger evaluator.
///
/// The ingestion layer (webhooks, CRM hooks, schedule ticks, the manual
/// test endpoint) resolves channel assets and contact identities before
/// building one of these; the engine never sees raw provider payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    /// The organization the event belongs to.
    pub organization_id: OrganizationId,
    /// The kind of event.
    pub kind: TriggerKind,
    /// Conversation the event happened on, if any.
    #[serde(default)]
    pub conversation_id: Option<ConversationId>,
    /// CRM lead the event concerns, if any.
    #[serde(default)]
    pub lead_id: Option<LeadId>,
    /// Channel the event arrived on, if any.
    #[serde(default)]
    pub channel: Option<Channel>,
    /// Sender handle, if any.
    #[serde(default)]
    pub sender: Option<String>,
    /// Message text for `message_received` events.
    #[serde(default)]
    pub message: Option<String>,
    /// Previous stage for `stage_changed` events.
    #[serde(default)]
    pub from_stage: Option<String>,
    /// New stage for `stage_changed` events.
    #[serde(default)]
    pub to_stage: Option<String>,
}

impl NormalizedEvent {
    /// Creates an inbound-message event.
    #[must_use]
    pub fn message_received(
        organization_id: OrganizationId,
        conversation_id: ConversationId,
        channel: Channel,
        message: impl Into<String>,
    ) -> Self {
        Self {
            organization_id,
            kind: TriggerKind::MessageReceived,
            conversation_id: Some(conversation_id),
            lead_id: None,
            channel: Some(channel),
            sender: None,
            message: Some(message.into()),
            from_stage: None,
            to_stage: None,
        }
    }

    /// Creates a stage-change event.
    #[must_use]
    pub fn stage_changed(
        organization_id: OrganizationId,
        lead_id: LeadId,
        from_stage: impl Into<String>,
        to_stage: impl Into<String>,
    ) -> Self {
        Self {
            organization_id,
            kind: TriggerKind::StageChanged,
            conversation_id: None,
            lead_id: Some(lead_id),
            channel: None,
            sender: None,
            message: None,
            from_stage: Some(from_stage.into()),
            to_stage: Some(to_stage.into()),
        }
    }

    /// Creates a manual event.
    #[must_use]
    pub fn manual(organization_id: OrganizationId) -> Self {
        Self {
            organization_id,
            kind: TriggerKind::Manual,
            conversation_id: None,
            lead_id: None,
            channel: None,
            sender: None,
            message: None,
            from_stage: None,
            to_stage: None,
        }
    }

    /// Sets the sender handle.
    #[must_use]
    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    /// Sets the lead the event concerns.
    #[must_use]
    pub fn with_lead(mut self, lead_id: LeadId) -> Self {
        self.lead_id = Some(lead_id);
        self
    }
}
