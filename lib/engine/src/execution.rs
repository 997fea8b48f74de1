//! Execution state, log entries, and pending-input records.
//!
//! An execution is one in-flight run of a workflow definition against a
//! specific event. It is owned exclusively by the execution engine and
//! mutated only through engine-controlled transitions (plus the
//! pending-input resume and an operator cancel).

use crate::context::ExecutionContext;
use chrono::{DateTime, Utc};
use leadflow_core::{ConversationId, ExecutionId, LogEntryId, OrganizationId, PendingInputId, WorkflowId};
use leadflow_workflow::definition::WorkflowDefinition;
use leadflow_workflow::error::DefinitionError;
use leadflow_workflow::node::NodeId;
use leadflow_workflow::trigger::NormalizedEvent;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// The status of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Actively stepping, or parked on a timer (`next_run_at` set).
    Running,
    /// Suspended until an external reply arrives.
    WaitingInput,
    /// Reached a terminal node.
    Completed,
    /// Failed; `error_message` carries the reason.
    Failed,
    /// Cancelled by an operator.
    Cancelled,
}

impl ExecutionStatus {
    /// Returns the lowercase status name used in storage and logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::WaitingInput => "waiting_input",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns true if this is a terminal status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One in-flight run of a workflow definition.
///
/// The definition is pinned as a snapshot at creation time, so edits to
/// the live definition never change the shape of an execution mid-flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    /// Unique identifier for this execution.
    pub id: ExecutionId,
    /// The workflow this execution runs.
    pub workflow_id: WorkflowId,
    /// The organization that owns the workflow.
    pub organization_id: OrganizationId,
    /// Pinned snapshot of the definition at execution start.
    pub definition: WorkflowDefinition,
    /// Current status.
    pub status: ExecutionStatus,
    /// The node the engine is at (or suspended at).
    pub current_node_id: NodeId,
    /// Accumulated variables: trigger payload plus node outputs.
    pub context: ExecutionContext,
    /// Conversation this execution is bound to, if any.
    pub conversation_id: Option<ConversationId>,
    /// Number of steps taken so far.
    pub steps_taken: u32,
    /// When a Wait node parked this execution, the time to resume at.
    pub next_run_at: Option<DateTime<Utc>>,
    /// When the execution started.
    pub started_at: DateTime<Utc>,
    /// When the execution reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
    /// Failure reason, if failed.
    pub error_message: Option<String>,
}

impl Execution {
    /// Creates a new running execution anchored at the definition's entry
    /// node, with context seeded from the event payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the definition has no unique entry node.
    pub fn new(
        definition: WorkflowDefinition,
        event: &NormalizedEvent,
    ) -> Result<Self, DefinitionError> {
        let entry_node_id = definition.entry_node()?.id;
        Ok(Self {
            id: ExecutionId::new(),
            workflow_id: definition.id,
            organization_id: definition.organization_id,
            status: ExecutionStatus::Running,
            current_node_id: entry_node_id,
            context: ExecutionContext::from_event(event),
            conversation_id: event.conversation_id,
            definition,
            steps_taken: 0,
            next_run_at: None,
            started_at: Utc::now(),
            completed_at: None,
            error_message: None,
        })
    }

    /// Returns true if the execution is in a terminal status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Marks the execution as completed.
    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.status = ExecutionStatus::Completed;
        self.completed_at = Some(now);
        self.next_run_at = None;
    }

    /// Marks the execution as failed with the given reason.
    pub fn fail(&mut self, reason: impl Into<String>, now: DateTime<Utc>) {
        self.status = ExecutionStatus::Failed;
        self.completed_at = Some(now);
        self.next_run_at = None;
        self.error_message = Some(reason.into());
    }

    /// Marks the execution as cancelled, leaving `current_node_id` as a
    /// forensic marker of where it stopped.
    pub fn cancel(&mut self, now: DateTime<Utc>) {
        self.status = ExecutionStatus::Cancelled;
        self.completed_at = Some(now);
        self.next_run_at = None;
    }
}

/// Log level for execution log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Returns the lowercase level name used in storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// An append-only log entry for one step of an execution.
///
/// Entries are written before the execution-state update is persisted, so
/// a crash between steps never loses the evidence of what was attempted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    /// Unique identifier for this entry.
    pub id: LogEntryId,
    /// The execution this entry belongs to.
    pub execution_id: ExecutionId,
    /// The node this entry concerns, if any.
    pub node_id: Option<NodeId>,
    /// Severity.
    pub level: LogLevel,
    /// Human-readable message.
    pub message: String,
    /// Structured details (adapter params, error kinds, branch labels).
    pub details: Option<JsonValue>,
    /// When this entry was written.
    pub created_at: DateTime<Utc>,
}

impl ExecutionLogEntry {
    /// Creates an entry with the given level.
    #[must_use]
    pub fn new(
        execution_id: ExecutionId,
        node_id: Option<NodeId>,
        level: LogLevel,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: LogEntryId::new(),
            execution_id,
            node_id,
            level,
            message: message.into(),
            details: None,
            created_at: Utc::now(),
        }
    }

    /// Creates an info entry.
    #[must_use]
    pub fn info(
        execution_id: ExecutionId,
        node_id: Option<NodeId>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(execution_id, node_id, LogLevel::Info, message)
    }

    /// Creates a warn entry.
    #[must_use]
    pub fn warn(
        execution_id: ExecutionId,
        node_id: Option<NodeId>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(execution_id, node_id, LogLevel::Warn, message)
    }

    /// Creates an error entry.
    #[must_use]
    pub fn error(
        execution_id: ExecutionId,
        node_id: Option<NodeId>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(execution_id, node_id, LogLevel::Error, message)
    }

    /// Attaches structured details.
    #[must_use]
    pub fn with_details(mut self, details: JsonValue) -> Self {
        self.details = Some(details);
        self
    }
}

/// The status of a pending-input record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingInputStatus {
    /// Waiting for an external reply.
    Waiting,
    /// A reply arrived and the execution was resumed.
    Resolved,
    /// The TTL elapsed before a reply arrived.
    Expired,
}

impl PendingInputStatus {
    /// Returns the lowercase status name used in storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Resolved => "resolved",
            Self::Expired => "expired",
        }
    }
}

/// A suspension record: one execution waiting for an external reply on a
/// conversation.
///
/// At most one `Waiting` record exists per execution; resolution is a
/// conditional transition so racing replies resolve it at most once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingInput {
    /// Unique identifier for this record.
    pub id: PendingInputId,
    /// The suspended execution.
    pub execution_id: ExecutionId,
    /// The conversation the reply is expected on.
    pub conversation_id: ConversationId,
    /// The node the execution suspended at.
    pub node_id: NodeId,
    /// Current status.
    pub status: PendingInputStatus,
    /// When the suspension was created.
    pub created_at: DateTime<Utc>,
    /// When the record left the waiting state.
    pub resolved_at: Option<DateTime<Utc>>,
}

impl PendingInput {
    /// Creates a new waiting record.
    #[must_use]
    pub fn new(execution_id: ExecutionId, conversation_id: ConversationId, node_id: NodeId) -> Self {
        Self {
            id: PendingInputId::new(),
            execution_id,
            conversation_id,
            node_id,
            status: PendingInputStatus::Waiting,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }
}
