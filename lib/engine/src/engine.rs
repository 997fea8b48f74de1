//! The execution engine: a single-current-node step loop.
//!
//! The engine advances one execution at a time, strictly sequentially:
//! load the current node, dispatch on its variant, invoke the adapter,
//! write a log entry, then persist the state transition. The log is
//! written before the state update (log-then-commit), so a crash between
//! steps never loses the evidence of what was attempted.
//!
//! Executions pause across process restarts only at Wait nodes (timer
//! parking on `next_run_at`) and at requires-reply nodes (a pending-input
//! record). Everything else runs to completion inside one `step` call.

use crate::context::ExecutionContext;
use crate::error::EngineError;
use crate::execution::{Execution, ExecutionLogEntry, ExecutionStatus, LogLevel, PendingInput};
use crate::store::ExecutionStore;
use chrono::{DateTime, Utc};
use leadflow_adapters::adapter::{
    AdapterSet, CrmAdapter, EmailSender, HttpCallRequest, HttpCaller, MessageSender, SmsSender,
};
use leadflow_core::{ExecutionId, LeadId, PendingInputId};
use leadflow_workflow::definition::WorkflowDefinition;
use leadflow_workflow::edge::Edge;
use leadflow_workflow::node::{CrmOperation, Node, NodeConfig, NodeId};
use serde_json::{Value as JsonValue, json};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Ceilings that guarantee termination for cyclic graphs and runaway
/// retries.
#[derive(Debug, Clone, Copy)]
pub struct EngineLimits {
    /// Maximum number of steps per execution.
    pub max_steps: u32,
    /// Maximum wall-clock lifetime of an execution, Wait parking included.
    pub max_duration: chrono::Duration,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_steps: 100,
            max_duration: chrono::Duration::days(30),
        }
    }
}

/// Why an execution suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suspension {
    /// Parked by a Wait node until `resume_at`.
    Timer { resume_at: DateTime<Utc> },
    /// Waiting for an external reply on the conversation.
    Reply { pending_input_id: PendingInputId },
}

/// The outcome of a single step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The execution advanced to the given node.
    Continue(NodeId),
    /// The execution suspended.
    Suspend(Suspension),
    /// The execution reached a terminal node.
    Complete,
    /// The execution failed.
    Fail { reason: String },
}

/// The outcome of driving an execution as far as it will go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Terminal: completed successfully.
    Completed,
    /// Terminal: failed.
    Failed { reason: String },
    /// Terminal: cancelled by an operator.
    Cancelled,
    /// Parked until the timer elapses.
    WaitingTimer { resume_at: DateTime<Utc> },
    /// Suspended until an external reply arrives.
    WaitingReply,
}

/// Outcome of dispatching one node, before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DispatchOutcome {
    /// Advance to the node, or complete if `None`.
    Advance(Option<NodeId>),
    /// Park until the given time.
    AwaitTimer(DateTime<Utc>),
    /// Suspend until an external reply arrives.
    AwaitReply,
    /// Fail the execution.
    Fail { kind: &'static str, message: String },
}

/// The result of dispatching one node: outcome plus its log entry parts.
#[derive(Debug, Clone)]
pub(crate) struct DispatchResult {
    pub outcome: DispatchOutcome,
    pub level: LogLevel,
    pub message: String,
    pub details: Option<JsonValue>,
}

impl DispatchResult {
    fn info(outcome: DispatchOutcome, message: impl Into<String>) -> Self {
        Self {
            outcome,
            level: LogLevel::Info,
            message: message.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: JsonValue) -> Self {
        self.details = Some(details);
        self
    }
}

/// Selects the node to advance to from `node_id` outside of condition
/// branching: the unique unlabeled edge wins; with exactly one non-error
/// edge of any label, that edge wins; no non-error edges means the node
/// is terminal.
///
/// # Errors
///
/// Returns a message when multiple candidate edges are ambiguous.
pub(crate) fn next_default(
    definition: &WorkflowDefinition,
    node_id: NodeId,
) -> Result<Option<NodeId>, String> {
    let successors = definition.graph.successors(node_id);
    let non_error: Vec<_> = successors
        .iter()
        .filter(|(_, edge)| !edge.has_label(Edge::ERROR))
        .collect();

    if non_error.is_empty() {
        return Ok(None);
    }

    let mut unlabeled = non_error.iter().filter(|(_, edge)| edge.is_default());
    if let Some((node, _)) = unlabeled.next() {
        if unlabeled.next().is_some() {
            return Err("multiple unlabeled outgoing edges".to_string());
        }
        return Ok(Some(node.id));
    }

    if non_error.len() == 1 {
        return Ok(Some(non_error[0].0.id));
    }
    Err("multiple labeled outgoing edges and no default".to_string())
}

/// Builds the failure result for a node, honoring a configured error edge.
///
/// With an `error`-labeled outgoing edge the execution continues along it
/// (logged as a warning); without one the failure is terminal for this
/// execution.
fn failure(definition: &WorkflowDefinition, node: &Node, kind: &'static str, message: String) -> DispatchResult {
    if let Some(error_node) = definition.graph.successor_by_label(node.id, Edge::ERROR) {
        DispatchResult {
            outcome: DispatchOutcome::Advance(Some(error_node.id)),
            level: LogLevel::Warn,
            message: format!("{message}; continuing along error edge"),
            details: Some(json!({"kind": kind})),
        }
    } else {
        DispatchResult {
            outcome: DispatchOutcome::Fail {
                kind,
                message: message.clone(),
            },
            level: LogLevel::Error,
            message,
            details: Some(json!({"kind": kind})),
        }
    }
}

fn advance_or_fail(definition: &WorkflowDefinition, node_id: NodeId) -> DispatchOutcome {
    match next_default(definition, node_id) {
        Ok(next) => DispatchOutcome::Advance(next),
        Err(message) => DispatchOutcome::Fail {
            kind: "invalid_definition",
            message,
        },
    }
}

/// Resolves the message recipient: the event sender if known, otherwise
/// the conversation handle.
fn recipient_of(context: &ExecutionContext) -> Option<String> {
    context
        .get("sender")
        .and_then(|v| v.as_str().map(str::to_string))
        .or_else(|| {
            context
                .get("conversation_id")
                .and_then(|v| v.as_str().map(str::to_string))
        })
}

/// Resolves the lead the execution is bound to, either from the trigger
/// payload or from an earlier `create_lead` output.
fn lead_of(context: &ExecutionContext) -> Option<LeadId> {
    context
        .get("lead_id")
        .and_then(|v| v.as_str().and_then(|s| s.parse().ok()))
}

/// Interpolates string leaves of CRM field values.
fn render_fields(
    fields: &BTreeMap<String, JsonValue>,
    context: &ExecutionContext,
) -> BTreeMap<String, JsonValue> {
    fields
        .iter()
        .map(|(key, value)| {
            let rendered = match value {
                JsonValue::String(s) => JsonValue::String(context.render(s)),
                other => other.clone(),
            };
            (key.clone(), rendered)
        })
        .collect()
}

/// Dispatches one node: pure function of node config and context, plus
/// the adapter calls it performs. Shared verbatim by live execution and
/// dry runs, which is what makes a passing dry run a reliable predictor
/// of live behavior.
pub(crate) async fn dispatch_node(
    definition: &WorkflowDefinition,
    node: &Node,
    context: &mut ExecutionContext,
    adapters: &AdapterSet,
    now: DateTime<Utc>,
) -> DispatchResult {
    match &node.config {
        NodeConfig::Trigger => {
            DispatchResult::info(advance_or_fail(definition, node.id), "workflow triggered")
        }

        NodeConfig::SendMessage {
            channel,
            content,
            requires_reply,
        } => {
            let rendered = context.render(content);
            let Some(recipient) = recipient_of(context) else {
                return failure(
                    definition,
                    node,
                    "missing_recipient",
                    "no recipient available in execution context".to_string(),
                );
            };
            match adapters.messages.send(*channel, &recipient, &rendered).await {
                Ok(message_id) => {
                    context.record_node_output(
                        node.id,
                        json!({"message_id": message_id.to_string(), "content": rendered}),
                    );
                    if *requires_reply {
                        DispatchResult::info(
                            DispatchOutcome::AwaitReply,
                            format!("message sent on {channel}, awaiting reply"),
                        )
                    } else {
                        DispatchResult::info(
                            advance_or_fail(definition, node.id),
                            format!("message sent on {channel}"),
                        )
                    }
                }
                Err(e) => failure(definition, node, e.kind(), e.to_string()),
            }
        }

        NodeConfig::CrmAction {
            operation,
            requires_reply,
        } => {
            let result = match operation {
                CrmOperation::CreateLead { fields } => {
                    let rendered = render_fields(fields, context);
                    match adapters
                        .crm
                        .create_lead(definition.organization_id, &rendered)
                        .await
                    {
                        Ok(lead_id) => {
                            context.insert("lead_id", json!(lead_id.to_string()));
                            Ok(json!({"lead_id": lead_id.to_string()}))
                        }
                        Err(e) => Err((e.kind(), e.to_string())),
                    }
                }
                CrmOperation::UpdateStage { stage } => match lead_of(context) {
                    Some(lead_id) => adapters
                        .crm
                        .update_stage(lead_id, stage)
                        .await
                        .map(|()| json!({"stage": stage}))
                        .map_err(|e| (e.kind(), e.to_string())),
                    None => Err(("missing_lead", "no lead bound to execution".to_string())),
                },
                CrmOperation::AddTag { tag } => match lead_of(context) {
                    Some(lead_id) => adapters
                        .crm
                        .add_tag(lead_id, tag)
                        .await
                        .map(|()| json!({"tag": tag}))
                        .map_err(|e| (e.kind(), e.to_string())),
                    None => Err(("missing_lead", "no lead bound to execution".to_string())),
                },
            };

            match result {
                Ok(output) => {
                    context.record_node_output(node.id, output);
                    if *requires_reply {
                        DispatchResult::info(
                            DispatchOutcome::AwaitReply,
                            format!("crm {} applied, awaiting reply", operation.name()),
                        )
                    } else {
                        DispatchResult::info(
                            advance_or_fail(definition, node.id),
                            format!("crm {} applied", operation.name()),
                        )
                    }
                }
                Err((kind, message)) => failure(definition, node, kind, message),
            }
        }

        NodeConfig::HttpRequest {
            method,
            url,
            headers,
            body,
        } => {
            let request = HttpCallRequest {
                method: *method,
                url: context.render(url),
                headers: headers.clone(),
                body: body.as_ref().map(|b| context.render(b)),
            };
            let url_rendered = request.url.clone();

            match adapters.http.call(request).await {
                Ok(response) => {
                    let body_value = serde_json::from_str::<JsonValue>(&response.body)
                        .unwrap_or(JsonValue::String(response.body.clone()));
                    context.record_node_output(
                        node.id,
                        json!({"status": response.status, "body": body_value}),
                    );

                    let summary = format!(
                        "{} {} returned {}",
                        method.as_str(),
                        url_rendered,
                        response.status
                    );
                    if response.is_success() {
                        let outcome =
                            match definition.graph.successor_by_label(node.id, Edge::SUCCESS) {
                                Some(next) => DispatchOutcome::Advance(Some(next.id)),
                                None => advance_or_fail(definition, node.id),
                            };
                        DispatchResult::info(outcome, summary)
                            .with_details(json!({"status": response.status}))
                    } else {
                        failure(definition, node, "http_status", summary)
                    }
                }
                Err(e) => failure(definition, node, e.kind(), e.to_string()),
            }
        }

        NodeConfig::Email { to, subject, body } => {
            let to = context.render(to);
            let subject = context.render(subject);
            let html = context.render(body);
            match adapters.email.send(&to, &subject, &html).await {
                Ok(()) => {
                    context.record_node_output(node.id, json!({"to": to, "subject": subject}));
                    DispatchResult::info(
                        advance_or_fail(definition, node.id),
                        format!("email sent to {to}"),
                    )
                }
                Err(e) => failure(definition, node, e.kind(), e.to_string()),
            }
        }

        NodeConfig::Sms { to, body } => {
            let to = context.render(to);
            let rendered = context.render(body);
            match adapters.sms.send(&to, &rendered).await {
                Ok(()) => {
                    context.record_node_output(node.id, json!({"to": to}));
                    DispatchResult::info(
                        advance_or_fail(definition, node.id),
                        format!("sms sent to {to}"),
                    )
                }
                Err(e) => failure(definition, node, e.kind(), e.to_string()),
            }
        }

        NodeConfig::Wait { duration, unit } => {
            let resume_at = now + unit.to_duration(*duration);
            DispatchResult::info(
                DispatchOutcome::AwaitTimer(resume_at),
                format!("waiting {duration} {} until {resume_at}", unit.as_str()),
            )
            .with_details(json!({"resume_at": resume_at}))
        }

        NodeConfig::Condition { rules } => {
            let context_value = context.as_value();
            for rule in rules {
                if rule.comparison.evaluate(&context_value) {
                    return match definition.graph.successor_by_label(node.id, &rule.label) {
                        Some(next) => DispatchResult::info(
                            DispatchOutcome::Advance(Some(next.id)),
                            format!("branch '{}' selected", rule.label),
                        )
                        .with_details(json!({"branch": rule.label})),
                        // A matching rule without an edge is a definition
                        // error that publish-time validation should have
                        // caught; hard failure, no error-edge fallback.
                        None => DispatchResult {
                            outcome: DispatchOutcome::Fail {
                                kind: "no_matching_branch",
                                message: format!("no outgoing edge for branch '{}'", rule.label),
                            },
                            level: LogLevel::Error,
                            message: format!("no outgoing edge for branch '{}'", rule.label),
                            details: Some(json!({"branch": rule.label})),
                        },
                    };
                }
            }
            DispatchResult {
                outcome: DispatchOutcome::Fail {
                    kind: "no_matching_branch",
                    message: "no matching branch".to_string(),
                },
                level: LogLevel::Error,
                message: "no rule matched the execution context".to_string(),
                details: None,
            }
        }
    }
}

/// The workflow execution engine.
#[derive(Clone)]
pub struct ExecutionEngine {
    store: Arc<dyn ExecutionStore>,
    adapters: AdapterSet,
    limits: EngineLimits,
    /// Per-execution run locks: steps within one execution are strictly
    /// sequential even when the same execution is enqueued twice.
    run_locks: Arc<std::sync::Mutex<HashMap<ExecutionId, Arc<tokio::sync::Mutex<()>>>>>,
}

impl ExecutionEngine {
    /// Creates an engine with default limits.
    #[must_use]
    pub fn new(store: Arc<dyn ExecutionStore>, adapters: AdapterSet) -> Self {
        Self {
            store,
            adapters,
            limits: EngineLimits::default(),
            run_locks: Arc::new(std::sync::Mutex::new(HashMap::new())),
        }
    }

    fn run_lock(&self, execution_id: ExecutionId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.run_locks.lock().expect("run locks");
        locks.entry(execution_id).or_default().clone()
    }

    fn release_run_lock(&self, execution_id: ExecutionId) {
        self.run_locks
            .lock()
            .expect("run locks")
            .remove(&execution_id);
    }

    /// Overrides the termination ceilings.
    #[must_use]
    pub fn with_limits(mut self, limits: EngineLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Advances the execution by one step.
    ///
    /// Writes the step's log entry, then persists the state transition.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails; node failures are a
    /// [`StepOutcome::Fail`], not an error.
    pub async fn step(&self, execution: &mut Execution) -> Result<StepOutcome, EngineError> {
        let now = Utc::now();

        if execution.steps_taken >= self.limits.max_steps
            || now - execution.started_at > self.limits.max_duration
        {
            let entry = ExecutionLogEntry::error(
                execution.id,
                Some(execution.current_node_id),
                "execution exceeded its step or duration ceiling",
            )
            .with_details(json!({
                "kind": "step_limit_exceeded",
                "steps_taken": execution.steps_taken,
            }));
            self.store.append_log(&entry).await?;
            execution.fail("step_limit_exceeded", now);
            self.store.update_execution(execution).await?;
            return Ok(StepOutcome::Fail {
                reason: "step_limit_exceeded".to_string(),
            });
        }

        let Some(node) = execution
            .definition
            .graph
            .get_node(execution.current_node_id)
            .cloned()
        else {
            // A definition error observed at run time fails the execution
            // immediately; nodes are never silently skipped.
            let message = format!(
                "current node {} not found in definition",
                execution.current_node_id
            );
            let entry =
                ExecutionLogEntry::error(execution.id, Some(execution.current_node_id), &message);
            self.store.append_log(&entry).await?;
            execution.fail("unknown_node", now);
            self.store.update_execution(execution).await?;
            return Ok(StepOutcome::Fail { reason: message });
        };

        execution.steps_taken += 1;
        let result = dispatch_node(
            &execution.definition,
            &node,
            &mut execution.context,
            &self.adapters,
            now,
        )
        .await;

        let mut entry =
            ExecutionLogEntry::new(execution.id, Some(node.id), result.level, result.message);
        if let Some(details) = result.details {
            entry = entry.with_details(details);
        }
        self.store.append_log(&entry).await?;

        let outcome = match result.outcome {
            DispatchOutcome::Advance(Some(next)) => {
                execution.current_node_id = next;
                StepOutcome::Continue(next)
            }
            DispatchOutcome::Advance(None) => {
                execution.complete(now);
                StepOutcome::Complete
            }
            DispatchOutcome::AwaitTimer(resume_at) => {
                execution.next_run_at = Some(resume_at);
                StepOutcome::Suspend(Suspension::Timer { resume_at })
            }
            DispatchOutcome::AwaitReply => match execution.conversation_id {
                Some(conversation_id) => {
                    let pending = PendingInput::new(execution.id, conversation_id, node.id);
                    self.store.create_pending_input(&pending).await?;
                    execution.status = ExecutionStatus::WaitingInput;
                    StepOutcome::Suspend(Suspension::Reply {
                        pending_input_id: pending.id,
                    })
                }
                None => {
                    let message = "node requires a reply but the execution has no conversation";
                    self.store
                        .append_log(&ExecutionLogEntry::error(
                            execution.id,
                            Some(node.id),
                            message,
                        ))
                        .await?;
                    execution.fail("reply_without_conversation", now);
                    StepOutcome::Fail {
                        reason: "reply_without_conversation".to_string(),
                    }
                }
            },
            DispatchOutcome::Fail { message, .. } => {
                execution.fail(message.clone(), now);
                StepOutcome::Fail { reason: message }
            }
        };

        self.store.update_execution(execution).await?;
        Ok(outcome)
    }

    /// Drives an execution until it completes, fails, or suspends.
    ///
    /// Holds the per-execution run lock for the whole loop, so a
    /// double-enqueued execution is stepped by one runner at a time; the
    /// second runner then observes the terminal or suspended state and
    /// performs no side effects. The execution is re-read from the store
    /// before every step so an operator cancel is observed promptly, and
    /// an elapsed timer is claimed conditionally so cross-process
    /// runners resume it at most once.
    ///
    /// # Errors
    ///
    /// Returns an error if the execution does not exist or the store
    /// fails.
    pub async fn run(&self, execution_id: ExecutionId) -> Result<RunOutcome, EngineError> {
        let lock = self.run_lock(execution_id);
        let _guard = lock.lock().await;

        let outcome = self.run_loop(execution_id).await;
        if matches!(
            outcome,
            Ok(RunOutcome::Completed | RunOutcome::Failed { .. } | RunOutcome::Cancelled)
        ) {
            self.release_run_lock(execution_id);
        }
        outcome
    }

    async fn run_loop(&self, execution_id: ExecutionId) -> Result<RunOutcome, EngineError> {
        loop {
            let mut execution = self
                .store
                .get_execution(execution_id)
                .await?
                .ok_or(EngineError::ExecutionNotFound { execution_id })?;

            match execution.status {
                ExecutionStatus::Completed => return Ok(RunOutcome::Completed),
                ExecutionStatus::Failed => {
                    return Ok(RunOutcome::Failed {
                        reason: execution.error_message.unwrap_or_default(),
                    });
                }
                ExecutionStatus::Cancelled => {
                    tracing::info!(
                        execution_id = %execution_id,
                        node_id = %execution.current_node_id,
                        "execution cancelled, halting"
                    );
                    return Ok(RunOutcome::Cancelled);
                }
                ExecutionStatus::WaitingInput => return Ok(RunOutcome::WaitingReply),
                ExecutionStatus::Running => {}
            }

            if let Some(resume_at) = execution.next_run_at {
                let now = Utc::now();
                if now < resume_at {
                    return Ok(RunOutcome::WaitingTimer { resume_at });
                }

                // Compute the landing node first; the claim then performs
                // the whole resume transition in one conditional update,
                // so concurrent runners never re-dispatch the wait node.
                let next = match next_default(&execution.definition, execution.current_node_id) {
                    Ok(next) => next,
                    Err(message) => {
                        execution.fail(message.clone(), now);
                        self.store.update_execution(&execution).await?;
                        return Ok(RunOutcome::Failed { reason: message });
                    }
                };

                if !self.store.claim_timer(execution.id, resume_at, next).await? {
                    // Another runner claimed the timer.
                    return Ok(RunOutcome::WaitingTimer { resume_at });
                }
                self.store
                    .append_log(&ExecutionLogEntry::info(
                        execution.id,
                        Some(execution.current_node_id),
                        "wait elapsed, resuming",
                    ))
                    .await?;

                match next {
                    Some(_) => continue,
                    None => return Ok(RunOutcome::Completed),
                }
            }

            match self.step(&mut execution).await? {
                StepOutcome::Continue(_) => {}
                StepOutcome::Complete => return Ok(RunOutcome::Completed),
                StepOutcome::Fail { reason } => return Ok(RunOutcome::Failed { reason }),
                StepOutcome::Suspend(Suspension::Timer { resume_at }) => {
                    return Ok(RunOutcome::WaitingTimer { resume_at });
                }
                StepOutcome::Suspend(Suspension::Reply { .. }) => {
                    return Ok(RunOutcome::WaitingReply);
                }
            }
        }
    }

    /// Resumes an execution suspended at `pending_node_id` after a reply.
    ///
    /// Merges the reply payload into the context, then continues strictly
    /// at the node following the pending one.
    ///
    /// # Errors
    ///
    /// Returns an error if the execution does not exist or the store
    /// fails.
    pub async fn resume_after_reply(
        &self,
        execution_id: ExecutionId,
        pending_node_id: NodeId,
        payload: JsonValue,
    ) -> Result<RunOutcome, EngineError> {
        let mut execution = self
            .store
            .get_execution(execution_id)
            .await?
            .ok_or(EngineError::ExecutionNotFound { execution_id })?;

        if execution.is_terminal() {
            return Ok(match execution.status {
                ExecutionStatus::Completed => RunOutcome::Completed,
                ExecutionStatus::Cancelled => RunOutcome::Cancelled,
                _ => RunOutcome::Failed {
                    reason: execution.error_message.unwrap_or_default(),
                },
            });
        }

        let now = Utc::now();
        execution.context.merge(payload);
        execution.status = ExecutionStatus::Running;
        self.store
            .append_log(&ExecutionLogEntry::info(
                execution.id,
                Some(pending_node_id),
                "reply received, resuming",
            ))
            .await?;

        match next_default(&execution.definition, pending_node_id) {
            Ok(Some(next)) => {
                execution.current_node_id = next;
                self.store.update_execution(&execution).await?;
                self.run(execution_id).await
            }
            Ok(None) => {
                execution.complete(now);
                self.store.update_execution(&execution).await?;
                Ok(RunOutcome::Completed)
            }
            Err(message) => {
                execution.fail(message.clone(), now);
                self.store.update_execution(&execution).await?;
                Ok(RunOutcome::Failed { reason: message })
            }
        }
    }

    /// Cancels an execution if it is not already terminal.
    ///
    /// Returns true if the cancel was applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the execution does not exist or the store
    /// fails.
    pub async fn cancel(&self, execution_id: ExecutionId) -> Result<bool, EngineError> {
        let mut execution = self
            .store
            .get_execution(execution_id)
            .await?
            .ok_or(EngineError::ExecutionNotFound { execution_id })?;

        if execution.is_terminal() {
            return Ok(false);
        }

        execution.cancel(Utc::now());
        self.store
            .append_log(&ExecutionLogEntry::warn(
                execution.id,
                Some(execution.current_node_id),
                "execution cancelled by operator",
            ))
            .await?;
        self.store.update_execution(&execution).await?;
        Ok(true)
    }

    /// Returns the store this engine persists through.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ExecutionStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::PendingInputStatus;
    use crate::memory::InMemoryStore;
    use leadflow_adapters::error::NetworkError;
    use leadflow_adapters::recording::RecordingAdapters;
    use leadflow_core::{ConversationId, OrganizationId};
    use leadflow_workflow::condition::{CompareOp, Comparison};
    use leadflow_workflow::node::{BranchRule, HttpMethod, WaitUnit};
    use leadflow_workflow::trigger::{Channel, NormalizedEvent, TriggerConfig};
    use serde_json::json;

    fn keyword_trigger() -> TriggerConfig {
        TriggerConfig::MessageReceived {
            keywords: vec![],
            channel: None,
        }
    }

    fn message_event(org: OrganizationId, text: &str) -> NormalizedEvent {
        NormalizedEvent::message_received(org, ConversationId::new(), Channel::Whatsapp, text)
            .with_sender("+5215550001111")
    }

    fn message_node(name: &str, content: &str) -> Node {
        Node::new(
            name,
            NodeConfig::SendMessage {
                channel: Channel::Whatsapp,
                content: content.to_string(),
                requires_reply: false,
            },
        )
    }

    struct Harness {
        store: InMemoryStore,
        recorder: RecordingAdapters,
        engine: ExecutionEngine,
    }

    fn harness_with(recorder: RecordingAdapters) -> Harness {
        let store = InMemoryStore::new();
        let engine = ExecutionEngine::new(Arc::new(store.clone()), recorder.as_adapter_set());
        Harness {
            store,
            recorder,
            engine,
        }
    }

    fn harness() -> Harness {
        harness_with(RecordingAdapters::new())
    }

    async fn start(harness: &Harness, definition: WorkflowDefinition, event: &NormalizedEvent) -> ExecutionId {
        let execution = Execution::new(definition, event).unwrap();
        let id = execution.id;
        harness.store.create_execution(&execution).await.unwrap();
        id
    }

    fn linear_definition(org: OrganizationId) -> WorkflowDefinition {
        let mut definition = WorkflowDefinition::new(org, "Quote responder", keyword_trigger());
        let trigger = Node::new("Entry", NodeConfig::Trigger);
        let reply = message_node("Reply", "Aquí tu cotización");
        let trigger_id = trigger.id;
        let reply_id = reply.id;
        definition.graph.add_node(trigger).unwrap();
        definition.graph.add_node(reply).unwrap();
        definition
            .graph
            .add_edge(trigger_id, reply_id, Edge::unlabeled())
            .unwrap();
        definition
    }

    #[tokio::test]
    async fn linear_workflow_runs_to_completion() {
        let harness = harness();
        let org = OrganizationId::new();
        let definition = linear_definition(org);
        let event = message_event(org, "cual es el precio?");
        let execution_id = start(&harness, definition, &event).await;

        let outcome = harness.engine.run(execution_id).await.unwrap();
        assert_eq!(outcome, RunOutcome::Completed);

        let execution = harness
            .store
            .get_execution(execution_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert!(execution.completed_at.is_some());

        // One adapter call, with the rendered content.
        let calls = harness.recorder.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].params["content"], "Aquí tu cotización");

        // Log entries for the trigger node and the send node.
        let logs = harness.store.list_logs(execution_id).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert!(logs[1].message.contains("message sent"));
    }

    #[tokio::test]
    async fn template_interpolation_uses_event_payload() {
        let harness = harness();
        let org = OrganizationId::new();
        let mut definition = WorkflowDefinition::new(org, "Echo", keyword_trigger());
        let trigger = Node::new("Entry", NodeConfig::Trigger);
        let echo = message_node("Echo", "Recibido: {{message}}");
        let trigger_id = trigger.id;
        let echo_id = echo.id;
        definition.graph.add_node(trigger).unwrap();
        definition.graph.add_node(echo).unwrap();
        definition
            .graph
            .add_edge(trigger_id, echo_id, Edge::unlabeled())
            .unwrap();

        let event = message_event(org, "hola");
        let execution_id = start(&harness, definition, &event).await;
        harness.engine.run(execution_id).await.unwrap();

        let calls = harness.recorder.calls();
        assert_eq!(calls[0].params["content"], "Recibido: hola");
    }

    #[tokio::test]
    async fn wait_node_parks_the_execution() {
        let harness = harness();
        let org = OrganizationId::new();
        let mut definition = WorkflowDefinition::new(org, "Follow up", keyword_trigger());
        let trigger = Node::new("Entry", NodeConfig::Trigger);
        let wait = Node::new(
            "Pause",
            NodeConfig::Wait {
                duration: 1,
                unit: WaitUnit::Hours,
            },
        );
        let follow_up = message_node("Follow up", "sigues ahi?");
        let trigger_id = trigger.id;
        let wait_id = wait.id;
        let follow_up_id = follow_up.id;
        definition.graph.add_node(trigger).unwrap();
        definition.graph.add_node(wait).unwrap();
        definition.graph.add_node(follow_up).unwrap();
        definition
            .graph
            .add_edge(trigger_id, wait_id, Edge::unlabeled())
            .unwrap();
        definition
            .graph
            .add_edge(wait_id, follow_up_id, Edge::unlabeled())
            .unwrap();

        let event = message_event(org, "hola");
        let execution_id = start(&harness, definition, &event).await;

        let outcome = harness.engine.run(execution_id).await.unwrap();
        let RunOutcome::WaitingTimer { resume_at } = outcome else {
            panic!("expected timer suspension, got {outcome:?}");
        };
        assert!(resume_at > Utc::now() + chrono::Duration::minutes(59));

        // A premature run must not advance it.
        let outcome = harness.engine.run(execution_id).await.unwrap();
        assert!(matches!(outcome, RunOutcome::WaitingTimer { .. }));
        assert!(harness.recorder.calls().is_empty());

        // Simulate the timer elapsing.
        let mut execution = harness
            .store
            .get_execution(execution_id)
            .await
            .unwrap()
            .unwrap();
        execution.next_run_at = Some(Utc::now() - chrono::Duration::seconds(1));
        harness.store.update_execution(&execution).await.unwrap();

        let outcome = harness.engine.run(execution_id).await.unwrap();
        assert_eq!(outcome, RunOutcome::Completed);
        assert_eq!(harness.recorder.calls().len(), 1);
    }

    #[tokio::test]
    async fn requires_reply_suspends_with_pending_input() {
        let harness = harness();
        let org = OrganizationId::new();
        let mut definition = WorkflowDefinition::new(org, "Ask budget", keyword_trigger());
        let trigger = Node::new("Entry", NodeConfig::Trigger);
        let ask = Node::new(
            "Ask",
            NodeConfig::SendMessage {
                channel: Channel::Whatsapp,
                content: "cual es tu presupuesto?".to_string(),
                requires_reply: true,
            },
        );
        let thanks = message_node("Thanks", "gracias!");
        let trigger_id = trigger.id;
        let ask_id = ask.id;
        let thanks_id = thanks.id;
        definition.graph.add_node(trigger).unwrap();
        definition.graph.add_node(ask).unwrap();
        definition.graph.add_node(thanks).unwrap();
        definition
            .graph
            .add_edge(trigger_id, ask_id, Edge::unlabeled())
            .unwrap();
        definition
            .graph
            .add_edge(ask_id, thanks_id, Edge::unlabeled())
            .unwrap();

        let event = message_event(org, "hola");
        let conversation_id = event.conversation_id.unwrap();
        let execution_id = start(&harness, definition, &event).await;

        let outcome = harness.engine.run(execution_id).await.unwrap();
        assert_eq!(outcome, RunOutcome::WaitingReply);

        let execution = harness
            .store
            .get_execution(execution_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(execution.status, ExecutionStatus::WaitingInput);
        assert_eq!(execution.current_node_id, ask_id);

        let pending = harness
            .store
            .find_waiting_pending_input(conversation_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pending.execution_id, execution_id);
        assert_eq!(pending.node_id, ask_id);
        assert_eq!(pending.status, PendingInputStatus::Waiting);
    }

    #[tokio::test]
    async fn resume_after_reply_continues_at_following_node() {
        let harness = harness();
        let org = OrganizationId::new();
        let mut definition = WorkflowDefinition::new(org, "Qualify", keyword_trigger());
        let trigger = Node::new("Entry", NodeConfig::Trigger);
        let ask = Node::new(
            "Ask",
            NodeConfig::SendMessage {
                channel: Channel::Whatsapp,
                content: "presupuesto?".to_string(),
                requires_reply: true,
            },
        );
        let gate = Node::new(
            "Gate",
            NodeConfig::Condition {
                rules: vec![
                    BranchRule {
                        label: "qualified".to_string(),
                        comparison: Comparison::new("budget", CompareOp::Gt, json!(1000)),
                    },
                    BranchRule {
                        label: "nurture".to_string(),
                        comparison: Comparison::new("budget", CompareOp::Lte, json!(1000)),
                    },
                ],
            },
        );
        let qualified = message_node("Qualified", "un asesor te contactara");
        let nurture = message_node("Nurture", "te enviamos opciones economicas");
        let trigger_id = trigger.id;
        let ask_id = ask.id;
        let gate_id = gate.id;
        let qualified_id = qualified.id;
        let nurture_id = nurture.id;
        definition.graph.add_node(trigger).unwrap();
        definition.graph.add_node(ask).unwrap();
        definition.graph.add_node(gate).unwrap();
        definition.graph.add_node(qualified).unwrap();
        definition.graph.add_node(nurture).unwrap();
        definition
            .graph
            .add_edge(trigger_id, ask_id, Edge::unlabeled())
            .unwrap();
        definition
            .graph
            .add_edge(ask_id, gate_id, Edge::unlabeled())
            .unwrap();
        definition
            .graph
            .add_edge(gate_id, qualified_id, Edge::labeled("qualified"))
            .unwrap();
        definition
            .graph
            .add_edge(gate_id, nurture_id, Edge::labeled("nurture"))
            .unwrap();

        let event = message_event(org, "hola");
        let execution_id = start(&harness, definition, &event).await;
        harness.engine.run(execution_id).await.unwrap();

        let outcome = harness
            .engine
            .resume_after_reply(execution_id, ask_id, json!({"budget": 1500}))
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::Completed);

        let execution = harness
            .store
            .get_execution(execution_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(execution.status, ExecutionStatus::Completed);
        // Ended on the qualified branch's terminal node.
        assert_eq!(execution.current_node_id, qualified_id);
        assert_eq!(execution.context.get("budget"), Some(json!(1500)));

        // Ask + qualified message were sent; nurture was not.
        let calls = harness.recorder.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].params["content"], "un asesor te contactara");
    }

    #[tokio::test]
    async fn http_failure_without_error_edge_fails_execution() {
        let recorder = RecordingAdapters::new().with_http_failure(NetworkError::ConnectionFailed {
            reason: "host unreachable".to_string(),
        });
        let harness = harness_with(recorder);
        let org = OrganizationId::new();
        let mut definition = WorkflowDefinition::new(org, "Webhook", keyword_trigger());
        let trigger = Node::new("Entry", NodeConfig::Trigger);
        let call = Node::new(
            "Call",
            NodeConfig::HttpRequest {
                method: HttpMethod::Post,
                url: "https://unreachable.example.com/hook".to_string(),
                headers: BTreeMap::new(),
                body: None,
            },
        );
        let after = message_node("After", "nunca llega");
        let trigger_id = trigger.id;
        let call_id = call.id;
        let after_id = after.id;
        definition.graph.add_node(trigger).unwrap();
        definition.graph.add_node(call).unwrap();
        definition.graph.add_node(after).unwrap();
        definition
            .graph
            .add_edge(trigger_id, call_id, Edge::unlabeled())
            .unwrap();
        definition
            .graph
            .add_edge(call_id, after_id, Edge::unlabeled())
            .unwrap();

        let event = message_event(org, "hola");
        let execution_id = start(&harness, definition, &event).await;

        let outcome = harness.engine.run(execution_id).await.unwrap();
        assert!(matches!(outcome, RunOutcome::Failed { .. }));

        let execution = harness
            .store
            .get_execution(execution_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(execution.status, ExecutionStatus::Failed);

        // One error-level entry carrying the network error kind, and no
        // node visited after the HTTP node.
        let logs = harness.store.list_logs(execution_id).await.unwrap();
        let errors: Vec<_> = logs
            .iter()
            .filter(|entry| entry.level == LogLevel::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].node_id, Some(call_id));
        assert_eq!(
            errors[0].details.as_ref().unwrap()["kind"],
            "connection_failed"
        );
        // Only the HTTP call was attempted; the follow-up message never sent.
        let calls = harness.recorder.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].adapter, "http");
    }

    #[tokio::test]
    async fn http_failure_with_error_edge_continues() {
        let recorder = RecordingAdapters::new().with_http_response(500, "oops");
        let harness = harness_with(recorder);
        let org = OrganizationId::new();
        let mut definition = WorkflowDefinition::new(org, "Webhook", keyword_trigger());
        let trigger = Node::new("Entry", NodeConfig::Trigger);
        let call = Node::new(
            "Call",
            NodeConfig::HttpRequest {
                method: HttpMethod::Get,
                url: "https://example.com/hook".to_string(),
                headers: BTreeMap::new(),
                body: None,
            },
        );
        let ok = message_node("Ok", "todo bien");
        let fallback = message_node("Fallback", "hubo un problema");
        let trigger_id = trigger.id;
        let call_id = call.id;
        let ok_id = ok.id;
        let fallback_id = fallback.id;
        definition.graph.add_node(trigger).unwrap();
        definition.graph.add_node(call).unwrap();
        definition.graph.add_node(ok).unwrap();
        definition.graph.add_node(fallback).unwrap();
        definition
            .graph
            .add_edge(trigger_id, call_id, Edge::unlabeled())
            .unwrap();
        definition
            .graph
            .add_edge(call_id, ok_id, Edge::labeled(Edge::SUCCESS))
            .unwrap();
        definition
            .graph
            .add_edge(call_id, fallback_id, Edge::labeled(Edge::ERROR))
            .unwrap();

        let event = message_event(org, "hola");
        let execution_id = start(&harness, definition, &event).await;

        let outcome = harness.engine.run(execution_id).await.unwrap();
        assert_eq!(outcome, RunOutcome::Completed);

        // The fallback message was sent, not the success one.
        let calls = harness.recorder.calls();
        let sent: Vec<_> = calls.iter().filter(|c| c.adapter == "messages").collect();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].params["content"], "hubo un problema");

        // The failure-and-continue is logged as a warning.
        let logs = harness.store.list_logs(execution_id).await.unwrap();
        assert!(logs
            .iter()
            .any(|entry| entry.level == LogLevel::Warn
                && entry.message.contains("continuing along error edge")));
    }

    #[tokio::test]
    async fn http_success_edge_selected_on_2xx() {
        let harness = harness();
        let org = OrganizationId::new();
        let mut definition = WorkflowDefinition::new(org, "Webhook", keyword_trigger());
        let trigger = Node::new("Entry", NodeConfig::Trigger);
        let call = Node::new(
            "Call",
            NodeConfig::HttpRequest {
                method: HttpMethod::Get,
                url: "https://example.com/quote/{{message}}".to_string(),
                headers: BTreeMap::new(),
                body: None,
            },
        );
        let ok = message_node("Ok", "listo");
        let fallback = message_node("Fallback", "error");
        let trigger_id = trigger.id;
        let call_id = call.id;
        let ok_id = ok.id;
        let fallback_id = fallback.id;
        definition.graph.add_node(trigger).unwrap();
        definition.graph.add_node(call).unwrap();
        definition.graph.add_node(ok).unwrap();
        definition.graph.add_node(fallback).unwrap();
        definition
            .graph
            .add_edge(trigger_id, call_id, Edge::unlabeled())
            .unwrap();
        definition
            .graph
            .add_edge(call_id, ok_id, Edge::labeled(Edge::SUCCESS))
            .unwrap();
        definition
            .graph
            .add_edge(call_id, fallback_id, Edge::labeled(Edge::ERROR))
            .unwrap();

        let event = message_event(org, "A123");
        let execution_id = start(&harness, definition, &event).await;

        let outcome = harness.engine.run(execution_id).await.unwrap();
        assert_eq!(outcome, RunOutcome::Completed);

        let calls = harness.recorder.calls();
        // URL template interpolated from context.
        assert_eq!(calls[0].params["url"], "https://example.com/quote/A123");
        let sent: Vec<_> = calls.iter().filter(|c| c.adapter == "messages").collect();
        assert_eq!(sent[0].params["content"], "listo");
    }

    #[tokio::test]
    async fn condition_without_matching_rule_fails() {
        let harness = harness();
        let org = OrganizationId::new();
        let mut definition = WorkflowDefinition::new(org, "Gate only", keyword_trigger());
        let trigger = Node::new("Entry", NodeConfig::Trigger);
        let gate = Node::new(
            "Gate",
            NodeConfig::Condition {
                rules: vec![BranchRule {
                    label: "qualified".to_string(),
                    comparison: Comparison::new("budget", CompareOp::Gt, json!(1000)),
                }],
            },
        );
        let qualified = message_node("Qualified", "ok");
        let trigger_id = trigger.id;
        let gate_id = gate.id;
        let qualified_id = qualified.id;
        definition.graph.add_node(trigger).unwrap();
        definition.graph.add_node(gate).unwrap();
        definition.graph.add_node(qualified).unwrap();
        definition
            .graph
            .add_edge(trigger_id, gate_id, Edge::unlabeled())
            .unwrap();
        definition
            .graph
            .add_edge(gate_id, qualified_id, Edge::labeled("qualified"))
            .unwrap();

        // No budget in context, so no rule matches.
        let event = message_event(org, "hola");
        let execution_id = start(&harness, definition, &event).await;

        let outcome = harness.engine.run(execution_id).await.unwrap();
        assert_eq!(
            outcome,
            RunOutcome::Failed {
                reason: "no matching branch".to_string()
            }
        );
    }

    #[tokio::test]
    async fn cyclic_graph_hits_step_ceiling() {
        let store = InMemoryStore::new();
        let recorder = RecordingAdapters::new();
        let engine = ExecutionEngine::new(Arc::new(store.clone()), recorder.as_adapter_set())
            .with_limits(EngineLimits {
                max_steps: 10,
                max_duration: chrono::Duration::days(30),
            });
        let harness = Harness {
            store,
            recorder,
            engine,
        };

        let org = OrganizationId::new();
        let mut definition = WorkflowDefinition::new(org, "Loop", keyword_trigger());
        let trigger = Node::new("Entry", NodeConfig::Trigger);
        let ping = message_node("Ping", "ping");
        let gate = Node::new(
            "Gate",
            NodeConfig::Condition {
                rules: vec![BranchRule {
                    label: "again".to_string(),
                    comparison: Comparison::new("message", CompareOp::Exists, json!(null)),
                }],
            },
        );
        let trigger_id = trigger.id;
        let ping_id = ping.id;
        let gate_id = gate.id;
        definition.graph.add_node(trigger).unwrap();
        definition.graph.add_node(ping).unwrap();
        definition.graph.add_node(gate).unwrap();
        definition
            .graph
            .add_edge(trigger_id, ping_id, Edge::unlabeled())
            .unwrap();
        definition
            .graph
            .add_edge(ping_id, gate_id, Edge::unlabeled())
            .unwrap();
        definition
            .graph
            .add_edge(gate_id, ping_id, Edge::labeled("again"))
            .unwrap();

        let event = message_event(org, "hola");
        let execution_id = start(&harness, definition, &event).await;

        let outcome = harness.engine.run(execution_id).await.unwrap();
        assert_eq!(
            outcome,
            RunOutcome::Failed {
                reason: "step_limit_exceeded".to_string()
            }
        );

        let execution = harness
            .store
            .get_execution(execution_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(execution.steps_taken, 10);
    }

    #[tokio::test]
    async fn cancelled_execution_halts_before_stepping() {
        let harness = harness();
        let org = OrganizationId::new();
        let definition = linear_definition(org);
        let event = message_event(org, "hola");
        let execution_id = start(&harness, definition, &event).await;

        assert!(harness.engine.cancel(execution_id).await.unwrap());
        let outcome = harness.engine.run(execution_id).await.unwrap();
        assert_eq!(outcome, RunOutcome::Cancelled);
        assert!(harness.recorder.calls().is_empty());

        // Cancelling again is a no-op.
        assert!(!harness.engine.cancel(execution_id).await.unwrap());
    }

    #[tokio::test]
    async fn crm_action_with_requires_reply_suspends() {
        let harness = harness();
        let org = OrganizationId::new();
        let mut definition = WorkflowDefinition::new(org, "Budget intake", keyword_trigger());
        let trigger = Node::new("Entry", NodeConfig::Trigger);
        let intake = Node::new(
            "Ask for budget",
            NodeConfig::CrmAction {
                operation: CrmOperation::CreateLead {
                    fields: BTreeMap::from([("source".to_string(), json!("whatsapp"))]),
                },
                requires_reply: true,
            },
        );
        let thanks = message_node("Thanks", "gracias");
        let trigger_id = trigger.id;
        let intake_id = intake.id;
        let thanks_id = thanks.id;
        definition.graph.add_node(trigger).unwrap();
        definition.graph.add_node(intake).unwrap();
        definition.graph.add_node(thanks).unwrap();
        definition
            .graph
            .add_edge(trigger_id, intake_id, Edge::unlabeled())
            .unwrap();
        definition
            .graph
            .add_edge(intake_id, thanks_id, Edge::unlabeled())
            .unwrap();

        let event = message_event(org, "hola");
        let execution_id = start(&harness, definition, &event).await;

        let outcome = harness.engine.run(execution_id).await.unwrap();
        assert_eq!(outcome, RunOutcome::WaitingReply);

        // The CRM mutation happened before the suspension.
        let calls = harness.recorder.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].operation, "create_lead");

        let execution = harness
            .store
            .get_execution(execution_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(execution.status, ExecutionStatus::WaitingInput);
        assert_eq!(execution.current_node_id, intake_id);

        // The reply resumes at the node after the CRM node.
        let outcome = harness
            .engine
            .resume_after_reply(execution_id, intake_id, json!({"budget": 1500}))
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::Completed);
        let execution = harness
            .store
            .get_execution(execution_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(execution.current_node_id, thanks_id);
    }

    #[tokio::test]
    async fn crm_create_lead_binds_lead_for_later_nodes() {
        let harness = harness();
        let org = OrganizationId::new();
        let mut definition = WorkflowDefinition::new(org, "Lead intake", keyword_trigger());
        let trigger = Node::new("Entry", NodeConfig::Trigger);
        let create = Node::new(
            "Create lead",
            NodeConfig::CrmAction {
                operation: CrmOperation::CreateLead {
                    fields: BTreeMap::from([
                        ("name".to_string(), json!("{{sender}}")),
                        ("source".to_string(), json!("whatsapp")),
                    ]),
                },
                requires_reply: false,
            },
        );
        let tag = Node::new(
            "Tag",
            NodeConfig::CrmAction {
                operation: CrmOperation::AddTag {
                    tag: "inbound".to_string(),
                },
                requires_reply: false,
            },
        );
        let trigger_id = trigger.id;
        let create_id = create.id;
        let tag_id = tag.id;
        definition.graph.add_node(trigger).unwrap();
        definition.graph.add_node(create).unwrap();
        definition.graph.add_node(tag).unwrap();
        definition
            .graph
            .add_edge(trigger_id, create_id, Edge::unlabeled())
            .unwrap();
        definition
            .graph
            .add_edge(create_id, tag_id, Edge::unlabeled())
            .unwrap();

        let event = message_event(org, "quiero info");
        let execution_id = start(&harness, definition, &event).await;

        let outcome = harness.engine.run(execution_id).await.unwrap();
        assert_eq!(outcome, RunOutcome::Completed);

        let calls = harness.recorder.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].operation, "create_lead");
        assert_eq!(calls[0].params["fields"]["name"], "+5215550001111");
        assert_eq!(calls[1].operation, "add_tag");

        let execution = harness
            .store
            .get_execution(execution_id)
            .await
            .unwrap()
            .unwrap();
        assert!(execution.context.get("lead_id").is_some());
    }
}
