//! Dry-run test executor.
//!
//! Walks a definition with the exact same dispatch code path as the live
//! engine, but with recording stub adapters and no durable state: no
//! execution row, no pending-input record, no log row. Wait nodes advance
//! immediately; requires-reply nodes merge the configured test reply and
//! continue. Branch selection and step ceilings are identical to live
//! execution, so a passing dry run predicts live behavior.

use crate::engine::{DispatchOutcome, EngineLimits, dispatch_node, next_default};
use crate::execution::{Execution, LogLevel};
use chrono::Utc;
use leadflow_adapters::adapter::AdapterSet;
use leadflow_adapters::recording::{RecordedCall, RecordingAdapters};
use leadflow_workflow::definition::WorkflowDefinition;
use leadflow_workflow::error::DefinitionError;
use leadflow_workflow::node::{NodeId, NodeKind};
use leadflow_workflow::trigger::NormalizedEvent;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Input for a dry run: the simulated trigger event and, optionally, the
/// reply a requires-reply node should receive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestData {
    /// The simulated trigger event.
    pub event: NormalizedEvent,
    /// Payload merged into the context when a requires-reply node is hit.
    #[serde(default)]
    pub reply: Option<JsonValue>,
}

/// Terminal outcome of a dry run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TestOutcome {
    /// The walk reached a terminal node.
    Completed,
    /// The walk failed.
    Failed { reason: String },
}

/// One visited node in a dry run.
#[derive(Debug, Clone, Serialize)]
pub struct TestStep {
    /// The visited node.
    pub node_id: NodeId,
    /// Its name.
    pub node_name: String,
    /// Its kind.
    pub kind: NodeKind,
    /// The log level the live engine would have used.
    pub level: LogLevel,
    /// The log message the live engine would have written.
    pub message: String,
}

/// The full result of a dry run.
#[derive(Debug, Clone, Serialize)]
pub struct TestRunReport {
    /// Terminal outcome.
    pub outcome: TestOutcome,
    /// Node IDs in visit order.
    pub visited: Vec<NodeId>,
    /// Per-node records.
    pub steps: Vec<TestStep>,
    /// The context after the walk.
    pub final_context: JsonValue,
    /// Every adapter call that would have been made.
    pub calls: Vec<RecordedCall>,
}

/// Runs definitions in dry-run mode.
#[derive(Debug, Clone, Default)]
pub struct TestExecutor {
    limits: EngineLimits,
}

impl TestExecutor {
    /// Creates an executor with the default engine limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the termination ceilings (kept identical to the live
    /// engine's configuration by the caller).
    #[must_use]
    pub fn with_limits(mut self, limits: EngineLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Starts a step-by-step session (interactive debugger mode).
    ///
    /// # Errors
    ///
    /// Returns an error if the definition has no unique entry node.
    pub fn session(
        &self,
        definition: WorkflowDefinition,
        test_data: TestData,
    ) -> Result<TestSession, DefinitionError> {
        let execution = Execution::new(definition, &test_data.event)?;
        let recorder = RecordingAdapters::new();
        let adapters = recorder.as_adapter_set();
        Ok(TestSession {
            execution,
            recorder,
            adapters,
            reply: test_data.reply,
            limits: self.limits,
            visited: Vec::new(),
            steps: Vec::new(),
            outcome: None,
        })
    }

    /// Runs a definition to its terminal outcome in one call.
    ///
    /// # Errors
    ///
    /// Returns an error if the definition has no unique entry node.
    pub async fn execute(
        &self,
        definition: WorkflowDefinition,
        test_data: TestData,
    ) -> Result<TestRunReport, DefinitionError> {
        let mut session = self.session(definition, test_data)?;
        while session.step().await.is_some() {}
        Ok(session.into_report())
    }
}

/// An in-progress dry run, advanced one node at a time.
pub struct TestSession {
    execution: Execution,
    recorder: RecordingAdapters,
    adapters: AdapterSet,
    reply: Option<JsonValue>,
    limits: EngineLimits,
    visited: Vec<NodeId>,
    steps: Vec<TestStep>,
    outcome: Option<TestOutcome>,
}

impl TestSession {
    /// Advances one node. Returns `None` once the walk has finished.
    pub async fn step(&mut self) -> Option<TestStep> {
        if self.outcome.is_some() {
            return None;
        }

        if self.execution.steps_taken >= self.limits.max_steps {
            self.outcome = Some(TestOutcome::Failed {
                reason: "step_limit_exceeded".to_string(),
            });
            return None;
        }

        let Some(node) = self
            .execution
            .definition
            .graph
            .get_node(self.execution.current_node_id)
            .cloned()
        else {
            self.outcome = Some(TestOutcome::Failed {
                reason: format!(
                    "current node {} not found in definition",
                    self.execution.current_node_id
                ),
            });
            return None;
        };

        self.execution.steps_taken += 1;
        self.visited.push(node.id);

        let result = dispatch_node(
            &self.execution.definition,
            &node,
            &mut self.execution.context,
            &self.adapters,
            Utc::now(),
        )
        .await;

        let mut level = result.level;
        let mut message = result.message;

        match result.outcome {
            DispatchOutcome::Advance(Some(next)) => {
                self.execution.current_node_id = next;
            }
            DispatchOutcome::Advance(None) => {
                self.outcome = Some(TestOutcome::Completed);
            }
            DispatchOutcome::AwaitTimer(_) => {
                // Dry runs do not park; note the suspension and step over
                // the wait node.
                message = format!("{message} (dry run: not waiting)");
                self.advance_past(node.id);
            }
            DispatchOutcome::AwaitReply => {
                if let Some(reply) = self.reply.take() {
                    message = format!("{message} (dry run: simulated reply merged)");
                    self.execution.context.merge(reply);
                } else {
                    level = LogLevel::Warn;
                    message = format!("{message} (dry run: no simulated reply provided)");
                }
                self.advance_past(node.id);
            }
            DispatchOutcome::Fail { message: reason, .. } => {
                self.outcome = Some(TestOutcome::Failed { reason });
            }
        }

        let step = TestStep {
            node_id: node.id,
            node_name: node.name,
            kind: node.config.kind(),
            level,
            message,
        };
        self.steps.push(step.clone());
        Some(step)
    }

    /// Advances the walk to the node after `node_id`, or completes.
    fn advance_past(&mut self, node_id: NodeId) {
        match next_default(&self.execution.definition, node_id) {
            Ok(Some(next)) => self.execution.current_node_id = next,
            Ok(None) => self.outcome = Some(TestOutcome::Completed),
            Err(reason) => self.outcome = Some(TestOutcome::Failed { reason }),
        }
    }

    /// Returns the terminal outcome, if the walk has finished.
    #[must_use]
    pub fn outcome(&self) -> Option<&TestOutcome> {
        self.outcome.as_ref()
    }

    /// Consumes the session into its report.
    #[must_use]
    pub fn into_report(self) -> TestRunReport {
        TestRunReport {
            outcome: self.outcome.unwrap_or(TestOutcome::Failed {
                reason: "dry run stopped before reaching a terminal node".to_string(),
            }),
            visited: self.visited,
            steps: self.steps,
            final_context: self.execution.context.as_value(),
            calls: self.recorder.calls(),
        }
    }
}
