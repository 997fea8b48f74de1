//! Shared application state for the HTTP API.

use chrono::Duration;
use leadflow_engine::dry_run::TestExecutor;
use leadflow_engine::engine::{EngineLimits, ExecutionEngine};
use leadflow_engine::evaluator::TriggerEvaluator;
use leadflow_engine::pending::PendingInputManager;
use leadflow_engine::queue::ExecutionQueue;
use leadflow_engine::store::{ExecutionStore, WorkflowStore};
use std::sync::Arc;

/// Everything the API handlers need.
pub struct AppState {
    /// Workflow definition storage.
    pub workflows: Arc<dyn WorkflowStore>,
    /// Execution/log/pending-input storage.
    pub executions: Arc<dyn ExecutionStore>,
    /// The execution engine.
    pub engine: ExecutionEngine,
    /// Trigger evaluation for inbound events.
    pub evaluator: TriggerEvaluator,
    /// Pending-input resolution for external replies.
    pub pending: PendingInputManager,
    /// Dry-run executor, configured with the live engine's limits.
    pub test_executor: TestExecutor,
}

impl AppState {
    /// Wires the state from its parts.
    #[must_use]
    pub fn new(
        workflows: Arc<dyn WorkflowStore>,
        executions: Arc<dyn ExecutionStore>,
        engine: ExecutionEngine,
        queue: Arc<dyn ExecutionQueue>,
        limits: EngineLimits,
        pending_ttl: Duration,
    ) -> Self {
        let evaluator = TriggerEvaluator::new(workflows.clone(), executions.clone(), queue);
        let pending =
            PendingInputManager::new(executions.clone(), engine.clone()).with_ttl(pending_ttl);
        let test_executor = TestExecutor::new().with_limits(limits);

        Self {
            workflows,
            executions,
            engine,
            evaluator,
            pending,
            test_executor,
        }
    }
}
