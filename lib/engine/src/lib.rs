//! Workflow execution engine for the leadflow automation platform.
//!
//! This crate owns everything that happens between a matched trigger and a
//! finished execution:
//!
//! - **Execution state machine**: one row per run, advanced strictly
//!   sequentially, persisted after every step
//! - **Node dispatch**: a tagged-variant dispatch table shared by live
//!   execution and dry runs
//! - **Suspension**: timer parking for Wait nodes and pending-input
//!   records for nodes awaiting a human reply
//! - **Trigger evaluation**: fire-and-forget execution startup from
//!   normalized events
//! - **Dry runs**: side-effect-free simulation with recorded adapter calls
//! - **Stores and queues**: persistence traits with an in-memory
//!   implementation, and a NATS JetStream work queue for distributing runs
//!
//! Automation is never allowed to fail the ingestion path that triggered
//! it: evaluator and queue errors are logged and swallowed at the
//! boundary.

pub mod context;
pub mod dry_run;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod execution;
pub mod memory;
pub mod nats;
pub mod pending;
pub mod queue;
pub mod store;

pub use context::ExecutionContext;
pub use dry_run::{TestData, TestExecutor, TestOutcome, TestRunReport, TestSession};
pub use engine::{EngineLimits, ExecutionEngine, RunOutcome, StepOutcome, Suspension};
pub use error::EngineError;
pub use evaluator::{ExecutionHandle, TriggerEvaluator};
pub use execution::{
    Execution, ExecutionLogEntry, ExecutionStatus, LogLevel, PendingInput, PendingInputStatus,
};
pub use memory::InMemoryStore;
pub use pending::{PendingInputManager, ReplyOutcome};
pub use queue::{ExecutionQueue, QueueError, TokioExecutionQueue};
pub use store::{ExecutionStore, StoreError, WorkflowStore};
