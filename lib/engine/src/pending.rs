//! Pending-input manager: suspension on human replies.
//!
//! The engine suspends a requires-reply node by writing a waiting
//! `PendingInput` record; resumption is driven entirely from the outside
//! through [`PendingInputManager::on_external_reply`]. Resolution is a
//! conditional status transition, so when two replies race on one
//! conversation only the first resumes the execution and the second is an
//! ordinary reply with no matching pending input.

use crate::engine::{ExecutionEngine, RunOutcome};
use crate::error::EngineError;
use crate::execution::ExecutionLogEntry;
use crate::store::ExecutionStore;
use chrono::{DateTime, Duration, Utc};
use leadflow_core::{ConversationId, ExecutionId};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Default time a workflow may hold state waiting for a human reply.
const DEFAULT_TTL_HOURS: i64 = 24;

/// The result of handing an external reply to the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// No automation was waiting on this conversation (the normal case
    /// for most replies).
    NoPendingInput,
    /// The reply resolved a pending input and the execution resumed.
    Resumed {
        execution_id: ExecutionId,
        outcome: RunOutcome,
    },
}

/// Resolves pending inputs and expires the ones nobody answered.
#[derive(Clone)]
pub struct PendingInputManager {
    store: Arc<dyn ExecutionStore>,
    engine: ExecutionEngine,
    ttl: Duration,
}

impl PendingInputManager {
    /// Creates a manager with the default 24-hour TTL.
    #[must_use]
    pub fn new(store: Arc<dyn ExecutionStore>, engine: ExecutionEngine) -> Self {
        Self {
            store,
            engine,
            ttl: Duration::hours(DEFAULT_TTL_HOURS),
        }
    }

    /// Overrides the waiting TTL.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Handles an external reply on a conversation.
    ///
    /// Finds the waiting pending input for the conversation (if any),
    /// resolves it, merges the payload into the owning execution's
    /// context, and resumes the engine at the node after the pending one.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails; an unmatched reply is a
    /// normal [`ReplyOutcome::NoPendingInput`], not an error.
    pub async fn on_external_reply(
        &self,
        conversation_id: ConversationId,
        payload: JsonValue,
    ) -> Result<ReplyOutcome, EngineError> {
        let Some(pending) = self.store.find_waiting_pending_input(conversation_id).await? else {
            return Ok(ReplyOutcome::NoPendingInput);
        };

        // Conditional transition: a racing reply loses here and is
        // treated as an ordinary reply.
        if !self
            .store
            .resolve_pending_input(pending.id, Utc::now())
            .await?
        {
            return Ok(ReplyOutcome::NoPendingInput);
        }

        let outcome = self
            .engine
            .resume_after_reply(pending.execution_id, pending.node_id, payload)
            .await?;

        Ok(ReplyOutcome::Resumed {
            execution_id: pending.execution_id,
            outcome,
        })
    }

    /// Expires waiting pending inputs older than the TTL.
    ///
    /// Each expired record fails its owning execution with reason
    /// `input_timeout`. Returns the number of executions failed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn expire_pending(&self, now: DateTime<Utc>) -> Result<usize, EngineError> {
        let expired = self.store.expire_pending_inputs(now - self.ttl).await?;
        let mut failed = 0;

        for pending in expired {
            let Some(mut execution) = self.store.get_execution(pending.execution_id).await? else {
                tracing::warn!(
                    pending_input_id = %pending.id,
                    execution_id = %pending.execution_id,
                    "expired pending input references missing execution"
                );
                continue;
            };
            if execution.is_terminal() {
                continue;
            }

            self.store
                .append_log(
                    &ExecutionLogEntry::error(
                        execution.id,
                        Some(pending.node_id),
                        "no reply arrived before the input timeout",
                    )
                    .with_details(serde_json::json!({"kind": "input_timeout"})),
                )
                .await?;
            execution.fail("input_timeout", now);
            self.store.update_execution(&execution).await?;
            failed += 1;
        }

        Ok(failed)
    }
}
