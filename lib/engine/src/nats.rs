//! NATS JetStream-backed execution queue.
//!
//! For multi-process deployments: the API process enqueues execution jobs
//! onto a work-queue stream and worker processes consume them, so slow
//! workflows never back up the ingestion path. Jobs carry a version field
//! for schema evolution during rolling deployments.

use crate::engine::ExecutionEngine;
use crate::queue::{ExecutionQueue, QueueError};
use async_nats::jetstream;
use async_trait::async_trait;
use futures::StreamExt;
use leadflow_core::ExecutionId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Subject for execution jobs.
const JOBS_SUBJECT: &str = "workflow.exec.jobs";

/// Stream name for execution jobs.
const JOBS_STREAM_NAME: &str = "WORKFLOW_EXECUTIONS";

/// Durable consumer name shared by worker processes.
const WORKERS_CONSUMER_NAME: &str = "workflow-workers";

/// Current job schema version.
const JOB_VERSION: u32 = 1;

/// A queued execution job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ExecutionJob {
    /// Schema version of this job payload.
    version: u32,
    /// The execution to run.
    execution_id: ExecutionId,
}

impl ExecutionJob {
    fn new(execution_id: ExecutionId) -> Self {
        Self {
            version: JOB_VERSION,
            execution_id,
        }
    }
}

/// Configuration for the NATS execution queue.
#[derive(Debug, Clone)]
pub struct NatsQueueConfig {
    /// NATS server URL.
    pub url: String,
    /// Stream name override (defaults to `WORKFLOW_EXECUTIONS`).
    pub stream_name: Option<String>,
}

impl NatsQueueConfig {
    /// Creates a config with the given NATS URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            stream_name: None,
        }
    }

    fn stream(&self) -> &str {
        self.stream_name.as_deref().unwrap_or(JOBS_STREAM_NAME)
    }
}

/// A JetStream-backed [`ExecutionQueue`].
pub struct NatsExecutionQueue {
    jetstream: Arc<jetstream::Context>,
    config: NatsQueueConfig,
}

impl NatsExecutionQueue {
    /// Connects to NATS and ensures the jobs stream exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or stream setup fails.
    pub async fn connect(config: NatsQueueConfig) -> Result<Self, QueueError> {
        let client = async_nats::connect(&config.url).await.map_err(|e| {
            QueueError::ConnectionFailed {
                message: e.to_string(),
            }
        })?;
        let jetstream = jetstream::new(client);

        let stream_config = jetstream::stream::Config {
            name: config.stream().to_string(),
            subjects: vec![JOBS_SUBJECT.to_string()],
            storage: jetstream::stream::StorageType::File,
            retention: jetstream::stream::RetentionPolicy::WorkQueue,
            ..Default::default()
        };
        jetstream
            .get_or_create_stream(stream_config)
            .await
            .map_err(|e| QueueError::ConnectionFailed {
                message: format!("failed to create jobs stream: {e}"),
            })?;

        Ok(Self {
            jetstream: Arc::new(jetstream),
            config,
        })
    }

    /// Consumes jobs and runs them on the engine until the stream closes.
    ///
    /// Job failures are logged and acked; the execution row itself holds
    /// the failure state, so redelivering the job would not help.
    ///
    /// # Errors
    ///
    /// Returns an error if the consumer cannot be created.
    pub async fn run_worker(&self, engine: ExecutionEngine) -> Result<(), QueueError> {
        let stream = self
            .jetstream
            .get_stream(self.config.stream())
            .await
            .map_err(|e| QueueError::ConsumeFailed {
                message: format!("failed to get jobs stream: {e}"),
            })?;

        let consumer_config = jetstream::consumer::pull::Config {
            durable_name: Some(WORKERS_CONSUMER_NAME.to_string()),
            ..Default::default()
        };
        let consumer =
            stream
                .create_consumer(consumer_config)
                .await
                .map_err(|e| QueueError::ConsumeFailed {
                    message: format!("failed to create consumer: {e}"),
                })?;

        let mut messages = consumer
            .messages()
            .await
            .map_err(|e| QueueError::ConsumeFailed {
                message: format!("failed to subscribe: {e}"),
            })?;

        while let Some(message) = messages.next().await {
            let message = match message {
                Ok(message) => message,
                Err(e) => {
                    tracing::warn!(error = %e, "job delivery error");
                    continue;
                }
            };

            match serde_json::from_slice::<ExecutionJob>(&message.payload) {
                Ok(job) => match engine.run(job.execution_id).await {
                    Ok(outcome) => {
                        tracing::debug!(
                            execution_id = %job.execution_id,
                            ?outcome,
                            "execution job finished"
                        );
                    }
                    Err(e) => {
                        tracing::error!(
                            execution_id = %job.execution_id,
                            error = %e,
                            "execution job errored"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(error = %e, "undecodable execution job, dropping");
                }
            }

            if let Err(e) = message.ack().await {
                tracing::warn!(error = %e, "failed to ack execution job");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl ExecutionQueue for NatsExecutionQueue {
    async fn enqueue(&self, execution_id: ExecutionId) -> Result<(), QueueError> {
        let job = ExecutionJob::new(execution_id);
        let bytes = serde_json::to_vec(&job).map_err(|e| QueueError::PublishFailed {
            message: format!("failed to serialize job: {e}"),
        })?;

        self.jetstream
            .publish(JOBS_SUBJECT, bytes.into())
            .await
            .map_err(|e| QueueError::PublishFailed {
                message: e.to_string(),
            })?
            .await
            .map_err(|e| QueueError::PublishFailed {
                message: e.to_string(),
            })?;

        Ok(())
    }
}
