//! Postgres repository for workflow definitions.

use crate::db::decode_error;
use async_trait::async_trait;
use leadflow_core::{OrganizationId, WorkflowId};
use leadflow_engine::store::{StoreError, WorkflowStore};
use leadflow_workflow::definition::WorkflowDefinition;
use leadflow_workflow::trigger::TriggerKind;
use sqlx::{FromRow, PgPool};

/// Row type for definition queries.
#[derive(FromRow)]
struct WorkflowRow {
    definition: serde_json::Value,
}

impl WorkflowRow {
    fn try_into_definition(self) -> Result<WorkflowDefinition, sqlx::Error> {
        serde_json::from_value(self.definition)
            .map_err(|e| decode_error(format!("invalid workflow definition payload: {e}")))
    }
}

/// Postgres-backed [`WorkflowStore`].
pub struct PgWorkflowStore {
    pool: PgPool,
}

impl PgWorkflowStore {
    /// Creates a new store.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkflowStore for PgWorkflowStore {
    async fn save(&self, definition: &WorkflowDefinition) -> Result<(), StoreError> {
        let payload = serde_json::to_value(definition).map_err(StoreError::backend)?;

        sqlx::query(
            r#"
            INSERT INTO workflows
                (id, organization_id, name, is_active, trigger_kind, definition,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name,
                is_active = EXCLUDED.is_active,
                trigger_kind = EXCLUDED.trigger_kind,
                definition = EXCLUDED.definition,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(definition.id.as_ulid().to_string())
        .bind(definition.organization_id.as_ulid().to_string())
        .bind(&definition.name)
        .bind(definition.is_active)
        .bind(definition.trigger_kind().as_str())
        .bind(payload)
        .bind(definition.created_at)
        .bind(definition.updated_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(())
    }

    async fn get(&self, id: WorkflowId) -> Result<Option<WorkflowDefinition>, StoreError> {
        let row: Option<WorkflowRow> = sqlx::query_as(
            r#"
            SELECT definition
            FROM workflows
            WHERE id = $1
            "#,
        )
        .bind(id.as_ulid().to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        match row {
            Some(row) => Ok(Some(
                row.try_into_definition().map_err(StoreError::backend)?,
            )),
            None => Ok(None),
        }
    }

    async fn list_active(
        &self,
        organization_id: OrganizationId,
        kind: TriggerKind,
    ) -> Result<Vec<WorkflowDefinition>, StoreError> {
        let rows: Vec<WorkflowRow> = sqlx::query_as(
            r#"
            SELECT definition
            FROM workflows
            WHERE organization_id = $1 AND trigger_kind = $2 AND is_active
            "#,
        )
        .bind(organization_id.as_ulid().to_string())
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        rows.into_iter()
            .map(|row| row.try_into_definition().map_err(StoreError::backend))
            .collect()
    }
}
