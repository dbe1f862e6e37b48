//! PostgreSQL-backed `Storage`, gated behind the `postgres` feature.
//!
//! One table, one JSON blob per instance plus the columns needed to filter
//! and sort without deserializing every row — the same shape the in-process
//! `memory` backend keeps, just durable.

use async_trait::async_trait;
use conduit_domain::{Instance, InstanceId, InstanceState};
use sqlx::PgPool;

use crate::contract::{Storage, StorageError};
use crate::pagination::{InstanceFilter, Page, SortOrder};

/// `Storage` backed by a `workflow_instances` table.
///
/// Expects a table of the shape:
/// ```sql
/// CREATE TABLE workflow_instances (
///     id              TEXT PRIMARY KEY,
///     definition_name TEXT NOT NULL,
///     state           TEXT NOT NULL,
///     created_at      TIMESTAMPTZ NOT NULL,
///     updated_at      TIMESTAMPTZ NOT NULL,
///     version         BIGINT NOT NULL,
///     snapshot        JSONB NOT NULL
/// );
/// ```
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn save(&self, instance: &Instance) -> Result<(), StorageError> {
        let snapshot = serde_json::to_value(instance).map_err(|e| StorageError::Backend(e.into()))?;

        let result = sqlx::query(
            r#"
            INSERT INTO workflow_instances (id, definition_name, state, created_at, updated_at, version, snapshot)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE
            SET definition_name = EXCLUDED.definition_name,
                state = EXCLUDED.state,
                updated_at = EXCLUDED.updated_at,
                version = workflow_instances.version + 1,
                snapshot = EXCLUDED.snapshot
            WHERE workflow_instances.version = $8
            "#,
        )
        .bind(instance.id.to_string())
        .bind(&instance.definition_name)
        .bind(instance.state.as_str())
        .bind(instance.created_at)
        .bind(instance.updated_at)
        .bind(instance.version as i64 + 1)
        .bind(&snapshot)
        .bind(instance.version as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.into()))?;

        if result.rows_affected() == 0 {
            // Either genuinely new (no conflict target matched) or stale version.
            let existing = self.load(&instance.id).await?;
            if let Some(existing) = existing {
                return Err(StorageError::VersionConflict {
                    id: instance.id.clone(),
                    expected: existing.version,
                    found: instance.version,
                });
            }
        }

        Ok(())
    }

    async fn load(&self, id: &InstanceId) -> Result<Option<Instance>, StorageError> {
        let row: Option<(serde_json::Value,)> =
            sqlx::query_as("SELECT snapshot FROM workflow_instances WHERE id = $1")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(e.into()))?;

        row.map(|(snapshot,)| serde_json::from_value(snapshot).map_err(|e| StorageError::Backend(e.into())))
            .transpose()
    }

    async fn exists(&self, id: &InstanceId) -> Result<bool, StorageError> {
        let row: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM workflow_instances WHERE id = $1")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(e.into()))?;
        Ok(row.is_some())
    }

    async fn delete(&self, id: &InstanceId) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM workflow_instances WHERE id = $1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.into()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(id.clone()));
        }
        Ok(())
    }

    async fn find_instances(
        &self,
        filter: &InstanceFilter,
    ) -> Result<Page<Instance>, StorageError> {
        let state_filter = filter.state.map(InstanceState::as_str);
        let order = if filter.sort_order == SortOrder::Asc {
            "ASC"
        } else {
            "DESC"
        };

        let total: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM workflow_instances \
             WHERE ($1::text IS NULL OR state = $1) \
               AND ($2::text IS NULL OR definition_name = $2)",
        )
        .bind(&state_filter)
        .bind(&filter.name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.into()))?;

        let query = format!(
            "SELECT snapshot FROM workflow_instances \
             WHERE ($1::text IS NULL OR state = $1) \
               AND ($2::text IS NULL OR definition_name = $2) \
             ORDER BY created_at {order}, id {order} \
             LIMIT $3 OFFSET $4"
        );

        let rows: Vec<(serde_json::Value,)> = sqlx::query_as(&query)
            .bind(&state_filter)
            .bind(&filter.name)
            .bind(filter.clamped_limit())
            .bind(filter.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.into()))?;

        let items = rows
            .into_iter()
            .filter_map(|(v,)| serde_json::from_value(v).ok())
            .collect();

        Ok(Page::new(items, total.0, filter))
    }

    async fn update_state(
        &self,
        id: &InstanceId,
        new_state: InstanceState,
        expected_version: u64,
    ) -> Result<Instance, StorageError> {
        let mut instance = self
            .load(id)
            .await?
            .ok_or_else(|| StorageError::NotFound(id.clone()))?;

        if instance.version != expected_version {
            return Err(StorageError::VersionConflict {
                id: id.clone(),
                expected: instance.version,
                found: expected_version,
            });
        }

        instance.state = new_state;
        instance.updated_at = chrono::Utc::now();
        self.save(&instance).await?;
        instance.version += 1;
        Ok(instance)
    }
}
