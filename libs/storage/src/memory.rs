//! In-process reference `Storage` implementation, backed by a `Mutex`-guarded
//! map. Good enough for tests and single-process deployments; anything that
//! needs to survive a process restart wants the `postgres` feature instead.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use conduit_domain::{Instance, InstanceId, InstanceState};
use tokio::sync::Mutex;

use crate::contract::{Storage, StorageError};
use crate::pagination::{InstanceFilter, Page, SortOrder};

/// `Storage` backed by an in-memory map, guarded by a single async mutex.
///
/// Cloning an `InMemoryStorage` shares the underlying map — clone it to hand
/// out additional handles rather than constructing a second instance.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    instances: Arc<Mutex<HashMap<InstanceId, Instance>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn save(&self, instance: &Instance) -> Result<(), StorageError> {
        let mut guard = self.instances.lock().await;

        if let Some(existing) = guard.get(&instance.id) {
            if existing.version != instance.version {
                return Err(StorageError::VersionConflict {
                    id: instance.id.clone(),
                    expected: existing.version,
                    found: instance.version,
                });
            }
        }

        let mut stored = instance.clone();
        stored.version += 1;
        guard.insert(stored.id.clone(), stored);
        Ok(())
    }

    async fn load(&self, id: &InstanceId) -> Result<Option<Instance>, StorageError> {
        Ok(self.instances.lock().await.get(id).cloned())
    }

    async fn exists(&self, id: &InstanceId) -> Result<bool, StorageError> {
        Ok(self.instances.lock().await.contains_key(id))
    }

    async fn delete(&self, id: &InstanceId) -> Result<(), StorageError> {
        self.instances
            .lock()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(id.clone()))
    }

    async fn find_instances(
        &self,
        filter: &InstanceFilter,
    ) -> Result<Page<Instance>, StorageError> {
        let guard = self.instances.lock().await;

        let mut matches: Vec<Instance> = guard
            .values()
            .filter(|i| filter.state.is_none_or(|s| i.state == s))
            .filter(|i| {
                filter
                    .name
                    .as_deref()
                    .is_none_or(|name| i.definition_name == name)
            })
            .cloned()
            .collect();

        matches.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        if filter.sort_order == SortOrder::Desc {
            matches.reverse();
        }

        let total = matches.len() as i64;
        let offset = filter.offset.max(0) as usize;
        let limit = filter.clamped_limit() as usize;
        let page_items: Vec<Instance> = matches.into_iter().skip(offset).take(limit).collect();

        Ok(Page::new(page_items, total, filter))
    }

    async fn update_state(
        &self,
        id: &InstanceId,
        new_state: InstanceState,
        expected_version: u64,
    ) -> Result<Instance, StorageError> {
        let mut guard = self.instances.lock().await;
        let instance = guard.get_mut(id).ok_or_else(|| StorageError::NotFound(id.clone()))?;

        if instance.version != expected_version {
            return Err(StorageError::VersionConflict {
                id: id.clone(),
                expected: instance.version,
                found: expected_version,
            });
        }

        instance.state = new_state;
        instance.updated_at = chrono::Utc::now();
        instance.version += 1;
        Ok(instance.clone())
    }
}
