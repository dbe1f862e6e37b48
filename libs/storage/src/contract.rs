//! The storage contract the engine drives every instance through.
//!
//! One trait, one error enum, mirroring the per-repository trait/error-enum
//! pairing used throughout this workspace's storage layer — but narrowed to
//! the single `Instance` aggregate this engine persists.

use async_trait::async_trait;
use conduit_domain::{Instance, InstanceId, InstanceState};
use thiserror::Error;

use crate::pagination::{InstanceFilter, Page};

/// Errors a `Storage` implementation can return.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("instance not found: {0}")]
    NotFound(InstanceId),

    /// Raised by `save` when the caller's `Instance::version` no longer
    /// matches the stored version — someone else persisted a newer copy.
    #[error("version conflict on instance {id}: expected {expected}, found {found}")]
    VersionConflict {
        id: InstanceId,
        expected: u64,
        found: u64,
    },

    #[error("instance already exists: {0}")]
    AlreadyExists(InstanceId),

    #[error("storage backend error")]
    Backend(#[source] anyhow::Error),
}

/// Durable persistence for workflow instances.
///
/// Implementations own the instance's entire lifecycle snapshot — the engine
/// never keeps state the storage layer doesn't also have, so a crash between
/// any two steps leaves a `Storage` that can resume the instance exactly
/// where it left off.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Persist a new or updated instance.
    ///
    /// Implementations must reject the write with
    /// `StorageError::VersionConflict` if `instance.version` doesn't match
    /// what's currently stored, and otherwise store the instance with its
    /// version incremented by one.
    async fn save(&self, instance: &Instance) -> Result<(), StorageError>;

    /// Load an instance by ID.
    async fn load(&self, id: &InstanceId) -> Result<Option<Instance>, StorageError>;

    /// Check whether an instance exists, without paying for a full load.
    async fn exists(&self, id: &InstanceId) -> Result<bool, StorageError>;

    /// Permanently remove an instance.
    async fn delete(&self, id: &InstanceId) -> Result<(), StorageError>;

    /// List instances matching a filter, most recently updated first by
    /// default.
    async fn find_instances(
        &self,
        filter: &InstanceFilter,
    ) -> Result<Page<Instance>, StorageError>;

    /// Atomically transition an instance's state, rejecting the write if
    /// `expected_version` no longer matches what's stored. A thin
    /// convenience over `load` + `save` for callers that only need the
    /// state field updated.
    async fn update_state(
        &self,
        id: &InstanceId,
        new_state: InstanceState,
        expected_version: u64,
    ) -> Result<Instance, StorageError>;
}
