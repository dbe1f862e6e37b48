//! Durable persistence for workflow instances.
//!
//! `contract` defines the `Storage` trait every backend implements;
//! `memory` is the in-process reference implementation used by tests and
//! single-node deployments; `postgres` is an optional, feature-gated
//! reference implementation over `sqlx`.

pub mod contract;
pub mod memory;
pub mod pagination;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use contract::{Storage, StorageError};
pub use memory::InMemoryStorage;
pub use pagination::{InstanceFilter, Page, SortOrder};
