//! Filter and pagination types for `Storage::find_instances`.

use conduit_domain::InstanceState;
use serde::{Deserialize, Serialize};

/// Sort order for list queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Filter and pagination parameters accepted by `Storage::find_instances`.
///
/// All fields are optional filters; omitted fields match every instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstanceFilter {
    /// Match only instances in this state.
    pub state: Option<InstanceState>,
    /// Match only instances of this workflow definition name.
    pub name: Option<String>,
    /// Maximum number of items to return (default: 20, max: 100).
    #[serde(default = "default_limit")]
    pub limit: i64,
    /// Number of items to skip.
    #[serde(default)]
    pub offset: i64,
    /// Sort order over `created_at`, ties broken by id (default: descending,
    /// newest first).
    #[serde(default)]
    pub sort_order: SortOrder,
}

fn default_limit() -> i64 {
    20
}

impl InstanceFilter {
    /// Build a filter with a custom limit (clamped to 100), matching everything else.
    pub fn with_limit(limit: i64) -> Self {
        Self {
            limit: limit.min(100),
            ..Default::default()
        }
    }

    /// Limit clamped to the 1..=100 range storage backends must enforce.
    pub fn clamped_limit(&self) -> i64 {
        self.limit.clamp(1, 100)
    }
}

/// A page of results from a `find_instances` query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, filter: &InstanceFilter) -> Self {
        Self {
            items,
            total,
            limit: filter.limit,
            offset: filter.offset,
        }
    }

    pub fn empty(filter: &InstanceFilter) -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            limit: filter.limit,
            offset: filter.offset,
        }
    }

    pub fn has_more(&self) -> bool {
        self.offset + (self.items.len() as i64) < self.total
    }

    pub fn next_offset(&self) -> Option<i64> {
        self.has_more()
            .then(|| self.offset + self.items.len() as i64)
    }

    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            limit: self.limit,
            offset: self.offset,
        }
    }
}
