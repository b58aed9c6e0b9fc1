//! Persistence of finished toolbars
//!
//! A [`ToolbarStore`] keeps the [`ToolbarSnapshot`] of the most recent
//! toolbars so later requests (deferred panel rendering, the history views)
//! can rebuild them. Two backends ship with the crate:
//!
//! - [`MemoryStore`]: bounded in-process list, for single-process servers
//! - [`CacheStore`]: entries in a shared [`CacheBackend`] plus an index of
//!   live keys, for servers running several worker processes

pub mod cache;
pub mod memory;
#[cfg(feature = "redis-store")]
pub mod redis;

pub use cache::{CacheBackend, CacheStore, InMemoryCache};
pub use memory::MemoryStore;
#[cfg(feature = "redis-store")]
pub use self::redis::RedisCache;

use crate::error::ToolbarResult;
use crate::middleware::ToolbarConfig;
use crate::panels::PanelRegistry;
use crate::toolbar::Toolbar;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Opaque identifier of a store entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreId(String);

impl StoreId {
	/// Wrap an existing id, e.g. one sent back by the client
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	/// Fresh random id (UUID v4, hex without dashes)
	pub fn generate() -> Self {
		Self(uuid::Uuid::new_v4().simple().to_string())
	}

	/// The id as a string slice
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for StoreId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for StoreId {
	fn from(id: &str) -> Self {
		Self::new(id)
	}
}

/// Persisted form of a toolbar
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolbarSnapshot {
	/// Stats per panel id
	pub stats: BTreeMap<String, Value>,
	/// `Server-Timing` metrics per panel id
	pub server_timing_stats: BTreeMap<String, Value>,
	/// Ids of the panels enabled at capture time, in declared order
	pub enabled_panels: Vec<String>,
}

impl ToolbarSnapshot {
	/// Rebuild the inert toolbar this snapshot was taken from
	pub fn into_toolbar(
		self,
		store_id: StoreId,
		registry: &PanelRegistry,
		config: Arc<ToolbarConfig>,
	) -> Toolbar {
		Toolbar::from_snapshot(store_id, self, registry, config)
	}
}

/// Bounded persistence of toolbar snapshots
///
/// Implementations keep at most `results_cache_size` entries, newest first,
/// dropping the oldest on overflow. Fetching an absent or evicted id yields
/// `Ok(None)`.
#[async_trait]
pub trait ToolbarStore: Send + Sync {
	/// Save `snapshot` under `id` as the newest entry
	async fn store(&self, id: StoreId, snapshot: ToolbarSnapshot) -> ToolbarResult<()>;

	/// The snapshot stored under `id`
	async fn fetch(&self, id: &StoreId) -> ToolbarResult<Option<ToolbarSnapshot>>;

	/// Every live entry, most recently stored first
	async fn all(&self) -> ToolbarResult<Vec<(StoreId, ToolbarSnapshot)>>;

	/// Remove the entry stored under `id`, if any
	async fn delete(&self, id: &StoreId) -> ToolbarResult<()>;

	/// Remove every entry
	async fn clear(&self) -> ToolbarResult<()>;

	/// Number of live entries
	async fn len(&self) -> ToolbarResult<usize> {
		Ok(self.all().await?.len())
	}

	/// Whether the store holds no entry
	async fn is_empty(&self) -> ToolbarResult<bool> {
		Ok(self.len().await? == 0)
	}
}
