//! Shared-cache store
//!
//! Snapshots live under `__debug__.<id>` in a [`CacheBackend`] shared by all
//! worker processes. The ordered list of live ids is kept under
//! `__debug__.stores`, capped at the store capacity and trimmed on every
//! store; the keys of trimmed ids are deleted from the cache right away.
//!
//! There is no lock around the index. Two processes storing at the same
//! time both read the index, prepend their id and write it back, so the last
//! writer wins: an entry may be missing from the index until it expires from
//! the cache, and the index may briefly exceed the capacity until the next
//! store trims it.

use crate::error::{ToolbarError, ToolbarResult};
use crate::middleware::ToolbarConfig;
use crate::store::{StoreId, ToolbarSnapshot, ToolbarStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;

/// Prefix of every key the store writes
pub const CACHE_KEY_PREFIX: &str = "__debug__.";

/// Key of the ordered index of live store ids
pub const INDEX_KEY: &str = "__debug__.stores";

/// Minimal byte-oriented cache the store is built on
#[async_trait]
pub trait CacheBackend: Send + Sync {
	/// Value under `key`, `None` when absent or expired
	async fn get(&self, key: &str) -> ToolbarResult<Option<Vec<u8>>>;

	/// Store `value` under `key`, expiring after `ttl` when given
	async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> ToolbarResult<()>;

	/// Remove `key`
	async fn delete(&self, key: &str) -> ToolbarResult<()>;

	/// Remove several keys
	async fn delete_many(&self, keys: &[String]) -> ToolbarResult<()> {
		for key in keys {
			self.delete(key).await?;
		}
		Ok(())
	}
}

#[derive(Debug, Clone)]
struct CacheEntry {
	value: Vec<u8>,
	expires_at: Option<SystemTime>,
}

impl CacheEntry {
	fn new(value: Vec<u8>, ttl: Option<Duration>) -> Self {
		let expires_at = ttl.map(|d| SystemTime::now() + d);
		Self { value, expires_at }
	}

	fn is_expired(&self) -> bool {
		if let Some(expires_at) = self.expires_at {
			SystemTime::now() > expires_at
		} else {
			false
		}
	}
}

/// Process-local [`CacheBackend`]
///
/// Clones share the same entries, which makes it handy for tests and for
/// running the cache store without external services.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
	store: Arc<RwLock<HashMap<String, CacheEntry>>>,
	default_ttl: Option<Duration>,
}

impl InMemoryCache {
	/// Create an empty cache
	pub fn new() -> Self {
		Self::default()
	}

	/// Expire entries stored without an explicit TTL after `ttl`
	pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
		self.default_ttl = Some(ttl);
		self
	}

	/// Drop expired entries
	pub async fn cleanup_expired(&self) {
		let mut store = self.store.write().await;
		store.retain(|_, entry| !entry.is_expired());
	}

	/// Keys currently held, expired or not
	pub async fn keys(&self) -> Vec<String> {
		let store = self.store.read().await;
		store.keys().cloned().collect()
	}
}

#[async_trait]
impl CacheBackend for InMemoryCache {
	async fn get(&self, key: &str) -> ToolbarResult<Option<Vec<u8>>> {
		let store = self.store.read().await;
		Ok(store
			.get(key)
			.filter(|entry| !entry.is_expired())
			.map(|entry| entry.value.clone()))
	}

	async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> ToolbarResult<()> {
		let entry = CacheEntry::new(value, ttl.or(self.default_ttl));
		let mut store = self.store.write().await;
		store.insert(key.to_string(), entry);
		Ok(())
	}

	async fn delete(&self, key: &str) -> ToolbarResult<()> {
		let mut store = self.store.write().await;
		store.remove(key);
		Ok(())
	}
}

/// [`ToolbarStore`] on top of a shared [`CacheBackend`]
#[derive(Debug, Clone)]
pub struct CacheStore<C> {
	backend: C,
	capacity: usize,
	max_snapshot_bytes: usize,
	ttl: Option<Duration>,
}

impl<C: CacheBackend> CacheStore<C> {
	/// Create a store keeping at most `capacity` entries in `backend`
	pub fn new(backend: C, capacity: usize) -> Self {
		Self {
			backend,
			capacity,
			max_snapshot_bytes: ToolbarConfig::default().max_snapshot_bytes,
			ttl: None,
		}
	}

	/// Create a store sized from the toolbar configuration
	pub fn from_config(backend: C, config: &ToolbarConfig) -> Self {
		Self::new(backend, config.results_cache_size)
			.with_max_snapshot_bytes(config.max_snapshot_bytes)
	}

	/// Reject snapshots whose serialized form exceeds `limit` bytes
	pub fn with_max_snapshot_bytes(mut self, limit: usize) -> Self {
		self.max_snapshot_bytes = limit;
		self
	}

	/// Let entries expire from the cache after `ttl`
	pub fn with_ttl(mut self, ttl: Duration) -> Self {
		self.ttl = Some(ttl);
		self
	}

	/// The underlying cache
	pub fn backend(&self) -> &C {
		&self.backend
	}

	/// Cache key of the entry stored under `id`
	pub fn entry_key(id: &StoreId) -> String {
		format!("{}{}", CACHE_KEY_PREFIX, id)
	}

	async fn read_index(&self) -> ToolbarResult<Vec<StoreId>> {
		match self.backend.get(INDEX_KEY).await? {
			Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
			None => Ok(Vec::new()),
		}
	}

	async fn write_index(&self, index: &[StoreId]) -> ToolbarResult<()> {
		let bytes = serde_json::to_vec(index)?;
		self.backend.set(INDEX_KEY, bytes, None).await
	}
}

#[async_trait]
impl<C: CacheBackend> ToolbarStore for CacheStore<C> {
	async fn store(&self, id: StoreId, snapshot: ToolbarSnapshot) -> ToolbarResult<()> {
		let bytes = serde_json::to_vec(&snapshot)?;
		if bytes.len() > self.max_snapshot_bytes {
			return Err(ToolbarError::SnapshotTooLarge {
				size: bytes.len(),
				limit: self.max_snapshot_bytes,
			});
		}
		self.backend
			.set(&Self::entry_key(&id), bytes, self.ttl)
			.await?;

		let mut index = self.read_index().await?;
		index.retain(|existing| existing != &id);
		index.insert(0, id);
		let dropped = if index.len() > self.capacity {
			index.split_off(self.capacity)
		} else {
			Vec::new()
		};
		self.write_index(&index).await?;

		if !dropped.is_empty() {
			tracing::debug!(count = dropped.len(), "Evicting toolbar snapshots from cache");
			let keys: Vec<String> = dropped.iter().map(Self::entry_key).collect();
			self.backend.delete_many(&keys).await?;
		}
		Ok(())
	}

	async fn fetch(&self, id: &StoreId) -> ToolbarResult<Option<ToolbarSnapshot>> {
		match self.backend.get(&Self::entry_key(id)).await? {
			Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
			None => Ok(None),
		}
	}

	async fn all(&self) -> ToolbarResult<Vec<(StoreId, ToolbarSnapshot)>> {
		let mut entries = Vec::new();
		for id in self.read_index().await? {
			// Indexed entries may have expired or been evicted by another writer.
			if let Some(snapshot) = self.fetch(&id).await? {
				entries.push((id, snapshot));
			}
		}
		Ok(entries)
	}

	async fn delete(&self, id: &StoreId) -> ToolbarResult<()> {
		self.backend.delete(&Self::entry_key(id)).await?;
		let mut index = self.read_index().await?;
		index.retain(|existing| existing != id);
		self.write_index(&index).await
	}

	async fn clear(&self) -> ToolbarResult<()> {
		let keys: Vec<String> = self
			.read_index()
			.await?
			.iter()
			.map(Self::entry_key)
			.collect();
		self.backend.delete_many(&keys).await?;
		self.backend.delete(INDEX_KEY).await
	}
}
