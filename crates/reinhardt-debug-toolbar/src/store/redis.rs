//! Redis cache backend
//!
//! Lets [`CacheStore`](crate::store::CacheStore) share snapshots between
//! worker processes through Redis, with pooled connections.

use crate::error::{ToolbarError, ToolbarResult};
use crate::store::CacheBackend;
use async_trait::async_trait;
use deadpool_redis::{Config as PoolConfig, Connection, Pool, Runtime};
use redis::AsyncCommands;
use std::time::Duration;

/// Redis-backed [`CacheBackend`] with connection pooling
#[derive(Clone)]
pub struct RedisCache {
	pool: Pool,
}

impl RedisCache {
	/// Connect a pool to `connection_url`
	///
	/// # Examples
	///
	/// ```no_run
	/// use reinhardt_debug_toolbar::store::{CacheStore, RedisCache};
	///
	/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
	/// let store = CacheStore::new(RedisCache::new("redis://localhost:6379")?, 25);
	/// # Ok(())
	/// # }
	/// ```
	pub fn new(connection_url: impl Into<String>) -> ToolbarResult<Self> {
		Self::with_pool_config(PoolConfig::from_url(connection_url.into()))
	}

	/// Build from a custom pool configuration
	pub fn with_pool_config(config: PoolConfig) -> ToolbarResult<Self> {
		let pool = config
			.create_pool(Some(Runtime::Tokio1))
			.map_err(|e| ToolbarError::Cache(format!("Failed to create Redis pool: {}", e)))?;
		Ok(Self { pool })
	}

	async fn connection(&self) -> ToolbarResult<Connection> {
		self.pool
			.get()
			.await
			.map_err(|e| ToolbarError::Cache(format!("Failed to get connection from pool: {}", e)))
	}
}

#[async_trait]
impl CacheBackend for RedisCache {
	async fn get(&self, key: &str) -> ToolbarResult<Option<Vec<u8>>> {
		let mut conn = self.connection().await?;
		conn.get(key)
			.await
			.map_err(|e| ToolbarError::Cache(format!("Failed to get value from Redis: {}", e)))
	}

	async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> ToolbarResult<()> {
		let mut conn = self.connection().await?;
		let result: redis::RedisResult<()> = match ttl {
			Some(ttl) => conn.set_ex(key, value, ttl.as_secs().max(1)).await,
			None => conn.set(key, value).await,
		};
		result.map_err(|e| ToolbarError::Cache(format!("Failed to set value in Redis: {}", e)))
	}

	async fn delete(&self, key: &str) -> ToolbarResult<()> {
		let mut conn = self.connection().await?;
		let _: () = conn
			.del(key)
			.await
			.map_err(|e| ToolbarError::Cache(format!("Failed to delete value from Redis: {}", e)))?;
		Ok(())
	}

	async fn delete_many(&self, keys: &[String]) -> ToolbarResult<()> {
		if keys.is_empty() {
			return Ok(());
		}
		let mut conn = self.connection().await?;
		let _: () = conn
			.del(keys)
			.await
			.map_err(|e| ToolbarError::Cache(format!("Failed to delete values from Redis: {}", e)))?;
		Ok(())
	}
}
