//! In-process store

use crate::error::ToolbarResult;
use crate::store::{StoreId, ToolbarSnapshot, ToolbarStore};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Bounded list of snapshots held in this process, newest first
#[derive(Debug)]
pub struct MemoryStore {
	capacity: usize,
	entries: Mutex<VecDeque<(StoreId, ToolbarSnapshot)>>,
}

impl MemoryStore {
	/// Create a store keeping at most `capacity` entries
	pub fn new(capacity: usize) -> Self {
		Self {
			capacity,
			entries: Mutex::new(VecDeque::with_capacity(capacity)),
		}
	}

	/// Maximum number of entries kept
	pub fn capacity(&self) -> usize {
		self.capacity
	}
}

#[async_trait]
impl ToolbarStore for MemoryStore {
	async fn store(&self, id: StoreId, snapshot: ToolbarSnapshot) -> ToolbarResult<()> {
		let mut entries = self.entries.lock();
		// Storing an existing id again moves it to the front.
		entries.retain(|(existing, _)| existing != &id);
		entries.push_front((id, snapshot));
		entries.truncate(self.capacity);
		Ok(())
	}

	async fn fetch(&self, id: &StoreId) -> ToolbarResult<Option<ToolbarSnapshot>> {
		Ok(self
			.entries
			.lock()
			.iter()
			.find(|(existing, _)| existing == id)
			.map(|(_, snapshot)| snapshot.clone()))
	}

	async fn all(&self) -> ToolbarResult<Vec<(StoreId, ToolbarSnapshot)>> {
		Ok(self.entries.lock().iter().cloned().collect())
	}

	async fn delete(&self, id: &StoreId) -> ToolbarResult<()> {
		self.entries.lock().retain(|(existing, _)| existing != id);
		Ok(())
	}

	async fn clear(&self) -> ToolbarResult<()> {
		self.entries.lock().clear();
		Ok(())
	}

	async fn len(&self) -> ToolbarResult<usize> {
		Ok(self.entries.lock().len())
	}
}
