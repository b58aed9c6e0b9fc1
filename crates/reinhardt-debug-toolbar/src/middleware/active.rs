//! Registry of the toolbars currently capturing
//!
//! Each in-flight request is handled by one execution unit: the tokio task
//! polling it, or the OS thread when no task is running. While a toolbar
//! captures, [`ActiveToolbars`] maps that unit to the toolbar so code running
//! on the same unit (a handler, a panel helper) can find it.

use crate::toolbar::Toolbar;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::thread::ThreadId;

/// Unit of concurrency a request runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionUnit {
	/// A tokio task
	Task(tokio::task::Id),
	/// An OS thread outside of any tokio task
	Thread(ThreadId),
}

impl ExecutionUnit {
	/// The unit the caller is running on
	pub fn current() -> Self {
		match tokio::task::try_id() {
			Some(id) => Self::Task(id),
			None => Self::Thread(std::thread::current().id()),
		}
	}
}

/// Map from execution unit to its active toolbar
///
/// Owned by the layer and shared with every service it builds; tests create
/// their own instance to inspect it.
#[derive(Default)]
pub struct ActiveToolbars {
	entries: Mutex<HashMap<ExecutionUnit, Arc<Toolbar>>>,
}

impl ActiveToolbars {
	/// Create an empty registry
	pub fn new() -> Self {
		Self::default()
	}

	/// Make `toolbar` the active toolbar of the current execution unit.
	///
	/// The entry lives until the returned guard is dropped, which also
	/// happens while unwinding from a panic or when the request future is
	/// cancelled. A stale entry left on the unit is replaced.
	pub fn register(self: &Arc<Self>, toolbar: Arc<Toolbar>) -> ActiveToolbarGuard {
		let unit = ExecutionUnit::current();
		let previous = self.entries.lock().insert(unit, Arc::clone(&toolbar));
		if previous.is_some() {
			tracing::warn!(?unit, "Replacing a toolbar still registered on this execution unit");
		}
		ActiveToolbarGuard {
			registry: Arc::clone(self),
			unit,
			toolbar,
		}
	}

	/// Toolbar active on the current execution unit
	pub fn current(&self) -> Option<Arc<Toolbar>> {
		self.get(ExecutionUnit::current())
	}

	/// Toolbar active on `unit`
	pub fn get(&self, unit: ExecutionUnit) -> Option<Arc<Toolbar>> {
		self.entries.lock().get(&unit).cloned()
	}

	/// Number of active toolbars
	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	/// Whether no toolbar is active
	pub fn is_empty(&self) -> bool {
		self.entries.lock().is_empty()
	}

	/// Units that currently have an active toolbar
	pub fn units(&self) -> Vec<ExecutionUnit> {
		self.entries.lock().keys().copied().collect()
	}
}

impl fmt::Debug for ActiveToolbars {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ActiveToolbars")
			.field("units", &self.units())
			.finish()
	}
}

/// Removes a toolbar from [`ActiveToolbars`] when dropped
#[must_use = "the toolbar is deregistered as soon as the guard is dropped"]
pub struct ActiveToolbarGuard {
	registry: Arc<ActiveToolbars>,
	unit: ExecutionUnit,
	toolbar: Arc<Toolbar>,
}

impl ActiveToolbarGuard {
	/// Execution unit the toolbar is registered on
	pub fn unit(&self) -> ExecutionUnit {
		self.unit
	}
}

impl Drop for ActiveToolbarGuard {
	fn drop(&mut self) {
		let mut entries = self.registry.entries.lock();
		// Leave the entry alone if another toolbar has replaced ours.
		if entries
			.get(&self.unit)
			.is_some_and(|active| Arc::ptr_eq(active, &self.toolbar))
		{
			entries.remove(&self.unit);
		}
	}
}

impl fmt::Debug for ActiveToolbarGuard {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ActiveToolbarGuard")
			.field("unit", &self.unit)
			.finish_non_exhaustive()
	}
}
