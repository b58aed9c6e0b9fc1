//! Route tables for the toolbar's auxiliary views
//!
//! The toolbar announces its own routes (the shared `render_panel/` route plus
//! every panel's routes), mounted under [`ToolbarConfig::url_prefix`]. For each
//! distinct application route table the dispatcher computes the effective
//! table with [`merge_routes`] once and memoizes it in a [`RouteCache`].
//!
//! [`ToolbarConfig::url_prefix`]: crate::ToolbarConfig::url_prefix

use crate::panels::PanelRegistry;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Views served by the toolbar itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolbarView {
	/// Content of a single panel from a stored toolbar
	RenderPanel,
	/// Panel buttons and contents of a stored toolbar
	HistorySidebar,
	/// Rows of every stored toolbar
	HistoryRefresh,
}

/// Who handles a matched route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteTarget {
	/// A toolbar view
	Toolbar(ToolbarView),
	/// The wrapped application
	Application,
}

/// A named path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
	/// Route name, unique within a table
	pub name: String,
	/// Path, relative before mounting and absolute after
	pub path: String,
	/// Handler of the route
	pub target: RouteTarget,
}

impl Route {
	/// A route served by a toolbar view
	pub fn toolbar(name: impl Into<String>, path: impl Into<String>, view: ToolbarView) -> Self {
		Self {
			name: name.into(),
			path: path.into(),
			target: RouteTarget::Toolbar(view),
		}
	}

	/// A route served by the wrapped application
	pub fn application(name: impl Into<String>, path: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			path: path.into(),
			target: RouteTarget::Application,
		}
	}
}

/// Ordered, immutable list of routes; the first match wins
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RouteTable {
	routes: Vec<Route>,
}

impl RouteTable {
	/// Build a table from routes in priority order
	pub fn new(routes: Vec<Route>) -> Self {
		Self { routes }
	}

	/// Routes in priority order
	pub fn routes(&self) -> &[Route] {
		&self.routes
	}

	/// Number of routes
	pub fn len(&self) -> usize {
		self.routes.len()
	}

	/// Whether the table has no routes
	pub fn is_empty(&self) -> bool {
		self.routes.is_empty()
	}

	/// First route whose path equals `path`
	pub fn resolve(&self, path: &str) -> Option<&Route> {
		self.routes.iter().find(|route| route.path == path)
	}

	/// First route named `name`
	pub fn reverse(&self, name: &str) -> Option<&str> {
		self.routes
			.iter()
			.find(|route| route.name == name)
			.map(|route| route.path.as_str())
	}

	/// Prefix every path with `prefix`
	pub fn mount(&self, prefix: &str) -> Self {
		let routes = self
			.routes
			.iter()
			.map(|route| Route {
				path: format!("{}{}", prefix, route.path.trim_start_matches('/')),
				..route.clone()
			})
			.collect();
		Self { routes }
	}

	/// Identity of the table's contents, used as the memoization key
	pub fn fingerprint(&self) -> u64 {
		let mut hasher = DefaultHasher::new();
		self.hash(&mut hasher);
		hasher.finish()
	}
}

/// Routes announced by the toolbar, mounted at `prefix`.
///
/// The shared `render_panel` route comes first, followed by each registered
/// panel's routes in registration order.
pub fn toolbar_routes(registry: &PanelRegistry, prefix: &str) -> RouteTable {
	let mut routes = vec![Route::toolbar(
		"render_panel",
		"render_panel/",
		ToolbarView::RenderPanel,
	)];
	routes.extend(registry.routes());
	RouteTable::new(routes).mount(prefix)
}

/// Effective route table: toolbar routes in front of the application's
pub fn merge_routes(toolbar: &RouteTable, base: &RouteTable) -> RouteTable {
	let routes = toolbar
		.routes
		.iter()
		.chain(base.routes.iter())
		.cloned()
		.collect();
	RouteTable { routes }
}

/// Memoized [`merge_routes`] results keyed by the base table's fingerprint
#[derive(Debug, Default)]
pub struct RouteCache {
	merged: RwLock<HashMap<u64, Arc<RouteTable>>>,
}

impl RouteCache {
	/// Create an empty cache
	pub fn new() -> Self {
		Self::default()
	}

	/// Merged table for `base`, computed on first use.
	///
	/// Two callers racing on the same base both compute the same table; the
	/// last insert wins.
	pub fn merged(&self, toolbar: &RouteTable, base: &RouteTable) -> Arc<RouteTable> {
		let key = base.fingerprint();
		if let Some(table) = self.merged.read().get(&key) {
			return Arc::clone(table);
		}

		let table = Arc::new(merge_routes(toolbar, base));
		self.merged.write().insert(key, Arc::clone(&table));
		table
	}

	/// Number of distinct base tables seen
	pub fn len(&self) -> usize {
		self.merged.read().len()
	}

	/// Whether nothing has been memoized yet
	pub fn is_empty(&self) -> bool {
		self.merged.read().is_empty()
	}
}
