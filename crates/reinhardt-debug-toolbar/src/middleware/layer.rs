//! Debug toolbar Tower layer

use crate::error::{ToolbarError, ToolbarResult};
use crate::middleware::active::ActiveToolbars;
use crate::middleware::config::StoreBackend;
use crate::middleware::{DebugToolbarService, ToolbarConfig};
use crate::panels::PanelRegistry;
use crate::routes::{RouteCache, RouteTable, toolbar_routes};
use crate::store::{CacheStore, InMemoryCache, MemoryStore, ToolbarStore};
use crate::ui::injection::closing_tag_pattern;
use regex::bytes::Regex;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tower::Layer;

/// Process-wide state shared by every service the layer builds
#[derive(Clone)]
pub struct ToolbarState {
	pub(crate) config: Arc<ToolbarConfig>,
	pub(crate) registry: Arc<PanelRegistry>,
	pub(crate) store: Arc<dyn ToolbarStore>,
	pub(crate) active: Arc<ActiveToolbars>,
	pub(crate) application_routes: Arc<RouteTable>,
	pub(crate) route_cache: Arc<RouteCache>,
	pub(crate) toolbar_routes: Arc<OnceLock<RouteTable>>,
	pub(crate) closing_tag: Regex,
}

impl ToolbarState {
	/// Layer configuration
	pub fn config(&self) -> &Arc<ToolbarConfig> {
		&self.config
	}

	/// Registered panels
	pub fn registry(&self) -> &Arc<PanelRegistry> {
		&self.registry
	}

	/// Store holding persisted toolbars
	pub fn store(&self) -> &Arc<dyn ToolbarStore> {
		&self.store
	}

	/// Toolbars currently capturing
	pub fn active_toolbars(&self) -> &Arc<ActiveToolbars> {
		&self.active
	}

	/// The toolbar's own routes mounted under the prefix, built on first use
	pub fn toolbar_routes(&self) -> &RouteTable {
		self.toolbar_routes
			.get_or_init(|| toolbar_routes(&self.registry, &self.config.url_prefix))
	}

	/// Toolbar routes merged in front of `base`, or of the layer's
	/// application routes when `base` is `None`
	pub fn effective_routes(&self, base: Option<&RouteTable>) -> Arc<RouteTable> {
		let base = base.unwrap_or(&self.application_routes);
		self.route_cache.merged(self.toolbar_routes(), base)
	}
}

impl fmt::Debug for ToolbarState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ToolbarState")
			.field("config", &self.config)
			.field("registry", &self.registry)
			.field("active", &self.active)
			.finish_non_exhaustive()
	}
}

/// Tower layer for debug toolbar middleware
///
/// # Examples
///
/// ```
/// use axum::{Router, routing::get};
/// use reinhardt_debug_toolbar::{DebugToolbarLayer, PanelRegistry, ToolbarConfig};
///
/// let config = ToolbarConfig::default().with_enabled(true);
/// let layer = DebugToolbarLayer::new(config, PanelRegistry::with_defaults()).unwrap();
///
/// let app: Router = Router::new()
///     .route("/", get(|| async { "hello" }))
///     .layer(layer);
/// ```
#[derive(Clone, Debug)]
pub struct DebugToolbarLayer {
	state: ToolbarState,
}

impl DebugToolbarLayer {
	/// Create the layer, checking the configuration first.
	///
	/// The store is chosen from [`ToolbarConfig::store_backend`]; the cache
	/// backend defaults to an [`InMemoryCache`], so multi-process servers
	/// should pass a shared store through [`Self::with_store`].
	pub fn new(config: ToolbarConfig, registry: PanelRegistry) -> ToolbarResult<Self> {
		config.validate()?;
		let closing_tag = closing_tag_pattern(&config.tag).map_err(|e| {
			ToolbarError::ImproperlyConfigured(format!("Invalid `tag` {:?}: {}", config.tag, e))
		})?;

		let store: Arc<dyn ToolbarStore> = match config.store_backend {
			StoreBackend::Memory => Arc::new(MemoryStore::new(config.results_cache_size)),
			StoreBackend::Cache => Arc::new(CacheStore::from_config(InMemoryCache::new(), &config)),
		};
		tracing::debug!(
			panels = ?registry.ids(),
			store_backend = ?config.store_backend,
			"Debug toolbar layer configured"
		);

		Ok(Self {
			state: ToolbarState {
				config: Arc::new(config),
				registry: Arc::new(registry),
				store,
				active: Arc::new(ActiveToolbars::new()),
				application_routes: Arc::new(RouteTable::default()),
				route_cache: Arc::new(RouteCache::new()),
				toolbar_routes: Arc::new(OnceLock::new()),
				closing_tag,
			},
		})
	}

	/// Create the layer with the default configuration and built-in panels
	pub fn with_default() -> ToolbarResult<Self> {
		Self::new(ToolbarConfig::default(), PanelRegistry::with_defaults())
	}

	/// Use `store` for persisted toolbars
	pub fn with_store<T>(mut self, store: T) -> Self
	where
		T: ToolbarStore + 'static,
	{
		self.state.store = Arc::new(store);
		self
	}

	/// Share an existing store, e.g. to inspect it from tests
	pub fn with_shared_store(mut self, store: Arc<dyn ToolbarStore>) -> Self {
		self.state.store = store;
		self
	}

	/// Track active toolbars in `active`
	pub fn with_active_toolbars(mut self, active: Arc<ActiveToolbars>) -> Self {
		self.state.active = active;
		self
	}

	/// Routes of the wrapped application, used to name resolved routes.
	///
	/// A [`RouteTable`] request extension overrides it per request.
	pub fn with_application_routes(mut self, routes: RouteTable) -> Self {
		self.state.application_routes = Arc::new(routes);
		self
	}

	/// Shared state handed to the services
	pub fn state(&self) -> &ToolbarState {
		&self.state
	}
}

impl<S> Layer<S> for DebugToolbarLayer {
	type Service = DebugToolbarService<S>;

	fn layer(&self, inner: S) -> Self::Service {
		DebugToolbarService::new(inner, Arc::new(self.state.clone()))
	}
}
