//! Closed set of panel constructors
//!
//! Panels are instantiated fresh for every request, so the registry stores
//! factories rather than panel instances. Registration order is the wrapping
//! order and the render order.

use crate::error::{ToolbarError, ToolbarResult};
use crate::panels::Panel;
use crate::panels::history::HistoryPanel;
use crate::panels::request::RequestPanel;
use crate::panels::settings::SettingsPanel;
use crate::panels::timer::TimerPanel;
use crate::routes::Route;
use std::fmt;
use std::sync::Arc;

/// Constructor of one panel type
pub type PanelFactory = Arc<dyn Fn() -> Arc<dyn Panel> + Send + Sync>;

struct RegisteredPanel {
	id: &'static str,
	routes: Vec<Route>,
	factory: PanelFactory,
}

/// Ordered registry of panel factories
#[derive(Default)]
pub struct PanelRegistry {
	panels: Vec<RegisteredPanel>,
}

impl PanelRegistry {
	/// Create an empty registry
	pub fn new() -> Self {
		Self::default()
	}

	/// Registry with the built-in panels: history, timer, settings, request
	pub fn with_defaults() -> Self {
		let mut registry = Self::new();
		registry.push(HistoryPanel::new);
		registry.push(TimerPanel::new);
		registry.push(SettingsPanel::new);
		registry.push(RequestPanel::new);
		registry
	}

	/// Register a panel constructor.
	///
	/// The constructor runs once here to learn the panel id and routes.
	/// Registering a second panel with the same id fails.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_debug_toolbar::PanelRegistry;
	/// use reinhardt_debug_toolbar::panels::timer::TimerPanel;
	///
	/// let mut registry = PanelRegistry::new();
	/// registry.register(TimerPanel::new).unwrap();
	/// assert!(registry.register(TimerPanel::new).is_err());
	/// ```
	pub fn register<F, P>(&mut self, factory: F) -> ToolbarResult<()>
	where
		F: Fn() -> P + Send + Sync + 'static,
		P: Panel + 'static,
	{
		let id = factory().id();
		if self.contains(id) {
			return Err(ToolbarError::ImproperlyConfigured(format!(
				"Panel id '{}' is registered twice; panel ids must be unique",
				id
			)));
		}
		self.push(factory);
		Ok(())
	}

	fn push<F, P>(&mut self, factory: F)
	where
		F: Fn() -> P + Send + Sync + 'static,
		P: Panel + 'static,
	{
		let probe = factory();
		self.panels.push(RegisteredPanel {
			id: probe.id(),
			routes: probe.routes(),
			factory: Arc::new(move || Arc::new(factory()) as Arc<dyn Panel>),
		});
	}

	/// Whether a panel with `id` is registered
	pub fn contains(&self, id: &str) -> bool {
		self.panels.iter().any(|panel| panel.id == id)
	}

	/// Registered ids in order
	pub fn ids(&self) -> Vec<&'static str> {
		self.panels.iter().map(|panel| panel.id).collect()
	}

	/// Number of registered panels
	pub fn len(&self) -> usize {
		self.panels.len()
	}

	/// Whether no panel is registered
	pub fn is_empty(&self) -> bool {
		self.panels.is_empty()
	}

	/// Fresh instances of every registered panel, in order
	pub fn instantiate(&self) -> Vec<Arc<dyn Panel>> {
		self.panels.iter().map(|panel| (panel.factory)()).collect()
	}

	/// Fresh instances of the registered panels whose id is in `ids`.
	///
	/// Registry order is kept; unknown ids are ignored.
	pub fn instantiate_only(&self, ids: &[String]) -> Vec<Arc<dyn Panel>> {
		self.panels
			.iter()
			.filter(|panel| ids.iter().any(|id| id == panel.id))
			.map(|panel| (panel.factory)())
			.collect()
	}

	/// Routes announced by all panels, in registration order
	pub fn routes(&self) -> Vec<Route> {
		self.panels
			.iter()
			.flat_map(|panel| panel.routes.iter().cloned())
			.collect()
	}
}

impl fmt::Debug for PanelRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PanelRegistry")
			.field("panels", &self.ids())
			.finish()
	}
}
