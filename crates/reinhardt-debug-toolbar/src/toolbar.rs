//! Per-request toolbar
//!
//! A [`Toolbar`] owns fresh instances of every registered panel, the stats
//! they record and, once persisted, the id of its store entry. It lives for
//! one request/response cycle; a toolbar rebuilt from a store entry
//! ([`Toolbar::from_snapshot`]) is inert and only serves rendering.

pub mod chain;

pub use chain::Next;

use crate::context::{RequestInfo, ResponseInfo};
use crate::error::{ToolbarError, ToolbarResult};
use crate::middleware::ToolbarConfig;
use crate::panels::{Panel, PanelContext, PanelRegistry};
use crate::store::{StoreId, ToolbarSnapshot, ToolbarStore};
use crate::ui::{self, RenderedToolbar};
use parking_lot::Mutex;
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Cookie name carrying a client's override for `panel_id`
pub fn panel_cookie_name(panel_id: &str) -> String {
	format!("djdt{}", panel_id)
}

/// A panel instance with its enabled flag, fixed at construction
#[derive(Clone)]
pub struct PanelSlot {
	panel: Arc<dyn Panel>,
	enabled: bool,
}

impl PanelSlot {
	/// The panel instance
	pub fn panel(&self) -> &Arc<dyn Panel> {
		&self.panel
	}

	/// Whether the panel's hooks run for this request
	pub fn enabled(&self) -> bool {
		self.enabled
	}

	/// Whether the panel is switched off for this request
	pub fn disabled(&self) -> bool {
		!self.enabled
	}
}

impl fmt::Debug for PanelSlot {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PanelSlot")
			.field("id", &self.panel.id())
			.field("enabled", &self.enabled)
			.finish()
	}
}

/// Panels, stats and store id of one request
pub struct Toolbar {
	request: Option<RequestInfo>,
	config: Arc<ToolbarConfig>,
	panels: Vec<PanelSlot>,
	stats: Mutex<BTreeMap<String, Value>>,
	server_timing_stats: Mutex<BTreeMap<String, Value>>,
	store_id: OnceLock<StoreId>,
}

impl Toolbar {
	/// Build the toolbar of a live request.
	///
	/// Every registered panel is instantiated in registry order. A panel is
	/// enabled when the client's `djdt<id>` cookie says `on`, disabled when it
	/// says `off`, and otherwise follows [`ToolbarConfig::disable_panels`].
	pub fn new(
		request: RequestInfo,
		config: Arc<ToolbarConfig>,
		registry: &PanelRegistry,
		cookies: &HashMap<String, String>,
	) -> Self {
		let panels = registry
			.instantiate()
			.into_iter()
			.map(|panel| {
				let enabled = match cookies.get(&panel_cookie_name(panel.id())).map(String::as_str) {
					Some("on") => true,
					Some("off") => false,
					_ => config.panel_enabled_by_default(panel.id()),
				};
				PanelSlot { panel, enabled }
			})
			.collect();

		Self {
			request: Some(request),
			config,
			panels,
			stats: Mutex::new(BTreeMap::new()),
			server_timing_stats: Mutex::new(BTreeMap::new()),
			store_id: OnceLock::new(),
		}
	}

	/// Rebuild an inert toolbar from a store entry.
	///
	/// Only panels enabled at capture time come back, in registry order.
	/// Their hooks are never run.
	pub fn from_snapshot(
		store_id: StoreId,
		snapshot: ToolbarSnapshot,
		registry: &PanelRegistry,
		config: Arc<ToolbarConfig>,
	) -> Self {
		let panels = registry
			.instantiate_only(&snapshot.enabled_panels)
			.into_iter()
			.map(|panel| PanelSlot {
				panel,
				enabled: true,
			})
			.collect();

		Self {
			request: None,
			config,
			panels,
			stats: Mutex::new(snapshot.stats),
			server_timing_stats: Mutex::new(snapshot.server_timing_stats),
			store_id: OnceLock::from(store_id),
		}
	}

	/// Configuration snapshot taken at construction
	pub fn config(&self) -> &ToolbarConfig {
		&self.config
	}

	/// The captured request; `None` for a toolbar rebuilt from the store
	pub fn request(&self) -> Option<&RequestInfo> {
		self.request.as_ref()
	}

	/// All panels in declared order
	pub fn panels(&self) -> &[PanelSlot] {
		&self.panels
	}

	/// Enabled panels in declared order
	pub fn enabled_panels(&self) -> impl Iterator<Item = &Arc<dyn Panel>> {
		self.panels
			.iter()
			.filter(|slot| slot.enabled)
			.map(|slot| &slot.panel)
	}

	/// Ids of the enabled panels in declared order
	pub fn enabled_panel_ids(&self) -> Vec<String> {
		self.enabled_panels()
			.map(|panel| panel.id().to_string())
			.collect()
	}

	/// Panel with exactly this id
	pub fn get_panel_by_id(&self, panel_id: &str) -> ToolbarResult<&Arc<dyn Panel>> {
		self.panels
			.iter()
			.map(|slot| &slot.panel)
			.find(|panel| panel.id() == panel_id)
			.ok_or_else(|| ToolbarError::PanelNotFound(panel_id.to_string()))
	}

	/// Id of the store entry, once minted
	pub fn store_id(&self) -> Option<&StoreId> {
		self.store_id.get()
	}

	/// Id of the store entry, minting it on first use.
	///
	/// The id never changes afterwards.
	pub fn ensure_store_id(&self) -> &StoreId {
		self.store_id.get_or_init(StoreId::generate)
	}

	/// Stats recorded by `panel_id`, an empty object when none
	pub fn panel_stats(&self, panel_id: &str) -> Value {
		self.stats
			.lock()
			.get(panel_id)
			.cloned()
			.unwrap_or_else(|| Value::Object(Map::new()))
	}

	/// `Server-Timing` metrics recorded by `panel_id`, an empty object when none
	pub fn panel_server_timing_stats(&self, panel_id: &str) -> Value {
		self.server_timing_stats
			.lock()
			.get(panel_id)
			.cloned()
			.unwrap_or_else(|| Value::Object(Map::new()))
	}

	pub(crate) fn record_stats(&self, panel_id: &str, stats: Value) {
		let mut all = self.stats.lock();
		merge_into(all.entry(panel_id.to_string()).or_insert(Value::Null), stats);
	}

	pub(crate) fn record_server_timing(&self, panel_id: &str, key: &str, title: &str, value: f64) {
		let mut all = self.server_timing_stats.lock();
		merge_into(
			all.entry(panel_id.to_string()).or_insert(Value::Null),
			json!({ key: { "title": title, "value": value } }),
		);
	}

	/// Wrap `handler` in the enabled panels.
	///
	/// Folds over the panels from last to first, so the first declared
	/// enabled panel ends up outermost and its `process_request` runs first.
	/// Disabled panels are left out of the chain.
	pub fn wrap(self: &Arc<Self>, handler: Next) -> Next {
		self.panels
			.iter()
			.rev()
			.filter(|slot| slot.enabled)
			.fold(handler, |next, slot| {
				let toolbar = Arc::clone(self);
				let panel = Arc::clone(&slot.panel);
				Next::new(move |request| async move {
					let ctx = PanelContext::new(panel.id(), &toolbar);
					panel.process_request(&ctx, request, next).await
				})
			})
	}

	/// Run the response-side hooks of every enabled panel.
	///
	/// Failures are logged and isolated to the failing panel.
	pub async fn process_response(&self, response: &ResponseInfo) {
		let Some(request) = self.request.as_ref() else {
			tracing::debug!("Skipping response hooks on a toolbar rebuilt from the store");
			return;
		};

		for panel in self.enabled_panels() {
			let ctx = PanelContext::new(panel.id(), self);
			if let Err(e) = panel.process_response(&ctx, request, response).await {
				tracing::warn!(panel_id = panel.id(), error = %e, "process_response failed");
			}
			if let Err(e) = panel.generate_stats(&ctx, request, response).await {
				tracing::warn!(panel_id = panel.id(), error = %e, "generate_stats failed");
			}
			if let Err(e) = panel.generate_server_timing(&ctx, request, response).await {
				tracing::warn!(panel_id = panel.id(), error = %e, "generate_server_timing failed");
			}
		}
	}

	/// Run only the `generate_server_timing` hooks.
	///
	/// Used for responses whose body is never collected, so `response`
	/// carries the status and headers with an empty body.
	pub async fn process_server_timing(&self, response: &ResponseInfo) {
		let Some(request) = self.request.as_ref() else {
			return;
		};

		for panel in self.enabled_panels() {
			let ctx = PanelContext::new(panel.id(), self);
			if let Err(e) = panel.generate_server_timing(&ctx, request, response).await {
				tracing::warn!(panel_id = panel.id(), error = %e, "generate_server_timing failed");
			}
		}
	}

	/// Stats, server-timing stats and enabled panel ids
	pub fn snapshot(&self) -> ToolbarSnapshot {
		ToolbarSnapshot {
			stats: self.stats.lock().clone(),
			server_timing_stats: self.server_timing_stats.lock().clone(),
			enabled_panels: self.enabled_panel_ids(),
		}
	}

	/// Save the snapshot under this toolbar's store id, minting it if needed
	pub async fn persist(&self, store: &dyn ToolbarStore) -> ToolbarResult<StoreId> {
		let store_id = self.ensure_store_id().clone();
		store.store(store_id.clone(), self.snapshot()).await?;
		tracing::debug!(store_id = %store_id, "Persisted toolbar snapshot");
		Ok(store_id)
	}

	/// Render the toolbar markup.
	///
	/// With inline rendering every enabled panel's content is embedded. In
	/// deferred mode the snapshot is persisted (unless it already was) and the
	/// contents are left for the client to fetch from `render_panel`.
	pub async fn render(&self, store: &dyn ToolbarStore) -> ToolbarResult<RenderedToolbar> {
		let inline = self.config.should_render_panels();
		if !inline && self.store_id().is_none() {
			self.persist(store).await?;
		}
		ui::render_toolbar(self, inline)
	}

	/// Value of the `Server-Timing` header, `None` when nothing was recorded
	pub fn server_timing_header(&self) -> Option<String> {
		let all = self.server_timing_stats.lock();
		let metrics: Vec<String> = all
			.iter()
			.filter_map(|(panel_id, metrics)| Some((panel_id, metrics.as_object()?)))
			.flat_map(|(panel_id, metrics)| {
				metrics.iter().map(move |(key, metric)| {
					let title = metric.get("title").and_then(Value::as_str).unwrap_or(key);
					let value = metric.get("value").and_then(Value::as_f64).unwrap_or(0.0);
					format!(
						"{}_{};dur={};desc=\"{}\"",
						panel_id,
						key,
						value,
						title.replace('"', "'")
					)
				})
			})
			.collect();

		if metrics.is_empty() {
			None
		} else {
			Some(metrics.join(", "))
		}
	}
}

impl fmt::Debug for Toolbar {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Toolbar")
			.field("path", &self.request.as_ref().map(|r| r.path.as_str()))
			.field("panels", &self.panels)
			.field("store_id", &self.store_id.get())
			.finish_non_exhaustive()
	}
}

/// Merge object keys of `value` into `target`; any other shape replaces it
fn merge_into(target: &mut Value, value: Value) {
	match (target, value) {
		(Value::Object(target), Value::Object(value)) => {
			for (key, value) in value {
				merge_into(target.entry(key).or_insert(Value::Null), value);
			}
		}
		(target, value) => *target = value,
	}
}
