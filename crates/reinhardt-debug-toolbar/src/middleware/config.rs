//! Toolbar configuration

use crate::context::client_addr;
use crate::error::{ToolbarError, ToolbarResult};
use axum::body::Body;
use http::Request;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::{Arc, LazyLock};

/// Key generated for this process when none is configured
static GENERATED_SECRET_KEY: LazyLock<String> =
	LazyLock::new(|| uuid::Uuid::new_v4().simple().to_string());

/// Activation predicate deciding whether the toolbar runs for a request
pub type ShowToolbar = Arc<dyn Fn(&Request<Body>, &ToolbarConfig) -> bool + Send + Sync>;

/// Which [`ToolbarStore`](crate::store::ToolbarStore) the layer builds by default
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
	/// Bounded in-process store, for single-process servers
	#[default]
	Memory,
	/// Store backed by a shared cache, for multi-process servers
	Cache,
}

/// Debug toolbar configuration
///
/// Deserializes from settings with every field optional. A toolbar takes an
/// `Arc` snapshot at construction, so changing the layer's configuration never
/// affects a request already in flight.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolbarConfig {
	/// Server-wide debug switch; the default predicate requires it
	pub enabled: bool,
	/// Client addresses allowed to see the toolbar
	pub internal_ips: Vec<IpAddr>,
	/// Replaces the default activation predicate wholesale
	#[serde(skip)]
	pub show_toolbar: Option<ShowToolbar>,
	/// Maximum number of toolbar snapshots kept by the store
	pub results_cache_size: usize,
	/// Store built when none is supplied explicitly
	pub store_backend: StoreBackend,
	/// Panels disabled unless the client opts back in
	pub disable_panels: BTreeSet<String>,
	/// Tag whose closing form marks the injection point
	pub tag: String,
	/// Replace redirects with an interstitial page
	pub intercept_redirects: bool,
	/// Render panel contents inline (`Some(true)`) or defer them through the
	/// store (`Some(false)`); `None` decides from [`Self::multiprocess`]
	pub render_panels: Option<bool>,
	/// Whether the server runs several worker processes sharing no memory
	pub multiprocess: bool,
	/// Mount prefix of the toolbar's own routes
	pub url_prefix: String,
	/// Base URL the toolbar assets are served from
	pub static_url: String,
	/// Key used to sign store ids handed to the client.
	///
	/// Defaults to a key generated once per process, which other worker
	/// processes cannot verify; multi-process servers must set it.
	pub secret_key: String,
	/// Largest serialized snapshot a shared-cache store accepts
	pub max_snapshot_bytes: usize,
	/// Emit a `Server-Timing` header on captured responses
	pub show_server_timing: bool,
	/// Extra attributes appended to the toolbar's root element
	pub root_tag_extra_attrs: String,
}

impl Default for ToolbarConfig {
	fn default() -> Self {
		Self {
			enabled: cfg!(debug_assertions),
			internal_ips: vec![
				IpAddr::V4(Ipv4Addr::LOCALHOST),
				IpAddr::V6(Ipv6Addr::LOCALHOST),
			],
			show_toolbar: None,
			results_cache_size: 25,
			store_backend: StoreBackend::Memory,
			disable_panels: BTreeSet::new(),
			tag: "body".to_string(),
			intercept_redirects: false,
			render_panels: None,
			multiprocess: false,
			url_prefix: "/__debug__/".to_string(),
			static_url: "/static/".to_string(),
			secret_key: GENERATED_SECRET_KEY.clone(),
			max_snapshot_bytes: 1024 * 1024,
			show_server_timing: true,
			root_tag_extra_attrs: String::new(),
		}
	}
}

impl fmt::Debug for ToolbarConfig {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ToolbarConfig")
			.field("enabled", &self.enabled)
			.field("internal_ips", &self.internal_ips)
			.field("show_toolbar", &self.show_toolbar.as_ref().map(|_| "<callback>"))
			.field("results_cache_size", &self.results_cache_size)
			.field("store_backend", &self.store_backend)
			.field("disable_panels", &self.disable_panels)
			.field("tag", &self.tag)
			.field("intercept_redirects", &self.intercept_redirects)
			.field("render_panels", &self.render_panels)
			.field("multiprocess", &self.multiprocess)
			.field("url_prefix", &self.url_prefix)
			.field("static_url", &self.static_url)
			.field("max_snapshot_bytes", &self.max_snapshot_bytes)
			.field("show_server_timing", &self.show_server_timing)
			.finish_non_exhaustive()
	}
}

impl ToolbarConfig {
	/// Set the server-wide debug switch
	pub fn with_enabled(mut self, enabled: bool) -> Self {
		self.enabled = enabled;
		self
	}

	/// Set the client addresses allowed to see the toolbar
	pub fn with_internal_ips(mut self, ips: Vec<IpAddr>) -> Self {
		self.internal_ips = ips;
		self
	}

	/// Replace the activation predicate
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_debug_toolbar::ToolbarConfig;
	///
	/// let config = ToolbarConfig::default()
	///     .with_show_toolbar(|request, _config| request.uri().path() != "/health");
	/// assert!(config.show_toolbar.is_some());
	/// ```
	pub fn with_show_toolbar<F>(mut self, predicate: F) -> Self
	where
		F: Fn(&Request<Body>, &ToolbarConfig) -> bool + Send + Sync + 'static,
	{
		self.show_toolbar = Some(Arc::new(predicate));
		self
	}

	/// Set the number of snapshots the store keeps
	pub fn with_results_cache_size(mut self, size: usize) -> Self {
		self.results_cache_size = size;
		self
	}

	/// Select the default store backend
	pub fn with_store_backend(mut self, backend: StoreBackend) -> Self {
		self.store_backend = backend;
		self
	}

	/// Disable a panel by id unless the client's cookie turns it on
	pub fn disable_panel(mut self, panel_id: impl Into<String>) -> Self {
		self.disable_panels.insert(panel_id.into());
		self
	}

	/// Set the tag whose closing form marks the injection point
	pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
		self.tag = tag.into();
		self
	}

	/// Toggle redirect interception
	pub fn with_intercept_redirects(mut self, intercept: bool) -> Self {
		self.intercept_redirects = intercept;
		self
	}

	/// Force inline (`Some(true)`) or deferred (`Some(false)`) rendering
	pub fn with_render_panels(mut self, render_panels: Option<bool>) -> Self {
		self.render_panels = render_panels;
		self
	}

	/// Declare whether the server runs several worker processes
	pub fn with_multiprocess(mut self, multiprocess: bool) -> Self {
		self.multiprocess = multiprocess;
		self
	}

	/// Set the mount prefix of the toolbar routes
	pub fn with_url_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.url_prefix = prefix.into();
		self
	}

	/// Set the base URL of the toolbar assets
	pub fn with_static_url(mut self, url: impl Into<String>) -> Self {
		self.static_url = url.into();
		self
	}

	/// Set the key used to sign store ids
	pub fn with_secret_key(mut self, key: impl Into<String>) -> Self {
		self.secret_key = key.into();
		self
	}

	/// Set the snapshot size limit of shared-cache stores
	pub fn with_max_snapshot_bytes(mut self, limit: usize) -> Self {
		self.max_snapshot_bytes = limit;
		self
	}

	/// Toggle the `Server-Timing` header
	pub fn with_server_timing(mut self, show: bool) -> Self {
		self.show_server_timing = show;
		self
	}

	/// The closing tag the toolbar is inserted before, e.g. `</body>`
	pub fn closing_tag(&self) -> String {
		format!("</{}>", self.tag)
	}

	/// Whether panel contents are rendered inline for this deployment
	pub fn should_render_panels(&self) -> bool {
		self.render_panels.unwrap_or(!self.multiprocess)
	}

	/// Whether `panel_id` is enabled when the client sent no override
	pub fn panel_enabled_by_default(&self, panel_id: &str) -> bool {
		!self.disable_panels.contains(panel_id)
	}

	/// Run the configured activation predicate for `request`
	pub fn show_toolbar_for(&self, request: &Request<Body>) -> bool {
		match &self.show_toolbar {
			Some(predicate) => predicate(request, self),
			None => show_toolbar(request, self),
		}
	}

	/// Check the configuration, reporting the first problem found
	pub fn validate(&self) -> ToolbarResult<()> {
		if self.results_cache_size == 0 {
			return Err(ToolbarError::ImproperlyConfigured(
				"`results_cache_size` must be at least 1".to_string(),
			));
		}
		if self.tag.is_empty() || !self.tag.chars().all(|c| c.is_ascii_alphanumeric()) {
			return Err(ToolbarError::ImproperlyConfigured(format!(
				"`tag` must be a plain HTML tag name such as \"body\", got {:?}",
				self.tag
			)));
		}
		if self.url_prefix.len() < 2
			|| !self.url_prefix.starts_with('/')
			|| !self.url_prefix.ends_with('/')
		{
			return Err(ToolbarError::ImproperlyConfigured(format!(
				"`url_prefix` must start and end with '/', got {:?}",
				self.url_prefix
			)));
		}
		if self.static_url.is_empty() {
			return Err(missing_static_url());
		}
		if self.secret_key.is_empty() {
			return Err(ToolbarError::ImproperlyConfigured(
				"`secret_key` must not be empty; it signs the store ids sent to the browser"
					.to_string(),
			));
		}
		if self.multiprocess && self.secret_key == *GENERATED_SECRET_KEY {
			return Err(ToolbarError::ImproperlyConfigured(
				"`secret_key` must be set explicitly when `multiprocess` is on; \
				 every worker has to sign store ids with the same key"
					.to_string(),
			));
		}
		Ok(())
	}
}

/// Error reported when the asset prerequisite of the toolbar is absent
pub(crate) fn missing_static_url() -> ToolbarError {
	ToolbarError::ImproperlyConfigured(
		"The debug toolbar requires its static assets to be served. \
		 Set `static_url` (for example \"/static/\") and serve the toolbar assets under it."
			.to_string(),
	)
}

/// Default activation predicate.
///
/// The toolbar shows when the client address is one of
/// [`ToolbarConfig::internal_ips`] and the debug switch is on.
pub fn show_toolbar(request: &Request<Body>, config: &ToolbarConfig) -> bool {
	let Some(ip) = client_addr(request) else {
		return false;
	};
	config.internal_ips.contains(&ip) && config.enabled
}
