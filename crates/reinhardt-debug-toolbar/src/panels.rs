//! Panel system
//!
//! A panel is a unit of capture attached to one request's toolbar. Every hook
//! receives a [`PanelContext`] through which it records its statistics on the
//! owning toolbar.

pub mod history;
pub mod registry;
pub mod request;
pub mod settings;
pub mod timer;

pub use registry::{PanelFactory, PanelRegistry};

use crate::context::{RequestInfo, ResponseInfo};
use crate::error::ToolbarResult;
use crate::middleware::ToolbarConfig;
use crate::routes::Route;
use crate::store::StoreId;
use crate::toolbar::{Next, Toolbar};
use async_trait::async_trait;
use axum::body::Body;
use axum::response::Response;
use http::Request;
use serde_json::Value;

/// Common contract of every panel
///
/// Hooks run in chain order, one after the other, for enabled panels only.
/// Errors from the response-side hooks are logged and isolated per panel.
#[async_trait]
pub trait Panel: Send + Sync {
	/// Stable identifier, unique within a registry
	fn id(&self) -> &'static str;

	/// Display title
	fn title(&self) -> &'static str;

	/// Short text shown under the title in the panel list
	fn nav_subtitle(&self, _stats: &Value) -> String {
		String::new()
	}

	/// Whether the panel has a content pane
	fn has_content(&self) -> bool {
		true
	}

	/// Whether the panel's content is worth showing for a past request.
	///
	/// The history sidebar skips panels that return `false`.
	fn is_historical(&self) -> bool {
		true
	}

	/// Extra toolbar routes (relative to the mount prefix) this panel serves
	fn routes(&self) -> Vec<Route> {
		Vec::new()
	}

	/// Scripts the client loads alongside the panel content
	fn scripts(&self) -> Vec<String> {
		Vec::new()
	}

	/// Wrap request handling.
	///
	/// Implementations call `next` to continue the chain. Returning a
	/// response without calling `next` short-circuits the handler.
	async fn process_request(
		&self,
		_ctx: &PanelContext<'_>,
		request: Request<Body>,
		next: Next,
	) -> Response<Body> {
		next.run(request).await
	}

	/// Observe the finished response
	async fn process_response(
		&self,
		_ctx: &PanelContext<'_>,
		_request: &RequestInfo,
		_response: &ResponseInfo,
	) -> ToolbarResult<()> {
		Ok(())
	}

	/// Record the panel's statistics in one shot
	async fn generate_stats(
		&self,
		_ctx: &PanelContext<'_>,
		_request: &RequestInfo,
		_response: &ResponseInfo,
	) -> ToolbarResult<()> {
		Ok(())
	}

	/// Record metrics for the `Server-Timing` header
	async fn generate_server_timing(
		&self,
		_ctx: &PanelContext<'_>,
		_request: &RequestInfo,
		_response: &ResponseInfo,
	) -> ToolbarResult<()> {
		Ok(())
	}

	/// Render the content pane from recorded statistics
	fn render(&self, stats: &Value) -> ToolbarResult<String>;
}

/// Handle a panel uses to reach its toolbar while a hook runs
pub struct PanelContext<'a> {
	panel_id: &'static str,
	toolbar: &'a Toolbar,
}

impl<'a> PanelContext<'a> {
	pub(crate) fn new(panel_id: &'static str, toolbar: &'a Toolbar) -> Self {
		Self { panel_id, toolbar }
	}

	/// Id of the panel running the hook
	pub fn panel_id(&self) -> &'static str {
		self.panel_id
	}

	/// Configuration snapshot of the toolbar
	pub fn config(&self) -> &ToolbarConfig {
		self.toolbar.config()
	}

	/// The request the toolbar was built for
	pub fn request(&self) -> Option<&RequestInfo> {
		self.toolbar.request()
	}

	/// Merge `stats` into this panel's statistics
	pub fn record_stats(&self, stats: Value) {
		self.toolbar.record_stats(self.panel_id, stats);
	}

	/// Statistics recorded so far for this panel
	pub fn stats(&self) -> Value {
		self.toolbar.panel_stats(self.panel_id)
	}

	/// Store id of the toolbar, minted on first use.
	///
	/// Asking for the id marks the toolbar for persistence at the end of
	/// the request.
	pub fn store_id(&self) -> StoreId {
		self.toolbar.ensure_store_id().clone()
	}

	/// Record one `Server-Timing` metric for this panel
	pub fn record_server_timing(&self, key: &str, title: &str, value: f64) {
		self.toolbar
			.record_server_timing(self.panel_id, key, title, value);
	}
}
