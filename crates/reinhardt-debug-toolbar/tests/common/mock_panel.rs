//! Mock Panel implementation for testing
//!
//! This module provides a configurable mock implementation of the Panel trait
//! for testing the registry, the wrapping chain and rendering.

use async_trait::async_trait;
use axum::body::Body;
use axum::response::{IntoResponse, Response};
use http::{Request, StatusCode};
use reinhardt_debug_toolbar::{
	Next, Panel, PanelContext, RequestInfo, ResponseInfo,
	error::{ToolbarError, ToolbarResult},
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Calls observed across every instance built from one [`MockPanel`]
#[derive(Debug, Default)]
pub struct MockCalls {
	/// `process_request` invocations
	pub requests: AtomicUsize,
	/// `generate_stats` invocations
	pub stats: AtomicUsize,
	/// `render` invocations
	pub renders: AtomicUsize,
}

impl MockCalls {
	/// Number of `process_request` calls
	pub fn requests(&self) -> usize {
		self.requests.load(Ordering::SeqCst)
	}

	/// Number of `generate_stats` calls
	pub fn stats(&self) -> usize {
		self.stats.load(Ordering::SeqCst)
	}

	/// Number of `render` calls
	pub fn renders(&self) -> usize {
		self.renders.load(Ordering::SeqCst)
	}
}

/// Mock Panel implementation for testing
///
/// Clones share their call counters, so a registry factory can hand out
/// fresh instances while the test keeps observing them.
///
/// # Example
///
/// ```rust,ignore
/// let panel = MockPanel::new("mock").with_stats(json!({"value": 1}));
/// let mut registry = PanelRegistry::new();
/// registry.register(panel.factory()).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct MockPanel {
	id: &'static str,
	title: &'static str,
	stats: Value,
	short_circuit: bool,
	fail_stats: bool,
	fail_render: bool,
	calls: Arc<MockCalls>,
}

impl MockPanel {
	/// Panel recording `{"value": 1}` under `id`
	pub fn new(id: &'static str) -> Self {
		Self {
			id,
			title: "Mock",
			stats: json!({"value": 1}),
			short_circuit: false,
			fail_stats: false,
			fail_render: false,
			calls: Arc::new(MockCalls::default()),
		}
	}

	/// Record `stats` from `generate_stats`
	pub fn with_stats(mut self, stats: Value) -> Self {
		self.stats = stats;
		self
	}

	/// Answer from `process_request` without calling the handler
	pub fn short_circuiting(mut self) -> Self {
		self.short_circuit = true;
		self
	}

	/// Fail in `generate_stats`
	pub fn failing_stats(mut self) -> Self {
		self.fail_stats = true;
		self
	}

	/// Fail in `render`
	pub fn failing_render(mut self) -> Self {
		self.fail_render = true;
		self
	}

	/// Shared call counters
	pub fn calls(&self) -> Arc<MockCalls> {
		Arc::clone(&self.calls)
	}

	/// Registry constructor handing out clones of this panel
	pub fn factory(&self) -> impl Fn() -> MockPanel + Send + Sync + 'static {
		let panel = self.clone();
		move || panel.clone()
	}
}

#[async_trait]
impl Panel for MockPanel {
	fn id(&self) -> &'static str {
		self.id
	}

	fn title(&self) -> &'static str {
		self.title
	}

	fn nav_subtitle(&self, stats: &Value) -> String {
		format!("value={}", stats.get("value").cloned().unwrap_or(Value::Null))
	}

	async fn process_request(
		&self,
		_ctx: &PanelContext<'_>,
		request: Request<Body>,
		next: Next,
	) -> Response<Body> {
		self.calls.requests.fetch_add(1, Ordering::SeqCst);
		if self.short_circuit {
			return (StatusCode::FORBIDDEN, "short-circuited").into_response();
		}
		next.run(request).await
	}

	async fn generate_stats(
		&self,
		ctx: &PanelContext<'_>,
		_request: &RequestInfo,
		_response: &ResponseInfo,
	) -> ToolbarResult<()> {
		self.calls.stats.fetch_add(1, Ordering::SeqCst);
		if self.fail_stats {
			return Err(ToolbarError::RenderError("stats exploded".to_string()));
		}
		ctx.record_stats(self.stats.clone());
		Ok(())
	}

	fn render(&self, stats: &Value) -> ToolbarResult<String> {
		self.calls.renders.fetch_add(1, Ordering::SeqCst);
		if self.fail_render {
			return Err(ToolbarError::RenderError("render exploded".to_string()));
		}
		Ok(format!("<p class=\"mock\">{}</p>", stats))
	}
}
