//! Request timing panel

use crate::context::{RequestInfo, ResponseInfo};
use crate::error::ToolbarResult;
use crate::panels::{Panel, PanelContext};
use crate::toolbar::Next;
use async_trait::async_trait;
use axum::body::Body;
use axum::response::Response;
use http::Request;
use serde_json::{Value, json};
use std::time::Instant;

/// Measures the time spent inside the chain below it
///
/// The timer wraps the handler, so the measured time covers every panel
/// declared after it plus the handler itself.
#[derive(Debug, Default)]
pub struct TimerPanel;

impl TimerPanel {
	/// Create a timer panel
	pub fn new() -> Self {
		Self
	}
}

#[async_trait]
impl Panel for TimerPanel {
	fn id(&self) -> &'static str {
		"timer"
	}

	fn title(&self) -> &'static str {
		"Time"
	}

	fn nav_subtitle(&self, stats: &Value) -> String {
		stats
			.get("total_time")
			.and_then(Value::as_f64)
			.map(|total| format!("Total: {:.2}ms", total))
			.unwrap_or_default()
	}

	fn has_content(&self) -> bool {
		false
	}

	async fn process_request(
		&self,
		ctx: &PanelContext<'_>,
		request: Request<Body>,
		next: Next,
	) -> Response<Body> {
		let started_at = chrono::Utc::now();
		let start = Instant::now();
		let response = next.run(request).await;
		let elapsed = start.elapsed();

		ctx.record_stats(json!({
			"started_at": started_at.to_rfc3339(),
			"total_time": elapsed.as_secs_f64() * 1000.0,
		}));
		response
	}

	async fn generate_server_timing(
		&self,
		ctx: &PanelContext<'_>,
		_request: &RequestInfo,
		_response: &ResponseInfo,
	) -> ToolbarResult<()> {
		if let Some(total) = ctx.stats().get("total_time").and_then(Value::as_f64) {
			ctx.record_server_timing("total_time", "Elapsed time", total);
		}
		Ok(())
	}

	fn render(&self, stats: &Value) -> ToolbarResult<String> {
		let total = stats.get("total_time").and_then(Value::as_f64).unwrap_or(0.0);
		Ok(format!(
			"<table><tbody><tr><th>Total time</th><td>{:.2} ms</td></tr></tbody></table>",
			total
		))
	}
}
