//! Request history panel
//!
//! Every toolbar carrying this panel is persisted, which makes the store a
//! request history. The client lists it through `history_refresh/` and
//! switches the toolbar to a past request through `history_sidebar/`.

use crate::context::{RequestInfo, ResponseInfo};
use crate::error::ToolbarResult;
use crate::panels::{Panel, PanelContext};
use crate::routes::{Route, ToolbarView};
use crate::store::StoreId;
use crate::utils::{html_escape, sign_store_id};
use async_trait::async_trait;
use serde_json::{Value, json};

/// Lists the requests the toolbar has seen
#[derive(Debug, Default)]
pub struct HistoryPanel;

impl HistoryPanel {
	/// Create a history panel
	pub fn new() -> Self {
		Self
	}
}

/// Table row describing one stored request.
///
/// `stats` are the history panel stats of that request; missing fields
/// render empty.
pub fn render_row(store_id: &StoreId, stats: &Value) -> String {
	let text = |key: &str| -> String {
		match stats.get(key) {
			Some(Value::String(s)) => html_escape(s),
			Some(Value::Null) | None => String::new(),
			Some(other) => html_escape(&other.to_string()),
		}
	};

	format!(
		"<tr class=\"djdt-history-row\" data-store-id=\"{id}\" data-hash=\"{hash}\">\
		 <td><button type=\"button\" class=\"switchHistory\">Switch</button></td>\
		 <td>{time}</td><td>{method}</td><td>{url}</td><td>{status}</td><td>{fetch}</td></tr>",
		id = html_escape(store_id.as_str()),
		hash = text("hash"),
		time = text("time"),
		method = text("request_method"),
		url = text("request_url"),
		status = text("status_code"),
		fetch = if stats.get("is_fetch").and_then(Value::as_bool) == Some(true) {
			"fetch"
		} else {
			""
		},
	)
}

#[async_trait]
impl Panel for HistoryPanel {
	fn id(&self) -> &'static str {
		"history"
	}

	fn title(&self) -> &'static str {
		"History"
	}

	fn nav_subtitle(&self, stats: &Value) -> String {
		stats
			.get("request_url")
			.and_then(Value::as_str)
			.unwrap_or_default()
			.to_string()
	}

	fn is_historical(&self) -> bool {
		false
	}

	fn routes(&self) -> Vec<Route> {
		vec![
			Route::toolbar(
				"history_sidebar",
				"history_sidebar/",
				ToolbarView::HistorySidebar,
			),
			Route::toolbar(
				"history_refresh",
				"history_refresh/",
				ToolbarView::HistoryRefresh,
			),
		]
	}

	fn scripts(&self) -> Vec<String> {
		vec!["debug_toolbar/js/history.js".to_string()]
	}

	async fn generate_stats(
		&self,
		ctx: &PanelContext<'_>,
		request: &RequestInfo,
		response: &ResponseInfo,
	) -> ToolbarResult<()> {
		let store_id = ctx.store_id();
		let request_url = match &request.query {
			Some(query) => format!("{}?{}", request.path, query),
			None => request.path.clone(),
		};

		ctx.record_stats(json!({
			"store_id": store_id,
			"hash": sign_store_id(&ctx.config().secret_key, store_id.as_str()),
			"request_method": request.method,
			"request_url": request_url,
			"status_code": response.status.as_u16(),
			"time": request.timestamp.to_rfc3339(),
			"is_fetch": request.is_fetch,
		}));
		Ok(())
	}

	fn render(&self, stats: &Value) -> ToolbarResult<String> {
		let mut html = String::from(
			"<table class=\"djdt-history\"><thead><tr><th></th><th>Time</th><th>Method</th>\
			 <th>Path</th><th>Status</th><th></th></tr></thead><tbody id=\"djdtHistoryRequests\">",
		);
		if let Some(store_id) = stats.get("store_id").and_then(Value::as_str) {
			html.push_str(&render_row(&StoreId::new(store_id), stats));
		}
		html.push_str("</tbody></table>");
		Ok(html)
	}
}
