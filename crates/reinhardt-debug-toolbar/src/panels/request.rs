//! Request information panel

use crate::context::{RequestInfo, ResponseInfo};
use crate::error::ToolbarResult;
use crate::panels::settings::{CLEANSED_SUBSTITUTE, is_sensitive_key};
use crate::panels::{Panel, PanelContext};
use crate::utils::html_escape;
use async_trait::async_trait;
use serde_json::{Value, json};

/// Headers carrying credentials, masked whatever their value
const CREDENTIAL_HEADERS: [&str; 3] = ["authorization", "cookie", "proxy-authorization"];

/// Value of header `name` as recorded in the stats
fn cleanse_header(name: &str, value: &str) -> String {
	let credential = CREDENTIAL_HEADERS
		.iter()
		.any(|header| name.eq_ignore_ascii_case(header));
	if credential || is_sensitive_key(name) {
		CLEANSED_SUBSTITUTE.to_string()
	} else {
		value.to_string()
	}
}

/// Shows what the request carried and how the application answered
#[derive(Debug, Default)]
pub struct RequestPanel;

impl RequestPanel {
	/// Create a request panel
	pub fn new() -> Self {
		Self
	}
}

#[async_trait]
impl Panel for RequestPanel {
	fn id(&self) -> &'static str {
		"request"
	}

	fn title(&self) -> &'static str {
		"Request"
	}

	fn nav_subtitle(&self, stats: &Value) -> String {
		stats
			.get("route_name")
			.and_then(Value::as_str)
			.unwrap_or("<no route>")
			.to_string()
	}

	async fn generate_stats(
		&self,
		ctx: &PanelContext<'_>,
		request: &RequestInfo,
		response: &ResponseInfo,
	) -> ToolbarResult<()> {
		let headers: serde_json::Map<String, Value> = request
			.headers
			.iter()
			.map(|(name, value)| (name.clone(), Value::String(cleanse_header(name, value))))
			.collect();

		ctx.record_stats(json!({
			"method": request.method,
			"path": request.path,
			"query": request.query,
			"route_name": request.route_name,
			"client_ip": request.client_ip,
			"headers": headers,
			"status_code": response.status.as_u16(),
			"content_type": response.content_type(),
		}));
		Ok(())
	}

	fn render(&self, stats: &Value) -> ToolbarResult<String> {
		let field = |key: &str| -> String {
			match stats.get(key) {
				Some(Value::String(s)) => html_escape(s),
				Some(Value::Null) | None => String::new(),
				Some(other) => html_escape(&other.to_string()),
			}
		};

		let mut html = String::new();
		html.push_str("<h4>Request</h4><table><tbody>");
		for (label, key) in [
			("Method", "method"),
			("Path", "path"),
			("Query", "query"),
			("Route", "route_name"),
			("Client IP", "client_ip"),
			("Status", "status_code"),
			("Content type", "content_type"),
		] {
			html.push_str(&format!("<tr><th>{}</th><td>{}</td></tr>", label, field(key)));
		}
		html.push_str("</tbody></table>");

		html.push_str("<h4>Headers</h4><table><tbody>");
		if let Some(headers) = stats.get("headers").and_then(Value::as_object) {
			for (name, value) in headers {
				html.push_str(&format!(
					"<tr><th>{}</th><td>{}</td></tr>",
					html_escape(name),
					html_escape(value.as_str().unwrap_or_default())
				));
			}
		}
		html.push_str("</tbody></table>");
		Ok(html)
	}
}
