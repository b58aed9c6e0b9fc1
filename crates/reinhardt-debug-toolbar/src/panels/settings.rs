//! Settings panel

use crate::context::{RequestInfo, ResponseInfo};
use crate::error::ToolbarResult;
use crate::panels::{Panel, PanelContext};
use crate::utils::html_escape;
use async_trait::async_trait;
use regex::Regex;
use serde_json::{Value, json};
use std::sync::LazyLock;

/// Replacement shown for sensitive values
pub const CLEANSED_SUBSTITUTE: &str = "********************";

static SENSITIVE_KEY: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?i)API|KEY|PASS|SECRET|SIGNATURE|TOKEN").expect("valid regex")
});

/// Shows the toolbar configuration in effect for the request
///
/// Values under keys that look sensitive are masked.
#[derive(Debug, Default)]
pub struct SettingsPanel;

impl SettingsPanel {
	/// Create a settings panel
	pub fn new() -> Self {
		Self
	}
}

/// Whether values stored under `key` should be masked
pub(crate) fn is_sensitive_key(key: &str) -> bool {
	SENSITIVE_KEY.is_match(key)
}

/// Mask every value whose key looks sensitive, at any depth
pub fn cleanse_settings(value: Value) -> Value {
	match value {
		Value::Object(map) => Value::Object(
			map.into_iter()
				.map(|(key, value)| {
					if is_sensitive_key(&key) {
						(key, Value::String(CLEANSED_SUBSTITUTE.to_string()))
					} else {
						(key, cleanse_settings(value))
					}
				})
				.collect(),
		),
		Value::Array(items) => Value::Array(items.into_iter().map(cleanse_settings).collect()),
		other => other,
	}
}

#[async_trait]
impl Panel for SettingsPanel {
	fn id(&self) -> &'static str {
		"settings"
	}

	fn title(&self) -> &'static str {
		"Settings"
	}

	async fn generate_stats(
		&self,
		ctx: &PanelContext<'_>,
		_request: &RequestInfo,
		_response: &ResponseInfo,
	) -> ToolbarResult<()> {
		let settings = cleanse_settings(serde_json::to_value(ctx.config())?);
		ctx.record_stats(json!({ "settings": settings }));
		Ok(())
	}

	fn render(&self, stats: &Value) -> ToolbarResult<String> {
		let mut html = String::from("<table><thead><tr><th>Setting</th><th>Value</th></tr></thead><tbody>");
		if let Some(settings) = stats.get("settings").and_then(Value::as_object) {
			for (key, value) in settings {
				let value = serde_json::to_string_pretty(value)?;
				html.push_str(&format!(
					"<tr><td>{}</td><td><code>{}</code></td></tr>",
					html_escape(key),
					html_escape(&value)
				));
			}
		}
		html.push_str("</tbody></table>");
		Ok(html)
	}
}
