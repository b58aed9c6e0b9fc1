//! Toolbar markup
//!
//! The toolbar is rendered as a plain HTML fragment. The client side lives in
//! the toolbar's static assets, served under [`ToolbarConfig::static_url`].
//!
//! [`ToolbarConfig::static_url`]: crate::ToolbarConfig::static_url

pub mod injection;

use crate::error::ToolbarResult;
use crate::middleware::config::missing_static_url;
use crate::toolbar::Toolbar;
use crate::utils::html_escape;
use http::StatusCode;

/// Message shown when a stored toolbar is gone
pub const PANEL_UNAVAILABLE: &str =
	"Data for this panel isn't available anymore. Please reload the page and retry.";

/// Both renderings of a toolbar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedToolbar {
	/// Markup without asset tags, for fetch-style requests
	pub html: String,
	/// Markup preceded by the stylesheet and script tags, for injection
	pub html_with_js: String,
}

/// Render `toolbar`.
///
/// With `inline` every enabled panel's content is embedded; otherwise each
/// content pane is a placeholder the client fills from `render_panel/`.
/// A failing panel is logged and replaced by an error notice.
pub fn render_toolbar(toolbar: &Toolbar, inline: bool) -> ToolbarResult<RenderedToolbar> {
	let config = toolbar.config();
	if config.static_url.is_empty() {
		return Err(missing_static_url());
	}

	let store_id = toolbar
		.store_id()
		.map(|id| html_escape(id.as_str()))
		.unwrap_or_default();
	let render_panel_url = format!("{}render_panel/", config.url_prefix);

	let mut html = String::new();
	html.push_str(&format!(
		"<div id=\"djDebug\" class=\"djdt-hidden\" dir=\"ltr\" data-store-id=\"{}\" \
		 data-render-panel-url=\"{}\" data-url-prefix=\"{}\"{}>",
		store_id,
		html_escape(&render_panel_url),
		html_escape(&config.url_prefix),
		extra_attrs(&config.root_tag_extra_attrs),
	));

	html.push_str("<div id=\"djDebugToolbar\"><ul id=\"djDebugPanelList\">");
	html.push_str("<li><a id=\"djHideToolBarButton\" href=\"#\" title=\"Hide toolbar\">Hide &#187;</a></li>");
	for slot in toolbar.panels() {
		let panel = slot.panel();
		let id = panel.id();
		let stats = toolbar.panel_stats(id);
		let subtitle = if slot.enabled() {
			panel.nav_subtitle(&stats)
		} else {
			String::new()
		};
		html.push_str(&format!(
			"<li id=\"djdt-{id}\" class=\"djDebugPanelButton\">\
			 <input type=\"checkbox\" data-cookie=\"djdt{id}\"{checked} \
			 title=\"Disable for next and successive requests\">",
			id = html_escape(id),
			checked = if slot.enabled() { " checked" } else { "" },
		));
		let label = format!(
			"{}<br><small>{}</small>",
			html_escape(panel.title()),
			html_escape(&subtitle)
		);
		if slot.enabled() && panel.has_content() {
			html.push_str(&format!(
				"<a href=\"#\" title=\"{}\" class=\"{}\">{}</a>",
				html_escape(panel.title()),
				html_escape(id),
				label
			));
		} else {
			html.push_str(&format!("<div class=\"djdt-contentless\">{}</div>", label));
		}
		html.push_str("</li>");
	}
	html.push_str("</ul></div>");
	html.push_str(
		"<div class=\"djdt-hidden\" id=\"djDebugToolbarHandle\">\
		 <div title=\"Show toolbar\" id=\"djShowToolBarButton\"><span id=\"djShowToolBarD\">D</span>\
		 <span id=\"djShowToolBarJ\">J</span>DT</div></div>",
	);

	for panel in toolbar.enabled_panels().filter(|panel| panel.has_content()) {
		let id = panel.id();
		let content = if inline {
			match panel.render(&toolbar.panel_stats(id)) {
				Ok(content) => content,
				Err(e) => {
					tracing::warn!(panel_id = id, error = %e, "Panel failed to render");
					"<p class=\"djdt-error\">This panel failed to render.</p>".to_string()
				}
			}
		} else {
			"<div class=\"djdt-loader\"></div>".to_string()
		};
		html.push_str(&format!(
			"<div id=\"{id}\" class=\"djdt-panelContent djdt-hidden\">\
			 <div class=\"djDebugPanelTitle\"><button type=\"button\" class=\"djDebugClose\">&#215;</button>\
			 <h3>{title}</h3></div><div class=\"djDebugPanelContent\"><div class=\"djdt-scroll\">{content}</div></div></div>",
			id = html_escape(id),
			title = html_escape(panel.title()),
			content = content,
		));
	}
	html.push_str("</div>");

	let html_with_js = format!(
		"<link rel=\"stylesheet\" href=\"{static_url}debug_toolbar/css/toolbar.css\">\
		 <script type=\"module\" src=\"{static_url}debug_toolbar/js/toolbar.js\" async></script>{html}",
		static_url = html_escape(&config.static_url),
		html = html,
	);

	Ok(RenderedToolbar { html, html_with_js })
}

fn extra_attrs(attrs: &str) -> String {
	let attrs = attrs.trim();
	if attrs.is_empty() {
		String::new()
	} else {
		format!(" {}", attrs)
	}
}

/// Interstitial page replacing an intercepted redirect
pub fn render_redirect(status: StatusCode, location: &str) -> String {
	let location = html_escape(location);
	format!(
		"<!DOCTYPE html>\n<html lang=\"en\"><head><meta charset=\"utf-8\">\
		 <title>Debug toolbar redirect</title></head><body>\
		 <h1>{status}</h1>\
		 <h2>Location: <a id=\"redirect_to\" href=\"{location}\">{location}</a></h2>\
		 <p class=\"notice\">The debug toolbar has intercepted a redirect to the above URL \
		 for debug viewing purposes. You can click the above link to continue with the \
		 redirect as normal.</p></body></html>",
		status = status,
		location = location,
	)
}
