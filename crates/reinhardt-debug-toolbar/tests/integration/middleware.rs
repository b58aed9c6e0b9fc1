//! Activation, injection and per-task registry behaviour of the layer

use crate::common::fixtures::*;
use crate::common::mock_panel::MockPanel;
use axum::Router;
use axum::body::Body;
use axum::response::Response;
use axum::routing::get;
use http::{StatusCode, Uri, header};
use reinhardt_debug_toolbar::{
	ActiveToolbars, DebugToolbarLayer, PanelRegistry, Toolbar, ToolbarConfig,
};
use rstest::*;
use serde_json::json;
use std::sync::{Arc, Mutex};
use tokio::sync::Barrier;
use tower::ServiceExt;

fn mock_registry(panel: &MockPanel) -> PanelRegistry {
	let mut registry = PanelRegistry::new();
	registry.register(panel.factory()).unwrap();
	registry
}

fn layer_with(config: ToolbarConfig, registry: PanelRegistry) -> DebugToolbarLayer {
	DebugToolbarLayer::new(config, registry).unwrap()
}

#[rstest]
#[tokio::test]
async fn test_inactive_request_is_untouched(default_config: ToolbarConfig) {
	let panel = MockPanel::new("mock");
	let active = Arc::new(ActiveToolbars::new());
	let layer = layer_with(default_config.with_enabled(false), mock_registry(&panel))
		.with_active_toolbars(Arc::clone(&active));

	let direct = html_app().oneshot(local_request("/")).await.unwrap();
	let direct_headers = direct.headers().clone();
	let direct_body = body_bytes(direct).await;

	let response = layered(&layer, html_app())
		.oneshot(local_request("/"))
		.await
		.unwrap();

	assert_eq!(response.headers(), &direct_headers);
	assert_eq!(body_bytes(response).await, direct_body);
	assert_eq!(panel.calls().requests(), 0);
	assert!(active.is_empty());
}

#[rstest]
#[tokio::test]
async fn test_unknown_client_is_untouched(default_config: ToolbarConfig) {
	let panel = MockPanel::new("mock");
	let layer = layer_with(default_config, mock_registry(&panel));
	// No client address is known, so the default predicate declines.
	let request = http::Request::builder().uri("/").body(Body::empty()).unwrap();

	let response = layered(&layer, html_app()).oneshot(request).await.unwrap();

	assert_eq!(body_string(response).await, HTML_PAGE);
	assert_eq!(panel.calls().requests(), 0);
}

#[rstest]
#[tokio::test]
async fn test_single_panel_injection(default_config: ToolbarConfig) {
	let panel = MockPanel::new("mock").with_stats(json!({"value": 1}));
	let layer = layer_with(default_config, mock_registry(&panel));

	let response = layered(&layer, html_app())
		.oneshot(local_request("/"))
		.await
		.unwrap();

	let content_length: usize = response
		.headers()
		.get(header::CONTENT_LENGTH)
		.unwrap()
		.to_str()
		.unwrap()
		.parse()
		.unwrap();
	let body = body_string(response).await;

	assert_eq!(content_length, body.len());
	assert!(body.starts_with("<html><body>hi<link rel=\"stylesheet\""));
	assert!(body.ends_with("</div></body></html>"));
	assert_eq!(body.matches("id=\"djDebug\"").count(), 1);
	assert!(body.contains(r#"<p class="mock">{"value":1}</p>"#));
	assert!(body.contains("value=1"));
	assert_eq!(panel.calls().requests(), 1);
	assert_eq!(panel.calls().stats(), 1);
}

#[rstest]
#[tokio::test]
async fn test_injects_before_last_closing_tag(default_config: ToolbarConfig) {
	let layer = layer_with(default_config, mock_registry(&MockPanel::new("mock")));
	let app = Router::new().route(
		"/",
		get(|| async { html_with_length("<html><body><pre></body></pre>hi</BODY></html>") }),
	);

	let response = layered(&layer, app).oneshot(local_request("/")).await.unwrap();
	let body = body_string(response).await;

	assert!(body.starts_with("<html><body><pre></body></pre>hi<link"));
	assert!(body.ends_with("</div></BODY></html>"));
	assert_eq!(body.matches("id=\"djDebug\"").count(), 1);
}

#[rstest]
#[tokio::test]
async fn test_missing_closing_tag_leaves_body(default_config: ToolbarConfig) {
	let layer = layer_with(default_config, mock_registry(&MockPanel::new("mock")));
	let app = Router::new().route("/", get(|| async { html_with_length("<p>fragment</p>") }));

	let response = layered(&layer, app).oneshot(local_request("/")).await.unwrap();

	assert_eq!(body_string(response).await, "<p>fragment</p>");
}

#[rstest]
#[case("/json")]
#[tokio::test]
async fn test_non_html_passes_through(default_config: ToolbarConfig, #[case] uri: &str) {
	let layer = layer_with(default_config, mock_registry(&MockPanel::new("mock")));

	let response = layered(&layer, html_app()).oneshot(local_request(uri)).await.unwrap();

	assert_eq!(body_string(response).await, r#"{"ok":true}"#);
}

#[rstest]
#[tokio::test]
async fn test_encoded_html_passes_through(default_config: ToolbarConfig) {
	let layer = layer_with(default_config, mock_registry(&MockPanel::new("mock")));
	let app = Router::new().route(
		"/",
		get(|| async {
			Response::builder()
				.header(header::CONTENT_TYPE, "text/html")
				.header(header::CONTENT_ENCODING, "gzip")
				.body(Body::from(HTML_PAGE))
				.unwrap()
		}),
	);

	let response = layered(&layer, app).oneshot(local_request("/")).await.unwrap();

	assert_eq!(body_string(response).await, HTML_PAGE);
}

#[rstest]
#[tokio::test]
async fn test_registry_entry_lives_during_request(default_config: ToolbarConfig) {
	let active = Arc::new(ActiveToolbars::new());
	let layer = layer_with(default_config, mock_registry(&MockPanel::new("mock")))
		.with_active_toolbars(Arc::clone(&active));
	let seen = Arc::clone(&active);
	let app = Router::new().route(
		"/",
		get(move || {
			let seen = Arc::clone(&seen);
			async move { format!("{}:{}", seen.len(), seen.current().is_some()) }
		}),
	);

	let response = layered(&layer, app).oneshot(local_request("/")).await.unwrap();

	assert_eq!(body_string(response).await, "1:true");
	assert!(active.is_empty());
}

#[rstest]
#[tokio::test]
async fn test_registry_empty_after_short_circuit(default_config: ToolbarConfig) {
	let active = Arc::new(ActiveToolbars::new());
	let panel = MockPanel::new("mock").short_circuiting();
	let layer = layer_with(default_config, mock_registry(&panel))
		.with_active_toolbars(Arc::clone(&active));

	let response = layered(&layer, html_app())
		.oneshot(local_request("/"))
		.await
		.unwrap();

	assert_eq!(response.status(), StatusCode::FORBIDDEN);
	assert_eq!(body_string(response).await, "short-circuited");
	assert!(active.is_empty());
}

#[rstest]
#[tokio::test]
async fn test_registry_empty_after_handler_panic(default_config: ToolbarConfig) {
	let active = Arc::new(ActiveToolbars::new());
	let layer = layer_with(default_config, mock_registry(&MockPanel::new("mock")))
		.with_active_toolbars(Arc::clone(&active));
	let service = layered(&layer, html_app());

	let result = tokio::spawn(async move { service.oneshot(local_request("/panic")).await }).await;

	assert!(result.unwrap_err().is_panic());
	assert!(active.is_empty());
}

#[rstest]
#[tokio::test]
async fn test_sequential_requests_get_their_own_toolbar(default_config: ToolbarConfig) {
	let active = Arc::new(ActiveToolbars::new());
	let layer = layer_with(default_config, mock_registry(&MockPanel::new("mock")))
		.with_active_toolbars(Arc::clone(&active));
	let seen: Arc<Mutex<Vec<Arc<Toolbar>>>> = Arc::new(Mutex::new(Vec::new()));
	let (registry, captured) = (Arc::clone(&active), Arc::clone(&seen));
	let app = Router::new().route(
		"/",
		get(move || {
			let (registry, captured) = (Arc::clone(&registry), Arc::clone(&captured));
			async move {
				assert_eq!(registry.len(), 1);
				captured.lock().unwrap().extend(registry.current());
				"ok"
			}
		}),
	);
	let service = layered(&layer, app);

	for _ in 0..2 {
		service.clone().oneshot(local_request("/")).await.unwrap();
		assert!(active.is_empty());
	}

	let seen = seen.lock().unwrap();
	assert_eq!(seen.len(), 2);
	assert!(!Arc::ptr_eq(&seen[0], &seen[1]));
}

#[rstest]
#[tokio::test]
async fn test_disabled_panel_stays_out_of_chain(default_config: ToolbarConfig) {
	let panel = MockPanel::new("mock");
	let layer = layer_with(default_config, mock_registry(&panel));
	let mut request = local_request("/");
	request
		.headers_mut()
		.insert(header::COOKIE, "djdtmock=off".parse().unwrap());

	let response = layered(&layer, html_app()).oneshot(request).await.unwrap();
	let body = body_string(response).await;

	assert_eq!(panel.calls().requests(), 0);
	assert_eq!(panel.calls().stats(), 0);
	assert!(body.contains("data-cookie=\"djdtmock\" title="));
	assert!(!body.contains("class=\"mock\""));
}

#[rstest]
#[tokio::test]
async fn test_failing_panel_does_not_abort_response(default_config: ToolbarConfig) {
	let broken = MockPanel::new("broken").failing_stats().failing_render();
	let healthy = MockPanel::new("healthy");
	let mut registry = PanelRegistry::new();
	registry.register(broken.factory()).unwrap();
	registry.register(healthy.factory()).unwrap();
	let layer = layer_with(default_config, registry);

	let response = layered(&layer, html_app())
		.oneshot(local_request("/"))
		.await
		.unwrap();
	let body = body_string(response).await;

	assert_eq!(broken.calls().stats(), 1);
	assert!(body.contains("This panel failed to render."));
	assert!(body.contains(r#"<p class="mock">{"value":1}</p>"#));
}

#[rstest]
#[tokio::test]
async fn test_server_timing_header(default_config: ToolbarConfig, default_registry: PanelRegistry) {
	let layer = layer_with(default_config, default_registry);

	let response = layered(&layer, html_app())
		.oneshot(local_request("/"))
		.await
		.unwrap();

	let timing = response.headers().get("server-timing").unwrap().to_str().unwrap();
	assert!(timing.starts_with("timer_total_time;dur="));
	assert!(timing.contains("desc=\"Elapsed time\""));
}

#[rstest]
#[tokio::test]
async fn test_redirect_interception(default_config: ToolbarConfig) {
	let layer = layer_with(
		default_config.with_intercept_redirects(true),
		mock_registry(&MockPanel::new("mock")),
	);

	let response = layered(&layer, html_app())
		.oneshot(local_request("/redirect"))
		.await
		.unwrap();

	assert_eq!(response.status(), StatusCode::OK);
	assert!(response.headers().get(header::LOCATION).is_none());
	assert_eq!(response.headers().get(header::SET_COOKIE).unwrap(), "session=abc");
	let body = body_string(response).await;
	assert!(body.contains("id=\"redirect_to\" href=\"/\""));
	assert_eq!(body.matches("id=\"djDebug\"").count(), 1);
}

#[rstest]
#[tokio::test]
async fn test_redirect_untouched_by_default(default_config: ToolbarConfig) {
	let layer = layer_with(default_config, mock_registry(&MockPanel::new("mock")));

	let response = layered(&layer, html_app())
		.oneshot(local_request("/redirect"))
		.await
		.unwrap();

	assert_eq!(response.status(), StatusCode::FOUND);
	assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");
}

#[rstest]
#[tokio::test]
async fn test_fetch_under_prefix_passes_through(default_config: ToolbarConfig) {
	let panel = MockPanel::new("mock");
	let layer = layer_with(default_config, mock_registry(&panel));

	let response = layered(&layer, html_app())
		.oneshot(local_fetch_request("/__debug__/custom/"))
		.await
		.unwrap();

	assert!(response.headers().get("djdt-store-id").is_none());
	assert_eq!(body_string(response).await, "<html><body>custom</body></html>");
	assert_eq!(panel.calls().requests(), 0);
}

#[rstest]
#[tokio::test]
async fn test_custom_predicate(default_config: ToolbarConfig) {
	let panel = MockPanel::new("mock");
	let config = default_config.with_show_toolbar(|request, _| request.uri().path() != "/");
	let layer = layer_with(config, mock_registry(&panel));

	let response = layered(&layer, html_app())
		.oneshot(local_request("/"))
		.await
		.unwrap();

	assert_eq!(body_string(response).await, HTML_PAGE);
	assert_eq!(panel.calls().requests(), 0);
}

#[rstest]
#[tokio::test]
async fn test_server_timing_on_json_response(
	default_config: ToolbarConfig,
	default_registry: PanelRegistry,
) {
	let layer = layer_with(default_config, default_registry);

	let response = layered(&layer, html_app())
		.oneshot(local_request("/json"))
		.await
		.unwrap();

	let timing = response.headers().get("server-timing").unwrap().to_str().unwrap();
	assert!(timing.starts_with("timer_total_time;dur="));
	assert_eq!(body_string(response).await, r#"{"ok":true}"#);
}

#[rstest]
#[tokio::test]
async fn test_streaming_html_passes_through(
	default_config: ToolbarConfig,
	default_registry: PanelRegistry,
) {
	let panel = MockPanel::new("mock");
	let mut registry = default_registry;
	registry.register(panel.factory()).unwrap();
	let layer = layer_with(default_config, registry);
	let app = Router::new().route(
		"/",
		get(|| async {
			let chunks = futures::stream::iter(vec![
				Ok::<_, std::io::Error>("<html><body>"),
				Ok("hi</body></html>"),
			]);
			Response::builder()
				.header(header::CONTENT_TYPE, "text/html; charset=utf-8")
				.body(Body::from_stream(chunks))
				.unwrap()
		}),
	);

	let response = layered(&layer, app).oneshot(local_request("/")).await.unwrap();

	assert!(response.headers().contains_key("server-timing"));
	assert_eq!(body_string(response).await, HTML_PAGE);
	assert_eq!(panel.calls().requests(), 1);
	assert_eq!(panel.calls().stats(), 0);
	assert_eq!(panel.calls().renders(), 0);
}

#[rstest]
#[tokio::test]
async fn test_concurrent_requests_are_isolated(default_config: ToolbarConfig) {
	let active = Arc::new(ActiveToolbars::new());
	let layer = layer_with(default_config, mock_registry(&MockPanel::new("mock")))
		.with_active_toolbars(Arc::clone(&active));
	let barrier = Arc::new(Barrier::new(2));
	let registry = Arc::clone(&active);
	let handler = move |uri: Uri| {
		let (registry, barrier) = (Arc::clone(&registry), Arc::clone(&barrier));
		async move {
			// Both requests are in flight between the two waits.
			barrier.wait().await;
			let in_flight = registry.len();
			let current = registry.current().unwrap();
			barrier.wait().await;
			format!("{}|{}", in_flight, current.request().unwrap().path)
		}
	};
	let app = Router::new()
		.route("/a", get(handler.clone()))
		.route("/b", get(handler));
	let service = layered(&layer, app);

	let first = tokio::spawn(service.clone().oneshot(local_request("/a")));
	let second = tokio::spawn(service.oneshot(local_request("/b")));
	let (first, second) = (first.await.unwrap().unwrap(), second.await.unwrap().unwrap());

	assert_eq!(body_string(first).await, "2|/a");
	assert_eq!(body_string(second).await, "2|/b");
	assert!(active.is_empty());
}
