//! Views served under the toolbar prefix

use crate::common::fixtures::*;
use crate::common::mock_panel::MockPanel;
use axum::body::Body;
use http::{Method, Request, StatusCode, header};
use reinhardt_debug_toolbar::{
	DebugToolbarLayer, HistoryPanel, MemoryStore, PanelRegistry, RemoteAddr, StoreId,
	ToolbarConfig, ToolbarStore, middleware::DebugToolbarService, ui::PANEL_UNAVAILABLE,
	utils::sign_store_id,
};
use rstest::*;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

struct Harness {
	service: DebugToolbarService<axum::Router>,
	store: Arc<dyn ToolbarStore>,
}

impl Harness {
	/// Capture one fetch-style request and return its store id
	async fn capture(&self, uri: &str) -> StoreId {
		let response = self
			.service
			.clone()
			.oneshot(local_fetch_request(uri))
			.await
			.unwrap();
		let id = response.headers().get("djdt-store-id").unwrap().to_str().unwrap();
		StoreId::new(id)
	}

	async fn get(&self, uri: &str) -> (StatusCode, Value) {
		let response = self.service.clone().oneshot(local_request(uri)).await.unwrap();
		let status = response.status();
		let body = body_bytes(response).await;
		(status, serde_json::from_slice(&body).unwrap())
	}
}

#[fixture]
fn harness(default_config: ToolbarConfig) -> Harness {
	let store: Arc<dyn ToolbarStore> = Arc::new(MemoryStore::new(10));
	let mut registry = PanelRegistry::new();
	registry.register(HistoryPanel::new).unwrap();
	registry.register(MockPanel::new("mock").factory()).unwrap();
	let layer = DebugToolbarLayer::new(default_config, registry)
		.unwrap()
		.with_shared_store(Arc::clone(&store));
	Harness {
		service: layered(&layer, html_app()),
		store,
	}
}

fn signed(store_id: &StoreId) -> String {
	format!(
		"store_id={}&hash={}",
		store_id,
		sign_store_id(TEST_SECRET_KEY, store_id.as_str())
	)
}

#[rstest]
#[tokio::test]
async fn test_render_panel(harness: Harness) {
	let store_id = harness.capture("/").await;

	let (status, body) = harness
		.get(&format!("/__debug__/render_panel/?store_id={}&panel_id=mock", store_id))
		.await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["content"], r#"<p class="mock">{"value":1}</p>"#);
	assert_eq!(body["scripts"], serde_json::json!([]));
}

#[rstest]
#[tokio::test]
async fn test_render_panel_prefixes_scripts(harness: Harness) {
	let store_id = harness.capture("/").await;

	let (status, body) = harness
		.get(&format!("/__debug__/render_panel/?store_id={}&panel_id=history", store_id))
		.await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["scripts"][0], "/static/debug_toolbar/js/history.js");
}

#[rstest]
#[tokio::test]
async fn test_render_panel_unknown_panel(harness: Harness) {
	let store_id = harness.capture("/").await;

	let (status, body) = harness
		.get(&format!("/__debug__/render_panel/?store_id={}&panel_id=sql", store_id))
		.await;

	assert_eq!(status, StatusCode::NOT_FOUND);
	assert_eq!(body["error"], "Panel not found: sql");
}

#[rstest]
#[tokio::test]
async fn test_render_panel_expired_entry(harness: Harness) {
	let (status, body) = harness
		.get("/__debug__/render_panel/?store_id=nonexistent-id&panel_id=mock")
		.await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["content"], format!("<p>{}</p>", PANEL_UNAVAILABLE));
}

#[rstest]
#[case("/__debug__/render_panel/?store_id=abc")]
#[case("/__debug__/render_panel/?panel_id=mock")]
#[case("/__debug__/history_sidebar/?store_id=abc")]
#[case("/__debug__/history_refresh/")]
#[tokio::test]
async fn test_missing_parameters(harness: Harness, #[case] uri: &str) {
	let (status, body) = harness.get(uri).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert!(body["error"].as_str().unwrap().starts_with("Missing parameter"));
}

#[rstest]
#[tokio::test]
async fn test_history_sidebar(harness: Harness) {
	let store_id = harness.capture("/").await;

	let (status, body) = harness
		.get(&format!("/__debug__/history_sidebar/?{}", signed(&store_id)))
		.await;

	assert_eq!(status, StatusCode::OK);
	let panels = body.as_object().unwrap();
	assert_eq!(panels.keys().collect::<Vec<_>>(), vec!["mock"]);
	assert_eq!(panels["mock"]["title"], "Mock");
	assert_eq!(panels["mock"]["subtitle"], "value=1");
}

#[rstest]
#[tokio::test]
async fn test_history_sidebar_forged_hash(harness: Harness) {
	let store_id = harness.capture("/").await;

	let (status, _) = harness
		.get(&format!(
			"/__debug__/history_sidebar/?store_id={}&hash=deadbeef",
			store_id
		))
		.await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[rstest]
#[tokio::test]
async fn test_history_sidebar_from_form_body(harness: Harness) {
	let store_id = harness.capture("/").await;
	let mut request = Request::builder()
		.method(Method::POST)
		.uri("/__debug__/history_sidebar/")
		.header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
		.body(Body::from(signed(&store_id)))
		.unwrap();
	request
		.extensions_mut()
		.insert(RemoteAddr("127.0.0.1".parse().unwrap()));

	let response = harness.service.clone().oneshot(request).await.unwrap();

	assert_eq!(response.status(), StatusCode::OK);
	let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
	assert!(body.get("mock").is_some());
}

#[rstest]
#[tokio::test]
async fn test_history_sidebar_evicted_entry(harness: Harness) {
	let store_id = harness.capture("/").await;
	harness.store.clear().await.unwrap();

	let (status, body) = harness
		.get(&format!("/__debug__/history_sidebar/?{}", signed(&store_id)))
		.await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body, serde_json::json!({}));
}

#[rstest]
#[tokio::test]
async fn test_history_refresh(harness: Harness) {
	let first = harness.capture("/").await;
	let second = harness.capture("/?page=2").await;

	let (status, body) = harness
		.get(&format!("/__debug__/history_refresh/?{}", signed(&second)))
		.await;

	assert_eq!(status, StatusCode::OK);
	let requests = body["requests"].as_array().unwrap();
	assert_eq!(requests.len(), 2);
	assert_eq!(requests[0]["store_id"], second.as_str());
	assert_eq!(requests[1]["store_id"], first.as_str());
	let row = requests[1]["content"].as_str().unwrap();
	assert!(row.starts_with("<tr class=\"djdt-history-row\""));
	assert!(row.contains("<td>/</td>"));
}

#[rstest]
#[tokio::test]
async fn test_views_hidden_from_unknown_clients(harness: Harness) {
	let request = Request::builder()
		.uri("/__debug__/history_refresh/")
		.body(Body::empty())
		.unwrap();

	let response = harness.service.clone().oneshot(request).await.unwrap();

	// Handed to the application, which has no such route.
	assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
