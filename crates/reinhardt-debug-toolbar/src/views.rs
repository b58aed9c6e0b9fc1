//! Views served under the toolbar prefix
//!
//! - `render_panel/`: content of one panel of a stored toolbar
//! - `history_sidebar/`: panel list and contents of a stored toolbar
//! - `history_refresh/`: one history row per stored toolbar
//!
//! Parameters come from the query string, or from the form body of a POST.
//! The history views require a `hash` signing the `store_id`; a missing or
//! forged hash is rejected before the store is consulted.

use crate::error::{ToolbarError, ToolbarResult};
use crate::middleware::layer::ToolbarState;
use crate::panels::history::render_row;
use crate::routes::ToolbarView;
use crate::store::StoreId;
use crate::ui::PANEL_UNAVAILABLE;
use crate::utils::verify_store_id;
use axum::Json;
use axum::body::Body;
use axum::response::{IntoResponse, Response};
use http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

#[derive(Debug, Default, Deserialize)]
struct RenderPanelParams {
	store_id: Option<String>,
	panel_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct HistoryParams {
	store_id: Option<String>,
	hash: Option<String>,
}

/// Serve `view`, turning errors into JSON error responses
pub async fn dispatch(state: &ToolbarState, view: ToolbarView, request: Request<Body>) -> Response<Body> {
	let result = match view {
		ToolbarView::RenderPanel => render_panel(state, request).await,
		ToolbarView::HistorySidebar => history_sidebar(state, request).await,
		ToolbarView::HistoryRefresh => history_refresh(state, request).await,
	};

	match result {
		Ok(response) => response,
		Err(e) => {
			tracing::debug!(view = ?view, error = %e, "Toolbar view failed");
			error_response(&e)
		}
	}
}

/// JSON body `{"error": message}` with the error's status
pub fn error_response(error: &ToolbarError) -> Response<Body> {
	(error.status_code(), Json(json!({ "error": error.to_string() }))).into_response()
}

async fn params<T: DeserializeOwned>(request: Request<Body>) -> ToolbarResult<T> {
	let parsed = if request.method() == Method::POST {
		let body = request
			.into_body()
			.collect()
			.await
			.map_err(|e| ToolbarError::HttpError(e.to_string()))?
			.to_bytes();
		serde_urlencoded::from_bytes(&body)
	} else {
		serde_urlencoded::from_str(request.uri().query().unwrap_or(""))
	};
	parsed.map_err(|e| ToolbarError::InvalidParameters(e.to_string()))
}

fn required(value: Option<String>, name: &'static str) -> ToolbarResult<String> {
	value
		.filter(|value| !value.is_empty())
		.ok_or(ToolbarError::MissingParameter(name))
}

fn verified_store_id(state: &ToolbarState, params: HistoryParams) -> ToolbarResult<StoreId> {
	let store_id = required(params.store_id, "store_id")?;
	let hash = required(params.hash, "hash")?;
	if !verify_store_id(&state.config.secret_key, &store_id, &hash) {
		return Err(ToolbarError::InvalidSignature(store_id));
	}
	Ok(StoreId::new(store_id))
}

/// Content and scripts of one panel of a stored toolbar.
///
/// A store entry that is gone yields a notice rather than an error.
pub async fn render_panel(state: &ToolbarState, request: Request<Body>) -> ToolbarResult<Response<Body>> {
	let params: RenderPanelParams = params(request).await?;
	let store_id = StoreId::new(required(params.store_id, "store_id")?);
	let panel_id = required(params.panel_id, "panel_id")?;

	let Some(snapshot) = state.store.fetch(&store_id).await? else {
		return Ok(Json(json!({
			"content": format!("<p>{}</p>", PANEL_UNAVAILABLE),
			"scripts": [],
		}))
		.into_response());
	};

	let toolbar = snapshot.into_toolbar(store_id, &state.registry, state.config.clone());
	let panel = toolbar.get_panel_by_id(&panel_id)?;
	let content = panel.render(&toolbar.panel_stats(&panel_id))?;
	let scripts: Vec<String> = panel
		.scripts()
		.iter()
		.map(|script| format!("{}{}", state.config.static_url, script))
		.collect();

	Ok(Json(json!({ "content": content, "scripts": scripts })).into_response())
}

/// Panel buttons and contents of a stored toolbar, keyed by panel id
pub async fn history_sidebar(state: &ToolbarState, request: Request<Body>) -> ToolbarResult<Response<Body>> {
	let store_id = verified_store_id(state, params(request).await?)?;

	let Some(snapshot) = state.store.fetch(&store_id).await? else {
		return Ok(Json(json!({})).into_response());
	};

	let toolbar = snapshot.into_toolbar(store_id, &state.registry, state.config.clone());
	let mut panels = Map::new();
	for panel in toolbar.enabled_panels().filter(|panel| panel.is_historical()) {
		let stats = toolbar.panel_stats(panel.id());
		let content = panel.render(&stats).unwrap_or_else(|e| {
			tracing::warn!(panel_id = panel.id(), error = %e, "Panel failed to render");
			String::new()
		});
		panels.insert(
			panel.id().to_string(),
			json!({
				"title": panel.title(),
				"subtitle": panel.nav_subtitle(&stats),
				"content": content,
			}),
		);
	}
	Ok(Json(Value::Object(panels)).into_response())
}

/// History rows of every stored toolbar, newest first
pub async fn history_refresh(state: &ToolbarState, request: Request<Body>) -> ToolbarResult<Response<Body>> {
	verified_store_id(state, params(request).await?)?;

	let requests: Vec<Value> = state
		.store
		.all()
		.await?
		.into_iter()
		.map(|(store_id, snapshot)| {
			let stats = snapshot.stats.get("history").cloned().unwrap_or(Value::Null);
			json!({
				"store_id": store_id,
				"content": render_row(&store_id, &stats),
			})
		})
		.collect();

	Ok((StatusCode::OK, Json(json!({ "requests": requests }))).into_response())
}
