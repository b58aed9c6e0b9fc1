//! Debug toolbar Tower service
//!
//! Per request the service walks through these states:
//!
//! 1. *inactive*: the activation predicate said no, the inner service runs
//!    untouched and nothing is registered
//! 2. *capturing*: a [`Toolbar`] is registered for the execution unit and
//!    its panels wrap the inner service
//! 3. *response built*: the body is inspected and either passed through,
//!    recorded into history (fetch-style requests) or injected
//! 4. *torn down*: the registry entry is dropped on every exit path
//!
//! Requests under the toolbar prefix never capture; they are served by the
//! toolbar views or handed to the inner service unchanged.

use crate::context::{RequestInfo, ResponseInfo, parse_cookies};
use crate::error::ToolbarError;
use crate::middleware::layer::ToolbarState;
use crate::routes::{RouteTable, RouteTarget};
use crate::toolbar::{Next, Toolbar};
use crate::ui::injection::{inject_toolbar, is_encoded, is_html, update_content_length};
use crate::ui::render_redirect;
use crate::views;
use axum::body::Body;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http::header::{self, HeaderName};
use http::response::Parts;
use http::{HeaderMap, HeaderValue, Request, StatusCode};
use http_body::Body as _;
use http_body_util::BodyExt;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Service, ServiceExt};

/// Response header carrying the store id of a fetch-style request's toolbar
pub const STORE_ID_HEADER: HeaderName = HeaderName::from_static("djdt-store-id");

/// Response header carrying the panels' timing metrics
pub const SERVER_TIMING_HEADER: HeaderName = HeaderName::from_static("server-timing");

/// Tower service for debug toolbar middleware
#[derive(Clone)]
pub struct DebugToolbarService<S> {
	inner: S,
	state: Arc<ToolbarState>,
}

impl<S> DebugToolbarService<S> {
	pub(crate) fn new(inner: S, state: Arc<ToolbarState>) -> Self {
		Self { inner, state }
	}

	/// State shared with the layer
	pub fn state(&self) -> &ToolbarState {
		&self.state
	}
}

impl<S> Service<Request<Body>> for DebugToolbarService<S>
where
	S: Service<Request<Body>, Response = Response<Body>, Error = Infallible>
		+ Clone
		+ Send
		+ 'static,
	S::Future: Send + 'static,
{
	type Response = Response<Body>;
	type Error = Infallible;
	type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

	fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
		self.inner.poll_ready(cx)
	}

	fn call(&mut self, request: Request<Body>) -> Self::Future {
		// Take the service that was driven to readiness and leave a clone.
		let clone = self.inner.clone();
		let inner = std::mem::replace(&mut self.inner, clone);
		let state = Arc::clone(&self.state);

		Box::pin(async move { Ok(handle(state, inner, request).await) })
	}
}

async fn handle<S>(state: Arc<ToolbarState>, inner: S, mut request: Request<Body>) -> Response<Body>
where
	S: Service<Request<Body>, Response = Response<Body>, Error = Infallible> + Send + 'static,
	S::Future: Send + 'static,
{
	if !state.config.show_toolbar_for(&request) {
		return run_inner(inner, request).await;
	}

	let base = request.extensions().get::<RouteTable>().cloned();
	let routes = state.effective_routes(base.as_ref());
	let path = request.uri().path().to_string();

	if path.starts_with(&state.config.url_prefix) {
		if let Some(RouteTarget::Toolbar(view)) = routes.resolve(&path).map(|route| route.target) {
			return views::dispatch(&state, view, request).await;
		}
		tracing::debug!(path = %path, "Passing through request under the toolbar prefix");
		return run_inner(inner, request).await;
	}

	let mut info = RequestInfo::from_request(&request);
	info.route_name = routes.resolve(&path).map(|route| route.name.clone());
	let cookies = parse_cookies(request.headers());
	let toolbar = Arc::new(Toolbar::new(
		info,
		Arc::clone(&state.config),
		&state.registry,
		&cookies,
	));
	request.extensions_mut().insert(routes);

	let _guard = state.active.register(Arc::clone(&toolbar));
	tracing::debug!(path = %path, "Debug toolbar capturing request");

	let response = toolbar.wrap(Next::from_service(inner)).run(request).await;
	finish(&state, &toolbar, response).await
}

async fn run_inner<S>(inner: S, request: Request<Body>) -> Response<Body>
where
	S: Service<Request<Body>, Response = Response<Body>, Error = Infallible>,
{
	match inner.oneshot(request).await {
		Ok(response) => response,
		Err(never) => match never {},
	}
}

/// Whether the body has to be streamed rather than collected
fn is_streaming(headers: &HeaderMap, body: &Body) -> bool {
	let event_stream = headers
		.get(header::CONTENT_TYPE)
		.and_then(|v| v.to_str().ok())
		.is_some_and(|v| v.trim_start().starts_with("text/event-stream"));
	event_stream || body.size_hint().exact().is_none()
}

fn intercept_redirect(status: StatusCode, headers: &HeaderMap) -> Option<(HeaderMap, Body)> {
	if !status.is_redirection() {
		return None;
	}
	let location = headers.get(header::LOCATION)?.to_str().ok()?;

	let mut replaced = HeaderMap::new();
	replaced.insert(
		header::CONTENT_TYPE,
		HeaderValue::from_static("text/html; charset=utf-8"),
	);
	for cookie in headers.get_all(header::SET_COOKIE) {
		replaced.append(header::SET_COOKIE, cookie.clone());
	}
	let html = render_redirect(status, location);
	replaced.insert(header::CONTENT_LENGTH, HeaderValue::from(html.len()));
	Some((replaced, Body::from(html)))
}

/// Append the toolbar's `Server-Timing` metrics to `headers`
fn append_server_timing(state: &ToolbarState, toolbar: &Toolbar, headers: &mut HeaderMap) {
	if !state.config.show_server_timing {
		return;
	}
	if let Some(value) = toolbar
		.server_timing_header()
		.and_then(|v| HeaderValue::from_str(&v).ok())
	{
		headers.append(SERVER_TIMING_HEADER, value);
	}
}

/// Response left as the application built it, apart from `Server-Timing`
async fn pass_through(
	state: &ToolbarState,
	toolbar: &Toolbar,
	mut parts: Parts,
	body: Body,
) -> Response<Body> {
	if state.config.show_server_timing {
		let info = ResponseInfo::new(parts.status, parts.headers.clone(), Bytes::new());
		toolbar.process_server_timing(&info).await;
		append_server_timing(state, toolbar, &mut parts.headers);
	}
	Response::from_parts(parts, body)
}

async fn finish(state: &ToolbarState, toolbar: &Toolbar, response: Response<Body>) -> Response<Body> {
	let (mut parts, mut body) = response.into_parts();

	if is_streaming(&parts.headers, &body) {
		tracing::debug!("Leaving streaming response untouched");
		return pass_through(state, toolbar, parts, body).await;
	}

	if state.config.intercept_redirects {
		if let Some((headers, interstitial)) = intercept_redirect(parts.status, &parts.headers) {
			tracing::debug!(status = %parts.status, "Intercepting redirect");
			parts.status = StatusCode::OK;
			parts.headers = headers;
			body = interstitial;
		}
	}

	if !is_html(&parts.headers) || is_encoded(&parts.headers) {
		return pass_through(state, toolbar, parts, body).await;
	}

	let bytes = match body.collect().await {
		Ok(collected) => collected.to_bytes(),
		Err(e) => {
			let error = ToolbarError::HttpError(e.to_string());
			tracing::error!(error = %error, "Failed to read response body");
			return (error.status_code(), error.to_string()).into_response();
		}
	};

	let response_info = ResponseInfo::new(parts.status, parts.headers.clone(), bytes.clone());
	toolbar.process_response(&response_info).await;

	let is_fetch = toolbar.request().is_some_and(|request| request.is_fetch);
	if is_fetch || toolbar.store_id().is_some() {
		match toolbar.persist(state.store.as_ref()).await {
			Ok(store_id) => {
				if is_fetch {
					if let Ok(value) = HeaderValue::from_str(store_id.as_str()) {
						parts.headers.insert(STORE_ID_HEADER, value);
					}
				}
			}
			Err(e) => tracing::warn!(error = %e, "Failed to record toolbar into history"),
		}
	}

	append_server_timing(state, toolbar, &mut parts.headers);

	if is_fetch {
		return Response::from_parts(parts, Body::from(bytes));
	}

	let rendered = match toolbar.render(state.store.as_ref()).await {
		Ok(rendered) => rendered,
		Err(e @ ToolbarError::ImproperlyConfigured(_)) => {
			tracing::error!(error = %e, "Failed to render the debug toolbar");
			return (e.status_code(), e.to_string()).into_response();
		}
		Err(e) => {
			// The page goes out without a toolbar.
			tracing::warn!(error = %e, "Debug toolbar not rendered; returning the original response");
			return Response::from_parts(parts, Body::from(bytes));
		}
	};

	match inject_toolbar(&bytes, &state.closing_tag, &rendered.html_with_js) {
		Some(injected) => {
			update_content_length(&mut parts.headers, injected.len());
			Response::from_parts(parts, Body::from(injected))
		}
		None => {
			tracing::debug!(tag = %state.config.tag, "Closing tag not found; toolbar not injected");
			Response::from_parts(parts, Body::from(bytes))
		}
	}
}
