//! Request and response snapshots handed to panels

use axum::body::Body;
use axum::extract::ConnectInfo;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::{HeaderMap, Request, StatusCode, header};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

/// Header used by browsers' XHR/fetch helpers to flag programmatic requests
pub const FETCH_HEADER: &str = "x-requested-with";

/// Value of [`FETCH_HEADER`] identifying a fetch-style request
pub const FETCH_HEADER_VALUE: &str = "XMLHttpRequest";

/// Client address for servers that don't provide axum's `ConnectInfo`.
///
/// Insert it into the request extensions before the toolbar layer runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteAddr(pub IpAddr);

/// Immutable view of the inbound request, captured before the handler runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestInfo {
	/// HTTP method
	pub method: String,
	/// Request path
	pub path: String,
	/// Raw query string
	pub query: Option<String>,
	/// Request headers in arrival order
	pub headers: Vec<(String, String)>,
	/// Client IP address, empty when unknown
	pub client_ip: String,
	/// Name of the route the path resolved to, if any
	pub route_name: Option<String>,
	/// Whether the request was flagged as XHR/fetch
	pub is_fetch: bool,
	/// Time the toolbar saw the request
	pub timestamp: DateTime<Utc>,
}

impl RequestInfo {
	/// Capture the parts of `request` the panels need
	pub fn from_request(request: &Request<Body>) -> Self {
		let headers = request
			.headers()
			.iter()
			.map(|(name, value)| {
				(
					name.as_str().to_string(),
					String::from_utf8_lossy(value.as_bytes()).into_owned(),
				)
			})
			.collect();

		Self {
			method: request.method().as_str().to_string(),
			path: request.uri().path().to_string(),
			query: request.uri().query().map(str::to_string),
			headers,
			client_ip: client_addr(request)
				.map(|ip| ip.to_string())
				.unwrap_or_default(),
			route_name: None,
			is_fetch: is_fetch_request(request.headers()),
			timestamp: Utc::now(),
		}
	}
}

/// Immutable view of the downstream response once its body is known
#[derive(Debug, Clone)]
pub struct ResponseInfo {
	/// Response status
	pub status: StatusCode,
	/// Response headers
	pub headers: HeaderMap,
	/// Collected response body
	pub body: Bytes,
}

impl ResponseInfo {
	/// Build a response snapshot
	pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
		Self {
			status,
			headers,
			body,
		}
	}

	/// The `Content-Type` header, empty when absent
	pub fn content_type(&self) -> &str {
		self.headers
			.get(header::CONTENT_TYPE)
			.and_then(|v| v.to_str().ok())
			.unwrap_or("")
	}
}

/// Resolve the client address from `ConnectInfo` or [`RemoteAddr`]
pub fn client_addr<B>(request: &Request<B>) -> Option<IpAddr> {
	if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
		return Some(addr.ip());
	}
	request
		.extensions()
		.get::<RemoteAddr>()
		.map(|RemoteAddr(ip)| *ip)
}

/// Whether the headers mark a programmatic (XHR/fetch) request
pub fn is_fetch_request(headers: &HeaderMap) -> bool {
	headers
		.get(FETCH_HEADER)
		.and_then(|v| v.to_str().ok())
		.is_some_and(|v| v.eq_ignore_ascii_case(FETCH_HEADER_VALUE))
}

/// Parse every `Cookie` header into a name/value map.
///
/// Later duplicates win, matching browser precedence for identical paths.
pub fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
	headers
		.get_all(header::COOKIE)
		.iter()
		.filter_map(|value| value.to_str().ok())
		.flat_map(|value| value.split(';'))
		.filter_map(|pair| {
			let (name, value) = pair.trim().split_once('=')?;
			Some((name.trim().to_string(), value.trim().to_string()))
		})
		.collect()
}
