//! HTML injection
//!
//! The toolbar is spliced into the response body as raw bytes, so bodies in
//! any ASCII-compatible encoding come out intact apart from the inserted
//! fragment.

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, HeaderValue, header};
use regex::bytes::Regex;

/// Content types eligible for injection
pub const HTML_TYPES: [&str; 2] = ["text/html", "application/xhtml+xml"];

/// Case-insensitive matcher for the closing form of `tag`
pub fn closing_tag_pattern(tag: &str) -> Result<Regex, regex::Error> {
	Regex::new(&format!("(?i-u){}", regex::escape(&format!("</{}>", tag))))
}

/// Whether the `Content-Type` names an HTML-family document
pub fn is_html(headers: &HeaderMap) -> bool {
	headers
		.get(header::CONTENT_TYPE)
		.and_then(|v| v.to_str().ok())
		.and_then(|v| v.split(';').next())
		.map(|mime| {
			let mime = mime.trim();
			HTML_TYPES.iter().any(|html| mime.eq_ignore_ascii_case(html))
		})
		.unwrap_or(false)
}

/// Whether the body is compressed or otherwise encoded
pub fn is_encoded(headers: &HeaderMap) -> bool {
	headers
		.get(header::CONTENT_ENCODING)
		.and_then(|v| v.to_str().ok())
		.is_some_and(|v| !v.trim().is_empty() && !v.trim().eq_ignore_ascii_case("identity"))
}

/// Insert `fragment` before the last match of `closing_tag`.
///
/// Returns `None`, leaving the body to the caller untouched, when the tag
/// does not occur.
pub fn inject_toolbar(body: &[u8], closing_tag: &Regex, fragment: &str) -> Option<Bytes> {
	let position = closing_tag.find_iter(body).last()?.start();

	let mut injected = BytesMut::with_capacity(body.len() + fragment.len());
	injected.extend_from_slice(&body[..position]);
	injected.extend_from_slice(fragment.as_bytes());
	injected.extend_from_slice(&body[position..]);
	Some(injected.freeze())
}

/// Set `Content-Length` to `len` if the header is present
pub fn update_content_length(headers: &mut HeaderMap, len: usize) {
	if headers.contains_key(header::CONTENT_LENGTH) {
		headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
	}
}
