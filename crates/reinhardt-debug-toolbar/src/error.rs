//! Error types for the debug toolbar

use http::StatusCode;
use thiserror::Error;

/// Result type used throughout the toolbar
pub type ToolbarResult<T> = Result<T, ToolbarError>;

/// Errors produced by the toolbar, its store and its views
#[derive(Debug, Error)]
pub enum ToolbarError {
	/// The toolbar cannot run with the given configuration.
	///
	/// The message tells the developer what to change.
	#[error("Improperly configured: {0}")]
	ImproperlyConfigured(String),

	/// No panel with the requested id exists on the toolbar
	#[error("Panel not found: {0}")]
	PanelNotFound(String),

	/// The store has no entry for the requested id (never stored or evicted)
	#[error("Store entry not found: {0}")]
	StoreEntryNotFound(String),

	/// A required request parameter was absent
	#[error("Missing parameter: {0}")]
	MissingParameter(&'static str),

	/// Request parameters could not be parsed
	#[error("Invalid parameters: {0}")]
	InvalidParameters(String),

	/// The integrity hash presented with a store id did not match
	#[error("Invalid signature for store id '{0}'")]
	InvalidSignature(String),

	/// A serialized snapshot exceeded the configured size limit
	#[error("Snapshot of {size} bytes exceeds the limit of {limit} bytes")]
	SnapshotTooLarge {
		/// Serialized size in bytes
		size: usize,
		/// Configured maximum in bytes
		limit: usize,
	},

	/// A panel or the toolbar itself failed to render
	#[error("Render error: {0}")]
	RenderError(String),

	/// Snapshot (de)serialization failed
	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	/// The shared cache backend failed
	#[error("Cache error: {0}")]
	Cache(String),

	/// Reading or building an HTTP message failed
	#[error("HTTP error: {0}")]
	HttpError(String),
}

impl ToolbarError {
	/// HTTP status used when this error is reported by a toolbar view
	pub fn status_code(&self) -> StatusCode {
		match self {
			Self::PanelNotFound(_) | Self::StoreEntryNotFound(_) => StatusCode::NOT_FOUND,
			Self::MissingParameter(_) | Self::InvalidParameters(_) | Self::InvalidSignature(_) => {
				StatusCode::BAD_REQUEST
			}
			_ => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}
}
