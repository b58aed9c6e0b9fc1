//! Continuation passed down the panel chain

use axum::body::Body;
use axum::response::Response;
use http::Request;
use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use tower::{Service, ServiceExt};

type BoxResponseFuture = Pin<Box<dyn Future<Output = Response<Body>> + Send>>;

/// The rest of the chain, called at most once
///
/// Each enabled panel receives the `Next` wrapping every panel declared after
/// it, with the downstream handler innermost.
pub struct Next {
	inner: Box<dyn FnOnce(Request<Body>) -> BoxResponseFuture + Send>,
}

impl Next {
	/// Build a continuation from an async closure
	pub fn new<F, Fut>(f: F) -> Self
	where
		F: FnOnce(Request<Body>) -> Fut + Send + 'static,
		Fut: Future<Output = Response<Body>> + Send + 'static,
	{
		Self {
			inner: Box::new(move |request| Box::pin(f(request))),
		}
	}

	/// Build the innermost continuation from the wrapped service
	pub fn from_service<S>(service: S) -> Self
	where
		S: Service<Request<Body>, Response = Response<Body>, Error = Infallible> + Send + 'static,
		S::Future: Send + 'static,
	{
		Self::new(move |request| async move {
			match service.oneshot(request).await {
				Ok(response) => response,
				Err(never) => match never {},
			}
		})
	}

	/// Run the rest of the chain
	pub async fn run(self, request: Request<Body>) -> Response<Body> {
		(self.inner)(request).await
	}
}

impl fmt::Debug for Next {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Next").finish_non_exhaustive()
	}
}
