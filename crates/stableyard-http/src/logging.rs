use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use stableyard_core::Result;
use tracing::Instrument;

use crate::{Handler, Middleware, Request, Response};

/// Wraps every request in a `request` span and logs its outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingMiddleware;

impl LoggingMiddleware {
	pub fn new() -> Self {
		Self
	}
}

#[async_trait]
impl Middleware for LoggingMiddleware {
	async fn process(&self, request: Request, next: Arc<dyn Handler>) -> Result<Response> {
		let start = Instant::now();
		let span = tracing::info_span!(
			"request",
			method = %request.method,
			path = %request.path(),
		);

		let result = next.handle(request).instrument(span.clone()).await;
		let elapsed_ms = start.elapsed().as_millis() as u64;

		span.in_scope(|| match &result {
			Ok(response) if response.status.is_server_error() => {
				tracing::error!(status = response.status.as_u16(), elapsed_ms, "request failed");
			}
			Ok(response) => {
				tracing::info!(status = response.status.as_u16(), elapsed_ms, "request finished");
			}
			Err(error) => {
				tracing::error!(%error, elapsed_ms, "request errored");
			}
		});
		result
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::handler_fn;
	use hyper::StatusCode;
	use rstest::rstest;

	#[rstest]
	#[tokio::test]
	async fn test_passes_response_through() {
		let handler = Arc::new(handler_fn(|_request: Request| async {
			Ok(Response::new(StatusCode::SEE_OTHER))
		}));
		let request = Request::builder().uri("/dashboard/").build().unwrap();
		let response = LoggingMiddleware::new()
			.process(request, handler)
			.await
			.unwrap();
		assert_eq!(response.status, StatusCode::SEE_OTHER);
	}
}
