//! Handler and middleware traits.
//!
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use stableyard_http::{Handler, Middleware, MiddlewareChain, Request, Response};
//!
//! struct Hello;
//!
//! #[async_trait]
//! impl Handler for Hello {
//!     async fn handle(&self, _request: Request) -> stableyard_core::Result<Response> {
//!         Ok(Response::ok().with_body("hello"))
//!     }
//! }
//!
//! struct PoweredBy;
//!
//! #[async_trait]
//! impl Middleware for PoweredBy {
//!     async fn process(
//!         &self,
//!         request: Request,
//!         next: Arc<dyn Handler>,
//!     ) -> stableyard_core::Result<Response> {
//!         Ok(next.handle(request).await?.with_header("x-powered-by", "stableyard"))
//!     }
//! }
//!
//! let chain = MiddlewareChain::new(Arc::new(Hello)).with_middleware(Arc::new(PoweredBy));
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use stableyard_core::Result;

use crate::{Request, Response};

/// Anything that turns a request into a response.
#[async_trait]
pub trait Handler: Send + Sync {
	async fn handle(&self, request: Request) -> Result<Response>;
}

#[async_trait]
impl<T: Handler + ?Sized> Handler for Arc<T> {
	async fn handle(&self, request: Request) -> Result<Response> {
		(**self).handle(request).await
	}
}

/// Wraps a handler to act before and after it.
#[async_trait]
pub trait Middleware: Send + Sync {
	async fn process(&self, request: Request, next: Arc<dyn Handler>) -> Result<Response>;

	/// Lets a middleware opt out for some requests.
	fn should_continue(&self, _request: &Request) -> bool {
		true
	}
}

/// Adapts an async closure into a [`Handler`].
pub struct FnHandler<F> {
	f: F,
}

/// # Examples
///
/// ```
/// use stableyard_http::{Handler, Request, Response, handler_fn};
///
/// let handler = handler_fn(|_request: Request| async { Ok(Response::ok()) });
/// # tokio_test::block_on(async {
/// let response = handler.handle(Request::builder().build().unwrap()).await.unwrap();
/// assert_eq!(response.status, hyper::StatusCode::OK);
/// # });
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
	F: Fn(Request) -> Fut + Send + Sync,
	Fut: Future<Output = Result<Response>> + Send,
{
	FnHandler { f }
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
	F: Fn(Request) -> Fut + Send + Sync,
	Fut: Future<Output = Result<Response>> + Send,
{
	async fn handle(&self, request: Request) -> Result<Response> {
		(self.f)(request).await
	}
}

/// Middleware in the order they were added, outermost first, around one handler.
pub struct MiddlewareChain {
	middlewares: Vec<Arc<dyn Middleware>>,
	handler: Arc<dyn Handler>,
}

impl MiddlewareChain {
	pub fn new(handler: Arc<dyn Handler>) -> Self {
		Self {
			middlewares: Vec::new(),
			handler,
		}
	}

	pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
		self.middlewares.push(middleware);
		self
	}

	pub fn add_middleware(&mut self, middleware: Arc<dyn Middleware>) {
		self.middlewares.push(middleware);
	}
}

#[async_trait]
impl Handler for MiddlewareChain {
	async fn handle(&self, request: Request) -> Result<Response> {
		let mut current: Arc<dyn Handler> = self.handler.clone();
		for middleware in self
			.middlewares
			.iter()
			.rev()
			.filter(|mw| mw.should_continue(&request))
		{
			current = Arc::new(ComposedHandler {
				middleware: middleware.clone(),
				next: current,
			});
		}
		current.handle(request).await
	}
}

struct ComposedHandler {
	middleware: Arc<dyn Middleware>,
	next: Arc<dyn Handler>,
}

#[async_trait]
impl Handler for ComposedHandler {
	async fn handle(&self, request: Request) -> Result<Response> {
		self.middleware.process(request, self.next.clone()).await
	}
}
