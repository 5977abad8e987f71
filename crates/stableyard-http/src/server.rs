//! HTTP/1.1 server on hyper.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::StatusCode;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::Service;
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;

use crate::{Handler, Request, Response};

/// Default maximum request body size (1 MB); forms here are small.
const DEFAULT_MAX_BODY_SIZE: u64 = 1024 * 1024;

/// How long open connections may keep running after shutdown starts.
const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Pause after a failed accept, doubled per consecutive failure up to the cap.
const ACCEPT_BACKOFF_START: Duration = Duration::from_millis(10);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Wait before the next accept after `failures` consecutive errors.
///
/// Errors such as EMFILE persist until a descriptor is freed, so retrying at
/// once would spin.
fn accept_backoff(failures: u32) -> Duration {
	ACCEPT_BACKOFF_START
		.saturating_mul(1u32 << failures.saturating_sub(1).min(16))
		.min(ACCEPT_BACKOFF_MAX)
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub struct HttpServer {
	handler: Arc<dyn Handler>,
	max_body_size: u64,
	grace_period: Duration,
}

impl HttpServer {
	pub fn new(handler: Arc<dyn Handler>) -> Self {
		Self {
			handler,
			max_body_size: DEFAULT_MAX_BODY_SIZE,
			grace_period: DEFAULT_GRACE_PERIOD,
		}
	}

	pub fn with_max_body_size(mut self, bytes: u64) -> Self {
		self.max_body_size = bytes;
		self
	}

	pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
		self.grace_period = grace_period;
		self
	}

	/// Serves on `addr` until `shutdown` resolves, then lets open
	/// connections finish within the grace period.
	///
	/// ```no_run
	/// use std::sync::Arc;
	/// use stableyard_http::{HttpServer, Response, handler_fn, shutdown_signal};
	///
	/// # async fn run() -> std::io::Result<()> {
	/// let handler = Arc::new(handler_fn(|_req| async { Ok(Response::ok()) }));
	/// let listener = tokio::net::TcpListener::bind("127.0.0.1:8000").await?;
	/// HttpServer::new(handler).serve(listener, shutdown_signal()).await
	/// # }
	/// ```
	pub async fn serve(
		self,
		listener: TcpListener,
		shutdown: impl Future<Output = ()>,
	) -> std::io::Result<()> {
		let local_addr = listener.local_addr()?;
		tracing::info!(%local_addr, "listening");

		let graceful = GracefulShutdown::new();
		tokio::pin!(shutdown);
		let mut accept_failures = 0u32;

		loop {
			tokio::select! {
				accepted = listener.accept() => {
					let (stream, peer) = match accepted {
						Ok(conn) => {
							accept_failures = 0;
							conn
						}
						Err(error) => {
							accept_failures = accept_failures.saturating_add(1);
							let pause = accept_backoff(accept_failures);
							tracing::warn!(%error, ?pause, "accept failed");
							tokio::time::sleep(pause).await;
							continue;
						}
					};
					let service = RequestService {
						handler: self.handler.clone(),
						max_body_size: self.max_body_size,
					};
					let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
					let conn = graceful.watch(conn);
					tokio::spawn(async move {
						if let Err(error) = conn.await {
							tracing::debug!(%peer, %error, "connection closed with error");
						}
					});
				}
				_ = &mut shutdown => {
					tracing::info!("shutdown signal received, draining connections");
					break;
				}
			}
		}

		drop(listener);
		tokio::select! {
			_ = graceful.shutdown() => tracing::info!("all connections closed"),
			_ = tokio::time::sleep(self.grace_period) => {
				tracing::warn!(grace_period = ?self.grace_period, "grace period elapsed, closing remaining connections");
			}
		}
		Ok(())
	}

	/// Binds `addr` and serves until ctrl-c.
	pub async fn listen(self, addr: SocketAddr) -> std::io::Result<()> {
		let listener = TcpListener::bind(addr).await?;
		self.serve(listener, shutdown_signal()).await
	}
}

/// Resolves on ctrl-c. If the signal handler cannot be installed the server
/// keeps running until killed.
pub async fn shutdown_signal() {
	if let Err(error) = tokio::signal::ctrl_c().await {
		tracing::error!(%error, "failed to listen for ctrl-c");
		std::future::pending::<()>().await;
	}
}

struct RequestService {
	handler: Arc<dyn Handler>,
	max_body_size: u64,
}

impl RequestService {
	fn into_hyper(response: Response) -> Result<hyper::Response<Full<Bytes>>, BoxError> {
		let mut builder = hyper::Response::builder().status(response.status);
		for (key, value) in response.headers.iter() {
			builder = builder.header(key, value);
		}
		Ok(builder.body(Full::new(response.body))?)
	}
}

impl Service<hyper::Request<Incoming>> for RequestService {
	type Response = hyper::Response<Full<Bytes>>;
	type Error = BoxError;
	type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

	fn call(&self, req: hyper::Request<Incoming>) -> Self::Future {
		let handler = self.handler.clone();
		let max_body_size = self.max_body_size;

		Box::pin(async move {
			let too_large = Response::new(StatusCode::PAYLOAD_TOO_LARGE).with_body("Request body too large");
			if let Some(content_length) = req.headers().get(hyper::header::CONTENT_LENGTH)
				&& let Ok(len_str) = content_length.to_str()
				&& let Ok(len) = len_str.parse::<u64>()
				&& len > max_body_size
			{
				return Self::into_hyper(too_large);
			}

			let (parts, body) = req.into_parts();
			let body = match http_body_util::Limited::new(body, max_body_size as usize)
				.collect()
				.await
			{
				Ok(collected) => collected.to_bytes(),
				Err(_) => return Self::into_hyper(too_large),
			};

			let response = handler
				.handle(Request::from_parts(parts, body))
				.await
				.unwrap_or_else(Response::from);
			Self::into_hyper(response)
		})
	}
}
