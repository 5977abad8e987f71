//! # stableyard-http
//!
//! The web layer under the stable's views: request and response types, the
//! handler/middleware traits, a named router, cookie sessions with flash
//! messages, request logging and a hyper server.

mod extensions;
mod logging;
mod messages;
mod middleware;
mod request;
mod response;
pub mod router;
pub mod server;
pub mod session;

pub use extensions::Extensions;
pub use logging::LoggingMiddleware;
pub use messages::{Message, MessageLevel};
pub use middleware::{FnHandler, Handler, Middleware, MiddlewareChain, handler_fn};
pub use request::{FORM_CONTENT_TYPE, Request, RequestBuilder};
pub use response::Response;
pub use router::{PathPattern, Router};
pub use server::{HttpServer, shutdown_signal};
pub use session::{Session, SessionConfig, SessionMiddleware, SessionStore};

pub use hyper::{Method, StatusCode};

/// Percent-encodes a value for use inside a query string.
///
/// ```
/// assert_eq!(
///     stableyard_http::encode_query_value("/vet/horse/3/?a=b"),
///     "%2Fvet%2Fhorse%2F3%2F%3Fa%3Db"
/// );
/// ```
pub fn encode_query_value(value: &str) -> String {
	percent_encoding::utf8_percent_encode(value, percent_encoding::NON_ALPHANUMERIC).to_string()
}
