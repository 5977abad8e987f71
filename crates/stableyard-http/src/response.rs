use bytes::Bytes;
use hyper::header::{CONTENT_TYPE, HeaderName, HeaderValue, LOCATION};
use hyper::{HeaderMap, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use stableyard_core::{Error, Result};

/// HTTP response representation
#[derive(Debug)]
pub struct Response {
	pub status: StatusCode,
	pub headers: HeaderMap,
	pub body: Bytes,
}

impl Response {
	/// # Examples
	///
	/// ```
	/// use stableyard_http::Response;
	/// use hyper::StatusCode;
	///
	/// let response = Response::new(StatusCode::OK);
	/// assert_eq!(response.status, StatusCode::OK);
	/// assert!(response.body.is_empty());
	/// ```
	pub fn new(status: StatusCode) -> Self {
		Self {
			status,
			headers: HeaderMap::new(),
			body: Bytes::new(),
		}
	}

	pub fn ok() -> Self {
		Self::new(StatusCode::OK)
	}

	pub fn not_found() -> Self {
		Self::new(StatusCode::NOT_FOUND)
	}

	pub fn internal_server_error() -> Self {
		Self::new(StatusCode::INTERNAL_SERVER_ERROR)
	}

	/// `405` listing the methods the resource does accept.
	pub fn method_not_allowed(allowed: &[hyper::Method]) -> Self {
		let allow = allowed
			.iter()
			.map(|method| method.as_str())
			.collect::<Vec<_>>()
			.join(", ");
		Self::new(StatusCode::METHOD_NOT_ALLOWED).with_header("allow", &allow)
	}

	/// `303 See Other`, the answer to every successful form post.
	///
	/// # Examples
	///
	/// ```
	/// use stableyard_http::Response;
	/// use hyper::StatusCode;
	///
	/// let response = Response::see_other("/dashboard/");
	/// assert_eq!(response.status, StatusCode::SEE_OTHER);
	/// assert_eq!(response.location(), Some("/dashboard/"));
	/// ```
	pub fn see_other(location: impl AsRef<str>) -> Self {
		Self::new(StatusCode::SEE_OTHER).with_location(location.as_ref())
	}

	pub fn permanent_redirect(location: impl AsRef<str>) -> Self {
		Self::new(StatusCode::MOVED_PERMANENTLY).with_location(location.as_ref())
	}

	pub fn with_status(mut self, status: StatusCode) -> Self {
		self.status = status;
		self
	}

	pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
		self.body = body.into();
		self
	}

	/// Sets a header. Invalid names or values are ignored.
	pub fn with_header(mut self, name: &str, value: &str) -> Self {
		if let (Ok(name), Ok(value)) = (
			HeaderName::from_bytes(name.as_bytes()),
			HeaderValue::from_str(value),
		) {
			self.headers.insert(name, value);
		}
		self
	}

	pub fn with_location(mut self, location: &str) -> Self {
		if let Ok(value) = HeaderValue::from_str(location) {
			self.headers.insert(LOCATION, value);
		}
		self
	}

	/// Serializes `data` as the JSON body.
	pub fn with_json<T: Serialize>(mut self, data: &T) -> Result<Self> {
		self.body = Bytes::from(serde_json::to_vec(data)?);
		self.headers
			.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
		Ok(self)
	}

	pub fn location(&self) -> Option<&str> {
		self.headers
			.get(LOCATION)
			.and_then(|value| value.to_str().ok())
	}

	/// Parses the body as JSON.
	pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
		Ok(serde_json::from_slice(&self.body)?)
	}
}

impl From<Error> for Response {
	fn from(error: Error) -> Self {
		let status =
			StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		if status.is_server_error() {
			tracing::error!(%error, "request failed");
		}
		let body = serde_json::json!({
			"status": status.as_u16(),
			"error": error.user_message(),
		});
		match Response::new(status).with_json(&body) {
			Ok(response) => response,
			Err(_) => Response::new(status),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::Value;

	#[rstest]
	#[case(Error::NotFound("No horse".into()), 404, "No horse")]
	#[case(Error::Conflict("Taken".into()), 409, "Taken")]
	#[case(Error::Database("locked".into()), 500, "Something went wrong. Please try again")]
	fn test_error_becomes_json_response(
		#[case] error: Error,
		#[case] status: u16,
		#[case] message: &str,
	) {
		let response = Response::from(error);
		assert_eq!(response.status.as_u16(), status);
		let body: Value = response.json().unwrap();
		assert_eq!(body["error"], message);
		assert_eq!(body["status"], status);
	}

	#[rstest]
	fn test_method_not_allowed_lists_methods() {
		let response = Response::method_not_allowed(&[hyper::Method::GET, hyper::Method::POST]);
		assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
		assert_eq!(response.headers.get("allow").unwrap(), "GET, POST");
	}
}
