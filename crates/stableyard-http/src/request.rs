//! Incoming request and its decoding helpers.

use std::collections::HashMap;
use std::str::FromStr;

use bytes::Bytes;
use hyper::header::{CONTENT_TYPE, COOKIE};
use hyper::{HeaderMap, Method, Uri, Version};
use serde::Serialize;
use serde::de::DeserializeOwned;
use stableyard_core::{Error, Result};

use crate::Extensions;

/// Content type of HTML form submissions.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// HTTP request as seen by middleware and views.
#[derive(Debug)]
pub struct Request {
	pub method: Method,
	pub uri: Uri,
	pub version: Version,
	pub headers: HeaderMap,
	pub body: Bytes,
	/// Values captured by the router from `{name}` segments.
	pub path_params: HashMap<String, String>,
	pub extensions: Extensions,
}

impl Request {
	/// # Examples
	///
	/// ```
	/// use stableyard_http::Request;
	/// use hyper::Method;
	///
	/// let request = Request::builder()
	///     .method(Method::POST)
	///     .uri("/login/?next=/dashboard/")
	///     .form(&[("username", "ann"), ("password", "gallop")])
	///     .build()
	///     .unwrap();
	///
	/// assert_eq!(request.path(), "/login/");
	/// assert_eq!(request.query("next").as_deref(), Some("/dashboard/"));
	/// ```
	pub fn builder() -> RequestBuilder {
		RequestBuilder::default()
	}

	/// Builds a request from the parts hyper hands to the server.
	pub fn from_parts(parts: http::request::Parts, body: Bytes) -> Self {
		Self {
			method: parts.method,
			uri: parts.uri,
			version: parts.version,
			headers: parts.headers,
			body,
			path_params: HashMap::new(),
			extensions: Extensions::new(),
		}
	}

	pub fn path(&self) -> &str {
		self.uri.path()
	}

	/// Path plus query string, as used for `next` redirects.
	pub fn full_path(&self) -> String {
		match self.uri.query() {
			Some(query) => format!("{}?{}", self.uri.path(), query),
			None => self.uri.path().to_string(),
		}
	}

	pub fn is_post(&self) -> bool {
		self.method == Method::POST
	}

	/// Decoded query pairs in their original order.
	pub fn query_pairs(&self) -> Vec<(String, String)> {
		self.uri
			.query()
			.and_then(|query| serde_urlencoded::from_str(query).ok())
			.unwrap_or_default()
	}

	/// Last value of a query parameter.
	pub fn query(&self, name: &str) -> Option<String> {
		self.query_pairs()
			.into_iter()
			.rev()
			.find_map(|(key, value)| (key == name).then_some(value))
	}

	/// Decodes the query string into `T`.
	pub fn query_as<T: DeserializeOwned>(&self) -> Result<T> {
		serde_urlencoded::from_str(self.uri.query().unwrap_or(""))
			.map_err(|e| Error::Validation(format!("Invalid query string: {}", e)))
	}

	/// Decodes an urlencoded body into `T`.
	///
	/// Repeated keys are not supported by the target struct; use
	/// [`Request::form_values`] for those.
	pub fn form<T: DeserializeOwned>(&self) -> Result<T> {
		serde_urlencoded::from_bytes(&self.body)
			.map_err(|e| Error::Validation(format!("Invalid form data: {}", e)))
	}

	/// Every value submitted under `name`, in order.
	pub fn form_values(&self, name: &str) -> Result<Vec<String>> {
		let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(&self.body)
			.map_err(|e| Error::Validation(format!("Invalid form data: {}", e)))?;
		Ok(pairs
			.into_iter()
			.filter_map(|(key, value)| (key == name).then_some(value))
			.collect())
	}

	/// Parses a path parameter. A missing or malformed value means the
	/// addressed record cannot exist.
	pub fn path_param<T: FromStr>(&self, name: &str) -> Result<T> {
		self.path_params
			.get(name)
			.and_then(|value| value.parse().ok())
			.ok_or_else(|| Error::NotFound(format!("No record matches `{}`", name)))
	}

	pub fn set_path_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
		self.path_params.insert(key.into(), value.into());
	}

	/// Value of a cookie from the `Cookie` header.
	pub fn cookie(&self, name: &str) -> Option<String> {
		self.headers
			.get_all(COOKIE)
			.iter()
			.filter_map(|header| header.to_str().ok())
			.flat_map(|header| header.split(';'))
			.find_map(|pair| {
				let (key, value) = pair.trim().split_once('=')?;
				(key.trim() == name).then(|| value.trim().to_string())
			})
	}
}

/// Builder mainly used by tests and the server.
#[derive(Debug)]
pub struct RequestBuilder {
	method: Method,
	uri: String,
	version: Version,
	headers: HeaderMap,
	body: Bytes,
	error: Option<String>,
}

impl Default for RequestBuilder {
	fn default() -> Self {
		Self {
			method: Method::GET,
			uri: "/".to_string(),
			version: Version::HTTP_11,
			headers: HeaderMap::new(),
			body: Bytes::new(),
			error: None,
		}
	}
}

impl RequestBuilder {
	pub fn method(mut self, method: Method) -> Self {
		self.method = method;
		self
	}

	pub fn uri(mut self, uri: impl Into<String>) -> Self {
		self.uri = uri.into();
		self
	}

	pub fn version(mut self, version: Version) -> Self {
		self.version = version;
		self
	}

	pub fn headers(mut self, headers: HeaderMap) -> Self {
		self.headers = headers;
		self
	}

	/// Appends a header. Invalid names or values fail the final `build`.
	pub fn header(mut self, name: &str, value: &str) -> Self {
		match (
			hyper::header::HeaderName::from_bytes(name.as_bytes()),
			hyper::header::HeaderValue::from_str(value),
		) {
			(Ok(name), Ok(value)) => {
				self.headers.append(name, value);
			}
			_ => self.error = Some(format!("Invalid header {}: {}", name, value)),
		}
		self
	}

	pub fn body(mut self, body: impl Into<Bytes>) -> Self {
		self.body = body.into();
		self
	}

	/// Sets an urlencoded body and the matching content type.
	pub fn form<T: Serialize + ?Sized>(mut self, form: &T) -> Self {
		match serde_urlencoded::to_string(form) {
			Ok(encoded) => {
				self.body = Bytes::from(encoded);
				self.headers.insert(
					CONTENT_TYPE,
					hyper::header::HeaderValue::from_static(FORM_CONTENT_TYPE),
				);
			}
			Err(e) => self.error = Some(format!("Invalid form: {}", e)),
		}
		self
	}

	pub fn build(self) -> Result<Request> {
		if let Some(error) = self.error {
			return Err(Error::Internal(error));
		}
		let uri = self
			.uri
			.parse::<Uri>()
			.map_err(|e| Error::Internal(format!("Invalid URI {}: {}", self.uri, e)))?;
		Ok(Request {
			method: self.method,
			uri,
			version: self.version,
			headers: self.headers,
			body: self.body,
			path_params: HashMap::new(),
			extensions: Extensions::new(),
		})
	}
}
