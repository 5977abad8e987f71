//! URL dispatch with named, reversible routes.
//!
//! Patterns use `{name}` placeholders that capture one path segment:
//!
//! ```
//! use std::sync::Arc;
//! use hyper::Method;
//! use stableyard_http::{Response, Router, handler_fn};
//!
//! let mut router = Router::new();
//! router
//!     .add(
//!         "horse_history",
//!         "/manage/horse/{id}/history/",
//!         &[Method::GET],
//!         Arc::new(handler_fn(|_req| async { Ok(Response::ok()) })),
//!     )
//!     .unwrap();
//!
//! assert_eq!(
//!     router.reverse("horse_history", &[("id", "7")]).as_deref(),
//!     Some("/manage/horse/7/history/")
//! );
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use hyper::Method;
use stableyard_core::{Error, Result};

use crate::{Handler, Request, Response};

const MAX_PATTERN_LENGTH: usize = 512;

/// Compiled `{name}` path pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
	pattern: String,
	regex: regex::Regex,
	param_names: Vec<String>,
}

impl PathPattern {
	pub fn new(pattern: &str) -> Result<Self> {
		if pattern.len() > MAX_PATTERN_LENGTH {
			return Err(Error::Configuration(format!(
				"Route pattern longer than {} bytes",
				MAX_PATTERN_LENGTH
			)));
		}
		let (regex_str, param_names) = Self::compile(pattern)?;
		let regex = regex::Regex::new(&regex_str).map_err(|e| {
			Error::Configuration(format!("Invalid route pattern {}: {}", pattern, e))
		})?;
		Ok(Self {
			pattern: pattern.to_string(),
			regex,
			param_names,
		})
	}

	fn compile(pattern: &str) -> Result<(String, Vec<String>)> {
		let mut regex_str = String::from("^");
		let mut param_names = Vec::new();
		let mut rest = pattern;
		while let Some(open) = rest.find('{') {
			regex_str.push_str(&regex::escape(&rest[..open]));
			let close = rest[open..].find('}').map(|i| open + i).ok_or_else(|| {
				Error::Configuration(format!("Unclosed parameter in route {}", pattern))
			})?;
			let name = &rest[open + 1..close];
			if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
				return Err(Error::Configuration(format!(
					"Invalid parameter name `{}` in route {}",
					name, pattern
				)));
			}
			regex_str.push_str(&format!("(?P<{}>[^/]+)", name));
			param_names.push(name.to_string());
			rest = &rest[close + 1..];
		}
		regex_str.push_str(&regex::escape(rest));
		regex_str.push('$');
		Ok((regex_str, param_names))
	}

	pub fn pattern(&self) -> &str {
		&self.pattern
	}

	pub fn param_names(&self) -> &[String] {
		&self.param_names
	}

	/// Captured parameters when `path` matches.
	pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
		self.regex.captures(path).map(|caps| {
			self.param_names
				.iter()
				.filter_map(|name| {
					caps.name(name)
						.map(|m| (name.clone(), m.as_str().to_string()))
				})
				.collect()
		})
	}

	/// Substitutes `params` into the pattern. Every placeholder must be given.
	pub fn reverse(&self, params: &[(&str, &str)]) -> Option<String> {
		let mut url = self.pattern.clone();
		for name in &self.param_names {
			let (_, value) = params.iter().find(|(key, _)| key == name)?;
			url = url.replace(&format!("{{{}}}", name), value);
		}
		Some(url)
	}
}

struct Route {
	name: String,
	pattern: PathPattern,
	methods: Vec<Method>,
	handler: Arc<dyn Handler>,
}

/// Dispatches requests to the first route whose pattern and method match.
///
/// Handler errors are turned into responses here, so middleware outside the
/// router always sees a response.
#[derive(Default)]
pub struct Router {
	routes: Vec<Route>,
}

impl Router {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add(
		&mut self,
		name: &str,
		pattern: &str,
		methods: &[Method],
		handler: Arc<dyn Handler>,
	) -> Result<&mut Self> {
		if self.routes.iter().any(|route| route.name == name) {
			return Err(Error::Configuration(format!("Duplicate route name {}", name)));
		}
		self.routes.push(Route {
			name: name.to_string(),
			pattern: PathPattern::new(pattern)?,
			methods: methods.to_vec(),
			handler,
		});
		Ok(self)
	}

	pub fn route_names(&self) -> impl Iterator<Item = &str> {
		self.routes.iter().map(|route| route.name.as_str())
	}

	pub fn reverse(&self, name: &str, params: &[(&str, &str)]) -> Option<String> {
		self.routes
			.iter()
			.find(|route| route.name == name)
			.and_then(|route| route.pattern.reverse(params))
	}

	fn allows(methods: &[Method], method: &Method) -> bool {
		methods.contains(method) || (*method == Method::HEAD && methods.contains(&Method::GET))
	}

	async fn dispatch(&self, mut request: Request) -> Result<Response> {
		let mut allowed: Vec<Method> = Vec::new();
		for route in &self.routes {
			let Some(params) = route.pattern.matches(request.path()) else {
				continue;
			};
			if !Self::allows(&route.methods, &request.method) {
				allowed.extend(route.methods.iter().cloned());
				continue;
			}
			for (key, value) in params {
				request.set_path_param(key, value);
			}
			tracing::debug!(route = %route.name, "route matched");
			return route.handler.handle(request).await;
		}

		if !allowed.is_empty() {
			return Ok(Response::method_not_allowed(&allowed));
		}

		// Missing trailing slash on an otherwise routable GET
		let path = request.path();
		if !path.ends_with('/') && request.method == Method::GET {
			let with_slash = format!("{}/", path);
			if self
				.routes
				.iter()
				.any(|route| route.pattern.matches(&with_slash).is_some())
			{
				let target = match request.uri.query() {
					Some(query) => format!("{}?{}", with_slash, query),
					None => with_slash,
				};
				return Ok(Response::permanent_redirect(target));
			}
		}

		Err(Error::NotFound(format!("No page at {}", request.path())))
	}
}

#[async_trait]
impl Handler for Router {
	async fn handle(&self, request: Request) -> Result<Response> {
		Ok(self
			.dispatch(request)
			.await
			.unwrap_or_else(Response::from))
	}
}
