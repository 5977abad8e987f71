//! Cookie-keyed server-side sessions.
//!
//! [`SessionMiddleware`] loads the session named by the cookie (or starts a
//! new one) and places a [`Session`] handle in the request extensions. Views
//! read and write through the handle; the middleware persists whatever state
//! the handle holds once the view returns.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use async_trait::async_trait;
use hyper::header::{HeaderValue, SET_COOKIE};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde::de::DeserializeOwned;
use stableyard_conf::SessionSettings;
use stableyard_core::{Error, Result};
use uuid::Uuid;

use crate::{Handler, Middleware, Request, Response};

#[derive(Debug, Clone)]
pub struct SessionData {
	pub id: String,
	pub data: HashMap<String, serde_json::Value>,
	pub created_at: SystemTime,
	pub last_accessed: SystemTime,
	pub expires_at: SystemTime,
}

impl SessionData {
	fn new(ttl: Duration) -> Self {
		let now = SystemTime::now();
		Self {
			id: new_session_id(),
			data: HashMap::new(),
			created_at: now,
			last_accessed: now,
			expires_at: now + ttl,
		}
	}

	fn is_valid(&self) -> bool {
		SystemTime::now() < self.expires_at
	}

	fn touch(&mut self, ttl: Duration) {
		let now = SystemTime::now();
		self.last_accessed = now;
		self.expires_at = now + ttl;
	}
}

fn new_session_id() -> String {
	Uuid::new_v4().simple().to_string()
}

/// In-memory session store.
///
/// Expired entries are swept on save, either once the store grows past the
/// cleanup threshold or when the cleanup interval has elapsed since the last
/// sweep.
#[derive(Debug)]
pub struct SessionStore {
	sessions: RwLock<HashMap<String, SessionData>>,
	cleanup_threshold: usize,
	cleanup_interval: Duration,
	last_cleanup: Mutex<Instant>,
}

impl Default for SessionStore {
	fn default() -> Self {
		Self::new()
	}
}

impl SessionStore {
	const DEFAULT_CLEANUP_THRESHOLD: usize = 10_000;
	const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

	pub fn new() -> Self {
		Self {
			sessions: RwLock::new(HashMap::new()),
			cleanup_threshold: Self::DEFAULT_CLEANUP_THRESHOLD,
			cleanup_interval: Self::DEFAULT_CLEANUP_INTERVAL,
			last_cleanup: Mutex::new(Instant::now()),
		}
	}

	pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
		self.cleanup_interval = interval;
		self
	}

	/// Returns the session when it exists and has not expired.
	pub fn get(&self, id: &str) -> Option<SessionData> {
		self.sessions
			.read()
			.get(id)
			.filter(|session| session.is_valid())
			.cloned()
	}

	pub fn save(&self, session: SessionData) {
		let mut sessions = self.sessions.write();
		sessions.insert(session.id.clone(), session);

		let mut last_cleanup = self.last_cleanup.lock();
		if sessions.len() > self.cleanup_threshold || last_cleanup.elapsed() >= self.cleanup_interval {
			let before = sessions.len();
			sessions.retain(|_, s| s.is_valid());
			*last_cleanup = Instant::now();
			tracing::debug!(evicted = before - sessions.len(), "expired sessions swept");
		}
	}

	pub fn delete(&self, id: &str) {
		self.sessions.write().remove(id);
	}

	pub fn cleanup(&self) {
		self.sessions.write().retain(|_, session| session.is_valid());
	}

	pub fn len(&self) -> usize {
		self.sessions.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.sessions.read().is_empty()
	}
}

#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct SessionConfig {
	pub cookie_name: String,
	pub ttl: Duration,
	pub secure: bool,
	pub http_only: bool,
	pub same_site: Option<String>,
	pub path: String,
}

impl SessionConfig {
	pub fn new(cookie_name: impl Into<String>, ttl: Duration) -> Self {
		Self {
			cookie_name: cookie_name.into(),
			ttl,
			secure: false,
			http_only: true,
			same_site: Some("Lax".to_string()),
			path: "/".to_string(),
		}
	}

	pub fn with_secure(mut self, secure: bool) -> Self {
		self.secure = secure;
		self
	}

	pub fn from_settings(settings: &SessionSettings) -> Self {
		Self::new(
			settings.cookie_name.clone(),
			Duration::from_secs(settings.ttl_secs),
		)
		.with_secure(settings.secure)
	}
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self::from_settings(&SessionSettings::default())
	}
}

#[derive(Debug)]
struct SessionState {
	data: SessionData,
	/// Ids that must not resolve any more once the request ends.
	retired: Vec<String>,
	modified: bool,
}

/// Shared, mutable view of the current request's session.
#[derive(Debug, Clone)]
pub struct Session {
	state: Arc<Mutex<SessionState>>,
}

impl Session {
	fn new(data: SessionData) -> Self {
		Self {
			state: Arc::new(Mutex::new(SessionState {
				data,
				retired: Vec::new(),
				modified: false,
			})),
		}
	}

	/// Detached session, for exercising views without the middleware.
	pub fn detached() -> Self {
		Self::new(SessionData::new(Duration::from_secs(60)))
	}

	pub fn id(&self) -> String {
		self.state.lock().data.id.clone()
	}

	pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
		self.state
			.lock()
			.data
			.data
			.get(key)
			.and_then(|value| serde_json::from_value(value.clone()).ok())
	}

	pub fn insert<T: Serialize>(&self, key: impl Into<String>, value: T) -> Result<()> {
		let value = serde_json::to_value(value)?;
		let mut state = self.state.lock();
		state.data.data.insert(key.into(), value);
		state.modified = true;
		Ok(())
	}

	pub fn remove(&self, key: &str) -> Option<serde_json::Value> {
		let mut state = self.state.lock();
		let removed = state.data.data.remove(key);
		state.modified |= removed.is_some();
		removed
	}

	/// Whether anything was written, removed or re-keyed during this request.
	pub fn is_modified(&self) -> bool {
		self.state.lock().modified
	}

	pub fn contains_key(&self, key: &str) -> bool {
		self.state.lock().data.data.contains_key(key)
	}

	/// Issues a new id while keeping the data, so a pre-login cookie cannot
	/// be reused after login.
	pub fn cycle(&self) {
		let mut state = self.state.lock();
		let old = std::mem::replace(&mut state.data.id, new_session_id());
		state.retired.push(old);
		state.modified = true;
	}

	/// Drops all data and issues a new id.
	pub fn flush(&self) {
		let mut state = self.state.lock();
		state.data.data.clear();
		let old = std::mem::replace(&mut state.data.id, new_session_id());
		state.retired.push(old);
		state.modified = true;
	}

	fn into_parts(self) -> (SessionData, Vec<String>, bool) {
		let state = self.state.lock();
		(state.data.clone(), state.retired.clone(), state.modified)
	}
}

impl Request {
	/// The session installed by [`SessionMiddleware`].
	pub fn session(&self) -> Result<Session> {
		self.extensions
			.get::<Session>()
			.ok_or_else(|| Error::Internal("session middleware is not installed".to_string()))
	}
}

pub struct SessionMiddleware {
	config: SessionConfig,
	store: Arc<SessionStore>,
}

impl SessionMiddleware {
	pub fn new(config: SessionConfig) -> Self {
		Self::with_store(config, Arc::new(SessionStore::new()))
	}

	pub fn with_store(config: SessionConfig, store: Arc<SessionStore>) -> Self {
		Self { config, store }
	}

	pub fn store(&self) -> &SessionStore {
		&self.store
	}

	fn build_cookie_header(&self, session_id: &str) -> String {
		let mut parts = vec![
			format!("{}={}", self.config.cookie_name, session_id),
			format!("Path={}", self.config.path),
		];
		if self.config.http_only {
			parts.push("HttpOnly".to_string());
		}
		if self.config.secure {
			parts.push("Secure".to_string());
		}
		if let Some(same_site) = &self.config.same_site {
			parts.push(format!("SameSite={}", same_site));
		}
		parts.push(format!("Max-Age={}", self.config.ttl.as_secs()));
		parts.join("; ")
	}
}

#[async_trait]
impl Middleware for SessionMiddleware {
	async fn process(&self, request: Request, next: Arc<dyn Handler>) -> Result<Response> {
		let stored = request
			.cookie(&self.config.cookie_name)
			.and_then(|id| self.store.get(&id));
		let known = stored.is_some();
		let mut data = stored.unwrap_or_else(|| SessionData::new(self.config.ttl));
		data.touch(self.config.ttl);

		let session = Session::new(data);
		request.extensions.insert(session.clone());

		let mut response = next.handle(request).await?;

		let (data, retired, modified) = session.into_parts();
		for id in &retired {
			self.store.delete(id);
		}
		// Untouched anonymous sessions are never stored
		if !known && !modified {
			return Ok(response);
		}
		let cookie = self.build_cookie_header(&data.id);
		self.store.save(data);

		response.headers.append(
			SET_COOKIE,
			HeaderValue::from_str(&cookie)
				.map_err(|e| Error::Internal(format!("Failed to create cookie header: {}", e)))?,
		);
		Ok(response)
	}
}
