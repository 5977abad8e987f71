//! # stableyard-auth
//!
//! Account creation and credential checks on top of [`StableRepository`],
//! plus the identity record kept in the session after login.

mod hasher;

pub use hasher::{Argon2Hasher, PasswordHasher};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use stableyard_core::validation::Registration;
use stableyard_core::{Error, NewUser, Result, Role, RoleSet, User};
use stableyard_db::StableRepository;

pub const INVALID_CREDENTIALS: &str = "Incorrect username or password";

/// Identity of the logged-in user, stored in the session under [`AuthState::SESSION_KEY`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthState {
	pub user_id: i64,
	pub username: String,
	/// Dashboard currently shown. Absent means client.
	#[serde(default)]
	pub active_role: Role,
}

impl AuthState {
	pub const SESSION_KEY: &'static str = "_auth";

	pub fn for_user(user: &User) -> Self {
		Self {
			user_id: user.id,
			username: user.username.clone(),
			active_role: Role::default(),
		}
	}
}

/// Hashes `password` on the blocking thread pool.
///
/// Argon2 is tuned to cost tens of milliseconds per call, which must not
/// stall the request executor.
pub async fn hash_password(hasher: &Arc<dyn PasswordHasher>, password: &str) -> Result<String> {
	let hasher = Arc::clone(hasher);
	let password = password.to_string();
	tokio::task::spawn_blocking(move || hasher.hash(&password))
		.await
		.map_err(|e| Error::Internal(format!("password hashing task failed: {}", e)))?
}

/// Verifies `password` against `hash` on the blocking thread pool.
pub async fn verify_password(
	hasher: &Arc<dyn PasswordHasher>,
	password: &str,
	hash: &str,
) -> Result<bool> {
	let hasher = Arc::clone(hasher);
	let (password, hash) = (password.to_string(), hash.to_string());
	tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
		.await
		.map_err(|e| Error::Internal(format!("password verification task failed: {}", e)))?
}

/// Checks a username/password pair.
///
/// Unknown users, inactive users and wrong passwords all produce the same
/// message so that accounts cannot be enumerated.
pub async fn authenticate(
	repo: &dyn StableRepository,
	hasher: &Arc<dyn PasswordHasher>,
	username: &str,
	password: &str,
) -> Result<User> {
	let Some(user) = repo.find_user_by_username(username).await? else {
		tracing::info!(username, "login failed: unknown user");
		return Err(Error::Authentication(INVALID_CREDENTIALS.to_string()));
	};
	if !user.is_active || !verify_password(hasher, password, &user.password_hash).await? {
		tracing::info!(username, "login failed: bad credentials");
		return Err(Error::Authentication(INVALID_CREDENTIALS.to_string()));
	}
	Ok(user)
}

/// Creates an account with a hashed password and a profile holding `roles`.
pub async fn create_account(
	repo: &dyn StableRepository,
	hasher: &Arc<dyn PasswordHasher>,
	username: &str,
	password: &str,
	first_name: &str,
	email: &str,
	roles: RoleSet,
) -> Result<User> {
	let password_hash = hash_password(hasher, password).await?;
	let user = repo
		.create_user(NewUser {
			username: username.to_string(),
			first_name: first_name.to_string(),
			email: email.to_string(),
			password_hash,
		})
		.await?;
	repo.get_or_create_profile(user.id, roles).await?;
	Ok(user)
}

/// Self-service sign-up: every new account starts as a client.
pub async fn register(
	repo: &dyn StableRepository,
	hasher: &Arc<dyn PasswordHasher>,
	registration: &Registration,
) -> Result<User> {
	create_account(
		repo,
		hasher,
		&registration.username,
		&registration.password,
		&registration.name,
		"",
		RoleSet::single(Role::Client),
	)
	.await
}
