use std::sync::Arc;

use stableyard_core::Error;

/// Password hasher trait
///
/// # Examples
///
/// ```
/// use stableyard_auth::{Argon2Hasher, PasswordHasher};
///
/// let hasher = Argon2Hasher::new();
/// let hash = hasher.hash("saddle").unwrap();
///
/// assert!(hasher.verify("saddle", &hash).unwrap());
/// assert!(!hasher.verify("bridle", &hash).unwrap());
/// ```
pub trait PasswordHasher: Send + Sync {
	/// Hashes a password into a self-describing PHC string.
	fn hash(&self, password: &str) -> Result<String, Error>;

	/// `Ok(false)` on mismatch, `Err` only when `hash` cannot be parsed.
	fn verify(&self, password: &str, hash: &str) -> Result<bool, Error>;
}

/// Argon2id password hasher
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Hasher;

impl Argon2Hasher {
	pub fn new() -> Self {
		Self
	}

	/// The hasher as the shared trait object the account functions take.
	pub fn shared() -> Arc<dyn PasswordHasher> {
		Arc::new(Self)
	}
}

impl PasswordHasher for Argon2Hasher {
	fn hash(&self, password: &str) -> Result<String, Error> {
		use argon2::{
			Argon2,
			password_hash::{PasswordHasher as _, SaltString},
		};

		// A v4 UUID carries 122 random bits from the OS generator
		let salt_bytes = uuid::Uuid::new_v4().into_bytes();
		let salt = SaltString::encode_b64(&salt_bytes)
			.map_err(|e| Error::Authentication(e.to_string()))?;

		Argon2::default()
			.hash_password(password.as_bytes(), &salt)
			.map(|hash| hash.to_string())
			.map_err(|e| Error::Internal(format!("password hashing failed: {}", e)))
	}

	fn verify(&self, password: &str, hash: &str) -> Result<bool, Error> {
		use argon2::{
			Argon2,
			password_hash::{PasswordHash, PasswordVerifier},
		};

		let parsed_hash =
			PasswordHash::new(hash).map_err(|e| Error::Authentication(e.to_string()))?;

		Ok(Argon2::default()
			.verify_password(password.as_bytes(), &parsed_hash)
			.is_ok())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::*;

	#[fixture]
	fn hasher() -> Argon2Hasher {
		Argon2Hasher::default()
	}

	#[rstest]
	#[case("")]
	#[case("abcd")]
	#[case("contraseña con espacios")]
	fn test_hash_then_verify(hasher: Argon2Hasher, #[case] password: &str) {
		let hash = hasher.hash(password).unwrap();
		assert!(hash.starts_with("$argon2id$"));
		assert!(hasher.verify(password, &hash).unwrap());
	}

	#[rstest]
	fn test_same_password_gets_distinct_salts(hasher: Argon2Hasher) {
		let first = hasher.hash("saddle").unwrap();
		let second = hasher.hash("saddle").unwrap();
		assert_ne!(first, second);
	}

	#[rstest]
	fn test_malformed_hash_is_an_error(hasher: Argon2Hasher) {
		assert!(hasher.verify("saddle", "not-a-hash").is_err());
	}
}
