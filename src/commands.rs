//! Operations behind the `manage` subcommands.
//!
//! Each one works on a [`StableRepository`] so it can run against the real
//! database or an in-memory one.

use std::sync::Arc;

use stableyard_auth::{PasswordHasher, create_account};
use stableyard_conf::Settings;
use stableyard_core::{Error, Horse, HorseData, Result, Role, RoleInfo, RoleSet, User};
use stableyard_db::{PoolConfig, StableRepository};

/// Demo horses created by [`seed_horses`], as `(name, breed, age, color)`.
pub const DEMO_HORSES: [(&str, &str, u16, &str); 5] = [
	("Thunder", "Thoroughbred", 8, "Bay"),
	("Luna", "Arabian", 6, "Grey"),
	("Rayo", "Criollo", 5, "Chestnut"),
	("Estrella", "Andalusian", 9, "White"),
	("Trueno", "Quarter Horse", 7, "Black"),
];

pub const NO_USERS: &str = "No users exist yet. Create one with `manage createuser` first";

/// Arguments of `createuser`.
#[derive(Debug, Clone, Default)]
pub struct NewAccount {
	pub username: String,
	pub password: String,
	pub name: String,
	pub email: String,
	pub roles: Vec<Role>,
}

/// Creates an account holding the given roles.
pub async fn create_user(
	repo: &dyn StableRepository,
	hasher: &Arc<dyn PasswordHasher>,
	account: &NewAccount,
) -> Result<User> {
	let roles: RoleSet = account.roles.iter().copied().collect();
	let user = create_account(
		repo,
		hasher,
		&account.username,
		&account.password,
		&account.name,
		&account.email,
		roles,
	)
	.await?;
	tracing::info!(user = %user.username, roles = roles.len(), "user created");
	Ok(user)
}

/// Adds `role` to the user's profile, creating the profile if needed.
///
/// Returns the roles held afterwards.
pub async fn grant_role(repo: &dyn StableRepository, username: &str, role: Role) -> Result<RoleSet> {
	let user = repo
		.find_user_by_username(username)
		.await?
		.ok_or_else(|| Error::NotFound(format!("User {} not found", username)))?;
	repo.get_or_create_profile(user.id, RoleSet::empty()).await?;
	let profile = repo.add_role(user.id, role).await?;
	tracing::info!(user = %user.username, role = role.as_str(), "role granted");
	Ok(profile.roles)
}

pub fn list_roles() -> Vec<RoleInfo> {
	Role::ALL.into_iter().map(RoleInfo::from).collect()
}

/// Creates the demo horses that are missing, owned by the first user.
///
/// Returns each horse with `true` when it was created by this call.
pub async fn seed_horses(repo: &dyn StableRepository) -> Result<Vec<(Horse, bool)>> {
	let owner = repo
		.first_user()
		.await?
		.ok_or_else(|| Error::Validation(NO_USERS.to_string()))?;

	let mut seeded = Vec::with_capacity(DEMO_HORSES.len());
	for (name, breed, age, color) in DEMO_HORSES {
		if let Some(horse) = repo.find_horse_by_name(name).await? {
			seeded.push((horse, false));
			continue;
		}
		let horse = repo
			.create_horse(HorseData {
				name: name.to_string(),
				breed: breed.to_string(),
				age,
				color: color.to_string(),
				owner_id: owner.id,
				active: true,
			})
			.await?;
		tracing::debug!(horse = %horse.name, owner = %owner.username, "demo horse created");
		seeded.push((horse, true));
	}
	Ok(seeded)
}

/// Validates the settings and the pool configuration derived from them.
pub fn check(settings: &Settings) -> Result<()> {
	settings
		.validate()
		.map_err(|e| Error::Configuration(e.to_string()))?;
	PoolConfig::from(&settings.pool)
		.validate()
		.map_err(Error::Configuration)?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::*;
	use stableyard_auth::Argon2Hasher;
	use stableyard_db::{SqliteRepository, connect_in_memory};

	#[fixture]
	async fn repo() -> SqliteRepository {
		SqliteRepository::new(connect_in_memory().await.unwrap())
	}

	fn account(username: &str, roles: Vec<Role>) -> NewAccount {
		NewAccount {
			username: username.to_string(),
			password: "stirrup".to_string(),
			roles,
			..Default::default()
		}
	}

	#[rstest]
	#[tokio::test]
	async fn test_seed_horses_needs_a_user(#[future] repo: SqliteRepository) {
		let repo = repo.await;
		let err = seed_horses(&repo).await.unwrap_err();
		assert_eq!(err.to_string(), NO_USERS);
	}

	#[rstest]
	#[tokio::test]
	async fn test_seed_horses_is_idempotent(#[future] repo: SqliteRepository) {
		let repo = repo.await;
		let owner = create_user(&repo, &Argon2Hasher::shared(), &account("admin", vec![]))
			.await
			.unwrap();

		let first = seed_horses(&repo).await.unwrap();
		assert_eq!(first.len(), 5);
		assert!(first.iter().all(|(horse, created)| *created && horse.owner_id == owner.id));

		let second = seed_horses(&repo).await.unwrap();
		assert!(second.iter().all(|(_, created)| !created));
		assert_eq!(repo.list_horses(None, false).await.unwrap().len(), 5);
	}

	#[rstest]
	#[tokio::test]
	async fn test_grant_role(#[future] repo: SqliteRepository) {
		let repo = repo.await;
		create_user(&repo, &Argon2Hasher::shared(), &account("mia", vec![Role::Client]))
			.await
			.unwrap();

		let roles = grant_role(&repo, "mia", Role::Trainer).await.unwrap();
		assert!(roles.contains(Role::Trainer));
		assert!(roles.contains(Role::Client));

		let err = grant_role(&repo, "nobody", Role::Trainer).await.unwrap_err();
		assert_eq!(err.status_code(), 404);
	}

	#[rstest]
	fn test_list_roles_covers_every_role() {
		let roles = list_roles();
		assert_eq!(roles.len(), 5);
		assert!(roles.iter().all(|info| !info.description.is_empty()));
	}

	#[rstest]
	fn test_check_rejects_bad_pool() {
		let mut settings = Settings::default();
		assert!(check(&settings).is_ok());
		settings.pool.min_connections = 50;
		assert!(check(&settings).is_err());
	}
}
