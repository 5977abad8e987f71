use std::sync::Arc;

use chrono::{FixedOffset, NaiveDate, Offset, Utc};
use stableyard_auth::{Argon2Hasher, PasswordHasher};
use stableyard_conf::Settings;
use stableyard_core::{ConflictPolicy, Error, Result};
use stableyard_db::StableRepository;

/// Everything the views share: the store, the password hasher and the
/// scheduling settings.
#[derive(Clone)]
pub struct AppState {
	pub repo: Arc<dyn StableRepository>,
	pub hasher: Arc<dyn PasswordHasher>,
	/// Rule applied when a client books a new class.
	pub conflict_policy: ConflictPolicy,
	/// Zone in which a groom's working day is counted.
	pub utc_offset: FixedOffset,
}

impl AppState {
	pub fn new(repo: Arc<dyn StableRepository>) -> Self {
		Self {
			repo,
			hasher: Arc::new(Argon2Hasher::new()),
			conflict_policy: ConflictPolicy::default(),
			utc_offset: Utc.fix(),
		}
	}

	pub fn from_settings(repo: Arc<dyn StableRepository>, settings: &Settings) -> Result<Self> {
		Self::new(repo)
			.with_conflict_policy(settings.booking.conflict_policy)
			.with_utc_offset_minutes(settings.utc_offset_minutes)
	}

	pub fn with_hasher(mut self, hasher: Arc<dyn PasswordHasher>) -> Self {
		self.hasher = hasher;
		self
	}

	pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
		self.conflict_policy = policy;
		self
	}

	pub fn with_utc_offset_minutes(mut self, minutes: i32) -> Result<Self> {
		self.utc_offset = FixedOffset::east_opt(minutes * 60).ok_or_else(|| {
			Error::Configuration(format!("UTC offset of {} minutes is out of range", minutes))
		})?;
		Ok(self)
	}

	/// Current calendar day in the stable's zone.
	pub fn today(&self) -> NaiveDate {
		Utc::now().with_timezone(&self.utc_offset).date_naive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use stableyard_db::{SqliteRepository, connect_in_memory};

	#[rstest]
	#[tokio::test]
	async fn test_from_settings() {
		let repo = Arc::new(SqliteRepository::new(connect_in_memory().await.unwrap()));
		let mut settings = Settings::default();
		settings.booking.conflict_policy = ConflictPolicy::ExactStart;
		settings.utc_offset_minutes = -180;

		let state = AppState::from_settings(repo.clone(), &settings).unwrap();
		assert_eq!(state.conflict_policy, ConflictPolicy::ExactStart);
		assert_eq!(state.utc_offset.local_minus_utc(), -180 * 60);

		settings.utc_offset_minutes = 24 * 60;
		assert!(AppState::from_settings(repo, &settings).is_err());
	}
}
