//! Typed application settings.

use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stableyard_core::ConflictPolicy;

use crate::sources::{ConfigSource, DefaultSource, EnvSource, SourceError, TomlFileSource};

/// Prefix of every environment variable read by the settings loader.
pub const ENV_PREFIX: &str = "STABLEYARD_";

/// Variable naming the settings profile (`local`, `production`, ...).
pub const PROFILE_VAR: &str = "STABLEYARD_ENV";

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
	#[error(transparent)]
	Source(#[from] SourceError),

	#[error("Invalid settings: {0}")]
	Deserialize(#[from] serde_json::Error),

	#[error("Invalid setting `{key}`: {message}")]
	Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
	pub debug: bool,
	pub bind_address: String,
	pub database_url: String,
	/// `tracing` filter used when `RUST_LOG` is unset.
	pub log_level: String,
	/// Offset from UTC that decides where a groom's calendar day starts.
	pub utc_offset_minutes: i32,
	pub pool: PoolSettings,
	pub session: SessionSettings,
	pub booking: BookingSettings,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			debug: true,
			bind_address: "127.0.0.1:8000".to_string(),
			database_url: "sqlite://stableyard.db".to_string(),
			log_level: "info".to_string(),
			utc_offset_minutes: 0,
			pool: PoolSettings::default(),
			session: SessionSettings::default(),
			booking: BookingSettings::default(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
	pub max_connections: u32,
	pub min_connections: u32,
	pub acquire_timeout_secs: u64,
	pub idle_timeout_secs: u64,
	pub max_lifetime_secs: u64,
}

impl Default for PoolSettings {
	fn default() -> Self {
		Self {
			max_connections: 10,
			min_connections: 1,
			acquire_timeout_secs: 30,
			idle_timeout_secs: 600,
			max_lifetime_secs: 1800,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
	pub cookie_name: String,
	/// Two weeks, matching the usual session cookie age.
	pub ttl_secs: u64,
	pub secure: bool,
}

impl Default for SessionSettings {
	fn default() -> Self {
		Self {
			cookie_name: "sessionid".to_string(),
			ttl_secs: 1_209_600,
			secure: false,
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingSettings {
	pub conflict_policy: ConflictPolicy,
}

impl Settings {
	/// Loads settings for the profile named by `STABLEYARD_ENV` (default
	/// `local`) from `./settings`.
	///
	/// Priority order (highest to lowest):
	/// 1. `STABLEYARD_*` environment variables (a `.env` file is loaded first)
	/// 2. `settings/<profile>.toml`
	/// 3. `settings/base.toml`
	/// 4. Default values
	pub fn load() -> Result<Self, SettingsError> {
		dotenv::dotenv().ok();
		let profile = env::var(PROFILE_VAR).unwrap_or_else(|_| "local".to_string());
		let base_dir = env::current_dir().map_err(SourceError::Io)?;
		Self::load_from(base_dir.join("settings"), &profile)
	}

	/// Same as [`Settings::load`] with an explicit directory and profile.
	pub fn load_from(dir: impl AsRef<Path>, profile: &str) -> Result<Self, SettingsError> {
		let dir: PathBuf = dir.as_ref().to_path_buf();
		let settings: Settings = SettingsBuilder::new()
			.add_source(DefaultSource::from_serialize(&Settings::default())?)
			.add_source(EnvSource::new(ENV_PREFIX))
			.add_source(TomlFileSource::new(dir.join("base.toml")))
			.add_source(TomlFileSource::new(dir.join(format!("{}.toml", profile))))
			.build()?
			.into_typed()?;
		settings.validate()?;
		tracing::debug!(profile, dir = %dir.display(), "settings loaded");
		Ok(settings)
	}

	pub fn validate(&self) -> Result<(), SettingsError> {
		self.bind_address
			.parse::<SocketAddr>()
			.map_err(|e| SettingsError::Invalid {
				key: "bind_address",
				message: e.to_string(),
			})?;
		if self.database_url.trim().is_empty() {
			return Err(SettingsError::Invalid {
				key: "database_url",
				message: "must not be empty".to_string(),
			});
		}
		if self.pool.max_connections == 0 {
			return Err(SettingsError::Invalid {
				key: "pool.max_connections",
				message: "must be greater than 0".to_string(),
			});
		}
		if self.pool.min_connections > self.pool.max_connections {
			return Err(SettingsError::Invalid {
				key: "pool.min_connections",
				message: format!(
					"{} exceeds max_connections {}",
					self.pool.min_connections, self.pool.max_connections
				),
			});
		}
		if self.session.ttl_secs == 0 {
			return Err(SettingsError::Invalid {
				key: "session.ttl_secs",
				message: "must be greater than 0".to_string(),
			});
		}
		if self.utc_offset_minutes.abs() >= 24 * 60 {
			return Err(SettingsError::Invalid {
				key: "utc_offset_minutes",
				message: "must be less than one day".to_string(),
			});
		}
		Ok(())
	}
}

/// Collects sources and merges them by priority.
#[derive(Default)]
pub struct SettingsBuilder {
	sources: Vec<Box<dyn ConfigSource>>,
}

impl SettingsBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add_source(mut self, source: impl ConfigSource + 'static) -> Self {
		self.sources.push(Box::new(source));
		self
	}

	pub fn build(mut self) -> Result<MergedSettings, SettingsError> {
		self.sources.sort_by_key(|source| source.priority());

		let mut merged = Value::Object(Default::default());
		for source in &self.sources {
			let values = source.load()?;
			tracing::trace!(source = %source.description(), keys = values.len(), "merging source");
			let layer: serde_json::Map<String, Value> = values.into_iter().collect();
			crate::sources::merge_value(&mut merged, Value::Object(layer));
		}
		Ok(MergedSettings { values: merged })
	}
}

/// Untyped result of merging every source.
#[derive(Debug, Clone)]
pub struct MergedSettings {
	values: Value,
}

impl MergedSettings {
	pub fn get(&self, key: &str) -> Option<&Value> {
		self.values.get(key)
	}

	pub fn into_map(self) -> IndexMap<String, Value> {
		match self.values {
			Value::Object(map) => map.into_iter().collect(),
			_ => IndexMap::new(),
		}
	}

	pub fn into_typed<T: serde::de::DeserializeOwned>(self) -> Result<T, SettingsError> {
		Ok(serde_json::from_value(self.values)?)
	}
}
