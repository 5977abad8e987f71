//! # stableyard-conf
//!
//! Settings for the stable server, merged from defaults, `STABLEYARD_*`
//! environment variables and TOML files under `settings/`.
//!
//! ```toml
//! # settings/base.toml
//! bind_address = "0.0.0.0:8000"
//! database_url = "sqlite://stableyard.db"
//!
//! [booking]
//! conflict_policy = "overlap"
//! ```

pub mod settings;
pub mod sources;

pub use settings::{
	BookingSettings, MergedSettings, PoolSettings, SessionSettings, Settings, SettingsBuilder,
	SettingsError,
};
pub use sources::{ConfigSource, DefaultSource, EnvSource, SourceError, TomlFileSource};
