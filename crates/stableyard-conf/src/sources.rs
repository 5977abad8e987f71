//! Configuration sources for the layered settings system.
//!
//! Each source yields a map of keys to JSON values. The builder merges them in
//! ascending priority: defaults, then TOML files, then the environment.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Number, Value};

/// Separator that turns `POOL__MAX_CONNECTIONS` into `pool.max_connections`.
const NESTING_SEPARATOR: &str = "__";

/// Trait for configuration sources
pub trait ConfigSource: Send + Sync {
	/// Load configuration from this source
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError>;

	/// Get the priority of this source (higher = more important)
	fn priority(&self) -> u8;

	/// Get a description of this source
	fn description(&self) -> String;
}

/// Error type for configuration sources
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("Parse error: {0}")]
	Parse(String),

	#[error("TOML error: {0}")]
	Toml(#[from] toml::de::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

/// Parses the usual spellings of a boolean flag.
pub fn parse_bool(value: &str) -> Option<bool> {
	match value.trim().to_lowercase().as_str() {
		"true" | "1" | "yes" | "on" => Some(true),
		"false" | "0" | "no" | "off" => Some(false),
		_ => None,
	}
}

/// Environment variables with a required prefix.
///
/// Values are loaded as strings. When merged over a number or a boolean they
/// are converted to that type (see [`merge_value`]), so `STABLEYARD_SESSION__COOKIE_NAME=1234`
/// stays a string while `STABLEYARD_POOL__MAX_CONNECTIONS=4` becomes a number.
pub struct EnvSource {
	prefix: String,
	priority: u8,
}

impl EnvSource {
	/// # Examples
	///
	/// ```
	/// use stableyard_conf::sources::{ConfigSource, EnvSource};
	///
	/// let source = EnvSource::new("STABLEYARD_");
	/// assert_eq!(source.priority(), 100);
	/// ```
	pub fn new(prefix: impl Into<String>) -> Self {
		Self {
			prefix: prefix.into(),
			priority: 100,
		}
	}

	/// Overrides the default priority (100, above TOML files).
	pub fn with_priority(mut self, priority: u8) -> Self {
		self.priority = priority;
		self
	}
}

impl ConfigSource for EnvSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		let mut config = IndexMap::new();

		for (key, value) in std::env::vars() {
			let Some(clean_key) = key.strip_prefix(&self.prefix) else {
				continue;
			};
			let lower_key = clean_key.to_lowercase();
			let mut path = lower_key.split(NESTING_SEPARATOR);
			let Some(head) = path.next().filter(|h| !h.is_empty()) else {
				continue;
			};
			let rest: Vec<&str> = path.collect();
			let mut parsed = Value::String(value);
			for segment in rest.iter().rev() {
				let mut object = Map::new();
				object.insert((*segment).to_string(), parsed);
				parsed = Value::Object(object);
			}

			match config.get_mut(head) {
				Some(existing) => merge_value(existing, parsed),
				None => {
					config.insert(head.to_string(), parsed);
				}
			}
		}

		Ok(config)
	}

	fn priority(&self) -> u8 {
		self.priority
	}

	fn description(&self) -> String {
		format!("Environment variables (prefix: {})", self.prefix)
	}
}

/// TOML file configuration source. A missing file contributes nothing.
pub struct TomlFileSource {
	path: PathBuf,
}

impl TomlFileSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}

impl ConfigSource for TomlFileSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		if !self.path.exists() {
			return Ok(IndexMap::new());
		}

		let content = fs::read_to_string(&self.path)?;
		let toml_value: toml::Value = toml::from_str(&content)?;
		let json_value = serde_json::to_value(toml_value)?;

		let map = json_value
			.as_object()
			.ok_or_else(|| SourceError::Parse("Expected table at root".to_string()))?;

		Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
	}

	fn priority(&self) -> u8 {
		50
	}

	fn description(&self) -> String {
		format!("TOML file: {}", self.path.display())
	}
}

/// Default values configuration source
#[derive(Default)]
pub struct DefaultSource {
	values: IndexMap<String, Value>,
}

impl DefaultSource {
	pub fn new() -> Self {
		Self::default()
	}

	/// Add a default value for a configuration key
	///
	/// # Examples
	///
	/// ```
	/// use stableyard_conf::sources::DefaultSource;
	/// use serde_json::Value;
	///
	/// let source = DefaultSource::new()
	///     .with_value("debug", Value::Bool(false));
	/// ```
	pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
		self.values.insert(key.into(), value);
		self
	}

	/// Uses every field of a serialized struct as a default.
	pub fn from_serialize<T: Serialize>(defaults: &T) -> Result<Self, SourceError> {
		match serde_json::to_value(defaults)? {
			Value::Object(map) => Ok(Self {
				values: map.into_iter().collect(),
			}),
			_ => Err(SourceError::Parse("Expected a struct of defaults".to_string())),
		}
	}
}

impl ConfigSource for DefaultSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		Ok(self.values.clone())
	}

	fn priority(&self) -> u8 {
		0
	}

	fn description(&self) -> String {
		"Default values".to_string()
	}
}

/// Deep-merges `overlay` into `base`. Objects merge key by key, anything else
/// is replaced.
///
/// A string replacing a number or a boolean is converted to that type when it
/// parses as one; otherwise it is kept as is and fails typed deserialization.
pub fn merge_value(base: &mut Value, overlay: Value) {
	match (base, overlay) {
		(base, Value::String(text)) if matches!(base, Value::Number(_) | Value::Bool(_)) => {
			*base = coerce_like(base, &text).unwrap_or(Value::String(text));
		}
		(Value::Object(base_map), Value::Object(overlay_map)) => {
			for (key, value) in overlay_map {
				match base_map.get_mut(&key) {
					Some(existing) => merge_value(existing, value),
					None => {
						base_map.insert(key, value);
					}
				}
			}
		}
		(base, overlay) => *base = overlay,
	}
}

fn coerce_like(target: &Value, text: &str) -> Option<Value> {
	let text = text.trim();
	match target {
		Value::Bool(_) => parse_bool(text).map(Value::Bool),
		Value::Number(_) => text
			.parse::<i64>()
			.ok()
			.map(Number::from)
			.or_else(|| text.parse::<u64>().ok().map(Number::from))
			.or_else(|| text.parse::<f64>().ok().and_then(Number::from_f64))
			.map(Value::Number),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;
	use serial_test::serial;
	use std::env;
	use std::io::Write;
	use tempfile::TempDir;

	#[rstest]
	#[serial(env)]
	fn test_env_source_strips_prefix_and_nests() {
		// SAFETY: Setting environment variables is unsafe in multi-threaded programs.
		// This test uses #[serial] to ensure exclusive access to environment variables.
		unsafe {
			env::set_var("SYTEST_DEBUG", "yes");
			env::set_var("SYTEST_POOL__MAX_CONNECTIONS", "4");
			env::set_var("SYTEST_POOL__MIN_CONNECTIONS", "2");
			env::set_var("SYTEST_DATABASE_URL", "sqlite://stable.db");
		}

		let config = EnvSource::new("SYTEST_").load().unwrap();

		assert_eq!(config.get("debug"), Some(&json!("yes")));
		assert_eq!(
			config.get("pool"),
			Some(&json!({"max_connections": "4", "min_connections": "2"}))
		);
		assert_eq!(config.get("database_url"), Some(&json!("sqlite://stable.db")));

		// SAFETY: see above.
		unsafe {
			env::remove_var("SYTEST_DEBUG");
			env::remove_var("SYTEST_POOL__MAX_CONNECTIONS");
			env::remove_var("SYTEST_POOL__MIN_CONNECTIONS");
			env::remove_var("SYTEST_DATABASE_URL");
		}
	}

	#[rstest]
	fn test_toml_source_reads_tables() {
		let temp_dir = TempDir::new().unwrap();
		let path = temp_dir.path().join("base.toml");
		let mut file = fs::File::create(&path).unwrap();
		writeln!(
			file,
			r#"
debug = false

[booking]
conflict_policy = "exact_start"
"#
		)
		.unwrap();

		let config = TomlFileSource::new(&path).load().unwrap();
		assert_eq!(config.get("debug"), Some(&Value::Bool(false)));
		assert_eq!(
			config.get("booking"),
			Some(&json!({"conflict_policy": "exact_start"}))
		);
	}

	#[rstest]
	fn test_missing_toml_file_is_empty() {
		let source = TomlFileSource::new("/nonexistent/stableyard.toml");
		assert!(source.load().unwrap().is_empty());
	}

	#[rstest]
	#[case("on", Some(true))]
	#[case("0", Some(false))]
	#[case("maybe", None)]
	fn test_parse_bool(#[case] value: &str, #[case] expected: Option<bool>) {
		assert_eq!(parse_bool(value), expected);
	}

	#[rstest]
	#[case(json!(10), "4", json!(4))]
	#[case(json!(false), "yes", json!(true))]
	#[case(json!(0), "-90", json!(-90))]
	#[case(json!("sessionid"), "1234", json!("1234"))]
	#[case(json!(10), "many", json!("many"))]
	fn test_strings_take_the_type_they_replace(
		#[case] base: Value,
		#[case] text: &str,
		#[case] expected: Value,
	) {
		let mut merged = json!({ "key": base });
		merge_value(&mut merged, json!({ "key": text }));
		assert_eq!(merged["key"], expected);
	}

	#[rstest]
	fn test_merge_value_is_deep() {
		let mut base = json!({"pool": {"max_connections": 10, "min_connections": 1}});
		merge_value(&mut base, json!({"pool": {"max_connections": 3}}));
		assert_eq!(base, json!({"pool": {"max_connections": 3, "min_connections": 1}}));
	}
}
