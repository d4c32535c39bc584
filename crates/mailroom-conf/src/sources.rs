//! Configuration sources for layered mail settings
//!
//! Sources are merged in priority order
//! (environment variables > TOML files > defaults).

use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// Separator used by [`EnvSource`] to address nested keys
/// (`MAIL_VIEWER__DIRECTORY` -> `viewer.directory`).
pub const NESTED_KEY_SEPARATOR: &str = "__";

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

/// Environment variable configuration source
///
/// Keys are stripped of the prefix and lower-cased. A double underscore
/// splits a key into nested objects.
pub struct EnvSource {
	prefix: Option<String>,
}

impl EnvSource {
	/// Create a new environment variable configuration source
	///
	/// # Examples
	///
	/// ```
	/// use mailroom_conf::sources::EnvSource;
	///
	/// let source = EnvSource::new().with_prefix("MAIL_");
	/// ```
	pub fn new() -> Self {
		Self { prefix: None }
	}

	/// Set a prefix filter for environment variables
	pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.prefix = Some(prefix.into());
		self
	}

	fn parse_value(raw: String) -> Value {
		if let Ok(num) = raw.parse::<i64>() {
			Value::Number(num.into())
		} else if let Ok(b) = raw.trim().to_lowercase().parse::<bool>() {
			Value::Bool(b)
		} else {
			Value::String(raw)
		}
	}

	fn insert_nested(config: &mut IndexMap<String, Value>, key: &str, value: Value) {
		let mut parts = key.split(NESTED_KEY_SEPARATOR);
		let Some(head) = parts.next() else {
			return;
		};
		let rest: Vec<&str> = parts.collect();
		if rest.is_empty() {
			config.insert(head.to_string(), value);
			return;
		}

		let entry = config
			.entry(head.to_string())
			.or_insert_with(|| Value::Object(Default::default()));
		if !entry.is_object() {
			*entry = Value::Object(Default::default());
		}

		let mut cursor = entry;
		for (i, part) in rest.iter().enumerate() {
			let Value::Object(map) = cursor else {
				return;
			};
			if i == rest.len() - 1 {
				map.insert(part.to_string(), value);
				return;
			}
			let next = map
				.entry(part.to_string())
				.or_insert_with(|| Value::Object(Default::default()));
			if !next.is_object() {
				*next = Value::Object(Default::default());
			}
			cursor = next;
		}
	}
}

impl Default for EnvSource {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigSource for EnvSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		let mut config = IndexMap::new();

		for (key, value) in std::env::vars() {
			let clean_key = match &self.prefix {
				Some(prefix) => match key.strip_prefix(prefix.as_str()) {
					Some(stripped) => stripped,
					None => continue,
				},
				None => key.as_str(),
			};
			if clean_key.is_empty() {
				continue;
			}

			let lower_key = clean_key.to_lowercase();
			Self::insert_nested(&mut config, &lower_key, Self::parse_value(value));
		}

		Ok(config)
	}

	fn priority(&self) -> u8 {
		100
	}

	fn description(&self) -> String {
		match &self.prefix {
			Some(prefix) => format!("Environment variables (prefix: {})", prefix),
			None => "Environment variables".to_string(),
		}
	}
}

/// TOML file configuration source
///
/// A missing file loads as an empty map.
pub struct TomlFileSource {
	path: PathBuf,
}

impl TomlFileSource {
	/// Create a new TOML file configuration source
	///
	/// # Examples
	///
	/// ```
	/// use mailroom_conf::sources::TomlFileSource;
	///
	/// let source = TomlFileSource::new("mail.toml");
	/// ```
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
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
pub struct DefaultSource {
	values: IndexMap<String, Value>,
}

impl DefaultSource {
	/// Create an empty default values source
	///
	/// # Examples
	///
	/// ```
	/// use mailroom_conf::sources::DefaultSource;
	/// use serde_json::Value;
	///
	/// let source = DefaultSource::new()
	///     .with_value("backend", Value::String("memory".into()))
	///     .with_value("port", Value::Number(2525.into()));
	/// ```
	pub fn new() -> Self {
		Self {
			values: IndexMap::new(),
		}
	}

	/// Add a default value for a configuration key
	pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
		self.values.insert(key.into(), value);
		self
	}

	/// Add multiple default values from a HashMap
	pub fn with_defaults(mut self, defaults: HashMap<String, Value>) -> Self {
		self.values.extend(defaults);
		self
	}
}

impl Default for DefaultSource {
	fn default() -> Self {
		Self::new()
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

/// Merge `incoming` into `base`, recursing into objects present on both sides.
pub fn merge_value(base: &mut Value, incoming: Value) {
	match (base, incoming) {
		(Value::Object(base_map), Value::Object(incoming_map)) => {
			for (key, value) in incoming_map {
				match base_map.get_mut(&key) {
					Some(existing) => merge_value(existing, value),
					None => {
						base_map.insert(key, value);
					}
				}
			}
		}
		(slot, value) => *slot = value,
	}
}
