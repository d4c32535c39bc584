//! Mail settings

use crate::sources::{ConfigSource, DefaultSource, EnvSource, TomlFileSource, merge_value};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Prefix of the environment variables read by [`MailSettings::load`].
pub const ENV_PREFIX: &str = "MAIL_";

/// Which resolved body the `text/html` projection hands to the driver.
///
/// Historically the html part of a `text/html` message was filled with the
/// resolved *text* body. `Text` keeps that behaviour; `Html` uses the
/// resolved html body instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HtmlBodySource {
	#[default]
	Text,
	Html,
}

impl HtmlBodySource {
	/// Parse a parameter value, `None` for anything unrecognised.
	pub fn parse(value: &str) -> Option<Self> {
		match value.trim().to_ascii_lowercase().as_str() {
			"text" => Some(Self::Text),
			"html" => Some(Self::Html),
			_ => None,
		}
	}
}

/// Default view directories used when a message does not name its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerSettings {
	#[serde(deserialize_with = "scalar::optional_path")]
	pub directory: Option<PathBuf>,
	#[serde(deserialize_with = "scalar::optional_path")]
	pub override_dir: Option<PathBuf>,
}

/// Mail settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailSettings {
	/// Delivery backend: `smtp`, `file`, `console` or `memory`
	#[serde(deserialize_with = "scalar::string")]
	pub backend: String,
	#[serde(deserialize_with = "scalar::string")]
	pub host: String,
	pub port: u16,
	#[serde(deserialize_with = "scalar::optional_string")]
	pub username: Option<String>,
	#[serde(deserialize_with = "scalar::optional_string")]
	pub password: Option<String>,
	/// STARTTLS upgrade on a plain connection
	pub use_tls: bool,
	/// Implicit TLS from the first byte
	pub use_ssl: bool,

	/// Connection timeout in seconds
	pub timeout: Option<u64>,

	/// Directory path for the file backend.
	/// Required when backend is "file".
	#[serde(deserialize_with = "scalar::optional_path")]
	pub file_path: Option<PathBuf>,

	/// Base resource directory (stylesheet and default views).
	/// `None` selects the resources shipped with the mail crate.
	#[serde(deserialize_with = "scalar::optional_path")]
	pub resources_dir: Option<PathBuf>,

	pub viewer: ViewerSettings,

	pub html_body_source: HtmlBodySource,

	/// Facade-level default message parameters
	pub defaults: Map<String, Value>,
}

impl Default for MailSettings {
	fn default() -> Self {
		Self {
			backend: "console".to_string(),
			host: "localhost".to_string(),
			port: 25,
			username: None,
			password: None,
			use_tls: false,
			use_ssl: false,
			timeout: None,
			file_path: None,
			resources_dir: None,
			viewer: ViewerSettings::default(),
			html_body_source: HtmlBodySource::default(),
			defaults: Map::new(),
		}
	}
}

impl MailSettings {
	/// Settings for the in-memory backend, mostly useful in tests.
	pub fn memory() -> Self {
		Self {
			backend: "memory".to_string(),
			..Self::default()
		}
	}

	/// Merge the given sources by ascending priority and deserialize the result.
	///
	/// Keys missing from every source keep their [`Default`] value.
	///
	/// # Examples
	///
	/// ```
	/// use mailroom_conf::MailSettings;
	/// use mailroom_conf::sources::{ConfigSource, DefaultSource};
	/// use serde_json::json;
	///
	/// let sources: Vec<Box<dyn ConfigSource>> = vec![Box::new(
	///     DefaultSource::new().with_value("backend", json!("memory")),
	/// )];
	/// let settings = MailSettings::from_sources(sources).unwrap();
	/// assert_eq!(settings.backend, "memory");
	/// assert_eq!(settings.port, 25);
	/// ```
	pub fn from_sources(
		mut sources: Vec<Box<dyn ConfigSource>>,
	) -> Result<Self, SettingsError> {
		sources.sort_by_key(|source| source.priority());

		let mut merged = Value::Object(Map::new());
		for source in &sources {
			let values = source
				.load()
				.map_err(|e| SettingsError::Source(source.description(), e.to_string()))?;
			let incoming: Map<String, Value> = values.into_iter().collect();
			merge_value(&mut merged, Value::Object(incoming));
		}

		serde_json::from_value(merged).map_err(SettingsError::from)
	}

	/// Built-in defaults, then `path` (TOML), then `MAIL_*` environment variables.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
		Self::from_sources(vec![
			Box::new(DefaultSource::new()),
			Box::new(TomlFileSource::new(path.as_ref())),
			Box::new(EnvSource::new().with_prefix(ENV_PREFIX)),
		])
	}

	/// Check the combination of settings required by the selected backend.
	pub fn validate(&self) -> Result<(), SettingsError> {
		match self.backend.as_str() {
			"smtp" => {
				if self.host.trim().is_empty() {
					return Err(SettingsError::Validation(
						"smtp backend requires a host".to_string(),
					));
				}
				if self.use_tls && self.use_ssl {
					return Err(SettingsError::Validation(
						"use_tls and use_ssl are mutually exclusive".to_string(),
					));
				}
				Ok(())
			}
			"file" => match &self.file_path {
				Some(_) => Ok(()),
				None => Err(SettingsError::Validation(
					"file backend requires file_path".to_string(),
				)),
			},
			"console" | "memory" => Ok(()),
			other => Err(SettingsError::Validation(format!(
				"unknown mail backend: {}",
				other
			))),
		}
	}
}

/// Lenient deserializers for text fields.
///
/// Environment sources type numeric and boolean looking values, so a
/// password such as `123456` arrives as a number.
mod scalar {
	use serde::de::{Deserializer, Error};
	use serde::Deserialize;
	use serde_json::Value;
	use std::path::PathBuf;

	fn text<E: Error>(value: Value) -> Result<Option<String>, E> {
		match value {
			Value::Null => Ok(None),
			Value::String(s) => Ok(Some(s)),
			Value::Number(n) => Ok(Some(n.to_string())),
			Value::Bool(b) => Ok(Some(b.to_string())),
			other => Err(E::custom(format!("expected a string, found {}", other))),
		}
	}

	pub(super) fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
		text(Value::deserialize(deserializer)?)?
			.ok_or_else(|| D::Error::custom("expected a string, found null"))
	}

	pub(super) fn optional_string<'de, D: Deserializer<'de>>(
		deserializer: D,
	) -> Result<Option<String>, D::Error> {
		text(Value::deserialize(deserializer)?)
	}

	pub(super) fn optional_path<'de, D: Deserializer<'de>>(
		deserializer: D,
	) -> Result<Option<PathBuf>, D::Error> {
		Ok(text(Value::deserialize(deserializer)?)?.map(PathBuf::from))
	}
}

/// Settings error
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
	#[error("Source error ({0}): {1}")]
	Source(String, String),

	#[error("Parse error: {0}")]
	Parse(#[from] serde_json::Error),

	#[error("Validation error: {0}")]
	Validation(String),
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_default_settings() {
		// Arrange / Act
		let settings = MailSettings::default();

		// Assert
		assert_eq!(settings.backend, "console");
		assert_eq!(settings.port, 25);
		assert_eq!(settings.html_body_source, HtmlBodySource::Text);
		assert!(settings.defaults.is_empty());
		assert!(settings.validate().is_ok());
	}

	#[rstest]
	#[case("text", Some(HtmlBodySource::Text))]
	#[case(" HTML ", Some(HtmlBodySource::Html))]
	#[case("markdown", None)]
	fn test_html_body_source_parse(#[case] raw: &str, #[case] expected: Option<HtmlBodySource>) {
		// Act / Assert
		assert_eq!(HtmlBodySource::parse(raw), expected);
	}

	#[rstest]
	fn test_validate_rejects_tls_and_ssl_together() {
		// Arrange
		let settings = MailSettings {
			backend: "smtp".to_string(),
			use_tls: true,
			use_ssl: true,
			..MailSettings::default()
		};

		// Act
		let result = settings.validate();

		// Assert
		assert!(matches!(result, Err(SettingsError::Validation(_))));
	}

	#[rstest]
	fn test_validate_file_backend_requires_path() {
		// Arrange
		let settings = MailSettings {
			backend: "file".to_string(),
			..MailSettings::default()
		};

		// Act / Assert
		assert!(settings.validate().is_err());
	}

	#[rstest]
	fn test_validate_unknown_backend() {
		// Arrange
		let settings = MailSettings {
			backend: "pigeon".to_string(),
			..MailSettings::default()
		};

		// Act / Assert
		assert!(settings.validate().is_err());
	}
}
