//! Message parameters
//!
//! [`Params`] is a JSON object read by the [`Mailable`](crate::Mailable)
//! when it resolves fields that were not set explicitly. Parameters are
//! layered lowest to highest: [`Params::builtin`], the facade defaults and
//! the per-call parameters.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

pub const DEFAULT_SUBJECT: &str = "Test email";
pub const DEFAULT_LOCALE: &str = "en";
pub const DEFAULT_CHARSET: &str = "utf-8";

/// Ordered key/value message parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(Map<String, Value>);

impl Params {
	pub fn new() -> Self {
		Self(Map::new())
	}

	/// Wrap a JSON value. Anything other than an object yields empty params.
	pub fn from_value(value: Value) -> Self {
		match value {
			Value::Object(map) => Self(map),
			_ => Self::new(),
		}
	}

	/// Built-in defaults, with `css` holding the default stylesheet.
	pub fn builtin(css: impl Into<String>) -> Self {
		Self::from_value(json!({
			"to": [],
			"from": [],
			"reply-to": [],
			"bcc": [],
			"cc": [],
			"attachments": [],
			"html": true,
			"text": "",
			"datas": {},
			"subject": DEFAULT_SUBJECT,
			"locale": DEFAULT_LOCALE,
			"charset": DEFAULT_CHARSET,
			"encoding": "8bit",
			"content_type": "multipart/alternative",
			"css": css.into(),
			"inline_css": true,
			"viewer": {},
		}))
	}

	/// Look up a value, descending into objects on `.`.
	///
	/// A key containing a dot is matched literally first.
	///
	/// # Examples
	///
	/// ```
	/// use mailroom_mail::Params;
	/// use serde_json::json;
	///
	/// let params = Params::from_value(json!({"viewer": {"directory": "/srv/views"}}));
	/// assert_eq!(params.get("viewer.directory"), Some(&json!("/srv/views")));
	/// assert_eq!(params.get("viewer.override_dir"), None);
	/// ```
	pub fn get(&self, path: &str) -> Option<&Value> {
		if let Some(value) = self.0.get(path) {
			return Some(value);
		}
		let mut segments = path.split('.');
		let mut current = self.0.get(segments.next()?)?;
		for segment in segments {
			current = current.as_object()?.get(segment)?;
		}
		Some(current)
	}

	/// The value at `path` unless it is empty-ish (`null`, `false`, `0`, `""`, `[]`, `{}`).
	pub fn truthy(&self, path: &str) -> Option<&Value> {
		self.get(path).filter(|value| is_truthy(value))
	}

	/// Non-empty string at `path`.
	pub fn str(&self, path: &str) -> Option<&str> {
		self.truthy(path).and_then(Value::as_str)
	}

	pub fn bool(&self, path: &str) -> bool {
		self.truthy(path).is_some()
	}

	pub fn set(&mut self, key: impl Into<String>, value: Value) {
		self.0.insert(key.into(), value);
	}

	pub fn remove(&mut self, key: &str) -> Option<Value> {
		self.0.remove(key)
	}

	pub fn contains_key(&self, key: &str) -> bool {
		self.0.contains_key(key)
	}

	/// Overwrite keys with those of `other`, keeping the rest.
	pub fn merge(&mut self, other: &Params) {
		for (key, value) in &other.0 {
			self.0.insert(key.clone(), value.clone());
		}
	}

	/// `self` layered beneath `other`.
	pub fn merged(&self, other: &Params) -> Params {
		let mut merged = self.clone();
		merged.merge(other);
		merged
	}

	pub fn as_map(&self) -> &Map<String, Value> {
		&self.0
	}

	pub fn into_map(self) -> Map<String, Value> {
		self.0
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}
}

impl From<Map<String, Value>> for Params {
	fn from(map: Map<String, Value>) -> Self {
		Self(map)
	}
}

impl From<Params> for Value {
	fn from(params: Params) -> Self {
		Value::Object(params.0)
	}
}

impl FromIterator<(String, Value)> for Params {
	fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
		Self(iter.into_iter().collect())
	}
}

/// Loose truthiness of a JSON value.
pub fn is_truthy(value: &Value) -> bool {
	match value {
		Value::Null => false,
		Value::Bool(b) => *b,
		Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
		Value::String(s) => !s.is_empty() && s != "0",
		Value::Array(items) => !items.is_empty(),
		Value::Object(map) => !map.is_empty(),
	}
}
