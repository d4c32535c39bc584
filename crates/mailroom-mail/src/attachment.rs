//! Attachment parsing
//!
//! An attachment is a path to an existing file, optionally accompanied by a
//! display name, a MIME type and a transfer encoding:
//!
//! - `"/path/to/file.pdf"`
//! - `["/path/to/file.pdf", "report.pdf", "application/pdf", "base64"]`
//! - `{"path": "/path/to/file.pdf", "name": "report.pdf"}`
//! - a list of any of the above
//!
//! Paths are checked once, when parsed. Entries pointing to missing files
//! are dropped.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// A file attachment validated to exist at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
	path: PathBuf,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	mime_type: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	encoding: Option<String>,
}

impl AttachmentRef {
	/// Reference an existing file, `None` when the path is not a regular file.
	pub fn new(path: impl AsRef<Path>) -> Option<Self> {
		let path = path.as_ref();
		if !path.is_file() {
			return None;
		}
		Some(Self {
			path: path.to_path_buf(),
			name: None,
			mime_type: None,
			encoding: None,
		})
	}

	pub fn with_name(mut self, name: impl Into<String>) -> Self {
		self.name = Some(name.into()).filter(|n| !n.is_empty());
		self
	}

	pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
		self.mime_type = Some(mime_type.into()).filter(|m| !m.is_empty());
		self
	}

	pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
		self.encoding = Some(encoding.into()).filter(|e| !e.is_empty());
		self
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn name(&self) -> Option<&str> {
		self.name.as_deref()
	}

	pub fn mime_type(&self) -> Option<&str> {
		self.mime_type.as_deref()
	}

	pub fn encoding(&self) -> Option<&str> {
		self.encoding.as_deref()
	}

	/// Name shown to the recipient, the file name unless one was given.
	pub fn display_name(&self) -> String {
		match &self.name {
			Some(name) => name.clone(),
			None => self
				.path
				.file_name()
				.map(|n| n.to_string_lossy().into_owned())
				.unwrap_or_else(|| "attachment".to_string()),
		}
	}

	/// Explicit MIME type, or a guess from the display name's extension.
	pub fn content_type(&self) -> String {
		match &self.mime_type {
			Some(mime) => mime.clone(),
			None => detect_mime_type(&self.display_name()),
		}
	}
}

fn detect_mime_type(filename: &str) -> String {
	mime_guess::from_path(filename)
		.first()
		.map(|mime| mime.to_string())
		.unwrap_or_else(|| "application/octet-stream".to_string())
}

/// Normalize an attachment value, keeping entries whose file exists.
///
/// # Examples
///
/// ```
/// use mailroom_mail::attachment::parse_attachments;
/// use serde_json::json;
///
/// assert!(parse_attachments(&json!("/nonexistent/path")).is_empty());
/// ```
pub fn parse_attachments(spec: &Value) -> Vec<AttachmentRef> {
	collect_attachments(spec, Vec::new())
}

fn collect_attachments(spec: &Value, mut acc: Vec<AttachmentRef>) -> Vec<AttachmentRef> {
	match spec {
		Value::String(path) => {
			if let Some(attachment) = AttachmentRef::new(path) {
				acc.push(attachment);
			}
			acc
		}
		Value::Array(items) => items.iter().fold(acc, |mut acc, item| match item {
			Value::Array(tuple) => {
				if let Some(attachment) = from_tuple(tuple) {
					acc.push(attachment);
				}
				acc
			}
			other => collect_attachments(other, acc),
		}),
		Value::Object(map) => {
			let attachment = map
				.get("path")
				.and_then(Value::as_str)
				.and_then(AttachmentRef::new)
				.map(|attachment| {
					apply_extras(
						attachment,
						map.get("name").and_then(Value::as_str),
						map.get("mime_type").and_then(Value::as_str),
						map.get("encoding").and_then(Value::as_str),
					)
				});
			acc.extend(attachment);
			acc
		}
		_ => acc,
	}
}

fn from_tuple(tuple: &[Value]) -> Option<AttachmentRef> {
	let attachment = tuple.first()?.as_str().and_then(AttachmentRef::new)?;
	let field = |i: usize| tuple.get(i).and_then(Value::as_str);
	Some(apply_extras(attachment, field(1), field(2), field(3)))
}

fn apply_extras(
	mut attachment: AttachmentRef,
	name: Option<&str>,
	mime_type: Option<&str>,
	encoding: Option<&str>,
) -> AttachmentRef {
	if let Some(name) = name {
		attachment = attachment.with_name(name);
	}
	if let Some(mime_type) = mime_type {
		attachment = attachment.with_mime_type(mime_type);
	}
	if let Some(encoding) = encoding {
		attachment = attachment.with_encoding(encoding);
	}
	attachment
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("report.pdf", "application/pdf")]
	#[case("image.png", "image/png")]
	#[case("notes.txt", "text/plain")]
	#[case("unknown.zzzz", "application/octet-stream")]
	fn test_detect_mime_type(#[case] filename: &str, #[case] expected: &str) {
		assert_eq!(detect_mime_type(filename), expected);
	}

	#[rstest]
	fn test_missing_path_is_dropped() {
		assert!(AttachmentRef::new("/nonexistent/path").is_none());
		assert!(parse_attachments(&serde_json::json!("/nonexistent/path")).is_empty());
	}

	#[rstest]
	fn test_directory_is_not_an_attachment() {
		// Arrange
		let dir = tempfile::tempdir().unwrap();

		// Act / Assert
		assert!(AttachmentRef::new(dir.path()).is_none());
	}
}
