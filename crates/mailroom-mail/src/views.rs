//! View engines rendering named mail templates
//!
//! Mail bodies are rendered from named templates (`html/message`,
//! `html/body`, `html/header`, `html/footer`, `text/message`, `debug`).
//! [`TeraViewEngine`] loads them from a view directory on disk, with an
//! optional override directory. [`StringViewEngine`] keeps them in memory.

use crate::{MailError, MailResult};
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tera::Tera;

/// Context for template rendering
pub type TemplateContext = HashMap<String, Value>;

/// Trait for view engines
pub trait ViewEngine: Send + Sync {
	/// Render the template registered under `name`
	fn render(&self, name: &str, context: &TemplateContext) -> MailResult<String>;
}

/// Tera backed view engine over a view directory.
///
/// Every file below the directory is registered under its relative path
/// without extension, so `html/message.html` renders as `html/message`.
/// Autoescaping is disabled: body slots carry html.
pub struct TeraViewEngine {
	tera: Tera,
	directory: PathBuf,
}

impl TeraViewEngine {
	/// Load every template below `directory`.
	///
	/// # Examples
	///
	/// ```rust,no_run
	/// use mailroom_mail::TeraViewEngine;
	/// use std::path::Path;
	///
	/// let engine = TeraViewEngine::new(Path::new("/srv/mail/views"), None).unwrap();
	/// ```
	pub fn new(directory: &Path, override_dir: Option<&Path>) -> MailResult<Self> {
		if !directory.is_dir() {
			return Err(MailError::Config(format!(
				"view directory is not accessible: {}",
				directory.display()
			)));
		}

		let mut templates = BTreeMap::new();
		collect_templates(directory, directory, &mut templates)?;
		if let Some(override_dir) = override_dir.filter(|dir| dir.is_dir()) {
			collect_templates(override_dir, override_dir, &mut templates)?;
		}

		let mut tera = Tera::default();
		tera.autoescape_on(vec![]);
		tera.add_raw_templates(templates)?;

		tracing::debug!(
			directory = %directory.display(),
			templates = tera.get_template_names().count(),
			"loaded mail views"
		);

		Ok(Self {
			tera,
			directory: directory.to_path_buf(),
		})
	}

	pub fn directory(&self) -> &Path {
		&self.directory
	}

	pub fn has_template(&self, name: &str) -> bool {
		self.tera.get_template_names().any(|n| n == name)
	}
}

impl ViewEngine for TeraViewEngine {
	fn render(&self, name: &str, context: &TemplateContext) -> MailResult<String> {
		let context = tera::Context::from_serialize(context)?;
		Ok(self.tera.render(name, &context)?)
	}
}

fn collect_templates(
	root: &Path,
	dir: &Path,
	templates: &mut BTreeMap<String, String>,
) -> MailResult<()> {
	for entry in fs::read_dir(dir)? {
		let path = entry?.path();
		if path.is_dir() {
			collect_templates(root, &path, templates)?;
			continue;
		}
		if let Some(name) = template_name(root, &path) {
			templates.insert(name, fs::read_to_string(&path)?);
		}
	}
	Ok(())
}

fn template_name(root: &Path, path: &Path) -> Option<String> {
	let relative = path.strip_prefix(root).ok()?.with_extension("");
	let segments: Vec<String> = relative
		.components()
		.map(|c| c.as_os_str().to_string_lossy().into_owned())
		.collect();
	if segments.is_empty() || segments.iter().any(|s| s.starts_with('.')) {
		return None;
	}
	Some(segments.join("/"))
}

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"\{\{\{\s*([\w.-]+)\s*\}\}\}|\{\{\s*([\w.-]+)\s*\}\}")
		.expect("placeholder pattern is valid")
});

/// In-memory view engine with `{{key}}` substitution.
///
/// Values rendered into templates under `html/` are HTML-escaped unless the
/// placeholder uses triple braces (`{{{body}}}`). Unknown keys render empty.
///
/// # Examples
///
/// ```
/// use mailroom_mail::{StringViewEngine, TemplateContext, ViewEngine};
///
/// let engine = StringViewEngine::new()
///     .with_template("html/message", "<p>{{name}}</p>{{{body}}}");
///
/// let mut context = TemplateContext::new();
/// context.insert("name".to_string(), "<Alice>".into());
/// context.insert("body".to_string(), "<b>hi</b>".into());
///
/// let html = engine.render("html/message", &context).unwrap();
/// assert_eq!(html, "<p>&lt;Alice&gt;</p><b>hi</b>");
/// ```
#[derive(Debug, Clone, Default)]
pub struct StringViewEngine {
	templates: HashMap<String, String>,
}

impl StringViewEngine {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_template(mut self, name: impl Into<String>, template: impl Into<String>) -> Self {
		self.templates.insert(name.into(), template.into());
		self
	}

	pub fn insert(&mut self, name: impl Into<String>, template: impl Into<String>) {
		self.templates.insert(name.into(), template.into());
	}
}

impl ViewEngine for StringViewEngine {
	fn render(&self, name: &str, context: &TemplateContext) -> MailResult<String> {
		let template = self
			.templates
			.get(name)
			.ok_or_else(|| MailError::Template(format!("template not found: {}", name)))?;
		let escape = name.starts_with("html/");

		let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| {
			let (key, raw) = match (caps.get(1), caps.get(2)) {
				(Some(key), _) => (key.as_str(), true),
				(None, Some(key)) => (key.as_str(), false),
				(None, None) => return String::new(),
			};
			let value = context.get(key).map(value_to_string).unwrap_or_default();
			if escape && !raw {
				html_escape::encode_safe(&value).into_owned()
			} else {
				value
			}
		});

		Ok(rendered.into_owned())
	}
}

fn value_to_string(value: &Value) -> String {
	match value {
		Value::String(s) => s.clone(),
		Value::Number(n) => n.to_string(),
		Value::Bool(b) => b.to_string(),
		Value::Null => String::new(),
		Value::Array(items) => items
			.iter()
			.map(value_to_string)
			.collect::<Vec<_>>()
			.join(", "),
		Value::Object(_) => value.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	fn context(pairs: &[(&str, Value)]) -> TemplateContext {
		pairs
			.iter()
			.map(|(k, v)| (k.to_string(), v.clone()))
			.collect()
	}

	#[rstest]
	fn test_string_engine_escapes_html_templates() {
		// Arrange
		let engine = StringViewEngine::new()
			.with_template("html/body", "<p>{{name}}</p>")
			.with_template("text/message", "Hello {{name}}");
		let ctx = context(&[("name", json!("<b>Bob & co"))]);

		// Act
		let html = engine.render("html/body", &ctx).unwrap();
		let text = engine.render("text/message", &ctx).unwrap();

		// Assert
		assert_eq!(html, "<p>&lt;b&gt;Bob &amp; co</p>");
		assert_eq!(text, "Hello <b>Bob & co");
	}

	#[rstest]
	fn test_string_engine_scalars_and_missing_keys() {
		// Arrange
		let engine = StringViewEngine::new()
			.with_template("text/message", "{{ count }} items, active={{active}}, {{missing}}end");
		let ctx = context(&[("count", json!(3)), ("active", json!(true))]);

		// Act
		let text = engine.render("text/message", &ctx).unwrap();

		// Assert
		assert_eq!(text, "3 items, active=true, end");
	}

	#[rstest]
	fn test_string_engine_unknown_template() {
		// Act
		let result = StringViewEngine::new().render("html/message", &TemplateContext::new());

		// Assert
		assert!(matches!(result, Err(MailError::Template(_))));
	}

	#[rstest]
	fn test_template_name_strips_extension() {
		// Arrange
		let root = Path::new("/views");

		// Act / Assert
		assert_eq!(
			template_name(root, Path::new("/views/html/message.html")).as_deref(),
			Some("html/message")
		);
		assert_eq!(
			template_name(root, Path::new("/views/debug.html")).as_deref(),
			Some("debug")
		);
		assert_eq!(template_name(root, Path::new("/views/.hidden/x.html")), None);
	}

	#[rstest]
	fn test_tera_engine_missing_directory() {
		// Act
		let result = TeraViewEngine::new(Path::new("/nonexistent/views"), None);

		// Assert
		assert!(matches!(result, Err(MailError::Config(_))));
	}

	#[rstest]
	fn test_tera_engine_override_replaces_templates() {
		// Arrange
		let base = tempfile::tempdir().unwrap();
		let custom = tempfile::tempdir().unwrap();
		fs::create_dir_all(base.path().join("html")).unwrap();
		fs::create_dir_all(custom.path().join("html")).unwrap();
		fs::write(base.path().join("html/body.html"), "base {{ name }}").unwrap();
		fs::write(base.path().join("html/footer.html"), "footer").unwrap();
		fs::write(custom.path().join("html/body.html"), "custom {{ name }}").unwrap();
		let engine = TeraViewEngine::new(base.path(), Some(custom.path())).unwrap();
		let ctx = context(&[("name", json!("<i>Ann</i>"))]);

		// Act
		let body = engine.render("html/body", &ctx).unwrap();
		let footer = engine.render("html/footer", &ctx).unwrap();

		// Assert
		assert_eq!(body, "custom <i>Ann</i>");
		assert_eq!(footer, "footer");
		assert!(engine.has_template("html/body"));
	}
}
