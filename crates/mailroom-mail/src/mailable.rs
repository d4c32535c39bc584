//! Message builder
//!
//! A [`Mailable`] holds message parameters plus explicitly set fields and
//! resolves them once, on the first [`build`](Mailable::build):
//!
//! 1. every field not set explicitly is read from the layered parameters
//!    (built-in defaults, context defaults, the mailable's own parameters);
//! 2. the html body comes from the explicit value, a `content` object
//!    assembled from the `html/body`, `html/header` and `html/footer` views,
//!    an `html` string parameter, the `text` parameter or the
//!    `html/message` view, in that order. Html without a `<head>` is
//!    wrapped into `html/message`;
//! 3. the text body falls back to a plain text rendering of the html;
//! 4. the stylesheet is inlined into the html when `inline_css` is set;
//! 5. the resolved state is handed over to the driver.
//!
//! After the first build the mailable is frozen: further builds return
//! immediately and setters are ignored.

use crate::attachment::{AttachmentRef, parse_attachments};
use crate::contact::{Contact, linearize_contacts, parse_contacts};
use crate::context::{DEFAULT_VIEWS, MailContext};
use crate::driver::{MailerDriver, SharedDriver};
use crate::html::{has_html_head, html_to_text, inline_css};
use crate::params::{DEFAULT_LOCALE, Params, is_truthy};
use crate::queue::QueueId;
use crate::types::{ContentType, Encoding};
use crate::views::{TemplateContext, TeraViewEngine, ViewEngine};
use crate::{MailError, MailResult};
use chrono::{DateTime, Utc};
use mailroom_conf::HtmlBodySource;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Slots of the `content` parameter and their default views
const CONTENT_SLOTS: [(&str, &str); 3] = [
	("body", "html/body"),
	("header", "html/header"),
	("footer", "html/footer"),
];

/// Message builder
///
/// # Examples
///
/// ```
/// use mailroom_conf::MailSettings;
/// use mailroom_mail::{MailContext, Mailable, MailerDriver};
///
/// let context = MailContext::new(MailSettings::memory()).unwrap();
/// let mut mailable = Mailable::new();
/// mailable
///     .set_from("b@x.com")
///     .set_to("a@x.com")
///     .set_subject("Hi")
///     .set_text("Hello");
///
/// assert!(mailable.send(&context).unwrap());
/// let sent = context.outbox().unwrap().last().unwrap();
/// assert_eq!(sent.text.as_deref(), Some("Hello"));
/// assert!(sent.html.unwrap().contains("<head"));
/// ```
#[derive(Default)]
pub struct Mailable {
	params: Params,
	resolved_params: Params,
	from: Option<Contact>,
	to: Option<Vec<Contact>>,
	cc: Option<Vec<Contact>>,
	bcc: Option<Vec<Contact>>,
	reply_to: Option<Vec<Contact>>,
	attachments: Option<Vec<AttachmentRef>>,
	locale: Option<String>,
	charset: Option<String>,
	encoding: Option<Encoding>,
	content_type: Option<ContentType>,
	subject: Option<String>,
	html: Option<String>,
	text: Option<String>,
	css: Option<String>,
	inline_css: Option<bool>,
	html_body_source: Option<HtmlBodySource>,
	datas: Map<String, Value>,
	built: bool,
	driver: Option<SharedDriver>,
	view_engine: Option<Arc<dyn ViewEngine>>,
}

impl Mailable {
	pub fn new() -> Self {
		Self::default()
	}

	/// Mailable reading unset fields from `params`.
	pub fn with_params(params: Params) -> Self {
		Self {
			params,
			..Self::default()
		}
	}

	/// Parameters given to this mailable (without the lower layers)
	pub fn params(&self) -> &Params {
		&self.params
	}

	pub fn is_built(&self) -> bool {
		self.built
	}

	fn writable(&self, field: &str) -> bool {
		if self.built {
			tracing::warn!(field, "mailable already built, setter ignored");
		}
		!self.built
	}

	/// Sender. The first valid contact of `spec` wins.
	pub fn set_from(&mut self, spec: impl Into<Value>) -> &mut Self {
		if self.writable("from") {
			self.from = parse_contacts(&spec.into()).and_then(|c| c.into_iter().next());
		}
		self
	}

	pub fn set_to(&mut self, spec: impl Into<Value>) -> &mut Self {
		if self.writable("to") {
			self.to = parse_contacts(&spec.into());
		}
		self
	}

	pub fn set_cc(&mut self, spec: impl Into<Value>) -> &mut Self {
		if self.writable("cc") {
			self.cc = parse_contacts(&spec.into());
		}
		self
	}

	pub fn set_bcc(&mut self, spec: impl Into<Value>) -> &mut Self {
		if self.writable("bcc") {
			self.bcc = parse_contacts(&spec.into());
		}
		self
	}

	pub fn set_reply_to(&mut self, spec: impl Into<Value>) -> &mut Self {
		if self.writable("reply_to") {
			self.reply_to = parse_contacts(&spec.into());
		}
		self
	}

	pub fn set_attachments(&mut self, spec: impl Into<Value>) -> &mut Self {
		if self.writable("attachments") {
			self.attachments = Some(parse_attachments(&spec.into()));
		}
		self
	}

	pub fn set_html(&mut self, html: impl Into<String>) -> &mut Self {
		if self.writable("html") {
			self.html = Some(html.into());
		}
		self
	}

	pub fn set_text(&mut self, text: impl Into<String>) -> &mut Self {
		if self.writable("text") {
			self.text = Some(text.into());
		}
		self
	}

	pub fn set_css(&mut self, css: impl Into<String>) -> &mut Self {
		if self.writable("css") {
			self.css = Some(css.into());
		}
		self
	}

	pub fn set_inline_css(&mut self, inline_css: bool) -> &mut Self {
		if self.writable("inline_css") {
			self.inline_css = Some(inline_css);
		}
		self
	}

	pub fn set_subject(&mut self, subject: impl Into<String>) -> &mut Self {
		if self.writable("subject") {
			self.subject = Some(subject.into());
		}
		self
	}

	pub fn set_charset(&mut self, charset: impl Into<String>) -> &mut Self {
		if self.writable("charset") {
			self.charset = Some(charset.into());
		}
		self
	}

	/// Unknown encodings coerce to `8bit`.
	pub fn set_encoding(&mut self, encoding: &str) -> &mut Self {
		if self.writable("encoding") {
			self.encoding = Some(Encoding::parse(encoding));
		}
		self
	}

	/// Unknown content types coerce to `multipart/alternative`.
	pub fn set_content_type(&mut self, content_type: &str) -> &mut Self {
		if self.writable("content_type") {
			self.content_type = Some(ContentType::parse(content_type));
		}
		self
	}

	pub fn set_locale(&mut self, locale: impl Into<String>) -> &mut Self {
		if self.writable("locale") {
			self.locale = Some(locale.into());
		}
		self
	}

	/// Which body the `text/html` projection hands to the driver.
	pub fn set_html_body_source(&mut self, source: HtmlBodySource) -> &mut Self {
		if self.writable("html_body_source") {
			self.html_body_source = Some(source);
		}
		self
	}

	/// Use `driver` instead of the context's shared driver.
	pub fn set_mailer(&mut self, driver: SharedDriver) -> &mut Self {
		if self.writable("mailer") {
			self.driver = Some(driver);
		}
		self
	}

	pub fn set_view_engine(&mut self, engine: Arc<dyn ViewEngine>) -> &mut Self {
		self.view_engine = Some(engine);
		self
	}

	/// Add a template variable, replacing a previous value of the same key.
	pub fn data(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
		if self.writable("datas") {
			self.datas.insert(key.into(), value.into());
		}
		self
	}

	/// Add every entry of `values` as template variables.
	pub fn data_map(&mut self, values: Map<String, Value>) -> &mut Self {
		if self.writable("datas") {
			self.datas.extend(values);
		}
		self
	}

	pub fn datas(&self) -> &Map<String, Value> {
		&self.datas
	}

	pub fn from_contact(&self) -> Option<&Contact> {
		self.from.as_ref()
	}

	pub fn to(&self) -> &[Contact] {
		self.to.as_deref().unwrap_or_default()
	}

	pub fn cc(&self) -> &[Contact] {
		self.cc.as_deref().unwrap_or_default()
	}

	pub fn bcc(&self) -> &[Contact] {
		self.bcc.as_deref().unwrap_or_default()
	}

	pub fn reply_to(&self) -> &[Contact] {
		self.reply_to.as_deref().unwrap_or_default()
	}

	pub fn attachments(&self) -> &[AttachmentRef] {
		self.attachments.as_deref().unwrap_or_default()
	}

	pub fn subject(&self) -> Option<&str> {
		self.subject.as_deref()
	}

	pub fn html(&self) -> Option<&str> {
		self.html.as_deref()
	}

	pub fn text(&self) -> Option<&str> {
		self.text.as_deref()
	}

	pub fn css(&self) -> Option<&str> {
		self.css.as_deref()
	}

	pub fn inline_css(&self) -> Option<bool> {
		self.inline_css
	}

	pub fn charset(&self) -> Option<&str> {
		self.charset.as_deref()
	}

	pub fn encoding(&self) -> Option<Encoding> {
		self.encoding
	}

	pub fn content_type(&self) -> Option<ContentType> {
		self.content_type
	}

	pub fn locale(&self) -> &str {
		self.locale.as_deref().unwrap_or(DEFAULT_LOCALE)
	}

	/// Driver the mailable was projected onto
	pub fn driver(&self) -> Option<&SharedDriver> {
		self.driver.as_ref()
	}

	/// Resolve every field and project the result onto the driver, once.
	pub fn build(&mut self, ctx: &MailContext) -> MailResult<&mut Self> {
		if self.built {
			return Ok(self);
		}

		let mut params = ctx.builtin_params()?.merged(ctx.defaults());
		params.merge(&self.params);
		params.set("datas", Value::Object(layered_datas(ctx, &self.params)));
		self.resolved_params = params;

		tracing::debug!(params = self.params.len(), "building mailable");
		self.resolve_fields();
		self.resolve_bodies(ctx)?;
		self.project(ctx)?;
		self.built = true;

		tracing::debug!(
			to = self.to().len(),
			cc = self.cc().len(),
			bcc = self.bcc().len(),
			attachments = self.attachments().len(),
			content_type = %self.content_type.unwrap_or_default(),
			"mailable built"
		);
		Ok(self)
	}

	fn resolve_fields(&mut self) {
		let params = &self.resolved_params;

		if self.from.is_none() {
			self.from = params
				.truthy("from")
				.and_then(parse_contacts)
				.and_then(|c| c.into_iter().next());
		}
		if self.to.is_none() {
			self.to = params.truthy("to").and_then(parse_contacts);
		}
		if self.reply_to.is_none() {
			self.reply_to = params
				.truthy("reply-to")
				.or_else(|| params.truthy("reply_to"))
				.and_then(parse_contacts);
		}
		if self.bcc.is_none() {
			self.bcc = params.truthy("bcc").and_then(parse_contacts);
		}
		if self.cc.is_none() {
			self.cc = params.truthy("cc").and_then(parse_contacts);
		}
		if self.attachments.is_none() {
			self.attachments = params.truthy("attachments").map(parse_attachments);
		}
		if self.locale.is_none() {
			self.locale = params.str("locale").map(str::to_string);
		}
		if self.charset.is_none() {
			self.charset = params.str("charset").map(str::to_string);
		}
		if self.encoding.is_none() {
			self.encoding = params.str("encoding").map(Encoding::parse);
		}
		if self.content_type.is_none() {
			self.content_type = params.str("content_type").map(ContentType::parse);
		}
		if self.subject.is_none() {
			self.subject = params.str("subject").map(str::to_string);
		}
		if self.html_body_source.is_none() {
			self.html_body_source = params.str("html_body_source").and_then(HtmlBodySource::parse);
		}
		if self.inline_css.is_none() {
			self.inline_css = Some(params.bool("inline_css"));
		}
		if self.css.is_none() {
			self.css = params.str("css").map(str::to_string);
		}

		if let Some(Value::Object(datas)) = params.get("datas") {
			for (key, value) in datas {
				if !self.datas.contains_key(key) {
					self.datas.insert(key.clone(), value.clone());
				}
			}
		}
	}

	fn resolve_bodies(&mut self, ctx: &MailContext) -> MailResult<()> {
		let params = self.resolved_params.clone();

		let mut html = match self.html.clone() {
			Some(html) => html,
			None => match content_param(&params) {
				Some(content) => self.assemble_html(ctx, content)?,
				None => {
					let fallback = params
						.str("html")
						.or_else(|| self.text.as_deref().filter(|text| !text.is_empty()))
						.or_else(|| params.str("text"))
						.map(str::to_string);
					match fallback {
						Some(html) => html,
						None => self.view(ctx, "html/message", TemplateContext::new())?,
					}
				}
			},
		};

		if !has_html_head(&html) {
			let slots = TemplateContext::from([
				("body".to_string(), Value::String(html)),
				("header".to_string(), Value::String(String::new())),
				("footer".to_string(), Value::String(String::new())),
			]);
			html = self.view(ctx, "html/message", slots)?;
		}

		if self.text.is_none() {
			let text = match params.str("text") {
				Some(text) => text.to_string(),
				None if html.trim().is_empty() => {
					html_to_text(&self.view(ctx, "text/message", TemplateContext::new())?)
				}
				None => html_to_text(&html),
			};
			self.text = Some(text);
		}

		if let (Some(css), Some(true)) = (self.css.as_deref(), self.inline_css) {
			match inline_css(&html, css) {
				Ok(inlined) => html = inlined,
				Err(e) => tracing::warn!(error = %e, "css inlining failed, keeping html as is"),
			}
		}

		self.html = Some(html);
		Ok(())
	}

	fn assemble_html(&mut self, ctx: &MailContext, content: Map<String, Value>) -> MailResult<String> {
		let mut slots = TemplateContext::new();
		for (slot, view) in CONTENT_SLOTS {
			let value = match content.get(slot) {
				Some(Value::String(literal)) if !literal.is_empty() => literal.clone(),
				Some(value) if !is_truthy(value) => String::new(),
				_ => self.view(ctx, view, TemplateContext::new())?,
			};
			slots.insert(slot.to_string(), Value::String(value));
		}
		self.view(ctx, "html/message", slots)
	}

	/// Hand the resolved state to the driver.
	///
	/// Without a driver of its own the mailable takes a fresh shared driver
	/// from the context, so state never carries over from a previous
	/// message. A failed projection drops that driver again.
	fn project(&mut self, ctx: &MailContext) -> MailResult<()> {
		let (driver, owned) = match &self.driver {
			Some(driver) => (driver.clone(), true),
			None => {
				ctx.reset_driver();
				(ctx.driver()?, false)
			}
		};

		let projected = self.project_onto(&mut **driver.lock(), ctx);
		match projected {
			Ok(()) => {
				self.driver = Some(driver);
				Ok(())
			}
			Err(e) => {
				if !owned {
					ctx.reset_driver();
				}
				Err(e)
			}
		}
	}

	fn project_onto(&self, driver: &mut dyn MailerDriver, ctx: &MailContext) -> MailResult<()> {
		if let Some(from) = &self.from {
			driver.set_from(from.email(), from.name())?;
		}
		for contact in self.to() {
			driver.add_to(contact.email(), contact.name())?;
		}
		for contact in self.reply_to() {
			driver.add_reply_to(contact.email(), contact.name())?;
		}
		for contact in self.bcc() {
			driver.add_bcc(contact.email(), contact.name())?;
		}
		for contact in self.cc() {
			driver.add_cc(contact.email(), contact.name())?;
		}
		for attachment in self.attachments() {
			driver.add_attachment(attachment)?;
		}
		if let Some(charset) = &self.charset {
			driver.set_charset(charset);
		}
		if let Some(encoding) = self.encoding {
			driver.set_encoding(encoding.as_str());
		}
		if let Some(content_type) = self.content_type {
			driver.set_content_type(content_type.as_str());
		}
		if let Some(subject) = &self.subject {
			driver.set_subject(subject);
		}

		let html = self.html.as_deref().unwrap_or_default();
		let text = self.text.as_deref().unwrap_or_default();
		match self.content_type.unwrap_or_default() {
			ContentType::MultipartAlternative => {
				driver.set_html(html);
				driver.set_text(text);
			}
			ContentType::TextHtml => {
				let source = self
					.html_body_source
					.unwrap_or(ctx.settings().html_body_source);
				driver.set_html(match source {
					HtmlBodySource::Text => text,
					HtmlBodySource::Html => html,
				});
			}
			ContentType::TextPlain => driver.set_text(text),
		}
		Ok(())
	}

	/// Build, then deliver through the driver.
	pub fn send(&mut self, ctx: &MailContext) -> MailResult<bool> {
		self.build(ctx)?;
		let driver = self.projected_driver()?;
		let sent = driver.lock().send();
		Ok(sent)
	}

	/// Build, then record the message in the context's queue.
	pub fn queue(
		&mut self,
		ctx: &MailContext,
		date: Option<DateTime<Utc>>,
		context: Map<String, Value>,
	) -> MailResult<QueueId> {
		self.build(ctx)?;
		ctx.queue().add(self, date, context)
	}

	/// Build, then return the body the driver presents for its content type.
	pub fn message(&mut self, ctx: &MailContext) -> MailResult<String> {
		self.build(ctx)?;
		let driver = self.projected_driver()?;
		let message = driver.lock().message();
		Ok(message)
	}

	/// Same as [`message`](Self::message)
	pub fn render(&mut self, ctx: &MailContext) -> MailResult<String> {
		self.message(ctx)
	}

	/// Build, then render the `debug` view with the resolved html and text.
	pub fn debug(&mut self, ctx: &MailContext) -> MailResult<String> {
		self.build(ctx)?;
		let slots = TemplateContext::from([
			("html".to_string(), Value::from(self.html.clone().unwrap_or_default())),
			("text".to_string(), Value::from(self.text.clone().unwrap_or_default())),
		]);
		self.view(ctx, "debug", slots)
	}

	fn projected_driver(&self) -> MailResult<SharedDriver> {
		self.driver
			.clone()
			.ok_or_else(|| MailError::Config("mailable has no driver".to_string()))
	}

	/// Render a view with the shared variables, the data bag and `slots`.
	pub fn view(
		&mut self,
		ctx: &MailContext,
		name: &str,
		slots: TemplateContext,
	) -> MailResult<String> {
		let engine = self.engine(ctx)?;
		let mut context = TemplateContext::new();
		context.insert(
			"subject".to_string(),
			Value::from(self.subject.clone().unwrap_or_default()),
		);
		context.insert("locale".to_string(), Value::from(self.locale()));
		context.insert(
			"charset".to_string(),
			Value::from(self.charset.clone().unwrap_or_default()),
		);
		context.insert(
			"from".to_string(),
			Value::from(self.from.as_ref().map(Contact::linearize).unwrap_or_default()),
		);
		for (key, contacts) in [
			("to", self.to()),
			("cc", self.cc()),
			("bcc", self.bcc()),
			("reply_to", self.reply_to()),
		] {
			context.insert(key.to_string(), Value::from(linearize_contacts(contacts)));
		}
		context.extend(self.datas.iter().map(|(k, v)| (k.clone(), v.clone())));
		context.extend(slots);

		engine.render(name, &context)
	}

	fn engine(&mut self, ctx: &MailContext) -> MailResult<Arc<dyn ViewEngine>> {
		if let Some(engine) = &self.view_engine {
			return Ok(engine.clone());
		}
		if let Some(engine) = ctx.view_engine() {
			return Ok(engine);
		}

		let params = &self.resolved_params;
		let viewer = &ctx.settings().viewer;
		let directory = match existing_dir(params.str("viewer.directory").map(PathBuf::from))
			.or_else(|| existing_dir(viewer.directory.clone()))
		{
			Some(directory) => directory,
			None => {
				let directory = ctx.resources(DEFAULT_VIEWS)?;
				if !directory.is_dir() {
					return Err(MailError::Config(
						"mailable must have an accessible view directory".to_string(),
					));
				}
				directory
			}
		};
		let override_dir = existing_dir(params.str("viewer.override_dir").map(PathBuf::from))
			.or_else(|| existing_dir(viewer.override_dir.clone()));

		let engine: Arc<dyn ViewEngine> =
			Arc::new(TeraViewEngine::new(&directory, override_dir.as_deref())?);
		self.view_engine = Some(engine.clone());
		Ok(engine)
	}
}

/// Facade `datas` beneath the mailable's own `datas`, key by key.
fn layered_datas(ctx: &MailContext, own: &Params) -> Map<String, Value> {
	let mut datas = match ctx.defaults().get("datas") {
		Some(Value::Object(defaults)) => defaults.clone(),
		_ => Map::new(),
	};
	if let Some(Value::Object(own)) = own.get("datas") {
		datas.extend(own.clone());
	}
	datas
}

/// The `content` parameter, or an `html` parameter given as an object.
fn content_param(params: &Params) -> Option<Map<String, Value>> {
	[params.get("content"), params.get("html")]
		.into_iter()
		.flatten()
		.find_map(|value| match value {
			Value::Object(map) => Some(map.clone()),
			_ => None,
		})
}

fn existing_dir(dir: Option<PathBuf>) -> Option<PathBuf> {
	dir.map(|d| trim_trailing_slash(&d))
		.filter(|d| d.is_dir())
}

fn trim_trailing_slash(path: &Path) -> PathBuf {
	let raw = path.to_string_lossy();
	let trimmed = raw.trim_end_matches('/');
	if trimmed.is_empty() {
		path.to_path_buf()
	} else {
		PathBuf::from(trimmed)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use mailroom_conf::MailSettings;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	fn test_layered_datas_merge_key_wise() {
		// Arrange
		let mut ctx = MailContext::new(MailSettings::memory()).unwrap();
		ctx.defaults_mut()
			.set("datas", json!({"site": "Shop", "greeting": "Hello"}));
		let own = Params::from_value(json!({"datas": {"greeting": "Hi"}}));

		// Act
		let datas = layered_datas(&ctx, &own);

		// Assert
		assert_eq!(datas.get("site"), Some(&json!("Shop")));
		assert_eq!(datas.get("greeting"), Some(&json!("Hi")));
	}

	#[rstest]
	fn test_content_param_prefers_content() {
		// Arrange
		let params = Params::from_value(json!({
			"content": {"body": "a"},
			"html": {"body": "b"}
		}));

		// Act
		let content = content_param(&params).unwrap();

		// Assert
		assert_eq!(content.get("body"), Some(&json!("a")));
	}

	#[rstest]
	fn test_content_param_ignores_scalar_html() {
		let params = Params::from_value(json!({"html": true}));
		assert!(content_param(&params).is_none());
	}

	#[rstest]
	fn test_trim_trailing_slash() {
		assert_eq!(trim_trailing_slash(Path::new("/srv/views/")), PathBuf::from("/srv/views"));
		assert_eq!(trim_trailing_slash(Path::new("/")), PathBuf::from("/"));
	}
}
