//! Lettre based mail driver
//!
//! [`LettreDriver`] collects the state handed over by a mailable, composes a
//! `lettre::Message` in `prepare()` and delivers it through one of the
//! [`DriverTransport`]s selected by the `backend` setting.

use crate::attachment::AttachmentRef;
use crate::contact::Contact;
use crate::driver::{DriverFactory, MailerDriver};
use crate::types::{ContentType, Encoding};
use crate::validation::{check_header_injection, validate_email};
use crate::{MailError, MailResult};
use lettre::message::header::ContentType as HeaderContentType;
use lettre::message::{Attachment, Body, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, FileTransport, Message, SmtpTransport, Transport};
use mailroom_conf::MailSettings;
use parking_lot::RwLock;
use std::fmt;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

/// A message delivered through the memory transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
	pub from: Option<Contact>,
	pub to: Vec<Contact>,
	pub cc: Vec<Contact>,
	pub bcc: Vec<Contact>,
	pub reply_to: Vec<Contact>,
	pub subject: String,
	pub content_type: ContentType,
	/// Html part, `None` when the content type carries no html
	pub html: Option<String>,
	/// Text part, `None` when the content type carries no text
	pub text: Option<String>,
	pub attachments: Vec<String>,
	/// The formatted RFC 5322 message
	pub raw: String,
}

/// In-memory outbox shared by every driver of a memory backend.
///
/// # Examples
///
/// ```
/// use mailroom_mail::MemoryOutbox;
///
/// let outbox = MemoryOutbox::new();
/// assert!(outbox.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryOutbox {
	sent: Arc<RwLock<Vec<SentMail>>>,
}

impl MemoryOutbox {
	pub fn new() -> Self {
		Self::default()
	}

	/// Every message delivered so far, oldest first
	pub fn messages(&self) -> Vec<SentMail> {
		self.sent.read().clone()
	}

	pub fn last(&self) -> Option<SentMail> {
		self.sent.read().last().cloned()
	}

	pub fn len(&self) -> usize {
		self.sent.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.sent.read().is_empty()
	}

	pub fn clear(&self) {
		self.sent.write().clear();
	}

	pub fn find_by_subject(&self, subject: &str) -> Vec<SentMail> {
		self.sent
			.read()
			.iter()
			.filter(|mail| mail.subject == subject)
			.cloned()
			.collect()
	}

	fn push(&self, mail: SentMail) {
		self.sent.write().push(mail);
	}
}

/// Delivery channel of a [`LettreDriver`]
#[derive(Clone)]
pub enum DriverTransport {
	Smtp(SmtpTransport),
	File(FileTransport),
	/// Prints the formatted message to stdout
	Console,
	Memory(MemoryOutbox),
}

impl fmt::Debug for DriverTransport {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Smtp(_) => f.write_str("Smtp"),
			Self::File(_) => f.write_str("File"),
			Self::Console => f.write_str("Console"),
			Self::Memory(outbox) => f.debug_tuple("Memory").field(&outbox.len()).finish(),
		}
	}
}

impl DriverTransport {
	/// Build the transport selected by `settings.backend`.
	///
	/// The memory backend delivers into `outbox` when given, into a new
	/// outbox otherwise.
	pub fn from_settings(settings: &MailSettings, outbox: Option<MemoryOutbox>) -> MailResult<Self> {
		settings.validate()?;

		match settings.backend.as_str() {
			"smtp" => Ok(Self::Smtp(smtp_transport(settings)?)),
			"file" => {
				let path = settings
					.file_path
					.as_ref()
					.ok_or_else(|| MailError::Config("file backend requires file_path".to_string()))?;
				fs::create_dir_all(path)?;
				Ok(Self::File(FileTransport::new(path)))
			}
			"console" => Ok(Self::Console),
			"memory" => Ok(Self::Memory(outbox.unwrap_or_default())),
			other => Err(MailError::Config(format!("unknown mail backend: {}", other))),
		}
	}
}

fn smtp_transport(settings: &MailSettings) -> MailResult<SmtpTransport> {
	let mut builder = if settings.use_ssl {
		SmtpTransport::relay(&settings.host).map_err(|e| MailError::driver("relay", e))?
	} else if settings.use_tls {
		SmtpTransport::starttls_relay(&settings.host)
			.map_err(|e| MailError::driver("starttls_relay", e))?
	} else {
		SmtpTransport::builder_dangerous(&settings.host)
	};

	builder = builder.port(settings.port);

	if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
		builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
	}

	if let Some(timeout) = settings.timeout {
		builder = builder.timeout(Some(Duration::from_secs(timeout)));
	}

	Ok(builder.build())
}

/// Mail driver over lettre
#[derive(Debug)]
pub struct LettreDriver {
	transport: DriverTransport,
	from: Option<Contact>,
	to: Vec<Contact>,
	cc: Vec<Contact>,
	bcc: Vec<Contact>,
	reply_to: Vec<Contact>,
	attachments: Vec<AttachmentRef>,
	charset: String,
	encoding: Encoding,
	content_type: ContentType,
	subject: String,
	html: String,
	text: String,
	prepared: Option<Message>,
	error: String,
}

impl LettreDriver {
	pub fn new(transport: DriverTransport) -> Self {
		Self {
			transport,
			from: None,
			to: Vec::new(),
			cc: Vec::new(),
			bcc: Vec::new(),
			reply_to: Vec::new(),
			attachments: Vec::new(),
			charset: "utf-8".to_string(),
			encoding: Encoding::default(),
			content_type: ContentType::default(),
			subject: String::new(),
			html: String::new(),
			text: String::new(),
			prepared: None,
			error: String::new(),
		}
	}

	/// Driver delivering into the given outbox.
	pub fn memory(outbox: MemoryOutbox) -> Self {
		Self::new(DriverTransport::Memory(outbox))
	}

	pub fn from_settings(settings: &MailSettings, outbox: Option<MemoryOutbox>) -> MailResult<Self> {
		Ok(Self::new(DriverTransport::from_settings(settings, outbox)?))
	}

	pub fn transport(&self) -> &DriverTransport {
		&self.transport
	}

	fn contact(email: &str, name: Option<&str>) -> MailResult<Contact> {
		validate_email(email)?;
		if let Some(name) = name {
			check_header_injection(name)?;
		}
		Ok(Contact::new(email, name.map(str::to_string)))
	}

	fn invalidate(&mut self) {
		self.prepared = None;
	}

	fn compose(&self) -> Result<Message, String> {
		let from = self
			.from
			.as_ref()
			.ok_or_else(|| "no sender address".to_string())?;
		if self.to.is_empty() && self.cc.is_empty() && self.bcc.is_empty() {
			return Err("no recipient address".to_string());
		}
		check_header_injection(&self.subject).map_err(|e| e.to_string())?;

		let mut builder = Message::builder()
			.from(mailbox(from)?)
			.subject(self.subject.clone());
		for contact in &self.to {
			builder = builder.to(mailbox(contact)?);
		}
		for contact in &self.cc {
			builder = builder.cc(mailbox(contact)?);
		}
		for contact in &self.bcc {
			builder = builder.bcc(mailbox(contact)?);
		}
		for contact in &self.reply_to {
			builder = builder.reply_to(mailbox(contact)?);
		}

		let html = self.body_part("text/html", &self.html)?;
		let text = self.body_part("text/plain", &self.text)?;
		let parts = match self.content_type {
			ContentType::MultipartAlternative => {
				Parts::Multi(MultiPart::alternative().singlepart(text).singlepart(html))
			}
			ContentType::TextHtml => Parts::Single(html),
			ContentType::TextPlain => Parts::Single(text),
		};

		let message = if self.attachments.is_empty() {
			match parts {
				Parts::Multi(multi) => builder.multipart(multi),
				Parts::Single(single) => builder.singlepart(single),
			}
		} else {
			let mut mixed = match parts {
				Parts::Multi(multi) => MultiPart::mixed().multipart(multi),
				Parts::Single(single) => MultiPart::mixed().singlepart(single),
			};
			for attachment in &self.attachments {
				mixed = mixed.singlepart(attachment_part(attachment)?);
			}
			builder.multipart(mixed)
		};

		message.map_err(|e| format!("cannot compose message: {}", e))
	}

	fn body_part(&self, mime: &str, body: &str) -> Result<SinglePart, String> {
		let content_type = HeaderContentType::parse(&format!("{}; charset={}", mime, self.charset))
			.map_err(|e| format!("invalid charset {}: {}", self.charset, e))?;
		// bodies the requested encoding cannot carry fall back to lettre's choice
		let body = Body::new_with_encoding(body.to_string(), self.encoding.to_lettre())
			.unwrap_or_else(|raw| {
				tracing::debug!(
					encoding = %self.encoding,
					mime,
					"body does not fit the requested transfer encoding, letting lettre choose"
				);
				Body::new(raw)
			});
		Ok(SinglePart::builder().header(content_type).body(body))
	}

	fn record_failure(&mut self, error: String) -> bool {
		tracing::warn!(error = %error, subject = %self.subject, "mail delivery failed");
		self.error = error;
		false
	}
}

enum Parts {
	Single(SinglePart),
	Multi(MultiPart),
}

fn mailbox(contact: &Contact) -> Result<Mailbox, String> {
	let address: Address = contact
		.email()
		.parse()
		.map_err(|e| format!("invalid address {}: {}", contact.email(), e))?;
	Ok(Mailbox::new(contact.name().map(str::to_string), address))
}

fn attachment_part(attachment: &AttachmentRef) -> Result<SinglePart, String> {
	let content = fs::read(attachment.path()).map_err(|e| {
		format!(
			"cannot read attachment {}: {}",
			attachment.path().display(),
			e
		)
	})?;
	let content_type = HeaderContentType::parse(&attachment.content_type())
		.or_else(|_| HeaderContentType::parse("application/octet-stream"))
		.map_err(|e| format!("invalid attachment type: {}", e))?;
	Ok(Attachment::new(attachment.display_name()).body(content, content_type))
}

fn header_lines(message: &Message) -> Vec<(String, String)> {
	let raw = message.headers().to_string();
	let mut headers: Vec<(String, String)> = Vec::new();
	for line in raw.split("\r\n").filter(|l| !l.is_empty()) {
		if line.starts_with(' ') || line.starts_with('\t') {
			if let Some((_, value)) = headers.last_mut() {
				value.push(' ');
				value.push_str(line.trim());
			}
			continue;
		}
		if let Some((name, value)) = line.split_once(':') {
			headers.push((name.trim().to_string(), value.trim().to_string()));
		}
	}
	headers
}

impl MailerDriver for LettreDriver {
	fn set_from(&mut self, email: &str, name: Option<&str>) -> MailResult<()> {
		self.from = Some(Self::contact(email, name)?);
		self.invalidate();
		Ok(())
	}

	fn add_to(&mut self, email: &str, name: Option<&str>) -> MailResult<()> {
		self.to.push(Self::contact(email, name)?);
		self.invalidate();
		Ok(())
	}

	fn add_cc(&mut self, email: &str, name: Option<&str>) -> MailResult<()> {
		self.cc.push(Self::contact(email, name)?);
		self.invalidate();
		Ok(())
	}

	fn add_bcc(&mut self, email: &str, name: Option<&str>) -> MailResult<()> {
		self.bcc.push(Self::contact(email, name)?);
		self.invalidate();
		Ok(())
	}

	fn add_reply_to(&mut self, email: &str, name: Option<&str>) -> MailResult<()> {
		self.reply_to.push(Self::contact(email, name)?);
		self.invalidate();
		Ok(())
	}

	/// The file is read when the message is composed; an unreadable file
	/// fails `prepare()`.
	fn add_attachment(&mut self, attachment: &AttachmentRef) -> MailResult<()> {
		self.attachments.push(attachment.clone());
		self.invalidate();
		Ok(())
	}

	fn set_charset(&mut self, charset: &str) {
		self.charset = charset.trim().to_string();
		self.invalidate();
	}

	fn set_encoding(&mut self, encoding: &str) {
		self.encoding = Encoding::parse(encoding);
		self.invalidate();
	}

	fn set_content_type(&mut self, content_type: &str) {
		self.content_type = ContentType::parse(content_type);
		self.invalidate();
	}

	fn set_subject(&mut self, subject: &str) {
		self.subject = subject.to_string();
		self.invalidate();
	}

	fn set_html(&mut self, html: &str) {
		self.html = html.to_string();
		self.invalidate();
	}

	fn set_text(&mut self, text: &str) {
		self.text = text.to_string();
		self.invalidate();
	}

	fn prepare(&mut self) -> bool {
		match self.compose() {
			Ok(message) => {
				self.prepared = Some(message);
				self.error.clear();
				true
			}
			Err(error) => {
				self.prepared = None;
				self.error = error;
				false
			}
		}
	}

	fn send(&mut self) -> bool {
		if !self.prepare() {
			let error = self.error.clone();
			return self.record_failure(error);
		}
		let Some(message) = self.prepared.as_ref() else {
			return self.record_failure("message was not prepared".to_string());
		};

		let outcome = match &self.transport {
			DriverTransport::Smtp(transport) => {
				transport.send(message).map(|_| ()).map_err(|e| e.to_string())
			}
			DriverTransport::File(transport) => {
				transport.send(message).map(|_| ()).map_err(|e| e.to_string())
			}
			DriverTransport::Console => {
				println!("{}", String::from_utf8_lossy(&message.formatted()));
				println!("{}", "-".repeat(79));
				Ok(())
			}
			DriverTransport::Memory(outbox) => {
				outbox.push(SentMail {
					from: self.from.clone(),
					to: self.to.clone(),
					cc: self.cc.clone(),
					bcc: self.bcc.clone(),
					reply_to: self.reply_to.clone(),
					subject: self.subject.clone(),
					content_type: self.content_type,
					html: self.has_html().then(|| self.html.clone()),
					text: self.has_text().then(|| self.text.clone()),
					attachments: self
						.attachments
						.iter()
						.map(AttachmentRef::display_name)
						.collect(),
					raw: String::from_utf8_lossy(&message.formatted()).into_owned(),
				});
				Ok(())
			}
		};

		match outcome {
			Ok(()) => {
				tracing::info!(
					subject = %self.subject,
					recipients = self.to.len() + self.cc.len() + self.bcc.len(),
					transport = ?self.transport,
					"mail sent"
				);
				true
			}
			Err(error) => self.record_failure(error),
		}
	}

	fn error(&self) -> String {
		self.error.clone()
	}

	fn from_address(&self) -> Option<Contact> {
		self.from.clone()
	}

	fn to(&self) -> Vec<Contact> {
		self.to.clone()
	}

	fn cc(&self) -> Vec<Contact> {
		self.cc.clone()
	}

	fn bcc(&self) -> Vec<Contact> {
		self.bcc.clone()
	}

	fn reply_to(&self) -> Vec<Contact> {
		self.reply_to.clone()
	}

	fn attachments(&self) -> Vec<AttachmentRef> {
		self.attachments.clone()
	}

	fn headers(&self) -> Vec<(String, String)> {
		self.prepared.as_ref().map(header_lines).unwrap_or_default()
	}

	fn html(&self) -> String {
		self.html.clone()
	}

	fn text(&self) -> String {
		self.text.clone()
	}

	fn subject(&self) -> String {
		self.subject.clone()
	}

	fn charset(&self) -> String {
		self.charset.clone()
	}

	fn content_type(&self) -> ContentType {
		self.content_type
	}

	fn encoding(&self) -> Encoding {
		self.encoding
	}
}

/// Creates [`LettreDriver`]s configured from [`MailSettings`].
#[derive(Debug, Clone)]
pub struct LettreDriverFactory {
	settings: MailSettings,
	outbox: Option<MemoryOutbox>,
}

impl LettreDriverFactory {
	/// The outbox shared by every driver of a memory backend.
	pub fn outbox(&self) -> Option<&MemoryOutbox> {
		self.outbox.as_ref()
	}
}

impl DriverFactory for LettreDriverFactory {
	fn create(&self) -> MailResult<Box<dyn MailerDriver>> {
		Ok(Box::new(LettreDriver::from_settings(
			&self.settings,
			self.outbox.clone(),
		)?))
	}
}

/// Validate `settings` and build a factory of drivers for its backend.
///
/// # Examples
///
/// ```
/// use mailroom_conf::MailSettings;
/// use mailroom_mail::backends::driver_factory_from_settings;
/// use mailroom_mail::{DriverFactory, MailerDriver};
///
/// let factory = driver_factory_from_settings(&MailSettings::memory()).unwrap();
/// assert!(factory.outbox().is_some());
/// let driver = factory.create().unwrap();
/// assert!(driver.to().is_empty());
/// ```
pub fn driver_factory_from_settings(settings: &MailSettings) -> MailResult<LettreDriverFactory> {
	settings.validate()?;
	let outbox = (settings.backend == "memory").then(MemoryOutbox::new);
	Ok(LettreDriverFactory {
		settings: settings.clone(),
		outbox,
	})
}
