//! # Mailroom Mail
//!
//! Declarative mail composition for web applications.
//!
//! ## Features
//!
//! ### Message Building
//! - **Mailable**: builds a message once from layered parameters
//!   (built-in defaults, facade defaults, per-call overrides)
//! - **Recipient parsing**: strings, `Name <email>` forms, `[email, name]`
//!   pairs, `{email, name}` objects and arbitrary nesting of those
//! - **Attachments**: file paths checked for existence at parse time
//! - **Body fallback**: templated html, html to text derivation and CSS inlining
//!
//! ### Delivery
//! - **LettreDriver**: SMTP (SSL, STARTTLS or plain), file, console and
//!   in-memory transports
//! - **MailQueue**: deferred sends recorded by an in-memory queue
//!
//! ### Views
//! - **TeraViewEngine**: templates loaded from a view directory with an
//!   optional override directory
//! - **StringViewEngine**: in-memory templates for tests and embedded use
//!
//! ## Examples
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use mailroom_conf::MailSettings;
//! use mailroom_mail::{Mailer, MailContext, Params};
//! use serde_json::json;
//!
//! let context = MailContext::new(MailSettings::memory())?;
//! let mut mailer = Mailer::new(context);
//!
//! let params = Params::from_value(json!({
//!     "from": "Shop <shop@example.com>",
//!     "to": ["alice@example.com", ["bob@example.com", "Bob"]],
//!     "subject": "Your order",
//!     "text": "Thanks for your order.",
//! }));
//! let sent = mailer.send(params)?;
//! # let _ = sent;
//! # Ok(())
//! # }
//! ```

pub mod attachment;
pub mod backends;
pub mod contact;
pub mod context;
pub mod driver;
pub mod html;
pub mod mailable;
pub mod mailer;
pub mod params;
pub mod queue;
pub mod types;
pub mod validation;
pub mod views;

use thiserror::Error;

pub use attachment::{AttachmentRef, parse_attachments};
pub use backends::{
	DriverTransport, LettreDriver, LettreDriverFactory, MemoryOutbox, SentMail,
	driver_factory_from_settings,
};
pub use contact::{Contact, parse_contacts};
pub use context::MailContext;
pub use driver::{DriverFactory, MailerDriver, SharedDriver};
pub use mailable::Mailable;
pub use mailer::{MailableSpec, Mailer, MailerHandle, install, instance, is_main_instance};
pub use params::Params;
pub use queue::{MailQueue, MemoryQueue, QueueId, QueuedMail};
pub use types::{ContentType, Encoding};
pub use validation::{MAX_EMAIL_LENGTH, is_valid_email, validate_email};
pub use views::{StringViewEngine, TemplateContext, TeraViewEngine, ViewEngine};

pub use mailroom_conf::{HtmlBodySource, MailSettings};

#[derive(Debug, Error)]
pub enum MailError {
	#[error("Configuration error: {0}")]
	Config(String),

	#[error("Invalid email address: {0}")]
	InvalidAddress(String),

	#[error("Header injection attempt detected: {0}")]
	HeaderInjection(String),

	#[error("Template error: {0}")]
	Template(String),

	#[error("Driver call `{method}` failed: {source}")]
	Driver {
		method: &'static str,
		#[source]
		source: Box<dyn std::error::Error + Send + Sync>,
	},

	#[error("Queue error: {0}")]
	Queue(String),

	#[error("Mailable not found: {0}")]
	MailableNotFound(String),

	#[error("No mailer instance has been installed")]
	NoInstance,

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
}

impl MailError {
	/// Wrap the cause of a failed driver invocation.
	pub fn driver(
		method: &'static str,
		source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
	) -> Self {
		Self::Driver {
			method,
			source: source.into(),
		}
	}
}

impl From<tera::Error> for MailError {
	fn from(err: tera::Error) -> Self {
		// tera keeps the useful part of the message in the source chain
		let mut message = err.to_string();
		let mut source = std::error::Error::source(&err);
		while let Some(cause) = source {
			message.push_str(": ");
			message.push_str(&cause.to_string());
			source = cause.source();
		}
		Self::Template(message)
	}
}

impl From<mailroom_conf::SettingsError> for MailError {
	fn from(err: mailroom_conf::SettingsError) -> Self {
		Self::Config(err.to_string())
	}
}

pub type MailResult<T> = std::result::Result<T, MailError>;
