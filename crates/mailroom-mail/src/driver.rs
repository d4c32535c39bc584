//! Transport driver contract
//!
//! A [`MailerDriver`] receives the resolved state of a
//! [`Mailable`](crate::Mailable) through setters and adders, then validates
//! it in `prepare()` and delivers it in `send()`. Delivery failures follow a
//! boolean convention: `prepare()`/`send()` return `false` and the reason is
//! available through `error()`.

use crate::attachment::AttachmentRef;
use crate::contact::Contact;
use crate::MailResult;
use crate::types::{ContentType, Encoding};
use parking_lot::Mutex;
use std::sync::Arc;

/// Driver shared between a [`MailContext`](crate::MailContext) and the
/// mailable currently building on it.
pub type SharedDriver = Arc<Mutex<Box<dyn MailerDriver>>>;

/// Contract of a concrete mail transport.
pub trait MailerDriver: Send {
	fn set_from(&mut self, email: &str, name: Option<&str>) -> MailResult<()>;

	fn add_to(&mut self, email: &str, name: Option<&str>) -> MailResult<()>;

	fn add_cc(&mut self, email: &str, name: Option<&str>) -> MailResult<()>;

	fn add_bcc(&mut self, email: &str, name: Option<&str>) -> MailResult<()>;

	fn add_reply_to(&mut self, email: &str, name: Option<&str>) -> MailResult<()>;

	fn add_attachment(&mut self, attachment: &AttachmentRef) -> MailResult<()>;

	fn set_charset(&mut self, charset: &str);

	/// Unknown encodings coerce to `8bit`.
	fn set_encoding(&mut self, encoding: &str);

	/// Unknown content types coerce to `multipart/alternative`.
	fn set_content_type(&mut self, content_type: &str);

	fn set_subject(&mut self, subject: &str);

	fn set_html(&mut self, html: &str);

	fn set_text(&mut self, text: &str);

	/// Validate the current state and compose the message.
	fn prepare(&mut self) -> bool;

	/// Deliver the message, preparing it first.
	fn send(&mut self) -> bool;

	/// Last error, empty unless a `prepare()` or `send()` call failed.
	fn error(&self) -> String;

	fn from_address(&self) -> Option<Contact>;

	fn to(&self) -> Vec<Contact>;

	fn cc(&self) -> Vec<Contact>;

	fn bcc(&self) -> Vec<Contact>;

	fn reply_to(&self) -> Vec<Contact>;

	fn attachments(&self) -> Vec<AttachmentRef>;

	/// Header lines of the composed message, empty before `prepare()`.
	fn headers(&self) -> Vec<(String, String)>;

	fn html(&self) -> String;

	fn text(&self) -> String;

	/// Body presented for the current content type.
	fn message(&self) -> String {
		if self.has_html() {
			self.html()
		} else {
			self.text()
		}
	}

	fn subject(&self) -> String;

	fn charset(&self) -> String;

	fn content_type(&self) -> ContentType;

	fn encoding(&self) -> Encoding;

	fn has_html(&self) -> bool {
		self.content_type().has_html()
	}

	fn has_text(&self) -> bool {
		self.content_type().has_text()
	}
}

/// Creates fresh driver instances.
pub trait DriverFactory: Send + Sync {
	fn create(&self) -> MailResult<Box<dyn MailerDriver>>;
}

impl<F> DriverFactory for F
where
	F: Fn() -> MailResult<Box<dyn MailerDriver>> + Send + Sync,
{
	fn create(&self) -> MailResult<Box<dyn MailerDriver>> {
		self()
	}
}
