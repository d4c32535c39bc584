//! # Mailroom
//!
//! Declarative mail composition for web applications.
//!
//! A message is described by layered parameters (built-in defaults, mailer
//! defaults, per-call values), built once into a [`Mailable`] and handed to
//! a delivery driver backed by SMTP, files, the console or memory.
//!
//! ## Crates
//!
//! - [`conf`]: layered settings read from defaults, TOML files and `MAIL_*`
//!   environment variables
//! - [`mail`]: mailables, the mailer facade, recipient and attachment
//!   parsing, views, drivers and the queue
//!
//! ## Quick Start
//!
//! ```rust
//! use mailroom::prelude::*;
//! use serde_json::json;
//!
//! # fn main() -> Result<(), MailError> {
//! let mut mailer = Mailer::new(MailContext::new(MailSettings::memory())?);
//! mailer.set_default("from", json!("Shop <shop@example.com>"));
//!
//! let sent = mailer.send(json!({
//!     "to": ["alice@example.com", ["bob@example.com", "Bob"]],
//!     "subject": "Your order",
//!     "text": "Thanks for your order.",
//! }))?;
//!
//! assert!(sent);
//! assert_eq!(mailer.context().outbox().unwrap().len(), 1);
//! # Ok(())
//! # }
//! ```

pub use mailroom_conf as conf;
pub use mailroom_mail as mail;

pub use mailroom_conf::{HtmlBodySource, MailSettings, SettingsError};
pub use mailroom_mail::{
	Contact, MailContext, MailError, MailResult, Mailable, MailableSpec, Mailer, Params,
};

pub mod prelude {
	pub use crate::{
		Contact, HtmlBodySource, MailContext, MailError, MailResult, MailSettings, Mailable,
		MailableSpec, Mailer, Params,
	};
	pub use mailroom_mail::{MailerDriver, install, instance};
}
