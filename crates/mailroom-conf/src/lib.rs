//! # Mailroom Conf
//!
//! Layered configuration for the mail layer.
//!
//! Settings are assembled from prioritized sources (built-in defaults,
//! a TOML file, `MAIL_*` environment variables) and deserialized into
//! [`MailSettings`].
//!
//! ## Examples
//!
//! ```rust,no_run
//! use mailroom_conf::MailSettings;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = MailSettings::load("config/mail.toml")?;
//! settings.validate()?;
//! # Ok(())
//! # }
//! ```

pub mod settings;
pub mod sources;

pub use settings::{ENV_PREFIX, HtmlBodySource, MailSettings, SettingsError, ViewerSettings};
pub use sources::{ConfigSource, DefaultSource, EnvSource, SourceError, TomlFileSource};
