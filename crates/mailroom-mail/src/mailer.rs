//! Mailer facade
//!
//! [`Mailer`] owns a [`MailContext`], the current [`Mailable`] and a
//! registry of named mailables. Every entry point takes a
//! [`MailableSpec`] selecting the mailable to act on.
//!
//! A process-wide mailer can be made available with [`install`] and
//! retrieved with [`instance`].

use crate::context::MailContext;
use crate::driver::SharedDriver;
use crate::mailable::Mailable;
use crate::params::Params;
use crate::queue::QueueId;
use crate::{MailError, MailResult};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

/// Selects the mailable a [`Mailer`] operation acts on.
pub enum MailableSpec {
	/// The current mailable, created from empty parameters if there is none
	Current,
	/// A registered mailable
	Named(String),
	/// A mailable instance that becomes the current one
	Instance(Mailable),
	/// Parameters of a new current mailable
	Params(Params),
}

impl From<Mailable> for MailableSpec {
	fn from(mailable: Mailable) -> Self {
		Self::Instance(mailable)
	}
}

impl From<Params> for MailableSpec {
	fn from(params: Params) -> Self {
		Self::Params(params)
	}
}

impl From<Value> for MailableSpec {
	fn from(value: Value) -> Self {
		match value {
			Value::Null => Self::Current,
			other => Self::Params(Params::from_value(other)),
		}
	}
}

impl From<&str> for MailableSpec {
	fn from(name: &str) -> Self {
		Self::Named(name.to_string())
	}
}

impl<T: Into<MailableSpec>> From<Option<T>> for MailableSpec {
	fn from(spec: Option<T>) -> Self {
		spec.map(Into::into).unwrap_or(Self::Current)
	}
}

/// Entry point owning the mail defaults and the driver lifecycle.
///
/// # Examples
///
/// ```
/// use mailroom_conf::MailSettings;
/// use mailroom_mail::{MailContext, Mailer};
/// use serde_json::json;
///
/// let mut mailer = Mailer::new(MailContext::new(MailSettings::memory()).unwrap());
/// mailer.set_default("from", json!("noreply@example.com"));
///
/// let sent = mailer
///     .send(json!({"to": "a@example.com", "text": "Hello"}))
///     .unwrap();
/// assert!(sent);
/// assert_eq!(mailer.context().outbox().unwrap().len(), 1);
/// ```
pub struct Mailer {
	context: MailContext,
	current: Option<Mailable>,
	registry: HashMap<String, Mailable>,
}

impl Mailer {
	pub fn new(context: MailContext) -> Self {
		Self {
			context,
			current: None,
			registry: HashMap::new(),
		}
	}

	pub fn context(&self) -> &MailContext {
		&self.context
	}

	pub fn context_mut(&mut self) -> &mut MailContext {
		&mut self.context
	}

	pub fn current(&self) -> Option<&Mailable> {
		self.current.as_ref()
	}

	/// Build and send the selected mailable.
	pub fn send(&mut self, spec: impl Into<MailableSpec>) -> MailResult<bool> {
		let (context, mailable) = self.select(spec.into())?;
		mailable.send(context)
	}

	/// Build the selected mailable and record it in the queue.
	pub fn queue(
		&mut self,
		spec: impl Into<MailableSpec>,
		date: Option<DateTime<Utc>>,
		queue_context: Map<String, Value>,
	) -> MailResult<QueueId> {
		let (context, mailable) = self.select(spec.into())?;
		mailable.queue(context, date, queue_context)
	}

	/// Build the selected mailable and return the driver's message body.
	pub fn message(&mut self, spec: impl Into<MailableSpec>) -> MailResult<String> {
		let (context, mailable) = self.select(spec.into())?;
		mailable.message(context)
	}

	/// Build the selected mailable and render its debug view.
	pub fn render_debug(&mut self, spec: impl Into<MailableSpec>) -> MailResult<String> {
		let (context, mailable) = self.select(spec.into())?;
		mailable.debug(context)
	}

	/// Print the debug view of the selected mailable to stdout and exit the
	/// process with status 0. Returns only when rendering fails.
	pub fn debug(&mut self, spec: impl Into<MailableSpec>) -> MailResult<Infallible> {
		let output = self.render_debug(spec)?;
		println!("{}", output);
		std::process::exit(0)
	}

	/// Facade-level default parameters
	pub fn defaults(&self) -> &Params {
		self.context.defaults()
	}

	pub fn default(&self, key: &str) -> Option<&Value> {
		self.context.defaults().get(key)
	}

	pub fn set_default(&mut self, key: impl Into<String>, value: Value) {
		self.context.defaults_mut().set(key, value);
	}

	/// Merge `values` into the defaults, replacing keys already present.
	pub fn merge_defaults(&mut self, values: &Params) {
		self.context.defaults_mut().merge(values);
	}

	/// Absolute path below the resource directory
	pub fn resources(&self, path: &str) -> MailResult<PathBuf> {
		self.context.resources(path)
	}

	pub fn set_resources_base_dir(&mut self, dir: impl Into<PathBuf>) {
		self.context.set_resources_dir(dir);
	}

	pub fn get_driver(&self) -> MailResult<SharedDriver> {
		self.context.driver()
	}

	pub fn reset_driver(&self) {
		self.context.reset_driver();
	}

	pub fn register_mailable(&mut self, name: impl Into<String>, mailable: Mailable) {
		self.registry.insert(name.into(), mailable);
	}

	pub fn mailable(&self, name: &str) -> Option<&Mailable> {
		self.registry.get(name)
	}

	/// New mailable over `params`, not registered and not current.
	pub fn create_mailable(&self, params: Params) -> Mailable {
		Mailable::with_params(params)
	}

	fn select(&mut self, spec: MailableSpec) -> MailResult<(&MailContext, &mut Mailable)> {
		let Self {
			context,
			current,
			registry,
		} = self;

		let mailable = match spec {
			MailableSpec::Current => {
				if current.is_none() {
					context.reset_driver();
				}
				current.get_or_insert_with(Mailable::new)
			}
			MailableSpec::Named(name) => {
				let mailable = registry
					.get_mut(&name)
					.ok_or(MailError::MailableNotFound(name))?;
				if !mailable.is_built() {
					context.reset_driver();
				}
				mailable
			}
			MailableSpec::Instance(mailable) => {
				context.reset_driver();
				current.insert(mailable)
			}
			MailableSpec::Params(params) => {
				context.reset_driver();
				current.insert(Mailable::with_params(params))
			}
		};

		Ok((&*context, mailable))
	}
}

/// Shared handle on an installed [`Mailer`]
pub type MailerHandle = Arc<Mutex<Mailer>>;

static MAIN_INSTANCE: OnceLock<MailerHandle> = OnceLock::new();

/// Make `mailer` available process-wide.
///
/// The first installed mailer becomes the main instance returned by
/// [`instance`]; later calls return a handle that is not the main one.
pub fn install(mailer: Mailer) -> MailerHandle {
	let handle = Arc::new(Mutex::new(mailer));
	if MAIN_INSTANCE.set(handle.clone()).is_ok() {
		tracing::debug!("main mailer instance installed");
	}
	handle
}

/// The main mailer instance.
pub fn instance() -> MailResult<MailerHandle> {
	MAIN_INSTANCE.get().cloned().ok_or(MailError::NoInstance)
}

/// Whether `handle` is the main instance.
pub fn is_main_instance(handle: &MailerHandle) -> bool {
	MAIN_INSTANCE
		.get()
		.is_some_and(|main| Arc::ptr_eq(main, handle))
}

#[cfg(test)]
mod tests {
	use super::*;
	use mailroom_conf::MailSettings;
	use rstest::{fixture, rstest};
	use serde_json::json;

	#[fixture]
	fn mailer() -> Mailer {
		Mailer::new(MailContext::new(MailSettings::memory()).unwrap())
	}

	#[rstest]
	fn test_spec_conversions() {
		assert!(matches!(MailableSpec::from(Value::Null), MailableSpec::Current));
		assert!(matches!(
			MailableSpec::from(json!({"to": "a@b.com"})),
			MailableSpec::Params(_)
		));
		assert!(matches!(MailableSpec::from("welcome"), MailableSpec::Named(_)));
		assert!(matches!(
			MailableSpec::from(None::<Params>),
			MailableSpec::Current
		));
	}

	#[rstest]
	fn test_unknown_named_mailable(mut mailer: Mailer) {
		// Act
		let result = mailer.send("missing");

		// Assert
		assert!(matches!(result, Err(MailError::MailableNotFound(name)) if name == "missing"));
	}

	#[rstest]
	fn test_current_is_created_on_demand(mut mailer: Mailer) {
		// Arrange
		assert!(mailer.current().is_none());

		// Act
		let _ = mailer.message(MailableSpec::Current).unwrap();

		// Assert
		assert!(mailer.current().is_some_and(Mailable::is_built));
	}
}
