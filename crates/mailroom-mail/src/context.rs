//! Services shared by the mailables of one mailer

use crate::backends::{MemoryOutbox, driver_factory_from_settings};
use crate::driver::{DriverFactory, SharedDriver};
use crate::params::Params;
use crate::queue::{MailQueue, MemoryQueue};
use crate::views::ViewEngine;
use crate::{MailError, MailResult};
use mailroom_conf::MailSettings;
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// Resources shipped with this crate
pub const DEFAULT_RESOURCES_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/resources");

/// Stylesheet path below the resource directory
pub const DEFAULT_STYLESHEET: &str = "assets/css/styles.css";

/// Default view directory below the resource directory
pub const DEFAULT_VIEWS: &str = "views/mailable";

/// Settings, defaults, resources, driver and queue used while building and
/// sending mailables.
///
/// One driver instance is created lazily and shared until
/// [`reset_driver`](Self::reset_driver) is called.
///
/// # Examples
///
/// ```
/// use mailroom_conf::MailSettings;
/// use mailroom_mail::MailContext;
///
/// let context = MailContext::new(MailSettings::memory()).unwrap();
/// assert!(context.outbox().is_some());
/// assert!(context.resources("/views/mailable").unwrap().is_dir());
/// ```
pub struct MailContext {
	settings: MailSettings,
	defaults: Params,
	resources_dir: PathBuf,
	resources_checked: OnceLock<()>,
	stylesheet: OnceLock<String>,
	factory: Arc<dyn DriverFactory>,
	outbox: Option<MemoryOutbox>,
	driver: Mutex<Option<SharedDriver>>,
	queue: Arc<dyn MailQueue>,
	view_engine: Option<Arc<dyn ViewEngine>>,
}

impl MailContext {
	/// Context over the driver selected by `settings.backend`.
	pub fn new(settings: MailSettings) -> MailResult<Self> {
		let factory = driver_factory_from_settings(&settings)?;
		let outbox = factory.outbox().cloned();
		let resources_dir = settings
			.resources_dir
			.clone()
			.unwrap_or_else(|| PathBuf::from(DEFAULT_RESOURCES_DIR));

		Ok(Self {
			defaults: Params::from(settings.defaults.clone()),
			settings,
			resources_dir,
			resources_checked: OnceLock::new(),
			stylesheet: OnceLock::new(),
			factory: Arc::new(factory),
			outbox,
			driver: Mutex::new(None),
			queue: Arc::new(MemoryQueue::new()),
			view_engine: None,
		})
	}

	/// Replace the driver factory. The outbox of the settings backend is dropped.
	pub fn with_driver_factory(mut self, factory: impl DriverFactory + 'static) -> Self {
		self.factory = Arc::new(factory);
		self.outbox = None;
		self.reset_driver();
		self
	}

	pub fn with_queue(mut self, queue: Arc<dyn MailQueue>) -> Self {
		self.queue = queue;
		self
	}

	/// View engine used by every mailable that has none of its own.
	pub fn with_view_engine(mut self, engine: Arc<dyn ViewEngine>) -> Self {
		self.view_engine = Some(engine);
		self
	}

	pub fn with_resources_dir(mut self, dir: impl Into<PathBuf>) -> Self {
		self.set_resources_dir(dir);
		self
	}

	pub fn settings(&self) -> &MailSettings {
		&self.settings
	}

	/// Facade-level default parameters
	pub fn defaults(&self) -> &Params {
		&self.defaults
	}

	pub fn defaults_mut(&mut self) -> &mut Params {
		&mut self.defaults
	}

	/// Outbox of the memory backend
	pub fn outbox(&self) -> Option<&MemoryOutbox> {
		self.outbox.as_ref()
	}

	pub fn queue(&self) -> &dyn MailQueue {
		self.queue.as_ref()
	}

	pub fn view_engine(&self) -> Option<Arc<dyn ViewEngine>> {
		self.view_engine.clone()
	}

	pub fn resources_dir(&self) -> &Path {
		&self.resources_dir
	}

	/// Point resource lookups at another base directory.
	pub fn set_resources_dir(&mut self, dir: impl Into<PathBuf>) {
		self.resources_dir = dir.into();
		self.resources_checked = OnceLock::new();
		self.stylesheet = OnceLock::new();
	}

	/// Absolute path of `path` below the resource directory.
	///
	/// The base directory must exist; its existence is checked once.
	pub fn resources(&self, path: &str) -> MailResult<PathBuf> {
		if self.resources_checked.get().is_none() {
			if !self.resources_dir.is_dir() {
				return Err(MailError::Config(format!(
					"resource directory is not accessible: {}",
					self.resources_dir.display()
				)));
			}
			tracing::debug!(dir = %self.resources_dir.display(), "mail resources resolved");
			let _ = self.resources_checked.set(());
		}

		let relative = path.trim_start_matches('/');
		Ok(if relative.is_empty() {
			self.resources_dir.clone()
		} else {
			self.resources_dir.join(relative)
		})
	}

	/// Built-in parameters with the default stylesheet as `css`.
	pub fn builtin_params(&self) -> MailResult<Params> {
		if let Some(css) = self.stylesheet.get() {
			return Ok(Params::builtin(css.clone()));
		}
		let path = self.resources(DEFAULT_STYLESHEET)?;
		let css = if path.is_file() {
			fs::read_to_string(&path)?
		} else {
			String::new()
		};
		Ok(Params::builtin(self.stylesheet.get_or_init(|| css).clone()))
	}

	/// The shared driver, created on first use.
	pub fn driver(&self) -> MailResult<SharedDriver> {
		let mut slot = self.driver.lock();
		if let Some(driver) = slot.as_ref() {
			return Ok(driver.clone());
		}
		let driver: SharedDriver = Arc::new(Mutex::new(self.factory.create()?));
		*slot = Some(driver.clone());
		Ok(driver)
	}

	/// Drop the shared driver; the next [`driver`](Self::driver) call creates a new one.
	pub fn reset_driver(&self) {
		*self.driver.lock() = None;
	}
}
