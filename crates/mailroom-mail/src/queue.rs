//! Deferred sending
//!
//! A [`MailQueue`] records a built [`Mailable`] for later delivery and
//! returns an identifier. [`MemoryQueue`] keeps the records in memory.

use crate::contact::linearize_contacts;
use crate::mailable::Mailable;
use crate::MailResult;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier returned by [`MailQueue::add`]
pub type QueueId = u64;

/// Backend recording scheduled sends.
pub trait MailQueue: Send + Sync {
	/// Record `mailable` for delivery at `date` (now when `None`).
	fn add(
		&self,
		mailable: &Mailable,
		date: Option<DateTime<Utc>>,
		context: Map<String, Value>,
	) -> MailResult<QueueId>;
}

/// A recorded send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedMail {
	pub id: QueueId,
	pub scheduled_at: DateTime<Utc>,
	pub context: Map<String, Value>,
	pub subject: String,
	pub to: Vec<String>,
	pub html: String,
	pub text: String,
}

/// In-memory queue with identifiers counting up from 1.
///
/// # Examples
///
/// ```
/// use mailroom_mail::MemoryQueue;
///
/// let queue = MemoryQueue::new();
/// assert!(queue.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct MemoryQueue {
	entries: Arc<RwLock<Vec<QueuedMail>>>,
	next_id: Arc<AtomicU64>,
}

impl MemoryQueue {
	pub fn new() -> Self {
		Self {
			entries: Arc::new(RwLock::new(Vec::new())),
			next_id: Arc::new(AtomicU64::new(1)),
		}
	}

	pub fn entries(&self) -> Vec<QueuedMail> {
		self.entries.read().clone()
	}

	pub fn get(&self, id: QueueId) -> Option<QueuedMail> {
		self.entries.read().iter().find(|e| e.id == id).cloned()
	}

	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}
}

impl Default for MemoryQueue {
	fn default() -> Self {
		Self::new()
	}
}

impl MailQueue for MemoryQueue {
	fn add(
		&self,
		mailable: &Mailable,
		date: Option<DateTime<Utc>>,
		context: Map<String, Value>,
	) -> MailResult<QueueId> {
		let id = self.next_id.fetch_add(1, Ordering::SeqCst);
		let scheduled_at = date.unwrap_or_else(Utc::now);

		self.entries.write().push(QueuedMail {
			id,
			scheduled_at,
			context,
			subject: mailable.subject().unwrap_or_default().to_string(),
			to: linearize_contacts(mailable.to()),
			html: mailable.html().unwrap_or_default().to_string(),
			text: mailable.text().unwrap_or_default().to_string(),
		});

		tracing::debug!(id, scheduled_at = %scheduled_at, "mail queued");
		Ok(id)
	}
}
