//! Mailer facade tests

use chrono::{TimeZone, Utc};
use mailroom_conf::MailSettings;
use mailroom_mail::{
	MailContext, MailError, Mailable, MailableSpec, Mailer, MailerDriver, MemoryQueue, Params,
	StringViewEngine,
};
use rstest::*;
use serde_json::{Map, json};
use std::sync::Arc;

#[fixture]
fn queue() -> MemoryQueue {
	MemoryQueue::new()
}

#[fixture]
fn mailer(queue: MemoryQueue) -> Mailer {
	let views = StringViewEngine::new()
		.with_template("html/message", "<html><head></head><body>{{{body}}}</body></html>")
		.with_template("debug", "debug: {{{text}}}");
	let context = MailContext::new(MailSettings::memory())
		.unwrap()
		.with_queue(Arc::new(queue))
		.with_view_engine(Arc::new(views));
	let mut mailer = Mailer::new(context);
	mailer.set_default("from", json!("Shop <shop@example.com>"));
	mailer.set_default("inline_css", json!(false));
	mailer
}

/// Test: Facade defaults apply to every send
#[rstest]
fn test_send_uses_facade_defaults(mut mailer: Mailer) {
	// Act
	let sent = mailer
		.send(json!({"to": "a@example.com", "subject": "Order", "text": "Thanks"}))
		.unwrap();

	// Assert
	assert!(sent);
	let mail = mailer.context().outbox().unwrap().last().unwrap();
	assert_eq!(mail.from.unwrap().to_string(), "Shop <shop@example.com>");
	assert_eq!(mail.to[0].email(), "a@example.com");
	assert_eq!(mail.subject, "Order");
	assert_eq!(mail.text.as_deref(), Some("Thanks"));
}

/// Test: Per-call parameters override facade defaults
#[rstest]
fn test_call_parameters_override_defaults(mut mailer: Mailer) {
	// Act
	mailer
		.send(json!({"from": "other@example.com", "to": "a@example.com", "text": "x"}))
		.unwrap();

	// Assert
	let mail = mailer.context().outbox().unwrap().last().unwrap();
	assert_eq!(mail.from.unwrap().email(), "other@example.com");
}

/// Test: Default accessors read and merge facade defaults
#[rstest]
fn test_default_accessors(mut mailer: Mailer) {
	// Act
	mailer.merge_defaults(&Params::from_value(json!({"subject": "Hello", "inline_css": true})));

	// Assert
	assert_eq!(mailer.default("subject"), Some(&json!("Hello")));
	assert_eq!(mailer.default("inline_css"), Some(&json!(true)));
	assert_eq!(mailer.defaults().str("from"), Some("Shop <shop@example.com>"));
	assert!(mailer.default("missing").is_none());
}

/// Test: Two consecutive sends do not share recipients
#[rstest]
fn test_consecutive_sends_use_fresh_drivers(mut mailer: Mailer) {
	// Act
	mailer.send(json!({"to": "a@example.com", "text": "1"})).unwrap();
	mailer.send(json!({"to": "b@example.com", "text": "2"})).unwrap();

	// Assert
	let messages = mailer.context().outbox().unwrap().messages();
	assert_eq!(messages.len(), 2);
	assert_eq!(messages[0].to.len(), 1);
	assert_eq!(messages[0].to[0].email(), "a@example.com");
	assert_eq!(messages[1].to.len(), 1);
	assert_eq!(messages[1].to[0].email(), "b@example.com");
}

/// Test: Mailable instances become the current mailable
#[rstest]
fn test_instance_becomes_current(mut mailer: Mailer) {
	// Arrange
	let mut mailable = Mailable::new();
	mailable.set_to("a@example.com").set_subject("Instance").set_text("t");

	// Act
	let sent = mailer.send(mailable).unwrap();
	let again = mailer.send(MailableSpec::Current).unwrap();

	// Assert
	assert!(sent && again);
	assert_eq!(mailer.current().and_then(Mailable::subject), Some("Instance"));
	assert_eq!(mailer.context().outbox().unwrap().len(), 2);
}

/// Test: Registered mailables are sent by name
#[rstest]
fn test_named_mailable(mut mailer: Mailer) {
	// Arrange
	let welcome = mailer.create_mailable(Params::from_value(json!({
		"to": "new@example.com",
		"subject": "Welcome",
		"text": "Hi",
	})));
	mailer.register_mailable("welcome", welcome);

	// Act
	let sent = mailer.send("welcome").unwrap();

	// Assert
	assert!(sent);
	assert!(mailer.mailable("welcome").is_some_and(Mailable::is_built));
	assert!(mailer.current().is_none());
	let mail = mailer.context().outbox().unwrap().last().unwrap();
	assert_eq!(mail.subject, "Welcome");
}

/// Test: Unknown names are reported
#[rstest]
fn test_unknown_name(mut mailer: Mailer) {
	let result = mailer.render_debug("nope");
	assert!(matches!(result, Err(MailError::MailableNotFound(_))));
}

/// Test: Queue identifiers count up from 1 and carry the schedule and context
#[rstest]
fn test_queue_ids(queue: MemoryQueue) {
	// Arrange
	let context = MailContext::new(MailSettings::memory())
		.unwrap()
		.with_queue(Arc::new(queue.clone()))
		.with_view_engine(Arc::new(
			StringViewEngine::new().with_template("html/message", "<head></head>{{{body}}}"),
		));
	let mut mailer = Mailer::new(context);
	let date = Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap();
	let mut extra = Map::new();
	extra.insert("campaign".to_string(), json!("spring"));

	// Act
	let first = mailer
		.queue(json!({"to": "a@example.com", "subject": "One", "text": "1"}), Some(date), extra)
		.unwrap();
	let second = mailer
		.queue(json!({"to": "b@example.com", "text": "2"}), None, Map::new())
		.unwrap();

	// Assert
	assert_eq!((first, second), (1, 2));
	let entry = queue.get(1).unwrap();
	assert_eq!(entry.scheduled_at, date);
	assert_eq!(entry.subject, "One");
	assert_eq!(entry.to, vec!["a@example.com".to_string()]);
	assert_eq!(entry.context.get("campaign"), Some(&json!("spring")));
	assert_eq!(queue.len(), 2);
	assert!(mailer.context().outbox().unwrap().is_empty());
}

/// Test: render_debug renders the debug view
#[rstest]
fn test_render_debug(mut mailer: Mailer) {
	// Act
	let output = mailer
		.render_debug(json!({"to": "a@example.com", "text": "Inspect me"}))
		.unwrap();

	// Assert
	assert_eq!(output, "debug: Inspect me");
	assert!(mailer.context().outbox().unwrap().is_empty());
}

/// Test: message returns the driver body of the built mailable
#[rstest]
fn test_message(mut mailer: Mailer) {
	// Act
	let body = mailer
		.message(json!({"to": "a@example.com", "text": "Plain", "content_type": "text/plain"}))
		.unwrap();

	// Assert
	assert_eq!(body, "Plain");
}

/// Test: The shared driver is replaced after a reset
#[rstest]
fn test_driver_reset(mailer: Mailer) {
	// Arrange
	let driver = mailer.get_driver().unwrap();
	driver.lock().add_to("a@example.com", None).unwrap();

	// Act
	mailer.reset_driver();
	let fresh = mailer.get_driver().unwrap();

	// Assert
	assert!(!Arc::ptr_eq(&driver, &fresh));
	assert!(fresh.lock().to().is_empty());
}

/// Test: Resource paths resolve below the configured base directory
#[rstest]
fn test_resources(mut mailer: Mailer) {
	// Arrange
	let dir = tempfile::tempdir().unwrap();

	// Act
	let shipped = mailer.resources("/views/mailable").unwrap();
	mailer.set_resources_base_dir(dir.path());
	let custom = mailer.resources("assets/css/styles.css").unwrap();
	mailer.set_resources_base_dir(dir.path().join("missing"));
	let missing = mailer.resources("views");

	// Assert
	assert!(shipped.is_dir());
	assert_eq!(custom, dir.path().join("assets/css/styles.css"));
	assert!(matches!(missing, Err(MailError::Config(_))));
}
