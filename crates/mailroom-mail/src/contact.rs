//! Recipient parsing
//!
//! Recipients may be described as a single string (`"a@b.com"` or
//! `"Name <a@b.com>"`), a `[email, name]` pair, an `{email, name}` object,
//! or any list nesting of those forms. [`parse_contacts`] normalizes all of
//! them into [`Contact`] values and silently drops entries that do not hold
//! a valid address.

use crate::validation::is_valid_email;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A validated recipient address with an optional display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Contact {
	email: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	name: Option<String>,
}

impl Contact {
	/// Build a contact from already validated parts. An empty name is dropped.
	pub(crate) fn new(email: impl Into<String>, name: Option<String>) -> Self {
		Self {
			email: email.into(),
			name: name.filter(|n| !n.is_empty()),
		}
	}

	/// Parse a single contact, keeping the first valid entry.
	///
	/// # Examples
	///
	/// ```
	/// use mailroom_mail::Contact;
	///
	/// let contact = Contact::parse("\"Jane Doe\" <jane@example.com>").unwrap();
	/// assert_eq!(contact.email(), "jane@example.com");
	/// assert_eq!(contact.name(), Some("Jane Doe"));
	/// ```
	pub fn parse(spec: impl Into<Value>) -> Option<Self> {
		parse_contacts(&spec.into()).and_then(|contacts| contacts.into_iter().next())
	}

	pub fn email(&self) -> &str {
		&self.email
	}

	pub fn name(&self) -> Option<&str> {
		self.name.as_deref()
	}

	/// `Name <email>` when a name is present, the bare address otherwise.
	pub fn linearize(&self) -> String {
		self.to_string()
	}
}

impl fmt::Display for Contact {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.name {
			Some(name) => write!(f, "{} <{}>", name, self.email),
			None => f.write_str(&self.email),
		}
	}
}

/// Linearize a list of contacts for display in templates.
pub fn linearize_contacts(contacts: &[Contact]) -> Vec<String> {
	contacts.iter().map(Contact::linearize).collect()
}

/// Normalize a recipient value into a contact list.
///
/// Returns `None` when no valid contact remains.
///
/// A two element list `[a, b]` of strings is read as a single
/// `(email, name)` pair only when `a` is a valid address and `b` is not;
/// otherwise every element is parsed as an independent contact.
///
/// # Examples
///
/// ```
/// use mailroom_mail::contact::parse_contacts;
/// use serde_json::json;
///
/// let pair = parse_contacts(&json!(["a@b.com", "Not An Email"])).unwrap();
/// assert_eq!(pair.len(), 1);
/// assert_eq!(pair[0].name(), Some("Not An Email"));
///
/// let list = parse_contacts(&json!(["a@b.com", "c@d.com"])).unwrap();
/// assert_eq!(list.len(), 2);
///
/// assert!(parse_contacts(&json!("not-an-email")).is_none());
/// ```
pub fn parse_contacts(spec: &Value) -> Option<Vec<Contact>> {
	let contacts = collect_contacts(spec, Vec::new());
	if contacts.is_empty() {
		None
	} else {
		Some(contacts)
	}
}

fn collect_contacts(spec: &Value, mut acc: Vec<Contact>) -> Vec<Contact> {
	match spec {
		Value::String(s) => {
			if let Some(contact) = parse_contact_string(s) {
				acc.push(contact);
			}
			acc
		}
		Value::Array(items) => {
			if let Some(contact) = as_pair(items) {
				acc.push(contact);
				return acc;
			}
			items
				.iter()
				.fold(acc, |acc, item| collect_contacts(item, acc))
		}
		Value::Object(map) => {
			let email = map.get("email").and_then(Value::as_str).map(str::trim);
			if let Some(email) = email.filter(|e| is_valid_email(e)) {
				let name = map
					.get("name")
					.and_then(Value::as_str)
					.map(|n| n.trim().to_string());
				acc.push(Contact::new(email, name));
			}
			acc
		}
		_ => acc,
	}
}

fn as_pair(items: &[Value]) -> Option<Contact> {
	let [Value::String(email), Value::String(name)] = items else {
		return None;
	};
	if is_valid_email(email) && !is_valid_email(name) {
		Some(Contact::new(email.as_str(), Some(name.clone())))
	} else {
		None
	}
}

fn parse_contact_string(raw: &str) -> Option<Contact> {
	let (email, name) = match raw.find('<') {
		Some(pos) => {
			let name = raw[..pos].replace('"', "").trim().to_string();
			let email = raw[pos + 1..].replace('>', "").trim().to_string();
			(email, Some(name))
		}
		None => (raw.trim().to_string(), None),
	};

	if !email.is_empty() && is_valid_email(&email) {
		Some(Contact::new(email, name))
	} else {
		None
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	fn test_bare_address() {
		// Act
		let contacts = parse_contacts(&json!("a@x.com")).unwrap();

		// Assert
		assert_eq!(contacts, vec![Contact::new("a@x.com", None)]);
		assert_eq!(contacts[0].name(), None);
	}

	#[rstest]
	#[case("Jane <jane@example.com>", "Jane")]
	#[case("\"Jane Doe\" <jane@example.com>", "Jane Doe")]
	#[case("  Jane Doe   < jane@example.com > ", "Jane Doe")]
	fn test_bracket_form(#[case] raw: &str, #[case] name: &str) {
		// Act
		let contacts = parse_contacts(&json!(raw)).unwrap();

		// Assert
		assert_eq!(contacts.len(), 1);
		assert_eq!(contacts[0].email(), "jane@example.com");
		assert_eq!(contacts[0].name(), Some(name));
	}

	#[rstest]
	fn test_bracket_without_name() {
		// Act
		let contacts = parse_contacts(&json!("<jane@example.com>")).unwrap();

		// Assert
		assert_eq!(contacts[0].name(), None);
	}

	#[rstest]
	fn test_pair_with_empty_name_omits_name() {
		// Act
		let contacts = parse_contacts(&json!(["a@b.com", ""])).unwrap();

		// Assert
		assert_eq!(contacts, vec![Contact::new("a@b.com", None)]);
	}

	#[rstest]
	fn test_pair_with_invalid_email_is_two_entries() {
		// Act
		let contacts = parse_contacts(&json!(["broken", "Name"]));

		// Assert
		assert!(contacts.is_none());
	}

	#[rstest]
	fn test_record_form() {
		// Act
		let contacts =
			parse_contacts(&json!({"email": "a@b.com", "name": "Alice"})).unwrap();

		// Assert
		assert_eq!(contacts, vec![Contact::new("a@b.com", Some("Alice".into()))]);
	}

	#[rstest]
	fn test_record_without_valid_email_is_dropped() {
		assert!(parse_contacts(&json!({"name": "Alice"})).is_none());
		assert!(parse_contacts(&json!({"email": "nope", "name": "Alice"})).is_none());
	}

	#[rstest]
	fn test_mixed_nesting_preserves_order() {
		// Arrange
		let spec = json!([
			"first@example.com",
			["second@example.com", "Second"],
			[["third@example.com"], {"email": "fourth@example.com"}],
			"invalid",
			42,
			null,
			"Fifth <fifth@example.com>"
		]);

		// Act
		let contacts = parse_contacts(&spec).unwrap();

		// Assert
		let emails: Vec<&str> = contacts.iter().map(Contact::email).collect();
		assert_eq!(
			emails,
			vec![
				"first@example.com",
				"second@example.com",
				"third@example.com",
				"fourth@example.com",
				"fifth@example.com"
			]
		);
		assert_eq!(contacts[1].name(), Some("Second"));
		assert_eq!(contacts[4].name(), Some("Fifth"));
	}

	#[rstest]
	fn test_deep_nesting() {
		// Arrange
		let mut spec = json!("deep@example.com");
		for _ in 0..64 {
			spec = json!([spec]);
		}

		// Act
		let contacts = parse_contacts(&spec).unwrap();

		// Assert
		assert_eq!(contacts[0].email(), "deep@example.com");
	}

	#[rstest]
	#[case(json!(null))]
	#[case(json!(true))]
	#[case(json!([]))]
	#[case(json!({}))]
	#[case(json!(""))]
	fn test_empty_specs(#[case] spec: Value) {
		assert!(parse_contacts(&spec).is_none());
	}

	#[rstest]
	fn test_linearize() {
		// Arrange
		let contacts = vec![
			Contact::new("a@b.com", Some("Alice".into())),
			Contact::new("c@d.com", None),
		];

		// Act / Assert
		assert_eq!(
			linearize_contacts(&contacts),
			vec!["Alice <a@b.com>".to_string(), "c@d.com".to_string()]
		);
	}
}
