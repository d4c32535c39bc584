//! Recipient and attachment parser tests

use mailroom_mail::{Contact, parse_attachments, parse_contacts};
use rstest::*;
use serde_json::{Value, json};
use std::fs;
use tempfile::TempDir;

fn emails(contacts: &[Contact]) -> Vec<&str> {
	contacts.iter().map(Contact::email).collect()
}

/// Test: Every parsed contact carries a valid address and no empty name
#[rstest]
#[case(json!("a@x.com"))]
#[case(json!(["a@x.com", "b@x.com", "nope"]))]
#[case(json!([["a@x.com", ""], {"email": "b@x.com", "name": ""}, "<c@x.com>"]))]
#[case(json!({"email": "a@x.com", "name": "A"}))]
#[case(json!([[["a@x.com", "A"]], [["b@x.com"]]]))]
fn test_parsed_contacts_are_valid(#[case] spec: Value) {
	// Act
	let contacts = parse_contacts(&spec).unwrap();

	// Assert
	for contact in &contacts {
		assert!(mailroom_mail::is_valid_email(contact.email()));
		assert_ne!(contact.name(), Some(""));
	}
}

/// Test: Specifications without a valid address yield nothing
#[rstest]
#[case(Value::Null)]
#[case(json!(""))]
#[case(json!("not-an-email"))]
#[case(json!([]))]
#[case(json!(["nope", ["also", "bad"]]))]
#[case(json!({"name": "No address"}))]
#[case(json!(42))]
fn test_no_valid_address(#[case] spec: Value) {
	assert!(parse_contacts(&spec).is_none());
}

/// Test: Mixed nesting keeps the order of appearance
#[rstest]
fn test_nested_order_is_preserved() {
	// Arrange
	let spec = json!([
		"first@x.com",
		["second@x.com", "Second"],
		[{"email": "third@x.com"}, "Fourth <fourth@x.com>"],
		"first@x.com",
	]);

	// Act
	let contacts = parse_contacts(&spec).unwrap();

	// Assert
	assert_eq!(
		emails(&contacts),
		vec!["first@x.com", "second@x.com", "third@x.com", "fourth@x.com", "first@x.com"]
	);
	assert_eq!(contacts[1].name(), Some("Second"));
	assert_eq!(contacts[3].name(), Some("Fourth"));
}

/// Test: A pair of two addresses is two recipients, not an address and a name
#[rstest]
fn test_pair_of_addresses_is_two_recipients() {
	// Act
	let contacts = parse_contacts(&json!(["a@x.com", "b@x.com"])).unwrap();

	// Assert
	assert_eq!(emails(&contacts), vec!["a@x.com", "b@x.com"]);
	assert!(contacts.iter().all(|c| c.name().is_none()));
}

/// Test: Contact renders as `Name <email>` or the bare address
#[rstest]
fn test_contact_display() {
	// Arrange
	let named = Contact::parse(json!(["a@x.com", "Alice"])).unwrap();
	let bare = Contact::parse("b@x.com").unwrap();

	// Assert
	assert_eq!(named.to_string(), "Alice <a@x.com>");
	assert_eq!(bare.to_string(), "b@x.com");
}

#[fixture]
fn files() -> TempDir {
	let dir = tempfile::tempdir().unwrap();
	fs::write(dir.path().join("invoice.pdf"), b"%PDF").unwrap();
	fs::write(dir.path().join("photo.png"), [0x89, b'P', b'N', b'G']).unwrap();
	dir
}

fn path_of(dir: &TempDir, name: &str) -> String {
	dir.path().join(name).to_string_lossy().into_owned()
}

/// Test: Only existing files are kept, in order
#[rstest]
fn test_attachments_keep_existing_files(files: TempDir) {
	// Arrange
	let spec = json!([
		path_of(&files, "photo.png"),
		path_of(&files, "missing.txt"),
		path_of(&files, "invoice.pdf"),
	]);

	// Act
	let attachments = parse_attachments(&spec);

	// Assert
	let names: Vec<String> = attachments.iter().map(|a| a.display_name()).collect();
	assert_eq!(names, vec!["photo.png", "invoice.pdf"]);
	assert!(attachments.iter().all(|a| a.path().is_file()));
}

/// Test: Tuples carry the name, mime type and encoding of an attachment
#[rstest]
fn test_attachment_tuple(files: TempDir) {
	// Arrange
	let spec = json!([[path_of(&files, "invoice.pdf"), "Invoice 42.pdf", "application/x-custom", "base64"]]);

	// Act
	let attachments = parse_attachments(&spec);

	// Assert
	assert_eq!(attachments.len(), 1);
	let attachment = &attachments[0];
	assert_eq!(attachment.display_name(), "Invoice 42.pdf");
	assert_eq!(attachment.content_type(), "application/x-custom");
	assert_eq!(attachment.encoding(), Some("base64"));
}

/// Test: Object entries read path, name and mime type
#[rstest]
fn test_attachment_object(files: TempDir) {
	// Arrange
	let spec = json!([
		{"path": path_of(&files, "photo.png"), "name": "cat.png"},
		{"path": path_of(&files, "gone.png")},
	]);

	// Act
	let attachments = parse_attachments(&spec);

	// Assert
	assert_eq!(attachments.len(), 1);
	assert_eq!(attachments[0].display_name(), "cat.png");
	assert_eq!(attachments[0].content_type(), "image/png");
}

/// Test: Non-path values are skipped
#[rstest]
#[case(Value::Null)]
#[case(json!(true))]
#[case(json!([1, 2, null]))]
#[case(json!([[]]))]
fn test_attachment_garbage(#[case] spec: Value) {
	assert!(parse_attachments(&spec).is_empty());
}
