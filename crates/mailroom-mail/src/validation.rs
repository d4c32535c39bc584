//! Email address and header validation

use crate::{MailError, MailResult};
use regex::Regex;
use std::sync::LazyLock;

/// Maximum length of an email address (RFC 5321 path limit minus brackets)
pub const MAX_EMAIL_LENGTH: usize = 254;

static LOCAL_PART: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+(\.[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+)*$")
		.expect("local part pattern is valid")
});

static DOMAIN_LABEL: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?$").expect("label pattern is valid")
});

/// Validate the syntax of an email address.
///
/// The domain is converted to ASCII with IDNA before its labels are checked,
/// so internationalized domains are accepted. At least two labels are required.
///
/// # Examples
///
/// ```
/// use mailroom_mail::validation::validate_email;
///
/// assert!(validate_email("user@example.com").is_ok());
/// assert!(validate_email("user@bücher.example").is_ok());
/// assert!(validate_email("not-an-email").is_err());
/// assert!(validate_email("user@localhost").is_err());
/// ```
pub fn validate_email(email: &str) -> MailResult<()> {
	let invalid = || MailError::InvalidAddress(email.to_string());

	if email.is_empty() || email.len() > MAX_EMAIL_LENGTH {
		return Err(invalid());
	}

	let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
	if local.is_empty() || local.len() > 64 || domain.contains('@') {
		return Err(invalid());
	}
	if !LOCAL_PART.is_match(local) {
		return Err(invalid());
	}

	let ascii_domain = idna::domain_to_ascii(domain).map_err(|_| invalid())?;
	let labels: Vec<&str> = ascii_domain.split('.').collect();
	if labels.len() < 2 || !labels.iter().all(|label| DOMAIN_LABEL.is_match(label)) {
		return Err(invalid());
	}

	Ok(())
}

/// Boolean form of [`validate_email`].
pub fn is_valid_email(email: &str) -> bool {
	validate_email(email).is_ok()
}

/// Reject header values carrying line breaks.
pub fn check_header_injection(value: &str) -> MailResult<()> {
	if value.contains('\r') || value.contains('\n') {
		return Err(MailError::HeaderInjection(value.to_string()));
	}
	Ok(())
}
