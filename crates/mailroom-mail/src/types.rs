//! Content type and transfer encoding values accepted by mail drivers
//!
//! Both types coerce instead of failing: an unknown content type becomes
//! `multipart/alternative` and an unknown encoding becomes `8bit`.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentType {
	#[default]
	#[serde(rename = "multipart/alternative")]
	MultipartAlternative,
	#[serde(rename = "text/html")]
	TextHtml,
	#[serde(rename = "text/plain")]
	TextPlain,
}

impl ContentType {
	/// Parse a content type, coercing anything unknown to `multipart/alternative`.
	///
	/// # Examples
	///
	/// ```
	/// use mailroom_mail::ContentType;
	///
	/// assert_eq!(ContentType::parse("TEXT/HTML"), ContentType::TextHtml);
	/// assert_eq!(ContentType::parse("bogus"), ContentType::MultipartAlternative);
	/// ```
	pub fn parse(value: &str) -> Self {
		match value.trim().to_ascii_lowercase().as_str() {
			"text/html" => Self::TextHtml,
			"text/plain" => Self::TextPlain,
			_ => Self::MultipartAlternative,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Self::MultipartAlternative => "multipart/alternative",
			Self::TextHtml => "text/html",
			Self::TextPlain => "text/plain",
		}
	}

	pub fn has_html(&self) -> bool {
		matches!(self, Self::MultipartAlternative | Self::TextHtml)
	}

	pub fn has_text(&self) -> bool {
		matches!(self, Self::MultipartAlternative | Self::TextPlain)
	}
}

impl fmt::Display for ContentType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Content transfer encoding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Encoding {
	#[default]
	#[serde(rename = "8bit")]
	EightBit,
	#[serde(rename = "7bit")]
	SevenBit,
	#[serde(rename = "binary")]
	Binary,
	#[serde(rename = "base64")]
	Base64,
	#[serde(rename = "quoted-printable")]
	QuotedPrintable,
}

impl Encoding {
	/// Parse an encoding, coercing anything unknown to `8bit`.
	pub fn parse(value: &str) -> Self {
		match value.trim().to_ascii_lowercase().as_str() {
			"7bit" => Self::SevenBit,
			"binary" => Self::Binary,
			"base64" => Self::Base64,
			"quoted-printable" => Self::QuotedPrintable,
			_ => Self::EightBit,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Self::EightBit => "8bit",
			Self::SevenBit => "7bit",
			Self::Binary => "binary",
			Self::Base64 => "base64",
			Self::QuotedPrintable => "quoted-printable",
		}
	}

	/// Equivalent lettre header value
	pub(crate) fn to_lettre(self) -> lettre::message::header::ContentTransferEncoding {
		use lettre::message::header::ContentTransferEncoding as Cte;
		match self {
			Self::EightBit => Cte::EightBit,
			Self::SevenBit => Cte::SevenBit,
			Self::Binary => Cte::Binary,
			Self::Base64 => Cte::Base64,
			Self::QuotedPrintable => Cte::QuotedPrintable,
		}
	}
}

impl fmt::Display for Encoding {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("multipart/alternative", ContentType::MultipartAlternative)]
	#[case("text/html", ContentType::TextHtml)]
	#[case(" Text/Plain ", ContentType::TextPlain)]
	#[case("bogus", ContentType::MultipartAlternative)]
	#[case("", ContentType::MultipartAlternative)]
	fn test_content_type_parse(#[case] raw: &str, #[case] expected: ContentType) {
		assert_eq!(ContentType::parse(raw), expected);
	}

	#[rstest]
	#[case("8bit", Encoding::EightBit)]
	#[case("7BIT", Encoding::SevenBit)]
	#[case("binary", Encoding::Binary)]
	#[case("base64", Encoding::Base64)]
	#[case("quoted-printable", Encoding::QuotedPrintable)]
	#[case("bogus", Encoding::EightBit)]
	fn test_encoding_parse(#[case] raw: &str, #[case] expected: Encoding) {
		assert_eq!(Encoding::parse(raw), expected);
	}

	#[rstest]
	fn test_content_type_parts() {
		assert!(ContentType::MultipartAlternative.has_html());
		assert!(ContentType::MultipartAlternative.has_text());
		assert!(ContentType::TextHtml.has_html());
		assert!(!ContentType::TextHtml.has_text());
		assert!(!ContentType::TextPlain.has_html());
		assert!(ContentType::TextPlain.has_text());
	}
}
