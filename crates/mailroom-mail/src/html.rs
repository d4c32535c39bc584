//! HTML helpers used while resolving message bodies

use crate::{MailError, MailResult};
use css_inline::CSSInliner;
use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

/// Column width of text derived from html
pub const TEXT_WIDTH: usize = 78;

static HEAD_TAG: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"(?i)<head(\s[^>]*)?>").expect("head pattern is valid"));

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

/// Whether the document carries an opening `<head>` element.
///
/// # Examples
///
/// ```
/// use mailroom_mail::html::has_html_head;
///
/// assert!(has_html_head("<html><HEAD lang=\"en\"></HEAD><body></body></html>"));
/// assert!(!has_html_head("<p>Hello</p>"));
/// assert!(!has_html_head("<header>Top</header>"));
/// ```
pub fn has_html_head(html: &str) -> bool {
	HEAD_TAG.is_match(html)
}

/// Layout-aware plain text rendering of an html document.
pub fn html_to_text(html: &str) -> String {
	match html2text::config::plain().string_from_read(html.as_bytes(), TEXT_WIDTH) {
		Ok(text) => text.trim_end().to_string(),
		Err(e) => {
			tracing::warn!(error = %e, "html to text conversion failed, stripping tags");
			let stripped = TAG.replace_all(html, "");
			html_escape::decode_html_entities(stripped.trim()).into_owned()
		}
	}
}

/// Move the rules of `css` into `style` attributes of `html`.
pub fn inline_css(html: &str, css: &str) -> MailResult<String> {
	CSSInliner::options()
		.load_remote_stylesheets(false)
		.extra_css(Some(Cow::Owned(css.to_string())))
		.build()
		.inline(html)
		.map_err(|e| MailError::Template(format!("css inlining failed: {}", e)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("<html><head></head><body></body></html>", true)]
	#[case("<head>", true)]
	#[case("<Head data-x=\"1\">", true)]
	#[case("<p>No head here</p>", false)]
	#[case("<header>Banner</header>", false)]
	#[case("<headline>", false)]
	#[case("", false)]
	fn test_has_html_head(#[case] html: &str, #[case] expected: bool) {
		assert_eq!(has_html_head(html), expected);
	}

	#[rstest]
	fn test_html_to_text_keeps_content() {
		// Act
		let text = html_to_text("<html><body><h1>Title</h1><p>Hello world</p></body></html>");

		// Assert
		assert!(text.contains("Title"));
		assert!(text.contains("Hello world"));
		assert!(!text.contains("<p>"));
	}

	#[rstest]
	fn test_inline_css_applies_rules() {
		// Arrange
		let html = "<html><head></head><body><p>Hi</p></body></html>";

		// Act
		let inlined = inline_css(html, "p { color: red; }").unwrap();

		// Assert
		assert!(inlined.contains("style="));
		assert!(inlined.contains("color: red"));
	}
}
