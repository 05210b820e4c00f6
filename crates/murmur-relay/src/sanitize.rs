//! Markup stripping for message bodies.
//!
//! Every `<...>` run is removed in a single left-to-right pass. This is not
//! an HTML sanitizer: it only keeps naive clients that render bodies as
//! markup from picking up injected tags.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;

/// A `<`, any run of non-`>` characters, then `>`.
fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"))
}

/// Remove all angle-bracket tag sequences from `body`.
///
/// Borrows when there is nothing to strip.
pub fn strip_tags(body: &str) -> Cow<'_, str> {
    tag_regex().replace_all(body, "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_borrowed() {
        let out = strip_tags("just words");
        assert!(matches!(out, Cow::Borrowed("just words")));
    }

    #[test]
    fn test_script_tags_removed() {
        assert_eq!(
            strip_tags("hello <script>bad</script> world"),
            "hello bad world"
        );
    }

    #[test]
    fn test_attributes_and_case() {
        assert_eq!(
            strip_tags(r#"<B>bold</B> and <a href="x">link</A>"#),
            "bold and link"
        );
    }

    #[test]
    fn test_empty_brackets_removed() {
        assert_eq!(strip_tags("a<>b"), "ab");
        assert_eq!(strip_tags("<><>"), "");
    }

    #[test]
    fn test_single_pass_not_recursive() {
        // A stray `<` is swallowed into the following tag.
        assert_eq!(strip_tags("<<b>>"), ">");
        assert_eq!(strip_tags("<scr<b>ipt>"), "ipt>");
    }

    #[test]
    fn test_unclosed_bracket_kept() {
        assert_eq!(strip_tags("1 < 2 and 3 > 2"), "1  2");
        assert_eq!(strip_tags("a < b"), "a < b");
    }
}
