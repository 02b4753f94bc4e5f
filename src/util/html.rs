use std::borrow::Cow;

/// Decodes HTML character references, leaving anything unrecognised as-is.
///
/// Feed producers routinely double-encode text, so after the XML layer has
/// decoded `&amp;amp;` to `&amp;` the title still needs one more pass.
/// A bare `&` or an unknown entity is kept verbatim and never fails the
/// field.
///
/// Returns `Cow::Borrowed` when there is nothing to decode.
///
/// # Examples
///
/// ```
/// use gator::util::unescape_entities;
///
/// assert_eq!(unescape_entities("A &amp; B"), "A & B");
/// assert_eq!(unescape_entities("it&#39;s"), "it's");
/// assert_eq!(unescape_entities("Tom & Jerry"), "Tom & Jerry");
/// ```
pub fn unescape_entities(s: &str) -> Cow<'_, str> {
    html_escape::decode_html_entities(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_named_entities() {
        assert_eq!(unescape_entities("A &amp; B"), "A & B");
        assert_eq!(unescape_entities("&lt;b&gt;bold&lt;/b&gt;"), "<b>bold</b>");
        assert_eq!(unescape_entities("&quot;quoted&quot;"), "\"quoted\"");
        assert_eq!(unescape_entities("caf&eacute;"), "café");
    }

    #[test]
    fn test_numeric_entities() {
        assert_eq!(unescape_entities("it&#39;s"), "it's");
        assert_eq!(unescape_entities("&#x2014;"), "\u{2014}");
    }

    #[test]
    fn test_single_pass_only() {
        // One layer of encoding is removed per call
        assert_eq!(unescape_entities("&amp;amp;"), "&amp;");
    }

    #[test]
    fn test_bare_ampersand_preserved() {
        assert_eq!(unescape_entities("Tom & Jerry"), "Tom & Jerry");
        assert_eq!(unescape_entities("a&b"), "a&b");
        assert_eq!(unescape_entities("trailing &"), "trailing &");
    }

    #[test]
    fn test_unknown_entity_preserved_next_to_known() {
        assert_eq!(unescape_entities("&bogus; &amp; &"), "&bogus; & &");
    }

    #[test]
    fn test_clean_text_is_borrowed() {
        let result = unescape_entities("plain title");
        assert!(matches!(result, Cow::Borrowed(_)));
    }

    #[test]
    fn test_multibyte_text_around_entities() {
        assert_eq!(unescape_entities("日本&amp;語 &"), "日本&語 &");
    }

    proptest! {
        #[test]
        fn prop_text_without_ampersand_unchanged(s in "[^&]*") {
            prop_assert_eq!(unescape_entities(&s), s.as_str());
        }

        #[test]
        fn prop_never_panics_on_arbitrary_input(s in ".*") {
            let _ = unescape_entities(&s);
        }
    }
}
