use std::borrow::Cow;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const ELLIPSIS: &str = "...";
const ELLIPSIS_WIDTH: usize = 3;

/// Makes feed-supplied text safe and compact for one line of terminal output.
///
/// Feed titles and descriptions come from arbitrary servers, so control
/// characters and ANSI escape sequences are removed first, newlines and tabs
/// are folded into single spaces, and the result is cut to `max_width`
/// terminal columns with a trailing `...`.
///
/// # Examples
///
/// ```
/// use gator::util::terminal_line;
///
/// assert_eq!(terminal_line("\x1b[31mBreaking\x1b[0m\nnews", 40), "Breaking news");
/// assert_eq!(terminal_line("A very long headline indeed", 12), "A very lo...");
/// ```
pub fn terminal_line(s: &str, max_width: usize) -> String {
    let clean = strip_control_chars(s);
    let folded = clean.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_to_width(&folded, max_width).into_owned()
}

/// Cuts `s` to at most `max_width` columns, appending `...` when text is dropped.
///
/// Widths of 3 or less have no room for the ellipsis and just keep the
/// characters that fit. CJK and emoji count as two columns.
pub fn truncate_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    if UnicodeWidthStr::width(s) <= max_width {
        return Cow::Borrowed(s);
    }

    let budget = if max_width <= ELLIPSIS_WIDTH {
        max_width
    } else {
        max_width - ELLIPSIS_WIDTH
    };

    let mut used = 0;
    let mut cut = 0;
    for (idx, c) in s.char_indices() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        cut = idx + c.len_utf8();
    }

    if max_width <= ELLIPSIS_WIDTH {
        Cow::Owned(s[..cut].to_string())
    } else {
        Cow::Owned(format!("{}{}", &s[..cut], ELLIPSIS))
    }
}

/// Strip terminal control characters and ANSI escape sequences.
///
/// Removes C0 controls other than tab, newline and carriage return, DEL,
/// CSI sequences (`ESC [` ... final byte 0x40-0x7E), OSC sequences
/// (`ESC ]` ... BEL or `ESC \`), and any bare ESC.
///
/// Returns `Cow::Borrowed` when there is nothing to strip.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    fn is_control(c: char) -> bool {
        c == '\x7f' || (c < ' ' && !matches!(c, '\t' | '\n' | '\r'))
    }

    if !s.chars().any(is_control) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\x1b' {
            if !is_control(c) {
                out.push(c);
            }
            continue;
        }

        match chars.peek() {
            Some('[') => {
                chars.next();
                for c in chars.by_ref() {
                    if ('\x40'..='\x7e').contains(&c) {
                        break;
                    }
                }
            }
            Some(']') => {
                chars.next();
                while let Some(c) = chars.next() {
                    if c == '\x07' {
                        break;
                    }
                    if c == '\x1b' && chars.peek() == Some(&'\\') {
                        chars.next();
                        break;
                    }
                }
            }
            _ => {}
        }
    }

    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_fits() {
        assert_eq!(truncate_to_width("Short", 10), "Short");
        assert_eq!(truncate_to_width("12345", 5), "12345");
        assert!(matches!(truncate_to_width("Short", 10), Cow::Borrowed(_)));
    }

    #[test]
    fn test_truncate_with_ellipsis() {
        assert_eq!(truncate_to_width("Hello World", 8), "Hello...");
        assert_eq!(truncate_to_width("Testing", 4), "T...");
    }

    #[test]
    fn test_truncate_wide_chars() {
        // 2 columns per CJK character
        assert_eq!(truncate_to_width("日本語テスト", 7), "日本...");
        assert_eq!(truncate_to_width("日本語", 3), "日");
    }

    #[test]
    fn test_truncate_narrow_widths() {
        assert_eq!(truncate_to_width("Test", 0), "");
        assert_eq!(truncate_to_width("Test", 1), "T");
        assert_eq!(truncate_to_width("Test", 3), "Tes");
    }

    #[test]
    fn test_strip_clean_text_borrowed() {
        let input = "line1\nline2\ttabbed";
        assert!(matches!(strip_control_chars(input), Cow::Borrowed(_)));
    }

    #[test]
    fn test_strip_controls_and_escapes() {
        assert_eq!(strip_control_chars("he\x00ll\x07o\x7f"), "hello");
        assert_eq!(strip_control_chars("\x1b[31mRed\x1b[0m"), "Red");
        assert_eq!(strip_control_chars("\x1b]0;title\x07safe"), "safe");
        assert_eq!(strip_control_chars("\x1b]0;title\x1b\\safe"), "safe");
        assert_eq!(strip_control_chars("before\x1bafter"), "beforeafter");
    }

    #[test]
    fn test_terminal_line_folds_whitespace() {
        assert_eq!(terminal_line("  multi\n\nline\ttitle  ", 80), "multi line title");
    }

    #[test]
    fn test_terminal_line_strips_then_truncates() {
        assert_eq!(
            terminal_line("\x1b[1mBold headline about things\x1b[0m", 16),
            "Bold headline..."
        );
    }
}
