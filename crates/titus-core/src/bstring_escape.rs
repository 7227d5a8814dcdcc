use std::borrow::Cow;
use std::fmt::{Display, Formatter};

/// Escape nonprinting characters in the input using Rust character escape syntax.
pub fn escape_nonprinting(s: &str) -> Cow<'_, str> {
    for (i, c) in s.char_indices() {
        if c.is_control() && !c.is_whitespace() {
            let mut esc = String::with_capacity(s.len());
            esc.push_str(&s[..i]);
            for c in s[i..].chars() {
                if c.is_control() && !c.is_whitespace() {
                    esc.extend(c.escape_unicode());
                } else {
                    esc.push(c);
                }
            }
            return Cow::Owned(esc);
        }
    }
    Cow::Borrowed(s)
}

/// A wrapper around a byte slice that displays it lossily decoded as UTF-8, with nonprinting
/// characters escaped and ANSI codes stripped.
pub struct Escaped<'a>(pub &'a [u8]);

impl<'a> Display for Escaped<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = String::from_utf8_lossy(self.0);
        let s = escape_nonprinting(&s);
        let s = console::strip_ansi_codes(&s);
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn leaves_plain_text_unchanged() {
        assert_eq!(escape_nonprinting("hello world"), "hello world");
    }

    #[test]
    fn escapes_control_characters() {
        assert_eq!(escape_nonprinting("a\u{1}b"), "a\\u{1}b");
    }

    #[test]
    fn preserves_whitespace() {
        assert_eq!(escape_nonprinting("a\tb\nc"), "a\tb\nc");
    }
}
