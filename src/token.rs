// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use crate::location::Location;

/// A single preprocessing token.
///
/// The classification flags (`name`, `number`, `comment`, `op`) are derived
/// from the lexeme and are recomputed whenever the lexeme changes. The lexeme
/// itself is private so that every mutation goes through [`Token::set_str`],
/// which keeps the flags consistent.
///
/// See: https://gcc.gnu.org/onlinedocs/cpp/Tokenization.html
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Token {
    /// The lexeme. Includes the quotes for string and character literals,
    /// and the leading sign for negative numbers produced by constant
    /// folding.
    lexeme: String,

    /// True when the lexeme starts with a letter or underscore.
    pub name: bool,

    /// True when the lexeme starts with a digit, or with `-` followed by
    /// a digit. Negative numbers only arise from constant folding; the
    /// lexer never merges a `-` into a number.
    pub number: bool,

    /// True when the lexeme starts with `//` or `/*`, i.e. a comment.
    pub comment: bool,

    /// The single ASCII character of a one-byte lexeme, `\0` otherwise.
    pub op: char,

    /// Where the token was read from.
    pub location: Location,

    /// The name of the macro whose expansion produced this token,
    /// or empty for raw source tokens.
    pub macro_name: String,
}

impl Token {
    pub fn new(lexeme: impl Into<String>, location: Location) -> Self {
        let mut token = Self {
            lexeme: lexeme.into(),
            name: false,
            number: false,
            comment: false,
            op: '\0',
            location,
            macro_name: String::new(),
        };
        token.classify();
        token
    }

    pub fn str(&self) -> &str {
        &self.lexeme
    }

    /// Replaces the lexeme and recomputes the classification flags.
    /// This is the only mutation point for the lexeme, so the flags can
    /// never go stale (e.g. after `##` pasting).
    pub fn set_str(&mut self, lexeme: impl Into<String>) {
        self.lexeme = lexeme.into();
        self.classify();
    }

    fn classify(&mut self) {
        let bytes = self.lexeme.as_bytes();
        let first = bytes.first().copied().unwrap_or(0);

        self.name = first == b'_' || first.is_ascii_alphabetic();
        self.number = first.is_ascii_digit()
            || (first == b'-' && bytes.len() > 1 && bytes[1].is_ascii_digit());
        self.comment =
            first == b'/' && bytes.len() > 1 && (bytes[1] == b'/' || bytes[1] == b'*');
        self.op = if bytes.len() == 1 {
            first as char
        } else {
            '\0'
        };
    }
}

#[cfg(test)]
mod tests {
    use crate::{location::Location, token::Token};
    use pretty_assertions::assert_eq;

    fn flags(lexeme: &str) -> (bool, bool, bool, char) {
        let token = Token::new(lexeme, Location::default());
        (token.name, token.number, token.comment, token.op)
    }

    #[test]
    fn test_classify_name() {
        assert_eq!(flags("abc"), (true, false, false, '\0'));
        assert_eq!(flags("_x"), (true, false, false, '\0'));
        assert_eq!(flags("x1"), (true, false, false, '\0'));
    }

    #[test]
    fn test_classify_number() {
        assert_eq!(flags("123"), (false, true, false, '\0'));
        assert_eq!(flags("0x1f"), (false, true, false, '\0'));

        // A negative number produced by constant folding is still a number.
        assert_eq!(flags("-7"), (false, true, false, '\0'));

        // A lone minus sign is an operator, not a number.
        assert_eq!(flags("-"), (false, false, false, '-'));
    }

    #[test]
    fn test_classify_comment() {
        assert_eq!(flags("// hello"), (false, false, true, '\0'));
        assert_eq!(flags("/* hi */"), (false, false, true, '\0'));

        // Division operators are not comments.
        assert_eq!(flags("/"), (false, false, false, '/'));
        assert_eq!(flags("/="), (false, false, false, '\0'));
    }

    #[test]
    fn test_classify_operator() {
        assert_eq!(flags("#"), (false, false, false, '#'));
        assert_eq!(flags("("), (false, false, false, '('));

        // Multi-byte operators carry no `op` shortcut.
        assert_eq!(flags("##"), (false, false, false, '\0'));
        assert_eq!(flags("<="), (false, false, false, '\0'));
    }

    #[test]
    fn test_set_str_recomputes_flags() {
        let mut token = Token::new("x", Location::default());
        assert!(token.name);

        // Simulates `##` pasting: "x" + "2" -> "x2" stays a name,
        // while "1" + "2" -> "12" becomes a number.
        token.set_str("12");
        assert!(!token.name);
        assert!(token.number);
        assert_eq!(token.op, '\0');
    }
}
