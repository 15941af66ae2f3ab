//! Shared character-cursor primitives used by both the path compiler and
//! the filter-expression parser (spec §4.2 lexical rules, §4.3 grammar).

use std::iter::Peekable;
use std::str::Chars;

use crate::error::{Error, Result};

pub(crate) struct Cursor<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    pub(crate) fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    pub(crate) fn peek2(&self) -> Option<char> {
        let mut c = self.chars.clone();
        c.next();
        c.next()
    }

    pub(crate) fn bump(&mut self) -> Option<char> {
        self.chars.next()
    }

    pub(crate) fn eat(&mut self, expect: char) -> bool {
        if self.peek() == Some(expect) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Consumes `s` only if it matches in full, leaving the cursor
    /// untouched on a partial match.
    pub(crate) fn eat_str(&mut self, s: &str) -> bool {
        let mut probe = self.chars.clone();
        for expected in s.chars() {
            match probe.next() {
                Some(c) if c == expected => {}
                _ => return false,
            }
        }
        self.chars = probe;
        true
    }

    pub(crate) fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t')) {
            self.bump();
        }
    }

    pub(crate) fn at_end(&mut self) -> bool {
        self.peek().is_none()
    }

    /// Reads an unquoted step/ident name: anything up to the next
    /// structural delimiter (`/`, `[`, `]`, whitespace, or end).
    pub(crate) fn read_bare_name(&mut self) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c == '/' || c == '[' || c == ']' || c.is_whitespace() {
                break;
            }
            out.push(c);
            self.bump();
        }
        out
    }

    /// Reads a quoted name (`'...'` or `"..."`), handling embedded escaped
    /// quotes of the *other* kind or `\\` + same-kind escape.
    pub(crate) fn read_quoted(&mut self) -> Result<String> {
        let quote = self
            .bump()
            .ok_or_else(|| Error::PathSyntaxError("expected quote".into()))?;
        if quote != '\'' && quote != '"' {
            return Err(Error::PathSyntaxError("expected quote".into()));
        }
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(Error::PathSyntaxError("unterminated quoted name".into())),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => match self.bump() {
                    Some(c) => out.push(c),
                    None => return Err(Error::PathSyntaxError("unterminated quoted name".into())),
                },
                Some(c) => out.push(c),
            }
        }
    }

    /// Reads a bare name in a filter path reference (`@.name`): stops at
    /// the next `.`, `[`, `]`, whitespace, or comparison/logical operator.
    pub(crate) fn read_path_name(&mut self) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c == '.' || c == '[' || c == ']' || c.is_whitespace() || matches!(c, '&' | '|' | ')' | '=' | '!' | '<' | '>') {
                break;
            }
            out.push(c);
            self.bump();
        }
        out
    }

    pub(crate) fn read_ident(&mut self) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                out.push(c);
                self.bump();
            } else {
                break;
            }
        }
        out
    }

    pub(crate) fn read_signed_int(&mut self) -> Result<i64> {
        let mut out = String::new();
        if self.peek() == Some('-') {
            out.push('-');
            self.bump();
        }
        let mut any = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                out.push(c);
                self.bump();
                any = true;
            } else {
                break;
            }
        }
        if !any {
            return Err(Error::PathSyntaxError(format!("expected integer near {:?}", out)));
        }
        out.parse()
            .map_err(|_| Error::PathSyntaxError(format!("invalid integer {:?}", out)))
    }

    pub(crate) fn read_number_literal(&mut self) -> Result<f64> {
        let mut out = String::new();
        if self.peek() == Some('-') {
            out.push('-');
            self.bump();
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '.' {
                out.push(c);
                self.bump();
            } else {
                break;
            }
        }
        out.parse()
            .map_err(|_| Error::PathSyntaxError(format!("invalid number {:?}", out)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eat_str_does_not_consume_on_partial_match() {
        let mut cur = Cursor::new("=x");
        assert!(!cur.eat_str("=="));
        assert_eq!(cur.peek(), Some('='));
        assert!(cur.eat_str("=x"));
        assert!(cur.at_end());
    }

    #[test]
    fn read_quoted_handles_escaped_quotes() {
        let mut cur = Cursor::new(r#"'it\'s here'"#);
        assert_eq!(cur.read_quoted().unwrap(), "it's here");
    }

    #[test]
    fn read_bare_name_stops_at_delimiters() {
        let mut cur = Cursor::new("name[0]/rest");
        assert_eq!(cur.read_bare_name(), "name");
        assert_eq!(cur.peek(), Some('['));
    }

    #[test]
    fn read_path_name_stops_at_operators() {
        let mut cur = Cursor::new("active==true");
        assert_eq!(cur.read_path_name(), "active");
    }

    #[test]
    fn read_signed_int_rejects_empty_input() {
        let mut cur = Cursor::new("abc");
        assert!(cur.read_signed_int().is_err());
    }
}
