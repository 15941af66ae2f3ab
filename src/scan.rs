//! Raw Scanner (spec §4.1): byte-level, allocation-free structural primitives
//! over a borrowed JSON byte slice. Nothing here builds a tree; callers
//! combine these primitives to locate byte ranges on demand.

use crate::error::{Error, Result};

/// Guards against pathological nesting in untrusted input. Independent of
/// the path evaluator's own recursion cap (see `config::Options::max_depth`).
const MAX_DEPTH: usize = 256;

#[inline]
pub fn skip_whitespace(raw: &[u8], mut pos: usize) -> usize {
    while matches!(raw.get(pos), Some(b' ' | b'\t' | b'\n' | b'\r')) {
        pos += 1;
    }
    pos
}

/// Reads a JSON string starting at `pos`, which must point at the opening
/// quote. Returns the decoded content, whether any escape sequence was
/// present (callers use this to decide if a zero-copy raw slice remains
/// valid), and the position just past the closing quote.
pub fn read_string(raw: &[u8], pos: usize) -> Result<(String, bool, usize)> {
    if raw.get(pos) != Some(&b'"') {
        return Err(Error::ParseError("expected opening '\"'".into()));
    }
    let content_start = pos + 1;
    let mut i = content_start;
    let mut has_escapes = false;
    let mut decoded = String::new();
    loop {
        match raw.get(i) {
            None => return Err(Error::ParseError("unterminated string".into())),
            Some(b'"') => {
                if !has_escapes {
                    decoded = std::str::from_utf8(&raw[content_start..i])
                        .map_err(|_| Error::ParseError("invalid utf-8 in string".into()))?
                        .to_owned();
                }
                return Ok((decoded, has_escapes, i + 1));
            }
            Some(b'\\') => {
                if !has_escapes {
                    decoded = std::str::from_utf8(&raw[content_start..i])
                        .map_err(|_| Error::ParseError("invalid utf-8 in string".into()))?
                        .to_owned();
                    has_escapes = true;
                }
                i += 1;
                match raw.get(i) {
                    Some(b'"') => {
                        decoded.push('"');
                        i += 1;
                    }
                    Some(b'\\') => {
                        decoded.push('\\');
                        i += 1;
                    }
                    Some(b'/') => {
                        decoded.push('/');
                        i += 1;
                    }
                    Some(b'b') => {
                        decoded.push('\u{8}');
                        i += 1;
                    }
                    Some(b'f') => {
                        decoded.push('\u{c}');
                        i += 1;
                    }
                    Some(b'n') => {
                        decoded.push('\n');
                        i += 1;
                    }
                    Some(b'r') => {
                        decoded.push('\r');
                        i += 1;
                    }
                    Some(b't') => {
                        decoded.push('\t');
                        i += 1;
                    }
                    Some(b'u') => {
                        let (ch, next) = read_unicode_escape(raw, i + 1)?;
                        decoded.push(ch);
                        i = next;
                    }
                    _ => return Err(Error::ParseError("invalid escape sequence".into())),
                }
            }
            Some(_) => {
                if has_escapes {
                    let rest = std::str::from_utf8(&raw[i..])
                        .map_err(|_| Error::ParseError("invalid utf-8 in string".into()))?;
                    let ch = rest
                        .chars()
                        .next()
                        .ok_or_else(|| Error::ParseError("unterminated string".into()))?;
                    decoded.push(ch);
                    i += ch.len_utf8();
                } else {
                    i += 1;
                }
            }
        }
    }
}

fn read_unicode_escape(raw: &[u8], pos: usize) -> Result<(char, usize)> {
    let high = read_hex4(raw, pos)?;
    let mut pos = pos + 4;
    if (0xD800..=0xDBFF).contains(&high) {
        if raw.get(pos) == Some(&b'\\') && raw.get(pos + 1) == Some(&b'u') {
            let low = read_hex4(raw, pos + 2)?;
            if (0xDC00..=0xDFFF).contains(&low) {
                let cp = 0x10000 + (high - 0xD800) * 0x400 + (low - 0xDC00);
                pos += 6;
                let ch = char::from_u32(cp)
                    .ok_or_else(|| Error::ParseError("invalid surrogate pair".into()))?;
                return Ok((ch, pos));
            }
        }
        return Err(Error::ParseError("unpaired surrogate in \\u escape".into()));
    }
    let ch =
        char::from_u32(high).ok_or_else(|| Error::ParseError("invalid \\u escape".into()))?;
    Ok((ch, pos))
}

fn read_hex4(raw: &[u8], pos: usize) -> Result<u32> {
    let hex = raw
        .get(pos..pos + 4)
        .ok_or_else(|| Error::ParseError("truncated \\u escape".into()))?;
    let hex = std::str::from_utf8(hex).map_err(|_| Error::ParseError("invalid \\u escape".into()))?;
    u32::from_str_radix(hex, 16).map_err(|_| Error::ParseError("invalid \\u escape".into()))
}

/// Reads a JSON number's raw digit slice, following the grammar exactly
/// (optional `-`, no leading zeros except bare `0`, optional fraction,
/// optional exponent). Returns the end position.
pub fn read_number(raw: &[u8], pos: usize) -> Result<usize> {
    let mut i = pos;
    if raw.get(i) == Some(&b'-') {
        i += 1;
    }
    match raw.get(i) {
        Some(b'0') => i += 1,
        Some(c) if c.is_ascii_digit() => {
            while raw.get(i).is_some_and(u8::is_ascii_digit) {
                i += 1;
            }
        }
        _ => return Err(Error::ParseError("invalid number".into())),
    }
    if raw.get(i) == Some(&b'.') {
        let mut j = i + 1;
        if !raw.get(j).is_some_and(u8::is_ascii_digit) {
            return Err(Error::ParseError("invalid number fraction".into()));
        }
        while raw.get(j).is_some_and(u8::is_ascii_digit) {
            j += 1;
        }
        i = j;
    }
    if matches!(raw.get(i), Some(b'e' | b'E')) {
        let mut j = i + 1;
        if matches!(raw.get(j), Some(b'+' | b'-')) {
            j += 1;
        }
        if !raw.get(j).is_some_and(u8::is_ascii_digit) {
            return Err(Error::ParseError("invalid number exponent".into()));
        }
        while raw.get(j).is_some_and(u8::is_ascii_digit) {
            j += 1;
        }
        i = j;
    }
    Ok(i)
}

pub fn read_bool(raw: &[u8], pos: usize) -> Result<(bool, usize)> {
    if raw[pos..].starts_with(b"true") {
        Ok((true, pos + 4))
    } else if raw[pos..].starts_with(b"false") {
        Ok((false, pos + 5))
    } else {
        Err(Error::ParseError("invalid bool literal".into()))
    }
}

pub fn read_null(raw: &[u8], pos: usize) -> Result<usize> {
    if raw[pos..].starts_with(b"null") {
        Ok(pos + 4)
    } else {
        Err(Error::ParseError("invalid null literal".into()))
    }
}

/// Skips an arbitrary JSON value starting at `pos`, returning the end
/// position. Recursive via an explicit depth counter rather than the call
/// stack alone running unchecked.
pub fn skip_value(raw: &[u8], pos: usize, depth: usize) -> Result<usize> {
    if depth > MAX_DEPTH {
        return Err(Error::ParseError("maximum nesting depth exceeded".into()));
    }
    let pos = skip_whitespace(raw, pos);
    match raw.get(pos) {
        Some(b'{') => find_matching_brace(raw, pos, depth),
        Some(b'[') => find_matching_bracket(raw, pos, depth),
        Some(b'"') => read_string(raw, pos).map(|(_, _, end)| end),
        Some(b't' | b'f') => read_bool(raw, pos).map(|(_, end)| end),
        Some(b'n') => read_null(raw, pos),
        Some(b'-' | b'0'..=b'9') => read_number(raw, pos),
        Some(c) => Err(Error::ParseError(format!("unexpected byte {:#04x}", c))),
        None => Err(Error::ParseError("unexpected end of input".into())),
    }
}

/// Finds the end of the primitive value (number, bool, or null) at `pos`.
pub fn find_value_end(raw: &[u8], pos: usize) -> Result<usize> {
    match raw.get(pos) {
        Some(b't' | b'f') => read_bool(raw, pos).map(|(_, end)| end),
        Some(b'n') => read_null(raw, pos),
        Some(b'-' | b'0'..=b'9') => read_number(raw, pos),
        _ => Err(Error::ParseError("not a primitive value".into())),
    }
}

/// Finds the position just past the `}` matching the `{` at `start`.
pub fn find_matching_brace(raw: &[u8], start: usize, depth: usize) -> Result<usize> {
    if depth > MAX_DEPTH {
        return Err(Error::ParseError("maximum nesting depth exceeded".into()));
    }
    if raw.get(start) != Some(&b'{') {
        return Err(Error::ParseError("expected '{'".into()));
    }
    let mut i = skip_whitespace(raw, start + 1);
    if raw.get(i) == Some(&b'}') {
        return Ok(i + 1);
    }
    loop {
        i = skip_whitespace(raw, i);
        let (_, _, after_key) = read_string(raw, i)?;
        i = skip_whitespace(raw, after_key);
        if raw.get(i) != Some(&b':') {
            return Err(Error::ParseError("expected ':'".into()));
        }
        i = skip_whitespace(raw, i + 1);
        i = skip_value(raw, i, depth + 1)?;
        i = skip_whitespace(raw, i);
        match raw.get(i) {
            Some(b',') => i = skip_whitespace(raw, i + 1),
            Some(b'}') => return Ok(i + 1),
            _ => return Err(Error::ParseError("expected ',' or '}'".into())),
        }
    }
}

/// Finds the position just past the `]` matching the `[` at `start`.
pub fn find_matching_bracket(raw: &[u8], start: usize, depth: usize) -> Result<usize> {
    if depth > MAX_DEPTH {
        return Err(Error::ParseError("maximum nesting depth exceeded".into()));
    }
    if raw.get(start) != Some(&b'[') {
        return Err(Error::ParseError("expected '['".into()));
    }
    let mut i = skip_whitespace(raw, start + 1);
    if raw.get(i) == Some(&b']') {
        return Ok(i + 1);
    }
    loop {
        i = skip_value(raw, i, depth + 1)?;
        i = skip_whitespace(raw, i);
        match raw.get(i) {
            Some(b',') => i = skip_whitespace(raw, i + 1),
            Some(b']') => return Ok(i + 1),
            _ => return Err(Error::ParseError("expected ',' or ']'".into())),
        }
    }
}

/// One key/value entry produced while scanning an object's raw bytes.
pub struct ObjEntry {
    pub key: String,
    pub key_has_escapes: bool,
    pub value_start: usize,
    pub value_end: usize,
}

/// Streams `{ "k": v, ... }` entries directly off the raw buffer without
/// building any structure. Used both by the full lazy-parse (§4.5) and by
/// the raw-mode object iterator (component "Iterators").
pub struct ObjectEntries<'a> {
    raw: &'a [u8],
    pos: usize,
    started: bool,
    done: bool,
}

impl<'a> ObjectEntries<'a> {
    /// `obj_start` must point at the object's opening `{`.
    pub fn new(raw: &'a [u8], obj_start: usize) -> Self {
        Self {
            raw,
            pos: obj_start,
            started: false,
            done: false,
        }
    }
}

impl<'a> Iterator for ObjectEntries<'a> {
    type Item = Result<ObjEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let raw = self.raw;
        if !self.started {
            self.started = true;
            self.pos = skip_whitespace(raw, self.pos + 1);
            if raw.get(self.pos) == Some(&b'}') {
                self.done = true;
                return None;
            }
        }
        self.pos = skip_whitespace(raw, self.pos);
        let (key, key_has_escapes, after_key) = match read_string(raw, self.pos) {
            Ok(v) => v,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        let mut i = skip_whitespace(raw, after_key);
        if raw.get(i) != Some(&b':') {
            self.done = true;
            return Some(Err(Error::ParseError("expected ':'".into())));
        }
        i = skip_whitespace(raw, i + 1);
        let value_start = i;
        let value_end = match skip_value(raw, i, 0) {
            Ok(v) => v,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        i = skip_whitespace(raw, value_end);
        match raw.get(i) {
            Some(b',') => self.pos = i + 1,
            Some(b'}') => {
                self.pos = i + 1;
                self.done = true;
            }
            _ => {
                self.done = true;
                return Some(Err(Error::ParseError("expected ',' or '}'".into())));
            }
        }
        Some(Ok(ObjEntry {
            key,
            key_has_escapes,
            value_start,
            value_end,
        }))
    }
}

/// Streams `[v, v, ...]` elements directly off the raw buffer.
pub struct ArrayElements<'a> {
    raw: &'a [u8],
    pos: usize,
    started: bool,
    done: bool,
}

impl<'a> ArrayElements<'a> {
    /// `arr_start` must point at the array's opening `[`.
    pub fn new(raw: &'a [u8], arr_start: usize) -> Self {
        Self {
            raw,
            pos: arr_start,
            started: false,
            done: false,
        }
    }
}

impl<'a> Iterator for ArrayElements<'a> {
    type Item = Result<(usize, usize)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let raw = self.raw;
        if !self.started {
            self.started = true;
            self.pos = skip_whitespace(raw, self.pos + 1);
            if raw.get(self.pos) == Some(&b']') {
                self.done = true;
                return None;
            }
        }
        let start = self.pos;
        let end = match skip_value(raw, start, 0) {
            Ok(v) => v,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        let mut i = skip_whitespace(raw, end);
        match raw.get(i) {
            Some(b',') => {
                i = skip_whitespace(raw, i + 1);
                self.pos = i;
            }
            Some(b']') => {
                self.pos = i + 1;
                self.done = true;
            }
            _ => {
                self.done = true;
                return Some(Err(Error::ParseError("expected ',' or ']'".into())));
            }
        }
        Some(Ok((start, end)))
    }
}

/// Locates the byte range of the value for `key` inside the object starting
/// at `obj_start`. Per the "last wins" duplicate-key policy (DESIGN.md),
/// scans the whole object and keeps the last match rather than
/// short-circuiting on the first.
pub fn find_key(raw: &[u8], obj_start: usize, key: &str) -> Result<Option<(usize, usize)>> {
    let mut found = None;
    for entry in ObjectEntries::new(raw, obj_start) {
        let entry = entry?;
        if entry.key == key {
            found = Some((entry.value_start, entry.value_end));
        }
    }
    Ok(found)
}

/// Locates the byte range of the `index`-th element of the array starting
/// at `arr_start` (0-based, already resolved from any negative index).
pub fn nth_element(raw: &[u8], arr_start: usize, index: usize) -> Result<Option<(usize, usize)>> {
    for (i, elem) in ArrayElements::new(raw, arr_start).enumerate() {
        let (start, end) = elem?;
        if i == index {
            return Ok(Some((start, end)));
        }
    }
    Ok(None)
}

/// Counts the elements of the array starting at `arr_start`.
pub fn count_elements(raw: &[u8], arr_start: usize) -> Result<usize> {
    let mut n = 0;
    for elem in ArrayElements::new(raw, arr_start) {
        elem?;
        n += 1;
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_plain_string() {
        let raw = br#""hello""#;
        let (s, esc, end) = read_string(raw, 0).unwrap();
        assert_eq!(s, "hello");
        assert!(!esc);
        assert_eq!(end, raw.len());
    }

    #[test]
    fn reads_escaped_string() {
        let raw = br#""a\"b\nc""#;
        let (s, esc, _end) = read_string(raw, 0).unwrap();
        assert_eq!(s, "a\"b\nc");
        assert!(esc);
    }

    #[test]
    fn reads_surrogate_pair() {
        let raw = br#""😀""#;
        let (s, _esc, _end) = read_string(raw, 0).unwrap();
        assert_eq!(s, "\u{1f600}");
    }

    #[test]
    fn number_grammar() {
        assert_eq!(read_number(b"0", 0).unwrap(), 1);
        assert_eq!(read_number(b"-12.5e+10", 0).unwrap(), 9);
        assert!(read_number(b"01", 0).is_ok()); // "0" parses, "1" left for caller
    }

    #[test]
    fn finds_key_last_wins() {
        let raw = br#"{"a":1,"b":2,"a":3}"#;
        let (start, end) = find_key(raw, 0, "a").unwrap().unwrap();
        assert_eq!(&raw[start..end], b"3");
    }

    #[test]
    fn array_nth_and_count() {
        let raw = br#"[0,1,2,3]"#;
        assert_eq!(count_elements(raw, 0).unwrap(), 4);
        let (s, e) = nth_element(raw, 0, 2).unwrap().unwrap();
        assert_eq!(&raw[s..e], b"2");
    }
}
