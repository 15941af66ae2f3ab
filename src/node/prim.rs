//! Leaf node payloads: `String`, `Number`, `Bool`, `Null` (spec §3).
//!
//! Leaves are materialized eagerly when their container is lazily parsed —
//! only containers defer work.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::scan;

pub(crate) type Raw = Arc<[u8]>;

/// A decoded JSON string. `has_escapes` governs whether `raw_string()` can
/// return the original byte slice unescaped, or must fall back to the
/// decoded, owned `text`.
pub(crate) struct StringData {
    pub(crate) raw: Raw,
    pub(crate) start: usize,
    pub(crate) end: usize,
    pub(crate) text: String,
    pub(crate) has_escapes: bool,
}

impl StringData {
    pub(crate) fn from_raw(raw: Raw, start: usize) -> Result<(Self, usize)> {
        let (text, has_escapes, end) = scan::read_string(&raw, start)?;
        Ok((
            Self {
                raw,
                start,
                end,
                text,
                has_escapes,
            },
            end,
        ))
    }

    /// Builds a standalone string not backed by any document slice; always
    /// re-quotes from `text` rather than trying to read a raw range.
    pub(crate) fn literal(text: String) -> Self {
        Self {
            raw: Arc::from(Vec::new().into_boxed_slice()),
            start: 0,
            end: 0,
            has_escapes: true,
            text,
        }
    }

    /// Zero-copy when the source had no escapes; otherwise re-quotes the
    /// decoded text.
    pub(crate) fn raw_slice(&self) -> std::borrow::Cow<'_, str> {
        if !self.has_escapes && self.end > self.start {
            std::borrow::Cow::Borrowed(
                std::str::from_utf8(&self.raw[self.start..self.end]).unwrap_or_default(),
            )
        } else {
            std::borrow::Cow::Owned(quote(&self.text))
        }
    }
}

/// Re-quotes `s` with standard JSON escapes (used by the serializer and by
/// `StringData::raw_slice` for strings that contained escapes originally).
pub(crate) fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Payload shared by `Number`, `Bool`, and `Null`: just a raw byte range,
/// decoded on demand.
pub(crate) struct PrimData {
    pub(crate) raw: Raw,
    pub(crate) start: usize,
    pub(crate) end: usize,
}

impl PrimData {
    pub(crate) fn number(raw: Raw, start: usize) -> Result<(Self, usize)> {
        let end = scan::read_number(&raw, start)?;
        Ok((Self { raw, start, end }, end))
    }

    pub(crate) fn bool(raw: Raw, start: usize) -> Result<(Self, usize)> {
        let (_, end) = scan::read_bool(&raw, start)?;
        Ok((Self { raw, start, end }, end))
    }

    pub(crate) fn null(raw: Raw, start: usize) -> Result<(Self, usize)> {
        let end = scan::read_null(&raw, start)?;
        Ok((Self { raw, start, end }, end))
    }

    pub(crate) fn text(&self) -> &str {
        std::str::from_utf8(&self.raw[self.start..self.end]).unwrap_or_default()
    }

    pub(crate) fn as_f64(&self) -> Result<f64> {
        self.text()
            .parse::<f64>()
            .map_err(|_| Error::ParseError(format!("{:?} is not a valid number", self.text())))
    }

    pub(crate) fn as_bool(&self) -> bool {
        self.text() == "true"
    }

    /// Builds a standalone number/bool/null whose raw slice *is* its own
    /// canonical text, so the usual "dirty? reuse raw : re-serialize" path
    /// needs no special case for literals.
    pub(crate) fn literal(text: String) -> Self {
        let raw: Raw = Arc::from(text.into_bytes().into_boxed_slice());
        let end = raw.len();
        Self { raw, start: 0, end }
    }
}

#[cfg(test)]
mod tests {
    use crate::Root;

    #[test]
    fn escaped_string_decodes_and_reserializes_cleanly() {
        let root = Root::parse(br#"{"s":"a\nb\"c"}"#.to_vec()).unwrap();
        let s = root.node().get("s");
        assert_eq!(s.string_value().as_deref(), Some("a\nb\"c"));
        assert_eq!(s.string(), r#""a\nb\"c""#);
    }

    #[test]
    fn unescaped_string_is_zero_copy_in_raw_string() {
        let root = Root::parse(br#"{"s":"plain"}"#.to_vec()).unwrap();
        let s = root.node().get("s");
        assert_eq!(s.raw_string(), r#""plain""#);
    }

    #[test]
    fn number_text_round_trips_without_precision_loss() {
        let root = Root::parse(br#"{"n":3.14159}"#.to_vec()).unwrap();
        assert_eq!(root.node().get("n").string(), "3.14159");
    }
}
