//! Field readers for `fscanf` / `sscanf`.
//!
//! Offsets are bytes; every stop position sits next to an ASCII delimiter,
//! so slicing at them stays on character boundaries.

use hbl_formula::{Dict, Value};

pub(super) struct Scanner<'a> {
    data: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub(super) fn new(data: &'a str, pos: usize) -> Self {
        Scanner {
            data,
            pos: pos.min(data.len()),
        }
    }

    pub(super) fn pos(&self) -> usize {
        self.pos
    }

    pub(super) fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// The next number anywhere ahead. Whitespace and one `,` after it are
    /// consumed.
    pub(super) fn number(&mut self) -> Option<f64> {
        let bytes = self.data.as_bytes();
        let (start, end) = (self.pos..bytes.len()).find_map(|at| float_end(bytes, at).map(|end| (at, end)))?;
        let value = self.data[start..end].parse().ok()?;
        self.pos = end;
        self.skip_whitespace();
        if bytes.get(self.pos) == Some(&b',') {
            self.pos += 1;
        }
        Some(value)
    }

    /// Skip leading whitespace, then read up to a newline, carriage return
    /// or tab.
    pub(super) fn string(&mut self) -> String {
        self.skip_whitespace();
        let rest = &self.data[self.pos..];
        let len = rest.find(|c: char| matches!(c, '\n' | '\r' | '\t')).unwrap_or(rest.len());
        self.pos += len;
        rest[..len].to_string()
    }

    /// Everything that is left.
    pub(super) fn raw(&mut self) -> String {
        let rest = self.data[self.pos..].to_string();
        self.pos = self.data.len();
        rest
    }

    /// Everything that is left, split into lines and keyed by line number.
    pub(super) fn lines(&mut self) -> Dict {
        let rest = self.raw();
        let mut lines = Dict::new();
        for (i, line) in rest.lines().enumerate() {
            lines.insert(i.to_string(), Value::from(line));
        }
        if lines.is_empty() {
            lines.insert("0".to_string(), Value::from(""));
        }
        lines
    }

    /// The next balanced `open ... close` block, delimiters included.
    pub(super) fn block(&mut self, open: u8, close: u8) -> Option<&'a str> {
        let bytes = self.data.as_bytes();
        let Some(skip) = bytes[self.pos..].iter().position(|&b| b == open) else {
            self.pos = self.data.len();
            return None;
        };
        let start = self.pos + skip;
        let mut depth = 0_usize;
        let mut quote: Option<u8> = None;
        let mut escaped = false;
        for (offset, &b) in bytes[start..].iter().enumerate() {
            if let Some(q) = quote {
                if escaped {
                    escaped = false;
                } else if b == b'\\' {
                    escaped = true;
                } else if b == q {
                    quote = None;
                }
                continue;
            }
            match b {
                b'"' | b'\'' => quote = Some(b),
                _ if b == open => depth += 1,
                _ if b == close => {
                    depth -= 1;
                    if depth == 0 {
                        let end = start + offset + 1;
                        self.pos = end;
                        return Some(&self.data[start..end]);
                    }
                }
                _ => {}
            }
        }
        self.pos = self.data.len();
        None
    }

    fn skip_whitespace(&mut self) {
        let rest = &self.data[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }
}

/// End of the float literal starting at `start`:
/// `[+-]?digits[.digits][(e|E)[+-]?digits]`.
fn float_end(bytes: &[u8], start: usize) -> Option<usize> {
    let digits_from = |mut at: usize| {
        while bytes.get(at).is_some_and(u8::is_ascii_digit) {
            at += 1;
        }
        at
    };

    let mut at = start;
    if matches!(bytes.get(at), Some(b'+' | b'-')) {
        at += 1;
    }
    let int_end = digits_from(at);
    let mut digits = int_end - at;
    at = int_end;

    if bytes.get(at) == Some(&b'.') {
        let frac_end = digits_from(at + 1);
        if digits > 0 || frac_end > at + 1 {
            digits += frac_end - (at + 1);
            at = frac_end;
        }
    }
    if digits == 0 {
        return None;
    }

    if matches!(bytes.get(at), Some(b'e' | b'E')) {
        let mut exp = at + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            at = exp_end;
        }
    }
    Some(at)
}
