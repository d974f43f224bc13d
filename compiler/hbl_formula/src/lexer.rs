//! Expression tokenizer.

use crate::FormulaError;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Sym(&'static str),
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub pos: usize,
}

const TWO_CHAR: &[&str] = &["==", "!=", "<=", ">=", "&&", "||", "+=", "-=", "*=", "/="];
const ONE_CHAR: &[&str] = &[
    "+", "-", "*", "/", "%", "$", "^", "<", ">", "!", "=", "(", ")", "[", "]", "{", "}", ",", ":",
];

pub(crate) fn tokenize(source: &str) -> Result<Vec<Spanned>, FormulaError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        let start = pos;
        let token = if c.is_ascii_digit() || (c == b'.' && bytes.get(pos + 1).is_some_and(u8::is_ascii_digit)) {
            pos = scan_number(bytes, pos);
            let text = &source[start..pos];
            Token::Number(
                text.parse()
                    .map_err(|_| FormulaError::InvalidNumber(text.to_string()))?,
            )
        } else if c.is_ascii_alphabetic() || c == b'_' {
            pos = scan_identifier(bytes, pos);
            Token::Ident(source[start..pos].to_string())
        } else if c == b'"' || c == b'\'' {
            let (text, end) = scan_string(source, pos)?;
            pos = end;
            Token::Str(text)
        } else if let Some(sym) = TWO_CHAR.iter().find(|s| source[pos..].starts_with(**s)) {
            pos += 2;
            Token::Sym(*sym)
        } else if let Some(sym) = ONE_CHAR.iter().find(|s| s.as_bytes()[0] == c) {
            pos += 1;
            Token::Sym(*sym)
        } else {
            let found = source[pos..].chars().next().map(String::from).unwrap_or_default();
            return Err(FormulaError::UnexpectedToken {
                found,
                position: pos,
                source_text: source.to_string(),
            });
        };

        tokens.push(Spanned { token, pos: start });
    }

    Ok(tokens)
}

fn scan_number(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    if bytes.get(pos) == Some(&b'.') {
        pos += 1;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
    }
    if matches!(bytes.get(pos), Some(b'e' | b'E')) {
        let mut exp = pos + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        if bytes.get(exp).is_some_and(u8::is_ascii_digit) {
            pos = exp;
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
        }
    }
    pos
}

/// Identifier segments joined by `.` (`ns.inner.x`).
fn scan_identifier(bytes: &[u8], mut pos: usize) -> usize {
    loop {
        while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
            pos += 1;
        }
        let continues = bytes.get(pos) == Some(&b'.')
            && bytes
                .get(pos + 1)
                .is_some_and(|b| b.is_ascii_alphabetic() || *b == b'_');
        if !continues {
            return pos;
        }
        pos += 1;
    }
}

fn scan_string(source: &str, start: usize) -> Result<(String, usize), FormulaError> {
    let mut chars = source[start..].char_indices();
    let Some((_, quote)) = chars.next() else {
        return Err(FormulaError::UnterminatedString(source.to_string()));
    };
    let mut text = String::new();
    while let Some((offset, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, 'n')) => text.push('\n'),
                Some((_, 't')) => text.push('\t'),
                Some((_, other)) => text.push(other),
                None => break,
            },
            c if c == quote => return Ok((text, start + offset + 1)),
            c => text.push(c),
        }
    }
    Err(FormulaError::UnterminatedString(source.to_string()))
}
