//! Argument extractor.
//!
//! Splits the argument list of a call-style statement such as
//! `CreateFilter(ds, 1, "<000>")`. Scanning starts just inside the opening
//! parenthesis, so the extractor begins at paren depth one.


/// Pieces of an argument list and where it ended.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Conditions {
    pub pieces: Vec<String>,
    /// Byte offset of the matching `)`, or the text length if unmatched.
    pub close: usize,
}

impl Conditions {
    /// Byte offset just past the matching `)`.
    pub fn rest_offset(&self, text: &str) -> usize {
        (self.close + 1).min(text.len())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }
}

/// Split `text[start..]` on `delimiter` at the outermost level.
///
/// Delimiters nested in `()` or `{}` or inside a quoted literal are kept in
/// the piece. A quote preceded by a backslash does not toggle the literal
/// state. With `include_empty` unset, an empty final piece (empty argument
/// list or trailing delimiter) is dropped.
pub fn extract_conditions(
    text: &str,
    start: usize,
    delimiter: char,
    include_empty: bool,
) -> Conditions {
    let mut pieces = Vec::new();
    let mut parens = 1_i32;
    let mut curly = 0_i32;
    let mut quote: Option<char> = None;
    let base = start.min(text.len());
    let mut piece_start = base;
    let mut close = text.len();
    let mut prev: Option<char> = None;

    for (offset, c) in text[base..].char_indices() {
        let offset = offset + base;
        let escaped = prev == Some('\\');
        prev = Some(c);

        if quote.is_none() {
            match c {
                '(' => {
                    parens += 1;
                    continue;
                }
                ')' => {
                    parens -= 1;
                    if parens == 0 {
                        close = offset;
                        break;
                    }
                    continue;
                }
                '{' => {
                    curly += 1;
                    continue;
                }
                '}' => {
                    curly -= 1;
                    continue;
                }
                _ => {}
            }
        }

        if (c == '"' || c == '\'') && !escaped {
            match quote {
                None => quote = Some(c),
                Some(open) if open == c => quote = None,
                Some(_) => {}
            }
            continue;
        }

        if c == delimiter && parens == 1 && curly == 0 && quote.is_none() {
            pieces.push(text[piece_start..offset].to_string());
            piece_start = offset + c.len_utf8();
        }
    }

    let tail = &text[piece_start..close];
    if include_empty || !tail.is_empty() {
        pieces.push(tail.to_string());
    }

    Conditions { pieces, close }
}
