//! Statement segmenter.
//!
//! Cuts the next complete statement off the front of a [`SourceCursor`].
//! A statement ends at a `;` with every nesting counter at zero, or at the
//! `}` that closes a top-level scope block.
//!
//! # Normalization
//!
//! - `/* */` and `//` comments are dropped.
//! - Outside literals, whitespace runs collapse. A single space survives
//!   between two identifier-like tokens, and after the keywords in
//!   [`PRESERVE_SPACE_KEYWORDS`].
//! - The terminating `;` is not part of the returned statement.
//! - A statement wrapped in redundant `{ }` layers is unwrapped.
//!
//! # Matrix literals vs scopes
//!
//! `{` directly after `=` opens a matrix (or dictionary) literal, and every
//! `{` inside a literal nests it further. Any other `{` opens a scope. When a
//! scope `{` follows the token `do`, its closing `}` does not end the
//! statement, so `do{...}while(...)` is segmented as one unit. That check is
//! textual: an identifier ending in `do` before a block triggers it too.

use crate::{SegmentError, SourceCursor};


/// Keywords that keep one following space after compression.
///
/// Without it `return (x)` and `returned(x)` would normalize to similar
/// text, and declarations like `DataSet ds = ...` would lose the boundary
/// the builders cut on.
pub const PRESERVE_SPACE_KEYWORDS: &[&str] = &[
    "BayesianGraphicalModel",
    "LikelihoodFunction3",
    "LikelihoodFunction",
    "DataSetFilter",
    "namespace",
    "lfunction",
    "ffunction",
    "#include",
    "#profile",
    "function",
    "category",
    "Topology",
    "DataSet",
    "return",
    "Model",
    "Tree",
    "SCFG",
];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Literal {
    None,
    Double,
    Single,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Comment {
    None,
    /// Opened at the given char index.
    Block(usize),
    Line,
}

#[derive(Default)]
struct Depths {
    scope: i32,
    matrix: i32,
    parens: i32,
    brackets: i32,
}

impl Depths {
    fn all_zero(&self) -> bool {
        self.scope == 0 && self.matrix == 0 && self.parens == 0 && self.brackets == 0
    }
}

/// Pull the next statement off `cursor`.
///
/// Returns an empty string when the cursor is exhausted (or only held
/// whitespace and comments). On error the cursor is cleared.
pub fn next_statement(cursor: &mut SourceCursor<'_>) -> Result<String, SegmentError> {
    let input = cursor.remaining();
    if input.is_empty() {
        return Ok(String::new());
    }

    match scan_statement(input) {
        Ok((statement, consumed)) => {
            cursor.advance(consumed);
            Ok(statement)
        }
        Err(err) => {
            cursor.clear();
            Err(err)
        }
    }
}

/// Segment a whole buffer, skipping empty statements.
pub fn segment_all(source: &str) -> Result<Vec<String>, SegmentError> {
    let mut cursor = SourceCursor::new(source);
    let mut statements = Vec::new();
    while !cursor.is_empty() {
        let statement = next_statement(&mut cursor)?;
        if !statement.is_empty() {
            statements.push(statement);
        }
    }
    Ok(statements)
}

/// Scan one statement; returns it together with the number of input bytes
/// it consumed (terminator included).
fn scan_statement(input: &str) -> Result<(String, usize), SegmentError> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();

    let mut out = String::with_capacity(input.len().min(128));
    let mut literal = Literal::None;
    let mut comment = Comment::None;
    let mut depths = Depths::default();
    let mut do_while: Vec<i32> = Vec::new();
    let mut last: Option<char> = None;
    let mut skipping = false;
    let mut consumed = input.len();

    let mut i = 0;
    while i < chars.len() {
        let (offset, raw) = chars[i];
        let c = if literal == Literal::None && raw == '\t' {
            ' '
        } else {
            raw
        };

        match comment {
            Comment::Block(start) => {
                if c == '/' && i >= start + 3 && chars[i - 1].1 == '*' {
                    comment = Comment::None;
                }
                last = None;
                i += 1;
                continue;
            }
            Comment::Line => {
                if c == '\n' || c == '\r' {
                    comment = Comment::None;
                }
                last = None;
                i += 1;
                continue;
            }
            Comment::None => {
                if literal == Literal::None && c == '/' {
                    comment = match chars.get(i + 1).map(|&(_, n)| n) {
                        Some('*') => Comment::Block(i),
                        Some('/') => Comment::Line,
                        _ => Comment::None,
                    };
                    if comment != Comment::None {
                        last = None;
                        i += 2;
                        continue;
                    }
                }
            }
        }

        if literal == Literal::None && c.is_whitespace() {
            if !skipping && i > 0 && preserves_space(&out) {
                out.push(' ');
            }
            skipping = true;
            i += 1;
            continue;
        }

        if skipping
            && (c.is_alphabetic() || c == '_')
            && last.is_some_and(|l| l.is_alphanumeric() || l == '_')
            && !out.ends_with(' ')
        {
            out.push(' ');
        }
        skipping = false;
        out.push(c);

        if literal != Literal::None && c == '\\' {
            if let Some(&(_, escaped)) = chars.get(i + 1) {
                out.push(escaped);
            }
            i += 2;
            continue;
        }

        match (c, literal) {
            ('"', Literal::None) => {
                literal = Literal::Double;
                last = None;
                i += 1;
                continue;
            }
            ('"', Literal::Double) | ('\'', Literal::Single) => {
                literal = Literal::None;
                last = None;
                i += 1;
                continue;
            }
            ('\'', Literal::None) => {
                literal = Literal::Single;
                last = None;
                i += 1;
                continue;
            }
            _ => {}
        }

        if literal != Literal::None {
            i += 1;
            continue;
        }

        match c {
            ';' if depths.all_zero() => {
                out.pop();
                consumed = offset + 1;
                break;
            }
            '(' => depths.parens += 1,
            '[' => depths.brackets += 1,
            ')' | ']' => {
                let depth = if c == ')' {
                    &mut depths.parens
                } else {
                    &mut depths.brackets
                };
                *depth -= 1;
                if *depth < 0 {
                    return Err(SegmentError::TooManyClosing {
                        closer: c,
                        near: text_near(input, offset + 1),
                    });
                }
            }
            '{' => {
                if depths.matrix > 0 || last == Some('=') {
                    depths.matrix += 1;
                } else {
                    depths.scope += 1;
                    let before = out[..out.len() - 1].strip_suffix(' ').unwrap_or(&out[..out.len() - 1]);
                    if before.ends_with("do") {
                        do_while.push(depths.scope - 1);
                    }
                }
            }
            '}' => {
                if depths.matrix > 0 {
                    depths.matrix -= 1;
                } else {
                    depths.scope -= 1;
                    if depths.parens == 0 && depths.brackets == 0 {
                        if depths.scope >= 0 && do_while.last() == Some(&depths.scope) {
                            do_while.pop();
                        } else if depths.scope == 0 {
                            consumed = offset + 1;
                            break;
                        }
                    }
                }
            }
            _ => {
                last = Some(c);
                i += 1;
                continue;
            }
        }

        last = None;
        i += 1;
    }

    if consumed == input.len()
        && (literal != Literal::None
            || matches!(comment, Comment::Block(_))
            || !depths.all_zero())
    {
        if out == "}" {
            return Ok((String::new(), consumed));
        }
        return Err(SegmentError::Incomplete {
            scope: depths.scope,
            parens: depths.parens,
            matrix: depths.matrix,
            literal: match literal {
                Literal::Double => " In a \"\" literal. ",
                Literal::Single => " In a '' literal. ",
                Literal::None => "",
            },
            comment: if matches!(comment, Comment::Block(_)) {
                " In a /* */ comment "
            } else {
                ""
            },
            source_text: input.to_string(),
        });
    }

    Ok((unwrap_redundant_braces(out, input)?, consumed))
}

/// Whether the accumulated output ends in a space-preserving keyword that
/// is not the tail of a longer identifier.
fn preserves_space(out: &str) -> bool {
    PRESERVE_SPACE_KEYWORDS
        .iter()
        .filter(|kw| out.ends_with(*kw))
        .max_by_key(|kw| kw.len())
        .is_some_and(|kw| {
            out[..out.len() - kw.len()]
                .chars()
                .next_back()
                .map_or(true, |p| !(p.is_alphanumeric() || p == '_' || p == '.'))
        })
}

/// Strip `n` leading `{` and `n` trailing `}` when the statement starts with
/// a run of `n` opening braces.
fn unwrap_redundant_braces(out: String, input: &str) -> Result<String, SegmentError> {
    let lead = out.bytes().take_while(|&b| b == b'{').count();
    if lead == 0 {
        return Ok(out);
    }
    let trail = out.len() - out.trim_end_matches('}').len();
    if trail < lead || out.len() < 2 * lead {
        return Err(SegmentError::UnbalancedWrapper(input.to_string()));
    }
    Ok(out[lead..out.len() - lead].to_string())
}

/// Up to 33 characters of `input` ending at byte `end`.
fn text_near(input: &str, end: usize) -> String {
    let head = &input[..end];
    let start = head
        .char_indices()
        .rev()
        .nth(32)
        .map_or(0, |(offset, _)| offset);
    head[start..].to_string()
}
