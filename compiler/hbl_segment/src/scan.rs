//! Scanning helpers shared by the statement builders.

/// Words that may not name a variable, function, or object.
pub const RESERVED_WORDS: &[&str] = &[
    "for", "while", "if", "else", "do", "break", "continue", "function", "ffunction", "lfunction",
    "return", "namespace",
];

#[inline]
pub fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

#[inline]
pub fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Whether `name` is a usable identifier.
///
/// A compound identifier is a dot-separated chain (`ns.inner.x`); each
/// segment must start with a letter or `_`. Reserved words are rejected
/// as whole names and as segments.
pub fn is_valid_identifier(name: &str, allow_compound: bool) -> bool {
    if name.is_empty() {
        return false;
    }
    if !allow_compound && name.contains('.') {
        return false;
    }
    name.split('.').all(|segment| {
        let mut chars = segment.chars();
        chars.next().is_some_and(is_identifier_start)
            && chars.all(is_identifier_char)
            && !RESERVED_WORDS.contains(&segment)
    })
}

/// `text` starts with `keyword` and the keyword is not the head of a
/// longer identifier (`return` vs `returned`).
pub fn begins_with_keyword(text: &str, keyword: &str) -> bool {
    text.strip_prefix(keyword)
        .is_some_and(|rest| !rest.starts_with(is_identifier_char))
}

/// First position of `target` at or after `from` that sits outside every
/// grouping and literal.
pub fn find_terminator(text: &str, from: usize, target: char) -> Option<usize> {
    let mut depth = 0_i32;
    let mut quote: Option<char> = None;
    let mut prev: Option<char> = None;

    for (offset, c) in text.get(from..)?.char_indices() {
        let escaped = prev == Some('\\');
        prev = Some(c);
        if let Some(open) = quote {
            if c == open && !escaped {
                quote = None;
            }
            continue;
        }
        if c == target && depth == 0 {
            return Some(from + offset);
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Contents of a `"..."` or `'...'` literal with escapes resolved, or
/// `None` when `text` is not a single literal.
pub fn unquote(text: &str) -> Option<String> {
    let quote = text.chars().next().filter(|&c| c == '"' || c == '\'')?;
    let body = text.get(1..)?.strip_suffix(quote)?;
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else if c == quote {
            return None;
        } else {
            out.push(c);
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_identifier_validation() {
        assert!(is_valid_identifier("x", false));
        assert!(is_valid_identifier("_tmp2", false));
        assert!(is_valid_identifier("ns.inner.x", true));
        assert!(!is_valid_identifier("ns.x", false));
        assert!(!is_valid_identifier("2x", true));
        assert!(!is_valid_identifier("ns..x", true));
        assert!(!is_valid_identifier("return", true));
        assert!(!is_valid_identifier("", true));
    }

    #[test]
    fn test_keyword_boundary() {
        assert!(begins_with_keyword("return x", "return"));
        assert!(begins_with_keyword("return", "return"));
        assert!(begins_with_keyword("return(1)", "return"));
        assert!(!begins_with_keyword("returned=1", "return"));
        assert!(!begins_with_keyword("elsewhere=2", "else"));
    }

    #[test]
    fn test_find_terminator_skips_groups_and_literals() {
        assert_eq!(find_terminator("ds=ReadDataFile(\"a=b\")", 0, '='), Some(2));
        assert_eq!(find_terminator("f(a=1)=2", 0, '='), Some(6));
        assert_eq!(find_terminator("\"x=\"", 0, '='), None);
        assert_eq!(find_terminator("a=b=c", 2, '='), Some(3));
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"a\\\"b\""), Some("a\"b".to_string()));
        assert_eq!(unquote("'x.bf'"), Some("x.bf".to_string()));
        assert_eq!(unquote("\"a\"+\"b\""), None);
        assert_eq!(unquote("name"), None);
    }
}
