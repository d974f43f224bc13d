//! Dotted namespace prefixes.
//!
//! A namespace is a dotted identifier (`outer.inner`). Object and variable
//! names written inside it are qualified by prefixing it; a leading `^`
//! opts a name out and addresses the global scope.

/// Qualify `id` with `namespace`.
pub fn qualify(id: &str, namespace: Option<&str>) -> String {
    if let Some(global) = id.strip_prefix('^') {
        return global.to_string();
    }
    match namespace {
        Some(ns) if !ns.is_empty() => format!("{ns}.{id}"),
        _ => id.to_string(),
    }
}

/// The namespace an `extra` scope lives in when opened inside `namespace`.
pub fn nest(namespace: Option<&str>, extra: Option<&str>) -> Option<String> {
    match (namespace.filter(|ns| !ns.is_empty()), extra.filter(|e| !e.is_empty())) {
        (Some(ns), Some(extra)) => Some(format!("{ns}.{extra}")),
        (None, Some(extra)) => Some(extra.to_string()),
        (Some(ns), None) => Some(ns.to_string()),
        (None, None) => None,
    }
}

/// Strip `namespace.` from the front of `id`, if present.
pub fn trim<'a>(id: &'a str, namespace: Option<&str>) -> &'a str {
    namespace
        .and_then(|ns| id.strip_prefix(ns))
        .and_then(|rest| rest.strip_prefix('.'))
        .unwrap_or(id)
}

/// Drop the last dotted segment: `a.b.c` → `a.b`, `a` → `None`.
pub fn parent(namespace: &str) -> Option<&str> {
    namespace.rfind('.').map(|at| &namespace[..at])
}
