//! Helpers for dot-delimited relation paths.
//!
//! A relation path such as `"employee.person"` names a chain of joins from the
//! root entity. Every prefix (`"employee"`) is itself a joinable path.

/// Path separator.
pub const SEPARATOR: char = '.';

/// Split a possibly dotted field into its relation path and leaf column.
///
/// ```rust
/// use basequery_engine::relations::path::split_field;
///
/// assert_eq!(split_field("employee.person.name"), (Some("employee.person"), "name"));
/// assert_eq!(split_field("name"), (None, "name"));
/// ```
pub fn split_field(field: &str) -> (Option<&str>, &str) {
    match field.rfind(SEPARATOR) {
        Some(idx) => (Some(&field[..idx]), &field[idx + 1..]),
        None => (None, field),
    }
}

/// Number of hops in a path (`"a.b.c"` has depth 3).
pub fn depth(path: &str) -> usize {
    path.split(SEPARATOR).count()
}

/// The path without its last segment.
pub fn parent(path: &str) -> Option<&str> {
    path.rfind(SEPARATOR).map(|idx| &path[..idx])
}

/// The last segment of a path, i.e. the relation name on its parent entity.
pub fn leaf(path: &str) -> &str {
    split_field(path).1
}

/// Every prefix of `path`, shortest first, including `path` itself.
pub fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    path.char_indices()
        .filter(|(_, c)| *c == SEPARATOR)
        .map(move |(idx, _)| &path[..idx])
        .chain(std::iter::once(path))
}

/// Whether `ancestor` equals `path` or is a proper prefix of it on a
/// segment boundary.
pub fn is_ancestor_or_self(ancestor: &str, path: &str) -> bool {
    path == ancestor
        || (path.len() > ancestor.len()
            && path.starts_with(ancestor)
            && path.as_bytes()[ancestor.len()] == SEPARATOR as u8)
}

/// Whether `prefix` is reachable through the declared relation set, i.e. it
/// equals or is an ancestor of at least one declared path.
pub fn is_covered<S: AsRef<str>>(prefix: &str, declared: &[S]) -> bool {
    declared.iter().any(|r| is_ancestor_or_self(prefix, r.as_ref()))
}

/// Whether the path has no empty segments.
pub fn is_well_formed(path: &str) -> bool {
    !path.is_empty() && path.split(SEPARATOR).all(|seg| !seg.trim().is_empty())
}
